use std::ops::Index;

use nalgebra::{convert, RealField};
use simba::scalar::SupersetOf;

use crate::error::Error;
use crate::misc::{FloatingPoint, Invertible};
use crate::prelude::KnotMultiplicity;

/// Knot vector representation
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct KnotVector<T>(Vec<T>);

impl<T: RealField + Copy> KnotVector<T> {
    pub fn new(knots: Vec<T>) -> Self {
        Self(knots)
    }

    /// Validate a raw knot vector for a curve with the given number of
    /// control points and degree.
    pub fn try_validated(knots: Vec<T>, point_count: usize, degree: usize) -> Result<Self, Error> {
        let expected = point_count + degree + 1;
        if knots.len() != expected {
            return Err(Error::InvalidKnotVector(format!(
                "got {} knots, expected {}",
                knots.len(),
                expected
            )));
        }
        if knots.windows(2).any(|w| w[0] > w[1]) {
            return Err(Error::InvalidKnotVector(
                "knots must be non-decreasing".to_string(),
            ));
        }
        Ok(Self(knots))
    }

    /// Create a clamped uniform knot vector on the [0, 1] domain
    /// with degree + 1 multiplicity at the start and end.
    /// `point_count` must be greater than `degree`.
    /// # Example
    /// ```
    /// use nurbsfit::prelude::KnotVector;
    /// let knots: KnotVector<f64> = KnotVector::uniform(5, 3);
    /// assert_eq!(knots.to_vec(), vec![0., 0., 0., 0., 0.5, 1., 1., 1., 1.]);
    /// ```
    pub fn uniform(point_count: usize, degree: usize) -> Self {
        assert!(
            point_count > degree,
            "point_count must exceed the degree, got {} for degree {}",
            point_count,
            degree
        );
        let n = point_count - degree;
        let inv = T::one() / T::from_usize(n).unwrap();
        let mut knots = vec![T::zero(); degree + 1];
        for i in 1..n {
            knots.push(T::from_usize(i).unwrap() * inv);
        }
        knots.extend(std::iter::repeat_n(T::one(), degree + 1));
        Self(knots)
    }

    /// Create a clamped knot vector from interpolation parameters by averaging
    /// each interior knot over `degree` consecutive parameters.
    /// `params` must hold more than `degree` values.
    pub fn from_params(degree: usize, params: &[T]) -> Self {
        assert!(
            params.len() > degree,
            "got {} params, averaging with degree {} needs at least {}",
            params.len(),
            degree,
            degree + 1
        );
        let inv = T::one() / T::from_usize(degree).unwrap();
        let mut knots = vec![T::zero(); degree + 1];
        for j in 1..(params.len() - degree) {
            let sum = params[j..j + degree]
                .iter()
                .fold(T::zero(), |acc, u| acc + *u);
            knots.push(sum * inv);
        }
        knots.extend(std::iter::repeat_n(T::one(), degree + 1));
        Self(knots)
    }

    /// Shift and scale the knot vector so it spans exactly [0, 1].
    pub fn normalized(&self) -> Result<Self, Error> {
        let first = self.first();
        let span = self.last() - first;
        if span <= T::default_epsilon() {
            return Err(Error::InvalidKnotVector(
                "degenerate domain, first and last knots coincide".to_string(),
            ));
        }
        Ok(Self(self.0.iter().map(|k| (*k - first) / span).collect()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn to_vec(&self) -> Vec<T> {
        self.0.clone()
    }

    pub fn first(&self) -> T {
        self.0[0]
    }

    pub fn last(&self) -> T {
        self.0[self.0.len() - 1]
    }

    pub fn as_slice(&self) -> &[T] {
        &self.0
    }

    pub fn iter(&self) -> std::slice::Iter<T> {
        self.0.iter()
    }

    /// Get the domain of the knot vector by degree
    pub fn domain(&self, degree: usize) -> (T, T) {
        (self.0[degree], self.0[self.0.len() - 1 - degree])
    }

    /// Get the multiplicity of each knot
    /// # Example
    /// ```
    /// use nurbsfit::prelude::KnotVector;
    /// let knots = KnotVector::new(vec![0., 0., 0., 0.25, 0.5, 1., 1., 1.]);
    /// let knot_multiplicity = knots.multiplicity();
    /// assert_eq!(knot_multiplicity[0].multiplicity(), 3);
    /// assert_eq!(knot_multiplicity[1].multiplicity(), 1);
    /// assert_eq!(knot_multiplicity[2].multiplicity(), 1);
    /// assert_eq!(knot_multiplicity[3].multiplicity(), 3);
    /// ```
    pub fn multiplicity(&self) -> Vec<KnotMultiplicity<T>> {
        let mut mult = vec![];

        let mut current = KnotMultiplicity::new(self.0[0], 0);
        self.0.iter().for_each(|knot| {
            if (*knot - *current.knot()).abs() > T::default_epsilon() {
                mult.push(current.clone());
                current = KnotMultiplicity::new(*knot, 0);
            }
            current.increment_multiplicity();
        });
        mult.push(current);

        mult
    }

    /// Number of times the given knot value occurs in the vector
    pub fn multiplicity_at(&self, u: T) -> usize {
        self.0
            .iter()
            .filter(|k| (**k - u).abs() <= T::default_epsilon())
            .count()
    }

    /// Check if the knot vector is clamped
    /// `clamped` means the first and last knots have a multiplicity greater than the degree
    pub fn is_clamped(&self, degree: usize) -> bool {
        let multiplicity = self.multiplicity();
        let start = multiplicity.first();
        let end = multiplicity.last();
        match (start, end) {
            (Some(start), Some(end)) => {
                start.multiplicity() > degree && end.multiplicity() > degree
            }
            _ => false,
        }
    }

    /// Find the knot span index by binary search
    /// At the end of the domain the span resolves to `n`,
    /// the index of the last control point.
    ///
    /// # Example
    /// ```
    /// use nurbsfit::prelude::KnotVector;
    /// let knots = KnotVector::new(vec![0., 0., 0., 0.25, 0.5, 0.75, 1., 1., 1.]);
    /// assert_eq!(knots.find_knot_span_index(5, 2, 0.6), 4);
    /// assert_eq!(knots.find_knot_span_index(5, 2, 0.), 2);
    /// assert_eq!(knots.find_knot_span_index(5, 2, 1.), 5);
    /// ```
    pub fn find_knot_span_index(&self, n: usize, degree: usize, u: T) -> usize {
        if u > self[n + 1] - T::default_epsilon() {
            return n;
        }

        if u < self[degree] + T::default_epsilon() {
            return degree;
        }

        // binary search
        let mut low = degree;
        let mut high = n + 1;
        let mut mid = ((low + high) as f64 / 2.).floor() as usize;
        while u < self[mid] || self[mid + 1] <= u {
            if u < self[mid] {
                high = mid;
            } else {
                low = mid;
            }
            let next = ((low + high) as f64 / 2.).floor() as usize;
            if mid == next {
                break;
            }
            mid = next;
        }

        mid
    }

    /// Compute the non-vanishing basis functions at `u`
    pub fn basis_functions(&self, knot_span_index: usize, u: T, degree: usize) -> Vec<T> {
        let mut basis_functions = vec![T::zero(); degree + 1];
        let mut left = vec![T::zero(); degree + 1];
        let mut right = vec![T::zero(); degree + 1];

        basis_functions[0] = T::one();

        for j in 1..=degree {
            left[j] = u - self[knot_span_index + 1 - j];
            right[j] = self[knot_span_index + j] - u;
            let mut saved = T::zero();

            for r in 0..j {
                let temp = basis_functions[r] / (right[r + 1] + left[j - r]);
                basis_functions[r] = saved + right[r + 1] * temp;
                saved = left[j - r] * temp;
            }

            basis_functions[j] = saved;
        }

        basis_functions
    }

    /// Compute the non-vanishing basis functions and their derivatives up to `order`.
    /// Returns a 2d array of size (order + 1, degree + 1) whose kth row holds the
    /// kth derivatives, the first row being the basis function values themselves.
    pub fn derivative_basis_functions(
        &self,
        knot_index: usize,
        u: T,
        degree: usize,
        order: usize,
    ) -> Result<Vec<Vec<T>>, Error> {
        if order > degree {
            return Err(Error::MismatchedDerivativeOrder { order, degree });
        }

        let mut ndu = vec![vec![T::zero(); degree + 1]; degree + 1];
        let mut left = vec![T::zero(); degree + 1];
        let mut right = vec![T::zero(); degree + 1];

        ndu[0][0] = T::one();

        for j in 1..=degree {
            left[j] = u - self[knot_index + 1 - j];
            right[j] = self[knot_index + j] - u;

            let mut saved = T::zero();
            for r in 0..j {
                // lower triangle
                ndu[j][r] = right[r + 1] + left[j - r];
                let temp = ndu[r][j - 1] / ndu[j][r];

                // upper triangle
                ndu[r][j] = saved + right[r + 1] * temp;
                saved = left[j - r] * temp;
            }
            ndu[j][j] = saved;
        }

        let mut ders = vec![vec![T::zero(); degree + 1]; order + 1];
        let mut a = vec![vec![T::zero(); degree + 1]; 2];

        // load the basis functions
        for j in 0..=degree {
            ders[0][j] = ndu[j][degree];
        }

        let idegree = degree as isize;
        let n = order as isize;

        // compute the derivatives
        for r in 0..=idegree {
            // alternate rows in array a
            let mut s1 = 0;
            let mut s2 = 1;
            a[0][0] = T::one();

            // loop to compute the kth derivative
            for k in 1..=n {
                let mut d = T::zero();
                let rk = r - k;
                let pk = idegree - k;

                if r >= k {
                    a[s2][0] = a[s1][0] / ndu[(pk + 1) as usize][rk as usize];
                    d = a[s2][0] * ndu[rk as usize][pk as usize];
                }

                let j1 = if rk >= -1 { 1 } else { -rk };
                let j2 = if r - 1 <= pk { k - 1 } else { idegree - r };

                for j in j1..=j2 {
                    a[s2][j as usize] = (a[s1][j as usize] - a[s1][j as usize - 1])
                        / ndu[(pk + 1) as usize][(rk + j) as usize];
                    d += a[s2][j as usize] * ndu[(rk + j) as usize][pk as usize];
                }

                let uk = k as usize;
                let ur = r as usize;
                if r <= pk {
                    a[s2][uk] = -a[s1][(k - 1) as usize] / ndu[(pk + 1) as usize][ur];
                    d += a[s2][uk] * ndu[ur][pk as usize];
                }

                ders[uk][ur] = d;

                // switch rows
                std::mem::swap(&mut s1, &mut s2);
            }
        }

        // rescale by the falling factorial degree! / (degree - k)!
        let mut acc = idegree;
        for k in 1..=n {
            for j in 0..=idegree {
                ders[k as usize][j as usize] *= T::from_isize(acc).unwrap();
            }
            acc *= idegree - k;
        }
        Ok(ders)
    }

    /// Cast the knot vector to another floating point type
    pub fn cast<F: FloatingPoint + SupersetOf<T>>(&self) -> KnotVector<F> {
        KnotVector::new(self.0.iter().map(|v| convert(*v)).collect())
    }
}

impl<T> Index<usize> for KnotVector<T> {
    type Output = T;
    fn index(&self, index: usize) -> &Self::Output {
        &self.0[index]
    }
}

impl<T> FromIterator<T> for KnotVector<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl<T: FloatingPoint> Invertible for KnotVector<T> {
    /// Reverses the knot vector, preserving the domain
    /// # Example
    /// ```
    /// use nurbsfit::prelude::*;
    /// let mut knot = KnotVector::new(vec![0., 0., 0., 0.25, 0.5, 0.625, 0.875, 1., 1.]);
    /// knot.invert();
    ///
    /// let dst = [0., 0., 0.125, 0.375, 0.5, 0.75, 1., 1., 1.];
    /// knot.iter().enumerate().for_each(|(i, v)| {
    ///     assert_eq!(*v, dst[i]);
    /// });
    /// ```
    fn invert(&mut self) {
        let min = self.0.first().unwrap();

        let mut next = vec![*min];
        let len = self.len();
        for i in 1..len {
            next.push(next[i - 1] + (self[len - i] - self[len - i - 1]));
        }

        self.0 = next;
    }
}

#[cfg(test)]
mod tests {
    use super::KnotVector;
    use crate::error::Error;

    #[test]
    fn test_uniform_is_clamped_and_sorted() {
        for degree in 1..=4 {
            for count in (degree + 1)..=(degree + 6) {
                let knots = KnotVector::<f64>::uniform(count, degree);
                assert_eq!(knots.len(), count + degree + 1);
                assert!(knots.as_slice().windows(2).all(|w| w[0] <= w[1]));
                assert!(knots.is_clamped(degree));
                assert_eq!(knots.domain(degree), (0., 1.));
            }
        }
    }

    #[test]
    #[should_panic(expected = "point_count must exceed the degree")]
    fn test_uniform_rejects_too_few_points() {
        let _ = KnotVector::<f64>::uniform(3, 3);
    }

    #[test]
    #[should_panic(expected = "needs at least")]
    fn test_from_params_rejects_short_params() {
        let _ = KnotVector::<f64>::from_params(3, &[0., 1.]);
    }

    #[test]
    fn test_from_params_averaging() {
        // interior knots are averages of degree consecutive parameters
        let params = [0., 0.25, 0.5, 0.75, 1.];
        let knots = KnotVector::<f64>::from_params(2, &params);
        assert_eq!(
            knots.to_vec(),
            vec![0., 0., 0., 0.375, 0.625, 1., 1., 1.]
        );
    }

    #[test]
    fn test_validation() {
        let err = KnotVector::try_validated(vec![0., 0., 1., 1.], 3, 2).unwrap_err();
        assert!(matches!(err, Error::InvalidKnotVector(_)));

        let err =
            KnotVector::try_validated(vec![0., 0., 0., 0.5, 0.4, 1., 1., 1.], 5, 2).unwrap_err();
        assert!(matches!(err, Error::InvalidKnotVector(_)));

        assert!(KnotVector::try_validated(vec![0., 0., 0., 0.4, 0.5, 1., 1., 1.], 5, 2).is_ok());
    }

    #[test]
    fn test_normalized() {
        let knots = KnotVector::new(vec![1., 1., 2., 3., 5., 5.]);
        let normalized = knots.normalized().unwrap();
        assert_eq!(normalized.to_vec(), vec![0., 0., 0.25, 0.5, 1., 1.]);

        let degenerate = KnotVector::new(vec![2., 2., 2.]);
        assert!(degenerate.normalized().is_err());
    }

    #[test]
    fn test_find_knot_span_boundaries() {
        // degree 3, 5 control points
        let knots = KnotVector::new(vec![0., 0., 0., 0., 0.5, 1., 1., 1., 1.]);
        assert_eq!(knots.find_knot_span_index(4, 3, 0.), 3);
        assert_eq!(knots.find_knot_span_index(4, 3, 0.25), 3);
        assert_eq!(knots.find_knot_span_index(4, 3, 0.5), 4);
        assert_eq!(knots.find_knot_span_index(4, 3, 0.75), 4);
        assert_eq!(knots.find_knot_span_index(4, 3, 1.), 4);
    }

    #[test]
    fn test_basis_partition_of_unity() {
        for degree in 1..=3 {
            let knots = KnotVector::<f64>::uniform(degree + 4, degree);
            let n = degree + 3;
            for i in 0..=20 {
                let u = i as f64 / 20.;
                let span = knots.find_knot_span_index(n, degree, u);
                let basis = knots.basis_functions(span, u, degree);
                let sum: f64 = basis.iter().sum();
                assert!((sum - 1.).abs() < 1e-10, "sum {} at u={}", sum, u);
                assert!(basis.iter().all(|b| *b >= -1e-10));
            }
        }
    }

    #[test]
    fn test_derivative_basis_zeroth_row_matches_basis() {
        let degree = 3;
        let knots = KnotVector::<f64>::uniform(7, degree);
        let n = 6;
        for i in 0..=10 {
            let u = i as f64 / 10.;
            let span = knots.find_knot_span_index(n, degree, u);
            let basis = knots.basis_functions(span, u, degree);
            let ders = knots
                .derivative_basis_functions(span, u, degree, 2)
                .unwrap();
            for (b, d) in basis.iter().zip(ders[0].iter()) {
                assert!((b - d).abs() < 1e-12);
            }
        }
    }

    #[test]
    fn test_derivative_order_exceeds_degree() {
        let degree = 2;
        let knots = KnotVector::<f64>::uniform(4, degree);
        let span = knots.find_knot_span_index(3, degree, 0.5);
        let err = knots
            .derivative_basis_functions(span, 0.5, degree, 3)
            .unwrap_err();
        assert_eq!(
            err,
            Error::MismatchedDerivativeOrder {
                order: 3,
                degree: 2
            }
        );
    }

    #[test]
    fn test_multiplicity_at() {
        let knots = KnotVector::new(vec![0., 0., 0., 0.5, 0.5, 1., 1., 1.]);
        assert_eq!(knots.multiplicity_at(0.), 3);
        assert_eq!(knots.multiplicity_at(0.5), 2);
        assert_eq!(knots.multiplicity_at(0.25), 0);
    }
}
