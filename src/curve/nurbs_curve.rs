use anyhow::Context;
use nalgebra::{convert, Point3, Vector3, Vector4};
use simba::scalar::SupersetOf;

use crate::curve::helper::{rational_derivatives, refine_knot_vector};
use crate::curve::KnotStyle;
use crate::error::Error;
use crate::interpolation::try_interpolate_control_points;
use crate::knot::KnotVector;
use crate::misc::{CurveCurvature, FloatingPoint, FrenetFrame, Invertible};

/// NURBS curve representation
/// Control points are stored in Euclidean space with an optional weight
/// vector, `None` meaning a non-rational (plain B-spline) curve.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct NurbsCurve<T: FloatingPoint> {
    degree: usize,
    control_points: Vec<Point3<T>>,
    knots: KnotVector<T>,
    weights: Option<Vec<T>>,
}

impl<T: FloatingPoint> NurbsCurve<T> {
    /// Create a non-rational curve with an explicit knot vector.
    /// The knot vector is normalized to the [0, 1] domain.
    /// # Failures
    /// - if the number of control points is less than degree + 1
    /// - if the number of knots is not equal to the number of control points + degree + 1
    /// - if the knot vector is not sorted or has a degenerate domain
    ///
    /// # Example
    /// ```
    /// use nurbsfit::prelude::*;
    /// use nalgebra::Point3;
    ///
    /// let control_points: Vec<Point3<f64>> = vec![
    ///     Point3::new(50., 50., 0.),
    ///     Point3::new(30., 370., 0.),
    ///     Point3::new(180., 350., 0.),
    ///     Point3::new(150., 100., 0.),
    ///     Point3::new(250., 50., 0.),
    /// ];
    /// let degree = 3;
    /// let knots = vec![0., 0., 0., 0., 0.5, 1., 1., 1., 1.];
    /// let nurbs = NurbsCurve::try_new(degree, control_points, knots);
    /// assert!(nurbs.is_ok());
    /// ```
    pub fn try_new(
        degree: usize,
        control_points: Vec<Point3<T>>,
        knots: Vec<T>,
    ) -> anyhow::Result<Self> {
        Self::try_create(degree, control_points, knots, None)
    }

    /// Create a rational curve with an explicit knot vector and weights.
    pub fn try_rational(
        degree: usize,
        control_points: Vec<Point3<T>>,
        knots: Vec<T>,
        weights: Vec<T>,
    ) -> anyhow::Result<Self> {
        Self::try_create(degree, control_points, knots, Some(weights))
    }

    /// Create a non-rational curve with a clamped uniform knot vector on [0, 1].
    pub fn try_uniform(degree: usize, control_points: Vec<Point3<T>>) -> anyhow::Result<Self> {
        if control_points.len() < degree + 1 {
            return Err(Error::InvalidControlPoints(format!(
                "got {} control points, degree {} needs at least {}",
                control_points.len(),
                degree,
                degree + 1
            ))
            .into());
        }
        let knots = KnotVector::uniform(control_points.len(), degree).to_vec();
        Self::try_create(degree, control_points, knots, None)
    }

    fn try_create(
        degree: usize,
        control_points: Vec<Point3<T>>,
        knots: Vec<T>,
        weights: Option<Vec<T>>,
    ) -> anyhow::Result<Self> {
        if control_points.len() < degree + 1 {
            return Err(Error::InvalidControlPoints(format!(
                "got {} control points, degree {} needs at least {}",
                control_points.len(),
                degree,
                degree + 1
            ))
            .into());
        }

        let knots = KnotVector::try_validated(knots, control_points.len(), degree)?.normalized()?;

        if let Some(w) = &weights {
            if w.len() != control_points.len() {
                return Err(Error::InvalidWeights(format!(
                    "got {} weights for {} control points",
                    w.len(),
                    control_points.len()
                ))
                .into());
            }
            if w.iter().any(|wi| *wi <= T::zero()) {
                return Err(
                    Error::InvalidWeights("weights must be positive".to_string()).into(),
                );
            }
        }

        Ok(Self {
            degree,
            control_points,
            knots,
            weights,
        })
    }

    /// Return a copy of the curve with new control points, re-validated.
    pub fn with_control_points(&self, control_points: Vec<Point3<T>>) -> anyhow::Result<Self> {
        Self::try_create(
            self.degree,
            control_points,
            self.knots.to_vec(),
            self.weights.clone(),
        )
    }

    /// Return a copy of the curve with a new knot vector, re-validated.
    pub fn with_knots(&self, knots: Vec<T>) -> anyhow::Result<Self> {
        Self::try_create(
            self.degree,
            self.control_points.clone(),
            knots,
            self.weights.clone(),
        )
    }

    /// Return a copy of the curve with new weights, re-validated.
    /// `None` makes the curve non-rational.
    pub fn with_weights(&self, weights: Option<Vec<T>>) -> anyhow::Result<Self> {
        Self::try_create(
            self.degree,
            self.control_points.clone(),
            self.knots.to_vec(),
            weights,
        )
    }

    /// Try to create an interpolated curve passing through the given points.
    /// # Example
    /// ```
    /// use nurbsfit::prelude::*;
    /// use nalgebra::Point3;
    /// use approx::assert_relative_eq;
    ///
    /// let points: Vec<Point3<f64>> = vec![
    ///     Point3::new(-1.0, -1.0, 0.),
    ///     Point3::new(1.0, -1.0, 0.),
    ///     Point3::new(1.0, 1.0, 0.),
    ///     Point3::new(-1.0, 1.0, 0.),
    ///     Point3::new(-1.0, 2.0, 0.),
    ///     Point3::new(1.0, 2.5, 0.),
    /// ];
    /// let curve = NurbsCurve::try_interpolate(&points, 3, KnotStyle::Chord).unwrap();
    ///
    /// let (start, end) = curve.knots_domain();
    /// assert_relative_eq!(curve.point_at(start), points[0], epsilon = 1e-10);
    /// assert_relative_eq!(curve.point_at(end), points[points.len() - 1], epsilon = 1e-10);
    /// ```
    pub fn try_interpolate(
        points: &[Point3<T>],
        degree: usize,
        knot_style: KnotStyle,
    ) -> anyhow::Result<Self> {
        let (control_points, knots) =
            try_interpolate_control_points(points, degree, knot_style, None)?;
        Self::try_new(degree, control_points, knots.to_vec())
    }

    /// Try to create an interpolated curve with prescribed end derivatives.
    /// The curve passes through the points and matches the first derivative
    /// at both ends, which adds two control points to the solution.
    pub fn try_interpolate_with_tangents(
        points: &[Point3<T>],
        degree: usize,
        knot_style: KnotStyle,
        start_derivative: Vector3<T>,
        end_derivative: Vector3<T>,
    ) -> anyhow::Result<Self> {
        let (control_points, knots) = try_interpolate_control_points(
            points,
            degree,
            knot_style,
            Some((start_derivative, end_derivative)),
        )?;
        Self::try_new(degree, control_points, knots.to_vec())
    }

    /// Evaluate the curve at a given parameter to get a point
    pub fn point_at(&self, t: T) -> Point3<T> {
        let n = self.control_points.len() - 1;
        let knot_span_index = self.knots.find_knot_span_index(n, self.degree, t);
        let basis = self.knots.basis_functions(knot_span_index, t, self.degree);

        match &self.weights {
            None => {
                let mut position = Point3::origin();
                for i in 0..=self.degree {
                    position.coords +=
                        self.control_points[knot_span_index - self.degree + i].coords * basis[i];
                }
                position
            }
            Some(_) => {
                let mut hw = Vector4::zeros();
                for i in 0..=self.degree {
                    hw += self.homogeneous_control_point(knot_span_index - self.degree + i)
                        * basis[i];
                }
                Point3::new(hw.x / hw.w, hw.y / hw.w, hw.z / hw.w)
            }
        }
    }

    /// Evaluate the curve at each of the given parameters, preserving order
    pub fn points_at(&self, params: &[T]) -> Vec<Point3<T>> {
        params.iter().map(|t| self.point_at(*t)).collect()
    }

    /// Evaluate the raw derivatives D0..=Dorder at a given parameter.
    /// D0 is the position, D1 the first derivative and so on.
    /// The vectors are not normalized.
    pub fn derivatives_at(&self, t: T, order: usize) -> anyhow::Result<Vec<Vector3<T>>> {
        let ders = self.homogeneous_derivatives(t, order)?;
        match &self.weights {
            None => Ok(ders.iter().map(|d| d.xyz()).collect()),
            Some(_) => Ok(rational_derivatives(&ders, order)),
        }
    }

    /// Evaluate derivatives at each of the given parameters, preserving order
    pub fn derivatives_at_multi(
        &self,
        params: &[T],
        order: usize,
    ) -> anyhow::Result<Vec<Vec<Vector3<T>>>> {
        params
            .iter()
            .enumerate()
            .map(|(i, t)| {
                self.derivatives_at(*t, order)
                    .with_context(|| format!("derivative evaluation failed at parameter index {}", i))
            })
            .collect()
    }

    /// Evaluate the unit tangent at a given parameter
    pub fn tangent_at(&self, t: T) -> anyhow::Result<Vector3<T>> {
        let deriv = self.derivatives_at(t, 1)?;
        let d1 = deriv[1];
        let norm = d1.norm();
        if norm <= T::default_epsilon() {
            return Err(Error::DegenerateTangent.into());
        }
        Ok(d1 / norm)
    }

    /// Evaluate unit tangents at each of the given parameters, preserving order
    pub fn tangents_at(&self, params: &[T]) -> anyhow::Result<Vec<Vector3<T>>> {
        params
            .iter()
            .enumerate()
            .map(|(i, t)| {
                self.tangent_at(*t)
                    .with_context(|| format!("tangent evaluation failed at parameter index {}", i))
            })
            .collect()
    }

    /// Position and first two derivatives, the second being identically zero
    /// for degree 1 curves.
    fn curvature_derivatives(&self, t: T) -> anyhow::Result<Vec<Vector3<T>>> {
        let order = self.degree.min(2);
        let mut ders = self.derivatives_at(t, order)?;
        while ders.len() < 3 {
            ders.push(Vector3::zeros());
        }
        Ok(ders)
    }

    /// Evaluate the Frenet frame at a given parameter
    pub fn frame_at(&self, t: T) -> anyhow::Result<FrenetFrame<T>> {
        let ders = self.curvature_derivatives(t)?;
        FrenetFrame::from_derivatives(Point3::from(ders[0]), ders[1], ders[2]).map_err(Into::into)
    }

    /// Evaluate Frenet frames at each of the given parameters, preserving order
    pub fn frames_at(&self, params: &[T]) -> anyhow::Result<Vec<FrenetFrame<T>>> {
        params
            .iter()
            .enumerate()
            .map(|(i, t)| {
                self.frame_at(*t)
                    .with_context(|| format!("frame evaluation failed at parameter index {}", i))
            })
            .collect()
    }

    /// Evaluate the curvature at a given parameter
    /// kappa = |D1 x D2| / |D1|^3
    pub fn curvature_at(&self, t: T) -> anyhow::Result<CurveCurvature<T>> {
        let ders = self.curvature_derivatives(t)?;
        let position = Point3::from(ders[0]);
        let d1 = ders[1];
        let d2 = ders[2];

        let frame = FrenetFrame::from_derivatives(position, d1, d2)?;
        let n1 = d1.norm();
        let kappa = d1.cross(&d2).norm() / (n1 * n1 * n1);
        Ok(CurveCurvature::new(frame, kappa))
    }

    /// Evaluate curvatures at each of the given parameters, preserving order
    pub fn curvatures_at(&self, params: &[T]) -> anyhow::Result<Vec<CurveCurvature<T>>> {
        params
            .iter()
            .enumerate()
            .map(|(i, t)| {
                self.curvature_at(*t)
                    .with_context(|| format!("curvature evaluation failed at parameter index {}", i))
            })
            .collect()
    }

    /// Return a refined copy of the curve with the given knots inserted.
    /// The control polygon changes but the curve geometry is preserved.
    /// Insertion parameters must be sorted and strictly inside the domain.
    pub fn try_refine_knot(&self, knots_to_insert: Vec<T>) -> anyhow::Result<Self> {
        if knots_to_insert.is_empty() {
            return Ok(self.clone());
        }
        if !self.knots.is_clamped(self.degree) {
            return Err(Error::InvalidKnotVector(
                "knot insertion requires a clamped knot vector".to_string(),
            )
            .into());
        }
        if knots_to_insert.windows(2).any(|w| w[0] > w[1]) {
            return Err(Error::InvalidKnotVector(
                "insertion knots must be sorted".to_string(),
            )
            .into());
        }
        let (start, end) = self.knots_domain();
        if knots_to_insert
            .iter()
            .any(|t| *t <= start + T::default_epsilon() || *t >= end - T::default_epsilon())
        {
            return Err(Error::InvalidKnotVector(
                "insertion knots must lie strictly inside the domain".to_string(),
            )
            .into());
        }

        #[cfg(feature = "log")]
        log::trace!("inserting {} knots", knots_to_insert.len());

        let homogeneous: Vec<Vector4<T>> = (0..self.control_points.len())
            .map(|i| self.homogeneous_control_point(i))
            .collect();
        let (refined, knots) =
            refine_knot_vector(self.degree, &self.knots, &homogeneous, &knots_to_insert);

        let (control_points, weights) = match &self.weights {
            None => (
                refined.iter().map(|h| Point3::new(h.x, h.y, h.z)).collect(),
                None,
            ),
            Some(_) => (
                refined
                    .iter()
                    .map(|h| Point3::new(h.x / h.w, h.y / h.w, h.z / h.w))
                    .collect(),
                Some(refined.iter().map(|h| h.w).collect()),
            ),
        };

        Ok(Self {
            degree: self.degree,
            control_points,
            knots,
            weights,
        })
    }

    /// The control point in homogeneous coordinates (wx, wy, wz, w)
    pub(crate) fn homogeneous_control_point(&self, i: usize) -> Vector4<T> {
        let p = &self.control_points[i];
        match &self.weights {
            Some(w) => {
                let wi = w[i];
                Vector4::new(p.x * wi, p.y * wi, p.z * wi, wi)
            }
            None => Vector4::new(p.x, p.y, p.z, T::one()),
        }
    }

    fn homogeneous_derivatives(&self, t: T, order: usize) -> anyhow::Result<Vec<Vector4<T>>> {
        let n = self.control_points.len() - 1;
        let knot_span_index = self.knots.find_knot_span_index(n, self.degree, t);
        let nders = self
            .knots
            .derivative_basis_functions(knot_span_index, t, self.degree, order)?;

        let mut derivatives = vec![Vector4::zeros(); order + 1];
        for (k, row) in nders.iter().enumerate() {
            for (j, basis) in row.iter().enumerate() {
                derivatives[k] +=
                    self.homogeneous_control_point(knot_span_index - self.degree + j) * *basis;
            }
        }
        Ok(derivatives)
    }

    pub fn degree(&self) -> usize {
        self.degree
    }

    pub fn knots(&self) -> &KnotVector<T> {
        &self.knots
    }

    pub fn knots_domain(&self) -> (T, T) {
        self.knots.domain(self.degree)
    }

    pub fn control_points(&self) -> &Vec<Point3<T>> {
        &self.control_points
    }

    pub fn weights(&self) -> Option<&Vec<T>> {
        self.weights.as_ref()
    }

    pub fn is_rational(&self) -> bool {
        self.weights.is_some()
    }

    /// Cast the curve to another floating point type
    pub fn cast<F: FloatingPoint + SupersetOf<T>>(&self) -> NurbsCurve<F> {
        NurbsCurve {
            degree: self.degree,
            control_points: self.control_points.iter().map(|p| p.cast()).collect(),
            knots: self.knots.cast(),
            weights: self
                .weights
                .as_ref()
                .map(|ws| ws.iter().map(|w| convert(*w)).collect()),
        }
    }
}

impl<T: FloatingPoint> Invertible for NurbsCurve<T> {
    /// Reverses the direction of the curve
    /// # Example
    /// ```
    /// use nurbsfit::prelude::*;
    /// use nalgebra::Point3;
    /// use approx::assert_relative_eq;
    ///
    /// let points = vec![
    ///     Point3::new(0., 0., 0.),
    ///     Point3::new(1., 2., 0.),
    ///     Point3::new(3., 2., 0.),
    ///     Point3::new(4., 0., 0.),
    /// ];
    /// let curve = NurbsCurve::try_uniform(3, points).unwrap();
    /// let reversed = curve.inverse();
    /// assert_relative_eq!(curve.point_at(0.), reversed.point_at(1.), epsilon = 1e-10);
    /// assert_relative_eq!(curve.point_at(0.25), reversed.point_at(0.75), epsilon = 1e-10);
    /// ```
    fn invert(&mut self) {
        self.control_points.reverse();
        if let Some(w) = self.weights.as_mut() {
            w.reverse();
        }
        self.knots.invert();
    }
}
