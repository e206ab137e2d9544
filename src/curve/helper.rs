use nalgebra::{Vector3, Vector4};

use crate::knot::KnotVector;
use crate::misc::{Binomial, FloatingPoint};

/// Convert homogeneous curve derivatives into Euclidean ones
/// with the quotient-rule recursion
/// C^(k) = (A^(k) - sum_{i=1..k} C(k,i) * w^(i) * C^(k-i)) / w
pub(crate) fn rational_derivatives<T: FloatingPoint>(
    ders: &[Vector4<T>],
    order: usize,
) -> Vec<Vector3<T>> {
    let a_ders: Vec<Vector3<T>> = ders.iter().map(|d| d.xyz()).collect();
    let w_ders: Vec<T> = ders.iter().map(|d| d.w).collect();

    let mut ck: Vec<Vector3<T>> = vec![];
    let mut binom = Binomial::<T>::new();
    for k in 0..=order {
        let mut v = a_ders[k];

        for i in 1..=k {
            let coef = binom.get(k, i) * w_ders[i];
            v -= ck[k - i] * coef;
        }

        ck.push(v / w_ders[0]);
    }
    ck
}

/// Insert a sorted set of knots into a clamped knot vector,
/// blending the homogeneous control points so the curve geometry is unchanged.
/// Returns the refined control points and the refined knot vector.
pub(crate) fn refine_knot_vector<T: FloatingPoint>(
    degree: usize,
    knots: &KnotVector<T>,
    control_points: &[Vector4<T>],
    knots_to_insert: &[T],
) -> (Vec<Vector4<T>>, KnotVector<T>) {
    let n = control_points.len() - 1;
    let m = n + degree + 1;
    let r = knots_to_insert.len() - 1;
    let a = knots.find_knot_span_index(n, degree, knots_to_insert[0]);
    let b = knots.find_knot_span_index(n, degree, knots_to_insert[r]) + 1;

    let mut control_points_post = vec![Vector4::zeros(); n + r + 2];
    let mut knots_post = vec![T::zero(); m + r + 2];

    control_points_post[..((a - degree) + 1)]
        .copy_from_slice(&control_points[..((a - degree) + 1)]);
    for i in (b - 1)..=n {
        control_points_post[i + r + 1] = control_points[i];
    }

    for i in 0..=a {
        knots_post[i] = knots[i];
    }
    for i in (b + degree)..=m {
        knots_post[i + r + 1] = knots[i];
    }

    let mut i = b + degree - 1;
    let mut k = b + degree + r;

    for j in (0..=r).rev() {
        while knots_to_insert[j] <= knots[i] && i > a {
            control_points_post[k - degree - 1] = control_points[i - degree - 1];
            knots_post[k] = knots[i];
            k -= 1;
            i -= 1;
        }
        control_points_post[k - degree - 1] = control_points_post[k - degree];
        for l in 1..=degree {
            let ind = k - degree + l;
            let alpha = knots_post[k + l] - knots_to_insert[j];
            if alpha.abs() < T::default_epsilon() {
                control_points_post[ind - 1] = control_points_post[ind];
            } else {
                let denom = knots_post[k + l] - knots[i - degree + l];
                let weight = if denom != T::zero() {
                    alpha / denom
                } else {
                    T::zero()
                };
                control_points_post[ind - 1] = control_points_post[ind - 1]
                    .lerp(&control_points_post[ind], T::one() - weight);
            }
        }
        knots_post[k] = knots_to_insert[j];
        k -= 1;
    }

    (control_points_post, KnotVector::new(knots_post))
}
