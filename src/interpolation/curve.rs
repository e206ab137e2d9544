use nalgebra::{DMatrix, Point3, Vector3};

use crate::curve::{KnotStyle, NurbsCurve};
use crate::error::Error;
use crate::knot::KnotVector;
use crate::misc::FloatingPoint;

use super::Interpolation;

impl<T: FloatingPoint> Interpolation for NurbsCurve<T> {
    type Input = Vec<Point3<T>>;
    type Output = anyhow::Result<Self>;

    fn interpolate(input: &Self::Input, degree: usize, knot_style: KnotStyle) -> Self::Output {
        NurbsCurve::try_interpolate(input, degree, knot_style)
    }
}

/// Solve the global interpolation problem: find the control points of a
/// degree `degree` B-spline curve passing through all input points.
///
/// Each point is assigned a parameter by the knot style; the knot vector is
/// either uniform or averaged over the parameters; the control points come
/// from an LU solve of the collocation matrix built from the basis functions.
///
/// When end derivatives are supplied the parameter array is extended with
/// duplicated end parameters and the second and second-to-last rows are
/// replaced by finite-difference constraints on the first and last legs of
/// the control polygon, which pins the end derivatives of the curve.
pub fn try_interpolate_control_points<T: FloatingPoint>(
    points: &[Point3<T>],
    degree: usize,
    knot_style: KnotStyle,
    end_derivatives: Option<(Vector3<T>, Vector3<T>)>,
) -> anyhow::Result<(Vec<Point3<T>>, KnotVector<T>)> {
    let n = points.len();
    if n < degree + 1 {
        return Err(Error::InvalidControlPoints(format!(
            "got {} points, interpolation with degree {} needs at least {}",
            n,
            degree,
            degree + 1
        ))
        .into());
    }

    let us = knot_style.parameterize(points)?;

    let params: Vec<T> = match &end_derivatives {
        None => us.clone(),
        Some(_) => {
            let mut extended = Vec::with_capacity(n + 2);
            extended.push(us[0]);
            extended.push(us[0]);
            extended.extend_from_slice(&us[1..n - 1]);
            extended.push(us[n - 1]);
            extended.push(us[n - 1]);
            extended
        }
    };

    let m = params.len();
    let knots = match knot_style {
        KnotStyle::Uniform => KnotVector::uniform(m, degree),
        _ => KnotVector::from_params(degree, &params),
    };

    #[cfg(feature = "log")]
    log::trace!(
        "interpolating {} points with degree {} into a {}x{} system",
        n,
        degree,
        m,
        m
    );

    // collocation matrix, each row holds the basis functions at one parameter
    let mut matrix = DMatrix::<T>::zeros(m, m);
    for (i, u) in params.iter().enumerate() {
        let knot_span_index = knots.find_knot_span_index(m - 1, degree, *u);
        let basis = knots.basis_functions(knot_span_index, *u, degree);
        let ls = knot_span_index - degree;
        for (j, b) in basis.iter().enumerate() {
            matrix[(i, ls + j)] = *b;
        }
    }

    let mut rhs = DMatrix::<T>::zeros(m, 3);
    let mut set_row = |rhs: &mut DMatrix<T>, i: usize, v: Vector3<T>| {
        rhs[(i, 0)] = v.x;
        rhs[(i, 1)] = v.y;
        rhs[(i, 2)] = v.z;
    };

    match &end_derivatives {
        None => {
            for (i, p) in points.iter().enumerate() {
                set_row(&mut rhs, i, p.coords);
            }
        }
        Some((d0, dn)) => {
            let inv_degree = T::one() / T::from_usize(degree).unwrap();
            let v0 = d0 * (knots[degree + 1] * inv_degree);
            let vn = dn * ((T::one() - knots[knots.len() - degree - 2]) * inv_degree);

            set_row(&mut rhs, 0, points[0].coords);
            set_row(&mut rhs, 1, v0);
            for i in 1..(n - 1) {
                set_row(&mut rhs, i + 1, points[i].coords);
            }
            set_row(&mut rhs, m - 2, vn);
            set_row(&mut rhs, m - 1, points[n - 1].coords);

            // replace the duplicated-parameter rows with derivative constraints
            for j in 0..m {
                matrix[(1, j)] = T::zero();
                matrix[(m - 2, j)] = T::zero();
            }
            matrix[(1, 0)] = -T::one();
            matrix[(1, 1)] = T::one();
            matrix[(m - 2, m - 2)] = -T::one();
            matrix[(m - 2, m - 1)] = T::one();
        }
    }

    let lu = matrix.lu();
    let solution = lu.solve(&rhs).ok_or(Error::SingularSystem)?;

    let control_points = (0..m)
        .map(|i| Point3::new(solution[(i, 0)], solution[(i, 1)], solution[(i, 2)]))
        .collect();

    Ok((control_points, knots))
}
