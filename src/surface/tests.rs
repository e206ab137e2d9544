use approx::assert_relative_eq;
use nalgebra::{Point3, Vector3};

use crate::prelude::*;

/// Degrees (3, 2) surface over a 4x3 grid, shared by most tests
fn sample_surface() -> NurbsSurface<f64> {
    NurbsSurface::try_uniform(
        3,
        2,
        vec![
            vec![
                Point3::new(0., 0., 0.),
                Point3::new(0., 4., 0.),
                Point3::new(0., 8., -3.),
            ],
            vec![
                Point3::new(2., 0., 6.),
                Point3::new(2., 4., 0.),
                Point3::new(2., 8., 0.),
            ],
            vec![
                Point3::new(4., 0., 0.),
                Point3::new(4., 4., 0.),
                Point3::new(4., 8., 3.),
            ],
            vec![
                Point3::new(6., 0., 0.),
                Point3::new(6., 4., -3.),
                Point3::new(6., 8., 0.),
            ],
        ],
    )
    .unwrap()
}

#[test]
fn test_points_at() {
    let surface = sample_surface();
    let points = surface.points_at(&[(0.1, 0.1), (0.1, 0.5), (0.5, 0.1), (0.5, 0.5)]);
    assert_relative_eq!(points[0], Point3::new(0.6, 0.8, 1.159), epsilon = 1e-3);
    assert_relative_eq!(points[1], Point3::new(0.6, 4., -0.164), epsilon = 1e-3);
    assert_relative_eq!(points[2], Point3::new(3., 0.8, 1.763), epsilon = 1e-3);
    assert_relative_eq!(points[3], Point3::new(3., 4., 0.562), epsilon = 1e-3);
}

#[test]
fn test_corner_points() {
    let surface = sample_surface();
    // a clamped surface interpolates the grid corners
    assert_relative_eq!(surface.point_at(0., 0.), Point3::new(0., 0., 0.), epsilon = 1e-10);
    assert_relative_eq!(surface.point_at(0., 1.), Point3::new(0., 8., -3.), epsilon = 1e-10);
    assert_relative_eq!(surface.point_at(1., 0.), Point3::new(6., 0., 0.), epsilon = 1e-10);
    assert_relative_eq!(surface.point_at(1., 1.), Point3::new(6., 8., 0.), epsilon = 1e-10);
}

#[test]
fn test_normals_at() {
    let surface = sample_surface();
    let normals = surface
        .normals_at(&[(0.1, 0.1), (0.1, 0.5), (0.5, 0.1), (0.5, 0.5)])
        .unwrap();
    assert_relative_eq!(normals[0], Vector3::new(-0.822, 0.203, 0.533), epsilon = 1e-3);
    assert_relative_eq!(normals[1], Vector3::new(-0.605, 0.324, 0.727), epsilon = 1e-3);
    assert_relative_eq!(normals[2], Vector3::new(0.503, 0.424, 0.753), epsilon = 1e-3);
    assert_relative_eq!(normals[3], Vector3::new(0.181, 0.181, 0.967), epsilon = 1e-3);
}

#[test]
fn test_zeroth_derivative_matches_point() {
    let surface = sample_surface();
    for i in 0..=5 {
        for j in 0..=5 {
            let u = i as f64 / 5.;
            let v = j as f64 / 5.;
            let ders = surface.derivatives_at(u, v, 0).unwrap();
            assert_relative_eq!(
                Point3::from(ders[0][0]),
                surface.point_at(u, v),
                epsilon = 1e-12
            );
        }
    }
}

#[test]
fn test_derivatives_are_triangular() {
    let surface = sample_surface();
    let ders = surface.derivatives_at(0.3, 0.7, 2).unwrap();
    assert_eq!(ders.len(), 3);
    assert_eq!(ders[0].len(), 3);
    assert_eq!(ders[1].len(), 2);
    assert_eq!(ders[2].len(), 1);
}

#[test]
fn test_curvature_at() {
    let surface = sample_surface();
    let curvature = surface.curvature_at(0.5, 0.5).unwrap();

    let (k1, k2) = curvature.kappa();
    assert_relative_eq!(k1, -0.41808, epsilon = 1e-4);
    assert_relative_eq!(k2, 0.16516, epsilon = 1e-4);
    assert!(k1 <= k2);

    assert_relative_eq!(curvature.gauss(), -0.06905, epsilon = 1e-4);
    assert_relative_eq!(curvature.mean(), -0.12646, epsilon = 1e-4);
    assert_relative_eq!(
        *curvature.normal(),
        Vector3::new(0.181, 0.181, 0.967),
        epsilon = 1e-3
    );

    // principal directions are unit length and compared up to sign
    let (d1, d2) = curvature.directions();
    assert_relative_eq!(d1.norm(), 1., epsilon = 1e-10);
    assert_relative_eq!(d2.norm(), 1., epsilon = 1e-10);
    let e1 = Vector3::new(-0.935, 0.336, 0.112);
    let e2 = Vector3::new(-0.304, -0.924, 0.230);
    assert_relative_eq!(d1.dot(&e1).abs(), 1., epsilon = 1e-3);
    assert_relative_eq!(d2.dot(&e2).abs(), 1., epsilon = 1e-3);
}

#[test]
fn test_curvature_on_ruled_surface() {
    // parabolic arch extruded along v, degree 1 in the v direction
    let surface = NurbsSurface::try_uniform(
        2,
        1,
        vec![
            vec![Point3::new(0., 0., 0.), Point3::new(0., 1., 0.)],
            vec![Point3::new(1., 0., 1.), Point3::new(1., 1., 1.)],
            vec![Point3::new(2., 0., 0.), Point3::new(2., 1., 0.)],
        ],
    )
    .unwrap();

    let curvature = surface.curvature_at(0.5, 0.5).unwrap();
    assert_relative_eq!(*curvature.normal(), Vector3::new(0., 0., 1.), epsilon = 1e-10);

    // at the apex the section has D1 = (2,0,0) and D2 = (0,0,-4),
    // so the shape operator is diag(-1, 0)
    let (k1, k2) = curvature.kappa();
    assert_relative_eq!(k1, -1., epsilon = 1e-10);
    assert_relative_eq!(k2, 0., epsilon = 1e-10);
    assert_relative_eq!(curvature.gauss(), 0., epsilon = 1e-10);
    assert_relative_eq!(curvature.mean(), -0.5, epsilon = 1e-10);

    let (d1, d2) = curvature.directions();
    assert_relative_eq!(d1.dot(&Vector3::<f64>::x()).abs(), 1., epsilon = 1e-10);
    assert_relative_eq!(d2.dot(&Vector3::<f64>::y()).abs(), 1., epsilon = 1e-10);

    // the whole patch stays evaluable despite the degree 1 direction
    for i in 0..=4 {
        for j in 0..=4 {
            let u = i as f64 / 4.;
            let v = j as f64 / 4.;
            let c = surface.curvature_at(u, v).unwrap();
            assert_relative_eq!(c.gauss(), 0., epsilon = 1e-9);
        }
    }
}

#[test]
fn test_rational_cylinder_curvature() {
    // quarter cylinder of radius 1: a rational quadratic arc extruded along u
    let w = 2_f64.sqrt() / 2.;
    let surface = NurbsSurface::try_rational(
        1,
        2,
        vec![0., 0., 1., 1.],
        vec![0., 0., 0., 1., 1., 1.],
        vec![
            vec![
                Point3::new(1., 0., 0.),
                Point3::new(1., 1., 0.),
                Point3::new(0., 1., 0.),
            ],
            vec![
                Point3::new(1., 0., 2.),
                Point3::new(1., 1., 2.),
                Point3::new(0., 1., 2.),
            ],
        ],
        vec![vec![1., w, 1.], vec![1., w, 1.]],
    )
    .unwrap();

    for i in 0..=4 {
        for j in 0..=4 {
            let u = i as f64 / 4.;
            let v = j as f64 / 4.;

            let p = surface.point_at(u, v);
            assert_relative_eq!(p.x * p.x + p.y * p.y, 1., epsilon = 1e-10);

            // the normal is radial everywhere on a cylinder
            let n = surface.normal_at(u, v).unwrap();
            assert_relative_eq!(n.z, 0., epsilon = 1e-10);
            assert_relative_eq!((n.x * p.x + n.y * p.y).abs(), 1., epsilon = 1e-10);

            let c = surface.curvature_at(u, v).unwrap();
            let (k1, k2) = c.kappa();
            assert_relative_eq!(k1, 0., epsilon = 1e-9);
            assert_relative_eq!(k2, 1., epsilon = 1e-9);
            assert_relative_eq!(c.gauss(), 0., epsilon = 1e-9);
            assert_relative_eq!(c.mean(), 0.5, epsilon = 1e-9);

            // the flat direction runs along the axis, the curved one around it
            let (d1, d2) = c.directions();
            assert_relative_eq!(d1.z.abs(), 1., epsilon = 1e-9);
            assert_relative_eq!(d2.z, 0., epsilon = 1e-9);
        }
    }
}

#[test]
fn test_unit_weights_match_non_rational() {
    let surface = sample_surface();
    let rational = surface.with_weights(Some(vec![vec![1.; 3]; 4])).unwrap();
    assert!(rational.is_rational());
    for i in 0..=5 {
        for j in 0..=5 {
            let u = i as f64 / 5.;
            let v = j as f64 / 5.;
            assert_relative_eq!(
                surface.point_at(u, v),
                rational.point_at(u, v),
                epsilon = 1e-10
            );
            assert_relative_eq!(
                surface.normal_at(u, v).unwrap(),
                rational.normal_at(u, v).unwrap(),
                epsilon = 1e-9
            );
        }
    }
}

#[test]
fn test_refine_knot_preserves_geometry() {
    let surface = sample_surface();
    for direction in [UVDirection::U, UVDirection::V] {
        let refined = surface
            .try_refine_knot(vec![0.25, 0.5, 0.75], direction)
            .unwrap();
        for i in 0..=8 {
            for j in 0..=8 {
                let u = i as f64 / 8.;
                let v = j as f64 / 8.;
                assert_relative_eq!(
                    surface.point_at(u, v),
                    refined.point_at(u, v),
                    epsilon = 1e-9
                );
            }
        }
    }

    let refined_u = surface
        .try_refine_knot(vec![0.5], UVDirection::U)
        .unwrap();
    assert_eq!(refined_u.control_points().len(), 5);
    assert_eq!(refined_u.control_points()[0].len(), 3);
    assert_eq!(refined_u.u_knots().len(), surface.u_knots().len() + 1);
    assert_eq!(refined_u.v_knots(), surface.v_knots());
}

#[test]
fn test_isocurve_interior() {
    let surface = sample_surface();

    let iso_u = surface.try_isocurve(0.4, UVDirection::U).unwrap();
    assert_eq!(iso_u.degree(), surface.v_degree());
    for i in 0..=10 {
        let v = i as f64 / 10.;
        assert_relative_eq!(iso_u.point_at(v), surface.point_at(0.4, v), epsilon = 1e-9);
    }

    let iso_v = surface.try_isocurve(0.7, UVDirection::V).unwrap();
    assert_eq!(iso_v.degree(), surface.u_degree());
    for i in 0..=10 {
        let u = i as f64 / 10.;
        assert_relative_eq!(iso_v.point_at(u), surface.point_at(u, 0.7), epsilon = 1e-9);
    }
}

#[test]
fn test_isocurve_boundaries() {
    let surface = sample_surface();

    // boundary isocurves come straight from the boundary control rows
    for t in [0., 1.] {
        let iso_u = surface.try_isocurve(t, UVDirection::U).unwrap();
        for i in 0..=10 {
            let v = i as f64 / 10.;
            assert_relative_eq!(iso_u.point_at(v), surface.point_at(t, v), epsilon = 1e-10);
        }

        let iso_v = surface.try_isocurve(t, UVDirection::V).unwrap();
        for i in 0..=10 {
            let u = i as f64 / 10.;
            assert_relative_eq!(iso_v.point_at(u), surface.point_at(u, t), epsilon = 1e-10);
        }
    }

    let row0: Vec<_> = surface.control_points()[0].clone();
    let iso = surface.try_isocurve(0., UVDirection::U).unwrap();
    assert_eq!(iso.control_points(), &row0);
}

#[test]
fn test_isocurve_rational() {
    let surface = sample_surface();
    let mut weights = vec![vec![1.; 3]; 4];
    weights[1][1] = 2.5;
    weights[2][0] = 0.5;
    let rational = surface.with_weights(Some(weights)).unwrap();

    let iso = rational.try_isocurve(0.3, UVDirection::U).unwrap();
    assert!(iso.is_rational());
    for i in 0..=10 {
        let v = i as f64 / 10.;
        assert_relative_eq!(iso.point_at(v), rational.point_at(0.3, v), epsilon = 1e-9);
    }
}

#[test]
fn test_transposed_swaps_parameters() {
    let surface = sample_surface();
    let transposed = surface.transposed();
    assert_eq!(transposed.u_degree(), surface.v_degree());
    assert_eq!(transposed.v_degree(), surface.u_degree());
    for i in 0..=5 {
        for j in 0..=5 {
            let u = i as f64 / 5.;
            let v = j as f64 / 5.;
            assert_relative_eq!(
                surface.point_at(u, v),
                transposed.point_at(v, u),
                epsilon = 1e-12
            );
        }
    }
}

#[test]
fn test_validation_errors() {
    // not enough rows for the u degree
    let err = NurbsSurface::try_uniform(
        3,
        1,
        vec![
            vec![Point3::<f64>::origin(), Point3::origin()],
            vec![Point3::origin(), Point3::origin()],
        ],
    )
    .unwrap_err();
    assert!(matches!(
        err.downcast_ref::<Error>(),
        Some(Error::InvalidControlPoints(_))
    ));

    // ragged grid
    let err = NurbsSurface::try_new(
        1,
        1,
        vec![0., 0., 1., 1.],
        vec![0., 0., 1., 1.],
        vec![
            vec![Point3::<f64>::origin(), Point3::origin()],
            vec![Point3::origin()],
        ],
    )
    .unwrap_err();
    assert!(matches!(
        err.downcast_ref::<Error>(),
        Some(Error::InvalidControlPoints(_))
    ));

    // weight grid shape mismatch
    let surface = sample_surface();
    let err = surface.with_weights(Some(vec![vec![1.; 3]; 3])).unwrap_err();
    assert!(matches!(
        err.downcast_ref::<Error>(),
        Some(Error::InvalidWeights(_))
    ));
}

#[test]
fn test_derivative_order_exceeds_degree() {
    let surface = sample_surface();
    // v direction has degree 2, order 3 must be rejected
    let err = surface.derivatives_at(0.5, 0.5, 3).unwrap_err();
    assert_eq!(
        err.downcast_ref::<Error>(),
        Some(&Error::MismatchedDerivativeOrder {
            order: 3,
            degree: 2
        })
    );
}
