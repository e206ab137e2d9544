#![cfg(feature = "serde")]

use approx::assert_relative_eq;
use nalgebra::Point3;
use nurbsfit::prelude::*;

#[test]
fn test_curve_roundtrip() {
    let points = vec![
        Point3::new(-1., -1., 0.),
        Point3::new(1., -1., 0.),
        Point3::new(1., 1., 0.),
        Point3::new(-1., 1., 0.),
        Point3::new(-1., 2., 0.),
    ];
    let curve = NurbsCurve::try_interpolate(&points, 3, KnotStyle::Chord).unwrap();
    let json = serde_json::to_string(&curve).unwrap();
    let restored: NurbsCurve<f64> = serde_json::from_str(&json).unwrap();
    assert_eq!(curve, restored);
    for i in 0..=10 {
        let t = i as f64 / 10.;
        assert_relative_eq!(curve.point_at(t), restored.point_at(t), epsilon = 1e-12);
    }
}

#[test]
fn test_rational_surface_roundtrip() {
    let grid = vec![
        vec![
            Point3::new(0., 0., 0.),
            Point3::new(0., 2., 1.),
            Point3::new(0., 4., 0.),
        ],
        vec![
            Point3::new(2., 0., 1.),
            Point3::new(2., 2., 3.),
            Point3::new(2., 4., 1.),
        ],
        vec![
            Point3::new(4., 0., 0.),
            Point3::new(4., 2., 1.),
            Point3::new(4., 4., 0.),
        ],
    ];
    let surface = NurbsSurface::try_uniform(2, 2, grid)
        .unwrap()
        .with_weights(Some(vec![
            vec![1., 2., 1.],
            vec![2., 4., 2.],
            vec![1., 2., 1.],
        ]))
        .unwrap();
    let json = serde_json::to_string(&surface).unwrap();
    let restored: NurbsSurface<f64> = serde_json::from_str(&json).unwrap();
    assert_eq!(surface, restored);
    assert_relative_eq!(
        surface.point_at(0.3, 0.7),
        restored.point_at(0.3, 0.7),
        epsilon = 1e-12
    );
}
