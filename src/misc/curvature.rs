use nalgebra::{Point3, Vector3};

use crate::misc::{FloatingPoint, FrenetFrame};

/// Curvature of a curve at a parameter.
#[derive(Debug, Clone, PartialEq)]
pub struct CurveCurvature<T: FloatingPoint> {
    frame: FrenetFrame<T>,
    kappa: T,
}

impl<T: FloatingPoint> CurveCurvature<T> {
    pub fn new(frame: FrenetFrame<T>, kappa: T) -> Self {
        Self { frame, kappa }
    }

    pub fn frame(&self) -> &FrenetFrame<T> {
        &self.frame
    }

    /// Returns the curvature magnitude
    pub fn kappa(&self) -> T {
        self.kappa
    }

    /// Radius of the osculating circle
    /// Returns `None` at inflection points where the curvature vanishes
    pub fn radius(&self) -> Option<T> {
        if self.kappa <= T::default_epsilon() {
            None
        } else {
            Some(T::one() / self.kappa)
        }
    }

    /// Center of the osculating circle, offset from the position along the frame normal
    pub fn center(&self) -> Option<Point3<T>> {
        self.radius()
            .map(|r| self.frame.position() + self.frame.normal() * r)
    }
}

/// Curvature of a surface at a uv parameter,
/// derived from the eigen decomposition of the shape operator.
#[derive(Debug, Clone, PartialEq)]
pub struct SurfaceCurvature<T: FloatingPoint> {
    normal: Vector3<T>,
    kappa: (T, T),
    directions: (Vector3<T>, Vector3<T>),
    mean: T,
    gauss: T,
}

impl<T: FloatingPoint> SurfaceCurvature<T> {
    pub fn new(
        normal: Vector3<T>,
        kappa: (T, T),
        directions: (Vector3<T>, Vector3<T>),
        mean: T,
        gauss: T,
    ) -> Self {
        Self {
            normal,
            kappa,
            directions,
            mean,
            gauss,
        }
    }

    /// Unit surface normal at the evaluated parameter
    pub fn normal(&self) -> &Vector3<T> {
        &self.normal
    }

    /// Principal curvatures in ascending order
    pub fn kappa(&self) -> (T, T) {
        self.kappa
    }

    /// Unit principal directions, paired with `kappa`
    pub fn directions(&self) -> &(Vector3<T>, Vector3<T>) {
        &self.directions
    }

    /// Mean curvature
    pub fn mean(&self) -> T {
        self.mean
    }

    /// Gaussian curvature
    pub fn gauss(&self) -> T {
        self.gauss
    }
}
