use nalgebra::{Point3, Vector3};

use crate::error::Error;
use crate::misc::FloatingPoint;

/// A Frenet frame at a point on a curve.
#[derive(Debug, Clone, PartialEq)]
pub struct FrenetFrame<T: FloatingPoint> {
    position: Point3<T>,
    tangent: Vector3<T>,
    normal: Vector3<T>,
    binormal: Vector3<T>,
}

impl<T: FloatingPoint> FrenetFrame<T> {
    pub fn new(
        position: Point3<T>,
        tangent: Vector3<T>,
        normal: Vector3<T>,
        binormal: Vector3<T>,
    ) -> Self {
        Self {
            position,
            tangent,
            normal,
            binormal,
        }
    }

    /// Build a frame from the first and second derivatives of a curve.
    /// T = D1 / |D1|, B = (D1 x D2) / |D1 x D2|, N = B x T
    /// Falls back to an arbitrary normal when the curvature vanishes.
    pub fn from_derivatives(
        position: Point3<T>,
        deriv1: Vector3<T>,
        deriv2: Vector3<T>,
    ) -> Result<Self, Error> {
        let n1 = deriv1.norm();
        if n1 <= T::default_epsilon() {
            return Err(Error::DegenerateTangent);
        }
        let tangent = deriv1 / n1;

        let cross = deriv1.cross(&deriv2);
        let nc = cross.norm();
        let binormal = if nc <= T::default_epsilon() {
            // zero curvature, any direction orthogonal to the tangent works
            let axis = if tangent.x.abs() < T::from_f64(0.9).unwrap() {
                Vector3::x()
            } else {
                Vector3::y()
            };
            tangent.cross(&axis).normalize()
        } else {
            cross / nc
        };
        let normal = binormal.cross(&tangent);

        Ok(Self::new(position, tangent, normal, binormal))
    }

    pub fn position(&self) -> &Point3<T> {
        &self.position
    }

    pub fn tangent(&self) -> &Vector3<T> {
        &self.tangent
    }

    pub fn normal(&self) -> &Vector3<T> {
        &self.normal
    }

    pub fn binormal(&self) -> &Vector3<T> {
        &self.binormal
    }
}
