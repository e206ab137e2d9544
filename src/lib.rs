#![allow(clippy::needless_range_loop)]

mod curve;
mod error;
mod interpolation;
mod knot;
mod misc;
mod surface;

pub mod prelude {
    pub use crate::curve::*;
    pub use crate::error::*;
    pub use crate::interpolation::*;
    pub use crate::knot::*;
    pub use crate::misc::*;
    pub use crate::surface::*;
}
