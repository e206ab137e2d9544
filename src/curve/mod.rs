pub mod knot_style;
pub mod nurbs_curve;
pub use knot_style::*;
pub use nurbs_curve::*;

pub(crate) mod helper;
