pub mod binomial;
pub mod curvature;
pub mod floating_point;
pub mod frenet_frame;
pub mod invertible;
pub mod transpose;

pub use binomial::*;
pub use curvature::*;
pub use floating_point::*;
pub use frenet_frame::*;
pub use invertible::*;
pub use transpose::*;
