pub mod nurbs_surface;
pub use nurbs_surface::*;

/// A parameter direction on a surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UVDirection {
    U,
    V,
}

#[cfg(test)]
mod tests;
