use thiserror::Error;

/// Validation and evaluation failures.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Error {
    /// The knot vector has the wrong length, is not sorted, or has a degenerate domain
    #[error("invalid knot vector: {0}")]
    InvalidKnotVector(String),

    /// The control point collection is too small or not rectangular
    #[error("invalid control points: {0}")]
    InvalidControlPoints(String),

    /// The weight collection does not match the control points or contains non-positive values
    #[error("invalid weights: {0}")]
    InvalidWeights(String),

    /// The knot style name is not recognized
    #[error("unknown knot style: {0:?}")]
    InvalidKnotStyle(String),

    /// A derivative of higher order than the degree was requested
    #[error("derivative order {order} exceeds degree {degree}")]
    MismatchedDerivativeOrder { order: usize, degree: usize },

    /// The first derivative vanishes, so no tangent direction exists
    #[error("degenerate tangent: first derivative has zero length")]
    DegenerateTangent,

    /// The interpolation system has no unique solution
    #[error("singular interpolation system")]
    SingularSystem,
}
