use thiserror::Error;

/// Failures raised by integration and parameter estimation.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SirError {
    /// The caller handed in arguments the operation cannot work with.
    #[error("precondition violated: {0}")]
    Precondition(String),

    /// Integration overflowed to NaN or infinity.
    #[error("integration produced a non-finite state at step {step}")]
    NonFiniteState { step: usize },

    /// `JᵀJ` could not be inverted while solving the normal equations.
    #[error("normal matrix is singular at parameter update {update}; the fit is ill-conditioned")]
    SingularNormalMatrix { update: usize },

    /// The normal-equations solve produced NaN or infinite components.
    #[error("parameter update {update} is not finite")]
    NonFiniteUpdate { update: usize },
}

impl SirError {
    pub(crate) fn precondition(message: impl Into<String>) -> Self {
        SirError::Precondition(message.into())
    }
}

pub type Result<T> = std::result::Result<T, SirError>;
