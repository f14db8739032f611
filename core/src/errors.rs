//! Failure kinds raised by graph construction and evaluation.
//!
//! They travel inside `anyhow::Error`; callers recover the kind with
//! `err.downcast_ref::<GraphError>()`.

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GraphError {
    /// Arguments that can never make a valid node. Raised at build time.
    #[error("Invalid configuration: {0}")]
    Configuration(String),
    /// Unsupported or inconsistent element type.
    #[error("Type mismatch: {0}")]
    TypeMismatch(String),
    /// Shape that the operator can not work with.
    #[error("Shape inference failed: {0}")]
    ShapeInference(String),
    /// Wrong number of inputs at a call site.
    #[error("Wrong input number: expected {expected}, got {got}")]
    Arity { expected: usize, got: usize },
}

impl GraphError {
    /// Extract the kind from an error chain, if any.
    pub fn of(error: &anyhow::Error) -> Option<&GraphError> {
        error.chain().find_map(|e| e.downcast_ref::<GraphError>())
    }
}

pub fn check_arity(expected: usize, got: usize) -> crate::GraftResult<()> {
    if expected != got {
        anyhow::bail!(GraphError::Arity { expected, got })
    }
    Ok(())
}
