//! Error types shared across the cinder crates.

/// Errors produced while building, compiling, or running deferred array
/// computations.
#[derive(Debug, thiserror::Error)]
pub enum CinderError {
    /// A data source is missing the capability an operation requires.
    #[error("Operation unsupported: {0}")]
    UnsupportedOperation(String),

    /// Kernel lookup found no signature unifying with the operand shapes.
    #[error("No kernel for '{op}' on backend '{backend}' matches operands ({operands})")]
    NoMatchingKernel {
        op: String,
        backend: &'static str,
        operands: String,
    },

    /// Kernel lookup found more than one signature unifying with the operand
    /// shapes.
    #[error(
        "Ambiguous dispatch for '{op}' on backend '{backend}': {candidates} signatures match operands ({operands})"
    )]
    AmbiguousDispatch {
        op: String,
        backend: &'static str,
        candidates: usize,
        operands: String,
    },

    /// Two registrations for the identical (op, backend, signature) triple.
    /// A programming error, never recovered.
    #[error("Kernel already registered for '{op}' on backend '{backend}' with an identical signature")]
    DuplicateKernel { op: String, backend: &'static str },

    /// A caller-supplied output buffer is incompatible with the computed
    /// result.
    #[error("Result does not fit the supplied output: expected {expected}, got {got}")]
    ResultShapeMismatch { expected: String, got: String },

    /// Intentionally unfinished surface.
    #[error("Not yet implemented: {0}")]
    NotImplemented(&'static str),

    /// A kernel invocation failed during a run. The inner error is the
    /// kernel's own, surfaced unchanged; op and backend identify the failing
    /// plan node.
    #[error("Kernel '{op}' failed on backend '{backend}'")]
    KernelFailed {
        op: String,
        backend: &'static str,
        #[source]
        source: Box<CinderError>,
    },

    /// Invariant violation inside the engine itself.
    #[error("Internal error: {0}")]
    Internal(String),

    /// Pass-through error from a storage or remote collaborator.
    #[error(transparent)]
    External(#[from] Box<dyn std::error::Error + Sync + Send>),
}

impl CinderError {
    pub fn unsupported(msg: impl Into<String>) -> Self {
        CinderError::UnsupportedOperation(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        CinderError::Internal(msg.into())
    }
}

pub type Result<T, E = CinderError> = std::result::Result<T, E>;

/// Return early with [`CinderError::NotImplemented`].
#[macro_export]
macro_rules! not_implemented {
    ($msg:expr) => {
        return Err($crate::CinderError::NotImplemented($msg).into())
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kernel_failed_preserves_source() {
        let inner = CinderError::internal("divide by zero");
        let err = CinderError::KernelFailed {
            op: "divide".to_string(),
            backend: "memory",
            source: Box::new(inner),
        };

        let msg = err.to_string();
        assert!(msg.contains("divide"), "{msg}");
        assert!(msg.contains("memory"), "{msg}");

        let source = std::error::Error::source(&err).expect("source error");
        assert!(source.to_string().contains("divide by zero"));
    }
}
