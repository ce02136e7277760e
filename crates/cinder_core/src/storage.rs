//! Contract between the runtime and a storage/backend collaborator.

use std::fmt::Debug;

use cinder_error::Result;

use crate::arrays::vector::Vector;
use crate::backend::Backend;
use crate::compile::Environment;
use crate::functions::Term;

/// Capability hints for evaluation and storage.
#[derive(Debug, Clone)]
pub struct EvalCaps {
    /// Prefer streaming/bulk-write paths over the storage engine when it
    /// supports them. A performance hint: engines without such a path fall
    /// back to their default path silently.
    pub efficient_write: bool,
}

impl Default for EvalCaps {
    fn default() -> Self {
        EvalCaps {
            efficient_write: true,
        }
    }
}

/// A storage engine that can materialize the final term of a compiled plan.
///
/// This core does not define the engine's wire format, only the call shape
/// it requires: a backend tag for kernel resolution, and plan execution
/// honoring the capability hints.
pub trait StorageEngine: Debug {
    /// Identifier of the backend this engine executes.
    fn backend(&self) -> Backend;

    /// Execute the final term of a compiled plan, producing a concrete
    /// buffer. For translating backends the term is a backend-native
    /// expression tree; for native backends it is the already-computed
    /// result.
    fn execute_plan(&self, term: &Term, env: &Environment, caps: &EvalCaps) -> Result<Vector>;

    /// True if the engine offers a bulk/streaming write path.
    fn supports_bulk_write(&self) -> bool {
        false
    }
}
