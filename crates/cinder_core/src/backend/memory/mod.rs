pub mod ops;

use cinder_error::{CinderError, Result};

use crate::arrays::vector::Vector;
use crate::backend::Backend;
use crate::compile::Environment;
use crate::functions::Term;
use crate::storage::{EvalCaps, StorageEngine};

/// Storage engine over local memory.
///
/// Plans targeting the memory backend are fully computed by the runtime
/// before they reach the engine, so execution only hands the final buffer
/// back.
#[derive(Debug)]
pub struct MemoryStorage {
    bulk_write: bool,
}

impl MemoryStorage {
    pub fn new() -> Self {
        MemoryStorage { bulk_write: true }
    }

    /// An engine without a bulk-write path, for exercising the fallback.
    pub fn without_bulk_write() -> Self {
        MemoryStorage { bulk_write: false }
    }
}

impl Default for MemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

impl StorageEngine for MemoryStorage {
    fn backend(&self) -> Backend {
        Backend::Memory
    }

    fn execute_plan(&self, term: &Term, _env: &Environment, _caps: &EvalCaps) -> Result<Vector> {
        match term {
            Term::Vector(v) => Ok(v.clone()),
            Term::Scalar(s) => Vector::from_scalar(s.clone()),
            Term::Sql(_) => Err(CinderError::internal(
                "sql expression reached the memory engine",
            )),
        }
    }

    fn supports_bulk_write(&self) -> bool {
        self.bulk_write
    }
}
