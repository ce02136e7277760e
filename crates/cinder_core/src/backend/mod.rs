pub mod memory;

use std::fmt;

use serde::{Deserialize, Serialize};

/// Identifies the execution backend a kernel targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Backend {
    /// Native kernels over local concrete buffers.
    Memory,
    /// Kernels that translate into SQL expression nodes for a SQL-backed
    /// engine.
    Sql,
}

impl Backend {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Backend::Memory => "memory",
            Backend::Sql => "sql",
        }
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
