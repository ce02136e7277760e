use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use cinder_error::{CinderError, Result};
use once_cell::sync::Lazy;

use super::{Signature, TermShape};
use crate::arrays::scalar::ScalarValue;
use crate::arrays::vector::Vector;
use crate::backend::Backend;
use crate::sql::ast::SqlExpr;
use crate::util::fmt::IntoDisplayableSlice;

/// Value passed between kernels during a run: a concrete column, a scalar,
/// or a backend-native expression node.
#[derive(Debug, Clone, PartialEq)]
pub enum Term {
    Vector(Vector),
    Scalar(ScalarValue),
    Sql(SqlExpr),
}

impl Term {
    pub fn try_vector(&self) -> Result<&Vector> {
        match self {
            Term::Vector(v) => Ok(v),
            other => Err(CinderError::internal(format!(
                "expected a concrete column operand, got {other:?}"
            ))),
        }
    }

    pub fn try_sql(&self) -> Result<&SqlExpr> {
        match self {
            Term::Sql(expr) => Ok(expr),
            other => Err(CinderError::internal(format!(
                "expected a sql expression operand, got {other:?}"
            ))),
        }
    }
}

/// Backend-specific implementation of a generic operator.
///
/// Kernels receive operand terms and either compute a result (native
/// backends) or construct a backend expression node (translating backends).
pub type KernelFn = Arc<dyn Fn(&[&Term]) -> Result<Term> + Send + Sync>;

/// A signature paired with its implementation.
#[derive(Clone)]
pub struct RegisteredKernel {
    pub signature: Signature,
    pub kernel: KernelFn,
}

impl fmt::Debug for RegisteredKernel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegisteredKernel")
            .field("signature", &self.signature)
            .finish_non_exhaustive()
    }
}

/// A kernel resolved for a specific call site: the implementation plus the
/// unified result shape.
#[derive(Clone)]
pub struct ResolvedKernel {
    pub kernel: KernelFn,
    pub result: TermShape,
}

impl fmt::Debug for ResolvedKernel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResolvedKernel")
            .field("result", &self.result)
            .finish_non_exhaustive()
    }
}

/// Maps (generic operator, backend, signature) triples to kernel
/// implementations.
///
/// Registration happens during initialization and the registry is read-only
/// afterwards. Tests construct isolated registries; production code shares
/// the process-wide [`default_registry`].
#[derive(Debug, Default)]
pub struct KernelRegistry {
    kernels: HashMap<(String, Backend), Vec<RegisteredKernel>, ahash::RandomState>,
}

impl KernelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a kernel for the (op, backend, signature) triple.
    ///
    /// Registering a second implementation for an identical triple is a
    /// programming error and fails fast; a new signature for an existing
    /// (op, backend) pair registers independently.
    pub fn register(
        &mut self,
        op: impl Into<String>,
        backend: Backend,
        signature: Signature,
        kernel: KernelFn,
    ) -> Result<()> {
        let op = op.into();
        let entries = self.kernels.entry((op.clone(), backend)).or_default();

        if entries.iter().any(|entry| entry.signature == signature) {
            return Err(CinderError::DuplicateKernel {
                op,
                backend: backend.as_str(),
            });
        }

        entries.push(RegisteredKernel { signature, kernel });
        Ok(())
    }

    /// Resolve the kernel for a generic call.
    ///
    /// Exactly one registered signature must unify with the operand shapes.
    pub fn lookup(
        &self,
        op: &str,
        backend: Backend,
        operands: &[TermShape],
    ) -> Result<ResolvedKernel> {
        let entries = self
            .kernels
            .get(&(op.to_string(), backend))
            .map(|entries| entries.as_slice())
            .unwrap_or_default();

        let mut matches = entries
            .iter()
            .filter_map(|entry| {
                entry
                    .signature
                    .unify(operands)
                    .map(|result| ResolvedKernel {
                        kernel: entry.kernel.clone(),
                        result,
                    })
            })
            .collect::<Vec<_>>();

        match matches.len() {
            1 => Ok(matches.pop().unwrap()),
            0 => Err(CinderError::NoMatchingKernel {
                op: op.to_string(),
                backend: backend.as_str(),
                operands: operands.displayable().to_string(),
            }),
            candidates => Err(CinderError::AmbiguousDispatch {
                op: op.to_string(),
                backend: backend.as_str(),
                candidates,
                operands: operands.displayable().to_string(),
            }),
        }
    }
}

static DEFAULT_REGISTRY: Lazy<KernelRegistry> = Lazy::new(|| {
    let mut registry = KernelRegistry::new();
    crate::backend::memory::ops::register_builtin(&mut registry)
        .expect("builtin memory kernels register cleanly");
    crate::sql::ops::register_builtin(&mut registry).expect("builtin sql kernels register cleanly");
    registry
});

/// The process-wide registry holding the builtin kernels for every backend.
///
/// Built once on first use, immutable afterwards; lookups are lock-free
/// reads.
pub fn default_registry() -> &'static KernelRegistry {
    &DEFAULT_REGISTRY
}
