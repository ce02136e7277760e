pub mod capabilities;
pub mod datatype;
pub mod scalar;
pub mod vector;

use std::fmt::Debug;
use std::sync::Arc;

use cinder_error::{CinderError, Result};
use parking_lot::RwLock;

use self::capabilities::Capabilities;
use self::datatype::DataType;
use self::vector::Vector;
use crate::expr::DeferredExpr;

/// A remote data source that can be pulled into local memory.
pub trait RemoteSource: Debug + Sync + Send {
    /// Fetch the remote buffer.
    fn fetch(&self) -> Result<Vector>;
}

/// Handle to an array: a concrete local buffer, a deferred expression, or a
/// remote resource.
///
/// Exactly one backing variant is ever populated, and the capability flags
/// always agree with the variant; the constructors are the only way to build
/// a handle.
#[derive(Debug, Clone)]
pub struct Array {
    capabilities: Capabilities,
    backing: Backing,
}

#[derive(Debug, Clone)]
pub enum Backing {
    /// Local concrete buffer. Shared between handle clones; the lock exists
    /// for appendable sources.
    Concrete(Arc<RwLock<Vector>>),
    /// Unexecuted (graph, context) pair.
    Deferred(DeferredExpr),
    /// Locator for data that lives elsewhere.
    Remote(Arc<dyn RemoteSource>),
}

impl Array {
    /// Wrap a concrete buffer in an appendable handle.
    pub fn concrete(vector: Vector) -> Self {
        Array {
            capabilities: Capabilities::concrete(true),
            backing: Backing::Concrete(Arc::new(RwLock::new(vector))),
        }
    }

    /// Wrap a concrete buffer in a read-only handle.
    pub fn concrete_readonly(vector: Vector) -> Self {
        Array {
            capabilities: Capabilities::concrete(false),
            backing: Backing::Concrete(Arc::new(RwLock::new(vector))),
        }
    }

    /// Wrap a deferred expression.
    pub fn deferred(expr: DeferredExpr) -> Self {
        Array {
            capabilities: Capabilities::deferred(),
            backing: Backing::Deferred(expr),
        }
    }

    /// Wrap a remote locator.
    pub fn remote(source: Arc<dyn RemoteSource>) -> Self {
        Array {
            capabilities: Capabilities::remote(),
            backing: Backing::Remote(source),
        }
    }

    pub const fn capabilities(&self) -> &Capabilities {
        &self.capabilities
    }

    pub const fn backing(&self) -> &Backing {
        &self.backing
    }

    /// The concrete buffer, if this handle is concrete.
    pub fn buffer(&self) -> Option<&Arc<RwLock<Vector>>> {
        match &self.backing {
            Backing::Concrete(buf) => Some(buf),
            _ => None,
        }
    }

    /// The (graph, context) pair, if this handle is deferred.
    pub fn deferred_expr(&self) -> Option<&DeferredExpr> {
        match &self.backing {
            Backing::Deferred(expr) => Some(expr),
            _ => None,
        }
    }

    pub fn remote_source(&self) -> Option<&Arc<dyn RemoteSource>> {
        match &self.backing {
            Backing::Remote(source) => Some(source),
            _ => None,
        }
    }

    /// Element type of the concrete buffer. Errors for deferred and remote
    /// handles, whose type is not locally known.
    pub fn datatype(&self) -> Result<DataType> {
        let buf = self
            .buffer()
            .ok_or_else(|| CinderError::unsupported("array has no local buffer"))?;
        let dt = buf.read().datatype();
        Ok(dt)
    }

    pub fn len(&self) -> Result<usize> {
        let buf = self
            .buffer()
            .ok_or_else(|| CinderError::unsupported("array has no local buffer"))?;
        let len = buf.read().len();
        Ok(len)
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    /// Clone the concrete buffer out of the handle.
    pub fn to_vector(&self) -> Result<Vector> {
        let buf = self
            .buffer()
            .ok_or_else(|| CinderError::unsupported("array has no local buffer"))?;
        let vector = buf.read().clone();
        Ok(vector)
    }

    /// True if both handles alias the same concrete buffer.
    pub fn shares_buffer(&self, other: &Array) -> bool {
        match (&self.backing, &other.backing) {
            (Backing::Concrete(a), Backing::Concrete(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }

    /// Evaluate this handle with default capabilities and no explicit
    /// storage target.
    pub fn eval(&self) -> Result<Array> {
        crate::eval::evaluate(
            self,
            None,
            &crate::storage::EvalCaps::default(),
            None,
            false,
        )
    }
}

impl From<Vector> for Array {
    fn from(vector: Vector) -> Self {
        Array::concrete(vector)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn concrete_capabilities_agree_with_backing() {
        let arr = Array::concrete(Vector::Int64(vec![1, 2, 3]));
        assert!(!arr.capabilities().deferred);
        assert!(!arr.capabilities().remote);
        assert!(arr.capabilities().appendable);
        assert!(arr.buffer().is_some());
        assert_eq!(arr.datatype().unwrap(), DataType::Int64);
        assert_eq!(arr.len().unwrap(), 3);
    }

    #[test]
    fn clone_aliases_buffer() {
        let arr = Array::concrete(Vector::Int64(vec![1]));
        let other = arr.clone();
        assert!(arr.shares_buffer(&other));

        let fresh = Array::concrete(Vector::Int64(vec![1]));
        assert!(!arr.shares_buffer(&fresh));
    }
}
