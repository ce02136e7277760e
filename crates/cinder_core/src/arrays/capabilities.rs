/// Named capability flags describing what a data source supports.
///
/// Every array handle carries one of these; the evaluation entry point and
/// runtime match on the flags instead of probing the backing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capabilities {
    /// Value is defined by an unexecuted expression graph.
    pub deferred: bool,
    /// Data lives in a remote store and must be materialized before local
    /// use.
    pub remote: bool,
    /// The source accepts appends.
    pub appendable: bool,
    /// The source offers an efficient bulk-write path.
    pub efficient_write: bool,
}

impl Capabilities {
    /// Capabilities of a local concrete buffer.
    pub const fn concrete(appendable: bool) -> Self {
        Capabilities {
            deferred: false,
            remote: false,
            appendable,
            efficient_write: true,
        }
    }

    /// Capabilities of a deferred expression.
    pub const fn deferred() -> Self {
        Capabilities {
            deferred: true,
            remote: false,
            appendable: false,
            efficient_write: false,
        }
    }

    /// Capabilities of a remote source.
    pub const fn remote() -> Self {
        Capabilities {
            deferred: false,
            remote: true,
            appendable: false,
            efficient_write: false,
        }
    }
}
