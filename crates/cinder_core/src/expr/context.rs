use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::ExprNode;
use crate::arrays::Array;
use crate::arrays::datatype::DataType;

/// Identifier of a free parameter inside an expression graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ParamId(pub u32);

impl fmt::Display for ParamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "%{}", self.0)
    }
}

/// A source term bound to a parameter.
#[derive(Debug, Clone)]
pub enum BoundTerm {
    /// Concrete in-memory array handle.
    Array(Array),
    /// Backend-native column reference with its declared element type.
    SqlColumn { column: String, datatype: DataType },
}

/// Binds the free parameters of an expression graph to concrete source
/// terms.
///
/// `params` fixes the positional calling order for compiled functions; it
/// always lists a subset (or permutation) of the bound parameter ids.
#[derive(Debug, Clone, Default)]
pub struct Context {
    terms: HashMap<ParamId, BoundTerm, ahash::RandomState>,
    params: Vec<ParamId>,
}

impl Context {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `id` to a term, appending it to the positional parameter order
    /// on first bind.
    pub fn bind(&mut self, id: ParamId, term: BoundTerm) {
        if !self.terms.contains_key(&id) {
            self.params.push(id);
        }
        self.terms.insert(id, term);
    }

    pub fn bind_array(&mut self, id: ParamId, array: Array) {
        self.bind(id, BoundTerm::Array(array));
    }

    pub fn bind_sql_column(&mut self, id: ParamId, column: impl Into<String>, datatype: DataType) {
        self.bind(
            id,
            BoundTerm::SqlColumn {
                column: column.into(),
                datatype,
            },
        );
    }

    /// Positional parameter order for compiled functions.
    pub fn params(&self) -> &[ParamId] {
        &self.params
    }

    pub fn term(&self, id: ParamId) -> Option<&BoundTerm> {
        self.terms.get(&id)
    }

    /// Bound terms in positional order.
    pub fn args(&self) -> impl Iterator<Item = (ParamId, &BoundTerm)> {
        self.params.iter().map(|id| {
            let term = self
                .terms
                .get(id)
                .expect("params is a subset of bound terms");
            (*id, term)
        })
    }
}

/// A not-yet-executed computation: an immutable graph plus the context
/// binding its parameters.
#[derive(Debug, Clone)]
pub struct DeferredExpr {
    pub graph: Arc<ExprNode>,
    pub context: Arc<Context>,
}

impl DeferredExpr {
    pub fn new(graph: Arc<ExprNode>, context: Arc<Context>) -> Self {
        DeferredExpr { graph, context }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arrays::vector::Vector;

    #[test]
    fn bind_order_is_positional() {
        let mut ctx = Context::new();
        ctx.bind_sql_column(ParamId(2), "b", DataType::Int64);
        ctx.bind_array(ParamId(0), Array::concrete(Vector::Int64(vec![1])));

        let order: Vec<_> = ctx.params().to_vec();
        assert_eq!(order, vec![ParamId(2), ParamId(0)]);

        let args: Vec<_> = ctx.args().map(|(id, _)| id).collect();
        assert_eq!(args, vec![ParamId(2), ParamId(0)]);
    }

    #[test]
    fn rebind_keeps_position() {
        let mut ctx = Context::new();
        ctx.bind_sql_column(ParamId(0), "a", DataType::Int64);
        ctx.bind_sql_column(ParamId(1), "b", DataType::Int64);
        ctx.bind_sql_column(ParamId(0), "a2", DataType::Float64);

        assert_eq!(ctx.params(), &[ParamId(0), ParamId(1)]);
        match ctx.term(ParamId(0)).unwrap() {
            BoundTerm::SqlColumn { column, .. } => assert_eq!(column, "a2"),
            other => panic!("unexpected term: {other:?}"),
        }
    }
}
