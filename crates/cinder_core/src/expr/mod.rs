pub mod context;

pub use context::{BoundTerm, Context, DeferredExpr, ParamId};

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::arrays::scalar::ScalarValue;

/// Generic operator names shared by every backend.
pub mod op {
    pub const ADD: &str = "add";
    pub const SUBTRACT: &str = "subtract";
    pub const MULTIPLY: &str = "multiply";
    pub const DIVIDE: &str = "divide";
    pub const FLOOR_DIVIDE: &str = "floor_divide";
    pub const MOD: &str = "mod";
    pub const NEGATIVE: &str = "negative";

    pub const EQUAL: &str = "equal";
    pub const NOT_EQUAL: &str = "not_equal";
    pub const LESS: &str = "less";
    pub const LESS_EQUAL: &str = "less_equal";
    pub const GREATER: &str = "greater";
    pub const GREATER_EQUAL: &str = "greater_equal";

    pub const LOGICAL_AND: &str = "logical_and";
    pub const LOGICAL_OR: &str = "logical_or";
    pub const LOGICAL_NOT: &str = "logical_not";
    pub const LOGICAL_XOR: &str = "logical_xor";

    pub const SUM: &str = "sum";
    pub const AVG: &str = "avg";
    pub const MIN: &str = "min";
    pub const MAX: &str = "max";

    pub const WHERE: &str = "where";
    pub const ORDER_BY: &str = "order_by";
    pub const MERGE: &str = "merge";
}

/// One node of an immutable expression graph.
///
/// Graphs may share subtrees (multiple parents referencing the same node)
/// but are never cyclic. Nodes never mutate after construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ExprNode {
    /// Free parameter, bound through the context.
    Param(ParamId),
    /// Literal value.
    Literal(ScalarValue),
    /// Generic operator applied to operand nodes.
    Apply {
        op: String,
        inputs: Vec<Arc<ExprNode>>,
    },
}

pub fn param(id: ParamId) -> Arc<ExprNode> {
    Arc::new(ExprNode::Param(id))
}

pub fn lit(value: impl Into<ScalarValue>) -> Arc<ExprNode> {
    Arc::new(ExprNode::Literal(value.into()))
}

pub fn apply(op: impl Into<String>, inputs: Vec<Arc<ExprNode>>) -> Arc<ExprNode> {
    Arc::new(ExprNode::Apply {
        op: op.into(),
        inputs,
    })
}

// Arithmetic

pub fn add(a: Arc<ExprNode>, b: Arc<ExprNode>) -> Arc<ExprNode> {
    apply(op::ADD, vec![a, b])
}

pub fn subtract(a: Arc<ExprNode>, b: Arc<ExprNode>) -> Arc<ExprNode> {
    apply(op::SUBTRACT, vec![a, b])
}

pub fn multiply(a: Arc<ExprNode>, b: Arc<ExprNode>) -> Arc<ExprNode> {
    apply(op::MULTIPLY, vec![a, b])
}

pub fn divide(a: Arc<ExprNode>, b: Arc<ExprNode>) -> Arc<ExprNode> {
    apply(op::DIVIDE, vec![a, b])
}

pub fn floor_divide(a: Arc<ExprNode>, b: Arc<ExprNode>) -> Arc<ExprNode> {
    apply(op::FLOOR_DIVIDE, vec![a, b])
}

pub fn modulo(a: Arc<ExprNode>, b: Arc<ExprNode>) -> Arc<ExprNode> {
    apply(op::MOD, vec![a, b])
}

pub fn negative(a: Arc<ExprNode>) -> Arc<ExprNode> {
    apply(op::NEGATIVE, vec![a])
}

// Comparison

pub fn equal(a: Arc<ExprNode>, b: Arc<ExprNode>) -> Arc<ExprNode> {
    apply(op::EQUAL, vec![a, b])
}

pub fn not_equal(a: Arc<ExprNode>, b: Arc<ExprNode>) -> Arc<ExprNode> {
    apply(op::NOT_EQUAL, vec![a, b])
}

pub fn less(a: Arc<ExprNode>, b: Arc<ExprNode>) -> Arc<ExprNode> {
    apply(op::LESS, vec![a, b])
}

pub fn less_equal(a: Arc<ExprNode>, b: Arc<ExprNode>) -> Arc<ExprNode> {
    apply(op::LESS_EQUAL, vec![a, b])
}

pub fn greater(a: Arc<ExprNode>, b: Arc<ExprNode>) -> Arc<ExprNode> {
    apply(op::GREATER, vec![a, b])
}

pub fn greater_equal(a: Arc<ExprNode>, b: Arc<ExprNode>) -> Arc<ExprNode> {
    apply(op::GREATER_EQUAL, vec![a, b])
}

// Logical

pub fn logical_and(a: Arc<ExprNode>, b: Arc<ExprNode>) -> Arc<ExprNode> {
    apply(op::LOGICAL_AND, vec![a, b])
}

pub fn logical_or(a: Arc<ExprNode>, b: Arc<ExprNode>) -> Arc<ExprNode> {
    apply(op::LOGICAL_OR, vec![a, b])
}

pub fn logical_not(a: Arc<ExprNode>) -> Arc<ExprNode> {
    apply(op::LOGICAL_NOT, vec![a])
}

pub fn logical_xor(a: Arc<ExprNode>, b: Arc<ExprNode>) -> Arc<ExprNode> {
    apply(op::LOGICAL_XOR, vec![a, b])
}

// Aggregates

pub fn sum(col: Arc<ExprNode>) -> Arc<ExprNode> {
    apply(op::SUM, vec![col])
}

pub fn avg(col: Arc<ExprNode>) -> Arc<ExprNode> {
    apply(op::AVG, vec![col])
}

pub fn min(col: Arc<ExprNode>) -> Arc<ExprNode> {
    apply(op::MIN, vec![col])
}

pub fn max(col: Arc<ExprNode>) -> Arc<ExprNode> {
    apply(op::MAX, vec![col])
}

// Filter/order

pub fn where_(input: Arc<ExprNode>, predicate: Arc<ExprNode>) -> Arc<ExprNode> {
    apply(op::WHERE, vec![input, predicate])
}

/// Order `input` by one key or an ordered key sequence. A bare key is
/// normalized to a one-element sequence, so both spellings build the same
/// graph.
pub fn order_by(input: Arc<ExprNode>, keys: impl IntoOrderKeys) -> Arc<ExprNode> {
    let mut inputs = vec![input];
    inputs.extend(keys.into_keys());
    apply(op::ORDER_BY, inputs)
}

pub fn merge(left: Arc<ExprNode>, right: Arc<ExprNode>) -> Arc<ExprNode> {
    apply(op::MERGE, vec![left, right])
}

/// Accepts either a single ordering key or an ordered sequence of keys.
pub trait IntoOrderKeys {
    fn into_keys(self) -> Vec<Arc<ExprNode>>;
}

impl IntoOrderKeys for Arc<ExprNode> {
    fn into_keys(self) -> Vec<Arc<ExprNode>> {
        vec![self]
    }
}

impl IntoOrderKeys for Vec<Arc<ExprNode>> {
    fn into_keys(self) -> Vec<Arc<ExprNode>> {
        self
    }
}

impl<const N: usize> IntoOrderKeys for [Arc<ExprNode>; N] {
    fn into_keys(self) -> Vec<Arc<ExprNode>> {
        self.into()
    }
}
