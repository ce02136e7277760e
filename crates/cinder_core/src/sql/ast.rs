//! SQL expression nodes produced by the operator builders.
//!
//! Nodes are immutable after construction. A downstream renderer turns them
//! into literal syntax; the `Display` impls here exist for diagnostics only.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::arrays::scalar::ScalarValue;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UnaryOperator {
    /// Minus, e.g. `-a`
    Negate,
    /// Not, e.g. `NOT a`
    Not,
}

impl UnaryOperator {
    pub const fn as_str(&self) -> &'static str {
        match self {
            UnaryOperator::Negate => "-",
            UnaryOperator::Not => "NOT",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BinaryOperator {
    /// Plus, e.g. `a + b`
    Plus,
    /// Minus, e.g. `a - b`
    Minus,
    /// Multiply, e.g. `a * b`
    Multiply,
    /// Divide, e.g. `a / b`
    Divide,
    /// Modulo, e.g. `a % b`
    Modulo,
    /// Equal, e.g. `a = b`
    Eq,
    /// Not equal, e.g. `a <> b`
    NotEq,
    /// Less than, e.g. `a < b`
    Lt,
    /// Less equal, e.g. `a <= b`
    LtEq,
    /// Greater than, e.g. `a > b`
    Gt,
    /// Greater equal, e.g. `a >= b`
    GtEq,
    /// And, e.g. `a AND b`
    And,
    /// Or, e.g. `a OR b`
    Or,
}

impl BinaryOperator {
    pub const fn as_str(&self) -> &'static str {
        match self {
            BinaryOperator::Plus => "+",
            BinaryOperator::Minus => "-",
            BinaryOperator::Multiply => "*",
            BinaryOperator::Divide => "/",
            BinaryOperator::Modulo => "%",
            BinaryOperator::Eq => "=",
            BinaryOperator::NotEq => "<>",
            BinaryOperator::Lt => "<",
            BinaryOperator::LtEq => "<=",
            BinaryOperator::Gt => ">",
            BinaryOperator::GtEq => ">=",
            BinaryOperator::And => "AND",
            BinaryOperator::Or => "OR",
        }
    }
}

/// One node of a SQL expression tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SqlExpr {
    /// Reference to a source column.
    Column(String),
    /// Constant.
    Literal(ScalarValue),
    /// Unary operator application.
    UnaryOp {
        op: UnaryOperator,
        expr: Box<SqlExpr>,
    },
    /// Binary operator application. Operand order is preserved for
    /// non-commutative operators.
    BinaryOp {
        op: BinaryOperator,
        left: Box<SqlExpr>,
        right: Box<SqlExpr>,
    },
    /// Function call, e.g. `SUM(col)`.
    Call { name: String, args: Vec<SqlExpr> },
    /// Filter `input` by a boolean predicate.
    Where {
        input: Box<SqlExpr>,
        predicate: Box<SqlExpr>,
    },
    /// Order `input` by a key list.
    OrderBy {
        input: Box<SqlExpr>,
        keys: Vec<SqlExpr>,
    },
}

impl SqlExpr {
    pub fn column(name: impl Into<String>) -> SqlExpr {
        SqlExpr::Column(name.into())
    }

    pub fn binary(op: BinaryOperator, left: SqlExpr, right: SqlExpr) -> SqlExpr {
        SqlExpr::BinaryOp {
            op,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    pub fn unary(op: UnaryOperator, expr: SqlExpr) -> SqlExpr {
        SqlExpr::UnaryOp {
            op,
            expr: Box::new(expr),
        }
    }

    pub fn and(left: SqlExpr, right: SqlExpr) -> SqlExpr {
        Self::binary(BinaryOperator::And, left, right)
    }

    pub fn or(left: SqlExpr, right: SqlExpr) -> SqlExpr {
        Self::binary(BinaryOperator::Or, left, right)
    }

    pub fn not(expr: SqlExpr) -> SqlExpr {
        Self::unary(UnaryOperator::Not, expr)
    }
}

impl fmt::Display for SqlExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SqlExpr::Column(name) => write!(f, "{name}"),
            SqlExpr::Literal(value) => write!(f, "{value}"),
            SqlExpr::UnaryOp { op, expr } => match op {
                UnaryOperator::Negate => write!(f, "(-{expr})"),
                UnaryOperator::Not => write!(f, "(NOT {expr})"),
            },
            SqlExpr::BinaryOp { op, left, right } => {
                write!(f, "({left} {} {right})", op.as_str())
            }
            SqlExpr::Call { name, args } => {
                write!(f, "{name}(")?;
                for (idx, arg) in args.iter().enumerate() {
                    if idx > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{arg}")?;
                }
                write!(f, ")")
            }
            SqlExpr::Where { input, predicate } => write!(f, "{input} WHERE {predicate}"),
            SqlExpr::OrderBy { input, keys } => {
                write!(f, "{input} ORDER BY ")?;
                for (idx, key) in keys.iter().enumerate() {
                    if idx > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{key}")?;
                }
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_nested() {
        let expr = SqlExpr::Where {
            input: Box::new(SqlExpr::column("amount")),
            predicate: Box::new(SqlExpr::binary(
                BinaryOperator::Gt,
                SqlExpr::column("amount"),
                SqlExpr::Literal(ScalarValue::Int64(10)),
            )),
        };
        assert_eq!(expr.to_string(), "amount WHERE (amount > 10)");
    }

    #[test]
    fn ast_serializes() {
        let expr = SqlExpr::and(
            SqlExpr::column("a"),
            SqlExpr::not(SqlExpr::column("b")),
        );
        let json = serde_json::to_string(&expr).unwrap();
        let back: SqlExpr = serde_json::from_str(&json).unwrap();
        assert_eq!(expr, back);
    }
}
