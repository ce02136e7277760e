//! SQL implementations of the generic operators.
//!
//! Each builder constructs a [`SqlExpr`] node from backend-native operands
//! instead of computing a value; the resulting tree is materialized later by
//! the storage engine. Builders are registered under explicit
//! (operator, backend) keys.

use std::sync::Arc;

use cinder_error::{CinderError, Result, not_implemented};

use super::ast::{BinaryOperator, SqlExpr, UnaryOperator};
use crate::arrays::datatype::DataTypeId;
use crate::backend::Backend;
use crate::expr::op;
use crate::functions::{KernelRegistry, Signature, Term, TypeSlot};

// A -> A -> A
fn sig_arith() -> Signature {
    Signature::new(
        [TypeSlot::columnar_var('A'), TypeSlot::columnar_var('A')],
        TypeSlot::columnar_var('A'),
    )
}

// A -> A
fn sig_negate() -> Signature {
    Signature::new([TypeSlot::columnar_var('A')], TypeSlot::columnar_var('A'))
}

// A -> A -> bool
fn sig_compare() -> Signature {
    Signature::new(
        [TypeSlot::columnar_var('A'), TypeSlot::columnar_var('A')],
        TypeSlot::columnar(DataTypeId::Boolean),
    )
}

// bool -> bool -> bool
fn sig_logical_binary() -> Signature {
    Signature::new(
        [
            TypeSlot::columnar(DataTypeId::Boolean),
            TypeSlot::columnar(DataTypeId::Boolean),
        ],
        TypeSlot::columnar(DataTypeId::Boolean),
    )
}

// bool -> bool
fn sig_logical_unary() -> Signature {
    Signature::new(
        [TypeSlot::columnar(DataTypeId::Boolean)],
        TypeSlot::columnar(DataTypeId::Boolean),
    )
}

// T column -> T scalar
fn sig_aggregate() -> Signature {
    Signature::new([TypeSlot::columnar_var('T')], TypeSlot::scalar_var('T'))
}

// T column -> float64 scalar
fn sig_avg() -> Signature {
    Signature::new(
        [TypeSlot::columnar_var('T')],
        TypeSlot::scalar(DataTypeId::Float64),
    )
}

// A -> bool -> A
fn sig_where() -> Signature {
    Signature::new(
        [
            TypeSlot::columnar_var('A'),
            TypeSlot::columnar(DataTypeId::Boolean),
        ],
        TypeSlot::columnar_var('A'),
    )
}

// A -> keys... -> A
fn sig_order_by() -> Signature {
    Signature::variadic(
        [TypeSlot::columnar_var('A')],
        TypeSlot::columnar(DataTypeId::Any),
        TypeSlot::columnar_var('A'),
    )
}

// A -> B -> A
fn sig_merge() -> Signature {
    Signature::new(
        [TypeSlot::columnar_var('A'), TypeSlot::columnar_var('B')],
        TypeSlot::columnar_var('A'),
    )
}

/// View an operand term as a SQL expression node. Scalars become literal
/// nodes; concrete buffers never reach a sql kernel (the compiler rejects
/// them first).
fn sql_operand(term: &Term) -> Result<SqlExpr> {
    match term {
        Term::Sql(expr) => Ok(expr.clone()),
        Term::Scalar(value) => Ok(SqlExpr::Literal(value.clone())),
        Term::Vector(_) => Err(CinderError::internal(
            "concrete buffer operand reached a sql kernel",
        )),
    }
}

/// Define a binary sql operator under an explicit (op, backend) key.
pub fn define_binop(
    registry: &mut KernelRegistry,
    generic_op: &'static str,
    symbol: BinaryOperator,
    signature: Signature,
) -> Result<()> {
    registry.register(
        generic_op,
        Backend::Sql,
        signature,
        Arc::new(move |args: &[&Term]| {
            if args.len() != 2 {
                return Err(CinderError::internal(format!(
                    "binary operator '{}' expects two operands",
                    symbol.as_str(),
                )));
            }
            Ok(Term::Sql(SqlExpr::binary(
                symbol,
                sql_operand(args[0])?,
                sql_operand(args[1])?,
            )))
        }),
    )
}

/// Define a unary sql operator under an explicit (op, backend) key.
pub fn define_unop(
    registry: &mut KernelRegistry,
    generic_op: &'static str,
    symbol: UnaryOperator,
    signature: Signature,
) -> Result<()> {
    registry.register(
        generic_op,
        Backend::Sql,
        signature,
        Arc::new(move |args: &[&Term]| {
            if args.len() != 1 {
                return Err(CinderError::internal(format!(
                    "unary operator '{}' expects one operand",
                    symbol.as_str(),
                )));
            }
            Ok(Term::Sql(SqlExpr::unary(symbol, sql_operand(args[0])?)))
        }),
    )
}

/// Define an aggregate as a sql function call over a single column.
/// Argument validation happens in the generic signature, not here.
pub fn define_aggregate(
    registry: &mut KernelRegistry,
    generic_op: &'static str,
    func: &'static str,
    signature: Signature,
) -> Result<()> {
    registry.register(
        generic_op,
        Backend::Sql,
        signature,
        Arc::new(move |args: &[&Term]| {
            if args.len() != 1 {
                return Err(CinderError::internal(format!(
                    "aggregate '{func}' expects one operand"
                )));
            }
            Ok(Term::Sql(SqlExpr::Call {
                name: func.to_string(),
                args: vec![sql_operand(args[0])?],
            }))
        }),
    )
}

/// Join two tables.
///
/// Part of the public surface, but cross-source planning does not happen at
/// this layer.
pub fn merge(_left: &SqlExpr, _right: &SqlExpr) -> Result<SqlExpr> {
    not_implemented!("sql merge/join")
}

/// Register the builtin sql kernels.
pub fn register_builtin(registry: &mut KernelRegistry) -> Result<()> {
    // Arithmetic
    define_binop(registry, op::ADD, BinaryOperator::Plus, sig_arith())?;
    define_binop(registry, op::SUBTRACT, BinaryOperator::Minus, sig_arith())?;
    define_binop(registry, op::MULTIPLY, BinaryOperator::Multiply, sig_arith())?;
    define_binop(registry, op::DIVIDE, BinaryOperator::Divide, sig_arith())?;
    define_binop(registry, op::FLOOR_DIVIDE, BinaryOperator::Divide, sig_arith())?;
    define_binop(registry, op::MOD, BinaryOperator::Modulo, sig_arith())?;
    define_unop(registry, op::NEGATIVE, UnaryOperator::Negate, sig_negate())?;

    // Comparison
    define_binop(registry, op::EQUAL, BinaryOperator::Eq, sig_compare())?;
    define_binop(registry, op::NOT_EQUAL, BinaryOperator::NotEq, sig_compare())?;
    define_binop(registry, op::LESS, BinaryOperator::Lt, sig_compare())?;
    define_binop(registry, op::LESS_EQUAL, BinaryOperator::LtEq, sig_compare())?;
    define_binop(registry, op::GREATER, BinaryOperator::Gt, sig_compare())?;
    define_binop(registry, op::GREATER_EQUAL, BinaryOperator::GtEq, sig_compare())?;

    // Logical
    define_binop(
        registry,
        op::LOGICAL_AND,
        BinaryOperator::And,
        sig_logical_binary(),
    )?;
    define_binop(
        registry,
        op::LOGICAL_OR,
        BinaryOperator::Or,
        sig_logical_binary(),
    )?;
    define_unop(
        registry,
        op::LOGICAL_NOT,
        UnaryOperator::Not,
        sig_logical_unary(),
    )?;

    // SQL has no native xor; synthesize (a OR b) AND NOT (a AND b) from the
    // native connectives. Each application triples the operand subtrees, so
    // nesting this repeatedly blows up the generated expression; it must not
    // become a building block for further compound operators without a bound
    // on graph depth.
    registry.register(
        op::LOGICAL_XOR,
        Backend::Sql,
        sig_logical_binary(),
        Arc::new(|args: &[&Term]| {
            if args.len() != 2 {
                return Err(CinderError::internal("logical_xor expects two operands"));
            }
            let a = sql_operand(args[0])?;
            let b = sql_operand(args[1])?;
            Ok(Term::Sql(SqlExpr::and(
                SqlExpr::or(a.clone(), b.clone()),
                SqlExpr::not(SqlExpr::and(a, b)),
            )))
        }),
    )?;

    // Aggregates
    define_aggregate(registry, op::SUM, "SUM", sig_aggregate())?;
    define_aggregate(registry, op::AVG, "AVG", sig_avg())?;
    define_aggregate(registry, op::MIN, "MIN", sig_aggregate())?;
    define_aggregate(registry, op::MAX, "MAX", sig_aggregate())?;

    // Filter: wrap the input with a predicate.
    registry.register(
        op::WHERE,
        Backend::Sql,
        sig_where(),
        Arc::new(|args: &[&Term]| {
            if args.len() != 2 {
                return Err(CinderError::internal("where expects two operands"));
            }
            Ok(Term::Sql(SqlExpr::Where {
                input: Box::new(sql_operand(args[0])?),
                predicate: Box::new(sql_operand(args[1])?),
            }))
        }),
    )?;

    // Ordering: wrap the input with a key list. A bare key arrives as a
    // one-element operand tail.
    registry.register(
        op::ORDER_BY,
        Backend::Sql,
        sig_order_by(),
        Arc::new(|args: &[&Term]| {
            if args.len() < 2 {
                return Err(CinderError::internal(
                    "order_by requires an input and at least one ordering key",
                ));
            }
            Ok(Term::Sql(SqlExpr::OrderBy {
                input: Box::new(sql_operand(args[0])?),
                keys: args[1..]
                    .iter()
                    .map(|&key| sql_operand(key))
                    .collect::<Result<Vec<_>>>()?,
            }))
        }),
    )?;

    // Join stays registered so graph-level calls dispatch, but always fails.
    registry.register(
        op::MERGE,
        Backend::Sql,
        sig_merge(),
        Arc::new(|_args: &[&Term]| -> Result<Term> { not_implemented!("sql merge/join") }),
    )?;

    Ok(())
}
