//! Native in-memory implementations of the generic operators.
//!
//! Kernels compute directly over [`Vector`] buffers. Scalar operands
//! broadcast across their columnar partner. Every kernel is registered under
//! exact per-type signatures, so dispatch picks the implementation from the
//! operand types alone.

use std::sync::Arc;

use cinder_error::{CinderError, Result, not_implemented};

use crate::arrays::datatype::DataTypeId;
use crate::arrays::scalar::ScalarValue;
use crate::arrays::vector::Vector;
use crate::backend::Backend;
use crate::expr::op;
use crate::functions::{KernelRegistry, Signature, Term, TypeSlot};

// Signature helpers

fn sig_binary(id: DataTypeId) -> Signature {
    Signature::new(
        [TypeSlot::columnar(id), TypeSlot::columnar(id)],
        TypeSlot::columnar(id),
    )
}

fn sig_compare(id: DataTypeId) -> Signature {
    Signature::new(
        [TypeSlot::columnar(id), TypeSlot::columnar(id)],
        TypeSlot::columnar(DataTypeId::Boolean),
    )
}

fn sig_unary(id: DataTypeId) -> Signature {
    Signature::new([TypeSlot::columnar(id)], TypeSlot::columnar(id))
}

fn sig_aggregate(input: DataTypeId, result: DataTypeId) -> Signature {
    Signature::new([TypeSlot::columnar(input)], TypeSlot::scalar(result))
}

fn sig_where() -> Signature {
    Signature::new(
        [
            TypeSlot::columnar_var('A'),
            TypeSlot::columnar(DataTypeId::Boolean),
        ],
        TypeSlot::columnar_var('A'),
    )
}

fn sig_order_by() -> Signature {
    Signature::variadic(
        [TypeSlot::columnar_var('A')],
        TypeSlot::columnar(DataTypeId::Any),
        TypeSlot::columnar_var('A'),
    )
}

fn sig_merge() -> Signature {
    Signature::new(
        [TypeSlot::columnar_var('A'), TypeSlot::columnar_var('B')],
        TypeSlot::columnar_var('A'),
    )
}

// Broadcasting

enum Operand<T> {
    Column(Vec<T>),
    One(T),
}

fn operand<T: Clone>(
    term: &Term,
    col: fn(&Vector) -> Option<&[T]>,
    scal: fn(&ScalarValue) -> Option<T>,
) -> Result<Operand<T>> {
    match term {
        Term::Vector(v) => col(v)
            .map(|vals| Operand::Column(vals.to_vec()))
            .ok_or_else(|| CinderError::internal("kernel operand element type mismatch")),
        Term::Scalar(s) => scal(s)
            .map(Operand::One)
            .ok_or_else(|| CinderError::internal("kernel operand element type mismatch")),
        Term::Sql(_) => Err(CinderError::internal(
            "sql expression operand reached a memory kernel",
        )),
    }
}

/// Broadcast two operands to equal-length element vectors. Returns the
/// elements plus whether the result is columnar (false when both operands
/// were scalars).
fn broadcast_pair<T: Clone>(
    args: &[&Term],
    col: fn(&Vector) -> Option<&[T]>,
    scal: fn(&ScalarValue) -> Option<T>,
) -> Result<(Vec<T>, Vec<T>, bool)> {
    if args.len() != 2 {
        return Err(CinderError::internal(
            "binary kernel expects two operands",
        ));
    }

    let left = operand(args[0], col, scal)?;
    let right = operand(args[1], col, scal)?;

    Ok(match (left, right) {
        (Operand::Column(a), Operand::Column(b)) => {
            if a.len() != b.len() {
                return Err(CinderError::internal(format!(
                    "operand length mismatch: {} vs {}",
                    a.len(),
                    b.len(),
                )));
            }
            (a, b, true)
        }
        (Operand::Column(a), Operand::One(b)) => {
            let b = vec![b; a.len()];
            (a, b, true)
        }
        (Operand::One(a), Operand::Column(b)) => {
            let a = vec![a; b.len()];
            (a, b, true)
        }
        (Operand::One(a), Operand::One(b)) => (vec![a], vec![b], false),
    })
}

fn unary_operand<T: Clone>(
    args: &[&Term],
    col: fn(&Vector) -> Option<&[T]>,
    scal: fn(&ScalarValue) -> Option<T>,
) -> Result<(Vec<T>, bool)> {
    if args.len() != 1 {
        return Err(CinderError::internal("unary kernel expects one operand"));
    }
    Ok(match operand(args[0], col, scal)? {
        Operand::Column(vals) => (vals, true),
        Operand::One(val) => (vec![val], false),
    })
}

/// The single column operand of an aggregate. A scalar operand aggregates
/// as a one-element column.
fn aggregate_input(args: &[&Term]) -> Result<Vector> {
    if args.len() != 1 {
        return Err(CinderError::internal("aggregate expects one operand"));
    }
    match args[0] {
        Term::Vector(v) => Ok(v.clone()),
        Term::Scalar(s) => Vector::from_scalar(s.clone()),
        Term::Sql(_) => Err(CinderError::internal(
            "sql expression operand reached a memory kernel",
        )),
    }
}

// Elementwise kernels

fn map_pair_i64(args: &[&Term], f: impl Fn(i64, i64) -> Result<i64>) -> Result<Term> {
    let (a, b, columnar) = broadcast_pair(args, Vector::try_i64, ScalarValue::try_i64)?;
    let mut out = Vec::with_capacity(a.len());
    for (a, b) in a.into_iter().zip(b) {
        out.push(f(a, b)?);
    }
    Ok(if columnar {
        Term::Vector(Vector::Int64(out))
    } else {
        Term::Scalar(ScalarValue::Int64(out[0]))
    })
}

fn map_pair_f64(args: &[&Term], f: impl Fn(f64, f64) -> f64) -> Result<Term> {
    let (a, b, columnar) = broadcast_pair(args, Vector::try_f64, ScalarValue::try_f64)?;
    let out: Vec<f64> = a.into_iter().zip(b).map(|(a, b)| f(a, b)).collect();
    Ok(if columnar {
        Term::Vector(Vector::Float64(out))
    } else {
        Term::Scalar(ScalarValue::Float64(out[0]))
    })
}

fn map_pair_bool(args: &[&Term], f: impl Fn(bool, bool) -> bool) -> Result<Term> {
    let (a, b, columnar) = broadcast_pair(args, Vector::try_bool, ScalarValue::try_bool)?;
    let out: Vec<bool> = a.into_iter().zip(b).map(|(a, b)| f(a, b)).collect();
    Ok(if columnar {
        Term::Vector(Vector::Boolean(out))
    } else {
        Term::Scalar(ScalarValue::Boolean(out[0]))
    })
}

fn compare_pair<T: Clone>(
    args: &[&Term],
    col: fn(&Vector) -> Option<&[T]>,
    scal: fn(&ScalarValue) -> Option<T>,
    f: impl Fn(&T, &T) -> bool,
) -> Result<Term> {
    let (a, b, columnar) = broadcast_pair(args, col, scal)?;
    let out: Vec<bool> = a.iter().zip(b.iter()).map(|(a, b)| f(a, b)).collect();
    Ok(if columnar {
        Term::Vector(Vector::Boolean(out))
    } else {
        Term::Scalar(ScalarValue::Boolean(out[0]))
    })
}

fn checked_add(a: i64, b: i64) -> Result<i64> {
    a.checked_add(b)
        .ok_or_else(|| CinderError::internal("int64 overflow in add"))
}

fn checked_sub(a: i64, b: i64) -> Result<i64> {
    a.checked_sub(b)
        .ok_or_else(|| CinderError::internal("int64 overflow in subtract"))
}

fn checked_mul(a: i64, b: i64) -> Result<i64> {
    a.checked_mul(b)
        .ok_or_else(|| CinderError::internal("int64 overflow in multiply"))
}

fn checked_div(a: i64, b: i64) -> Result<i64> {
    a.checked_div(b)
        .ok_or_else(|| CinderError::internal("division by zero"))
}

/// Floor division: quotient rounds toward negative infinity.
fn floor_div(a: i64, b: i64) -> Result<i64> {
    if b == 0 {
        return Err(CinderError::internal("division by zero"));
    }
    let q = a / b;
    if a % b != 0 && (a < 0) != (b < 0) {
        Ok(q - 1)
    } else {
        Ok(q)
    }
}

fn checked_rem(a: i64, b: i64) -> Result<i64> {
    a.checked_rem(b)
        .ok_or_else(|| CinderError::internal("division by zero"))
}

/// Describes a comparison between a left and right element.
trait ComparisonOperation: Copy + Sync + Send + 'static {
    fn compare<T>(left: &T, right: &T) -> bool
    where
        T: PartialEq + PartialOrd;
}

#[derive(Clone, Copy)]
struct EqOperation;

impl ComparisonOperation for EqOperation {
    fn compare<T>(left: &T, right: &T) -> bool
    where
        T: PartialEq + PartialOrd,
    {
        left == right
    }
}

#[derive(Clone, Copy)]
struct NotEqOperation;

impl ComparisonOperation for NotEqOperation {
    fn compare<T>(left: &T, right: &T) -> bool
    where
        T: PartialEq + PartialOrd,
    {
        left != right
    }
}

#[derive(Clone, Copy)]
struct LtOperation;

impl ComparisonOperation for LtOperation {
    fn compare<T>(left: &T, right: &T) -> bool
    where
        T: PartialEq + PartialOrd,
    {
        left < right
    }
}

#[derive(Clone, Copy)]
struct LtEqOperation;

impl ComparisonOperation for LtEqOperation {
    fn compare<T>(left: &T, right: &T) -> bool
    where
        T: PartialEq + PartialOrd,
    {
        left <= right
    }
}

#[derive(Clone, Copy)]
struct GtOperation;

impl ComparisonOperation for GtOperation {
    fn compare<T>(left: &T, right: &T) -> bool
    where
        T: PartialEq + PartialOrd,
    {
        left > right
    }
}

#[derive(Clone, Copy)]
struct GtEqOperation;

impl ComparisonOperation for GtEqOperation {
    fn compare<T>(left: &T, right: &T) -> bool
    where
        T: PartialEq + PartialOrd,
    {
        left >= right
    }
}

/// Register one comparison operator for every comparable element type.
fn register_comparison<O: ComparisonOperation>(
    registry: &mut KernelRegistry,
    generic_op: &'static str,
) -> Result<()> {
    registry.register(
        generic_op,
        Backend::Memory,
        sig_compare(DataTypeId::Boolean),
        Arc::new(|args: &[&Term]| {
            compare_pair(args, Vector::try_bool, ScalarValue::try_bool, |a, b| {
                O::compare(a, b)
            })
        }),
    )?;
    registry.register(
        generic_op,
        Backend::Memory,
        sig_compare(DataTypeId::Int64),
        Arc::new(|args: &[&Term]| {
            compare_pair(args, Vector::try_i64, ScalarValue::try_i64, |a, b| {
                O::compare(a, b)
            })
        }),
    )?;
    registry.register(
        generic_op,
        Backend::Memory,
        sig_compare(DataTypeId::Float64),
        Arc::new(|args: &[&Term]| {
            compare_pair(args, Vector::try_f64, ScalarValue::try_f64, |a, b| {
                O::compare(a, b)
            })
        }),
    )?;
    registry.register(
        generic_op,
        Backend::Memory,
        sig_compare(DataTypeId::Utf8),
        Arc::new(|args: &[&Term]| {
            compare_pair(args, Vector::try_utf8, ScalarValue::try_utf8, |a, b| {
                O::compare(a, b)
            })
        }),
    )?;
    Ok(())
}

// Aggregates

fn sum_i64(input: &Vector) -> Result<ScalarValue> {
    let vals = input
        .try_i64()
        .ok_or_else(|| CinderError::internal("kernel operand element type mismatch"))?;
    let mut acc = 0_i64;
    for &v in vals {
        acc = checked_add(acc, v)?;
    }
    Ok(ScalarValue::Int64(acc))
}

fn sum_f64(input: &Vector) -> Result<ScalarValue> {
    let vals = input
        .try_f64()
        .ok_or_else(|| CinderError::internal("kernel operand element type mismatch"))?;
    Ok(ScalarValue::Float64(vals.iter().sum()))
}

fn avg(input: &Vector) -> Result<ScalarValue> {
    if input.is_empty() {
        return Err(CinderError::internal("avg over an empty column"));
    }
    let total = match input {
        Vector::Int64(vals) => vals.iter().map(|&v| v as f64).sum::<f64>(),
        Vector::Float64(vals) => vals.iter().sum::<f64>(),
        _ => return Err(CinderError::internal("kernel operand element type mismatch")),
    };
    Ok(ScalarValue::Float64(total / input.len() as f64))
}

fn min_max(input: &Vector, want_max: bool) -> Result<ScalarValue> {
    if input.is_empty() {
        return Err(CinderError::internal(
            "min/max over an empty column",
        ));
    }
    let mut best = 0_usize;
    for idx in 1..input.len() {
        let ord = input.cmp_elements(idx, best);
        if (want_max && ord.is_gt()) || (!want_max && ord.is_lt()) {
            best = idx;
        }
    }
    input
        .value(best)
        .ok_or_else(|| CinderError::internal("aggregate index out of bounds"))
}

// Filter and ordering

fn where_kernel(args: &[&Term]) -> Result<Term> {
    if args.len() != 2 {
        return Err(CinderError::internal("where expects two operands"));
    }
    let input = args[0].try_vector()?;

    match args[1] {
        Term::Vector(mask) => {
            let mask = mask
                .try_bool()
                .ok_or_else(|| CinderError::internal("where predicate must be boolean"))?;
            Ok(Term::Vector(input.filter(mask)?))
        }
        // A scalar predicate keeps either everything or nothing.
        Term::Scalar(ScalarValue::Boolean(true)) => Ok(Term::Vector(input.clone())),
        Term::Scalar(ScalarValue::Boolean(false)) => {
            Ok(Term::Vector(input.filter(&vec![false; input.len()])?))
        }
        _ => Err(CinderError::internal("where predicate must be boolean")),
    }
}

fn order_by_kernel(args: &[&Term]) -> Result<Term> {
    if args.len() < 2 {
        return Err(CinderError::internal(
            "order_by requires an input and at least one ordering key",
        ));
    }
    let input = args[0].try_vector()?;
    let keys = args[1..]
        .iter()
        .map(|key| key.try_vector())
        .collect::<Result<Vec<_>>>()?;

    for key in &keys {
        if key.len() != input.len() {
            return Err(CinderError::internal(format!(
                "ordering key length {} does not match input length {}",
                key.len(),
                input.len(),
            )));
        }
    }

    let mut indices: Vec<usize> = (0..input.len()).collect();
    // Stable sort, keys compared lexicographically.
    indices.sort_by(|&a, &b| {
        keys.iter()
            .map(|key| key.cmp_elements(a, b))
            .find(|ord| !ord.is_eq())
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    Ok(Term::Vector(input.take(&indices)?))
}

/// Register the builtin memory kernels.
pub fn register_builtin(registry: &mut KernelRegistry) -> Result<()> {
    // Arithmetic, int64
    registry.register(
        op::ADD,
        Backend::Memory,
        sig_binary(DataTypeId::Int64),
        Arc::new(|args: &[&Term]| map_pair_i64(args, checked_add)),
    )?;
    registry.register(
        op::SUBTRACT,
        Backend::Memory,
        sig_binary(DataTypeId::Int64),
        Arc::new(|args: &[&Term]| map_pair_i64(args, checked_sub)),
    )?;
    registry.register(
        op::MULTIPLY,
        Backend::Memory,
        sig_binary(DataTypeId::Int64),
        Arc::new(|args: &[&Term]| map_pair_i64(args, checked_mul)),
    )?;
    registry.register(
        op::DIVIDE,
        Backend::Memory,
        sig_binary(DataTypeId::Int64),
        Arc::new(|args: &[&Term]| map_pair_i64(args, checked_div)),
    )?;
    registry.register(
        op::FLOOR_DIVIDE,
        Backend::Memory,
        sig_binary(DataTypeId::Int64),
        Arc::new(|args: &[&Term]| map_pair_i64(args, floor_div)),
    )?;
    registry.register(
        op::MOD,
        Backend::Memory,
        sig_binary(DataTypeId::Int64),
        Arc::new(|args: &[&Term]| map_pair_i64(args, checked_rem)),
    )?;

    // Arithmetic, float64
    registry.register(
        op::ADD,
        Backend::Memory,
        sig_binary(DataTypeId::Float64),
        Arc::new(|args: &[&Term]| map_pair_f64(args, |a, b| a + b)),
    )?;
    registry.register(
        op::SUBTRACT,
        Backend::Memory,
        sig_binary(DataTypeId::Float64),
        Arc::new(|args: &[&Term]| map_pair_f64(args, |a, b| a - b)),
    )?;
    registry.register(
        op::MULTIPLY,
        Backend::Memory,
        sig_binary(DataTypeId::Float64),
        Arc::new(|args: &[&Term]| map_pair_f64(args, |a, b| a * b)),
    )?;
    registry.register(
        op::DIVIDE,
        Backend::Memory,
        sig_binary(DataTypeId::Float64),
        Arc::new(|args: &[&Term]| map_pair_f64(args, |a, b| a / b)),
    )?;
    registry.register(
        op::FLOOR_DIVIDE,
        Backend::Memory,
        sig_binary(DataTypeId::Float64),
        Arc::new(|args: &[&Term]| map_pair_f64(args, |a, b| (a / b).floor())),
    )?;
    registry.register(
        op::MOD,
        Backend::Memory,
        sig_binary(DataTypeId::Float64),
        Arc::new(|args: &[&Term]| map_pair_f64(args, |a, b| a % b)),
    )?;

    // Negation
    registry.register(
        op::NEGATIVE,
        Backend::Memory,
        sig_unary(DataTypeId::Int64),
        Arc::new(|args: &[&Term]| {
            let (vals, columnar) = unary_operand(args, Vector::try_i64, ScalarValue::try_i64)?;
            let mut out = Vec::with_capacity(vals.len());
            for v in vals {
                out.push(
                    v.checked_neg()
                        .ok_or_else(|| CinderError::internal("int64 overflow in negative"))?,
                );
            }
            Ok(if columnar {
                Term::Vector(Vector::Int64(out))
            } else {
                Term::Scalar(ScalarValue::Int64(out[0]))
            })
        }),
    )?;
    registry.register(
        op::NEGATIVE,
        Backend::Memory,
        sig_unary(DataTypeId::Float64),
        Arc::new(|args: &[&Term]| {
            let (vals, columnar) = unary_operand(args, Vector::try_f64, ScalarValue::try_f64)?;
            let out: Vec<f64> = vals.into_iter().map(|v| -v).collect();
            Ok(if columnar {
                Term::Vector(Vector::Float64(out))
            } else {
                Term::Scalar(ScalarValue::Float64(out[0]))
            })
        }),
    )?;

    // Comparison
    register_comparison::<EqOperation>(registry, op::EQUAL)?;
    register_comparison::<NotEqOperation>(registry, op::NOT_EQUAL)?;
    register_comparison::<LtOperation>(registry, op::LESS)?;
    register_comparison::<LtEqOperation>(registry, op::LESS_EQUAL)?;
    register_comparison::<GtOperation>(registry, op::GREATER)?;
    register_comparison::<GtEqOperation>(registry, op::GREATER_EQUAL)?;

    // Logical. Unlike the sql backend, xor is native here.
    registry.register(
        op::LOGICAL_AND,
        Backend::Memory,
        sig_binary(DataTypeId::Boolean),
        Arc::new(|args: &[&Term]| map_pair_bool(args, |a, b| a && b)),
    )?;
    registry.register(
        op::LOGICAL_OR,
        Backend::Memory,
        sig_binary(DataTypeId::Boolean),
        Arc::new(|args: &[&Term]| map_pair_bool(args, |a, b| a || b)),
    )?;
    registry.register(
        op::LOGICAL_XOR,
        Backend::Memory,
        sig_binary(DataTypeId::Boolean),
        Arc::new(|args: &[&Term]| map_pair_bool(args, |a, b| a ^ b)),
    )?;
    registry.register(
        op::LOGICAL_NOT,
        Backend::Memory,
        sig_unary(DataTypeId::Boolean),
        Arc::new(|args: &[&Term]| {
            let (vals, columnar) = unary_operand(args, Vector::try_bool, ScalarValue::try_bool)?;
            let out: Vec<bool> = vals.into_iter().map(|v| !v).collect();
            Ok(if columnar {
                Term::Vector(Vector::Boolean(out))
            } else {
                Term::Scalar(ScalarValue::Boolean(out[0]))
            })
        }),
    )?;

    // Aggregates
    registry.register(
        op::SUM,
        Backend::Memory,
        sig_aggregate(DataTypeId::Int64, DataTypeId::Int64),
        Arc::new(|args: &[&Term]| Ok(Term::Scalar(sum_i64(&aggregate_input(args)?)?))),
    )?;
    registry.register(
        op::SUM,
        Backend::Memory,
        sig_aggregate(DataTypeId::Float64, DataTypeId::Float64),
        Arc::new(|args: &[&Term]| Ok(Term::Scalar(sum_f64(&aggregate_input(args)?)?))),
    )?;
    registry.register(
        op::AVG,
        Backend::Memory,
        sig_aggregate(DataTypeId::Int64, DataTypeId::Float64),
        Arc::new(|args: &[&Term]| Ok(Term::Scalar(avg(&aggregate_input(args)?)?))),
    )?;
    registry.register(
        op::AVG,
        Backend::Memory,
        sig_aggregate(DataTypeId::Float64, DataTypeId::Float64),
        Arc::new(|args: &[&Term]| Ok(Term::Scalar(avg(&aggregate_input(args)?)?))),
    )?;
    for (generic_op, want_max) in [(op::MIN, false), (op::MAX, true)] {
        for id in [DataTypeId::Int64, DataTypeId::Float64, DataTypeId::Utf8] {
            registry.register(
                generic_op,
                Backend::Memory,
                sig_aggregate(id, id),
                Arc::new(move |args: &[&Term]| {
                    Ok(Term::Scalar(min_max(&aggregate_input(args)?, want_max)?))
                }),
            )?;
        }
    }

    // Filter and ordering
    registry.register(
        op::WHERE,
        Backend::Memory,
        sig_where(),
        Arc::new(where_kernel),
    )?;
    registry.register(
        op::ORDER_BY,
        Backend::Memory,
        sig_order_by(),
        Arc::new(order_by_kernel),
    )?;

    // Join stays registered so graph-level calls dispatch, but always fails.
    registry.register(
        op::MERGE,
        Backend::Memory,
        sig_merge(),
        Arc::new(|_args: &[&Term]| -> Result<Term> { not_implemented!("merge/join") }),
    )?;

    Ok(())
}
