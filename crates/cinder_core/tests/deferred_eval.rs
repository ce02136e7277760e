//! End-to-end evaluation of deferred graphs on the memory backend.

use std::sync::Arc;

use cinder_core::arrays::Array;
use cinder_core::arrays::scalar::ScalarValue;
use cinder_core::arrays::vector::Vector;
use cinder_core::backend::memory::MemoryStorage;
use cinder_core::eval::evaluate;
use cinder_core::expr::{self, Context, DeferredExpr, ExprNode, ParamId};
use cinder_core::storage::EvalCaps;
use cinder_error::CinderError;

fn deferred(graph: Arc<ExprNode>, ctx: Context) -> Array {
    Array::deferred(DeferredExpr::new(graph, Arc::new(ctx)))
}

fn int_ctx(bindings: &[(u32, &[i64])]) -> Context {
    let mut ctx = Context::new();
    for (id, vals) in bindings {
        ctx.bind_array(ParamId(*id), Array::concrete(Vector::Int64(vals.to_vec())));
    }
    ctx
}

/// Backend-agnostic reference evaluator over int64 columns: substitute each
/// parameter's concrete value and reduce node-by-node.
fn reference_eval(node: &ExprNode, bindings: &[(u32, &[i64])]) -> Vec<i64> {
    match node {
        ExprNode::Param(id) => bindings
            .iter()
            .find(|(bid, _)| *bid == id.0)
            .map(|(_, vals)| vals.to_vec())
            .expect("bound parameter"),
        ExprNode::Literal(ScalarValue::Int64(v)) => vec![*v],
        ExprNode::Literal(other) => panic!("unexpected literal: {other:?}"),
        ExprNode::Apply { op, inputs } => {
            let mut evaled: Vec<Vec<i64>> = inputs
                .iter()
                .map(|input| reference_eval(input, bindings))
                .collect();
            let len = evaled.iter().map(Vec::len).max().unwrap();
            for col in &mut evaled {
                if col.len() == 1 && len > 1 {
                    *col = vec![col[0]; len];
                }
            }
            match op.as_str() {
                "add" => (0..len).map(|i| evaled[0][i] + evaled[1][i]).collect(),
                "subtract" => (0..len).map(|i| evaled[0][i] - evaled[1][i]).collect(),
                "multiply" => (0..len).map(|i| evaled[0][i] * evaled[1][i]).collect(),
                "negative" => evaled[0].iter().map(|v| -v).collect(),
                other => panic!("unexpected operator: {other}"),
            }
        }
    }
}

#[test]
fn deferred_matches_reference_evaluation() {
    let bindings: &[(u32, &[i64])] = &[(0, &[1, 2, 3, 4]), (1, &[10, 20, 30, 40])];

    // -(a * b) + (a - 2)
    let a = expr::param(ParamId(0));
    let b = expr::param(ParamId(1));
    let graph = expr::add(
        expr::negative(expr::multiply(a.clone(), b)),
        expr::subtract(a, expr::lit(2_i64)),
    );

    let expected = reference_eval(&graph, bindings);

    let arr = deferred(graph, int_ctx(bindings));
    let out = arr.eval().unwrap();
    assert_eq!(out.to_vector().unwrap(), Vector::Int64(expected));
}

#[test]
fn comparison_and_logic_chain() {
    // (a > 2) AND NOT (a == 4)
    let a = expr::param(ParamId(0));
    let graph = expr::logical_and(
        expr::greater(a.clone(), expr::lit(2_i64)),
        expr::logical_not(expr::equal(a, expr::lit(4_i64))),
    );

    let arr = deferred(graph, int_ctx(&[(0, &[1, 2, 3, 4, 5])]));
    let out = arr.eval().unwrap();
    assert_eq!(
        out.to_vector().unwrap(),
        Vector::Boolean(vec![false, false, true, false, true])
    );
}

#[test]
fn xor_truth_table_on_memory_backend() {
    let mut ctx = Context::new();
    ctx.bind_array(
        ParamId(0),
        Array::concrete(Vector::Boolean(vec![false, false, true, true])),
    );
    ctx.bind_array(
        ParamId(1),
        Array::concrete(Vector::Boolean(vec![false, true, false, true])),
    );

    let graph = expr::logical_xor(expr::param(ParamId(0)), expr::param(ParamId(1)));
    let out = deferred(graph, ctx).eval().unwrap();
    assert_eq!(
        out.to_vector().unwrap(),
        Vector::Boolean(vec![false, true, true, false])
    );
}

#[test]
fn filter_then_aggregate() {
    // avg(a WHERE a > 10)
    let a = expr::param(ParamId(0));
    let graph = expr::avg(expr::where_(
        a.clone(),
        expr::greater(a, expr::lit(10_i64)),
    ));

    let arr = deferred(graph, int_ctx(&[(0, &[5, 20, 40, 3])]));
    let out = arr.eval().unwrap();
    assert_eq!(out.to_vector().unwrap(), Vector::Float64(vec![30.0]));
}

#[test]
fn order_by_key_column() {
    let graph = expr::order_by(expr::param(ParamId(0)), expr::param(ParamId(1)));
    let arr = deferred(graph, int_ctx(&[(0, &[10, 20, 30]), (1, &[3, 1, 2])]));
    let out = arr.eval().unwrap();
    assert_eq!(out.to_vector().unwrap(), Vector::Int64(vec![20, 30, 10]));
}

#[test]
fn merge_fails_not_implemented() {
    let graph = expr::merge(expr::param(ParamId(0)), expr::param(ParamId(1)));
    let arr = deferred(graph, int_ctx(&[(0, &[1]), (1, &[2])]));

    let err = arr.eval().unwrap_err();
    match err {
        CinderError::KernelFailed { op, source, .. } => {
            assert_eq!(op, "merge");
            assert!(matches!(*source, CinderError::NotImplemented(_)), "{source}");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn efficient_write_hint_degrades_silently() {
    let a = expr::param(ParamId(0));
    let graph = expr::add(a, expr::lit(1_i64));
    let bindings: &[(u32, &[i64])] = &[(0, &[1, 2])];

    // Engine with a bulk-write path and one without produce the same
    // result; the hint never errors.
    let with_bulk = MemoryStorage::new();
    let without_bulk = MemoryStorage::without_bulk_write();
    let caps = EvalCaps {
        efficient_write: true,
    };

    let arr = deferred(graph.clone(), int_ctx(bindings));
    let out_bulk = evaluate(&arr, Some(&with_bulk), &caps, None, false).unwrap();

    let arr = deferred(graph, int_ctx(bindings));
    let out_plain = evaluate(&arr, Some(&without_bulk), &caps, None, false).unwrap();

    assert_eq!(
        out_bulk.to_vector().unwrap(),
        out_plain.to_vector().unwrap()
    );
}

#[test]
fn output_reuse_through_evaluate() {
    let graph = expr::multiply(expr::param(ParamId(0)), expr::lit(3_i64));
    let arr = deferred(graph, int_ctx(&[(0, &[1, 2])]));

    let mut output = Array::concrete(Vector::Int64(vec![0, 0]));
    let result = evaluate(
        &arr,
        None,
        &EvalCaps::default(),
        Some(&mut output),
        false,
    )
    .unwrap();

    assert!(result.shares_buffer(&output));
    assert_eq!(output.to_vector().unwrap(), Vector::Int64(vec![3, 6]));
}
