//! Expression graph to executable plan compilation.
//!
//! Compilation is pure: it resolves every operator node to a backend kernel
//! through the registry and flattens the graph into register-slot steps. The
//! storage engine is only consulted for its backend tag.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use cinder_error::{CinderError, Result};
use tracing::debug;

use crate::arrays::scalar::ScalarValue;
use crate::backend::Backend;
use crate::expr::{BoundTerm, Context, DeferredExpr, ExprNode, ParamId};
use crate::functions::{KernelFn, KernelRegistry, TermShape, default_registry};
use crate::storage::StorageEngine;

/// One kernel invocation in a compiled plan.
#[derive(Clone)]
pub struct ApplyStep {
    /// Generic operator name, kept for diagnostics.
    pub op: String,
    /// The resolved kernel.
    pub kernel: KernelFn,
    /// Operand registers.
    pub args: Vec<usize>,
    /// Destination register.
    pub dst: usize,
    /// Unified result shape.
    pub shape: TermShape,
}

impl fmt::Debug for ApplyStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApplyStep")
            .field("op", &self.op)
            .field("args", &self.args)
            .field("dst", &self.dst)
            .field("shape", &self.shape)
            .finish_non_exhaustive()
    }
}

/// Two steps are equal when they invoke the same registered kernel over the
/// same registers.
impl PartialEq for ApplyStep {
    fn eq(&self, other: &Self) -> bool {
        self.op == other.op
            && self.args == other.args
            && self.dst == other.dst
            && self.shape == other.shape
            && Arc::ptr_eq(&self.kernel, &other.kernel)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Step {
    /// Materialize a literal into a register.
    Literal { dst: usize, value: ScalarValue },
    /// Invoke a resolved kernel over registers.
    Apply(ApplyStep),
}

/// Executable form of an expression graph for one backend.
#[derive(Debug, Clone, PartialEq)]
pub struct Plan {
    pub backend: Backend,
    /// Total registers used. Parameters occupy the first `params` registers
    /// in calling order.
    pub registers: usize,
    pub params: usize,
    pub steps: Vec<Step>,
    /// Register holding the final result.
    pub result: usize,
    pub result_shape: TermShape,
}

/// Resolved parameter bindings for a plan, in calling order.
#[derive(Debug, Clone)]
pub struct Environment {
    pub args: Vec<(ParamId, BoundTerm)>,
}

/// Compile with the process-wide default registry.
pub fn compile(
    expr: &DeferredExpr,
    storage: Option<&dyn StorageEngine>,
) -> Result<(Plan, Environment)> {
    compile_with(expr, storage, default_registry())
}

/// Compile an expression graph into a plan for the backend implied by
/// `storage`, or inferred from the context bindings when no storage is
/// given.
pub fn compile_with(
    expr: &DeferredExpr,
    storage: Option<&dyn StorageEngine>,
    registry: &KernelRegistry,
) -> Result<(Plan, Environment)> {
    let ctx = expr.context.as_ref();
    let backend = resolve_backend(ctx, storage, &expr.graph)?;

    let mut compiler = Compiler {
        registry,
        backend,
        param_regs: HashMap::default(),
        registers: 0,
        steps: Vec::new(),
        memo: HashMap::default(),
    };

    let mut env_args = Vec::new();
    for (id, term) in ctx.args() {
        let shape = param_shape(term, backend)?;
        compiler.param_regs.insert(id, (compiler.registers, shape));
        env_args.push((id, term.clone()));
        compiler.registers += 1;
    }
    let params = env_args.len();

    let (result, result_shape) = compiler.compile_node(&expr.graph)?;

    debug!(
        backend = %backend,
        steps = compiler.steps.len(),
        registers = compiler.registers,
        "compiled expression graph"
    );

    Ok((
        Plan {
            backend,
            registers: compiler.registers,
            params,
            steps: compiler.steps,
            result,
            result_shape,
        },
        Environment { args: env_args },
    ))
}

/// Pick the target backend: an explicit storage tag wins, otherwise the
/// backend is inferred from the concrete terms bound in the context.
fn resolve_backend(
    ctx: &Context,
    storage: Option<&dyn StorageEngine>,
    graph: &ExprNode,
) -> Result<Backend> {
    if let Some(storage) = storage {
        return Ok(storage.backend());
    }

    let mut inferred = None;
    for (_, term) in ctx.args() {
        let backend = match term {
            BoundTerm::Array(_) => Backend::Memory,
            BoundTerm::SqlColumn { .. } => Backend::Sql,
        };
        match inferred {
            None => inferred = Some(backend),
            Some(prev) if prev != backend => {
                return Err(CinderError::unsupported(
                    "cross-backend expression: context binds both memory and sql sources",
                ));
            }
            Some(_) => {}
        }
    }

    // No storage and no bindings to infer from. There is no implicit
    // default backend.
    inferred.ok_or_else(|| CinderError::NoMatchingKernel {
        op: root_op(graph).to_string(),
        backend: "undetermined",
        operands: String::new(),
    })
}

fn root_op(graph: &ExprNode) -> &str {
    match graph {
        ExprNode::Apply { op, .. } => op,
        ExprNode::Param(_) => "param",
        ExprNode::Literal(_) => "literal",
    }
}

fn param_shape(term: &BoundTerm, backend: Backend) -> Result<TermShape> {
    match (term, backend) {
        (BoundTerm::Array(arr), Backend::Memory) => {
            let datatype = arr.datatype().map_err(|_| {
                CinderError::unsupported("bound parameters must be concrete in-memory arrays")
            })?;
            Ok(TermShape::column(datatype))
        }
        (BoundTerm::SqlColumn { datatype, .. }, Backend::Sql) => Ok(TermShape::column(*datatype)),
        (BoundTerm::Array(_), Backend::Sql) => Err(CinderError::unsupported(
            "in-memory parameter bound in a sql-backed expression",
        )),
        (BoundTerm::SqlColumn { .. }, Backend::Memory) => Err(CinderError::unsupported(
            "sql column parameter bound in a memory expression",
        )),
    }
}

struct Compiler<'a> {
    registry: &'a KernelRegistry,
    backend: Backend,
    param_regs: HashMap<ParamId, (usize, TermShape), ahash::RandomState>,
    registers: usize,
    steps: Vec<Step>,
    /// Shared subgraphs (same node pointer) compile to a single step.
    memo: HashMap<*const ExprNode, (usize, TermShape), ahash::RandomState>,
}

impl Compiler<'_> {
    fn alloc(&mut self) -> usize {
        let reg = self.registers;
        self.registers += 1;
        reg
    }

    fn compile_node(&mut self, node: &Arc<ExprNode>) -> Result<(usize, TermShape)> {
        if let Some(hit) = self.memo.get(&Arc::as_ptr(node)) {
            return Ok(*hit);
        }

        let out = match node.as_ref() {
            ExprNode::Param(id) => self.param_regs.get(id).copied().ok_or_else(|| {
                CinderError::internal(format!(
                    "parameter {id} referenced by the graph is not bound in the context"
                ))
            })?,
            ExprNode::Literal(value) => {
                let datatype = value.datatype().ok_or_else(|| {
                    CinderError::unsupported("untyped null literal in expression graph")
                })?;
                let dst = self.alloc();
                self.steps.push(Step::Literal {
                    dst,
                    value: value.clone(),
                });
                (dst, TermShape::scalar(datatype))
            }
            ExprNode::Apply { op, inputs } => {
                let mut args = Vec::with_capacity(inputs.len());
                let mut shapes = Vec::with_capacity(inputs.len());
                for input in inputs {
                    let (reg, shape) = self.compile_node(input)?;
                    args.push(reg);
                    shapes.push(shape);
                }

                let resolved = self.registry.lookup(op, self.backend, &shapes)?;
                let dst = self.alloc();
                self.steps.push(Step::Apply(ApplyStep {
                    op: op.clone(),
                    kernel: resolved.kernel,
                    args,
                    dst,
                    shape: resolved.result,
                }));
                (dst, resolved.result)
            }
        };

        self.memo.insert(Arc::as_ptr(node), out);
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arrays::Array;
    use crate::arrays::datatype::DataType;
    use crate::arrays::vector::Vector;
    use crate::backend::memory::MemoryStorage;
    use crate::expr::{self, ParamId};

    fn memory_context() -> Arc<Context> {
        let mut ctx = Context::new();
        ctx.bind_array(ParamId(0), Array::concrete(Vector::Int64(vec![1, 2, 3])));
        Arc::new(ctx)
    }

    fn sql_context() -> Arc<Context> {
        let mut ctx = Context::new();
        ctx.bind_sql_column(ParamId(0), "amount", DataType::Int64);
        Arc::new(ctx)
    }

    #[test]
    fn equal_graphs_compile_to_equal_plans() {
        let ctx = memory_context();
        let build = || {
            DeferredExpr::new(
                expr::add(expr::param(ParamId(0)), expr::lit(1_i64)),
                ctx.clone(),
            )
        };

        let (plan_a, _) = compile(&build(), None).unwrap();
        let (plan_b, _) = compile(&build(), None).unwrap();
        assert_eq!(plan_a, plan_b);
    }

    #[test]
    fn backend_inferred_from_bindings() {
        let deferred = DeferredExpr::new(
            expr::add(expr::param(ParamId(0)), expr::lit(1_i64)),
            sql_context(),
        );
        let (plan, _) = compile(&deferred, None).unwrap();
        assert_eq!(plan.backend, Backend::Sql);

        let deferred = DeferredExpr::new(
            expr::add(expr::param(ParamId(0)), expr::lit(1_i64)),
            memory_context(),
        );
        let (plan, _) = compile(&deferred, None).unwrap();
        assert_eq!(plan.backend, Backend::Memory);
    }

    #[test]
    fn storage_tag_wins_over_inference() {
        let deferred = DeferredExpr::new(expr::negative(expr::param(ParamId(0))), memory_context());
        let storage = MemoryStorage::new();
        let (plan, _) = compile(&deferred, Some(&storage)).unwrap();
        assert_eq!(plan.backend, Backend::Memory);
    }

    #[test]
    fn undetermined_backend_is_no_matching_kernel() {
        // No storage, and the context binds nothing to infer from.
        let deferred = DeferredExpr::new(
            expr::add(expr::lit(1_i64), expr::lit(2_i64)),
            Arc::new(Context::new()),
        );
        let err = compile(&deferred, None).unwrap_err();
        assert!(matches!(err, CinderError::NoMatchingKernel { .. }), "{err}");
    }

    #[test]
    fn cross_backend_bindings_rejected() {
        let mut ctx = Context::new();
        ctx.bind_array(ParamId(0), Array::concrete(Vector::Int64(vec![1])));
        ctx.bind_sql_column(ParamId(1), "b", DataType::Int64);

        let deferred = DeferredExpr::new(
            expr::add(expr::param(ParamId(0)), expr::param(ParamId(1))),
            Arc::new(ctx),
        );
        let err = compile(&deferred, None).unwrap_err();
        assert!(
            matches!(err, CinderError::UnsupportedOperation(_)),
            "{err}"
        );
    }

    #[test]
    fn unbound_parameter_fails() {
        let deferred = DeferredExpr::new(
            expr::add(expr::param(ParamId(7)), expr::lit(1_i64)),
            memory_context(),
        );
        let err = compile(&deferred, None).unwrap_err();
        assert!(err.to_string().contains("%7"), "{err}");
    }

    #[test]
    fn shared_subgraph_compiles_once() {
        let ctx = memory_context();
        let shared = expr::add(expr::param(ParamId(0)), expr::lit(1_i64));
        // (p + 1) * (p + 1) referencing the same subgraph node twice.
        let graph = expr::multiply(shared.clone(), shared);
        let (plan, _) = compile(&DeferredExpr::new(graph, ctx), None).unwrap();

        let applies = plan
            .steps
            .iter()
            .filter(|step| matches!(step, Step::Apply(_)))
            .count();
        // One add plus one multiply; the shared add is not recompiled.
        assert_eq!(applies, 2);
    }

    #[test]
    fn order_by_key_spellings_compile_identically() {
        let mut ctx = Context::new();
        ctx.bind_sql_column(ParamId(0), "v", DataType::Int64);
        ctx.bind_sql_column(ParamId(1), "k", DataType::Int64);
        let ctx = Arc::new(ctx);

        let input = expr::param(ParamId(0));
        let key = expr::param(ParamId(1));

        let bare = DeferredExpr::new(
            expr::order_by(input.clone(), key.clone()),
            ctx.clone(),
        );
        let seq = DeferredExpr::new(expr::order_by(input, vec![key]), ctx);

        let (plan_bare, _) = compile(&bare, None).unwrap();
        let (plan_seq, _) = compile(&seq, None).unwrap();
        assert_eq!(plan_bare, plan_seq);
    }
}
