//! Plan execution.
//!
//! Runs a compiled plan over a register file. Kernel failures abort the
//! whole run; the kernel's error surfaces unchanged, tagged with the failing
//! node's operator and backend.

use cinder_error::{CinderError, Result};
use tracing::debug;

use crate::arrays::Array;
use crate::arrays::vector::Vector;
use crate::backend::Backend;
use crate::compile::{Environment, Plan, Step};
use crate::expr::{BoundTerm, ParamId};
use crate::functions::Term;
use crate::sql::ast::SqlExpr;
use crate::storage::{EvalCaps, StorageEngine};

/// Execute a compiled plan against a storage target.
///
/// `output`, if supplied, is reused as the write target when shapes and
/// types match; a mismatch fails with `ResultShapeMismatch` before any write
/// happens. `debug` enables per-step tracing and never changes the result.
pub fn run(
    plan: &Plan,
    env: &Environment,
    storage: Option<&dyn StorageEngine>,
    caps: &EvalCaps,
    output: Option<&mut Array>,
    debug: bool,
) -> Result<Array> {
    if env.args.len() != plan.params {
        return Err(CinderError::internal(format!(
            "environment carries {} parameters, plan expects {}",
            env.args.len(),
            plan.params,
        )));
    }

    let mut registers: Vec<Option<Term>> = vec![None; plan.registers];
    for (idx, (id, term)) in env.args.iter().enumerate() {
        registers[idx] = Some(load_param(*id, term, plan.backend)?);
    }

    for step in &plan.steps {
        match step {
            Step::Literal { dst, value } => {
                if debug {
                    debug!(dst, value = %value, "plan step: load literal");
                }
                let term = match plan.backend {
                    Backend::Sql => Term::Sql(SqlExpr::Literal(value.clone())),
                    Backend::Memory => Term::Scalar(value.clone()),
                };
                registers[*dst] = Some(term);
            }
            Step::Apply(apply) => {
                if debug {
                    debug!(
                        op = %apply.op,
                        args = ?apply.args,
                        dst = apply.dst,
                        "plan step: invoke kernel"
                    );
                }
                let args = apply
                    .args
                    .iter()
                    .map(|&reg| {
                        registers[reg].as_ref().ok_or_else(|| {
                            CinderError::internal(format!("operand register {reg} is empty"))
                        })
                    })
                    .collect::<Result<Vec<_>>>()?;

                let term = (apply.kernel)(&args).map_err(|e| CinderError::KernelFailed {
                    op: apply.op.clone(),
                    backend: plan.backend.as_str(),
                    source: Box::new(e),
                })?;
                registers[apply.dst] = Some(term);
            }
        }
    }

    let result = registers[plan.result]
        .take()
        .ok_or_else(|| CinderError::internal("result register is empty"))?;

    let vector = match storage {
        Some(engine) => {
            let bulk = caps.efficient_write && engine.supports_bulk_write();
            if debug {
                debug!(bulk, backend = %plan.backend, "materializing result via storage engine");
            }
            engine.execute_plan(&result, env, caps)?
        }
        None => match result {
            Term::Vector(v) => v,
            Term::Scalar(s) => Vector::from_scalar(s)?,
            Term::Sql(_) => {
                return Err(CinderError::unsupported(
                    "sql-backed plan requires a storage engine to materialize",
                ));
            }
        },
    };

    write_output(vector, output)
}

/// Convert a bound term into the runtime representation the target backend
/// expects.
fn load_param(id: ParamId, term: &BoundTerm, backend: Backend) -> Result<Term> {
    match (term, backend) {
        (BoundTerm::Array(arr), Backend::Memory) => {
            let vector = arr.to_vector().map_err(|_| {
                CinderError::unsupported(format!("parameter {id} must be a concrete array"))
            })?;
            Ok(Term::Vector(vector))
        }
        (BoundTerm::SqlColumn { column, .. }, Backend::Sql) => {
            Ok(Term::Sql(SqlExpr::column(column.clone())))
        }
        (BoundTerm::Array(_), Backend::Sql) | (BoundTerm::SqlColumn { .. }, Backend::Memory) => {
            Err(CinderError::unsupported(format!(
                "parameter {id} is not available on backend '{backend}'"
            )))
        }
    }
}

fn write_output(vector: Vector, output: Option<&mut Array>) -> Result<Array> {
    let Some(output) = output else {
        return Ok(Array::concrete(vector));
    };

    let buf = output
        .buffer()
        .ok_or_else(|| CinderError::unsupported("output handle must be concrete"))?;

    {
        let current = buf.read();
        if current.datatype() != vector.datatype() || current.len() != vector.len() {
            return Err(CinderError::ResultShapeMismatch {
                expected: format!("{} rows of {}", current.len(), current.datatype()),
                got: format!("{} rows of {}", vector.len(), vector.datatype()),
            });
        }
    }

    *buf.write() = vector;
    Ok(output.clone())
}
