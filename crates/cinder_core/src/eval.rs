//! The evaluation entry point.

use cinder_error::{CinderError, Result};

use crate::arrays::Array;
use crate::arrays::capabilities::Capabilities;
use crate::arrays::scalar::ScalarValue;
use crate::compile;
use crate::runtime;
use crate::storage::{EvalCaps, StorageEngine};

/// Evaluate an array handle into a concrete array.
///
/// Deferred handles compile and run against the target storage. Remote
/// handles are pulled into local memory and wrapped concrete. A handle that
/// is already concrete comes back unchanged: the result aliases the same
/// buffer, and callers must not rely on copy semantics here.
pub fn evaluate(
    arr: &Array,
    storage: Option<&dyn StorageEngine>,
    caps: &EvalCaps,
    output: Option<&mut Array>,
    debug: bool,
) -> Result<Array> {
    match arr.capabilities() {
        Capabilities { deferred: true, .. } => {
            let expr = arr.deferred_expr().ok_or_else(|| {
                CinderError::internal("deferred capability without a deferred backing")
            })?;
            let (plan, env) = compile::compile(expr, storage)?;
            runtime::run(&plan, &env, storage, caps, output, debug)
        }
        Capabilities { remote: true, .. } => {
            let source = arr.remote_source().ok_or_else(|| {
                CinderError::internal("remote capability without a remote backing")
            })?;
            // Pull the data into local memory. There is no caching layer
            // yet; every evaluation refetches the remote buffer.
            let vector = source.fetch()?;
            Ok(Array::concrete(vector))
        }
        _ => Ok(arr.clone()),
    }
}

/// Append values to an appendable data source.
///
/// All-or-nothing: every value is validated against the buffer's element
/// type before the first element is written. A source without the
/// `appendable` capability fails without being touched.
pub fn append(arr: &Array, values: &[ScalarValue]) -> Result<()> {
    if !arr.capabilities().appendable {
        return Err(CinderError::unsupported(
            "data source cannot be appended to",
        ));
    }

    let buf = arr.buffer().ok_or_else(|| {
        CinderError::internal("appendable capability without a concrete backing")
    })?;

    let mut guard = buf.write();
    let datatype = guard.datatype();
    for value in values {
        if value.datatype() != Some(datatype) {
            return Err(CinderError::unsupported(format!(
                "cannot append {} value to {} buffer",
                value
                    .datatype()
                    .map(|dt| dt.to_string())
                    .unwrap_or_else(|| "null".to_string()),
                datatype,
            )));
        }
    }
    for value in values {
        guard.push(value.clone())?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::arrays::RemoteSource;
    use crate::arrays::vector::Vector;
    use crate::expr::{self, Context, DeferredExpr, ParamId};

    #[test]
    fn concrete_passthrough_aliases() {
        let arr = Array::concrete(Vector::Int64(vec![1, 2, 3]));
        let out = evaluate(&arr, None, &EvalCaps::default(), None, false).unwrap();
        // Identity passthrough, no copy.
        assert!(out.shares_buffer(&arr));
    }

    #[test]
    fn deferred_evaluates() {
        let mut ctx = Context::new();
        ctx.bind_array(ParamId(0), Array::concrete(Vector::Int64(vec![1, 2, 3])));
        let deferred = Array::deferred(DeferredExpr::new(
            expr::add(expr::param(ParamId(0)), expr::lit(1_i64)),
            Arc::new(ctx),
        ));

        let out = deferred.eval().unwrap();
        assert_eq!(out.to_vector().unwrap(), Vector::Int64(vec![2, 3, 4]));
    }

    #[derive(Debug)]
    struct StaticRemote(Vector);

    impl RemoteSource for StaticRemote {
        fn fetch(&self) -> Result<Vector> {
            Ok(self.0.clone())
        }
    }

    #[derive(Debug)]
    struct FailingRemote;

    impl RemoteSource for FailingRemote {
        fn fetch(&self) -> Result<Vector> {
            Err(CinderError::External(
                "connection reset".to_string().into(),
            ))
        }
    }

    #[test]
    fn remote_materializes_locally() {
        let arr = Array::remote(Arc::new(StaticRemote(Vector::Int64(vec![5, 6]))));
        let out = evaluate(&arr, None, &EvalCaps::default(), None, false).unwrap();
        assert!(!out.capabilities().remote);
        assert_eq!(out.to_vector().unwrap(), Vector::Int64(vec![5, 6]));
    }

    #[test]
    fn remote_failure_passes_through() {
        let arr = Array::remote(Arc::new(FailingRemote));
        let err = evaluate(&arr, None, &EvalCaps::default(), None, false).unwrap_err();
        assert!(err.to_string().contains("connection reset"), "{err}");
    }

    #[test]
    fn append_to_appendable() {
        let arr = Array::concrete(Vector::Int64(vec![1]));
        append(&arr, &[ScalarValue::Int64(2), ScalarValue::Int64(3)]).unwrap();
        assert_eq!(arr.to_vector().unwrap(), Vector::Int64(vec![1, 2, 3]));
    }

    #[test]
    fn append_requires_capability() {
        let arr = Array::concrete_readonly(Vector::Int64(vec![1]));
        let err = append(&arr, &[ScalarValue::Int64(2)]).unwrap_err();
        assert!(matches!(err, CinderError::UnsupportedOperation(_)), "{err}");
        // The backing is untouched.
        assert_eq!(arr.to_vector().unwrap(), Vector::Int64(vec![1]));
    }

    #[test]
    fn append_is_all_or_nothing() {
        let arr = Array::concrete(Vector::Int64(vec![1]));
        let err = append(
            &arr,
            &[ScalarValue::Int64(2), ScalarValue::Utf8("three".into())],
        )
        .unwrap_err();
        assert!(matches!(err, CinderError::UnsupportedOperation(_)), "{err}");
        // Nothing was written, not even the valid prefix.
        assert_eq!(arr.to_vector().unwrap(), Vector::Int64(vec![1]));
    }
}
