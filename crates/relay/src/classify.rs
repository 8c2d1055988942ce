//! Batch classifier - intercepts the iteration marker before normal processing

use contracts::{RelayError, ResultBatch};

/// Reserved name of the iteration marker result.
pub const MARKER_RESULT_NAME: &str = "MarkIterationResult";

/// Reserved single column of the iteration marker result.
pub const MARKER_COLUMN_NAME: &str = "Iteration";

/// Outcome of classifying a published batch.
///
/// Iteration marks advance the run's iteration counter and are never
/// forwarded to any sink.
#[derive(Debug, Clone)]
pub enum Published {
    Normal(ResultBatch),
    IterationMark(i64),
}

/// Classify a published batch once, at the pipeline entry point.
///
/// # Errors
/// `BatchShape` when a marker batch carries a non-integer payload.
pub fn classify(batch: ResultBatch) -> Result<Published, RelayError> {
    if !is_iteration_mark(&batch) {
        return Ok(Published::Normal(batch));
    }

    let payload = batch.columns()[0]
        .values
        .first()
        .and_then(|cell| cell.as_ref())
        .and_then(|value| value.as_int());

    match payload {
        Some(iteration) => Ok(Published::IterationMark(iteration)),
        None => Err(RelayError::batch_shape(format!(
            "expected integer payload in '{MARKER_COLUMN_NAME}' column of {MARKER_RESULT_NAME}"
        ))),
    }
}

fn is_iteration_mark(batch: &ResultBatch) -> bool {
    batch.name() == MARKER_RESULT_NAME
        && batch.columns().len() == 1
        && batch.columns()[0].name == MARKER_COLUMN_NAME
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::{ResultColumn, Value};

    fn marker(value: Value) -> ResultBatch {
        ResultBatch::new(
            MARKER_RESULT_NAME,
            vec![ResultColumn::from_values(MARKER_COLUMN_NAME, vec![value])],
        )
        .unwrap()
    }

    #[test]
    fn test_marker_intercepted() {
        match classify(marker(Value::Int(3))).unwrap() {
            Published::IterationMark(n) => assert_eq!(n, 3),
            other => panic!("expected iteration mark, got {other:?}"),
        }
    }

    #[test]
    fn test_normal_batch_passes_through() {
        let batch = ResultBatch::new(
            "Temp",
            vec![ResultColumn::from_values("Value", vec![Value::Float(1.0)])],
        )
        .unwrap();
        assert!(matches!(
            classify(batch).unwrap(),
            Published::Normal(b) if b.name() == "Temp"
        ));
    }

    #[test]
    fn test_marker_name_with_extra_columns_is_normal() {
        let batch = ResultBatch::new(
            MARKER_RESULT_NAME,
            vec![
                ResultColumn::from_values(MARKER_COLUMN_NAME, vec![Value::Int(1)]),
                ResultColumn::from_values("Extra", vec![Value::Int(2)]),
            ],
        )
        .unwrap();
        assert!(matches!(classify(batch).unwrap(), Published::Normal(_)));
    }

    #[test]
    fn test_marker_with_non_integer_payload_fails() {
        let result = classify(marker(Value::Str("three".into())));
        assert!(matches!(result, Err(RelayError::BatchShape { .. })));
    }
}
