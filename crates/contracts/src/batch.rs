//! ResultBatch - columnar result table published by the host engine

use serde::{Deserialize, Serialize};

use crate::{RelayError, Value};

/// One named column of a result table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResultColumn {
    pub name: String,
    pub values: Vec<Option<Value>>,
}

impl ResultColumn {
    pub fn new(name: impl Into<String>, values: Vec<Option<Value>>) -> Self {
        Self {
            name: name.into(),
            values,
        }
    }

    /// Column of non-null cells.
    pub fn from_values(name: impl Into<String>, values: Vec<Value>) -> Self {
        Self::new(name, values.into_iter().map(Some).collect())
    }
}

/// A named table of columns; all columns share the same row count.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResultBatch {
    name: String,
    columns: Vec<ResultColumn>,
}

impl ResultBatch {
    /// Create a batch, enforcing the table invariants.
    ///
    /// # Errors
    /// `BatchShape` when column lengths differ or a column name repeats.
    pub fn new(
        name: impl Into<String>,
        columns: Vec<ResultColumn>,
    ) -> Result<Self, RelayError> {
        if let Some(first) = columns.first() {
            let rows = first.values.len();
            for column in &columns {
                if column.values.len() != rows {
                    return Err(RelayError::batch_shape(format!(
                        "column '{}' has {} rows, expected {}",
                        column.name,
                        column.values.len(),
                        rows
                    )));
                }
            }
        }

        for (idx, column) in columns.iter().enumerate() {
            if columns[..idx].iter().any(|c| c.name == column.name) {
                return Err(RelayError::batch_shape(format!(
                    "duplicate column name '{}'",
                    column.name
                )));
            }
        }

        Ok(Self {
            name: name.into(),
            columns,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn columns(&self) -> &[ResultColumn] {
        &self.columns
    }

    /// Row count; zero for a zero-column table.
    pub fn row_count(&self) -> usize {
        self.columns.first().map_or(0, |c| c.values.len())
    }

    /// Lazy, restartable iterator over the table rows.
    pub fn rows(&self) -> Rows<'_> {
        Rows {
            batch: self,
            index: 0,
        }
    }
}

/// One table row: column name to cell value, in column order.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    entries: Vec<(String, Option<Value>)>,
}

impl Row {
    pub fn new(entries: Vec<(String, Option<Value>)>) -> Self {
        Self { entries }
    }

    /// Cell for an exact column name; `None` when the column is absent.
    pub fn cell(&self, name: &str) -> Option<&Option<Value>> {
        self.entries
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value)
    }

    /// First column whose name matches case-insensitively.
    pub fn find_key_ignore_case(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .map(|(key, _)| key.as_str())
            .find(|key| key.eq_ignore_ascii_case(name))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, Option<&Value>)> {
        self.entries
            .iter()
            .map(|(key, value)| (key.as_str(), value.as_ref()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Iterator produced by [`ResultBatch::rows`].
#[derive(Debug, Clone)]
pub struct Rows<'a> {
    batch: &'a ResultBatch,
    index: usize,
}

impl Iterator for Rows<'_> {
    type Item = Row;

    fn next(&mut self) -> Option<Row> {
        if self.index >= self.batch.row_count() {
            return None;
        }

        let row = Row::new(
            self.batch
                .columns
                .iter()
                .map(|c| (c.name.clone(), c.values[self.index].clone()))
                .collect(),
        );
        self.index += 1;
        Some(row)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.batch.row_count() - self.index;
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for Rows<'_> {}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_batch() -> ResultBatch {
        ResultBatch::new(
            "Temp",
            vec![
                ResultColumn::from_values(
                    "Timestamp",
                    vec![Value::Int(1), Value::Int(2)],
                ),
                ResultColumn::new(
                    "Value",
                    vec![Some(Value::Float(21.5)), None],
                ),
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_rows_preserve_column_order_and_typing() {
        let batch = sample_batch();
        let rows: Vec<Row> = batch.rows().collect();
        assert_eq!(rows.len(), 2);

        let first: Vec<_> = rows[0].iter().map(|(k, _)| k.to_string()).collect();
        assert_eq!(first, vec!["Timestamp", "Value"]);
        assert_eq!(rows[0].cell("Value"), Some(&Some(Value::Float(21.5))));
        assert_eq!(rows[1].cell("Value"), Some(&None));
    }

    #[test]
    fn test_rows_are_restartable() {
        let batch = sample_batch();
        assert_eq!(batch.rows().count(), 2);
        assert_eq!(batch.rows().count(), 2);
    }

    #[test]
    fn test_zero_column_batch_yields_no_rows() {
        let batch = ResultBatch::new("empty", vec![]).unwrap();
        assert_eq!(batch.rows().count(), 0);
    }

    #[test]
    fn test_zero_row_batch_yields_no_rows() {
        let batch = ResultBatch::new(
            "empty",
            vec![ResultColumn::new("a", vec![])],
        )
        .unwrap();
        assert_eq!(batch.rows().count(), 0);
    }

    #[test]
    fn test_ragged_columns_rejected() {
        let result = ResultBatch::new(
            "bad",
            vec![
                ResultColumn::from_values("a", vec![Value::Int(1)]),
                ResultColumn::from_values("b", vec![Value::Int(1), Value::Int(2)]),
            ],
        );
        assert!(matches!(result, Err(RelayError::BatchShape { .. })));
    }

    #[test]
    fn test_duplicate_column_names_rejected() {
        let result = ResultBatch::new(
            "bad",
            vec![
                ResultColumn::from_values("a", vec![Value::Int(1)]),
                ResultColumn::from_values("a", vec![Value::Int(2)]),
            ],
        );
        assert!(matches!(result, Err(RelayError::BatchShape { .. })));
    }

    #[test]
    fn test_find_key_ignore_case() {
        let batch = sample_batch();
        let row = batch.rows().next().unwrap();
        assert_eq!(row.find_key_ignore_case("TIMESTAMP"), Some("Timestamp"));
        assert_eq!(row.find_key_ignore_case("missing"), None);
    }
}
