//! Forward-only cursor over a query result stream.

use std::collections::BTreeMap;

use datafusion::arrow::array::{Array, ArrayRef, AsArray, RecordBatch};
use datafusion::arrow::compute::{can_cast_types, cast_with_options, CastOptions};
use datafusion::arrow::datatypes::{DataType, Float64Type, Int32Type, Int64Type, SchemaRef};
use datafusion::arrow::util::display::array_value_to_string;
use datafusion::execution::{RecordBatchStream, SendableRecordBatchStream};
use futures::StreamExt;
use tracing::{debug, warn};

use crate::record::Value;
use crate::registry::Lease;
use crate::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Position {
    BeforeFirst,
    OnRow,
    AfterLast,
    Closed,
}

/// Rows of a query result, read one at a time
///
/// The cursor starts before the first row; [`ResultSet::next`] moves it forward. Columns are
/// addressed with 1-based indexes. Batches are pulled from the engine as the cursor advances,
/// except for the first non-empty batch which is fetched when the cursor opens.
pub struct ResultSet {
    schema: SchemaRef,
    stream: Option<SendableRecordBatchStream>,
    pending: Option<RecordBatch>,
    batch: Option<RecordBatch>,
    row: usize,
    position: Position,
    empty: bool,
    lease: Option<Lease>,
}

impl std::fmt::Debug for ResultSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResultSet")
            .field("columns", &self.schema.fields().len())
            .field("position", &self.position)
            .field("row", &self.row)
            .field("empty", &self.empty)
            .field("leased", &self.lease.is_some())
            .finish_non_exhaustive()
    }
}

impl ResultSet {
    pub(crate) async fn open(stream: SendableRecordBatchStream, lease: Lease) -> Result<Self> {
        let mut result_set = Self {
            schema: stream.schema(),
            stream: Some(stream),
            pending: None,
            batch: None,
            row: 0,
            position: Position::BeforeFirst,
            empty: false,
            lease: Some(lease),
        };

        result_set.pending = result_set.fetch().await?;
        result_set.empty = result_set.pending.is_none();

        Ok(result_set)
    }

    // next non-empty batch, None once the stream is exhausted
    async fn fetch(&mut self) -> Result<Option<RecordBatch>> {
        let Some(stream) = self.stream.as_mut() else {
            return Ok(None);
        };

        while let Some(batch) = stream.next().await {
            let batch = batch.map_err(|e| Error::Query(e.to_string()))?;
            if batch.num_rows() > 0 {
                return Ok(Some(batch));
            }
        }

        self.stream = None;
        Ok(None)
    }

    /// Advance to the next row, false once the rows are exhausted
    pub async fn next(&mut self) -> Result<bool> {
        match self.position {
            Position::Closed => return Err(Error::CursorClosed),
            Position::AfterLast => return Ok(false),
            Position::OnRow => {
                if let Some(batch) = &self.batch {
                    if self.row + 1 < batch.num_rows() {
                        self.row += 1;
                        return Ok(true);
                    }
                }
            }
            Position::BeforeFirst => {}
        }

        let next = match self.pending.take() {
            Some(batch) => Some(batch),
            None => self.fetch().await?,
        };

        match next {
            Some(batch) => {
                self.batch = Some(batch);
                self.row = 0;
                self.position = Position::OnRow;
                Ok(true)
            }
            None => {
                self.batch = None;
                self.stream = None;
                self.position = Position::AfterLast;
                Ok(false)
            }
        }
    }

    /// Whether the query matched no rows at all
    pub fn is_empty(&self) -> bool {
        self.empty
    }

    pub fn is_closed(&self) -> bool {
        self.position == Position::Closed
    }

    pub fn schema(&self) -> SchemaRef {
        self.schema.clone()
    }

    pub fn column_count(&self) -> usize {
        self.schema.fields().len()
    }

    /// Name of the column at a 1-based index
    pub fn column_name(&self, index: usize) -> Result<&str> {
        self.ensure_open()?;
        self.check_index(index)?;
        Ok(self.schema.field(index - 1).name())
    }

    /// 1-based index of a column by name
    pub fn find_column(&self, name: &str) -> Result<Option<usize>> {
        self.ensure_open()?;
        Ok(self.schema.index_of(name).ok().map(|i| i + 1))
    }

    pub fn is_null(&self, index: usize) -> Result<bool> {
        let (column, row) = self.cell(index)?;
        Ok(is_null(column.as_ref(), row))
    }

    /// Any column rendered as text
    pub fn get_string(&self, index: usize) -> Result<Option<String>> {
        let (column, row) = self.cell(index)?;
        if is_null(column.as_ref(), row) {
            return Ok(None);
        }

        array_value_to_string(column, row)
            .map(Some)
            .map_err(|_| self.mismatch(index, "string"))
    }

    pub fn get_double(&self, index: usize) -> Result<Option<f64>> {
        Ok(self
            .coerce(index, &DataType::Float64)?
            .map(|array| array.as_primitive::<Float64Type>().value(0)))
    }

    pub fn get_long(&self, index: usize) -> Result<Option<i64>> {
        Ok(self
            .coerce(index, &DataType::Int64)?
            .map(|array| array.as_primitive::<Int64Type>().value(0)))
    }

    pub fn get_int(&self, index: usize) -> Result<Option<i32>> {
        Ok(self
            .coerce(index, &DataType::Int32)?
            .map(|array| array.as_primitive::<Int32Type>().value(0)))
    }

    pub fn get_bool(&self, index: usize) -> Result<Option<bool>> {
        Ok(self
            .coerce(index, &DataType::Boolean)?
            .map(|array| array.as_boolean().value(0)))
    }

    /// The cell as a [`Value`], structs become maps and lists become lists
    pub fn get_value(&self, index: usize) -> Result<Value> {
        let (column, row) = self.cell(index)?;
        to_value(column.as_ref(), row).map_err(|_| self.mismatch(index, "value"))
    }

    /// Release the underlying stream; further access fails
    pub fn close(&mut self) {
        if self.position == Position::Closed {
            return;
        }

        debug!("Closing result set");
        self.stream = None;
        self.pending = None;
        self.batch = None;
        self.lease = None;
        self.position = Position::Closed;
    }

    fn check_index(&self, index: usize) -> Result<()> {
        let count = self.column_count();
        if index == 0 || index > count {
            return Err(Error::IndexOutOfRange { index, count });
        }

        Ok(())
    }

    fn ensure_open(&self) -> Result<()> {
        match self.position {
            Position::Closed => Err(Error::CursorClosed),
            _ => Ok(()),
        }
    }

    fn cell(&self, index: usize) -> Result<(&ArrayRef, usize)> {
        self.ensure_open()?;
        self.check_index(index)?;

        match (&self.position, &self.batch) {
            (Position::OnRow, Some(batch)) => Ok((batch.column(index - 1), self.row)),
            _ => Err(Error::NoCurrentRow),
        }
    }

    // the current cell cast to `target` as a one element array, None for null
    fn coerce(&self, index: usize, target: &DataType) -> Result<Option<ArrayRef>> {
        let (column, row) = self.cell(index)?;
        if is_null(column.as_ref(), row) {
            return Ok(None);
        }

        let cell = column.slice(row, 1);
        if cell.data_type() == target {
            return Ok(Some(cell));
        }

        if !can_cast_types(cell.data_type(), target) {
            return Err(self.mismatch(index, &target.to_string()));
        }

        let cell = cast_with_options(&cell, target, &strict())
            .map_err(|_| self.mismatch(index, &target.to_string()))?;

        Ok((!is_null(cell.as_ref(), 0)).then_some(cell))
    }

    fn mismatch(&self, index: usize, requested: &str) -> Error {
        Error::TypeMismatch {
            index,
            actual: self.schema.field(index - 1).data_type().to_string(),
            requested: requested.to_string(),
        }
    }
}

impl Drop for ResultSet {
    fn drop(&mut self) {
        if self.position != Position::Closed {
            warn!("Result set dropped without close, releasing lease");
        }
    }
}

// `NullArray` has no validity buffer, only its logical nulls mark the slots
fn is_null(array: &dyn Array, row: usize) -> bool {
    array
        .logical_nulls()
        .is_some_and(|nulls| nulls.is_null(row))
}

fn to_value(array: &dyn Array, row: usize) -> Result<Value> {
    if is_null(array, row) {
        return Ok(Value::Null);
    }

    let value = match array.data_type() {
        DataType::Boolean => Value::Bool(array.as_boolean().value(row)),
        DataType::Utf8 => Value::String(array.as_string::<i32>().value(row).to_string()),
        DataType::LargeUtf8 => Value::String(array.as_string::<i64>().value(row).to_string()),
        DataType::Utf8View => Value::String(array.as_string_view().value(row).to_string()),
        data_type if data_type.is_integer() => {
            let cell = cast_with_options(&array.slice(row, 1), &DataType::Int64, &strict())?;
            Value::Long(cell.as_primitive::<Int64Type>().value(0))
        }
        data_type if data_type.is_floating() || data_type.is_numeric() => {
            let cell = cast_with_options(&array.slice(row, 1), &DataType::Float64, &strict())?;
            Value::Double(cell.as_primitive::<Float64Type>().value(0))
        }
        DataType::Struct(fields) => {
            let array = array.as_struct();
            let entries = fields
                .iter()
                .zip(array.columns())
                .map(|(field, column)| Ok((field.name().clone(), to_value(column.as_ref(), row)?)))
                .collect::<Result<BTreeMap<_, _>>>()?;
            Value::Map(entries)
        }
        DataType::List(_) => list_value(&array.as_list::<i32>().value(row))?,
        DataType::LargeList(_) => list_value(&array.as_list::<i64>().value(row))?,
        _ => Value::String(array_value_to_string(&array.slice(row, 1), 0)?),
    };

    Ok(value)
}

fn list_value(values: &ArrayRef) -> Result<Value> {
    (0..values.len())
        .map(|i| to_value(values.as_ref(), i))
        .collect::<Result<Vec<_>>>()
        .map(Value::List)
}

fn strict() -> CastOptions<'static> {
    CastOptions {
        safe: false,
        ..Default::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{ContextPolicy, ContextRegistry, HandleKind};
    use crate::spec::ConnectionSpec;
    use datafusion::arrow::array::{Float64Array, NullArray};
    use datafusion::prelude::SessionContext;
    use tracing_test::traced_test;

    async fn open(registry: &ContextRegistry, sql: &str) -> ResultSet {
        let backend = registry
            .acquire(&ConnectionSpec::default(), ContextPolicy::Shared)
            .await
            .unwrap();
        let stream = SessionContext::new()
            .sql(sql)
            .await
            .unwrap()
            .execute_stream()
            .await
            .unwrap();

        ResultSet::open(stream, Lease::new(backend, HandleKind::Cursor))
            .await
            .unwrap()
    }

    #[test]
    fn test_null_array_cells_are_null() {
        assert!(is_null(&NullArray::new(2), 1));
        assert!(is_null(&Float64Array::from(vec![None, Some(1.0)]), 0));
        assert!(!is_null(&Float64Array::from(vec![None, Some(1.0)]), 1));
        assert_eq!(to_value(&NullArray::new(1), 0).unwrap(), Value::Null);
    }

    #[tokio::test]
    async fn test_null_literal() {
        let registry = ContextRegistry::new();
        let mut rows = open(&registry, "select null as nothing").await;

        assert!(rows.next().await.unwrap());
        assert!(rows.is_null(1).unwrap());
        assert_eq!(rows.get_double(1).unwrap(), None);
        assert_eq!(rows.get_string(1).unwrap(), None);

        rows.close();
    }

    #[tokio::test]
    #[traced_test]
    async fn test_drop_without_close_releases_lease() {
        let registry = ContextRegistry::new();
        let rows = open(&registry, "select 1 as one").await;
        assert_eq!(registry.stats().open_cursors(), 1);

        drop(rows);

        assert!(logs_contain("Result set dropped without close"));
        assert_eq!(registry.stats().open_cursors(), 0);
        assert_eq!(registry.stats().teardowns(), 1);
    }

    #[tokio::test]
    #[traced_test]
    async fn test_drop_after_close_is_quiet() {
        let registry = ContextRegistry::new();
        let mut rows = open(&registry, "select 1 as one").await;

        rows.close();
        drop(rows);

        assert!(!logs_contain("Result set dropped without close"));
    }
}
