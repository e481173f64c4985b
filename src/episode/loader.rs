//! Record file loader.
//!
//! Reads the state and action columns of a Parquet episode record. Each cell
//! of those columns is a numeric sequence; the loader densifies a column into
//! a `(steps, 28)` f32 matrix and rejects anything that is not exactly that.

use std::fs::File;
use std::path::Path;

use arrow::array::{Array, ArrayRef, FixedSizeListArray, Float32Array, LargeListArray, ListArray};
use arrow::compute::cast;
use arrow::datatypes::DataType;
use ndarray::Array2;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;

use super::{JointArray, JOINT_COUNT};
use crate::error::EpisodeError;

/// State and action matrices read from one record file.
#[derive(Debug, Clone)]
pub struct RecordArrays {
    pub state: JointArray,
    pub action: JointArray,
}

/// Load the state and action matrices from a Parquet record file.
pub fn load_record(
    path: &Path,
    state_column: &str,
    action_column: &str,
) -> Result<RecordArrays, EpisodeError> {
    let file = File::open(path)?;
    let builder = ParquetRecordBatchReaderBuilder::try_new(file)?;

    let available: Vec<String> = builder
        .schema()
        .fields()
        .iter()
        .map(|f| f.name().clone())
        .collect();
    for column in [state_column, action_column] {
        if !available.iter().any(|name| name == column) {
            return Err(EpisodeError::MissingColumn {
                column: column.to_string(),
                available,
            });
        }
    }

    let reader = builder.build()?;
    let mut state = MatrixBuilder::new(state_column);
    let mut action = MatrixBuilder::new(action_column);

    for batch_result in reader {
        let batch = batch_result?;
        for builder in [&mut state, &mut action] {
            let column = batch.column_by_name(builder.column).ok_or_else(|| {
                EpisodeError::MissingColumn {
                    column: builder.column.to_string(),
                    available: available.clone(),
                }
            })?;
            builder.append_column(column)?;
        }
    }

    let arrays = RecordArrays {
        state: state.finish()?,
        action: action.finish()?,
    };

    tracing::debug!(
        path = %path.display(),
        state_rows = arrays.state.nrows(),
        action_rows = arrays.action.nrows(),
        "Record file loaded"
    );

    Ok(arrays)
}

/// Accumulates list cells of one column into a dense row-major buffer.
struct MatrixBuilder<'a> {
    column: &'a str,
    width: Option<usize>,
    rows: usize,
    values: Vec<f32>,
}

impl<'a> MatrixBuilder<'a> {
    fn new(column: &'a str) -> Self {
        Self {
            column,
            width: None,
            rows: 0,
            values: Vec::new(),
        }
    }

    fn shape_error(&self, reason: impl Into<String>) -> EpisodeError {
        EpisodeError::ShapeMismatch {
            column: self.column.to_string(),
            reason: reason.into(),
        }
    }

    fn append_column(&mut self, column: &ArrayRef) -> Result<(), EpisodeError> {
        if !matches!(
            column.data_type(),
            DataType::List(_) | DataType::LargeList(_) | DataType::FixedSizeList(_, _)
        ) {
            return Err(self.shape_error(format!(
                "expected a column of numeric sequences, found {}",
                column.data_type()
            )));
        }

        for row in 0..column.len() {
            if column.is_null(row) {
                return Err(self.shape_error(format!("row {} is null", self.rows)));
            }
            let cell = list_cell(column, row)
                .ok_or_else(|| self.shape_error("unsupported list encoding"))?;
            self.append_row(&cell)?;
        }
        Ok(())
    }

    fn append_row(&mut self, cell: &ArrayRef) -> Result<(), EpisodeError> {
        if !cell.data_type().is_numeric() {
            return Err(self.shape_error(format!(
                "expected numeric elements, found {}",
                cell.data_type()
            )));
        }

        let width = *self.width.get_or_insert(cell.len());
        if cell.len() != width {
            return Err(self.shape_error(format!(
                "row {} has {} values but earlier rows have {}",
                self.rows,
                cell.len(),
                width
            )));
        }

        let floats = cast(cell, &DataType::Float32)?;
        let floats = floats
            .as_any()
            .downcast_ref::<Float32Array>()
            .ok_or_else(|| self.shape_error("cast to f32 produced an unexpected array type"))?;
        self.values
            .extend(floats.iter().map(|v| v.unwrap_or(f32::NAN)));
        self.rows += 1;
        Ok(())
    }

    fn finish(self) -> Result<JointArray, EpisodeError> {
        if self.rows == 0 {
            return Err(self.shape_error("column has no rows"));
        }
        let width = self.width.unwrap_or(0);
        if width != JOINT_COUNT {
            return Err(self.shape_error(format!(
                "expected {} columns per row, found {}",
                JOINT_COUNT, width
            )));
        }
        let rows = self.rows;
        let column = self.column.to_string();
        Array2::from_shape_vec((rows, width), self.values).map_err(|e| {
            EpisodeError::ShapeMismatch {
                column,
                reason: e.to_string(),
            }
        })
    }
}

/// Values of one list cell regardless of the list encoding.
fn list_cell(column: &ArrayRef, row: usize) -> Option<ArrayRef> {
    let any = column.as_any();
    if let Some(list) = any.downcast_ref::<ListArray>() {
        return Some(list.value(row));
    }
    if let Some(list) = any.downcast_ref::<LargeListArray>() {
        return Some(list.value(row));
    }
    if let Some(list) = any.downcast_ref::<FixedSizeListArray>() {
        return Some(list.value(row));
    }
    None
}
