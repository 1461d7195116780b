//! Row cursors over query results.
//!
//! Detailed change notices carry primary keys; resolving them yields
//! rows that cross the language boundary as a fixed column list plus
//! row tuples. The cursor addresses cells by stable column index, so
//! the key order of any map the rows were built from never leaks into
//! consumer code.

use serde::{Deserialize, Serialize};

use crate::bucket::ValuesBucket;
use crate::error::{CodecError, CursorError};
use crate::value::{Asset, ScalarValue};

/// Stable type mapping reported for a cursor cell.
///
/// Integral scalars (bool, int32, int64) share one column type the way
/// the storage layer stores them; records surface as asset lists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnType {
    Null,
    Integer,
    Real,
    Text,
    Blob,
    Asset,
    Assets,
}

impl ColumnType {
    /// Stable wire code for this column type.
    #[must_use]
    pub const fn code(self) -> i32 {
        match self {
            Self::Null => 0,
            Self::Integer => 1,
            Self::Real => 2,
            Self::Text => 3,
            Self::Blob => 4,
            Self::Asset => 5,
            Self::Assets => 6,
        }
    }

    /// Parses a wire code.
    ///
    /// # Errors
    ///
    /// Returns `CodecError::EnumOutOfRange` for codes outside `[0, 7)`.
    pub const fn from_code(code: i32) -> Result<Self, CodecError> {
        match code {
            0 => Ok(Self::Null),
            1 => Ok(Self::Integer),
            2 => Ok(Self::Real),
            3 => Ok(Self::Text),
            4 => Ok(Self::Blob),
            5 => Ok(Self::Asset),
            6 => Ok(Self::Assets),
            _ => Err(CodecError::EnumOutOfRange {
                what: "ColumnType",
                value: code,
            }),
        }
    }

    /// Column type a value surfaces as.
    #[must_use]
    pub const fn of(value: &ScalarValue) -> Self {
        match value {
            ScalarValue::Null => Self::Null,
            ScalarValue::Bool(_) | ScalarValue::Int32(_) | ScalarValue::Int64(_) => Self::Integer,
            ScalarValue::Double(_) => Self::Real,
            ScalarValue::Text(_) => Self::Text,
            ScalarValue::Blob(_) => Self::Blob,
            ScalarValue::Asset(_) => Self::Asset,
            ScalarValue::Record(_) => Self::Assets,
        }
    }
}

/// Read-only, positioned access to a result set.
///
/// Getters never coerce across column types; the one widening they do
/// perform is integral (bool, int32, int64 all read as int64, matching
/// the single `Integer` column type).
pub trait RowCursor {
    /// Number of columns in every row.
    fn column_count(&self) -> usize;

    /// Name of the column at `index`.
    ///
    /// # Errors
    ///
    /// `ColumnOutOfBounds` if `index` is past the column list.
    fn column_name(&self, index: usize) -> Result<&str, CursorError>;

    /// Index of the column named `name`.
    ///
    /// # Errors
    ///
    /// `UnknownColumn` if no column has that name.
    fn column_index(&self, name: &str) -> Result<usize, CursorError>;

    /// Type of the cell at `index` in the current row.
    ///
    /// # Errors
    ///
    /// `NotPositioned` or `ColumnOutOfBounds`.
    fn column_type(&self, index: usize) -> Result<ColumnType, CursorError>;

    /// Number of rows in the result set.
    fn row_count(&self) -> usize;

    /// Moves to the row at `position`.
    ///
    /// # Errors
    ///
    /// `RowOutOfBounds` past the end; the position is left unchanged.
    fn go_to_row(&mut self, position: usize) -> Result<(), CursorError>;

    /// Moves to the next row, or to the first from the fresh position.
    ///
    /// # Errors
    ///
    /// `RowOutOfBounds` stepping past the last row.
    fn go_to_next_row(&mut self) -> Result<(), CursorError>;

    /// Reads an integral cell, widening bool and int32.
    ///
    /// # Errors
    ///
    /// `NotPositioned`, `ColumnOutOfBounds`, or `TypeMismatch`.
    fn get_int64(&self, index: usize) -> Result<i64, CursorError>;

    /// Reads a real cell.
    ///
    /// # Errors
    ///
    /// `NotPositioned`, `ColumnOutOfBounds`, or `TypeMismatch`.
    fn get_real(&self, index: usize) -> Result<f64, CursorError>;

    /// Reads a text cell.
    ///
    /// # Errors
    ///
    /// `NotPositioned`, `ColumnOutOfBounds`, or `TypeMismatch`.
    fn get_text(&self, index: usize) -> Result<&str, CursorError>;

    /// Reads a blob cell.
    ///
    /// # Errors
    ///
    /// `NotPositioned`, `ColumnOutOfBounds`, or `TypeMismatch`.
    fn get_blob(&self, index: usize) -> Result<&[u8], CursorError>;

    /// Reads an asset cell.
    ///
    /// # Errors
    ///
    /// `NotPositioned`, `ColumnOutOfBounds`, or `TypeMismatch`.
    fn get_asset(&self, index: usize) -> Result<&Asset, CursorError>;

    /// Reads a record cell whose values are all assets, in key order.
    ///
    /// # Errors
    ///
    /// `TypeMismatch` for non-record cells and for records holding any
    /// non-asset value, plus the usual positioning errors.
    fn get_assets(&self, index: usize) -> Result<Vec<&Asset>, CursorError>;

    /// Returns true if the cell at `index` is null.
    ///
    /// # Errors
    ///
    /// `NotPositioned` or `ColumnOutOfBounds`.
    fn is_null(&self, index: usize) -> Result<bool, CursorError>;
}

/// In-memory cursor over a fixed column list and materialized rows.
#[derive(Debug, Clone, PartialEq)]
pub struct RowsCursor {
    columns: Vec<String>,
    rows: Vec<Vec<ScalarValue>>,
    position: Option<usize>,
}

impl RowsCursor {
    /// Builds a cursor, checking that every row matches the column
    /// arity.
    ///
    /// # Errors
    ///
    /// `ColumnOutOfBounds` naming the offending row's width.
    pub fn new(columns: Vec<String>, rows: Vec<Vec<ScalarValue>>) -> Result<Self, CursorError> {
        for row in &rows {
            if row.len() != columns.len() {
                return Err(CursorError::ColumnOutOfBounds {
                    index: row.len(),
                    count: columns.len(),
                });
            }
        }
        Ok(Self {
            columns,
            rows,
            position: None,
        })
    }

    /// Builds a cursor from buckets, in the given column order.
    ///
    /// Missing keys become null cells; bucket keys outside `columns`
    /// are ignored. Cell order follows `columns`, never the bucket's
    /// own key order.
    #[must_use]
    pub fn from_buckets(columns: Vec<String>, buckets: &[ValuesBucket]) -> Self {
        let rows = buckets
            .iter()
            .map(|bucket| {
                columns
                    .iter()
                    .map(|name| bucket.get(name).cloned().unwrap_or(ScalarValue::Null))
                    .collect()
            })
            .collect();
        Self {
            columns,
            rows,
            position: None,
        }
    }

    fn current_row(&self) -> Result<&[ScalarValue], CursorError> {
        let position = self.position.ok_or(CursorError::NotPositioned)?;
        Ok(&self.rows[position])
    }

    fn cell(&self, index: usize) -> Result<&ScalarValue, CursorError> {
        let row = self.current_row()?;
        row.get(index).ok_or(CursorError::ColumnOutOfBounds {
            index,
            count: self.columns.len(),
        })
    }

    fn mismatch(index: usize, expected: ColumnType, cell: &ScalarValue) -> CursorError {
        CursorError::TypeMismatch {
            index,
            expected,
            actual: ColumnType::of(cell),
        }
    }
}

impl RowCursor for RowsCursor {
    fn column_count(&self) -> usize {
        self.columns.len()
    }

    fn column_name(&self, index: usize) -> Result<&str, CursorError> {
        self.columns
            .get(index)
            .map(String::as_str)
            .ok_or(CursorError::ColumnOutOfBounds {
                index,
                count: self.columns.len(),
            })
    }

    fn column_index(&self, name: &str) -> Result<usize, CursorError> {
        self.columns
            .iter()
            .position(|column| column == name)
            .ok_or_else(|| CursorError::UnknownColumn {
                name: name.to_string(),
            })
    }

    fn column_type(&self, index: usize) -> Result<ColumnType, CursorError> {
        Ok(ColumnType::of(self.cell(index)?))
    }

    fn row_count(&self) -> usize {
        self.rows.len()
    }

    fn go_to_row(&mut self, position: usize) -> Result<(), CursorError> {
        if position >= self.rows.len() {
            return Err(CursorError::RowOutOfBounds {
                position,
                count: self.rows.len(),
            });
        }
        self.position = Some(position);
        Ok(())
    }

    fn go_to_next_row(&mut self) -> Result<(), CursorError> {
        let next = self.position.map_or(0, |p| p + 1);
        self.go_to_row(next)
    }

    fn get_int64(&self, index: usize) -> Result<i64, CursorError> {
        let cell = self.cell(index)?;
        match cell {
            ScalarValue::Bool(v) => Ok(i64::from(*v)),
            ScalarValue::Int32(v) => Ok(i64::from(*v)),
            ScalarValue::Int64(v) => Ok(*v),
            other => Err(Self::mismatch(index, ColumnType::Integer, other)),
        }
    }

    fn get_real(&self, index: usize) -> Result<f64, CursorError> {
        let cell = self.cell(index)?;
        match cell {
            ScalarValue::Double(v) => Ok(*v),
            other => Err(Self::mismatch(index, ColumnType::Real, other)),
        }
    }

    fn get_text(&self, index: usize) -> Result<&str, CursorError> {
        let cell = self.cell(index)?;
        cell.as_text()
            .ok_or_else(|| Self::mismatch(index, ColumnType::Text, cell))
    }

    fn get_blob(&self, index: usize) -> Result<&[u8], CursorError> {
        let cell = self.cell(index)?;
        cell.as_blob()
            .ok_or_else(|| Self::mismatch(index, ColumnType::Blob, cell))
    }

    fn get_asset(&self, index: usize) -> Result<&Asset, CursorError> {
        let cell = self.cell(index)?;
        cell.as_asset()
            .ok_or_else(|| Self::mismatch(index, ColumnType::Asset, cell))
    }

    fn get_assets(&self, index: usize) -> Result<Vec<&Asset>, CursorError> {
        let cell = self.cell(index)?;
        let Some(record) = cell.as_record() else {
            return Err(Self::mismatch(index, ColumnType::Assets, cell));
        };
        let mut assets = Vec::with_capacity(record.len());
        for (_, value) in record.iter() {
            let Some(asset) = value.as_asset() else {
                return Err(Self::mismatch(index, ColumnType::Assets, value));
            };
            assets.push(asset);
        }
        Ok(assets)
    }

    fn is_null(&self, index: usize) -> Result<bool, CursorError> {
        Ok(self.cell(index)?.is_null())
    }
}
