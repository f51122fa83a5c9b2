/// DataFrame Implementation
///
/// A DataFrame is an ordered set of named [`ScalarColumn`]s that all share
/// one length. It has an opaque identity ([`FrameId`]) that survives in-place
/// mutation, so observers can tell "this frame, updated" from "a new frame".
/// Selections return new frames with new identities.
///
/// Mutating methods return the [`DataFrameModification`] describing the
/// change; the caller hands it to a [`ModificationQueue`].
///
/// # Examples
///
/// ```
/// use liveframe::{DataFrame, ModificationQueue, ScalarColumn, Value};
///
/// let mut df = DataFrame::new();
/// df.add_column("id", ScalarColumn::new(vec![1i64, 2, 3], None).unwrap()).unwrap();
/// df.add_column("score", ScalarColumn::new(vec![10i64, 20, 30], None).unwrap()).unwrap();
///
/// let mut queue = ModificationQueue::new();
/// queue.push(df.edit(Value::Int(99), "score", &Value::Int(2), "id").unwrap());
///
/// assert_eq!(*df.column("score").unwrap().get(1).unwrap(), Value::Int(99));
/// assert_eq!(queue.len(), 1);
/// ```
///
/// [`ModificationQueue`]: crate::modification::ModificationQueue

use crate::column::ScalarColumn;
use crate::backend::BackendKind;
use crate::error::{FrameError, Result};
use crate::modification::DataFrameModification;
use crate::value::Value;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::Range;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_FRAME_ID: AtomicU64 = AtomicU64::new(1);

/// Opaque dataframe identity, rendered as `df-<n>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct FrameId(u64);

impl FrameId {
    /// A fresh identity, never handed out before in this process.
    pub fn next() -> Self {
        FrameId(NEXT_FRAME_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for FrameId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "df-{}", self.0)
    }
}

impl FromStr for FrameId {
    type Err = FrameError;

    /// Accepts `df-<n>` or a bare `<n>`.
    fn from_str(s: &str) -> Result<Self> {
        s.strip_prefix("df-")
            .unwrap_or(s)
            .parse::<u64>()
            .map(FrameId)
            .map_err(|_| FrameError::FrameNotFound(s.to_string()))
    }
}

impl From<FrameId> for String {
    fn from(id: FrameId) -> Self {
        id.to_string()
    }
}

impl TryFrom<String> for FrameId {
    type Error = FrameError;

    fn try_from(s: String) -> Result<Self> {
        s.parse()
    }
}

/// Which rows to select.
#[derive(Debug, Clone)]
pub enum RowSelection {
    /// Contiguous rows; `end` is clamped to the frame length, `None` means
    /// to the end.
    Range { start: usize, end: Option<usize> },
    /// Explicit positions, possibly reordered or repeated
    Positions(Vec<usize>),
    /// Rows where a boolean column of the frame's length is true
    Mask(ScalarColumn),
    /// Rows whose key matches one of `keys`, in the order of `keys`. The key
    /// column defaults to the primary key.
    Keys {
        key_column: Option<String>,
        keys: Vec<Value>,
    },
}

#[derive(Clone)]
pub struct DataFrame {
    id: FrameId,
    columns: Vec<(String, ScalarColumn)>,
    primary_key: Option<String>,
}

impl DataFrame {
    /// Create an empty frame with a fresh identity.
    pub fn new() -> Self {
        DataFrame {
            id: FrameId::next(),
            columns: Vec::new(),
            primary_key: None,
        }
    }

    /// Build a frame from named columns, in order.
    pub fn from_columns<S: Into<String>>(columns: Vec<(S, ScalarColumn)>) -> Result<Self> {
        let mut df = DataFrame::new();
        for (name, column) in columns {
            df.add_column(name, column)?;
        }
        Ok(df)
    }

    /// Set the primary key. The column must exist and hold no value twice.
    pub fn with_primary_key(mut self, name: &str) -> Result<Self> {
        ensure_unique(name, self.column(name)?)?;
        self.primary_key = Some(name.to_string());
        Ok(self)
    }

    /// Create a frame from a JSON array of objects.
    ///
    /// Column names and order come from the first object; every object must
    /// carry the same keys. Each column's dtype is inferred from its values.
    ///
    /// ```
    /// use liveframe::DataFrame;
    ///
    /// let json = r#"[{"id": 1, "name": "Alice"}, {"id": 2, "name": "Bob"}]"#;
    /// let df = DataFrame::from_json_records(json, Some("arrow")).unwrap();
    /// assert_eq!(df.len(), 2);
    /// assert_eq!(df.names(), vec!["id", "name"]);
    /// ```
    pub fn from_json_records(json: &str, backend: Option<&str>) -> Result<Self> {
        let parsed: Vec<serde_json::Value> = serde_json::from_str(json)
            .map_err(|e| FrameError::InvalidRequest(format!("JSON parse error: {}", e)))?;
        Self::from_records(&parsed, backend)
    }

    /// Create a frame from already parsed JSON objects. See
    /// [`DataFrame::from_json_records`].
    pub fn from_records(parsed: &[serde_json::Value], backend: Option<&str>) -> Result<Self> {
        let kind = backend
            .map(str::parse::<BackendKind>)
            .transpose()?
            .unwrap_or_default();
        let first = parsed
            .first()
            .ok_or_else(|| FrameError::InvalidRequest("JSON array is empty".to_string()))?
            .as_object()
            .ok_or_else(|| FrameError::InvalidRequest("expected array of objects".to_string()))?;
        let names: Vec<String> = first.keys().cloned().collect();

        let mut values: Vec<Vec<Value>> = vec![Vec::with_capacity(parsed.len()); names.len()];
        for item in parsed {
            let obj = item
                .as_object()
                .ok_or_else(|| FrameError::InvalidRequest("expected object in array".to_string()))?;
            if obj.len() != names.len() {
                return Err(FrameError::InvalidRequest(format!(
                    "expected {} keys per record, found {}",
                    names.len(),
                    obj.len()
                )));
            }
            for (name, column) in names.iter().zip(values.iter_mut()) {
                let raw = obj.get(name).ok_or_else(|| {
                    FrameError::InvalidRequest(format!("missing value for column '{}'", name))
                })?;
                let value = Value::from_json(raw).ok_or_else(|| {
                    FrameError::InvalidRequest(format!("unsupported JSON value for column '{}'", name))
                })?;
                column.push(value);
            }
        }

        let mut df = DataFrame::new();
        for (name, column) in names.into_iter().zip(values) {
            df.add_column(name, ScalarColumn::with_kind(column, kind)?)?;
        }
        Ok(df)
    }

    pub fn id(&self) -> FrameId {
        self.id
    }

    pub fn primary_key(&self) -> Option<&str> {
        self.primary_key.as_deref()
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.columns.first().map_or(0, |(_, c)| c.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Column names in order.
    pub fn names(&self) -> Vec<&str> {
        self.columns.iter().map(|(name, _)| name.as_str()).collect()
    }

    pub fn columns(&self) -> impl Iterator<Item = (&str, &ScalarColumn)> + '_ {
        self.columns.iter().map(|(name, col)| (name.as_str(), col))
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.columns.iter().any(|(n, _)| n == name)
    }

    pub fn column(&self, name: &str) -> Result<&ScalarColumn> {
        self.columns
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, c)| c)
            .ok_or_else(|| FrameError::ColumnNotFound(name.to_string()))
    }

    fn column_mut(&mut self, name: &str) -> Result<&mut ScalarColumn> {
        self.columns
            .iter_mut()
            .find(|(n, _)| n == name)
            .map(|(_, c)| c)
            .ok_or_else(|| FrameError::ColumnNotFound(name.to_string()))
    }

    /// Append a column while building a frame.
    pub fn add_column(&mut self, name: impl Into<String>, column: ScalarColumn) -> Result<()> {
        let name = name.into();
        if self.has_column(&name) {
            return Err(FrameError::DuplicateColumn(name));
        }
        if !self.columns.is_empty() && column.len() != self.len() {
            return Err(FrameError::LengthMismatch {
                expected: self.len(),
                actual: column.len(),
            });
        }
        self.columns.push((name, column));
        Ok(())
    }

    /// Assign a column, replacing one of the same name or appending a new
    /// one. A replacement primary key column must stay unique.
    pub fn set_column(
        &mut self,
        name: impl Into<String>,
        column: ScalarColumn,
    ) -> Result<DataFrameModification> {
        let name = name.into();
        if !self.columns.is_empty() && column.len() != self.len() {
            return Err(FrameError::LengthMismatch {
                expected: self.len(),
                actual: column.len(),
            });
        }
        if self.primary_key.as_deref() == Some(name.as_str()) {
            ensure_unique(&name, &column)?;
        }
        match self.columns.iter_mut().find(|(n, _)| *n == name) {
            Some((_, slot)) => *slot = column,
            None => self.columns.push((name.clone(), column)),
        }
        Ok(DataFrameModification::new(self.id, [name]))
    }

    /// Values of one row, in column order.
    pub fn row(&self, index: usize) -> Result<Vec<&Value>> {
        self.columns.iter().map(|(_, c)| c.get(index)).collect()
    }

    pub fn iter_rows(&self) -> RowIterator<'_> {
        RowIterator { df: self, index: 0 }
    }

    // ==================== Selection ====================

    /// A new frame holding only `names`, in that order. A repeated name is
    /// taken once, at its first position. The primary key carries over only
    /// if selected.
    pub fn select_columns<S: AsRef<str>>(&self, names: &[S]) -> Result<DataFrame> {
        let mut columns: Vec<(String, ScalarColumn)> = Vec::with_capacity(names.len());
        for name in names {
            let name = name.as_ref();
            let column = self.column(name)?;
            if !columns.iter().any(|(n, _)| n == name) {
                columns.push((name.to_string(), column.clone()));
            }
        }
        let primary_key = self
            .primary_key
            .clone()
            .filter(|pk| names.iter().any(|n| n.as_ref() == pk.as_str()));
        Ok(DataFrame {
            id: FrameId::next(),
            columns,
            primary_key,
        })
    }

    /// Resolve a row selection to positions into this frame.
    pub fn positions(&self, selection: &RowSelection) -> Result<Vec<usize>> {
        let len = self.len();
        match selection {
            RowSelection::Range { start, end } => {
                let end = end.unwrap_or(len).min(len);
                Ok((*start..end).collect())
            }
            RowSelection::Positions(positions) => {
                if let Some(&bad) = positions.iter().find(|&&p| p >= len) {
                    return Err(FrameError::index(bad, len));
                }
                Ok(positions.clone())
            }
            RowSelection::Mask(mask) => mask.true_positions(len),
            RowSelection::Keys { key_column, keys } => {
                let key_column = match key_column.as_deref().or(self.primary_key()) {
                    Some(name) => name,
                    None => {
                        return Err(FrameError::InvalidRequest(
                            "a key column is required when the frame has no primary key"
                                .to_string(),
                        ))
                    }
                };
                self.key_positions(key_column, keys)
            }
        }
    }

    /// Positions of the rows whose `key_column` value matches each key, in
    /// key order. Every key must match at least one row. Matching follows
    /// [`Value::key_eq`].
    fn key_positions(&self, key_column: &str, keys: &[Value]) -> Result<Vec<usize>> {
        let column = self.column(key_column)?;
        let mut positions = Vec::with_capacity(keys.len());
        for key in keys {
            let before = positions.len();
            positions.extend(matching_rows(column, key));
            if positions.len() == before {
                return Err(FrameError::KeyNotFound {
                    column: key_column.to_string(),
                    key: key.to_string(),
                });
            }
        }
        Ok(positions)
    }

    /// A new frame holding the selected rows.
    pub fn select_rows(&self, selection: &RowSelection) -> Result<DataFrame> {
        self.take(&self.positions(selection)?)
    }

    /// A new frame holding the rows at `positions`, in that order.
    pub fn take(&self, positions: &[usize]) -> Result<DataFrame> {
        let columns = self
            .columns
            .iter()
            .map(|(name, col)| Ok((name.clone(), col.take(positions)?)))
            .collect::<Result<Vec<_>>>()?;
        Ok(DataFrame {
            id: FrameId::next(),
            columns,
            primary_key: self.primary_key.clone(),
        })
    }

    pub fn slice(&self, range: Range<usize>) -> Result<DataFrame> {
        self.select_rows(&RowSelection::Range {
            start: range.start,
            end: Some(range.end),
        })
    }

    pub fn filter(&self, mask: &ScalarColumn) -> Result<DataFrame> {
        self.take(&mask.true_positions(self.len())?)
    }

    /// Rows by primary key, in key order.
    pub fn loc(&self, keys: &[Value]) -> Result<DataFrame> {
        self.select_rows(&RowSelection::Keys {
            key_column: None,
            keys: keys.to_vec(),
        })
    }

    // ==================== Mutation ====================

    /// Delete the row at `index` in place. Later rows move up one position.
    pub fn remove_row(&mut self, index: usize) -> Result<DataFrameModification> {
        let len = self.len();
        if index >= len {
            return Err(FrameError::index(index, len));
        }
        for (_, col) in self.columns.iter_mut() {
            col.delete(index)?;
        }
        Ok(DataFrameModification::new(
            self.id,
            self.columns.iter().map(|(name, _)| name.clone()),
        ))
    }

    /// Overwrite `column` in every row whose `id_column` value matches
    /// `row_id` (see [`Value::key_eq`]).
    ///
    /// Fails without touching the frame if either column is missing, no row
    /// matches, `value` cannot be stored in `column`, or the edit would
    /// repeat a primary key value.
    pub fn edit(
        &mut self,
        value: Value,
        column: &str,
        row_id: &Value,
        id_column: &str,
    ) -> Result<DataFrameModification> {
        let positions: Vec<usize> = matching_rows(self.column(id_column)?, row_id).collect();
        self.column(column)?;
        if positions.is_empty() {
            return Err(FrameError::NoMatchingRow {
                column: id_column.to_string(),
                value: row_id.to_string(),
            });
        }
        let written = if self.primary_key.as_deref() == Some(column) {
            let mut edited = self.column(column)?.clone();
            let written = edited.set_positions(&positions, value)?;
            ensure_unique(column, &edited)?;
            *self.column_mut(column)? = edited;
            written
        } else {
            self.column_mut(column)?.set_positions(&positions, value)?
        };
        log::debug!("{}: edited {} row(s) of '{}'", self.id, written, column);
        Ok(DataFrameModification::new(self.id, [column]))
    }

    /// Same names, same row count and `equals`-equal columns. Identity is
    /// not compared.
    pub fn equals(&self, other: &DataFrame) -> bool {
        self.columns.len() == other.columns.len()
            && self.primary_key == other.primary_key
            && self
                .columns
                .iter()
                .zip(&other.columns)
                .all(|((a, ca), (b, cb))| a == b && ca.equals(cb))
    }
}

fn matching_rows<'a>(column: &'a ScalarColumn, key: &'a Value) -> impl Iterator<Item = usize> + 'a {
    column
        .iter()
        .enumerate()
        .filter(move |(_, v)| v.key_eq(key))
        .map(|(i, _)| i)
}

/// Fails with `DuplicateKey` if any value occurs twice in `column`.
fn ensure_unique(name: &str, column: &ScalarColumn) -> Result<()> {
    let mut sorted: Vec<&Value> = column.iter().collect();
    sorted.sort_by(|a, b| a.total_cmp(b));
    match sorted.windows(2).find(|pair| pair[0].same_as(pair[1])) {
        Some(pair) => Err(FrameError::DuplicateKey {
            column: name.to_string(),
            key: pair[0].to_string(),
        }),
        None => Ok(()),
    }
}

impl Default for DataFrame {
    fn default() -> Self {
        DataFrame::new()
    }
}

impl fmt::Debug for DataFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "DataFrame {{ id: '{}', columns: {}, rows: {} }}",
            self.id,
            self.columns.len(),
            self.len()
        )
    }
}

pub struct RowIterator<'a> {
    df: &'a DataFrame,
    index: usize,
}

impl<'a> Iterator for RowIterator<'a> {
    type Item = Vec<&'a Value>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.index >= self.df.len() {
            return None;
        }
        let row = self.df.row(self.index).ok()?;
        self.index += 1;
        Some(row)
    }
}
