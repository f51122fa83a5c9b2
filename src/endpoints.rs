/// Endpoint handlers
///
/// Thin functions between a transport and the dataframe core. Each takes a
/// frame plus a serde request type and returns a serde response type, so the
/// same handlers serve the HTTP server and direct callers.
///
/// Mutating handlers push exactly one modification onto the queue when they
/// succeed and nothing when they fail.

use crate::backend::BackendKind;
use crate::error::{FrameError, Result};
use crate::frame::{DataFrame, FrameId, RowSelection};
use crate::modification::ModificationQueue;
use crate::value::{DType, Value};
use serde::{Deserialize, Serialize};

/// Description of one column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnInfo {
    pub name: String,
    pub dtype: DType,
    /// "numeric", "boolean" or "string"
    #[serde(rename = "type")]
    pub semantic_type: String,
    pub backend: BackendKind,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SchemaRequest {
    #[serde(default)]
    pub columns: Option<Vec<String>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SchemaResponse {
    pub id: FrameId,
    pub columns: Vec<ColumnInfo>,
    pub nrows: usize,
    pub primary_key: Option<String>,
}

/// Row request. Exactly one selection mode applies: `posidxs` wins over
/// `start`/`end`, which win over `keyidxs`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RowsRequest {
    #[serde(default)]
    pub start: Option<usize>,
    #[serde(default)]
    pub end: Option<usize>,
    #[serde(default)]
    pub posidxs: Option<Vec<usize>>,
    #[serde(default)]
    pub key_column: Option<String>,
    #[serde(default)]
    pub keyidxs: Option<Vec<Value>>,
    #[serde(default)]
    pub columns: Option<Vec<String>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RowsResponse {
    pub column_infos: Vec<ColumnInfo>,
    /// Positions of the returned rows, for positional requests
    pub posidxs: Option<Vec<usize>>,
    pub rows: Vec<Vec<serde_json::Value>>,
    /// Row count of the whole frame
    pub full_length: usize,
    pub primary_key: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RemoveRowRequest {
    pub row_index: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EditRequest {
    pub value: Value,
    pub column: String,
    pub row_id: Value,
    pub id_column: String,
}

/// Infos for `columns` (all columns when `None`). Names starting with `_`
/// are hidden, repeats are dropped, and the primary key is always included.
fn column_infos(df: &DataFrame, columns: Option<&[String]>) -> Result<Vec<ColumnInfo>> {
    let mut names: Vec<&str> = match columns {
        Some(columns) => {
            if let Some(missing) = columns.iter().find(|c| !df.has_column(c)) {
                return Err(FrameError::ColumnNotFound(missing.clone()));
            }
            let mut names: Vec<&str> = Vec::with_capacity(columns.len());
            for column in columns {
                if !names.contains(&column.as_str()) {
                    names.push(column);
                }
            }
            names
        }
        None => df.names(),
    };
    names.retain(|name| !name.starts_with('_'));
    if let Some(pk) = df.primary_key() {
        if !names.contains(&pk) {
            names.push(pk);
        }
    }

    names
        .into_iter()
        .map(|name| {
            let column = df.column(name)?;
            Ok(ColumnInfo {
                name: name.to_string(),
                dtype: column.dtype(),
                semantic_type: column.dtype().semantic().to_string(),
                backend: column.backend(),
            })
        })
        .collect()
}

pub fn schema(df: &DataFrame, request: &SchemaRequest) -> Result<SchemaResponse> {
    Ok(SchemaResponse {
        id: df.id(),
        columns: column_infos(df, request.columns.as_deref())?,
        nrows: df.len(),
        primary_key: df.primary_key().map(str::to_string),
    })
}

pub fn rows(df: &DataFrame, request: &RowsRequest) -> Result<RowsResponse> {
    let column_infos = column_infos(df, request.columns.as_deref())?;

    let (selection, positional) = if let Some(posidxs) = &request.posidxs {
        (RowSelection::Positions(posidxs.clone()), true)
    } else if let Some(start) = request.start {
        (RowSelection::Range { start, end: request.end }, true)
    } else if let Some(keys) = &request.keyidxs {
        let selection = RowSelection::Keys {
            key_column: request.key_column.clone(),
            keys: keys.clone(),
        };
        (selection, false)
    } else {
        return Err(FrameError::InvalidRequest(
            "one of posidxs, start or keyidxs is required".to_string(),
        ));
    };

    let positions = df.positions(&selection)?;
    let names: Vec<&str> = column_infos.iter().map(|info| info.name.as_str()).collect();
    let view = df.select_columns(names.as_slice())?.take(&positions)?;
    let rows = view
        .iter_rows()
        .map(|row| row.into_iter().map(Value::to_json).collect())
        .collect();

    Ok(RowsResponse {
        column_infos,
        posidxs: positional.then_some(positions),
        rows,
        full_length: df.len(),
        primary_key: view.primary_key().map(str::to_string),
    })
}

pub fn remove_row_by_index(
    df: &mut DataFrame,
    queue: &mut ModificationQueue,
    request: &RemoveRowRequest,
) -> Result<()> {
    queue.push(df.remove_row(request.row_index)?);
    Ok(())
}

pub fn edit(df: &mut DataFrame, queue: &mut ModificationQueue, request: &EditRequest) -> Result<()> {
    queue.push(df.edit(
        request.value.clone(),
        &request.column,
        &request.row_id,
        &request.id_column,
    )?);
    Ok(())
}
