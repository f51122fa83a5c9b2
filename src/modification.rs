/// Modifications - records of state that changed
///
/// Every mutating operation on a [`DataFrame`] or [`Store`] produces a
/// modification naming what changed. Modifications accumulate in a
/// [`ModificationQueue`] until the trigger pipeline drains them and re-runs
/// the reactions that depend on the changed state.
///
/// # Usage Pattern
///
/// 1. A mutation returns a `DataFrameModification`
/// 2. The caller pushes it onto the queue
/// 3. `trigger` drains the queue and propagates the batch
///
/// [`DataFrame`]: crate::frame::DataFrame
/// [`Store`]: crate::store::Store

use crate::frame::FrameId;
use crate::store::StoreId;
use serde::Serialize;
use std::collections::BTreeSet;

/// A change to the columns of one dataframe.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[must_use = "a modification is lost unless it is pushed onto a ModificationQueue"]
pub struct DataFrameModification {
    pub id: FrameId,
    /// Names of the columns whose values changed
    pub scope: BTreeSet<String>,
}

impl DataFrameModification {
    pub fn new<I, S>(id: FrameId, scope: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        DataFrameModification {
            id,
            scope: scope.into_iter().map(Into::into).collect(),
        }
    }
}

/// A change to a store's value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[must_use = "a modification is lost unless it is pushed onto a ModificationQueue"]
pub struct StoreModification {
    pub id: StoreId,
}

/// Any state change the trigger pipeline propagates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type")]
pub enum Modification {
    DataFrame(DataFrameModification),
    Store(StoreModification),
}

impl Modification {
    /// Does this modification touch `input`?
    pub fn touches(&self, input: &Input) -> bool {
        match (self, input) {
            (Modification::DataFrame(m), Input::Frame { id, columns }) => {
                m.id == *id
                    && match columns {
                        None => true,
                        Some(columns) => !m.scope.is_disjoint(columns),
                    }
            }
            (Modification::Store(m), Input::Store(id)) => m.id == *id,
            _ => false,
        }
    }
}

impl From<DataFrameModification> for Modification {
    fn from(m: DataFrameModification) -> Self {
        Modification::DataFrame(m)
    }
}

impl From<StoreModification> for Modification {
    fn from(m: StoreModification) -> Self {
        Modification::Store(m)
    }
}

/// State a reaction reads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Input {
    /// Some columns of a frame, or every column when `columns` is `None`
    Frame {
        id: FrameId,
        columns: Option<BTreeSet<String>>,
    },
    Store(StoreId),
}

impl Input {
    pub fn frame(id: FrameId) -> Self {
        Input::Frame { id, columns: None }
    }

    pub fn columns<I, S>(id: FrameId, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Input::Frame {
            id,
            columns: Some(columns.into_iter().map(Into::into).collect()),
        }
    }
}

/// Pending modifications, in enqueue order.
#[derive(Debug, Clone, Default)]
pub struct ModificationQueue {
    pending: Vec<Modification>,
    /// Incremented on every drain
    generation: u64,
}

impl ModificationQueue {
    pub fn new() -> Self {
        ModificationQueue::default()
    }

    /// Add a modification to the back of the queue
    pub fn push(&mut self, modification: impl Into<Modification>) {
        let modification = modification.into();
        log::debug!("queued {:?}", modification);
        self.pending.push(modification);
    }

    /// Modifications waiting for the next drain
    pub fn pending(&self) -> &[Modification] {
        &self.pending
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    /// Take every pending modification, leaving the queue empty.
    pub fn drain(&mut self) -> Vec<Modification> {
        self.generation += 1;
        std::mem::take(&mut self.pending)
    }
}
