/// Stores - reactive scalar state
///
/// A Store holds one JSON value that reactions can read and overwrite, such
/// as a selected row, a threshold or a computed summary. Writing a store
/// produces a [`StoreModification`] just as editing a dataframe produces a
/// [`DataFrameModification`].
///
/// [`DataFrameModification`]: crate::modification::DataFrameModification

use crate::modification::StoreModification;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_STORE_ID: AtomicU64 = AtomicU64::new(1);

/// Opaque store identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct StoreId(u64);

impl StoreId {
    pub fn next() -> Self {
        StoreId(NEXT_STORE_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for StoreId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "store-{}", self.0)
    }
}

#[derive(Debug, Clone)]
pub struct Store {
    id: StoreId,
    value: serde_json::Value,
}

impl Store {
    pub fn new(value: serde_json::Value) -> Self {
        Store {
            id: StoreId::next(),
            value,
        }
    }

    pub fn id(&self) -> StoreId {
        self.id
    }

    pub fn get(&self) -> &serde_json::Value {
        &self.value
    }

    /// Replace the value. Writing an equal value changes nothing and returns
    /// `None`.
    pub fn set(&mut self, value: serde_json::Value) -> Option<StoreModification> {
        if self.value == value {
            return None;
        }
        self.value = value;
        Some(StoreModification { id: self.id })
    }
}
