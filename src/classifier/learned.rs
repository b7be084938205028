use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::FormError;
use crate::field::FieldType;

/// A signal string whose type was confirmed by a user correction or the oracle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LearnedEntry {
    pub signals: String,
    pub field_type: FieldType,
}

#[async_trait]
pub trait LearnedStore: Send + Sync {
    async fn learned_entries(&self) -> Result<Vec<LearnedEntry>, FormError>;

    async fn add_learned_entry(&self, entry: LearnedEntry) -> Result<(), FormError>;
}

/// Process-local store; a newer entry for the same signals replaces the older one.
#[derive(Default)]
pub struct MemoryLearnedStore {
    entries: Mutex<Vec<LearnedEntry>>,
}

impl MemoryLearnedStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_entries(entries: Vec<LearnedEntry>) -> Self {
        Self {
            entries: Mutex::new(entries),
        }
    }
}

#[async_trait]
impl LearnedStore for MemoryLearnedStore {
    async fn learned_entries(&self) -> Result<Vec<LearnedEntry>, FormError> {
        Ok(self
            .entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone())
    }

    async fn add_learned_entry(&self, entry: LearnedEntry) -> Result<(), FormError> {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries.retain(|e| e.signals != entry.signals);
        entries.push(entry);
        Ok(())
    }
}
