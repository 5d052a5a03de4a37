//! Dictionary Store: registry global dictionary berdasarkan id
//!
//! Satu-satunya resource yang di-share antar thread. Dictionary immutable
//! setelah dibuat (`Arc<JbDict>`), jadi `put` cukup publish pointer yang sudah
//! lengkap; reader tidak pernah melihat dictionary setengah jadi.

use std::sync::Arc;

use dashmap::DashMap;
use tracing::debug;

use super::dictionary::JbDict;
use crate::error::{JbError, Result};

/// Store yang me-resolve global dictionary berdasarkan id.
pub trait DictionaryStore: Send + Sync {
    /// Dictionary dengan `id`, jika sudah terdaftar
    fn get(&self, id: &str) -> Option<Arc<JbDict>>;

    /// Daftarkan dictionary (harus punya id). Menimpa entry lama dengan id sama.
    fn put(&self, dict: Arc<JbDict>) -> Result<()>;

    /// Hapus `dict` jika memang instance itu yang terdaftar untuk id-nya.
    fn remove(&self, dict: &JbDict) -> bool;
}

/// In-memory [`DictionaryStore`] backed by a sharded concurrent map.
#[derive(Debug, Default)]
pub struct JbDictManager {
    dictionaries: DashMap<String, Arc<JbDict>>,
}

impl JbDictManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.dictionaries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dictionaries.is_empty()
    }
}

impl DictionaryStore for JbDictManager {
    #[inline(always)]
    fn get(&self, id: &str) -> Option<Arc<JbDict>> {
        self.dictionaries.get(id).map(|entry| Arc::clone(entry.value()))
    }

    fn put(&self, dict: Arc<JbDict>) -> Result<()> {
        let id = dict
            .id()
            .ok_or_else(|| JbError::InvalidInput("dictionary without id".to_string()))?
            .to_string();
        debug!(dict_id = %id, entries = dict.len(), "register global dictionary");
        self.dictionaries.insert(id, dict);
        Ok(())
    }

    fn remove(&self, dict: &JbDict) -> bool {
        let Some(id) = dict.id() else {
            return false;
        };
        let removed = self
            .dictionaries
            .remove_if(id, |_, current| std::ptr::eq(Arc::as_ptr(current), dict))
            .is_some();
        if removed {
            debug!(dict_id = %id, "removed global dictionary");
        }
        removed
    }
}
