//! Core module: dictionary, dictionary store, transaksi, dan feature file
//!
//! Prinsip desain:
//! - Dictionary immutable setelah dipublish, di-share via `Arc`
//! - Store concurrent tanpa global lock (sharded map)
//! - Feature file di-mmap, iterasi hanya mengandalkan size unit

mod dict_manager;
mod dictionary;
mod mmap_storage;
mod txn;

pub use dict_manager::{DictionaryStore, JbDictManager};
pub use dictionary::JbDict;
pub use mmap_storage::{FeatureFile, FeatureIter};
pub use txn::{NakshaUuid, Txn};
