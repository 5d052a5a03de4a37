//! Dictionary: tabel string append-only, index = urutan insert (0-based)
//!
//! - Local dictionary: dibangun saat encoding satu feature, di-embed inline
//! - Global dictionary: punya id, dibagi antar feature, di-resolve lewat
//!   [`DictionaryStore`](crate::core::DictionaryStore)

use std::collections::HashMap;
use std::sync::Arc;

use crate::error::{JbError, Result};
use crate::protocol::{JbReader, JbType};

/// Ordered, append-only string table.
#[derive(Debug, Clone, Default)]
pub struct JbDict {
    id: Option<String>,
    entries: Vec<Arc<str>>,
    index: HashMap<Arc<str>, usize>,
}

impl JbDict {
    /// Dictionary lokal (tanpa id)
    pub fn new() -> Self {
        Self::default()
    }

    /// Dictionary global dengan id
    pub fn with_id(id: impl Into<String>) -> Self {
        Self {
            id: Some(id.into()),
            ..Self::default()
        }
    }

    /// Build dari daftar string; duplikat di-dedup.
    pub fn from_entries<I, S>(id: Option<String>, entries: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut dict = Self {
            id,
            ..Self::default()
        };
        for entry in entries {
            dict.add(entry.as_ref());
        }
        dict
    }

    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    #[inline(always)]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline(always)]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Index dari `value` (exact match), `None` jika tidak ada.
    #[inline(always)]
    pub fn index_of(&self, value: &str) -> Option<usize> {
        self.index.get(value).copied()
    }

    /// Entry pada `index`, bounds-checked.
    #[inline(always)]
    pub fn get(&self, index: usize) -> Option<&Arc<str>> {
        self.entries.get(index)
    }

    /// Append `value`, atau return index lama jika sudah ada.
    pub fn add(&mut self, value: &str) -> usize {
        if let Some(index) = self.index.get(value) {
            return *index;
        }
        let index = self.entries.len();
        let entry: Arc<str> = Arc::from(value);
        self.entries.push(Arc::clone(&entry));
        self.index.insert(entry, index);
        index
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| e.as_ref())
    }

    /// Kosongkan entries, id tetap
    pub fn clear(&mut self) {
        self.entries.clear();
        self.index.clear();
    }

    /// Parse dictionary block (global atau local) dari buffer.
    pub fn from_bytes(buf: &[u8]) -> Result<Self> {
        let mut reader = JbReader::new(buf);
        Self::read(&mut reader)
    }

    /// Parse dictionary block pada offset reader, reader maju melewati block.
    pub fn read(reader: &mut JbReader<'_>) -> Result<Self> {
        let start = reader.offset();
        let unit_type = reader.unit_type()?;
        if !matches!(
            unit_type,
            JbType::GlobalDictionary | JbType::LocalDictionary
        ) {
            return Err(JbError::TypeMismatch {
                offset: start,
                expected: "dictionary",
                found: unit_type.name(),
            });
        }
        let (body_start, body_end) = reader.structure_body()?;
        let mut body = reader.sub_reader(body_start, body_end)?;

        let mut dict = Self::new();
        if unit_type == JbType::GlobalDictionary {
            if body.is_null() {
                body.next_unit()?;
            } else {
                dict.id = Some(body.read_string()?);
            }
        }
        while !body.is_eof() {
            let offset = body.offset();
            let entry = body.read_string()?;
            let index = dict.entries.len();
            if dict.add(&entry) != index {
                return Err(JbError::malformed(
                    offset,
                    format!("duplicate dictionary entry {entry:?}"),
                ));
            }
        }
        reader.set_offset(body_end)?;
        Ok(dict)
    }
}
