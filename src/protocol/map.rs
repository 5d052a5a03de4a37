//! Map reader: entries `[key ref][value unit]` berurutan.
//!
//! Key di-resolve lazy: banyak scan hanya butuh value, jadi `key()` baru
//! dihitung saat diminta lalu di-cache untuk posisi itu.

use std::sync::Arc;

use super::entries::{Entries, PairLayout};
use super::reader::JbReader;
use super::types::JbType;
use crate::error::{JbError, Result};

#[derive(Debug, Clone)]
pub struct JbMap<'a> {
    entries: Entries<'a, PairLayout>,
    key: Option<(usize, Arc<str>)>,
}

impl<'a> JbMap<'a> {
    pub(crate) fn new(reader: JbReader<'a>) -> Self {
        Self {
            entries: Entries::new(reader),
            key: None,
        }
    }

    /// Posisikan ke entry pertama; `false` jika map kosong.
    pub fn first(&mut self) -> bool {
        self.entries.first()
    }

    pub fn next(&mut self) -> Result<bool> {
        self.entries.next()
    }

    pub fn seek(&mut self, pos: usize) -> Result<bool> {
        self.entries.seek(pos)
    }

    pub fn ok(&self) -> bool {
        self.entries.ok()
    }

    pub fn index(&self) -> Option<usize> {
        self.entries.index()
    }

    pub fn reset(&mut self) {
        self.entries.reset();
    }

    pub fn length(&mut self) -> Result<usize> {
        self.entries.length()
    }

    fn entry_offset(&self) -> Result<usize> {
        self.entries
            .offset()
            .ok_or_else(|| JbError::Contract("map is not positioned on an entry".to_string()))
    }

    /// Key dari entry saat ini.
    pub fn key(&mut self) -> Result<Arc<str>> {
        let offset = self.entry_offset()?;
        if let Some((cached_at, key)) = &self.key {
            if *cached_at == offset {
                return Ok(Arc::clone(key));
            }
        }
        let mut reader = self.entries.reader().clone();
        reader.set_offset(offset)?;
        let key: Arc<str> = match reader.unit_type()? {
            JbType::Ref => reader
                .read_ref()?
                .ok_or_else(|| JbError::malformed(offset, "null reference as map key"))?,
            JbType::String => Arc::from(reader.read_string()?),
            other => {
                return Err(JbError::TypeMismatch {
                    offset,
                    expected: "map key",
                    found: other.name(),
                })
            }
        };
        self.key = Some((offset, Arc::clone(&key)));
        Ok(key)
    }

    /// Reader yang diposisikan pada value entry saat ini.
    pub fn value(&self) -> Result<JbReader<'a>> {
        let offset = self.entry_offset()?;
        let mut reader = self.entries.reader().clone();
        let key_size = reader.size_at(offset)?;
        reader.set_offset(offset + key_size)?;
        Ok(reader)
    }

    /// Cari `key` secara linear mulai dari posisi saat ini, wrap sekali ke
    /// awal. Jika tidak ketemu, posisi cursor dikembalikan seperti semula.
    ///
    /// Length tidak dihitung di depan: scan berhenti begitu key ketemu.
    pub fn select_key(&mut self, key: &str) -> Result<bool> {
        let saved = self.entries.position();
        let origin = match self.entries.index() {
            Some(index) => index,
            None if self.entries.first() => 0,
            None => {
                self.entries.restore(saved);
                return Ok(false);
            }
        };
        loop {
            if self.key()?.as_ref() == key {
                return Ok(true);
            }
            if !self.entries.next()? {
                self.entries.first();
            }
            if self.entries.index() == Some(origin) {
                break;
            }
        }
        self.entries.restore(saved);
        Ok(false)
    }

    /// Shortcut: value reader untuk `key`, `None` jika key tidak ada.
    pub fn get(&mut self, key: &str) -> Result<Option<JbReader<'a>>> {
        if self.select_key(key)? {
            Ok(Some(self.value()?))
        } else {
            Ok(None)
        }
    }
}
