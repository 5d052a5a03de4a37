//! Array reader: value units berurutan

use super::entries::{Entries, UnitLayout};
use super::reader::JbReader;
use crate::error::{JbError, Result};

#[derive(Debug, Clone)]
pub struct JbArray<'a> {
    entries: Entries<'a, UnitLayout>,
}

impl<'a> JbArray<'a> {
    pub(crate) fn new(reader: JbReader<'a>) -> Self {
        Self {
            entries: Entries::new(reader),
        }
    }

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

    /// Reader pada elemen saat ini.
    pub fn value(&self) -> Result<JbReader<'a>> {
        let offset = self
            .entries
            .offset()
            .ok_or_else(|| JbError::Contract("array is not positioned on an element".to_string()))?;
        let mut reader = self.entries.reader().clone();
        reader.set_offset(offset)?;
        Ok(reader)
    }

    /// Reader pada elemen `pos`, `None` jika di luar range.
    pub fn get(&mut self, pos: usize) -> Result<Option<JbReader<'a>>> {
        if self.seek(pos)? {
            Ok(Some(self.value()?))
        } else {
            Ok(None)
        }
    }
}
