//! Navigasi container generik (map/array/text)
//!
//! State machine:
//! - length: `None` (belum diketahui) atau `Some(n)` (cached)
//! - position: `Unpositioned`, `At { index, offset }`, `PastEnd`
//!
//! Layout container hanya menentukan cara melompati satu entry.

use std::marker::PhantomData;

use super::reader::JbReader;
use crate::error::Result;

/// Cara mengukur satu entry dalam container.
pub(crate) trait EntryLayout {
    fn entry_size(reader: &JbReader<'_>, pos: usize) -> Result<usize>;
}

/// Entry = satu unit
#[derive(Debug, Clone)]
pub(crate) struct UnitLayout;

impl EntryLayout for UnitLayout {
    #[inline(always)]
    fn entry_size(reader: &JbReader<'_>, pos: usize) -> Result<usize> {
        reader.size_at(pos)
    }
}

/// Entry = key unit + value unit
#[derive(Debug, Clone)]
pub(crate) struct PairLayout;

impl EntryLayout for PairLayout {
    #[inline(always)]
    fn entry_size(reader: &JbReader<'_>, pos: usize) -> Result<usize> {
        let key = reader.size_at(pos)?;
        Ok(key + reader.size_at(pos + key)?)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Position {
    Unpositioned,
    At { index: usize, offset: usize },
    PastEnd,
}

/// Cursor atas entries satu container, `reader` dibatasi ke content container.
#[derive(Debug, Clone)]
pub(crate) struct Entries<'a, L> {
    reader: JbReader<'a>,
    start: usize,
    position: Position,
    length: Option<usize>,
    _layout: PhantomData<L>,
}

impl<'a, L: EntryLayout> Entries<'a, L> {
    pub(crate) fn new(reader: JbReader<'a>) -> Self {
        let start = reader.offset();
        let length = if reader.is_eof() { Some(0) } else { None };
        Self {
            reader,
            start,
            position: Position::Unpositioned,
            length,
            _layout: PhantomData,
        }
    }

    #[inline(always)]
    pub(crate) fn reader(&self) -> &JbReader<'a> {
        &self.reader
    }

    #[inline(always)]
    fn end(&self) -> usize {
        self.reader.end()
    }

    #[inline(always)]
    pub(crate) fn position(&self) -> Position {
        self.position
    }

    #[inline(always)]
    pub(crate) fn restore(&mut self, position: Position) {
        self.position = position;
    }

    #[inline(always)]
    pub(crate) fn ok(&self) -> bool {
        matches!(self.position, Position::At { .. })
    }

    pub(crate) fn index(&self) -> Option<usize> {
        match self.position {
            Position::At { index, .. } => Some(index),
            _ => None,
        }
    }

    pub(crate) fn offset(&self) -> Option<usize> {
        match self.position {
            Position::At { offset, .. } => Some(offset),
            _ => None,
        }
    }

    pub(crate) fn reset(&mut self) {
        self.position = Position::Unpositioned;
    }

    /// Ke entry pertama; `false` jika container kosong.
    pub(crate) fn first(&mut self) -> bool {
        if self.start >= self.end() {
            self.length = Some(0);
            self.position = Position::PastEnd;
            return false;
        }
        self.position = Position::At {
            index: 0,
            offset: self.start,
        };
        true
    }

    /// Maju satu entry. Melewati entry terakhir menandai `PastEnd` dan
    /// meng-cache length.
    pub(crate) fn next(&mut self) -> Result<bool> {
        match self.position {
            Position::Unpositioned => Ok(self.first()),
            Position::PastEnd => Ok(false),
            Position::At { index, offset } => {
                let next = offset + L::entry_size(&self.reader, offset)?;
                if next >= self.end() {
                    self.length = Some(index + 1);
                    self.position = Position::PastEnd;
                    return Ok(false);
                }
                self.position = Position::At {
                    index: index + 1,
                    offset: next,
                };
                Ok(true)
            }
        }
    }

    /// Walk dari `(index, offset)` sampai `target`; `None` jika lewat ujung
    /// (length ikut di-cache).
    fn walk(&mut self, mut index: usize, mut offset: usize, target: usize) -> Result<Option<usize>> {
        while index < target {
            let next = offset + L::entry_size(&self.reader, offset)?;
            if next >= self.end() {
                self.length = Some(index + 1);
                return Ok(None);
            }
            index += 1;
            offset = next;
        }
        Ok(Some(offset))
    }

    /// Seek ke entry `pos`. Di luar `[0, length)` menjadi `Unpositioned`.
    pub(crate) fn seek(&mut self, pos: usize) -> Result<bool> {
        if self.length.map_or(false, |len| pos >= len) {
            self.position = Position::Unpositioned;
            return Ok(false);
        }
        let (index, offset) = match self.position {
            Position::At { index, offset } if index <= pos => (index, offset),
            _ => (0, self.start),
        };
        match self.walk(index, offset, pos)? {
            Some(offset) => {
                self.position = Position::At { index: pos, offset };
                Ok(true)
            }
            None => {
                self.position = Position::Unpositioned;
                Ok(false)
            }
        }
    }

    /// Jumlah entry; dihitung sekali lalu di-cache.
    pub(crate) fn length(&mut self) -> Result<usize> {
        if let Some(len) = self.length {
            return Ok(len);
        }
        let (index, offset) = match self.position {
            Position::At { index, offset } => (index, offset),
            _ => (0, self.start),
        };
        self.walk(index, offset, usize::MAX)?;
        Ok(self.length.unwrap_or(0))
    }
}
