//! Text: container berisi raw code points dan reference ke dictionary
//!
//! Reference di dalam text:
//! ```text
//! 111gaass [index u8 | u16 | u32]
//!    g  = global dictionary
//!    aa = append: 0 none, 1 space, 2 underscore, 3 colon
//!    ss = lebar index: 0 u8, 1 u16, 2 u32
//! ```

use super::codepoint::{self, TEXT_REF_PREFIX};
use super::entries::{EntryLayout, Entries};
use super::reader::JbReader;
use super::types::Endian;
use crate::error::{JbError, Result};

pub(crate) const TEXT_REF_GLOBAL: u8 = 0b0001_0000;

/// Delimiter yang bisa di-embed ke text reference, index = kode `aa`.
pub(crate) const TEXT_APPEND: [Option<char>; 4] = [None, Some(' '), Some('_'), Some(':')];

/// Lead-in byte dan lebar index untuk text reference.
pub(crate) fn text_ref_header(index: usize, global: bool, append: Option<char>) -> Result<(u8, usize)> {
    let (ss, width) = if index <= u8::MAX as usize {
        (0u8, 1)
    } else if index <= u16::MAX as usize {
        (1, 2)
    } else if index <= u32::MAX as usize {
        (2, 4)
    } else {
        return Err(JbError::InvalidInput(format!("dictionary index {index} too large")));
    };
    let aa = TEXT_APPEND
        .iter()
        .position(|a| *a == append)
        .ok_or_else(|| JbError::InvalidInput(format!("{append:?} cannot be appended")))? as u8;
    let g = if global { TEXT_REF_GLOBAL } else { 0 };
    Ok((TEXT_REF_PREFIX | g | (aa << 2) | ss, width))
}

/// Satu unit di dalam text
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextUnit {
    Char(char),
    Ref {
        index: usize,
        global: bool,
        append: Option<char>,
    },
}

pub(crate) fn decode_unit(reader: &JbReader<'_>, pos: usize) -> Result<(TextUnit, usize)> {
    let lead = reader.get_u8(pos)?;
    if !codepoint::is_text_ref(lead) {
        let (c, len) = codepoint::decode(reader.buffer(), pos, reader.end())?;
        return Ok((TextUnit::Char(c), len));
    }
    let global = lead & TEXT_REF_GLOBAL != 0;
    let append = TEXT_APPEND[((lead >> 2) & 0b11) as usize];
    let (index, len) = match lead & 0b11 {
        0 => (reader.get_u8(pos + 1)? as usize, 2),
        1 => (reader.get_u16(pos + 1, Endian::Big)? as usize, 3),
        2 => (reader.get_u32(pos + 1, Endian::Big)? as usize, 5),
        _ => return Err(JbError::malformed(pos, "invalid text reference width")),
    };
    Ok((
        TextUnit::Ref {
            index,
            global,
            append,
        },
        len,
    ))
}

#[derive(Debug, Clone)]
pub(crate) struct TextLayout;

impl EntryLayout for TextLayout {
    #[inline(always)]
    fn entry_size(reader: &JbReader<'_>, pos: usize) -> Result<usize> {
        Ok(decode_unit(reader, pos)?.1)
    }
}

/// Text reader. Hasil decode lengkap dihitung sekali lalu di-cache.
#[derive(Debug, Clone)]
pub struct JbText<'a> {
    entries: Entries<'a, TextLayout>,
    decoded: Option<String>,
}

impl<'a> JbText<'a> {
    pub(crate) fn new(reader: JbReader<'a>) -> Self {
        Self {
            entries: Entries::new(reader),
            decoded: None,
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

    /// Jumlah unit (code point + reference), bukan jumlah karakter hasil decode.
    pub fn length(&mut self) -> Result<usize> {
        self.entries.length()
    }

    /// Unit pada posisi saat ini.
    pub fn unit(&self) -> Result<TextUnit> {
        let offset = self
            .entries
            .offset()
            .ok_or_else(|| JbError::Contract("text is not positioned on a unit".to_string()))?;
        Ok(decode_unit(self.entries.reader(), offset)?.0)
    }

    /// String hasil decode (idempotent, di-cache).
    pub fn as_str(&mut self) -> Result<&str> {
        if self.decoded.is_none() {
            self.decoded = Some(self.decode()?);
        }
        Ok(self.decoded.as_deref().unwrap_or_default())
    }

    pub fn into_string(mut self) -> Result<String> {
        match self.decoded.take() {
            Some(s) => Ok(s),
            None => self.decode(),
        }
    }

    fn decode(&self) -> Result<String> {
        let reader = self.entries.reader();
        let mut out = String::with_capacity(reader.end() - reader.offset());
        let mut pos = reader.offset();
        while pos < reader.end() {
            let (unit, len) = decode_unit(reader, pos)?;
            match unit {
                TextUnit::Char(c) => out.push(c),
                TextUnit::Ref {
                    index,
                    global,
                    append,
                } => {
                    out.push_str(&reader.resolve(pos, index, global)?);
                    if let Some(c) = append {
                        out.push(c);
                    }
                }
            }
            pos += len;
        }
        Ok(out)
    }
}
