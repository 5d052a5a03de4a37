//! Zero-copy JBON reader (cursor)
//!
//! Cursor `(buffer, offset, end, local, global)`. Semua read di-bounds-check
//! terhadap `end` (content end), bukan panjang fisik buffer, sehingga
//! sub-region dari buffer besar bisa di-decode dengan aman.
//!
//! Dua pola akses:
//! - Strict `read_*`: tipe salah = [`JbError::TypeMismatch`], cursor maju.
//! - Soft `*_or`: tipe salah = nilai default caller, cursor tidak bergerak.

use std::sync::Arc;

use super::array::JbArray;
use super::codepoint;
use super::map::JbMap;
use super::text::JbText;
use super::types::*;
use super::value::JbValue;
use crate::core::JbDict;
use crate::error::{JbError, Result};

/// Batas nesting container untuk [`JbReader::read_value`]
pub const MAX_VALUE_DEPTH: usize = 512;

/// Cursor over an immutable JBON buffer.
///
/// Murah untuk di-clone (dictionary di-share via `Arc`) dan bisa di-rebind
/// ke buffer lain lewat [`JbReader::bind`].
#[derive(Debug, Clone)]
pub struct JbReader<'a> {
    buf: &'a [u8],
    offset: usize,
    end: usize,
    local: Option<Arc<JbDict>>,
    global: Option<Arc<JbDict>>,
    global_id: Option<Arc<str>>,
}

impl<'a> JbReader<'a> {
    /// Reader atas seluruh `buf`
    #[inline(always)]
    pub fn new(buf: &'a [u8]) -> Self {
        Self {
            buf,
            offset: 0,
            end: buf.len(),
            local: None,
            global: None,
            global_id: None,
        }
    }

    /// Reader atas `buf[start..end]`
    pub fn with_range(buf: &'a [u8], start: usize, end: usize) -> Result<Self> {
        let mut reader = Self::new(buf);
        reader.bind(buf, start, end)?;
        Ok(reader)
    }

    /// Rebind cursor ke buffer lain (reuse instance, dictionary tetap).
    pub fn bind(&mut self, buf: &'a [u8], start: usize, end: usize) -> Result<()> {
        if start > end || end > buf.len() {
            return Err(JbError::UnexpectedEof {
                offset: start,
                needed: end.saturating_sub(start),
                end: buf.len(),
            });
        }
        self.buf = buf;
        self.offset = start;
        self.end = end;
        Ok(())
    }

    pub fn with_local(mut self, dict: Option<Arc<JbDict>>) -> Self {
        self.local = dict;
        self
    }

    pub fn with_global(mut self, dict: Option<Arc<JbDict>>) -> Self {
        self.global_id = dict.as_ref().and_then(|d| d.id().map(Arc::from));
        self.global = dict;
        self
    }

    /// Bind global dictionary; `id` dipakai untuk pesan error jika `dict` kosong.
    pub fn set_global(&mut self, id: Option<&str>, dict: Option<Arc<JbDict>>) {
        self.global_id = id.map(Arc::from);
        self.global = dict;
    }

    pub fn set_local(&mut self, dict: Option<Arc<JbDict>>) {
        self.local = dict;
    }

    pub fn local_dictionary(&self) -> Option<&Arc<JbDict>> {
        self.local.as_ref()
    }

    pub fn global_dictionary(&self) -> Option<&Arc<JbDict>> {
        self.global.as_ref()
    }

    #[inline(always)]
    pub fn buffer(&self) -> &'a [u8] {
        self.buf
    }

    #[inline(always)]
    pub fn offset(&self) -> usize {
        self.offset
    }

    #[inline(always)]
    pub fn end(&self) -> usize {
        self.end
    }

    /// Pindah cursor; `offset == end` valid (posisi EOF).
    pub fn set_offset(&mut self, offset: usize) -> Result<()> {
        if offset > self.end {
            return Err(JbError::UnexpectedEof {
                offset,
                needed: 0,
                end: self.end,
            });
        }
        self.offset = offset;
        Ok(())
    }

    #[inline(always)]
    pub fn is_eof(&self) -> bool {
        self.offset >= self.end
    }

    /// Reader baru atas `start..end` dengan dictionary yang sama.
    pub(crate) fn sub_reader(&self, start: usize, end: usize) -> Result<Self> {
        if start > end || end > self.end {
            return Err(JbError::UnexpectedEof {
                offset: start,
                needed: end.saturating_sub(start),
                end: self.end,
            });
        }
        let mut reader = self.clone();
        reader.offset = start;
        reader.end = end;
        Ok(reader)
    }

    // ---------------------------------------------------------------------
    // Raw access
    // ---------------------------------------------------------------------

    #[inline(always)]
    fn check(&self, pos: usize, needed: usize) -> Result<()> {
        if pos.checked_add(needed).map_or(true, |e| e > self.end) {
            return Err(JbError::UnexpectedEof {
                offset: pos,
                needed,
                end: self.end,
            });
        }
        Ok(())
    }

    #[inline(always)]
    fn bytes<const N: usize>(&self, pos: usize) -> Result<[u8; N]> {
        self.check(pos, N)?;
        let mut out = [0u8; N];
        out.copy_from_slice(&self.buf[pos..pos + N]);
        Ok(out)
    }

    #[inline(always)]
    pub fn get_u8(&self, pos: usize) -> Result<u8> {
        self.check(pos, 1)?;
        Ok(self.buf[pos])
    }

    pub fn get_u16(&self, pos: usize, endian: Endian) -> Result<u16> {
        let b = self.bytes::<2>(pos)?;
        Ok(match endian {
            Endian::Big => u16::from_be_bytes(b),
            Endian::Little => u16::from_le_bytes(b),
        })
    }

    pub fn get_u32(&self, pos: usize, endian: Endian) -> Result<u32> {
        let b = self.bytes::<4>(pos)?;
        Ok(match endian {
            Endian::Big => u32::from_be_bytes(b),
            Endian::Little => u32::from_le_bytes(b),
        })
    }

    pub fn get_i32(&self, pos: usize, endian: Endian) -> Result<i32> {
        Ok(self.get_u32(pos, endian)? as i32)
    }

    pub fn get_i64(&self, pos: usize, endian: Endian) -> Result<i64> {
        let b = self.bytes::<8>(pos)?;
        Ok(match endian {
            Endian::Big => i64::from_be_bytes(b),
            Endian::Little => i64::from_le_bytes(b),
        })
    }

    pub fn get_f32(&self, pos: usize, endian: Endian) -> Result<f32> {
        Ok(f32::from_bits(self.get_u32(pos, endian)?))
    }

    pub fn get_f64(&self, pos: usize, endian: Endian) -> Result<f64> {
        Ok(f64::from_bits(self.get_i64(pos, endian)? as u64))
    }

    // ---------------------------------------------------------------------
    // Type & size
    // ---------------------------------------------------------------------

    #[inline(always)]
    pub(crate) fn type_at(&self, pos: usize) -> Result<JbType> {
        let lead = self.get_u8(pos)?;
        JbType::from_lead_in(lead).ok_or(JbError::InvalidLeadIn { offset: pos, byte: lead })
    }

    /// Tipe unit pada offset cursor, O(1).
    #[inline(always)]
    pub fn unit_type(&self) -> Result<JbType> {
        self.type_at(self.offset)
    }

    /// Total byte length unit pada offset cursor.
    #[inline(always)]
    pub fn size(&self) -> Result<usize> {
        self.size_at(self.offset)
    }

    /// Header length dan content length untuk string/container/structure.
    pub(crate) fn header_at(&self, pos: usize) -> Result<(usize, usize)> {
        let lead = self.get_u8(pos)?;
        let unit_type = self.type_at(pos)?;
        let (header, content) = match unit_type {
            JbType::String => match lead & 0x0F {
                n if n as usize <= STRING_INLINE_MAX => (1, n as usize),
                STRING_SIZE_U8 => (2, self.get_u8(pos + 1)? as usize + STRING_SIZE_U8 as usize),
                STRING_SIZE_U16 => (3, self.get_u16(pos + 1, Endian::Big)? as usize),
                _ => (5, self.get_u32(pos + 1, Endian::Big)? as usize),
            },
            JbType::Map | JbType::Array | JbType::Text => match lead & 0b11 {
                0 => (1, 0),
                1 => (2, self.get_u8(pos + 1)? as usize),
                2 => (3, self.get_u16(pos + 1, Endian::Big)? as usize),
                _ => (5, self.get_u32(pos + 1, Endian::Big)? as usize),
            },
            t if t.is_structure() => {
                let (value, int_size) = self
                    .int_at(pos + 1)?
                    .ok_or_else(|| JbError::malformed(pos + 1, "structure size is not an integer"))?;
                let content = usize::try_from(value)
                    .map_err(|_| JbError::malformed(pos + 1, format!("negative structure size {value}")))?;
                (1 + int_size, content)
            }
            other => {
                return Err(JbError::TypeMismatch {
                    offset: pos,
                    expected: "string, container or structure",
                    found: other.name(),
                })
            }
        };
        self.check(pos, header + content)?;
        Ok((header, content))
    }

    /// Ukuran unit pada `pos`, tanpa scan konten.
    pub(crate) fn size_at(&self, pos: usize) -> Result<usize> {
        let lead = self.get_u8(pos)?;
        let size = match self.type_at(pos)? {
            JbType::Null
            | JbType::Undefined
            | JbType::Bool
            | JbType::Uint4
            | JbType::Sint4
            | JbType::Float4 => 1,
            JbType::Int8 => 2,
            JbType::Int16 => 3,
            JbType::Int32 | JbType::Float32 => 5,
            JbType::Timestamp => 7,
            JbType::Int64 | JbType::Float64 => 9,
            JbType::Ref => {
                if lead & 0xF0 == TYPE_REF {
                    match lead & 0b11 {
                        0 => 1,
                        1 => 2,
                        2 => 3,
                        _ => 5,
                    }
                } else {
                    1
                }
            }
            _ => {
                let (header, content) = self.header_at(pos)?;
                header + content
            }
        };
        self.check(pos, size)?;
        Ok(size)
    }

    /// Lompati unit saat ini. Return `true` jika masih ada unit berikutnya.
    pub fn next_unit(&mut self) -> Result<bool> {
        if self.is_eof() {
            return Ok(false);
        }
        self.offset += self.size()?;
        Ok(!self.is_eof())
    }

    /// Range `(body_start, body_end)` dari structure unit pada cursor.
    pub fn structure_body(&self) -> Result<(usize, usize)> {
        let unit_type = self.unit_type()?;
        if !unit_type.is_structure() {
            return Err(self.mismatch("structure", unit_type));
        }
        let (header, content) = self.header_at(self.offset)?;
        let start = self.offset + header;
        Ok((start, start + content))
    }

    fn mismatch(&self, expected: &'static str, found: JbType) -> JbError {
        JbError::TypeMismatch {
            offset: self.offset,
            expected,
            found: found.name(),
        }
    }

    // ---------------------------------------------------------------------
    // Scalar decoding (tanpa menggerakkan cursor)
    // ---------------------------------------------------------------------

    /// Integer pada `pos` beserta ukurannya, `None` jika bukan integer.
    pub(crate) fn int_at(&self, pos: usize) -> Result<Option<(i64, usize)>> {
        let lead = self.get_u8(pos)?;
        Ok(Some(match self.type_at(pos)? {
            JbType::Uint4 => ((lead & 0x0F) as i64, 1),
            JbType::Sint4 => ((lead & 0x0F) as i64 - 16, 1),
            JbType::Int8 => (self.get_u8(pos + 1)? as i8 as i64, 2),
            JbType::Int16 => (self.get_u16(pos + 1, Endian::Big)? as i16 as i64, 3),
            JbType::Int32 => (self.get_i32(pos + 1, Endian::Big)? as i64, 5),
            JbType::Int64 => (self.get_i64(pos + 1, Endian::Big)?, 9),
            _ => return Ok(None),
        }))
    }

    fn float_at(&self, pos: usize) -> Result<Option<f64>> {
        let lead = self.get_u8(pos)?;
        Ok(match self.type_at(pos)? {
            JbType::Float4 => Some(TINY_FLOATS[(lead & 0x0F) as usize] as f64),
            JbType::Float32 => Some(self.get_f32(pos + 1, Endian::Big)? as f64),
            JbType::Float64 => Some(self.get_f64(pos + 1, Endian::Big)?),
            _ => None,
        })
    }

    fn bool_at(&self, pos: usize) -> Result<Option<bool>> {
        Ok(match self.get_u8(pos)? {
            TYPE_BOOL_TRUE => Some(true),
            TYPE_BOOL_FALSE => Some(false),
            _ => None,
        })
    }

    /// Reference pada `pos`: `Some(Some((index, global)))`, `Some(None)` untuk
    /// null reference, `None` jika bukan reference.
    pub(crate) fn ref_at(&self, pos: usize) -> Result<Option<Option<(usize, bool)>>> {
        let lead = self.get_u8(pos)?;
        Ok(match lead & 0xF0 {
            TYPE_REF_LOCAL4 => Some(Some(((lead & 0x0F) as usize, false))),
            TYPE_REF_GLOBAL4 => Some(Some(((lead & 0x0F) as usize, true))),
            TYPE_REF => {
                let global = lead & REF_GLOBAL_BIT != 0;
                let biased = match lead & 0b11 {
                    0 => return Ok(Some(None)),
                    1 => self.get_u8(pos + 1)? as usize,
                    2 => self.get_u16(pos + 1, Endian::Big)? as usize,
                    _ => self.get_u32(pos + 1, Endian::Big)? as usize,
                };
                Some(Some((biased + TINY_REF_LIMIT, global)))
            }
            _ => None,
        })
    }

    /// Resolve `index` lewat local atau global dictionary.
    pub(crate) fn resolve(&self, pos: usize, index: usize, global: bool) -> Result<Arc<str>> {
        let dict = if global { &self.global } else { &self.local };
        let dict = dict.as_ref().ok_or_else(|| JbError::DictionaryNotBound {
            offset: pos,
            global,
            id: if global {
                self.global_id.as_deref().map(str::to_string)
            } else {
                None
            },
        })?;
        dict.get(index).cloned().ok_or(JbError::DictionaryMiss {
            offset: pos,
            index,
            global,
        })
    }

    fn string_at(&self, pos: usize) -> Result<String> {
        let (header, content) = self.header_at(pos)?;
        let mut out = String::with_capacity(content);
        let mut p = pos + header;
        let end = p + content;
        while p < end {
            let (c, len) = codepoint::decode(self.buf, p, end)?;
            out.push(c);
            p += len;
        }
        Ok(out)
    }

    // ---------------------------------------------------------------------
    // Type queries
    // ---------------------------------------------------------------------

    #[inline(always)]
    fn is_type(&self, f: impl FnOnce(JbType) -> bool) -> bool {
        self.unit_type().map_or(false, f)
    }

    pub fn is_null(&self) -> bool {
        self.is_type(|t| t == JbType::Null)
    }

    pub fn is_undefined(&self) -> bool {
        self.is_type(|t| t == JbType::Undefined)
    }

    pub fn is_bool(&self) -> bool {
        self.is_type(|t| t == JbType::Bool)
    }

    pub fn is_int(&self) -> bool {
        self.is_type(JbType::is_int)
    }

    pub fn is_float(&self) -> bool {
        self.is_type(JbType::is_float)
    }

    pub fn is_number(&self) -> bool {
        self.is_type(|t| t.is_int() || t.is_float())
    }

    pub fn is_timestamp(&self) -> bool {
        self.is_type(|t| t == JbType::Timestamp)
    }

    pub fn is_string(&self) -> bool {
        self.is_type(|t| t == JbType::String)
    }

    pub fn is_ref(&self) -> bool {
        self.is_type(|t| t == JbType::Ref)
    }

    pub fn is_map(&self) -> bool {
        self.is_type(|t| t == JbType::Map)
    }

    pub fn is_array(&self) -> bool {
        self.is_type(|t| t == JbType::Array)
    }

    pub fn is_text(&self) -> bool {
        self.is_type(|t| t == JbType::Text)
    }

    pub fn is_feature(&self) -> bool {
        self.is_type(|t| t == JbType::Feature)
    }

    pub fn is_dictionary(&self) -> bool {
        self.is_type(|t| matches!(t, JbType::GlobalDictionary | JbType::LocalDictionary))
    }

    pub fn is_xyz(&self) -> bool {
        self.is_type(|t| t == JbType::Xyz)
    }

    // ---------------------------------------------------------------------
    // Strict readers (cursor maju)
    // ---------------------------------------------------------------------

    #[inline(always)]
    fn advance(&mut self) -> Result<()> {
        self.offset += self.size()?;
        Ok(())
    }

    pub fn read_null(&mut self) -> Result<()> {
        let t = self.unit_type()?;
        if t != JbType::Null {
            return Err(self.mismatch("null", t));
        }
        self.advance()
    }

    pub fn read_bool(&mut self) -> Result<bool> {
        match self.bool_at(self.offset)? {
            Some(v) => {
                self.advance()?;
                Ok(v)
            }
            None => Err(self.mismatch("bool", self.unit_type()?)),
        }
    }

    pub fn read_int32(&mut self) -> Result<i32> {
        let t = self.unit_type()?;
        match self.int_at(self.offset)? {
            Some((v, size)) if t != JbType::Int64 => {
                self.offset += size;
                Ok(v as i32)
            }
            _ => Err(self.mismatch("int32", t)),
        }
    }

    pub fn read_int64(&mut self) -> Result<i64> {
        match self.int_at(self.offset)? {
            Some((v, size)) => {
                self.offset += size;
                Ok(v)
            }
            None => Err(self.mismatch("int64", self.unit_type()?)),
        }
    }

    pub fn read_float32(&mut self) -> Result<f32> {
        let t = self.unit_type()?;
        if t == JbType::Float64 {
            return Err(self.mismatch("float32", t));
        }
        match self.float_at(self.offset)? {
            Some(v) => {
                self.advance()?;
                Ok(v as f32)
            }
            None => Err(self.mismatch("float32", t)),
        }
    }

    pub fn read_float64(&mut self) -> Result<f64> {
        match self.float_at(self.offset)? {
            Some(v) => {
                self.advance()?;
                Ok(v)
            }
            None => Err(self.mismatch("float64", self.unit_type()?)),
        }
    }

    /// Timestamp 48-bit (epoch milliseconds)
    pub fn read_timestamp(&mut self) -> Result<u64> {
        let t = self.unit_type()?;
        if t != JbType::Timestamp {
            return Err(self.mismatch("timestamp", t));
        }
        let high = self.get_u16(self.offset + 1, Endian::Big)? as u64;
        let low = self.get_u32(self.offset + 3, Endian::Big)? as u64;
        self.offset += 7;
        Ok((high << 32) | low)
    }

    pub fn read_string(&mut self) -> Result<String> {
        let t = self.unit_type()?;
        if t != JbType::String {
            return Err(self.mismatch("string", t));
        }
        let value = self.string_at(self.offset)?;
        self.advance()?;
        Ok(value)
    }

    /// Raw reference: `None` untuk null reference.
    pub fn read_ref_index(&mut self) -> Result<Option<(usize, bool)>> {
        match self.ref_at(self.offset)? {
            Some(r) => {
                self.advance()?;
                Ok(r)
            }
            None => Err(self.mismatch("reference", self.unit_type()?)),
        }
    }

    /// Reference yang sudah di-resolve; `None` untuk null reference.
    pub fn read_ref(&mut self) -> Result<Option<Arc<str>>> {
        let pos = self.offset;
        match self.read_ref_index()? {
            Some((index, global)) => Ok(Some(self.resolve(pos, index, global)?)),
            None => Ok(None),
        }
    }

    /// Decode text container menjadi string utuh.
    pub fn read_text(&mut self) -> Result<String> {
        let mut text = self.read_text_reader()?;
        Ok(text.as_str()?.to_string())
    }

    pub fn read_text_reader(&mut self) -> Result<JbText<'a>> {
        let (start, end) = self.container_body("text", JbType::Text)?;
        let text = JbText::new(self.sub_reader(start, end)?);
        self.offset = end;
        Ok(text)
    }

    pub fn read_map(&mut self) -> Result<JbMap<'a>> {
        let (start, end) = self.container_body("map", JbType::Map)?;
        let map = JbMap::new(self.sub_reader(start, end)?);
        self.offset = end;
        Ok(map)
    }

    pub fn read_array(&mut self) -> Result<JbArray<'a>> {
        let (start, end) = self.container_body("array", JbType::Array)?;
        let array = JbArray::new(self.sub_reader(start, end)?);
        self.offset = end;
        Ok(array)
    }

    fn container_body(&self, expected: &'static str, t: JbType) -> Result<(usize, usize)> {
        let found = self.unit_type()?;
        if found != t {
            return Err(self.mismatch(expected, found));
        }
        let (header, content) = self.header_at(self.offset)?;
        let start = self.offset + header;
        Ok((start, start + content))
    }

    /// String dalam bentuk apa pun: string, text, atau reference.
    /// Null/undefined dan null reference = `None`.
    pub fn read_any_string(&mut self) -> Result<Option<String>> {
        match self.unit_type()? {
            JbType::Null | JbType::Undefined => {
                self.advance()?;
                Ok(None)
            }
            JbType::String => self.read_string().map(Some),
            JbType::Text => self.read_text().map(Some),
            JbType::Ref => Ok(self.read_ref()?.map(|s| s.to_string())),
            other => Err(self.mismatch("string", other)),
        }
    }

    /// Decode unit saat ini menjadi [`JbValue`] (rekursif).
    ///
    /// Nesting lebih dari [`MAX_VALUE_DEPTH`] container ditolak sebagai malformed.
    pub fn read_value(&mut self) -> Result<JbValue> {
        self.read_value_depth(0)
    }

    fn read_value_depth(&mut self, depth: usize) -> Result<JbValue> {
        let value = match self.unit_type()? {
            JbType::Null => {
                self.advance()?;
                JbValue::Null
            }
            JbType::Undefined => {
                self.advance()?;
                JbValue::Undefined
            }
            JbType::Bool => JbValue::Bool(self.read_bool()?),
            t if t.is_int() => JbValue::Int(self.read_int64()?),
            t if t.is_float() => JbValue::Float(self.read_float64()?),
            JbType::Timestamp => JbValue::Timestamp(self.read_timestamp()?),
            JbType::String => JbValue::String(self.read_string()?),
            JbType::Text => JbValue::String(self.read_text()?),
            JbType::Ref => match self.read_ref()? {
                Some(s) => JbValue::String(s.to_string()),
                None => JbValue::Null,
            },
            JbType::Map | JbType::Array if depth >= MAX_VALUE_DEPTH => {
                return Err(JbError::malformed(self.offset, "nesting too deep"));
            }
            JbType::Map => {
                let mut map = self.read_map()?;
                let mut entries = Vec::new();
                let mut ok = map.first();
                while ok {
                    let key = map.key()?.to_string();
                    let value = map.value()?.read_value_depth(depth + 1)?;
                    entries.push((key, value));
                    ok = map.next()?;
                }
                JbValue::Map(entries)
            }
            JbType::Array => {
                let mut array = self.read_array()?;
                let mut values = Vec::new();
                let mut ok = array.first();
                while ok {
                    values.push(array.value()?.read_value_depth(depth + 1)?);
                    ok = array.next()?;
                }
                JbValue::Array(values)
            }
            other => return Err(self.mismatch("value", other)),
        };
        Ok(value)
    }

    // ---------------------------------------------------------------------
    // Soft readers (cursor tetap, tipe salah = default)
    // ---------------------------------------------------------------------

    pub fn bool_or(&self, alt: bool) -> Result<bool> {
        Ok(self.bool_at(self.offset)?.unwrap_or(alt))
    }

    pub fn int32_or(&self, alt: i32) -> Result<i32> {
        Ok(match self.int_at(self.offset)? {
            Some((v, _)) => i32::try_from(v).unwrap_or(alt),
            None => alt,
        })
    }

    pub fn int64_or(&self, alt: i64) -> Result<i64> {
        Ok(self.int_at(self.offset)?.map_or(alt, |(v, _)| v))
    }

    /// Float atau integer, dikonversi ke f64.
    pub fn float64_or(&self, alt: f64) -> Result<f64> {
        if let Some(v) = self.float_at(self.offset)? {
            return Ok(v);
        }
        Ok(self.int_at(self.offset)?.map_or(alt, |(v, _)| v as f64))
    }

    pub fn string_or(&self, alt: &str) -> Result<String> {
        match self.unit_type()? {
            JbType::String => self.string_at(self.offset),
            JbType::Text => {
                let mut reader = self.clone();
                reader.read_text()
            }
            JbType::Ref => match self.ref_at(self.offset)? {
                Some(Some((index, global))) => {
                    Ok(self.resolve(self.offset, index, global)?.to_string())
                }
                _ => Ok(alt.to_string()),
            },
            _ => Ok(alt.to_string()),
        }
    }
}
