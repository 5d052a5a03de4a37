//! JBON Builder (encoder)
//!
//! Forward-only cursor di atas satu buffer yang tumbuh. Prinsip:
//! - Header berukuran variabel: reserve worst case (5 byte), tulis konten,
//!   lalu shrink header ke ukuran minimal dan geser konten ke kiri.
//! - Konten child selalu sudah di posisi final saat parent ditutup, dan
//!   tidak ada offset absolut, jadi geser konten aman.
//! - Feature dirakit terakhir: konten ditulis duluan, header di-prepend
//!   memakai buffer kedua.

use std::sync::Arc;

use tracing::debug;

use super::codepoint;
use super::text::text_ref_header;
use super::types::*;
use super::value::JbValue;
use crate::config::BuilderConfig;
use crate::core::JbDict;
use crate::error::{JbError, Result};

/// Encoder untuk satu feature: satu buffer + satu local dictionary.
#[derive(Debug, Clone)]
pub struct JbBuilder {
    buffer: Box<[u8]>,
    end: usize,
    config: BuilderConfig,
    local: JbDict,
    global: Option<Arc<JbDict>>,
    /// Container yang masih terbuka: (start, kind), paling dalam di akhir
    open: Vec<(usize, u8)>,
}

impl JbBuilder {
    /// Builder dengan konfigurasi default dan optional global dictionary
    pub fn new(global: Option<Arc<JbDict>>) -> Self {
        Self::with_config(BuilderConfig::default(), global)
    }

    pub fn with_config(config: BuilderConfig, global: Option<Arc<JbDict>>) -> Self {
        Self {
            buffer: vec![0u8; config.initial_capacity.max(16)].into_boxed_slice(),
            end: 0,
            config,
            local: JbDict::new(),
            global,
            open: Vec::new(),
        }
    }

    /// Reset builder untuk reuse: buffer dan local dictionary dibuang.
    #[inline(always)]
    pub fn reset(&mut self) {
        self.end = 0;
        self.local.clear();
        self.open.clear();
    }

    /// Ganti global dictionary (sebaiknya langsung setelah `reset`).
    pub fn set_global(&mut self, global: Option<Arc<JbDict>>) {
        self.global = global;
    }

    #[inline(always)]
    pub fn end(&self) -> usize {
        self.end
    }

    #[inline(always)]
    pub fn as_bytes(&self) -> &[u8] {
        &self.buffer[..self.end]
    }

    pub fn into_bytes(self) -> Vec<u8> {
        let mut bytes = self.buffer.into_vec();
        bytes.truncate(self.end);
        bytes
    }

    pub fn capacity(&self) -> usize {
        self.buffer.len()
    }

    pub fn config(&self) -> &BuilderConfig {
        &self.config
    }

    pub fn local_dictionary(&self) -> &JbDict {
        &self.local
    }

    pub fn global_dictionary(&self) -> Option<&Arc<JbDict>> {
        self.global.as_ref()
    }

    // ---------------------------------------------------------------------
    // Raw buffer
    // ---------------------------------------------------------------------

    #[inline(always)]
    fn ensure(&mut self, additional: usize) {
        let needed = self.end + additional;
        if needed <= self.buffer.len() {
            return;
        }
        let mut capacity = self.buffer.len().max(16);
        while capacity < needed {
            capacity *= 2;
        }
        let mut grown = vec![0u8; capacity].into_boxed_slice();
        grown[..self.end].copy_from_slice(&self.buffer[..self.end]);
        self.buffer = grown;
    }

    #[inline(always)]
    pub(crate) fn put_u8(&mut self, value: u8) {
        self.ensure(1);
        self.buffer[self.end] = value;
        self.end += 1;
    }

    #[inline(always)]
    pub(crate) fn put_bytes(&mut self, bytes: &[u8]) {
        self.ensure(bytes.len());
        self.buffer[self.end..self.end + bytes.len()].copy_from_slice(bytes);
        self.end += bytes.len();
    }

    #[inline(always)]
    fn put_char(&mut self, c: char) {
        self.ensure(codepoint::encoded_len(c as u32));
        self.end += codepoint::encode(c as u32, &mut self.buffer[self.end..]);
    }

    /// Lead-in + 4 byte placeholder untuk header yang belum diketahui ukurannya.
    fn reserve_header(&mut self, lead: u8) -> usize {
        let start = self.end;
        self.put_u8(lead);
        self.put_bytes(&[0; MAX_HEADER_SIZE - 1]);
        start
    }

    /// Tulis header final di `start`, geser konten jika header lebih kecil
    /// dari `reserved`.
    fn close_header(&mut self, start: usize, reserved: usize, header: &[u8]) {
        let content_start = start + reserved;
        let shift = reserved - header.len();
        if shift > 0 {
            self.buffer
                .copy_within(content_start..self.end, start + header.len());
            self.end -= shift;
        }
        self.buffer[start..start + header.len()].copy_from_slice(header);
    }

    /// Structure unit yang body-nya ditulis langsung ke buffer: lead-in +
    /// placeholder untuk size integer terbesar (int64).
    pub(crate) fn start_structure(&mut self, lead: u8) -> usize {
        let start = self.end;
        self.put_u8(lead);
        self.put_bytes(&[0; STRUCTURE_RESERVE - 1]);
        start
    }

    /// Buang semua yang ditulis sejak `start`.
    pub(crate) fn rewind(&mut self, start: usize) {
        self.end = start.min(self.end);
        self.open.retain(|&(open, _)| open < start);
    }

    pub(crate) fn end_structure(&mut self, start: usize) {
        let body_len = self.end - start - STRUCTURE_RESERVE;
        let mut header = [0u8; STRUCTURE_RESERVE];
        header[0] = self.buffer[start];
        let mut size = [0u8; 9];
        let n = encode_int(body_len as i64, &mut size);
        header[1..1 + n].copy_from_slice(&size[..n]);
        self.close_header(start, STRUCTURE_RESERVE, &header[..1 + n]);
    }

    // ---------------------------------------------------------------------
    // Scalars
    // ---------------------------------------------------------------------

    pub fn write_null(&mut self) -> usize {
        let start = self.end;
        self.put_u8(TYPE_NULL);
        start
    }

    pub fn write_undefined(&mut self) -> usize {
        let start = self.end;
        self.put_u8(TYPE_UNDEFINED);
        start
    }

    pub fn write_bool(&mut self, value: bool) -> usize {
        let start = self.end;
        self.put_u8(if value { TYPE_BOOL_TRUE } else { TYPE_BOOL_FALSE });
        start
    }

    /// Integer dengan representasi tersempit: [-16,15] = 1 byte,
    /// [-128,127] = 2, [-32768,32767] = 3, sisanya 5.
    pub fn write_int32(&mut self, value: i32) -> usize {
        self.write_int64(value as i64)
    }

    pub fn write_int64(&mut self, value: i64) -> usize {
        let start = self.end;
        let mut bytes = [0u8; 9];
        let n = encode_int(value, &mut bytes);
        self.put_bytes(&bytes[..n]);
        start
    }

    pub fn write_float32(&mut self, value: f32) -> usize {
        let start = self.end;
        if let Some(index) = tiny_float_index(value as f64) {
            self.put_u8(TYPE_FLOAT4 | index);
        } else {
            self.put_u8(TYPE_FLOAT32);
            self.put_bytes(&value.to_bits().to_be_bytes());
        }
        start
    }

    /// Float64; turun ke float4/float32 hanya jika lossless (bit-exact).
    pub fn write_float64(&mut self, value: f64) -> usize {
        if tiny_float_index(value).is_some() {
            return self.write_float32(value as f32);
        }
        let narrow = value as f32;
        if (narrow as f64).to_bits() == value.to_bits() {
            return self.write_float32(narrow);
        }
        let start = self.end;
        self.put_u8(TYPE_FLOAT64);
        self.put_bytes(&value.to_bits().to_be_bytes());
        start
    }

    /// Timestamp epoch milliseconds, maksimal 48 bit.
    pub fn write_timestamp(&mut self, millis: u64) -> Result<usize> {
        if millis > TIMESTAMP_MAX {
            return Err(JbError::InvalidInput(format!(
                "timestamp {millis} exceeds 48 bits"
            )));
        }
        let start = self.end;
        self.put_u8(TYPE_TIMESTAMP);
        self.put_bytes(&((millis >> 32) as u16).to_be_bytes());
        self.put_bytes(&(millis as u32).to_be_bytes());
        Ok(start)
    }

    // ---------------------------------------------------------------------
    // References & strings
    // ---------------------------------------------------------------------

    /// Dictionary reference; `None` = null reference.
    pub fn write_ref(&mut self, index: Option<usize>, global: bool) -> Result<usize> {
        let start = self.end;
        let g = if global { REF_GLOBAL_BIT } else { 0 };
        match index {
            None => self.put_u8(TYPE_REF | g),
            Some(i) if i < TINY_REF_LIMIT => {
                let tiny = if global { TYPE_REF_GLOBAL4 } else { TYPE_REF_LOCAL4 };
                self.put_u8(tiny | i as u8);
            }
            Some(i) => {
                let biased = i - TINY_REF_LIMIT;
                if biased <= u8::MAX as usize {
                    self.put_u8(TYPE_REF | g | 1);
                    self.put_u8(biased as u8);
                } else if biased <= u16::MAX as usize {
                    self.put_u8(TYPE_REF | g | 2);
                    self.put_bytes(&(biased as u16).to_be_bytes());
                } else if biased <= u32::MAX as usize {
                    self.put_u8(TYPE_REF | g | 3);
                    self.put_bytes(&(biased as u32).to_be_bytes());
                } else {
                    return Err(JbError::InvalidInput(format!(
                        "dictionary index {i} too large"
                    )));
                }
            }
        }
        Ok(start)
    }

    pub fn write_string(&mut self, value: &str) -> Result<usize> {
        self.write_string_chars(value.chars())
    }

    /// String dari UTF-16 code units; surrogate tanpa pasangan = error.
    pub fn write_string_utf16(&mut self, units: &[u16]) -> Result<usize> {
        let chars = codepoint::decode_utf16(units)?;
        self.write_string_chars(chars.into_iter())
    }

    fn write_string_chars(&mut self, chars: impl Iterator<Item = char>) -> Result<usize> {
        let start = self.reserve_header(TYPE_STRING | STRING_SIZE_U32);
        for c in chars {
            self.put_char(c);
        }
        let len = self.end - start - MAX_HEADER_SIZE;
        let header = match string_header(len) {
            Ok(header) => header,
            Err(e) => {
                self.end = start;
                return Err(e);
            }
        };
        self.close_header(start, MAX_HEADER_SIZE, header.as_slice());
        Ok(start)
    }

    /// Key map: selalu reference (global dulu, lalu local).
    pub fn write_key(&mut self, key: &str) -> Result<usize> {
        if let Some(index) = self.global.as_ref().and_then(|g| g.index_of(key)) {
            return self.write_ref(Some(index), true);
        }
        let index = self.local.add(key);
        self.write_ref(Some(index), false)
    }

    /// Text dengan dictionary compression.
    pub fn write_text(&mut self, value: &str) -> Result<usize> {
        let chars: Vec<char> = value.chars().collect();
        self.write_text_chars(&chars)
    }

    pub fn write_text_utf16(&mut self, units: &[u16]) -> Result<usize> {
        let chars = codepoint::decode_utf16(units)?;
        self.write_text_chars(&chars)
    }

    fn write_text_chars(&mut self, chars: &[char]) -> Result<usize> {
        let start = self.reserve_header(container_placeholder(CONTAINER_TEXT));
        if let Err(e) = self.write_text_body(chars) {
            self.end = start;
            return Err(e);
        }
        self.end_container(start, CONTAINER_TEXT)?;
        Ok(start)
    }

    fn write_text_body(&mut self, chars: &[char]) -> Result<()> {
        let mut i = 0;
        while i < chars.len() {
            if self.config.compress_text && codepoint::is_word_char(chars[i]) {
                let mut run_end = i + 1;
                while run_end < chars.len() && codepoint::is_word_char(chars[run_end]) {
                    run_end += 1;
                }
                i = self.write_word(chars, i, run_end)?;
            } else {
                self.put_char(chars[i]);
                i += 1;
            }
        }
        Ok(())
    }

    /// Tulis satu run kata `chars[start..end]`; return index karakter berikutnya.
    ///
    /// Urutan: exact match global, lalu prefix global terpanjang yang
    /// berakhir di colon (sisa run ditulis raw), lalu local dictionary.
    fn write_word(&mut self, chars: &[char], start: usize, end: usize) -> Result<usize> {
        if end - start < self.config.word_len() {
            for &c in &chars[start..end] {
                self.put_char(c);
            }
            return Ok(end);
        }
        // Karakter kata selalu ASCII: index byte == index karakter
        let word: String = chars[start..end].iter().collect();
        if let Some(global) = self.global.clone() {
            if let Some(index) = global.index_of(&word) {
                return self.write_text_ref(index, true, chars, end);
            }
            if let Some((index, colon)) = colon_prefix(&global, &word, self.config.word_len()) {
                self.put_text_ref(index, true, None)?;
                for &c in &chars[start + colon + 1..end] {
                    self.put_char(c);
                }
                return Ok(end);
            }
        }
        let index = self.local.add(&word);
        self.write_text_ref(index, false, chars, end)
    }

    /// Reference + delimiter berikutnya (jika space/underscore/colon) sekaligus.
    fn write_text_ref(
        &mut self,
        index: usize,
        global: bool,
        chars: &[char],
        end: usize,
    ) -> Result<usize> {
        let append = chars
            .get(end)
            .copied()
            .filter(|c| matches!(c, ' ' | '_' | ':'));
        self.put_text_ref(index, global, append)?;
        Ok(end + usize::from(append.is_some()))
    }

    fn put_text_ref(&mut self, index: usize, global: bool, append: Option<char>) -> Result<()> {
        let (lead, width) = text_ref_header(index, global, append)?;
        self.put_u8(lead);
        match width {
            1 => self.put_u8(index as u8),
            2 => self.put_bytes(&(index as u16).to_be_bytes()),
            _ => self.put_bytes(&(index as u32).to_be_bytes()),
        }
        Ok(())
    }

    // ---------------------------------------------------------------------
    // Containers
    // ---------------------------------------------------------------------

    /// Buka map; return offset yang harus diberikan ke [`JbBuilder::end_map`].
    pub fn start_map(&mut self) -> usize {
        self.start_container(CONTAINER_MAP)
    }

    pub fn end_map(&mut self, start: usize) -> Result<()> {
        self.end_container(start, CONTAINER_MAP)
    }

    pub fn start_array(&mut self) -> usize {
        self.start_container(CONTAINER_ARRAY)
    }

    fn start_container(&mut self, kind: u8) -> usize {
        let start = self.reserve_header(container_placeholder(kind));
        self.open.push((start, kind));
        start
    }

    pub fn end_array(&mut self, start: usize) -> Result<()> {
        self.end_container(start, CONTAINER_ARRAY)
    }

    fn end_container(&mut self, start: usize, kind: u8) -> Result<()> {
        // Hanya container terdalam yang boleh ditutup
        if self.open.last() != Some(&(start, kind)) {
            return Err(JbError::Contract(format!(
                "no open container of kind {kind} at offset {start}"
            )));
        }
        self.open.pop();
        let len = self.end - start - MAX_HEADER_SIZE;
        let header = container_header(kind, len)?;
        self.close_header(start, MAX_HEADER_SIZE, header.as_slice());
        Ok(())
    }

    /// Tulis [`JbValue`] secara rekursif. String ditulis sebagai text jika
    /// compression aktif.
    pub fn write_value(&mut self, value: &JbValue) -> Result<usize> {
        Ok(match value {
            JbValue::Null => self.write_null(),
            JbValue::Undefined => self.write_undefined(),
            JbValue::Bool(v) => self.write_bool(*v),
            JbValue::Int(v) => self.write_int64(*v),
            JbValue::Float(v) => self.write_float64(*v),
            JbValue::Timestamp(v) => self.write_timestamp(*v)?,
            JbValue::String(s) if self.config.compress_text => self.write_text(s)?,
            JbValue::String(s) => self.write_string(s)?,
            JbValue::Array(values) => {
                let start = self.start_array();
                for v in values {
                    self.write_value(v)?;
                }
                self.end_array(start)?;
                start
            }
            JbValue::Map(entries) => {
                let start = self.start_map();
                for (k, v) in entries {
                    self.write_key(k)?;
                    self.write_value(v)?;
                }
                self.end_map(start)?;
                start
            }
        })
    }

    /// Structure unit: `[lead][size][body]`
    pub(crate) fn write_structure(&mut self, lead: u8, body: &[u8]) -> usize {
        let start = self.end;
        self.put_u8(lead);
        self.write_int64(body.len() as i64);
        self.put_bytes(body);
        start
    }

    fn scratch(&self) -> Self {
        Self::with_config(self.config, None)
    }

    // ---------------------------------------------------------------------
    // Feature & dictionary assembly
    // ---------------------------------------------------------------------

    /// Serialize local dictionary (urutan insert) sebagai global dictionary `id`.
    pub fn build_dictionary(&self, id: &str) -> Result<Vec<u8>> {
        let mut body = self.scratch();
        body.write_string(id)?;
        for entry in self.local.iter() {
            body.write_string(entry)?;
        }
        let mut out = Self::with_config(
            BuilderConfig {
                initial_capacity: body.end() + 16,
                ..self.config
            },
            None,
        );
        out.write_structure(TYPE_GLOBAL_DICTIONARY, body.as_bytes());
        debug!(dict_id = id, entries = self.local.len(), size = out.end(), "built dictionary");
        Ok(out.into_bytes())
    }

    /// Rakit feature: `[lead][size][global id][feature id][local dict][content]`.
    ///
    /// Konten adalah semua yang sudah ditulis ke builder (null jika kosong).
    ///
    /// Global dictionary tanpa id ditolak: reference ke dalamnya tidak
    /// bisa di-resolve oleh reader.
    pub fn build_feature(&self, id: Option<&str>) -> Result<Vec<u8>> {
        let mut header = self.scratch();
        match self.global.as_deref().map(JbDict::id) {
            Some(Some(global_id)) => {
                header.write_string(global_id)?;
            }
            Some(None) => {
                return Err(JbError::InvalidInput(
                    "global dictionary without id".to_string(),
                ));
            }
            None => {
                header.write_null();
            }
        }
        match id {
            Some(id) => {
                header.write_string(id)?;
            }
            None => {
                header.write_null();
            }
        }
        let mut dict = self.scratch();
        for entry in self.local.iter() {
            dict.write_string(entry)?;
        }
        header.write_structure(TYPE_LOCAL_DICTIONARY, dict.as_bytes());

        let content: &[u8] = if self.end == 0 {
            &[TYPE_NULL]
        } else {
            self.as_bytes()
        };
        let body_len = header.end() + content.len();
        let mut out = Self::with_config(
            BuilderConfig {
                initial_capacity: body_len + 16,
                ..self.config
            },
            None,
        );
        out.put_u8(TYPE_FEATURE);
        out.write_int64(body_len as i64);
        out.put_bytes(header.as_bytes());
        out.put_bytes(content);
        debug!(
            feature_id = id.unwrap_or("<none>"),
            local_entries = self.local.len(),
            size = out.end(),
            "built feature"
        );
        Ok(out.into_bytes())
    }
}

/// Lead-in + int64 size
const STRUCTURE_RESERVE: usize = 10;

/// Encode integer tersempit ke `out`, return jumlah byte.
fn encode_int(value: i64, out: &mut [u8; 9]) -> usize {
    match value {
        0..=15 => {
            out[0] = TYPE_UINT4 | value as u8;
            1
        }
        -16..=-1 => {
            out[0] = TYPE_SINT4 | (value + 16) as u8;
            1
        }
        -128..=127 => {
            out[0] = TYPE_INT8;
            out[1] = value as i8 as u8;
            2
        }
        -32_768..=32_767 => {
            out[0] = TYPE_INT16;
            out[1..3].copy_from_slice(&(value as i16).to_be_bytes());
            3
        }
        -2_147_483_648..=2_147_483_647 => {
            out[0] = TYPE_INT32;
            out[1..5].copy_from_slice(&(value as i32).to_be_bytes());
            5
        }
        _ => {
            out[0] = TYPE_INT64;
            out[1..9].copy_from_slice(&value.to_be_bytes());
            9
        }
    }
}

#[inline(always)]
fn container_placeholder(kind: u8) -> u8 {
    TYPE_CONTAINER | (kind << 2) | 0b11
}

/// Header bytes dengan panjang aktual
struct Header {
    bytes: [u8; MAX_HEADER_SIZE],
    len: usize,
}

impl Header {
    fn as_slice(&self) -> &[u8] {
        &self.bytes[..self.len]
    }
}

fn string_header(len: usize) -> Result<Header> {
    let mut bytes = [0u8; MAX_HEADER_SIZE];
    let header_len = string_header_size(len);
    match header_len {
        1 => bytes[0] = TYPE_STRING | len as u8,
        2 => {
            bytes[0] = TYPE_STRING | STRING_SIZE_U8;
            bytes[1] = (len - STRING_SIZE_U8 as usize) as u8;
        }
        3 => {
            bytes[0] = TYPE_STRING | STRING_SIZE_U16;
            bytes[1..3].copy_from_slice(&(len as u16).to_be_bytes());
        }
        _ => {
            let len = u32::try_from(len)
                .map_err(|_| JbError::InvalidInput(format!("string of {len} bytes too large")))?;
            bytes[0] = TYPE_STRING | STRING_SIZE_U32;
            bytes[1..5].copy_from_slice(&len.to_be_bytes());
        }
    }
    Ok(Header {
        bytes,
        len: header_len,
    })
}

fn container_header(kind: u8, len: usize) -> Result<Header> {
    let mut bytes = [0u8; MAX_HEADER_SIZE];
    let header_len = container_header_size(len);
    let lead = TYPE_CONTAINER | (kind << 2);
    match header_len {
        1 => bytes[0] = lead,
        2 => {
            bytes[0] = lead | 1;
            bytes[1] = len as u8;
        }
        3 => {
            bytes[0] = lead | 2;
            bytes[1..3].copy_from_slice(&(len as u16).to_be_bytes());
        }
        _ => {
            let len = u32::try_from(len)
                .map_err(|_| JbError::InvalidInput(format!("container of {len} bytes too large")))?;
            bytes[0] = lead | 3;
            bytes[1..5].copy_from_slice(&len.to_be_bytes());
        }
    }
    Ok(Header {
        bytes,
        len: header_len,
    })
}

/// Prefix terpanjang `word[..=colon]` yang ada di global dictionary.
/// Word penuh sudah dicoba sebelumnya, jadi colon terakhir dilewati.
fn colon_prefix(global: &JbDict, word: &str, min_len: usize) -> Option<(usize, usize)> {
    let bytes = word.as_bytes();
    (0..bytes.len().saturating_sub(1))
        .rev()
        .filter(|&p| bytes[p] == b':' && p + 1 >= min_len)
        .find_map(|p| global.index_of(&word[..=p]).map(|index| (index, p)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::JbReader;

    fn global_dict(entries: &[&str]) -> Arc<JbDict> {
        Arc::new(JbDict::from_entries(Some("global-1".to_string()), entries))
    }

    fn decode_text(bytes: &[u8], local: &JbDict, global: Option<Arc<JbDict>>) -> String {
        JbReader::new(bytes)
            .with_local(Some(Arc::new(local.clone())))
            .with_global(global)
            .read_text()
            .unwrap()
    }

    #[test]
    fn test_tiny_int() {
        let mut builder = JbBuilder::new(None);
        assert_eq!(builder.write_int32(5), 0);
        assert_eq!(builder.as_bytes(), &[0x85]);
    }

    #[test]
    fn test_buffer_grows() {
        let mut builder = JbBuilder::with_config(
            BuilderConfig {
                initial_capacity: 1,
                ..BuilderConfig::default()
            },
            None,
        );
        let long = "x".repeat(1000);
        builder.write_string(&long).unwrap();
        assert!(builder.capacity() >= 1005);
        assert_eq!(JbReader::new(builder.as_bytes()).read_string().unwrap(), long);
    }

    #[test]
    fn test_reset_discards_buffer_and_dictionary() {
        let mut builder = JbBuilder::new(None);
        builder.write_key("abc").unwrap();
        builder.reset();
        assert_eq!(builder.end(), 0);
        assert!(builder.local_dictionary().is_empty());
    }

    #[test]
    fn test_nested_containers_shrink_headers() {
        let mut builder = JbBuilder::new(None);
        let outer = builder.start_array();
        let inner = builder.start_map();
        builder.write_key("k").unwrap();
        builder.write_int32(1);
        builder.end_map(inner).unwrap();
        builder.end_array(outer).unwrap();
        // array(2+) [map(2+) [ref k][1]]
        assert_eq!(
            builder.as_bytes(),
            &[0xF5, 4, 0xF1, 2, TYPE_REF_LOCAL4, TYPE_UINT4 | 1]
        );
    }

    #[test]
    fn test_large_container_header() {
        let mut builder = JbBuilder::new(None);
        let start = builder.start_array();
        for i in 0..30_000 {
            builder.write_int32(i);
        }
        builder.end_array(start).unwrap();
        let bytes = builder.as_bytes();
        assert_eq!(bytes[0], 0xF4 | 3);
        let mut reader = JbReader::new(bytes);
        assert_eq!(reader.size().unwrap(), bytes.len());
        let mut array = reader.read_array().unwrap();
        assert_eq!(array.length().unwrap(), 30_000);
        assert_eq!(array.get(29_999).unwrap().unwrap().read_int32().unwrap(), 29_999);
    }

    #[test]
    fn test_end_container_contract() {
        let mut builder = JbBuilder::new(None);
        let start = builder.start_map();
        assert!(matches!(builder.end_array(start), Err(JbError::Contract(_))));
        assert!(matches!(builder.end_map(start + 1), Err(JbError::Contract(_))));
        builder.end_map(start).unwrap();
        assert!(matches!(builder.end_map(start), Err(JbError::Contract(_))));
    }

    #[test]
    fn test_end_container_twice_keeps_u32_header() {
        let mut builder = JbBuilder::new(None);
        let start = builder.start_map();
        let value = "v".repeat(70_000);
        builder.write_key("k").unwrap();
        builder.write_string(&value).unwrap();
        builder.end_map(start).unwrap();
        // header u32: lead-in sama dengan placeholder
        assert_eq!(builder.as_bytes()[0], container_placeholder(CONTAINER_MAP));
        let closed = builder.as_bytes().to_vec();

        assert!(matches!(builder.end_map(start), Err(JbError::Contract(_))));
        assert_eq!(builder.as_bytes(), &closed[..]);
    }

    #[test]
    fn test_inner_container_must_close_first() {
        let mut builder = JbBuilder::new(None);
        let outer = builder.start_array();
        let inner = builder.start_array();
        assert!(matches!(builder.end_array(outer), Err(JbError::Contract(_))));
        builder.end_array(inner).unwrap();
        builder.end_array(outer).unwrap();
        assert_eq!(builder.as_bytes(), &[0xF5, 1, 0xF4]);
    }

    #[test]
    fn test_rewind_drops_open_containers() {
        let mut builder = JbBuilder::new(None);
        let start = builder.start_map();
        builder.rewind(start);
        assert!(matches!(builder.end_map(start), Err(JbError::Contract(_))));
        assert_eq!(builder.end(), 0);
    }

    #[test]
    fn test_feature_rejects_global_without_id() {
        let global = Arc::new(JbDict::from_entries(None, &["properties"]));
        let mut builder = JbBuilder::new(Some(global));
        let start = builder.start_map();
        builder.write_key("properties").unwrap();
        builder.write_null();
        builder.end_map(start).unwrap();
        assert!(matches!(
            builder.build_feature(Some("f")),
            Err(JbError::InvalidInput(_))
        ));

        builder.set_global(Some(global_dict(&["properties"])));
        assert!(builder.build_feature(Some("f")).is_ok());
    }

    #[test]
    fn test_invalid_surrogate() {
        let mut builder = JbBuilder::new(None);
        let err = builder.write_string_utf16(&[0x41, 0xDC00]).unwrap_err();
        assert_eq!(err, JbError::InvalidSurrogate { position: 1 });
        assert_eq!(builder.end(), 0);
        assert!(builder.write_text_utf16(&[0xD800]).is_err());
        assert_eq!(builder.end(), 0);

        let units: Vec<u16> = "ok 😀".encode_utf16().collect();
        builder.write_string_utf16(&units).unwrap();
        assert_eq!(JbReader::new(builder.as_bytes()).read_string().unwrap(), "ok 😀");
    }

    #[test]
    fn test_timestamp_range() {
        let mut builder = JbBuilder::new(None);
        assert!(builder.write_timestamp(TIMESTAMP_MAX).is_ok());
        assert!(matches!(
            builder.write_timestamp(TIMESTAMP_MAX + 1),
            Err(JbError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_keys_prefer_global() {
        let global = global_dict(&["type", "properties"]);
        let mut builder = JbBuilder::new(Some(global));
        builder.write_key("properties").unwrap();
        builder.write_key("name").unwrap();
        builder.write_key("name").unwrap();
        assert_eq!(
            builder.as_bytes(),
            &[TYPE_REF_GLOBAL4 | 1, TYPE_REF_LOCAL4, TYPE_REF_LOCAL4]
        );
        assert_eq!(builder.local_dictionary().len(), 1);
    }

    #[test]
    fn test_text_local_compression() {
        let mut builder = JbBuilder::new(None);
        builder.write_text("hello world_hello ab").unwrap();
        let local = builder.local_dictionary().clone();
        assert_eq!(local.iter().collect::<Vec<_>>(), vec!["hello", "world"]);
        assert_eq!(decode_text(builder.as_bytes(), &local, None), "hello world_hello ab");

        // [text hdr] [ref0+space] [ref1+underscore] [ref0+space] a b
        let bytes = builder.as_bytes();
        assert_eq!(&bytes[2..], &[0xE4, 0, 0xE8, 1, 0xE4, 0, b'a', b'b']);
    }

    #[test]
    fn test_text_urn_prefix() {
        let global = global_dict(&["urn:here:mom:"]);
        let mut builder = JbBuilder::new(Some(Arc::clone(&global)));
        builder.write_text("urn:here:mom:Topology:123").unwrap();
        let bytes = builder.as_bytes().to_vec();

        let mut expected = vec![0xF9, 0, 0xF0, 0];
        expected.extend_from_slice(b"Topology:123");
        expected[1] = (expected.len() - 2) as u8;
        assert_eq!(bytes, expected);
        assert!(builder.local_dictionary().is_empty());
        assert_eq!(
            decode_text(&bytes, builder.local_dictionary(), Some(global)),
            "urn:here:mom:Topology:123"
        );
    }

    #[test]
    fn test_text_longest_prefix_wins() {
        let global = global_dict(&["urn:", "urn:here:"]);
        let mut builder = JbBuilder::new(Some(Arc::clone(&global)));
        builder.write_text("urn:here:abc").unwrap();
        let bytes = builder.as_bytes();
        assert_eq!(&bytes[2..4], &[0xF0, 1]);
        assert_eq!(&bytes[4..], b"abc");
    }

    #[test]
    fn test_text_exact_global_match() {
        let global = global_dict(&["Topology"]);
        let mut builder = JbBuilder::new(Some(Arc::clone(&global)));
        builder.write_text("Topology Topology").unwrap();
        assert_eq!(&builder.as_bytes()[2..], &[0xF4, 0, 0xF0, 0]);
        assert_eq!(
            decode_text(builder.as_bytes(), builder.local_dictionary(), Some(global)),
            "Topology Topology"
        );
    }

    #[test]
    fn test_short_runs_stay_raw() {
        let mut builder = JbBuilder::new(None);
        builder.write_text("ab cd e").unwrap();
        assert!(builder.local_dictionary().is_empty());
        assert_eq!(&builder.as_bytes()[2..], b"ab cd e");
    }

    #[test]
    fn test_word_at_end_of_string() {
        let mut builder = JbBuilder::new(None);
        builder.write_text("12 abc").unwrap();
        assert_eq!(builder.local_dictionary().index_of("abc"), Some(0));
        assert_eq!(&builder.as_bytes()[2..], &[b'1', b'2', b' ', 0xE0, 0]);
    }

    #[test]
    fn test_compression_disabled() {
        let mut builder = JbBuilder::with_config(
            BuilderConfig {
                compress_text: false,
                ..BuilderConfig::default()
            },
            None,
        );
        builder.write_text("hello world").unwrap();
        assert!(builder.local_dictionary().is_empty());
        assert_eq!(&builder.as_bytes()[2..], b"hello world");
    }

    #[test]
    fn test_write_returns_offsets() {
        let mut builder = JbBuilder::new(None);
        assert_eq!(builder.write_null(), 0);
        assert_eq!(builder.write_int32(1000), 1);
        assert_eq!(builder.write_string("abc").unwrap(), 4);
        assert_eq!(builder.write_bool(true), 8);
    }
}
