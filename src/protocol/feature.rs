//! Feature: unit top-level JBON
//!
//! ```text
//! [0x0D][size][global dict id | null][feature id | null][local dict][content]
//! ```
//!
//! Header di-parse dengan urutan tetap. Field opsional yang null cukup
//! dilompati lewat `next_unit()`, tidak ada kasus khusus.

use std::sync::Arc;

use tracing::warn;

use super::map::JbMap;
use super::reader::JbReader;
use super::types::JbType;
use super::value::JbValue;
use crate::core::{DictionaryStore, JbDict};
use crate::error::{JbError, Result};

/// Parsed feature header plus reader atas konten.
#[derive(Debug, Clone)]
pub struct JbFeature<'a> {
    content: JbReader<'a>,
    start: usize,
    size: usize,
    global_id: Option<String>,
    id: Option<String>,
    local: Arc<JbDict>,
}

impl<'a> JbFeature<'a> {
    /// Parse feature di awal `buf`; global dictionary dicari di `store`.
    pub fn parse(buf: &'a [u8], store: Option<&dyn DictionaryStore>) -> Result<Self> {
        Self::read(&mut JbReader::new(buf), store)
    }

    /// Parse feature di awal `buf` dengan global dictionary yang sudah diketahui.
    pub fn parse_with(buf: &'a [u8], global: Option<Arc<JbDict>>) -> Result<Self> {
        Self::parse_header(&mut JbReader::new(buf), |_| global)
    }

    /// Parse feature pada cursor `reader`; cursor maju ke unit berikutnya.
    pub fn read(reader: &mut JbReader<'a>, store: Option<&dyn DictionaryStore>) -> Result<Self> {
        Self::parse_header(reader, |id| store.and_then(|s| s.get(id)))
    }

    fn parse_header(
        reader: &mut JbReader<'a>,
        resolve: impl FnOnce(&str) -> Option<Arc<JbDict>>,
    ) -> Result<Self> {
        let start = reader.offset();
        let unit_type = reader.unit_type()?;
        if unit_type != JbType::Feature {
            return Err(JbError::TypeMismatch {
                offset: start,
                expected: "feature",
                found: unit_type.name(),
            });
        }
        let (body_start, body_end) = reader.structure_body()?;
        let mut body = reader.sub_reader(body_start, body_end)?;

        let global_id = if body.is_null() {
            body.next_unit()?;
            None
        } else {
            Some(body.read_string()?)
        };

        // Id bisa berupa text yang refer ke local dictionary: decode setelah
        // dictionary di-parse.
        let id_offset = body.offset();
        body.next_unit()?;

        let dict_type = body.unit_type()?;
        if dict_type != JbType::LocalDictionary {
            return Err(JbError::TypeMismatch {
                offset: body.offset(),
                expected: "local-dictionary",
                found: dict_type.name(),
            });
        }
        let local = Arc::new(JbDict::read(&mut body)?);

        let global = match global_id.as_deref() {
            Some(gid) => {
                let dict = resolve(gid);
                if dict.is_none() {
                    warn!(dict_id = gid, offset = start, "global dictionary not available");
                }
                dict
            }
            None => None,
        };
        body.set_local(Some(Arc::clone(&local)));
        body.set_global(global_id.as_deref(), global);

        let mut id_reader = body.clone();
        id_reader.set_offset(id_offset)?;
        let id = id_reader.read_any_string()?;

        if body.is_eof() {
            return Err(JbError::malformed(body.offset(), "feature without content"));
        }
        reader.set_offset(body_end)?;
        Ok(Self {
            content: body,
            start,
            size: body_end - start,
            global_id,
            id,
            local,
        })
    }

    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    /// Id global dictionary yang dibutuhkan feature ini.
    pub fn global_dict_id(&self) -> Option<&str> {
        self.global_id.as_deref()
    }

    pub fn local_dictionary(&self) -> &Arc<JbDict> {
        &self.local
    }

    pub fn global_dictionary(&self) -> Option<&Arc<JbDict>> {
        self.content.global_dictionary()
    }

    /// Offset awal feature di buffer.
    pub fn offset(&self) -> usize {
        self.start
    }

    /// Total byte length feature (termasuk lead-in dan size).
    pub fn size(&self) -> usize {
        self.size
    }

    /// Tipe unit konten (biasanya map).
    pub fn feature_type(&self) -> Result<JbType> {
        self.content.unit_type()
    }

    /// Reader pada konten, dictionary sudah terikat.
    pub fn content(&self) -> JbReader<'a> {
        self.content.clone()
    }

    pub fn root_map(&self) -> Result<JbMap<'a>> {
        self.content().read_map()
    }

    pub fn to_value(&self) -> Result<JbValue> {
        self.content().read_value()
    }
}
