//! XYZ extension: metadata feature yang dikelola storage
//!
//! ```text
//! [0x0E][size][variant int][fields...]
//! variant 0 (namespace): created_at updated_at txn action version author_ts
//!                        puuid uuid app_id author grid tags
//! variant 1 (operation): op id uuid
//! ```
//!
//! Field opsional ditulis null. Tags ditulis sebagai text agar ikut
//! dictionary compression.

use std::fmt;

use super::builder::JbBuilder;
use super::reader::JbReader;
use super::types::{JbType, TYPE_XYZ};
use crate::core::{NakshaUuid, Txn};
use crate::error::{JbError, Result};

pub const XYZ_NAMESPACE: i64 = 0;
pub const XYZ_OP: i64 = 1;

const NS_FIELDS: usize = 12;
const OP_FIELDS: usize = 3;

/// Aksi terakhir yang mengubah feature.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum XyzAction {
    Create = 0,
    Update = 1,
    Delete = 2,
}

impl XyzAction {
    pub fn from_code(code: i32) -> Option<Self> {
        match code {
            0 => Some(Self::Create),
            1 => Some(Self::Update),
            2 => Some(Self::Delete),
            _ => None,
        }
    }
}

/// Operasi tulis yang diminta client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum XyzOpCode {
    Create = 0,
    Update = 1,
    Upsert = 2,
    Delete = 3,
    Purge = 4,
}

impl XyzOpCode {
    pub fn from_code(code: i32) -> Option<Self> {
        match code {
            0 => Some(Self::Create),
            1 => Some(Self::Update),
            2 => Some(Self::Upsert),
            3 => Some(Self::Delete),
            4 => Some(Self::Purge),
            _ => None,
        }
    }
}

impl fmt::Display for XyzOpCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Create => "CREATE",
            Self::Update => "UPDATE",
            Self::Upsert => "UPSERT",
            Self::Delete => "DELETE",
            Self::Purge => "PURGE",
        };
        f.write_str(name)
    }
}

/// Namespace metadata (owned).
#[derive(Debug, Clone, PartialEq)]
pub struct XyzNs {
    pub created_at: u64,
    pub updated_at: u64,
    pub txn: Txn,
    pub action: XyzAction,
    pub version: i32,
    pub author_ts: u64,
    pub puuid: Option<String>,
    pub uuid: String,
    pub app_id: String,
    pub author: Option<String>,
    pub grid: String,
    pub tags: Option<Vec<String>>,
}

/// Operation request (owned).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XyzOp {
    pub op: XyzOpCode,
    pub id: String,
    pub uuid: Option<String>,
}

impl JbBuilder {
    /// Tulis XYZ namespace sebagai satu unit di posisi saat ini.
    pub fn write_xyz_ns(&mut self, ns: &XyzNs) -> Result<usize> {
        let start = self.start_structure(TYPE_XYZ);
        if let Err(e) = self.write_ns_fields(ns) {
            self.rewind(start);
            return Err(e);
        }
        self.end_structure(start);
        Ok(start)
    }

    pub fn write_xyz_op(&mut self, op: &XyzOp) -> Result<usize> {
        let start = self.start_structure(TYPE_XYZ);
        self.write_int64(XYZ_OP);
        self.write_int32(op.op as i32);
        if let Err(e) = self
            .write_string(&op.id)
            .and_then(|_| self.write_opt_string(op.uuid.as_deref()))
        {
            self.rewind(start);
            return Err(e);
        }
        self.end_structure(start);
        Ok(start)
    }

    fn write_ns_fields(&mut self, ns: &XyzNs) -> Result<()> {
        self.write_int64(XYZ_NAMESPACE);
        self.write_timestamp(ns.created_at)?;
        self.write_timestamp(ns.updated_at)?;
        self.write_int64(ns.txn.value() as i64);
        self.write_int32(ns.action as i32);
        self.write_int32(ns.version);
        self.write_timestamp(ns.author_ts)?;
        self.write_opt_string(ns.puuid.as_deref())?;
        self.write_string(&ns.uuid)?;
        self.write_string(&ns.app_id)?;
        self.write_opt_string(ns.author.as_deref())?;
        self.write_string(&ns.grid)?;
        match &ns.tags {
            Some(tags) => {
                let array = self.start_array();
                for tag in tags {
                    self.write_text(tag)?;
                }
                self.end_array(array)?;
            }
            None => {
                self.write_null();
            }
        }
        Ok(())
    }

    fn write_opt_string(&mut self, value: Option<&str>) -> Result<usize> {
        match value {
            Some(s) => self.write_string(s),
            None => Ok(self.write_null()),
        }
    }
}

/// Variant XYZ unit pada cursor `reader`.
pub fn xyz_variant(reader: &JbReader<'_>) -> Result<i64> {
    let (start, end) = xyz_body(reader)?;
    reader.sub_reader(start, end)?.read_int64()
}

fn xyz_body(reader: &JbReader<'_>) -> Result<(usize, usize)> {
    let unit_type = reader.unit_type()?;
    if unit_type != JbType::Xyz {
        return Err(JbError::TypeMismatch {
            offset: reader.offset(),
            expected: "xyz",
            found: unit_type.name(),
        });
    }
    reader.structure_body()
}

/// Offset tiap field setelah variant; jumlah field harus tepat `N`.
fn parse_fields<'a, const N: usize>(
    reader: &mut JbReader<'a>,
    variant: i64,
) -> Result<(JbReader<'a>, [usize; N])> {
    let (start, end) = xyz_body(reader)?;
    let mut body = reader.sub_reader(start, end)?;
    let found = body.read_int64()?;
    if found != variant {
        return Err(JbError::malformed(
            start,
            format!("xyz variant {found}, expected {variant}"),
        ));
    }
    let mut fields = [0usize; N];
    for field in fields.iter_mut() {
        if body.is_eof() {
            return Err(JbError::malformed(body.offset(), "xyz unit has too few fields"));
        }
        *field = body.offset();
        body.next_unit()?;
    }
    if !body.is_eof() {
        return Err(JbError::malformed(body.offset(), "xyz unit has trailing fields"));
    }
    reader.set_offset(end)?;
    Ok((body, fields))
}

fn opt_string(mut reader: JbReader<'_>) -> Result<Option<String>> {
    if reader.is_null() {
        return Ok(None);
    }
    reader.read_string().map(Some)
}

/// Lazy reader untuk XYZ namespace; field di-decode saat diminta.
#[derive(Debug, Clone)]
pub struct JbXyzNs<'a> {
    body: JbReader<'a>,
    fields: [usize; NS_FIELDS],
}

impl<'a> JbXyzNs<'a> {
    /// Parse unit pada cursor; cursor maju melewati unit.
    pub fn parse(reader: &mut JbReader<'a>) -> Result<Self> {
        let (body, fields) = parse_fields::<NS_FIELDS>(reader, XYZ_NAMESPACE)?;
        Ok(Self { body, fields })
    }

    fn field(&self, index: usize) -> Result<JbReader<'a>> {
        let mut reader = self.body.clone();
        reader.set_offset(self.fields[index])?;
        Ok(reader)
    }

    pub fn created_at(&self) -> Result<u64> {
        self.field(0)?.read_timestamp()
    }

    pub fn updated_at(&self) -> Result<u64> {
        self.field(1)?.read_timestamp()
    }

    pub fn txn(&self) -> Result<Txn> {
        Ok(Txn::from_value(self.field(2)?.read_int64()? as u64))
    }

    pub fn action(&self) -> Result<XyzAction> {
        let offset = self.fields[3];
        let code = self.field(3)?.read_int32()?;
        XyzAction::from_code(code)
            .ok_or_else(|| JbError::malformed(offset, format!("unknown xyz action {code}")))
    }

    pub fn version(&self) -> Result<i32> {
        self.field(4)?.read_int32()
    }

    pub fn author_ts(&self) -> Result<u64> {
        self.field(5)?.read_timestamp()
    }

    pub fn puuid(&self) -> Result<Option<String>> {
        opt_string(self.field(6)?)
    }

    pub fn uuid(&self) -> Result<String> {
        self.field(7)?.read_string()
    }

    /// `uuid` yang sudah di-parse.
    pub fn naksha_uuid(&self) -> Result<NakshaUuid> {
        self.uuid()?.parse()
    }

    pub fn app_id(&self) -> Result<String> {
        self.field(8)?.read_string()
    }

    pub fn author(&self) -> Result<Option<String>> {
        opt_string(self.field(9)?)
    }

    pub fn grid(&self) -> Result<String> {
        self.field(10)?.read_string()
    }

    pub fn tags(&self) -> Result<Option<Vec<String>>> {
        let mut reader = self.field(11)?;
        if reader.is_null() {
            return Ok(None);
        }
        let mut array = reader.read_array()?;
        let mut tags = Vec::with_capacity(array.length()?);
        let mut ok = array.first();
        while ok {
            if let Some(tag) = array.value()?.read_any_string()? {
                tags.push(tag);
            }
            ok = array.next()?;
        }
        Ok(Some(tags))
    }

    pub fn to_owned_ns(&self) -> Result<XyzNs> {
        Ok(XyzNs {
            created_at: self.created_at()?,
            updated_at: self.updated_at()?,
            txn: self.txn()?,
            action: self.action()?,
            version: self.version()?,
            author_ts: self.author_ts()?,
            puuid: self.puuid()?,
            uuid: self.uuid()?,
            app_id: self.app_id()?,
            author: self.author()?,
            grid: self.grid()?,
            tags: self.tags()?,
        })
    }
}

#[derive(Debug, Clone)]
pub struct JbXyzOp<'a> {
    body: JbReader<'a>,
    fields: [usize; OP_FIELDS],
}

impl<'a> JbXyzOp<'a> {
    pub fn parse(reader: &mut JbReader<'a>) -> Result<Self> {
        let (body, fields) = parse_fields::<OP_FIELDS>(reader, XYZ_OP)?;
        Ok(Self { body, fields })
    }

    fn field(&self, index: usize) -> Result<JbReader<'a>> {
        let mut reader = self.body.clone();
        reader.set_offset(self.fields[index])?;
        Ok(reader)
    }

    pub fn op(&self) -> Result<XyzOpCode> {
        let offset = self.fields[0];
        let code = self.field(0)?.read_int32()?;
        XyzOpCode::from_code(code)
            .ok_or_else(|| JbError::malformed(offset, format!("unknown xyz op {code}")))
    }

    pub fn id(&self) -> Result<String> {
        self.field(1)?.read_string()
    }

    pub fn uuid(&self) -> Result<Option<String>> {
        opt_string(self.field(2)?)
    }

    pub fn to_owned_op(&self) -> Result<XyzOp> {
        Ok(XyzOp {
            op: self.op()?,
            id: self.id()?,
            uuid: self.uuid()?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::JbFeature;

    fn sample_ns() -> XyzNs {
        XyzNs {
            created_at: 1_700_000_000_000,
            updated_at: 1_700_000_500_000,
            txn: Txn::new(2024, 1, 2, 5).unwrap(),
            action: XyzAction::Update,
            version: 3,
            author_ts: 1_700_000_400_000,
            puuid: Some("s:c:2024:1:2:1:0".to_string()),
            uuid: "s:c:2024:1:2:2:0".to_string(),
            app_id: "app".to_string(),
            author: None,
            grid: "u0yjjd6".to_string(),
            tags: Some(vec!["hello world".to_string(), "ref:abc".to_string()]),
        }
    }

    #[test]
    fn test_namespace_roundtrip() {
        let ns = sample_ns();
        let mut builder = JbBuilder::new(None);
        builder.write_xyz_ns(&ns).unwrap();
        let bytes = builder.build_feature(Some("xyz")).unwrap();

        let feature = JbFeature::parse(&bytes, None).unwrap();
        assert_eq!(feature.feature_type().unwrap(), JbType::Xyz);
        let mut content = feature.content();
        assert_eq!(xyz_variant(&content).unwrap(), XYZ_NAMESPACE);
        let size = content.size().unwrap();
        let parsed = JbXyzNs::parse(&mut content).unwrap();
        assert_eq!(content.offset() - feature.content().offset(), size);
        assert_eq!(parsed.version().unwrap(), 3);
        assert_eq!(parsed.txn().unwrap().day(), 2);
        assert_eq!(parsed.naksha_uuid().unwrap().txn.seq(), 2);
        assert_eq!(parsed.author().unwrap(), None);
        assert_eq!(parsed.to_owned_ns().unwrap(), ns);
        // tags dikompresi ke local dictionary
        assert!(feature.local_dictionary().index_of("hello").is_some());
    }

    #[test]
    fn test_op_roundtrip() {
        let op = XyzOp {
            op: XyzOpCode::Upsert,
            id: "feature-1".to_string(),
            uuid: None,
        };
        let mut builder = JbBuilder::new(None);
        builder.write_xyz_op(&op).unwrap();
        let bytes = builder.as_bytes();
        let mut reader = JbReader::new(bytes);
        assert_eq!(reader.size().unwrap(), bytes.len());
        assert_eq!(xyz_variant(&reader).unwrap(), XYZ_OP);
        let parsed = JbXyzOp::parse(&mut reader).unwrap();
        assert_eq!(parsed.to_owned_op().unwrap(), op);
        assert_eq!(parsed.op().unwrap().to_string(), "UPSERT");
        assert!(reader.is_eof());
    }

    #[test]
    fn test_wrong_variant() {
        let mut builder = JbBuilder::new(None);
        builder
            .write_xyz_op(&XyzOp {
                op: XyzOpCode::Delete,
                id: "x".to_string(),
                uuid: None,
            })
            .unwrap();
        let mut reader = JbReader::new(builder.as_bytes());
        let err = JbXyzNs::parse(&mut reader).unwrap_err();
        assert!(err.is_malformed());
        assert_eq!(reader.offset(), 0);
    }

    #[test]
    fn test_invalid_field_rewinds() {
        let mut ns = sample_ns();
        ns.author_ts = u64::MAX;
        let mut builder = JbBuilder::new(None);
        builder.write_null();
        assert!(builder.write_xyz_ns(&ns).is_err());
        assert_eq!(builder.end(), 1);
    }

    #[test]
    fn test_large_body_size_header() {
        let mut ns = sample_ns();
        ns.grid = "g".repeat(400);
        let mut builder = JbBuilder::new(None);
        builder.write_xyz_ns(&ns).unwrap();
        let bytes = builder.as_bytes().to_vec();
        // body > 255: size ditulis sebagai int16
        assert_eq!(bytes[1], crate::protocol::types::TYPE_INT16);
        let mut reader = JbReader::new(&bytes).with_local(Some(std::sync::Arc::new(
            builder.local_dictionary().clone(),
        )));
        assert_eq!(reader.size().unwrap(), bytes.len());
        assert_eq!(JbXyzNs::parse(&mut reader).unwrap().to_owned_ns().unwrap(), ns);
    }
}
