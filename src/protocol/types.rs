//! Type Tag Scheme
//!
//! Layout lead-in byte:
//! ┌──────────┬──────────────────────────────────────────────────┐
//! │ 000vvvvv │ Narrow tier: v = type (0..31)                    │
//! ├──────────┼──────────────────────────────────────────────────┤
//! │ 1000vvvv │ uint4 (0..15)                                    │
//! │ 1001vvvv │ sint4 (v - 16, -16..-1)                          │
//! │ 1010vvvv │ float4 (TINY_FLOATS[v])                          │
//! │ 1011xgss │ sized reference (ss=0 null, 1/2/3 = u8/u16/u32)   │
//! │ 1100iiii │ tiny local reference (0..15)                     │
//! │ 1101iiii │ tiny global reference (0..15)                    │
//! │ 1110llll │ string (0..12 inline, 13/14/15 = u8/u16/u32)     │
//! │ 1111ttss │ container (tt map/array/text, ss = size class)   │
//! └──────────┴──────────────────────────────────────────────────┘
//!
//! Semua multi-byte field big-endian. Tidak ada scan konten untuk tahu tipe.

pub const TYPE_NULL: u8 = 0;
pub const TYPE_UNDEFINED: u8 = 1;
pub const TYPE_BOOL_TRUE: u8 = 2;
pub const TYPE_BOOL_FALSE: u8 = 3;
pub const TYPE_FLOAT32: u8 = 4;
pub const TYPE_FLOAT64: u8 = 5;
pub const TYPE_TIMESTAMP: u8 = 6;
pub const TYPE_INT8: u8 = 7;
pub const TYPE_INT16: u8 = 8;
pub const TYPE_INT32: u8 = 9;
pub const TYPE_INT64: u8 = 10;
pub const TYPE_GLOBAL_DICTIONARY: u8 = 11;
pub const TYPE_LOCAL_DICTIONARY: u8 = 12;
pub const TYPE_FEATURE: u8 = 13;
pub const TYPE_XYZ: u8 = 14;

pub const TYPE_UINT4: u8 = 0x80;
pub const TYPE_SINT4: u8 = 0x90;
pub const TYPE_FLOAT4: u8 = 0xA0;
pub const TYPE_REF: u8 = 0xB0;
pub const TYPE_REF_LOCAL4: u8 = 0xC0;
pub const TYPE_REF_GLOBAL4: u8 = 0xD0;
pub const TYPE_STRING: u8 = 0xE0;
pub const TYPE_CONTAINER: u8 = 0xF0;

/// Bit global pada sized reference
pub const REF_GLOBAL_BIT: u8 = 0b0100;

pub const CONTAINER_MAP: u8 = 0;
pub const CONTAINER_ARRAY: u8 = 1;
pub const CONTAINER_TEXT: u8 = 2;

/// Panjang string terbesar yang muat di nibble lead-in
pub const STRING_INLINE_MAX: usize = 12;
pub const STRING_SIZE_U8: u8 = 13;
pub const STRING_SIZE_U16: u8 = 14;
pub const STRING_SIZE_U32: u8 = 15;

/// Reference index di bawah ini selalu tiny (1 byte)
pub const TINY_REF_LIMIT: usize = 16;

/// Header terbesar: lead-in + u32
pub const MAX_HEADER_SIZE: usize = 5;

/// Timestamp disimpan 48-bit
pub const TIMESTAMP_MAX: u64 = (1 << 48) - 1;

/// Lookup table untuk float4, index = nibble
pub const TINY_FLOATS: [f32; 16] = [
    -8.0, -7.0, -6.0, -5.0, -4.0, -3.0, -2.0, -1.0, 0.0, 1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0,
];

/// Byte order untuk raw accessor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Endian {
    #[default]
    Big,
    Little,
}

/// Tipe value unit, hasil decode lead-in byte
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JbType {
    Null,
    Undefined,
    Bool,
    Float32,
    Float64,
    Timestamp,
    Int8,
    Int16,
    Int32,
    Int64,
    GlobalDictionary,
    LocalDictionary,
    Feature,
    Xyz,
    Uint4,
    Sint4,
    Float4,
    /// Local atau global reference, tiny maupun sized
    Ref,
    String,
    Map,
    Array,
    Text,
}

impl JbType {
    /// Decode tipe dari lead-in byte, O(1) via masking.
    #[inline(always)]
    pub fn from_lead_in(lead: u8) -> Option<Self> {
        if lead & 0x80 == 0 {
            return match lead {
                TYPE_NULL => Some(Self::Null),
                TYPE_UNDEFINED => Some(Self::Undefined),
                TYPE_BOOL_TRUE | TYPE_BOOL_FALSE => Some(Self::Bool),
                TYPE_FLOAT32 => Some(Self::Float32),
                TYPE_FLOAT64 => Some(Self::Float64),
                TYPE_TIMESTAMP => Some(Self::Timestamp),
                TYPE_INT8 => Some(Self::Int8),
                TYPE_INT16 => Some(Self::Int16),
                TYPE_INT32 => Some(Self::Int32),
                TYPE_INT64 => Some(Self::Int64),
                TYPE_GLOBAL_DICTIONARY => Some(Self::GlobalDictionary),
                TYPE_LOCAL_DICTIONARY => Some(Self::LocalDictionary),
                TYPE_FEATURE => Some(Self::Feature),
                TYPE_XYZ => Some(Self::Xyz),
                _ => None,
            };
        }
        match lead & 0xF0 {
            TYPE_UINT4 => Some(Self::Uint4),
            TYPE_SINT4 => Some(Self::Sint4),
            TYPE_FLOAT4 => Some(Self::Float4),
            TYPE_REF | TYPE_REF_LOCAL4 | TYPE_REF_GLOBAL4 => Some(Self::Ref),
            TYPE_STRING => Some(Self::String),
            _ => match (lead >> 2) & 0b11 {
                CONTAINER_MAP => Some(Self::Map),
                CONTAINER_ARRAY => Some(Self::Array),
                CONTAINER_TEXT => Some(Self::Text),
                _ => None,
            },
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Undefined => "undefined",
            Self::Bool => "bool",
            Self::Float32 => "float32",
            Self::Float64 => "float64",
            Self::Timestamp => "timestamp",
            Self::Int8 => "int8",
            Self::Int16 => "int16",
            Self::Int32 => "int32",
            Self::Int64 => "int64",
            Self::GlobalDictionary => "global-dictionary",
            Self::LocalDictionary => "local-dictionary",
            Self::Feature => "feature",
            Self::Xyz => "xyz",
            Self::Uint4 => "uint4",
            Self::Sint4 => "sint4",
            Self::Float4 => "float4",
            Self::Ref => "reference",
            Self::String => "string",
            Self::Map => "map",
            Self::Array => "array",
            Self::Text => "text",
        }
    }

    #[inline(always)]
    pub fn is_int(self) -> bool {
        matches!(
            self,
            Self::Uint4 | Self::Sint4 | Self::Int8 | Self::Int16 | Self::Int32 | Self::Int64
        )
    }

    #[inline(always)]
    pub fn is_float(self) -> bool {
        matches!(self, Self::Float4 | Self::Float32 | Self::Float64)
    }

    #[inline(always)]
    pub fn is_container(self) -> bool {
        matches!(self, Self::Map | Self::Array | Self::Text)
    }

    /// Structure unit: `[lead][size: integer unit][body]`
    #[inline(always)]
    pub fn is_structure(self) -> bool {
        matches!(
            self,
            Self::GlobalDictionary | Self::LocalDictionary | Self::Feature | Self::Xyz
        )
    }
}

impl std::fmt::Display for JbType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Ukuran header string untuk panjang konten `len` (termasuk lead-in).
#[inline(always)]
pub fn string_header_size(len: usize) -> usize {
    if len <= STRING_INLINE_MAX {
        1
    } else if len - STRING_SIZE_U8 as usize <= u8::MAX as usize {
        2
    } else if len <= u16::MAX as usize {
        3
    } else {
        5
    }
}

/// Ukuran header container untuk panjang konten `len` (termasuk lead-in).
#[inline(always)]
pub fn container_header_size(len: usize) -> usize {
    if len == 0 {
        1
    } else if len <= u8::MAX as usize {
        2
    } else if len <= u16::MAX as usize {
        3
    } else {
        5
    }
}

/// Nibble float4 untuk `value`, jika value bilangan bulat di -8..7 (bukan -0.0).
#[inline(always)]
pub fn tiny_float_index(value: f64) -> Option<u8> {
    if value.fract() == 0.0 && (-8.0..=7.0).contains(&value) && !(value == 0.0 && value.is_sign_negative()) {
        Some((value as i32 + 8) as u8)
    } else {
        None
    }
}
