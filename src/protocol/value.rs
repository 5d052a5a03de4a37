//! Owned value tree untuk round-trip aplikasi <-> JBON

use std::fmt;

/// Decoded JBON value. Map menjaga urutan key seperti di buffer.
#[derive(Debug, Clone, PartialEq)]
pub enum JbValue {
    Null,
    Undefined,
    Bool(bool),
    Int(i64),
    Float(f64),
    /// Epoch milliseconds (48 bit)
    Timestamp(u64),
    String(String),
    Array(Vec<JbValue>),
    Map(Vec<(String, JbValue)>),
}

impl JbValue {
    /// Value untuk `key` pada map (linear).
    pub fn get(&self, key: &str) -> Option<&JbValue> {
        match self {
            Self::Map(entries) => entries.iter().find(|(k, _)| k == key).map(|(_, v)| v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Int(v) => Some(*v),
            _ => None,
        }
    }
}

impl From<&str> for JbValue {
    fn from(s: &str) -> Self {
        Self::String(s.to_string())
    }
}

impl From<i64> for JbValue {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<f64> for JbValue {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<bool> for JbValue {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

fn write_quoted(f: &mut fmt::Formatter<'_>, s: &str) -> fmt::Result {
    f.write_str("\"")?;
    for c in s.chars() {
        match c {
            '"' => f.write_str("\\\"")?,
            '\\' => f.write_str("\\\\")?,
            '\n' => f.write_str("\\n")?,
            '\r' => f.write_str("\\r")?,
            '\t' => f.write_str("\\t")?,
            c if (c as u32) < 0x20 => write!(f, "\\u{:04x}", c as u32)?,
            c => write!(f, "{c}")?,
        }
    }
    f.write_str("\"")
}

/// JSON-like rendering (undefined ditulis `undefined`, timestamp sebagai angka)
impl fmt::Display for JbValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => f.write_str("null"),
            Self::Undefined => f.write_str("undefined"),
            Self::Bool(v) => write!(f, "{v}"),
            Self::Int(v) => write!(f, "{v}"),
            Self::Float(v) => write!(f, "{v}"),
            Self::Timestamp(v) => write!(f, "{v}"),
            Self::String(s) => write_quoted(f, s),
            Self::Array(values) => {
                f.write_str("[")?;
                for (i, v) in values.iter().enumerate() {
                    if i > 0 {
                        f.write_str(",")?;
                    }
                    write!(f, "{v}")?;
                }
                f.write_str("]")
            }
            Self::Map(entries) => {
                f.write_str("{")?;
                for (i, (k, v)) in entries.iter().enumerate() {
                    if i > 0 {
                        f.write_str(",")?;
                    }
                    write_quoted(f, k)?;
                    write!(f, ":{v}")?;
                }
                f.write_str("}")
            }
        }
    }
}
