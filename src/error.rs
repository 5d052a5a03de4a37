//! Error Taxonomy untuk JBON codec
//!
//! Semua error bersifat fatal untuk operasi yang sedang berjalan. Codec
//! deterministik, jadi tidak ada retry di sini; layer di atas (storage,
//! session) yang memutuskan apakah perlu fetch ulang dictionary lalu decode lagi.

use thiserror::Error;

/// Result alias untuk seluruh crate
pub type Result<T> = std::result::Result<T, JbError>;

/// Errors produced while encoding or decoding JBON buffers.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum JbError {
    /// Read would cross the content end of the bound buffer.
    #[error("unexpected end of buffer at offset {offset}: need {needed} bytes, content ends at {end}")]
    UnexpectedEof {
        offset: usize,
        needed: usize,
        end: usize,
    },

    /// Lead-in byte with an unassigned bit pattern.
    #[error("invalid lead-in byte {byte:#04x} at offset {offset}")]
    InvalidLeadIn { offset: usize, byte: u8 },

    /// Strict read against a unit of another type.
    #[error("type mismatch at offset {offset}: expected {expected}, found {found}")]
    TypeMismatch {
        offset: usize,
        expected: &'static str,
        found: &'static str,
    },

    /// Structurally invalid content (size header, code point, layout).
    #[error("malformed buffer at offset {offset}: {reason}")]
    Malformed { offset: usize, reason: String },

    /// Reference index outside the bound dictionary.
    #[error("{} dictionary has no entry {index} (reference at offset {offset})", dict_kind(.global))]
    DictionaryMiss {
        offset: usize,
        index: usize,
        global: bool,
    },

    /// Reference into a dictionary that is not bound to the reader.
    #[error("{} dictionary {} not bound (reference at offset {offset})", dict_kind(.global), dict_id(.id))]
    DictionaryNotBound {
        offset: usize,
        global: bool,
        id: Option<String>,
    },

    /// Unmatched UTF-16 surrogate in encoder input.
    #[error("unmatched UTF-16 surrogate at position {position}")]
    InvalidSurrogate { position: usize },

    /// Other invalid encoder input.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Builder protocol misuse.
    #[error("contract violation: {0}")]
    Contract(String),
}

fn dict_kind(global: &bool) -> &'static str {
    if *global {
        "global"
    } else {
        "local"
    }
}

fn dict_id(id: &Option<String>) -> &str {
    id.as_deref().unwrap_or("<none>")
}

impl JbError {
    /// Error yang menandakan buffer korup atau versi tidak cocok.
    #[must_use]
    pub fn is_malformed(&self) -> bool {
        matches!(
            self,
            Self::UnexpectedEof { .. } | Self::InvalidLeadIn { .. } | Self::Malformed { .. }
        )
    }

    /// Error yang bisa diatasi dengan mengikat (bind) dictionary yang benar.
    #[must_use]
    pub fn is_dictionary_miss(&self) -> bool {
        matches!(
            self,
            Self::DictionaryMiss { .. } | Self::DictionaryNotBound { .. }
        )
    }

    pub(crate) fn malformed(offset: usize, reason: impl Into<String>) -> Self {
        Self::Malformed {
            offset,
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classification() {
        let eof = JbError::UnexpectedEof {
            offset: 3,
            needed: 4,
            end: 5,
        };
        assert!(eof.is_malformed());
        assert!(!eof.is_dictionary_miss());

        let miss = JbError::DictionaryNotBound {
            offset: 0,
            global: true,
            id: Some("dict-1".to_string()),
        };
        assert!(miss.is_dictionary_miss());
        assert_eq!(
            miss.to_string(),
            "global dictionary dict-1 not bound (reference at offset 0)"
        );
    }
}
