//! JBON - JSON-like Binary Object Notation
//!
//! Arsitektur:
//! - Self-describing: setiap unit membawa tipe dan ukurannya sendiri
//! - Zero-copy: reader hanya cursor di atas `&[u8]`
//! - Dictionary compression: string berulang menjadi reference ke
//!   local dictionary (inline per feature) atau global dictionary (shared)
//!
//! ```
//! use jbon::{JbBuilder, JbFeature};
//!
//! let mut builder = JbBuilder::new(None);
//! let map = builder.start_map();
//! builder.write_key("id").unwrap();
//! builder.write_string("abc").unwrap();
//! builder.end_map(map).unwrap();
//! let bytes = builder.build_feature(Some("f1")).unwrap();
//!
//! let feature = JbFeature::parse(&bytes, None).unwrap();
//! assert_eq!(feature.id(), Some("f1"));
//! let mut root = feature.root_map().unwrap();
//! assert!(root.select_key("id").unwrap());
//! assert_eq!(root.value().unwrap().read_string().unwrap(), "abc");
//! ```

pub mod config;
pub mod core;
pub mod error;
pub mod protocol;

pub use crate::config::BuilderConfig;
pub use crate::core::{DictionaryStore, FeatureFile, JbDict, JbDictManager, NakshaUuid, Txn};
pub use crate::error::{JbError, Result};
pub use crate::protocol::{
    Endian, JbArray, JbBuilder, JbFeature, JbMap, JbReader, JbText, JbType, JbValue, TextUnit,
};
