//! Protocol Layer: JBON codec
//!
//! Prinsip desain:
//! - Self-describing: tipe dan ukuran setiap unit terbaca dari lead-in byte
//! - Zero-copy decode: reader hanya menyimpan offset ke buffer asli
//! - Lazy navigation: map/array/text dibaca per entry, panjang di-cache

mod array;
mod builder;
pub(crate) mod codepoint;
mod entries;
mod feature;
mod map;
mod reader;
mod text;
pub mod types;
mod value;
mod xyz;

pub use array::JbArray;
pub use builder::JbBuilder;
pub use feature::JbFeature;
pub use map::JbMap;
pub use reader::{JbReader, MAX_VALUE_DEPTH};
pub use text::{JbText, TextUnit};
pub use types::{Endian, JbType};
pub use value::JbValue;
pub use xyz::{xyz_variant, JbXyzNs, JbXyzOp, XyzAction, XyzNs, XyzOp, XyzOpCode, XYZ_NAMESPACE, XYZ_OP};
