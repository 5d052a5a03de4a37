//! Feature Round-Trip Test
//!
//! Encode lewat builder publik, decode lewat reader publik, dan cek
//! properti format: round-trip, size self-description, navigasi container,
//! dan reversibility dictionary compression.
//!
//! Usage:
//!   cargo test --release --test feature_roundtrip

use std::sync::Arc;
use std::thread;

use proptest::prelude::*;

use jbon::protocol::types::TIMESTAMP_MAX;
use jbon::{
    BuilderConfig, DictionaryStore, JbBuilder, JbDict, JbDictManager, JbError, JbFeature,
    JbReader, JbType, JbValue,
};

fn global_dict() -> Arc<JbDict> {
    Arc::new(JbDict::from_entries(
        Some("global-test".to_string()),
        ["type", "properties", "urn:here:mom:", "urn:", "Street", "id"],
    ))
}

#[test]
fn test_tiny_int_scenario() {
    let mut builder = JbBuilder::new(None);
    builder.write_int32(5);
    assert_eq!(builder.as_bytes(), &[0x85]);
    assert_eq!(JbReader::new(builder.as_bytes()).read_int32().unwrap(), 5);
}

#[test]
fn test_urn_prefix_scenario() {
    let global = Arc::new(JbDict::from_entries(Some("g".to_string()), ["urn:here:mom:"]));
    let mut builder = JbBuilder::new(Some(Arc::clone(&global)));
    builder.write_text("urn:here:mom:Topology:123").unwrap();
    let bytes = builder.as_bytes();

    // header (2) + global ref (2) + raw "Topology:123"
    assert_eq!(bytes.len(), 2 + 2 + "Topology:123".len());
    assert!(bytes.ends_with(b"Topology:123"));
    assert!(builder.local_dictionary().is_empty());

    let mut reader = JbReader::new(bytes).with_global(Some(global));
    let mut text = reader.read_text_reader().unwrap();
    assert_eq!(text.length().unwrap(), 1 + "Topology:123".len());
    assert_eq!(text.as_str().unwrap(), "urn:here:mom:Topology:123");
}

#[test]
fn test_map_scenario() {
    let mut builder = JbBuilder::new(None);
    let map = builder.start_map();
    builder.write_key("id").unwrap();
    builder.write_string("abc").unwrap();
    builder.end_map(map).unwrap();
    let local = Arc::new(builder.local_dictionary().clone());

    let mut reader = JbReader::new(builder.as_bytes()).with_local(Some(local));
    let mut map = reader.read_map().unwrap();
    assert!(map.first());
    assert_eq!(map.key().unwrap().as_ref(), "id");
    assert_eq!(map.value().unwrap().read_string().unwrap(), "abc");
    assert!(!map.next().unwrap());
    assert!(!map.ok());
}

#[test]
fn test_feature_scenario() {
    let mut builder = JbBuilder::new(None);
    let array = builder.start_array();
    builder.write_bool(true);
    builder.end_array(array).unwrap();
    let bytes = builder.build_feature(Some("f1")).unwrap();

    let feature = JbFeature::parse(&bytes, None).unwrap();
    assert_eq!(feature.id(), Some("f1"));
    assert_eq!(feature.feature_type().unwrap(), JbType::Array);
    assert_eq!(feature.feature_type().unwrap(), feature.content().unit_type().unwrap());
}

#[test]
fn test_feature_with_global_dictionary_via_store() {
    let global = global_dict();
    let store = Arc::new(JbDictManager::new());
    store.put(Arc::clone(&global)).unwrap();

    let value = JbValue::Map(vec![
        ("type".to_string(), JbValue::from("Feature")),
        ("id".to_string(), JbValue::from("urn:here:mom:Link:42")),
        (
            "properties".to_string(),
            JbValue::Map(vec![
                ("name".to_string(), JbValue::from("Main Street_north")),
                ("lanes".to_string(), JbValue::Int(2)),
                ("speed".to_string(), JbValue::Float(13.9)),
                ("updated".to_string(), JbValue::Timestamp(1_700_000_000_000)),
                ("closed".to_string(), JbValue::Bool(false)),
                ("note".to_string(), JbValue::Null),
            ]),
        ),
    ]);

    let mut builder = JbBuilder::new(Some(Arc::clone(&global)));
    builder.write_value(&value).unwrap();
    let bytes = builder.build_feature(Some("link-42")).unwrap();

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let store = Arc::clone(&store);
            let bytes = bytes.clone();
            let expected = value.clone();
            thread::spawn(move || {
                let feature = JbFeature::parse(&bytes, Some(store.as_ref() as &dyn DictionaryStore)).unwrap();
                assert_eq!(feature.global_dict_id(), Some("global-test"));
                assert_eq!(feature.to_value().unwrap(), expected);
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }
}

#[test]
fn test_missing_global_dictionary_is_reported_lazily() {
    let mut builder = JbBuilder::new(Some(global_dict()));
    let map = builder.start_map();
    builder.write_key("type").unwrap();
    builder.write_int32(1);
    builder.end_map(map).unwrap();
    let bytes = builder.build_feature(None).unwrap();

    let feature = JbFeature::parse(&bytes, Some(&JbDictManager::new() as &dyn DictionaryStore)).unwrap();
    let mut root = feature.root_map().unwrap();
    assert_eq!(root.length().unwrap(), 1);
    assert!(root.first());
    assert_eq!(root.value().unwrap().read_int32().unwrap(), 1);
    let err = root.key().unwrap_err();
    assert!(matches!(
        err,
        JbError::DictionaryNotBound { global: true, id: Some(ref id), .. } if id == "global-test"
    ));
}

#[test]
fn test_dictionary_export_and_reuse() {
    // Feature pertama membangun dictionary, lalu dipakai sebagai global
    let mut seed = JbBuilder::new(None);
    seed.write_key("building").unwrap();
    seed.write_text("residential house").unwrap();
    let dict_bytes = seed.build_dictionary("seed-1").unwrap();
    let global = Arc::new(JbDict::from_bytes(&dict_bytes).unwrap());
    assert_eq!(global.id(), Some("seed-1"));

    let mut builder = JbBuilder::new(Some(Arc::clone(&global)));
    let map = builder.start_map();
    builder.write_key("building").unwrap();
    builder.write_text("residential house").unwrap();
    builder.end_map(map).unwrap();
    assert!(builder.local_dictionary().is_empty());
    let bytes = builder.build_feature(None).unwrap();

    let feature = JbFeature::parse_with(&bytes, Some(global)).unwrap();
    let mut root = feature.root_map().unwrap();
    let mut value = root.get("building").unwrap().unwrap();
    assert_eq!(value.read_text().unwrap(), "residential house");
}

#[test]
fn test_reader_reuse_across_buffers() {
    let buffers: Vec<Vec<u8>> = (0..3)
        .map(|i| {
            let mut builder = JbBuilder::new(None);
            builder.write_int64(i * 1_000_000_000_000);
            builder.as_bytes().to_vec()
        })
        .collect();
    let mut reader = JbReader::new(&buffers[0]);
    for (i, buf) in buffers.iter().enumerate() {
        reader.bind(buf, 0, buf.len()).unwrap();
        assert_eq!(reader.read_int64().unwrap(), i as i64 * 1_000_000_000_000);
    }
}

#[test]
fn test_uncompressed_config() {
    let config = BuilderConfig {
        compress_text: false,
        ..BuilderConfig::default()
    };
    let mut builder = JbBuilder::with_config(config, Some(global_dict()));
    builder.write_value(&JbValue::from("urn:here:mom:abc")).unwrap();
    let mut reader = JbReader::new(builder.as_bytes());
    assert_eq!(reader.unit_type().unwrap(), JbType::String);
    assert_eq!(reader.read_string().unwrap(), "urn:here:mom:abc");
}

fn value_strategy() -> impl Strategy<Value = JbValue> {
    let leaf = prop_oneof![
        Just(JbValue::Null),
        Just(JbValue::Undefined),
        any::<bool>().prop_map(JbValue::Bool),
        any::<i64>().prop_map(JbValue::Int),
        (-1e12f64..1e12).prop_map(JbValue::Float),
        (0..=TIMESTAMP_MAX).prop_map(JbValue::Timestamp),
        "[a-zA-Z:_ 0-9é東]{0,24}".prop_map(JbValue::String),
    ];
    leaf.prop_recursive(4, 64, 8, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..8).prop_map(JbValue::Array),
            prop::collection::vec(("[a-z]{1,8}", inner), 0..8).prop_map(JbValue::Map),
        ]
    })
}

proptest! {
    #[test]
    fn prop_int64_roundtrip(v in any::<i64>()) {
        let mut builder = JbBuilder::new(None);
        builder.write_int64(v);
        let mut reader = JbReader::new(builder.as_bytes());
        prop_assert_eq!(reader.size().unwrap(), builder.end());
        prop_assert_eq!(reader.read_int64().unwrap(), v);
    }

    #[test]
    fn prop_float64_bit_exact(v in any::<f64>()) {
        let mut builder = JbBuilder::new(None);
        builder.write_float64(v);
        let got = JbReader::new(builder.as_bytes()).read_float64().unwrap();
        if v.is_nan() {
            prop_assert!(got.is_nan());
        } else {
            prop_assert_eq!(got.to_bits(), v.to_bits());
        }
    }

    #[test]
    fn prop_text_reversible(s in any::<String>()) {
        let global = global_dict();
        let mut builder = JbBuilder::new(Some(Arc::clone(&global)));
        builder.write_text(&s).unwrap();
        let bytes = builder.build_feature(None).unwrap();
        let feature = JbFeature::parse_with(&bytes, Some(global)).unwrap();
        prop_assert_eq!(feature.content().read_text().unwrap(), s);
    }

    #[test]
    fn prop_text_utf16_reversible(s in "[a-z:_ ]{0,16}[\\u{1F600}-\\u{1F64F}]{0,4}[A-Za-z: ]{0,16}") {
        let units: Vec<u16> = s.encode_utf16().collect();
        let mut builder = JbBuilder::new(None);
        builder.write_text_utf16(&units).unwrap();
        let local = Arc::new(builder.local_dictionary().clone());
        let mut reader = JbReader::new(builder.as_bytes()).with_local(Some(local));
        prop_assert_eq!(reader.read_text().unwrap(), s);
    }

    #[test]
    fn prop_size_self_description(values in prop::collection::vec(value_strategy(), 1..8)) {
        let mut builder = JbBuilder::new(Some(global_dict()));
        let mut starts = Vec::new();
        for v in &values {
            starts.push(builder.write_value(v).unwrap());
        }
        starts.push(builder.end());

        let mut reader = JbReader::new(builder.as_bytes());
        for window in starts.windows(2) {
            prop_assert_eq!(reader.offset(), window[0]);
            prop_assert_eq!(reader.size().unwrap(), window[1] - window[0]);
            reader.next_unit().unwrap();
        }
        prop_assert!(reader.is_eof());
    }

    #[test]
    fn prop_value_roundtrip(value in value_strategy()) {
        let global = global_dict();
        let mut builder = JbBuilder::new(Some(Arc::clone(&global)));
        builder.write_value(&value).unwrap();
        let bytes = builder.build_feature(Some("p")).unwrap();
        let feature = JbFeature::parse_with(&bytes, Some(global)).unwrap();
        prop_assert_eq!(feature.to_value().unwrap(), value);
    }

    #[test]
    fn prop_seek_matches_next(values in prop::collection::vec(any::<i32>(), 0..64)) {
        let mut builder = JbBuilder::new(None);
        let start = builder.start_array();
        for v in &values {
            builder.write_int32(*v);
        }
        builder.end_array(start).unwrap();

        let mut reader = JbReader::new(builder.as_bytes());
        let mut sequential = reader.clone().read_array().unwrap();
        let mut random = reader.read_array().unwrap();
        prop_assert_eq!(random.length().unwrap(), values.len());

        let mut ok = sequential.first();
        for (k, v) in values.iter().enumerate() {
            prop_assert!(ok);
            prop_assert!(random.seek(k).unwrap());
            prop_assert_eq!(random.value().unwrap().offset(), sequential.value().unwrap().offset());
            prop_assert_eq!(random.value().unwrap().read_int32().unwrap(), *v);
            ok = sequential.next().unwrap();
        }
        prop_assert!(!ok);
        prop_assert!(!random.seek(values.len()).unwrap());
    }

    #[test]
    fn prop_local_dictionary_idempotent(words in prop::collection::vec("[a-z]{3,10}", 1..20)) {
        let mut builder = JbBuilder::new(None);
        for w in &words {
            builder.write_key(w).unwrap();
        }
        let dict = builder.local_dictionary();
        for w in &words {
            let index = dict.index_of(w).unwrap();
            prop_assert_eq!(dict.get(index).unwrap().as_ref(), w.as_str());
        }
    }
}
