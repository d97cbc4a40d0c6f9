use pretty_assertions::assert_eq;
use serde_json::json;

use graphmirror_types::{decode_entity, encode_entity, gen_id, Error, WireEntity, WireValue};

// ── Wire shape ───────────────────────────────────────────────────

#[test]
fn entity_serializes_to_flat_object() {
    let entity = WireEntity::new("d:doc1")
        .set(
            "rdf:type",
            vec![WireValue::Uri {
                data: "v-s:Document".to_string(),
            }],
        )
        .set(
            "rdfs:label",
            vec![WireValue::String {
                data: "Hello".to_string(),
                lang: Some("EN".to_string()),
            }],
        );

    let actual = serde_json::to_value(&entity).unwrap();
    let expected = json!({
        "@": "d:doc1",
        "rdf:type": [{"type": "Uri", "data": "v-s:Document"}],
        "rdfs:label": [{"type": "String", "data": "Hello", "lang": "EN"}],
    });
    assert_eq!(actual, expected);
}

#[test]
fn lang_is_omitted_when_absent() {
    let value = WireValue::String {
        data: "x".to_string(),
        lang: None,
    };
    let actual = serde_json::to_value(&value).unwrap();
    assert_eq!(actual, json!({"type": "String", "data": "x"}));
}

#[test]
fn entity_deserializes_from_wire_json() {
    let wire = json!({
        "@": "d:doc1",
        "v-s:count": [{"type": "Integer", "data": 5}],
        "v-s:deleted": [{"type": "Boolean", "data": true}],
    });
    let entity: WireEntity = serde_json::from_value(wire).unwrap();
    assert_eq!(entity.id, "d:doc1");
    assert_eq!(
        entity.props["v-s:count"],
        vec![WireValue::Integer { data: 5 }]
    );
    assert_eq!(
        entity.props["v-s:deleted"],
        vec![WireValue::Boolean { data: true }]
    );
}

#[test]
fn entity_round_trips_through_json() {
    let entity = WireEntity::new("d:doc2").set(
        "v-s:score",
        vec![WireValue::Decimal { data: 0.5 }],
    );
    let text = serde_json::to_string(&entity).unwrap();
    let back: WireEntity = serde_json::from_str(&text).unwrap();
    assert_eq!(back, entity);
}

#[test]
fn decode_reports_unknown_kinds_distinctly() {
    let wire = r#"{"@": "d:doc1", "v-s:x": [{"type": "Blob", "data": "zz"}]}"#;
    assert!(matches!(decode_entity(wire), Err(Error::UnknownKind(_))));
}

#[test]
fn decode_reports_malformed_json_as_serialization_error() {
    assert!(matches!(
        decode_entity("{not json"),
        Err(Error::Serialization(_))
    ));
}

#[test]
fn encode_decode_round_trip() {
    let entity = WireEntity::new("d:doc5").set(
        "v-s:count",
        vec![WireValue::Integer { data: 3 }],
    );
    let text = encode_entity(&entity).unwrap();
    assert_eq!(decode_entity(&text).unwrap(), entity);
}

// ── Builder ──────────────────────────────────────────────────────

#[test]
fn set_drops_empty_value_lists() {
    let entity = WireEntity::new("d:doc3").set("v-s:title", vec![]);
    assert!(!entity.has("v-s:title"));
    assert!(entity.props.is_empty());
}

#[test]
fn has_reports_populated_properties() {
    let entity = WireEntity::new("d:doc4").set(
        "v-s:title",
        vec![WireValue::String {
            data: "t".to_string(),
            lang: None,
        }],
    );
    assert!(entity.has("v-s:title"));
    assert!(!entity.has("v-s:missing"));
}

// ── Id generation ────────────────────────────────────────────────

#[test]
fn gen_id_uses_data_prefix() {
    let id = gen_id();
    assert!(id.starts_with("d:"));
    assert!(id.len() > 2);
}

#[test]
fn gen_id_is_unique() {
    let a = gen_id();
    let b = gen_id();
    assert_ne!(a, b);
}
