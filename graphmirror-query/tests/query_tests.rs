use std::sync::Arc;

use pretty_assertions::assert_eq;

use graphmirror_model::mock::{MockBackend, RecordingSubscription};
use graphmirror_model::{Session, Store};
use graphmirror_query::{filter_query, property_table_query, type_table_query};
use graphmirror_types::{vocab, Value};

fn store() -> Store {
    Store::new(
        Arc::new(MockBackend::new()),
        Arc::new(RecordingSubscription::new()),
        Session::new("ticket-1", "d:user1"),
    )
}

// ── Column-join dialect ──────────────────────────────────────────

#[tokio::test]
async fn numeric_values_compile_to_a_range() {
    let store = store();
    let pattern = store.create();
    pattern
        .set(
            "v-s:count",
            vec![Value::Integer(3), Value::Integer(7), Value::Integer(5)],
        )
        .await
        .unwrap();

    let query = property_table_query(&store, &pattern).unwrap();
    assert_eq!(
        query,
        "SELECT DISTINCT id FROM graph_pt.\"v-s:count\" AS p0 \
         WHERE ( ( p0.int[1] >= 3 AND p0.int[1] <= 7 ) )"
    );
}

#[tokio::test]
async fn string_values_compile_to_wildcard_token_groups() {
    let store = store();
    let pattern = store.create();
    pattern
        .set(
            "v-s:title",
            vec![Value::string("foo bar"), Value::string("baz")],
        )
        .await
        .unwrap();

    let query = property_table_query(&store, &pattern).unwrap();
    assert_eq!(
        query,
        "SELECT DISTINCT id FROM graph_pt.\"v-s:title\" AS p0 \
         WHERE ( ( p0.str[1] LIKE '%baz%' OR p0.str[1] LIKE '%foo% %bar%' ) )"
    );
}

#[tokio::test]
async fn multiple_properties_join_on_id() {
    let store = store();
    let pattern = store.create();
    pattern
        .set("v-s:count", vec![Value::Integer(1)])
        .await
        .unwrap();
    pattern
        .set("v-s:flag", vec![Value::Boolean(true)])
        .await
        .unwrap();

    let query = property_table_query(&store, &pattern).unwrap();
    assert_eq!(
        query,
        "SELECT DISTINCT id FROM graph_pt.\"v-s:count\" AS p0 \
         JOIN graph_pt.\"v-s:flag\" AS p1 ON p0.id = p1.id \
         WHERE ( ( p0.int[1] >= 1 AND p0.int[1] <= 1 ) AND ( p1.int[1] = 1 ) )"
    );
}

#[tokio::test]
async fn datetime_range_widens_to_whole_days() {
    let store = store();
    let pattern = store.create();
    pattern
        .set(
            "v-s:date",
            vec![Value::Datetime(
                "2024-06-15T10:30:00Z".parse().unwrap(),
            )],
        )
        .await
        .unwrap();

    let query = property_table_query(&store, &pattern).unwrap();
    assert!(query.contains("p0.date[1] >= toDateTime(1718409600)"));
    assert!(query.contains("p0.date[1] <= toDateTime(1718495999)"));
}

#[tokio::test]
async fn self_referencing_pattern_terminates() {
    let store = store();
    let pattern = store.create();
    pattern
        .add_value("v-s:parent", Value::reference(pattern.id()))
        .await
        .unwrap();

    // The cyclic branch contributes nothing, leaving an empty pattern.
    assert_eq!(property_table_query(&store, &pattern), None);
}

#[tokio::test]
async fn escape_hatch_is_not_expressible_in_this_dialect() {
    let store = store();
    let pattern = store.create();
    pattern
        .set(
            vocab::WILDCARD,
            vec![Value::string("'rdf:type'=='v-s:Document'")],
        )
        .await
        .unwrap();

    assert_eq!(property_table_query(&store, &pattern), None);
}

// ── Type-scoped dialect ──────────────────────────────────────────

#[tokio::test]
async fn properties_are_mangled_and_scoped_by_type() {
    let store = store();
    let pattern = store.create();
    pattern
        .set(vocab::TYPE, vec![Value::reference("v-s:Document")])
        .await
        .unwrap();
    pattern
        .set("v-s:author", vec![Value::reference("d:u1")])
        .await
        .unwrap();

    let query = type_table_query(&store, &pattern).unwrap();
    assert_eq!(
        query,
        "SELECT DISTINCT id FROM graph_tt.\"v-s:Document\" \
         WHERE ( ( v_s_author_str[1] = 'd:u1' ) )"
    );
}

#[tokio::test]
async fn declared_types_union_all() {
    let store = store();
    let pattern = store.create();
    pattern
        .set(
            vocab::TYPE,
            vec![
                Value::reference("v-s:Document"),
                Value::reference("v-s:Version"),
            ],
        )
        .await
        .unwrap();
    pattern
        .set("v-s:count", vec![Value::Integer(2)])
        .await
        .unwrap();

    let query = type_table_query(&store, &pattern).unwrap();
    assert_eq!(
        query,
        "SELECT DISTINCT id FROM graph_tt.\"v-s:Document\" \
         WHERE ( ( v_s_count_int[1] >= 2 AND v_s_count_int[1] <= 2 ) ) \
         UNION ALL \
         SELECT DISTINCT id FROM graph_tt.\"v-s:Version\" \
         WHERE ( ( v_s_count_int[1] >= 2 AND v_s_count_int[1] <= 2 ) )"
    );
}

#[tokio::test]
async fn unpersisted_references_recurse_as_subqueries() {
    let store = store();
    let author = store.create();
    author
        .set(vocab::TYPE, vec![Value::reference("v-s:Person")])
        .await
        .unwrap();
    author
        .set(vocab::LABEL, vec![Value::string("Alice")])
        .await
        .unwrap();

    let pattern = store.create();
    pattern
        .set(vocab::TYPE, vec![Value::reference("v-s:Document")])
        .await
        .unwrap();
    pattern
        .set("v-s:author", vec![Value::reference(author.id())])
        .await
        .unwrap();

    let query = type_table_query(&store, &pattern).unwrap();
    assert_eq!(
        query,
        "SELECT DISTINCT id FROM graph_tt.\"v-s:Document\" \
         WHERE ( ( v_s_author_str[1] IN ( \
         SELECT DISTINCT id FROM graph_tt.\"v-s:Person\" \
         WHERE ( ( rdfs_label_str[1] LIKE '%Alice%' ) ) ) ) )"
    );
}

#[tokio::test]
async fn untyped_pattern_compiles_to_nothing() {
    let store = store();
    let pattern = store.create();
    pattern
        .set("v-s:count", vec![Value::Integer(1)])
        .await
        .unwrap();
    assert_eq!(type_table_query(&store, &pattern), None);
}

#[tokio::test]
async fn escape_hatch_passes_through() {
    let store = store();
    let pattern = store.create();
    pattern
        .set(
            vocab::WILDCARD,
            vec![Value::string("'rdf:type'=='v-s:Document'")],
        )
        .await
        .unwrap();

    assert_eq!(
        type_table_query(&store, &pattern).unwrap(),
        "'rdf:type'=='v-s:Document'"
    );
    assert_eq!(
        filter_query(&store, &pattern).unwrap(),
        "'rdf:type'=='v-s:Document'"
    );
}

// ── Infix filter dialect ─────────────────────────────────────────

#[tokio::test]
async fn filter_ranges_and_equality() {
    let store = store();
    let pattern = store.create();
    pattern
        .set(
            "v-s:count",
            vec![Value::Integer(3), Value::Integer(7), Value::Integer(5)],
        )
        .await
        .unwrap();

    assert_eq!(
        filter_query(&store, &pattern).unwrap(),
        "( ( 'v-s:count'==[3,7] ) )"
    );
}

#[tokio::test]
async fn filter_tokenizes_strings_per_line() {
    let store = store();
    let pattern = store.create();
    pattern
        .set(
            "v-s:title",
            vec![Value::string("foo bar"), Value::string("baz")],
        )
        .await
        .unwrap();

    assert_eq!(
        filter_query(&store, &pattern).unwrap(),
        "( ( 'v-s:title'=='+baz*' || 'v-s:title'=='+foo* +bar*' ) )"
    );
}

#[tokio::test]
async fn filter_passes_through_explicit_operators() {
    let store = store();
    let pattern = store.create();
    pattern
        .set("v-s:title", vec![Value::string("exact*")])
        .await
        .unwrap();

    assert_eq!(
        filter_query(&store, &pattern).unwrap(),
        "( ( 'v-s:title'=='exact*' ) )"
    );
}

#[tokio::test]
async fn filter_widens_datetimes_to_whole_days() {
    let store = store();
    let pattern = store.create();
    pattern
        .set(
            "v-s:date",
            vec![Value::Datetime(
                "2024-06-15T10:30:00Z".parse().unwrap(),
            )],
        )
        .await
        .unwrap();

    assert_eq!(
        filter_query(&store, &pattern).unwrap(),
        "( ( 'v-s:date'==[2024-06-15T00:00:00.000Z,2024-06-15T23:59:59.999Z] ) )"
    );
}

#[tokio::test]
async fn filter_skips_the_draft_marker() {
    let store = store();
    let pattern = store.create();
    pattern
        .set(vocab::IS_DRAFT, vec![Value::Boolean(true)])
        .await
        .unwrap();
    pattern
        .set("v-s:count", vec![Value::Integer(1)])
        .await
        .unwrap();

    assert_eq!(
        filter_query(&store, &pattern).unwrap(),
        "( ( 'v-s:count'==[1,1] ) )"
    );
}

#[tokio::test]
async fn filter_with_no_constraints_is_none() {
    let store = store();
    let pattern = store.create();
    pattern
        .set(vocab::IS_DRAFT, vec![Value::Boolean(true)])
        .await
        .unwrap();
    assert_eq!(filter_query(&store, &pattern), None);
}
