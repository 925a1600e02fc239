//! Identity map, payload ingestion and request coalescing

mod common;

use common::GatedAdapter;
use morph_model::{AliasNotification, PendingRecord, Resolved};
use morph_store::{FindOptions, Payload, RecordKind, ResourceObject, Store, StoreConfig, StoreError};
use morph_test_utils::{attrs, bookstore_registry, init_tracing, RecordingSink, BOOK, BOOK_EXCERPT};
use pretty_assertions::assert_eq;
use proptest::prelude::*;
use serde_json::json;
use std::sync::Arc;

const SORCERERS_STONE: &str = "isbn:9780439708180";
const CHAMBER_OF_SECRETS: &str = "isbn:9780439064873";
const PRISONER_OF_AZKABAN: &str = "isbn:9780439136365";

fn store_with(adapter: &Arc<GatedAdapter>) -> Store {
    init_tracing();
    Store::builder(bookstore_registry())
        .adapter(Arc::clone(adapter) as Arc<dyn morph_store::Adapter>)
        .build()
}

#[test]
fn push_keeps_one_node_per_identity() {
    let sink = RecordingSink::new();
    let store = Store::builder(bookstore_registry())
        .sink(Arc::clone(&sink) as Arc<dyn morph_model::NotificationSink>)
        .build();

    let first = store.push(BOOK, SORCERERS_STONE, attrs(json!({"name": "Harry Potter"})));
    assert!(sink.is_empty());

    let second = store.push(
        BOOK,
        SORCERERS_STONE,
        attrs(json!({"name": "Harry Potter and the Sorcerer's Stone"})),
    );

    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(first.get("title").as_str(), Some("Harry Potter and the Sorcerer's Stone"));
    assert_eq!(sink.keys_for(&first), vec!["name", "title"]);
    assert_eq!(store.len(), 1);
}

#[test]
fn payload_references_resolve_through_the_store() {
    let store = Store::new(bookstore_registry());
    let payload = Payload::from_json_str(&format!(
        r#"{{
            "data": {{"id": "{SORCERERS_STONE}", "type": "{BOOK}", "attributes": {{
                "name": "Harry Potter",
                "followedBy": "{CHAMBER_OF_SECRETS}",
                "author": "urn:author:3"
            }}}},
            "included": [
                {{"id": "{CHAMBER_OF_SECRETS}", "type": "{BOOK}", "attributes": {{"name": "Chamber of Secrets"}}}},
                {{"id": "3", "type": "author", "attributes": {{"name": "JK Rowling"}}}}
            ]
        }}"#
    ))
    .unwrap();

    let primary = store.push_payload(payload);

    assert_eq!(primary.len(), 1);
    let book = &primary[0];
    assert!(Arc::ptr_eq(
        book.get("followedBy").as_record().unwrap(),
        &store.peek_record(BOOK, CHAMBER_OF_SECRETS).unwrap()
    ));
    assert_eq!(book.get_path("author.name").as_str(), Some("JK Rowling"));
}

#[test]
fn missing_references_resolve_once_pushed() {
    let store = Store::new(bookstore_registry());
    let book = store.push(BOOK, SORCERERS_STONE, attrs(json!({"followedBy": CHAMBER_OF_SECRETS})));

    assert!(book.get("followedBy").is_absent());
    assert!(!book.is_materialized("followedBy"));

    let chamber = store.push(BOOK, CHAMBER_OF_SECRETS, attrs(json!({"name": "Chamber of Secrets"})));
    assert!(Arc::ptr_eq(book.get("followedBy").as_record().unwrap(), &chamber));
}

#[test]
fn reference_arrays_follow_the_identity_map() {
    let store = Store::new(bookstore_registry());
    store.push(BOOK, CHAMBER_OF_SECRETS, attrs(json!({"name": "Chamber of Secrets"})));
    store.push(BOOK, PRISONER_OF_AZKABAN, attrs(json!({"name": "Prisoner of Azkaban"})));
    let book = store.push(
        BOOK,
        SORCERERS_STONE,
        attrs(json!({"otherBooksInSeries": [CHAMBER_OF_SECRETS]})),
    );

    let series = book.get("otherBooksInSeries");
    let series = series.as_references().unwrap().clone();
    assert_eq!(series.ids(), vec![CHAMBER_OF_SECRETS.to_string()]);

    store.push(
        BOOK,
        SORCERERS_STONE,
        attrs(json!({"otherBooksInSeries": [CHAMBER_OF_SECRETS, PRISONER_OF_AZKABAN]})),
    );

    assert!(series.ptr_eq(book.get("otherBooksInSeries").as_references().unwrap()));
    assert_eq!(
        series.ids(),
        vec![CHAMBER_OF_SECRETS.to_string(), PRISONER_OF_AZKABAN.to_string()]
    );
}

#[test]
fn reference_arrays_pick_up_records_pushed_later() {
    let store = Store::new(bookstore_registry());
    let book = store.push(
        BOOK,
        SORCERERS_STONE,
        attrs(json!({"otherBooksInSeries": [CHAMBER_OF_SECRETS]})),
    );

    let series = book.get("otherBooksInSeries").as_references().unwrap().clone();
    assert!(series.is_empty());
    assert!(!series.is_settled());

    store.push(BOOK, CHAMBER_OF_SECRETS, attrs(json!({"name": "Chamber of Secrets"})));

    let reread = book.get("otherBooksInSeries");
    assert!(series.ptr_eq(reread.as_references().unwrap()));
    assert_eq!(series.ids(), vec![CHAMBER_OF_SECRETS.to_string()]);
    assert!(series.is_settled());
}

#[test]
fn peek_all_is_a_snapshot_in_push_order() {
    let store = Store::new(bookstore_registry());
    store.push(BOOK, PRISONER_OF_AZKABAN, attrs(json!({})));
    store.push("author", "3", attrs(json!({})));
    store.push(BOOK, SORCERERS_STONE, attrs(json!({})));

    let snapshot = store.peek_all(BOOK);
    store.push(BOOK, CHAMBER_OF_SECRETS, attrs(json!({})));

    let ids: Vec<_> = snapshot.iter().filter_map(|node| node.id()).collect();
    assert_eq!(ids, vec![PRISONER_OF_AZKABAN, SORCERERS_STONE]);
    assert_eq!(store.peek_all(BOOK).len(), 3);
    assert_eq!(store.peek_all("author").len(), 1);
}

#[test]
fn unloaded_records_are_recreated_on_push() {
    let store = Store::new(bookstore_registry());
    let old = store.push(BOOK, SORCERERS_STONE, attrs(json!({"name": "Harry Potter"})));

    let unloaded = store.unload_record(BOOK, SORCERERS_STONE).unwrap();
    assert!(Arc::ptr_eq(&old, &unloaded));
    assert!(!store.has_record(BOOK, SORCERERS_STONE));
    assert!(store.unload_record(BOOK, SORCERERS_STONE).is_none());

    let new = store.push(BOOK, SORCERERS_STONE, attrs(json!({"name": "Harry Potter"})));
    assert!(!Arc::ptr_eq(&old, &new));
    assert_eq!(old.get("name").as_str(), Some("Harry Potter"));
}

#[test]
fn set_attribute_notifies_through_the_store_sink() {
    let sink = RecordingSink::new();
    let store = Store::builder(bookstore_registry())
        .sink(Arc::clone(&sink) as Arc<dyn morph_model::NotificationSink>)
        .build();
    let book = store.push(BOOK, SORCERERS_STONE, attrs(json!({"name": "Harry Potter"})));

    let err = store
        .set_attribute(BOOK, SORCERERS_STONE, "title", json!("Harry Potter 2"))
        .unwrap_err();
    assert_eq!(
        err.to_string(),
        format!(
            "model error: You tried to set 'title' to 'Harry Potter 2', but 'title' is an alias in '{BOOK}' and aliases are read-only"
        )
    );
    assert!(sink.is_empty());

    store
        .set_attribute(BOOK, SORCERERS_STONE, "name", json!("Harry Potter 2"))
        .unwrap();
    assert_eq!(sink.keys_for(&book), vec!["name", "title"]);
}

#[test]
fn toml_configuration_reaches_records() {
    let config = StoreConfig::from_toml_str(
        r#"
        [model]
        alias_notification = "when_read"
        "#,
    )
    .unwrap();
    assert_eq!(config.model.alias_notification, AliasNotification::WhenRead);

    let sink = RecordingSink::new();
    let store = Store::builder(bookstore_registry())
        .sink(Arc::clone(&sink) as Arc<dyn morph_model::NotificationSink>)
        .config(config)
        .build();
    let book = store.push(BOOK, SORCERERS_STONE, attrs(json!({"name": "Harry Potter"})));

    store.push(BOOK, SORCERERS_STONE, attrs(json!({"name": "Harry Potter 2"})));
    assert_eq!(sink.keys_for(&book), vec!["name"]);

    sink.clear();
    let _ = book.get("title");
    store.push(BOOK, SORCERERS_STONE, attrs(json!({"name": "Harry Potter 3"})));
    assert_eq!(sink.keys_for(&book), vec!["name", "title"]);
}

#[tokio::test]
async fn concurrent_finds_share_one_fetch() {
    let adapter = GatedAdapter::closed();
    adapter.respond(BOOK, SORCERERS_STONE, attrs(json!({"name": "Harry Potter"})));
    let store = store_with(&adapter);
    let chamber = store.push(BOOK, CHAMBER_OF_SECRETS, attrs(json!({"precededBy": SORCERERS_STONE})));

    let observe = async {
        adapter.wait_for_calls(1).await;
        let pending = chamber.get("precededBy");
        adapter.open(1);
        pending
    };
    let (first, second, pending) = tokio::join!(
        store.find_record(BOOK, SORCERERS_STONE),
        store.find_record(BOOK, SORCERERS_STONE),
        observe
    );

    let first = first.unwrap();
    assert!(Arc::ptr_eq(&first, &second.unwrap()));
    assert_eq!(adapter.calls(), 1);
    assert_eq!(pending, Resolved::Pending(PendingRecord::new(BOOK, SORCERERS_STONE)));
    assert!(Arc::ptr_eq(chamber.get("precededBy").as_record().unwrap(), &first));
}

#[tokio::test]
async fn projection_and_base_requests_do_not_coalesce() {
    let adapter = GatedAdapter::closed();
    let store = store_with(&adapter);

    let open = async {
        adapter.wait_for_calls(2).await;
        adapter.open(2);
    };
    let (book, excerpt, ()) = tokio::join!(
        store.find_record(BOOK, SORCERERS_STONE),
        store.find_record(BOOK_EXCERPT, SORCERERS_STONE),
        open
    );

    let (book, excerpt) = (book.unwrap(), excerpt.unwrap());
    assert!(!Arc::ptr_eq(&book, &excerpt));
    assert!(excerpt.is_projection());
    assert!(Arc::ptr_eq(excerpt.base().unwrap(), &book));

    let mut kinds: Vec<_> = adapter.requests().into_iter().map(|r| r.kind).collect();
    kinds.sort_by_key(|kind| *kind == RecordKind::Projection);
    assert_eq!(kinds, vec![RecordKind::Model, RecordKind::Projection]);
}

#[tokio::test]
async fn coalescing_can_be_disabled() {
    let adapter = GatedAdapter::closed();
    init_tracing();
    let store = Store::builder(bookstore_registry())
        .adapter(Arc::clone(&adapter) as Arc<dyn morph_store::Adapter>)
        .config(StoreConfig::new().with_coalesce_requests(false))
        .build();

    let open = async {
        adapter.wait_for_calls(2).await;
        adapter.open(2);
    };
    let (first, second, ()) = tokio::join!(
        store.find_record(BOOK, SORCERERS_STONE),
        store.find_record(BOOK, SORCERERS_STONE),
        open
    );

    assert_eq!(adapter.calls(), 2);
    assert!(Arc::ptr_eq(&first.unwrap(), &second.unwrap()));
}

#[tokio::test]
async fn waiters_share_a_failed_fetch() {
    let adapter = GatedAdapter::closed();
    adapter.fail_with("connection reset");
    let store = store_with(&adapter);

    let open = async {
        adapter.wait_for_calls(1).await;
        adapter.open(1);
    };
    let (first, second, ()) = tokio::join!(
        store.find_record(BOOK, SORCERERS_STONE),
        store.find_record(BOOK, SORCERERS_STONE),
        open
    );

    let expected = StoreError::adapter(BOOK, SORCERERS_STONE, "connection reset");
    assert_eq!(first.unwrap_err(), expected);
    assert_eq!(second.unwrap_err(), expected);
    assert!(expected.is_retryable());
    assert_eq!(adapter.calls(), 1);
}

#[tokio::test]
async fn resolve_pending_joins_the_fetch_in_flight() {
    let adapter = GatedAdapter::closed();
    adapter.respond(BOOK, SORCERERS_STONE, attrs(json!({"name": "Harry Potter"})));
    let store = store_with(&adapter);
    let chamber = store.push(BOOK, CHAMBER_OF_SECRETS, attrs(json!({"precededBy": SORCERERS_STONE})));

    let follow = async {
        adapter.wait_for_calls(1).await;
        let Resolved::Pending(pending) = chamber.get("precededBy") else {
            panic!("expected a pending reference");
        };
        adapter.open(1);
        store.resolve_pending(&pending).await
    };
    let (found, resolved) = tokio::join!(store.find_record(BOOK, SORCERERS_STONE), follow);

    assert!(Arc::ptr_eq(&found.unwrap(), &resolved.unwrap()));
    assert_eq!(adapter.calls(), 1);
}

#[tokio::test]
async fn reload_refreshes_loaded_records() {
    let adapter = GatedAdapter::open_gate();
    let store = store_with(&adapter);
    let book = store.push(BOOK, SORCERERS_STONE, attrs(json!({"name": "Harry Potter"})));

    let found = store.find_record(BOOK, SORCERERS_STONE).await.unwrap();
    assert!(Arc::ptr_eq(&book, &found));
    assert_eq!(adapter.calls(), 0);

    adapter.respond(BOOK, SORCERERS_STONE, attrs(json!({"name": "Harry Potter", "pubDate": "1998"})));
    store
        .find_record_with(BOOK, SORCERERS_STONE, FindOptions::reload())
        .await
        .unwrap();

    assert_eq!(adapter.calls(), 1);
    assert!(adapter.requests()[0].reload);
    assert!(!book.get("pubDate").is_absent());
}

#[tokio::test]
async fn fetched_payloads_carry_their_included_records() {
    init_tracing();
    let store = Store::builder(bookstore_registry())
        .adapter(Arc::new(IncludingAdapter))
        .build();

    let book = store.find_record(BOOK, SORCERERS_STONE).await.unwrap();

    assert!(store.has_record("author", "3"));
    assert_eq!(book.get_path("author.name").as_str(), Some("JK Rowling"));
}

struct IncludingAdapter;

#[async_trait::async_trait]
impl morph_store::Adapter for IncludingAdapter {
    async fn find_record(
        &self,
        request: morph_store::FindRequest,
    ) -> Result<Payload, morph_store::AdapterError> {
        Ok(Payload::single(ResourceObject::new(
            request.model_name,
            request.id,
            attrs(json!({"author": "urn:author:3"})),
        ))
        .with_included(vec![ResourceObject::new(
            "author",
            "3",
            attrs(json!({"name": "JK Rowling"})),
        )]))
    }
}

proptest! {
    #[test]
    fn peek_all_lists_each_identity_once_in_first_push_order(ids in proptest::collection::vec(0u8..6, 0..20)) {
        let store = Store::new(bookstore_registry());
        let mut expected: Vec<String> = Vec::new();
        for id in &ids {
            let id = id.to_string();
            store.push(BOOK, &id, attrs(json!({"name": id.clone()})));
            if !expected.contains(&id) {
                expected.push(id);
            }
        }

        let listed: Vec<String> = store
            .peek_all(BOOK)
            .iter()
            .filter_map(|node| node.id().map(str::to_string))
            .collect();
        prop_assert_eq!(listed, expected);
    }
}
