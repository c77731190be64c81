use dynaview::state_store::{set_path, StateError};
use dynaview::{StateStore, Value};
use pretty_assertions::assert_eq;
use serde_json::json;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[ctor::ctor]
fn init_tests() {
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(EnvFilter::from_default_env())
        .finish();
    tracing::subscriber::set_global_default(subscriber).expect("Failed to set tracing subscriber");
}

fn store(initial: serde_json::Value) -> StateStore {
    StateStore::new(Value::from(initial))
}

fn snapshot(store: &StateStore) -> serde_json::Value {
    serde_json::Value::from(store.get_all())
}

#[test]
fn test_structural_sharing() {
    let store = store(json!({"a": {"b": {"c": 1}, "d": {}}}));
    let before = store.get_all();

    assert!(store.set("a.b.c", 2.0));
    let after = store.get_all();

    assert_eq!(after.get("a").get("b").get("c"), Value::from(2.0));
    assert!(!after.get("a").get("b").ptr_eq(&before.get("a").get("b")));
    assert!(after.get("a").get("d").ptr_eq(&before.get("a").get("d")));
}

#[test]
fn test_get_never_fails() {
    let store = store(json!({"list": [10, 20], "name": "x"}));
    assert_eq!(store.get("list.1"), Value::from(20.0));
    assert_eq!(store.get("list.5"), Value::Undefined);
    assert_eq!(store.get("name.first"), Value::Undefined);
    assert_eq!(store.get("nothing.here"), Value::Undefined);
}

#[test]
fn test_unfollowable_set_is_a_noop() {
    let store = store(json!({"list": [1], "name": "x"}));
    let before = store.get_all();

    assert!(!store.set("missing.child", 1.0));
    assert!(!store.set("list.key", 1.0));
    assert!(!store.set("name.first", 1.0));
    assert!(!store.set("list.3", 1.0));

    assert!(store.get_all().ptr_eq(&before));
}

#[test]
fn test_set_array_elements() {
    let store = store(json!({"list": [1, 2]}));
    assert!(store.set("list.0", "first"));
    assert!(store.set("list.2", "appended"));
    assert_eq!(snapshot(&store), json!({"list": ["first", 2, "appended"]}));
}

#[test]
fn test_merge_and_reset() {
    let store = store(json!({"a": 1, "b": {"c": 2}}));
    store.merge(&Value::from(json!({"b": 3, "d": 4})));
    assert_eq!(snapshot(&store), json!({"a": 1, "b": 3, "d": 4}));

    store.merge(&Value::from("not a record"));
    assert_eq!(snapshot(&store), json!({"a": 1, "b": 3, "d": 4}));

    store.reset(Some(Value::from(json!({"fresh": true}))));
    assert_eq!(snapshot(&store), json!({"fresh": true}));
    store.reset(None);
    assert_eq!(snapshot(&store), json!({}));
}

#[test]
fn test_set_path_reports_reason() {
    let root = Value::from(json!({"list": []}));
    assert_eq!(set_path(&root, "", Value::Null), Err(StateError::EmptyKey));
    assert!(matches!(
        set_path(&root, "list.name", Value::Null),
        Err(StateError::KeyIntoArray { .. })
    ));
}

#[tokio::test]
async fn test_subscribers_see_new_roots() {
    let store = store(json!({"count": 0}));
    let mut receiver = store.subscribe();

    store.set("count", 1.0);
    receiver.changed().await.unwrap();
    assert_eq!(receiver.borrow_and_update().get("count"), Value::from(1.0));

    store.set("a.b", 1.0);
    assert!(!receiver.has_changed().unwrap());
}
