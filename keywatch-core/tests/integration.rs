//! Integration Tests for Keypath Observation
//!
//! These tests verify that models, observers, computed properties and
//! observable arrays work together correctly.

use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::{Arc, Barrier, Mutex};
use std::thread;

use keywatch_core::{Change, Model, ModelConfig, ObserveError, Value};
use serde_json::json;

/// Count the notifications delivered for `path`.
fn count_changes(model: &Model, path: &str) -> Arc<AtomicI32> {
    let count = Arc::new(AtomicI32::new(0));
    let count_clone = count.clone();
    model
        .watch_path(path, move |_| {
            count_clone.fetch_add(1, Ordering::SeqCst);
            Ok(())
        })
        .unwrap();
    count
}

/// Record every change delivered for `path`.
fn record_changes(model: &Model, path: &str) -> Arc<Mutex<Vec<Change>>> {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let seen_clone = seen.clone();
    model
        .watch_path(path, move |change| {
            seen_clone.lock().unwrap().push(change.clone());
            Ok(())
        })
        .unwrap();
    seen
}

fn sum(values: &[Option<Value>]) -> Value {
    let total: i64 = values
        .iter()
        .map(|value| value.as_ref().and_then(Value::as_i64).unwrap_or(0))
        .sum();
    Value::from(total)
}

/// Test that writing the same value twice notifies once.
#[test]
fn repeated_set_notifies_once() {
    let model = Model::new();
    let count = count_changes(&model, "foo");

    model.set("foo", "bar").unwrap();
    model.set("foo", "bar").unwrap();

    assert_eq!(count.load(Ordering::SeqCst), 1);
}

/// Test that a nested write notifies watchers of the parent.
#[test]
fn nested_set_notifies_ancestor() {
    let model = Model::new();
    model.set("foo.bar", "baz").unwrap();
    let seen = record_changes(&model, "foo");

    model.set("foo.bar", "rab").unwrap();

    let seen = seen.lock().unwrap();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].path, "foo");
    assert_eq!(seen[0].value(), Some(&Value::from(json!({ "bar": "rab" }))));
    assert_eq!(seen[0].previous(), Some(&Value::from(json!({ "bar": "baz" }))));
}

/// Test that a nested write notifies the leaf and the parent exactly once each.
#[test]
fn nested_set_notifies_leaf_and_parent_once() {
    let model = Model::new();
    model.set("foo.bar", "baz").unwrap();
    let foo = count_changes(&model, "foo");
    let bar = count_changes(&model, "foo.bar");

    model.set("foo.bar", "zab").unwrap();

    assert_eq!(foo.load(Ordering::SeqCst), 1);
    assert_eq!(bar.load(Ordering::SeqCst), 1);
}

/// Test that rewriting a nested value with an equal one notifies nobody.
#[test]
fn unchanged_nested_set_is_silent() {
    let model = Model::from_json(json!({ "foo": { "bar": "zab" } })).unwrap();
    let foo = count_changes(&model, "foo");
    let bar = count_changes(&model, "foo.bar");

    assert!(!model.set("foo.bar", "zab").unwrap());
    assert!(!model.set("foo", Value::from(json!({ "bar": "zab" }))).unwrap());

    assert_eq!(foo.load(Ordering::SeqCst), 0);
    assert_eq!(bar.load(Ordering::SeqCst), 0);
}

/// Test that observers can watch paths that do not exist yet.
#[test]
fn watching_missing_path_fires_when_created() {
    let model = Model::new();
    let seen = record_changes(&model, "a.b.c");

    model.set("a", Value::from(json!({ "b": { "c": 1 } }))).unwrap();

    let seen = seen.lock().unwrap();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].value(), Some(&Value::from(1)));
    assert_eq!(seen[0].previous(), None);
}

/// Test that a computed property is recomputed and notifies once.
#[test]
fn computed_property_updates_with_dependencies() {
    let model = Model::from_json(json!({ "one": 1, "two": 2 })).unwrap();
    model.computed("three", &["one", "two"], sum).unwrap();
    assert_eq!(model.get("three").unwrap(), Some(Value::from(3)));

    let seen = record_changes(&model, "three");
    model.set("one", 2).unwrap();

    assert_eq!(model.get("three").unwrap(), Some(Value::from(4)));
    let seen = seen.lock().unwrap();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].value(), Some(&Value::from(4)));
}

/// Test that computed properties can be chained.
#[test]
fn chained_computed_properties() {
    let model = Model::from_json(json!({ "price": 10, "quantity": 2 })).unwrap();
    model
        .computed("subtotal", &["price", "quantity"], |values| {
            let price = values[0].as_ref().and_then(Value::as_i64).unwrap_or(0);
            let quantity = values[1].as_ref().and_then(Value::as_i64).unwrap_or(0);
            Value::from(price * quantity)
        })
        .unwrap();
    model
        .computed("total", &["subtotal", "shipping"], sum)
        .unwrap();
    assert_eq!(model.get("total").unwrap(), Some(Value::from(20)));

    model.set("quantity", 3).unwrap();
    assert_eq!(model.get("total").unwrap(), Some(Value::from(30)));

    model.set("shipping", 5).unwrap();
    assert_eq!(model.get("total").unwrap(), Some(Value::from(35)));

    assert_eq!(model.computed_properties(), ["subtotal", "total"]);
}

/// Test that a computed property may depend on a nested path.
#[test]
fn computed_property_over_nested_path() {
    let model = Model::from_json(json!({ "user": { "first": "Ada", "last": "Lovelace" } })).unwrap();
    model
        .computed("display", &["user.first", "user.last"], |values| {
            let parts: Vec<&str> = values
                .iter()
                .filter_map(|value| value.as_ref().and_then(Value::as_str))
                .collect();
            Value::from(parts.join(" "))
        })
        .unwrap();

    model.set("user", Value::from(json!({ "first": "Grace", "last": "Hopper" }))).unwrap();
    assert_eq!(model.get("display").unwrap(), Some(Value::from("Grace Hopper")));
}

/// Test that a computed binding whose first write is rejected can be bound again.
#[test]
fn rejected_computed_binding_is_rolled_back() {
    let model = Model::from_json(json!({ "a": 1 })).unwrap();
    let rejecting = model
        .watch_path("total", |_| Err(ObserveError::callback("no")))
        .unwrap();

    let err = model.computed("total", &["a"], sum).unwrap_err();
    assert!(matches!(err, ObserveError::Callback(ref message) if message == "no"));
    assert!(model.computed_properties().is_empty());

    rejecting.unsubscribe();
    model.computed("total", &["a"], sum).unwrap();
    model.set("a", 5).unwrap();
    assert_eq!(model.get("total").unwrap(), Some(Value::from(5)));
}

/// Test that threads recomputing the same property do not see each other as a cycle.
#[test]
fn concurrent_sets_recompute_independently() {
    let model = Model::from_json(json!({ "a": 0 })).unwrap();
    let inside = Arc::new(Barrier::new(2));
    let release = Arc::new(Barrier::new(2));

    let (inside_clone, release_clone) = (inside.clone(), release.clone());
    model
        .computed("b", &["a"], move |values| {
            let a = values[0].as_ref().and_then(Value::as_i64).unwrap_or(0);
            if a == 1 {
                inside_clone.wait();
                release_clone.wait();
            }
            Value::from(a * 10)
        })
        .unwrap();

    let writer = model.clone();
    let handle = thread::spawn(move || writer.set("a", 1).map(|_| ()));

    // The other thread is now recomputing `b`.
    inside.wait();
    let result = model.set("a", 2);
    release.wait();

    assert!(result.is_ok(), "{:?}", result);
    assert!(handle.join().unwrap().is_ok());
}

/// Test that cyclic computed properties are rejected.
#[test]
fn cyclic_computed_properties_are_rejected() {
    let model = Model::new();
    model.computed("b", &["a"], sum).unwrap();
    model.computed("c", &["b"], sum).unwrap();

    let err = model.computed("a", &["c"], sum).unwrap_err();
    assert!(matches!(err, ObserveError::CyclicDependency { .. }));
}

/// Test that unsubscribing stops further notifications.
#[test]
fn unsubscribe_stops_notifications() {
    let model = Model::new();
    let count = Arc::new(AtomicI32::new(0));
    let count_clone = count.clone();
    let subscription = model
        .watch_path("foo", move |_| {
            count_clone.fetch_add(1, Ordering::SeqCst);
            Ok(())
        })
        .unwrap();

    model.set("foo", 1).unwrap();
    subscription.unsubscribe();
    assert!(!subscription.is_active());
    model.set("foo", 2).unwrap();

    assert_eq!(count.load(Ordering::SeqCst), 1);
    // A second unsubscribe is harmless.
    subscription.unsubscribe();
}

/// Test that in-place array edits are reported as mutation changes.
#[test]
fn array_mutations_are_reported() {
    let model = Model::from_json(json!({ "items": [3, 1, 2] })).unwrap();
    let seen = record_changes(&model, "items");

    let items = model.get("items").unwrap().unwrap();
    let array = items.as_array().unwrap();

    assert_eq!(array.pop().unwrap(), Some(Value::from(2)));
    array.push(Value::from(5)).unwrap();
    array.sort().unwrap();

    let seen = seen.lock().unwrap();
    let kinds: Vec<_> = seen.iter().map(Change::kind_name).collect();
    assert_eq!(kinds, ["remove", "add", "sort"]);
    assert_eq!(seen[0].items(), [Value::from(2)]);
    assert_eq!(seen[1].items(), [Value::from(5)]);
    assert!(seen.iter().all(Change::is_mutation));

    assert_eq!(model.to_json(), json!({ "items": [1, 3, 5] }));
}

/// Test that a replaced array no longer reports edits.
#[test]
fn replaced_array_goes_quiet() {
    let model = Model::from_json(json!({ "items": [1] })).unwrap();
    model.observer("items").unwrap();
    let old = model.get("items").unwrap().unwrap();

    model.set("items", Value::from(json!([1, 2]))).unwrap();
    let seen = record_changes(&model, "items");

    old.as_array().unwrap().push(Value::from(9)).unwrap();
    assert!(seen.lock().unwrap().is_empty());

    let current = model.get("items").unwrap().unwrap();
    current.as_array().unwrap().push(Value::from(3)).unwrap();
    assert_eq!(seen.lock().unwrap().len(), 1);
}

/// Test that array events arrive after the edit and match the array length.
#[test]
fn array_events_report_elements_and_length() {
    let model = Model::from_json(json!({ "popped": [1, 2, 3], "pushed": [1, 2, 3] })).unwrap();

    let lengths = Arc::new(Mutex::new(Vec::new()));
    for path in ["popped", "pushed"] {
        let lengths = lengths.clone();
        let reader = model.clone();
        model
            .watch_path(path, move |change| {
                let len = reader
                    .get(&change.path)?
                    .and_then(|value| value.as_array().map(|array| array.len()));
                lengths
                    .lock()
                    .unwrap()
                    .push((change.kind_name(), change.items().to_vec(), len));
                Ok(())
            })
            .unwrap();
    }

    let popped = model.get("popped").unwrap().unwrap();
    assert_eq!(popped.as_array().unwrap().pop().unwrap(), Some(Value::from(3)));
    let pushed = model.get("pushed").unwrap().unwrap();
    pushed.as_array().unwrap().push(Value::from("x")).unwrap();

    assert_eq!(
        *lengths.lock().unwrap(),
        vec![
            ("remove", vec![Value::from(3)], Some(2)),
            ("add", vec![Value::from("x")], Some(4)),
        ]
    );
    assert_eq!(model.get("popped").unwrap().unwrap().as_array().unwrap().len(), 2);
    assert_eq!(model.get("pushed").unwrap().unwrap().as_array().unwrap().len(), 4);
}

/// Test that a failed write through an array leaves no observer behind.
#[test]
fn failed_write_through_array_creates_no_observer() {
    let model = Model::from_json(json!({ "list": [{ "x": 1 }] })).unwrap();
    let before = model.observed_paths();

    assert!(matches!(
        model.set("list.0.x", 2),
        Err(ObserveError::ArrayTraversal { .. })
    ));
    assert_eq!(model.observed_paths(), before);
}

/// Test that a multi-path subscription fires once per logical update.
#[test]
fn multi_path_subscription_fires_once_per_set() {
    let model = Model::from_json(json!({ "foo": { "bar": 1 } })).unwrap();
    let count = Arc::new(AtomicI32::new(0));
    let count_clone = count.clone();
    model
        .watch_paths(&["foo", "foo.bar"], move |_| {
            count_clone.fetch_add(1, Ordering::SeqCst);
            Ok(())
        })
        .unwrap();

    model.set("foo.bar", 2).unwrap();
    assert_eq!(count.load(Ordering::SeqCst), 1);

    model.set("foo", Value::from(json!({ "bar": 3 }))).unwrap();
    assert_eq!(count.load(Ordering::SeqCst), 2);
}

/// Test that unsubscribing a multi-path subscription detaches every path.
#[test]
fn multi_path_unsubscribe_detaches_all() {
    let model = Model::new();
    let count = Arc::new(AtomicI32::new(0));
    let count_clone = count.clone();
    let subscription = model
        .watch_paths(&["one", "two"], move |_| {
            count_clone.fetch_add(1, Ordering::SeqCst);
            Ok(())
        })
        .unwrap();

    model.set("one", 1).unwrap();
    model.set("two", 2).unwrap();
    assert_eq!(count.load(Ordering::SeqCst), 2);

    subscription.unsubscribe();
    model.set("one", 3).unwrap();
    model.set("two", 4).unwrap();
    assert_eq!(count.load(Ordering::SeqCst), 2);
    assert_eq!(model.observer("one").unwrap().subscriber_count(), 0);
}

/// Test that the model-wide stream sees every effective set.
#[test]
fn watch_all_sees_every_effective_set() {
    let model = Model::new();
    let seen = Arc::new(Mutex::new(Vec::new()));
    let seen_clone = seen.clone();
    let _subscription = model.watch_all(move |change| {
        seen_clone.lock().unwrap().push((
            change.path.clone(),
            change.value().cloned(),
            change.previous().cloned(),
        ));
        Ok(())
    });

    model.set("a.b", 1).unwrap();
    model.set("a.b", 1).unwrap();
    model.set("a.b", 2).unwrap();

    let seen = seen.lock().unwrap();
    assert_eq!(
        *seen,
        vec![
            ("a.b".to_string(), Some(Value::from(1)), None),
            ("a.b".to_string(), Some(Value::from(2)), Some(Value::from(1))),
        ]
    );
}

/// Test that initial properties override defaults.
#[test]
fn defaults_are_overridden_by_initial_properties() {
    let model = Model::with_defaults(
        json!({ "theme": "light", "size": 12 }),
        json!({ "size": 14 }),
    )
    .unwrap();

    assert_eq!(model.get("theme").unwrap(), Some(Value::from("light")));
    assert_eq!(model.get("size").unwrap(), Some(Value::from(14)));
}

/// Test that `set_many` counts effective writes.
#[test]
fn set_many_counts_changes() {
    let model = Model::from_json(json!({ "a": 1 })).unwrap();
    let changed = model
        .set_many([("a", Value::from(1)), ("b", Value::from(2)), ("c.d", Value::from(3))])
        .unwrap();
    assert_eq!(changed, 2);
    assert_eq!(model.to_json(), json!({ "a": 1, "b": 2, "c": { "d": 3 } }));
}

/// Test that a subscriber may write back into the model.
#[test]
fn subscriber_can_write_back() {
    let model = Model::new();
    let handle = model.clone();
    model
        .watch_path("celsius", move |change| {
            let celsius = change.value().and_then(Value::as_f64).unwrap_or(0.0);
            handle.set("fahrenheit", celsius * 9.0 / 5.0 + 32.0)?;
            Ok(())
        })
        .unwrap();

    model.set("celsius", 100).unwrap();
    assert_eq!(model.get("fahrenheit").unwrap(), Some(Value::from(212)));
}

/// Test that runaway re-entrant writes hit the depth limit.
#[test]
fn runaway_cascade_hits_depth_limit() {
    let model = Model::with_config(ModelConfig {
        max_cascade_depth: 8,
        ..ModelConfig::default()
    });
    let handle = model.clone();
    model
        .watch_path("counter", move |change| {
            let next = change.value().and_then(Value::as_i64).unwrap_or(0) + 1;
            handle.set("counter", next)?;
            Ok(())
        })
        .unwrap();

    let err = model.set("counter", 0).unwrap_err();
    assert!(matches!(err, ObserveError::DepthLimit { limit: 8, .. }));

    // The model is still usable afterwards.
    let other = count_changes(&model, "other");
    model.set("other", 1).unwrap();
    assert_eq!(other.load(Ordering::SeqCst), 1);
}

/// Test that a failing callback aborts the set that triggered it.
#[test]
fn callback_error_propagates() {
    let model = Model::new();
    let later = count_changes(&model, "foo");
    model
        .watch_path("foo", |_| Err(ObserveError::callback("rejected")))
        .unwrap();

    let err = model.set("foo", 1).unwrap_err();
    assert!(matches!(err, ObserveError::Callback(ref message) if message == "rejected"));

    // The write itself was applied before notification.
    assert_eq!(model.get("foo").unwrap(), Some(Value::from(1)));
    assert_eq!(later.load(Ordering::SeqCst), 1);
}

/// Test that invalid keypaths are rejected everywhere.
#[test]
fn invalid_keypaths_are_rejected() {
    let model = Model::new();
    for path in ["", ".", "a.", ".a", "a..b"] {
        assert!(matches!(
            model.set(path, 1),
            Err(ObserveError::InvalidKeypath { .. })
        ));
        assert!(model.get(path).is_err());
        assert!(model.watch_path(path, |_| Ok(())).is_err());
    }
    assert_eq!(model.to_json(), json!({}));
}

/// Test that model configuration can be loaded from JSON.
#[test]
fn config_from_json() {
    let config = ModelConfig::from_json(r#"{ "max_cascade_depth": 3 }"#).unwrap();
    assert_eq!(config.max_cascade_depth, 3);
    assert!(config.notify_descendants);

    let model = Model::with_config(config);
    assert_eq!(model.config().max_cascade_depth, 3);
}
