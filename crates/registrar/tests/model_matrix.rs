use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use registrar::{
    attributes_from, Attributes, ChangeSet, Model, ModelClass, Options, Overrides, ValidationError,
};
use serde_json::{json, Value};

fn tempest() -> Model {
    let proxy = ModelClass::base().extend(Overrides::new(), Value::Null);
    proxy.create(
        json!({
            "id": "1-the-tempest",
            "title": "The Tempest",
            "author": "Bill Shakespeare",
            "length": 123
        }),
        Options::new(),
    )
}

fn counter(model: &mut Model, event: &str) -> Arc<AtomicUsize> {
    let count = Arc::new(AtomicUsize::new(0));
    let count_clone = Arc::clone(&count);
    model
        .on(event, move |_, _| {
            count_clone.fetch_add(1, Ordering::SeqCst);
        })
        .unwrap();
    count
}

#[test]
fn model_initialize_receives_attributes_and_options() {
    let class = ModelClass::base().extend(
        Overrides::new().initialize(|model, _attrs, options| {
            if let Some(one) = options.get("one") {
                model.set_field("one", one.clone());
            }
        }),
        Value::Null,
    );
    let model = class.create(json!({}), Options::new().with("one", json!(1)));
    assert_eq!(model.field("one"), Some(&json!(1)));
}

#[test]
fn model_initialize_sees_final_attributes() {
    let seen = Arc::new(Mutex::new(None));
    let seen_clone = Arc::clone(&seen);
    let class = ModelClass::base().extend(
        Overrides::new()
            .defaults(json!({"size": "m", "color": "red"}))
            .initialize(move |_, attrs, _| {
                *seen_clone.lock().unwrap() = Some(Value::Object(attrs.clone()));
            }),
        Value::Null,
    );
    class.create(json!({"color": "blue"}), Options::new());
    assert_eq!(
        seen.lock().unwrap().clone(),
        Some(json!({"size": "m", "color": "blue"}))
    );
}

#[test]
fn model_initialize_with_parsed_attributes() {
    let class = ModelClass::base().extend(
        Overrides::new().parse(|raw, _| {
            let mut attrs = attributes_from(raw);
            if let Some(n) = attrs.get("value").and_then(Value::as_i64) {
                attrs.insert("value".into(), json!(n + 1));
            }
            attrs
        }),
        Value::Null,
    );
    let parsed = class.create(json!({"value": 1}), Options::new().with_parse());
    assert_eq!(parsed.get("value"), Some(&json!(2)));

    let unparsed = class.create(json!({"value": 1}), Options::new());
    assert_eq!(unparsed.get("value"), Some(&json!(1)));
}

#[test]
fn model_defaults_sit_under_initial_attributes() {
    let class = ModelClass::base().extend(
        Overrides::new().defaults(json!({"one": 1, "two": 2})),
        Value::Null,
    );
    let model = class.create(json!({"two": null}), Options::new());
    assert_eq!(model.get("one"), Some(&json!(1)));
    assert_eq!(model.get("two"), Some(&Value::Null));
    assert!(!model.has_changed(None));
}

#[test]
fn model_clone_is_independent() {
    let mut a = Model::new(json!({"foo": 1, "bar": 2, "baz": 3}));
    let mut b = a.clone();
    assert_eq!(a.get("foo"), Some(&json!(1)));
    assert_eq!(a.get("bar"), Some(&json!(2)));
    assert_eq!(a.get("baz"), Some(&json!(3)));
    assert_eq!(b.get("foo"), a.get("foo"));
    assert_eq!(b.get("bar"), a.get("bar"));
    assert_eq!(b.get("baz"), a.get("baz"));
    assert_ne!(a.cid(), b.cid());

    a.set(json!({"foo": 100}), Options::new()).unwrap();
    assert_eq!(a.get("foo"), Some(&json!(100)));
    assert_eq!(b.get("foo"), Some(&json!(1)));

    b.unset("bar", Options::new()).unwrap();
    assert_eq!(a.get("bar"), Some(&json!(2)));
}

#[test]
fn model_clone_keeps_class_but_not_listeners() {
    let class = ModelClass::base().extend(Overrides::new().named("Book"), Value::Null);
    let mut a = class.create(json!({"n": 1}), Options::new());
    let count = counter(&mut a, "change");
    let mut b = a.clone();
    assert_eq!(b.class(), &class);
    assert_eq!(b.listener_count(), 0);
    b.set(("n", json!(2)), Options::new()).unwrap();
    assert_eq!(count.load(Ordering::SeqCst), 0);
}

#[test]
fn model_is_new() {
    let a = Model::new(json!({"foo": 1, "bar": 2, "baz": 3}));
    assert!(a.is_new(), "it should be new");
    let a = Model::new(json!({"foo": 1, "bar": 2, "baz": 3, "id": -5}));
    assert!(!a.is_new(), "any defined id is legal, negative or positive");
    let a = Model::new(json!({"foo": 1, "bar": 2, "baz": 3, "id": 0}));
    assert!(!a.is_new(), "any defined id is legal, including zero");
    assert!(Model::new(json!({})).is_new(), "is true when there is no id");
    assert!(!Model::new(json!({"id": -1})).is_new());
    assert!(!Model::new(json!({"id": ""})).is_new());
    assert!(Model::new(json!({"id": null})).is_new());
}

#[test]
fn model_id_follows_custom_id_attribute() {
    let class = ModelClass::base().extend(Overrides::new().id_attribute("_id"), Value::Null);
    let mut model = class.create(json!({"id": 1}), Options::new());
    assert!(model.is_new());
    model.set(("_id", json!("abc")), Options::new()).unwrap();
    assert_eq!(model.id(), Some(&json!("abc")));
    assert!(!model.is_new());
}

#[test]
fn model_get() {
    let doc = tempest();
    assert_eq!(doc.get("title"), Some(&json!("The Tempest")));
    assert_eq!(doc.get("author"), Some(&json!("Bill Shakespeare")));
    assert_eq!(doc.get("missing"), None);
    assert_eq!(doc.id(), Some(&json!("1-the-tempest")));
}

#[test]
fn model_has() {
    let mut model = Model::new(Value::Null);
    assert!(!model.has("name"));

    model
        .set(
            json!({
                "0": 0,
                "1": 1,
                "true": true,
                "false": false,
                "empty": "",
                "name": "name",
                "null": null
            }),
            Options::new(),
        )
        .unwrap();

    for key in ["0", "1", "true", "false", "empty", "name"] {
        assert!(model.has(key), "{key} should be present");
    }

    model.unset("name", Options::new()).unwrap();
    assert!(!model.has("name"));
    assert!(!model.has("null"));
    assert!(!model.has("undefined"));
}

#[test]
fn model_set_and_unset() {
    let mut a = Model::new(json!({"id": "id", "foo": 1, "bar": 2, "baz": 3}));
    let count = counter(&mut a, "change:foo");

    a.set(json!({"foo": 2}), Options::new()).unwrap();
    assert_eq!(a.get("foo"), Some(&json!(2)));
    assert_eq!(count.load(Ordering::SeqCst), 1);

    a.set(json!({"foo": 2}), Options::new()).unwrap();
    assert_eq!(a.get("foo"), Some(&json!(2)));
    assert_eq!(count.load(Ordering::SeqCst), 1, "same value must not fire");
    assert!(!a.has_changed(Some("foo")));

    a.set_validator(Some(Arc::new(
        |attrs: &Attributes, _: &Options| -> Result<(), ValidationError> {
            assert_eq!(attrs.get("foo"), None, "validation sees the unset state");
            Ok(())
        },
    )));
    a.unset("foo", Options::new()).unwrap();
    assert_eq!(a.get("foo"), None);
    assert!(!a.attributes().contains_key("foo"));
    a.set_validator(None);
    assert_eq!(count.load(Ordering::SeqCst), 2);

    a.unset("id", Options::new()).unwrap();
    assert_eq!(a.id(), None);
    assert!(a.is_new());
}

#[test]
fn model_unset_fires_even_for_missing_attribute() {
    let mut model = Model::new(json!({"a": 1}));
    let count = counter(&mut model, "change:a");
    model.set(json!({"a": 2}), Options::new()).unwrap();
    model.unset("a", Options::new()).unwrap();
    assert_eq!(count.load(Ordering::SeqCst), 2);
    model.unset("a", Options::new()).unwrap();
    assert_eq!(count.load(Ordering::SeqCst), 3);
    model.unset("a", Options::new()).unwrap();
    assert_eq!(count.load(Ordering::SeqCst), 4);
    assert!(model.has_changed(Some("a")));
}

#[test]
fn model_unset_and_changed_attributes() {
    let mut model = Model::new(json!({"a": 1}));
    model.unset("a", Options::new().with_silent()).unwrap();
    let changed = model.changed_attributes(None).unwrap();
    assert_eq!(changed.get("a"), Some(&None));

    let changed = model.changed_attributes(None).unwrap();
    assert!(changed.contains_key("a"));
}

#[test]
fn model_clear_unsets_everything_in_one_round() {
    let mut model = Model::new(json!({"a": 1, "b": 2}));
    let per_key = counter(&mut model, "change:a");
    let whole = counter(&mut model, "change");
    model.clear(Options::new()).unwrap();
    assert!(model.attributes().is_empty());
    assert_eq!(per_key.load(Ordering::SeqCst), 1);
    assert_eq!(whole.load(Ordering::SeqCst), 1);
    assert_eq!(
        Value::Object(model.previous_attributes().clone()),
        json!({"a": 1, "b": 2})
    );
    assert_eq!(
        model.changed_attributes(None).unwrap(),
        ChangeSet::from([("a".to_string(), None), ("b".to_string(), None)])
    );
}

#[test]
fn model_clear_on_empty_model_is_silent() {
    let mut model = Model::new(json!({}));
    let whole = counter(&mut model, "change");
    model.clear(Options::new()).unwrap();
    assert_eq!(whole.load(Ordering::SeqCst), 0);
}

#[test]
fn model_change_has_changed_changed_attributes_previous() {
    let mut model = Model::new(json!({"name": "Tim", "age": 10}));
    assert_eq!(model.changed_attributes(None), None);

    let observed = Arc::new(Mutex::new(Vec::new()));
    let observed_clone = Arc::clone(&observed);
    model.on_change(move |model, _| {
        observed_clone.lock().unwrap().push((
            model.has_changed(Some("name")),
            model.has_changed(Some("age")),
            model.changed_attributes(None),
            model.previous("name").cloned(),
            Value::Object(model.previous_attributes().clone()),
        ));
    });

    assert!(!model.has_changed(None));
    model
        .set(json!({"name": "Rob"}), Options::new().with_silent())
        .unwrap();
    assert!(observed.lock().unwrap().is_empty(), "silent set must not fire");
    assert!(model.has_changed(None));
    assert!(model.has_changed(Some("name")));
    assert!(!model.has_changed(Some("age")));

    model.change();
    assert_eq!(model.get("name"), Some(&json!("Rob")));

    let observed = observed.lock().unwrap();
    assert_eq!(observed.len(), 1);
    let (name_changed, age_changed, changed, previous_name, previous_all) = &observed[0];
    assert!(*name_changed);
    assert!(!*age_changed);
    assert_eq!(
        changed.clone().unwrap(),
        ChangeSet::from([("name".to_string(), Some(json!("Rob")))])
    );
    assert_eq!(previous_name, &Some(json!("Tim")));
    assert_eq!(previous_all, &json!({"name": "Tim", "age": 10}));
}

#[test]
fn model_change_replays_per_attribute_events() {
    let mut model = Model::new(json!({"name": "Tim"}));
    let values = Arc::new(Mutex::new(Vec::new()));
    let values_clone = Arc::clone(&values);
    model.on_attribute("name", move |_, ev| {
        values_clone.lock().unwrap().push(ev.value.clone());
    });
    model
        .set(("name", json!("Rob")), Options::new().with_silent())
        .unwrap();
    assert!(values.lock().unwrap().is_empty());
    model.change();
    model.change();
    assert_eq!(*values.lock().unwrap(), [Some(json!("Rob"))]);
}

#[test]
fn model_changed_attributes_against_a_diff() {
    let model = Model::new(json!({"a": 1, "b": "x"}));
    assert_eq!(
        model.changed_attributes(Some(&attributes_from(json!({"a": 1.0, "b": "x"})))),
        None
    );
    assert_eq!(
        model
            .changed_attributes(Some(&attributes_from(json!({"a": 2, "b": "x", "c": null}))))
            .unwrap(),
        ChangeSet::from([
            ("a".to_string(), Some(json!(2))),
            ("c".to_string(), Some(Value::Null))
        ])
    );
}

#[test]
fn model_changed_is_per_round_not_cumulative() {
    let mut model = Model::new(json!({"a": 1, "b": 1}));
    model.set(("a", json!(2)), Options::new()).unwrap();
    model.set(("b", json!(2)), Options::new()).unwrap();
    assert!(!model.has_changed(Some("a")));
    assert!(model.has_changed(Some("b")));
    assert_eq!(model.previous("a"), Some(&json!(2)));
    assert_eq!(model.previous("b"), Some(&json!(1)));
}

#[test]
fn model_events_carry_value_and_extra_options() {
    let mut model = Model::new(json!({"a": 1}));
    let events = Arc::new(Mutex::new(Vec::new()));
    let events_clone = Arc::clone(&events);
    model
        .on("change:a", move |_, ev| {
            events_clone.lock().unwrap().push(ev.clone());
        })
        .unwrap();
    model
        .set(("a", json!(5)), Options::new().with("source", json!("sync")))
        .unwrap();
    let events = events.lock().unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].value, Some(json!(5)));
    assert_eq!(events[0].options.get("source"), Some(&json!("sync")));
}

#[test]
fn model_rejects_unknown_event_names() {
    let mut model = Model::new(json!({}));
    assert!(model.on("sync", |_, _| {}).is_err());
    assert_eq!(model.listener_count(), 0);
}

#[test]
fn model_off_stops_notifications() {
    let mut model = Model::new(json!({"a": 1}));
    let count = Arc::new(AtomicUsize::new(0));
    let count_clone = Arc::clone(&count);
    let id = model.on_change(move |_, _| {
        count_clone.fetch_add(1, Ordering::SeqCst);
    });
    model.set(("a", json!(2)), Options::new()).unwrap();
    assert!(model.off(id));
    assert!(!model.off(id));
    model.set(("a", json!(3)), Options::new()).unwrap();
    assert_eq!(count.load(Ordering::SeqCst), 1);
}

#[test]
fn model_to_json_snapshots_attributes() {
    let mut model = Model::new(json!({"a": [1, 2]}));
    let snapshot = model.to_json();
    model.set(("a", json!([3])), Options::new()).unwrap();
    assert_eq!(snapshot, json!({"a": [1, 2]}));
    assert_eq!(model.to_json(), json!({"a": [3]}));
}
