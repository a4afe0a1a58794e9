mod common;

use std::sync::Arc;

use common::{user_def, Journal, MockTransport};
use pagekit::data::{ApiResponse, DataError, Method, Model, ModelDef, Rule, SetOptions};
use serde_json::{json, Value};

fn user(transport: &Arc<MockTransport>, attrs: Value) -> Model {
    Model::new(user_def(), transport.clone(), attrs)
}

#[test]
fn test_repeated_set_fires_one_change_pair() {
    let transport = MockTransport::new();
    let model = user(&transport, json!({}));
    let journal = Journal::new();
    journal.listen(model.bus(), &["change", "change:name"]);

    assert!(model.set("name", json!("Test"), SetOptions::default()));
    assert!(!model.set("name", json!("Test"), SetOptions::default()));

    assert_eq!(journal.entries(), vec!["change:name", "change"]);
}

#[test]
fn test_silent_set_fires_nothing() {
    let transport = MockTransport::new();
    let model = user(&transport, json!({}));
    let journal = Journal::new();
    journal.listen(model.bus(), &["change", "change:name"]);

    assert!(model.set("name", json!("Test"), SetOptions::silent()));
    assert!(journal.entries().is_empty());
    assert_eq!(model.get("name"), Some(json!("Test")));
}

#[test]
fn test_dotted_set_creates_intermediates_and_deep_compares() {
    let transport = MockTransport::new();
    let model = user(&transport, json!({ "profile": { "tags": ["a"] } }));

    assert!(model.set("address.city", json!("Oslo"), SetOptions::default()));
    assert_eq!(model.get("address"), Some(json!({ "city": "Oslo" })));

    assert!(!model.set("profile", json!({ "tags": ["a"] }), SetOptions::default()));
    assert!(model.is_dirty());
    assert_eq!(model.changed_attributes().keys().collect::<Vec<_>>(), vec!["address"]);
}

#[test]
fn test_identity_attribute_updates_id() {
    let transport = MockTransport::new();
    let def = Arc::new(ModelDef::new("post", "/posts").id_attribute("uuid"));
    let model = Model::new(def, transport, json!({ "title": "x" }));
    assert!(model.is_new());

    model.set("uuid", json!("p-1"), SetOptions::default());
    assert_eq!(model.id(), Some(json!("p-1")));
    assert_eq!(model.build_url(model.id().as_ref()), "/posts/p-1");
}

#[test]
fn test_revert_restores_snapshot() {
    let transport = MockTransport::new();
    let model = user(&transport, json!({ "id": 1, "name": "Ann" }));
    model.set("name", json!("Bob"), SetOptions::default());
    assert!(model.is_dirty());

    model.revert(SetOptions::default());
    assert!(!model.is_dirty());
    assert_eq!(model.get("name"), Some(json!("Ann")));
}

#[test]
fn test_validate_populates_error_map() {
    let transport = MockTransport::new();
    let def = Arc::new(
        ModelDef::new("account", "/accounts")
            .rule("email", Rule::Required)
            .rule("email", Rule::pattern(r"^[^@]+@[^@]+$").unwrap())
            .rule("password", Rule::MinLength(8)),
    );
    let model = Model::new(def, transport, json!({ "email": "nope", "password": "short" }));
    let journal = Journal::new();
    journal.listen(model.bus(), &["invalid"]);

    assert!(!model.validate());
    assert_eq!(journal.count("invalid"), 1);
    assert_eq!(model.error_for("email"), Some(vec!["email is invalid".to_string()]));
    assert_eq!(
        model.error_for("password"),
        Some(vec!["password must be at least 8 characters".to_string()])
    );
}

#[tokio::test]
async fn test_create_posts_everything_and_adopts_id() {
    let transport = MockTransport::new();
    transport.respond(json!({ "id": 42, "name": "Ann", "updated_at": "t1" }));
    let model = user(&transport, json!({ "name": "Ann" }));
    let journal = Journal::new();
    journal.listen(model.bus(), &["sync"]);

    assert!(model.save().await.unwrap());

    let call = transport.last_call().unwrap();
    assert_eq!(call.method, Method::Post);
    assert_eq!(call.url, "/users");
    assert_eq!(call.body, Some(json!({ "name": "Ann" })));
    assert_eq!(model.id(), Some(json!(42)));
    assert!(!model.is_dirty());
    assert!(!model.is_loading());
    assert_eq!(journal.count("sync"), 1);
}

#[tokio::test]
async fn test_update_sends_only_diff_plus_bookkeeping() {
    let transport = MockTransport::new();
    let model = user(
        &transport,
        json!({ "id": 7, "name": "Ann", "email": "a@x.io", "updated_at": "t1" }),
    );
    model.set("name", json!("Anna"), SetOptions::default());
    transport.respond(json!({ "id": 7, "name": "Anna", "updated_at": "t2" }));

    assert!(model.save().await.unwrap());

    let call = transport.last_call().unwrap();
    assert_eq!(call.method, Method::Put);
    assert_eq!(call.url, "/users/7");
    assert_eq!(call.body, Some(json!({ "name": "Anna", "updated_at": "t1" })));
    assert_eq!(model.get("updated_at"), Some(json!("t2")));
    assert!(!model.is_dirty());
}

#[tokio::test]
async fn test_clean_save_is_a_noop() {
    let transport = MockTransport::new();
    let model = user(&transport, json!({ "id": 7, "name": "Ann" }));
    assert!(!model.save().await.unwrap());
    assert!(transport.calls().is_empty());
}

#[tokio::test]
async fn test_failed_save_populates_errors_and_clears_loading() {
    let transport = MockTransport::new();
    transport.respond_with(ApiResponse::failure(
        "Invalid",
        Some(json!({ "email": ["already taken"] })),
    ));
    let model = user(&transport, json!({ "email": "a@x.io" }));
    let journal = Journal::new();
    journal.listen(model.bus(), &["error"]);

    let err = model.save().await.unwrap_err();
    assert!(matches!(err, DataError::Api { .. }));
    assert!(!model.is_loading());
    assert_eq!(model.error_for("email"), Some(vec!["already taken".to_string()]));
    assert_eq!(journal.count("error"), 1);

    // Still usable afterwards.
    transport.respond(json!({ "id": 1, "email": "b@x.io" }));
    model.set("email", json!("b@x.io"), SetOptions::default());
    assert!(model.save().await.unwrap());
    assert!(model.errors().is_empty());
}

#[tokio::test]
async fn test_transport_failure_clears_loading() {
    let transport = MockTransport::new();
    transport.fail(DataError::Transport {
        method: "GET",
        url: "/users/1".into(),
        message: "connection refused".into(),
    });
    let model = user(&transport, json!({ "id": 1 }));

    assert!(model.fetch().await.is_err());
    assert!(!model.is_loading());
    assert!(!model.errors().is_empty());
}

#[tokio::test]
async fn test_fetch_requires_identity() {
    let transport = MockTransport::new();
    let model = user(&transport, json!({}));
    assert!(matches!(model.fetch().await, Err(DataError::MissingIdentity { .. })));
    assert!(transport.calls().is_empty());
}

#[tokio::test]
async fn test_destroy_unpersisted_model_is_local() {
    let transport = MockTransport::new();
    let model = user(&transport, json!({ "name": "temp" }));
    let journal = Journal::new();
    journal.listen(model.bus(), &["destroy"]);

    model.destroy().await.unwrap();
    assert!(transport.calls().is_empty());
    assert_eq!(journal.count("destroy"), 1);

    let saved = user(&transport, json!({ "id": 3 }));
    saved.destroy().await.unwrap();
    assert_eq!(transport.last_call().map(|c| c.method), Some(Method::Delete));
}

#[tokio::test]
async fn test_save_with_failing_rules_sends_nothing() {
    let transport = MockTransport::new();
    let def = Arc::new(ModelDef::new("user", "/users").rule("name", Rule::Required));
    let model = Model::new(def, transport.clone(), json!({}));

    assert!(matches!(model.save().await, Err(DataError::Validation(_))));
    assert!(transport.calls().is_empty());
    assert_eq!(model.error_for("name"), Some(vec!["name is required".to_string()]));
}
