use killboard_api::store::{MemoryKillmailStore, SharedStore};
use killboard_api::test_support::{KillmailFixture, TestRocketBuilder};
use rocket::http::{ContentType, Status};
use rocket::local::blocking::Client;
use std::sync::Arc;

fn client_with(store: Arc<MemoryKillmailStore>) -> Client {
    TestRocketBuilder::new()
        .manage_store(store as SharedStore)
        .blocking_client()
}

fn seeded() -> Arc<MemoryKillmailStore> {
    Arc::new(MemoryKillmailStore::new(vec![
        KillmailFixture::new(93_000_001).into_document(),
        KillmailFixture::new(93_000_002)
            .without_axiom()
            .into_document(),
    ]))
}

#[test]
fn returns_record_with_requested_id() {
    let client = client_with(seeded());

    let response = client.get("/kill/93000001").dispatch();
    assert_eq!(response.status(), Status::Ok);
    assert_eq!(response.content_type(), Some(ContentType::JSON));

    let body: serde_json::Value = response.into_json().expect("valid JSON payload");
    assert_eq!(body["_id"], 93_000_001);
    assert_eq!(body["killmail"]["killmail_id"], 93_000_001);
    assert_eq!(body["axiom"]["ship"]["hp"], 2500.0);
    assert!(body["killmail"]["killmail_time"].is_string());
}

#[test]
fn record_without_derived_attributes_omits_axiom() {
    let client = client_with(seeded());

    let response = client.get("/kill/93000002").dispatch();
    assert_eq!(response.status(), Status::Ok);

    let body: serde_json::Value = response.into_json().expect("valid JSON payload");
    assert_eq!(body["_id"], 93_000_002);
    assert!(body.get("axiom").is_none());
}

#[test]
fn non_integer_id_is_bad_request() {
    let store = seeded();
    let client = client_with(Arc::clone(&store));

    for path in ["/kill/abc", "/kill/12x", "/kill/-4"] {
        let response = client.get(path).dispatch();
        assert_eq!(response.status(), Status::BadRequest, "{path}");

        let body: serde_json::Value = response.into_json().expect("valid JSON payload");
        assert!(!body["message"].as_str().unwrap_or_default().is_empty());
    }
}

#[test]
fn missing_record_is_server_error() {
    let client = client_with(seeded());

    let response = client.get("/kill/1").dispatch();
    assert_eq!(response.status(), Status::InternalServerError);

    let body: serde_json::Value = response.into_json().expect("valid JSON payload");
    assert_eq!(body["message"], "killmail 1 not found");
}

#[test]
fn store_failure_is_server_error() {
    let store = seeded();
    store.set_offline(true);
    let client = client_with(store);

    let response = client.get("/kill/93000001").dispatch();
    assert_eq!(response.status(), Status::InternalServerError);

    let body: serde_json::Value = response.into_json().expect("valid JSON payload");
    assert!(body["message"].as_str().unwrap_or_default().contains("unavailable"));
}
