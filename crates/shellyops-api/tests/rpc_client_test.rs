#![allow(clippy::unwrap_used)]
// Integration tests for `RpcClient` using wiremock.

use pretty_assertions::assert_eq;
use serde_json::json;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use shellyops_api::{ComponentKey, Error, RpcClient, Schedule};

// ── Helpers ─────────────────────────────────────────────────────────

async fn setup() -> (MockServer, RpcClient) {
    let server = MockServer::start().await;
    let client = RpcClient::with_client(reqwest::Client::new(), &server.uri()).unwrap();
    (server, client)
}

fn ok(result: serde_json::Value) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({
        "id": 1,
        "src": "shellyplus1-abc",
        "result": result
    }))
}

async fn mock_method(server: &MockServer, rpc: &str, result: serde_json::Value) {
    Mock::given(method("POST"))
        .and(path("/rpc"))
        .and(body_partial_json(json!({ "method": rpc })))
        .respond_with(ok(result))
        .mount(server)
        .await;
}

// ── Envelope ────────────────────────────────────────────────────────

#[tokio::test]
async fn test_device_info() {
    let (server, client) = setup().await;
    mock_method(
        &server,
        "Shelly.GetDeviceInfo",
        json!({
            "id": "shellyplus1-abc",
            "name": "Hallway",
            "mac": "A8032ABC1234",
            "model": "SNSW-001X16EU",
            "gen": 2,
            "fw_id": "20240101-000000/1.1.0",
            "ver": "1.1.0",
            "app": "Plus1",
            "auth_en": false,
            "auth_domain": null
        }),
    )
    .await;

    let info = client.device_info().await.unwrap();
    assert_eq!(info.id, "shellyplus1-abc");
    assert_eq!(info.display_name(), Some("Hallway"));
    assert_eq!(info.generation, Some(2));
}

#[tokio::test]
async fn test_rpc_error_carries_method() {
    let (server, client) = setup().await;
    Mock::given(method("POST"))
        .and(path("/rpc"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": 1,
            "src": "shellyplus1-abc",
            "error": { "code": 404, "message": "No handler for Webhook.List" }
        })))
        .mount(&server)
        .await;

    let err = client.list_webhooks().await.unwrap_err();
    assert!(
        matches!(&err, Error::Rpc { code: 404, .. }),
        "expected Rpc error, got: {err:?}"
    );
    assert_eq!(err.method(), Some("Webhook.List"));
    assert!(err.is_method_not_found());
}

#[tokio::test]
async fn test_http_error_without_envelope() {
    let (server, client) = setup().await;
    Mock::given(method("POST"))
        .and(path("/rpc"))
        .respond_with(ResponseTemplate::new(503).set_body_string("busy"))
        .mount(&server)
        .await;

    let err = client.list_scripts().await.unwrap_err();
    assert!(matches!(err, Error::Http { status: 503, .. }), "got: {err:?}");
    assert!(err.is_transient());
}

#[tokio::test]
async fn test_malformed_result() {
    let (server, client) = setup().await;
    mock_method(&server, "Script.List", json!({ "scripts": "nope" })).await;

    let err = client.list_scripts().await.unwrap_err();
    assert!(
        matches!(err, Error::Deserialization { .. }),
        "got: {err:?}"
    );
}

// ── Scripts ─────────────────────────────────────────────────────────

#[tokio::test]
async fn test_script_code_is_read_in_chunks() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .and(path("/rpc"))
        .and(body_partial_json(
            json!({ "method": "Script.GetCode", "params": { "id": 1, "offset": 0 } }),
        ))
        .respond_with(ok(json!({ "data": "let a = 1;\n", "left": 12 })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/rpc"))
        .and(body_partial_json(
            json!({ "method": "Script.GetCode", "params": { "id": 1, "offset": 11 } }),
        ))
        .respond_with(ok(json!({ "data": "print(a);\n//", "left": 0 })))
        .expect(1)
        .mount(&server)
        .await;

    let code = client.script_code(1).await.unwrap();
    assert_eq!(code, "let a = 1;\nprint(a);\n//");
}

#[tokio::test]
async fn test_empty_chunk_with_data_left_is_an_error() {
    let (server, client) = setup().await;
    mock_method(&server, "Script.GetCode", json!({ "data": "", "left": 5 })).await;

    let err = client.script_code(1).await.unwrap_err();
    assert!(matches!(err, Error::Protocol { .. }), "got: {err:?}");
}

#[tokio::test]
async fn test_put_code_first_chunk_replaces() {
    let (server, client) = setup().await;
    Mock::given(method("POST"))
        .and(path("/rpc"))
        .and(body_partial_json(json!({
            "method": "Script.PutCode",
            "params": { "id": 2, "code": "print(1)", "append": false }
        })))
        .respond_with(ok(json!({ "len": 8 })))
        .expect(1)
        .mount(&server)
        .await;

    client.put_script_code(2, "print(1)").await.unwrap();
}

#[tokio::test]
async fn test_create_script_returns_id() {
    let (server, client) = setup().await;
    mock_method(&server, "Script.Create", json!({ "id": 7 })).await;

    assert_eq!(client.create_script("blink").await.unwrap(), 7);
}

// ── Schedules ───────────────────────────────────────────────────────

#[tokio::test]
async fn test_list_schedules_preserves_extra_fields() {
    let (server, client) = setup().await;
    mock_method(
        &server,
        "Schedule.List",
        json!({
            "jobs": [{
                "id": 1,
                "enable": true,
                "timespec": "0 0 22 * * *",
                "calls": [{ "method": "Switch.Set", "params": { "id": 0, "on": false } }],
                "origin": "shelly_app"
            }],
            "rev": 4
        }),
    )
    .await;

    let jobs = client.list_schedules().await.unwrap();
    assert_eq!(jobs.len(), 1);
    assert_eq!(jobs[0].id, Some(1));
    assert_eq!(jobs[0].extra.get("origin"), Some(&json!("shelly_app")));
}

#[tokio::test]
async fn test_create_schedule_strips_id() {
    let (server, client) = setup().await;
    Mock::given(method("POST"))
        .and(path("/rpc"))
        .and(body_partial_json(json!({
            "method": "Schedule.Create",
            "params": { "timespec": "0 0 6 * * *" }
        })))
        .respond_with(ok(json!({ "id": 9, "rev": 5 })))
        .mount(&server)
        .await;

    let schedule = Schedule {
        id: Some(1),
        enable: true,
        timespec: "0 0 6 * * *".into(),
        calls: vec![],
        extra: serde_json::Map::new(),
    };
    assert_eq!(client.create_schedule(&schedule).await.unwrap(), 9);

    let requests = server.received_requests().await.unwrap();
    let body: serde_json::Value = serde_json::from_slice(&requests[0].body).unwrap();
    assert!(body["params"].get("id").is_none());
}

// ── KVS ─────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_kvs_get_many_paginates() {
    let (server, client) = setup().await;
    Mock::given(method("POST"))
        .and(path("/rpc"))
        .and(body_partial_json(
            json!({ "method": "KVS.GetMany", "params": { "offset": 0 } }),
        ))
        .respond_with(ok(json!({
            "items": [
                { "key": "a", "etag": "1", "value": "x" },
                { "key": "b", "etag": "2", "value": 2 }
            ],
            "offset": 0,
            "total": 3
        })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/rpc"))
        .and(body_partial_json(
            json!({ "method": "KVS.GetMany", "params": { "offset": 2 } }),
        ))
        .respond_with(ok(json!({
            "items": [{ "key": "c", "etag": "3", "value": true }],
            "offset": 2,
            "total": 3
        })))
        .mount(&server)
        .await;

    let entries = client.list_kvs().await.unwrap();
    let keys: Vec<&str> = entries.iter().map(|e| e.key.as_str()).collect();
    assert_eq!(keys, ["a", "b", "c"]);
    assert_eq!(entries[2].value, json!(true));
}

// ── Components ──────────────────────────────────────────────────────

#[tokio::test]
async fn test_components_stop_on_empty_page() {
    let (server, client) = setup().await;
    Mock::given(method("POST"))
        .and(path("/rpc"))
        .and(body_partial_json(
            json!({ "method": "Shelly.GetComponents", "params": { "offset": 0 } }),
        ))
        .respond_with(ok(json!({
            "components": [{ "key": "boolean:200", "status": { "value": true }, "config": { "name": "Away" } }],
            "offset": 0,
            "total": 5
        })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/rpc"))
        .and(body_partial_json(
            json!({ "method": "Shelly.GetComponents", "params": { "offset": 1 } }),
        ))
        .respond_with(ok(json!({ "components": [], "offset": 1, "total": 5 })))
        .mount(&server)
        .await;

    let components = client.list_components().await.unwrap();
    assert_eq!(components.len(), 1);
    assert_eq!(components[0].key, "boolean:200");
}

#[tokio::test]
async fn test_component_discovery_filters_by_get_config_methods() {
    let (server, client) = setup().await;
    mock_method(
        &server,
        "Shelly.ListMethods",
        json!({ "methods": ["Shelly.GetConfig", "Switch.GetConfig", "Sys.GetConfig"] }),
    )
    .await;
    mock_method(
        &server,
        "Shelly.GetConfig",
        json!({
            "switch:0": { "id": 0, "name": "Light" },
            "sys": { "device": { "name": "Hallway" } },
            "input:0": { "id": 0 }
        }),
    )
    .await;

    let configs = client.component_configs().await.unwrap();
    let keys: Vec<ComponentKey> = configs.into_iter().map(|(k, _)| k).collect();
    assert_eq!(
        keys,
        vec![
            ComponentKey::new("switch", Some(0)),
            ComponentKey::new("sys", None),
        ]
    );
}

#[tokio::test]
async fn test_set_component_config_params() {
    let (server, client) = setup().await;
    Mock::given(method("POST"))
        .and(path("/rpc"))
        .and(body_partial_json(json!({
            "method": "Switch.SetConfig",
            "params": { "id": 0, "config": { "name": "Light" } }
        })))
        .respond_with(ok(json!({ "restart_required": false })))
        .expect(1)
        .mount(&server)
        .await;

    client
        .set_component_config(&ComponentKey::new("switch", Some(0)), &json!({ "name": "Light" }))
        .await
        .unwrap();
}
