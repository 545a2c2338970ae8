//! Integration tests for the cloudflare_zone_ssl module against a mock Cloudflare API

mod common;

use common::*;
use pretty_assertions::assert_eq;
use restible::modules::ModuleError;
use serde_json::{json, Value};
use wiremock::matchers::{body_json, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const SSL: &str = "/zones/zone-1/settings/ssl";

fn setting(value: &str) -> Value {
    json!({
        "id": "ssl",
        "value": value,
        "editable": true,
        "modified_on": "2024-01-01T00:00:00Z"
    })
}

fn base_params(extra: &[(&str, Value)]) -> restible::modules::ModuleParams {
    let mut p = params(&[
        ("api_token", json!("cf_token")),
        ("zone", json!("example.com")),
    ]);
    p.extend(params(extra));
    p
}

async fn mount_zone(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/zones"))
        .and(query_param("name", "example.com"))
        .respond_with(ResponseTemplate::new(200).set_body_json(cf_page(
            json!([{"id": "zone-1", "name": "example.com", "status": "active"}]),
            1,
            1,
        )))
        .mount(server)
        .await;
}

async fn mount_setting(server: &MockServer, value: &str) {
    Mock::given(method("GET"))
        .and(path(SSL))
        .respond_with(ResponseTemplate::new(200).set_body_json(cf_envelope(setting(value))))
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_fetched_returns_current_setting() {
    let server = MockServer::start().await;
    mount_zone(&server).await;
    mount_setting(&server, "full").await;

    let output = run_module(
        "cloudflare_zone_ssl",
        base_params(&[("state", json!("fetched"))]),
        context_for(&server),
    )
    .await
    .unwrap();

    assert!(!output.changed);
    assert_eq!(output.msg, "SSL settings fetched successfully.");
    assert_eq!(output.data["ssl_settings"], setting("full"));
}

#[tokio::test]
async fn test_present_updates_mode() {
    let server = MockServer::start().await;
    mount_zone(&server).await;
    mount_setting(&server, "flexible").await;

    Mock::given(method("PATCH"))
        .and(path(SSL))
        .and(body_json(json!({"value": "strict"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(cf_envelope(setting("strict"))))
        .expect(1)
        .mount(&server)
        .await;

    let output = run_module(
        "cloudflare_zone_ssl",
        base_params(&[("state", json!("present")), ("value", json!("strict"))]),
        context_for(&server).with_diff_mode(true),
    )
    .await
    .unwrap();

    assert!(output.changed);
    assert_eq!(output.msg, "SSL settings updated successfully.");
    assert_eq!(output.data["ssl_settings"]["value"], "strict");

    let diff = output.diff.expect("diff mode returns a diff");
    assert!(diff.before.contains("\"value\": \"flexible\""));
    assert!(diff.after.contains("\"value\": \"strict\""));
}

#[tokio::test]
async fn test_present_same_mode_is_unchanged() {
    let server = MockServer::start().await;
    mount_zone(&server).await;
    mount_setting(&server, "strict").await;

    Mock::given(method("PATCH"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let output = run_module(
        "cloudflare_zone_ssl",
        base_params(&[("state", json!("present")), ("value", json!("strict"))]),
        context_for(&server),
    )
    .await
    .unwrap();

    assert!(!output.changed);
    assert_eq!(output.data["ssl_settings"]["value"], "strict");
}

#[tokio::test]
async fn test_check_mode_does_not_patch() {
    let server = MockServer::start().await;
    mount_zone(&server).await;
    mount_setting(&server, "off").await;

    Mock::given(method("PATCH"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let output = run_module(
        "cloudflare_zone_ssl",
        base_params(&[("state", json!("present")), ("value", json!("full"))]),
        context_for(&server).with_check_mode(true),
    )
    .await
    .unwrap();

    assert!(output.changed);
    assert_eq!(output.msg, "Would have updated SSL settings (check mode)");
    assert_eq!(output.data["ssl_settings"]["value"], "off");
}

#[tokio::test]
async fn test_unknown_zone_fails() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/zones"))
        .respond_with(ResponseTemplate::new(200).set_body_json(cf_page(json!([]), 1, 1)))
        .mount(&server)
        .await;

    let err = run_module(
        "cloudflare_zone_ssl",
        base_params(&[("state", json!("fetched"))]),
        context_for(&server),
    )
    .await
    .unwrap_err();

    assert!(matches!(err, ModuleError::ResourceNotFound(_)));
    assert_eq!(err.to_string(), "Zone 'example.com' not found");
}

#[tokio::test]
async fn test_absent_is_rejected_before_requests() {
    let server = MockServer::start().await;

    let err = run_module(
        "cloudflare_zone_ssl",
        base_params(&[("state", json!("absent")), ("value", json!("full"))]),
        context_for(&server),
    )
    .await
    .unwrap_err();

    assert!(err.is_validation());
    assert_eq!(request_count(&server).await, 0);
}
