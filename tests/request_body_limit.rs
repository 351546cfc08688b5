#[path = "common/mod.rs"]
mod common;

use bytes::Bytes;
use common::{config_for, spawn_app, start_mock_upstreams, ChatBehavior, CompletionBehavior};
use http_body::Frame;
use http_body_util::StreamBody;
use pangpt::build_state;
use reqwest::{Client, StatusCode};
use std::convert::Infallible;
use tokio_stream::iter;

#[tokio::test]
async fn chunked_payload_over_limit_returns_error_response() {
    let mock = start_mock_upstreams(CompletionBehavior::Reply("unused".into()), ChatBehavior::Accept).await;
    let mut config = config_for(&mock);
    config.max_request_bytes = Some(256);
    let base = spawn_app(build_state(config).unwrap()).await;
    let url = format!("{}/pangpt/decryption/", base);

    let payload = serde_json::json!({
        "name": "fw1",
        "details": "X".repeat(2048),
    })
    .to_string();

    let chunk_bytes: Vec<_> = payload
        .as_bytes()
        .chunks(128)
        .map(Bytes::copy_from_slice)
        .collect();

    let stream = iter(
        chunk_bytes
            .into_iter()
            .map(|chunk| Ok::<_, Infallible>(Frame::data(chunk))),
    );
    let body = StreamBody::new(stream);
    let body = reqwest::Body::wrap(body);

    let resp = Client::new()
        .post(&url)
        .header("content-type", "application/json")
        .body(body)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::PAYLOAD_TOO_LARGE);
    let json: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(json["detail"], "Request body too large");
    assert!(mock.recorded.completions().is_empty());
}

#[tokio::test]
async fn payload_under_limit_is_relayed() {
    let mock = start_mock_upstreams(CompletionBehavior::Reply("fine".into()), ChatBehavior::Accept).await;
    let mut config = config_for(&mock);
    config.max_request_bytes = Some(4096);
    let base = spawn_app(build_state(config).unwrap()).await;

    let resp = Client::new()
        .post(format!("{}/pangpt/globalprotect/", base))
        .json(&serde_json::json!({"user": "erin"}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(mock.recorded.posts().len(), 1);
}

#[tokio::test]
async fn oversized_body_status_is_documented_in_openapi() {
    let mock = start_mock_upstreams(CompletionBehavior::Reply("unused".into()), ChatBehavior::Accept).await;
    let mut config = config_for(&mock);
    config.max_request_bytes = Some(16);
    let base = spawn_app(build_state(config).unwrap()).await;
    let client = Client::new();

    let resp = client
        .post(format!("{}/pangpt/decryption/", base))
        .json(&serde_json::json!({"name": "fw1", "details": "certificate expired"}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::PAYLOAD_TOO_LARGE);

    let doc: serde_json::Value = client
        .get(format!("{}/openapi.json", base))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let documented = &doc["paths"]["/pangpt/decryption/"]["post"]["responses"]["413"];
    assert!(documented.is_object(), "413 missing from {doc}");
}
