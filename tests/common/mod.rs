#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::{routing::post, Json, Router};
use pangpt::completion::OpenAiConfig;
use pangpt::slack::SlackConfig;
use pangpt::{app, AppConfig, AppState};
use serde_json::{json, Value};
use tokio::net::TcpListener;

/// Tracks environment variable mutations and restores originals on drop.
pub struct EnvGuard {
    originals: HashMap<String, Option<String>>,
}

impl EnvGuard {
    pub fn new() -> Self {
        Self {
            originals: HashMap::new(),
        }
    }

    pub fn set(&mut self, key: &str, value: &str) {
        self.capture(key);
        std::env::set_var(key, value);
    }

    pub fn set_many(&mut self, entries: &[(&str, &str)]) {
        for (key, value) in entries {
            self.set(key, value);
        }
    }

    pub fn remove(&mut self, key: &str) {
        self.capture(key);
        std::env::remove_var(key);
    }

    fn capture(&mut self, key: &str) {
        if self.originals.contains_key(key) {
            return;
        }
        let original = std::env::var(key).ok();
        self.originals.insert(key.to_string(), original);
    }
}

impl Drop for EnvGuard {
    fn drop(&mut self) {
        for (key, original) in self.originals.drain() {
            match original {
                Some(value) => std::env::set_var(&key, value),
                None => std::env::remove_var(&key),
            }
        }
    }
}

/// How the mock completion endpoint answers.
#[derive(Clone)]
pub enum CompletionBehavior {
    Reply(String),
    Status(u16),
    Slow(u64),
}

/// How the mock chat.postMessage endpoint answers.
#[derive(Clone)]
pub enum ChatBehavior {
    Accept,
    Reject(&'static str),
}

#[derive(Clone, Default)]
pub struct Recorded {
    pub completion_requests: Arc<Mutex<Vec<(Option<String>, Value)>>>,
    pub chat_posts: Arc<Mutex<Vec<(Option<String>, Value)>>>,
}

impl Recorded {
    pub fn completions(&self) -> Vec<(Option<String>, Value)> {
        self.completion_requests.lock().unwrap().clone()
    }

    pub fn posts(&self) -> Vec<(Option<String>, Value)> {
        self.chat_posts.lock().unwrap().clone()
    }
}

#[derive(Clone)]
struct MockState {
    completion: CompletionBehavior,
    chat: ChatBehavior,
    recorded: Recorded,
}

pub struct MockUpstreams {
    pub base: String,
    pub recorded: Recorded,
}

fn auth(headers: &HeaderMap) -> Option<String> {
    headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

async fn completions(
    State(mock): State<MockState>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    mock.recorded
        .completion_requests
        .lock()
        .unwrap()
        .push((auth(&headers), body));
    match mock.completion {
        CompletionBehavior::Reply(text) => Json(json!({
            "id": "chatcmpl-1",
            "object": "chat.completion",
            "choices": [
                {"index": 0, "message": {"role": "assistant", "content": text}, "finish_reason": "stop"}
            ]
        }))
        .into_response(),
        CompletionBehavior::Status(code) => (
            StatusCode::from_u16(code).unwrap(),
            Json(json!({"error": {"message": "upstream exploded with secret detail"}})),
        )
            .into_response(),
        CompletionBehavior::Slow(ms) => {
            tokio::time::sleep(Duration::from_millis(ms)).await;
            Json(json!({"choices": [{"message": {"content": "too late"}}]})).into_response()
        }
    }
}

async fn post_message(
    State(mock): State<MockState>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Json<Value> {
    mock.recorded
        .chat_posts
        .lock()
        .unwrap()
        .push((auth(&headers), body));
    match mock.chat {
        ChatBehavior::Accept => Json(json!({"ok": true, "channel": "C0123", "ts": "1700000000.000100"})),
        ChatBehavior::Reject(code) => Json(json!({"ok": false, "error": code})),
    }
}

/// Spin up one server standing in for both the completion and chat APIs.
pub async fn start_mock_upstreams(completion: CompletionBehavior, chat: ChatBehavior) -> MockUpstreams {
    let recorded = Recorded::default();
    let state = MockState {
        completion,
        chat,
        recorded: recorded.clone(),
    };
    let router = Router::new()
        .route("/v1/chat/completions", post(completions))
        .route("/api/chat.postMessage", post(post_message))
        .with_state(state);
    let listener = TcpListener::bind((std::net::Ipv4Addr::LOCALHOST, 0))
        .await
        .unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    MockUpstreams {
        base: format!("http://{}", addr),
        recorded,
    }
}

pub fn config_for(mock: &MockUpstreams) -> AppConfig {
    AppConfig {
        completion: OpenAiConfig {
            api_base: format!("{}/v1", mock.base),
            api_key: "sk-test".into(),
            model: "gpt-3.5-turbo".into(),
            timeout_ms: 2_000,
        },
        slack: SlackConfig {
            api_base: format!("{}/api", mock.base),
            bot_token: "xoxb-test".into(),
            channel: "C0123".into(),
            timeout_ms: 2_000,
        },
        max_request_bytes: None,
    }
}

/// Serve the relay on an ephemeral port and return its base URL.
pub async fn spawn_app(state: AppState) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let app = app(state);
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}", addr)
}

pub fn decryption_event() -> Value {
    json!({
        "name": "fw1",
        "sni": "example.com",
        "commonname": "cn1",
        "root": "root1",
        "rootstatus": "ok",
        "details": "cert expired",
        "sourceip": "10.0.0.1",
        "sourceuser": "alice",
        "destinationip": "93.184.216.34",
        "application": "ssl"
    })
}
