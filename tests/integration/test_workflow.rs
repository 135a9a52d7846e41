//! End-to-end tests for the lesson trigger.
//!
//! Each test starts a fake upstream server that stands in for GitHub, the
//! generation API, Resend and Telegram, then runs the real trigger server
//! and HTTP clients against it.

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    routing::{get, post},
    Json, Router,
};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use lesson_orchestrator::{
    create_router, AppState, Config, Endpoints, LessonWorkflow, Secrets, WorkflowSettings,
};
use serde_json::{json, Value};

const STATE_JSON: &str = r#"{
  "plan": "Whole Bible",
  "completed_passages": ["John 3:16-18"],
  "total_lessons": 1,
  "last_generated": "2026-10-18",
  "preferences": {
    "email": "reader@example.com",
    "verses_per_lesson": "1-5",
    "focus_themes": ["grace"],
    "timezone": "Pacific/Auckland"
  },
  "notes": "started in Advent"
}"#;

const PSALM_REPLY: &str =
    r#"{"reference":"Psalm 23:1-3","lesson_html":"<h2>Psalm 23</h2><p>The Lord is my <b>shepherd</b>.</p>"}"#;

// ============================================================================
// Fake upstream
// ============================================================================

#[derive(Debug, Clone)]
struct StoredFile {
    text: String,
    sha: String,
    version: u32,
}

/// One request received by the fake upstream.
#[derive(Debug, Clone)]
struct Call {
    route: &'static str,
    path: String,
    authorization: Option<String>,
    api_version: Option<String>,
    body: Value,
}

struct Upstream {
    file: Mutex<Option<StoredFile>>,
    reject_writes: bool,
    generation: (StatusCode, Value),
    email_status: StatusCode,
    chat: (StatusCode, Value),
    calls: Mutex<Vec<Call>>,
}

impl Upstream {
    fn new(state_json: Option<&str>) -> Self {
        Self {
            file: Mutex::new(state_json.map(|text| StoredFile {
                text: text.to_string(),
                sha: "sha-1".to_string(),
                version: 1,
            })),
            reject_writes: false,
            generation: (StatusCode::OK, completion(PSALM_REPLY)),
            email_status: StatusCode::OK,
            chat: (StatusCode::OK, json!({"ok": true, "result": {"message_id": 7}})),
            calls: Mutex::new(Vec::new()),
        }
    }

    fn record(&self, route: &'static str, path: &str, headers: &HeaderMap, body: Value) {
        let header = |name: &str| {
            headers
                .get(name)
                .and_then(|value| value.to_str().ok())
                .map(str::to_string)
        };
        self.calls.lock().expect("calls lock").push(Call {
            route,
            path: path.trim_start_matches('/').to_string(),
            authorization: header("authorization"),
            api_version: header("x-github-api-version"),
            body,
        });
    }

    fn calls(&self, route: &str) -> Vec<Call> {
        self.calls
            .lock()
            .expect("calls lock")
            .iter()
            .filter(|call| call.route == route)
            .cloned()
            .collect()
    }

    fn stored(&self) -> StoredFile {
        self.file
            .lock()
            .expect("file lock")
            .clone()
            .expect("file should exist")
    }
}

/// Wraps model content in a chat completions response.
fn completion(content: &str) -> Value {
    json!({
        "id": "cmpl-1",
        "object": "chat.completion",
        "choices": [{
            "index": 0,
            "message": {"role": "assistant", "content": content},
            "finish_reason": "stop"
        }]
    })
}

async fn get_contents(
    State(upstream): State<Arc<Upstream>>,
    Path((_owner, _repo, path)): Path<(String, String, String)>,
    headers: HeaderMap,
) -> (StatusCode, Json<Value>) {
    upstream.record("get_contents", &path, &headers, Value::Null);

    let file = upstream.file.lock().expect("file lock").clone();
    match file {
        None => (StatusCode::NOT_FOUND, Json(json!({"message": "Not Found"}))),
        Some(file) => {
            // GitHub wraps base64 content at 60 columns
            let encoded = STANDARD.encode(file.text.as_bytes());
            let wrapped = encoded
                .as_bytes()
                .chunks(60)
                .map(|chunk| String::from_utf8_lossy(chunk).into_owned())
                .collect::<Vec<_>>()
                .join("\n");
            (
                StatusCode::OK,
                Json(json!({
                    "type": "file",
                    "encoding": "base64",
                    "path": path,
                    "content": wrapped,
                    "sha": file.sha
                })),
            )
        }
    }
}

async fn put_contents(
    State(upstream): State<Arc<Upstream>>,
    Path((_owner, _repo, path)): Path<(String, String, String)>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> (StatusCode, Json<Value>) {
    upstream.record("put_contents", &path, &headers, body.clone());

    let mut file = upstream.file.lock().expect("file lock");
    let current = file.clone().expect("file should exist before writing");
    let sent_sha = body["sha"].as_str().unwrap_or_default();
    if upstream.reject_writes || sent_sha != current.sha {
        return (
            StatusCode::CONFLICT,
            Json(json!({"message": format!("{path} does not match {sent_sha}")})),
        );
    }

    let content = body["content"].as_str().expect("content field");
    let text = String::from_utf8(STANDARD.decode(content).expect("valid base64"))
        .expect("utf-8 content");
    let version = current.version + 1;
    let sha = format!("sha-{version}");
    *file = Some(StoredFile {
        text,
        sha: sha.clone(),
        version,
    });

    (
        StatusCode::OK,
        Json(json!({
            "content": {"path": path, "sha": sha},
            "commit": {"sha": "c0ffee", "message": body["message"]}
        })),
    )
}

async fn chat_completions(
    State(upstream): State<Arc<Upstream>>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> (StatusCode, Json<Value>) {
    upstream.record("completions", "chat/completions", &headers, body);
    let (status, reply) = upstream.generation.clone();
    (status, Json(reply))
}

async fn send_email(
    State(upstream): State<Arc<Upstream>>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> (StatusCode, Json<Value>) {
    upstream.record("emails", "emails", &headers, body);
    if upstream.email_status.is_success() {
        (upstream.email_status, Json(json!({"id": "email-1"})))
    } else {
        (
            upstream.email_status,
            Json(json!({
                "statusCode": upstream.email_status.as_u16(),
                "name": "validation_error",
                "message": "Invalid `to` field."
            })),
        )
    }
}

async fn send_message(
    State(upstream): State<Arc<Upstream>>,
    Path(bot): Path<String>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> (StatusCode, Json<Value>) {
    upstream.record("send_message", &bot, &headers, body);
    let (status, reply) = upstream.chat.clone();
    (status, Json(reply))
}

fn upstream_router(upstream: Arc<Upstream>) -> Router {
    Router::new()
        .route(
            "/repos/:owner/:repo/contents/*path",
            get(get_contents).put(put_contents),
        )
        .route("/v1/chat/completions", post(chat_completions))
        .route("/emails", post(send_email))
        .route("/telegram/:bot/sendMessage", post(send_message))
        .with_state(upstream)
}

// ============================================================================
// Harness
// ============================================================================

/// Serves `router` on an ephemeral local port.
async fn spawn_server(router: Router) -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind");
    let addr = listener.local_addr().expect("Failed to get local addr");

    tokio::spawn(async move {
        axum::serve(listener, router).await.expect("Server failed");
    });

    addr
}

fn full_secrets() -> Secrets {
    Secrets {
        github_token: Some("gh-token".to_string()),
        generation_api_key: Some("grok-key".to_string()),
        email_api_key: Some("resend-key".to_string()),
        chat_token: Some("123:abc".to_string()),
        chat_id: Some("42".to_string()),
    }
}

/// Starts the fake upstream and the trigger server wired to it.
/// Returns the trigger URL.
async fn start(upstream: Upstream, secrets: Secrets) -> (String, Arc<Upstream>) {
    let upstream = Arc::new(upstream);
    let upstream_addr = spawn_server(upstream_router(Arc::clone(&upstream))).await;
    let base = format!("http://{upstream_addr}");

    let config = Config {
        repo_owner: "reader".to_string(),
        repo_name: "lessons".to_string(),
        request_timeout_secs: 5,
        endpoints: Endpoints {
            github: base.clone(),
            generation: format!("{base}/v1"),
            email: base.clone(),
            chat: format!("{base}/telegram"),
        },
        ..Default::default()
    };
    config.validate().expect("test config is valid");

    let services =
        lesson_services::build_services(&config, &secrets).expect("Failed to build services");
    let workflow = LessonWorkflow::new(services, WorkflowSettings::from_config(&config, &secrets));
    let addr = spawn_server(create_router(AppState::new(workflow))).await;

    (format!("http://{addr}/api/generate-lesson"), upstream)
}

async fn trigger(url: &str) -> (StatusCode, Value) {
    let response = reqwest::Client::new()
        .post(url)
        .send()
        .await
        .expect("Failed to call trigger");
    let status = StatusCode::from_u16(response.status().as_u16()).expect("valid status");
    let body = response.json().await.expect("JSON body");
    (status, body)
}

// ============================================================================
// Tests
// ============================================================================

#[tokio::test]
async fn test_successful_run_delivers_and_records() {
    let (url, upstream) = start(Upstream::new(Some(STATE_JSON)), full_secrets()).await;
    let before = chrono::Utc::now().date_naive().to_string();

    let (status, body) = trigger(&url).await;
    let after = chrono::Utc::now().date_naive().to_string();

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"success": true, "reference": "Psalm 23:1-3"}));

    // Progress file was rewritten against the sha that was read
    let stored = upstream.stored();
    assert_eq!(stored.sha, "sha-2");
    assert!(stored.text.contains("\n  \"completed_passages\""));
    let state: Value = serde_json::from_str(&stored.text).expect("stored JSON");
    assert_eq!(
        state["completed_passages"],
        json!(["John 3:16-18", "Psalm 23:1-3"])
    );
    assert_eq!(state["total_lessons"], 2);
    let last_generated = state["last_generated"].as_str().expect("date string");
    assert!(last_generated == before || last_generated == after);
    assert_eq!(state["plan"], "Whole Bible");
    assert_eq!(state["preferences"]["focus_themes"], json!(["grace"]));
    assert_eq!(state["preferences"]["timezone"], "Pacific/Auckland");
    assert_eq!(state["notes"], "started in Advent");

    let writes = upstream.calls("put_contents");
    assert_eq!(writes.len(), 1);
    assert_eq!(writes[0].path, "progress.json");
    assert_eq!(writes[0].body["message"], "Lesson: Psalm 23:1-3");
    assert_eq!(writes[0].body["sha"], "sha-1");
}

#[tokio::test]
async fn test_requests_sent_to_each_service() {
    let (url, upstream) = start(Upstream::new(Some(STATE_JSON)), full_secrets()).await;

    let (status, _) = trigger(&url).await;
    assert_eq!(status, StatusCode::OK);

    let reads = upstream.calls("get_contents");
    assert_eq!(reads.len(), 1);
    assert_eq!(reads[0].authorization.as_deref(), Some("Bearer gh-token"));
    assert_eq!(reads[0].api_version.as_deref(), Some("2022-11-28"));

    let completions = upstream.calls("completions");
    assert_eq!(completions.len(), 1);
    let request = &completions[0].body;
    assert_eq!(completions[0].authorization.as_deref(), Some("Bearer grok-key"));
    assert_eq!(request["model"], "grok-3");
    assert_eq!(request["temperature"], 0.8);
    assert_eq!(request["response_format"], json!({"type": "json_object"}));
    assert_eq!(request["messages"][0]["role"], "user");
    let prompt = request["messages"][0]["content"].as_str().expect("prompt");
    assert!(prompt.contains("NEVER repeat: John 3:16-18"));

    let emails = upstream.calls("emails");
    assert_eq!(emails.len(), 1);
    assert_eq!(emails[0].authorization.as_deref(), Some("Bearer resend-key"));
    assert_eq!(
        emails[0].body,
        json!({
            "from": "Bible Lessons <no-reply@yourdomain.com>",
            "to": ["reader@example.com"],
            "subject": "Daily Insight: Psalm 23:1-3",
            "html": "<h2>Psalm 23</h2><p>The Lord is my <b>shepherd</b>.</p>"
        })
    );

    let messages = upstream.calls("send_message");
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].path, "bot123:abc");
    assert_eq!(
        messages[0].body,
        json!({
            "chat_id": "42",
            "text": "*Daily Insight: Psalm 23:1-3*\n\nPsalm 23The Lord is my shepherd.",
            "parse_mode": "Markdown",
            "disable_web_page_preview": true
        })
    );
}

#[tokio::test]
async fn test_consecutive_runs_accumulate_history() {
    let (url, upstream) = start(Upstream::new(Some(STATE_JSON)), full_secrets()).await;

    assert_eq!(trigger(&url).await.0, StatusCode::OK);
    assert_eq!(trigger(&url).await.0, StatusCode::OK);

    let completions = upstream.calls("completions");
    let second_prompt = completions[1].body["messages"][0]["content"]
        .as_str()
        .expect("prompt");
    assert!(second_prompt.contains("NEVER repeat: John 3:16-18, Psalm 23:1-3"));

    let writes = upstream.calls("put_contents");
    assert_eq!(writes[1].body["sha"], "sha-2");

    let state: Value = serde_json::from_str(&upstream.stored().text).expect("stored JSON");
    assert_eq!(state["total_lessons"], 3);
}

#[tokio::test]
async fn test_chat_failure_after_email_leaves_state_unchanged() {
    let mut fake = Upstream::new(Some(STATE_JSON));
    fake.chat = (
        StatusCode::BAD_REQUEST,
        json!({"ok": false, "error_code": 400, "description": "Bad Request: chat not found"}),
    );
    let (url, upstream) = start(fake, full_secrets()).await;

    let (status, body) = trigger(&url).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(
        body,
        json!({"error": "chat delivery failed: Bad Request: chat not found"})
    );
    assert_eq!(upstream.calls("emails").len(), 1);
    assert!(upstream.calls("put_contents").is_empty());
    assert_eq!(upstream.stored().text, STATE_JSON);
}

#[tokio::test]
async fn test_email_failure_skips_chat() {
    let mut fake = Upstream::new(Some(STATE_JSON));
    fake.email_status = StatusCode::UNPROCESSABLE_ENTITY;
    let (url, upstream) = start(fake, full_secrets()).await;

    let (status, body) = trigger(&url).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    let error = body["error"].as_str().expect("error message");
    assert!(error.starts_with("email delivery failed"), "got: {error}");
    assert!(error.contains("Invalid `to` field."));
    assert!(upstream.calls("send_message").is_empty());
    assert!(upstream.calls("put_contents").is_empty());
}

#[tokio::test]
async fn test_unparseable_generation_stops_before_delivery() {
    let mut fake = Upstream::new(Some(STATE_JSON));
    fake.generation = (
        StatusCode::OK,
        completion("Here is today's lesson: Psalm 23!"),
    );
    let (url, upstream) = start(fake, full_secrets()).await;

    let (status, body) = trigger(&url).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    let error = body["error"].as_str().expect("error message");
    assert!(error.starts_with("Lesson generation failed"), "got: {error}");
    assert!(upstream.calls("emails").is_empty());
    assert!(upstream.calls("send_message").is_empty());
    assert!(upstream.calls("put_contents").is_empty());
    assert_eq!(upstream.stored().text, STATE_JSON);
}

#[tokio::test]
async fn test_generation_api_error_is_reported() {
    let mut fake = Upstream::new(Some(STATE_JSON));
    fake.generation = (
        StatusCode::UNAUTHORIZED,
        json!({"code": "unauthorized", "message": "Incorrect API key provided"}),
    );
    let (url, upstream) = start(fake, full_secrets()).await;

    let (status, body) = trigger(&url).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    let error = body["error"].as_str().expect("error message");
    assert!(error.contains("401"), "got: {error}");
    assert!(error.contains("Incorrect API key provided"));
    assert!(upstream.calls("emails").is_empty());
}

#[tokio::test]
async fn test_conflicting_write_after_notifications() {
    let mut fake = Upstream::new(Some(STATE_JSON));
    fake.reject_writes = true;
    let (url, upstream) = start(fake, full_secrets()).await;

    let (status, body) = trigger(&url).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    let error = body["error"].as_str().expect("error message");
    assert!(error.contains("changed since it was read"), "got: {error}");
    // Both notifications already went out
    assert_eq!(upstream.calls("emails").len(), 1);
    assert_eq!(upstream.calls("send_message").len(), 1);
    assert_eq!(upstream.stored().text, STATE_JSON);
}

#[tokio::test]
async fn test_missing_state_file() {
    let (url, upstream) = start(Upstream::new(None), full_secrets()).await;

    let (status, body) = trigger(&url).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(
        body,
        json!({"error": "State file not found: 'progress.json'"})
    );
    assert!(upstream.calls("completions").is_empty());
}

#[tokio::test]
async fn test_malformed_state_file() {
    let (url, upstream) = start(Upstream::new(Some("{ not json")), full_secrets()).await;

    let (status, body) = trigger(&url).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    let error = body["error"].as_str().expect("error message");
    assert!(error.starts_with("Malformed state file 'progress.json'"), "got: {error}");
    assert!(upstream.calls("completions").is_empty());
}

#[tokio::test]
async fn test_missing_generation_key_fails_generation_step() {
    let secrets = Secrets {
        generation_api_key: None,
        ..full_secrets()
    };
    let (url, upstream) = start(Upstream::new(Some(STATE_JSON)), secrets).await;

    let (status, body) = trigger(&url).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    let error = body["error"].as_str().expect("error message");
    assert!(error.contains("GROK_API_KEY"), "got: {error}");
    assert_eq!(upstream.calls("get_contents").len(), 1);
    assert!(upstream.calls("completions").is_empty());
}

#[tokio::test]
async fn test_get_trigger_runs_workflow() {
    let (url, upstream) = start(Upstream::new(Some(STATE_JSON)), full_secrets()).await;

    let response = reqwest::get(&url).await.expect("Failed to call trigger");

    assert_eq!(response.status().as_u16(), 200);
    let body: Value = response.json().await.expect("JSON body");
    assert_eq!(body["reference"], "Psalm 23:1-3");
    assert_eq!(upstream.calls("put_contents").len(), 1);
}
