use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::routing::post;
use axum::{Json, Router};
use serde_json::{json, Value};

use docrag_core::retry::RetryPolicy;
use docrag_core::traits::{Embedder, Generator};
use docrag_core::types::ChatMessage;
use docrag_core::Error;
use docrag_llm::{ChatGenerator, HttpEmbedder};

#[derive(Clone, Default)]
struct Recorder {
    calls: Arc<AtomicUsize>,
    bodies: Arc<Mutex<Vec<Value>>>,
    auth: Arc<Mutex<Option<String>>>,
}

impl Recorder {
    fn record(&self, headers: &HeaderMap, body: Value) -> usize {
        self.bodies.lock().expect("lock").push(body);
        *self.auth.lock().expect("lock") =
            headers.get("authorization").and_then(|v| v.to_str().ok()).map(str::to_string);
        self.calls.fetch_add(1, Ordering::SeqCst) + 1
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

async fn serve(app: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("server");
    });
    format!("http://{addr}/v1")
}

fn policy() -> RetryPolicy {
    RetryPolicy::immediate(3, Duration::from_secs(5))
}

fn completion(text: &str) -> Value {
    json!({ "choices": [{ "index": 0, "message": { "role": "assistant", "content": text } }] })
}

fn messages() -> Vec<ChatMessage> {
    vec![ChatMessage::system("be brief"), ChatMessage::user("Question: hi\nAnswer:")]
}

#[tokio::test]
async fn chat_sends_typed_request_and_reads_first_choice() {
    let rec = Recorder::default();
    let app = Router::new()
        .route(
            "/v1/chat/completions",
            post(|State(rec): State<Recorder>, headers: HeaderMap, Json(body): Json<Value>| async move {
                rec.record(&headers, body);
                Json(completion("The sky is blue."))
            }),
        )
        .with_state(rec.clone());
    let base = serve(app).await;

    let generator = ChatGenerator::new(&base, "test-model", Some("secret".into()), policy())
        .expect("client")
        .with_sampling(0.2, 512);
    let out = generator.generate(&messages()).await.expect("generate");
    assert_eq!(out, "The sky is blue.");

    let body = rec.bodies.lock().expect("lock")[0].clone();
    assert_eq!(body["model"], "test-model");
    assert_eq!(body["stream"], false);
    assert_eq!(body["max_tokens"], 512);
    assert_eq!(body["messages"][0]["role"], "system");
    assert_eq!(body["messages"][1]["role"], "user");
    assert_eq!(body["messages"][1]["content"], "Question: hi\nAnswer:");
    assert_eq!(rec.auth.lock().expect("lock").as_deref(), Some("Bearer secret"));
}

#[tokio::test]
async fn transient_503_is_retried_until_success() {
    let rec = Recorder::default();
    let app = Router::new()
        .route(
            "/v1/chat/completions",
            post(|State(rec): State<Recorder>, headers: HeaderMap, Json(body): Json<Value>| async move {
                if rec.record(&headers, body) < 3 {
                    (StatusCode::SERVICE_UNAVAILABLE, Json(json!({ "error": "busy" })))
                } else {
                    (StatusCode::OK, Json(completion("finally")))
                }
            }),
        )
        .with_state(rec.clone());
    let base = serve(app).await;

    let generator = ChatGenerator::new(&base, "m", None, policy()).expect("client");
    assert_eq!(generator.generate(&messages()).await.expect("generate"), "finally");
    assert_eq!(rec.calls(), 3);
    assert!(rec.auth.lock().expect("lock").is_none());
}

#[tokio::test]
async fn unauthorized_fails_immediately_with_body() {
    let rec = Recorder::default();
    let app = Router::new()
        .route(
            "/v1/chat/completions",
            post(|State(rec): State<Recorder>, headers: HeaderMap, Json(body): Json<Value>| async move {
                rec.record(&headers, body);
                (StatusCode::UNAUTHORIZED, "invalid api key")
            }),
        )
        .with_state(rec.clone());
    let base = serve(app).await;

    let generator = ChatGenerator::new(&base, "m", Some("bad".into()), policy()).expect("client");
    let err = generator.generate(&messages()).await.expect_err("401");
    assert!(matches!(err, Error::Backend { transient: false, .. }));
    assert!(err.to_string().contains("invalid api key"), "{err}");
    assert_eq!(rec.calls(), 1);
}

#[tokio::test]
async fn malformed_body_ends_in_parse_error_after_budget() {
    let rec = Recorder::default();
    let app = Router::new()
        .route(
            "/v1/chat/completions",
            post(|State(rec): State<Recorder>, headers: HeaderMap, Json(body): Json<Value>| async move {
                rec.record(&headers, body);
                "this is not json"
            }),
        )
        .with_state(rec.clone());
    let base = serve(app).await;

    let generator = ChatGenerator::new(&base, "m", None, policy()).expect("client");
    let err = generator.generate(&messages()).await.expect_err("garbage");
    assert!(matches!(err, Error::Parse { attempts: 3, .. }), "{err:?}");
    assert_eq!(err.kind(), "ParseError");
    assert_eq!(rec.calls(), 3);
}

#[tokio::test]
async fn missing_choices_is_a_parse_error() {
    let app = Router::new().route("/v1/chat/completions", post(|| async { Json(json!({ "choices": [] })) }));
    let base = serve(app).await;

    let generator = ChatGenerator::new(&base, "m", None, RetryPolicy::immediate(1, Duration::from_secs(5)))
        .expect("client");
    let err = generator.generate(&messages()).await.expect_err("no choices");
    assert!(matches!(err, Error::Parse { attempts: 1, .. }));
}

#[tokio::test]
async fn connection_refused_is_transient() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    drop(listener);

    let generator = ChatGenerator::new(&format!("http://{addr}/v1"), "m", None, RetryPolicy::immediate(2, Duration::from_secs(5)))
        .expect("client");
    let err = generator.generate(&messages()).await.expect_err("refused");
    assert!(matches!(err, Error::Backend { transient: true, .. }), "{err:?}");
}

#[tokio::test]
async fn http_embedder_reads_first_vector() {
    let rec = Recorder::default();
    let app = Router::new()
        .route(
            "/v1/embeddings",
            post(|State(rec): State<Recorder>, headers: HeaderMap, Json(body): Json<Value>| async move {
                rec.record(&headers, body);
                Json(json!({ "data": [{ "index": 0, "embedding": [0.6, 0.8, 0.0] }] }))
            }),
        )
        .with_state(rec.clone());
    let base = serve(app).await;

    let embedder = HttpEmbedder::new(&base, "text-embedding-3-small", Some("k".into()), policy()).expect("client");
    assert_eq!(embedder.model_id(), "text-embedding-3-small");
    let v = embedder.embed("hello").await.expect("embed");
    assert_eq!(v, vec![0.6, 0.8, 0.0]);

    let body = rec.bodies.lock().expect("lock")[0].clone();
    assert_eq!(body, json!({ "model": "text-embedding-3-small", "input": "hello" }));
}

#[tokio::test]
async fn http_embedder_empty_data_is_a_parse_error() {
    let app = Router::new().route("/v1/embeddings", post(|| async { Json(json!({ "data": [] })) }));
    let base = serve(app).await;

    let embedder = HttpEmbedder::new(&base, "m", None, RetryPolicy::immediate(2, Duration::from_secs(5))).expect("client");
    let err = embedder.embed("hello").await.expect_err("no data");
    assert!(matches!(err, Error::Parse { attempts: 2, .. }));
}
