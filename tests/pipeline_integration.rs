//! End-to-end flow over a real listener: book registration, summarization against a mocked model
//! provider, and audio dispatch through the executor to mocked speech and storage providers.

use bookbrief::{api::build_app, config::Config};
use httpmock::{
    Method::{GET, POST},
    MockServer,
};
use serde_json::{Value, json};
use std::time::Duration;
use tokio::net::TcpListener;

const ADMIN: &str = "admin-token";

fn config(provider: &MockServer) -> Config {
    Config {
        openrouter_api_key: Some("sk-test".into()),
        openrouter_base_url: provider.base_url(),
        summary_model: "openai/gpt-4o-mini".into(),
        elevenlabs_api_key: Some("xi-test".into()),
        elevenlabs_base_url: provider.base_url(),
        elevenlabs_voice_id: "voice-x".into(),
        import_secret: Some("shared-secret".into()),
        storage_base_url: provider.base_url(),
        storage_bucket: Some("books".into()),
        storage_token: Some("storage-token".into()),
        storage_public_url: "https://cdn.test".into(),
        admin_tokens: vec![ADMIN.into()],
        chunk_size: 40,
        chunk_overlap: 5,
        chunk_concurrency: 2,
        http_timeout: Duration::from_secs(5),
        ..Config::default()
    }
}

/// Serve the full application on an ephemeral port whose executor routes receive its own jobs.
async fn spawn_app(mut config: Config) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let base = format!("http://{}", listener.local_addr().expect("addr"));
    let port = listener.local_addr().expect("addr").port();
    config.resolve_executor_url(port);
    let app = build_app(&config).expect("app");
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("server");
    });
    base
}

fn completion(content: &str) -> Value {
    json!({ "choices": [{ "message": { "role": "assistant", "content": content } }] })
}

async fn mock_providers(provider: &MockServer) {
    provider
        .mock_async(|when, then| {
            when.method(GET).path("/models");
            then.status(200).json_body(json!({
                "data": [{
                    "id": "openai/gpt-4o-mini",
                    "name": "GPT-4o mini",
                    "context_length": 128000,
                    "pricing": { "prompt": "0.00000015", "completion": "0.0000006" },
                    "architecture": { "modality": "text->text" }
                }]
            }));
        })
        .await;
    provider
        .mock_async(|when, then| {
            when.method(POST)
                .path("/chat/completions")
                .body_contains("Excerpt ");
            then.status(200)
                .json_body(completion("Thoreau builds a cabin by the pond."));
        })
        .await;
    let structured = json!({
        "overview": "A year of deliberate living at Walden Pond.",
        "key_points": ["Simplicity", "Self-reliance"],
        "takeaways": ["Own less", "Observe nature"]
    });
    provider
        .mock_async(|when, then| {
            when.method(POST)
                .path("/chat/completions")
                .body_contains("You combine partial notes");
            then.status(200)
                .json_body(completion(&format!("```json\n{structured}\n```")));
        })
        .await;
    provider
        .mock_async(|when, then| {
            when.method(POST)
                .path("/v1/text-to-speech/voice-x/stream")
                .header("xi-api-key", "xi-test");
            then.status(200).body("MP3BYTES");
        })
        .await;
    provider
        .mock_async(|when, then| {
            when.method(POST)
                .path("/upload/storage/v1/b/books/o")
                .query_param("uploadType", "multipart")
                .body_contains("MP3BYTES");
            then.status(200).json_body(json!({ "name": "audio/b1.mp3" }));
        })
        .await;
}

async fn get_json(http: &reqwest::Client, url: &str) -> Value {
    http.get(url)
        .send()
        .await
        .expect("request")
        .json()
        .await
        .expect("json body")
}

/// Poll `url` until `field` equals `expected`, giving up after two seconds.
async fn wait_for_field(http: &reqwest::Client, url: &str, field: &str, expected: Value) -> bool {
    for _ in 0..100 {
        if get_json(http, url).await[field] == expected {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    false
}

#[tokio::test]
async fn summary_then_audio_dispatch_completes() {
    let provider = MockServer::start_async().await;
    mock_providers(&provider).await;
    let base = spawn_app(config(&provider)).await;
    let http = reqwest::Client::new();

    let book = http
        .put(format!("{base}/books/b1"))
        .bearer_auth(ADMIN)
        .json(&json!({ "title": "Walden", "author": "Henry David Thoreau" }))
        .send()
        .await
        .expect("put book");
    assert_eq!(book.status(), 200);

    let text = "When I wrote the following pages I lived alone, in the woods, a mile from any \
                neighbor, in a house which I had built myself.";
    let summary: Value = http
        .post(format!("{base}/summaries"))
        .json(&json!({ "text": text, "title": "Walden", "book_id": "b1" }))
        .send()
        .await
        .expect("summarize")
        .json()
        .await
        .expect("summary json");
    assert_eq!(summary["summary"]["shape"], "structured");
    assert!(summary["chunk_count"].as_u64().expect("chunk count") > 1);
    assert_eq!(summary["failed_chunks"], 0);

    let dispatched = http
        .post(format!("{base}/books/b1/audio"))
        .bearer_auth(ADMIN)
        .send()
        .await
        .expect("dispatch");
    assert_eq!(dispatched.status(), 202);
    let accepted: Value = dispatched.json().await.expect("accepted json");
    assert_eq!(accepted["status"], "processing");

    let completed = wait_for_field(
        &http,
        &format!("{base}/books/b1"),
        "audio_url",
        json!("https://cdn.test/books/audio/b1.mp3"),
    )
    .await;
    assert!(completed, "audio job did not complete");

    assert!(
        wait_for_field(&http, &format!("{base}/metrics"), "jobs_completed", json!(1)).await,
        "job completion was not recorded"
    );
    let metrics = get_json(&http, &format!("{base}/metrics")).await;
    assert_eq!(metrics["documents_summarized"], 1);
    assert_eq!(metrics["jobs_dispatched"], 1);
    assert_eq!(metrics["dispatch_failures"], 0);
}

#[tokio::test]
async fn unreachable_executor_is_counted_not_surfaced() {
    let provider = MockServer::start_async().await;
    let mut config = config(&provider);
    // Nothing listens here; the dispatch still answers 202.
    config.job_executor_url = Some("http://127.0.0.1:9".into());
    let base = spawn_app(config).await;
    let http = reqwest::Client::new();

    http.put(format!("{base}/books/b2"))
        .bearer_auth(ADMIN)
        .json(&json!({ "title": "Emma", "author": "Jane Austen" }))
        .send()
        .await
        .expect("put book");

    let dispatched = http
        .post(format!("{base}/books/b2/cover"))
        .bearer_auth(ADMIN)
        .json(&json!({ "feedback": "watercolour" }))
        .send()
        .await
        .expect("dispatch");
    assert_eq!(dispatched.status(), 202);

    let counted =
        wait_for_field(&http, &format!("{base}/metrics"), "dispatch_failures", json!(1)).await;
    assert!(counted, "dispatch failure was not recorded");
}

#[tokio::test]
async fn executor_rejects_foreign_callers() {
    let provider = MockServer::start_async().await;
    let base = spawn_app(config(&provider)).await;
    let http = reqwest::Client::new();

    let response = http
        .post(format!("{base}/internal/jobs/cover"))
        .header("x-import-secret", "not-the-secret")
        .json(&json!({ "targetId": "b1" }))
        .send()
        .await
        .expect("executor call");
    assert_eq!(response.status(), 401);

    let missing_book = http
        .post(format!("{base}/books/unknown/cover"))
        .bearer_auth(ADMIN)
        .send()
        .await
        .expect("dispatch");
    assert_eq!(missing_book.status(), 422);
}
