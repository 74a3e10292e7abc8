use ai_client::config::PromptTemplates;
use ai_client::services::gemini::{
    CallContext, ClientConfig, GeminiClient, GenerationOptions, GenerativeModel, OffloadConfig,
    Part,
};
use ai_client::services::Runner;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const MODEL: &str = "gemini-2.5-flash";
const GENERATE_PATH: &str = "/v1beta/models/gemini-2.5-flash:generateContent";

fn text_response(text: &str) -> Value {
    json!({
        "candidates": [{
            "content": { "role": "model", "parts": [{ "text": text }] },
            "finishReason": "STOP"
        }]
    })
}

fn config_for(server: &MockServer) -> ClientConfig {
    ClientConfig::new("test-key")
        .with_base_url(server.uri())
        .with_max_retries(2)
        .with_initial_delay(Duration::from_millis(5))
        .with_max_delay(Duration::from_millis(20))
        .with_offload(
            OffloadConfig::default()
                .with_threshold_bytes(64)
                .with_poll_interval(Duration::from_millis(5))
                .with_poll_timeout(Duration::from_secs(2))
                .with_cleanup_timeout(Duration::from_secs(2)),
        )
}

fn runner_for(server: &MockServer) -> Runner {
    let client: Arc<dyn GenerativeModel> = Arc::new(GeminiClient::new(config_for(server)).unwrap());
    Runner::new(
        client,
        PromptTemplates::builtin(),
        MODEL,
        Duration::from_secs(10),
    )
}

#[tokio::test]
async fn test_prompt_mode_sends_rendered_template() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(GENERATE_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(text_response("Host: Welcome!")))
        .expect(1)
        .mount(&server)
        .await;

    let text = runner_for(&server)
        .run(&CallContext::new(), "Rust ownership basics", Some("dialogue"))
        .await
        .unwrap();

    assert_eq!(text, "Host: Welcome!");

    let requests = server.received_requests().await.unwrap();
    let body: Value = serde_json::from_slice(&requests[0].body).unwrap();
    let prompt = body["contents"][0]["parts"][0]["text"].as_str().unwrap();
    assert!(prompt.contains("Rust ownership basics"));
    assert!(prompt.contains("Host:"));
    assert!(!prompt.contains("{content}"));
    assert_eq!(body["generationConfig"]["temperature"].as_f64().map(|t| (t * 10.0).round()), Some(7.0));
}

#[tokio::test]
async fn test_unknown_mode_never_reaches_the_network() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(text_response("unused")))
        .expect(0)
        .mount(&server)
        .await;

    let err = runner_for(&server)
        .run(&CallContext::new(), "anything", Some("haiku"))
        .await
        .unwrap_err();

    assert!(format!("{err:#}").contains("haiku"));
}

#[tokio::test]
async fn test_blocked_answer_surfaces_reason() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(GENERATE_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "candidates": [{ "finishReason": "SAFETY" }]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let err = runner_for(&server)
        .run(&CallContext::new(), "hello", None)
        .await
        .unwrap_err();

    assert!(format!("{err:#}").contains("SAFETY"));
}

#[tokio::test]
async fn test_large_attachment_round_trip_through_files_api() {
    let server = MockServer::start().await;
    let session_url = format!("{}/upload-session/big", server.uri());
    let file_uri = format!("{}/v1beta/files/big", server.uri());

    Mock::given(method("POST"))
        .and(path("/upload/v1beta/files"))
        .respond_with(ResponseTemplate::new(200).insert_header("x-goog-upload-url", session_url.as_str()))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/upload-session/big"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "file": {
                "name": "files/big",
                "mimeType": "image/png",
                "uri": file_uri,
                "state": "PROCESSING"
            }
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1beta/files/big"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "name": "files/big",
            "mimeType": "image/png",
            "uri": file_uri,
            "state": "ACTIVE"
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(GENERATE_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(text_response("A red square.")))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/v1beta/files/big"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(1)
        .mount(&server)
        .await;

    let result = runner_for(&server)
        .run_with_parts(
            &CallContext::new(),
            "Describe the image",
            vec![Part::inline("image/png", vec![0xAB; 256])],
            &GenerationOptions::new().with_seed(7),
        )
        .await
        .unwrap();

    assert_eq!(result.text, "A red square.");

    let requests = server.received_requests().await.unwrap();
    let generate = requests
        .iter()
        .find(|request| request.url.path() == GENERATE_PATH)
        .unwrap();
    let body: Value = serde_json::from_slice(&generate.body).unwrap();
    let parts = &body["contents"][0]["parts"];
    assert_eq!(parts[0]["text"], "Describe the image");
    assert_eq!(parts[1]["fileData"]["fileUri"], file_uri.as_str());
    assert_eq!(parts[1]["fileData"]["mimeType"], "image/png");
    assert!(parts[1].get("inlineData").is_none());
    assert_eq!(body["generationConfig"]["seed"], 7);
}

#[tokio::test]
async fn test_small_attachment_is_sent_inline_as_base64() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(GENERATE_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(text_response("tiny")))
        .expect(1)
        .mount(&server)
        .await;

    runner_for(&server)
        .run_with_parts(
            &CallContext::new(),
            "What is this?",
            vec![Part::inline("text/plain", b"hello".to_vec())],
            &GenerationOptions::new(),
        )
        .await
        .unwrap();

    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 1);
    let body: Value = serde_json::from_slice(&requests[0].body).unwrap();
    assert_eq!(body["contents"][0]["parts"][1]["inlineData"]["data"], "aGVsbG8=");
    assert_eq!(body["contents"][0]["parts"][1]["inlineData"]["mimeType"], "text/plain");
}
