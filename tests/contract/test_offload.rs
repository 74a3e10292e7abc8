#[path = "../common/mod.rs"]
mod common;

use ai_client::services::gemini::{
    ApiCode, CallContext, ErrorKind, FileState, GeminiClient, GeminiError, GenerationOptions,
    Part,
};
use common::{fast_config, fast_offload, FakeTransport, Scripted};
use std::sync::Arc;
use std::time::{Duration, Instant};

const MODEL: &str = "gemini-2.5-flash";

fn big(mime_type: &str, byte: u8) -> Part {
    Part::inline(mime_type, vec![byte; 2048])
}

fn client_with(transport: &Arc<FakeTransport>) -> GeminiClient<FakeTransport> {
    GeminiClient::with_transport(fast_config(), Arc::clone(transport)).unwrap()
}

#[tokio::test]
async fn test_oversized_part_is_uploaded_polled_and_deleted() {
    let transport = Arc::new(
        FakeTransport::new().with_poll_states(vec![FileState::Processing, FileState::Active]),
    );
    let client = client_with(&transport);

    let result = client
        .generate_with_parts(
            &CallContext::new(),
            MODEL,
            &[Part::text("what is in this picture?"), big("image/png", 1)],
            &GenerationOptions::new(),
        )
        .await
        .unwrap();

    assert_eq!(result.text, "default answer");
    assert_eq!(transport.upload_calls(), 1);
    assert_eq!(transport.get_calls(), 2);
    assert_eq!(transport.generate_calls(), 1);
    assert_eq!(transport.deleted(), vec!["files/file-0".to_string()]);

    let sent = &transport.requests()[0].contents[0].parts;
    assert_eq!(sent[0].as_text(), Some("what is in this picture?"));
    assert_eq!(
        sent[1],
        Part::file("image/png", "https://files.test/v1beta/files/file-0")
    );
}

#[tokio::test]
async fn test_poll_timeout_skips_generation_and_deletes_in_background() {
    let transport =
        Arc::new(FakeTransport::new().with_poll_states(vec![FileState::Processing]));
    let config = fast_config().with_offload(
        fast_offload().with_poll_timeout(Duration::from_millis(40)),
    );
    let client = GeminiClient::with_transport(config, Arc::clone(&transport)).unwrap();

    let err = client
        .generate_with_parts(
            &CallContext::new(),
            MODEL,
            &[big("video/mp4", 2)],
            &GenerationOptions::new(),
        )
        .await
        .unwrap_err();

    assert!(matches!(err, GeminiError::ProcessingTimeout { ref name, .. } if name == "files/file-0"));
    assert_eq!(err.kind(), ErrorKind::Offload);
    assert_eq!(transport.generate_calls(), 0);

    let deleted = transport.wait_for_deletes(1).await;
    assert_eq!(deleted, vec!["files/file-0".to_string()]);
}

#[tokio::test]
async fn test_every_upload_is_deleted_after_success() {
    let transport = Arc::new(FakeTransport::new().with_upload_state(FileState::Active));
    let config = fast_config().with_offload(fast_offload().with_max_concurrent_uploads(0));
    let client = GeminiClient::with_transport(config, Arc::clone(&transport)).unwrap();

    let parts = vec![
        big("image/png", 1),
        Part::text("compare these"),
        big("image/jpeg", 2),
        big("application/pdf", 3),
    ];

    client
        .generate_with_parts(&CallContext::new(), MODEL, &parts, &GenerationOptions::new())
        .await
        .unwrap();

    assert_eq!(transport.upload_calls(), 3);
    assert_eq!(transport.get_calls(), 0);

    let mut deleted = transport.deleted();
    deleted.sort();
    assert_eq!(deleted, vec!["files/file-0", "files/file-1", "files/file-2"]);

    let sent = &transport.requests()[0].contents[0].parts;
    assert!(matches!(sent[0], Part::FileData { ref file_data } if file_data.mime_type == "image/png"));
    assert_eq!(sent[1].as_text(), Some("compare these"));
    assert!(matches!(sent[2], Part::FileData { ref file_data } if file_data.mime_type == "image/jpeg"));
    assert!(matches!(sent[3], Part::FileData { ref file_data } if file_data.mime_type == "application/pdf"));

    // The caller's parts are untouched.
    assert!(matches!(parts[0], Part::InlineData { .. }));
}

#[tokio::test]
async fn test_every_upload_is_deleted_after_generation_failure() {
    let transport = Arc::new(
        FakeTransport::new()
            .with_upload_state(FileState::Active)
            .with_generate(vec![Scripted::Api(ApiCode::InvalidArgument)]),
    );
    let client = client_with(&transport);

    let err = client
        .generate_with_parts(
            &CallContext::new(),
            MODEL,
            &[big("image/png", 1), big("image/png", 2)],
            &GenerationOptions::new(),
        )
        .await
        .unwrap_err();

    assert_eq!(err.api_code(), Some(ApiCode::InvalidArgument));
    assert_eq!(transport.deleted().len(), 2);
}

#[tokio::test]
async fn test_upload_failure_fails_the_call() {
    let transport = Arc::new(
        FakeTransport::new()
            .with_upload_state(FileState::Active)
            .failing_upload_for("application/pdf"),
    );
    let client = client_with(&transport);

    let err = client
        .generate_with_parts(
            &CallContext::new(),
            MODEL,
            &[big("image/png", 1), big("application/pdf", 2)],
            &GenerationOptions::new(),
        )
        .await
        .unwrap_err();

    assert!(matches!(err, GeminiError::UploadFailed { .. }));
    assert_eq!(err.api_code(), Some(ApiCode::PermissionDenied));
    assert_eq!(transport.generate_calls(), 0);
    assert_eq!(transport.deleted().len(), transport.files_created());
}

#[tokio::test]
async fn test_failed_processing_is_reported_and_cleaned_up() {
    let transport = Arc::new(
        FakeTransport::new().with_poll_states(vec![FileState::Processing, FileState::Failed]),
    );
    let client = client_with(&transport);

    let err = client
        .generate_with_parts(
            &CallContext::new(),
            MODEL,
            &[big("audio/wav", 4)],
            &GenerationOptions::new(),
        )
        .await
        .unwrap_err();

    assert!(matches!(err, GeminiError::ProcessingFailed { ref name } if name == "files/file-0"));
    assert_eq!(transport.generate_calls(), 0);
    assert_eq!(transport.deleted(), vec!["files/file-0".to_string()]);
}

#[tokio::test]
async fn test_cancellation_while_polling_still_cleans_up() {
    let transport =
        Arc::new(FakeTransport::new().with_poll_states(vec![FileState::Processing]));
    let config = fast_config().with_offload(fast_offload().with_poll_timeout(Duration::from_secs(10)));
    let client = GeminiClient::with_transport(config, Arc::clone(&transport)).unwrap();

    let ctx = CallContext::new();
    let canceller = ctx.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(30)).await;
        canceller.cancel();
    });

    let err = client
        .generate_with_parts(&ctx, MODEL, &[big("image/png", 5)], &GenerationOptions::new())
        .await
        .unwrap_err();

    assert!(matches!(err, GeminiError::Cancelled));
    assert_eq!(transport.generate_calls(), 0);
    assert_eq!(transport.deleted(), vec!["files/file-0".to_string()]);
}

#[tokio::test]
async fn test_abandoned_call_deletes_uploads_in_background() {
    let transport =
        Arc::new(FakeTransport::new().with_poll_states(vec![FileState::Processing]));
    let config = fast_config().with_offload(fast_offload().with_poll_timeout(Duration::from_secs(10)));
    let client = GeminiClient::with_transport(config, Arc::clone(&transport)).unwrap();

    let task = tokio::spawn(async move {
        client
            .generate_with_parts(
                &CallContext::new(),
                MODEL,
                &[big("image/png", 6)],
                &GenerationOptions::new(),
            )
            .await
    });

    for _ in 0..200 {
        if transport.get_calls() > 0 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    task.abort();

    let deleted = transport.wait_for_deletes(1).await;
    assert_eq!(deleted, vec!["files/file-0".to_string()]);
}

#[tokio::test]
async fn test_small_parts_are_sent_inline() {
    let transport = Arc::new(FakeTransport::new());
    let client = client_with(&transport);

    client
        .generate_with_parts(
            &CallContext::new(),
            MODEL,
            &[Part::text("tiny"), Part::inline("image/png", vec![0u8; 1024])],
            &GenerationOptions::new(),
        )
        .await
        .unwrap();

    assert_eq!(transport.upload_calls(), 0);
    assert!(transport.deleted().is_empty());
    assert!(matches!(
        transport.requests()[0].contents[0].parts[1],
        Part::InlineData { .. }
    ));
}

#[tokio::test]
async fn test_concurrency_cap_of_one_uploads_serially() {
    let transport = Arc::new(
        FakeTransport::new()
            .with_upload_state(FileState::Active)
            .with_upload_delay(Duration::from_millis(20)),
    );
    let config = fast_config().with_offload(fast_offload().with_max_concurrent_uploads(1));
    let client = GeminiClient::with_transport(config, Arc::clone(&transport)).unwrap();

    let started = Instant::now();
    client
        .generate_with_parts(
            &CallContext::new(),
            MODEL,
            &[big("image/png", 1), big("image/png", 2), big("image/png", 3)],
            &GenerationOptions::new(),
        )
        .await
        .unwrap();

    assert_eq!(transport.upload_calls(), 3);
    assert_eq!(transport.max_uploads_in_flight(), 1);
    assert!(started.elapsed() >= Duration::from_millis(60));
    assert_eq!(transport.deleted().len(), 3);
}

#[tokio::test]
async fn test_unbounded_cap_uploads_all_parts_at_once() {
    let transport = Arc::new(
        FakeTransport::new()
            .with_upload_state(FileState::Active)
            .with_upload_delay(Duration::from_millis(20)),
    );
    let config = fast_config().with_offload(fast_offload().with_max_concurrent_uploads(0));
    let client = GeminiClient::with_transport(config, Arc::clone(&transport)).unwrap();

    client
        .generate_with_parts(
            &CallContext::new(),
            MODEL,
            &[big("image/png", 1), big("image/png", 2), big("image/png", 3)],
            &GenerationOptions::new(),
        )
        .await
        .unwrap();

    assert_eq!(transport.max_uploads_in_flight(), 3);
}

#[tokio::test]
async fn test_upload_failure_stops_sibling_polling() {
    let transport = Arc::new(
        FakeTransport::new()
            .with_poll_states(vec![FileState::Processing])
            .with_upload_delay(Duration::from_millis(20))
            .failing_upload_for("application/pdf"),
    );
    let config = fast_config().with_offload(fast_offload().with_poll_timeout(Duration::from_secs(10)));
    let client = GeminiClient::with_transport(config, Arc::clone(&transport)).unwrap();

    let started = Instant::now();
    let err = client
        .generate_with_parts(
            &CallContext::new(),
            MODEL,
            &[big("image/png", 1), big("application/pdf", 2)],
            &GenerationOptions::new(),
        )
        .await
        .unwrap_err();

    assert!(matches!(err, GeminiError::UploadFailed { .. }));
    assert!(started.elapsed() < Duration::from_secs(5));
    assert_eq!(transport.generate_calls(), 0);
    assert_eq!(transport.deleted().len(), transport.files_created());
}
