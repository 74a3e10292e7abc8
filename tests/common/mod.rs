//! Scripted in-memory transport shared by the contract tests.
#![allow(dead_code)]

use ai_client::services::gemini::{
    ApiCode, ClientConfig, GeminiError, GeminiTransport, GenerateContentRequest,
    GenerateContentResponse, OffloadConfig, RemoteFile, FileState,
};
use async_trait::async_trait;
use bytes::Bytes;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;
use std::time::Duration;

#[derive(Debug, Clone)]
pub enum Scripted {
    Ok(GenerateContentResponse),
    Api(ApiCode),
}

#[derive(Default)]
pub struct FakeTransport {
    generate_script: Mutex<VecDeque<Scripted>>,
    poll_states: Mutex<VecDeque<FileState>>,
    upload_state: Option<FileState>,
    failing_upload_mime: Option<String>,
    upload_delay: Duration,
    next_file_id: AtomicU32,
    generate_calls: AtomicU32,
    upload_calls: AtomicU32,
    get_calls: AtomicU32,
    uploads_in_flight: AtomicU32,
    max_uploads_in_flight: AtomicU32,
    deleted: Mutex<Vec<String>>,
    requests: Mutex<Vec<GenerateContentRequest>>,
}

impl FakeTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Responses handed out in order; the last one repeats once the script runs out.
    pub fn with_generate(self, script: Vec<Scripted>) -> Self {
        *self.generate_script.lock().unwrap() = script.into();
        self
    }

    /// States returned by successive `get_file` calls; the last one repeats.
    pub fn with_poll_states(self, states: Vec<FileState>) -> Self {
        *self.poll_states.lock().unwrap() = states.into();
        self
    }

    /// State reported by the upload itself (defaults to PROCESSING).
    pub fn with_upload_state(mut self, state: FileState) -> Self {
        self.upload_state = Some(state);
        self
    }

    pub fn failing_upload_for(mut self, mime_type: &str) -> Self {
        self.failing_upload_mime = Some(mime_type.to_string());
        self
    }

    pub fn with_upload_delay(mut self, delay: Duration) -> Self {
        self.upload_delay = delay;
        self
    }

    pub fn generate_calls(&self) -> u32 {
        self.generate_calls.load(Ordering::SeqCst)
    }

    pub fn upload_calls(&self) -> u32 {
        self.upload_calls.load(Ordering::SeqCst)
    }

    pub fn get_calls(&self) -> u32 {
        self.get_calls.load(Ordering::SeqCst)
    }

    /// Highest number of uploads observed running at the same time.
    pub fn max_uploads_in_flight(&self) -> u32 {
        self.max_uploads_in_flight.load(Ordering::SeqCst)
    }

    /// Number of uploads that produced a remote file.
    pub fn files_created(&self) -> usize {
        self.next_file_id.load(Ordering::SeqCst) as usize
    }

    pub fn deleted(&self) -> Vec<String> {
        self.deleted.lock().unwrap().clone()
    }

    pub fn requests(&self) -> Vec<GenerateContentRequest> {
        self.requests.lock().unwrap().clone()
    }

    /// Waits (bounded) for detached deletes to land.
    pub async fn wait_for_deletes(&self, expected: usize) -> Vec<String> {
        for _ in 0..200 {
            if self.deleted.lock().unwrap().len() >= expected {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        self.deleted()
    }

    fn next_or_last<T: Clone>(queue: &Mutex<VecDeque<T>>) -> Option<T> {
        let mut queue = queue.lock().unwrap();
        if queue.len() > 1 {
            queue.pop_front()
        } else {
            queue.front().cloned()
        }
    }
}

#[async_trait]
impl GeminiTransport for FakeTransport {
    async fn generate_content(
        &self,
        _model: &str,
        request: &GenerateContentRequest,
    ) -> Result<GenerateContentResponse, GeminiError> {
        self.generate_calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().unwrap().push(request.clone());

        match Self::next_or_last(&self.generate_script) {
            Some(Scripted::Ok(response)) => Ok(response),
            Some(Scripted::Api(code)) => Err(GeminiError::Api {
                code,
                message: format!("scripted {code}"),
            }),
            None => Ok(GenerateContentResponse::from_text("default answer")),
        }
    }

    async fn upload_file(
        &self,
        data: Bytes,
        mime_type: &str,
        display_name: &str,
    ) -> Result<RemoteFile, GeminiError> {
        self.upload_calls.fetch_add(1, Ordering::SeqCst);

        let running = self.uploads_in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_uploads_in_flight.fetch_max(running, Ordering::SeqCst);
        if !self.upload_delay.is_zero() {
            tokio::time::sleep(self.upload_delay).await;
        }
        self.uploads_in_flight.fetch_sub(1, Ordering::SeqCst);

        if self.failing_upload_mime.as_deref() == Some(mime_type) {
            return Err(GeminiError::Api {
                code: ApiCode::PermissionDenied,
                message: "upload rejected".to_string(),
            });
        }

        let id = self.next_file_id.fetch_add(1, Ordering::SeqCst);
        Ok(RemoteFile {
            name: format!("files/file-{id}"),
            display_name: Some(display_name.to_string()),
            uri: format!("https://files.test/v1beta/files/file-{id}"),
            mime_type: mime_type.to_string(),
            size_bytes: Some(data.len().to_string()),
            state: self.upload_state.unwrap_or(FileState::Processing),
        })
    }

    async fn get_file(&self, name: &str) -> Result<RemoteFile, GeminiError> {
        self.get_calls.fetch_add(1, Ordering::SeqCst);
        let state = Self::next_or_last(&self.poll_states).unwrap_or(FileState::Active);

        Ok(RemoteFile {
            name: name.to_string(),
            display_name: None,
            uri: format!("https://files.test/v1beta/{name}"),
            mime_type: String::new(),
            size_bytes: None,
            state,
        })
    }

    async fn delete_file(&self, name: &str) -> Result<(), GeminiError> {
        self.deleted.lock().unwrap().push(name.to_string());
        Ok(())
    }
}

/// Client config with millisecond-scale timings so tests stay fast.
pub fn fast_config() -> ClientConfig {
    ClientConfig::new("test-key")
        .with_max_retries(3)
        .with_initial_delay(Duration::from_millis(2))
        .with_max_delay(Duration::from_millis(10))
        .with_offload(fast_offload())
}

pub fn fast_offload() -> OffloadConfig {
    OffloadConfig::default()
        .with_threshold_bytes(1024)
        .with_poll_interval(Duration::from_millis(5))
        .with_poll_timeout(Duration::from_millis(500))
        .with_cleanup_timeout(Duration::from_millis(500))
}

pub fn blocked_response(reason: &str) -> GenerateContentResponse {
    let mut response = GenerateContentResponse::from_text("partial");
    response.candidates[0].finish_reason = Some(reason.to_string());
    response
}
