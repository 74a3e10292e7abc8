use futures::stream::{self, StreamExt};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use uuid::Uuid;

use super::context::CallContext;
use super::errors::GeminiError;
use super::models::{Blob, FileState, Part, RemoteFile, UploadedBlob};
use super::transport::GeminiTransport;

pub const DEFAULT_THRESHOLD_BYTES: usize = 512 * 1024;
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(2);
pub const DEFAULT_POLL_TIMEOUT: Duration = Duration::from_secs(60);
pub const DEFAULT_CLEANUP_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_MAX_CONCURRENT_UPLOADS: usize = 4;

const DISPLAY_NAME_PREFIX: &str = "ai-client";

#[derive(Debug, Clone, PartialEq)]
pub struct OffloadConfig {
    /// Inline parts strictly larger than this are uploaded instead of sent inline.
    pub threshold_bytes: usize,
    pub poll_interval: Duration,
    pub poll_timeout: Duration,
    pub cleanup_timeout: Duration,
    /// Upper bound on simultaneous uploads; 0 gives every oversized part its own slot.
    pub max_concurrent_uploads: usize,
}

impl Default for OffloadConfig {
    fn default() -> Self {
        Self {
            threshold_bytes: DEFAULT_THRESHOLD_BYTES,
            poll_interval: DEFAULT_POLL_INTERVAL,
            poll_timeout: DEFAULT_POLL_TIMEOUT,
            cleanup_timeout: DEFAULT_CLEANUP_TIMEOUT,
            max_concurrent_uploads: DEFAULT_MAX_CONCURRENT_UPLOADS,
        }
    }
}

impl OffloadConfig {
    pub fn with_threshold_bytes(mut self, threshold: usize) -> Self {
        self.threshold_bytes = threshold;
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn with_poll_timeout(mut self, timeout: Duration) -> Self {
        self.poll_timeout = timeout;
        self
    }

    pub fn with_cleanup_timeout(mut self, timeout: Duration) -> Self {
        self.cleanup_timeout = timeout;
        self
    }

    pub fn with_max_concurrent_uploads(mut self, limit: usize) -> Self {
        self.max_concurrent_uploads = limit;
        self
    }

    pub fn is_oversized(&self, blob: &Blob) -> bool {
        blob.data.len() > self.threshold_bytes
    }
}

/// Blobs uploaded during a single call that still have to be deleted.
#[derive(Debug, Clone, Default)]
pub struct BlobLedger {
    blobs: Arc<Mutex<Vec<UploadedBlob>>>,
}

impl BlobLedger {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<UploadedBlob>> {
        self.blobs.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn record(&self, blob: UploadedBlob) {
        self.lock().push(blob);
    }

    pub fn set_state(&self, name: &str, state: FileState) {
        if let Some(blob) = self.lock().iter_mut().find(|blob| blob.name == name) {
            blob.state = state;
        }
    }

    pub fn remove(&self, name: &str) -> Option<UploadedBlob> {
        let mut blobs = self.lock();
        let index = blobs.iter().position(|blob| blob.name == name)?;
        Some(blobs.remove(index))
    }

    pub fn take(&self) -> Vec<UploadedBlob> {
        std::mem::take(&mut *self.lock())
    }

    pub fn snapshot(&self) -> Vec<UploadedBlob> {
        self.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}

/// Moves oversized inline payloads to provider storage and back out again.
pub struct Offloader<T: GeminiTransport + ?Sized + 'static> {
    transport: Arc<T>,
    config: OffloadConfig,
}

impl<T: GeminiTransport + ?Sized + 'static> Clone for Offloader<T> {
    fn clone(&self) -> Self {
        Self {
            transport: Arc::clone(&self.transport),
            config: self.config.clone(),
        }
    }
}

impl<T: GeminiTransport + ?Sized + 'static> Offloader<T> {
    pub fn new(transport: Arc<T>, config: OffloadConfig) -> Self {
        Self { transport, config }
    }

    pub fn config(&self) -> &OffloadConfig {
        &self.config
    }

    /// Returns a copy of `parts` in which every oversized inline part has been
    /// replaced by a reference to an uploaded, processed file.
    ///
    /// Every upload is recorded in `ledger` as soon as it exists remotely, so
    /// the caller can delete it whatever the outcome.
    pub async fn offload(
        &self,
        ctx: &CallContext,
        parts: &[Part],
        ledger: &BlobLedger,
    ) -> Result<Vec<Part>, GeminiError> {
        let mut rewritten = parts.to_vec();

        let oversized: Vec<(usize, Blob)> = parts
            .iter()
            .enumerate()
            .filter_map(|(index, part)| match part {
                Part::InlineData { inline_data } if self.config.is_oversized(inline_data) => {
                    Some((index, inline_data.clone()))
                }
                _ => None,
            })
            .collect();

        if oversized.is_empty() {
            return Ok(rewritten);
        }

        let limit = match self.config.max_concurrent_uploads {
            0 => oversized.len(),
            cap => cap.min(oversized.len()),
        };

        tracing::info!(
            count = oversized.len(),
            concurrency = limit,
            threshold_bytes = self.config.threshold_bytes,
            "Offloading oversized inline parts"
        );

        // Uploads share one child context; the first failure cancels it so
        // siblings unwind through the token and record what they created.
        let group = ctx.child();
        let group_ref = &group;

        let outcomes: Vec<Result<(usize, Part), GeminiError>> = stream::iter(oversized)
            .map(move |(index, blob)| async move {
                let result = self.upload_one(group_ref, &blob, ledger).await;
                if result.is_err() {
                    group_ref.cancel();
                }
                result.map(|part| (index, part))
            })
            .buffer_unordered(limit)
            .collect()
            .await;

        let mut failure: Option<GeminiError> = None;
        for outcome in outcomes {
            match outcome {
                Ok((index, part)) => rewritten[index] = part,
                Err(err) => {
                    // Prefer the error that triggered the cancellation.
                    let replace = match &failure {
                        None => true,
                        Some(existing) => existing.is_cancellation() && !err.is_cancellation(),
                    };
                    if replace {
                        failure = Some(err);
                    }
                }
            }
        }

        match failure {
            Some(err) => Err(err),
            None => Ok(rewritten),
        }
    }

    async fn upload_one(
        &self,
        ctx: &CallContext,
        blob: &Blob,
        ledger: &BlobLedger,
    ) -> Result<Part, GeminiError> {
        let display_name = format!("{DISPLAY_NAME_PREFIX}-{}", Uuid::new_v4());

        let remote = ctx
            .run(
                self.transport
                    .upload_file(blob.data.clone(), &blob.mime_type, &display_name),
            )
            .await
            .map_err(|err| {
                if err.is_cancellation() {
                    err
                } else {
                    GeminiError::UploadFailed {
                        source: Box::new(err),
                    }
                }
            })?;

        tracing::debug!(
            name = %remote.name,
            display_name = %display_name,
            size = blob.data.len(),
            state = ?remote.state,
            "Uploaded inline payload"
        );

        ledger.record(UploadedBlob::from_remote(&remote, &blob.mime_type));

        if remote.state == FileState::Active {
            return Ok(Part::file(&blob.mime_type, remote.uri));
        }

        match tokio::time::timeout(
            self.config.poll_timeout,
            self.wait_until_active(ctx, &remote.name, ledger),
        )
        .await
        {
            Ok(Ok(file)) => {
                ledger.set_state(&remote.name, FileState::Active);
                let uri = if file.uri.is_empty() { remote.uri } else { file.uri };
                Ok(Part::file(&blob.mime_type, uri))
            }
            Ok(Err(err)) => Err(err),
            Err(_) => {
                tracing::warn!(
                    name = %remote.name,
                    timeout_ms = self.config.poll_timeout.as_millis() as u64,
                    "File processing timed out, deleting in background"
                );
                ledger.remove(&remote.name);
                self.spawn_delete(remote.name.clone());
                Err(GeminiError::ProcessingTimeout {
                    name: remote.name,
                    timeout_ms: self.config.poll_timeout.as_millis() as u64,
                })
            }
        }
    }

    async fn wait_until_active(
        &self,
        ctx: &CallContext,
        name: &str,
        ledger: &BlobLedger,
    ) -> Result<RemoteFile, GeminiError> {
        loop {
            ctx.sleep(self.config.poll_interval).await?;

            let file = ctx.run(self.transport.get_file(name)).await?;

            match file.state {
                FileState::Active => return Ok(file),
                FileState::Failed => {
                    ledger.set_state(name, FileState::Failed);
                    return Err(GeminiError::ProcessingFailed {
                        name: name.to_string(),
                    });
                }
                FileState::Processing | FileState::Uploading => {
                    tracing::debug!(name, "File still processing");
                    ledger.set_state(name, file.state);
                }
                state => {
                    tracing::warn!(name, ?state, "Unexpected file state while polling");
                }
            }
        }
    }

    fn spawn_delete(&self, name: String) {
        let transport = Arc::clone(&self.transport);
        let timeout = self.config.cleanup_timeout;

        tokio::spawn(async move {
            delete_with_timeout(transport.as_ref(), &name, timeout).await;
        });
    }

    /// Deletes every blob still recorded in `ledger`.
    ///
    /// Runs independently of any caller context; failures are only logged.
    pub async fn cleanup(&self, ledger: &BlobLedger) {
        let blobs = ledger.take();
        if blobs.is_empty() {
            return;
        }

        tracing::debug!(count = blobs.len(), "Deleting uploaded files");

        let timeout = self.config.cleanup_timeout;
        let transport = self.transport.as_ref();
        futures::future::join_all(
            blobs
                .iter()
                .map(|blob| delete_with_timeout(transport, &blob.name, timeout)),
        )
        .await;
    }
}

async fn delete_with_timeout<T: GeminiTransport + ?Sized>(
    transport: &T,
    name: &str,
    timeout: Duration,
) {
    match tokio::time::timeout(timeout, transport.delete_file(name)).await {
        Ok(Ok(())) => tracing::debug!(name, "Deleted uploaded file"),
        Ok(Err(err)) => tracing::warn!(name, error = %err, "Failed to delete uploaded file"),
        Err(_) => tracing::warn!(
            name,
            timeout_ms = timeout.as_millis() as u64,
            "Timed out deleting uploaded file"
        ),
    }
}

/// Owns the ledger for one call and guarantees its blobs get deleted.
///
/// `finish` deletes inline; if the guard is dropped unfinished (the call's
/// future was abandoned) the deletes are spawned onto the current runtime.
pub struct CleanupGuard<T: GeminiTransport + ?Sized + 'static> {
    offloader: Offloader<T>,
    ledger: BlobLedger,
    finished: bool,
}

impl<T: GeminiTransport + ?Sized + 'static> CleanupGuard<T> {
    pub fn new(offloader: Offloader<T>) -> Self {
        Self {
            offloader,
            ledger: BlobLedger::new(),
            finished: false,
        }
    }

    pub fn ledger(&self) -> &BlobLedger {
        &self.ledger
    }

    pub async fn finish(mut self) {
        self.finished = true;
        self.offloader.cleanup(&self.ledger).await;
    }
}

impl<T: GeminiTransport + ?Sized + 'static> Drop for CleanupGuard<T> {
    fn drop(&mut self) {
        if self.finished || self.ledger.is_empty() {
            return;
        }

        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                let offloader = self.offloader.clone();
                let ledger = self.ledger.clone();
                handle.spawn(async move {
                    offloader.cleanup(&ledger).await;
                });
            }
            Err(_) => {
                tracing::warn!(
                    count = self.ledger.len(),
                    "No runtime available, uploaded files were not deleted"
                );
            }
        }
    }
}
