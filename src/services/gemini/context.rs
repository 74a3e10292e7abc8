use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use super::errors::GeminiError;

/// Cancellation and deadline signal carried through every client call.
///
/// Children observe their parent's cancellation, never the reverse, and
/// inherit the earlier of the two deadlines.
#[derive(Debug, Clone, Default)]
pub struct CallContext {
    token: CancellationToken,
    deadline: Option<Instant>,
}

impl CallContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// A timeout too large to represent leaves the context without a deadline.
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            token: CancellationToken::new(),
            deadline: Instant::now().checked_add(timeout),
        }
    }

    pub fn child(&self) -> Self {
        Self {
            token: self.token.child_token(),
            deadline: self.deadline,
        }
    }

    pub fn child_with_timeout(&self, timeout: Duration) -> Self {
        let candidate = Instant::now().checked_add(timeout);
        let deadline = match (self.deadline, candidate) {
            (Some(existing), Some(candidate)) => Some(existing.min(candidate)),
            (existing, None) => existing,
            (None, candidate) => candidate,
        };

        Self {
            token: self.token.child_token(),
            deadline,
        }
    }

    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// The error this context would surface right now, if it is done.
    pub fn err(&self) -> Option<GeminiError> {
        if self.token.is_cancelled() {
            return Some(GeminiError::Cancelled);
        }
        match self.deadline {
            Some(deadline) if Instant::now() >= deadline => Some(GeminiError::DeadlineExceeded),
            _ => None,
        }
    }

    /// Resolves once the context is cancelled or its deadline passes.
    pub async fn done(&self) -> GeminiError {
        match self.deadline {
            Some(deadline) => {
                tokio::select! {
                    _ = self.token.cancelled() => GeminiError::Cancelled,
                    _ = tokio::time::sleep_until(deadline) => GeminiError::DeadlineExceeded,
                }
            }
            None => {
                self.token.cancelled().await;
                GeminiError::Cancelled
            }
        }
    }

    /// Drives `fut` until it completes or the context ends, whichever is first.
    pub async fn run<F, T>(&self, fut: F) -> Result<T, GeminiError>
    where
        F: Future<Output = Result<T, GeminiError>>,
    {
        if let Some(err) = self.err() {
            return Err(err);
        }

        tokio::select! {
            biased;
            err = self.done() => Err(err),
            result = fut => result,
        }
    }

    pub async fn sleep(&self, duration: Duration) -> Result<(), GeminiError> {
        self.run(async {
            tokio::time::sleep(duration).await;
            Ok(())
        })
        .await
    }
}
