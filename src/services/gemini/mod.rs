pub mod client;
pub mod context;
pub mod errors;
pub mod extract;
pub mod models;
pub mod offload;
pub mod retry;
pub mod transport;

pub use client::{
    ClientConfig, GeminiClient, GenerationOptions, GenerationResult, GenerativeModel,
    DEFAULT_CANDIDATE_COUNT, DEFAULT_TEMPERATURE, DEFAULT_TOP_P,
};
pub use context::CallContext;
pub use errors::{classify, ApiCode, ErrorClass, ErrorKind, GeminiError, RejectReason, RetryDecision};
pub use extract::{extract_text, ExtractionMode};
pub use models::{
    Blob, Candidate, Content, FileData, FileState, GenerateContentRequest,
    GenerateContentResponse, GenerationConfig, ImageConfig, Part, RemoteFile, SafetySetting,
    UploadedBlob, UsageMetadata,
};
pub use offload::{BlobLedger, CleanupGuard, OffloadConfig, Offloader};
pub use retry::{with_retry, RetryHandler, RetryPolicy};
pub use transport::{GeminiTransport, HttpTransport};
