pub mod cli;
pub mod config;
pub mod services;

pub mod env;
pub mod logging;

pub use logging::{init_logging, LoggingConfig};
pub use services::gemini::{
    CallContext, ClientConfig, GeminiClient, GeminiError, GenerationOptions, GenerationResult,
    GenerativeModel,
};
