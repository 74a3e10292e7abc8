//! Environment variable constants used throughout the application
//!
//! This module centralizes all environment variable names so the CLI, the
//! config loader and the client agree on them.

/// Logging configuration
pub mod logging {
    /// Log level configuration (e.g., "debug", "info", "warn", "error")
    pub const LOG_LEVEL: &str = "AI_CLIENT_LOG_LEVEL";

    /// Log file path for file-based logging
    pub const LOG_FILE: &str = "AI_CLIENT_LOG_FILE";

    /// Disable colored output (follows the NO_COLOR standard)
    pub const NO_COLOR: &str = "NO_COLOR";
}

/// External API configuration
pub mod apis {
    /// Gemini API key, checked first
    pub const GEMINI_API_KEY: &str = "GEMINI_API_KEY";

    /// Google API key, used when GEMINI_API_KEY is unset
    pub const GOOGLE_API_KEY: &str = "GOOGLE_API_KEY";
}

/// Overrides for CLI defaults
pub mod defaults {
    /// Model used when --model is not given
    pub const MODEL: &str = "AI_CLIENT_MODEL";

    /// Request timeout in seconds when --timeout is not given
    pub const TIMEOUT: &str = "AI_CLIENT_TIMEOUT";
}
