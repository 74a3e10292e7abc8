pub mod generic;
pub mod input;
pub mod output;
pub mod prompt;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::runtime::Runtime;
use tracing::Level;

use crate::config::{AppConfig, PromptError};
use crate::logging::{init_logging, LoggingConfig};
use crate::services::gemini::{CallContext, ErrorKind, GeminiClient, GeminiError};
use crate::services::runner::Runner;
use generic::GenericArgs;
use input::InputError;

pub const EXIT_FAILURE: i32 = 1;
pub const EXIT_CONFIGURATION: i32 = 2;
pub const EXIT_INVALID_INPUT: i32 = 3;
pub const EXIT_CONTENT_BLOCKED: i32 = 4;

#[derive(Parser)]
#[command(name = "ai-client")]
#[command(about = "Send text to the Gemini API and print the response")]
#[command(version)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalArgs,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Args, Debug, Clone, Default)]
pub struct GlobalArgs {
    /// Gemini model name [default: gemini-2.5-flash]
    #[arg(short, long, global = true)]
    pub model: Option<String>,

    /// Request timeout in seconds [default: 60]
    #[arg(short, long, global = true)]
    pub timeout: Option<u64>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Send the input to the model as-is, without a prompt template
    Generic {
        /// Input text (read from stdin when omitted)
        text: Vec<String>,
        /// Attach a file (repeatable); large files are uploaded automatically
        #[arg(short = 'f', long = "file")]
        files: Vec<PathBuf>,
        /// Aspect ratio for image output, e.g. 16:9
        #[arg(long)]
        aspect_ratio: Option<String>,
        /// Sampling seed
        #[arg(long)]
        seed: Option<i32>,
        /// System instruction
        #[arg(long)]
        system: Option<String>,
    },
    /// Expand the input through a prompt template before sending it
    Prompt {
        /// Input text (read from stdin when omitted)
        text: Vec<String>,
        /// Template mode (solo, dialogue, or one defined in the config file)
        #[arg(short = 'd', long, default_value = "solo")]
        mode: String,
    },
    /// List available prompt template modes
    Templates,
}

impl GlobalArgs {
    pub fn build_runner(&self) -> Result<Runner> {
        let config = AppConfig::resolve(self.model.as_deref(), self.timeout)?;
        let client = GeminiClient::new(config.client_config()?)?;

        Ok(Runner::new(
            Arc::new(client),
            config.templates,
            config.model,
            config.timeout,
        ))
    }

    fn logging_config(&self) -> LoggingConfig {
        let config = LoggingConfig::from_env();
        if self.verbose {
            config.with_level(Level::DEBUG)
        } else {
            config
        }
    }
}

impl Cli {
    pub fn run(self) -> Result<()> {
        let _log_guard = init_logging(self.global.logging_config())?;
        let rt = Runtime::new()?;

        rt.block_on(async {
            let ctx = CallContext::new();
            let interrupt = ctx.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    tracing::warn!("Interrupted, cancelling request");
                    interrupt.cancel();
                }
            });

            let global = self.global;
            match self.command {
                Commands::Generic {
                    text,
                    files,
                    aspect_ratio,
                    seed,
                    system,
                } => {
                    generic::handle_generic_command(
                        &global,
                        &ctx,
                        GenericArgs {
                            text,
                            files,
                            aspect_ratio,
                            seed,
                            system,
                        },
                    )
                    .await
                }
                Commands::Prompt { text, mode } => {
                    prompt::handle_prompt_command(&global, &ctx, text, mode).await
                }
                Commands::Templates => prompt::handle_templates_command(&global),
            }
        })
    }
}

/// Process exit status for a failed run.
pub fn exit_code(err: &anyhow::Error) -> i32 {
    for cause in err.chain() {
        if let Some(gemini) = cause.downcast_ref::<GeminiError>() {
            return match gemini.kind() {
                ErrorKind::Configuration => EXIT_CONFIGURATION,
                ErrorKind::InvalidInput => EXIT_INVALID_INPUT,
                ErrorKind::ContentBlocked => EXIT_CONTENT_BLOCKED,
                _ => EXIT_FAILURE,
            };
        }
        if cause.is::<PromptError>() || cause.is::<InputError>() {
            return EXIT_INVALID_INPUT;
        }
    }
    EXIT_FAILURE
}
