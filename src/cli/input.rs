use std::io::{self, Read};
use thiserror::Error;

const USAGE_HINT: &str = "Usage:\n  \
    1. Pass the text as arguments:  ai-client generic \"your text\"\n  \
    2. Pipe it through stdin:       cat input.txt | ai-client generic";

#[derive(Debug, Error)]
pub enum InputError {
    #[error("No input text was provided.\n\n{}", USAGE_HINT)]
    Empty,

    #[error("No input text was provided and stdin is a terminal.\n\n{}", USAGE_HINT)]
    Interactive,

    #[error("Failed to read from stdin: {0}")]
    Read(#[from] io::Error),
}

/// Reads the text to send, preferring command-line arguments over stdin.
pub fn read_input<R: Read>(
    args: &[String],
    mut stdin: R,
    stdin_is_terminal: bool,
) -> Result<String, InputError> {
    if !args.is_empty() {
        tracing::debug!(count = args.len(), "Reading input from arguments");
        let joined = args.join(" ");
        if joined.trim().is_empty() {
            return Err(InputError::Empty);
        }
        return Ok(joined);
    }

    if stdin_is_terminal {
        return Err(InputError::Interactive);
    }

    tracing::debug!("Reading input from stdin");
    let mut buffer = String::new();
    stdin.read_to_string(&mut buffer)?;

    if buffer.trim().is_empty() {
        return Err(InputError::Empty);
    }

    Ok(buffer)
}

/// Reads input from the process arguments or the real stdin.
pub fn read_process_input(args: &[String]) -> Result<String, InputError> {
    read_input(args, io::stdin().lock(), atty::is(atty::Stream::Stdin))
}
