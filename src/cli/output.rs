use chrono::{DateTime, Local};
use indicatif::{ProgressBar, ProgressStyle};
use std::io::{self, Write};
use std::time::Duration;

const SEPARATOR_HEAVY: &str = "==============================================";
const SEPARATOR_LIGHT: &str = "----------------------------------------------";

pub fn format_response(text: &str, model: &str, timestamp: DateTime<Local>) -> String {
    let mut out = String::new();

    out.push('\n');
    out.push_str(SEPARATOR_HEAVY);
    out.push_str("\nResponse from AI model:\n");
    out.push_str(SEPARATOR_HEAVY);
    out.push('\n');

    out.push_str(text);

    out.push_str("\n\n");
    out.push_str(SEPARATOR_LIGHT);
    out.push_str(&format!("\nModel: {model}"));
    out.push_str(&format!(
        "\nGenerated at: {}",
        timestamp.format("%Y-%m-%d %H:%M:%S")
    ));
    out.push('\n');
    out.push_str(SEPARATOR_LIGHT);
    out.push('\n');

    out
}

pub fn print_response(text: &str, model: &str) -> io::Result<()> {
    let mut stdout = io::stdout().lock();
    stdout.write_all(format_response(text, model, Local::now()).as_bytes())?;
    stdout.flush()
}

/// Spinner on stderr while a request is in flight; `None` when stderr is not a terminal.
pub fn waiting_spinner(model: &str) -> Option<ProgressBar> {
    if !atty::is(atty::Stream::Stderr) {
        return None;
    }

    let pb = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.green} {msg} [{elapsed}]") {
        pb.set_style(style);
    }
    pb.set_message(format!("Generating response with {model}..."));
    pb.enable_steady_tick(Duration::from_millis(120));
    Some(pb)
}
