use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

use super::input::read_process_input;
use super::output::{print_response, waiting_spinner};
use super::GlobalArgs;
use crate::services::gemini::{CallContext, GenerationOptions, GenerationResult, Part};

pub struct GenericArgs {
    pub text: Vec<String>,
    pub files: Vec<PathBuf>,
    pub aspect_ratio: Option<String>,
    pub seed: Option<i32>,
    pub system: Option<String>,
}

pub async fn handle_generic_command(
    global: &GlobalArgs,
    ctx: &CallContext,
    args: GenericArgs,
) -> Result<()> {
    let input = read_process_input(&args.text)?;
    let runner = global.build_runner()?;

    let multimodal = !args.files.is_empty()
        || args.aspect_ratio.is_some()
        || args.seed.is_some()
        || args.system.is_some();

    let attachments = args
        .files
        .iter()
        .map(|path| load_attachment(path))
        .collect::<Result<Vec<_>>>()?;

    let spinner = waiting_spinner(runner.model_name());
    let text = if !multimodal {
        runner.run(ctx, &input, None).await
    } else {
        let mut options = GenerationOptions::new();
        options.aspect_ratio = args.aspect_ratio;
        options.seed = args.seed;
        options.system_prompt = args.system;

        runner
            .run_with_parts(ctx, &input, attachments, &options)
            .await
            .map(|result| describe_result(&result))
    };
    if let Some(pb) = spinner {
        pb.finish_and_clear();
    }
    let text = text?;

    print_response(&text, runner.model_name()).context("Failed to write response to stdout")
}

/// Reads a file into an inline part, guessing its MIME type from the extension.
pub fn load_attachment(path: &Path) -> Result<Part> {
    let data = std::fs::read(path)
        .with_context(|| format!("Failed to read attachment: {}", path.display()))?;
    let mime_type = mime_guess::from_path(path)
        .first_or_octet_stream()
        .essence_str()
        .to_string();

    tracing::debug!(
        path = %path.display(),
        mime_type = %mime_type,
        size = data.len(),
        "Loaded attachment"
    );

    Ok(Part::inline(mime_type, data))
}

fn describe_result(result: &GenerationResult) -> String {
    let blobs = result.raw_response.inline_blobs();
    if blobs.is_empty() {
        return result.text.clone();
    }

    let summary = blobs
        .iter()
        .map(|blob| format!("{} ({} bytes)", blob.mime_type, blob.data.len()))
        .collect::<Vec<_>>()
        .join(", ");

    if result.text.is_empty() {
        format!("[model returned inline data: {summary}]")
    } else {
        format!("{}\n\n[model returned inline data: {summary}]", result.text)
    }
}
