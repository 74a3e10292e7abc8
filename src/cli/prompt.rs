use anyhow::{Context, Result};

use super::input::read_process_input;
use super::output::{print_response, waiting_spinner};
use super::GlobalArgs;
use crate::config::AppConfig;
use crate::services::gemini::CallContext;

pub async fn handle_prompt_command(
    global: &GlobalArgs,
    ctx: &CallContext,
    text: Vec<String>,
    mode: String,
) -> Result<()> {
    let input = read_process_input(&text)?;
    let runner = global.build_runner()?;

    let spinner = waiting_spinner(runner.model_name());
    let response = runner.run(ctx, &input, Some(&mode)).await;
    if let Some(pb) = spinner {
        pb.finish_and_clear();
    }
    let response = response?;

    print_response(&response, runner.model_name()).context("Failed to write response to stdout")
}

/// Prints every available template mode with its description.
pub fn handle_templates_command(global: &GlobalArgs) -> Result<()> {
    let config = AppConfig::resolve(global.model.as_deref(), global.timeout)?;

    println!("Available prompt modes:");
    for template in config.templates.iter() {
        if template.description.is_empty() {
            println!("  {}", template.name);
        } else {
            println!("  {:<12} {}", template.name, template.description);
        }
    }

    Ok(())
}
