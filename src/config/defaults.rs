use super::prompt_config::PromptTemplate;

pub const DEFAULT_MODEL: &str = "gemini-2.5-flash";
pub const DEFAULT_TIMEOUT_SECS: u64 = 60;

/// Templates available without any configuration
pub fn get_default_templates() -> Vec<PromptTemplate> {
    vec![create_solo_template(), create_dialogue_template()]
}

fn create_solo_template() -> PromptTemplate {
    let template_content = r#"You are a skilled narrator. Rewrite the material below as a script read aloud by a single speaker.

# Material:
{content}

# Instructions:
- Keep every fact from the material; do not invent new ones.
- Use short, spoken-style sentences that are easy to follow by ear.
- Open with a one-sentence overview and close with a brief summary.
- Output only the script, without headings or stage directions."#;

    PromptTemplate::new(
        "solo",
        "Single-speaker narration script built from the input",
        template_content,
    )
}

fn create_dialogue_template() -> PromptTemplate {
    let template_content = r#"You are a script writer. Turn the material below into a natural conversation between two speakers, a host and a guest.

# Material:
{content}

# Instructions:
- The host asks questions and keeps the conversation moving; the guest explains.
- Cover every important point of the material and nothing beyond it.
- Prefix each line with the speaker name followed by a colon, e.g. "Host:" or "Guest:".
- Output only the dialogue."#;

    PromptTemplate::new(
        "dialogue",
        "Two-speaker dialogue script built from the input",
        template_content,
    )
}
