use super::errors::{GeminiError, RejectReason};
use super::models::GenerateContentResponse;

/// How strictly a response without text is treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractionMode {
    /// Plain text calls: a response without text is unusable.
    TextOnly,
    /// Calls that may legitimately answer with non-text parts only.
    Multimodal,
}

/// Pulls the first non-empty text part out of the first candidate.
pub fn extract_text(
    response: &GenerateContentResponse,
    mode: ExtractionMode,
) -> Result<String, GeminiError> {
    let candidate = response
        .candidates
        .first()
        .ok_or_else(|| GeminiError::rejected(RejectReason::EmptyResponse))?;

    if !candidate.finished_normally() {
        let reason = candidate.finish_reason.clone().unwrap_or_default();
        return Err(GeminiError::rejected(RejectReason::Blocked(reason)));
    }

    let parts = match &candidate.content {
        Some(content) if !content.parts.is_empty() => &content.parts,
        _ => {
            return match mode {
                ExtractionMode::Multimodal => Ok(String::new()),
                ExtractionMode::TextOnly => Err(GeminiError::rejected(RejectReason::EmptyContent)),
            }
        }
    };

    match parts
        .iter()
        .filter_map(|part| part.as_text())
        .find(|text| !text.is_empty())
    {
        Some(text) => Ok(text.to_string()),
        None => match mode {
            ExtractionMode::Multimodal => Ok(String::new()),
            ExtractionMode::TextOnly => Err(GeminiError::rejected(RejectReason::NoText)),
        },
    }
}
