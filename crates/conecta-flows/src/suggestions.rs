use serde::Deserialize;

use conecta_core::provider::{GenerateOptions, GenerateRequest, TextProvider};

use crate::error::FlowError;
use crate::prompts;

/// The welcome screen shows at most four starters.
pub const MAX_SUGGESTIONS: usize = 4;

#[derive(Debug, Deserialize)]
struct SuggestionsPayload {
    messages: Vec<String>,
}

/// Generate Spanish conversation starters grounded in the knowledge base.
/// The model may return more than four; extras are dropped.
pub async fn suggest(provider: &dyn TextProvider, knowledge: &str) -> Result<Vec<String>, FlowError> {
    let request = GenerateRequest::json(
        prompts::suggestions_prompt(knowledge),
        prompts::suggestions_schema(),
    );
    let generated = provider.generate(&request, &GenerateOptions::default()).await?;

    let payload: SuggestionsPayload = serde_json::from_str(generated.text.trim())
        .map_err(|e| FlowError::BadOutput(format!("suggestions payload: {e}")))?;

    let mut messages = payload.messages;
    messages.truncate(MAX_SUGGESTIONS);
    Ok(messages)
}
