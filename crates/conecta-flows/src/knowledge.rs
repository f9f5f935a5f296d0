use conecta_store::knowledge::KnowledgeRow;

use crate::error::FlowError;

/// Flatten every source into the prompt context: each source's content
/// followed by a blank line, in insertion order. Sources that only carry
/// a URL (no stored content) contribute nothing.
pub fn aggregate(sources: &[KnowledgeRow]) -> String {
    let mut out = String::new();
    for source in sources {
        if let Some(content) = source.content.as_deref() {
            out.push_str(content);
            out.push_str("\n\n");
        }
    }
    out
}

/// A source needs a name plus at least one of content or URL.
pub fn validate(name: &str, content: Option<&str>, url: Option<&str>) -> Result<(), FlowError> {
    let has_name = !name.trim().is_empty();
    let has_body = content.is_some_and(|c| !c.trim().is_empty())
        || url.is_some_and(|u| !u.trim().is_empty());

    if has_name && has_body {
        Ok(())
    } else {
        Err(FlowError::Rejected(
            "El nombre es obligatorio y debes proporcionar contenido o una URL.",
        ))
    }
}
