//! Prompt templates for the generative flows.
//!
//! The chat persona and section wording are user-visible product copy;
//! change them deliberately, not for style.

use conecta_core::chat::ChatMessage;

/// How many messages of history the chat prompt sees, newest included.
pub const HISTORY_WINDOW: u32 = 10;

const PERSONA: &str = "Eres un agente de IA experto llamado PLib_IA. \
                       Tu propósito es ayudar a los usuarios con sus consultas.";

const CLOSING: &str = "Responde al usuario en español. Mantén tus respuestas concisas y útiles.";

/// Assemble the full chat prompt: persona, knowledge, sentiment, history
/// window, the new message, closing instruction.
pub fn chat_prompt(
    knowledge: &str,
    sentiment: &str,
    history: &[ChatMessage],
    message: &str,
) -> String {
    let mut history_block = String::from("Aquí está el historial de la conversación:");
    for msg in history {
        history_block.push_str(&format!("\n**{}**: {}", msg.role, msg.content));
    }

    let sections = [
        PERSONA.to_string(),
        format!(
            "Responde basándote únicamente en el siguiente contexto y base de conocimiento:\n{knowledge}"
        ),
        format!(
            "Analiza el sentimiento del usuario para entender mejor su estado emocional y adaptar tu respuesta.\n\
             Sentimiento del último mensaje: {sentiment}"
        ),
        history_block,
        format!("Nuevo mensaje del usuario:\n**user**: {message}"),
        CLOSING.to_string(),
    ];

    sections.join("\n\n")
}

pub fn sentiment_prompt(text: &str) -> String {
    format!(
        "You are a sentiment analysis expert.\n\n\
         Analyze the sentiment of the following text and provide a sentiment and a score.\n\n\
         Text: {text}\n\n\
         Respond with a JSON object with a \"sentiment\" key and a \"score\" key.\n\
         The sentiment should be one of \"positive\", \"negative\", or \"neutral\".\n\
         The score should be a number from -1 to 1, where -1 is very negative and 1 is very positive."
    )
}

pub fn sentiment_schema() -> serde_json::Value {
    serde_json::json!({
        "type": "object",
        "properties": {
            "sentiment": { "type": "string", "enum": ["positive", "negative", "neutral"] },
            "score": { "type": "number" }
        },
        "required": ["sentiment", "score"]
    })
}

pub fn suggestions_prompt(knowledge: &str) -> String {
    format!(
        "You are an AI assistant designed to help users start conversations with an expert agent.\n\n\
         Generate a list of suggested messages that a user can use to begin interacting with the agent.\n\
         The messages should be in Spanish.\n\
         The messages should be diverse and showcase the different capabilities of the agent.\n\
         Each message should be concise and to the point.\n\n\
         Base your suggestions on the following knowledge base if provided:\n{knowledge}\n\n\
         Format the output as a JSON object with a \"messages\" field containing an array of strings."
    )
}

pub fn suggestions_schema() -> serde_json::Value {
    serde_json::json!({
        "type": "object",
        "properties": {
            "messages": { "type": "array", "items": { "type": "string" } }
        },
        "required": ["messages"]
    })
}
