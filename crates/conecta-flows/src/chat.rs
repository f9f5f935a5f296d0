use std::sync::Arc;

use tracing::instrument;

use conecta_core::chat::{ChatMessage, ChatRole};
use conecta_core::ids::{SessionId, UserId};
use conecta_core::provider::{GenerateOptions, GenerateRequest, TextProvider};
use conecta_store::knowledge::KnowledgeRepo;
use conecta_store::messages::MessageRepo;
use conecta_store::sessions::SessionRepo;
use conecta_store::Database;

use crate::error::FlowError;
use crate::knowledge;
use crate::prompts::{self, HISTORY_WINDOW};
use crate::sentiment;

/// How much of the user message survives into the session preview.
const PREVIEW_CHARS: usize = 40;

/// Result of one completed chat turn.
#[derive(Clone, Debug)]
pub struct ChatTurn {
    pub session_id: SessionId,
    pub reply: String,
    pub sentiment: String,
}

/// Runs a chat turn: validate, resolve the session, persist the user turn,
/// classify sentiment, assemble the prompt, call the model, persist the reply.
pub struct ChatFlow {
    provider: Arc<dyn TextProvider>,
    sessions: SessionRepo,
    messages: MessageRepo,
    knowledge: KnowledgeRepo,
}

impl ChatFlow {
    pub fn new(provider: Arc<dyn TextProvider>, db: Database) -> Self {
        Self {
            provider,
            sessions: SessionRepo::new(db.clone()),
            messages: MessageRepo::new(db.clone()),
            knowledge: KnowledgeRepo::new(db),
        }
    }

    #[instrument(skip(self, message), fields(user_id = %user_id))]
    pub async fn send(
        &self,
        user_id: &UserId,
        session_id: Option<&SessionId>,
        message: &str,
    ) -> Result<ChatTurn, FlowError> {
        // 1. Reject empty input before any write or model call
        let message = message.trim();
        if message.is_empty() {
            return Err(FlowError::Rejected("El mensaje no puede estar vacío."));
        }

        // 2. Resolve the session, creating one lazily on first send
        let session = match session_id {
            Some(id) => self.sessions.get_owned(id, user_id)?,
            None => self
                .sessions
                .create(user_id)
                .map_err(FlowError::SessionCreate)?,
        };

        // 3. Persist the user turn; abort before any model call on failure
        self.messages
            .append(&session.id, ChatRole::User, message)
            .map_err(FlowError::MessageAppend)?;

        // 4. Sentiment of the new message
        let verdict = sentiment::analyze(self.provider.as_ref(), message).await?;
        let sentiment_label = verdict.label();

        // 5. Aggregate the knowledge base
        let sources = self.knowledge.list()?;
        let knowledge = knowledge::aggregate(&sources);

        // 6. Prompt over the history window, which includes the turn just appended
        let history: Vec<ChatMessage> = self
            .messages
            .last_n(&session.id, HISTORY_WINDOW)?
            .iter()
            .map(|m| m.to_chat())
            .collect();
        let prompt = prompts::chat_prompt(&knowledge, &sentiment_label, &history, message);

        // 7. One model call, one attempt
        let generated = self
            .provider
            .generate(&GenerateRequest::text(prompt), &GenerateOptions::default())
            .await?;
        let reply = generated.text;

        // 8. Persist the reply, then refresh the sidebar preview from the user message
        self.messages
            .append(&session.id, ChatRole::Model, &reply)
            .map_err(FlowError::MessageAppend)?;
        self.sessions
            .update_preview(&session.id, &preview_of(message))?;

        Ok(ChatTurn {
            session_id: session.id,
            reply,
            sentiment: sentiment_label,
        })
    }
}

/// First 40 chars plus an ellipsis when the message runs longer.
fn preview_of(message: &str) -> String {
    if message.chars().count() > PREVIEW_CHARS {
        let head: String = message.chars().take(PREVIEW_CHARS).collect();
        format!("{head}...")
    } else {
        message.to_string()
    }
}
