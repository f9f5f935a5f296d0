//! Generative flows: the chat turn, sentiment classification, and
//! suggested conversation starters, all provider-agnostic over
//! `conecta_core::TextProvider`.

pub mod chat;
pub mod error;
pub mod knowledge;
pub mod prompts;
pub mod sentiment;
pub mod suggestions;

pub use chat::{ChatFlow, ChatTurn};
pub use error::FlowError;
