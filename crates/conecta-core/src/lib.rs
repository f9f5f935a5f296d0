pub mod chat;
pub mod errors;
pub mod ids;
pub mod provider;
pub mod security;

pub use chat::{ChatMessage, ChatRole};
pub use errors::GatewayError;
pub use provider::{GenerateOptions, GenerateRequest, Generated, ResponseFormat, TextProvider};
