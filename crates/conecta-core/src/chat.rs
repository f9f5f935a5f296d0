use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Who authored a chat message. Matches the wire roles the hosted
/// generative API uses, so no mapping layer sits at the provider boundary.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Model,
}

impl fmt::Display for ChatRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::User => f.write_str("user"),
            Self::Model => f.write_str("model"),
        }
    }
}

impl FromStr for ChatRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(Self::User),
            "model" => Ok(Self::Model),
            other => Err(format!("unknown chat role: {other}")),
        }
    }
}

/// One turn of a conversation, independent of how it is stored.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self { role: ChatRole::User, content: content.into() }
    }

    pub fn model(content: impl Into<String>) -> Self {
        Self { role: ChatRole::Model, content: content.into() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_display_and_parse() {
        assert_eq!(ChatRole::User.to_string(), "user");
        assert_eq!(ChatRole::Model.to_string(), "model");
        assert_eq!("user".parse::<ChatRole>().unwrap(), ChatRole::User);
        assert_eq!("model".parse::<ChatRole>().unwrap(), ChatRole::Model);
    }

    #[test]
    fn unknown_role_is_rejected() {
        let err = "assistant".parse::<ChatRole>().unwrap_err();
        assert!(err.contains("assistant"), "got: {err}");
    }

    #[test]
    fn role_serde_uses_lowercase() {
        let json = serde_json::to_string(&ChatRole::Model).unwrap();
        assert_eq!(json, r#""model""#);
        let parsed: ChatRole = serde_json::from_str(r#""user""#).unwrap();
        assert_eq!(parsed, ChatRole::User);
    }

    #[test]
    fn constructors_set_role() {
        let user = ChatMessage::user("hola");
        assert_eq!(user.role, ChatRole::User);
        assert_eq!(user.content, "hola");

        let model = ChatMessage::model("buenas");
        assert_eq!(model.role, ChatRole::Model);
    }
}
