use async_trait::async_trait;

use crate::errors::GatewayError;

/// Options controlling generation behavior.
#[derive(Clone, Debug, Default)]
pub struct GenerateOptions {
    pub max_output_tokens: Option<u32>,
    pub temperature: Option<f64>,
}

/// What shape of output the caller expects back.
#[derive(Clone, Debug, Default)]
pub enum ResponseFormat {
    #[default]
    Text,
    /// JSON constrained to the given schema, for flows that parse the
    /// reply into a typed struct.
    Json { schema: serde_json::Value },
}

/// A fully assembled request for one generation call.
#[derive(Clone, Debug, Default)]
pub struct GenerateRequest {
    pub system: Option<String>,
    pub prompt: String,
    pub format: ResponseFormat,
}

impl GenerateRequest {
    pub fn text(prompt: impl Into<String>) -> Self {
        Self {
            system: None,
            prompt: prompt.into(),
            format: ResponseFormat::Text,
        }
    }

    pub fn json(prompt: impl Into<String>, schema: serde_json::Value) -> Self {
        Self {
            system: None,
            prompt: prompt.into(),
            format: ResponseFormat::Json { schema },
        }
    }

    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }
}

/// The provider's answer to a single request.
#[derive(Clone, Debug)]
pub struct Generated {
    pub text: String,
}

/// Trait implemented by each hosted text-generation provider.
///
/// One call is one attempt: errors surface as-is, no retry loop sits above.
#[async_trait]
pub trait TextProvider: Send + Sync {
    fn name(&self) -> &str;
    fn model(&self) -> &str;

    async fn generate(
        &self,
        request: &GenerateRequest,
        options: &GenerateOptions,
    ) -> Result<Generated, GatewayError>;
}
