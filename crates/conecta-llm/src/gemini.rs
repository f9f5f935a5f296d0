use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use tracing::instrument;

use conecta_core::errors::GatewayError;
use conecta_core::provider::{
    GenerateOptions, GenerateRequest, Generated, ResponseFormat, TextProvider,
};
use conecta_core::security::ApiKey;

const API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";
const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);
const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

/// Model used when none is configured.
pub const DEFAULT_MODEL: &str = "gemini-2.5-flash";

// ─────────────────────────────────────────────────────────────────────────────
// Wire types
// ─────────────────────────────────────────────────────────────────────────────

/// Content message in Gemini API format.
#[derive(Debug, Serialize)]
struct Content<'a> {
    /// The role (`user` or `model`).
    role: &'static str,
    parts: Vec<Part<'a>>,
}

#[derive(Debug, Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Debug, Serialize)]
struct SystemInstruction<'a> {
    parts: Vec<Part<'a>>,
}

/// Generation config. The API expects camelCase keys; unset knobs must be
/// omitted entirely, not sent as null.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    max_output_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f64>,
    /// Set to `application/json` for structured output.
    #[serde(skip_serializing_if = "Option::is_none")]
    response_mime_type: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_schema: Option<&'a serde_json::Value>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RequestBody<'a> {
    contents: Vec<Content<'a>>,
    generation_config: GenerationConfig<'a>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<SystemInstruction<'a>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ResponseBody {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    content: Option<CandidateContent>,
    /// `STOP`, `MAX_TOKENS`, `SAFETY`, ...
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
    #[serde(default)]
    text: Option<String>,
}

// ─────────────────────────────────────────────────────────────────────────────
// Provider
// ─────────────────────────────────────────────────────────────────────────────

/// Text provider over the hosted Gemini REST API (`models/{model}:generateContent`).
pub struct GeminiProvider {
    client: Client,
    api_key: ApiKey,
    model: String,
}

impl GeminiProvider {
    pub fn new(api_key: ApiKey, model: Option<&str>) -> Self {
        Self {
            client: Client::builder()
                .connect_timeout(CONNECT_TIMEOUT)
                .timeout(REQUEST_TIMEOUT)
                .build()
                .expect("failed to build HTTP client"),
            api_key,
            model: model.unwrap_or(DEFAULT_MODEL).to_string(),
        }
    }

    fn build_request(
        &self,
        request: &GenerateRequest,
        options: &GenerateOptions,
    ) -> reqwest::RequestBuilder {
        let body = build_body(request, options);
        let url = format!("{API_BASE}/models/{}:generateContent", self.model);

        self.client
            .post(url)
            .header("x-goog-api-key", self.api_key.0.expose_secret())
            .header("accept", "application/json")
            .json(&body)
    }
}

fn build_body<'a>(request: &'a GenerateRequest, options: &GenerateOptions) -> RequestBody<'a> {
    let (response_mime_type, response_schema) = match &request.format {
        ResponseFormat::Text => (None, None),
        ResponseFormat::Json { schema } => (Some("application/json"), Some(schema)),
    };

    RequestBody {
        contents: vec![Content {
            role: "user",
            parts: vec![Part {
                text: &request.prompt,
            }],
        }],
        generation_config: GenerationConfig {
            max_output_tokens: options.max_output_tokens,
            temperature: options.temperature,
            response_mime_type,
            response_schema,
        },
        system_instruction: request.system.as_deref().map(|text| SystemInstruction {
            parts: vec![Part { text }],
        }),
    }
}

/// Pull the reply text out of a generateContent response. Multi-part
/// candidates are concatenated in order.
fn extract_text(raw: &str) -> Result<String, GatewayError> {
    let parsed: ResponseBody = serde_json::from_str(raw)
        .map_err(|e| GatewayError::MalformedResponse(format!("invalid response JSON: {e}")))?;

    let candidate = parsed
        .candidates
        .into_iter()
        .next()
        .ok_or_else(|| GatewayError::MalformedResponse("response has no candidates".to_string()))?;

    let content = candidate.content.ok_or_else(|| {
        GatewayError::MalformedResponse(format!(
            "candidate has no content (finish reason: {})",
            candidate.finish_reason.as_deref().unwrap_or("unknown")
        ))
    })?;

    let text: String = content
        .parts
        .iter()
        .filter_map(|p| p.text.as_deref())
        .collect();

    if text.is_empty() {
        return Err(GatewayError::MalformedResponse(
            "candidate parts contain no text".to_string(),
        ));
    }

    Ok(text)
}

#[async_trait]
impl TextProvider for GeminiProvider {
    fn name(&self) -> &str {
        "gemini"
    }

    fn model(&self) -> &str {
        &self.model
    }

    #[instrument(skip(self, request, options), fields(model = %self.model))]
    async fn generate(
        &self,
        request: &GenerateRequest,
        options: &GenerateOptions,
    ) -> Result<Generated, GatewayError> {
        let req = self.build_request(request, options);

        let resp = req.send().await.map_err(|e| {
            if e.is_timeout() {
                GatewayError::Timeout(REQUEST_TIMEOUT)
            } else {
                GatewayError::NetworkError(e.to_string())
            }
        })?;

        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let body = resp.text().await.unwrap_or_default();
            return Err(GatewayError::from_status(status, body));
        }

        let raw = resp
            .text()
            .await
            .map_err(|e| GatewayError::NetworkError(e.to_string()))?;

        let text = extract_text(&raw)?;
        Ok(Generated { text })
    }
}
