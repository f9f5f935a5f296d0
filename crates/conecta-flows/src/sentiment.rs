use serde::Deserialize;

use conecta_core::provider::{GenerateOptions, GenerateRequest, TextProvider};

use crate::error::FlowError;
use crate::prompts;

/// Structured sentiment verdict for one message.
#[derive(Clone, Debug, Deserialize)]
pub struct Sentiment {
    /// `positive`, `negative` or `neutral`.
    pub sentiment: String,
    /// -1.0 (very negative) to 1.0 (very positive).
    pub score: f64,
}

impl Sentiment {
    /// Label shown to the user and embedded in the chat prompt,
    /// e.g. `positive (Puntuación: 0.80)`.
    pub fn label(&self) -> String {
        format!("{} (Puntuación: {:.2})", self.sentiment, self.score)
    }
}

/// One structured-output call; the provider enforces the schema, we still
/// parse defensively because the model owns the payload.
pub async fn analyze(provider: &dyn TextProvider, text: &str) -> Result<Sentiment, FlowError> {
    let request = GenerateRequest::json(prompts::sentiment_prompt(text), prompts::sentiment_schema());
    let generated = provider.generate(&request, &GenerateOptions::default()).await?;

    serde_json::from_str(generated.text.trim())
        .map_err(|e| FlowError::BadOutput(format!("sentiment payload: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use conecta_llm::{MockProvider, MockResponse};

    #[test]
    fn label_formats_score_to_two_decimals() {
        let s = Sentiment { sentiment: "positive".into(), score: 0.8 };
        assert_eq!(s.label(), "positive (Puntuación: 0.80)");

        let s = Sentiment { sentiment: "negative".into(), score: -0.456 };
        assert_eq!(s.label(), "negative (Puntuación: -0.46)");

        let s = Sentiment { sentiment: "neutral".into(), score: 0.0 };
        assert_eq!(s.label(), "neutral (Puntuación: 0.00)");
    }

    #[tokio::test]
    async fn analyze_parses_structured_output() {
        let mock = MockProvider::new(vec![MockResponse::json(serde_json::json!({
            "sentiment": "positive",
            "score": 0.85
        }))]);

        let result = analyze(&mock, "¡Gracias, me ayudaste un montón!").await.unwrap();
        assert_eq!(result.sentiment, "positive");
        assert!((result.score - 0.85).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn analyze_requests_the_schema() {
        let mock = MockProvider::new(vec![MockResponse::json(serde_json::json!({
            "sentiment": "neutral",
            "score": 0.0
        }))]);

        analyze(&mock, "hola").await.unwrap();

        let requests = mock.requests();
        assert_eq!(requests.len(), 1);
        assert!(requests[0].prompt.contains("Text: hola"));
        match &requests[0].format {
            conecta_core::provider::ResponseFormat::Json { schema } => {
                assert_eq!(schema["required"], serde_json::json!(["sentiment", "score"]));
            }
            other => panic!("expected json format, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn analyze_rejects_non_json_output() {
        let mock = MockProvider::new(vec![MockResponse::reply("muy positivo!")]);

        match analyze(&mock, "hola").await {
            Err(FlowError::BadOutput(_)) => {}
            other => panic!("expected BadOutput, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn analyze_propagates_gateway_errors() {
        let mock = MockProvider::new(vec![MockResponse::Error(
            conecta_core::errors::GatewayError::ProviderOverloaded,
        )]);

        match analyze(&mock, "hola").await {
            Err(FlowError::Gateway(_)) => {}
            other => panic!("expected Gateway, got {other:?}"),
        }
    }
}
