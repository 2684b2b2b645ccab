use std::collections::BTreeMap;
use std::time::Duration;

use fieldwise_core::{
    ModelBoundary, ModelError, ModelResponse, ModelResult, PromptPayload, RawFieldResult,
    TokenUsage,
};
use serde::Deserialize;

const API_VERSION: &str = "2023-06-01";
const MAX_OUTPUT_TOKENS: u32 = 8192;

/// Messages-API client for the model service.
pub struct HttpModelClient {
    http: reqwest::Client,
    endpoint: String,
    model: String,
    api_key: String,
    request_timeout: Duration,
}

impl HttpModelClient {
    pub fn new(
        endpoint: impl Into<String>,
        model: impl Into<String>,
        api_key: impl Into<String>,
        request_timeout: Duration,
    ) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder().timeout(request_timeout).build()?;
        Ok(Self {
            http,
            endpoint: endpoint.into(),
            model: model.into(),
            api_key: api_key.into(),
            request_timeout,
        })
    }
}

#[derive(Deserialize)]
struct ApiResponse {
    #[serde(default)]
    content: Vec<ContentBlock>,
    usage: ApiUsage,
}

#[derive(Deserialize)]
struct ContentBlock {
    #[serde(default)]
    text: String,
}

#[derive(Deserialize)]
struct ApiUsage {
    input_tokens: u64,
    output_tokens: u64,
}

#[derive(Deserialize)]
struct WireResponse {
    fields: BTreeMap<String, RawFieldResult>,
}

/// Models occasionally wrap JSON in markdown fences despite instructions.
fn strip_fences(text: &str) -> &str {
    let trimmed = text.trim();
    let without_open = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .unwrap_or(trimmed);
    without_open.strip_suffix("```").unwrap_or(without_open).trim()
}

#[async_trait::async_trait]
impl ModelBoundary for HttpModelClient {
    async fn invoke(&self, payload: &PromptPayload) -> ModelResult<ModelResponse> {
        let body = serde_json::json!({
            "model": self.model,
            "max_tokens": MAX_OUTPUT_TOKENS,
            "system": payload.system_instructions,
            "messages": [{
                "role": "user",
                "content": format!("DOCUMENT:\n\n{}", payload.document_text),
            }],
        });

        let response = self
            .http
            .post(&self.endpoint)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", API_VERSION)
            .json(&body)
            .send()
            .await
            .map_err(|err| {
                if err.is_timeout() {
                    ModelError::Timeout(self.request_timeout)
                } else {
                    ModelError::Transport(err.to_string())
                }
            })?;

        match response.status().as_u16() {
            401 | 403 => {
                return Err(ModelError::AuthFailure(
                    response.text().await.unwrap_or_default(),
                ))
            }
            402 => return Err(ModelError::CreditsExhausted),
            429 => return Err(ModelError::RateLimited),
            status if status >= 400 => {
                return Err(ModelError::Transport(format!(
                    "HTTP {status}: {}",
                    response.text().await.unwrap_or_default()
                )))
            }
            _ => {}
        }

        let api: ApiResponse = response
            .json()
            .await
            .map_err(|err| ModelError::MalformedResponse(err.to_string()))?;

        let text = api.content.first().map_or("", |block| block.text.as_str());
        let wire: WireResponse = serde_json::from_str(strip_fences(text))
            .map_err(|err| ModelError::MalformedResponse(err.to_string()))?;

        Ok(ModelResponse {
            fields: wire.fields,
            usage: TokenUsage {
                input_tokens: api.usage.input_tokens,
                output_tokens: api.usage.output_tokens,
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_fences_variants() {
        assert_eq!(strip_fences("{\"fields\": {}}"), "{\"fields\": {}}");
        assert_eq!(strip_fences("```json\n{\"fields\": {}}\n```"), "{\"fields\": {}}");
        assert_eq!(strip_fences("```\n{}\n```"), "{}");
        assert_eq!(strip_fences("  {} "), "{}");
    }

    #[test]
    fn test_wire_response_deserializes_partial_fields() {
        let text = r#"{
            "fields": {
                "rent.base_rent_monthly": {
                    "value": "15000.00",
                    "reasoning": "section 4.1",
                    "citation": {"page": 3, "quote": "Base Rent"},
                    "confidence": 0.95
                },
                "dates.commencement_date": {"value": null}
            }
        }"#;

        let wire: WireResponse = serde_json::from_str(text).unwrap();
        assert_eq!(wire.fields.len(), 2);
        assert!(wire.fields["dates.commencement_date"].value.is_null());
        assert!((wire.fields["rent.base_rent_monthly"].confidence - 0.95).abs() < f64::EPSILON);
    }
}
