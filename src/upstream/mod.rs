// Gemini generateContent 调用

pub mod model;

use reqwest::StatusCode;

use crate::{config::Config, error::AppError, models::Turn};
use model::{GenerateContentRequest, GenerateContentResponse, GenerationConfig};

const DEFAULT_UPSTREAM_ERROR: &str = "Gemini API Error";
const API_KEY_HEADER: &str = "x-goog-api-key";

#[derive(Clone)]
pub struct GeminiClient {
    http: reqwest::Client,
    endpoint: String,
    generation: GenerationConfig,
    fallback_reply: String,
}

impl GeminiClient {
    pub fn new(config: &Config) -> Result<Self, reqwest::Error> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = config.upstream_timeout() {
            builder = builder.timeout(timeout);
        }

        Ok(Self {
            http: builder.build()?,
            endpoint: format!(
                "{}/models/{}:generateContent",
                config.gemini_base_url.trim_end_matches('/'),
                config.gemini_model
            ),
            generation: GenerationConfig {
                temperature: config.temperature,
                max_output_tokens: config.max_output_tokens,
            },
            fallback_reply: config.fallback_reply.clone(),
        })
    }

    /// 调用上游生成回复。上游 429 映射为 `UpstreamOverloaded`，
    /// 其他非 2xx 带上游错误信息返回
    pub async fn generate(&self, api_key: &str, contents: &[Turn]) -> Result<String, AppError> {
        let body = GenerateContentRequest {
            contents,
            generation_config: self.generation,
        };

        let response = self
            .http
            .post(&self.endpoint)
            .header(API_KEY_HEADER, api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            tracing::warn!("Gemini is rate limiting the gateway");
            return Err(AppError::UpstreamOverloaded);
        }

        let bytes = response.bytes().await?;

        if !status.is_success() {
            let message = serde_json::from_slice::<GenerateContentResponse>(&bytes)
                .ok()
                .and_then(|data| data.error_message().map(str::to_string))
                .unwrap_or_else(|| DEFAULT_UPSTREAM_ERROR.to_string());
            tracing::error!(
                "Gemini Error: status {}, body {}",
                status,
                String::from_utf8_lossy(&bytes)
            );
            return Err(AppError::Upstream(message));
        }

        let data: GenerateContentResponse = serde_json::from_slice(&bytes).map_err(|e| {
            tracing::error!("Failed to decode Gemini response: {}", e);
            AppError::Unexpected(e.to_string())
        })?;

        Ok(data
            .reply_text()
            .map(str::to_string)
            .unwrap_or_else(|| self.fallback_reply.clone()))
    }
}
