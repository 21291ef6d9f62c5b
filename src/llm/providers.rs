use super::{ChatMessage, LLMConfig, LLMError, LLMProvider, LLMResponse, LLM};
use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
const OPENAI_CHAT_URL: &str = "https://api.openai.com/v1/chat/completions";
const LMSTUDIO_CHAT_URL: &str = "http://localhost:1234/v1/chat/completions";

fn build_client(config: &LLMConfig) -> Result<reqwest::Client, LLMError> {
    Ok(reqwest::Client::builder()
        .timeout(Duration::from_secs(config.timeout_seconds))
        .build()?)
}

/// Map a non-success HTTP status and body to a typed error
pub(crate) fn classify_status(status: StatusCode, body: String) -> LLMError {
    if status == StatusCode::TOO_MANY_REQUESTS
        || body.contains("RESOURCE_EXHAUSTED")
        || body.contains("insufficient_quota")
    {
        return LLMError::QuotaExceeded(body);
    }

    if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        return LLMError::Unauthorized(body);
    }

    LLMError::Api {
        status: status.as_u16(),
        message: body,
    }
}

/// Gemini provider implementation
pub struct GeminiProvider {
    config: LLMConfig,
    client: reqwest::Client,
}

#[derive(Debug, Serialize)]
struct GeminiRequest {
    contents: Vec<GeminiContent>,
    #[serde(rename = "systemInstruction", skip_serializing_if = "Option::is_none")]
    system_instruction: Option<GeminiContent>,
    #[serde(rename = "generationConfig")]
    generation_config: GeminiGenerationConfig,
}

#[derive(Debug, Serialize, Deserialize)]
struct GeminiContent {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<GeminiPart>,
}

#[derive(Debug, Serialize, Deserialize)]
struct GeminiPart {
    #[serde(default)]
    text: String,
}

#[derive(Debug, Serialize)]
struct GeminiGenerationConfig {
    #[serde(rename = "maxOutputTokens")]
    max_output_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
    #[serde(rename = "usageMetadata")]
    usage_metadata: Option<GeminiUsage>,
}

#[derive(Debug, Deserialize)]
struct GeminiCandidate {
    content: Option<GeminiContent>,
}

#[derive(Debug, Deserialize)]
struct GeminiUsage {
    #[serde(rename = "totalTokenCount")]
    total_token_count: u32,
}

impl GeminiProvider {
    pub fn new(config: LLMConfig) -> Result<Self, LLMError> {
        if config.api_key.as_deref().map_or(true, str::is_empty) {
            return Err(LLMError::NotConfigured("Gemini API key required".to_string()));
        }

        let client = build_client(&config)?;
        Ok(Self { config, client })
    }

    fn base_url(&self) -> &str {
        self.config.endpoint.as_deref().unwrap_or(GEMINI_BASE_URL)
    }

    fn build_request(&self, messages: &[ChatMessage]) -> GeminiRequest {
        let system_text = messages
            .iter()
            .filter(|m| m.role == "system")
            .map(|m| m.content.as_str())
            .collect::<Vec<_>>()
            .join("\n\n");

        let contents = messages
            .iter()
            .filter(|m| m.role != "system")
            .map(|m| GeminiContent {
                role: Some(if m.role == "assistant" { "model" } else { "user" }.to_string()),
                parts: vec![GeminiPart { text: m.content.clone() }],
            })
            .collect();

        GeminiRequest {
            contents,
            system_instruction: (!system_text.is_empty()).then(|| GeminiContent {
                role: None,
                parts: vec![GeminiPart { text: system_text }],
            }),
            generation_config: GeminiGenerationConfig {
                max_output_tokens: self.config.max_tokens,
                temperature: self.config.temperature,
            },
        }
    }
}

#[async_trait]
impl LLM for GeminiProvider {
    async fn complete(&self, model: &str, messages: &[ChatMessage]) -> Result<LLMResponse, LLMError> {
        let api_key = self
            .config
            .api_key
            .as_ref()
            .ok_or_else(|| LLMError::NotConfigured("Gemini API key not configured".to_string()))?;

        let request = self.build_request(messages);
        let url = format!("{}/models/{}:generateContent", self.base_url(), model);

        debug!("Sending request to Gemini model {}", model);

        let response = self
            .client
            .post(&url)
            .query(&[("key", api_key)])
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(classify_status(status, text));
        }

        let gemini_response: GeminiResponse = response.json().await?;

        let content = gemini_response
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .map(|c| c.parts.into_iter().map(|p| p.text).collect::<String>())
            .filter(|text| !text.trim().is_empty())
            .ok_or(LLMError::EmptyResponse)?;

        Ok(LLMResponse {
            content,
            tokens_used: gemini_response.usage_metadata.map(|u| u.total_token_count),
            model: model.to_string(),
        })
    }

    async fn is_available(&self) -> bool {
        let Some(api_key) = &self.config.api_key else {
            return false;
        };

        let url = format!("{}/models", self.base_url());
        match self.client.get(&url).query(&[("key", api_key)]).send().await {
            Ok(response) => response.status().is_success(),
            Err(_) => false,
        }
    }

    fn provider_type(&self) -> LLMProvider {
        LLMProvider::Gemini
    }
}

/// OpenAI-compatible chat completions provider (OpenAI or a local LMStudio server)
pub struct OpenAIProvider {
    config: LLMConfig,
    client: reqwest::Client,
    endpoint: String,
    provider: LLMProvider,
}

#[derive(Debug, Serialize)]
struct OpenAIRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    max_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct OpenAIResponse {
    choices: Vec<OpenAIChoice>,
    usage: Option<OpenAIUsage>,
}

#[derive(Debug, Deserialize)]
struct OpenAIChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct OpenAIUsage {
    total_tokens: u32,
}

impl OpenAIProvider {
    pub fn new(config: LLMConfig) -> Result<Self, LLMError> {
        if config.api_key.as_deref().map_or(true, str::is_empty) {
            return Err(LLMError::NotConfigured("OpenAI API key required".to_string()));
        }

        let endpoint = config.endpoint.clone().unwrap_or_else(|| OPENAI_CHAT_URL.to_string());
        let client = build_client(&config)?;
        Ok(Self { config, client, endpoint, provider: LLMProvider::OpenAI })
    }

    /// Local server speaking the same protocol; no key needed
    pub fn lm_studio(config: LLMConfig) -> Result<Self, LLMError> {
        let endpoint = config.endpoint.clone().unwrap_or_else(|| LMSTUDIO_CHAT_URL.to_string());
        let client = build_client(&config)?;
        Ok(Self { config, client, endpoint, provider: LLMProvider::LMStudio })
    }
}

#[async_trait]
impl LLM for OpenAIProvider {
    async fn complete(&self, model: &str, messages: &[ChatMessage]) -> Result<LLMResponse, LLMError> {
        let request = OpenAIRequest {
            model,
            messages,
            max_tokens: self.config.max_tokens,
            temperature: self.config.temperature,
        };

        debug!("Sending request to {:?} at {}", self.provider, self.endpoint);

        let mut builder = self.client.post(&self.endpoint).json(&request);
        if let Some(api_key) = &self.config.api_key {
            builder = builder.bearer_auth(api_key);
        }
        let response = builder.send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(classify_status(status, text));
        }

        let openai_response: OpenAIResponse = response.json().await?;

        let content = openai_response
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .filter(|text| !text.trim().is_empty())
            .ok_or(LLMError::EmptyResponse)?;

        Ok(LLMResponse {
            content,
            tokens_used: openai_response.usage.map(|u| u.total_tokens),
            model: model.to_string(),
        })
    }

    async fn is_available(&self) -> bool {
        let models_endpoint = self.endpoint.replace("/chat/completions", "/models");

        let mut builder = self.client.get(&models_endpoint);
        if let Some(api_key) = &self.config.api_key {
            builder = builder.bearer_auth(api_key);
        }

        match builder.send().await {
            Ok(response) => response.status().is_success(),
            Err(_) => false,
        }
    }

    fn provider_type(&self) -> LLMProvider {
        self.provider.clone()
    }
}
