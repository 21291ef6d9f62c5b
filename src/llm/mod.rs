pub mod providers;
pub mod extraction;
pub mod generation;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

/// LLM provider types
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum LLMProvider {
    Gemini,
    OpenAI,
    LMStudio,
}

/// LLM configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LLMConfig {
    pub provider: LLMProvider,
    /// Endpoint override (required for LMStudio)
    pub endpoint: Option<String>,
    pub api_key: Option<String>,
    /// Model identifiers, tried in order until one succeeds
    pub models: Vec<String>,
    pub max_tokens: u32,
    pub temperature: f32,
    pub timeout_seconds: u64,
    /// Lessons generated at once during full-course generation
    pub max_concurrent_lessons: usize,
}

impl Default for LLMConfig {
    fn default() -> Self {
        Self {
            provider: LLMProvider::Gemini,
            endpoint: None,
            api_key: None,
            models: vec![
                "gemini-2.0-flash-exp".to_string(),
                "gemini-1.5-flash".to_string(),
            ],
            max_tokens: 8192,
            temperature: 0.7,
            timeout_seconds: 120,
            max_concurrent_lessons: 1,
        }
    }
}

/// Chat message for LLM communication
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self { role: "system".to_string(), content: content.into() }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self { role: "user".to_string(), content: content.into() }
    }
}

/// LLM response
#[derive(Debug, Clone)]
pub struct LLMResponse {
    pub content: String,
    pub tokens_used: Option<u32>,
    /// Model that produced the response
    pub model: String,
}

/// Coarse classification of an upstream failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpstreamFailure {
    QuotaExceeded,
    NotConfigured,
    Other,
}

/// Errors from an upstream model call
#[derive(Debug, thiserror::Error)]
pub enum LLMError {
    #[error("LLM provider not configured: {0}")]
    NotConfigured(String),

    #[error("API quota exceeded: {0}")]
    QuotaExceeded(String),

    #[error("API key rejected: {0}")]
    Unauthorized(String),

    #[error("API error {status}: {message}")]
    Api { status: u16, message: String },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Empty response from model")]
    EmptyResponse,

    #[error("All models failed: {}", summarize_attempts(.0))]
    AllModelsFailed(Vec<ModelAttempt>),
}

/// One failed model in a fallback chain
#[derive(Debug)]
pub struct ModelAttempt {
    pub model: String,
    pub error: LLMError,
}

fn summarize_attempts(attempts: &[ModelAttempt]) -> String {
    attempts
        .iter()
        .map(|a| format!("{} ({})", a.model, a.error))
        .collect::<Vec<_>>()
        .join("; ")
}

impl LLMError {
    /// Classify the failure for user-facing reporting
    pub fn kind(&self) -> UpstreamFailure {
        match self {
            LLMError::QuotaExceeded(_) => UpstreamFailure::QuotaExceeded,
            LLMError::NotConfigured(_) | LLMError::Unauthorized(_) => UpstreamFailure::NotConfigured,
            LLMError::AllModelsFailed(attempts) => {
                let kinds: Vec<_> = attempts.iter().map(|a| a.error.kind()).collect();
                if kinds.contains(&UpstreamFailure::QuotaExceeded) {
                    UpstreamFailure::QuotaExceeded
                } else if kinds.contains(&UpstreamFailure::NotConfigured) {
                    UpstreamFailure::NotConfigured
                } else {
                    UpstreamFailure::Other
                }
            }
            _ => UpstreamFailure::Other,
        }
    }

    /// Whether another model on the same provider could succeed
    fn is_model_specific(&self) -> bool {
        !matches!(self, LLMError::NotConfigured(_) | LLMError::Unauthorized(_))
    }
}

/// Trait for LLM providers
#[async_trait]
pub trait LLM: Send + Sync {
    async fn complete(&self, model: &str, messages: &[ChatMessage]) -> Result<LLMResponse, LLMError>;
    async fn is_available(&self) -> bool;
    fn provider_type(&self) -> LLMProvider;
}

/// Create LLM instance based on configuration
pub fn create_llm(config: &LLMConfig) -> Result<Box<dyn LLM>, LLMError> {
    match config.provider {
        LLMProvider::Gemini => Ok(Box::new(providers::GeminiProvider::new(config.clone())?)),
        LLMProvider::OpenAI => Ok(Box::new(providers::OpenAIProvider::new(config.clone())?)),
        LLMProvider::LMStudio => Ok(Box::new(providers::OpenAIProvider::lm_studio(config.clone())?)),
    }
}

struct Unconfigured {
    provider: LLMProvider,
    reason: String,
}

#[async_trait]
impl LLM for Unconfigured {
    async fn complete(&self, _model: &str, _messages: &[ChatMessage]) -> Result<LLMResponse, LLMError> {
        Err(LLMError::NotConfigured(self.reason.clone()))
    }

    async fn is_available(&self) -> bool {
        false
    }

    fn provider_type(&self) -> LLMProvider {
        self.provider.clone()
    }
}

/// A provider paired with an ordered list of models to try
pub struct ModelChain {
    llm: Box<dyn LLM>,
    models: Vec<String>,
}

impl ModelChain {
    pub fn new(llm: Box<dyn LLM>, models: Vec<String>) -> Self {
        Self { llm, models }
    }

    /// Build a chain from configuration.
    ///
    /// A provider that cannot be built (typically a missing API key) is
    /// replaced by one that fails every call with `NotConfigured`, so the
    /// server still starts and reports the problem per request.
    pub fn from_config(config: &LLMConfig) -> Self {
        let llm = match create_llm(config) {
            Ok(llm) => {
                info!(
                    "🤖 {:?} provider ready with models: {}",
                    config.provider,
                    config.models.join(", ")
                );
                llm
            }
            Err(e) => {
                warn!("{:?} provider unavailable: {}", config.provider, e);
                Box::new(Unconfigured {
                    provider: config.provider.clone(),
                    reason: e.to_string(),
                })
            }
        };
        Self::new(llm, config.models.clone())
    }

    pub fn models(&self) -> &[String] {
        &self.models
    }

    pub async fn is_available(&self) -> bool {
        self.llm.is_available().await
    }

    /// Send the conversation to each model in turn until one answers
    pub async fn chat(&self, messages: &[ChatMessage]) -> Result<LLMResponse, LLMError> {
        if self.models.is_empty() {
            return Err(LLMError::NotConfigured("no models configured".to_string()));
        }

        let mut attempts = Vec::new();
        for model in &self.models {
            debug!("Calling {:?} model {}", self.llm.provider_type(), model);
            match self.llm.complete(model, messages).await {
                Ok(response) => {
                    if !attempts.is_empty() {
                        info!("Model {} succeeded after {} failed attempt(s)", model, attempts.len());
                    }
                    return Ok(response);
                }
                Err(error) => {
                    warn!("Model {} failed: {}", model, error);
                    let stop = !error.is_model_specific();
                    attempts.push(ModelAttempt { model: model.clone(), error });
                    if stop {
                        break;
                    }
                }
            }
        }

        Err(LLMError::AllModelsFailed(attempts))
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Scripted provider: pops one canned result per call and records the model used
    pub struct ScriptedLLM {
        replies: Mutex<VecDeque<Result<String, LLMError>>>,
        pub calls: std::sync::Arc<Mutex<Vec<(String, Vec<ChatMessage>)>>>,
    }

    impl ScriptedLLM {
        pub fn new(replies: Vec<Result<String, LLMError>>) -> Self {
            Self {
                replies: Mutex::new(replies.into()),
                calls: Default::default(),
            }
        }

        pub fn replying(replies: &[&str]) -> Self {
            Self::new(replies.iter().map(|r| Ok(r.to_string())).collect())
        }
    }

    #[async_trait]
    impl LLM for ScriptedLLM {
        async fn complete(&self, model: &str, messages: &[ChatMessage]) -> Result<LLMResponse, LLMError> {
            self.calls.lock().unwrap().push((model.to_string(), messages.to_vec()));
            let next = self.replies.lock().unwrap().pop_front().unwrap_or(Err(LLMError::EmptyResponse));
            next.map(|content| LLMResponse {
                content,
                tokens_used: None,
                model: model.to_string(),
            })
        }

        async fn is_available(&self) -> bool {
            true
        }

        fn provider_type(&self) -> LLMProvider {
            LLMProvider::Gemini
        }
    }

    pub fn chain(llm: ScriptedLLM) -> ModelChain {
        ModelChain::new(Box::new(llm), vec!["primary".to_string(), "fallback".to_string()])
    }
}

#[cfg(test)]
mod tests {
    use super::testing::*;
    use super::*;

    #[tokio::test]
    async fn test_first_model_success() {
        let llm = ScriptedLLM::replying(&["hello"]);
        let calls = llm.calls.clone();
        let response = chain(llm).chat(&[ChatMessage::user("hi")]).await.unwrap();

        assert_eq!(response.content, "hello");
        assert_eq!(response.model, "primary");
        assert_eq!(calls.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_falls_back_to_next_model() {
        let llm = ScriptedLLM::new(vec![
            Err(LLMError::Api { status: 404, message: "model not found".to_string() }),
            Ok("from fallback".to_string()),
        ]);
        let calls = llm.calls.clone();
        let response = chain(llm).chat(&[ChatMessage::user("hi")]).await.unwrap();

        assert_eq!(response.model, "fallback");
        let models: Vec<_> = calls.lock().unwrap().iter().map(|(m, _)| m.clone()).collect();
        assert_eq!(models, vec!["primary", "fallback"]);
    }

    #[tokio::test]
    async fn test_all_models_failing_records_each_attempt() {
        let llm = ScriptedLLM::new(vec![
            Err(LLMError::QuotaExceeded("429".to_string())),
            Err(LLMError::EmptyResponse),
        ]);
        let err = chain(llm).chat(&[ChatMessage::user("hi")]).await.unwrap_err();

        match &err {
            LLMError::AllModelsFailed(attempts) => {
                assert_eq!(attempts.len(), 2);
                assert_eq!(attempts[0].model, "primary");
                assert_eq!(attempts[1].model, "fallback");
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(err.kind(), UpstreamFailure::QuotaExceeded);
    }

    #[tokio::test]
    async fn test_unauthorized_stops_the_chain() {
        let llm = ScriptedLLM::new(vec![
            Err(LLMError::Unauthorized("bad key".to_string())),
            Ok("unreachable".to_string()),
        ]);
        let calls = llm.calls.clone();
        let err = chain(llm).chat(&[ChatMessage::user("hi")]).await.unwrap_err();

        assert_eq!(calls.lock().unwrap().len(), 1);
        assert_eq!(err.kind(), UpstreamFailure::NotConfigured);
    }

    #[tokio::test]
    async fn test_empty_model_list_is_not_configured() {
        let chain = ModelChain::new(Box::new(ScriptedLLM::replying(&["x"])), Vec::new());
        let err = chain.chat(&[ChatMessage::user("hi")]).await.unwrap_err();
        assert_eq!(err.kind(), UpstreamFailure::NotConfigured);
    }

    #[tokio::test]
    async fn test_missing_key_yields_not_configured_chain() {
        let config = LLMConfig { api_key: None, ..LLMConfig::default() };
        let chain = ModelChain::from_config(&config);

        assert!(!chain.is_available().await);
        let err = chain.chat(&[ChatMessage::user("hi")]).await.unwrap_err();
        assert_eq!(err.kind(), UpstreamFailure::NotConfigured);
    }

    #[test]
    fn test_error_kind_classification() {
        assert_eq!(LLMError::EmptyResponse.kind(), UpstreamFailure::Other);
        assert_eq!(
            LLMError::Api { status: 500, message: "boom".to_string() }.kind(),
            UpstreamFailure::Other
        );
        assert_eq!(
            LLMError::NotConfigured("key".to_string()).kind(),
            UpstreamFailure::NotConfigured
        );
    }
}
