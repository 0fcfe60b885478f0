use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use switchboard_common::{Result, SwitchboardError};
use tokio::sync::Semaphore;

use crate::client::{ChatModel, ChatReply, ChatRequest};
use crate::openai::OpenAiChat;
use crate::retry::{RetryPolicy, RetryingModel};

pub const OPENAI_API_KEY_ENV: &str = "OPENAI_API_KEY";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmSettings {
    /// Only `"openai"` (and OpenAI-compatible servers via `api_url`) is supported.
    #[serde(default = "default_provider")]
    pub provider: String,

    #[serde(default = "default_model")]
    pub model: String,

    /// Base URL of an OpenAI-compatible server. Unset means the hosted API.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_url: Option<String>,

    /// Falls back to `OPENAI_API_KEY` when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,

    #[serde(default = "default_max_concurrent")]
    pub max_concurrent_requests: usize,

    #[serde(default)]
    pub retry: RetryPolicy,
}

fn default_provider() -> String {
    "openai".into()
}

fn default_model() -> String {
    "gpt-3.5-turbo".into()
}

fn default_timeout_ms() -> u64 {
    30_000
}

fn default_max_concurrent() -> usize {
    4
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: default_model(),
            api_url: None,
            api_key: None,
            timeout_ms: default_timeout_ms(),
            max_tokens: None,
            max_concurrent_requests: default_max_concurrent(),
            retry: RetryPolicy::default(),
        }
    }
}

impl LlmSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Resolve the API key: explicit setting first, then the environment.
    pub fn resolve_api_key(&self) -> Option<String> {
        if let Some(ref key) = self.api_key {
            if !key.is_empty() {
                return Some(key.clone());
            }
        }
        std::env::var(OPENAI_API_KEY_ENV)
            .ok()
            .filter(|key| !key.is_empty())
    }
}

/// Caps the number of in-flight requests to the wrapped model.
pub struct LimitedModel {
    inner: Arc<dyn ChatModel>,
    permits: Arc<Semaphore>,
}

impl LimitedModel {
    pub fn new(inner: Arc<dyn ChatModel>, max_concurrent: usize) -> Self {
        Self {
            inner,
            permits: Arc::new(Semaphore::new(max_concurrent.max(1))),
        }
    }
}

#[async_trait]
impl ChatModel for LimitedModel {
    async fn complete(&self, request: ChatRequest) -> Result<ChatReply> {
        let _permit = self
            .permits
            .acquire()
            .await
            .map_err(|e| SwitchboardError::llm(format!("model permit unavailable: {e}")))?;
        self.inner.complete(request).await
    }

    fn model_name(&self) -> &str {
        self.inner.model_name()
    }
}

/// Build the chat model stack described by `settings`:
/// provider client, wrapped in retries, wrapped in a concurrency limit.
pub fn build_chat_model(settings: &LlmSettings) -> Result<Arc<dyn ChatModel>> {
    let base: Arc<dyn ChatModel> = match settings.provider.as_str() {
        "openai" => {
            let api_key = settings.resolve_api_key();
            // A self-hosted compatible server may run without auth; the hosted API never does.
            if api_key.is_none() && settings.api_url.is_none() {
                return Err(SwitchboardError::Config(format!(
                    "{OPENAI_API_KEY_ENV} is not set and no api_url is configured"
                )));
            }
            Arc::new(OpenAiChat::new(
                settings.api_url.clone(),
                settings.model.clone(),
                api_key,
                settings.timeout(),
            )?)
        }
        other => {
            return Err(SwitchboardError::Config(format!(
                "Unknown LLM provider: {other}"
            )));
        }
    };

    let retrying: Arc<dyn ChatModel> = Arc::new(RetryingModel::new(base, settings.retry.clone()));

    Ok(Arc::new(LimitedModel::new(
        retrying,
        settings.max_concurrent_requests,
    )))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deserialize_settings_from_toml() {
        let settings: LlmSettings = toml::from_str(
            r#"
provider = "openai"
model = "llama3"
api_url = "http://localhost:11434"
timeout_ms = 5000
max_concurrent_requests = 8

[retry]
max_retries = 5
"#,
        )
        .unwrap();
        assert_eq!(settings.model, "llama3");
        assert_eq!(settings.timeout(), Duration::from_secs(5));
        assert_eq!(settings.max_concurrent_requests, 8);
        assert_eq!(settings.retry.max_retries, 5);
        assert_eq!(settings.retry.initial_delay_ms, 250);
    }

    #[test]
    fn empty_toml_yields_defaults() {
        let settings: LlmSettings = toml::from_str("").unwrap();
        assert_eq!(settings.provider, "openai");
        assert_eq!(settings.model, "gpt-3.5-turbo");
        assert_eq!(settings.timeout_ms, 30_000);
        assert!(settings.api_url.is_none());
    }

    #[test]
    fn explicit_key_wins_over_environment() {
        let settings = LlmSettings {
            api_key: Some("sk-explicit".into()),
            ..Default::default()
        };
        assert_eq!(settings.resolve_api_key().as_deref(), Some("sk-explicit"));
    }

    #[test]
    fn build_self_hosted_without_key() {
        let settings = LlmSettings {
            model: "llama3".into(),
            api_url: Some("http://localhost:11434".into()),
            ..Default::default()
        };
        let model = build_chat_model(&settings).unwrap();
        assert_eq!(model.model_name(), "llama3");
    }

    #[test]
    fn build_unknown_provider_fails() {
        let settings = LlmSettings {
            provider: "gemini".into(),
            api_key: Some("k".into()),
            ..Default::default()
        };
        let err = build_chat_model(&settings).err().unwrap();
        assert!(err.to_string().contains("Unknown LLM provider"));
    }

    #[tokio::test]
    async fn limited_model_caps_concurrency() {
        use std::sync::atomic::{AtomicU32, Ordering};

        struct CountingModel {
            in_flight: AtomicU32,
            peak: AtomicU32,
        }

        #[async_trait]
        impl ChatModel for CountingModel {
            async fn complete(&self, _request: ChatRequest) -> Result<ChatReply> {
                let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                self.peak.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(20)).await;
                self.in_flight.fetch_sub(1, Ordering::SeqCst);
                Ok(ChatReply::text("ok", "counting"))
            }
            fn model_name(&self) -> &str {
                "counting"
            }
        }

        let inner = Arc::new(CountingModel {
            in_flight: AtomicU32::new(0),
            peak: AtomicU32::new(0),
        });
        let limited = Arc::new(LimitedModel::new(inner.clone(), 2));

        let mut handles = Vec::new();
        for _ in 0..6 {
            let model = limited.clone();
            handles.push(tokio::spawn(async move {
                model.complete(ChatRequest::default()).await.unwrap();
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        assert!(inner.peak.load(Ordering::SeqCst) <= 2);
    }
}
