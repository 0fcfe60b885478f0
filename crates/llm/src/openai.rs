use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use switchboard_common::{Result, SwitchboardError};

use crate::client::{ChatModel, ChatReply, ChatRequest, TokenUsage};

pub const OPENAI_BASE_URL: &str = "https://api.openai.com";

#[derive(Serialize)]
struct CompletionBody<'a> {
    model: &'a str,
    messages: Vec<WireMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
struct WireMessage {
    role: String,
    #[serde(default)]
    content: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    tool_calls: Vec<WireToolCall>,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
struct WireToolCall {
    function: WireFunction,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
struct WireFunction {
    name: String,
}

#[derive(Deserialize)]
struct CompletionResponse {
    choices: Vec<Choice>,
    model: String,
    usage: Option<Usage>,
}

#[derive(Deserialize)]
struct Choice {
    message: WireMessage,
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct Usage {
    prompt_tokens: u32,
    completion_tokens: u32,
}

/// Client for the OpenAI chat completions API and compatible servers.
pub struct OpenAiChat {
    base_url: String,
    model: String,
    api_key: Option<String>,
    http_client: reqwest::Client,
}

impl OpenAiChat {
    pub fn new(
        base_url: Option<String>,
        model: String,
        api_key: Option<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| SwitchboardError::Config(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            base_url: base_url
                .unwrap_or_else(|| OPENAI_BASE_URL.to_string())
                .trim_end_matches('/')
                .to_string(),
            model,
            api_key,
            http_client,
        })
    }

    fn wire_messages(request: &ChatRequest) -> Vec<WireMessage> {
        let system = request.system_prompt.iter().map(|prompt| WireMessage {
            role: "system".to_string(),
            content: Some(prompt.clone()),
            tool_calls: Vec::new(),
        });
        let turns = request.messages.iter().map(|msg| WireMessage {
            role: msg.role.as_str().to_string(),
            content: Some(msg.content.clone()),
            tool_calls: Vec::new(),
        });
        system.chain(turns).collect()
    }

    fn body<'a>(&'a self, request: &ChatRequest) -> CompletionBody<'a> {
        CompletionBody {
            model: &self.model,
            messages: Self::wire_messages(request),
            temperature: request.temperature,
            max_tokens: request.max_tokens,
        }
    }

    fn parse_reply(raw: &str) -> Result<ChatReply> {
        let parsed: CompletionResponse = serde_json::from_str(raw)?;
        let choice = parsed
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| SwitchboardError::Handler("Model returned no choices".to_string()))?;

        Ok(ChatReply {
            content: choice.message.content.unwrap_or_default(),
            model: parsed.model,
            usage: parsed.usage.map(|u| TokenUsage {
                prompt_tokens: u.prompt_tokens,
                completion_tokens: u.completion_tokens,
            }),
            finish_reason: choice.finish_reason,
            tools_invoked: choice
                .message
                .tool_calls
                .into_iter()
                .map(|call| call.function.name)
                .collect(),
        })
    }
}

#[async_trait]
impl ChatModel for OpenAiChat {
    async fn complete(&self, request: ChatRequest) -> Result<ChatReply> {
        let url = format!("{}/v1/chat/completions", self.base_url);

        let mut http_req = self.http_client.post(&url).json(&self.body(&request));
        if let Some(ref key) = self.api_key {
            http_req = http_req.bearer_auth(key);
        }

        let response = http_req
            .send()
            .await
            .map_err(|e| SwitchboardError::llm(format!("request to {url} failed: {e}")))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| SwitchboardError::llm(format!("failed to read response body: {e}")))?;

        if !status.is_success() {
            return Err(SwitchboardError::llm_status(status.as_u16(), text));
        }

        Self::parse_reply(&text)
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}
