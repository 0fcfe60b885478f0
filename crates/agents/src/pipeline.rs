//! Shared execution pipeline behind every capability handler.
//!
//! A handler decides *which* tools to call for a query; [`HandlerCore`]
//! does the rest: run the planned tools, assemble the prompt, call the LLM
//! under a timeout and keep the conversation window current.

use std::sync::{Arc, OnceLock};
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use switchboard_common::{Execution, HandlerStatus, Result, SwitchboardError};
use switchboard_llm::{build_chat_model, ChatMessage, ChatModel, ChatRequest, LlmSettings};
use switchboard_tools::Tool;
use tracing::{debug, info, warn};

use crate::window::ConversationWindow;

/// Returned when the model produces no text.
pub const EMPTY_REPLY: &str = "I couldn't process your request.";

const DEFAULT_LLM_TIMEOUT: Duration = Duration::from_secs(30);

/// Where a handler gets its chat model from.
#[derive(Clone)]
pub enum LlmSource {
    /// Build a client from settings during `initialize`.
    Settings(LlmSettings),
    /// Use an already constructed model.
    Model(Arc<dyn ChatModel>),
}

impl LlmSource {
    fn timeout(&self) -> Duration {
        match self {
            LlmSource::Settings(settings) => settings.timeout(),
            LlmSource::Model(_) => DEFAULT_LLM_TIMEOUT,
        }
    }

    fn max_tokens(&self) -> Option<u32> {
        match self {
            LlmSource::Settings(settings) => settings.max_tokens,
            LlmSource::Model(_) => None,
        }
    }

    fn model_name(&self) -> String {
        match self {
            LlmSource::Settings(settings) => settings.model.clone(),
            LlmSource::Model(model) => model.model_name().to_string(),
        }
    }
}

impl From<LlmSettings> for LlmSource {
    fn from(settings: LlmSettings) -> Self {
        LlmSource::Settings(settings)
    }
}

impl From<Arc<dyn ChatModel>> for LlmSource {
    fn from(model: Arc<dyn ChatModel>) -> Self {
        LlmSource::Model(model)
    }
}

/// Fixed identity of a handler.
#[derive(Debug, Clone)]
pub struct HandlerProfile {
    pub name: String,
    pub description: String,
    pub temperature: f32,
}

/// One tool invocation chosen by a handler before calling the LLM.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    pub tool: String,
    pub args: Value,
}

impl ToolCall {
    pub fn new(tool: impl Into<String>, args: Value) -> Self {
        Self {
            tool: tool.into(),
            args,
        }
    }
}

#[derive(Debug, Clone)]
struct Observation {
    tool: String,
    output: String,
}

pub struct HandlerCore {
    profile: HandlerProfile,
    tools: Vec<Arc<dyn Tool>>,
    source: LlmSource,
    llm: OnceLock<Arc<dyn ChatModel>>,
    timeout: Duration,
    window: Mutex<ConversationWindow>,
}

impl HandlerCore {
    pub fn new(profile: HandlerProfile, tools: Vec<Arc<dyn Tool>>, source: LlmSource) -> Self {
        let timeout = source.timeout();
        Self {
            profile,
            tools,
            source,
            llm: OnceLock::new(),
            timeout,
            window: Mutex::new(ConversationWindow::default()),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_window(mut self, capacity: usize) -> Self {
        self.window = Mutex::new(ConversationWindow::new(capacity));
        self
    }

    pub fn name(&self) -> &str {
        &self.profile.name
    }

    pub fn description(&self) -> &str {
        &self.profile.description
    }

    pub fn tool_names(&self) -> Vec<String> {
        self.tools.iter().map(|t| t.name().to_string()).collect()
    }

    pub fn is_initialized(&self) -> bool {
        self.llm.get().is_some()
    }

    pub fn conversation_length(&self) -> usize {
        self.window.lock().len()
    }

    pub fn history(&self) -> Vec<ChatMessage> {
        self.window.lock().messages()
    }

    pub fn status(&self) -> HandlerStatus {
        HandlerStatus {
            name: self.profile.name.clone(),
            description: self.profile.description.clone(),
            tools: self.tool_names(),
            model: self.source.model_name(),
            initialized: self.is_initialized(),
            conversation_length: self.conversation_length(),
        }
    }

    /// Acquire the chat model. A second call is a no-op.
    pub async fn initialize(&self) -> Result<()> {
        if self.is_initialized() {
            debug!(handler = %self.profile.name, "Handler already initialized");
            return Ok(());
        }

        let model = match &self.source {
            LlmSource::Model(model) => Arc::clone(model),
            LlmSource::Settings(settings) => {
                build_chat_model(settings).map_err(|e| SwitchboardError::Initialization {
                    handler: self.profile.name.clone(),
                    reason: e.to_string(),
                })?
            }
        };

        // A concurrent initialize may have won; either model is equivalent.
        let _ = self.llm.set(model);
        info!(
            handler = %self.profile.name,
            model = %self.source.model_name(),
            tools = ?self.tool_names(),
            "Handler initialized"
        );
        Ok(())
    }

    fn tool(&self, name: &str) -> Option<&Arc<dyn Tool>> {
        self.tools.iter().find(|t| t.name() == name)
    }

    fn system_prompt(&self) -> String {
        let mut prompt = format!(
            "You are {}, a specialized AI agent.\n\
             Description: {}\n\n\
             Your role is to help users by using the available tools effectively.\n\
             Always be helpful, accurate, and provide clear explanations.\n\n\
             Available tools:\n",
            self.profile.name,
            self.profile.description.trim(),
        );
        for tool in &self.tools {
            prompt.push_str(&format!(
                "- {}: {}\n  parameters: {}\n",
                tool.name(),
                tool.description(),
                tool.parameters()
            ));
        }
        prompt.push_str(
            "\nTool results, when present, are attached to the user's message. \
             Base your answer on them. If a tool failed, say so and suggest an alternative.",
        );
        prompt
    }

    fn user_message(query: &str, context: Option<&Value>, observations: &[Observation]) -> String {
        let mut message = query.to_string();
        if let Some(context) = context {
            let rendered =
                serde_json::to_string_pretty(context).unwrap_or_else(|_| context.to_string());
            message.push_str(&format!("\n\nContext:\n{rendered}"));
        }
        if !observations.is_empty() {
            message.push_str("\n\nTool results:");
            for obs in observations {
                message.push_str(&format!("\n[{}]\n{}", obs.tool, obs.output));
            }
        }
        message
    }

    async fn run_tools(&self, plan: Vec<ToolCall>) -> (Vec<Observation>, Vec<String>) {
        let mut observations = Vec::with_capacity(plan.len());
        let mut used = Vec::with_capacity(plan.len());

        for call in plan {
            let Some(tool) = self.tool(&call.tool) else {
                warn!(handler = %self.profile.name, tool = %call.tool, "Planned tool is not registered");
                continue;
            };
            used.push(call.tool.clone());
            let output = match tool.call(call.args).await {
                Ok(text) => text,
                Err(e) => {
                    warn!(handler = %self.profile.name, tool = %call.tool, error = %e, "Tool call failed");
                    format!("Error: {e}")
                }
            };
            observations.push(Observation {
                tool: call.tool,
                output,
            });
        }

        (observations, used)
    }

    /// Run `plan`, then ask the model. Never fails; errors land in the
    /// returned [`Execution`].
    pub async fn run(&self, query: &str, context: Option<&Value>, plan: Vec<ToolCall>) -> Execution {
        let started = Instant::now();
        info!(handler = %self.profile.name, query = %query, "Handler processing query");

        let Some(model) = self.llm.get().cloned() else {
            return Execution::failure(
                format!("handler {} is not initialized", self.profile.name),
                started.elapsed(),
            );
        };

        let (observations, mut tools_used) = self.run_tools(plan).await;

        let mut messages = self.history();
        messages.push(ChatMessage::user(Self::user_message(query, context, &observations)));
        let request = ChatRequest {
            system_prompt: Some(self.system_prompt()),
            messages,
            temperature: Some(self.profile.temperature),
            max_tokens: self.source.max_tokens(),
        };

        let reply = match tokio::time::timeout(self.timeout, model.complete(request)).await {
            Ok(Ok(reply)) => reply,
            Ok(Err(e)) => {
                warn!(handler = %self.profile.name, error = %e, "LLM call failed");
                return Execution::failure(e.to_string(), started.elapsed())
                    .with_tools(tools_used)
                    .with_model(model.model_name());
            }
            Err(_) => {
                warn!(handler = %self.profile.name, timeout_ms = self.timeout.as_millis() as u64, "LLM call timed out");
                return Execution::failure(
                    format!("LLM request timed out after {}ms", self.timeout.as_millis()),
                    started.elapsed(),
                )
                .with_tools(tools_used)
                .with_model(model.model_name());
            }
        };

        for invoked in reply.tools_invoked {
            if !tools_used.contains(&invoked) {
                tools_used.push(invoked);
            }
        }

        let response = if reply.content.trim().is_empty() {
            EMPTY_REPLY.to_string()
        } else {
            reply.content
        };

        self.window.lock().record(query, &response);

        let elapsed = started.elapsed();
        info!(
            handler = %self.profile.name,
            elapsed_ms = elapsed.as_millis() as u64,
            "Handler completed query"
        );
        Execution::success(response, elapsed)
            .with_tools(tools_used)
            .with_model(reply.model)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde_json::json;
    use switchboard_llm::ChatReply;
    use switchboard_tools::ToolError;

    struct Echo {
        last: Mutex<Option<ChatRequest>>,
        reply: String,
    }

    impl Echo {
        fn new(reply: &str) -> Arc<Self> {
            Arc::new(Self {
                last: Mutex::new(None),
                reply: reply.into(),
            })
        }
    }

    #[async_trait]
    impl ChatModel for Echo {
        async fn complete(&self, request: ChatRequest) -> Result<ChatReply> {
            *self.last.lock() = Some(request);
            Ok(ChatReply::text(self.reply.clone(), "echo-1"))
        }

        fn model_name(&self) -> &str {
            "echo-1"
        }
    }

    struct Failing;

    #[async_trait]
    impl ChatModel for Failing {
        async fn complete(&self, _request: ChatRequest) -> Result<ChatReply> {
            Err(SwitchboardError::llm_status(429, "quota exceeded"))
        }

        fn model_name(&self) -> &str {
            "failing"
        }
    }

    struct Stalled;

    #[async_trait]
    impl ChatModel for Stalled {
        async fn complete(&self, _request: ChatRequest) -> Result<ChatReply> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(ChatReply::text("late", "stalled"))
        }

        fn model_name(&self) -> &str {
            "stalled"
        }
    }

    struct Broken;

    #[async_trait]
    impl Tool for Broken {
        fn name(&self) -> &str {
            "broken"
        }
        fn description(&self) -> &str {
            "always fails"
        }
        fn parameters(&self) -> Value {
            json!({})
        }
        async fn call(&self, _args: Value) -> std::result::Result<String, ToolError> {
            Err(ToolError::LocationNotFound("Atlantis".into()))
        }
    }

    fn profile() -> HandlerProfile {
        HandlerProfile {
            name: "TestAgent".into(),
            description: "test handler".into(),
            temperature: 0.5,
        }
    }

    async fn ready(model: Arc<dyn ChatModel>, tools: Vec<Arc<dyn Tool>>) -> HandlerCore {
        let core = HandlerCore::new(profile(), tools, LlmSource::Model(model));
        core.initialize().await.unwrap();
        core
    }

    #[tokio::test]
    async fn uninitialized_core_reports_failure() {
        let core = HandlerCore::new(profile(), vec![], LlmSource::Model(Echo::new("hi")));
        let exec = core.run("hello", None, vec![]).await;
        assert!(!exec.is_success());
        assert!(exec.error.unwrap().contains("not initialized"));
        assert_eq!(core.conversation_length(), 0);
    }

    #[tokio::test]
    async fn prompt_carries_history_context_and_tool_output() {
        let echo = Echo::new("answer");
        let core = ready(echo.clone(), vec![Arc::new(Broken)]).await;

        core.run("first", None, vec![]).await;
        let exec = core
            .run(
                "second",
                Some(&json!({"city": "Oslo"})),
                vec![ToolCall::new("broken", json!({})), ToolCall::new("missing", json!({}))],
            )
            .await;

        assert!(exec.is_success());
        assert_eq!(exec.tools_used, vec!["broken".to_string()]);
        assert_eq!(exec.model.as_deref(), Some("echo-1"));

        let request = echo.last.lock().clone().unwrap();
        let system = request.system_prompt.unwrap();
        assert!(system.starts_with("You are TestAgent, a specialized AI agent."));
        assert!(system.contains("- broken: always fails"));
        assert_eq!(request.temperature, Some(0.5));
        assert_eq!(request.messages.len(), 3);
        assert_eq!(request.messages[0].content, "first");
        let last = &request.messages[2].content;
        assert!(last.starts_with("second"));
        assert!(last.contains("\"city\": \"Oslo\""));
        assert!(last.contains("[broken]\nError: Location not found: Atlantis"));
    }

    #[tokio::test]
    async fn empty_reply_gets_placeholder() {
        let core = ready(Echo::new("   "), vec![]).await;
        let exec = core.run("hello", None, vec![]).await;
        assert_eq!(exec.response, EMPTY_REPLY);
        assert_eq!(core.conversation_length(), 2);
    }

    #[tokio::test]
    async fn llm_failure_is_data_and_window_untouched() {
        let core = ready(Arc::new(Failing), vec![]).await;
        let exec = core.run("hello", None, vec![]).await;
        assert!(!exec.is_success());
        assert_eq!(exec.error.as_deref(), Some("LLM error: 429 quota exceeded"));
        assert!(exec
            .response
            .starts_with("I encountered an error while processing your request:"));
        assert_eq!(core.conversation_length(), 0);
    }

    #[tokio::test]
    async fn llm_timeout_is_reported() {
        let core = ready(Arc::new(Stalled), vec![])
            .await
            .with_timeout(Duration::from_millis(50));
        let exec = core.run("hello", None, vec![]).await;
        assert_eq!(exec.error.as_deref(), Some("LLM request timed out after 50ms"));
    }

    #[tokio::test]
    async fn unknown_provider_fails_initialization() {
        let settings = LlmSettings {
            provider: "carrier-pigeon".into(),
            ..Default::default()
        };
        let core = HandlerCore::new(profile(), vec![], LlmSource::Settings(settings));
        let err = core.initialize().await.unwrap_err();
        assert!(matches!(err, SwitchboardError::Initialization { .. }));
        assert!(!core.status().initialized);
    }

    #[tokio::test]
    async fn status_reflects_state() {
        let core = ready(Echo::new("ok"), vec![Arc::new(Broken)]).await;
        core.run("q", None, vec![]).await;
        let status = core.status();
        assert_eq!(status.name, "TestAgent");
        assert_eq!(status.tools, vec!["broken".to_string()]);
        assert_eq!(status.model, "echo-1");
        assert!(status.initialized);
        assert_eq!(status.conversation_length, 2);
    }
}
