//! Core coordinator: handler registry, routing, dispatch and history.

use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use futures_util::future::try_join_all;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use switchboard_agents::{default_handlers, LlmSource};
use switchboard_common::{
    clamp_confidence, new_request_id, Execution, Handler, HandlerStatus, ResponseEnvelope,
    Result, SwitchboardError, COORDINATOR, NO_HANDLER,
};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::config::CoordinatorConfig;
use crate::history::{HistoryEntry, HistoryLedger};
use crate::routing::{HandlerScore, RouteDecision};

/// User identifier recorded when the caller supplies none.
pub const DEFAULT_USER: &str = "default";

const NO_HANDLER_RESPONSE: &str =
    "I'm sorry, I couldn't find an appropriate agent to handle your request.";
const NO_HANDLER_ERROR: &str = "No suitable agent found";

/// Read-only snapshot returned by [`Coordinator::get_agent_status`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoordinatorStatus {
    pub coordinator_initialized: bool,
    pub total_agents: usize,
    pub total_queries: usize,
    pub agents: Vec<HandlerStatus>,
}

/// Routes each query to the best-fitting handler and records the outcome.
///
/// The registry is read-mostly: routing works on a cloned snapshot, so
/// `register`/`remove_handler` never race a scoring pass.
pub struct Coordinator {
    config: CoordinatorConfig,
    handlers: RwLock<Vec<Arc<dyn Handler>>>,
    history: HistoryLedger,
    initialized: AtomicBool,
}

impl Coordinator {
    /// Create a coordinator with an empty registry.
    pub fn new(config: CoordinatorConfig) -> Self {
        let history = HistoryLedger::new(config.history_capacity);
        Self {
            config,
            handlers: RwLock::new(Vec::new()),
            history,
            initialized: AtomicBool::new(false),
        }
    }

    /// Create a coordinator with the research, weather and general handlers.
    pub fn with_default_handlers(config: CoordinatorConfig) -> Self {
        let llm = LlmSource::Settings(config.llm.clone());
        let handlers = default_handlers(&llm, &config.tools, config.conversation_window);
        let coordinator = Self::new(config);
        for handler in handlers {
            coordinator.register(handler);
        }
        coordinator
    }

    pub fn config(&self) -> &CoordinatorConfig {
        &self.config
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::Acquire)
    }

    /// Add a handler without initializing it.
    ///
    /// A handler with the same name is replaced in place, keeping its
    /// registration position.
    pub fn register(&self, handler: Arc<dyn Handler>) {
        let name = handler.name().to_string();
        let mut handlers = self.handlers.write();
        match handlers.iter().position(|h| h.name() == name) {
            Some(i) => {
                warn!(handler = %name, "Replacing registered handler");
                handlers[i] = handler;
            }
            None => {
                debug!(handler = %name, "Registered handler");
                handlers.push(handler);
            }
        }
    }

    /// Initialize and register a handler. Nothing is registered on failure.
    pub async fn add_handler(&self, handler: Arc<dyn Handler>) -> Result<()> {
        if let Err(e) = handler.initialize().await {
            error!(handler = %handler.name(), error = %e, "Handler initialization failed");
            return Err(e);
        }
        info!(handler = %handler.name(), "Adding handler");
        self.register(handler);
        Ok(())
    }

    /// Remove a handler by name, returning whether it was registered.
    pub fn remove_handler(&self, name: &str) -> bool {
        let mut handlers = self.handlers.write();
        let before = handlers.len();
        handlers.retain(|h| h.name() != name);
        let removed = handlers.len() != before;
        if removed {
            info!(handler = %name, "Removed handler");
        }
        removed
    }

    /// Registered handler names in registration order.
    pub fn handler_names(&self) -> Vec<String> {
        self.handlers.read().iter().map(|h| h.name().to_string()).collect()
    }

    fn snapshot(&self) -> Vec<Arc<dyn Handler>> {
        self.handlers.read().clone()
    }

    /// Initialize every registered handler concurrently.
    ///
    /// All-or-nothing: any failure is returned and the coordinator stays
    /// uninitialized. Calling it again re-runs each handler's idempotent
    /// initialization and leaves the registry untouched.
    pub async fn initialize(&self) -> Result<()> {
        let handlers = self.snapshot();
        info!(handlers = handlers.len(), "Initializing coordinator");

        try_join_all(handlers.iter().map(|handler| async move {
            handler.initialize().await.inspect_err(|e| {
                error!(handler = %handler.name(), error = %e, "Handler initialization failed");
            })
        }))
        .await?;

        self.initialized.store(true, Ordering::Release);
        info!("Coordinator initialized");
        Ok(())
    }

    /// Score every handler for `query` and apply the selection policy.
    pub fn evaluate(&self, query: &str) -> RouteDecision {
        self.decide(query).0
    }

    /// The handler `query` would be dispatched to, if any.
    pub fn route(&self, query: &str) -> Option<Arc<dyn Handler>> {
        self.decide(query).1
    }

    fn decide(&self, query: &str) -> (RouteDecision, Option<Arc<dyn Handler>>) {
        let handlers = self.snapshot();
        let scores = handlers.iter().map(|h| score_isolated(h.as_ref(), query)).collect();
        let decision = RouteDecision::from_scores(scores, &self.config.routing);

        let selected = decision
            .selected
            .as_deref()
            .and_then(|name| handlers.iter().find(|h| h.name() == name))
            .cloned();

        match &decision.selected {
            Some(name) => info!(
                handler = %name,
                score = decision.best_score,
                fallback = decision.fallback,
                "Routed query"
            ),
            None => warn!(score = decision.best_score, "No handler eligible for query"),
        }

        (decision, selected)
    }

    /// Route `query`, run the selected handler and record the outcome.
    ///
    /// Only a call before [`initialize`](Self::initialize) fails; every
    /// routing or dispatch fault is reported inside the envelope.
    pub async fn process_query(
        &self,
        query: &str,
        user_id: Option<&str>,
        context: Option<Value>,
    ) -> Result<ResponseEnvelope> {
        if !self.is_initialized() {
            return Err(SwitchboardError::NotInitialized);
        }

        let started = Instant::now();
        let request_id = new_request_id();
        let user_id = user_id.unwrap_or(DEFAULT_USER).to_string();
        let (decision, handler) = self.decide(query);
        let routing = json!({
            "scores": decision.scores,
            "fallback": decision.fallback,
        });

        let Some(handler) = handler else {
            let elapsed = started.elapsed();
            self.history
                .record(HistoryEntry::new(&user_id, query, NO_HANDLER, elapsed, false));
            return Ok(ResponseEnvelope {
                request_id,
                response: NO_HANDLER_RESPONSE.into(),
                agent_used: NO_HANDLER.into(),
                execution_time: 0.0,
                coordinator_time: elapsed.as_secs_f64(),
                user_id,
                timestamp: Utc::now(),
                metadata: Some(json!({ "routing": routing })),
                error: Some(NO_HANDLER_ERROR.into()),
            });
        };

        let name = handler.name().to_string();
        let task = AbortOnDrop(tokio::spawn({
            let query = query.to_string();
            async move { handler.execute(&query, context.as_ref()).await }
        }));

        let envelope = match task.join().await {
            Ok(exec) => {
                let elapsed = started.elapsed();
                info!(
                    handler = %name,
                    elapsed_ms = exec.elapsed.as_millis() as u64,
                    success = exec.is_success(),
                    "Handler finished"
                );
                self.history.record(HistoryEntry::new(
                    &user_id,
                    query,
                    &name,
                    exec.elapsed,
                    exec.is_success(),
                ));
                dispatched_envelope(request_id, name, user_id, exec, elapsed, routing)
            }
            Err(e) => {
                let cause = if e.is_panic() {
                    format!("handler {name} panicked: {}", panic_message(&*e.into_panic()))
                } else {
                    format!("handler {name} was cancelled")
                };
                error!(handler = %name, error = %cause, "Dispatch failed");
                let elapsed = started.elapsed();
                self.history
                    .record(HistoryEntry::new(&user_id, query, COORDINATOR, elapsed, false));
                let failed = Execution::failure(cause, elapsed);
                ResponseEnvelope {
                    request_id,
                    response: failed.response,
                    agent_used: COORDINATOR.into(),
                    execution_time: elapsed.as_secs_f64(),
                    coordinator_time: elapsed.as_secs_f64(),
                    user_id,
                    timestamp: Utc::now(),
                    metadata: Some(json!({ "routing": routing })),
                    error: failed.error,
                }
            }
        };

        Ok(envelope)
    }

    /// Registry snapshot with each handler's own status, in registration order.
    pub fn get_agent_status(&self) -> CoordinatorStatus {
        let agents: Vec<HandlerStatus> = self.snapshot().iter().map(|h| h.status()).collect();
        CoordinatorStatus {
            coordinator_initialized: self.is_initialized(),
            total_agents: agents.len(),
            total_queries: self.history.len(),
            agents,
        }
    }

    /// Retained history, oldest first, optionally for one user.
    pub fn get_query_history(&self, user_id: Option<&str>) -> Vec<HistoryEntry> {
        self.history.entries(user_id)
    }
}

fn dispatched_envelope(
    request_id: String,
    agent_used: String,
    user_id: String,
    exec: Execution,
    elapsed: std::time::Duration,
    routing: Value,
) -> ResponseEnvelope {
    ResponseEnvelope {
        request_id,
        response: exec.response,
        agent_used,
        execution_time: exec.elapsed.as_secs_f64(),
        coordinator_time: elapsed.as_secs_f64(),
        user_id,
        timestamp: Utc::now(),
        metadata: Some(json!({
            "tools_used": exec.tools_used,
            "model": exec.model,
            "handler_execution_time": exec.elapsed.as_secs_f64(),
            "routing": routing,
        })),
        error: exec.error,
    }
}

/// Score one handler, turning errors, panics and non-finite values into 0.0.
fn score_isolated(handler: &dyn Handler, query: &str) -> HandlerScore {
    let name = handler.name();
    let scored = match catch_unwind(AssertUnwindSafe(|| handler.score(query))) {
        Ok(Ok(score)) if score.is_finite() => HandlerScore::new(name, clamp_confidence(score)),
        Ok(Ok(score)) => HandlerScore::faulted(name, format!("non-finite score {score}")),
        Ok(Err(e)) => HandlerScore::faulted(name, e.to_string()),
        Err(payload) => HandlerScore::faulted(name, format!("panicked: {}", panic_message(&*payload))),
    };

    match &scored.fault {
        Some(fault) => warn!(handler = %name, error = %fault, "Scoring failed, using 0.0"),
        None => debug!(handler = %name, score = scored.score, "Scored query"),
    }
    scored
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Aborts the handler task if the dispatching future is dropped.
struct AbortOnDrop<T>(JoinHandle<T>);

impl<T> AbortOnDrop<T> {
    async fn join(mut self) -> std::result::Result<T, tokio::task::JoinError> {
        (&mut self.0).await
    }
}

impl<T> Drop for AbortOnDrop<T> {
    fn drop(&mut self) {
        self.0.abort();
    }
}
