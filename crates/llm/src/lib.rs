//! The LLM collaborator behind every capability handler.
//!
//! Handlers only see the [`ChatModel`] trait. [`build_chat_model`] assembles
//! the production stack: an OpenAI-compatible client, retried on transient
//! failures, behind a concurrency limit.

pub mod client;
pub mod config;
pub mod openai;
pub mod retry;

pub use client::{ChatMessage, ChatModel, ChatReply, ChatRequest, Role, TokenUsage};
pub use config::{build_chat_model, LimitedModel, LlmSettings, OPENAI_API_KEY_ENV};
pub use openai::OpenAiChat;
pub use retry::{RetryPolicy, RetryingModel};
