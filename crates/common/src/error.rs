//! Error types for Switchboard.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum SwitchboardError {
    #[error("Handler error: {0}")]
    Handler(String),

    /// A failure reported by the LLM collaborator. `status` carries the HTTP
    /// status when the failure came from a response rather than the transport.
    #[error("LLM error: {message}")]
    Llm { status: Option<u16>, message: String },

    #[error("Tool error: {0}")]
    Tool(String),

    #[error("Failed to initialize {handler}: {reason}")]
    Initialization { handler: String, reason: String },

    #[error("Coordinator not initialized")]
    NotInitialized,

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl SwitchboardError {
    pub fn llm(message: impl Into<String>) -> Self {
        Self::Llm {
            status: None,
            message: message.into(),
        }
    }

    pub fn llm_status(status: u16, message: impl Into<String>) -> Self {
        Self::Llm {
            status: Some(status),
            message: format!("{status} {}", message.into()),
        }
    }

    /// Whether retrying the same request could plausibly succeed.
    ///
    /// Rate limits and server-side failures are transient; anything the
    /// caller caused (bad key, bad request) is not. Transport failures
    /// without a status are treated as transient.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Llm {
                status: Some(code), ..
            } => *code == 429 || (500..=599).contains(code),
            Self::Llm { status: None, .. } => true,
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, SwitchboardError>;
