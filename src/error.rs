use serde_json::Value as JsonValue;
use thiserror::Error;
use tracing::{error, warn};

pub type EngineResult<T> = Result<T, EngineError>;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("validation failed: {message}")]
    Validation {
        message: String,
        details: Option<JsonValue>,
    },

    #[error("event not found: {id}")]
    NotFound { id: String },

    #[error("reminder scheduling failed: {message}")]
    Scheduling { message: String },

    #[error("invalid configuration: {message}")]
    Config { message: String },

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("yaml error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}

impl EngineError {
    pub fn validation(message: impl Into<String>) -> Self {
        let message = message.into();
        warn!(target: "engine::validation", %message, "validation error");
        EngineError::Validation {
            message,
            details: None,
        }
    }

    pub fn validation_with_details(message: impl Into<String>, details: JsonValue) -> Self {
        let message = message.into();
        warn!(target: "engine::validation", %message, details = %details, "validation error with details");
        EngineError::Validation {
            message,
            details: Some(details),
        }
    }

    pub fn not_found(id: impl ToString) -> Self {
        let id = id.to_string();
        warn!(target: "engine::store", %id, "event not found");
        EngineError::NotFound { id }
    }

    pub fn scheduling(message: impl Into<String>) -> Self {
        let message = message.into();
        warn!(target: "engine::reminder", %message, "scheduling error");
        EngineError::Scheduling { message }
    }

    pub fn config(message: impl Into<String>) -> Self {
        let message = message.into();
        warn!(target: "engine::settings", %message, "configuration error");
        EngineError::Config { message }
    }

    pub fn other(message: impl Into<String>) -> Self {
        let message = message.into();
        error!(target: "engine::other", %message, "other error");
        EngineError::Other(message)
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, EngineError::Validation { .. })
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, EngineError::NotFound { .. })
    }

    pub fn details(&self) -> Option<&JsonValue> {
        match self {
            EngineError::Validation { details, .. } => details.as_ref(),
            _ => None,
        }
    }
}
