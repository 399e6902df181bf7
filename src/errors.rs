use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error taxonomy for the PLM gateway
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GatewayError {
    // Authentication Errors
    #[error("OAuth discovery failed: {0}")]
    Discovery(String),

    #[error("token exchange failed: {0}")]
    Auth(String),

    // Backend Errors
    #[error("{operation} error: {message}")]
    Request { operation: String, message: String },

    // Caller Errors
    #[error("{0}")]
    Validation(String),

    #[error("{feature} is not implemented")]
    NotImplemented { feature: String },

    // Startup Errors
    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl GatewayError {
    pub fn request(operation: impl Into<String>, message: impl Into<String>) -> Self {
        GatewayError::Request {
            operation: operation.into(),
            message: message.into(),
        }
    }
}

/// Error severity levels for categorization in logs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorSeverity {
    /// Caller mistake or unsupported feature, nothing wrong with the backend
    Info,
    /// Backend rejected or failed a single request
    Warning,
    /// Credentials or configuration are unusable
    Error,
}

/// Error plus the metadata we log alongside it
#[derive(Debug, Clone)]
pub struct ErrorContext {
    pub error: GatewayError,
    pub severity: ErrorSeverity,
    pub timestamp: chrono::DateTime<chrono::Utc>,
    pub context_data: std::collections::HashMap<String, String>,
    pub correlation_id: String,
}

impl ErrorContext {
    pub fn new(error: GatewayError) -> Self {
        let severity = Self::determine_severity(&error);

        Self {
            error,
            severity,
            timestamp: chrono::Utc::now(),
            context_data: std::collections::HashMap::new(),
            correlation_id: uuid::Uuid::new_v4().to_string(),
        }
    }

    pub fn with_context(mut self, key: &str, value: &str) -> Self {
        self.context_data.insert(key.to_string(), value.to_string());
        self
    }

    fn determine_severity(error: &GatewayError) -> ErrorSeverity {
        match error {
            GatewayError::Validation(_) | GatewayError::NotImplemented { .. } => {
                ErrorSeverity::Info
            }
            GatewayError::Request { .. } => ErrorSeverity::Warning,
            GatewayError::Discovery(_)
            | GatewayError::Auth(_)
            | GatewayError::Configuration(_) => ErrorSeverity::Error,
        }
    }

    /// Text handed back to the tool caller
    pub fn user_message(&self) -> String {
        format!("Error: {}", self.error)
    }

    /// Emit the technical message at the level matching the severity
    pub fn log(&self) {
        let message = self.technical_message();
        match self.severity {
            ErrorSeverity::Info => tracing::info!("{message}"),
            ErrorSeverity::Warning => tracing::warn!("{message}"),
            ErrorSeverity::Error => tracing::error!("{message}"),
        }
    }

    /// Generate technical error message for logs
    pub fn technical_message(&self) -> String {
        let mut context: Vec<_> = self.context_data.iter().collect();
        context.sort();
        format!(
            "[{}] {} | Severity: {:?} | Correlation: {} | Context: {:?}",
            self.timestamp.format("%Y-%m-%d %H:%M:%S UTC"),
            self.error,
            self.severity,
            self.correlation_id,
            context
        )
    }
}

/// Result alias used across the library
pub type GatewayResult<T> = Result<T, GatewayError>;
