//! Error types for the WellCoach domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error enum; [`Error`] unifies them.

use thiserror::Error;

/// The top-level error type for all WellCoach operations.
#[derive(Debug, Error)]
pub enum Error {
    // --- Provider errors ---
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    // --- Gateway errors ---
    #[error("Gateway error: {0}")]
    Gateway(#[from] GatewayError),

    // --- Template errors ---
    #[error("Template error: {0}")]
    Template(#[from] TemplateError),

    // --- Pipeline step errors ---
    #[error("Step error: {0}")]
    Step(#[from] StepError),

    // --- Serialization ---
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

// --- Bounded context errors ---

/// Transport or provider-side failures of a hosted model call.
#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("API request failed: {message} (status: {status_code})")]
    ApiError { status_code: u16, message: String },

    #[error("Rate limited by provider, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Network error: {0}")]
    Network(String),
}

/// Failures resolving an agent name to a model client.
#[derive(Debug, Clone, Error)]
pub enum GatewayError {
    #[error("Unknown agent '{agent}' (known agents: {})", .known.join(", "))]
    UnknownAgent { agent: String, known: Vec<String> },

    #[error("Agent '{agent}' has no usable credential for provider '{provider}'")]
    MissingCredential { agent: String, provider: String },

    #[error("Model gateway is not initialized: {reason}")]
    GatewayNotInitialized { reason: String },
}

/// Caller errors when rendering a prompt template.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TemplateError {
    #[error(
        "Template '{template}' variable mismatch (missing: [{}], unexpected: [{}])",
        .missing.join(", "),
        .unexpected.join(", ")
    )]
    TemplateVariableMismatch {
        template: String,
        missing: Vec<String>,
        unexpected: Vec<String>,
    },
}

/// Why a single pipeline step stopped the run.
#[derive(Debug, Clone, Error)]
pub enum StepError {
    #[error(transparent)]
    Gateway(#[from] GatewayError),

    #[error(transparent)]
    Template(#[from] TemplateError),

    #[error("Model invocation failed for agent '{agent}': {source}")]
    ModelInvocationFailure {
        agent: String,
        #[source]
        source: ProviderError,
    },

    #[error("Reply from agent '{agent}' is not a JSON object: {reason}")]
    JsonParseFailure { agent: String, reason: String },
}

impl StepError {
    /// Short machine-readable label for logs and traces.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Gateway(GatewayError::UnknownAgent { .. }) => "unknown_agent",
            Self::Gateway(GatewayError::MissingCredential { .. }) => "missing_credential",
            Self::Gateway(GatewayError::GatewayNotInitialized { .. }) => "gateway_not_initialized",
            Self::Template(_) => "template_variable_mismatch",
            Self::ModelInvocationFailure { .. } => "model_invocation_failure",
            Self::JsonParseFailure { .. } => "json_parse_failure",
        }
    }
}
