use thiserror::Error;

/// Main error type for the odds/EV engine
#[derive(Error, Debug)]
pub enum EdgeError {
    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    // IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // Serialization errors
    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    // Numeric input errors (fail fast, never produce a silently wrong probability)
    #[error("Invalid price for {field}: {price} (decimal odds must be finite and > 1.0)")]
    InvalidPrice { field: String, price: f64 },

    #[error("Negative margin: overround {overround:.6} < 1.0")]
    NegativeMargin { overround: f64 },

    #[error("Numeric inconsistency: {0}")]
    NumericInconsistency(String),

    // Validation errors
    #[error("Validation failed: {0}")]
    Validation(String),

    // Model errors
    #[error("Model {model} unusable: {reason}")]
    ModelUnusable { model: String, reason: String },

    // Collaborator errors (absorbed by CachedSource before reaching the core)
    #[error("Source {source_name} failed: {reason}")]
    Source { source_name: String, reason: String },

    // Generic errors
    #[error("Internal error: {0}")]
    Internal(String),

    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

/// Result type alias for EdgeError
pub type Result<T> = std::result::Result<T, EdgeError>;

impl EdgeError {
    pub fn invalid_price(field: impl Into<String>, price: f64) -> Self {
        EdgeError::InvalidPrice {
            field: field.into(),
            price,
        }
    }

    pub fn source_failed(source_name: impl Into<String>, reason: impl ToString) -> Self {
        EdgeError::Source {
            source_name: source_name.into(),
            reason: reason.to_string(),
        }
    }
}
