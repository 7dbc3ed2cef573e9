//! Error types for the answer-sheet pipeline.
//!
//! Only configuration problems, malformed answer keys and broken inputs surface
//! as [`SheetError`]. Question-level failures (low confidence, missing digits)
//! and page-level aborts (missing regions) are reported as data in the page
//! result, never as errors.

use thiserror::Error;

/// Identifies the pipeline stage an error originated from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessingStage {
    /// Building token keys.
    KeyGeneration,
    /// Rendering and encoding failure evidence.
    Evidence,
}

impl std::fmt::Display for ProcessingStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProcessingStage::KeyGeneration => write!(f, "key generation"),
            ProcessingStage::Evidence => write!(f, "evidence rendering"),
        }
    }
}

/// Errors produced by the answer-sheet pipeline.
#[derive(Error, Debug)]
pub enum SheetError {
    /// Error occurred while loading an image.
    #[error("image load")]
    ImageLoad(#[source] image::ImageError),

    /// Error occurred while encoding an image.
    #[error("image encode ({format})")]
    ImageEncode {
        /// Target format name.
        format: &'static str,
        /// The underlying encoder error.
        #[source]
        source: image::ImageError,
    },

    /// Error occurred during processing.
    #[error("{kind} failed: {context}")]
    Processing {
        /// The stage of processing where the error occurred.
        kind: ProcessingStage,
        /// Additional context about the error.
        context: String,
        /// The underlying error that caused this error.
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// An external service (detector or classifier) returned an error.
    #[error("{service} service: {message}")]
    Service {
        /// Which service failed.
        service: &'static str,
        /// Description supplied by the service.
        message: String,
    },

    /// The answer key violates its schema.
    #[error("invalid answer key: {message}")]
    InvalidAnswerKey {
        /// What is wrong with the key.
        message: String,
    },

    /// A token key does not follow the key grammar.
    #[error("malformed token key '{key}': {reason}")]
    KeyParse {
        /// The offending key.
        key: String,
        /// Which part of the grammar failed.
        reason: String,
    },

    /// Error indicating invalid input.
    #[error("invalid input: {message}")]
    InvalidInput {
        /// A message describing the invalid input.
        message: String,
    },

    /// Error indicating a configuration problem.
    #[error("configuration: {message}")]
    ConfigError {
        /// A message describing the configuration error.
        message: String,
    },

    /// JSON (de)serialization error.
    #[error("json")]
    Json(#[from] serde_json::Error),

    /// IO error.
    #[error("io")]
    Io(#[from] std::io::Error),
}

impl SheetError {
    /// Creates a processing error for the given stage.
    pub fn processing_error(
        kind: ProcessingStage,
        context: impl Into<String>,
        error: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Processing {
            kind,
            context: context.into(),
            source: Box::new(error),
        }
    }

    /// Creates an error for invalid input.
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }

    /// Creates an error for configuration problems.
    pub fn config_error(message: impl Into<String>) -> Self {
        Self::ConfigError {
            message: message.into(),
        }
    }

    /// Creates a configuration error naming the offending field.
    pub fn config_error_with_context(field: &str, value: &str, reason: &str) -> Self {
        Self::ConfigError {
            message: format!(
                "Configuration error in field '{}' with value '{}': {}",
                field, value, reason
            ),
        }
    }

    /// Creates an error for a malformed answer key.
    pub fn invalid_answer_key(message: impl Into<String>) -> Self {
        Self::InvalidAnswerKey {
            message: message.into(),
        }
    }

    /// Creates an error for a token key that does not parse.
    pub fn key_parse(key: &str, reason: impl Into<String>) -> Self {
        Self::KeyParse {
            key: key.to_string(),
            reason: reason.into(),
        }
    }

    /// Creates an error reported by the external digit classifier.
    pub fn classification_error(message: impl Into<String>) -> Self {
        Self::Service {
            service: "classifier",
            message: message.into(),
        }
    }

    /// Creates an error reported by the external region detector.
    pub fn detection_error(message: impl Into<String>) -> Self {
        Self::Service {
            service: "detector",
            message: message.into(),
        }
    }

    /// Creates an error for a failed evidence encode.
    pub fn encode_error(format: &'static str, source: image::ImageError) -> Self {
        Self::ImageEncode { format, source }
    }
}

impl From<image::ImageError> for SheetError {
    fn from(error: image::ImageError) -> Self {
        Self::ImageLoad(error)
    }
}
