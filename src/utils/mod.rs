//! Utility functions for the answer-sheet pipeline.
//!
//! This module provides image loading and encoding helpers and logging setup.

pub mod image;

// Re-export image processing functions
pub use self::image::{encode_image, encode_image_base64, hconcat_on_white, load_image};

/// Initializes the tracing subscriber for logging.
///
/// This function sets up the tracing subscriber with environment filter and formatting layer.
/// It's typically called at the start of an application to enable logging.
pub fn init_tracing() {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer())
        .init();
}
