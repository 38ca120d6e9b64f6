//! Tenderdesk Core Library
//!
//! Domain models, error types, configuration and validation errors shared by every
//! tenderdesk crate.

pub mod config;
pub mod error;
pub mod hooks;
pub mod models;
pub mod validation;

// Re-export commonly used types
pub use config::{
    Config, ExtractionConfig, ProviderCredentials, ProviderKind, ProvidersConfig, StorageConfig,
    UploadConfig,
};
pub use error::{AppError, ErrorMetadata, LogLevel};
pub use hooks::{
    AttemptOutcome, NoOpUsageRecorder, ProviderAttempt, ProviderUsageSummary, UsageRecorder,
};
pub use validation::ValidationError;
