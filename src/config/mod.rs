//! Configuration module - engine settings and provider definitions

pub mod settings;

pub use settings::{
    GenerationConfig, LoggingConfig, ProviderConfig, ProviderKind, Settings, StorageConfig,
};
