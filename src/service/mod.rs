//! Service module - prompt building, progress events, and the orchestrator

pub mod events;
pub mod image_service;
pub mod prompt;

pub use events::{
    CompleteData, ErrorData, FinishData, GenerationEvent, Phase, ProgressData, RetryFinishData,
    RetryStartData,
};
pub use image_service::{GenerationRun, ImageService, RetryOverrides, SingleImageResult};
