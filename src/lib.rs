//! Blog Image Generation Engine
//!
//! Orchestrates per-page image generation for outline-structured blog
//! posts: the cover page is generated first and seeds the visual
//! reference for the remaining pages, which fan out through pluggable
//! provider backends with layered retry and live progress events.

pub mod compress;
pub mod config;
pub mod error;
pub mod generator;
pub mod retry;
pub mod service;
pub mod storage;
pub mod task;
pub mod telemetry;

pub use compress::ImageCompressor;
pub use config::{GenerationConfig, ProviderConfig, ProviderKind, Settings};
pub use error::{EngineError, Result};
pub use generator::{ImageGenerator, ImageRequest};
pub use service::{GenerationEvent, GenerationRun, ImageService, RetryOverrides};
pub use storage::TaskStorage;
pub use task::store::TaskStore;
pub use task::{ImageStyle, OutlineContext, Page, PageKind};
