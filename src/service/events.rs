//! Progress event protocol
//!
//! Events serialize as `{"event": "...", "data": {...}}`, the shape the
//! streaming transport layer forwards to clients verbatim.

use serde::Serialize;

/// Pipeline phase a page event belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Cover,
    Content,
}

/// One progress record emitted while a task runs
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum GenerationEvent {
    Progress(ProgressData),
    Complete(CompleteData),
    Error(ErrorData),
    Finish(FinishData),
    RetryStart(RetryStartData),
    RetryFinish(RetryFinishData),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProgressData {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub index: Option<u32>,
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub current: usize,
    pub total: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phase: Option<Phase>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompleteData {
    pub index: u32,
    pub status: String,
    pub image_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phase: Option<Phase>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ErrorData {
    pub index: u32,
    pub status: String,
    pub message: String,
    pub retryable: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phase: Option<Phase>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FinishData {
    pub success: bool,
    pub task_id: String,
    pub images: Vec<String>,
    pub total: usize,
    pub completed: usize,
    pub failed: usize,
    pub failed_indices: Vec<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RetryStartData {
    pub total: usize,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RetryFinishData {
    pub success: bool,
    pub total: usize,
    pub completed: usize,
    pub failed: usize,
}

impl GenerationEvent {
    /// A page entering generation
    pub fn generating(index: u32, current: usize, total: usize, phase: Phase) -> Self {
        Self::Progress(ProgressData {
            index: Some(index),
            status: "generating".to_string(),
            message: None,
            current,
            total,
            phase: Some(phase),
        })
    }

    /// The cover entering generation, with its banner message
    pub fn cover_generating(index: u32, total: usize) -> Self {
        Self::Progress(ProgressData {
            index: Some(index),
            status: "generating".to_string(),
            message: Some("Generating cover...".to_string()),
            current: 1,
            total,
            phase: Some(Phase::Cover),
        })
    }

    /// Phase 2 kicking off
    pub fn batch_start(message: String, current: usize, total: usize) -> Self {
        Self::Progress(ProgressData {
            index: None,
            status: "batch_start".to_string(),
            message: Some(message),
            current,
            total,
            phase: Some(Phase::Content),
        })
    }

    /// A page finished successfully
    pub fn complete(index: u32, image_url: String, phase: Option<Phase>) -> Self {
        Self::Complete(CompleteData {
            index,
            status: "done".to_string(),
            image_url,
            phase,
        })
    }

    /// A page exhausted its retries
    pub fn error(index: u32, message: String, phase: Option<Phase>) -> Self {
        Self::Error(ErrorData {
            index,
            status: "error".to_string(),
            message,
            retryable: true,
            phase,
        })
    }
}
