//! Process-wide task state store
//!
//! Keeps per-task generation context and results so failed pages can be
//! retried after the original run finished. State lives for the process
//! lifetime unless `remove` is called; there is no automatic eviction.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::collections::HashMap;
use tracing::debug;

use crate::task::{ImageStyle, OutlineContext, Page};

/// Per-task generation state
#[derive(Debug, Clone)]
pub struct TaskState {
    pub task_id: String,
    pub pages: Vec<Page>,
    /// Successfully generated pages, index to filename
    pub generated: HashMap<u32, String>,
    /// Failed pages, index to last error message
    pub failed: HashMap<u32, String>,
    /// Compressed cover bytes used as the visual reference for phase 2
    pub cover_image: Option<Vec<u8>>,
    pub full_outline: String,
    pub user_images: Vec<Vec<u8>>,
    pub user_topic: String,
    pub style: ImageStyle,
    pub created_at: DateTime<Utc>,
}

/// Context snapshot handed to retry operations
#[derive(Debug, Clone, Default)]
pub struct RetryContext {
    pub cover_image: Option<Vec<u8>>,
    pub full_outline: String,
    pub user_images: Vec<Vec<u8>>,
    pub user_topic: String,
    pub style: Option<ImageStyle>,
}

/// Concurrent map of task id to generation state.
///
/// Workers for the same task touch disjoint page indices, so the targeted
/// mutators below are the only write paths and never race on an entry's
/// sub-maps.
#[derive(Debug, Default)]
pub struct TaskStore {
    tasks: DashMap<String, TaskState>,
}

impl TaskStore {
    pub fn new() -> Self {
        Self {
            tasks: DashMap::new(),
        }
    }

    /// Create (or replace) the state for a task at the start of a run
    pub fn create(&self, task_id: &str, pages: Vec<Page>, context: &OutlineContext) {
        debug!(task_id = %task_id, pages = pages.len(), "Creating task state");
        self.tasks.insert(
            task_id.to_string(),
            TaskState {
                task_id: task_id.to_string(),
                pages,
                generated: HashMap::new(),
                failed: HashMap::new(),
                cover_image: None,
                full_outline: context.full_outline.clone(),
                user_images: context.user_images.clone(),
                user_topic: context.user_topic.clone(),
                style: context.style,
                created_at: Utc::now(),
            },
        );
    }

    /// Snapshot of a task's full state
    pub fn get(&self, task_id: &str) -> Option<TaskState> {
        self.tasks.get(task_id).map(|entry| entry.value().clone())
    }

    pub fn contains(&self, task_id: &str) -> bool {
        self.tasks.contains_key(task_id)
    }

    /// Drop a task's state to free memory
    pub fn remove(&self, task_id: &str) {
        if self.tasks.remove(task_id).is_some() {
            debug!(task_id = %task_id, "Removed task state");
        }
    }

    /// Record a page success, clearing any earlier failure for the index
    pub fn record_success(&self, task_id: &str, index: u32, filename: &str) {
        if let Some(mut entry) = self.tasks.get_mut(task_id) {
            entry.generated.insert(index, filename.to_string());
            entry.failed.remove(&index);
        }
    }

    /// Record a page failure with its last error message
    pub fn record_failure(&self, task_id: &str, index: u32, error: &str) {
        if let Some(mut entry) = self.tasks.get_mut(task_id) {
            entry.failed.insert(index, error.to_string());
        }
    }

    /// Store the compressed cover bytes as the task's reference image
    pub fn set_cover_image(&self, task_id: &str, cover: Vec<u8>) {
        if let Some(mut entry) = self.tasks.get_mut(task_id) {
            entry.cover_image = Some(cover);
        }
    }

    /// Retry context for a task, without cloning the page list
    pub fn retry_context(&self, task_id: &str) -> Option<RetryContext> {
        self.tasks.get(task_id).map(|entry| RetryContext {
            cover_image: entry.cover_image.clone(),
            full_outline: entry.full_outline.clone(),
            user_images: entry.user_images.clone(),
            user_topic: entry.user_topic.clone(),
            style: Some(entry.style),
        })
    }
}
