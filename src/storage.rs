//! File storage for generated task images

use std::path::PathBuf;
use std::sync::Arc;
use tokio::fs;
use tracing::debug;

use crate::compress::{ImageCompressor, REFERENCE_MAX_KB, THUMBNAIL_MAX_KB};
use crate::error::Result;

/// Handler for per-task image directories under the history root
#[derive(Clone)]
pub struct TaskStorage {
    history_root: PathBuf,
    compressor: Arc<dyn ImageCompressor>,
}

impl TaskStorage {
    pub fn new(history_root: impl Into<PathBuf>, compressor: Arc<dyn ImageCompressor>) -> Self {
        Self {
            history_root: history_root.into(),
            compressor,
        }
    }

    /// Directory holding one task's images
    pub fn task_dir(&self, task_id: &str) -> PathBuf {
        self.history_root.join(task_id)
    }

    /// Full path of one image file within a task directory
    pub fn image_path(&self, task_id: &str, filename: &str) -> PathBuf {
        self.task_dir(task_id).join(filename)
    }

    /// Public URL path under which the route layer serves a task image
    pub fn public_url(task_id: &str, filename: &str) -> String {
        format!("/api/images/{}/{}", task_id, filename)
    }

    /// Ensure the task directory exists
    pub async fn ensure_task_dir(&self, task_id: &str) -> Result<PathBuf> {
        let dir = self.task_dir(task_id);
        if !dir.exists() {
            fs::create_dir_all(&dir).await?;
            debug!(path = ?dir, "Created task directory");
        }
        Ok(dir)
    }

    /// Save a page image as `{index}.png` plus its `thumb_{index}.png`
    /// thumbnail, returning the image filename.
    pub async fn save_page_image(
        &self,
        task_id: &str,
        index: u32,
        image_data: &[u8],
    ) -> Result<String> {
        self.ensure_task_dir(task_id).await?;

        let filename = format!("{}.png", index);
        let filepath = self.image_path(task_id, &filename);
        fs::write(&filepath, image_data).await?;

        let thumbnail = self.compressor.compress(image_data, THUMBNAIL_MAX_KB)?;
        let thumbnail_path = self.image_path(task_id, &format!("thumb_{}", filename));
        fs::write(&thumbnail_path, &thumbnail).await?;

        debug!(
            path = ?filepath,
            size = image_data.len(),
            thumb_size = thumbnail.len(),
            "Saved page image"
        );

        Ok(filename)
    }

    /// Re-read a just-written page image and compress it to the
    /// reference-image budget.
    pub async fn load_reference(&self, task_id: &str, filename: &str) -> Result<Vec<u8>> {
        let data = fs::read(self.image_path(task_id, filename)).await?;
        self.compressor.compress(&data, REFERENCE_MAX_KB)
    }

    /// Load `0.png` as a reference if it exists on disk, compressed to
    /// the reference budget. Used when no cover is cached in memory.
    pub async fn load_cover_fallback(&self, task_id: &str) -> Result<Option<Vec<u8>>> {
        let path = self.image_path(task_id, "0.png");
        if !path.exists() {
            return Ok(None);
        }
        let data = fs::read(&path).await?;
        Ok(Some(self.compressor.compress(&data, REFERENCE_MAX_KB)?))
    }

    /// Compress user-supplied reference images to the reference budget
    pub fn compress_references(&self, images: &[Vec<u8>]) -> Result<Vec<Vec<u8>>> {
        images
            .iter()
            .map(|img| self.compressor.compress(img, REFERENCE_MAX_KB))
            .collect()
    }
}
