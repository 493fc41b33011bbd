//! Image compression seam
//!
//! Pixel-level compression is owned by the hosting application; the
//! engine only needs `compress(bytes, max_size_kb)` for thumbnails and
//! reference images, so it is consumed through this trait.

use crate::error::Result;

/// Budget for page thumbnails, in kilobytes
pub const THUMBNAIL_MAX_KB: usize = 50;

/// Budget for reference images (cover and user uploads), in kilobytes
pub const REFERENCE_MAX_KB: usize = 200;

/// Reduces an image to at most `max_size_kb` kilobytes
pub trait ImageCompressor: Send + Sync {
    fn compress(&self, data: &[u8], max_size_kb: usize) -> Result<Vec<u8>>;
}
