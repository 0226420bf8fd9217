//! Progress-callback trait for per-file conversion events.
//!
//! Inject an [`Arc<dyn ConversionProgressCallback>`] via
//! [`crate::convert::Converter::with_progress`] to receive events as each
//! file goes through the conversion service.
//!
//! Files are converted one at a time, so events for a batch arrive strictly
//! in order: `start → (file_start → file_complete)* → … → complete`, with at
//! most one `file_error` right before `conversion_complete`.
//!
//! # Example
//!
//! ```rust
//! use imgconv::ConversionProgressCallback;
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct CountingCallback {
//!     completed: Arc<AtomicUsize>,
//! }
//!
//! impl ConversionProgressCallback for CountingCallback {
//!     fn on_file_complete(&self, index: usize, total: usize, bytes: usize) {
//!         self.completed.fetch_add(1, Ordering::SeqCst);
//!         eprintln!("File {}/{} done ({} bytes)", index, total, bytes);
//!     }
//! }
//!
//! let cb: Arc<dyn ConversionProgressCallback> = Arc::new(CountingCallback {
//!     completed: Arc::new(AtomicUsize::new(0)),
//! });
//! cb.on_file_complete(1, 1, 2048);
//! ```

use std::sync::Arc;

/// Called by the orchestrator as it processes each file.
///
/// All methods have default no-op implementations so callers only override
/// what they care about.
pub trait ConversionProgressCallback: Send + Sync {
    /// Called once before the first request.
    fn on_conversion_start(&self, total_files: usize) {
        let _ = total_files;
    }

    /// Called just before a file is sent to the service.
    ///
    /// # Arguments
    /// * `index`: 1-indexed position in the batch
    /// * `total`: batch size
    /// * `name` : the file's name
    fn on_file_start(&self, index: usize, total: usize, name: &str) {
        let _ = (index, total, name);
    }

    /// Called when the service returned the converted image.
    ///
    /// `bytes` is the size of the converted output.
    fn on_file_complete(&self, index: usize, total: usize, bytes: usize) {
        let _ = (index, total, bytes);
    }

    /// Called when a file failed. No further files are attempted after this.
    fn on_file_error(&self, index: usize, total: usize, error: &str) {
        let _ = (index, total, error);
    }

    /// Called once after the batch finished or was aborted.
    ///
    /// `success_count` counts files converted before the end or the abort.
    fn on_conversion_complete(&self, total_files: usize, success_count: usize) {
        let _ = (total_files, success_count);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl ConversionProgressCallback for NoopProgressCallback {}

/// Shared callback handle as stored by [`crate::convert::Converter`].
pub type ProgressCallback = Arc<dyn ConversionProgressCallback>;
