//! Progress-callback trait for batch conversion events.
//!
//! Inject an [`Arc<dyn BatchProgressCallback>`] via
//! [`crate::config::ConversionConfigBuilder::progress_callback`] to receive
//! events as the orchestrator works through the queue. The CLI forwards them
//! to an `indicatif` bar; a host UI can forward them to whatever it renders.
//!
//! # Example
//!
//! ```rust
//! use sefin_convert::{BatchProgressCallback, ConversionConfig};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct CountingCallback {
//!     completed: Arc<AtomicUsize>,
//! }
//!
//! impl BatchProgressCallback for CountingCallback {
//!     fn on_item_complete(&self, done: usize, total: usize, name: &str, result_len: usize) {
//!         self.completed.fetch_add(1, Ordering::SeqCst);
//!         eprintln!("{done}/{total} {name} ({result_len} bytes)");
//!     }
//! }
//!
//! let counter = Arc::new(CountingCallback {
//!     completed: Arc::new(AtomicUsize::new(0)),
//! });
//!
//! let config = ConversionConfig::builder()
//!     .progress_callback(counter as Arc<dyn BatchProgressCallback>)
//!     .build()
//!     .unwrap();
//! ```

use std::sync::Arc;

/// Called by the batch orchestrator as it processes each item.
///
/// Items are processed strictly one at a time, so calls never overlap; the
/// trait is still `Send + Sync` so a callback can be shared with other tasks.
/// All methods have default no-op implementations.
pub trait BatchProgressCallback: Send + Sync {
    /// Called once before the first item, with the number of items selected.
    fn on_batch_start(&self, total: usize) {
        let _ = total;
    }

    /// Called when an item enters `processing`.
    ///
    /// # Arguments
    /// * `position` — 1-indexed position of the item within the batch
    /// * `total`    — items in the batch
    /// * `name`     — source file name
    fn on_item_start(&self, position: usize, total: usize, name: &str) {
        let _ = (position, total, name);
    }

    /// Called when an item reaches `completed`.
    ///
    /// `done` is the progress counter after this item.
    fn on_item_complete(&self, done: usize, total: usize, name: &str, result_len: usize) {
        let _ = (done, total, name, result_len);
    }

    /// Called when an item reaches `error`.
    fn on_item_error(&self, done: usize, total: usize, name: &str, error: &str) {
        let _ = (done, total, name, error);
    }

    /// Called once after every selected item has been attempted.
    fn on_batch_complete(&self, total: usize, success_count: usize) {
        let _ = (total, success_count);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl BatchProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::ConversionConfig`].
pub type ProgressCallback = Arc<dyn BatchProgressCallback>;
