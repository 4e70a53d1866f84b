//! Error types for the sefin-convert library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`SefinError`] — **Fatal** for the requested operation: the merge has
//!   too few inputs, the item does not exist, the archive could not be
//!   written. Returned as `Err(SefinError)` and never mutates the queue.
//!
//! * [`ItemError`] — **Non-fatal**: one file failed validation, extraction or
//!   the external adapter call. Rendered to a human-readable string and stored
//!   on that [`crate::item::FileItem`] only; the batch carries on with the
//!   next item.

use crate::item::ItemId;
use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the sefin-convert library.
///
/// Per-item failures use [`ItemError`] and are recorded on the item rather
/// than propagated here.
#[derive(Debug, Error)]
pub enum SefinError {
    // ── Queue errors ──────────────────────────────────────────────────────
    /// No item with this id is in the queue.
    #[error("No item with id '{id}' in the queue")]
    ItemNotFound { id: ItemId },

    /// The state machine does not allow this transition.
    #[error("Item '{name}' cannot move from {from} to {to}")]
    InvalidTransition {
        name: String,
        from: &'static str,
        to: &'static str,
    },

    /// The item exists but has no canonical result to work with.
    #[error("Item '{name}' has not completed conversion")]
    NotCompleted { name: String },

    // ── Merge / export errors ─────────────────────────────────────────────
    /// Merge needs at least two completed items.
    #[error("Merging needs at least 2 completed files, found {available}")]
    InsufficientInput { available: usize },

    /// Bulk export was requested but nothing has completed.
    #[error("There are no completed files to export")]
    NothingToExport,

    /// The zip writer rejected an entry or could not finish the archive.
    #[error("Failed to build archive: {0}")]
    ArchiveFailed(String),

    // ── Persistence errors ────────────────────────────────────────────────
    /// Stored session could not be read, parsed or written.
    #[error("Session storage at '{path}' failed: {detail}")]
    Persistence { path: PathBuf, detail: String },

    // ── Adapter setup ─────────────────────────────────────────────────────
    /// The configured LLM provider is not initialised (missing API key etc.).
    #[error("LLM provider '{provider}' is not configured.\n{hint}")]
    ProviderNotConfigured { provider: String, hint: String },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Reading an input file or writing an artifact failed.
    #[error("I/O error on '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// A non-fatal error for a single item.
///
/// The `Display` text is what ends up in [`crate::item::FileItem`]'s error
/// message, so every variant reads as a complete sentence for the operator.
#[derive(Debug, Clone, PartialEq, Eq, Error, serde::Serialize, serde::Deserialize)]
pub enum ItemError {
    /// Rejected at intake: larger than the configured ceiling.
    #[error("File exceeds the {limit_mb} MB limit ({size} bytes)")]
    FileTooLarge { size: u64, limit_mb: u64 },

    /// Rejected at intake: suffix and media type match no known source.
    #[error("Unsupported format: '{name}'")]
    UnsupportedFormat { name: String },

    /// The extractor could not decode the spreadsheet or parse the text.
    #[error("Could not read '{name}': {detail}")]
    Extraction { name: String, detail: String },

    /// The external extraction service failed.
    #[error("Extraction service failed: {detail}")]
    Adapter { detail: String },

    /// The external extraction service did not answer in time.
    #[error("Extraction service did not answer within {secs}s")]
    AdapterTimeout { secs: u64 },

    /// The external extraction service answered with no table text.
    #[error("Extraction service returned an empty response")]
    EmptyResponse,

    /// The raw payload is not held in memory (reloaded or rejected item).
    #[error("Original file for '{name}' is no longer in memory; add it again")]
    PayloadUnavailable { name: String },
}

impl ItemError {
    pub(crate) fn extraction(name: &str, detail: impl std::fmt::Display) -> Self {
        ItemError::Extraction {
            name: name.to_string(),
            detail: detail.to_string(),
        }
    }
}
