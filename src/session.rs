//! The conversion session: queue owner, batch orchestrator, export entry point.
//!
//! A [`ConversionSession`] owns the ordered queue of [`FileItem`]s and is the
//! only thing that moves them through their state machine. The extraction
//! adapter and the snapshot store are injected, so the session itself does
//! no network or storage wiring of its own.
//!
//! Items are processed strictly one at a time, in queue order. A failed item
//! records its error and the batch moves on.

use crate::config::ConversionConfig;
use crate::convert::convert_payload;
use crate::error::{ItemError, SefinError};
use crate::export::{self, ExportArtifact, ExportFormat};
use crate::item::{FileItem, ItemId, ItemStatus};
use crate::merge;
use crate::pipeline::classify;
use crate::pipeline::llm::ExtractionAdapter;
use crate::store::SessionStore;
use crate::table::{self, Table};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Which items [`ConversionSession::clear`] removes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClearScope {
    All,
    Completed,
}

/// Item counts per status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionStats {
    pub queued: usize,
    pub processing: usize,
    pub completed: usize,
    pub error: usize,
}

impl SessionStats {
    pub fn total(&self) -> usize {
        self.queued + self.processing + self.completed + self.error
    }
}

/// Outcome of one orchestrator run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchSummary {
    /// Items the batch picked up.
    pub total: usize,
    pub completed: usize,
    pub failed: usize,
    pub duration_ms: u64,
}

/// Owns the queue and drives every item through conversion.
pub struct ConversionSession {
    config: ConversionConfig,
    adapter: Arc<dyn ExtractionAdapter>,
    store: Box<dyn SessionStore>,
    items: Vec<FileItem>,
    progress: (usize, usize),
}

impl std::fmt::Debug for ConversionSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConversionSession")
            .field("config", &self.config)
            .field("items", &self.items.len())
            .field("progress", &self.progress)
            .finish()
    }
}

impl ConversionSession {
    /// Start a session, restoring the durable items of the last snapshot.
    ///
    /// An unreadable or corrupt snapshot is logged and discarded; the session
    /// then starts empty. When two records share an id the first one wins.
    pub fn open(
        config: ConversionConfig,
        adapter: Arc<dyn ExtractionAdapter>,
        store: Box<dyn SessionStore>,
    ) -> Self {
        let items = match store.load() {
            Ok(records) => {
                let mut seen = HashSet::new();
                records
                    .into_iter()
                    .filter_map(|record| match FileItem::try_from(record) {
                        Ok(item) => Some(item),
                        Err(reason) => {
                            debug!("Dropping stored record: {}", reason);
                            None
                        }
                    })
                    .filter(|item| {
                        let first = seen.insert(item.id().clone());
                        if !first {
                            debug!("Dropping stored record with duplicate id {}", item.id());
                        }
                        first
                    })
                    .collect()
            }
            Err(e) => {
                warn!("Discarding stored session: {}", e);
                Vec::new()
            }
        };
        if !items.is_empty() {
            info!("Restored {} items from the previous session", items.len());
        }

        Self {
            config,
            adapter,
            store,
            items,
            progress: (0, 0),
        }
    }

    pub fn config(&self) -> &ConversionConfig {
        &self.config
    }

    /// The queue, in insertion order.
    pub fn items(&self) -> &[FileItem] {
        &self.items
    }

    pub fn get(&self, id: &ItemId) -> Option<&FileItem> {
        self.items.iter().find(|i| i.id() == id)
    }

    /// `(items_done, items_total)` of the running batch; `(0, 0)` when idle.
    pub fn progress(&self) -> (usize, usize) {
        self.progress
    }

    pub fn stats(&self) -> SessionStats {
        let mut stats = SessionStats::default();
        for item in &self.items {
            match item.status() {
                ItemStatus::Queued => stats.queued += 1,
                ItemStatus::Processing => stats.processing += 1,
                ItemStatus::Completed { .. } => stats.completed += 1,
                ItemStatus::Error { .. } => stats.error += 1,
            }
        }
        stats
    }

    // ── Intake ───────────────────────────────────────────────────────────

    /// Add a file to the queue.
    ///
    /// Oversized or unrecognised files are recorded directly as errors and
    /// never become `queued`.
    pub fn intake(
        &mut self,
        name: impl Into<String>,
        media_type: impl Into<String>,
        bytes: Vec<u8>,
    ) -> ItemId {
        let name = name.into();
        let media_type = media_type.into();
        let size = bytes.len() as u64;

        let item = match self.validate(&name, &media_type, size) {
            Ok(()) => {
                info!("Queued {} ({} bytes)", name, size);
                FileItem::queued(name, media_type, bytes)
            }
            Err(e) => {
                warn!("Rejected {}: {}", name, e);
                FileItem::rejected(name, size, media_type, &e)
            }
        };
        self.push(item)
    }

    /// Read a file from disk and add it to the queue.
    ///
    /// The size ceiling is checked against the file metadata first, so an
    /// oversized file is never read into memory.
    pub async fn intake_path(&mut self, path: impl AsRef<Path>) -> Result<ItemId, SefinError> {
        let path = path.as_ref();
        let io_err = |source: std::io::Error| SefinError::Io {
            path: path.to_path_buf(),
            source,
        };

        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        let media_type = mime_guess::from_path(path)
            .first_raw()
            .unwrap_or_default()
            .to_string();

        let size = tokio::fs::metadata(path).await.map_err(io_err)?.len();
        if size > self.config.max_file_size {
            let e = self.too_large(size);
            warn!("Rejected {}: {}", name, e);
            return Ok(self.push(FileItem::rejected(name, size, media_type, &e)));
        }

        let bytes = tokio::fs::read(path).await.map_err(io_err)?;
        Ok(self.intake(name, media_type, bytes))
    }

    fn validate(&self, name: &str, media_type: &str, size: u64) -> Result<(), ItemError> {
        if size > self.config.max_file_size {
            return Err(self.too_large(size));
        }
        if classify::classify(name, media_type).is_none() {
            return Err(ItemError::UnsupportedFormat {
                name: name.to_string(),
            });
        }
        Ok(())
    }

    fn too_large(&self, size: u64) -> ItemError {
        ItemError::FileTooLarge {
            size,
            limit_mb: self.config.max_file_size_mb(),
        }
    }

    fn push(&mut self, item: FileItem) -> ItemId {
        let id = item.id().clone();
        self.items.push(item);
        self.persist();
        id
    }

    // ── Removal ──────────────────────────────────────────────────────────

    pub fn remove(&mut self, id: &ItemId) -> Result<FileItem, SefinError> {
        let pos = self.position(id)?;
        let item = self.items.remove(pos);
        debug!("Removed {}", item.name());
        self.persist();
        Ok(item)
    }

    /// Drop items in bulk. Returns how many were removed.
    pub fn clear(&mut self, scope: ClearScope) -> usize {
        let before = self.items.len();
        match scope {
            ClearScope::All => self.items.clear(),
            ClearScope::Completed => self.items.retain(|i| !i.is_completed()),
        }
        let removed = before - self.items.len();
        if removed > 0 {
            self.persist();
        }
        removed
    }

    // ── Orchestration ────────────────────────────────────────────────────

    /// Convert every `queued` item, in order, one at a time.
    pub async fn process_all(&mut self) -> BatchSummary {
        let ids = self.ids_where(|i| matches!(i.status(), ItemStatus::Queued));
        self.run_batch(ids).await
    }

    /// Re-run every `error` item that still holds its original bytes.
    ///
    /// Items rejected at intake or restored from storage have nothing to
    /// convert and are left alone.
    pub async fn retry_failed(&mut self) -> BatchSummary {
        let ids = self.ids_where(|i| i.error().is_some() && i.has_payload());
        self.run_batch(ids).await
    }

    /// Re-run one `error` item.
    ///
    /// An item without its payload goes back to `error` with
    /// [`ItemError::PayloadUnavailable`].
    pub async fn retry(&mut self, id: &ItemId) -> Result<BatchSummary, SefinError> {
        let item = &self.items[self.position(id)?];
        if item.error().is_none() {
            return Err(SefinError::InvalidTransition {
                name: item.name().to_string(),
                from: item.status().label(),
                to: "processing",
            });
        }
        Ok(self.run_batch(vec![id.clone()]).await)
    }

    async fn run_batch(&mut self, ids: Vec<ItemId>) -> BatchSummary {
        let start = Instant::now();
        let total = ids.len();
        let mut summary = BatchSummary {
            total,
            ..Default::default()
        };
        if total == 0 {
            return summary;
        }

        let callback = self.config.progress_callback.clone();
        if let Some(ref cb) = callback {
            cb.on_batch_start(total);
        }
        info!("Batch of {} items started", total);
        self.progress = (0, total);

        for (idx, id) in ids.iter().enumerate() {
            let Ok(pos) = self.position(id) else {
                continue;
            };

            let item = &mut self.items[pos];
            if let Err(e) = item.begin() {
                warn!("Skipping {}: {}", item.name(), e);
                continue;
            }
            let name = item.name().to_string();
            let media_type = item.media_type().to_string();
            let raw = item.raw_content().cloned();
            self.persist();

            if let Some(ref cb) = callback {
                cb.on_item_start(idx + 1, total, &name);
            }

            let outcome = match raw {
                Some(bytes) => {
                    convert_payload(&name, &media_type, bytes, self.adapter.as_ref(), &self.config)
                        .await
                }
                None => Err(ItemError::PayloadUnavailable { name: name.clone() }),
            };

            let done = idx + 1;
            let item = &mut self.items[pos];
            match outcome {
                Ok(text) => {
                    let len = text.len();
                    if let Err(e) = item.complete(text) {
                        warn!("{}", e);
                    }
                    summary.completed += 1;
                    if let Some(ref cb) = callback {
                        cb.on_item_complete(done, total, &name, len);
                    }
                }
                Err(e) => {
                    let message = e.to_string();
                    warn!("{} failed: {}", name, message);
                    if let Err(e) = item.fail(message.clone()) {
                        warn!("{}", e);
                    }
                    summary.failed += 1;
                    if let Some(ref cb) = callback {
                        cb.on_item_error(done, total, &name, &message);
                    }
                }
            }
            self.progress = (done, total);
            self.persist();
        }

        self.progress = (0, 0);
        summary.duration_ms = start.elapsed().as_millis() as u64;
        info!(
            "Batch finished: {} completed, {} failed in {}ms",
            summary.completed, summary.failed, summary.duration_ms
        );
        if let Some(ref cb) = callback {
            cb.on_batch_complete(total, summary.completed);
        }
        summary
    }

    // ── Results ──────────────────────────────────────────────────────────

    /// Header plus the first `rows` data rows of a completed item.
    pub fn preview(&self, id: &ItemId, rows: usize) -> Result<Table, SefinError> {
        let item = self.get(id).ok_or_else(|| SefinError::ItemNotFound { id: id.clone() })?;
        let text = completed_result(item)?;
        let mut parsed = table::parse_canonical(text)
            .map_err(|e| SefinError::Internal(format!("stored result is not canonical: {e}")))?;
        parsed.rows.truncate(rows.saturating_add(1));
        Ok(parsed)
    }

    /// Consolidate every completed item, in queue order.
    pub fn merge(&self) -> Result<String, SefinError> {
        let results: Vec<&str> = self.items.iter().filter_map(|i| i.result()).collect();
        merge::merge_canonical(&results)
    }

    pub fn export_item(&self, id: &ItemId, format: ExportFormat) -> Result<ExportArtifact, SefinError> {
        let item = self.get(id).ok_or_else(|| SefinError::ItemNotFound { id: id.clone() })?;
        let text = completed_result(item)?;
        Ok(export::export_single(
            item.name(),
            text,
            &self.config.export_suffix,
            format,
        ))
    }

    /// One archive entry per completed item.
    pub async fn export_all(&self, format: ExportFormat) -> Result<ExportArtifact, SefinError> {
        let entries: Vec<(String, String)> = self
            .items
            .iter()
            .filter_map(|i| i.result().map(|r| (i.name().to_string(), r.to_string())))
            .collect();
        if entries.is_empty() {
            return Err(SefinError::NothingToExport);
        }

        let suffix = self.config.export_suffix.clone();
        let prefix = self.config.archive_prefix.clone();
        let millis = chrono::Utc::now().timestamp_millis();
        tokio::task::spawn_blocking(move || {
            export::build_archive(&entries, &suffix, format, &prefix, millis)
        })
        .await
        .map_err(|e| SefinError::Internal(format!("archive task failed: {e}")))?
    }

    pub fn export_merged(&self, format: ExportFormat) -> Result<ExportArtifact, SefinError> {
        let merged = self.merge()?;
        Ok(export::export_merged(
            &merged,
            &self.config.merged_prefix,
            format,
            chrono::Utc::now().timestamp_millis(),
        ))
    }

    // ── Internals ────────────────────────────────────────────────────────

    fn position(&self, id: &ItemId) -> Result<usize, SefinError> {
        self.items
            .iter()
            .position(|i| i.id() == id)
            .ok_or_else(|| SefinError::ItemNotFound { id: id.clone() })
    }

    fn ids_where(&self, pred: impl Fn(&FileItem) -> bool) -> Vec<ItemId> {
        self.items
            .iter()
            .filter(|i| pred(i))
            .map(|i| i.id().clone())
            .collect()
    }

    /// Write the durable subset. A failed save leaves the queue untouched.
    fn persist(&self) {
        let records: Vec<_> = self.items.iter().filter_map(FileItem::to_record).collect();
        if let Err(e) = self.store.save(&records) {
            warn!("Could not save session: {}", e);
        }
    }
}

fn completed_result(item: &FileItem) -> Result<&str, SefinError> {
    item.result().ok_or_else(|| SefinError::NotCompleted {
        name: item.name().to_string(),
    })
}
