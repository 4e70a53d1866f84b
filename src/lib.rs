//! # sefin-convert
//!
//! Batch conversion of heterogeneous documents (spreadsheets, CSV, PDFs and
//! images) into Brazilian-locale CSV: `;` delimiter, comma decimals, every
//! field quoted, UTF-8 with a byte-order mark on export.
//!
//! ## Pipeline Overview
//!
//! ```text
//! intake ──▶ queued ──▶ processing ──┬─▶ completed ──▶ export / merge
//!                                    └─▶ error ──(retry)──▶ processing
//!
//! per item:
//!   .xlsx/.xlsm/.xls ─ calamine, first sheet ─┐
//!   .csv ───────────── delimiter detection ───┼─▶ locale normaliser
//!   .pdf / image ───── base64 ─▶ LLM adapter ─┘
//! ```
//!
//! Spreadsheets and CSV files are converted locally. PDFs and images go
//! through an [`ExtractionAdapter`]; its answer is treated as untrusted text,
//! so code fences are stripped and the delimiter and decimal convention are
//! sniffed before normalising.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use sefin_convert::{
//!     ConversionConfig, ConversionSession, ExportFormat, LlmExtractionAdapter, MemoryStore,
//! };
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ConversionConfig::default();
//!     let adapter = Arc::new(LlmExtractionAdapter::from_config(&config)?);
//!     let mut session = ConversionSession::open(config, adapter, Box::new(MemoryStore::new()));
//!
//!     session.intake_path("extrato.xlsx").await?;
//!     session.intake_path("nota_fiscal.pdf").await?;
//!     let summary = session.process_all().await;
//!     eprintln!("{} converted, {} failed", summary.completed, summary.failed);
//!
//!     let archive = session.export_all(ExportFormat::Csv).await?;
//!     std::fs::write(&archive.file_name, &archive.bytes)?;
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `sefin-convert` binary (clap + anyhow + indicatif + tracing-subscriber) |

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod convert;
pub mod error;
pub mod export;
pub mod item;
pub mod merge;
pub mod pipeline;
pub mod progress;
pub mod prompts;
pub mod session;
pub mod store;
pub mod table;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{ConversionConfig, ConversionConfigBuilder};
pub use convert::convert_payload;
pub use error::{ItemError, SefinError};
pub use export::{ExportArtifact, ExportFormat};
pub use item::{FileItem, ItemId, ItemRecord, ItemStatus};
pub use merge::merge_canonical;
pub use pipeline::llm::{ExtractionAdapter, LlmExtractionAdapter, UnavailableAdapter};
pub use progress::{BatchProgressCallback, NoopProgressCallback, ProgressCallback};
pub use session::{BatchSummary, ClearScope, ConversionSession, SessionStats};
pub use store::{JsonFileStore, MemoryStore, SessionStore};
pub use table::{Cell, Table};
