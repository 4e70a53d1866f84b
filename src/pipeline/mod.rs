//! Pipeline stages for turning one payload into canonical text.
//!
//! Each submodule implements exactly one step, so each is testable alone.
//!
//! ## Data Flow
//!
//! ```text
//!            ┌─▶ spreadsheet ─────────────────────┐
//! classify ──┼─▶ delimited ───────────────────────┼─▶ normalize
//!            └─▶ encode ──▶ llm (external service)┘
//! ```
//!
//! 1. [`classify`]    — pick the route from the file-name suffix
//! 2. [`spreadsheet`] — first sheet of a workbook, via calamine
//! 3. [`delimited`]   — `.csv` text in its own delimiter, BOM stripped
//! 4. [`encode`]      — base64 for the adapter handoff
//! 5. [`llm`]         — the external extraction adapter (the only network I/O)
//! 6. [`normalize`]   — canonical `;` / comma-decimal / quoted output

pub mod classify;
pub mod delimited;
pub mod encode;
pub mod llm;
pub mod normalize;
pub mod spreadsheet;
