//! Per-item conversion: one payload → canonical text.
//!
//! This is the step the batch orchestrator runs for each item. It picks the
//! extraction route from the file name, runs it, and hands the result to the
//! normaliser. Every failure is an [`ItemError`]; nothing here touches the
//! queue.

use crate::config::ConversionConfig;
use crate::error::ItemError;
use crate::pipeline::classify::{self, SourceKind};
use crate::pipeline::llm::ExtractionAdapter;
use crate::pipeline::{delimited, encode, normalize, spreadsheet};
use std::sync::Arc;
use std::time::Instant;
use tokio::time::{timeout, Duration};
use tracing::{debug, info};

/// Convert one file's bytes to canonical text.
///
/// # Arguments
/// * `name`       — source file name; its suffix selects the extractor
/// * `media_type` — reported media type, may be empty
/// * `bytes`      — the raw payload
/// * `adapter`    — external service used for PDFs and images
/// * `config`     — CSV delimiter and adapter timeout
pub async fn convert_payload(
    name: &str,
    media_type: &str,
    bytes: Arc<[u8]>,
    adapter: &dyn ExtractionAdapter,
    config: &ConversionConfig,
) -> Result<String, ItemError> {
    let start = Instant::now();
    let kind = classify::classify(name, media_type).ok_or_else(|| ItemError::UnsupportedFormat {
        name: name.to_string(),
    })?;
    debug!("{}: route {:?}", name, kind);

    let canonical = match kind {
        SourceKind::Spreadsheet => {
            let owned = name.to_string();
            let table = tokio::task::spawn_blocking(move || {
                spreadsheet::extract_first_sheet(&owned, &bytes)
            })
            .await
            .map_err(|e| ItemError::extraction(name, format!("spreadsheet reader stopped: {e}")))??;
            normalize::normalize_table(table)?
        }
        SourceKind::Delimited => {
            let table = delimited::extract(name, &bytes, config.csv_delimiter)?;
            normalize::normalize_table(table)?
        }
        SourceKind::Document => {
            let media_type = classify::effective_media_type(name, media_type);
            let b64 = encode::encode_payload(&bytes);
            let raw = call_adapter(adapter, &b64, &media_type, config.adapter_timeout_secs).await?;
            if normalize::strip_fences(&raw).is_empty() {
                return Err(ItemError::EmptyResponse);
            }
            normalize::normalize_text(&raw)?
        }
    };

    info!(
        "{}: converted to {} bytes in {}ms",
        name,
        canonical.len(),
        start.elapsed().as_millis()
    );
    Ok(canonical)
}

/// Await the adapter, bounded by `timeout_secs` unless it is 0.
async fn call_adapter(
    adapter: &dyn ExtractionAdapter,
    b64: &str,
    media_type: &str,
    timeout_secs: u64,
) -> Result<String, ItemError> {
    if timeout_secs == 0 {
        return adapter.extract(b64, media_type).await;
    }
    timeout(
        Duration::from_secs(timeout_secs),
        adapter.extract(b64, media_type),
    )
    .await
    .map_err(|_| ItemError::AdapterTimeout { secs: timeout_secs })?
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Records the handoff and answers with fixed text.
    struct Recording {
        answer: Result<String, ItemError>,
        seen: Mutex<Vec<(String, String)>>,
    }

    impl Recording {
        fn answering(text: &str) -> Self {
            Self {
                answer: Ok(text.to_string()),
                seen: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl ExtractionAdapter for Recording {
        async fn extract(&self, b64: &str, media_type: &str) -> Result<String, ItemError> {
            self.seen
                .lock()
                .unwrap()
                .push((b64.to_string(), media_type.to_string()));
            self.answer.clone()
        }
    }

    struct Stalled;

    #[async_trait]
    impl ExtractionAdapter for Stalled {
        async fn extract(&self, _b64: &str, _media_type: &str) -> Result<String, ItemError> {
            std::future::pending::<()>().await;
            unreachable!()
        }
    }

    fn bytes(s: &str) -> Arc<[u8]> {
        Arc::from(s.as_bytes())
    }

    #[tokio::test]
    async fn csv_is_normalised_locally() {
        let adapter = Recording::answering("unused");
        let out = convert_payload(
            "vendas.csv",
            "text/csv",
            bytes("\u{FEFF}Produto,Preço\nCafé,\"1,250.00\"\n"),
            &adapter,
            &ConversionConfig::default(),
        )
        .await
        .unwrap();
        assert_eq!(out, "\"Produto\";\"Preço\"\r\n\"Café\";\"1250,00\"\r\n");
        assert!(adapter.seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn pdf_goes_through_adapter_with_inferred_media_type() {
        let adapter = Recording::answering("```csv\nA,B\n1.5,2\n```");
        let out = convert_payload(
            "nota.pdf",
            "",
            bytes("%PDF"),
            &adapter,
            &ConversionConfig::default(),
        )
        .await
        .unwrap();
        assert_eq!(out, "\"A\";\"B\"\r\n\"1,5\";\"2\"\r\n");

        let seen = adapter.seen.lock().unwrap();
        assert_eq!(seen[0].0, "JVBERg==");
        assert_eq!(seen[0].1, "application/pdf");
    }

    #[tokio::test]
    async fn blank_adapter_answer_is_an_error() {
        let adapter = Recording::answering("```\n```");
        let err = convert_payload("x.png", "image/png", bytes("img"), &adapter, &ConversionConfig::default())
            .await
            .unwrap_err();
        assert_eq!(err, ItemError::EmptyResponse);
    }

    #[tokio::test]
    async fn adapter_failure_passes_through() {
        let adapter = Recording {
            answer: Err(ItemError::Adapter {
                detail: "quota".into(),
            }),
            seen: Mutex::new(Vec::new()),
        };
        let err = convert_payload("x.jpg", "", bytes("img"), &adapter, &ConversionConfig::default())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("quota"));
    }

    #[tokio::test(start_paused = true)]
    async fn stalled_adapter_times_out() {
        let config = ConversionConfig::builder()
            .adapter_timeout_secs(5)
            .build()
            .unwrap();
        let err = convert_payload("x.pdf", "", bytes("%PDF"), &Stalled, &config)
            .await
            .unwrap_err();
        assert_eq!(err, ItemError::AdapterTimeout { secs: 5 });
    }

    #[tokio::test]
    async fn unsupported_suffix_is_rejected() {
        let adapter = Recording::answering("");
        let err = convert_payload("a.docx", "", bytes("x"), &adapter, &ConversionConfig::default())
            .await
            .unwrap_err();
        assert!(matches!(err, ItemError::UnsupportedFormat { .. }));
    }

    #[tokio::test]
    async fn corrupt_workbook_is_extraction_error() {
        let adapter = Recording::answering("");
        let err = convert_payload("a.xlsx", "", bytes("not a zip"), &adapter, &ConversionConfig::default())
            .await
            .unwrap_err();
        assert!(matches!(err, ItemError::Extraction { .. }));
    }

    #[tokio::test]
    async fn workbook_first_sheet_is_normalised_locally() {
        let adapter = Recording::answering("unused");
        let workbook = crate::pipeline::spreadsheet::fixtures::two_sheet_workbook();
        let out = convert_payload(
            "resumo.xlsx",
            "",
            Arc::from(workbook),
            &adapter,
            &ConversionConfig::default(),
        )
        .await
        .unwrap();
        assert_eq!(
            out,
            "\"Data\";\"Valor\"\r\n\"01/01/2026\";\"1234,5\"\r\n\"Total\";\"1000\"\r\n"
        );
        assert!(!out.contains("Outra"));
        assert!(adapter.seen.lock().unwrap().is_empty());
    }
}
