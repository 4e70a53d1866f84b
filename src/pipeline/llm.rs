//! External extraction adapter: PDF/image → raw delimited text.
//!
//! The core only depends on the [`ExtractionAdapter`] contract: base64 payload
//! plus media type in, table text out, fallibly. [`LlmExtractionAdapter`]
//! fulfils it with a vision-capable LLM through `edgequake-llm`. Its answer is
//! untrusted; the caller strips fences and re-normalises it.
//!
//! ## Retry Strategy
//!
//! Transient provider errors are retried inside the adapter with exponential
//! backoff (`retry_backoff_ms * 2^attempt`). The batch orchestrator never
//! retries on its own; an operator re-queues failed items explicitly.

use crate::config::ConversionConfig;
use crate::error::{ItemError, SefinError};
use crate::prompts::{extraction_request, DEFAULT_SYSTEM_PROMPT};
use async_trait::async_trait;
use edgequake_llm::{ChatMessage, CompletionOptions, ImageData, LLMProvider, ProviderFactory};
use std::sync::Arc;
use std::time::Instant;
use tokio::time::{sleep, Duration};
use tracing::{debug, warn};

/// Model used when only a Gemini key is available.
const GEMINI_DEFAULT_MODEL: &str = "gemini-2.0-flash";

/// Contract of the outside table-extraction service.
#[async_trait]
pub trait ExtractionAdapter: Send + Sync {
    /// Extract tables from a base64-encoded file tagged with `media_type`.
    async fn extract(&self, base64_content: &str, media_type: &str) -> Result<String, ItemError>;
}

/// [`ExtractionAdapter`] backed by an `edgequake-llm` provider.
pub struct LlmExtractionAdapter {
    provider: Arc<dyn LLMProvider>,
    system_prompt: String,
    options: CompletionOptions,
    max_retries: u32,
    retry_backoff_ms: u64,
}

impl LlmExtractionAdapter {
    /// Wrap an already-built provider.
    pub fn new(provider: Arc<dyn LLMProvider>, config: &ConversionConfig) -> Self {
        Self {
            provider,
            system_prompt: config
                .system_prompt
                .clone()
                .unwrap_or_else(|| DEFAULT_SYSTEM_PROMPT.to_string()),
            options: build_options(config),
            max_retries: config.max_retries,
            retry_backoff_ms: config.retry_backoff_ms,
        }
    }

    /// Resolve a provider from the config and environment.
    pub fn from_config(config: &ConversionConfig) -> Result<Self, SefinError> {
        let provider = resolve_provider(config)?;
        Ok(Self::new(provider, config))
    }
}

#[async_trait]
impl ExtractionAdapter for LlmExtractionAdapter {
    async fn extract(&self, base64_content: &str, media_type: &str) -> Result<String, ItemError> {
        let start = Instant::now();
        let attachment = ImageData::new(base64_content.to_string(), media_type);
        let messages = vec![
            ChatMessage::system(self.system_prompt.as_str()),
            ChatMessage::user_with_images(extraction_request(media_type), vec![attachment]),
        ];

        let mut last_err: Option<String> = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                let backoff = self.retry_backoff_ms * 2u64.pow(attempt - 1);
                warn!(
                    "Extraction retry {}/{} after {}ms",
                    attempt, self.max_retries, backoff
                );
                sleep(Duration::from_millis(backoff)).await;
            }

            match self.provider.chat(&messages, Some(&self.options)).await {
                Ok(response) => {
                    debug!(
                        "Extraction: {} input tokens, {} output tokens, {:?}",
                        response.prompt_tokens,
                        response.completion_tokens,
                        start.elapsed()
                    );
                    return Ok(response.content);
                }
                Err(e) => {
                    let err_msg = format!("{}", e);
                    warn!("Extraction attempt {} failed: {}", attempt + 1, err_msg);
                    last_err = Some(err_msg);
                }
            }
        }

        Err(ItemError::Adapter {
            detail: last_err.unwrap_or_else(|| "Unknown error".to_string()),
        })
    }
}

/// Stand-in used when no provider could be resolved.
///
/// Spreadsheets and CSV files never reach the adapter, so a session can still
/// convert them; every PDF or image fails with the resolution message.
#[derive(Debug, Clone)]
pub struct UnavailableAdapter {
    reason: String,
}

impl UnavailableAdapter {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

#[async_trait]
impl ExtractionAdapter for UnavailableAdapter {
    async fn extract(&self, _base64_content: &str, _media_type: &str) -> Result<String, ItemError> {
        Err(ItemError::Adapter {
            detail: self.reason.clone(),
        })
    }
}

/// Build `CompletionOptions` from the conversion config.
fn build_options(config: &ConversionConfig) -> CompletionOptions {
    CompletionOptions {
        temperature: Some(config.temperature),
        max_tokens: Some(config.max_tokens),
        ..Default::default()
    }
}

fn create_provider(provider_name: &str, model: &str) -> Result<Arc<dyn LLMProvider>, SefinError> {
    ProviderFactory::create_llm_provider(provider_name, model).map_err(|e| {
        SefinError::ProviderNotConfigured {
            provider: provider_name.to_string(),
            hint: format!("{e}"),
        }
    })
}

/// Resolve the LLM provider, from most-specific to least-specific:
///
/// 1. **Pre-built provider** (`config.provider`)
/// 2. **Named provider + model** (`config.provider_name`)
/// 3. **Environment pair** (`EDGEQUAKE_LLM_PROVIDER` + `EDGEQUAKE_MODEL`)
/// 4. **Gemini key** (`GEMINI_API_KEY`), the service this tool was built around
/// 5. **Full auto-detection** (`ProviderFactory::from_env`)
fn resolve_provider(config: &ConversionConfig) -> Result<Arc<dyn LLMProvider>, SefinError> {
    if let Some(ref provider) = config.provider {
        return Ok(Arc::clone(provider));
    }

    if let Some(ref name) = config.provider_name {
        let model = config.model.as_deref().unwrap_or(GEMINI_DEFAULT_MODEL);
        return create_provider(name, model);
    }

    if let (Ok(prov), Ok(model)) = (
        std::env::var("EDGEQUAKE_LLM_PROVIDER"),
        std::env::var("EDGEQUAKE_MODEL"),
    ) {
        if !prov.is_empty() && !model.is_empty() {
            return create_provider(&prov, &model);
        }
    }

    if let Ok(key) = std::env::var("GEMINI_API_KEY") {
        if !key.is_empty() {
            let model = config.model.as_deref().unwrap_or(GEMINI_DEFAULT_MODEL);
            return create_provider("gemini", model);
        }
    }

    let (llm_provider, _embedding) =
        ProviderFactory::from_env().map_err(|e| SefinError::ProviderNotConfigured {
            provider: "auto".to_string(),
            hint: format!(
                "No LLM provider could be auto-detected from environment.\n\
                Set GEMINI_API_KEY, OPENAI_API_KEY or ANTHROPIC_API_KEY.\n\
                Error: {}",
                e
            ),
        })?;

    Ok(llm_provider)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_options_defaults() {
        let config = ConversionConfig::default();
        let opts = build_options(&config);
        assert_eq!(opts.temperature, Some(0.1));
        assert_eq!(opts.max_tokens, Some(8192));
    }

    struct Canned(&'static str);

    #[async_trait]
    impl ExtractionAdapter for Canned {
        async fn extract(&self, _b64: &str, _media_type: &str) -> Result<String, ItemError> {
            Ok(self.0.to_string())
        }
    }

    #[tokio::test]
    async fn adapter_trait_is_object_safe() {
        let adapter: Arc<dyn ExtractionAdapter> = Arc::new(Canned("a;b"));
        assert_eq!(adapter.extract("", "application/pdf").await.unwrap(), "a;b");
    }

    #[tokio::test]
    async fn unavailable_adapter_reports_reason() {
        let adapter = UnavailableAdapter::new("no API key");
        let err = adapter.extract("", "image/png").await.unwrap_err();
        assert_eq!(
            err,
            ItemError::Adapter {
                detail: "no API key".into()
            }
        );
    }
}
