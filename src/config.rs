//! Configuration types for batch conversion.
//!
//! All conversion behaviour is controlled through [`ConversionConfig`], built
//! via its [`ConversionConfigBuilder`]. One struct covers intake limits, the
//! CSV source delimiter, export naming and the external adapter knobs, so a
//! session and its adapter are always configured from the same place.

use crate::error::SefinError;
use crate::progress::ProgressCallback;
use edgequake_llm::LLMProvider;
use std::fmt;
use std::sync::Arc;

/// Default intake ceiling: 100 MiB.
pub const DEFAULT_MAX_FILE_SIZE: u64 = 100 * 1024 * 1024;

/// Configuration for a conversion session.
///
/// Built via [`ConversionConfig::builder()`] or using
/// [`ConversionConfig::default()`].
///
/// # Example
/// ```rust
/// use sefin_convert::ConversionConfig;
///
/// let config = ConversionConfig::builder()
///     .max_file_size(20 * 1024 * 1024)
///     .adapter_timeout_secs(60)
///     .model("gemini-2.0-flash")
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct ConversionConfig {
    /// Largest accepted input in bytes. Default: 100 MiB.
    ///
    /// Larger files are recorded as errors at intake and never queued.
    pub max_file_size: u64,

    /// Per-call timeout for the external adapter in seconds. Default: 120.
    /// `0` waits indefinitely.
    pub adapter_timeout_secs: u64,

    /// Fixed delimiter for `.csv` sources. Default: None (detected once from
    /// the first line of each file).
    pub csv_delimiter: Option<u8>,

    /// Appended to the source stem of every exported file. Default: `_convertido`.
    pub export_suffix: String,

    /// Prefix of bulk archive names. Default: `CONVERSOR_SEFIN_LOTE_`.
    pub archive_prefix: String,

    /// Prefix of merged export names. Default: `CONVERSOR_SEFIN_CONSOLIDADO_`.
    pub merged_prefix: String,

    /// LLM model identifier, e.g. "gemini-2.0-flash", "gpt-4.1-mini".
    /// If None, uses the provider default.
    pub model: Option<String>,

    /// LLM provider name (e.g. "gemini", "openai", "anthropic").
    pub provider_name: Option<String>,

    /// Pre-constructed LLM provider. Takes precedence over `provider_name`.
    pub provider: Option<Arc<dyn LLMProvider>>,

    /// Sampling temperature for the extraction call. Default: 0.1.
    pub temperature: f32,

    /// Maximum tokens the LLM may generate per file. Default: 8192.
    ///
    /// Long statements easily run past 4 000 tokens of CSV; a truncated
    /// answer silently loses the last rows.
    pub max_tokens: usize,

    /// Retries inside the adapter on a failed call. Default: 2.
    pub max_retries: u32,

    /// Initial retry delay in milliseconds, doubled per attempt. Default: 500.
    pub retry_backoff_ms: u64,

    /// Custom extraction prompt. If None, uses the built-in one.
    pub system_prompt: Option<String>,

    /// Receives batch progress events.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for ConversionConfig {
    fn default() -> Self {
        Self {
            max_file_size: DEFAULT_MAX_FILE_SIZE,
            adapter_timeout_secs: 120,
            csv_delimiter: None,
            export_suffix: "_convertido".to_string(),
            archive_prefix: "CONVERSOR_SEFIN_LOTE_".to_string(),
            merged_prefix: "CONVERSOR_SEFIN_CONSOLIDADO_".to_string(),
            model: None,
            provider_name: None,
            provider: None,
            temperature: 0.1,
            max_tokens: 8192,
            max_retries: 2,
            retry_backoff_ms: 500,
            system_prompt: None,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for ConversionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConversionConfig")
            .field("max_file_size", &self.max_file_size)
            .field("adapter_timeout_secs", &self.adapter_timeout_secs)
            .field("csv_delimiter", &self.csv_delimiter.map(char::from))
            .field("export_suffix", &self.export_suffix)
            .field("archive_prefix", &self.archive_prefix)
            .field("merged_prefix", &self.merged_prefix)
            .field("model", &self.model)
            .field("provider_name", &self.provider_name)
            .field("provider", &self.provider.as_ref().map(|_| "<dyn LLMProvider>"))
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("max_retries", &self.max_retries)
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<dyn BatchProgressCallback>"),
            )
            .finish()
    }
}

impl ConversionConfig {
    /// Create a new builder for `ConversionConfig`.
    pub fn builder() -> ConversionConfigBuilder {
        ConversionConfigBuilder {
            config: Self::default(),
        }
    }

    /// The intake ceiling in whole megabytes, as shown in error messages.
    pub fn max_file_size_mb(&self) -> u64 {
        self.max_file_size / (1024 * 1024)
    }
}

/// Builder for [`ConversionConfig`].
pub struct ConversionConfigBuilder {
    config: ConversionConfig,
}

impl fmt::Debug for ConversionConfigBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConversionConfigBuilder")
            .field("config", &self.config)
            .finish()
    }
}

impl ConversionConfigBuilder {
    pub fn max_file_size(mut self, bytes: u64) -> Self {
        self.config.max_file_size = bytes;
        self
    }

    pub fn adapter_timeout_secs(mut self, secs: u64) -> Self {
        self.config.adapter_timeout_secs = secs;
        self
    }

    pub fn csv_delimiter(mut self, delimiter: u8) -> Self {
        self.config.csv_delimiter = Some(delimiter);
        self
    }

    pub fn export_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.config.export_suffix = suffix.into();
        self
    }

    pub fn archive_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.config.archive_prefix = prefix.into();
        self
    }

    pub fn merged_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.config.merged_prefix = prefix.into();
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = Some(model.into());
        self
    }

    pub fn provider_name(mut self, name: impl Into<String>) -> Self {
        self.config.provider_name = Some(name.into());
        self
    }

    pub fn provider(mut self, provider: Arc<dyn LLMProvider>) -> Self {
        self.config.provider = Some(provider);
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.temperature = t.clamp(0.0, 2.0);
        self
    }

    pub fn max_tokens(mut self, n: usize) -> Self {
        self.config.max_tokens = n;
        self
    }

    pub fn max_retries(mut self, n: u32) -> Self {
        self.config.max_retries = n;
        self
    }

    pub fn retry_backoff_ms(mut self, ms: u64) -> Self {
        self.config.retry_backoff_ms = ms;
        self
    }

    pub fn system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.config.system_prompt = Some(prompt.into());
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ConversionConfig, SefinError> {
        let c = &self.config;
        if c.max_file_size == 0 {
            return Err(SefinError::InvalidConfig(
                "Maximum file size must be greater than 0".into(),
            ));
        }
        if let Some(d) = c.csv_delimiter {
            if matches!(d, b'"' | b'\n' | b'\r') {
                return Err(SefinError::InvalidConfig(format!(
                    "CSV delimiter cannot be {:?}",
                    char::from(d)
                )));
            }
        }
        if c.export_suffix.contains(['/', '\\']) {
            return Err(SefinError::InvalidConfig(
                "Export suffix cannot contain path separators".into(),
            ));
        }
        Ok(self.config)
    }
}
