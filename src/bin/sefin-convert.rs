//! CLI binary for sefin-convert.
//!
//! A thin shim over the library crate: maps flags to `ConversionConfig`,
//! feeds the files through a `ConversionSession` and writes the exports.

use anyhow::{Context, Result};
use clap::Parser;
use sefin_convert::{
    BatchProgressCallback, ConversionConfig, ConversionSession, ExportArtifact, ExportFormat,
    ExtractionAdapter, JsonFileStore, LlmExtractionAdapter, MemoryStore, ProgressCallback,
    SessionStore, UnavailableAdapter,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers ──────────────────────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

const TICKS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Live progress bar with one log line per finished file.
struct CliProgressCallback {
    bar: ProgressBar,
    item_started: Mutex<Option<Instant>>,
    errors: AtomicUsize,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        let style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>3}/{len} files  {msg}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(TICKS);
        bar.set_style(style);
        bar.set_prefix("Converting");

        Arc::new(Self {
            bar,
            item_started: Mutex::new(None),
            errors: AtomicUsize::new(0),
        })
    }

    fn elapsed_secs(&self) -> f64 {
        self.item_started
            .lock()
            .ok()
            .and_then(|mut g| g.take())
            .map(|t| t.elapsed().as_secs_f64())
            .unwrap_or(0.0)
    }
}

impl BatchProgressCallback for CliProgressCallback {
    fn on_batch_start(&self, total: usize) {
        self.bar.set_length(total as u64);
        self.bar.set_position(0);
        self.bar.reset_eta();
        self.bar.enable_steady_tick(Duration::from_millis(80));
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("Converting {total} files…"))
        ));
    }

    fn on_item_start(&self, _position: usize, _total: usize, name: &str) {
        if let Ok(mut g) = self.item_started.lock() {
            *g = Some(Instant::now());
        }
        self.bar.set_message(name.to_string());
    }

    fn on_item_complete(&self, done: usize, total: usize, name: &str, result_len: usize) {
        let secs = self.elapsed_secs();
        self.bar.println(format!(
            "  {} {:>3}/{:<3}  {}  {}  {}",
            green("✓"),
            done,
            total,
            name,
            dim(&format!("{result_len:>6} bytes")),
            dim(&format!("{secs:.1}s")),
        ));
        self.bar.set_position(done as u64);
    }

    fn on_item_error(&self, done: usize, total: usize, name: &str, error: &str) {
        let secs = self.elapsed_secs();
        self.errors.fetch_add(1, Ordering::SeqCst);

        let msg: String = if error.chars().count() > 80 {
            error.chars().take(79).chain(std::iter::once('…')).collect()
        } else {
            error.to_string()
        };

        self.bar.println(format!(
            "  {} {:>3}/{:<3}  {}  {}  {}",
            red("✗"),
            done,
            total,
            name,
            red(&msg),
            dim(&format!("{secs:.1}s")),
        ));
        self.bar.set_position(done as u64);
    }

    fn on_batch_complete(&self, total: usize, success_count: usize) {
        let failed = self.errors.swap(0, Ordering::SeqCst);
        self.bar.finish_and_clear();

        if failed == 0 {
            eprintln!(
                "{} {} files converted successfully",
                green("✔"),
                bold(&success_count.to_string())
            );
        } else {
            eprintln!(
                "{} {}/{} files converted  ({} failed)",
                if failed == total { red("✘") } else { cyan("⚠") },
                bold(&success_count.to_string()),
                total,
                red(&failed.to_string()),
            );
        }
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Convert a spreadsheet and a CSV into ./out
  sefin-convert relatorio.xlsx vendas.csv -o out

  # Convert everything and bundle the results into one zip
  sefin-convert *.xlsx *.pdf --zip -o out

  # Consolidate several monthly files into one table
  sefin-convert jan.csv fev.csv mar.csv --merge

  # Keep results between runs, then export them again later
  sefin-convert --session sessao.json nota.pdf
  sefin-convert --session sessao.json --zip -o out

  # Give files that failed one more pass before exporting
  sefin-convert nota.pdf foto.jpg --retry-failed

  # Show the header and first 10 rows of each result
  sefin-convert extrato.xlsx --preview 10

SUPPORTED INPUTS:
  .xlsx .xlsm .xls     first sheet only, converted locally
  .csv                 delimiter detected from the first line
  .pdf .png .jpg .jpeg .webp .heic .heif
                       sent to a vision LLM for table extraction

OUTPUT FORMAT:
  Semicolon delimiter, comma decimal separator, every field quoted,
  UTF-8 with byte-order mark, CRLF line endings.

ENVIRONMENT VARIABLES:
  GEMINI_API_KEY          Google Gemini API key (default provider)
  OPENAI_API_KEY          OpenAI API key
  ANTHROPIC_API_KEY       Anthropic API key
  EDGEQUAKE_LLM_PROVIDER  Override provider (gemini, openai, anthropic, ollama)
  EDGEQUAKE_MODEL         Override model ID
"#;

/// Convert spreadsheets, CSV, PDFs and images into Brazilian-locale CSV.
#[derive(Parser, Debug)]
#[command(
    name = "sefin-convert",
    version,
    about = "Convert spreadsheets, CSV, PDFs and images into Brazilian-locale CSV",
    long_about = "Batch-convert tabular documents into semicolon-delimited, comma-decimal, \
fully-quoted CSV. Spreadsheets and CSV files are converted locally; PDFs and images are \
read by a vision LLM (Gemini, OpenAI, Anthropic, Ollama, ...).",
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Files to convert.
    files: Vec<PathBuf>,

    /// Directory for the exported files.
    #[arg(short, long, env = "SEFIN_OUTPUT_DIR", default_value = ".")]
    output: PathBuf,

    /// Export extension.
    #[arg(long, env = "SEFIN_FORMAT", value_enum, default_value = "csv")]
    format: FormatArg,

    /// Bundle every completed result into one zip archive.
    #[arg(long, env = "SEFIN_ZIP")]
    zip: bool,

    /// Also write one consolidated table of every completed result.
    #[arg(long, env = "SEFIN_MERGE")]
    merge: bool,

    /// JSON file that keeps completed and failed items between runs.
    #[arg(long, env = "SEFIN_SESSION")]
    session: Option<PathBuf>,

    /// After the batch, run failed files once more (files restored from
    /// --session are not retried; add them again instead).
    #[arg(long)]
    retry_failed: bool,

    /// Print the header and first N rows of each completed result.
    #[arg(long, value_name = "N")]
    preview: Option<usize>,

    /// Largest accepted input file, in megabytes.
    #[arg(long, env = "SEFIN_MAX_SIZE_MB", default_value_t = 100,
          value_parser = clap::value_parser!(u64).range(1..))]
    max_size_mb: u64,

    /// Fixed delimiter for .csv inputs (detected from the first line if unset).
    #[arg(long, env = "SEFIN_CSV_DELIMITER")]
    delimiter: Option<char>,

    /// LLM provider: gemini, openai, anthropic, ollama, azure.
    #[arg(long, env = "EDGEQUAKE_LLM_PROVIDER")]
    provider: Option<String>,

    /// LLM model ID (default: gemini-2.0-flash).
    #[arg(long, env = "EDGEQUAKE_MODEL")]
    model: Option<String>,

    /// Path to a text file containing a custom system prompt.
    #[arg(long, env = "SEFIN_SYSTEM_PROMPT")]
    system_prompt: Option<PathBuf>,

    /// Retries per file on LLM failure.
    #[arg(long, env = "SEFIN_MAX_RETRIES", default_value_t = 2)]
    max_retries: u32,

    /// Per-file LLM call timeout in seconds (0 disables).
    #[arg(long, env = "SEFIN_API_TIMEOUT", default_value_t = 120)]
    api_timeout: u64,

    /// Disable progress bar.
    #[arg(long, env = "SEFIN_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "SEFIN_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "SEFIN_QUIET")]
    quiet: bool,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum FormatArg {
    Csv,
    Txt,
}

impl From<FormatArg> for ExportFormat {
    fn from(v: FormatArg) -> Self {
        match v {
            FormatArg::Csv => ExportFormat::Csv,
            FormatArg::Txt => ExportFormat::Txt,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The progress bar replaces INFO-level library logs.
    let show_progress = !cli.quiet && !cli.no_progress;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    if cli.files.is_empty() && cli.session.is_none() {
        anyhow::bail!("Nothing to do: pass files to convert or --session to reopen a session");
    }

    // ── Build config and collaborators ───────────────────────────────────
    let progress_cb: Option<ProgressCallback> = if show_progress {
        Some(CliProgressCallback::new() as Arc<dyn BatchProgressCallback>)
    } else {
        None
    };
    let config = build_config(&cli, progress_cb).await?;

    // Spreadsheets and CSV never need the LLM, so a missing key is only
    // reported on the files that do.
    let adapter: Arc<dyn ExtractionAdapter> = match LlmExtractionAdapter::from_config(&config) {
        Ok(a) => Arc::new(a),
        Err(e) => {
            tracing::warn!("LLM adapter unavailable: {}", e);
            Arc::new(UnavailableAdapter::new(e.to_string()))
        }
    };

    let store: Box<dyn SessionStore> = match cli.session {
        Some(ref path) => Box::new(JsonFileStore::new(path)),
        None => Box::new(MemoryStore::new()),
    };

    let mut session = ConversionSession::open(config, adapter, store);

    // ── Intake ───────────────────────────────────────────────────────────
    for path in &cli.files {
        session
            .intake_path(path)
            .await
            .with_context(|| format!("Failed to read {}", path.display()))?;
    }

    // ── Convert ──────────────────────────────────────────────────────────
    let mut summary = session.process_all().await;
    if cli.retry_failed {
        let retried = session.retry_failed().await;
        summary.total += retried.total;
        summary.completed += retried.completed;
        summary.failed += retried.failed;
    }

    if !cli.quiet && !show_progress && summary.total > 0 {
        eprintln!(
            "Converted {}/{} files in {}ms",
            summary.completed, summary.total, summary.duration_ms
        );
    }
    for item in session.items() {
        if let Some(err) = item.error() {
            if !cli.quiet {
                eprintln!("  {} {}: {}", red("✗"), item.name(), err);
            }
        }
    }

    // ── Preview ──────────────────────────────────────────────────────────
    if let Some(rows) = cli.preview {
        for item in session.items().iter().filter(|i| i.is_completed()) {
            let table = session
                .preview(item.id(), rows)
                .with_context(|| format!("Failed to preview {}", item.name()))?;
            println!("{}", bold(item.name()));
            for row in &table.rows {
                println!("  {}", row.join(" | "));
            }
        }
    }

    // ── Export ───────────────────────────────────────────────────────────
    let format: ExportFormat = cli.format.into();
    let stats = session.stats();
    if stats.completed > 0 {
        tokio::fs::create_dir_all(&cli.output)
            .await
            .with_context(|| format!("Failed to create {}", cli.output.display()))?;
    }

    let mut written = Vec::new();
    if cli.zip {
        if stats.completed > 0 {
            let archive = session
                .export_all(format)
                .await
                .context("Failed to build archive")?;
            written.push(write_artifact(&cli.output, &archive).await?);
        }
    } else {
        for item in session.items().iter().filter(|i| i.is_completed()) {
            let artifact = session
                .export_item(item.id(), format)
                .with_context(|| format!("Failed to export {}", item.name()))?;
            written.push(write_artifact(&cli.output, &artifact).await?);
        }
    }

    if cli.merge {
        let merged = session
            .export_merged(format)
            .context("Failed to merge results")?;
        written.push(write_artifact(&cli.output, &merged).await?);
    }

    if !cli.quiet {
        for path in &written {
            eprintln!("  {} {}", green("→"), bold(&path.display().to_string()));
        }
    }

    if summary.total > 0 && summary.completed == 0 {
        anyhow::bail!("No file could be converted");
    }
    Ok(())
}

/// Megabytes to bytes, clamped at `u64::MAX`.
fn megabytes(mb: u64) -> u64 {
    mb.saturating_mul(1024 * 1024)
}

/// Map CLI args to `ConversionConfig`.
async fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<ConversionConfig> {
    let mut builder = ConversionConfig::builder()
        .max_file_size(megabytes(cli.max_size_mb))
        .adapter_timeout_secs(cli.api_timeout)
        .max_retries(cli.max_retries);

    if let Some(ref path) = cli.system_prompt {
        let prompt = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read system prompt from {:?}", path))?;
        builder = builder.system_prompt(prompt);
    }
    if let Some(c) = cli.delimiter {
        let byte = u8::try_from(c)
            .ok()
            .filter(u8::is_ascii)
            .with_context(|| format!("Delimiter must be a single ASCII character, got {c:?}"))?;
        builder = builder.csv_delimiter(byte);
    }
    if let Some(ref name) = cli.provider {
        builder = builder.provider_name(name.clone());
    }
    if let Some(ref model) = cli.model {
        builder = builder.model(model.clone());
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}

async fn write_artifact(dir: &Path, artifact: &ExportArtifact) -> Result<PathBuf> {
    let path = dir.join(&artifact.file_name);
    tokio::fs::write(&path, &artifact.bytes)
        .await
        .with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use std::ffi::OsStr;

    #[test]
    fn provider_flag_reads_the_documented_variable() {
        let cmd = Cli::command();
        let arg = cmd
            .get_arguments()
            .find(|a| a.get_id() == "provider")
            .unwrap();
        assert_eq!(arg.get_env(), Some(OsStr::new("EDGEQUAKE_LLM_PROVIDER")));
        assert!(AFTER_HELP.contains("EDGEQUAKE_LLM_PROVIDER"));
    }

    #[test]
    fn size_limit_saturates_instead_of_overflowing() {
        assert_eq!(megabytes(50), 50 * 1024 * 1024);
        assert_eq!(megabytes(u64::MAX), u64::MAX);
    }
}
