//! CLI binary for hand2excal.
//!
//! A thin shim over the library crate that maps CLI flags
//! to `ConversionConfig` and prints results.

use anyhow::{bail, Context, Result};
use clap::Parser;
use hand2excal::config::{DEFAULT_BASE_URL, ENV_API_URL, ENV_TIMEOUT_SECS};
use hand2excal::input::read_text_file;
use hand2excal::{
    convert_with, write_document, ConversionConfig, ConversionInput, ConversionResult,
    HttpConversionClient, ImageCandidate, PreviewView, WorkflowObserver, WorkflowPhase,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

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

// ── CLI observer using indicatif ─────────────────────────────────────────────

/// Terminal observer: a spinner whose message follows the status narration.
struct SpinnerObserver {
    bar: ProgressBar,
}

impl SpinnerObserver {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new_spinner();
        let style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}  {elapsed:.dim}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);
        bar.set_style(style);
        bar.set_prefix("Preparing");
        Arc::new(Self { bar })
    }
}

impl WorkflowObserver for SpinnerObserver {
    fn on_transition(&self, _from: WorkflowPhase, to: WorkflowPhase) {
        match to {
            WorkflowPhase::Processing => {
                self.bar.set_prefix(to.label());
                self.bar.reset_elapsed();
                self.bar.enable_steady_tick(Duration::from_millis(80));
            }
            WorkflowPhase::Done | WorkflowPhase::Failed => self.bar.finish_and_clear(),
            WorkflowPhase::Idle | WorkflowPhase::Preview => {}
        }
    }

    fn on_preview(&self, view: &PreviewView) {
        let line = match view {
            PreviewView::Image { width, height, .. } => {
                format!("{} Preview  {}", cyan("◆"), dim(&format!("{width}×{height} px")))
            }
            PreviewView::Fallback { .. } => {
                format!("{} Preview  {}", cyan("◆"), dim("(not displayable, uploading anyway)"))
            }
        };
        self.bar.println(line);
    }

    fn on_progress(&self, _cursor: usize, message: &str) {
        self.bar.set_message(message.to_string());
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Photo of a whiteboard flowchart (scene JSON to stdout)
  hand2excal whiteboard.jpg

  # Save straight to an .excalidraw file
  hand2excal sketch.png -o sketch.excalidraw

  # Describe the process in words instead
  hand2excal --text "Customer orders -> Payment -> Warehouse ships -> Delivered"

  # Read the description from a file, print the full service response
  hand2excal --text-file process.md --json

  # Check that the conversion service is up
  hand2excal --check

SUPPORTED IMAGES:
  JPG, PNG, WebP, HEIC, BMP up to 20 MB.

ENVIRONMENT VARIABLES:
  HAND2EXCAL_API_URL       Conversion service base URL (default http://localhost:8000)
  HAND2EXCAL_TIMEOUT_SECS  Request timeout in seconds (default 120)
  RUST_LOG                 Override log filter (e.g. hand2excal=debug)
"#;

/// Convert hand-drawn flowcharts and process descriptions to Excalidraw.
#[derive(Parser, Debug)]
#[command(
    name = "hand2excal",
    version,
    about = "Convert hand-drawn flowcharts and process descriptions to Excalidraw diagrams",
    long_about = "Upload a photo of a hand-drawn flowchart, or a plain-language description of a \
process, to a hand2excal conversion service and get back an editable Excalidraw diagram.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Image of a hand-drawn flowchart (JPG, PNG, WebP, HEIC, BMP).
    #[arg(conflicts_with_all = ["text", "text_file"])]
    image: Option<PathBuf>,

    /// Process description to convert instead of an image.
    #[arg(long, conflicts_with = "text_file")]
    text: Option<String>,

    /// Read the process description from this file.
    #[arg(long)]
    text_file: Option<PathBuf>,

    /// Write the Excalidraw scene to this file instead of stdout.
    #[arg(short, long, env = "HAND2EXCAL_OUTPUT")]
    output: Option<PathBuf>,

    /// Conversion service base URL.
    #[arg(long, env = ENV_API_URL, default_value = DEFAULT_BASE_URL)]
    api_url: String,

    /// Request timeout in seconds.
    #[arg(long, env = ENV_TIMEOUT_SECS, default_value_t = 120)]
    timeout: u64,

    /// Print the full service response to stdout instead of just the scene.
    #[arg(long, env = "HAND2EXCAL_JSON", conflicts_with = "output")]
    json: bool,

    /// Disable the progress spinner.
    #[arg(long, env = "HAND2EXCAL_NO_PROGRESS")]
    no_progress: bool,

    /// Probe the service health endpoint and exit.
    #[arg(long, conflicts_with_all = ["image", "text", "text_file"])]
    check: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "HAND2EXCAL_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "HAND2EXCAL_QUIET")]
    quiet: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The spinner gives all the feedback that matters; keep INFO logs out
    // of its way unless asked for.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.check;
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

    // ── Build config ─────────────────────────────────────────────────────
    let mut builder = ConversionConfig::builder()
        .base_url(&cli.api_url)
        .request_timeout_secs(cli.timeout);
    if show_progress {
        builder = builder.observer(SpinnerObserver::new());
    }
    let config = builder.build().context("Invalid configuration")?;
    let client = HttpConversionClient::new(&config)?;

    // ── Health check mode ────────────────────────────────────────────────
    if cli.check {
        client.health().await.context("Health check failed")?;
        if !cli.quiet {
            eprintln!("{} {} is healthy", green("✔"), bold(client.base_url()));
        }
        return Ok(());
    }

    // ── Resolve input ────────────────────────────────────────────────────
    let input = if let Some(ref text) = cli.text {
        ConversionInput::Text(text.clone())
    } else if let Some(ref path) = cli.text_file {
        ConversionInput::Text(read_text_file(path).await?)
    } else if let Some(ref path) = cli.image {
        let image = ImageCandidate::from_path(path).await?;
        if !cli.quiet {
            eprintln!(
                "{} {}  {}",
                cyan("◆"),
                bold(&image.display_name),
                dim(&format!("{:.1} MB, {}", image.size_mb(), image.mime_type))
            );
        }
        ConversionInput::Image(image)
    } else {
        bail!("Nothing to convert: pass an IMAGE, --text or --text-file");
    };

    // ── Run conversion ───────────────────────────────────────────────────
    let start = Instant::now();
    let result = match convert_with(Arc::new(client), input, &config).await {
        Ok(result) => result,
        Err(e) => {
            if !cli.quiet {
                eprintln!("{} {}", red("✘"), e);
            }
            return Err(e).context("Conversion failed");
        }
    };
    let elapsed_ms = start.elapsed().as_millis();

    if let Some(ref output_path) = cli.output {
        write_document(&result, output_path).await?;
    } else {
        let text = if cli.json {
            serde_json::to_string_pretty(result.payload()).context("Failed to serialise output")?
        } else {
            result.to_document()?
        };
        let stdout = io::stdout();
        let mut handle = stdout.lock();
        handle
            .write_all(text.as_bytes())
            .context("Failed to write to stdout")?;
        handle.write_all(b"\n").ok();
    }

    if !cli.quiet {
        print_summary(&result, cli.output.as_ref(), elapsed_ms);
    }

    Ok(())
}

fn print_summary(result: &ConversionResult, output: Option<&PathBuf>, elapsed_ms: u128) {
    let counts = match result.metadata() {
        Some(m) => format!("{} shapes, {} connections", m.nodes_count, m.arrows_count),
        None => "diagram ready".to_string(),
    };
    match output {
        Some(path) => eprintln!(
            "{}  {}  {}ms  →  {}",
            green("✔"),
            counts,
            elapsed_ms,
            bold(&path.display().to_string()),
        ),
        None => eprintln!("{}  {}  {}", green("✔"), counts, dim(&format!("{elapsed_ms}ms"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_conflicts_with_output_file() {
        let err = Cli::try_parse_from(["hand2excal", "a.png", "--json", "-o", "a.excalidraw"])
            .unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::ArgumentConflict);
    }

    #[test]
    fn json_to_stdout_is_accepted() {
        let cli = Cli::try_parse_from(["hand2excal", "a.png", "--json"]).unwrap();
        assert!(cli.json);
        assert!(cli.output.is_none());
    }

    #[test]
    fn text_and_image_conflict() {
        assert!(Cli::try_parse_from(["hand2excal", "a.png", "--text", "a -> b"]).is_err());
    }
}
