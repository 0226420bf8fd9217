//! CLI binary for imgconv.
//!
//! A thin shim over the library crate: loads the files given on the command
//! line into an [`App`], fills its form from flags, submits, and saves the
//! converted images.

use anyhow::{Context, Result};
use clap::Parser;
use imgconv::config::BASE_URL_ENV;
use imgconv::results::ARCHIVE_FILE_NAME;
use imgconv::{
    App, ClientConfig, ConversionProgressCallback, HttpConversionService, ImgConvError,
    PreviewEntry, ProgressCallback, SelectedFile,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::io;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
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

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress callback: one bar for the batch plus a log line per file.
struct CliProgressCallback {
    bar: ProgressBar,
    /// Start time of the file currently in flight.
    current: Mutex<Option<Instant>>,
    errors: AtomicUsize,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        let style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>3}/{len} files  \
             ⏱ {elapsed_precise}  {msg}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);
        bar.set_style(style);
        bar.set_prefix("Converting");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            current: Mutex::new(None),
            errors: AtomicUsize::new(0),
        })
    }

    fn elapsed_secs(&self) -> f64 {
        self.current
            .lock()
            .ok()
            .and_then(|mut c| c.take())
            .map(|t| t.elapsed().as_secs_f64())
            .unwrap_or(0.0)
    }
}

impl ConversionProgressCallback for CliProgressCallback {
    fn on_conversion_start(&self, total_files: usize) {
        self.bar.set_length(total_files as u64);
        self.bar.reset_eta();
    }

    fn on_file_start(&self, _index: usize, _total: usize, name: &str) {
        if let Ok(mut c) = self.current.lock() {
            *c = Some(Instant::now());
        }
        self.bar.set_message(name.to_string());
    }

    fn on_file_complete(&self, index: usize, total: usize, bytes: usize) {
        let secs = self.elapsed_secs();
        self.bar.println(format!(
            "  {} File {:>3}/{:<3}  {:<12}  {}",
            green("✓"),
            index,
            total,
            dim(&format!("{bytes:>8} bytes")),
            dim(&format!("{secs:.1}s")),
        ));
        self.bar.inc(1);
    }

    fn on_file_error(&self, index: usize, total: usize, error: &str) {
        let secs = self.elapsed_secs();
        self.errors.fetch_add(1, Ordering::SeqCst);

        // Truncate very long error messages to keep output tidy.
        let msg = if error.chars().count() > 80 {
            format!("{}\u{2026}", error.chars().take(79).collect::<String>())
        } else {
            error.to_string()
        };

        self.bar.println(format!(
            "  {} File {:>3}/{:<3}  {}  {}",
            red("✗"),
            index,
            total,
            red(&msg),
            dim(&format!("{secs:.1}s")),
        ));
        self.bar.inc(1);
    }

    fn on_conversion_complete(&self, total_files: usize, success_count: usize) {
        self.bar.finish_and_clear();
        if self.errors.load(Ordering::SeqCst) == 0 && success_count == total_files {
            eprintln!(
                "{} {} files converted successfully",
                green("✔"),
                bold(&success_count.to_string())
            );
        } else {
            eprintln!(
                "{} batch aborted after {}/{} files",
                red("✘"),
                bold(&success_count.to_string()),
                total_files,
            );
        }
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Convert to PNG, files land in the current directory
  imgconv --format png photo.jpg

  # Resize two images to 800x600, grayscale, WebP quality 70
  imgconv --format webp --width 800 --height 600 --grayscale --quality 70 a.jpg b.png -o out/

  # Bundle everything into out/converted_images.zip
  imgconv --format jpeg --zip *.heic -o out/

  # Ask the service which output formats it supports
  imgconv --list-formats

OUTPUT NAMES:
  converted_image_1.<ext>, converted_image_2.<ext>, … in input order.
  With --zip: converted_images.zip containing converted_images/converted_image_N.<ext>.

ENVIRONMENT VARIABLES:
  IMGCONV_API_BASE_URL    Conversion service root (default http://localhost:8000)
  RUST_LOG                Override log filter (e.g. imgconv=debug)
"#;

/// Convert images through a remote conversion service.
#[derive(Parser, Debug)]
#[command(
    name = "imgconv",
    version,
    about = "Convert images through a remote conversion service",
    long_about = "Send images to an image conversion service and save the results. \
Files are converted one at a time; the first failure aborts the batch and nothing is saved.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Image files to convert. Non-image files and duplicates are skipped.
    #[arg(required_unless_present = "list_formats")]
    inputs: Vec<PathBuf>,

    /// Conversion service base URL.
    #[arg(long, env = BASE_URL_ENV)]
    api_url: Option<String>,

    /// Output format (must be one the service supports).
    #[arg(short, long, env = "IMGCONV_FORMAT", default_value = "jpeg")]
    format: String,

    /// Resize width in pixels (requires --height).
    #[arg(long)]
    width: Option<String>,

    /// Resize height in pixels (requires --width).
    #[arg(long)]
    height: Option<String>,

    /// Convert to grayscale.
    #[arg(long)]
    grayscale: bool,

    /// Output quality, 1–100.
    #[arg(long, env = "IMGCONV_QUALITY", default_value = "80")]
    quality: String,

    /// Directory to write results into.
    #[arg(short, long, env = "IMGCONV_OUTPUT_DIR", default_value = ".")]
    output_dir: PathBuf,

    /// Write a single converted_images.zip instead of individual files.
    #[arg(long)]
    zip: bool,

    /// Print the service's supported output formats and exit.
    #[arg(long)]
    list_formats: bool,

    /// Per-request timeout in seconds (default: none).
    #[arg(long, env = "IMGCONV_TIMEOUT")]
    timeout: Option<u64>,

    /// Disable progress bar.
    #[arg(long, env = "IMGCONV_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "IMGCONV_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "IMGCONV_QUIET")]
    quiet: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The progress bar replaces INFO-level library logs.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.list_formats;
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

    let config = build_config(&cli)?;
    let service = HttpConversionService::new(&config).context("Failed to create HTTP client")?;
    let mut app = App::new(service, &config).context("Failed to create preview directory")?;

    let formats = app.load_supported_formats().await.to_vec();
    if cli.list_formats {
        for f in &formats {
            println!("{f}");
        }
        return Ok(());
    }

    // ── Select files ─────────────────────────────────────────────────────
    let mut files = Vec::with_capacity(cli.inputs.len());
    for path in &cli.inputs {
        files.push(
            SelectedFile::from_path(path)
                .await
                .with_context(|| format!("Failed to load {}", path.display()))?,
        );
    }
    let added = app.add_files(files).context("Failed to prepare previews")?;
    if !cli.quiet {
        if added.skipped_non_image > 0 {
            eprintln!("{} skipped {} non-image file(s)", cyan("⚠"), added.skipped_non_image);
        }
        if added.skipped_duplicates > 0 {
            eprintln!("{} skipped {} duplicate file(s)", cyan("⚠"), added.skipped_duplicates);
        }
        for (file, preview) in app.selection().entries() {
            let preview = match preview {
                PreviewEntry::Url(u) => dim(u.url()),
                PreviewEntry::Unsupported => dim("(no preview for this format)"),
            };
            eprintln!("  {} {}  {}", cyan("◆"), file.name(), preview);
        }
    }

    // ── Fill the form ────────────────────────────────────────────────────
    {
        let form = app.form_mut();
        form.format = cli.format.clone();
        form.width = cli.width.clone().unwrap_or_default();
        form.height = cli.height.clone().unwrap_or_default();
        form.grayscale = cli.grayscale;
        form.quality = cli.quality.clone();
    }

    if show_progress {
        let cb: ProgressCallback = CliProgressCallback::new();
        app = app.with_progress(cb);
    }

    // ── Convert ──────────────────────────────────────────────────────────
    if let Err(e) = app.submit().await {
        if let ImgConvError::Validation(v) = &e {
            anyhow::bail!("{v}");
        }
        let message = app.error().map(str::to_string).unwrap_or_else(|| e.to_string());
        anyhow::bail!("{message}");
    }

    // ── Save ─────────────────────────────────────────────────────────────
    let results = app.results();
    let written = if cli.zip {
        vec![results
            .save_archive(cli.output_dir.join(ARCHIVE_FILE_NAME))
            .await
            .context("Failed to write archive")?]
    } else {
        results
            .save_all(&cli.output_dir)
            .await
            .context("Failed to write converted images")?
    };

    if !cli.quiet {
        for path in &written {
            eprintln!("  {} {}", green("→"), bold(&path.display().to_string()));
        }
    }

    app.clear_all();
    Ok(())
}

/// Map CLI args to `ClientConfig`.
fn build_config(cli: &Cli) -> Result<ClientConfig> {
    let mut builder = ClientConfig::builder();
    if let Some(ref url) = cli.api_url {
        builder = builder.base_url(url.clone());
    }
    if let Some(secs) = cli.timeout {
        builder = builder.request_timeout_secs(secs);
    }
    builder.build().context("Invalid configuration")
}
