//! CLI binary for md2feishu.
//!
//! A thin shim over the library crate that maps CLI flags
//! to `MigrationConfig` and prints the resulting report.

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use md2feishu::platform::ImportStatus;
use md2feishu::{
    Destination, FeishuClient, MigrationConfig, MigrationPipeline, MigrationProgressCallback,
    MigrationReport, MigrationRequest, MigrationStage, PlaceholderPolicy, ProgressCallback,
    TokioClock, UploadedArtifact,
};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
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

/// Terminal progress callback: a spinner showing the current stage, plus one
/// log line per bound image and per compensating delete.
struct CliProgressCallback {
    bar: ProgressBar,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new_spinner();
        let style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}  {elapsed:.dim}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);

        bar.set_style(style);
        bar.set_prefix("Preparing");
        bar.set_message("Authenticating…");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self { bar })
    }
}

impl MigrationProgressCallback for CliProgressCallback {
    fn on_stage(&self, stage: MigrationStage) {
        match stage {
            MigrationStage::Start => self.bar.set_message("Reading markdown…"),
            MigrationStage::MdUploaded => {
                self.bar.println(format!("  {} Markdown uploaded", green("✓")));
                self.bar.set_prefix("Importing");
                self.bar.set_message("Requesting conversion…");
            }
            MigrationStage::ImportRequested => self.bar.set_message("Waiting for the import job…"),
            MigrationStage::DocCreated => {
                self.bar.println(format!("  {} Document created", green("✓")));
                self.bar.set_prefix("Images");
                self.bar.set_message("Listing image blocks…");
            }
            MigrationStage::ImagesBound => {
                self.bar.set_prefix("Cleaning");
                self.bar.set_message("Removing the intermediate upload…");
            }
            MigrationStage::Cleaned => self.bar.finish_and_clear(),
            MigrationStage::Compensating => {
                self.bar.set_prefix("Rolling back");
                self.bar.set_message("Deleting created artifacts…");
            }
            MigrationStage::Failed => self.bar.finish_and_clear(),
        }
    }

    fn on_import_poll(&self, poll: u32, status: ImportStatus) {
        self.bar
            .set_message(format!("Import job {status:?} (poll {poll})"));
    }

    fn on_image_start(&self, index: usize, total: usize, path: &Path) {
        self.bar
            .set_message(format!("{index}/{total}  {}", path.display()));
    }

    fn on_image_bound(&self, index: usize, total: usize, path: &Path, width: u32, height: u32) {
        self.bar.println(format!(
            "  {} Image {:>3}/{:<3}  {}  {}",
            green("✓"),
            index,
            total,
            path.display(),
            dim(&format!("{width}x{height}")),
        ));
    }

    fn on_compensation(&self, artifact: &UploadedArtifact, error: Option<&str>) {
        match error {
            None => self.bar.println(format!(
                "  {} Deleted {} {}",
                cyan("↺"),
                artifact.kind,
                dim(&artifact.token)
            )),
            Some(e) => self.bar.println(format!(
                "  {} Could not delete {} {}  {}",
                red("✗"),
                artifact.kind,
                artifact.token,
                red(e)
            )),
        }
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Migrate into an existing folder
  md2feishu notes.md --folder-token fldcnXXXXXXXX

  # Custom title, into a new folder under an existing one
  md2feishu notes.md --title "Team notes" --new-folder "Imports" --folder-token fldcnXXXX

  # Refuse to run when image references and image blocks disagree
  md2feishu --strict-images notes.md --folder-token fldcnXXXX

  # JSON report for scripting
  md2feishu --json notes.md --folder-token fldcnXXXX > report.json

ENVIRONMENT VARIABLES:
  FEISHU_APP_ID           Application id
  FEISHU_APP_SECRET       Application secret
  FEISHU_FOLDER_TOKEN     Default destination folder
  FEISHU_BASE_URL         API root (https://open.larksuite.com for Lark)
  RUST_LOG                Override the log filter

  A .env file in the working directory is read first; variables already
  set in the environment take precedence.
"#;

/// Migrate Markdown files with local images into Feishu docx documents.
#[derive(Parser, Debug)]
#[command(
    name = "md2feishu",
    version,
    about = "Migrate Markdown files with local images into Feishu / Lark docx documents",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Markdown file to migrate.
    input: PathBuf,

    /// Document title. Defaults to the file name without extension.
    #[arg(short, long, env = "MD2FEISHU_TITLE")]
    title: Option<String>,

    /// Destination folder token (parent folder with --new-folder).
    #[arg(short, long, env = "FEISHU_FOLDER_TOKEN")]
    folder_token: Option<String>,

    /// Create a folder with this name and migrate into it.
    #[arg(long, env = "MD2FEISHU_NEW_FOLDER")]
    new_folder: Option<String>,

    /// Application id.
    #[arg(long, env = "FEISHU_APP_ID", hide_env_values = true)]
    app_id: String,

    /// Application secret.
    #[arg(long, env = "FEISHU_APP_SECRET", hide_env_values = true)]
    app_secret: String,

    /// API root.
    #[arg(long, env = "FEISHU_BASE_URL", default_value = md2feishu::config::DEFAULT_BASE_URL)]
    base_url: String,

    /// Fail when image references and image blocks differ in number.
    #[arg(long, env = "MD2FEISHU_STRICT_IMAGES")]
    strict_images: bool,

    /// Give up on the import job after this many seconds.
    #[arg(long, env = "MD2FEISHU_IMPORT_DEADLINE")]
    import_deadline: Option<u64>,

    /// Per-request HTTP timeout in seconds.
    #[arg(long, env = "MD2FEISHU_REQUEST_TIMEOUT", default_value_t = 60)]
    request_timeout: u64,

    /// Print the migration report as JSON on stdout.
    #[arg(long, env = "MD2FEISHU_JSON")]
    json: bool,

    /// Disable the progress spinner.
    #[arg(long, env = "MD2FEISHU_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "MD2FEISHU_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "MD2FEISHU_QUIET")]
    quiet: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Loaded before parsing so clap's `env` lookups see it.
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json;
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
    let progress_cb: Option<ProgressCallback> = if show_progress {
        Some(CliProgressCallback::new() as Arc<dyn MigrationProgressCallback>)
    } else {
        None
    };
    let config = build_config(&cli, progress_cb)?;
    let destination = destination(&cli)?;

    // ── Run migration ────────────────────────────────────────────────────
    let client = FeishuClient::from_config(&config).context("Failed to create API client")?;
    let pipeline = MigrationPipeline::new(Arc::new(client), Arc::new(TokioClock), &config)
        .context("Invalid configuration")?;

    let mut request = MigrationRequest::new(&cli.input, destination);
    request.title = cli.title.clone();

    let report = pipeline
        .run(&request)
        .await
        .with_context(|| format!("Migration of {} failed", cli.input.display()))?;

    if cli.json {
        let json = serde_json::to_string_pretty(&report).context("Failed to serialise report")?;
        println!("{json}");
    } else if !cli.quiet {
        print_summary(&report);
    }

    Ok(())
}

/// Map CLI args to `MigrationConfig`.
fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<MigrationConfig> {
    let mut builder = MigrationConfig::builder()
        .base_url(cli.base_url.clone())
        .credentials(cli.app_id.clone(), cli.app_secret.clone())
        .request_timeout_secs(cli.request_timeout);

    if cli.strict_images {
        builder = builder.placeholder_policy(PlaceholderPolicy::Strict);
    }
    if let Some(secs) = cli.import_deadline {
        builder = builder.import_deadline(Duration::from_secs(secs));
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}

/// `--new-folder` creates a folder (under `--folder-token` when given);
/// otherwise `--folder-token` is the destination itself.
fn destination(cli: &Cli) -> Result<Destination> {
    match (&cli.new_folder, &cli.folder_token) {
        (Some(name), parent) => {
            if name.trim().is_empty() {
                anyhow::bail!("--new-folder needs a non-empty name");
            }
            Ok(Destination::new_folder(name.trim(), parent.clone()))
        }
        (None, Some(folder)) => Ok(Destination::folder(folder.clone())),
        (None, None) => anyhow::bail!(
            "No destination: pass --folder-token (or set FEISHU_FOLDER_TOKEN) or --new-folder"
        ),
    }
}

fn print_summary(report: &MigrationReport) {
    eprintln!(
        "{} {}  →  document {}  {}",
        green("✔"),
        bold(&report.title),
        bold(&report.document_token),
        dim(&format!("{}ms", report.duration_ms)),
    );
    eprintln!(
        "   {} local image(s) bound, {} remote, of {} reference(s)",
        report.images_bound, report.remote_images, report.references
    );
    if report.is_truncated() {
        eprintln!(
            "   {} {} reference(s) without a block, {} block(s) without an image",
            cyan("⚠"),
            report.unbound_references,
            report.unused_placeholders
        );
    }
}
