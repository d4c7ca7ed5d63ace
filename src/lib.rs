//! # md2feishu
//!
//! Migrate Markdown files, local images included, into Feishu / Lark docx
//! documents.
//!
//! The platform can import a raw `.md` upload as a docx document, but the
//! result has empty image blocks where the markdown pointed at local files.
//! This crate drives the whole round trip and fills those blocks in.
//!
//! ## Pipeline Overview
//!
//! ```text
//! notes.md
//!  │
//!  ├─ 1. Auth     exchange app id/secret for a tenant access token
//!  ├─ 2. Ingest   read the file, collect local image references in order
//!  ├─ 3. Upload   upload the raw markdown to a drive folder
//!  ├─ 4. Import   create a markdown → docx job, poll until it has a document
//!  ├─ 5. Bind     upload each image and patch the k-th image block with it
//!  └─ 6. Cleanup  delete the uploaded markdown
//!
//! any failure ─▶ delete everything created so far, newest first, then
//!                return the original error
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use md2feishu::{migrate, Destination, MigrationConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = MigrationConfig::builder()
//!         .credentials(std::env::var("FEISHU_APP_ID")?, std::env::var("FEISHU_APP_SECRET")?)
//!         .build()?;
//!     let report = migrate("notes.md", None, Destination::folder("fldcnXXXX"), &config).await?;
//!     println!("document: {}", report.document_token);
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `md2feishu` binary (clap + anyhow + tracing-subscriber + indicatif) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! md2feishu = { version = "0.3", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod error;
pub mod migrate;
pub mod output;
pub mod pipeline;
pub mod platform;
pub mod progress;
pub mod retry;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{Destination, MigrationConfig, MigrationConfigBuilder, PlaceholderPolicy};
pub use error::{ApiError, CleanupFailure, MigrationError};
pub use migrate::{migrate, migrate_sync, MigrationPipeline, MigrationRequest, MigrationStage};
pub use output::{ArtifactKind, MigrationReport, UploadedArtifact};
pub use platform::http::FeishuClient;
pub use platform::DocumentPlatform;
pub use progress::{MigrationProgressCallback, NoopProgressCallback, ProgressCallback};
pub use retry::{Backoff, Clock, RetryPolicy, TokioClock};
