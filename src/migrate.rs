//! Migration entry points and the orchestration state machine.
//!
//! ```text
//! Start ─▶ MdUploaded ─▶ ImportRequested ─▶ DocCreated ─▶ ImagesBound ─▶ Cleaned
//!   │          │               │                │              │
//!   └──────────┴───────────────┴────────────────┴──────────────┴─▶ Compensating ─▶ Failed
//! ```
//!
//! Every remote object is written to an [`ArtifactLedger`] as soon as it
//! exists. Any error after that point compensates the ledger and then
//! returns the error that caused it.

use crate::config::{Destination, MigrationConfig};
use crate::error::MigrationError;
use crate::output::{ArtifactKind, MigrationReport, UploadedArtifact};
use crate::pipeline::auth::TokenProvider;
use crate::pipeline::binder::{BinderSettings, ImageBinder};
use crate::pipeline::cleanup::{ArtifactLedger, CleanupCoordinator};
use crate::pipeline::import::{ImportJobMonitor, ImportSettings};
use crate::pipeline::ingest::{MarkdownDocument, MarkdownIngester};
use crate::pipeline::upload::ArtifactUploader;
use crate::platform::http::FeishuClient;
use crate::platform::DocumentPlatform;
use crate::progress::ProgressCallback;
use crate::retry::{Clock, TokioClock};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{error, info, warn};

/// Pipeline states, reported through
/// [`crate::progress::MigrationProgressCallback::on_stage`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MigrationStage {
    Start,
    MdUploaded,
    ImportRequested,
    DocCreated,
    ImagesBound,
    Cleaned,
    Compensating,
    Failed,
}

impl fmt::Display for MigrationStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            MigrationStage::Start => "start",
            MigrationStage::MdUploaded => "markdown uploaded",
            MigrationStage::ImportRequested => "import requested",
            MigrationStage::DocCreated => "document created",
            MigrationStage::ImagesBound => "images bound",
            MigrationStage::Cleaned => "cleaned",
            MigrationStage::Compensating => "compensating",
            MigrationStage::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// One markdown file to migrate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationRequest {
    pub source: PathBuf,
    /// Document title; the file stem when `None` or blank.
    pub title: Option<String>,
    pub destination: Destination,
}

impl MigrationRequest {
    pub fn new(source: impl Into<PathBuf>, destination: Destination) -> Self {
        Self {
            source: source.into(),
            title: None,
            destination,
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    fn resolve_title(&self, document: &MarkdownDocument) -> String {
        self.title
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| document.default_title())
    }
}

/// Drives one or more migrations against a platform.
///
/// The access token is acquired once and reused by every run of the same
/// pipeline.
pub struct MigrationPipeline {
    tokens: TokenProvider,
    ingester: MarkdownIngester,
    uploader: ArtifactUploader,
    monitor: ImportJobMonitor,
    binder: ImageBinder,
    cleanup: CleanupCoordinator,
    clock: Arc<dyn Clock>,
    progress: Option<ProgressCallback>,
}

impl MigrationPipeline {
    /// Wire every component to `platform` and `clock`.
    ///
    /// # Errors
    /// [`MigrationError::InvalidConfig`] when credentials are missing.
    pub fn new(
        platform: Arc<dyn DocumentPlatform>,
        clock: Arc<dyn Clock>,
        config: &MigrationConfig,
    ) -> Result<Self, MigrationError> {
        let credentials = config.credentials()?;
        let progress = config.progress_callback.clone();

        Ok(Self {
            tokens: TokenProvider::new(Arc::clone(&platform), credentials),
            ingester: MarkdownIngester::new(),
            uploader: ArtifactUploader::new(Arc::clone(&platform)),
            monitor: ImportJobMonitor::new(
                Arc::clone(&platform),
                Arc::clone(&clock),
                ImportSettings::from_config(config),
            )
            .with_progress(progress.clone()),
            binder: ImageBinder::new(
                Arc::clone(&platform),
                Arc::clone(&clock),
                BinderSettings::from_config(config),
            )
            .with_progress(progress.clone()),
            cleanup: CleanupCoordinator::new(platform).with_progress(progress.clone()),
            clock,
            progress,
        })
    }

    /// Run one migration to completion.
    ///
    /// On error every artifact created so far is deleted, newest first, and
    /// the error that stopped the run is returned. Failures of those deletes
    /// are logged but never replace it.
    pub async fn run(&self, request: &MigrationRequest) -> Result<MigrationReport, MigrationError> {
        let started = self.clock.now();
        info!("Starting migration: {}", request.source.display());
        self.stage(MigrationStage::Start);

        let mut ledger = ArtifactLedger::new();
        match self.execute(request, &mut ledger).await {
            Ok(mut report) => {
                report.duration_ms =
                    self.clock.now().saturating_duration_since(started).as_millis() as u64;
                info!(
                    "Migrated {} → document {} ({} image(s) bound) in {}ms",
                    request.source.display(),
                    report.document_token,
                    report.images_bound,
                    report.duration_ms
                );
                Ok(report)
            }
            Err(err) => {
                error!("Migration of {} failed: {err}", request.source.display());
                self.stage(MigrationStage::Compensating);
                let failures = self.cleanup.compensate(self.tokens.cached(), &mut ledger).await;
                if !failures.is_empty() {
                    warn!("{} artifact(s) could not be removed", failures.len());
                }
                self.stage(MigrationStage::Failed);
                Err(err)
            }
        }
    }

    async fn execute(
        &self,
        request: &MigrationRequest,
        ledger: &mut ArtifactLedger,
    ) -> Result<MigrationReport, MigrationError> {
        let token = self.tokens.acquire().await?;
        let document = self.ingester.parse(&request.source).await?;
        let title = request.resolve_title(&document);
        let size = document.declared_size();
        let MarkdownDocument {
            content, images, ..
        } = document;

        let folder_token = match &request.destination {
            Destination::Folder(folder) => folder.clone(),
            Destination::NewFolder { name, parent } => {
                let folder = self
                    .uploader
                    .create_folder(token, name, parent.as_deref())
                    .await?;
                ledger.record(UploadedArtifact::new(folder.clone(), ArtifactKind::Folder));
                folder
            }
        };

        let file_token = self
            .uploader
            .upload_markdown(token, &title, content, size, &folder_token)
            .await?;
        let markdown = UploadedArtifact::new(file_token.clone(), ArtifactKind::MarkdownFile);
        ledger.record(markdown.clone());
        self.stage(MigrationStage::MdUploaded);

        let ticket = self
            .monitor
            .create(token, &file_token, &title, &folder_token)
            .await?;
        self.stage(MigrationStage::ImportRequested);

        let document_token = self.monitor.wait_for_document(token, &ticket).await?;
        ledger.record(UploadedArtifact::new(
            document_token.clone(),
            ArtifactKind::Document,
        ));
        self.stage(MigrationStage::DocCreated);

        let outcome = self.binder.bind(token, &document_token, images).await?;
        self.stage(MigrationStage::ImagesBound);

        self.cleanup.delete_artifact(token, &markdown).await?;
        ledger.remove(&markdown);
        self.stage(MigrationStage::Cleaned);

        Ok(MigrationReport {
            document_token,
            title,
            folder_token,
            references: outcome.references,
            placeholders: outcome.placeholders,
            images_bound: outcome.bound.len(),
            remote_images: outcome.remote,
            unbound_references: outcome.unbound_references(),
            unused_placeholders: outcome.unused_placeholders(),
            duration_ms: 0,
        })
    }

    fn stage(&self, stage: MigrationStage) {
        info!("Stage: {stage}");
        if let Some(ref cb) = self.progress {
            cb.on_stage(stage);
        }
    }
}

/// Migrate a markdown file to a docx document on the Feishu open platform.
///
/// This is the primary entry point for the library.
///
/// # Arguments
/// * `source`      — path to the markdown file
/// * `title`       — document title; the file stem when `None`
/// * `destination` — existing folder or folder to create
/// * `config`      — credentials, timings and policies
///
/// # Errors
/// The error that stopped the run, after compensation has finished.
pub async fn migrate(
    source: impl AsRef<Path>,
    title: Option<&str>,
    destination: Destination,
    config: &MigrationConfig,
) -> Result<MigrationReport, MigrationError> {
    let platform: Arc<dyn DocumentPlatform> = Arc::new(FeishuClient::from_config(config)?);
    let pipeline = MigrationPipeline::new(platform, Arc::new(TokioClock), config)?;

    let mut request = MigrationRequest::new(source.as_ref(), destination);
    request.title = title.map(str::to_string);
    pipeline.run(&request).await
}

/// Synchronous wrapper around [`migrate`].
///
/// Creates a temporary tokio runtime internally.
///
/// # Panics
///
/// Panics when called from within an async runtime ("Cannot start a runtime
/// from within a runtime"). Use [`migrate`] from async code.
pub fn migrate_sync(
    source: impl AsRef<Path>,
    title: Option<&str>,
    destination: Destination,
    config: &MigrationConfig,
) -> Result<MigrationReport, MigrationError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| MigrationError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(migrate(source, title, destination, config))
}
