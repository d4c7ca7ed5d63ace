//! Progress-callback trait for migration events.
//!
//! Inject an [`Arc<dyn MigrationProgressCallback>`] via
//! [`crate::config::MigrationConfigBuilder::progress_callback`] to receive
//! events as the pipeline moves through its stages. Forward them to a
//! channel, a log or a terminal spinner as needed.
//!
//! # Example
//!
//! ```rust
//! use md2feishu::{MigrationConfig, MigrationProgressCallback, MigrationStage};
//! use std::sync::Arc;
//!
//! struct PrintStages;
//!
//! impl MigrationProgressCallback for PrintStages {
//!     fn on_stage(&self, stage: MigrationStage) {
//!         eprintln!("stage: {stage}");
//!     }
//! }
//!
//! let config = MigrationConfig::builder()
//!     .progress_callback(Arc::new(PrintStages) as Arc<dyn MigrationProgressCallback>)
//!     .build()
//!     .unwrap();
//! ```

use crate::migrate::MigrationStage;
use crate::output::UploadedArtifact;
use crate::platform::ImportStatus;
use std::path::Path;
use std::sync::Arc;

/// Called by the pipeline as a migration progresses.
///
/// All methods have default no-op implementations so callers only override
/// what they care about. A migration is sequential, but several migrations
/// may share one callback, so implementations must be `Send + Sync`.
pub trait MigrationProgressCallback: Send + Sync {
    /// Called on every state transition of the pipeline.
    fn on_stage(&self, stage: MigrationStage) {
        let _ = stage;
    }

    /// Called after each import status poll.
    ///
    /// # Arguments
    /// * `poll`   — 1-based poll count for this job
    /// * `status` — status the platform reported
    fn on_import_poll(&self, poll: u32, status: ImportStatus) {
        let _ = (poll, status);
    }

    /// Called before an image is uploaded.
    ///
    /// # Arguments
    /// * `index` — 1-based pair index
    /// * `total` — pairs that will be bound
    /// * `path`  — local image path
    fn on_image_start(&self, index: usize, total: usize, path: &Path) {
        let _ = (index, total, path);
    }

    /// Called once an image block carries its new media token.
    fn on_image_bound(&self, index: usize, total: usize, path: &Path, width: u32, height: u32) {
        let _ = (index, total, path, width, height);
    }

    /// Called for every compensating delete; `error` is `None` on success.
    fn on_compensation(&self, artifact: &UploadedArtifact, error: Option<&str>) {
        let _ = (artifact, error);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl MigrationProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::MigrationConfig`].
pub type ProgressCallback = Arc<dyn MigrationProgressCallback>;
