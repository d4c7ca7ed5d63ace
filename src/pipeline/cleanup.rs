//! Cleanup and compensation of remote artifacts.
//!
//! The platform has no transactions. Instead every remote object the pipeline
//! creates is appended to an [`ArtifactLedger`] the moment it exists. On
//! success the intermediate markdown file is deleted and dropped from the
//! ledger. On failure [`CleanupCoordinator::compensate`] walks the ledger
//! newest-first (a folder is only removed after what was put into it) and
//! deletes each entry, collecting failures instead of raising them.

use crate::error::{CleanupFailure, MigrationError};
use crate::output::UploadedArtifact;
use crate::pipeline::auth::AccessToken;
use crate::platform::DocumentPlatform;
use crate::progress::ProgressCallback;
use std::sync::Arc;
use tracing::{info, warn};

/// Remote artifacts created so far, oldest first.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ArtifactLedger {
    artifacts: Vec<UploadedArtifact>,
}

impl ArtifactLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, artifact: UploadedArtifact) {
        self.artifacts.push(artifact);
    }

    /// Forget `artifact` once it is deleted. Returns whether it was present.
    pub fn remove(&mut self, artifact: &UploadedArtifact) -> bool {
        let before = self.artifacts.len();
        self.artifacts.retain(|a| a != artifact);
        self.artifacts.len() != before
    }

    pub fn artifacts(&self) -> &[UploadedArtifact] {
        &self.artifacts
    }

    pub fn len(&self) -> usize {
        self.artifacts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.artifacts.is_empty()
    }
}

/// Deletes artifacts, strictly or best-effort.
pub struct CleanupCoordinator {
    platform: Arc<dyn DocumentPlatform>,
    progress: Option<ProgressCallback>,
}

impl CleanupCoordinator {
    pub fn new(platform: Arc<dyn DocumentPlatform>) -> Self {
        Self {
            platform,
            progress: None,
        }
    }

    pub fn with_progress(mut self, progress: Option<ProgressCallback>) -> Self {
        self.progress = progress;
        self
    }

    /// Delete one artifact with the delete type of its kind.
    ///
    /// # Errors
    /// [`MigrationError::Delete`] on any remote failure; callers decide
    /// whether to suppress it.
    pub async fn delete_artifact(
        &self,
        token: &AccessToken,
        artifact: &UploadedArtifact,
    ) -> Result<(), MigrationError> {
        self.platform
            .delete(token, &artifact.token, artifact.kind)
            .await
            .map_err(|source| MigrationError::Delete {
                token: artifact.token.clone(),
                kind: artifact.kind,
                source,
            })?;
        info!("Deleted {} {}", artifact.kind, artifact.token);
        Ok(())
    }

    /// Best-effort delete of every ledger entry, newest first.
    ///
    /// Never fails: each failed delete is logged and returned. The ledger is
    /// empty afterwards. `token` is `None` when the credential exchange never
    /// succeeded, in which case nothing can be deleted.
    pub async fn compensate(
        &self,
        token: Option<&AccessToken>,
        ledger: &mut ArtifactLedger,
    ) -> Vec<CleanupFailure> {
        let mut failures = Vec::new();
        if ledger.is_empty() {
            return failures;
        }
        warn!("Compensating: deleting {} remote artifact(s)", ledger.len());

        let pending: Vec<UploadedArtifact> = ledger.artifacts.drain(..).rev().collect();
        for artifact in pending {
            let outcome = match token {
                Some(token) => self
                    .delete_artifact(token, &artifact)
                    .await
                    .map_err(|e| e.to_string()),
                None => Err("no access token available".to_string()),
            };

            if let Some(ref cb) = self.progress {
                cb.on_compensation(&artifact, outcome.as_ref().err().map(String::as_str));
            }
            if let Err(detail) = outcome {
                warn!("Compensation left {} {} behind: {detail}", artifact.kind, artifact.token);
                failures.push(CleanupFailure {
                    token: artifact.token,
                    kind: artifact.kind,
                    detail,
                });
            }
        }

        failures
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::ArtifactKind;

    #[test]
    fn ledger_record_and_remove() {
        let mut ledger = ArtifactLedger::new();
        let md = UploadedArtifact::new("boxcn1", ArtifactKind::MarkdownFile);
        let doc = UploadedArtifact::new("doxcn2", ArtifactKind::Document);
        ledger.record(md.clone());
        ledger.record(doc.clone());
        assert_eq!(ledger.len(), 2);

        assert!(ledger.remove(&md));
        assert!(!ledger.remove(&md));
        assert_eq!(ledger.artifacts(), &[doc]);
    }
}
