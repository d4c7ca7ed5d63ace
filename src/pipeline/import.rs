//! Import job monitoring: create the markdown → docx job and poll it to a
//! terminal state.
//!
//! ## State machine
//!
//! ```text
//! Created ──▶ Polling ──(Queued|Running, wait poll_interval)──▶ Polling
//!                │
//!                ├──(Failed)──▶ ImportJobFailed
//!                │
//!                └──(Succeeded)──▶ wait settle_delay ──▶ resolve token
//!                                    attempt 1: the response that said Succeeded
//!                                    attempt n: wait resolve_interval, re-poll
//!                                    none after resolve_attempts ──▶ TokenResolution
//! ```
//!
//! ## Token resolution
//!
//! The platform flips `job_status` to success before the document token is
//! reliably populated. The token can show up in the documented `token` field,
//! in an undocumented raw field, or only inside the result URL. A job that
//! succeeded without ever yielding a token is surfaced as
//! [`MigrationError::TokenResolution`], never as an empty token.

use crate::config::MigrationConfig;
use crate::error::MigrationError;
use crate::pipeline::auth::AccessToken;
use crate::platform::{DocumentPlatform, ImportRequest, ImportStatus, ImportTaskStatus};
use crate::progress::ProgressCallback;
use crate::retry::Clock;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Timing knobs for the monitor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImportSettings {
    pub poll_interval: Duration,
    pub settle_delay: Duration,
    pub resolve_attempts: u32,
    pub resolve_interval: Duration,
    pub deadline: Option<Duration>,
}

impl Default for ImportSettings {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(2),
            settle_delay: Duration::from_secs(5),
            resolve_attempts: 5,
            resolve_interval: Duration::from_secs(2),
            deadline: None,
        }
    }
}

impl ImportSettings {
    pub fn from_config(config: &MigrationConfig) -> Self {
        Self {
            poll_interval: config.poll_interval,
            settle_delay: config.settle_delay,
            resolve_attempts: config.resolve_attempts,
            resolve_interval: config.resolve_interval,
            deadline: config.import_deadline,
        }
    }
}

/// Creates import jobs and blocks until they finish.
pub struct ImportJobMonitor {
    platform: Arc<dyn DocumentPlatform>,
    clock: Arc<dyn Clock>,
    settings: ImportSettings,
    progress: Option<ProgressCallback>,
}

impl ImportJobMonitor {
    pub fn new(
        platform: Arc<dyn DocumentPlatform>,
        clock: Arc<dyn Clock>,
        settings: ImportSettings,
    ) -> Self {
        Self {
            platform,
            clock,
            settings,
            progress: None,
        }
    }

    pub fn with_progress(mut self, progress: Option<ProgressCallback>) -> Self {
        self.progress = progress;
        self
    }

    /// Start importing `file_token` as a docx titled `title` in `folder_token`.
    pub async fn create(
        &self,
        token: &AccessToken,
        file_token: &str,
        title: &str,
        folder_token: &str,
    ) -> Result<String, MigrationError> {
        let request = ImportRequest::markdown_to_docx(file_token, title, folder_token);
        let ticket = self
            .platform
            .create_import_task(token, &request)
            .await
            .map_err(|source| MigrationError::ImportCreate {
                file_token: file_token.to_string(),
                source,
            })?;
        info!("Created import task {ticket} for {file_token}");
        Ok(ticket)
    }

    /// Poll `ticket` until it is terminal and return the document token.
    ///
    /// # Errors
    /// - [`MigrationError::ImportStatus`] when a status query fails
    /// - [`MigrationError::ImportJobFailed`] when the job reports failure
    /// - [`MigrationError::ImportDeadlineExceeded`] when a deadline is set and passes
    /// - [`MigrationError::TokenResolution`] when success never yields a token
    pub async fn wait_for_document(
        &self,
        token: &AccessToken,
        ticket: &str,
    ) -> Result<String, MigrationError> {
        let started = self.clock.now();
        let mut polls: u32 = 0;

        loop {
            let status = self
                .platform
                .import_task_status(token, ticket)
                .await
                .map_err(|source| MigrationError::ImportStatus {
                    ticket: ticket.to_string(),
                    source,
                })?;
            polls += 1;
            debug!("Import task {ticket}: poll {polls} → {:?}", status.status);
            if let Some(ref cb) = self.progress {
                cb.on_import_poll(polls, status.status);
            }

            match status.status {
                ImportStatus::Succeeded => return self.resolve(token, ticket, status).await,
                ImportStatus::Failed => {
                    return Err(MigrationError::ImportJobFailed {
                        ticket: ticket.to_string(),
                        message: status
                            .error_message
                            .unwrap_or_else(|| "no error message from platform".to_string()),
                    });
                }
                ImportStatus::Queued | ImportStatus::Running => {
                    if let Some(deadline) = self.settings.deadline {
                        let elapsed = self.clock.now().saturating_duration_since(started);
                        if elapsed >= deadline {
                            return Err(MigrationError::ImportDeadlineExceeded {
                                ticket: ticket.to_string(),
                                secs: deadline.as_secs(),
                            });
                        }
                    }
                    self.clock.sleep(self.settings.poll_interval).await;
                }
            }
        }
    }

    async fn resolve(
        &self,
        token: &AccessToken,
        ticket: &str,
        succeeded: ImportTaskStatus,
    ) -> Result<String, MigrationError> {
        self.clock.sleep(self.settings.settle_delay).await;

        let attempts = self.settings.resolve_attempts.max(1);
        let mut current = Some(succeeded);
        for attempt in 1..=attempts {
            if attempt > 1 {
                self.clock.sleep(self.settings.resolve_interval).await;
                current = match self.platform.import_task_status(token, ticket).await {
                    Ok(status) => Some(status),
                    Err(e) => {
                        warn!("Import task {ticket}: re-poll {attempt}/{attempts} failed — {e}");
                        None
                    }
                };
            }

            if let Some(document) = current.as_ref().and_then(resolve_document_token) {
                info!("Import task {ticket} produced document {document}");
                return Ok(document);
            }
            warn!("Import task {ticket} succeeded but has no document token yet ({attempt}/{attempts})");
        }

        Err(MigrationError::TokenResolution {
            ticket: ticket.to_string(),
            attempts,
        })
    }
}

/// Extract the document token from a succeeded import status.
///
/// Strategies, first hit wins:
/// 1. typed `token`, then typed `file_token`
/// 2. raw `data.result.{token, file_token, obj_token}`
/// 3. last path segment of the result URL, query string removed
pub fn resolve_document_token(status: &ImportTaskStatus) -> Option<String> {
    typed_token(status)
        .or_else(|| raw_token(&status.raw))
        .or_else(|| {
            status
                .url
                .as_deref()
                .or_else(|| raw_result(&status.raw).and_then(|r| r.get("url")).and_then(Value::as_str))
                .and_then(token_from_url)
        })
}

fn typed_token(status: &ImportTaskStatus) -> Option<String> {
    [status.token.as_deref(), status.file_token.as_deref()]
        .into_iter()
        .flatten()
        .find(|t| !t.is_empty())
        .map(str::to_string)
}

fn raw_result(raw: &Value) -> Option<&Value> {
    raw.pointer("/data/result").or_else(|| raw.get("result"))
}

fn raw_token(raw: &Value) -> Option<String> {
    let result = raw_result(raw)?;
    ["token", "file_token", "obj_token"]
        .iter()
        .filter_map(|key| result.get(*key).and_then(Value::as_str))
        .find(|t| !t.is_empty())
        .map(str::to_string)
}

/// `https://x.feishu.cn/docx/doxcnABC?from=import` → `doxcnABC`.
pub fn token_from_url(url: &str) -> Option<String> {
    let without_query = url.split(['?', '#']).next().unwrap_or(url);
    without_query
        .trim_end_matches('/')
        .rsplit('/')
        .next()
        .filter(|segment| !segment.is_empty() && !segment.contains(':'))
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn succeeded() -> ImportTaskStatus {
        ImportTaskStatus::bare(ImportStatus::Succeeded)
    }

    #[test]
    fn typed_token_wins() {
        let mut s = succeeded();
        s.token = Some("doxA".into());
        s.raw = json!({"data": {"result": {"obj_token": "doxB"}}});
        assert_eq!(resolve_document_token(&s).as_deref(), Some("doxA"));
    }

    #[test]
    fn typed_file_token_is_second() {
        let mut s = succeeded();
        s.file_token = Some("doxF".into());
        assert_eq!(resolve_document_token(&s).as_deref(), Some("doxF"));
    }

    #[test]
    fn raw_obj_token_fallback() {
        let mut s = succeeded();
        s.raw = json!({"code": 0, "data": {"result": {"token": "", "obj_token": "doxRaw"}}});
        assert_eq!(resolve_document_token(&s).as_deref(), Some("doxRaw"));
    }

    #[test]
    fn url_fallback_strips_query() {
        let mut s = succeeded();
        s.url = Some("https://acme.feishu.cn/docx/doxUrl?from=import_task".into());
        assert_eq!(resolve_document_token(&s).as_deref(), Some("doxUrl"));
    }

    #[test]
    fn raw_url_fallback() {
        let mut s = succeeded();
        s.raw = json!({"data": {"result": {"url": "https://acme.feishu.cn/docx/doxRawUrl/"}}});
        assert_eq!(resolve_document_token(&s).as_deref(), Some("doxRawUrl"));
    }

    #[test]
    fn nothing_to_find() {
        let mut s = succeeded();
        s.raw = json!({"data": {"result": {"token": ""}}});
        assert_eq!(resolve_document_token(&s), None);
    }

    #[test]
    fn url_without_path_has_no_token() {
        assert_eq!(token_from_url("https://"), None);
        assert_eq!(token_from_url(""), None);
    }
}
