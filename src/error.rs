//! Error types for the md2feishu library.
//!
//! Three distinct error types reflect three distinct failure modes:
//!
//! * [`MigrationError`] — **Fatal**: the migration cannot proceed. Returned
//!   as `Err(MigrationError)` from [`crate::migrate::MigrationPipeline::run`]
//!   *after* compensation has run, so the caller always sees the error that
//!   triggered the rollback, never a rollback error.
//!
//! * [`ApiError`] — **Per call**: one remote request failed. Components decide
//!   whether it is retried locally (image upload/patch, token resolution) or
//!   wrapped as the `#[source]` of a fatal variant.
//!
//! * [`CleanupFailure`] — **Non-fatal**: a compensating delete failed. Logged
//!   and collected by [`crate::pipeline::cleanup::CleanupCoordinator`], but
//!   never surfaced in place of the original error.

use crate::output::ArtifactKind;
use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the md2feishu library.
#[derive(Debug, Error)]
pub enum MigrationError {
    // ── Credential errors ─────────────────────────────────────────────────
    /// The credential exchange returned a non-success status.
    #[error("Failed to obtain a tenant access token: {source}\nCheck FEISHU_APP_ID / FEISHU_APP_SECRET.")]
    Auth {
        #[source]
        source: ApiError,
    },

    // ── Source document errors ────────────────────────────────────────────
    /// Markdown file was not found at the given path.
    #[error("Markdown file not found: '{path}'\nCheck the path exists and is readable.")]
    SourceNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// The file is not valid UTF-8 and has no canonical text form.
    #[error("Markdown file '{path}' is not valid UTF-8 (first invalid byte at offset {offset})")]
    NotUtf8 { path: PathBuf, offset: usize },

    /// Any other I/O failure while reading the source.
    #[error("Failed to read '{path}': {source}")]
    SourceRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Declared upload size differs from the bytes about to be sent.
    #[error("Declared upload size {declared} does not match content length {actual}")]
    SizeMismatch { declared: u64, actual: u64 },

    // ── Upload errors ─────────────────────────────────────────────────────
    /// The raw markdown upload failed.
    #[error("Failed to upload '{file_name}': {source}")]
    Upload {
        file_name: String,
        #[source]
        source: ApiError,
    },

    /// Creating the destination folder failed.
    #[error("Failed to create folder '{name}': {source}")]
    FolderCreate {
        name: String,
        #[source]
        source: ApiError,
    },

    // ── Import errors ─────────────────────────────────────────────────────
    /// The import task could not be created.
    #[error("Failed to create import task for file '{file_token}': {source}")]
    ImportCreate {
        file_token: String,
        #[source]
        source: ApiError,
    },

    /// Polling the import task failed.
    #[error("Failed to query import task '{ticket}': {source}")]
    ImportStatus {
        ticket: String,
        #[source]
        source: ApiError,
    },

    /// The platform reported the import job as failed.
    #[error("Import task '{ticket}' failed: {message}")]
    ImportJobFailed { ticket: String, message: String },

    /// The job did not reach a terminal state within the configured deadline.
    #[error("Import task '{ticket}' did not finish within {secs}s\nIncrease --import-deadline.")]
    ImportDeadlineExceeded { ticket: String, secs: u64 },

    /// The job succeeded but no document token could be extracted.
    #[error(
        "Import task '{ticket}' succeeded but no document token was found after {attempts} attempts"
    )]
    TokenResolution { ticket: String, attempts: u32 },

    // ── Image binding errors ──────────────────────────────────────────────
    /// Listing the converted document's blocks failed.
    #[error("Failed to list blocks of document '{document_id}': {source}")]
    BlockList {
        document_id: String,
        #[source]
        source: ApiError,
    },

    /// Upload or patch of an image failed after all local retries.
    #[error("Failed to {step} for image '{path}' (block {block_id}) after {attempts} attempts: {source}")]
    ImageBind {
        path: PathBuf,
        block_id: String,
        step: BindStep,
        attempts: u32,
        #[source]
        source: ApiError,
    },

    /// A local image could not be read or its dimensions could not be probed.
    #[error("Failed to read image '{path}': {detail}")]
    ImageRead { path: PathBuf, detail: String },

    /// Strict placeholder policy: counts on both sides differ.
    #[error(
        "Document has {placeholders} image placeholders but the markdown has {references} image references"
    )]
    PlaceholderMismatch {
        references: usize,
        placeholders: usize,
    },

    // ── Cleanup errors ────────────────────────────────────────────────────
    /// Deleting a remote artifact failed.
    #[error("Failed to delete {kind} '{token}': {source}")]
    Delete {
        token: String,
        kind: ArtifactKind,
        #[source]
        source: ApiError,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Which half of an image binding failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum BindStep {
    UploadMedia,
    PatchBlock,
}

impl std::fmt::Display for BindStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BindStep::UploadMedia => f.write_str("upload media"),
            BindStep::PatchBlock => f.write_str("patch block"),
        }
    }
}

/// A single remote call failed.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ApiError {
    /// Connection, TLS or timeout failure before a response arrived.
    #[error("transport error: {0}")]
    Transport(String),

    /// Non-success HTTP status without a platform error envelope.
    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },

    /// The response envelope carried a non-zero `code`.
    #[error("platform error code={code}: {msg}")]
    Platform { code: i64, msg: String },

    /// The response could not be parsed or lacked a required field.
    #[error("malformed response: {0}")]
    Malformed(String),
}

/// A non-fatal error for a single compensating delete.
#[derive(Debug, Clone, Error, serde::Serialize, serde::Deserialize)]
#[error("cleanup of {kind} '{token}' failed: {detail}")]
pub struct CleanupFailure {
    pub token: String,
    pub kind: ArtifactKind,
    pub detail: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_resolution_display() {
        let e = MigrationError::TokenResolution {
            ticket: "tkt-1".into(),
            attempts: 5,
        };
        let msg = e.to_string();
        assert!(msg.contains("tkt-1"), "got: {msg}");
        assert!(msg.contains("5 attempts"), "got: {msg}");
    }

    #[test]
    fn image_bind_display_names_step_and_block() {
        let e = MigrationError::ImageBind {
            path: PathBuf::from("img/a.png"),
            block_id: "blk_9".into(),
            step: BindStep::PatchBlock,
            attempts: 3,
            source: ApiError::Platform {
                code: 99991400,
                msg: "rate limited".into(),
            },
        };
        let msg = e.to_string();
        assert!(msg.contains("patch block"), "got: {msg}");
        assert!(msg.contains("blk_9"), "got: {msg}");
        assert!(msg.contains("rate limited"), "got: {msg}");
    }

    #[test]
    fn auth_error_keeps_source() {
        use std::error::Error as _;
        let e = MigrationError::Auth {
            source: ApiError::Platform {
                code: 10003,
                msg: "invalid param".into(),
            },
        };
        assert!(e.source().is_some());
        assert!(e.to_string().contains("FEISHU_APP_ID"));
    }

    #[test]
    fn cleanup_failure_display() {
        let f = CleanupFailure {
            token: "doxcn1".into(),
            kind: ArtifactKind::Document,
            detail: "HTTP 500".into(),
        };
        assert_eq!(f.to_string(), "cleanup of document 'doxcn1' failed: HTTP 500");
    }
}
