//! Output types: the migration report and remote-artifact bookkeeping.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of a remote artifact created during a migration.
///
/// Each kind has its own delete type on the platform: documents cannot be
/// removed with the plain-file delete.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactKind {
    /// The intermediate raw `.md` upload.
    MarkdownFile,
    /// The converted docx document.
    Document,
    /// A destination folder created by this migration.
    Folder,
}

impl ArtifactKind {
    /// The `type` query parameter the platform expects on delete.
    pub fn delete_type(self) -> &'static str {
        match self {
            ArtifactKind::MarkdownFile => "file",
            ArtifactKind::Document => "docx",
            ArtifactKind::Folder => "folder",
        }
    }
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArtifactKind::MarkdownFile => f.write_str("markdown file"),
            ArtifactKind::Document => f.write_str("document"),
            ArtifactKind::Folder => f.write_str("folder"),
        }
    }
}

/// A remote object created by the pipeline, kept for compensation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadedArtifact {
    pub token: String,
    pub kind: ArtifactKind,
}

impl UploadedArtifact {
    pub fn new(token: impl Into<String>, kind: ArtifactKind) -> Self {
        Self {
            token: token.into(),
            kind,
        }
    }
}

/// Result of a successful migration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MigrationReport {
    /// Token of the created docx document.
    pub document_token: String,
    /// Title given to the document.
    pub title: String,
    /// Folder the document was mounted in.
    pub folder_token: String,
    /// Image references found in the markdown, remote ones included.
    pub references: usize,
    /// Image placeholder blocks found in the converted document.
    pub placeholders: usize,
    /// Local images uploaded and bound to a block.
    pub images_bound: usize,
    /// Remote references whose blocks were left to the importer.
    pub remote_images: usize,
    /// References left without a placeholder (truncated).
    pub unbound_references: usize,
    /// Placeholders left without an image (truncated).
    pub unused_placeholders: usize,
    /// Wall-clock time of the whole run.
    pub duration_ms: u64,
}

impl MigrationReport {
    /// True when reference and placeholder counts differed.
    pub fn is_truncated(&self) -> bool {
        self.unbound_references > 0 || self.unused_placeholders > 0
    }
}
