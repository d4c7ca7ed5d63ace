//! The remote document platform, specified at its interface.
//!
//! [`DocumentPlatform`] is the single seam between the pipeline and the
//! network. [`http::FeishuClient`] binds it to the Feishu / Lark open API;
//! tests bind it to an in-memory script. Every method takes the bearer token
//! explicitly; the client itself holds no credentials.

pub mod http;

pub use crate::error::ApiError;

use crate::output::ArtifactKind;
use crate::pipeline::auth::{AccessToken, Credentials};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Block type the platform assigns to image blocks.
pub const IMAGE_BLOCK_TYPE: i64 = 27;

/// Maximum page size accepted by the block listing endpoint.
pub const MAX_BLOCK_PAGE_SIZE: u32 = 500;

/// Operations the migration needs from the remote platform.
#[async_trait]
pub trait DocumentPlatform: Send + Sync {
    /// Exchange app credentials for a bearer token.
    async fn exchange_token(&self, credentials: &Credentials) -> Result<AccessToken, ApiError>;

    /// Create a folder; `parent` of `None` means the root folder.
    async fn create_folder(
        &self,
        token: &AccessToken,
        name: &str,
        parent: Option<&str>,
    ) -> Result<String, ApiError>;

    /// Upload a raw file into a folder. Returns the file token.
    async fn upload_file(&self, token: &AccessToken, upload: FileUpload) -> Result<String, ApiError>;

    /// Start an asynchronous import job. Returns the job ticket.
    async fn create_import_task(
        &self,
        token: &AccessToken,
        request: &ImportRequest,
    ) -> Result<String, ApiError>;

    /// Query the current state of an import job.
    async fn import_task_status(
        &self,
        token: &AccessToken,
        ticket: &str,
    ) -> Result<ImportTaskStatus, ApiError>;

    /// List one page of a document's blocks in document order.
    async fn list_blocks(
        &self,
        token: &AccessToken,
        document_id: &str,
        page_size: u32,
        page_token: Option<&str>,
    ) -> Result<BlockPage, ApiError>;

    /// Upload media owned by a document block. Returns the media token.
    async fn upload_media(&self, token: &AccessToken, upload: MediaUpload) -> Result<String, ApiError>;

    /// Point an image block at an uploaded media token.
    async fn replace_image(
        &self,
        token: &AccessToken,
        document_id: &str,
        block_id: &str,
        patch: &ImagePatch,
    ) -> Result<(), ApiError>;

    /// Delete a remote object with the delete type matching `kind`.
    async fn delete(
        &self,
        token: &AccessToken,
        file_token: &str,
        kind: ArtifactKind,
    ) -> Result<(), ApiError>;
}

/// A raw file upload into a drive folder.
#[derive(Debug, Clone)]
pub struct FileUpload {
    pub file_name: String,
    pub parent_node: String,
    /// Declared size; must equal `content.len()`.
    pub size: u64,
    pub content: Vec<u8>,
}

/// A media upload bound to a docx block.
#[derive(Debug, Clone)]
pub struct MediaUpload {
    pub file_name: String,
    pub block_id: String,
    /// Document the media belongs to; deleting it deletes the media.
    pub document_id: String,
    pub size: u64,
    pub content: Vec<u8>,
}

/// Parameters of an import job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImportRequest {
    pub file_extension: String,
    pub file_token: String,
    /// Target document type, `docx`.
    #[serde(rename = "type")]
    pub target_type: String,
    pub file_name: String,
    pub point: MountPoint,
}

/// Where the converted document is mounted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MountPoint {
    /// 1 = drive folder.
    pub mount_type: u8,
    pub mount_key: String,
}

impl ImportRequest {
    /// Import a markdown file as a docx document into `folder_token`.
    pub fn markdown_to_docx(file_token: &str, title: &str, folder_token: &str) -> Self {
        Self {
            file_extension: "md".to_string(),
            file_token: file_token.to_string(),
            target_type: "docx".to_string(),
            file_name: title.to_string(),
            point: MountPoint {
                mount_type: 1,
                mount_key: folder_token.to_string(),
            },
        }
    }
}

/// Lifecycle state of an import job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ImportStatus {
    Queued,
    Running,
    Succeeded,
    Failed,
}

impl ImportStatus {
    /// Map the platform's numeric `job_status`.
    pub fn from_job_status(code: i64) -> Self {
        match code {
            0 => ImportStatus::Queued,
            1 => ImportStatus::Running,
            2 => ImportStatus::Succeeded,
            _ => ImportStatus::Failed,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, ImportStatus::Succeeded | ImportStatus::Failed)
    }
}

/// One poll of an import job.
///
/// The typed fields are what the platform documents; `raw` is the full
/// response body, kept because the document token does not always appear in
/// the documented field right after the job reports success.
#[derive(Debug, Clone)]
pub struct ImportTaskStatus {
    pub status: ImportStatus,
    pub token: Option<String>,
    pub file_token: Option<String>,
    pub url: Option<String>,
    pub error_message: Option<String>,
    pub raw: serde_json::Value,
}

impl ImportTaskStatus {
    /// A status with only `status` set; handy for scripted platforms.
    pub fn bare(status: ImportStatus) -> Self {
        Self {
            status,
            token: None,
            file_token: None,
            url: None,
            error_message: None,
            raw: serde_json::Value::Null,
        }
    }
}

/// Kind of a document block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BlockKind {
    ImagePlaceholder,
    Other(i64),
}

impl BlockKind {
    pub fn from_block_type(block_type: i64) -> Self {
        if block_type == IMAGE_BLOCK_TYPE {
            BlockKind::ImagePlaceholder
        } else {
            BlockKind::Other(block_type)
        }
    }
}

/// A structural unit of a converted document. Position is list order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    pub id: String,
    pub kind: BlockKind,
}

impl Block {
    pub fn new(id: impl Into<String>, block_type: i64) -> Self {
        Self {
            id: id.into(),
            kind: BlockKind::from_block_type(block_type),
        }
    }

    pub fn is_image_placeholder(&self) -> bool {
        self.kind == BlockKind::ImagePlaceholder
    }
}

/// One page of a block listing.
#[derive(Debug, Clone, Default)]
pub struct BlockPage {
    pub items: Vec<Block>,
    pub has_more: bool,
    pub page_token: Option<String>,
}

/// New image token and its pixel size for a `replace_image` patch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImagePatch {
    pub token: String,
    pub width: u32,
    pub height: u32,
}
