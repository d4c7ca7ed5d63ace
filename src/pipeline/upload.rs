//! Artifact upload: push the raw markdown into a drive folder.

use crate::error::MigrationError;
use crate::pipeline::auth::AccessToken;
use crate::platform::{DocumentPlatform, FileUpload};
use std::sync::Arc;
use tracing::{debug, info};

/// Uploads raw files and creates folders.
pub struct ArtifactUploader {
    platform: Arc<dyn DocumentPlatform>,
}

impl ArtifactUploader {
    pub fn new(platform: Arc<dyn DocumentPlatform>) -> Self {
        Self { platform }
    }

    /// Upload `content` as `<title>.md` under `folder_token`.
    ///
    /// `size` is the declared size and must equal `content.len()`; a mismatch
    /// is refused locally instead of being sent and rejected remotely.
    ///
    /// # Errors
    /// [`MigrationError::SizeMismatch`] before any network call,
    /// [`MigrationError::Upload`] on any remote failure.
    pub async fn upload_markdown(
        &self,
        token: &AccessToken,
        title: &str,
        content: Vec<u8>,
        size: u64,
        folder_token: &str,
    ) -> Result<String, MigrationError> {
        let actual = content.len() as u64;
        if size != actual {
            return Err(MigrationError::SizeMismatch {
                declared: size,
                actual,
            });
        }

        let file_name = format!("{title}.md");
        debug!("Uploading {file_name} ({size} bytes) to folder {folder_token}");
        let file_token = self
            .platform
            .upload_file(
                token,
                FileUpload {
                    file_name: file_name.clone(),
                    parent_node: folder_token.to_string(),
                    size,
                    content,
                },
            )
            .await
            .map_err(|source| MigrationError::Upload {
                file_name: file_name.clone(),
                source,
            })?;

        info!("Uploaded {file_name} as {file_token}");
        Ok(file_token)
    }

    /// Create a folder named `name` under `parent` (root when `None`).
    pub async fn create_folder(
        &self,
        token: &AccessToken,
        name: &str,
        parent: Option<&str>,
    ) -> Result<String, MigrationError> {
        let folder_token = self
            .platform
            .create_folder(token, name, parent)
            .await
            .map_err(|source| MigrationError::FolderCreate {
                name: name.to_string(),
                source,
            })?;
        info!("Created folder '{name}' as {folder_token}");
        Ok(folder_token)
    }
}
