//! Image binding: attach local images to the converted document's image
//! placeholder blocks.
//!
//! ## Positional binding
//!
//! The import turns every `![..](..)` into an image block but keeps no link
//! back to the source path. The only correspondence left is order: the k-th
//! reference belongs to the k-th image block. Blocks are listed page by page
//! in document order, placeholders are collected, and the two sequences are
//! zipped. A remote reference consumes its block without an upload, since the
//! importer already filled it.
//!
//! When the counts differ, [`PlaceholderPolicy::Truncate`] binds
//! `min(N, M)` pairs and reports the remainder; [`PlaceholderPolicy::Strict`]
//! refuses before any media is uploaded.
//!
//! ## Per-pair steps
//!
//! 1. read the image and probe its dimensions (local, not retried)
//! 2. upload the bytes as media owned by the block (retried)
//! 3. patch the block with the media token plus width/height (retried)
//! 4. pause `pacing` before the next upload to stay under the rate limit
//!
//! An exhausted retry aborts the whole binding; later pairs are not tried.

use crate::config::{MigrationConfig, PlaceholderPolicy};
use crate::error::{ApiError, BindStep, MigrationError};
use crate::pipeline::auth::AccessToken;
use crate::pipeline::ingest::{ImageReference, ImageSource};
use crate::pipeline::media::ImageAsset;
use crate::platform::{Block, DocumentPlatform, ImagePatch, MediaUpload, MAX_BLOCK_PAGE_SIZE};
use crate::progress::ProgressCallback;
use crate::retry::{retry, Clock, RetryPolicy};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Knobs for the binder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BinderSettings {
    pub page_size: u32,
    pub retry: RetryPolicy,
    pub pacing: Duration,
    pub policy: PlaceholderPolicy,
}

impl Default for BinderSettings {
    fn default() -> Self {
        Self {
            page_size: MAX_BLOCK_PAGE_SIZE,
            retry: RetryPolicy::image_default(),
            pacing: Duration::from_secs(1),
            policy: PlaceholderPolicy::default(),
        }
    }
}

impl BinderSettings {
    pub fn from_config(config: &MigrationConfig) -> Self {
        Self {
            page_size: config.block_page_size,
            retry: config.image_retry,
            pacing: config.image_pacing,
            policy: config.placeholder_policy,
        }
    }
}

/// One image successfully bound to a block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoundImage {
    pub block_id: String,
    pub media_token: String,
    pub path: PathBuf,
    pub width: u32,
    pub height: u32,
}

/// What a binding pass did.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BindOutcome {
    pub references: usize,
    pub placeholders: usize,
    pub bound: Vec<BoundImage>,
    /// Remote references left to the importer's own fetch.
    pub remote: usize,
}

impl BindOutcome {
    pub fn unbound_references(&self) -> usize {
        self.references.saturating_sub(self.bound.len() + self.remote)
    }

    pub fn unused_placeholders(&self) -> usize {
        self.placeholders.saturating_sub(self.bound.len() + self.remote)
    }
}

/// Binds local images to image placeholder blocks in order.
pub struct ImageBinder {
    platform: Arc<dyn DocumentPlatform>,
    clock: Arc<dyn Clock>,
    settings: BinderSettings,
    progress: Option<ProgressCallback>,
}

impl ImageBinder {
    pub fn new(
        platform: Arc<dyn DocumentPlatform>,
        clock: Arc<dyn Clock>,
        settings: BinderSettings,
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

    /// Bind `images` to the placeholders of `document_id`, consuming them.
    pub async fn bind(
        &self,
        token: &AccessToken,
        document_id: &str,
        images: Vec<ImageReference>,
    ) -> Result<BindOutcome, MigrationError> {
        if self.settings.policy == PlaceholderPolicy::Truncate
            && !images.iter().any(ImageReference::is_local)
        {
            debug!("No local images to bind; skipping block listing");
            return Ok(BindOutcome {
                references: images.len(),
                remote: images.len(),
                ..BindOutcome::default()
            });
        }

        let placeholders = self.list_placeholders(token, document_id).await?;
        let references = images.len();
        if references != placeholders.len() {
            match self.settings.policy {
                PlaceholderPolicy::Strict => {
                    return Err(MigrationError::PlaceholderMismatch {
                        references,
                        placeholders: placeholders.len(),
                    });
                }
                PlaceholderPolicy::Truncate => warn!(
                    "Markdown has {} image references but document {} has {} image blocks; pairing the first {}",
                    references,
                    document_id,
                    placeholders.len(),
                    references.min(placeholders.len())
                ),
            }
        }

        let paired = references.min(placeholders.len());
        let total = images[..paired].iter().filter(|i| i.is_local()).count();
        let mut outcome = BindOutcome {
            references,
            placeholders: placeholders.len(),
            bound: Vec::with_capacity(total),
            remote: 0,
        };

        for (block, image) in placeholders.iter().zip(images) {
            let path = match image.source {
                ImageSource::Local(path) => path,
                ImageSource::Remote => {
                    debug!("Block {} keeps remote image {}", block.id, image.target);
                    outcome.remote += 1;
                    continue;
                }
            };
            if !outcome.bound.is_empty() {
                self.clock.sleep(self.settings.pacing).await;
            }

            let index = outcome.bound.len() + 1;
            if let Some(ref cb) = self.progress {
                cb.on_image_start(index, total, &path);
            }

            let bound = self.bind_one(token, document_id, block, &path).await?;
            info!(
                "Bound image {}/{}: {} → block {} ({}x{})",
                index, total, image.target, block.id, bound.width, bound.height
            );
            if let Some(ref cb) = self.progress {
                cb.on_image_bound(index, total, &path, bound.width, bound.height);
            }
            outcome.bound.push(bound);
        }

        Ok(outcome)
    }

    /// All image placeholder blocks of the document, in document order.
    pub async fn list_placeholders(
        &self,
        token: &AccessToken,
        document_id: &str,
    ) -> Result<Vec<Block>, MigrationError> {
        let page_size = self.settings.page_size.clamp(1, MAX_BLOCK_PAGE_SIZE);
        let mut placeholders = Vec::new();
        let mut cursor: Option<String> = None;
        let mut pages = 0;

        loop {
            let page = self
                .platform
                .list_blocks(token, document_id, page_size, cursor.as_deref())
                .await
                .map_err(|source| MigrationError::BlockList {
                    document_id: document_id.to_string(),
                    source,
                })?;
            pages += 1;
            placeholders.extend(page.items.into_iter().filter(Block::is_image_placeholder));

            if !page.has_more {
                break;
            }
            match page.page_token {
                Some(next) => cursor = Some(next),
                None => {
                    return Err(MigrationError::BlockList {
                        document_id: document_id.to_string(),
                        source: ApiError::Malformed("has_more without page_token".into()),
                    })
                }
            }
        }

        debug!(
            "Document {document_id}: {} image placeholders over {pages} page(s)",
            placeholders.len()
        );
        Ok(placeholders)
    }

    async fn bind_one(
        &self,
        token: &AccessToken,
        document_id: &str,
        block: &Block,
        path: &Path,
    ) -> Result<BoundImage, MigrationError> {
        let asset = ImageAsset::load(path).await?;
        let policy = self.settings.retry;
        let clock = self.clock.as_ref();

        let media_token = retry(&policy, clock, "upload media", |_| {
            let upload = MediaUpload {
                file_name: asset.file_name(),
                block_id: block.id.clone(),
                document_id: document_id.to_string(),
                size: asset.size(),
                content: asset.bytes.clone(),
            };
            async move {
                let media = self.platform.upload_media(token, upload).await?;
                if media.is_empty() {
                    return Err(ApiError::Malformed("empty media token".into()));
                }
                Ok(media)
            }
        })
        .await
        .map_err(|e| MigrationError::ImageBind {
            path: path.to_path_buf(),
            block_id: block.id.clone(),
            step: BindStep::UploadMedia,
            attempts: e.attempts,
            source: e.last_error,
        })?;

        let patch = ImagePatch {
            token: media_token.clone(),
            width: asset.width,
            height: asset.height,
        };
        retry(&policy, clock, "patch image block", |_| {
            self.platform
                .replace_image(token, document_id, &block.id, &patch)
        })
        .await
        .map_err(|e| MigrationError::ImageBind {
            path: path.to_path_buf(),
            block_id: block.id.clone(),
            step: BindStep::PatchBlock,
            attempts: e.attempts,
            source: e.last_error,
        })?;

        Ok(BoundImage {
            block_id: block.id.clone(),
            media_token,
            path: path.to_path_buf(),
            width: asset.width,
            height: asset.height,
        })
    }
}
