//! HTTP binding of [`DocumentPlatform`] to the Feishu / Lark open API.
//!
//! Every endpoint answers with the same envelope:
//!
//! ```text
//! { "code": 0, "msg": "success", "data": { ... } }
//! ```
//!
//! A non-zero `code` is a platform error even when the HTTP status is 200,
//! and a 4xx/5xx usually still carries the envelope. [`decode_envelope`]
//! folds both into one [`ApiError`] so callers only look at one place.

use super::{
    ApiError, Block, BlockPage, DocumentPlatform, FileUpload, ImagePatch, ImportRequest,
    ImportStatus, ImportTaskStatus, MediaUpload,
};
use crate::config::MigrationConfig;
use crate::error::MigrationError;
use crate::output::ArtifactKind;
use crate::pipeline::auth::{AccessToken, Credentials};
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::debug;

/// Longest response excerpt kept in an error message.
const BODY_EXCERPT: usize = 300;

/// Feishu / Lark open API client.
#[derive(Debug, Clone)]
pub struct FeishuClient {
    base_url: String,
    http: reqwest::Client,
}

impl FeishuClient {
    /// Create a client for `base_url` (e.g. `https://open.feishu.cn`).
    pub fn new(base_url: impl Into<String>, timeout_secs: u64) -> Result<Self, MigrationError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| MigrationError::Internal(format!("Failed to build HTTP client: {e}")))?;
        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            http,
        })
    }

    pub fn from_config(config: &MigrationConfig) -> Result<Self, MigrationError> {
        Self::new(&config.base_url, config.request_timeout_secs)
    }

    fn url(&self, path: &str) -> String {
        format!("{}/open-apis{}", self.base_url, path)
    }

    async fn send(&self, label: &str, request: reqwest::RequestBuilder) -> Result<Value, ApiError> {
        let response = request
            .send()
            .await
            .map_err(|e| ApiError::Transport(e.to_string()))?;
        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| ApiError::Transport(e.to_string()))?;
        debug!("{label}: HTTP {status}, {} bytes", body.len());
        decode_envelope(status, &body)
    }
}

#[async_trait]
impl DocumentPlatform for FeishuClient {
    async fn exchange_token(&self, credentials: &Credentials) -> Result<AccessToken, ApiError> {
        let request = self
            .http
            .post(self.url("/auth/v3/tenant_access_token/internal"))
            .json(&json!({
                "app_id": credentials.app_id,
                "app_secret": credentials.app_secret,
            }));
        let envelope = self.send("tenant_access_token", request).await?;
        // This endpoint puts the token next to `code`, not under `data`.
        envelope
            .get("tenant_access_token")
            .and_then(Value::as_str)
            .filter(|t| !t.is_empty())
            .map(|t| AccessToken::new(t))
            .ok_or_else(|| ApiError::Malformed("missing tenant_access_token".into()))
    }

    async fn create_folder(
        &self,
        token: &AccessToken,
        name: &str,
        parent: Option<&str>,
    ) -> Result<String, ApiError> {
        let request = self
            .http
            .post(self.url("/drive/v1/files/create_folder"))
            .bearer_auth(token.secret())
            .json(&json!({ "name": name, "folder_token": parent.unwrap_or("") }));
        let data: FolderData = parse_data(self.send("create_folder", request).await?)?;
        non_empty(data.token, "token")
    }

    async fn upload_file(&self, token: &AccessToken, upload: FileUpload) -> Result<String, ApiError> {
        let form = Form::new()
            .text("file_name", upload.file_name.clone())
            .text("parent_type", "explorer")
            .text("parent_node", upload.parent_node)
            .text("size", upload.size.to_string())
            .part("file", Part::bytes(upload.content).file_name(upload.file_name));
        let request = self
            .http
            .post(self.url("/drive/v1/files/upload_all"))
            .bearer_auth(token.secret())
            .multipart(form);
        let data: FileTokenData = parse_data(self.send("upload_all", request).await?)?;
        non_empty(data.file_token, "file_token")
    }

    async fn create_import_task(
        &self,
        token: &AccessToken,
        request: &ImportRequest,
    ) -> Result<String, ApiError> {
        let http_request = self
            .http
            .post(self.url("/drive/v1/import_tasks"))
            .bearer_auth(token.secret())
            .json(request);
        let data: TicketData = parse_data(self.send("import_tasks.create", http_request).await?)?;
        non_empty(data.ticket, "ticket")
    }

    async fn import_task_status(
        &self,
        token: &AccessToken,
        ticket: &str,
    ) -> Result<ImportTaskStatus, ApiError> {
        let request = self
            .http
            .get(self.url(&format!("/drive/v1/import_tasks/{ticket}")))
            .bearer_auth(token.secret());
        let envelope = self.send("import_tasks.get", request).await?;
        parse_import_status(envelope)
    }

    async fn list_blocks(
        &self,
        token: &AccessToken,
        document_id: &str,
        page_size: u32,
        page_token: Option<&str>,
    ) -> Result<BlockPage, ApiError> {
        let mut query: Vec<(&str, String)> = vec![("page_size", page_size.to_string())];
        if let Some(cursor) = page_token {
            query.push(("page_token", cursor.to_string()));
        }
        let request = self
            .http
            .get(self.url(&format!("/docx/v1/documents/{document_id}/blocks")))
            .bearer_auth(token.secret())
            .query(&query);
        let data: BlockListData = parse_data(self.send("blocks.list", request).await?)?;
        Ok(BlockPage {
            items: data
                .items
                .into_iter()
                .map(|b| Block::new(b.block_id, b.block_type))
                .collect(),
            has_more: data.has_more,
            page_token: data.page_token.filter(|t| !t.is_empty()),
        })
    }

    async fn upload_media(&self, token: &AccessToken, upload: MediaUpload) -> Result<String, ApiError> {
        let extra = json!({ "drive_route_token": upload.document_id }).to_string();
        let form = Form::new()
            .text("file_name", upload.file_name.clone())
            .text("parent_type", "docx_image")
            .text("parent_node", upload.block_id)
            .text("size", upload.size.to_string())
            .text("extra", extra)
            .part("file", Part::bytes(upload.content).file_name(upload.file_name));
        let request = self
            .http
            .post(self.url("/drive/v1/medias/upload_all"))
            .bearer_auth(token.secret())
            .multipart(form);
        let data: FileTokenData = parse_data(self.send("medias.upload_all", request).await?)?;
        non_empty(data.file_token, "file_token")
    }

    async fn replace_image(
        &self,
        token: &AccessToken,
        document_id: &str,
        block_id: &str,
        patch: &ImagePatch,
    ) -> Result<(), ApiError> {
        let request = self
            .http
            .patch(self.url(&format!(
                "/docx/v1/documents/{document_id}/blocks/{block_id}"
            )))
            .bearer_auth(token.secret())
            .json(&json!({ "replace_image": patch }));
        self.send("blocks.patch", request).await.map(|_| ())
    }

    async fn delete(
        &self,
        token: &AccessToken,
        file_token: &str,
        kind: ArtifactKind,
    ) -> Result<(), ApiError> {
        let request = self
            .http
            .delete(self.url(&format!("/drive/v1/files/{file_token}")))
            .bearer_auth(token.secret())
            .query(&[("type", kind.delete_type())]);
        self.send("files.delete", request).await.map(|_| ())
    }
}

// ── Envelope handling ────────────────────────────────────────────────────

/// Turn an HTTP status and body into the envelope value or an [`ApiError`].
pub fn decode_envelope(status: u16, body: &str) -> Result<Value, ApiError> {
    let success = (200..300).contains(&status);
    if body.trim().is_empty() {
        return Err(if success {
            ApiError::Malformed("empty response body".into())
        } else {
            ApiError::Http {
                status,
                body: String::new(),
            }
        });
    }

    let value: Value = match serde_json::from_str(body) {
        Ok(v) => v,
        Err(e) if success => return Err(ApiError::Malformed(format!("invalid JSON: {e}"))),
        Err(_) => {
            return Err(ApiError::Http {
                status,
                body: excerpt(body),
            })
        }
    };

    let code = value.get("code").and_then(Value::as_i64);
    match code {
        Some(0) if success => Ok(value),
        Some(code) if code != 0 => Err(ApiError::Platform {
            code,
            msg: value
                .get("msg")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
        }),
        _ if !success => Err(ApiError::Http {
            status,
            body: excerpt(body),
        }),
        _ => Err(ApiError::Malformed("missing envelope code".into())),
    }
}

fn parse_data<T: DeserializeOwned>(envelope: Value) -> Result<T, ApiError> {
    let data = envelope
        .get("data")
        .cloned()
        .ok_or_else(|| ApiError::Malformed("missing data".into()))?;
    serde_json::from_value(data).map_err(|e| ApiError::Malformed(e.to_string()))
}

/// Build an [`ImportTaskStatus`] from an `import_tasks.get` envelope.
pub fn parse_import_status(envelope: Value) -> Result<ImportTaskStatus, ApiError> {
    let data: ImportTaskData = parse_data(envelope.clone())?;
    let result = data.result;
    Ok(ImportTaskStatus {
        status: ImportStatus::from_job_status(result.job_status),
        token: result.token.filter(|t| !t.is_empty()),
        file_token: result.file_token.filter(|t| !t.is_empty()),
        url: result.url.filter(|u| !u.is_empty()),
        error_message: result.job_error_msg.filter(|m| !m.is_empty()),
        raw: envelope,
    })
}

fn non_empty(value: String, field: &str) -> Result<String, ApiError> {
    if value.is_empty() {
        Err(ApiError::Malformed(format!("empty {field}")))
    } else {
        Ok(value)
    }
}

fn excerpt(body: &str) -> String {
    if body.len() <= BODY_EXCERPT {
        return body.to_string();
    }
    let mut end = BODY_EXCERPT;
    while !body.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}\u{2026}", &body[..end])
}

// ── Response payloads ────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct FolderData {
    #[serde(default)]
    token: String,
}

#[derive(Debug, Deserialize)]
struct FileTokenData {
    #[serde(default)]
    file_token: String,
}

#[derive(Debug, Deserialize)]
struct TicketData {
    #[serde(default)]
    ticket: String,
}

#[derive(Debug, Deserialize)]
struct ImportTaskData {
    result: ImportResultData,
}

#[derive(Debug, Deserialize)]
struct ImportResultData {
    job_status: i64,
    #[serde(default)]
    job_error_msg: Option<String>,
    #[serde(default)]
    token: Option<String>,
    #[serde(default)]
    file_token: Option<String>,
    #[serde(default)]
    url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct BlockListData {
    #[serde(default)]
    items: Vec<RawBlock>,
    #[serde(default)]
    has_more: bool,
    #[serde(default)]
    page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawBlock {
    block_id: String,
    block_type: i64,
}
