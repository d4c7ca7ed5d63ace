//! Shared fakes for the integration tests: a scripted in-memory platform and
//! a clock that records sleeps instead of waiting.

#![allow(dead_code)]

use async_trait::async_trait;
use md2feishu::pipeline::auth::{AccessToken, Credentials};
use md2feishu::platform::{
    Block, BlockPage, DocumentPlatform, FileUpload, ImagePatch, ImportRequest, ImportStatus,
    ImportTaskStatus, MediaUpload, IMAGE_BLOCK_TYPE,
};
use md2feishu::{
    ApiError, ArtifactKind, Clock, Destination, MigrationConfig, MigrationPipeline,
    MigrationProgressCallback, MigrationRequest, MigrationStage, UploadedArtifact,
};
use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

pub const FOLDER: &str = "fldcn_root";
pub const NEW_FOLDER: &str = "fldcn_new";
pub const MD_FILE: &str = "boxcn_md";
pub const TICKET: &str = "ticket_1";
pub const DOC: &str = "doxcn_doc";

/// Remote operations, used to script failures and inspect call order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Op {
    ExchangeToken,
    CreateFolder,
    UploadFile,
    CreateImport,
    ImportStatus,
    ListBlocks,
    UploadMedia,
    ReplaceImage,
    Delete,
}

#[derive(Default)]
struct State {
    calls: Vec<Op>,
    fail_next: HashMap<Op, VecDeque<ApiError>>,
    fail_always: HashMap<Op, ApiError>,
    fail_nth: HashMap<(Op, usize), ApiError>,
    statuses: VecDeque<ImportTaskStatus>,
    last_status: Option<ImportTaskStatus>,
    blocks: Vec<Block>,
    folders: Vec<(String, Option<String>)>,
    uploads: Vec<FileUpload>,
    imports: Vec<ImportRequest>,
    media: Vec<MediaUpload>,
    patches: Vec<(String, ImagePatch)>,
    deletes: Vec<(String, ArtifactKind)>,
    delete_attempts: Vec<(String, ArtifactKind)>,
}

/// In-memory [`DocumentPlatform`] with scripted import statuses, a fixed
/// block list and per-operation failure injection.
pub struct FakePlatform {
    state: Mutex<State>,
}

impl FakePlatform {
    /// An import that succeeds on the first poll with [`DOC`], and a document
    /// without image blocks.
    pub fn new() -> Self {
        let platform = Self {
            state: Mutex::new(State::default()),
        };
        platform.script_statuses(vec![succeeded(DOC)]);
        platform
    }

    /// Statuses returned poll by poll; the last one repeats once exhausted.
    pub fn script_statuses(&self, statuses: Vec<ImportTaskStatus>) {
        let mut state = self.state.lock().unwrap();
        state.statuses = statuses.into();
        state.last_status = None;
    }

    pub fn set_blocks(&self, blocks: Vec<Block>) {
        self.state.lock().unwrap().blocks = blocks;
    }

    /// Fail the next call of `op` with `error`; queue several for several calls.
    pub fn fail_next(&self, op: Op, error: ApiError) {
        self.state
            .lock()
            .unwrap()
            .fail_next
            .entry(op)
            .or_default()
            .push_back(error);
    }

    /// Fail only the `n`-th (1-based) call of `op`.
    pub fn fail_nth(&self, op: Op, n: usize, error: ApiError) {
        self.state.lock().unwrap().fail_nth.insert((op, n), error);
    }

    /// Fail every call of `op`.
    pub fn fail_always(&self, op: Op, error: ApiError) {
        self.state.lock().unwrap().fail_always.insert(op, error);
    }

    pub fn calls(&self) -> Vec<Op> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn count(&self, op: Op) -> usize {
        self.calls().into_iter().filter(|c| *c == op).count()
    }

    pub fn folders(&self) -> Vec<(String, Option<String>)> {
        self.state.lock().unwrap().folders.clone()
    }

    pub fn uploads(&self) -> Vec<FileUpload> {
        self.state.lock().unwrap().uploads.clone()
    }

    pub fn imports(&self) -> Vec<ImportRequest> {
        self.state.lock().unwrap().imports.clone()
    }

    pub fn media(&self) -> Vec<MediaUpload> {
        self.state.lock().unwrap().media.clone()
    }

    pub fn patches(&self) -> Vec<(String, ImagePatch)> {
        self.state.lock().unwrap().patches.clone()
    }

    /// Successful deletes, in call order.
    pub fn deletes(&self) -> Vec<(String, ArtifactKind)> {
        self.state.lock().unwrap().deletes.clone()
    }

    /// Every delete call, failed ones included.
    pub fn delete_attempts(&self) -> Vec<(String, ArtifactKind)> {
        self.state.lock().unwrap().delete_attempts.clone()
    }

    fn enter(&self, op: Op) -> Result<(), ApiError> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(op);
        let nth = state.calls.iter().filter(|c| **c == op).count();
        if let Some(err) = state.fail_nth.remove(&(op, nth)) {
            return Err(err);
        }
        if let Some(err) = state.fail_next.get_mut(&op).and_then(VecDeque::pop_front) {
            return Err(err);
        }
        if let Some(err) = state.fail_always.get(&op) {
            return Err(err.clone());
        }
        Ok(())
    }
}

#[async_trait]
impl DocumentPlatform for FakePlatform {
    async fn exchange_token(&self, _credentials: &Credentials) -> Result<AccessToken, ApiError> {
        self.enter(Op::ExchangeToken)?;
        Ok(AccessToken::new("t-tenant"))
    }

    async fn create_folder(
        &self,
        _token: &AccessToken,
        name: &str,
        parent: Option<&str>,
    ) -> Result<String, ApiError> {
        self.enter(Op::CreateFolder)?;
        self.state
            .lock()
            .unwrap()
            .folders
            .push((name.to_string(), parent.map(str::to_string)));
        Ok(NEW_FOLDER.to_string())
    }

    async fn upload_file(&self, _token: &AccessToken, upload: FileUpload) -> Result<String, ApiError> {
        self.enter(Op::UploadFile)?;
        self.state.lock().unwrap().uploads.push(upload);
        Ok(MD_FILE.to_string())
    }

    async fn create_import_task(
        &self,
        _token: &AccessToken,
        request: &ImportRequest,
    ) -> Result<String, ApiError> {
        self.enter(Op::CreateImport)?;
        self.state.lock().unwrap().imports.push(request.clone());
        Ok(TICKET.to_string())
    }

    async fn import_task_status(
        &self,
        _token: &AccessToken,
        _ticket: &str,
    ) -> Result<ImportTaskStatus, ApiError> {
        self.enter(Op::ImportStatus)?;
        let mut state = self.state.lock().unwrap();
        let next = match state.statuses.pop_front() {
            Some(status) => status,
            None => state
                .last_status
                .clone()
                .unwrap_or_else(|| ImportTaskStatus::bare(ImportStatus::Running)),
        };
        state.last_status = Some(next.clone());
        Ok(next)
    }

    async fn list_blocks(
        &self,
        _token: &AccessToken,
        _document_id: &str,
        page_size: u32,
        page_token: Option<&str>,
    ) -> Result<BlockPage, ApiError> {
        self.enter(Op::ListBlocks)?;
        let state = self.state.lock().unwrap();
        let start: usize = page_token.map(|t| t.parse().unwrap()).unwrap_or(0);
        let end = (start + page_size as usize).min(state.blocks.len());
        let has_more = end < state.blocks.len();
        Ok(BlockPage {
            items: state.blocks[start..end].to_vec(),
            has_more,
            page_token: has_more.then(|| end.to_string()),
        })
    }

    async fn upload_media(&self, _token: &AccessToken, upload: MediaUpload) -> Result<String, ApiError> {
        self.enter(Op::UploadMedia)?;
        let mut state = self.state.lock().unwrap();
        state.media.push(upload);
        Ok(format!("media_{}", state.media.len()))
    }

    async fn replace_image(
        &self,
        _token: &AccessToken,
        _document_id: &str,
        block_id: &str,
        patch: &ImagePatch,
    ) -> Result<(), ApiError> {
        self.enter(Op::ReplaceImage)?;
        self.state
            .lock()
            .unwrap()
            .patches
            .push((block_id.to_string(), patch.clone()));
        Ok(())
    }

    async fn delete(
        &self,
        _token: &AccessToken,
        file_token: &str,
        kind: ArtifactKind,
    ) -> Result<(), ApiError> {
        self.state
            .lock()
            .unwrap()
            .delete_attempts
            .push((file_token.to_string(), kind));
        self.enter(Op::Delete)?;
        self.state
            .lock()
            .unwrap()
            .deletes
            .push((file_token.to_string(), kind));
        Ok(())
    }
}

/// A clock whose `sleep` returns immediately, records the duration and moves
/// `now` forward by it.
pub struct FakeClock {
    origin: Instant,
    elapsed: Mutex<Duration>,
    sleeps: Mutex<Vec<Duration>>,
}

impl FakeClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
            elapsed: Mutex::new(Duration::ZERO),
            sleeps: Mutex::new(Vec::new()),
        }
    }

    pub fn sleeps(&self) -> Vec<Duration> {
        self.sleeps.lock().unwrap().clone()
    }

    pub fn sleep_secs(&self) -> Vec<u64> {
        self.sleeps().iter().map(Duration::as_secs).collect()
    }
}

#[async_trait]
impl Clock for FakeClock {
    fn now(&self) -> Instant {
        self.origin + *self.elapsed.lock().unwrap()
    }

    async fn sleep(&self, duration: Duration) {
        self.sleeps.lock().unwrap().push(duration);
        *self.elapsed.lock().unwrap() += duration;
    }
}

/// Records every callback as a flat event list.
#[derive(Default)]
pub struct RecordingProgress {
    pub stages: Mutex<Vec<MigrationStage>>,
    pub polls: Mutex<Vec<(u32, ImportStatus)>>,
    pub bound: Mutex<Vec<(usize, usize, u32, u32)>>,
    pub compensations: Mutex<Vec<(UploadedArtifact, Option<String>)>>,
}

impl MigrationProgressCallback for RecordingProgress {
    fn on_stage(&self, stage: MigrationStage) {
        self.stages.lock().unwrap().push(stage);
    }

    fn on_import_poll(&self, poll: u32, status: ImportStatus) {
        self.polls.lock().unwrap().push((poll, status));
    }

    fn on_image_bound(&self, index: usize, total: usize, _path: &Path, width: u32, height: u32) {
        self.bound.lock().unwrap().push((index, total, width, height));
    }

    fn on_compensation(&self, artifact: &UploadedArtifact, error: Option<&str>) {
        self.compensations
            .lock()
            .unwrap()
            .push((artifact.clone(), error.map(str::to_string)));
    }
}

// ── Fixtures ─────────────────────────────────────────────────────────────

pub fn succeeded(document: &str) -> ImportTaskStatus {
    let mut status = ImportTaskStatus::bare(ImportStatus::Succeeded);
    status.token = Some(document.to_string());
    status
}

pub fn status(status: ImportStatus) -> ImportTaskStatus {
    ImportTaskStatus::bare(status)
}

pub fn image_block(id: &str) -> Block {
    Block::new(id, IMAGE_BLOCK_TYPE)
}

pub fn text_block(id: &str) -> Block {
    Block::new(id, 2)
}

pub fn server_error() -> ApiError {
    ApiError::Http {
        status: 500,
        body: "internal error".into(),
    }
}

pub fn write_png(dir: &Path, name: &str, width: u32, height: u32) -> PathBuf {
    let path = dir.join(name);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    image::RgbImage::new(width, height).save(&path).unwrap();
    path
}

pub fn write_markdown(dir: &Path, name: &str, text: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, text).unwrap();
    path
}

/// Credentials set, default timings.
pub fn config() -> MigrationConfig {
    MigrationConfig::builder()
        .credentials("cli_test", "secret")
        .build()
        .unwrap()
}

pub fn pipeline(
    platform: &Arc<FakePlatform>,
    clock: &Arc<FakeClock>,
    config: &MigrationConfig,
) -> MigrationPipeline {
    MigrationPipeline::new(
        Arc::clone(platform) as Arc<dyn DocumentPlatform>,
        Arc::clone(clock) as Arc<dyn Clock>,
        config,
    )
    .unwrap()
}

pub fn request(source: &Path) -> MigrationRequest {
    MigrationRequest::new(source, Destination::folder(FOLDER))
}
