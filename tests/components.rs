//! Individual pipeline components driven against the scripted platform.

mod common;

use common::*;
use md2feishu::pipeline::auth::{AccessToken, Credentials, TokenProvider};
use md2feishu::pipeline::binder::{BinderSettings, ImageBinder};
use md2feishu::pipeline::cleanup::{ArtifactLedger, CleanupCoordinator};
use md2feishu::pipeline::import::{ImportJobMonitor, ImportSettings};
use md2feishu::pipeline::ingest::MarkdownIngester;
use md2feishu::pipeline::upload::ArtifactUploader;
use md2feishu::platform::{DocumentPlatform, ImportStatus};
use md2feishu::{ArtifactKind, Clock, MigrationError, MigrationProgressCallback, UploadedArtifact};
use std::sync::Arc;
use std::time::Duration;

fn dyn_platform(platform: &Arc<FakePlatform>) -> Arc<dyn DocumentPlatform> {
    Arc::clone(platform) as Arc<dyn DocumentPlatform>
}

fn dyn_clock(clock: &Arc<FakeClock>) -> Arc<dyn Clock> {
    Arc::clone(clock) as Arc<dyn Clock>
}

fn token() -> AccessToken {
    AccessToken::new("t-test")
}

#[tokio::test]
async fn token_provider_caches_after_first_exchange() {
    let platform = Arc::new(FakePlatform::new());
    let tokens = TokenProvider::new(dyn_platform(&platform), Credentials::new("id", "secret"));
    assert!(tokens.cached().is_none());

    let first = tokens.acquire().await.unwrap().clone();
    let second = tokens.acquire().await.unwrap().clone();

    assert_eq!(first, second);
    assert_eq!(platform.count(Op::ExchangeToken), 1);
    assert!(tokens.cached().is_some());
}

#[tokio::test]
async fn token_provider_does_not_cache_failures() {
    let platform = Arc::new(FakePlatform::new());
    platform.fail_next(Op::ExchangeToken, server_error());
    let tokens = TokenProvider::new(dyn_platform(&platform), Credentials::new("id", "secret"));

    let err = tokens.acquire().await.unwrap_err();
    assert!(matches!(err, MigrationError::Auth { .. }));
    assert!(tokens.cached().is_none());

    tokens.acquire().await.unwrap();
    assert_eq!(platform.count(Op::ExchangeToken), 2);
}

#[tokio::test]
async fn upload_refuses_size_mismatch_before_network() {
    let platform = Arc::new(FakePlatform::new());
    let uploader = ArtifactUploader::new(dyn_platform(&platform));

    let err = uploader
        .upload_markdown(&token(), "t", b"hello".to_vec(), 6, FOLDER)
        .await
        .unwrap_err();

    assert!(matches!(err, MigrationError::SizeMismatch { declared: 6, actual: 5 }));
    assert_eq!(platform.count(Op::UploadFile), 0);
}

#[tokio::test]
async fn ingested_bytes_keep_bom_and_match_declared_size() {
    let dir = tempfile::tempdir().unwrap();
    let text = "\u{feff}# Title\n\n![a](a.png)\n";
    let path = write_markdown(dir.path(), "bom.md", text);

    let doc = MarkdownIngester::new().parse(&path).await.unwrap();

    assert_eq!(doc.content, text.as_bytes());
    assert_eq!(doc.declared_size(), text.len() as u64);
    assert_eq!(doc.images.len(), 1);
    assert_eq!(doc.default_title(), "bom");
}

#[tokio::test]
async fn monitor_reports_each_poll() {
    let platform = Arc::new(FakePlatform::new());
    let clock = Arc::new(FakeClock::new());
    platform.script_statuses(vec![status(ImportStatus::Queued), succeeded(DOC)]);
    let progress = Arc::new(RecordingProgress::default());
    let monitor = ImportJobMonitor::new(dyn_platform(&platform), dyn_clock(&clock), ImportSettings::default())
        .with_progress(Some(progress.clone() as Arc<dyn MigrationProgressCallback>));

    let document = monitor.wait_for_document(&token(), TICKET).await.unwrap();

    assert_eq!(document, DOC);
    assert_eq!(
        *progress.polls.lock().unwrap(),
        vec![(1, ImportStatus::Queued), (2, ImportStatus::Succeeded)]
    );
}

#[tokio::test]
async fn monitor_uses_configured_timings() {
    let platform = Arc::new(FakePlatform::new());
    let clock = Arc::new(FakeClock::new());
    platform.script_statuses(vec![status(ImportStatus::Running), status(ImportStatus::Succeeded)]);
    let settings = ImportSettings {
        poll_interval: Duration::from_millis(100),
        settle_delay: Duration::from_millis(300),
        resolve_attempts: 2,
        resolve_interval: Duration::from_millis(50),
        deadline: None,
    };
    let monitor = ImportJobMonitor::new(dyn_platform(&platform), dyn_clock(&clock), settings);

    let err = monitor.wait_for_document(&token(), TICKET).await.unwrap_err();

    assert!(matches!(err, MigrationError::TokenResolution { attempts: 2, .. }));
    assert_eq!(
        clock.sleeps(),
        vec![
            Duration::from_millis(100),
            Duration::from_millis(300),
            Duration::from_millis(50),
        ]
    );
}

#[tokio::test]
async fn binder_lists_placeholders_in_document_order() {
    let platform = Arc::new(FakePlatform::new());
    let clock = Arc::new(FakeClock::new());
    platform.set_blocks(vec![
        image_block("i0"),
        text_block("t1"),
        image_block("i2"),
        image_block("i3"),
    ]);
    let settings = BinderSettings {
        page_size: 3,
        ..BinderSettings::default()
    };
    let binder = ImageBinder::new(dyn_platform(&platform), dyn_clock(&clock), settings);

    let blocks = binder.list_placeholders(&token(), DOC).await.unwrap();

    let ids: Vec<&str> = blocks.iter().map(|b| b.id.as_str()).collect();
    assert_eq!(ids, vec!["i0", "i2", "i3"]);
    assert_eq!(platform.count(Op::ListBlocks), 2);
}

#[tokio::test]
async fn compensation_without_token_reports_every_artifact() {
    let platform = Arc::new(FakePlatform::new());
    let cleanup = CleanupCoordinator::new(dyn_platform(&platform));
    let mut ledger = ArtifactLedger::new();
    ledger.record(UploadedArtifact::new(MD_FILE, ArtifactKind::MarkdownFile));
    ledger.record(UploadedArtifact::new(DOC, ArtifactKind::Document));

    let failures = cleanup.compensate(None, &mut ledger).await;

    assert_eq!(failures.len(), 2);
    assert_eq!(failures[0].token, DOC);
    assert_eq!(failures[1].token, MD_FILE);
    assert!(ledger.is_empty());
    assert!(platform.delete_attempts().is_empty());
}

#[tokio::test]
async fn compensation_continues_past_a_failed_delete() {
    let platform = Arc::new(FakePlatform::new());
    platform.fail_next(Op::Delete, server_error());
    let cleanup = CleanupCoordinator::new(dyn_platform(&platform));
    let mut ledger = ArtifactLedger::new();
    ledger.record(UploadedArtifact::new(NEW_FOLDER, ArtifactKind::Folder));
    ledger.record(UploadedArtifact::new(MD_FILE, ArtifactKind::MarkdownFile));
    ledger.record(UploadedArtifact::new(DOC, ArtifactKind::Document));

    let failures = cleanup.compensate(Some(&token()), &mut ledger).await;

    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].kind, ArtifactKind::Document);
    assert_eq!(
        platform.deletes(),
        vec![
            (MD_FILE.to_string(), ArtifactKind::MarkdownFile),
            (NEW_FOLDER.to_string(), ArtifactKind::Folder),
        ]
    );
}
