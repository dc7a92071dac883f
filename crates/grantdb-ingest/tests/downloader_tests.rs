mod common;

use std::time::Duration;

use axum::body::Body;
use axum::http::StatusCode;
use axum::routing::get;
use axum::Router;
use tokio_util::sync::CancellationToken;

use grantdb_core::config::DownloadSettings;
use grantdb_ingest::{Downloader, IngestError};

fn router(payload: Vec<u8>) -> Router {
    Router::new()
        .route("/files/grants.zip", get(move || {
            let payload = payload.clone();
            async move { payload }
        }))
        .route("/gone.zip", get(|| async { StatusCode::NOT_FOUND }))
        .route("/stalled.zip", get(|| async {
            Body::from_stream(futures::stream::pending::<Result<Vec<u8>, std::io::Error>>())
        }))
}

#[tokio::test]
async fn fetch_writes_body_under_staging() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir()?;
    let payload: Vec<u8> = (0..200_000u32).map(|i| (i % 251) as u8).collect();
    let addr = common::serve(router(payload.clone())).await;
    let downloader = Downloader::new(&DownloadSettings::default(), tmp.path())?;

    let url = format!("http://{addr}/files/grants.zip");
    downloader.probe(&url).await?;
    let path = downloader.fetch(&CancellationToken::new(), &url).await?;

    assert_eq!(path, downloader.target_path(&url)?);
    assert_eq!(path.file_name().and_then(|n| n.to_str()), Some("grants.zip"));
    assert_eq!(std::fs::read(&path)?, payload);
    Ok(())
}

#[tokio::test]
async fn non_success_status_is_an_error() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir()?;
    let addr = common::serve(router(Vec::new())).await;
    let downloader = Downloader::new(&DownloadSettings::default(), tmp.path())?;
    let url = format!("http://{addr}/gone.zip");

    assert!(matches!(downloader.probe(&url).await, Err(IngestError::Status { status: 404, .. })));
    let err = downloader.fetch(&CancellationToken::new(), &url).await.expect_err("404");
    assert!(matches!(err, IngestError::Status { status: 404, .. }));
    assert!(!downloader.target_path(&url)?.exists());
    Ok(())
}

#[tokio::test]
async fn cancellation_aborts_a_stalled_transfer() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir()?;
    let addr = common::serve(router(Vec::new())).await;
    let downloader = Downloader::new(&DownloadSettings::default(), tmp.path())?;
    let url = format!("http://{addr}/stalled.zip");

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        trigger.cancel();
    });
    let err = tokio::time::timeout(Duration::from_secs(5), downloader.fetch(&cancel, &url)).await?.expect_err("cancelled");
    assert!(matches!(err, IngestError::Cancelled));

    let dest = downloader.target_path(&url)?;
    assert!(!dest.exists());
    assert!(!dest.with_extension("zip.part").exists());
    Ok(())
}

#[tokio::test]
async fn dropping_a_fetch_removes_its_partial_file() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir()?;
    let addr = common::serve(router(Vec::new())).await;
    let downloader = Downloader::new(&DownloadSettings::default(), tmp.path())?;
    let url = format!("http://{addr}/stalled.zip");
    let partial = downloader.target_path(&url)?.with_extension("zip.part");

    // a task deadline drops the future without cancelling its token
    let cancel = CancellationToken::new();
    let mut fetch = Box::pin(downloader.fetch(&cancel, &url));
    for _ in 0..100 {
        assert!(tokio::time::timeout(Duration::from_millis(20), &mut fetch).await.is_err());
        if partial.exists() {
            break;
        }
    }
    assert!(partial.exists());
    drop(fetch);
    assert!(!partial.exists());
    Ok(())
}

#[tokio::test]
async fn unreachable_host_is_a_transport_error() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir()?;
    let downloader = Downloader::new(&DownloadSettings::default(), tmp.path())?;
    // port 9 (discard) on localhost is almost never listening
    let err = downloader.probe("http://127.0.0.1:9/none.zip").await.expect_err("refused");
    assert!(matches!(err, IngestError::Transport(_)));
    Ok(())
}
