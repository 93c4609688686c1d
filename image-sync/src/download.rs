// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Downloads one boot-resource file into the local store, resuming
//! partial transfers and reporting progress back to the orchestrator.

use async_trait::async_trait;
use image_common::DOWNLOAD_TIMEOUT;
use image_common::REPORT_INTERVAL;
use image_common::ResourceDownloadParam;
use image_store::ImageStore;
use image_store::LocalBootResourceFile;
use image_store::LockFile;
use image_store::StoreError;
use slog::Logger;
use slog::debug;
use slog::error;
use slog::info;
use std::time::Duration;
use thiserror::Error;
use tokio::time::Instant;

/// How long to wait between attempts to take the per-file lock.
pub(crate) const LOCK_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Progress feedback to whatever drives the download: a periodic
/// absolute byte count per resource-file record, plus a liveness signal
/// emitted at least once per chunk.
///
/// The production implementation posts to the region API; tests use a
/// recording double.
#[async_trait]
pub trait ProgressReporter: Send + Sync {
    async fn report_progress(
        &self,
        rfile_ids: &[i64],
        size: u64,
    ) -> anyhow::Result<()>;

    async fn heartbeat(&self, msg: &str);
}

#[derive(Debug, Error)]
pub enum DownloadError {
    #[error("no download source for {filename}")]
    NoSource { filename: String },
    #[error("fetching {url}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("building http client")]
    Client(#[source] reqwest::Error),
    #[error("progress report failed")]
    Report(#[source] anyhow::Error),
}

/// Fetches the file described by `param` into the store.
///
/// Returns `Ok(true)` when the file is on disk and valid, `Ok(false)`
/// when the disk filled up (the orchestrator decides whether to retry
/// after freeing space), and an error for everything else.  `attempt`
/// rotates through `source_list`, so consecutive retries spread over the
/// available sources.
pub async fn download_resource_file(
    log: &Logger,
    store: &ImageStore,
    param: &ResourceDownloadParam,
    attempt: usize,
    reporter: &dyn ProgressReporter,
) -> Result<bool, DownloadError> {
    store.ensure_root().await.map_err(StoreError::from)?;
    let lfile = store.resource_file(
        &param.sha256,
        &param.filename_on_disk,
        param.total_size,
    );

    // One worker per file at a time; the lock also covers deletion.
    let _lock = loop {
        match LockFile::try_acquire(lfile.path()).map_err(StoreError::from)?
        {
            Some(lock) => break lock,
            None => {
                reporter.heartbeat("waiting for file lock").await;
                tokio::time::sleep(LOCK_POLL_INTERVAL).await;
            }
        }
    };

    if lfile.valid().await? {
        debug!(
            log, "file already in the store, skipping download";
            "filename" => &param.filename_on_disk,
        );
        report(reporter, param, lfile.size().await).await?;
        extract_all(&lfile, param, reporter).await?;
        return Ok(true);
    }

    let url = source_url(param, attempt)?;
    info!(
        log, "downloading boot resource file";
        "filename" => &param.filename_on_disk,
        "url" => &url,
    );
    match stream_to_store(&lfile, param, &url, reporter).await {
        Ok(()) => {
            report(reporter, param, param.total_size).await?;
            extract_all(&lfile, param, reporter).await?;
            Ok(true)
        }
        Err(DownloadError::Store(err)) => {
            settle_store_failure(log, &lfile, param, reporter, err).await
        }
        Err(err) => Err(err),
    }
}

/// Streams `url` into the store file from its current offset.
async fn stream_to_store(
    lfile: &LocalBootResourceFile,
    param: &ResourceDownloadParam,
    url: &str,
    reporter: &dyn ProgressReporter,
) -> Result<(), DownloadError> {
    let client = build_client(param)?;
    let mut writer = lfile.store().await?;

    let mut request = client.get(url);
    if writer.position() > 0 {
        request = request.header(
            reqwest::header::RANGE,
            format!("bytes={}-", writer.position()),
        );
    }
    let transport = |source: reqwest::Error| DownloadError::Transport {
        url: url.to_string(),
        source,
    };
    let mut response = request
        .send()
        .await
        .map_err(transport)?
        .error_for_status()
        .map_err(transport)?;

    let mut last_report = Instant::now();
    while let Some(chunk) = response.chunk().await.map_err(transport)? {
        reporter.heartbeat("downloading chunk").await;
        writer.write(&chunk).await?;
        if last_report.elapsed() >= REPORT_INTERVAL {
            report(reporter, param, writer.position()).await?;
            last_report = Instant::now();
        }
    }
    writer.commit().await?;
    Ok(())
}

/// Store-failure disposition shared by the streaming path: a full disk
/// aborts cleanly (unlink, report zero, let the orchestrator decide),
/// an integrity failure reports zero and surfaces, anything else
/// surfaces untouched.
async fn settle_store_failure(
    log: &Logger,
    lfile: &LocalBootResourceFile,
    param: &ResourceDownloadParam,
    reporter: &dyn ProgressReporter,
    error: StoreError,
) -> Result<bool, DownloadError> {
    match error {
        StoreError::AllocationFail => {
            error!(
                log, "out of disk space while syncing boot resources";
                "filename" => &param.filename_on_disk,
            );
            lfile.unlink().await?;
            report(reporter, param, 0).await?;
            Ok(false)
        }
        err if err.is_integrity_failure() => {
            // The store already unlinked the offending file.
            report(reporter, param, 0).await?;
            Err(err.into())
        }
        err => Err(err.into()),
    }
}

fn build_client(
    param: &ResourceDownloadParam,
) -> Result<reqwest::Client, DownloadError> {
    // Peer regions serve over TLS with self-signed certificates.
    let mut builder = reqwest::Client::builder()
        .timeout(DOWNLOAD_TIMEOUT)
        .danger_accept_invalid_certs(true);
    if let Some(proxy) = &param.http_proxy {
        builder = builder
            .proxy(reqwest::Proxy::all(proxy).map_err(DownloadError::Client)?);
    }
    builder.build().map_err(DownloadError::Client)
}

fn source_url(
    param: &ResourceDownloadParam,
    attempt: usize,
) -> Result<String, DownloadError> {
    if param.source_list.is_empty() {
        return Err(DownloadError::NoSource {
            filename: param.filename_on_disk.clone(),
        });
    }
    Ok(param.source_list[attempt % param.source_list.len()].clone())
}

async fn extract_all(
    lfile: &LocalBootResourceFile,
    param: &ResourceDownloadParam,
    reporter: &dyn ProgressReporter,
) -> Result<(), DownloadError> {
    for target in &param.extract_paths {
        lfile.extract_file(target).await?;
        reporter.heartbeat("extracting archive").await;
    }
    Ok(())
}

async fn report(
    reporter: &dyn ProgressReporter,
    param: &ResourceDownloadParam,
    size: u64,
) -> Result<(), DownloadError> {
    reporter
        .report_progress(&param.rfile_ids, size)
        .await
        .map_err(DownloadError::Report)
}
