mod downloadresult;

pub use downloadresult::{failure_line, DownloadFailure, DownloadResult};

use crate::errors::*;
use async_trait::async_trait;
use bytes::Bytes;
use error_chain::bail;
use futures::{stream, Future, StreamExt};
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use reqwest::{header::CONTENT_DISPOSITION, Client, Response, Url};
use std::{
    collections::HashSet,
    path::{Path, PathBuf},
    sync::Mutex,
    time::Duration,
};
use tokio::{fs::File, io::AsyncWriteExt, time};
use tracing::{debug, info, warn};

const FALLBACK_FILE_NAME: &str = "download";

/// One file to fetch into `directory`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadJob {
    pub package: String,
    pub url: String,
    pub directory: PathBuf,
}

/// Executes a batch of transfers and reports which of them failed.
#[async_trait]
pub trait DownloadEngine: Send + Sync {
    async fn download_all(&self, jobs: Vec<DownloadJob>) -> DownloadResult;
}

/// Destination paths already handed out within one batch.
#[derive(Debug, Default)]
struct Targets(Mutex<HashSet<PathBuf>>);

impl Targets {
    /// Claims `directory/name`, or `directory/<package>-name` when another job
    /// in the batch already writes the plain name.
    fn claim(&self, directory: &Path, name: &str, package: &str) -> Result<PathBuf> {
        let mut taken = self.0.lock().unwrap_or_else(|poisoned| poisoned.into_inner());

        let preferred = directory.join(name);
        if taken.insert(preferred.clone()) {
            return Ok(preferred);
        }

        let prefixed = directory.join(format!("{}-{}", package, name));
        if taken.insert(prefixed.clone()) {
            debug!(package, path = %prefixed.display(), "file name already taken in batch");
            return Ok(prefixed);
        }

        bail!(ErrorKind::DuplicateTarget(preferred))
    }
}

/// reqwest-backed engine with a concurrency cap and a per-read timeout.
pub struct HttpDownloader {
    client: Client,
    concurrency: usize,
    read_timeout: Duration,
    display_progress: bool,
}

impl HttpDownloader {
    pub fn new(concurrency: usize, read_timeout: Duration, display_progress: bool) -> Result<HttpDownloader> {
        let client = Client::builder()
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .connect_timeout(read_timeout)
            .build()?;

        Ok(HttpDownloader {
            client,
            concurrency: concurrency.max(1),
            read_timeout,
            display_progress,
        })
    }

    async fn download_file(
        &self,
        job: &DownloadJob,
        targets: &Targets,
        progress: Option<&MultiProgress>,
    ) -> Result<PathBuf> {
        let response = self
            .within(&job.url, self.client.get(&job.url).send())
            .await?
            .error_for_status()?;

        let disposition = response
            .headers()
            .get(CONTENT_DISPOSITION)
            .and_then(|value| value.to_str().ok());
        let dest_path = targets.claim(
            &job.directory,
            &file_name(disposition, response.url()),
            &job.package,
        )?;
        debug!(package = %job.package, path = %dest_path.display(), "writing");

        let bar = progress.map(|multi| progress_bar(multi, &job.package, response.content_length()));
        let written = self.write_body(&job.url, response, &dest_path, bar.as_ref()).await;

        if let Some(bar) = bar {
            match &written {
                Ok(_) => bar.finish_with_message(format!("{} done", job.package)),
                Err(_) => bar.abandon_with_message(format!("{} failed", job.package)),
            }
        }

        written.map(|_| dest_path)
    }

    async fn write_body(
        &self,
        url: &str,
        mut response: Response,
        dest_path: &Path,
        bar: Option<&ProgressBar>,
    ) -> Result<u64> {
        let mut dest = File::create(dest_path).await?;
        let mut written = 0u64;

        loop {
            let chunk: Option<Bytes> = self.within(url, response.chunk()).await?;
            let Some(chunk) = chunk else { break };

            dest.write_all(&chunk).await?;
            written += chunk.len() as u64;
            if let Some(bar) = bar {
                bar.inc(chunk.len() as u64);
            }
        }

        dest.flush().await?;
        Ok(written)
    }

    /// Bounds a single read by the configured timeout.
    async fn within<T, F>(&self, url: &str, read: F) -> Result<T>
    where
        F: Future<Output = reqwest::Result<T>>,
    {
        match time::timeout(self.read_timeout, read).await {
            Ok(result) => Ok(result?),
            Err(_) => bail!(ErrorKind::ReadTimeout(url.to_string(), self.read_timeout.as_secs())),
        }
    }
}

#[async_trait]
impl DownloadEngine for HttpDownloader {
    async fn download_all(&self, jobs: Vec<DownloadJob>) -> DownloadResult {
        let total = jobs.len();
        let progress = self.display_progress.then(MultiProgress::new);
        let progress = progress.as_ref();
        let targets = Targets::default();
        let targets = &targets;
        info!(files = total, concurrency = self.concurrency, "starting downloads");

        let failures: Vec<DownloadFailure> = stream::iter(jobs)
            .map(move |job| async move {
                match self.download_file(&job, targets, progress).await {
                    Ok(path) => {
                        info!(package = %job.package, path = %path.display(), "downloaded");
                        None
                    }
                    Err(e) => {
                        warn!(package = %job.package, url = %job.url, error = %e, "download failed");
                        Some(DownloadFailure {
                            package: job.package,
                            url: job.url,
                            reason: e.to_string(),
                        })
                    }
                }
            })
            .buffer_unordered(self.concurrency)
            .filter_map(|failure| async move { failure })
            .collect()
            .await;

        DownloadResult::from_failures(total, failures)
    }
}

fn progress_bar(multi: &MultiProgress, package: &str, length: Option<u64>) -> ProgressBar {
    let bar = match length {
        Some(length) => ProgressBar::new(length),
        None => ProgressBar::no_length(),
    };
    let bar = multi.add(bar);
    let style = ProgressStyle::with_template(
        "{msg:24} [{elapsed_precise}] [{bar:30.cyan/blue}] {bytes}/{total_bytes} ({bytes_per_sec})",
    )
    .map(|style| style.progress_chars("=>-"))
    .unwrap_or_else(|_| ProgressStyle::default_bar());
    bar.set_style(style);
    bar.set_message(package.to_string());
    bar
}

/// Name for the downloaded file: `Content-Disposition` first, then the last
/// path segment of the final URL.
fn file_name(disposition: Option<&str>, url: &Url) -> String {
    disposition
        .and_then(disposition_file_name)
        .or_else(|| {
            url.path_segments()
                .and_then(|segments| segments.last())
                .map(str::to_string)
        })
        .and_then(|name| base_name(&name))
        .unwrap_or_else(|| FALLBACK_FILE_NAME.to_string())
}

fn disposition_file_name(value: &str) -> Option<String> {
    value
        .split(';')
        .map(str::trim)
        .find_map(|param| param.strip_prefix("filename="))
        .map(|name| name.trim_matches('"').to_string())
}

fn base_name(name: &str) -> Option<String> {
    name.rsplit(['/', '\\'])
        .next()
        .map(str::trim)
        .filter(|base| !base.is_empty() && *base != "." && *base != "..")
        .map(str::to_string)
}
