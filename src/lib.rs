//! Resolve package names against the PatchMyPC definitions catalog and
//! download the current installers.
//!
//! A run reads the package list, fetches and parses the catalog once,
//! resolves every package on a worker pool, then either prints the resolved
//! URLs or downloads them concurrently.

pub mod catalog;
pub mod config;
pub mod dispatcher;
pub mod downloader;
pub mod errors;
pub mod request;
pub mod resolver;
mod threadpool;

pub use catalog::{Catalog, Resolution};
pub use config::Config;
pub use downloader::{DownloadEngine, DownloadJob, DownloadResult, HttpDownloader};
pub use errors::{Error, ErrorKind, Result};
pub use request::{PackageRequest, RequestTable};
pub use threadpool::ThreadPool;

use std::{io, sync::Arc};
use tracing::info;

/// Runs the whole pipeline once.
///
/// Returns the download outcome, or `None` for a dry run.
pub fn run(config: &Config) -> Result<Option<DownloadResult>> {
    let mut table = RequestTable::load(&config.input_file, &config.output_dir)?;
    info!(packages = table.len(), "package list loaded");

    let rt = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;

    let client = catalog::client(config.catalog_timeout)?;
    let document = rt.block_on(catalog::fetch(&client, &config.catalog_url))?;
    let catalog = Arc::new(Catalog::parse(&document)?);

    resolver::resolve_all(&mut table, catalog, config.resolve_workers);
    info!(resolved = table.resolved().count(), "resolution finished");

    let engine = HttpDownloader::new(
        config.max_concurrent_downloads,
        config.read_timeout,
        config.display_progress,
    )?;
    let stdout = io::stdout();
    let mut out = stdout.lock();

    rt.block_on(dispatcher::dispatch(&table, config.dry_run, &engine, &mut out))
}
