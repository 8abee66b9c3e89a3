use crate::{
    downloader::{DownloadEngine, DownloadFailure, DownloadJob, DownloadResult},
    errors::*,
    request::RequestTable,
};
use std::{fs, io::Write, path::Path};
use tracing::{debug, warn};

/// Prints every resolved URL, one per line, in package list order.
pub fn print_urls<W: Write>(table: &RequestTable, out: &mut W) -> Result<()> {
    writeln!(out)?;
    for request in table.resolved() {
        if let Some(url) = request.url() {
            writeln!(out, "{}", url)?;
        }
    }
    Ok(())
}

/// Creates output directories for resolved packages and hands them to
/// `engine` as a single batch.
///
/// A package whose directory can't be created is reported as failed and left
/// out of the batch.
pub async fn download<E>(table: &RequestTable, engine: &E) -> DownloadResult
where
    E: DownloadEngine + ?Sized,
{
    let mut jobs = Vec::new();
    let mut failures = Vec::new();

    for request in table.resolved() {
        let Some(url) = request.url() else { continue };

        if let Err(e) = ensure_dir(request.output_dir()) {
            warn!(package = request.name(), error = %e, "skipping package");
            failures.push(DownloadFailure {
                package: request.name().to_string(),
                url: url.to_string(),
                reason: describe(&e),
            });
            continue;
        }

        jobs.push(DownloadJob {
            package: request.name().to_string(),
            url: url.to_string(),
            directory: request.output_dir().to_path_buf(),
        });
    }

    let total = jobs.len() + failures.len();
    debug!(jobs = jobs.len(), skipped = failures.len(), "dispatching downloads");

    let result = engine.download_all(jobs).await;
    failures.extend_from_slice(result.failures());
    DownloadResult::from_failures(total, failures)
}

fn ensure_dir(dir: &Path) -> Result<()> {
    fs::create_dir_all(dir).chain_err(|| ErrorKind::OutputDir(dir.to_path_buf()))
}

fn describe(e: &Error) -> String {
    e.iter()
        .map(|cause| cause.to_string())
        .collect::<Vec<_>>()
        .join(": ")
}

/// Dry-run prints, otherwise downloads. `None` means nothing was downloaded.
pub async fn dispatch<E, W>(
    table: &RequestTable,
    dry_run: bool,
    engine: &E,
    out: &mut W,
) -> Result<Option<DownloadResult>>
where
    E: DownloadEngine + ?Sized,
    W: Write,
{
    if dry_run {
        print_urls(table, out)?;
        return Ok(None);
    }

    Ok(Some(download(table, engine).await))
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingEngine {
        batches: Mutex<Vec<Vec<DownloadJob>>>,
        fail: Vec<String>,
    }

    #[async_trait]
    impl DownloadEngine for RecordingEngine {
        async fn download_all(&self, jobs: Vec<DownloadJob>) -> DownloadResult {
            let total = jobs.len();
            let failures = jobs
                .iter()
                .filter(|job| self.fail.contains(&job.package))
                .map(|job| DownloadFailure {
                    package: job.package.clone(),
                    url: job.url.clone(),
                    reason: "refused".to_string(),
                })
                .collect();
            self.batches.lock().unwrap().push(jobs);
            DownloadResult::from_failures(total, failures)
        }
    }

    fn resolved_table(root: &Path) -> RequestTable {
        let input = format!(
            "foo\nbar\nbaz | {}\n",
            root.join("custom").join("nested").display()
        );
        let mut table = RequestTable::parse(&input, &root.join("default")).unwrap();
        table.set_resolution("foo", Some("http://x/foo.exe".to_string()));
        table.set_resolution("bar", None);
        table.set_resolution("baz", Some("http://x/baz.msi".to_string()));
        table
    }

    #[tokio::test]
    async fn dry_run_prints_urls_without_engine() {
        let root = tempfile::tempdir().unwrap();
        let table = resolved_table(root.path());
        let engine = RecordingEngine::default();
        let mut out = Vec::new();

        let result = dispatch(&table, true, &engine, &mut out).await.unwrap();

        assert!(result.is_none());
        assert!(engine.batches.lock().unwrap().is_empty());
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "\nhttp://x/foo.exe\nhttp://x/baz.msi\n"
        );
        assert!(!root.path().join("default").exists());
    }

    #[tokio::test]
    async fn download_mode_sends_one_batch_of_resolved_jobs() {
        let root = tempfile::tempdir().unwrap();
        let table = resolved_table(root.path());
        let engine = RecordingEngine::default();
        let mut out = Vec::new();

        let result = dispatch(&table, false, &engine, &mut out).await.unwrap();

        assert_eq!(result, Some(DownloadResult::Success));
        assert!(out.is_empty());

        let batches = engine.batches.lock().unwrap();
        assert_eq!(batches.len(), 1);
        assert_eq!(
            batches[0],
            vec![
                DownloadJob {
                    package: "foo".to_string(),
                    url: "http://x/foo.exe".to_string(),
                    directory: root.path().join("default"),
                },
                DownloadJob {
                    package: "baz".to_string(),
                    url: "http://x/baz.msi".to_string(),
                    directory: root.path().join("custom").join("nested"),
                },
            ]
        );
        assert!(root.path().join("default").is_dir());
        assert!(root.path().join("custom").join("nested").is_dir());
    }

    #[tokio::test]
    async fn existing_directories_are_reused() {
        let root = tempfile::tempdir().unwrap();
        let table = resolved_table(root.path());
        let engine = RecordingEngine::default();

        download(&table, &engine).await;
        download(&table, &engine).await;

        assert_eq!(engine.batches.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn engine_failures_are_returned() {
        let root = tempfile::tempdir().unwrap();
        let table = resolved_table(root.path());
        let engine = RecordingEngine {
            fail: vec!["baz".to_string()],
            ..Default::default()
        };

        let result = download(&table, &engine).await;

        assert_eq!(result.failures().len(), 1);
        assert_eq!(result.failures()[0].package, "baz");
    }

    #[tokio::test]
    async fn unusable_directory_fails_only_its_package() {
        let root = tempfile::tempdir().unwrap();
        let blocker = root.path().join("blocker");
        fs::write(&blocker, b"not a directory").unwrap();
        let input = format!("good\nbad | {}\n", blocker.join("sub").display());
        let mut table = RequestTable::parse(&input, &root.path().join("default")).unwrap();
        table.set_resolution("good", Some("http://x/good.exe".to_string()));
        table.set_resolution("bad", Some("http://x/bad.exe".to_string()));
        let engine = RecordingEngine::default();

        let result = download(&table, &engine).await;

        let batches = engine.batches.lock().unwrap();
        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0].len(), 1);
        assert_eq!(batches[0][0].package, "good");

        assert!(matches!(result, DownloadResult::PartiallySuccess(_)));
        assert_eq!(result.failures().len(), 1);
        let failure = &result.failures()[0];
        assert_eq!(failure.package, "bad");
        assert_eq!(failure.url, "http://x/bad.exe");
        assert!(failure.reason.contains("couldn't create output directory"));
        assert!(failure.reason.contains("sub"));
    }

    #[tokio::test]
    async fn nothing_resolved_still_calls_engine_once() {
        let root = tempfile::tempdir().unwrap();
        let table = RequestTable::parse("missing\n", root.path()).unwrap();
        let engine = RecordingEngine::default();

        let result = download(&table, &engine).await;

        assert!(result.is_success());
        let batches = engine.batches.lock().unwrap();
        assert_eq!(batches.len(), 1);
        assert!(batches[0].is_empty());
    }
}
