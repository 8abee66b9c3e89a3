use clap::Parser;
use once_cell::sync::Lazy;
use std::{env, path::PathBuf, thread, time::Duration};

pub const CATALOG_URL: &str = "https://patchmypc.com/freeupdater/definitions/definitions.xml";

pub static DEFAULT_OUTPUT_DIR: Lazy<PathBuf> = Lazy::new(|| {
    env::current_dir()
        .unwrap_or_else(|_| PathBuf::from("."))
        .join("patchmypcfree")
});

/// Resolve a list of packages against the PatchMyPC catalog and download them.
#[derive(Debug, Parser)]
#[command(version, about)]
pub struct Cli {
    /// Package list, one `name` or `name | directory` per line
    #[arg(short = 'i', long)]
    pub input_file: PathBuf,

    /// Output directory (default ./patchmypcfree/)
    #[arg(short = 'o', long)]
    pub output_dir: Option<PathBuf>,

    /// Do not download anything, simply print download URLs
    #[arg(short = 's', long)]
    pub do_not_download: bool,

    /// Show download progress
    #[arg(short = 'd', long)]
    pub display: bool,

    /// Maximum simultaneous downloads
    #[arg(short = 'c', long, default_value_t = 10, value_parser = positive)]
    pub concurrent: usize,

    /// Per-read download timeout in seconds
    #[arg(short = 't', long, default_value_t = 30, value_parser = positive_secs)]
    pub timeout: u64,

    /// Catalog location
    #[arg(long, default_value = CATALOG_URL)]
    pub catalog_url: String,

    /// Catalog fetch timeout in seconds
    #[arg(long, default_value_t = 60, value_parser = positive_secs)]
    pub catalog_timeout: u64,

    /// Resolution worker threads (default: available parallelism)
    #[arg(long, value_parser = positive)]
    pub resolve_workers: Option<usize>,
}

fn positive(s: &str) -> std::result::Result<usize, String> {
    match s.parse::<usize>() {
        Ok(0) => Err("must be at least 1".to_string()),
        Ok(n) => Ok(n),
        Err(e) => Err(e.to_string()),
    }
}

fn positive_secs(s: &str) -> std::result::Result<u64, String> {
    positive(s).map(|n| n as u64)
}

/// Run settings, built once from the command line.
#[derive(Debug, Clone)]
pub struct Config {
    pub input_file: PathBuf,
    pub output_dir: PathBuf,
    pub dry_run: bool,
    pub display_progress: bool,
    pub max_concurrent_downloads: usize,
    pub read_timeout: Duration,
    pub catalog_url: String,
    pub catalog_timeout: Duration,
    pub resolve_workers: usize,
}

impl Config {
    /// Defaults for everything except the package list.
    pub fn new(input_file: impl Into<PathBuf>) -> Config {
        Config {
            input_file: input_file.into(),
            output_dir: DEFAULT_OUTPUT_DIR.clone(),
            dry_run: false,
            display_progress: false,
            max_concurrent_downloads: 10,
            read_timeout: Duration::from_secs(30),
            catalog_url: CATALOG_URL.to_string(),
            catalog_timeout: Duration::from_secs(60),
            resolve_workers: default_workers(),
        }
    }
}

impl From<Cli> for Config {
    fn from(cli: Cli) -> Config {
        Config {
            input_file: cli.input_file,
            output_dir: cli
                .output_dir
                .unwrap_or_else(|| DEFAULT_OUTPUT_DIR.clone()),
            dry_run: cli.do_not_download,
            display_progress: cli.display,
            max_concurrent_downloads: cli.concurrent,
            read_timeout: Duration::from_secs(cli.timeout),
            catalog_url: cli.catalog_url,
            catalog_timeout: Duration::from_secs(cli.catalog_timeout),
            resolve_workers: cli.resolve_workers.unwrap_or_else(default_workers),
        }
    }
}

fn default_workers() -> usize {
    thread::available_parallelism().map_or(1, |n| n.get())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let cli = Cli::try_parse_from(["patchmypc-downloader", "-i", "list.txt"]).unwrap();
        let config = Config::from(cli);

        assert_eq!(config.input_file, PathBuf::from("list.txt"));
        assert_eq!(config.output_dir, *DEFAULT_OUTPUT_DIR);
        assert!(config.output_dir.ends_with("patchmypcfree"));
        assert!(!config.dry_run);
        assert!(!config.display_progress);
        assert_eq!(config.max_concurrent_downloads, 10);
        assert_eq!(config.read_timeout, Duration::from_secs(30));
        assert_eq!(config.catalog_url, CATALOG_URL);
        assert_eq!(config.catalog_timeout, Duration::from_secs(60));
        assert!(config.resolve_workers >= 1);
    }

    #[test]
    fn short_flags() {
        let cli = Cli::try_parse_from([
            "patchmypc-downloader",
            "-i",
            "pkgs.txt",
            "-o",
            "/tmp/out",
            "-s",
            "-d",
            "-c",
            "3",
            "-t",
            "5",
        ])
        .unwrap();
        let config = Config::from(cli);

        assert_eq!(config.output_dir, PathBuf::from("/tmp/out"));
        assert!(config.dry_run);
        assert!(config.display_progress);
        assert_eq!(config.max_concurrent_downloads, 3);
        assert_eq!(config.read_timeout, Duration::from_secs(5));
    }

    #[test]
    fn input_file_is_required() {
        assert!(Cli::try_parse_from(["patchmypc-downloader", "-s"]).is_err());
    }

    #[test]
    fn zero_concurrency_is_rejected() {
        let parsed = Cli::try_parse_from(["patchmypc-downloader", "-i", "x", "-c", "0"]);
        assert!(parsed.is_err());
    }

    #[test]
    fn resolve_workers_override() {
        let cli = Cli::try_parse_from([
            "patchmypc-downloader",
            "-i",
            "x",
            "--resolve-workers",
            "2",
            "--catalog-url",
            "http://localhost/defs.xml",
        ])
        .unwrap();
        let config = Config::from(cli);

        assert_eq!(config.resolve_workers, 2);
        assert_eq!(config.catalog_url, "http://localhost/defs.xml");
    }
}
