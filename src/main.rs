use clap::Parser;
use patchmypc_downloader::{config::Cli, run, Config};
use std::process;
use tracing_subscriber::EnvFilter;

fn setup_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact()
        .init();
}

fn main() {
    setup_logging();
    let config = Config::from(Cli::parse());

    match run(&config) {
        Ok(Some(result)) => result.print_result(),
        Ok(None) => {}
        Err(e) => {
            eprintln!("Error: {}", e);
            for cause in e.iter().skip(1) {
                eprintln!("  caused by: {}", cause);
            }
            process::exit(1);
        }
    }
}
