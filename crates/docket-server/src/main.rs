use anyhow::{ensure, Context, Result};
use clap::Parser;
use docket_server::{Server, ServerConfig};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "dserver", version, about = "Docket document index server")]
struct Cli {
    /// Directory holding the document body files
    document_folder: PathBuf,
    /// Maximum number of cached search responses
    cache_size: usize,
    /// Directory for the FIFO endpoints
    #[arg(long, default_value = "/tmp")]
    runtime_dir: PathBuf,
    /// Directory for the index file and cache image
    #[arg(long, default_value = "tmp")]
    data_dir: PathBuf,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_env("DOCKET_LOG").unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    if let Err(err) = run(Cli::parse()) {
        eprintln!("{:#}", err);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    ensure!(
        cli.document_folder.is_dir(),
        "document folder {} is not a directory",
        cli.document_folder.display()
    );

    let mut config = ServerConfig::new(cli.document_folder, cli.cache_size);
    config.runtime_dir = cli.runtime_dir;
    config.data_dir = cli.data_dir;

    let mut server = Server::start(config).context("server startup failed")?;
    server.run().context("serving loop failed")?;
    Ok(())
}
