use anyhow::{bail, Result};
use clap::Parser;
use docket_client::run_command;
use docket_proto::transport::Endpoints;
use docket_proto::Status;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "dclient",
    version,
    about = "Docket index client: one command per invocation",
    after_help = "Commands:\n  \
        -a <title> <authors> <year> <path>   index a document\n  \
        -c <key>                             consult a document\n  \
        -d <key>                             delete an index entry\n  \
        -l <key> <keyword>                   count matching lines\n  \
        -s <keyword> [workers]               search all documents\n  \
        -f                                   shut the server down"
)]
struct Cli {
    /// Directory for the FIFO endpoints
    #[arg(long, default_value = "/tmp")]
    runtime_dir: PathBuf,
    /// Command flag followed by its arguments
    #[arg(trailing_var_arg = true, allow_hyphen_values = true, required = true)]
    command: Vec<String>,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_env("DOCKET_LOG").unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let code = match run(cli) {
        Ok(code) => code,
        Err(err) => {
            eprintln!("{:#}", err);
            1
        }
    };
    std::process::exit(code);
}

fn run(cli: Cli) -> Result<i32> {
    let Some((flag, tokens)) = cli.command.split_first() else {
        bail!("no command given");
    };

    let endpoints = Endpoints::new(cli.runtime_dir);
    let reply = run_command(&endpoints, flag, tokens)?;
    for value in &reply.values {
        println!("{value}");
    }

    Ok(match reply.status {
        Status::Ok | Status::Shutdown => 0,
        _ => 2,
    })
}
