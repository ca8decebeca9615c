//! oblivq-client binary: drive oblivious operations against the peer
//!
//! Run with:
//! ```bash
//! cargo run -p oblivq-client -- --config client.json encrypt 0 1 --swap
//! ```

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use oblivq_client::SessionBuilder;
use oblivq_core::{ClientConfig, ObliviousOperation};
use serde::Deserialize;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "oblivq-client")]
#[command(about = "Client side of the oblivious database query protocol")]
struct Args {
    /// JSON configuration file (defaults apply when omitted)
    #[arg(long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Handshake with the peer
    Init,
    /// Compare two new rows and encrypt them
    Encrypt {
        index_a: usize,
        index_b: usize,
        #[arg(long)]
        swap: bool,
    },
    /// Run a JSON plan of steps in one session, so reencrypt steps see the
    /// key streams of earlier encrypt steps
    Run { plan: PathBuf },
    /// Send a JSON file to the peer under its file stem
    SendJson { file: PathBuf },
    /// Accept JSON transfers until Ctrl-C
    Listen,
    /// Print the effective configuration as JSON
    PrintConfig,
}

/// One entry of a `run` plan
#[derive(Deserialize, Debug)]
#[serde(tag = "kind", rename_all = "snake_case")]
enum Step {
    Encrypt(ObliviousOperation),
    Reencrypt(ObliviousOperation),
    SendJson { file: PathBuf },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("oblivq_client=info".parse()?))
        .init();

    let args = Args::parse();

    let config = match &args.config {
        Some(path) => ClientConfig::load(path)?,
        None => ClientConfig::default(),
    };

    if let Command::PrintConfig = args.command {
        println!("{}", serde_json::to_string_pretty(&config)?);
        return Ok(());
    }

    let mut session = SessionBuilder::new(config).build()?;

    match args.command {
        Command::Init => session.init().await?,
        Command::Encrypt { index_a, index_b, swap } => {
            session.init().await?;
            let (a, b) = session
                .encrypt(ObliviousOperation::new(index_a, index_b, swap))
                .await?;
            println!("[OK] key streams stored at {} and {}", a, b);
        }
        Command::Run { plan } => {
            let steps: Vec<Step> = serde_json::from_str(&std::fs::read_to_string(&plan)?)?;
            session.init().await?;
            for step in steps {
                match step {
                    Step::Encrypt(op) => {
                        session.encrypt(op).await?;
                    }
                    Step::Reencrypt(op) => {
                        session.reencrypt(op).await?;
                    }
                    Step::SendJson { file } => session.send_json_file(&file).await?,
                }
            }
            println!("[OK] plan complete, {} key streams held", session.store().len());
        }
        Command::SendJson { file } => {
            session.send_json_file(&file).await?;
            println!("[OK] sent {}", file.display());
        }
        Command::Listen => {
            let addr = session.start_listener().await?;
            tracing::info!(addr = %addr, "Waiting for transfers, Ctrl-C to stop");
            tokio::signal::ctrl_c().await?;
        }
        Command::PrintConfig => {}
    }

    session.shutdown().await?;
    Ok(())
}
