//! Minimal AMQP 0-9-1 client.
//!
//! Usage:
//! ```text
//! amqptool consume test_q --endpoint amqp://rabbit.host:5672/%2f
//! amqptool inspect test_q --receive-timeout 10
//! amqptool produce amq.direct test_q message.txt
//! ```
//!
//! `consume` and `inspect` log in, declare the queue as durable and
//! then print every message delivered on it, acknowledging each one
//! after it is printed. They run until the broker closes the queue,
//! or until `--receive-timeout` seconds pass without a message.
//! `produce` publishes the contents of a file (or standard input) as
//! one persistent message.
//!
//! Message contents go to stdout. Logs go to stderr, or to
//! `--logfile`, filtered by `RUST_LOG` (default `info`). Whatever
//! happens, the channel and then the connection are closed before
//! exiting, and any error gives a non-zero exit status.
//!
//! This application uses `native-tls` to support `amqps://`
//! connections. This means it will link a separately installed
//! `openssl` shared library. To vendor openssl instead, build with
//! `--features=vendored-tls`.
//!
//! ## Feature flags
#![doc = document_features::document_features!()]
// Clippy lints
#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::single_match_else)]
#![warn(clippy::missing_docs_in_private_items)]
#![warn(clippy::self_named_module_files)]
#![warn(clippy::perf)]
#![deny(missing_docs)]
#![warn(clippy::missing_panics_doc)]

use std::path::Path;

use clap::Parser;
use miette::{IntoDiagnostic, Result, WrapErr};
#[allow(unused_imports)]
use tracing::{debug, error, info, Level};

mod cli;
mod consumer;
mod message;
mod producer;
mod rabbit;
mod session;

use cli::Commands;
use consumer::{FieldPrinter, SummaryPrinter};

/// Send logs to `logfile`, or stderr if not given
fn init_logging(logfile: Option<&Path>) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    let subscriber = tracing_subscriber::FmtSubscriber::builder().with_env_filter(filter);

    match logfile {
        Some(file) => {
            let f = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(file)
                .into_diagnostic()
                .wrap_err_with(|| format!("Unable to open {}", file.display()))?;
            subscriber
                .with_writer(std::sync::Mutex::new(f))
                .with_ansi(false)
                .init();
        }
        None => {
            subscriber.with_writer(std::io::stderr).init();
        }
    };
    Ok(())
}

/// Run one subcommand to completion
async fn tokio_main(command: Commands) -> Result<()> {
    match command {
        Commands::Consume(cmd) => {
            let mut printer = FieldPrinter::new(std::io::stdout());
            let summary = cmd.run(&mut printer).await?;
            info!(processed = summary.processed, end = ?summary.end, "Done consuming");
        }
        Commands::Inspect(cmd) => {
            let mut printer = SummaryPrinter::new(std::io::stdout());
            let summary = cmd.run(&mut printer).await?;
            info!(processed = summary.processed, end = ?summary.end, "Done inspecting");
        }
        Commands::Produce(cmd) => {
            cmd.run().await?;
        }
    }
    Ok(())
}

fn main() -> Result<()> {
    let args = cli::Args::parse();
    init_logging(args.logfile.as_deref())?;
    debug!("Got command line arguments {:?}", args);

    // Everything happens in sequence on one connection
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .into_diagnostic()
        .wrap_err("Unable to start the tokio runtime")?;
    runtime.block_on(tokio_main(args.command))
}
