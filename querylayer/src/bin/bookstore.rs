use std::{io, process::ExitCode};

use clap::Parser;
use tracing::error;
use tracing_subscriber::EnvFilter;

use querylayer::{
    config::Config,
    error::DocumentStoreResult,
    report::{self, BookstoreReport},
};

#[tokio::main]
async fn main() -> ExitCode {
    // Logs go to stderr; stdout carries the report.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("querylayer=info")),
        )
        .with_writer(io::stderr)
        .init();

    let config = Config::parse();

    match run(&config).await {
        Ok(report) => {
            println!("{report}");
            ExitCode::SUCCESS
        }
        Err(err) => {
            error!(error = %err, backend = ?config.backend, "bookstore run failed");
            ExitCode::FAILURE
        }
    }
}

async fn run(config: &Config) -> DocumentStoreResult<BookstoreReport> {
    let pagination = config.pagination()?;
    let store = config.open_store().await?;

    store
        .session(async |store| {
            let books = store.collection(&config.collection);
            report::run(&books, pagination).await
        })
        .await
}
