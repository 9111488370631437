use clap::Parser;
use invoice_sync::application::config::SyncConfig;
use invoice_sync::application::coordinator::SyncCoordinator;
use invoice_sync::application::engine::ReplayEngine;
use invoice_sync::domain::ports::DocumentStoreRef;
use invoice_sync::infrastructure::in_memory::InMemoryCollection;
use invoice_sync::interfaces::csv::operation_reader::OperationReader;
use invoice_sync::interfaces::csv::status_writer::StatusWriter;
use miette::{IntoDiagnostic, Result};
use std::fs::File;
use std::io::{self, IsTerminal};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Input operations CSV file
    input: PathBuf,

    /// Path to persistent database (optional). If provided, uses RocksDB.
    #[arg(long)]
    db_path: Option<PathBuf>,

    /// Hard upper bound on how long a payment lock may stay held, longer than the cool-down
    #[arg(long, default_value_t = 5_000, value_parser = clap::value_parser!(u64).range(1..))]
    lock_ttl_ms: u64,

    /// Delay before a payment lock is released after mirroring
    #[arg(long, default_value_t = 100)]
    cooldown_ms: u64,
}

fn open_stores(db_path: Option<PathBuf>) -> Result<(DocumentStoreRef, DocumentStoreRef)> {
    #[cfg(feature = "storage-rocksdb")]
    if let Some(db_path) = db_path {
        use invoice_sync::domain::payment::Side;
        use invoice_sync::infrastructure::rocksdb::RocksDBStore;

        let store = RocksDBStore::open(db_path).into_diagnostic()?;
        let invoices: DocumentStoreRef = Arc::new(store.collection(Side::Source).into_diagnostic()?);
        let payments: DocumentStoreRef = Arc::new(store.collection(Side::Mirror).into_diagnostic()?);
        return Ok((invoices, payments));
    }

    #[cfg(not(feature = "storage-rocksdb"))]
    if db_path.is_some() {
        tracing::warn!(
            "Persistent storage requested via --db-path, but 'storage-rocksdb' feature is not enabled. Falling back to in-memory storage."
        );
    }

    Ok((
        Arc::new(InMemoryCollection::new("invoices")),
        Arc::new(InMemoryCollection::new("payments")),
    ))
}

#[tokio::main]
async fn main() -> Result<()> {
    // stdout carries the report, diagnostics go to stderr
    let ansi = io::stderr().is_terminal() && std::env::var_os("NO_COLOR").is_none();
    tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_ansi(ansi)
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into()))
        .init();

    let cli = Cli::parse();

    let config = SyncConfig {
        lock_ttl: Duration::from_millis(cli.lock_ttl_ms),
        cooldown: Duration::from_millis(cli.cooldown_ms),
        ..SyncConfig::default()
    };
    let coordinator = SyncCoordinator::in_process(config).into_diagnostic()?;
    let (invoices, payments) = open_stores(cli.db_path)?;
    let engine = ReplayEngine::new(coordinator, invoices, payments).into_diagnostic()?;

    // Replay operations
    let file = File::open(cli.input).into_diagnostic()?;
    let reader = OperationReader::new(file);
    for op_result in reader.operations() {
        match op_result {
            Ok(op) => {
                if let Err(e) = engine.process_operation(op).await {
                    tracing::warn!("Error processing operation: {}", e);
                }
            }
            Err(e) => {
                tracing::warn!("Error reading operation: {}", e);
            }
        }
    }

    let statuses = engine.into_results().await.into_diagnostic()?;

    let stdout = io::stdout();
    let mut writer = StatusWriter::new(stdout.lock());
    writer.write_statuses(statuses).into_diagnostic()?;

    Ok(())
}
