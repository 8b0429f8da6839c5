use clap::Parser;
use ledgerflow::application::engine::{LedgerEngine, Stores};
use ledgerflow::config::{AuditConfig, EngineConfig};
use ledgerflow::domain::entity::{EntityId, LedgerEntity};
use ledgerflow::infrastructure::cache::{FailOpenCache, InMemoryCache};
use ledgerflow::infrastructure::in_memory::{
    InMemoryAttemptLogStore, InMemoryEntityStore, InMemoryOperationStore,
};
use ledgerflow::interfaces::csv::entity_reader::EntityReader;
use ledgerflow::interfaces::csv::operation_reader::OperationReader;
use ledgerflow::interfaces::csv::report_writer::{BalanceWriter, ReceiptWriter};
use miette::{IntoDiagnostic, Result};
use std::collections::HashSet;
use std::fs::File;
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Seed entities CSV file (accounts and cards)
    entities: PathBuf,

    /// Operations CSV file (transfers and payments)
    operations: PathBuf,

    /// Path to persistent database (optional). If provided, uses RocksDB.
    #[arg(long)]
    db_path: Option<PathBuf>,

    /// Deadline for each operation, in milliseconds
    #[arg(long, default_value_t = 5_000)]
    timeout_ms: u64,

    /// Attempt log entries written per batch
    #[arg(long, default_value_t = 10)]
    log_batch_size: usize,

    /// Attempt log flush interval, in milliseconds
    #[arg(long, default_value_t = 1_000)]
    log_flush_ms: u64,

    /// Attempt log queue capacity before writes become synchronous
    #[arg(long, default_value_t = 100)]
    log_queue_capacity: usize,
}

impl Cli {
    fn config(&self) -> EngineConfig {
        EngineConfig {
            operation_timeout: Duration::from_millis(self.timeout_ms),
            audit: AuditConfig {
                queue_capacity: self.log_queue_capacity.max(1),
                batch_size: self.log_batch_size.max(1),
                flush_interval: Duration::from_millis(self.log_flush_ms.max(1)),
            },
            ..EngineConfig::default()
        }
    }
}

/// Entities to list in the final balance report, in first-seen order.
#[derive(Default)]
struct BalanceReport {
    seen: HashSet<EntityId>,
    ids: Vec<EntityId>,
}

impl BalanceReport {
    fn track(&mut self, id: EntityId) {
        if self.seen.insert(id) {
            self.ids.push(id);
        }
    }
}

fn in_memory_stores() -> Stores {
    Stores {
        entities: Arc::new(InMemoryEntityStore::new()),
        operations: Arc::new(InMemoryOperationStore::new()),
        attempts: Arc::new(InMemoryAttemptLogStore::new()),
    }
}

#[cfg(feature = "storage-rocksdb")]
fn open_stores(db_path: Option<&PathBuf>) -> Result<Stores> {
    use ledgerflow::infrastructure::rocksdb::RocksDBStore;

    match db_path {
        Some(path) => {
            let store = RocksDBStore::open(path).into_diagnostic()?;
            Ok(Stores {
                entities: Arc::new(store.clone()),
                operations: Arc::new(store.clone()),
                attempts: Arc::new(store),
            })
        }
        None => Ok(in_memory_stores()),
    }
}

#[cfg(not(feature = "storage-rocksdb"))]
fn open_stores(db_path: Option<&PathBuf>) -> Result<Stores> {
    if db_path.is_some() {
        eprintln!(
            "WARNING: Persistent storage requested via --db-path, but 'storage-rocksdb' feature is not enabled. Falling back to In-Memory storage."
        );
    }
    Ok(in_memory_stores())
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();
    let stores = open_stores(cli.db_path.as_ref())?;
    let engine = LedgerEngine::new(stores, FailOpenCache::new(Arc::new(InMemoryCache::new())), cli.config());

    // Seed
    let file = File::open(&cli.entities).into_diagnostic()?;
    let mut seeded: Vec<LedgerEntity> = Vec::new();
    for entity in EntityReader::new(file).entities() {
        match entity {
            Ok(entity) => seeded.push(entity),
            Err(e) => eprintln!("Error reading entity: {}", e),
        }
    }
    let mut report = BalanceReport::default();
    for entity in &seeded {
        report.track(entity.id);
    }
    engine.queries().seed(seeded).await.into_diagnostic()?;

    // Process operations
    let stdout = io::stdout();
    let mut out = stdout.lock();
    {
        let mut receipts = ReceiptWriter::new(&mut out);
        let file = File::open(&cli.operations).into_diagnostic()?;
        for request in OperationReader::new(file).operations() {
            match request {
                Ok(request) => match engine.execute(request).await {
                    Ok(record) => {
                        for id in record.kind.mutated_entities() {
                            report.track(id);
                        }
                        receipts.write(&record).into_diagnostic()?;
                    }
                    Err(e) => eprintln!("Error processing operation: {}", e),
                },
                Err(e) => eprintln!("Error reading operation: {}", e),
            }
        }
        receipts.flush().into_diagnostic()?;
    }
    engine.shutdown().await;

    // Output final balances
    let mut entities = Vec::with_capacity(report.ids.len());
    for id in report.ids {
        if let Some(entity) = engine.queries().entity(id).await.into_diagnostic()? {
            entities.push(entity);
        }
    }
    writeln!(out).into_diagnostic()?;
    BalanceWriter::new(&mut out)
        .write_entities(&entities)
        .into_diagnostic()?;

    Ok(())
}
