use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use fuelcell_ledger::config::DEFAULT_CONFIG_FILE;
use fuelcell_ledger::logging::init_tracing;
use fuelcell_ledger::{
    asset_exists, create_usage_record, generate_bill, invoke, key_history, list_kind,
    register_asset, remove_component, return_fuelcell, Asset, AssetKind, LedgerConfig,
    SqliteWorldState, TxContext, UsageInput,
};

#[derive(Parser)]
#[command(name = "fuelcell-ledger")]
#[command(about = "Billing ledger for leased fuelcells", long_about = None)]
struct Cli {
    /// Config file (defaults apply when it does not exist)
    #[arg(long, default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,

    /// SQLite world state, overrides the config file and environment
    #[arg(long)]
    db: Option<PathBuf>,

    #[command(subcommand)]
    cmd: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Register reference data from a JSON array of records
    Seed { path: PathBuf },

    /// Record journeys from a CSV file, one invocation per row
    ImportUsage { path: PathBuf },

    /// Generate a bill for a fuelcell over [START, END] (YYYYMMDD)
    Bill {
        bill_id: String,
        fuelcell_id: String,
        start: String,
        end: String,

        /// Price the bill without committing anything
        #[arg(long, default_value_t = false)]
        dry_run: bool,
    },

    /// Print every record of one kind as JSON lines
    List { kind: String },

    /// Check whether an identity is taken
    Exists { id: String },

    /// Print every committed version of a record
    History { id: String },

    /// Record a component's removal date
    RemoveComponent { id: String, date: String },

    /// Record a fuelcell's return date
    ReturnFuelcell { id: String, date: String },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = LedgerConfig::resolve(&cli.config)?;
    if let Some(db) = &cli.db {
        config.store.path = db.clone();
    }
    init_tracing(&config.logging);

    let mut store = SqliteWorldState::open(&config.store.path).with_context(|| {
        format!("Failed to open world state {}", config.store.path.display())
    })?;
    info!(path = %config.store.path.display(), "world state opened");

    match cli.cmd {
        Commands::Seed { path } => run_seed(&mut store, &path),
        Commands::ImportUsage { path } => run_import_usage(&mut store, &path),
        Commands::Bill {
            bill_id,
            fuelcell_id,
            start,
            end,
            dry_run,
        } => run_bill(&mut store, &bill_id, &fuelcell_id, &start, &end, dry_run),
        Commands::List { kind } => run_list(&mut store, &kind),
        Commands::Exists { id } => {
            let exists = invoke(&mut store, |tx| asset_exists(tx, &id))?;
            println!("{}", exists);
            Ok(())
        }
        Commands::History { id } => run_history(&store, &id),
        Commands::RemoveComponent { id, date } => {
            let component = invoke(&mut store, |tx| remove_component(tx, &id, &date))?;
            println!("✓ {} removed on {}", component.id, component.removed_at);
            Ok(())
        }
        Commands::ReturnFuelcell { id, date } => {
            let fuelcell = invoke(&mut store, |tx| return_fuelcell(tx, &id, &date))?;
            println!("✓ {} returned on {}", fuelcell.id, fuelcell.returned_at);
            Ok(())
        }
    }
}

fn run_seed(store: &mut SqliteWorldState, path: &Path) -> Result<()> {
    println!("📂 Loading reference data from {}", path.display());

    let raw = fs::read_to_string(path)
        .with_context(|| format!("Failed to read seed file {}", path.display()))?;
    let assets: Vec<Asset> = serde_json::from_str(&raw)
        .with_context(|| format!("Seed file {} is not a JSON array of records", path.display()))?;

    let count = assets.len();
    // All or nothing: one invocation for the whole file
    invoke(store, |tx| {
        for asset in assets {
            register_asset(tx, asset)?;
        }
        Ok(())
    })
    .context("Seeding failed, nothing was written")?;

    println!("✓ Registered {} records", count);
    println!("✓ World state now holds {} keys", store.count()?);
    Ok(())
}

fn run_import_usage(store: &mut SqliteWorldState, path: &Path) -> Result<()> {
    println!("📂 Importing journeys from {}", path.display());

    let mut reader = csv::Reader::from_path(path)
        .with_context(|| format!("Failed to open CSV file {}", path.display()))?;

    let mut imported = 0;
    let mut rejected = 0;

    for (line, row) in reader.deserialize::<UsageInput>().enumerate() {
        let input = row.with_context(|| format!("Malformed CSV row {}", line + 2))?;
        let id = input.id.clone();

        match invoke(store, |tx| create_usage_record(tx, input)) {
            Ok(_) => imported += 1,
            Err(err) => {
                warn!(usage_id = %id, "journey rejected: {}", err);
                println!("  ✗ {}: {}", id, err);
                rejected += 1;
            }
        }
    }

    println!("✓ Imported {} journeys ({} rejected)", imported, rejected);
    Ok(())
}

fn run_bill(
    store: &mut SqliteWorldState,
    bill_id: &str,
    fuelcell_id: &str,
    start: &str,
    end: &str,
    dry_run: bool,
) -> Result<()> {
    let report = if dry_run {
        // Run against a context that is never committed
        let mut tx = TxContext::new(&*store);
        generate_bill(&mut tx, bill_id, fuelcell_id, start, end)?
    } else {
        invoke(store, |tx| generate_bill(tx, bill_id, fuelcell_id, start, end))?
    };

    print!("{}", report.summary());
    if dry_run {
        println!("(dry run, nothing committed)");
    }
    Ok(())
}

fn run_list(store: &mut SqliteWorldState, kind: &str) -> Result<()> {
    let Some(kind) = AssetKind::parse(kind) else {
        let known: Vec<&str> = AssetKind::ALL.iter().map(|k| k.tag()).collect();
        bail!("Unknown record kind {:?} (expected one of {})", kind, known.join(", "));
    };

    let assets = invoke(store, |tx| list_kind(tx, kind))?;
    for asset in &assets {
        println!("{}", serde_json::to_string(asset)?);
    }
    Ok(())
}

fn run_history(store: &SqliteWorldState, id: &str) -> Result<()> {
    let history = key_history(store, id)?;
    if history.is_empty() {
        println!("No history for {}", id);
        return Ok(());
    }

    for entry in history {
        println!(
            "v{}  {}  tx {}  sha256 {}",
            entry.version,
            entry.committed_at.to_rfc3339(),
            entry.tx_id,
            entry.value_hash
        );
        println!("    {}", entry.value);
    }
    Ok(())
}
