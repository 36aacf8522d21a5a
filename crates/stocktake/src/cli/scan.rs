//! `scan` and `ingest` commands.

use crate::cli::context::{AuthArgs, StoreArgs, Stores};
use crate::cli::error::{explain, HelpfulError};
use crate::cli::output::{plural, print_json};
use anyhow::Context;
use clap::Args;
use serde_json::json;
use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::PathBuf;
use stocktake_db::ScanCandidate;
use tracing::info;

#[derive(Debug, Args)]
pub struct ScanArgs {
    /// Scanned barcode
    pub barcode: String,

    #[command(flatten)]
    pub auth: AuthArgs,

    /// Branch to record against (default: the user's first branch)
    #[arg(short, long)]
    pub branch: Option<String>,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Args)]
pub struct IngestArgs {
    /// File with one barcode per line ('-' or omitted reads stdin)
    pub file: Option<PathBuf>,

    #[command(flatten)]
    pub auth: AuthArgs,

    /// Branch to record against (default: the user's first branch)
    #[arg(short, long)]
    pub branch: Option<String>,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

/// Record a single barcode.
pub fn run_scan(args: ScanArgs, store_args: &StoreArgs) -> anyhow::Result<()> {
    let stores = Stores::open(store_args)?;
    let (identity, branch) = stores.login_at(&args.auth, args.branch.as_deref())?;

    let record = stores
        .ledger
        .insert_one(&args.barcode, &identity.username, &branch)
        .map_err(|e| explain(e, Some(&identity.username)))?;

    if args.json {
        return print_json(&record);
    }
    println!(
        "Recorded {} as scan {} ({})",
        record.barcode, record.scan_id, record.branch_code
    );
    Ok(())
}

/// Record a list of barcodes; ones already present are skipped.
pub fn run_ingest(args: IngestArgs, store_args: &StoreArgs) -> anyhow::Result<()> {
    let barcodes = match args.file.as_deref() {
        Some(path) if path.as_os_str() != "-" => {
            if !path.exists() {
                return Err(HelpfulError::input_not_found(path).into());
            }
            let file = File::open(path)
                .with_context(|| format!("Failed to open {}", path.display()))?;
            read_barcodes(BufReader::new(file))
                .with_context(|| format!("Failed to read {}", path.display()))?
        }
        _ => read_barcodes(io::stdin().lock()).context("Failed to read stdin")?,
    };

    let stores = Stores::open(store_args)?;
    let (identity, branch) = stores.login_at(&args.auth, args.branch.as_deref())?;

    let candidates: Vec<ScanCandidate> = barcodes
        .iter()
        .map(|barcode| ScanCandidate::new(barcode.as_str(), &identity.username, &branch))
        .collect();
    let outcome = stores
        .ledger
        .ingest_batch(&candidates)
        .map_err(|e| explain(e, Some(&identity.username)))?;
    info!(
        accepted = outcome.accepted,
        skipped = outcome.skipped,
        "Ingest finished"
    );

    if args.json {
        return print_json(&json!({
            "branch": branch,
            "accepted": outcome.accepted,
            "skipped": outcome.skipped,
            "first_id": outcome.first_id,
            "last_id": outcome.last_id,
        }));
    }

    println!(
        "Accepted {}, skipped {} at {}",
        plural(outcome.accepted, "scan"),
        plural(outcome.skipped, "duplicate"),
        branch
    );
    if let (Some(first), Some(last)) = (outcome.first_id, outcome.last_id) {
        println!("  Scan ids {}..={}", first, last);
    }
    Ok(())
}

/// One barcode per line. Blank lines and `#` comments are ignored.
pub fn read_barcodes(reader: impl BufRead) -> io::Result<Vec<String>> {
    let mut barcodes = Vec::new();
    for line in reader.lines() {
        let line = line?;
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        barcodes.push(trimmed.to_string());
    }
    Ok(barcodes)
}
