//! Administrative ledger commands: `list` and `delete`.

use crate::cli::context::{StoreArgs, Stores};
use crate::cli::error::explain;
use crate::cli::output::{format_created, plural, print_json, print_table};
use clap::Args;
use serde_json::json;
use stocktake_db::ScanId;

#[derive(Debug, Args)]
pub struct ListArgs {
    /// Show at most this many records (newest first)
    #[arg(short = 'n', long)]
    pub limit: Option<usize>,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Args)]
pub struct DeleteArgs {
    /// Id of the scan to remove
    pub scan_id: ScanId,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

pub fn run_list(args: ListArgs, store_args: &StoreArgs) -> anyhow::Result<()> {
    let stores = Stores::open(store_args)?;
    let mut records = stores.ledger.list_all().map_err(|e| explain(e, None))?;
    let total = records.len();
    if let Some(limit) = args.limit {
        records.truncate(limit);
    }

    if args.json {
        return print_json(&records);
    }

    if records.is_empty() {
        println!("No scans recorded.");
        return Ok(());
    }

    let rows = records
        .iter()
        .map(|r| {
            vec![
                r.scan_id.to_string(),
                r.barcode.clone(),
                r.created_by.clone(),
                r.branch_code.clone(),
                format_created(r.created_date),
            ]
        })
        .collect();
    print_table(&["ID", "BARCODE", "USER", "BRANCH", "CREATED"], rows);
    if records.len() < total {
        println!("Showing {} of {}", records.len(), plural(total, "scan"));
    }
    Ok(())
}

pub fn run_delete(args: DeleteArgs, store_args: &StoreArgs) -> anyhow::Result<()> {
    let stores = Stores::open(store_args)?;
    let removed = stores
        .ledger
        .delete_by_id(args.scan_id)
        .map_err(|e| explain(e, None))?;

    if args.json {
        return print_json(&json!({ "deleted": removed }));
    }
    println!(
        "Deleted scan {} ({}, {} at {})",
        removed.scan_id, removed.barcode, removed.created_by, removed.branch_code
    );
    Ok(())
}
