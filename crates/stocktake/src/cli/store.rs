//! Store maintenance commands: `init`, `check` and `config`.

use crate::cli::context::StoreArgs;
use crate::cli::error::explain;
use crate::cli::output::{plural, print_json};
use clap::Args;
use serde_json::json;
use stocktake_db::config::logs_dir;
use stocktake_db::{bootstrap, check, ADMIN_USERNAME};

#[derive(Debug, Args)]
pub struct InitArgs {
    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Args)]
pub struct CheckArgs {
    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Args)]
pub struct ConfigArgs {
    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

pub fn run_init(args: InitArgs, stores: &StoreArgs) -> anyhow::Result<()> {
    let config = stores.resolve()?;
    let report = bootstrap(&config).map_err(|e| explain(e, None))?;

    if args.json {
        return print_json(&json!({
            "users_path": config.users_path,
            "scans_path": config.scans_path,
            "users_created": report.users_created,
            "ledger_created": report.ledger_created,
        }));
    }

    if report.users_created {
        println!("Created user store: {}", config.users_path.display());
        println!(
            "  Default login '{}' was added. Replace it before going live.",
            ADMIN_USERNAME
        );
    } else {
        println!("User store:  {} (exists)", config.users_path.display());
    }
    if report.ledger_created {
        println!("Created scan ledger: {}", config.scans_path.display());
    } else {
        println!("Scan ledger: {} (exists)", config.scans_path.display());
    }
    Ok(())
}

pub fn run_check(args: CheckArgs, stores: &StoreArgs) -> anyhow::Result<()> {
    let config = stores.resolve()?;
    let report = check(&config).map_err(|e| explain(e, None))?;

    if args.json {
        return print_json(&report);
    }

    println!("User store:  {}", report.users_path.display());
    println!("  {}", plural(report.users, "user"));
    if !report.users_without_branches.is_empty() {
        println!(
            "  WARNING: no branches assigned to {}",
            report.users_without_branches.join(", ")
        );
    }

    println!("Scan ledger: {}", report.scans_path.display());
    println!("  {}", plural(report.ledger.records, "record"));
    if let Some(last) = report.ledger.last_issued {
        println!("  Last issued id: {}", last);
    }
    for (branch, count) in &report.ledger.per_branch {
        println!("    {:<16} {}", branch, count);
    }
    if report.ledger_locked {
        println!("  NOTE: a writer currently holds the ledger lock");
    }

    println!();
    println!("OK");
    Ok(())
}

pub fn run_config(args: ConfigArgs, stores: &StoreArgs) -> anyhow::Result<()> {
    let config = stores.resolve()?;
    let config_file = config.config_file_path();
    let logs = logs_dir(&config.home);
    let lock_timeout_ms = config.lock_timeout.as_millis() as u64;

    if args.json {
        return print_json(&json!({
            "home": config.home,
            "config_file": config_file,
            "config_file_exists": config_file.exists(),
            "users_path": config.users_path,
            "users_exists": config.users_path.exists(),
            "scans_path": config.scans_path,
            "scans_exists": config.scans_path.exists(),
            "lock_timeout_ms": lock_timeout_ms,
            "logs_dir": logs,
        }));
    }

    let status = |exists: bool| if exists { "" } else { " (missing)" };
    println!("Home:         {}", config.home.display());
    println!(
        "Config file:  {}{}",
        config_file.display(),
        status(config_file.exists())
    );
    println!(
        "User store:   {}{}",
        config.users_path.display(),
        status(config.users_path.exists())
    );
    println!(
        "Scan ledger:  {}{}",
        config.scans_path.display(),
        status(config.scans_path.exists())
    );
    println!("Lock timeout: {} ms", lock_timeout_ms);
    println!("Logs:         {}", logs.display());
    Ok(())
}
