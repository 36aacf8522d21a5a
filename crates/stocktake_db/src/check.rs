//! Store health check: bootstrap, then read both stores back.

use crate::config::StoreConfig;
use crate::credentials::CredentialStore;
use crate::error::Result;
use crate::ledger::{LedgerStats, ScanLedger};
use crate::lock;
use crate::schema::{bootstrap, BootstrapReport};
use serde::Serialize;
use std::path::PathBuf;
use tracing::info;

#[derive(Debug, Clone, Serialize)]
pub struct HealthReport {
    pub users_path: PathBuf,
    pub scans_path: PathBuf,
    pub bootstrap: BootstrapReport,
    pub users: usize,
    pub users_without_branches: Vec<String>,
    pub ledger: LedgerStats,
    /// True if another writer currently holds the ledger lock
    pub ledger_locked: bool,
}

/// Ensure both stores exist and are readable.
pub fn check(config: &StoreConfig) -> Result<HealthReport> {
    let bootstrap = bootstrap(config)?;

    let users = CredentialStore::new(&config.users_path).users()?;
    let ledger = ScanLedger::from_config(config);
    let stats = ledger.stats()?;

    let report = HealthReport {
        users_path: config.users_path.clone(),
        scans_path: config.scans_path.clone(),
        bootstrap,
        users: users.len(),
        users_without_branches: users
            .iter()
            .filter(|u| u.branches.is_empty())
            .map(|u| u.username.clone())
            .collect(),
        ledger: stats,
        ledger_locked: lock::is_locked(ledger.path()),
    };

    info!(
        users = report.users,
        scans = report.ledger.records,
        "Store check passed"
    );
    Ok(report)
}
