//! Store bootstrap: create both tables with the expected headers on first run.
//!
//! Safe to call on every startup. An existing store is never rewritten.

use crate::config::StoreConfig;
use crate::credentials::{CredentialStore, PasswordScheme};
use crate::error::{Result, StorageError};
use crate::ledger::{ScanLedger, SCAN_HEADERS};
use crate::lock;
use crate::table;
use crate::types::{ScanRecord, UserRecord};
use serde::Serialize;
use tracing::info;

/// Seeded administrator. Change the password by re-provisioning the store.
pub const ADMIN_USERNAME: &str = "admin";
pub const ADMIN_PASSWORD: &str = "admin";
pub const ADMIN_BRANCH: &str = "HeadOffice";

/// What a bootstrap run created.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BootstrapReport {
    pub users_created: bool,
    pub ledger_created: bool,
}

fn admin_record() -> UserRecord {
    UserRecord {
        username: ADMIN_USERNAME.to_string(),
        password_hash: PasswordScheme::default().digest(ADMIN_PASSWORD),
        branches: vec![ADMIN_BRANCH.to_string()],
    }
}

/// Ensure the user store and the ledger exist.
pub fn bootstrap(config: &StoreConfig) -> Result<BootstrapReport> {
    let users = CredentialStore::new(&config.users_path);
    let ledger = ScanLedger::from_config(config);

    let report = BootstrapReport {
        users_created: ensure_user_store(&users, config)?,
        ledger_created: ensure_ledger(&ledger, config)?,
    };

    info!(
        users = %config.users_path.display(),
        scans = %config.scans_path.display(),
        users_created = report.users_created,
        ledger_created = report.ledger_created,
        "Stores verified"
    );
    Ok(report)
}

fn ensure_user_store(users: &CredentialStore, config: &StoreConfig) -> Result<bool> {
    if users.exists() {
        return Ok(false);
    }
    table::ensure_parent(users.path())?;
    // Existence is re-checked under the lock so two starting processes
    // cannot both seed the store.
    let _guard = lock::lock_exclusive_timeout(users.path(), config.lock_timeout)
        .map_err(StorageError::from)?;
    if users.exists() {
        return Ok(false);
    }
    info!("Creating user store {}", users.path().display());
    users.create(&[admin_record()])?;
    Ok(true)
}

fn ensure_ledger(ledger: &ScanLedger, config: &StoreConfig) -> Result<bool> {
    if ledger.exists_on_disk() {
        return Ok(false);
    }
    table::ensure_parent(ledger.path())?;
    let _guard = lock::lock_exclusive_timeout(ledger.path(), config.lock_timeout)
        .map_err(StorageError::from)?;
    if ledger.exists_on_disk() {
        return Ok(false);
    }
    info!("Creating scan ledger {}", ledger.path().display());
    table::write_table::<ScanRecord, _>(ledger.path(), &SCAN_HEADERS, &[])?;
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_fresh_bootstrap() {
        let temp = TempDir::new().unwrap();
        let config = StoreConfig::in_dir(temp.path().join("home"));

        let report = bootstrap(&config).unwrap();
        assert!(report.users_created);
        assert!(report.ledger_created);

        assert_eq!(
            fs::read_to_string(&config.scans_path).unwrap(),
            "scan_id,barcode,created_by,branch_code,created_date\n"
        );
        let identity = CredentialStore::new(&config.users_path)
            .authenticate("admin", "admin")
            .unwrap();
        assert_eq!(identity.branches, vec![ADMIN_BRANCH]);
        assert_eq!(identity.default_branch(), Some("HeadOffice"));
    }

    #[test]
    fn test_idempotent_and_never_overwrites() {
        let temp = TempDir::new().unwrap();
        let config = StoreConfig::in_dir(temp.path());
        bootstrap(&config).unwrap();

        let ledger = ScanLedger::from_config(&config);
        ledger.insert_one("BC1", "admin", ADMIN_BRANCH).unwrap();
        fs::write(&config.users_path, "username,password_hash,branches\nzoe,abc,DXB\n").unwrap();

        let report = bootstrap(&config).unwrap();
        assert_eq!(report, BootstrapReport::default());
        assert!(ledger.exists("BC1").unwrap());
        assert!(fs::read_to_string(&config.users_path).unwrap().contains("zoe"));
    }

    #[test]
    fn test_creates_only_missing_store() {
        let temp = TempDir::new().unwrap();
        let config = StoreConfig::in_dir(temp.path());
        fs::write(&config.users_path, "username,password_hash,branches\n").unwrap();

        let report = bootstrap(&config).unwrap();
        assert!(!report.users_created);
        assert!(report.ledger_created);
        assert!(CredentialStore::new(&config.users_path).users().unwrap().is_empty());
    }
}
