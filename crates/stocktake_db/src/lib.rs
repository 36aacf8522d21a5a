//! Store layer for stocktake.
//!
//! Two CSV-backed stores: a read-only credential store and the scan ledger.
//! All access goes through the typed handles exported here.
//!
//! # Usage
//!
//! ```rust,no_run
//! use stocktake_db::{bootstrap, CredentialStore, ScanCandidate, ScanLedger, StoreConfig};
//!
//! # fn main() -> stocktake_db::Result<()> {
//! let config = StoreConfig::from_env()?;
//! bootstrap(&config)?;
//!
//! let identity = CredentialStore::new(&config.users_path).authenticate("admin", "admin")?;
//! let branch = identity.select_branch(None)?;
//!
//! let ledger = ScanLedger::from_config(&config);
//! let record = ledger.insert_one("BC100", &identity.username, &branch)?;
//!
//! let outcome = ledger.ingest_batch(&[
//!     ScanCandidate::new("BC101", &identity.username, &branch),
//!     ScanCandidate::new("BC100", &identity.username, &branch),
//! ])?;
//! assert_eq!(outcome.accepted, 1);
//! # let _ = record;
//! # Ok(())
//! # }
//! ```

mod batch;
mod check;
mod clock;
pub mod config;
mod credentials;
mod error;
mod ledger;
pub mod lock;
mod schema;
mod session;
mod table;
mod types;

pub use batch::{BatchIngestor, BatchOutcome};
pub use check::{check, HealthReport};
pub use clock::{Clock, FixedClock, SystemClock};
pub use config::{stocktake_home, StoreConfig};
pub use credentials::{CredentialStore, PasswordScheme};
pub use error::{AuthFailure, ErrorKind, Result, StorageError, StoreError};
pub use ledger::{LedgerStats, ScanLedger};
pub use schema::{bootstrap, BootstrapReport, ADMIN_BRANCH, ADMIN_PASSWORD, ADMIN_USERNAME};
pub use session::{AddOutcome, ScanSession};
pub use types::{
    join_branches, split_branches, Identity, ScanCandidate, ScanId, ScanRecord, UserRecord,
    DATE_FORMAT,
};
