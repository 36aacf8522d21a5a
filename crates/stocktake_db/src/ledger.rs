//! Scan ledger: the durable, delete-by-id store of scan records.
//!
//! # Storage Format
//!
//! ```text
//! <home>/scans.csv        scan_id,barcode,created_by,branch_code,created_date
//! <home>/scans.csv.seq    highest scan_id ever issued
//! <home>/scans.csv.lock   writer lock
//! ```
//!
//! Ids come from `max(highest present id, .seq value) + 1`, so deleting the
//! newest record never causes its id to be issued again.
//!
//! Writers hold the lock for the whole read-modify-write cycle. Readers take
//! no lock and always see a complete table because every write is an atomic
//! replace.

use crate::clock::{Clock, SystemClock};
use crate::config::StoreConfig;
use crate::error::{Result, StorageError, StoreError};
use crate::lock::{self, StoreLockGuard};
use crate::table::{self, Row};
use crate::types::{ScanCandidate, ScanId, ScanRecord};
use serde::Serialize;
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

pub(crate) const SCAN_HEADERS: [&str; 5] = [
    "scan_id",
    "barcode",
    "created_by",
    "branch_code",
    "created_date",
];

const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_secs(5);

/// Summary of the ledger contents.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LedgerStats {
    pub records: usize,
    /// Highest id among present records
    pub highest_id: Option<ScanId>,
    /// Highest id ever issued, including deleted records
    pub last_issued: Option<ScanId>,
    pub per_branch: BTreeMap<String, usize>,
}

/// Handle on the scan ledger file.
#[derive(Clone)]
pub struct ScanLedger {
    path: PathBuf,
    lock_timeout: Duration,
    clock: Arc<dyn Clock>,
}

impl fmt::Debug for ScanLedger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScanLedger")
            .field("path", &self.path)
            .field("lock_timeout", &self.lock_timeout)
            .finish()
    }
}

impl ScanLedger {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock_timeout: DEFAULT_LOCK_TIMEOUT,
            clock: Arc::new(SystemClock),
        }
    }

    pub fn from_config(config: &StoreConfig) -> Self {
        Self::new(&config.scans_path).with_lock_timeout(config.lock_timeout)
    }

    pub fn with_lock_timeout(mut self, timeout: Duration) -> Self {
        self.lock_timeout = timeout;
        self
    }

    pub fn with_clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Arc::new(clock);
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists_on_disk(&self) -> bool {
        self.path.exists()
    }

    /// Path of the issued-id sidecar: `/data/scans.csv` → `/data/scans.csv.seq`
    pub fn sequence_path(&self) -> PathBuf {
        let mut name = self.path.as_os_str().to_owned();
        name.push(".seq");
        PathBuf::from(name)
    }

    pub(crate) fn now(&self) -> chrono::NaiveDateTime {
        self.clock.now()
    }

    // ------------------------------------------------------------------
    // Reads (lock-free)
    // ------------------------------------------------------------------

    /// Load all present records in file (insertion) order.
    fn load(&self) -> std::result::Result<Vec<ScanRecord>, StorageError> {
        let rows: Vec<Row<ScanRecord>> = match table::read_table(&self.path, &SCAN_HEADERS)? {
            Some(rows) => rows,
            None => return Ok(Vec::new()),
        };

        let mut ids = HashSet::with_capacity(rows.len());
        let mut records = Vec::with_capacity(rows.len());
        for Row { line, value } in rows {
            if value.barcode.is_empty() {
                return Err(StorageError::corrupt(&self.path, line, "empty barcode"));
            }
            if !ids.insert(value.scan_id) {
                return Err(StorageError::corrupt(
                    &self.path,
                    line,
                    format!("duplicate scan_id {}", value.scan_id),
                ));
            }
            records.push(value);
        }
        Ok(records)
    }

    fn load_sequence(&self) -> std::result::Result<Option<ScanId>, StorageError> {
        let path = self.sequence_path();
        let content = match std::fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(StorageError::io(&path, e)),
        };
        if content.trim().is_empty() {
            return Ok(None);
        }
        content
            .parse::<ScanId>()
            .map(Some)
            .map_err(|reason| StorageError::corrupt(&path, 1, reason))
    }

    /// True iff a currently present record has exactly this barcode.
    ///
    /// A missing ledger has no records.
    pub fn exists(&self, barcode: &str) -> Result<bool> {
        let found = self.load()?.iter().any(|r| r.barcode == barcode);
        debug!(barcode, found, "Checked barcode");
        Ok(found)
    }

    /// Snapshot of every present barcode.
    pub fn barcodes(&self) -> Result<HashSet<String>> {
        Ok(self.load()?.into_iter().map(|r| r.barcode).collect())
    }

    /// All present records, newest `created_date` first. Records with the
    /// same timestamp keep their insertion order.
    pub fn list_all(&self) -> Result<Vec<ScanRecord>> {
        let mut records = self.load()?;
        records.sort_by(|a, b| b.created_date.cmp(&a.created_date));
        Ok(records)
    }

    pub fn stats(&self) -> Result<LedgerStats> {
        let records = self.load()?;
        let highest_id = records.iter().map(|r| r.scan_id).max();
        let last_issued = highest_id.max(self.load_sequence()?);
        let mut per_branch = BTreeMap::new();
        for record in &records {
            *per_branch.entry(record.branch_code.clone()).or_insert(0) += 1;
        }
        Ok(LedgerStats {
            records: records.len(),
            highest_id,
            last_issued,
            per_branch,
        })
    }

    // ------------------------------------------------------------------
    // Writes (under the exclusive lock)
    // ------------------------------------------------------------------

    /// Acquire the write lock and load the current state.
    pub(crate) fn begin_write(&self) -> Result<LedgerWrite<'_>> {
        table::ensure_parent(&self.path)?;
        let guard = lock::lock_exclusive_timeout(&self.path, self.lock_timeout)
            .map_err(StorageError::from)?;
        let records = self.load()?;
        let present_max = records.iter().map(|r| r.scan_id).max();
        let high_water = present_max.max(self.load_sequence()?);
        Ok(LedgerWrite {
            ledger: self,
            _guard: guard,
            records,
            high_water,
            issued: false,
        })
    }

    /// Record one scan.
    ///
    /// Fails with `Duplicate` if the barcode is present when the lock is held.
    pub fn insert_one(&self, barcode: &str, username: &str, branch: &str) -> Result<ScanRecord> {
        let candidate = ScanCandidate::new(barcode, username, branch);
        candidate.validate()?;

        let mut write = self.begin_write()?;
        if write.contains_barcode(&candidate.barcode) {
            info!(barcode, user = username, "Rejected duplicate barcode");
            return Err(StoreError::duplicate(candidate.barcode));
        }

        let scan_id = write.allocate_id()?;
        let record = candidate.into_record(scan_id, self.now());
        write.push(record.clone());
        write.commit()?;

        info!(
            scan_id = %record.scan_id,
            barcode = %record.barcode,
            user = %record.created_by,
            branch = %record.branch_code,
            "Recorded scan"
        );
        Ok(record)
    }

    /// Remove the record with this id and return it.
    pub fn delete_by_id(&self, scan_id: ScanId) -> Result<ScanRecord> {
        let mut write = self.begin_write()?;
        let removed = write.remove(scan_id).ok_or(StoreError::NotFound(scan_id))?;
        write.commit()?;
        info!(scan_id = %scan_id, barcode = %removed.barcode, "Deleted scan");
        Ok(removed)
    }
}

/// An in-progress read-modify-write of the ledger. Holds the lock until
/// dropped; nothing reaches disk unless `commit` is called.
pub(crate) struct LedgerWrite<'a> {
    ledger: &'a ScanLedger,
    _guard: StoreLockGuard,
    records: Vec<ScanRecord>,
    high_water: Option<ScanId>,
    issued: bool,
}

impl LedgerWrite<'_> {
    pub fn contains_barcode(&self, barcode: &str) -> bool {
        self.records.iter().any(|r| r.barcode == barcode)
    }

    pub fn barcodes(&self) -> HashSet<String> {
        self.records.iter().map(|r| r.barcode.clone()).collect()
    }

    /// Issue the next id. Ids issued by one write are consecutive.
    pub fn allocate_id(&mut self) -> std::result::Result<ScanId, StorageError> {
        let next = match self.high_water {
            Some(current) => current.next().ok_or_else(|| StorageError::IdsExhausted {
                path: self.ledger.path().to_path_buf(),
            })?,
            None => ScanId::first(),
        };
        self.high_water = Some(next);
        self.issued = true;
        Ok(next)
    }

    pub fn push(&mut self, record: ScanRecord) {
        self.records.push(record);
    }

    pub fn remove(&mut self, scan_id: ScanId) -> Option<ScanRecord> {
        let idx = self.records.iter().position(|r| r.scan_id == scan_id)?;
        Some(self.records.remove(idx))
    }

    /// Persist the table. The sequence sidecar is written first so a crash
    /// between the two writes can only leave a gap in ids, never a reuse.
    pub fn commit(self) -> Result<()> {
        let path = self.ledger.path();
        if self.issued {
            if let Some(high_water) = self.high_water {
                table::write_text(&self.ledger.sequence_path(), &format!("{}\n", high_water))?;
            }
        }
        table::write_table(path, &SCAN_HEADERS, &self.records)?;
        debug!(records = self.records.len(), "Committed ledger {}", path.display());
        Ok(())
    }
}
