//! Offline scan sessions.
//!
//! A session belongs to one authenticated user working at one branch. Scans
//! are collected into a pending list with immediate feedback, then submitted
//! together through batch ingestion.

use crate::batch::BatchOutcome;
use crate::error::Result;
use crate::ledger::ScanLedger;
use crate::types::{Identity, ScanCandidate};
use serde::Serialize;
use tracing::debug;

/// What happened to a barcode offered to the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AddOutcome {
    Added,
    /// Already in this session's pending list
    AlreadyPending,
    /// Already present in the ledger
    AlreadyRecorded,
}

pub struct ScanSession<'a> {
    ledger: &'a ScanLedger,
    identity: Identity,
    branch: String,
    pending: Vec<ScanCandidate>,
}

impl<'a> ScanSession<'a> {
    /// Start a session. `branch` must be assigned to `identity`.
    pub fn start(ledger: &'a ScanLedger, identity: Identity, branch: &str) -> Result<Self> {
        identity.authorize_branch(branch)?;
        debug!(user = %identity.username, branch, "Scan session started");
        Ok(Self {
            ledger,
            identity,
            branch: branch.to_string(),
            pending: Vec::new(),
        })
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    pub fn branch(&self) -> &str {
        &self.branch
    }

    /// Switch branch; pending scans keep the branch they were added under.
    pub fn select_branch(&mut self, branch: &str) -> Result<()> {
        self.identity.authorize_branch(branch)?;
        self.branch = branch.to_string();
        Ok(())
    }

    /// Offer a scanned barcode.
    ///
    /// The ledger check here is advisory: `submit` skips anything recorded
    /// in the meantime.
    pub fn add(&mut self, barcode: &str) -> Result<AddOutcome> {
        let candidate = ScanCandidate::new(barcode, &self.identity.username, &self.branch);
        candidate.validate()?;

        if self.pending.iter().any(|p| p.barcode == candidate.barcode) {
            return Ok(AddOutcome::AlreadyPending);
        }
        if self.ledger.exists(&candidate.barcode)? {
            return Ok(AddOutcome::AlreadyRecorded);
        }
        self.pending.push(candidate);
        Ok(AddOutcome::Added)
    }

    pub fn pending(&self) -> &[ScanCandidate] {
        &self.pending
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn clear(&mut self) {
        self.pending.clear();
    }

    /// Ingest the pending list. It is cleared only if ingestion succeeds.
    pub fn submit(&mut self) -> Result<BatchOutcome> {
        let outcome = self.ledger.ingest_batch(&self.pending)?;
        self.pending.clear();
        Ok(outcome)
    }
}
