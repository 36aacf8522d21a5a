//! Batch ingestion of scans collected offline.
//!
//! Candidates already in the ledger, or repeated earlier in the same batch,
//! are dropped silently; the caller only learns how many were accepted.
//! Accepted records share one timestamp and are written in a single
//! atomic replace of the ledger.

use crate::error::Result;
use crate::ledger::ScanLedger;
use crate::types::{ScanCandidate, ScanId};
use serde::Serialize;
use tracing::{debug, info};

/// Result of one ingest call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BatchOutcome {
    pub accepted: usize,
    pub skipped: usize,
    /// Id range issued to the accepted records, in input order
    pub first_id: Option<ScanId>,
    pub last_id: Option<ScanId>,
}

pub struct BatchIngestor<'a> {
    ledger: &'a ScanLedger,
}

impl<'a> BatchIngestor<'a> {
    pub fn new(ledger: &'a ScanLedger) -> Self {
        Self { ledger }
    }

    /// Ingest `candidates` in order.
    ///
    /// Every candidate is validated before the ledger is touched; one
    /// malformed candidate fails the whole call with nothing written.
    pub fn ingest(&self, candidates: &[ScanCandidate]) -> Result<BatchOutcome> {
        for candidate in candidates {
            candidate.validate()?;
        }
        if candidates.is_empty() {
            return Ok(BatchOutcome::default());
        }

        let mut write = self.ledger.begin_write()?;
        let mut present = write.barcodes();
        let timestamp = self.ledger.now();
        let mut outcome = BatchOutcome::default();

        for candidate in candidates {
            if present.contains(&candidate.barcode) {
                outcome.skipped += 1;
                continue;
            }
            let scan_id = write.allocate_id()?;
            present.insert(candidate.barcode.clone());
            write.push(candidate.clone().into_record(scan_id, timestamp));

            outcome.first_id.get_or_insert(scan_id);
            outcome.last_id = Some(scan_id);
            outcome.accepted += 1;
        }

        if outcome.accepted == 0 {
            debug!(skipped = outcome.skipped, "Batch contained only duplicates, nothing written");
            return Ok(outcome);
        }

        write.commit()?;
        info!(
            accepted = outcome.accepted,
            skipped = outcome.skipped,
            first_id = ?outcome.first_id,
            last_id = ?outcome.last_id,
            "Ingested batch"
        );
        Ok(outcome)
    }
}

impl ScanLedger {
    /// Shorthand for `BatchIngestor::new(self).ingest(candidates)`.
    pub fn ingest_batch(&self, candidates: &[ScanCandidate]) -> Result<BatchOutcome> {
        BatchIngestor::new(self).ingest(candidates)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use crate::error::ErrorKind;
    use crate::types::DATE_FORMAT;
    use chrono::NaiveDateTime;
    use std::fs;
    use tempfile::TempDir;

    fn ledger(temp: &TempDir) -> ScanLedger {
        let now = NaiveDateTime::parse_from_str("2024-05-02 14:00:00", DATE_FORMAT).unwrap();
        ScanLedger::new(temp.path().join("scans.csv")).with_clock(FixedClock(now))
    }

    fn batch(barcodes: &[&str]) -> Vec<ScanCandidate> {
        barcodes
            .iter()
            .map(|b| ScanCandidate::new(*b, "alice", "HQ"))
            .collect()
    }

    #[test]
    fn test_skips_existing_and_repeated() {
        let temp = TempDir::new().unwrap();
        let ledger = ledger(&temp);
        ledger.insert_one("BC1", "alice", "HQ").unwrap();

        let outcome = ledger.ingest_batch(&batch(&["BC1", "BC2", "BC2"])).unwrap();
        assert_eq!(outcome.accepted, 1);
        assert_eq!(outcome.skipped, 2);
        assert_eq!(outcome.first_id.map(ScanId::get), Some(2));

        let records = ledger.list_all().unwrap();
        assert_eq!(records.len(), 2);
        let bc2 = records.iter().find(|r| r.barcode == "BC2").unwrap();
        assert_eq!(bc2.scan_id.get(), 2);
    }

    #[test]
    fn test_resubmission_accepts_nothing() {
        let temp = TempDir::new().unwrap();
        let ledger = ledger(&temp);
        let candidates = batch(&["A", "B", "C"]);

        assert_eq!(ledger.ingest_batch(&candidates).unwrap().accepted, 3);
        let before = fs::read_to_string(ledger.path()).unwrap();

        let again = ledger.ingest_batch(&candidates).unwrap();
        assert_eq!(again.accepted, 0);
        assert_eq!(again.skipped, 3);
        assert_eq!(fs::read_to_string(ledger.path()).unwrap(), before);
    }

    #[test]
    fn test_consecutive_ids_and_shared_timestamp() {
        let temp = TempDir::new().unwrap();
        let ledger = ledger(&temp);
        ledger.insert_one("X", "alice", "HQ").unwrap();

        let outcome = ledger.ingest_batch(&batch(&["A", "B", "C"])).unwrap();
        assert_eq!(outcome.first_id.map(ScanId::get), Some(2));
        assert_eq!(outcome.last_id.map(ScanId::get), Some(4));

        let records = ledger.list_all().unwrap();
        let stamps: std::collections::HashSet<_> =
            records.iter().map(|r| r.created_date).collect();
        assert_eq!(stamps.len(), 1);

        let next = ledger.insert_one("D", "alice", "HQ").unwrap();
        assert_eq!(next.scan_id.get(), 5);
    }

    #[test]
    fn test_all_duplicates_does_not_create_ledger() {
        let temp = TempDir::new().unwrap();
        let ledger = ledger(&temp);
        let outcome = ledger.ingest_batch(&[]).unwrap();
        assert_eq!(outcome, BatchOutcome::default());
        assert!(!ledger.exists_on_disk());
    }

    #[test]
    fn test_invalid_candidate_fails_whole_batch() {
        let temp = TempDir::new().unwrap();
        let ledger = ledger(&temp);
        let err = ledger.ingest_batch(&batch(&["A", "", "B"])).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert!(ledger.list_all().unwrap().is_empty());
    }

    #[test]
    fn test_ids_continue_after_deletes() {
        let temp = TempDir::new().unwrap();
        let ledger = ledger(&temp);
        ledger.ingest_batch(&batch(&["A", "B"])).unwrap();
        ledger.delete_by_id(ScanId::new(2).unwrap()).unwrap();

        let outcome = ledger.ingest_batch(&batch(&["B", "C"])).unwrap();
        assert_eq!(outcome.accepted, 2);
        assert_eq!(outcome.first_id.map(ScanId::get), Some(3));
        assert_eq!(outcome.last_id.map(ScanId::get), Some(4));
    }

    #[test]
    fn test_exhausted_sequence_fails_batch() {
        let temp = TempDir::new().unwrap();
        let ledger = ledger(&temp);
        fs::write(ledger.sequence_path(), format!("{}\n", u64::MAX)).unwrap();

        let err = ledger.ingest_batch(&batch(&["A", "B"])).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Storage);
        assert!(ledger.list_all().unwrap().is_empty());
        assert!(!ledger.exists_on_disk());
    }
}
