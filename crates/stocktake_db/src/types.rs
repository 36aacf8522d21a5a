//! Typed records for the user store and the scan ledger.
//!
//! Rows are parsed into these types at load time; nothing downstream sees
//! raw CSV fields.

use crate::error::{AuthFailure, StoreError};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// On-disk format of `created_date`: local time, second resolution.
pub const DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Delimiter between branch codes in the user store.
pub const BRANCH_DELIMITER: char = '|';

/// Permanent identifier of a scan record. Always positive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u64", into = "u64")]
pub struct ScanId(u64);

impl ScanId {
    /// Wrap a raw id; `None` for zero.
    pub fn new(value: u64) -> Option<Self> {
        (value > 0).then_some(Self(value))
    }

    pub fn get(self) -> u64 {
        self.0
    }

    /// The id following this one; `None` once the id space is used up.
    pub fn next(self) -> Option<Self> {
        self.0.checked_add(1).map(Self)
    }

    pub(crate) fn first() -> Self {
        Self(1)
    }
}

impl fmt::Display for ScanId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<u64> for ScanId {
    type Error = String;

    fn try_from(value: u64) -> Result<Self, Self::Error> {
        Self::new(value).ok_or_else(|| "scan_id must be positive".to_string())
    }
}

impl From<ScanId> for u64 {
    fn from(id: ScanId) -> Self {
        id.0
    }
}

impl FromStr for ScanId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let raw: u64 = s
            .trim()
            .parse()
            .map_err(|e| format!("invalid scan id '{}': {}", s, e))?;
        Self::try_from(raw)
    }
}

/// One row of the scan ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanRecord {
    pub scan_id: ScanId,
    pub barcode: String,
    pub created_by: String,
    pub branch_code: String,
    #[serde(with = "created_date")]
    pub created_date: NaiveDateTime,
}

/// One row of the user store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserRecord {
    pub username: String,
    pub password_hash: String,
    pub branches: Vec<String>,
}

impl UserRecord {
    /// Branch list as stored on disk.
    pub fn branches_field(&self) -> String {
        join_branches(&self.branches)
    }
}

/// An authenticated user and the branches they may record scans against.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Identity {
    pub username: String,
    pub branches: Vec<String>,
}

impl Identity {
    /// Initial branch selection after login: the first assigned branch.
    pub fn default_branch(&self) -> Option<&str> {
        self.branches.first().map(String::as_str)
    }

    pub fn has_branch(&self, branch: &str) -> bool {
        self.branches.iter().any(|b| b == branch)
    }

    /// Check that `branch` is assigned to this user.
    pub fn authorize_branch(&self, branch: &str) -> Result<(), AuthFailure> {
        if self.branches.is_empty() {
            return Err(AuthFailure::NoBranches(self.username.clone()));
        }
        if !self.has_branch(branch) {
            return Err(AuthFailure::BranchNotAssigned {
                username: self.username.clone(),
                branch: branch.to_string(),
            });
        }
        Ok(())
    }

    /// Resolve an explicit branch choice, falling back to the default branch.
    pub fn select_branch(&self, requested: Option<&str>) -> Result<String, AuthFailure> {
        let branch = match requested {
            Some(branch) => branch,
            None => self
                .default_branch()
                .ok_or_else(|| AuthFailure::NoBranches(self.username.clone()))?,
        };
        self.authorize_branch(branch)?;
        Ok(branch.to_string())
    }
}

/// A `(barcode, username, branch)` triple submitted for recording.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanCandidate {
    pub barcode: String,
    pub username: String,
    pub branch: String,
}

impl ScanCandidate {
    pub fn new(
        barcode: impl Into<String>,
        username: impl Into<String>,
        branch: impl Into<String>,
    ) -> Self {
        Self {
            barcode: barcode.into(),
            username: username.into(),
            branch: branch.into(),
        }
    }

    /// Reject candidates that could not be stored as a well-formed row.
    pub fn validate(&self) -> Result<(), StoreError> {
        if self.barcode.trim().is_empty() {
            return Err(StoreError::validation("barcode is empty"));
        }
        if self.barcode.chars().any(char::is_control) {
            return Err(StoreError::validation(format!(
                "barcode {:?} contains control characters",
                self.barcode
            )));
        }
        if self.username.trim().is_empty() {
            return Err(StoreError::validation(format!(
                "username is empty for barcode {}",
                self.barcode
            )));
        }
        if self.branch.trim().is_empty() {
            return Err(StoreError::validation(format!(
                "branch is empty for barcode {}",
                self.barcode
            )));
        }
        Ok(())
    }

    pub(crate) fn into_record(self, scan_id: ScanId, created_date: NaiveDateTime) -> ScanRecord {
        ScanRecord {
            scan_id,
            barcode: self.barcode,
            created_by: self.username,
            branch_code: self.branch,
            created_date,
        }
    }
}

/// Split a stored branch field. Empty members and the `nan` placeholder
/// written by dataframe exporters are dropped.
pub fn split_branches(field: &str) -> Vec<String> {
    let trimmed = field.trim();
    if trimmed.is_empty() || trimmed == "nan" {
        return Vec::new();
    }
    trimmed
        .split(BRANCH_DELIMITER)
        .map(str::trim)
        .filter(|b| !b.is_empty())
        .map(str::to_string)
        .collect()
}

pub fn join_branches(branches: &[String]) -> String {
    branches.join(&BRANCH_DELIMITER.to_string())
}

pub(crate) mod created_date {
    use super::DATE_FORMAT;
    use chrono::NaiveDateTime;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &NaiveDateTime, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&value.format(DATE_FORMAT).to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<NaiveDateTime, D::Error> {
        let raw = String::deserialize(d)?;
        NaiveDateTime::parse_from_str(raw.trim(), DATE_FORMAT).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity(branches: &[&str]) -> Identity {
        Identity {
            username: "alice".to_string(),
            branches: branches.iter().map(|b| b.to_string()).collect(),
        }
    }

    #[test]
    fn test_scan_id_next_stops_at_max() {
        assert_eq!(ScanId::new(41).unwrap().next(), ScanId::new(42));
        assert_eq!(ScanId::new(u64::MAX).unwrap().next(), None);
    }

    #[test]
    fn test_scan_id_rejects_zero() {
        assert!(ScanId::new(0).is_none());
        assert_eq!(ScanId::new(3).map(ScanId::get), Some(3));
        assert!("0".parse::<ScanId>().is_err());
        assert!("abc".parse::<ScanId>().is_err());
        assert_eq!(" 12 ".parse::<ScanId>().unwrap().get(), 12);
    }

    #[test]
    fn test_split_branches() {
        assert_eq!(split_branches("HQ|DXB|AUH"), vec!["HQ", "DXB", "AUH"]);
        assert!(split_branches("").is_empty());
        assert!(split_branches("nan").is_empty());
        assert_eq!(split_branches("HQ||DXB|"), vec!["HQ", "DXB"]);
    }

    #[test]
    fn test_branch_authorization() {
        let alice = identity(&["HQ", "DXB"]);
        assert_eq!(alice.default_branch(), Some("HQ"));
        assert!(alice.authorize_branch("DXB").is_ok());
        assert!(matches!(
            alice.authorize_branch("AUH"),
            Err(AuthFailure::BranchNotAssigned { .. })
        ));
        assert_eq!(alice.select_branch(None).unwrap(), "HQ");
        assert_eq!(alice.select_branch(Some("DXB")).unwrap(), "DXB");

        let nobody = identity(&[]);
        assert_eq!(nobody.default_branch(), None);
        assert!(matches!(
            nobody.select_branch(None),
            Err(AuthFailure::NoBranches(_))
        ));
    }

    #[test]
    fn test_candidate_validation() {
        assert!(ScanCandidate::new("BC1", "alice", "HQ").validate().is_ok());
        assert!(ScanCandidate::new("", "alice", "HQ").validate().is_err());
        assert!(ScanCandidate::new("   ", "alice", "HQ").validate().is_err());
        assert!(ScanCandidate::new("BC\n1", "alice", "HQ").validate().is_err());
        assert!(ScanCandidate::new("BC1", "", "HQ").validate().is_err());
        assert!(ScanCandidate::new("BC1", "alice", " ").validate().is_err());
    }
}
