//! Credential store: read-only user lookup and password verification.
//!
//! The store is a CSV file written by the external provisioning job:
//!
//! ```text
//! username,password_hash,branches
//! admin,21232f297a57a5a743894a0e4a801fc3,HeadOffice
//! alice,...,DXB|AUH
//! ```
//!
//! The legacy header `password` is accepted for the digest column.

use crate::error::{AuthFailure, Result, StorageError};
use crate::table::{self, Row};
use crate::types::{split_branches, Identity, UserRecord};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

pub(crate) const USER_HEADERS: [&str; 3] = ["username", "password_hash", "branches"];

/// Password digest scheme of the user store.
///
/// Only the legacy unsalted MD5 hex digest exists, because that is what the
/// provisioning job writes. It is fast and collision-prone and must not be
/// considered adequate credential storage; moving to a salted KDF needs a
/// coordinated change of the provisioning job and a new variant here.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PasswordScheme {
    #[default]
    LegacyMd5,
}

impl PasswordScheme {
    /// Lowercase hex digest of `password`.
    pub fn digest(self, password: &str) -> String {
        match self {
            PasswordScheme::LegacyMd5 => format!("{:x}", md5::compute(password.as_bytes())),
        }
    }

    pub fn verify(self, password: &str, stored: &str) -> bool {
        self.digest(password).eq_ignore_ascii_case(stored.trim())
    }
}

#[derive(Debug, Deserialize)]
struct UserRow {
    username: String,
    #[serde(alias = "password")]
    password_hash: String,
    #[serde(default)]
    branches: String,
}

#[derive(Serialize)]
struct UserRowRef<'a> {
    username: &'a str,
    password_hash: &'a str,
    branches: String,
}

/// Handle on the user store file. Every call reads the file afresh.
#[derive(Debug, Clone)]
pub struct CredentialStore {
    path: PathBuf,
    scheme: PasswordScheme,
}

impl CredentialStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            scheme: PasswordScheme::default(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn scheme(&self) -> PasswordScheme {
        self.scheme
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Load every user record.
    ///
    /// A missing store loads as `Ok(None)`. Rows with an empty username or a
    /// username seen earlier in the file are rejected.
    pub fn load(&self) -> std::result::Result<Option<Vec<UserRecord>>, StorageError> {
        let rows: Vec<Row<UserRow>> = match table::read_table(&self.path, &["username"])? {
            Some(rows) => rows,
            None => return Ok(None),
        };

        let mut seen = HashSet::new();
        let mut users = Vec::with_capacity(rows.len());
        for Row { line, value } in rows {
            if value.username.is_empty() {
                return Err(StorageError::corrupt(&self.path, line, "empty username"));
            }
            if !seen.insert(value.username.clone()) {
                return Err(StorageError::corrupt(
                    &self.path,
                    line,
                    format!("duplicate username '{}'", value.username),
                ));
            }
            users.push(UserRecord {
                username: value.username,
                password_hash: value.password_hash.trim().to_string(),
                branches: split_branches(&value.branches),
            });
        }
        Ok(Some(users))
    }

    /// All users; a missing store yields an empty list.
    pub fn users(&self) -> Result<Vec<UserRecord>> {
        Ok(self.load()?.unwrap_or_default())
    }

    /// Verify `password` for `username` and return their identity.
    ///
    /// The username match is exact and case-sensitive. An identity with no
    /// branches is still a successful login.
    pub fn authenticate(&self, username: &str, password: &str) -> Result<Identity> {
        let users = match self.load() {
            Ok(Some(users)) => users,
            Ok(None) => {
                warn!("Login attempt with missing user store: {}", self.path.display());
                return Err(AuthFailure::StoreMissing(self.path.clone()).into());
            }
            Err(e) => {
                warn!("User store unreadable: {}", e);
                return Err(AuthFailure::Unreadable(e.to_string()).into());
            }
        };

        let matched = users
            .into_iter()
            .find(|u| u.username == username && self.scheme.verify(password, &u.password_hash));

        match matched {
            Some(user) => {
                debug!(user = %user.username, branches = user.branches.len(), "Login accepted");
                Ok(Identity {
                    username: user.username,
                    branches: user.branches,
                })
            }
            None => {
                info!(user = %username, "Login rejected");
                Err(AuthFailure::InvalidCredentials.into())
            }
        }
    }

    /// Write a fresh store containing `users`. Used by bootstrap only.
    pub(crate) fn create(&self, users: &[UserRecord]) -> std::result::Result<(), StorageError> {
        table::ensure_parent(&self.path)?;
        let rows: Vec<UserRowRef<'_>> = users
            .iter()
            .map(|u| UserRowRef {
                username: &u.username,
                password_hash: &u.password_hash,
                branches: u.branches_field(),
            })
            .collect();
        table::write_table(&self.path, &USER_HEADERS, &rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StoreError;
    use std::fs;
    use tempfile::TempDir;

    fn store_with(content: &str) -> (TempDir, CredentialStore) {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("users.csv");
        fs::write(&path, content).unwrap();
        (temp, CredentialStore::new(path))
    }

    #[test]
    fn test_md5_digest() {
        assert_eq!(
            PasswordScheme::LegacyMd5.digest("admin"),
            "21232f297a57a5a743894a0e4a801fc3"
        );
        assert!(PasswordScheme::LegacyMd5.verify("admin", "21232F297A57A5A743894A0E4A801FC3"));
        assert!(!PasswordScheme::LegacyMd5.verify("Admin", "21232f297a57a5a743894a0e4a801fc3"));
    }

    #[test]
    fn test_authenticate_success() {
        let hash = PasswordScheme::LegacyMd5.digest("s3cret");
        let (_temp, store) = store_with(&format!(
            "username,password_hash,branches\nalice,{},DXB|AUH\n",
            hash
        ));
        let identity = store.authenticate("alice", "s3cret").unwrap();
        assert_eq!(identity.username, "alice");
        assert_eq!(identity.branches, vec!["DXB", "AUH"]);
    }

    #[test]
    fn test_wrong_password_and_unknown_user() {
        let hash = PasswordScheme::LegacyMd5.digest("s3cret");
        let (_temp, store) = store_with(&format!(
            "username,password_hash,branches\nalice,{},DXB\n",
            hash
        ));
        assert!(matches!(
            store.authenticate("alice", "wrong"),
            Err(StoreError::Auth(AuthFailure::InvalidCredentials))
        ));
        assert!(matches!(
            store.authenticate("ALICE", "s3cret"),
            Err(StoreError::Auth(AuthFailure::InvalidCredentials))
        ));
        assert!(matches!(
            store.authenticate("bob", "s3cret"),
            Err(StoreError::Auth(AuthFailure::InvalidCredentials))
        ));
    }

    #[test]
    fn test_missing_store() {
        let temp = TempDir::new().unwrap();
        let store = CredentialStore::new(temp.path().join("users.csv"));
        assert!(matches!(
            store.authenticate("admin", "admin"),
            Err(StoreError::Auth(AuthFailure::StoreMissing(_)))
        ));
        assert!(store.users().unwrap().is_empty());
    }

    #[test]
    fn test_empty_branches_is_not_failure() {
        let hash = PasswordScheme::LegacyMd5.digest("pw");
        let (_temp, store) = store_with(&format!(
            "username,password_hash,branches\nbob,{},\ncarol,{},nan\n",
            hash, hash
        ));
        assert!(store.authenticate("bob", "pw").unwrap().branches.is_empty());
        assert!(store.authenticate("carol", "pw").unwrap().branches.is_empty());
    }

    #[test]
    fn test_legacy_password_header_and_missing_branches_column() {
        let hash = PasswordScheme::LegacyMd5.digest("pw");
        let (_temp, store) = store_with(&format!("username,password\ndave,{}\n", hash));
        let identity = store.authenticate("dave", "pw").unwrap();
        assert!(identity.branches.is_empty());
    }

    #[test]
    fn test_duplicate_username_is_unreadable() {
        let (_temp, store) = store_with(
            "username,password_hash,branches\nalice,aaa,HQ\nalice,bbb,DXB\n",
        );
        assert!(matches!(
            store.load(),
            Err(StorageError::Corrupt { line: 3, .. })
        ));
        assert!(matches!(
            store.authenticate("alice", "x"),
            Err(StoreError::Auth(AuthFailure::Unreadable(_)))
        ));
    }

    #[test]
    fn test_create_round_trips() {
        let temp = TempDir::new().unwrap();
        let store = CredentialStore::new(temp.path().join("nested/users.csv"));
        let users = vec![UserRecord {
            username: "admin".to_string(),
            password_hash: PasswordScheme::LegacyMd5.digest("admin"),
            branches: vec!["HeadOffice".to_string(), "DXB".to_string()],
        }];
        store.create(&users).unwrap();

        let content = fs::read_to_string(store.path()).unwrap();
        assert!(content.starts_with("username,password_hash,branches\n"));
        assert!(content.contains("HeadOffice|DXB"));
        assert_eq!(store.users().unwrap(), users);
    }
}
