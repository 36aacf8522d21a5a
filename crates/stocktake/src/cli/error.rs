//! Helpful error types for CLI commands
//!
//! Every error includes:
//! - What went wrong
//! - Context about the situation
//! - Suggestions for how to fix it

use serde_json::json;
use std::fmt;
use std::path::Path;
use stocktake_db::{AuthFailure, ErrorKind, ScanId, StorageError, StoreError};

/// An error with helpful context and suggestions
#[derive(Debug)]
pub struct HelpfulError {
    /// The main error message
    pub message: String,
    /// Additional context about what was happening
    pub context: Option<String>,
    /// Suggestions for how to fix the error
    pub suggestions: Vec<String>,
    /// Store error category, when the error came from the store layer
    pub kind: Option<ErrorKind>,
}

impl HelpfulError {
    /// Create a new helpful error
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            context: None,
            suggestions: Vec::new(),
            kind: None,
        }
    }

    /// Add context to the error
    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    /// Add a suggestion for fixing the error
    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestions.push(suggestion.into());
        self
    }

    /// Add multiple suggestions
    pub fn with_suggestions(mut self, suggestions: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.suggestions.extend(suggestions.into_iter().map(|s| s.into()));
        self
    }

    fn with_kind(mut self, kind: ErrorKind) -> Self {
        self.kind = Some(kind);
        self
    }

    // === Common error constructors ===

    pub fn invalid_credentials(username: &str) -> Self {
        Self::new(format!("Login failed for '{}'", username))
            .with_context("Username or password is incorrect (usernames are case-sensitive)")
            .with_suggestions([
                "TRY: Check the username spelling and letter case".to_string(),
                "TRY: Pass the password with --password or STOCKTAKE_PASSWORD".to_string(),
            ])
            .with_kind(ErrorKind::Auth)
    }

    pub fn user_store_missing(path: &Path) -> Self {
        Self::new(format!("User store not found: {}", path.display()))
            .with_context("Logins are checked against the user store, which has not been created")
            .with_suggestions([
                "TRY: Create the stores: stocktake init".to_string(),
                "TRY: Point at an existing store: stocktake --users PATH ...".to_string(),
            ])
            .with_kind(ErrorKind::Auth)
    }

    pub fn branch_not_assigned(username: &str, branch: &str) -> Self {
        Self::new(format!("Branch '{}' is not assigned to '{}'", branch, username))
            .with_context("Scans can only be recorded against the user's assigned branches")
            .with_suggestions([
                format!("TRY: List assigned branches: stocktake login -u {}", username),
                "TRY: Omit --branch to use the default branch".to_string(),
            ])
            .with_kind(ErrorKind::Auth)
    }

    pub fn no_branches(username: &str) -> Self {
        Self::new(format!("No branches assigned to '{}'", username))
            .with_context("The user can log in but is not authorized to record scans anywhere")
            .with_suggestion("TRY: Re-run the user export with a branch assignment for this user")
            .with_kind(ErrorKind::Auth)
    }

    pub fn duplicate_barcode(barcode: &str) -> Self {
        Self::new(format!("Duplicate: {} is already recorded", barcode))
            .with_context("Each barcode can be recorded only once")
            .with_suggestion(format!(
                "TRY: Find the existing record: stocktake list | grep {}",
                barcode
            ))
            .with_kind(ErrorKind::Duplicate)
    }

    pub fn scan_not_found(scan_id: ScanId) -> Self {
        Self::new(format!("Scan {} not found", scan_id))
            .with_context("Nothing was deleted")
            .with_suggestion("TRY: List current scans and their ids: stocktake list")
            .with_kind(ErrorKind::NotFound)
    }

    pub fn invalid_scan(details: &str) -> Self {
        Self::new(format!("Invalid scan: {}", details))
            .with_suggestion("TRY: Barcodes must be non-empty single-line text")
            .with_kind(ErrorKind::Validation)
    }

    pub fn store_busy(details: &str) -> Self {
        Self::new("Store is busy")
            .with_context(details.to_string())
            .with_suggestions([
                "TRY: Retry in a moment; another session is writing".to_string(),
                "TRY: Raise the wait with STOCKTAKE_LOCK_TIMEOUT_MS".to_string(),
            ])
            .with_kind(ErrorKind::Storage)
    }

    pub fn storage(details: &str) -> Self {
        Self::new("Store could not be read or written")
            .with_context(details.to_string())
            .with_suggestions([
                "TRY: Check file permissions in the stocktake home directory".to_string(),
                "TRY: Run a health check: stocktake check".to_string(),
            ])
            .with_kind(ErrorKind::Storage)
    }

    pub fn input_not_found(path: &Path) -> Self {
        Self::new(format!("File not found: {}", path.display()))
            .with_context("The barcode list to ingest does not exist")
            .with_suggestion("TRY: Pass '-' or omit the path to read barcodes from stdin")
    }
}

/// Attach suggestions to a store error. `username` names the user of the
/// failing request, when there is one.
pub fn explain(err: StoreError, username: Option<&str>) -> HelpfulError {
    let user = username.unwrap_or("user");
    match &err {
        StoreError::Auth(AuthFailure::InvalidCredentials) => HelpfulError::invalid_credentials(user),
        StoreError::Auth(AuthFailure::StoreMissing(path)) => HelpfulError::user_store_missing(path),
        StoreError::Auth(AuthFailure::BranchNotAssigned { username, branch }) => {
            HelpfulError::branch_not_assigned(username, branch)
        }
        StoreError::Auth(AuthFailure::NoBranches(username)) => HelpfulError::no_branches(username),
        StoreError::Auth(AuthFailure::Unreadable(details)) => {
            HelpfulError::storage(details).with_kind(ErrorKind::Auth)
        }
        StoreError::Duplicate { barcode } => HelpfulError::duplicate_barcode(barcode),
        StoreError::NotFound(id) => HelpfulError::scan_not_found(*id),
        StoreError::Validation(details) => HelpfulError::invalid_scan(details),
        StoreError::Storage(StorageError::Lock(lock)) => HelpfulError::store_busy(&lock.to_string()),
        StoreError::Storage(storage) => HelpfulError::storage(&storage.to_string()),
    }
}

impl From<StoreError> for HelpfulError {
    fn from(err: StoreError) -> Self {
        explain(err, None)
    }
}

fn kind_name(kind: ErrorKind) -> &'static str {
    match kind {
        ErrorKind::Auth => "auth",
        ErrorKind::Duplicate => "duplicate",
        ErrorKind::NotFound => "not_found",
        ErrorKind::Validation => "validation",
        ErrorKind::Storage => "storage",
    }
}

/// JSON body printed for a failed command in `--json` mode.
pub fn json_error(err: &anyhow::Error) -> serde_json::Value {
    if let Some(helpful) = err.downcast_ref::<HelpfulError>() {
        return json!({
            "error": {
                "kind": helpful.kind.map(kind_name),
                "message": helpful.message,
                "context": helpful.context,
                "suggestions": helpful.suggestions,
            }
        });
    }
    let kind = err.downcast_ref::<StoreError>().map(|e| kind_name(e.kind()));
    json!({
        "error": {
            "kind": kind,
            "message": format!("{:#}", err),
            "context": null,
            "suggestions": [],
        }
    })
}

pub fn print_json_error(err: &anyhow::Error) {
    println!("{}", json_error(err));
}

impl fmt::Display for HelpfulError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "ERROR: {}", self.message)?;

        if let Some(ctx) = &self.context {
            writeln!(f, "CONTEXT: {}", ctx)?;
        }

        if !self.suggestions.is_empty() {
            writeln!(f)?;
            for suggestion in &self.suggestions {
                writeln!(f, "  {}", suggestion)?;
            }
        }

        Ok(())
    }
}

impl std::error::Error for HelpfulError {}
