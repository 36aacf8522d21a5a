//! Store resolution and login shared by commands.

use crate::cli::error::{explain, HelpfulError};
use clap::Args;
use std::path::{Path, PathBuf};
use stocktake_db::{
    bootstrap, stocktake_home, CredentialStore, Identity, ScanLedger, StoreConfig,
};
use tracing::info;

/// Flags that override where the stores live.
#[derive(Debug, Clone, Default, Args)]
pub struct StoreArgs {
    /// Home directory (default: STOCKTAKE_HOME or ~/.stocktake)
    #[arg(long, global = true, value_name = "DIR")]
    pub home: Option<PathBuf>,

    /// User store file
    #[arg(long, global = true, value_name = "FILE")]
    pub users: Option<PathBuf>,

    /// Scan ledger file
    #[arg(long, global = true, value_name = "FILE")]
    pub scans: Option<PathBuf>,
}

/// Credentials for commands that act as a user.
#[derive(Debug, Clone, Args)]
pub struct AuthArgs {
    /// Username (case-sensitive)
    #[arg(short, long)]
    pub user: String,

    /// Password
    #[arg(short, long, env = "STOCKTAKE_PASSWORD", hide_env_values = true)]
    pub password: String,
}

impl StoreArgs {
    pub fn home_dir(&self) -> PathBuf {
        self.home
            .as_deref()
            .map(absolute)
            .unwrap_or_else(stocktake_home)
    }

    /// Defaults, then config file and environment, then these flags.
    pub fn resolve(&self) -> anyhow::Result<StoreConfig> {
        let mut config = StoreConfig::load(self.home_dir()).map_err(|e| {
            HelpfulError::new("Invalid stocktake configuration")
                .with_context(e.to_string())
                .with_suggestion("TRY: Show the resolved settings: stocktake config")
        })?;
        if let Some(users) = &self.users {
            config = config.with_users_path(absolute(users));
        }
        if let Some(scans) = &self.scans {
            config = config.with_scans_path(absolute(scans));
        }
        Ok(config)
    }
}

/// Command-line paths are relative to the working directory, not home.
fn absolute(path: &Path) -> PathBuf {
    if path.is_absolute() {
        return path.to_path_buf();
    }
    std::env::current_dir()
        .map(|cwd| cwd.join(path))
        .unwrap_or_else(|_| path.to_path_buf())
}

/// Resolved and bootstrapped stores.
pub struct Stores {
    pub config: StoreConfig,
    pub credentials: CredentialStore,
    pub ledger: ScanLedger,
}

impl Stores {
    pub fn open(args: &StoreArgs) -> anyhow::Result<Self> {
        let config = args.resolve()?;
        let report = bootstrap(&config).map_err(|e| explain(e, None))?;
        if report.users_created {
            info!(path = %config.users_path.display(), "Created user store");
        }
        Ok(Self {
            credentials: CredentialStore::new(&config.users_path),
            ledger: ScanLedger::from_config(&config),
            config,
        })
    }

    pub fn login(&self, auth: &AuthArgs) -> anyhow::Result<Identity> {
        let identity = self
            .credentials
            .authenticate(&auth.user, &auth.password)
            .map_err(|e| explain(e, Some(&auth.user)))?;
        info!(user = %identity.username, "Logged in");
        Ok(identity)
    }

    /// Log in and pick the working branch.
    pub fn login_at(
        &self,
        auth: &AuthArgs,
        branch: Option<&str>,
    ) -> anyhow::Result<(Identity, String)> {
        let identity = self.login(auth)?;
        let branch = identity
            .select_branch(branch)
            .map_err(|e| explain(e.into(), Some(&auth.user)))?;
        Ok((identity, branch))
    }
}
