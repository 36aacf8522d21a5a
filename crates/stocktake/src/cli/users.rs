//! `login` and `users` commands.

use crate::cli::context::{AuthArgs, StoreArgs, Stores};
use crate::cli::error::explain;
use crate::cli::output::{print_json, print_table};
use clap::Args;
use serde_json::json;

#[derive(Debug, Args)]
pub struct LoginArgs {
    #[command(flatten)]
    pub auth: AuthArgs,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Args)]
pub struct UsersArgs {
    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

/// Verify credentials and show the user's branches.
pub fn run_login(args: LoginArgs, store_args: &StoreArgs) -> anyhow::Result<()> {
    let stores = Stores::open(store_args)?;
    let identity = stores.login(&args.auth)?;

    if args.json {
        return print_json(&json!({
            "username": identity.username,
            "branches": identity.branches,
            "default_branch": identity.default_branch(),
        }));
    }

    println!("Logged in as {}", identity.username);
    match identity.default_branch() {
        Some(default) => {
            println!("Branches: {}", identity.branches.join(", "));
            println!("Default:  {}", default);
        }
        None => println!("WARNING: no branches assigned; scans will be rejected"),
    }
    Ok(())
}

/// Usernames and branch assignments. Password digests are never shown.
pub fn run_users(args: UsersArgs, store_args: &StoreArgs) -> anyhow::Result<()> {
    let stores = Stores::open(store_args)?;
    let users = stores.credentials.users().map_err(|e| explain(e, None))?;

    if args.json {
        let body: Vec<_> = users
            .iter()
            .map(|u| json!({ "username": u.username, "branches": u.branches }))
            .collect();
        return print_json(&body);
    }

    if users.is_empty() {
        println!("No users.");
        return Ok(());
    }

    let rows = users
        .iter()
        .map(|u| {
            let branches = if u.branches.is_empty() {
                "-".to_string()
            } else {
                u.branches.join(", ")
            };
            vec![u.username.clone(), branches]
        })
        .collect();
    print_table(&["USERNAME", "BRANCHES"], rows);
    Ok(())
}
