//! CLI module for stocktake
//!
//! Each submodule owns the arguments and runner for a group of commands.

pub mod context;
pub mod error;
pub mod output;

pub mod ledger;
pub mod scan;
pub mod session;
pub mod store;
pub mod users;
