//! stocktake: record barcode scans against authorized users and branches.

use clap::{Parser, Subcommand};
use std::process::ExitCode;
use stocktake_db::config::logs_dir;
use stocktake_logging::{init_logging, LogConfig};

mod cli;

use cli::context::StoreArgs;
use cli::ledger::{DeleteArgs, ListArgs};
use cli::scan::{IngestArgs, ScanArgs};
use cli::session::SessionArgs;
use cli::store::{CheckArgs, ConfigArgs, InitArgs};
use cli::users::{LoginArgs, UsersArgs};

#[derive(Parser, Debug)]
#[command(name = "stocktake", version, about = "Barcode scan ledger")]
struct Cli {
    /// Mirror log output on stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(flatten)]
    stores: StoreArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Create the user store and scan ledger if missing
    Init(InitArgs),
    /// Verify both stores can be read
    Check(CheckArgs),
    /// Show resolved paths and settings
    Config(ConfigArgs),
    /// Check credentials and show assigned branches
    Login(LoginArgs),
    /// List users and their branches
    Users(UsersArgs),
    /// Record one scanned barcode
    Scan(ScanArgs),
    /// Record barcodes from a file or stdin, skipping duplicates
    Ingest(IngestArgs),
    /// Collect scans interactively, then submit them together
    Session(SessionArgs),
    /// List recorded scans, newest first
    List(ListArgs),
    /// Remove a scan by id
    Delete(DeleteArgs),
}

fn command_wants_json(command: &Commands) -> bool {
    match command {
        Commands::Init(args) => args.json,
        Commands::Check(args) => args.json,
        Commands::Config(args) => args.json,
        Commands::Login(args) => args.json,
        Commands::Users(args) => args.json,
        Commands::Scan(args) => args.json,
        Commands::Ingest(args) => args.json,
        Commands::List(args) => args.json,
        Commands::Delete(args) => args.json,
        Commands::Session(_) => false,
    }
}

fn run_command(cli: Cli) -> anyhow::Result<()> {
    let stores = cli.stores;
    match cli.command {
        Commands::Init(args) => cli::store::run_init(args, &stores),
        Commands::Check(args) => cli::store::run_check(args, &stores),
        Commands::Config(args) => cli::store::run_config(args, &stores),
        Commands::Login(args) => cli::users::run_login(args, &stores),
        Commands::Users(args) => cli::users::run_users(args, &stores),
        Commands::Scan(args) => cli::scan::run_scan(args, &stores),
        Commands::Ingest(args) => cli::scan::run_ingest(args, &stores),
        Commands::Session(args) => cli::session::run(args, &stores),
        Commands::List(args) => cli::ledger::run_list(args, &stores),
        Commands::Delete(args) => cli::ledger::run_delete(args, &stores),
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let json_mode = command_wants_json(&cli.command);

    let log_config = LogConfig {
        app_name: "stocktake",
        log_dir: logs_dir(&cli.stores.home_dir()),
        verbose: cli.verbose,
    };
    if let Err(err) = init_logging(log_config) {
        eprintln!("Warning: file logging disabled: {:#}", err);
    }

    match run_command(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            if json_mode {
                cli::error::print_json_error(&err);
            } else {
                eprintln!("{:?}", err);
            }
            ExitCode::from(1)
        }
    }
}
