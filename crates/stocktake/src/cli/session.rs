//! Interactive scan session on stdin.
//!
//! Each input line is a barcode and goes to the pending list with immediate
//! feedback. Lines starting with `:` are session commands. End of input
//! submits whatever is pending.

use crate::cli::context::{AuthArgs, StoreArgs, Stores};
use crate::cli::error::explain;
use crate::cli::output::plural;
use clap::Args;
use std::io::{self, BufRead, Write};
use stocktake_db::{AddOutcome, BatchOutcome, ScanSession, StoreError};
use tracing::{info, warn};

#[derive(Debug, Args)]
pub struct SessionArgs {
    #[command(flatten)]
    pub auth: AuthArgs,

    /// Branch to record against (default: the user's first branch)
    #[arg(short, long)]
    pub branch: Option<String>,
}

const HELP: &str = "\
Scan or type a barcode per line. Commands:
  :list          show pending scans
  :clear         drop pending scans
  :submit        record pending scans now
  :branch CODE   switch branch for later scans
  :quit          leave without submitting
End of input submits pending scans.";

/// Totals over the whole session.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SessionSummary {
    pub accepted: usize,
    pub skipped: usize,
    pub discarded: usize,
}

impl SessionSummary {
    fn absorb(&mut self, outcome: &BatchOutcome) {
        self.accepted += outcome.accepted;
        self.skipped += outcome.skipped;
    }
}

enum Command<'a> {
    List,
    Clear,
    Submit,
    Branch(&'a str),
    Quit,
    Help,
    Unknown(&'a str),
}

fn parse_command(line: &str) -> Option<Command<'_>> {
    let rest = line.strip_prefix(':')?;
    let mut parts = rest.splitn(2, char::is_whitespace);
    let name = parts.next().unwrap_or_default();
    let arg = parts.next().map(str::trim).unwrap_or_default();
    Some(match name {
        "list" | "l" => Command::List,
        "clear" => Command::Clear,
        "submit" | "s" => Command::Submit,
        "branch" | "b" => Command::Branch(arg),
        "quit" | "q" => Command::Quit,
        "help" | "h" | "?" => Command::Help,
        _ => Command::Unknown(rest),
    })
}

pub fn run(args: SessionArgs, store_args: &StoreArgs) -> anyhow::Result<()> {
    let stores = Stores::open(store_args)?;
    let (identity, branch) = stores.login_at(&args.auth, args.branch.as_deref())?;
    let username = identity.username.clone();
    let mut session = ScanSession::start(&stores.ledger, identity, &branch)
        .map_err(|e| explain(e, Some(&username)))?;

    let stdout = io::stdout();
    let mut out = stdout.lock();
    writeln!(out, "Session for {} at {}. Type :help for commands.", username, branch)?;

    let summary = run_loop(&mut session, io::stdin().lock(), &mut out)?;
    info!(
        accepted = summary.accepted,
        skipped = summary.skipped,
        discarded = summary.discarded,
        "Scan session ended"
    );
    writeln!(
        out,
        "Session closed: {} recorded, {} skipped",
        plural(summary.accepted, "scan"),
        plural(summary.skipped, "duplicate")
    )?;
    Ok(())
}

/// Drive a session from `input`, writing feedback to `out`.
///
/// Per-line problems are reported and the loop continues. A failed submit at
/// end of input is returned as an error with the pending list intact.
pub fn run_loop<R: BufRead, W: Write>(
    session: &mut ScanSession<'_>,
    input: R,
    out: &mut W,
) -> anyhow::Result<SessionSummary> {
    let mut summary = SessionSummary::default();

    for line in input.lines() {
        let line = line?;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let Some(command) = parse_command(line) else {
            match session.add(line) {
                Ok(AddOutcome::Added) => {
                    writeln!(out, "+ {} ({} pending)", line, session.len())?
                }
                Ok(AddOutcome::AlreadyPending) => {
                    writeln!(out, "= {} already in this session", line)?
                }
                Ok(AddOutcome::AlreadyRecorded) => {
                    writeln!(out, "! {} already recorded", line)?
                }
                Err(err) => report(out, &err)?,
            }
            continue;
        };

        match command {
            Command::List => {
                if session.is_empty() {
                    writeln!(out, "No pending scans")?;
                }
                for (idx, candidate) in session.pending().iter().enumerate() {
                    writeln!(out, "{:>4}  {}  {}", idx + 1, candidate.barcode, candidate.branch)?;
                }
            }
            Command::Clear => {
                let dropped = session.len();
                session.clear();
                writeln!(out, "Cleared {}", plural(dropped, "pending scan"))?;
            }
            Command::Submit => match session.submit() {
                Ok(outcome) => {
                    summary.absorb(&outcome);
                    write_outcome(out, &outcome)?;
                }
                Err(err) => report(out, &err)?,
            },
            Command::Branch(code) => match session.select_branch(code) {
                Ok(()) => writeln!(out, "Branch: {}", session.branch())?,
                Err(err) => report(out, &err)?,
            },
            Command::Quit => {
                summary.discarded = session.len();
                if summary.discarded > 0 {
                    warn!(discarded = summary.discarded, "Session quit with pending scans");
                    writeln!(out, "Discarded {}", plural(summary.discarded, "pending scan"))?;
                }
                return Ok(summary);
            }
            Command::Help => writeln!(out, "{}", HELP)?,
            Command::Unknown(name) => writeln!(out, "Unknown command ':{}'; try :help", name)?,
        }
    }

    if !session.is_empty() {
        let username = session.identity().username.clone();
        let outcome = session.submit().map_err(|e| explain(e, Some(&username)))?;
        summary.absorb(&outcome);
        write_outcome(out, &outcome)?;
    }
    Ok(summary)
}

fn write_outcome<W: Write>(out: &mut W, outcome: &BatchOutcome) -> io::Result<()> {
    writeln!(
        out,
        "Submitted: {} recorded, {} skipped",
        plural(outcome.accepted, "scan"),
        plural(outcome.skipped, "duplicate")
    )
}

fn report<W: Write>(out: &mut W, err: &StoreError) -> io::Result<()> {
    writeln!(out, "x {}", err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use stocktake_db::{Identity, ScanLedger};
    use tempfile::TempDir;

    fn alice() -> Identity {
        Identity {
            username: "alice".to_string(),
            branches: vec!["HQ".to_string(), "DXB".to_string()],
        }
    }

    fn drive(ledger: &ScanLedger, input: &str) -> (SessionSummary, String) {
        let mut session = ScanSession::start(ledger, alice(), "HQ").unwrap();
        let mut out = Vec::new();
        let summary = run_loop(&mut session, input.as_bytes(), &mut out).unwrap();
        (summary, String::from_utf8(out).unwrap())
    }

    #[test]
    fn test_eof_submits_pending() {
        let temp = TempDir::new().unwrap();
        let ledger = ScanLedger::new(temp.path().join("scans.csv"));
        ledger.insert_one("BC1", "bob", "HQ").unwrap();

        let (summary, out) = drive(&ledger, "BC1\nBC2\nBC2\nBC3\n");
        assert_eq!(summary.accepted, 2);
        assert!(out.contains("! BC1 already recorded"));
        assert!(out.contains("= BC2 already in this session"));
        assert_eq!(ledger.list_all().unwrap().len(), 3);
    }

    #[test]
    fn test_quit_discards_pending() {
        let temp = TempDir::new().unwrap();
        let ledger = ScanLedger::new(temp.path().join("scans.csv"));

        let (summary, out) = drive(&ledger, "BC1\n:submit\nBC2\n:quit\nBC3\n");
        assert_eq!(summary.accepted, 1);
        assert_eq!(summary.discarded, 1);
        assert!(out.contains("Discarded 1 pending scan"));
        let records = ledger.list_all().unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].barcode, "BC1");
    }

    #[test]
    fn test_branch_switch_and_clear() {
        let temp = TempDir::new().unwrap();
        let ledger = ScanLedger::new(temp.path().join("scans.csv"));

        let (summary, out) = drive(
            &ledger,
            "BC1\n:clear\n:branch AUH\n:branch DXB\nBC2\n:list\n",
        );
        assert!(out.contains("Cleared 1 pending scan"));
        assert!(out.contains("x "), "unassigned branch is reported: {}", out);
        assert!(out.contains("Branch: DXB"));
        assert_eq!(summary.accepted, 1);

        let records = ledger.list_all().unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].branch_code, "DXB");
    }

    #[test]
    fn test_unknown_command() {
        let temp = TempDir::new().unwrap();
        let ledger = ScanLedger::new(temp.path().join("scans.csv"));
        let (summary, out) = drive(&ledger, ":frobnicate\n");
        assert_eq!(summary, SessionSummary::default());
        assert!(out.contains("Unknown command ':frobnicate'"));
    }
}
