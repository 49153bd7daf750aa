//! `recur` -- query RFC 5545 recurrence rules from the shell.
//!
//! Output goes to stdout (plain text, or JSON with `--json`); logs go to
//! stderr so the two never mix.

mod cli;

use anyhow::Result;
use chrono::DateTime;
use chrono_tz::Tz;
use serde::Serialize;
use tracing::debug;
use tracing_subscriber::{fmt, EnvFilter};

use crate::cli::{Cli, Command};

fn init_tracing(verbose: u8) -> Result<()> {
    let default = match verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(default))?;

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    Ok(())
}

#[derive(Serialize)]
struct OccurrencesOutput {
    occurrences: Vec<String>,
    exhausted: bool,
}

#[derive(Serialize)]
struct OccurrenceOutput {
    occurrence: Option<String>,
    exhausted: bool,
}

#[derive(Serialize)]
struct ContainsOutput {
    contains: bool,
}

#[derive(Serialize)]
struct NormalizeOutput {
    rule: String,
}

fn format_instant(at: &DateTime<Tz>) -> String {
    at.to_rfc3339()
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn print_single(json: bool, occurrence: Option<DateTime<Tz>>, exhausted: bool) -> Result<()> {
    let occurrence = occurrence.as_ref().map(format_instant);
    if json {
        return print_json(&OccurrenceOutput {
            occurrence,
            exhausted,
        });
    }
    println!("{}", occurrence.as_deref().unwrap_or("none"));
    Ok(())
}

fn run(cli: &Cli) -> Result<()> {
    match &cli.command {
        Command::Next { rule, after, count } => {
            let mut session = rule.session()?;
            let after = match after {
                Some(value) => rule.instant(value, "--after")?,
                None => rule.before_start()?,
            };
            debug!(rule = %session.rule(), %after, count, "next");
            let occurrences: Vec<String> = session
                .iter_after(&after)
                .take(*count)
                .map(|at| format_instant(&at))
                .collect();
            if cli.json {
                return print_json(&OccurrencesOutput {
                    occurrences,
                    exhausted: session.is_exhausted(),
                });
            }
            for occurrence in occurrences {
                println!("{occurrence}");
            }
            Ok(())
        }
        Command::Previous { rule, before } => {
            let mut session = rule.session()?;
            let before = rule.instant(before, "--before")?;
            let previous = session.previous_before(&before);
            print_single(cli.json, previous, session.is_exhausted())
        }
        Command::Final { rule } => {
            let mut session = rule.session()?;
            let last = session.final_occurrence();
            print_single(cli.json, last, session.is_exhausted())
        }
        Command::Contains {
            rule,
            instant,
            day_only,
        } => {
            let mut session = rule.session()?;
            let instant = rule.instant(instant, "INSTANT")?;
            let contains = session.contains(&instant, *day_only);
            if cli.json {
                return print_json(&ContainsOutput { contains });
            }
            println!("{contains}");
            Ok(())
        }
        Command::Normalize { rule } => {
            let normalized = rule.parse_rule()?.to_string();
            if cli.json {
                return print_json(&NormalizeOutput { rule: normalized });
            }
            println!("{normalized}");
            Ok(())
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse_args();
    init_tracing(cli.verbose)?;
    run(&cli)
}
