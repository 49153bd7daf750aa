use anyhow::{Context, Result};
use chrono::{DateTime, Duration};
use chrono_tz::Tz;
use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum};
use recur_engine::recurrence::DEFAULT_MAX_FAILED_ATTEMPTS;
use recur_engine::{
    parse_local_datetime, parse_timezone, DstPolicy, Recurrence, RecurrenceRule, SearchOptions,
};

/// Evaluate RFC 5545 recurrence rules from the command line
#[derive(Parser, Debug)]
#[command(name = "recur", author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Print JSON instead of plain text
    #[arg(long, global = true)]
    pub json: bool,

    /// Log more to stderr (-v debug, -vv trace). `RUST_LOG` takes precedence.
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,
}

impl Cli {
    /// Parse command line arguments
    #[must_use]
    pub fn parse_args() -> Self {
        Self::parse()
    }
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Print the next occurrences after an instant
    Next {
        #[command(flatten)]
        rule: RuleArgs,

        /// Local datetime to search after (default: just before --start)
        #[arg(long)]
        after: Option<String>,

        /// How many occurrences to print
        #[arg(short = 'n', long = "count", default_value_t = 1)]
        count: usize,
    },

    /// Print the last occurrence before an instant
    Previous {
        #[command(flatten)]
        rule: RuleArgs,

        /// Local datetime to search before
        #[arg(long)]
        before: String,
    },

    /// Print the final occurrence of a COUNT- or UNTIL-bounded rule
    Final {
        #[command(flatten)]
        rule: RuleArgs,
    },

    /// Check whether an instant (or its day, with --day-only) is an occurrence
    Contains {
        #[command(flatten)]
        rule: RuleArgs,

        /// Local datetime to test
        instant: String,

        /// Match any occurrence on the same local day
        #[arg(long)]
        day_only: bool,
    },

    /// Print the rule in canonical form
    Normalize {
        #[command(flatten)]
        rule: RuleArgs,
    },
}

/// The rule and the session options shared by every subcommand.
#[derive(Args, Debug)]
pub struct RuleArgs {
    /// RRULE value, e.g. "FREQ=WEEKLY;BYDAY=MO,WE,FR"
    pub rule: String,

    /// Anchor as a local datetime (yyyy-mm-ddTHH:MM:SS)
    #[arg(long)]
    pub start: String,

    /// IANA timezone the rule is evaluated in
    #[arg(long, default_value = "UTC")]
    pub tz: String,

    /// Consecutive empty steps before a search gives up
    #[arg(long, default_value_t = DEFAULT_MAX_FAILED_ATTEMPTS)]
    pub max_failed_attempts: u32,

    /// How occurrences inside a DST gap are resolved
    #[arg(long, value_enum, default_value_t = DstPolicyArg::WallClock)]
    pub dst_policy: DstPolicyArg,
}

/// Command-line mirror of [`DstPolicy`], so the engine crate does not depend on clap.
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum DstPolicyArg {
    Skip,
    ShiftForward,
    WallClock,
}

impl From<DstPolicyArg> for DstPolicy {
    fn from(arg: DstPolicyArg) -> Self {
        match arg {
            DstPolicyArg::Skip => DstPolicy::Skip,
            DstPolicyArg::ShiftForward => DstPolicy::ShiftForward,
            DstPolicyArg::WallClock => DstPolicy::WallClock,
        }
    }
}

impl RuleArgs {
    pub fn timezone(&self) -> Result<Tz> {
        parse_timezone(&self.tz).context("Failed to load --tz")
    }

    pub fn start(&self) -> Result<DateTime<Tz>> {
        let tz = self.timezone()?;
        parse_local_datetime(&self.start, &tz).context("Failed to parse --start")
    }

    /// Parse a local datetime argument in the rule's zone.
    pub fn instant(&self, value: &str, flag: &str) -> Result<DateTime<Tz>> {
        let tz = self.timezone()?;
        parse_local_datetime(value, &tz).with_context(|| format!("Failed to parse {flag}"))
    }

    /// Just before the anchor, so the anchor itself can be the first result.
    pub fn before_start(&self) -> Result<DateTime<Tz>> {
        let start = self.start()?;
        start
            .checked_sub_signed(Duration::seconds(1))
            .context("--start is at the edge of the supported range")
    }

    pub fn parse_rule(&self) -> Result<RecurrenceRule> {
        let start = self.start()?;
        RecurrenceRule::parse(&self.rule, start).context("Failed to parse RULE")
    }

    pub fn session(&self) -> Result<Recurrence> {
        let options = SearchOptions {
            max_failed_attempts: self.max_failed_attempts,
            dst_policy: self.dst_policy.into(),
        };
        Ok(Recurrence::with_options(self.parse_rule()?, options))
    }
}
