use std::path::PathBuf;

use chrono::NaiveDate;
use chrono_tz::Tz;
use clap::{Args, Parser, Subcommand, ValueHint};
use shelter_core::time::parse_timestamp;
use shelter_core::{ApplicationDraft, RecurrencePolicy};
use uuid::Uuid;

/// Top-level CLI entrypoint.
#[derive(Parser, Debug, Clone)]
#[command(name = "shelter", version, about, long_about = None)]
pub struct Cli {
    /// Read configuration from this file instead of the default location.
    #[arg(long, global = true, value_hint = ValueHint::FilePath)]
    pub config: Option<PathBuf>,

    /// Override the database path from the configuration.
    #[arg(long, global = true, value_hint = ValueHint::FilePath)]
    pub database: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

/// Supported subcommands.
#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Log, remove or list medicine applications.
    #[command(subcommand)]
    Application(ApplicationCommand),
    /// Print the recurrence rule a policy would produce.
    Rule(RuleArgs),
    /// Inspect or initialise the configuration file.
    #[command(subcommand)]
    Config(ConfigCommand),
}

#[derive(Debug, Clone, Subcommand)]
pub enum ApplicationCommand {
    /// Record a medicine application and schedule its reminder.
    #[command(alias = "add")]
    Create(CreateArgs),
    /// Delete an application and, if linked, its reminder.
    #[command(alias = "remove")]
    Delete(DeleteArgs),
    /// List the applications logged for an animal.
    List(ListArgs),
}

#[derive(Debug, Clone, Subcommand)]
pub enum ConfigCommand {
    /// Print the configuration file location.
    Path,
    /// Write a default configuration file if none exists.
    Init,
}

/// Arguments for `application create`. Required fields are checked by the scheduler
/// so that every front end reports them the same way.
#[derive(Debug, Clone, Args, Default)]
pub struct CreateArgs {
    /// Medicine id.
    #[arg(long, value_name = "UUID")]
    pub medicine: Option<Uuid>,

    /// Animal id.
    #[arg(long, value_name = "UUID")]
    pub animal: Option<Uuid>,

    /// Id of the caretaker who gave the dose.
    #[arg(long, value_name = "UUID")]
    pub user: Option<Uuid>,

    /// When the dose was given (RFC 3339, YYYY-MM-DD HH:MM or YYYY-MM-DD).
    #[arg(long = "applied-at", value_name = "TIME")]
    pub applied_at: Option<String>,

    /// Amount given; both 1.5 and 1,5 are accepted.
    #[arg(long, allow_hyphen_values = true, default_value = "")]
    pub quantity: String,

    /// When the next dose is expected.
    #[arg(long = "next-at", value_name = "TIME")]
    pub next_at: Option<String>,

    /// Last day the reminder repeats (inclusive).
    #[arg(long = "ends-at", value_name = "TIME")]
    pub ends_at: Option<String>,

    /// no_repeat, daily, weekly, monthly, annually or every_weekday.
    #[arg(long, value_name = "POLICY", default_value = "no_repeat")]
    pub repeat: RecurrencePolicy,

    /// Reminder title.
    #[arg(long)]
    pub summary: Option<String>,

    /// Reminder body.
    #[arg(long)]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Args)]
pub struct DeleteArgs {
    /// Application id.
    #[arg(value_name = "ID")]
    pub id: Uuid,
}

#[derive(Debug, Clone, Args)]
pub struct ListArgs {
    /// Animal id.
    #[arg(long, value_name = "UUID")]
    pub animal: Uuid,
}

#[derive(Debug, Clone, Args)]
pub struct RuleArgs {
    #[arg(long, value_name = "POLICY")]
    pub repeat: RecurrencePolicy,

    /// Last day included in the recurrence (YYYY-MM-DD).
    #[arg(long = "ends-at", value_name = "DATE")]
    pub ends_at: Option<NaiveDate>,
}

impl CreateArgs {
    /// Build a draft, interpreting wall-clock times in `zone`.
    pub fn to_draft(&self, zone: Tz) -> Result<ApplicationDraft, String> {
        let parse = |value: &Option<String>| {
            value
                .as_deref()
                .map(|raw| parse_timestamp(raw, zone))
                .transpose()
                .map_err(|err| err.to_string())
        };

        Ok(ApplicationDraft {
            medicine_id: self.medicine,
            user_id: self.user,
            animal_id: self.animal,
            applied_at: parse(&self.applied_at)?,
            quantity: self.quantity.clone(),
            next_application_at: parse(&self.next_at)?,
            ends_at: parse(&self.ends_at)?,
            recurrence: self.repeat,
            summary: self.summary.clone(),
            description: self.description.clone(),
        })
    }
}
