pub mod cli_args;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono_tz::Tz;
use shelter_core::time::local_date;
use shelter_core::{
    ApplicationDraft, ApplicationRecord, ApplicationScheduler, DeleteOutcome, FileConfig,
    SchedulerSettings, SqliteApplicationRepository, config_path, gateway_from_settings,
    load_config_from, render_rule, save_config_to,
};
use uuid::Uuid;

pub use cli_args::{ApplicationCommand, Cli, Command, ConfigCommand, CreateArgs, RuleArgs};

/// Execute a parsed command line.
pub async fn run(cli: Cli) -> Result<(), String> {
    let config_file = cli.config.clone().unwrap_or_else(config_path);

    match cli.command {
        Command::Rule(args) => {
            println!("{}", rule_text(&args));
            Ok(())
        }
        Command::Config(cmd) => handle_config_command(cmd, &config_file),
        Command::Application(cmd) => {
            handle_application_command(cmd, &config_file, cli.database).await
        }
    }
}

pub fn rule_text(args: &RuleArgs) -> String {
    render_rule(args.repeat, args.ends_at).unwrap_or_else(|| "(no recurrence)".to_string())
}

fn handle_config_command(command: ConfigCommand, config_file: &Path) -> Result<(), String> {
    match command {
        ConfigCommand::Path => {
            println!("{}", config_file.display());
            Ok(())
        }
        ConfigCommand::Init => {
            if config_file.exists() {
                println!("{} already exists; leaving it untouched.", config_file.display());
                return Ok(());
            }
            save_config_to(config_file, &FileConfig::default()).map_err(|err| err.to_string())?;
            println!("Wrote default configuration to {}", config_file.display());
            Ok(())
        }
    }
}

async fn handle_application_command(
    command: ApplicationCommand,
    config_file: &Path,
    database_override: Option<PathBuf>,
) -> Result<(), String> {
    let load = load_config_from(config_file);
    for warning in &load.warnings {
        eprintln!("Warning: {warning}");
    }
    let config = load.config;

    let settings = SchedulerSettings::from(&config.calendar);
    // Parse every argument before the database file is created.
    let request = Request::from_command(command, settings.timezone)?;

    let database = database_override.unwrap_or_else(|| config.database.resolved_path());
    let repository =
        SqliteApplicationRepository::open(&database).map_err(|err| err.to_string())?;

    let (calendar, calendar_warning) = gateway_from_settings(&config.calendar);
    if let Some(warning) = calendar_warning {
        eprintln!("Warning: {warning}");
    }

    let scheduler = ApplicationScheduler::new(Arc::new(repository), calendar, settings);

    match request {
        Request::Create(draft) => {
            let outcome = scheduler
                .create(draft)
                .await
                .map_err(|err| err.to_string())?;

            println!("Created application {}", outcome.record.id);
            match (&outcome.record.external_event_ref, outcome.warning_message()) {
                (Some(event_id), _) => println!("Reminder scheduled (event {event_id})"),
                (None, Some(message)) => eprintln!("{message}"),
                (None, None) => {}
            }
            Ok(())
        }
        Request::Delete(id) => {
            match scheduler
                .delete(id)
                .await
                .map_err(|err| err.to_string())?
            {
                DeleteOutcome::Deleted {
                    calendar_warning, ..
                } => {
                    println!("Deleted application {id}");
                    if let Some(err) = calendar_warning {
                        eprintln!("Warning: the reminder could not be removed: {err}");
                    }
                }
                DeleteOutcome::NotFound => {
                    println!("No application {id}; nothing to delete.");
                }
            }
            Ok(())
        }
        Request::List(animal_id) => {
            let records = scheduler
                .list_for_animal(animal_id)
                .await
                .map_err(|err| err.to_string())?;
            if records.is_empty() {
                println!("No applications logged for animal {animal_id}.");
                return Ok(());
            }
            println!(
                "{:<36}  {:<16}  {:>8}  {:<13}  {:<10}  Reminder",
                "Id", "Applied", "Quantity", "Repeats", "Ends"
            );
            for record in &records {
                println!("{}", format_row(record, settings.timezone));
            }
            Ok(())
        }
    }
}

enum Request {
    Create(ApplicationDraft),
    Delete(Uuid),
    List(Uuid),
}

impl Request {
    fn from_command(command: ApplicationCommand, zone: Tz) -> Result<Self, String> {
        Ok(match command {
            ApplicationCommand::Create(args) => Self::Create(args.to_draft(zone)?),
            ApplicationCommand::Delete(args) => Self::Delete(args.id),
            ApplicationCommand::List(args) => Self::List(args.animal),
        })
    }
}

fn format_row(record: &ApplicationRecord, zone: Tz) -> String {
    let applied = record.applied_at.with_timezone(&zone).format("%Y-%m-%d %H:%M");
    let ends = record
        .ends_at
        .filter(|_| record.recurrence.repeats())
        .map(|ends_at| local_date(ends_at, zone).to_string())
        .unwrap_or_else(|| "-".to_string());
    let reminder = if record.is_linked() { "yes" } else { "no" };

    format!(
        "{id:<36}  {applied:<16}  {quantity:>8}  {repeats:<13}  {ends:<10}  {reminder}",
        id = record.id,
        applied = applied.to_string(),
        quantity = record.quantity,
        repeats = record.recurrence.as_str(),
    )
}
