//! Core library for the shelter's medicine scheduling: recurrence rules, application
//! records, persistence, and calendar reminder synchronization.

pub mod application;
pub mod bridge;
pub mod calendar;
pub mod config;
pub mod logging;
pub mod recurrence;
pub mod repository;
pub mod scheduler;
pub mod time;

pub use application::{
    ApplicationDraft, ApplicationRecord, CalendarLink, InvalidScheduleError, parse_quantity,
    validate,
};
pub use bridge::{SchedulerBridge, SchedulerUpdate, SchedulerUpdateKind};
pub use calendar::{
    CalendarEvent, CalendarGateway, GatewayError, GoogleCalendarGateway, UnconfiguredCalendar,
    gateway_from_settings,
};
pub use config::{
    CalendarSettings, ConfigError, ConfigLoadResult, ConfigSource, DatabaseSettings, FileConfig,
    config_directory, config_path, load_config, load_config_from, save_config, save_config_to,
};
pub use logging::{LoggingDestination, LoggingError, init_logging};
pub use recurrence::{RecurrencePolicy, render_rule};
pub use repository::{ApplicationRepository, RepositoryError, SqliteApplicationRepository};
pub use scheduler::{
    ApplicationScheduler, CreateOutcome, DeleteOutcome, SchedulerError, SchedulerSettings,
};
