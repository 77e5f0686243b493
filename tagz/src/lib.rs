//! Command-line front end for tagging date-stamped releases across repositories
//!
//! `main.rs` wires these together: [`cli`] flags over [`settings`], checked by
//! [`sanity`], executed by [`driver`], links printed and handed to [`clipboard`].

pub mod cli;
pub mod clipboard;
pub mod driver;
pub mod logging;
pub mod sanity;
pub mod settings;

pub use cli::{Args, CommandKind};
pub use driver::{
    BatchReport, Driver, DriverConfig, DriverError, DriverResult, FailurePolicy, OutcomeStatus,
    RepoOutcome,
};
pub use sanity::{check_operation, parse_repositories, UsageError, PLACEHOLDER_TAG};
pub use settings::{Settings, SettingsError, SettingsResult};
