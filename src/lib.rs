#![warn(clippy::all, clippy::pedantic)]
#![allow(
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::module_name_repetitions,
    clippy::struct_field_names,
    clippy::must_use_candidate,
    clippy::new_without_default,
    clippy::return_self_not_must_use
)]

pub mod app;
pub mod cli;
pub mod config;
pub mod error;
pub mod executor;
pub mod policy;
pub mod scanner;
pub mod storage;
pub mod store;
pub mod sweeper;
pub mod tracker;
pub mod ui;

pub use cli::commands::{Cli, Commands};
pub use config::Config;
pub use error::{Result, SweepError};
pub use sweeper::{CleanMode, SweepOptions, SweepReport, Sweeper};
