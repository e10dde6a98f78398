//! CLI command implementations

pub mod commands;
pub mod error;
pub mod run;
pub mod status;

pub use commands::{Cli, Commands, ItemSourceArgs, OutputFormat};
pub use error::CliError;
pub use run::RunArgs;
pub use status::{StatusArgs, StatusReport};
