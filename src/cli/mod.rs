//! Command-line interface
//!
//! - validate: load and check the deployment and catalog files
//! - plan: plan one logical query from stdin
//! - bucket: show the hash bucket of a map key

mod args;
mod commands;
mod errors;
mod io;

pub use args::{Cli, Command};
pub use commands::{bucket, load, plan, plan_with_catalog, run, run_command, validate, PlanOptions};
pub use errors::{CliError, CliErrorCode, CliResult};
pub use io::{read_request, write_error, write_response};
