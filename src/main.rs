//! storage-planner CLI entry point
//!
//! Argument parsing, configuration loading and output all live in the
//! `cli` module; failures have already been written as JSON when `run`
//! returns.

use storage_planner::cli;

fn main() {
    if cli::run().is_err() {
        std::process::exit(1);
    }
}
