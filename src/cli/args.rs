//! CLI arguments
//!
//! - storage-planner validate --config <path> --catalog <path>
//! - storage-planner plan --config <path> --catalog <path> --entity <name>
//! - storage-planner bucket <key> [--buckets <n>]

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Storage planning and query rewrite for entity queries
#[derive(Parser, Debug)]
#[command(name = "storage-planner")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Load and validate the deployment and catalog files
    Validate {
        /// Deployment configuration
        #[arg(long, default_value = "./deployment.json")]
        config: PathBuf,

        /// Storage and entity catalog
        #[arg(long, default_value = "./catalog.json")]
        catalog: PathBuf,
    },

    /// Plan one logical query read as JSON from stdin
    Plan {
        #[arg(long, default_value = "./deployment.json")]
        config: PathBuf,

        #[arg(long, default_value = "./catalog.json")]
        catalog: PathBuf,

        /// Entity the query runs against
        #[arg(long)]
        entity: String,

        /// Referrer recorded on the request
        #[arg(long, default_value = "cli")]
        referrer: String,

        /// Record every transformation step in the output
        #[arg(long)]
        dry_run: bool,

        /// Request a consistent read
        #[arg(long)]
        consistent: bool,

        /// Custom routing flags read by settings-based selectors
        #[arg(long = "flag")]
        flags: Vec<String>,
    },

    /// Print the hash bucket of a map key
    Bucket {
        key: String,

        #[arg(long, default_value_t = crate::hashing::ATTRIBUTE_BUCKETS)]
        buckets: u32,
    },
}

impl Cli {
    pub fn parse_args() -> Self {
        Cli::parse()
    }
}
