use clap::{Parser, Subcommand};
use std::path::PathBuf;
use url::Url;

/// Gradewire — command-line client for the grading portal's judging backend.
#[derive(Parser, Debug, Clone)]
#[command(name = "gradewire")]
pub struct CliArgs {
    /// Base URL of the grading portal API
    #[arg(short = 's', long = "server", env = "GRADEWIRE_SERVER")]
    pub server: Url,

    /// Bearer token for authenticated requests
    #[arg(short = 't', long = "token", env = "GRADEWIRE_TOKEN")]
    pub token: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Run code against a problem without recording it in history
    Run {
        /// Problem identifier
        problem: String,
        /// Path to the source file
        file: PathBuf,
        /// Language tag understood by the backend (e.g. cpp, python)
        #[arg(short = 'l', long = "language")]
        language: String,
    },
    /// Submit code for grading (recorded in history)
    Submit {
        /// Problem identifier
        problem: String,
        /// Path to the source file
        file: PathBuf,
        /// Language tag understood by the backend (e.g. cpp, python)
        #[arg(short = 'l', long = "language")]
        language: String,
    },
    /// List past submissions for a problem
    History {
        /// Problem identifier
        problem: String,
        /// Page number (1-based)
        #[arg(long = "page", default_value_t = 1)]
        page: u32,
        /// Results per page
        #[arg(long = "page-size", default_value_t = 20)]
        page_size: u32,
    },
}

pub struct ClientConfig {
    pub server: Url,
    pub token: Option<String>,
}

impl ClientConfig {
    pub fn from_args(args: &CliArgs) -> Self {
        ClientConfig {
            server: args.server.clone(),
            token: args.token.clone(),
        }
    }
}

// Request client constants
pub const REQUEST_TIMEOUT_MS: u64 = 30_000;
pub const REQUEST_MAX_RETRIES: u32 = 3;
pub const RETRY_BASE_DELAY_MS: u64 = 1_000;

// Poll loop constants
pub const POLL_BASE_DELAY_MS: u64 = 1_000;
pub const POLL_MAX_DELAY_MS: u64 = 8_000;
pub const POLL_MAX_ATTEMPTS: u32 = 15;
