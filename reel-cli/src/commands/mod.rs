//! Commands module
//!
//! Defines all CLI commands and their handlers.

mod dashboard;
mod job;
mod simulate;

use anyhow::Result;
use chrono::{DateTime, Utc};
use clap::Subcommand;
use reel_client::OrchestratorClient;
use reel_core::domain::MediaFormat;

use crate::config::Config;

pub use job::OrderArgs;
pub use simulate::SimulateArgs;

/// Top-level CLI commands
#[derive(Subcommand)]
pub enum Commands {
    /// Submit a transcoding order
    Order(OrderArgs),
    /// Show the status of a job
    Status {
        /// Job urn
        urn: String,
    },
    /// Cancel a job
    Cancel {
        /// Job urn
        urn: String,

        /// User issuing the command
        #[arg(long, env = "USER")]
        user: String,
    },
    /// Show waiting, active and recently finished jobs
    Dashboard {
        /// Include jobs finished since this time (RFC 3339), default one hour ago
        #[arg(long)]
        since: Option<DateTime<Utc>>,
    },
    /// Show plugin occupancy and leadership of the orchestrator
    Executor,
    /// Run the engine in-process with dummy plugins on a virtual clock
    Simulate(SimulateArgs),
    /// List the known media formats
    Formats,
}

/// Handle a CLI command
///
/// Routes the command to the appropriate handler module.
pub async fn handle_command(command: Commands, config: &Config) -> Result<()> {
    let client = OrchestratorClient::new(&config.orchestrator_url);

    match command {
        Commands::Order(args) => job::order(&client, args).await,
        Commands::Status { urn } => job::status(&client, &urn).await,
        Commands::Cancel { urn, user } => job::cancel(&client, &urn, &user).await,
        Commands::Dashboard { since } => dashboard::dashboard(&client, since).await,
        Commands::Executor => dashboard::executor(&client).await,
        Commands::Simulate(args) => simulate::simulate(args).await,
        Commands::Formats => {
            for format in MediaFormat::ALL.iter().skip(1) {
                println!("{}", format);
            }
            Ok(())
        }
    }
}
