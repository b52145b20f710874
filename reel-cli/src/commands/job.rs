//! Job command handlers
//!
//! Handles ordering, status lookups and cancellation.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::{Args, ValueEnum};
use colored::*;
use reel_client::OrchestratorClient;
use reel_core::domain::{AspectRatio, ExecutionState, MediaFormat, Priority};
use reel_core::dto::job::JobStatus;
use reel_core::dto::order::Order;

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum PriorityArg {
    Low,
    Medium,
    High,
}

impl From<PriorityArg> for Priority {
    fn from(arg: PriorityArg) -> Self {
        match arg {
            PriorityArg::Low => Priority::Low,
            PriorityArg::Medium => Priority::Medium,
            PriorityArg::High => Priority::High,
        }
    }
}

/// Arguments of `reel order`
#[derive(Debug, Args)]
pub struct OrderArgs {
    /// Full path of the source file
    pub file: String,

    /// Format of the source file
    #[arg(long)]
    pub format: MediaFormat,

    /// Duration of the source in milliseconds
    #[arg(long)]
    pub duration_ms: u64,

    /// Directory receiving the output
    #[arg(long)]
    pub destination: String,

    /// Format to transcode into
    #[arg(long)]
    pub destination_format: MediaFormat,

    /// Output file name template, supports %index% and %ext%
    #[arg(long)]
    pub filename: Option<String>,

    #[arg(long, value_enum)]
    pub priority: Option<PriorityArg>,

    #[arg(long)]
    pub due: Option<DateTime<Utc>>,

    /// Job name, defaults to the file name
    #[arg(long)]
    pub name: Option<String>,

    /// Logo image to burn in
    #[arg(long)]
    pub logo: Option<String>,

    /// WebVTT subtitles to burn in
    #[arg(long)]
    pub subtitles: Option<String>,

    /// WAV track replacing the original audio
    #[arg(long)]
    pub audio: Option<String>,

    /// Source aspect ratio is 16:9
    #[arg(long)]
    pub widescreen: bool,

    /// Url receiving the job status once it finishes
    #[arg(long)]
    pub callback_url: Option<String>,
}

impl From<OrderArgs> for Order {
    fn from(args: OrderArgs) -> Self {
        Order {
            file_path: args.file,
            source_format: args.format,
            duration_ms: args.duration_ms,
            name: args.name,
            burn_in_logo: args.logo.is_some(),
            logo_path: args.logo,
            alternate_audio_path: args.audio,
            burn_in_subtitles: args.subtitles.is_some(),
            subtitles_path: args.subtitles,
            aspect_ratio: if args.widescreen {
                AspectRatio::Widescreen
            } else {
                AspectRatio::default()
            },
            destination_format: args.destination_format,
            destination_path: args.destination,
            destination_filename: args.filename,
            priority: args.priority.map(Priority::from),
            due_date: args.due,
            callback_url: args.callback_url,
            ..Default::default()
        }
    }
}

pub async fn order(client: &OrchestratorClient, args: OrderArgs) -> Result<()> {
    let order = Order::from(args);
    order.validate()?;

    let status = client
        .order(&order)
        .await
        .context("Failed to submit order")?;

    println!("{}", "✓ Order accepted".green().bold());
    print_job_status(&status);
    Ok(())
}

pub async fn status(client: &OrchestratorClient, urn: &str) -> Result<()> {
    let status = client.job_status(urn).await?;
    print_job_status(&status);
    Ok(())
}

pub async fn cancel(client: &OrchestratorClient, urn: &str, user: &str) -> Result<()> {
    match client.cancel(urn, user).await {
        Ok(status) => {
            println!("{}", "✓ Cancel requested".green().bold());
            println!(
                "  {}",
                "The job is canceled on the executor's next pulse".dimmed()
            );
            print_job_status(&status);
            Ok(())
        }
        Err(e) if e.is_conflict() => {
            println!("{}", "⚠ A cancel request is already pending".yellow());
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}

/// Print detailed job status
pub fn print_job_status(status: &JobStatus) {
    println!("{}", "Job Status:".bold());
    println!("  Urn:         {}", status.job_urn.cyan());
    println!("  State:       {}", colorize_state(status.state));
    println!("  Progress:    {:.0}%", status.percent_done);
    println!(
        "  Issued:      {}",
        status.issued.format("%Y-%m-%d %H:%M:%S")
    );

    if let Some(started) = status.started {
        println!("  Started:     {}", started.format("%Y-%m-%d %H:%M:%S"));
    }

    if let Some(estimated) = status.estimated_done
        && status.end_time.is_none()
    {
        println!("  Estimated:   {}", estimated.format("%Y-%m-%d %H:%M:%S"));
    }

    if let Some(ended) = status.end_time {
        println!("  Ended:       {}", ended.format("%Y-%m-%d %H:%M:%S"));

        if let Some(started) = status.started {
            let duration = ended.signed_duration_since(started);
            println!("  Duration:    {}s", duration.num_seconds());
        }
    }
}

/// Colorize an execution state for display
pub fn colorize_state(state: ExecutionState) -> ColoredString {
    let state_str = state.as_str();
    match state {
        ExecutionState::Queued => state_str.yellow(),
        ExecutionState::Running => state_str.cyan(),
        ExecutionState::Done => state_str.green(),
        ExecutionState::Failed => state_str.red(),
        ExecutionState::Canceled | ExecutionState::Paused => state_str.dimmed(),
    }
}
