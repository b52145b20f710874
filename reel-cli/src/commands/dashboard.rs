//! Dashboard and executor command handlers

use anyhow::Result;
use chrono::{DateTime, Utc};
use colored::*;
use reel_client::OrchestratorClient;
use reel_core::dto::dashboard::DashboardJob;

use super::job::colorize_state;

pub async fn dashboard(client: &OrchestratorClient, since: Option<DateTime<Utc>>) -> Result<()> {
    let info = client.dashboard(since).await?;

    for (title, jobs) in [
        ("Waiting", &info.waiting_jobs),
        ("Active", &info.active_jobs),
        ("Done", &info.recently_done_jobs),
        ("Failed", &info.recently_failed_jobs),
        ("Canceled", &info.recently_canceled_jobs),
    ] {
        println!("{}", format!("{} ({}):", title, jobs.len()).bold());
        if jobs.is_empty() {
            println!("  {}", "none".dimmed());
        }
        for job in jobs {
            print_job_summary(job);
        }
        println!();
    }

    println!("{}", format!("Plugins ({}):", info.plugins.len()).bold());
    for plugin in &info.plugins {
        println!("  {} {}", "▸".cyan(), plugin.urn);
    }

    Ok(())
}

pub async fn executor(client: &OrchestratorClient) -> Result<()> {
    let status = client.executor_status().await?;

    let role = if status.is_primary {
        "primary".green()
    } else {
        "standby".yellow()
    };
    println!("{} {}", "Executor:".bold(), role);
    println!(
        "  As of: {}",
        status.timestamp.format("%Y-%m-%d %H:%M:%S").to_string().dimmed()
    );
    println!();

    for plugin in &status.plugins {
        let state = if plugin.busy { "busy".cyan() } else { "idle".green() };
        println!("  {} {} [{}]", "▸".cyan(), plugin.urn, state);
        if let Some(task) = &plugin.current_task {
            println!("    Task:     {}", task.urn.dimmed());
        }
        if let Some(eta) = plugin.estimated_completion {
            println!("    Finishes: {}", eta.format("%H:%M:%S"));
        }
    }

    Ok(())
}

fn print_job_summary(job: &DashboardJob) {
    println!(
        "  {} {} {}",
        "▸".cyan(),
        job.name,
        job.urn.dimmed()
    );
    println!(
        "    State:    {} ({:.0}%)",
        colorize_state(job.state),
        job.percent_done
    );
    println!(
        "    Format:   {} → {}",
        job.source_format, job.destination_format
    );
    println!("    Priority: {:?}", job.priority);
    if let Some(plugin) = &job.current_plugin_urn {
        println!("    Plugin:   {}", plugin.dimmed());
    }
    if !job.task_progress.is_empty() {
        let steps: Vec<String> = job
            .task_progress
            .iter()
            .map(|task| format!("{} {}%", task.name, task.percent_done))
            .collect();
        println!("    Steps:    {}", steps.join(", "));
    }
}
