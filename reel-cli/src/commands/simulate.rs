//! In-process simulation
//!
//! Runs the planner and executor against in-memory repositories and dummy
//! plugins, stepping a virtual clock instead of waiting for real time.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use anyhow::Result;
use async_trait::async_trait;
use chrono::{TimeDelta, Utc};
use clap::Args;
use colored::*;
use reel_core::domain::{ExecutionState, Job, MediaFormat, Priority};
use reel_core::dto::order::Order;
use reel_core::time::{TimeProvider, VirtualClock};
use reel_orchestrator::callback::CallbackNotifier;
use reel_orchestrator::config::{Config, PluginSet};
use reel_orchestrator::engine::Executor;
use reel_orchestrator::plugins;
use reel_orchestrator::repository::Repositories;

use super::job::colorize_state;

/// Arguments of `reel simulate`
#[derive(Debug, Clone, Args)]
pub struct SimulateArgs {
    /// Number of jobs to order
    #[arg(long, default_value_t = 8)]
    pub jobs: usize,

    /// Virtual seconds between pulses
    #[arg(long, default_value_t = 5)]
    pub step_secs: i64,

    /// Virtual minutes to run for at most
    #[arg(long, default_value_t = 30)]
    pub minutes: i64,
}

/// Outcome of a simulation run
#[derive(Debug, Default, PartialEq, Eq)]
pub struct Summary {
    pub done: usize,
    pub failed: usize,
    pub canceled: usize,
    pub unfinished: usize,
    pub callbacks: usize,
    pub elapsed: TimeDelta,
}

/// Prints callbacks instead of sending them
#[derive(Default)]
struct PrintingNotifier {
    calls: AtomicUsize,
}

#[async_trait]
impl CallbackNotifier for PrintingNotifier {
    async fn notify(&self, job: &Job) -> anyhow::Result<()> {
        self.calls.fetch_add(1, Ordering::Relaxed);
        println!("    {} callback for {}", "↪".dimmed(), job.name);
        Ok(())
    }
}

pub async fn simulate(args: SimulateArgs) -> Result<()> {
    if args.step_secs <= 0 || args.minutes <= 0 {
        anyhow::bail!("step-secs and minutes must be greater than 0");
    }

    let summary = run(&args).await?;

    println!();
    println!("{}", "Simulation Summary:".bold());
    println!("  Virtual time: {}s", summary.elapsed.num_seconds());
    println!("  Done:         {}", summary.done.to_string().green());
    println!("  Failed:       {}", summary.failed.to_string().red());
    println!("  Canceled:     {}", summary.canceled.to_string().dimmed());
    println!("  Unfinished:   {}", summary.unfinished.to_string().yellow());
    println!("  Callbacks:    {}", summary.callbacks);
    Ok(())
}

pub async fn run(args: &SimulateArgs) -> Result<Summary> {
    let clock = Arc::new(VirtualClock::new(Utc::now()));
    let repositories = Repositories::in_memory(clock.clone(), TimeDelta::seconds(60));
    let config = Config {
        plugin_sets: vec![PluginSet::Dummy, PluginSet::DummyRetry],
        ..Config::default()
    };
    let setup = plugins::build(&config, clock.clone())?;
    let callbacks = Arc::new(PrintingNotifier::default());
    let executor = Executor::new(
        repositories.clone(),
        callbacks.clone(),
        clock.clone(),
        setup.plugins,
        setup.planner,
        "simulator:0",
    )?;

    let mut states: HashMap<String, Option<ExecutionState>> = HashMap::new();
    let mut urns = Vec::new();
    for index in 0..args.jobs {
        let job = repositories.jobs.add(sample_order(index).into_job(clock.now())?).await?;
        println!("{} ordered {} ({})", stamp(&clock), job.name, job.destination.format);
        states.insert(job.urn.clone(), None);
        urns.push(job.urn);
    }

    let step = TimeDelta::seconds(args.step_secs);
    let pulses = args.minutes * 60 / args.step_secs;
    for _ in 0..pulses {
        executor.pulse().await?;

        let mut finished = 0;
        for urn in &urns {
            let Some(job) = repositories.jobs.get(urn).await? else {
                continue;
            };
            let state = job.plan_state()?;
            if states.get(urn) != Some(&state) {
                let label = state.map_or_else(|| "waiting".normal(), colorize_state);
                println!("{} {} → {}", stamp(&clock), job.name, label);
                states.insert(urn.clone(), state);
            }
            if state.is_some_and(|s| s.is_terminal()) {
                finished += 1;
            }
        }
        if finished == urns.len() {
            break;
        }
        clock.step(step)?;
    }

    let mut summary = Summary {
        callbacks: callbacks.calls.load(Ordering::Relaxed),
        elapsed: clock.now() - clock.start(),
        ..Summary::default()
    };
    for state in states.values() {
        match state {
            Some(ExecutionState::Done) => summary.done += 1,
            Some(ExecutionState::Failed) => summary.failed += 1,
            Some(ExecutionState::Canceled) => summary.canceled += 1,
            _ => summary.unfinished += 1,
        }
    }
    Ok(summary)
}

/// Rotating mix of orders exercising preprocessing, retries and reservation
fn sample_order(index: usize) -> Order {
    let mut order = Order {
        file_path: format!("/media/in/clip-{:02}.mxf", index + 1),
        source_format: MediaFormat::Xd5c,
        destination_path: "/media/out".to_string(),
        callback_url: Some("http://callbacks.local/reel".to_string()),
        ..Default::default()
    };

    match index % 4 {
        0 => {
            order.destination_format = MediaFormat::H264OdStandard;
            order.priority = Some(Priority::High);
            order.duration_ms = 120_000;
        }
        1 => {
            order.destination_format = MediaFormat::H264OdSingle;
            order.priority = Some(Priority::Medium);
            order.duration_ms = 240_000;
            order.burn_in_subtitles = true;
            order.subtitles_path = Some("/media/in/subtitles.vtt".to_string());
        }
        2 => {
            order.destination_format = MediaFormat::Custom;
            order.custom_format = Some("FailNumber.1".to_string());
            order.duration_ms = 60_000;
        }
        _ => {
            order.destination_format = MediaFormat::H264OdPodcast;
            order.duration_ms = 480_000;
        }
    }
    order
}

fn stamp(clock: &VirtualClock) -> ColoredString {
    let elapsed = clock.now() - clock.start();
    format!(
        "[+{:02}:{:02}]",
        elapsed.num_minutes(),
        elapsed.num_seconds() % 60
    )
    .dimmed()
}
