//! Plugin registry
//!
//! Builds the plugin instances of the enabled plugin sets and the planner
//! routes that send work to them.

use std::sync::Arc;
use std::time::Duration;

use reel_core::domain::MediaFormat;
use reel_core::time::TimeProvider;
use reel_core::urn;
use reel_plugins::backends::{DummyLogo, DummyTimecode, DummyTranscoder, FileRenamer, FlakyDummy};
use reel_plugins::{Backend, CapacityRegistry, FixedWorkers, HttpWorkerCount, Plugin, WorkerCountSource};
use tracing::info;

use crate::config::{Config, PluginSet, PoolWorkers};
use crate::engine::{PlannerConfig, Route};

const WORKER_COUNT_TIMEOUT: Duration = Duration::from_secs(5);

/// Plugin instances together with the routes planning onto them
pub struct PluginSetup {
    pub plugins: Vec<Plugin>,
    pub planner: PlannerConfig,
}

pub fn build(config: &Config, clock: Arc<dyn TimeProvider>) -> anyhow::Result<PluginSetup> {
    let mut plugins = Vec::new();
    let mut routes = Vec::new();
    let registry = Arc::new(CapacityRegistry::new());

    for set in &config.plugin_sets {
        match set {
            PluginSet::Dummy => {
                for instance in 1..=2 {
                    plugins.push(instance_of(Box::new(DummyTranscoder), instance, &clock)?);
                }
                plugins.push(instance_of(Box::new(DummyLogo), 1, &clock)?);
                plugins.push(instance_of(Box::new(FileRenamer), 1, &clock)?);
                routes.push(Route::new(
                    DummyTranscoder::PLUGIN_TYPE,
                    [
                        MediaFormat::H264OdSingle,
                        MediaFormat::H264OdStandard,
                        MediaFormat::H264OdDropfolder,
                        MediaFormat::H264OdPodcast,
                    ],
                ));
            }
            PluginSet::DummyPool => {
                let workers: Arc<dyn WorkerCountSource> = match &config.dummy_pool_workers {
                    PoolWorkers::Fixed(count) => Arc::new(FixedWorkers(*count)),
                    PoolWorkers::Remote { url, pointer } => {
                        Arc::new(HttpWorkerCount::new(url, pointer, WORKER_COUNT_TIMEOUT)?)
                    }
                };
                for instance in 1..=config.dummy_pool_size {
                    let plugin = instance_of(Box::new(DummyTimecode), instance, &clock)?
                        .with_shared_capacity(&registry, workers.clone());
                    plugins.push(plugin);
                }
                routes.push(
                    Route::new(
                        DummyTimecode::PLUGIN_TYPE,
                        [
                            MediaFormat::Avc1,
                            MediaFormat::Dvh5,
                            MediaFormat::AudioOdStandard,
                        ],
                    )
                    .without_reservation(),
                );
            }
            PluginSet::DummyRetry => {
                plugins.push(instance_of(Box::new(FlakyDummy), 1, &clock)?);
                routes.push(Route::new(FlakyDummy::PLUGIN_TYPE, [MediaFormat::Custom]));
            }
        }
    }

    info!("Registered {} plugin instances", plugins.len());
    for plugin in &plugins {
        info!("  - {}", plugin.urn());
    }

    Ok(PluginSetup {
        plugins,
        planner: PlannerConfig {
            routes,
            preprocessor_type: DummyLogo::PLUGIN_TYPE.to_string(),
            renamer_type: FileRenamer::PLUGIN_TYPE.to_string(),
            ..PlannerConfig::default()
        },
    })
}

fn instance_of(
    backend: Box<dyn Backend>,
    instance: usize,
    clock: &Arc<dyn TimeProvider>,
) -> anyhow::Result<Plugin> {
    let urn = urn::plugin_urn(backend.plugin_type(), &instance.to_string());
    Ok(Plugin::new(urn, backend, clock.clone())?)
}
