//! Capacity policies
//!
//! A plugin that holds a task is always busy. When idle, its policy decides.
//! [`Exclusive`] plugins are free whenever idle. [`SharedCapacity`] plugins
//! are siblings fronting one remote pool whose real worker count may be
//! smaller than the number of siblings; they agree on which of them are
//! available through a [`CapacityRegistry`].

pub mod workers;

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use parking_lot::RwLock;
use tracing::warn;

use workers::WorkerCountSource;

#[async_trait]
pub trait CapacityPolicy: Send + Sync {
    /// Whether the idle plugin `urn` must report busy
    async fn busy(&self, urn: &str) -> bool;
}

/// One instance, one slot
#[derive(Debug, Default, Clone, Copy)]
pub struct Exclusive;

#[async_trait]
impl CapacityPolicy for Exclusive {
    async fn busy(&self, _urn: &str) -> bool {
        false
    }
}

#[derive(Debug, Clone)]
struct Slot {
    urn: String,
    occupied: Arc<AtomicBool>,
}

/// Type keyed registry of sibling plugins and their occupancy
///
/// Shared by every sibling of a pool. Create one per executor (or per test)
/// and hand it to each plugin at construction.
#[derive(Debug, Default)]
pub struct CapacityRegistry {
    pools: RwLock<HashMap<String, Vec<Slot>>>,
}

impl CapacityRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a sibling, replacing an earlier registration of the same urn
    pub fn register(&self, plugin_type: &str, urn: &str, occupied: Arc<AtomicBool>) {
        let mut pools = self.pools.write();
        let slots = pools.entry(plugin_type.to_string()).or_default();
        slots.retain(|slot| slot.urn != urn);
        slots.push(Slot {
            urn: urn.to_string(),
            occupied,
        });
    }

    /// Snapshot of `(urn, holds a task)` for every sibling of `plugin_type`
    pub fn siblings(&self, plugin_type: &str) -> Vec<(String, bool)> {
        self.pools
            .read()
            .get(plugin_type)
            .map(|slots| {
                slots
                    .iter()
                    .map(|slot| (slot.urn.clone(), slot.occupied.load(Ordering::Acquire)))
                    .collect()
            })
            .unwrap_or_default()
    }
}

/// Capacity shared by the siblings of one remote pool
pub struct SharedCapacity {
    registry: Arc<CapacityRegistry>,
    plugin_type: String,
    workers: Arc<dyn WorkerCountSource>,
}

impl SharedCapacity {
    pub fn new(
        registry: Arc<CapacityRegistry>,
        plugin_type: impl Into<String>,
        workers: Arc<dyn WorkerCountSource>,
    ) -> Self {
        Self {
            registry,
            plugin_type: plugin_type.into(),
            workers,
        }
    }
}

#[async_trait]
impl CapacityPolicy for SharedCapacity {
    async fn busy(&self, urn: &str) -> bool {
        let workers = match self.workers.worker_count().await {
            Ok(count) => count,
            Err(e) => {
                warn!(plugin = %urn, "Unable to read worker count, assuming none: {:#}", e);
                0
            }
        };
        ranked_busy(urn, self.registry.siblings(&self.plugin_type), workers)
    }
}

/// Whether idle sibling `urn` falls outside the first `workers` ranks
///
/// Siblings holding tasks rank first, ties broken by urn, so every sibling
/// computes the same answer without coordination.
fn ranked_busy(urn: &str, mut siblings: Vec<(String, bool)>, workers: usize) -> bool {
    if siblings.len() <= workers {
        return false;
    }
    if siblings.iter().filter(|(_, occupied)| *occupied).count() >= workers {
        return true;
    }
    siblings.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    siblings
        .iter()
        .skip(workers)
        .any(|(sibling, _)| sibling == urn)
}

#[cfg(test)]
mod tests {
    use super::*;
    use super::workers::FixedWorkers;
    use rstest::rstest;

    const URNS: [&str; 3] = [
        "urn:reel:plugin:pool:a",
        "urn:reel:plugin:pool:b",
        "urn:reel:plugin:pool:c",
    ];

    async fn busy_vector(holding: usize, workers: usize) -> Vec<bool> {
        let registry = Arc::new(CapacityRegistry::new());
        let flags: Vec<Arc<AtomicBool>> = URNS
            .iter()
            .enumerate()
            .map(|(i, urn)| {
                let flag = Arc::new(AtomicBool::new(i < holding));
                registry.register("pool", urn, flag.clone());
                flag
            })
            .collect();
        let policy = SharedCapacity::new(registry, "pool", Arc::new(FixedWorkers(workers)));

        let mut result = Vec::new();
        for (urn, flag) in URNS.iter().zip(&flags) {
            // a sibling holding a task is busy before the policy is asked
            let busy = flag.load(Ordering::Acquire) || policy.busy(urn).await;
            result.push(busy);
        }
        result
    }

    #[rstest]
    #[case(0, 1, [false, true, true])]
    #[case(0, 2, [false, false, true])]
    #[case(0, 3, [false, false, false])]
    #[case(1, 1, [true, true, true])]
    #[case(1, 2, [true, false, true])]
    #[case(1, 3, [true, false, false])]
    #[case(3, 0, [true, true, true])]
    #[tokio::test]
    async fn test_shared_capacity_grid(
        #[case] holding: usize,
        #[case] workers: usize,
        #[case] expected: [bool; 3],
    ) {
        assert_eq!(busy_vector(holding, workers).await, expected.to_vec());
    }

    #[test]
    fn test_ranking_ignores_registration_order() {
        let siblings = vec![
            ("urn:reel:plugin:pool:c".to_string(), false),
            ("urn:reel:plugin:pool:a".to_string(), false),
            ("urn:reel:plugin:pool:b".to_string(), true),
        ];
        // b holds a task and takes the first rank, a takes the second
        assert!(!ranked_busy("urn:reel:plugin:pool:a", siblings.clone(), 2));
        assert!(ranked_busy("urn:reel:plugin:pool:c", siblings, 2));
    }

    #[tokio::test]
    async fn test_failing_worker_source_means_busy() {
        struct Unreachable;

        #[async_trait]
        impl WorkerCountSource for Unreachable {
            async fn worker_count(&self) -> anyhow::Result<usize> {
                anyhow::bail!("connection refused")
            }
        }

        let registry = Arc::new(CapacityRegistry::new());
        registry.register("pool", URNS[0], Arc::new(AtomicBool::new(false)));
        let policy = SharedCapacity::new(registry, "pool", Arc::new(Unreachable));
        assert!(policy.busy(URNS[0]).await);
    }

    #[test]
    fn test_register_replaces_same_urn() {
        let registry = CapacityRegistry::new();
        registry.register("pool", URNS[0], Arc::new(AtomicBool::new(false)));
        registry.register("pool", URNS[0], Arc::new(AtomicBool::new(true)));
        assert_eq!(registry.siblings("pool"), vec![(URNS[0].to_string(), true)]);
        assert!(registry.siblings("other").is_empty());
    }
}
