//! Orchestrator configuration
//!
//! Read from the environment at startup, see [`Config::from_env`].

use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

/// Plugin sets that can be enabled through `REEL_PLUGINS`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PluginSet {
    /// Two dummy transcoders, a logo preprocessor and a file renamer
    Dummy,
    /// Dummy timecode transcoders sharing the capacity of a worker pool
    DummyPool,
    /// A transcoder failing on demand, for exercising retries
    DummyRetry,
}

impl FromStr for PluginSet {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "dummy" => Ok(PluginSet::Dummy),
            "dummypool" => Ok(PluginSet::DummyPool),
            "dummyretry" => Ok(PluginSet::DummyRetry),
            other => anyhow::bail!("Unknown plugin set: {}", other),
        }
    }
}

/// Where the dummy pool learns its worker count
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PoolWorkers {
    Fixed(usize),
    /// Read from a JSON endpoint at the given pointer
    Remote { url: String, pointer: String },
}

#[derive(Debug, Clone)]
pub struct Config {
    /// PostgreSQL connection string, in-memory repositories when unset
    pub database_url: Option<String>,
    pub bind_addr: String,
    /// Host part of this instance's leader-election id
    pub hostname: String,
    pub pulse_interval: Duration,
    /// Age after which a lease without heartbeat can be taken over
    pub semaphore_max_age: Duration,
    /// Pulse failures within this window make `/health/pulse` unhealthy
    pub health_window: Duration,
    /// How far back `/health/jobs` counts finished jobs
    pub jobs_health_window: Duration,
    pub jobs_health_min_failures: usize,
    /// Failed share of finished jobs above which `/health/jobs` alarms
    pub jobs_health_failure_ratio: f64,
    pub plugin_sets: Vec<PluginSet>,
    pub dummy_pool_size: usize,
    pub dummy_pool_workers: PoolWorkers,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_url: None,
            bind_addr: "0.0.0.0:8080".to_string(),
            hostname: "localhost".to_string(),
            pulse_interval: Duration::from_secs(10),
            semaphore_max_age: Duration::from_secs(60),
            health_window: Duration::from_secs(300),
            jobs_health_window: Duration::from_secs(3600),
            jobs_health_min_failures: 3,
            jobs_health_failure_ratio: 0.5,
            plugin_sets: vec![PluginSet::Dummy],
            dummy_pool_size: 3,
            dummy_pool_workers: PoolWorkers::Fixed(3),
        }
    }
}

impl Config {
    /// Creates configuration from environment variables
    ///
    /// Expected environment variables:
    /// - DATABASE_URL (optional, in-memory storage when unset)
    /// - ORCHESTRATOR_BIND_ADDR (optional, default: 0.0.0.0:8080)
    /// - HOSTNAME (optional, default: localhost)
    /// - PULSE_INTERVAL (optional, seconds, default: 10)
    /// - SEMAPHORE_MAX_AGE (optional, seconds, default: 60)
    /// - HEALTH_WINDOW (optional, seconds, default: 300)
    /// - JOBS_HEALTH_WINDOW (optional, seconds, default: 3600)
    /// - JOBS_HEALTH_MIN_FAILURES (optional, default: 3)
    /// - JOBS_HEALTH_FAILURE_RATIO (optional, default: 0.5)
    /// - REEL_PLUGINS (optional, comma separated, default: dummy)
    /// - DUMMY_POOL_SIZE (optional, default: 3)
    /// - DUMMY_POOL_WORKERS_URL / DUMMY_POOL_WORKERS_POINTER (optional)
    /// - DUMMY_POOL_WORKERS (optional, default: pool size)
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(var: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let defaults = Self::default();
        let secs = |key: &str, default: Duration| -> anyhow::Result<Duration> {
            match var(key) {
                Some(value) => value
                    .parse::<u64>()
                    .map(Duration::from_secs)
                    .map_err(|_| anyhow::anyhow!("{} must be a number of seconds, got {}", key, value)),
                None => Ok(default),
            }
        };

        let plugin_sets = match var("REEL_PLUGINS") {
            Some(value) => value
                .split(',')
                .filter(|s| !s.trim().is_empty())
                .map(PluginSet::from_str)
                .collect::<anyhow::Result<Vec<_>>>()?,
            None => defaults.plugin_sets,
        };

        let jobs_health_min_failures = match var("JOBS_HEALTH_MIN_FAILURES") {
            Some(value) => value
                .parse::<usize>()
                .map_err(|_| anyhow::anyhow!("JOBS_HEALTH_MIN_FAILURES must be a number, got {}", value))?,
            None => defaults.jobs_health_min_failures,
        };

        let jobs_health_failure_ratio = match var("JOBS_HEALTH_FAILURE_RATIO") {
            Some(value) => value
                .parse::<f64>()
                .map_err(|_| anyhow::anyhow!("JOBS_HEALTH_FAILURE_RATIO must be a number, got {}", value))?,
            None => defaults.jobs_health_failure_ratio,
        };

        let dummy_pool_size = match var("DUMMY_POOL_SIZE") {
            Some(value) => value
                .parse::<usize>()
                .map_err(|_| anyhow::anyhow!("DUMMY_POOL_SIZE must be a number, got {}", value))?,
            None => defaults.dummy_pool_size,
        };

        let dummy_pool_workers = match (var("DUMMY_POOL_WORKERS_URL"), var("DUMMY_POOL_WORKERS")) {
            (Some(url), _) => PoolWorkers::Remote {
                url,
                pointer: var("DUMMY_POOL_WORKERS_POINTER").unwrap_or_else(|| "/workers".to_string()),
            },
            (None, Some(value)) => PoolWorkers::Fixed(
                value
                    .parse::<usize>()
                    .map_err(|_| anyhow::anyhow!("DUMMY_POOL_WORKERS must be a number, got {}", value))?,
            ),
            (None, None) => PoolWorkers::Fixed(dummy_pool_size),
        };

        Ok(Self {
            database_url: var("DATABASE_URL").filter(|url| !url.is_empty()),
            bind_addr: var("ORCHESTRATOR_BIND_ADDR").unwrap_or(defaults.bind_addr),
            hostname: var("HOSTNAME").unwrap_or(defaults.hostname),
            pulse_interval: secs("PULSE_INTERVAL", defaults.pulse_interval)?,
            semaphore_max_age: secs("SEMAPHORE_MAX_AGE", defaults.semaphore_max_age)?,
            health_window: secs("HEALTH_WINDOW", defaults.health_window)?,
            jobs_health_window: secs("JOBS_HEALTH_WINDOW", defaults.jobs_health_window)?,
            jobs_health_min_failures,
            jobs_health_failure_ratio,
            plugin_sets,
            dummy_pool_size,
            dummy_pool_workers,
        })
    }

    /// Validates the configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.bind_addr.parse::<SocketAddr>().is_err() {
            anyhow::bail!("bind_addr must be <ip>:<port>, got {}", self.bind_addr);
        }

        if self.hostname.is_empty() {
            anyhow::bail!("hostname cannot be empty");
        }

        if self.pulse_interval.is_zero() {
            anyhow::bail!("pulse_interval must be greater than 0");
        }

        if self.semaphore_max_age <= self.pulse_interval {
            anyhow::bail!("semaphore_max_age must be longer than pulse_interval");
        }

        if self.jobs_health_window.is_zero() {
            anyhow::bail!("jobs_health_window must be greater than 0");
        }

        if !(0.0..=1.0).contains(&self.jobs_health_failure_ratio) {
            anyhow::bail!("jobs_health_failure_ratio must be between 0 and 1");
        }

        if self.plugin_sets.is_empty() {
            anyhow::bail!("at least one plugin set must be enabled");
        }

        for (i, set) in self.plugin_sets.iter().enumerate() {
            if self.plugin_sets[..i].contains(set) {
                anyhow::bail!("plugin set {:?} is enabled twice", set);
            }
        }

        if self.plugin_sets.contains(&PluginSet::DummyPool) {
            if self.dummy_pool_size == 0 {
                anyhow::bail!("dummy_pool_size must be greater than 0");
            }
            if let PoolWorkers::Remote { url, .. } = &self.dummy_pool_workers
                && !url.starts_with("http://")
                && !url.starts_with("https://")
            {
                anyhow::bail!("dummy pool workers url must start with http:// or https://");
            }
        }

        Ok(())
    }

    /// Leader-election id of this instance, `<hostname>:<port>`
    pub fn caller_id(&self) -> String {
        let port = self.bind_addr.rsplit(':').next().unwrap_or_default();
        format!("{}:{}", self.hostname, port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_default_config() {
        let config = Config::from_lookup(lookup(&[])).unwrap();
        assert!(config.database_url.is_none());
        assert_eq!(config.pulse_interval, Duration::from_secs(10));
        assert_eq!(config.semaphore_max_age, Duration::from_secs(60));
        assert_eq!(config.plugin_sets, vec![PluginSet::Dummy]);
        assert_eq!(config.jobs_health_window, Duration::from_secs(3600));
        assert_eq!(config.jobs_health_min_failures, 3);
        assert_eq!(config.caller_id(), "localhost:8080");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_from_vars() {
        let config = Config::from_lookup(lookup(&[
            ("DATABASE_URL", "postgres://reel@db/reel"),
            ("ORCHESTRATOR_BIND_ADDR", "127.0.0.1:9000"),
            ("HOSTNAME", "node-a"),
            ("PULSE_INTERVAL", "5"),
            ("REEL_PLUGINS", "dummy, dummypool"),
            ("DUMMY_POOL_SIZE", "4"),
            ("DUMMY_POOL_WORKERS_URL", "http://pool/health"),
            ("JOBS_HEALTH_MIN_FAILURES", "5"),
            ("JOBS_HEALTH_FAILURE_RATIO", "0.25"),
        ]))
        .unwrap();

        assert_eq!(config.database_url.as_deref(), Some("postgres://reel@db/reel"));
        assert_eq!(config.caller_id(), "node-a:9000");
        assert_eq!(config.pulse_interval, Duration::from_secs(5));
        assert_eq!(config.plugin_sets, vec![PluginSet::Dummy, PluginSet::DummyPool]);
        assert_eq!(config.dummy_pool_size, 4);
        assert_eq!(config.jobs_health_min_failures, 5);
        assert_eq!(config.jobs_health_failure_ratio, 0.25);
        assert_eq!(
            config.dummy_pool_workers,
            PoolWorkers::Remote {
                url: "http://pool/health".to_string(),
                pointer: "/workers".to_string(),
            }
        );
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_pool_workers_default_to_pool_size() {
        let config = Config::from_lookup(lookup(&[("DUMMY_POOL_SIZE", "2")])).unwrap();
        assert_eq!(config.dummy_pool_workers, PoolWorkers::Fixed(2));
    }

    #[test]
    fn test_invalid_values_rejected() {
        assert!(Config::from_lookup(lookup(&[("PULSE_INTERVAL", "soon")])).is_err());
        assert!(Config::from_lookup(lookup(&[("REEL_PLUGINS", "dummy,wfs")])).is_err());
    }

    #[test]
    fn test_config_validation() {
        let mut config = Config::default();
        assert!(config.validate().is_ok());

        config.semaphore_max_age = config.pulse_interval;
        assert!(config.validate().is_err());
        config.semaphore_max_age = Duration::from_secs(60);

        config.bind_addr = "not-an-addr".to_string();
        assert!(config.validate().is_err());
        config.bind_addr = "0.0.0.0:8080".to_string();

        config.jobs_health_failure_ratio = 1.5;
        assert!(config.validate().is_err());
        config.jobs_health_failure_ratio = 0.5;

        config.plugin_sets = vec![PluginSet::DummyPool];
        config.dummy_pool_workers = PoolWorkers::Remote {
            url: "pool/health".to_string(),
            pointer: "/workers".to_string(),
        };
        assert!(config.validate().is_err());

        config.plugin_sets = vec![PluginSet::Dummy, PluginSet::Dummy];
        assert!(config.validate().is_err());

        config.plugin_sets.clear();
        assert!(config.validate().is_err());
    }
}
