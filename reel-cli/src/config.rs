//! Configuration module
//!
//! Handles CLI configuration including orchestrator URL and other settings.

/// CLI configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// URL of the orchestrator service
    pub orchestrator_url: String,
}

impl Config {
    pub fn validate(&self) -> anyhow::Result<()> {
        if !self.orchestrator_url.starts_with("http://")
            && !self.orchestrator_url.starts_with("https://")
        {
            anyhow::bail!("orchestrator_url must start with http:// or https://");
        }
        Ok(())
    }
}
