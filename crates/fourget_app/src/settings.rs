use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;
use fourget_engine::HarvestConfig;
use serde::{Deserialize, Serialize};

use crate::cli::Cli;

/// Optional settings file. Every field may be left out.
///
/// ```ron
/// (
///     output_dir: Some("/srv/archive"),
///     worker_count: Some(6),
///     request_timeout_secs: Some(60),
/// )
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AppSettings {
    pub output_dir: Option<PathBuf>,
    pub worker_count: Option<usize>,
    pub queue_capacity: Option<usize>,
    pub connect_timeout_secs: Option<u64>,
    pub request_timeout_secs: Option<u64>,
    pub redirect_limit: Option<usize>,
    pub user_agent: Option<String>,
    pub api_base: Option<String>,
    pub media_base: Option<String>,
}

impl AppSettings {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("could not read settings file {}", path.display()))?;
        ron::from_str(&content)
            .with_context(|| format!("invalid settings file {}", path.display()))
    }

    /// Command line flags win over the file, the file over built-in defaults.
    pub fn harvest_config(&self, cli: &Cli) -> HarvestConfig {
        let mut config = HarvestConfig::default();

        if let Some(dir) = cli.output_dir.as_ref().or(self.output_dir.as_ref()) {
            config.output_dir = dir.clone();
        }
        if let Some(count) = cli.worker_count.or(self.worker_count) {
            config.worker_count = count;
        }
        if let Some(capacity) = cli.queue_capacity.or(self.queue_capacity) {
            config.queue_capacity = capacity;
        }

        let fetch = &mut config.fetch;
        if let Some(secs) = self.connect_timeout_secs {
            fetch.connect_timeout = std::time::Duration::from_secs(secs);
        }
        if let Some(secs) = self.request_timeout_secs {
            fetch.request_timeout = std::time::Duration::from_secs(secs);
        }
        if let Some(limit) = self.redirect_limit {
            fetch.redirect_limit = limit;
        }
        if let Some(agent) = &self.user_agent {
            fetch.user_agent = agent.clone();
        }
        if let Some(base) = &self.api_base {
            config.endpoints.api_base = base.clone();
        }
        if let Some(base) = &self.media_base {
            config.endpoints.media_base = base.clone();
        }
        config
    }
}
