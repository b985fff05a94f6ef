use serde::Deserialize;
use std::{collections::HashSet, fs, time::Duration};

use anyhow::{bail, Context};
use time::UtcOffset;

use crate::{aggregation::Site, broadcast::NOTIFICATIONS_GROUP, scheduler::SchedulerSettings};

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub uri: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    #[serde(default = "default_acquire_timeout_secs")]
    pub acquire_timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    pub base_interval_secs: u64,
    pub consumption_interval_secs: u64,
    pub error_backoff_secs: u64,
    pub max_concurrency: usize,
    pub channel_group: String,
    /// Derive the base cadence from the devices' own scan interval settings.
    pub use_device_scan_interval: bool,
    pub descriptor_ttl_secs: u64,
    /// Offset of the wall clock the rollup tables are written in.
    pub utc_offset_minutes: i32,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            base_interval_secs: 10,
            consumption_interval_secs: 600,
            error_backoff_secs: 30,
            max_concurrency: 8,
            channel_group: NOTIFICATIONS_GROUP.to_string(),
            use_device_scan_interval: false,
            descriptor_ttl_secs: 300,
            utc_offset_minutes: 0,
        }
    }
}

impl SchedulerConfig {
    pub fn utc_offset(&self) -> anyhow::Result<UtcOffset> {
        let seconds = self
            .utc_offset_minutes
            .checked_mul(60)
            .context("scheduler.utc_offset_minutes out of range")?;
        UtcOffset::from_whole_seconds(seconds).context("scheduler.utc_offset_minutes out of range")
    }

    pub fn settings(&self) -> anyhow::Result<SchedulerSettings> {
        Ok(SchedulerSettings {
            base_interval: Duration::from_secs(self.base_interval_secs),
            consumption_interval: Duration::from_secs(self.consumption_interval_secs),
            error_backoff: Duration::from_secs(self.error_backoff_secs),
            max_concurrency: self.max_concurrency,
            channel_group: self.channel_group.clone(),
            use_device_scan_interval: self.use_device_scan_interval,
            descriptor_ttl: Duration::from_secs(self.descriptor_ttl_secs),
            utc_offset: self.utc_offset()?,
        })
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BroadcastConfig {
    pub channel_capacity: usize,
}

impl Default for BroadcastConfig {
    fn default() -> Self {
        Self { channel_capacity: 64 }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct HttpConfig {
    pub bind_addr: String,
    /// Expose `/metrics` and install the Prometheus recorder.
    #[serde(default = "default_true")]
    pub metrics: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    #[serde(default)]
    pub broadcast: BroadcastConfig,
    pub http: Option<HttpConfig>,
    #[serde(default)]
    pub sites: Vec<Site>,
}

impl AppConfig {
    pub fn load() -> anyhow::Result<Self> {
        use std::env;

        let path = env::var("TELEMETRY_CONFIG").unwrap_or_else(|_| "telemetry-config.toml".to_string());
        let contents = fs::read_to_string(&path).with_context(|| format!("reading config file {path}"))?;
        Self::from_toml_str(&contents).with_context(|| format!("loading config file {path}"))
    }

    pub fn from_toml_str(contents: &str) -> anyhow::Result<Self> {
        let cfg: AppConfig = toml::from_str(contents)?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        let s = &self.scheduler;
        if s.base_interval_secs == 0 {
            bail!("scheduler.base_interval_secs must be positive");
        }
        if s.consumption_interval_secs == 0 {
            bail!("scheduler.consumption_interval_secs must be positive");
        }
        if s.error_backoff_secs == 0 {
            bail!("scheduler.error_backoff_secs must be positive");
        }
        if s.max_concurrency == 0 {
            bail!("scheduler.max_concurrency must be positive");
        }
        if s.channel_group.trim().is_empty() {
            bail!("scheduler.channel_group must not be empty");
        }
        s.utc_offset()?;

        if self.broadcast.channel_capacity == 0 {
            bail!("broadcast.channel_capacity must be positive");
        }

        let mut names = HashSet::new();
        for site in &self.sites {
            if !names.insert(site.name.as_str()) {
                bail!("duplicate site name {:?}", site.name);
            }
        }
        Ok(())
    }
}

fn default_max_connections() -> u32 {
    8
}

fn default_acquire_timeout_secs() -> u64 {
    5
}

fn default_true() -> bool {
    true
}
