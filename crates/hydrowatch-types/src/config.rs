//! Configuration types for Hydrowatch.
//!
//! `HydrowatchConfig` represents the top-level `config.toml` shared by the
//! control service (`[control]`) and station agents (`[agent]`). Every field
//! has a default so an empty file is a valid configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HydrowatchConfig {
    #[serde(default)]
    pub control: ControlConfig,

    #[serde(default)]
    pub agent: AgentConfig,
}

/// Control service settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ControlConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Maximum number of RPCs handled concurrently.
    #[serde(default = "default_max_workers")]
    pub max_workers: usize,

    /// Deadline for a single registry call, in milliseconds.
    #[serde(default = "default_call_timeout_ms")]
    pub call_timeout_ms: u64,

    /// Capacity of the broadcast channel behind the event bus.
    #[serde(default = "default_event_buffer")]
    pub event_buffer: usize,

    /// Capacity of the registry actor's command inbox.
    #[serde(default = "default_inbox_capacity")]
    pub inbox_capacity: usize,

    #[serde(default)]
    pub dedup: DedupConfig,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    50051
}

fn default_max_workers() -> usize {
    10
}

fn default_call_timeout_ms() -> u64 {
    2_000
}

fn default_event_buffer() -> usize {
    1024
}

fn default_inbox_capacity() -> usize {
    256
}

impl ControlConfig {
    pub fn call_timeout(&self) -> Duration {
        Duration::from_millis(self.call_timeout_ms)
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for ControlConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            max_workers: default_max_workers(),
            call_timeout_ms: default_call_timeout_ms(),
            event_buffer: default_event_buffer(),
            inbox_capacity: default_inbox_capacity(),
            dedup: DedupConfig::default(),
        }
    }
}

/// Issue deduplication window settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DedupConfig {
    /// Width of one dedup window in seconds.
    #[serde(default = "default_window_secs")]
    pub window_secs: u64,

    /// Number of most recent windows whose keys are retained.
    #[serde(default = "default_retention_windows")]
    pub retention_windows: u64,

    /// How often expired windows are pruned, in seconds.
    #[serde(default = "default_prune_interval_secs")]
    pub prune_interval_secs: u64,
}

fn default_window_secs() -> u64 {
    10
}

fn default_retention_windows() -> u64 {
    6
}

fn default_prune_interval_secs() -> u64 {
    10
}

impl Default for DedupConfig {
    fn default() -> Self {
        Self {
            window_secs: default_window_secs(),
            retention_windows: default_retention_windows(),
            prune_interval_secs: default_prune_interval_secs(),
        }
    }
}

/// Station agent settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Base URL of the control service.
    #[serde(default = "default_control_url")]
    pub control_url: String,

    #[serde(default = "default_sample_interval_secs")]
    pub sample_interval_secs: u64,

    /// Caller-side deadline for every control service call, in milliseconds.
    #[serde(default = "default_rpc_timeout_ms")]
    pub rpc_timeout_ms: u64,

    /// Number of simulated sensors attached to the station.
    #[serde(default = "default_sensor_count")]
    pub sensor_count: usize,

    /// Probability that a simulated sample is anomalous.
    #[serde(default = "default_anomaly_probability")]
    pub anomaly_probability: f64,

    /// Neighbors to link on startup.
    #[serde(default)]
    pub neighbors: Vec<String>,

    /// Subscribe to the control service event stream to keep caches fresh.
    #[serde(default = "default_follow_events")]
    pub follow_events: bool,

    #[serde(default)]
    pub publish: PublishConfig,
}

fn default_control_url() -> String {
    "http://127.0.0.1:50051".to_string()
}

fn default_sample_interval_secs() -> u64 {
    10
}

fn default_rpc_timeout_ms() -> u64 {
    5_000
}

fn default_sensor_count() -> usize {
    2
}

fn default_anomaly_probability() -> f64 {
    0.2
}

fn default_follow_events() -> bool {
    true
}

impl AgentConfig {
    pub fn sample_interval(&self) -> Duration {
        Duration::from_secs(self.sample_interval_secs)
    }

    pub fn rpc_timeout(&self) -> Duration {
        Duration::from_millis(self.rpc_timeout_ms)
    }
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            control_url: default_control_url(),
            sample_interval_secs: default_sample_interval_secs(),
            rpc_timeout_ms: default_rpc_timeout_ms(),
            sensor_count: default_sensor_count(),
            anomaly_probability: default_anomaly_probability(),
            neighbors: Vec::new(),
            follow_events: default_follow_events(),
            publish: PublishConfig::default(),
        }
    }
}

/// Retry policy for the remote event publish path.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublishConfig {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Fixed delay between attempts, in milliseconds.
    #[serde(default = "default_backoff_ms")]
    pub backoff_ms: u64,
}

fn default_max_attempts() -> u32 {
    3
}

fn default_backoff_ms() -> u64 {
    1_000
}

impl PublishConfig {
    pub fn backoff(&self) -> Duration {
        Duration::from_millis(self.backoff_ms)
    }
}

impl Default for PublishConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            backoff_ms: default_backoff_ms(),
        }
    }
}
