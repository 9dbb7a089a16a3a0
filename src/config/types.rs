use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RewindConfig {
    #[serde(default)]
    pub capture: CaptureConfig,
    #[serde(default)]
    pub collector: CollectorConfig,
    pub storage: StorageConfig,
    #[serde(default)]
    pub replay: ReplayConfig,
}

/// Capture-side policy: sampling, flush cadence, and delivery retries.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaptureConfig {
    /// Base URL of the collector the capture pipeline posts to.
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    #[serde(default = "default_website_id")]
    pub website_id: String,

    /// Minimum interval between forwarded mouseMove samples. Clicks and
    /// scrolls bypass sampling.
    #[serde(default = "default_mouse_sample_interval", with = "humantime_serde")]
    pub mouse_sample_interval: Duration,

    /// Time-based flush trigger; the size threshold below fires first under
    /// high activity.
    #[serde(default = "default_flush_interval", with = "humantime_serde")]
    pub flush_interval: Duration,

    #[serde(default = "default_max_batch_events")]
    pub max_batch_events: usize,

    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,

    #[serde(default)]
    pub retry: RetryConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Attempts per batch before it is dropped with a warning.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: usize,

    /// First backoff; doubles per attempt.
    #[serde(default = "default_initial_backoff", with = "humantime_serde")]
    pub initial_backoff: Duration,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectorConfig {
    #[serde(default = "default_listen")]
    pub listen: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub path: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplayConfig {
    /// Scheduling tick of the playback loop.
    #[serde(default = "default_tick_interval", with = "humantime_serde")]
    pub tick_interval: Duration,

    #[serde(default = "default_initial_speed")]
    pub initial_speed: f64,
}

fn default_endpoint() -> String {
    "http://127.0.0.1:7180".to_string()
}

fn default_website_id() -> String {
    "default-site".to_string()
}

fn default_mouse_sample_interval() -> Duration {
    Duration::from_millis(50)
}

fn default_flush_interval() -> Duration {
    Duration::from_secs(2)
}

fn default_max_batch_events() -> usize {
    50
}

fn default_channel_capacity() -> usize {
    1024
}

fn default_max_attempts() -> usize {
    3
}

fn default_initial_backoff() -> Duration {
    Duration::from_millis(200)
}

fn default_listen() -> String {
    "127.0.0.1:7180".to_string()
}

fn default_tick_interval() -> Duration {
    Duration::from_millis(33)
}

fn default_initial_speed() -> f64 {
    1.0
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            website_id: default_website_id(),
            mouse_sample_interval: default_mouse_sample_interval(),
            flush_interval: default_flush_interval(),
            max_batch_events: default_max_batch_events(),
            channel_capacity: default_channel_capacity(),
            retry: RetryConfig::default(),
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_backoff: default_initial_backoff(),
        }
    }
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            listen: default_listen(),
        }
    }
}

impl Default for ReplayConfig {
    fn default() -> Self {
        Self {
            tick_interval: default_tick_interval(),
            initial_speed: default_initial_speed(),
        }
    }
}
