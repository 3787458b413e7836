//! ==============================================================================
//! config.rs - Runtime Configuration Loader
//! ==============================================================================
//!
//! purpose:
//!     defines the schema for `enviro.toml`.
//!     loads configuration from file or falls back to defaults.
//!
//! structure:
//!     - RenderConfig: How often the render loop checks for new data.
//!     - ServerConfig: Whether and where the dashboard is served.
//!     - IngestConfig: Topic prefix, payload policy, simulated feed.
//!     - LoggingConfig: Log level and whether sensor values are printed.
//!     - ChannelEntry: One (zone, channel) registration with its retention.
//!
//! ==============================================================================

use crate::domain::{Channel, ChannelId, Zone};
use crate::record::SensorRecord;
use crate::store::{PayloadPolicy, SensorStore};
use anyhow::Context;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Root configuration structure
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct HostConfig {
    #[serde(default)]
    pub render: RenderConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub ingest: IngestConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default = "default_channels")]
    pub channels: Vec<ChannelEntry>,
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct RenderConfig {
    pub interval_seconds: u64,
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct ServerConfig {
    pub enabled: bool,
    pub bind: String,
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct IngestConfig {
    pub topic_prefix: String,
    pub malformed_payload: PayloadPolicy,
    pub simulate: bool,
    pub simulate_interval_seconds: u64,
    pub queue_depth: usize,
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub show_sensor_data: bool,
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct ChannelEntry {
    pub zone: Zone,
    pub channel: Channel,
    #[serde(default = "default_decimals")]
    pub decimals: u8,
    #[serde(default)]
    pub retention: RetentionConfig,
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RetentionConfig {
    Running { current: f64, min: f64, max: f64 },
    Windowed {
        #[serde(default = "default_window_seconds")]
        window_seconds: u64,
    },
}

fn default_decimals() -> u8 {
    1
}

fn default_window_seconds() -> u64 {
    crate::record::DEFAULT_WINDOW.as_secs()
}

/// every zone x channel pair, 24h windowed
fn default_channels() -> Vec<ChannelEntry> {
    Zone::ALL
        .into_iter()
        .flat_map(|zone| {
            Channel::ALL.into_iter().map(move |channel| ChannelEntry {
                zone,
                channel,
                decimals: match channel {
                    Channel::Temperature | Channel::WindSpeed => 1,
                    Channel::Humidity | Channel::Pressure => 0,
                },
                retention: RetentionConfig::default(),
            })
        })
        .collect()
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self { interval_seconds: 1 }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            bind: "0.0.0.0:3000".to_string(),
        }
    }
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            topic_prefix: SensorStore::DEFAULT_TOPIC_PREFIX.to_string(),
            malformed_payload: PayloadPolicy::Reject,
            simulate: true,
            simulate_interval_seconds: 5,
            queue_depth: 64,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            show_sensor_data: true,
        }
    }
}

impl Default for RetentionConfig {
    fn default() -> Self {
        RetentionConfig::Windowed {
            window_seconds: default_window_seconds(),
        }
    }
}

impl RetentionConfig {
    pub fn build(&self) -> SensorRecord {
        match *self {
            RetentionConfig::Running { current, min, max } => SensorRecord::running(current, min, max),
            RetentionConfig::Windowed { window_seconds } => {
                SensorRecord::windowed(Duration::from_secs(window_seconds))
            }
        }
    }
}

impl HostConfig {
    /// Load configuration from file
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        Self::parse(&content).with_context(|| format!("Failed to parse config {}", path.display()))
    }

    pub fn parse(content: &str) -> anyhow::Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Load from an explicit path, or the usual locations, with default fallback.
    ///
    /// runs before logging is initialised, so it reports on stdout directly.
    pub fn load_or_default(explicit: Option<&Path>) -> Self {
        let paths: Vec<PathBuf> = match explicit {
            Some(p) => vec![p.to_path_buf()],
            None => vec![
                PathBuf::from("config").join("enviro.toml"),
                PathBuf::from("..").join("config").join("enviro.toml"),
            ],
        };

        for path in &paths {
            if path.exists() {
                match Self::load(path) {
                    Ok(config) => {
                        println!("[CONFIG] Loaded from {}", path.display());
                        return config;
                    }
                    Err(e) => {
                        println!("[CONFIG] Warning: Failed to load {}: {:#}", path.display(), e);
                    }
                }
            }
        }

        println!("[CONFIG] Warning: No config file found - using defaults");
        Self::default()
    }

    pub fn render_interval(&self) -> Duration {
        Duration::from_secs(self.render.interval_seconds.max(1))
    }

    pub fn simulate_interval(&self) -> Duration {
        Duration::from_secs(self.ingest.simulate_interval_seconds.max(1))
    }

    /// build the store described by `[[channels]]`
    pub fn build_store(&self) -> anyhow::Result<SensorStore> {
        let store = self
            .channels
            .iter()
            .fold(SensorStore::builder(), |builder, entry| {
                builder.register(
                    ChannelId::new(entry.zone, entry.channel),
                    entry.retention.build(),
                    entry.decimals,
                )
            })
            .topic_prefix(self.ingest.topic_prefix.clone())
            .payload_policy(self.ingest.malformed_payload)
            .build()?;
        Ok(store)
    }

    /// Log configuration summary
    pub fn print_summary(&self) {
        tracing::info!("┌─────────────────────────────────────────┐");
        tracing::info!("│           HOST CONFIGURATION            │");
        tracing::info!("├─────────────────────────────────────────┤");
        tracing::info!("│ Render Interval: {}s", self.render.interval_seconds);
        tracing::info!("│ Topic Prefix: {}", self.ingest.topic_prefix);
        tracing::info!("│ Malformed Payloads: {:?}", self.ingest.malformed_payload);
        tracing::info!("│ Simulated Feed: {}", self.ingest.simulate);
        tracing::info!(
            "│ Dashboard: {}",
            if self.server.enabled { self.server.bind.as_str() } else { "disabled" }
        );
        tracing::info!("│ Channels: {}", self.channels.len());
        tracing::info!("│ Log Level: {}", self.logging.level);
        tracing::info!("└─────────────────────────────────────────┘");
    }
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            render: RenderConfig::default(),
            server: ServerConfig::default(),
            ingest: IngestConfig::default(),
            logging: LoggingConfig::default(),
            channels: default_channels(),
        }
    }
}
