//! Server configuration types

use kubecast_core::BroadcasterConfig;
use kubecast_gateway::HeartbeatSettings;
use serde::{Deserialize, Serialize};

/// Application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub broadcast: BroadcastConfig,
    #[serde(default)]
    pub gateway: GatewayConfig,
}

/// Listener configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

/// Broadcaster configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BroadcastConfig {
    /// Envelopes producers can queue before waiting on the broadcaster
    #[serde(default = "default_intake_capacity")]
    pub intake_capacity: usize,
    /// Per-subscriber delivery queue (1 = one-slot buffer)
    #[serde(default = "default_delivery_buffer")]
    pub delivery_buffer: usize,
}

impl Default for BroadcastConfig {
    fn default() -> Self {
        Self {
            intake_capacity: default_intake_capacity(),
            delivery_buffer: default_delivery_buffer(),
        }
    }
}

impl BroadcastConfig {
    pub fn broadcaster_config(&self) -> BroadcasterConfig {
        BroadcasterConfig {
            delivery_buffer: self.delivery_buffer,
        }
    }
}

fn default_intake_capacity() -> usize {
    64
}

fn default_delivery_buffer() -> usize {
    1
}

/// Heartbeat timing, in milliseconds
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_ping_delay_ms")]
    pub ping_delay_ms: u64,
    #[serde(default = "default_ping_interval_ms")]
    pub ping_interval_ms: u64,
    #[serde(default = "default_read_deadline_ms")]
    pub read_deadline_ms: u64,
    #[serde(default = "default_close_timeout_ms")]
    pub close_timeout_ms: u64,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            ping_delay_ms: default_ping_delay_ms(),
            ping_interval_ms: default_ping_interval_ms(),
            read_deadline_ms: default_read_deadline_ms(),
            close_timeout_ms: default_close_timeout_ms(),
        }
    }
}

impl GatewayConfig {
    pub fn heartbeat(&self) -> HeartbeatSettings {
        HeartbeatSettings::from_millis(
            self.ping_delay_ms,
            self.ping_interval_ms,
            self.read_deadline_ms,
            self.close_timeout_ms,
        )
    }
}

fn default_ping_delay_ms() -> u64 {
    1000
}
fn default_ping_interval_ms() -> u64 {
    1000
}
fn default_read_deadline_ms() -> u64 {
    2000
}
fn default_close_timeout_ms() -> u64 {
    100
}
