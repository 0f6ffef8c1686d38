// SPDX-FileCopyrightText: 2026 Doppel Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs.
//!
//! All structs use `#[serde(deny_unknown_fields)]` so a misspelled key fails
//! at startup instead of silently falling back to a default.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Top-level Doppel configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct DoppelConfig {
    /// Service identity and logging.
    #[serde(default)]
    pub service: ServiceConfig,

    /// Per-channel queue limits.
    #[serde(default)]
    pub queue: QueueConfig,

    /// Health probing and delivery budgets.
    #[serde(default)]
    pub connection: ConnectionConfig,

    /// Delivery retry backoff.
    #[serde(default)]
    pub backoff: BackoffConfig,

    /// Text-generation service settings.
    #[serde(default)]
    pub generator: GeneratorConfig,

    /// Pipeline policy.
    #[serde(default)]
    pub orchestrator: OrchestratorConfig,

    /// Style profile derivation.
    #[serde(default)]
    pub style: StyleConfig,

    /// SQLite persistence.
    #[serde(default)]
    pub storage: StorageConfig,

    /// HTTP gateway for inbound pushes, training and status.
    #[serde(default)]
    pub gateway: GatewayConfig,

    /// Connected platform channels.
    #[serde(default)]
    pub channels: Vec<ChannelConfig>,
}

/// Service identity and logging.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ServiceConfig {
    #[serde(default = "default_service_name")]
    pub name: String,

    /// Logging level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            name: default_service_name(),
            log_level: default_log_level(),
        }
    }
}

fn default_service_name() -> String {
    "doppel".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Per-channel queue limits.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct QueueConfig {
    /// Maximum live (pending + in-flight) items per channel.
    #[serde(default = "default_capacity")]
    pub capacity: usize,

    /// Delivery attempts per item before it is marked `delivery-exhausted`.
    #[serde(default = "default_max_delivery_attempts")]
    pub max_delivery_attempts: u32,

    /// Delivered items kept in memory per channel for duplicate detection.
    /// Older ids are looked up in the journal instead.
    #[serde(default = "default_retained_delivered")]
    pub retained_delivered: usize,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            capacity: default_capacity(),
            max_delivery_attempts: default_max_delivery_attempts(),
            retained_delivered: default_retained_delivered(),
        }
    }
}

fn default_retained_delivered() -> usize {
    10_000
}

fn default_capacity() -> usize {
    1000
}

fn default_max_delivery_attempts() -> u32 {
    5
}

/// Health probing and delivery budgets.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ConnectionConfig {
    #[serde(default = "default_probe_interval_secs")]
    pub probe_interval_secs: u64,

    /// A probe that takes longer than this counts as a failure.
    #[serde(default = "default_probe_timeout_secs")]
    pub probe_timeout_secs: u64,

    /// Consecutive failures while Degraded before going Offline.
    #[serde(default = "default_failure_threshold")]
    pub failure_threshold: u32,

    /// Delivery attempts allowed per send while Degraded.
    #[serde(default = "default_degraded_max_attempts")]
    pub degraded_max_attempts: u32,

    /// Timeout applied to each individual send attempt.
    #[serde(default = "default_send_timeout_secs")]
    pub send_timeout_secs: u64,
}

impl ConnectionConfig {
    pub fn probe_interval(&self) -> Duration {
        Duration::from_secs(self.probe_interval_secs)
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.probe_timeout_secs)
    }

    pub fn send_timeout(&self) -> Duration {
        Duration::from_secs(self.send_timeout_secs)
    }
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            probe_interval_secs: default_probe_interval_secs(),
            probe_timeout_secs: default_probe_timeout_secs(),
            failure_threshold: default_failure_threshold(),
            degraded_max_attempts: default_degraded_max_attempts(),
            send_timeout_secs: default_send_timeout_secs(),
        }
    }
}

fn default_probe_interval_secs() -> u64 {
    30
}

fn default_probe_timeout_secs() -> u64 {
    10
}

fn default_failure_threshold() -> u32 {
    3
}

fn default_degraded_max_attempts() -> u32 {
    2
}

fn default_send_timeout_secs() -> u64 {
    30
}

/// Exponential backoff between delivery attempts.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct BackoffConfig {
    #[serde(default = "default_base_ms")]
    pub base_ms: u64,

    #[serde(default = "default_factor")]
    pub factor: u32,

    #[serde(default = "default_cap_secs")]
    pub cap_secs: u64,
}

impl BackoffConfig {
    pub fn base(&self) -> Duration {
        Duration::from_millis(self.base_ms)
    }

    pub fn cap(&self) -> Duration {
        Duration::from_secs(self.cap_secs)
    }
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            base_ms: default_base_ms(),
            factor: default_factor(),
            cap_secs: default_cap_secs(),
        }
    }
}

fn default_base_ms() -> u64 {
    1000
}

fn default_factor() -> u32 {
    2
}

fn default_cap_secs() -> u64 {
    60
}

/// Text-generation service settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct GeneratorConfig {
    /// Base URL of an OpenAI-compatible API.
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    #[serde(default = "default_model")]
    pub model: String,

    /// Server-side credential. Never exposed through the gateway.
    #[serde(default)]
    pub api_key: Option<String>,

    #[serde(default = "default_generation_timeout_secs")]
    pub timeout_secs: u64,

    /// Cap on simultaneous generation calls. `None` means one per channel.
    #[serde(default)]
    pub max_concurrency: Option<usize>,

    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
}

impl GeneratorConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            model: default_model(),
            api_key: None,
            timeout_secs: default_generation_timeout_secs(),
            max_concurrency: None,
            max_tokens: default_max_tokens(),
        }
    }
}

fn default_endpoint() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_generation_timeout_secs() -> u64 {
    10
}

fn default_max_tokens() -> u32 {
    512
}

/// Pipeline policy owned by the orchestrator.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct OrchestratorConfig {
    /// Generation failures per message before `generation-exhausted`.
    #[serde(default = "default_generation_failure_budget")]
    pub generation_failure_budget: u32,

    /// How long shutdown waits for in-flight sends before aborting them.
    #[serde(default = "default_shutdown_grace_secs")]
    pub shutdown_grace_secs: u64,
}

impl OrchestratorConfig {
    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_secs(self.shutdown_grace_secs)
    }
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            generation_failure_budget: default_generation_failure_budget(),
            shutdown_grace_secs: default_shutdown_grace_secs(),
        }
    }
}

fn default_generation_failure_budget() -> u32 {
    3
}

fn default_shutdown_grace_secs() -> u64 {
    30
}

/// Style profile derivation limits.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct StyleConfig {
    /// Length cap for one training sample, in characters.
    #[serde(default = "default_max_sample_chars")]
    pub max_sample_chars: usize,

    #[serde(default = "default_max_tone_descriptors")]
    pub max_tone_descriptors: usize,

    #[serde(default = "default_max_vocabulary_hints")]
    pub max_vocabulary_hints: usize,
}

impl Default for StyleConfig {
    fn default() -> Self {
        Self {
            max_sample_chars: default_max_sample_chars(),
            max_tone_descriptors: default_max_tone_descriptors(),
            max_vocabulary_hints: default_max_vocabulary_hints(),
        }
    }
}

fn default_max_sample_chars() -> usize {
    4000
}

fn default_max_tone_descriptors() -> usize {
    5
}

fn default_max_vocabulary_hints() -> usize {
    12
}

/// SQLite persistence.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct StorageConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_database_path")]
    pub database_path: String,

    /// Enable WAL (Write-Ahead Logging) mode for SQLite.
    #[serde(default = "default_wal_mode")]
    pub wal_mode: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            wal_mode: default_wal_mode(),
        }
    }
}

fn default_database_path() -> String {
    dirs::data_dir()
        .map(|p| p.join("doppel").join("doppel.db"))
        .unwrap_or_else(|| std::path::PathBuf::from("doppel.db"))
        .display()
        .to_string()
}

fn default_wal_mode() -> bool {
    true
}

/// HTTP gateway.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct GatewayConfig {
    #[serde(default = "default_gateway_enabled")]
    pub enabled: bool,

    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Bearer token for `/v1` routes. Without one every `/v1` request is refused.
    #[serde(default)]
    pub bearer_token: Option<String>,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            enabled: default_gateway_enabled(),
            host: default_host(),
            port: default_port(),
            bearer_token: None,
        }
    }
}

fn default_gateway_enabled() -> bool {
    true
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8787
}

/// One connected platform channel.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ChannelConfig {
    /// Channel id, e.g. `whatsapp` or `email:work`.
    pub id: String,

    /// Adapter kind. Defaults to the id's platform prefix.
    #[serde(default)]
    pub kind: Option<String>,

    /// Liveness endpoint probed by the connection.
    #[serde(default)]
    pub health_url: Option<String>,

    /// Endpoint replies are POSTed to.
    #[serde(default)]
    pub send_url: Option<String>,

    /// Bearer token presented to the platform bridge.
    #[serde(default)]
    pub auth_token: Option<String>,

    #[serde(default = "default_channel_enabled")]
    pub enabled: bool,
}

impl ChannelConfig {
    /// Adapter kind: the explicit `kind`, else the id up to the first `:`.
    pub fn resolved_kind(&self) -> &str {
        match &self.kind {
            Some(kind) => kind.as_str(),
            None => self.id.split(':').next().unwrap_or(&self.id),
        }
    }
}

fn default_channel_enabled() -> bool {
    true
}
