// SPDX-FileCopyrightText: 2026 Doppel Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Domain types passed between the queue, connections, generator and orchestrator.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Opaque identifier for one external platform instance ("whatsapp", "email:work").
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChannelId(pub String);

impl ChannelId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The platform kind is the id up to the first `:`, or the whole id.
    pub fn platform_kind(&self) -> PlatformKind {
        let kind = self.0.split(':').next().unwrap_or(&self.0);
        PlatformKind(kind.to_string())
    }
}

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ChannelId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// Platform family used to pick an adapter implementation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlatformKind(pub String);

impl fmt::Display for PlatformKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PlatformKind {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// Identifier of an inbound message, unique per channel.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(pub String);

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for MessageId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// Health status reported by a platform probe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealthStatus {
    /// Platform is fully reachable.
    Healthy,
    /// Platform answers but reports a problem.
    Degraded(String),
    /// Platform is not reachable.
    Unhealthy(String),
}

impl HealthStatus {
    pub fn is_healthy(&self) -> bool {
        matches!(self, HealthStatus::Healthy)
    }
}

/// Identifies the kind of adapter behind a trait object.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum AdapterType {
    Platform,
    Generator,
    Storage,
}

/// Connectivity of one channel. Connections start `Offline`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ConnectionState {
    Online,
    Degraded,
    Offline,
}

impl ConnectionState {
    /// Sends may be attempted in every state but `Offline`.
    pub fn accepts_sends(self) -> bool {
        self != ConnectionState::Offline
    }
}

/// Connectivity news an adapter pushes on its own, outside the probe cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Serialize, Deserialize)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ConnectivitySignal {
    /// The platform dropped the connection.
    Disconnected,
    /// The platform is reachable again.
    Reachable,
}

/// One connectivity transition, emitted exactly once per change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectivityEvent {
    pub channel: ChannelId,
    pub from: ConnectionState,
    pub to: ConnectionState,
    pub at: DateTime<Utc>,
    /// Incremented each time the channel comes back Online.
    pub epoch: u64,
}

/// Read-only connectivity indicator exposed to dashboards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectivityStatus {
    pub channel: ChannelId,
    pub online: bool,
    pub state: ConnectionState,
    pub last_transition_at: Option<DateTime<Utc>>,
    pub epoch: u64,
}

impl ConnectivityStatus {
    /// Status of a channel that has not transitioned yet.
    pub fn initial(channel: ChannelId) -> Self {
        Self {
            channel,
            online: false,
            state: ConnectionState::Offline,
            last_transition_at: None,
            epoch: 0,
        }
    }
}

/// A message received from a platform, awaiting a reply. Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InboundMessage {
    pub channel: ChannelId,
    pub message_id: MessageId,
    pub sender_id: String,
    pub body: String,
    pub received_at: DateTime<Utc>,
}

impl InboundMessage {
    /// Creates a message stamped with the current time.
    pub fn new(
        channel: impl Into<String>,
        message_id: impl Into<String>,
        sender_id: impl Into<String>,
        body: impl Into<String>,
    ) -> Self {
        Self {
            channel: ChannelId(channel.into()),
            message_id: MessageId(message_id.into()),
            sender_id: sender_id.into(),
            body: body.into(),
            received_at: Utc::now(),
        }
    }
}

/// A generated reply. At most one is ever delivered per inbound message id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutboundReply {
    pub channel: ChannelId,
    pub in_reply_to: MessageId,
    pub recipient: String,
    pub body: String,
    pub generated_at: DateTime<Utc>,
}

/// Acknowledgement returned by a platform after a successful send.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryReceipt {
    /// The platform's own id for the delivered message, when it reports one.
    pub platform_message_id: Option<String>,
    pub delivered_at: DateTime<Utc>,
}

/// Lifecycle of a queued item.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "kebab-case")]
#[serde(rename_all = "kebab-case")]
pub enum ItemStatus {
    Pending,
    InFlight,
    Delivered,
    Failed,
}

impl ItemStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, ItemStatus::Delivered | ItemStatus::Failed)
    }
}

/// Why an item ended in the terminal `failed` state.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "kebab-case")]
#[serde(rename_all = "kebab-case")]
pub enum FailureReason {
    GenerationExhausted,
    DeliveryExhausted,
    DeliveryRejected,
}

/// An inbound message (and, once generated, its reply) as tracked by the queue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueuedItem {
    /// Arrival order within the channel.
    pub sequence: u64,
    pub message: InboundMessage,
    pub reply: Option<OutboundReply>,
    pub status: ItemStatus,
    /// Delivery attempts spent so far, across requeues.
    pub attempt_count: u32,
    pub generation_failures: u32,
    pub last_error: Option<String>,
    pub failure_reason: Option<FailureReason>,
    /// Bumped on every mutation; journals keep the highest revision.
    pub revision: u64,
    pub updated_at: DateTime<Utc>,
}

impl QueuedItem {
    pub fn channel(&self) -> &ChannelId {
        &self.message.channel
    }

    pub fn message_id(&self) -> &MessageId {
        &self.message.message_id
    }
}

/// One training sample for a channel's style profile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StyleSample {
    pub body: String,
    #[serde(default)]
    pub tone_tags: Vec<String>,
    /// Informational only; never feeds the derived summary.
    pub added_at: DateTime<Utc>,
}

impl StyleSample {
    pub fn new(body: impl Into<String>, tone_tags: Vec<String>) -> Self {
        Self {
            body: body.into(),
            tone_tags,
            added_at: Utc::now(),
        }
    }
}
