// SPDX-FileCopyrightText: 2026 Doppel Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for the Doppel autoresponder.
//!
//! Holds the error taxonomy, the domain types that flow between the queue,
//! connections, generator and orchestrator, and the adapter traits external
//! collaborators implement.

pub mod error;
pub mod traits;
pub mod types;

pub use error::DoppelError;
pub use types::{
    AdapterType, ChannelId, ConnectionState, ConnectivityEvent, ConnectivitySignal,
    ConnectivityStatus, DeliveryReceipt, FailureReason, HealthStatus, InboundMessage, ItemStatus,
    MessageId, OutboundReply, PlatformKind, QueuedItem, StyleSample,
};

pub use traits::{PlatformAdapter, PluginAdapter, StorageAdapter, TextGenerator};
