// SPDX-FileCopyrightText: 2026 Doppel Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error taxonomy shared by every Doppel component.

use thiserror::Error;

use crate::types::{ChannelId, MessageId};

/// Boxed error source carried by transport, generation and storage failures.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// The primary error type used across adapter traits and core operations.
#[derive(Debug, Error)]
pub enum DoppelError {
    /// Configuration errors (invalid TOML, missing channels, bad values).
    #[error("configuration error: {0}")]
    Config(String),

    /// Bad training sample or malformed message. Rejected, never retried.
    #[error("validation error: {message}")]
    Validation { message: String },

    /// The message id is already known on this channel.
    #[error("duplicate message `{message_id}` on channel `{channel}`")]
    Duplicate {
        channel: ChannelId,
        message_id: MessageId,
    },

    /// The channel lane already holds `capacity` live items.
    #[error("queue for channel `{channel}` is at capacity ({capacity})")]
    CapacityExceeded { channel: ChannelId, capacity: usize },

    /// Network or transport failure talking to a platform. Retryable.
    #[error("transport error: {message}")]
    Transport {
        message: String,
        source: Option<BoxError>,
    },

    /// The platform refused the reply (bad recipient, policy). Not retryable.
    #[error("delivery rejected: {message}")]
    Rejected { message: String },

    /// The text-generation service failed, timed out, or returned nothing.
    #[error("generation error: {message}")]
    Generation {
        message: String,
        source: Option<BoxError>,
    },

    /// Operation timed out.
    #[error("operation timed out after {duration:?}")]
    Timeout { duration: std::time::Duration },

    /// A send was requested while the channel is Offline.
    #[error("channel `{channel}` is offline")]
    ChannelOffline { channel: ChannelId },

    /// The adapter has no further inbound messages.
    #[error("channel `{channel}` closed")]
    ChannelClosed { channel: ChannelId },

    /// No lane or connection is registered under this id.
    #[error("unknown channel `{channel}`")]
    UnknownChannel { channel: ChannelId },

    /// Storage backend errors (database connection, query failure, serialization).
    #[error("storage error: {source}")]
    Storage { source: BoxError },

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}

impl DoppelError {
    /// Shorthand for a [`DoppelError::Validation`].
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// Shorthand for a sourceless [`DoppelError::Transport`].
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
            source: None,
        }
    }

    /// Shorthand for a sourceless [`DoppelError::Generation`].
    pub fn generation(message: impl Into<String>) -> Self {
        Self::Generation {
            message: message.into(),
            source: None,
        }
    }

    /// Wraps any error as a [`DoppelError::Storage`].
    pub fn storage(source: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Storage {
            source: Box::new(source),
        }
    }

    /// Whether a delivery that failed with this error may be attempted again.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transport { .. } | Self::Timeout { .. })
    }
}
