// SPDX-FileCopyrightText: 2026 Doppel Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Platform adapter trait: the `{probe, send, receive}` capability of one
//! messaging platform (WhatsApp bridge, mailbox, chat service).

use async_trait::async_trait;

use crate::error::DoppelError;
use crate::traits::adapter::PluginAdapter;
use crate::types::{
    ConnectivitySignal, DeliveryReceipt, HealthStatus, InboundMessage, OutboundReply, PlatformKind,
};

/// Translates between platform-native payloads and Doppel's domain types.
///
/// Adapters do not track connectivity state themselves: the owning
/// `ChannelConnection` decides what a probe result or a pushed
/// [`ConnectivitySignal`] means.
#[async_trait]
pub trait PlatformAdapter: PluginAdapter {
    /// The platform family this adapter speaks to.
    fn kind(&self) -> PlatformKind;

    /// Liveness check against the platform.
    async fn probe(&self) -> Result<HealthStatus, DoppelError>;

    /// Delivers one reply.
    ///
    /// Return [`DoppelError::Transport`] or [`DoppelError::Timeout`] for
    /// failures worth retrying and [`DoppelError::Rejected`] when the platform
    /// refused the reply for good.
    async fn send(&self, reply: &OutboundReply) -> Result<DeliveryReceipt, DoppelError>;

    /// Waits for the next inbound message.
    ///
    /// Push-only adapters (fed through the gateway) return
    /// [`DoppelError::ChannelClosed`] straight away.
    async fn receive(&self) -> Result<InboundMessage, DoppelError>;

    /// Waits for the next connectivity signal the adapter observed on its
    /// own, such as a dropped socket.
    ///
    /// `None` means the adapter has no signals to offer; the default.
    async fn next_signal(&self) -> Option<ConnectivitySignal> {
        None
    }
}
