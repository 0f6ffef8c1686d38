// SPDX-FileCopyrightText: 2026 Doppel Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mock platform adapter for deterministic testing.
//!
//! `MockPlatform` implements `PlatformAdapter` with a switchable health
//! probe, a scripted send outcome queue, captured replies, injectable
//! inbound messages and pushable connectivity signals.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Notify;

use doppel_core::{
    AdapterType, ChannelId, ConnectivitySignal, DeliveryReceipt, DoppelError, HealthStatus,
    InboundMessage, OutboundReply, PlatformAdapter, PlatformKind, PluginAdapter,
};

/// One scripted outcome for `send`.
#[derive(Debug, Clone)]
pub enum SendStep {
    Deliver,
    /// Retryable transport failure.
    Transport(String),
    /// Permanent refusal.
    Reject(String),
    /// Sleeps before delivering, to exercise send timeouts and shutdown.
    Stall(Duration),
}

/// A mock messaging platform for testing.
///
/// Sends follow the script pushed through [`script_sends`](Self::script_sends)
/// and deliver once it runs out.
pub struct MockPlatform {
    kind: PlatformKind,
    healthy: AtomicBool,
    push_only: bool,
    script: Mutex<VecDeque<SendStep>>,
    sent: Mutex<Vec<OutboundReply>>,
    send_calls: AtomicUsize,
    probe_calls: AtomicUsize,
    inbound: Mutex<VecDeque<InboundMessage>>,
    inbound_ready: Notify,
    signals: Mutex<VecDeque<ConnectivitySignal>>,
    signal_ready: Notify,
}

impl MockPlatform {
    /// A healthy platform that also serves inbound messages through `receive`.
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: PlatformKind(kind.into()),
            healthy: AtomicBool::new(true),
            push_only: false,
            script: Mutex::new(VecDeque::new()),
            sent: Mutex::new(Vec::new()),
            send_calls: AtomicUsize::new(0),
            probe_calls: AtomicUsize::new(0),
            inbound: Mutex::new(VecDeque::new()),
            inbound_ready: Notify::new(),
            signals: Mutex::new(VecDeque::new()),
            signal_ready: Notify::new(),
        }
    }

    /// A platform whose `receive` reports the channel closed.
    pub fn push_only(kind: impl Into<String>) -> Self {
        Self {
            push_only: true,
            ..Self::new(kind)
        }
    }

    pub fn set_healthy(&self, healthy: bool) {
        self.healthy.store(healthy, Ordering::SeqCst);
    }

    pub fn script_sends(&self, steps: impl IntoIterator<Item = SendStep>) {
        self.script
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .extend(steps);
    }

    /// Queues `n` transport failures.
    pub fn fail_next_sends(&self, n: usize) {
        self.script_sends(
            (0..n).map(|i| SendStep::Transport(format!("connection reset #{}", i + 1))),
        );
    }

    /// Makes the next `receive` return `message`.
    pub fn inject(&self, message: InboundMessage) {
        self.inbound
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push_back(message);
        self.inbound_ready.notify_one();
    }

    /// Pushes a connectivity signal as if the platform reported it unprompted.
    pub fn push_signal(&self, signal: ConnectivitySignal) {
        self.signals
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push_back(signal);
        self.signal_ready.notify_one();
    }

    /// Replies that were delivered, in delivery order.
    pub fn sent(&self) -> Vec<OutboundReply> {
        self.sent
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn sent_for(&self, message_id: &str) -> Vec<OutboundReply> {
        self.sent()
            .into_iter()
            .filter(|r| r.in_reply_to.0 == message_id)
            .collect()
    }

    /// Every `send` call, successful or not.
    pub fn send_calls(&self) -> usize {
        self.send_calls.load(Ordering::SeqCst)
    }

    pub fn probe_calls(&self) -> usize {
        self.probe_calls.load(Ordering::SeqCst)
    }

    fn next_step(&self) -> SendStep {
        self.script
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front()
            .unwrap_or(SendStep::Deliver)
    }

    fn deliver(&self, reply: &OutboundReply) -> DeliveryReceipt {
        let mut sent = self.sent.lock().unwrap_or_else(PoisonError::into_inner);
        sent.push(reply.clone());
        DeliveryReceipt {
            platform_message_id: Some(format!("mock-{}", sent.len())),
            delivered_at: Utc::now(),
        }
    }
}

#[async_trait]
impl PluginAdapter for MockPlatform {
    fn name(&self) -> &str {
        "mock-platform"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Platform
    }
}

#[async_trait]
impl PlatformAdapter for MockPlatform {
    fn kind(&self) -> PlatformKind {
        self.kind.clone()
    }

    async fn probe(&self) -> Result<HealthStatus, DoppelError> {
        self.probe_calls.fetch_add(1, Ordering::SeqCst);
        if self.healthy.load(Ordering::SeqCst) {
            Ok(HealthStatus::Healthy)
        } else {
            Err(DoppelError::transport("mock platform unreachable"))
        }
    }

    async fn send(&self, reply: &OutboundReply) -> Result<DeliveryReceipt, DoppelError> {
        self.send_calls.fetch_add(1, Ordering::SeqCst);
        match self.next_step() {
            SendStep::Deliver => Ok(self.deliver(reply)),
            SendStep::Transport(message) => Err(DoppelError::transport(message)),
            SendStep::Reject(message) => Err(DoppelError::Rejected { message }),
            SendStep::Stall(delay) => {
                tokio::time::sleep(delay).await;
                Ok(self.deliver(reply))
            }
        }
    }

    async fn receive(&self) -> Result<InboundMessage, DoppelError> {
        if self.push_only {
            return Err(DoppelError::ChannelClosed {
                channel: ChannelId(self.kind.0.clone()),
            });
        }
        loop {
            let next = self
                .inbound
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .pop_front();
            if let Some(message) = next {
                return Ok(message);
            }
            self.inbound_ready.notified().await;
        }
    }

    async fn next_signal(&self) -> Option<ConnectivitySignal> {
        loop {
            let next = self
                .signals
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .pop_front();
            if next.is_some() {
                return next;
            }
            self.signal_ready.notified().await;
        }
    }
}
