// SPDX-FileCopyrightText: 2026 Doppel Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! A live connection to one external platform.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use doppel_config::model::{BackoffConfig, ConnectionConfig};
use doppel_core::{
    ChannelId, ConnectionState, ConnectivityEvent, ConnectivitySignal, ConnectivityStatus,
    DeliveryReceipt, DoppelError, HealthStatus, InboundMessage, OutboundReply, PlatformAdapter,
};

use crate::backoff::Backoff;
use crate::state::{ConnectionMachine, Transition};

/// Timing and budget knobs of a connection.
#[derive(Debug, Clone)]
pub struct ConnectionSettings {
    pub probe_interval: Duration,
    pub probe_timeout: Duration,
    pub send_timeout: Duration,
    pub failure_threshold: u32,
    /// Total delivery attempts per item, counted across requeues.
    pub max_attempts: u32,
    /// Attempts allowed in one `send` while Degraded.
    pub degraded_max_attempts: u32,
    pub backoff: Backoff,
}

impl ConnectionSettings {
    pub fn from_config(
        connection: &ConnectionConfig,
        backoff: &BackoffConfig,
        max_attempts: u32,
    ) -> Self {
        Self {
            probe_interval: connection.probe_interval(),
            probe_timeout: connection.probe_timeout(),
            send_timeout: connection.send_timeout(),
            failure_threshold: connection.failure_threshold,
            max_attempts,
            degraded_max_attempts: connection.degraded_max_attempts,
            backoff: Backoff::from(backoff),
        }
    }
}

impl Default for ConnectionSettings {
    fn default() -> Self {
        Self::from_config(&ConnectionConfig::default(), &BackoffConfig::default(), 5)
    }
}

/// Result of one `send` call.
#[derive(Debug)]
pub enum DeliveryOutcome {
    Delivered {
        receipt: DeliveryReceipt,
        attempts: u32,
    },
    /// Gave up after `attempts`. A `retryable` failure may be requeued; the
    /// queue decides whether the item's total budget is spent.
    Failed {
        attempts: u32,
        error: DoppelError,
        retryable: bool,
    },
    /// The channel was Offline, nothing was sent.
    NotAttempted,
}

/// Connectivity state plus send/receive for one channel.
///
/// State changes only through probe results and adapter signals, either
/// pushed through [`PlatformAdapter::next_signal`] and forwarded by
/// [`run_signal_loop`](Self::run_signal_loop) or reported directly. Every change is pushed, in
/// order, onto the event stream returned by [`new`](Self::new).
pub struct ChannelConnection {
    channel: ChannelId,
    adapter: Arc<dyn PlatformAdapter>,
    settings: ConnectionSettings,
    machine: Mutex<ConnectionMachine>,
    events: mpsc::UnboundedSender<ConnectivityEvent>,
}

impl ChannelConnection {
    pub fn new(
        channel: ChannelId,
        adapter: Arc<dyn PlatformAdapter>,
        settings: ConnectionSettings,
    ) -> (Self, mpsc::UnboundedReceiver<ConnectivityEvent>) {
        let (events, rx) = mpsc::unbounded_channel();
        let machine = Mutex::new(ConnectionMachine::new(settings.failure_threshold));
        (
            Self {
                channel,
                adapter,
                settings,
                machine,
                events,
            },
            rx,
        )
    }

    pub fn channel(&self) -> &ChannelId {
        &self.channel
    }

    pub fn adapter(&self) -> &Arc<dyn PlatformAdapter> {
        &self.adapter
    }

    pub fn settings(&self) -> &ConnectionSettings {
        &self.settings
    }

    fn machine(&self) -> MutexGuard<'_, ConnectionMachine> {
        self.machine.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn state(&self) -> ConnectionState {
        self.machine().state()
    }

    pub fn epoch(&self) -> u64 {
        self.machine().epoch()
    }

    pub fn status(&self) -> ConnectivityStatus {
        let machine = self.machine();
        ConnectivityStatus {
            channel: self.channel.clone(),
            online: machine.state() == ConnectionState::Online,
            state: machine.state(),
            last_transition_at: machine.last_transition_at(),
            epoch: machine.epoch(),
        }
    }

    /// Runs one health probe and feeds the result into the state machine.
    pub async fn probe_once(&self) -> ConnectionState {
        let probe = tokio::time::timeout(self.settings.probe_timeout, self.adapter.probe());
        let healthy = match probe.await {
            Ok(Ok(HealthStatus::Healthy)) => true,
            Ok(Ok(HealthStatus::Degraded(reason) | HealthStatus::Unhealthy(reason))) => {
                debug!(channel = %self.channel, reason = %reason, "probe reported unhealthy");
                false
            }
            Ok(Err(e)) => {
                debug!(channel = %self.channel, error = %e, "probe failed");
                false
            }
            Err(_) => {
                debug!(
                    channel = %self.channel,
                    timeout_ms = self.settings.probe_timeout.as_millis() as u64,
                    "probe timed out"
                );
                false
            }
        };

        self.apply(|machine| {
            if healthy {
                machine.on_success().into_iter().collect()
            } else {
                machine.on_failure().into_iter().collect()
            }
        })
    }

    /// Adapter signal: the platform dropped the connection.
    pub fn report_disconnected(&self) -> ConnectionState {
        self.apply(ConnectionMachine::force_offline)
    }

    /// Adapter signal: the platform is reachable again.
    pub fn report_reachable(&self) -> ConnectionState {
        self.apply(|machine| machine.on_success().into_iter().collect())
    }

    pub fn report(&self, signal: ConnectivitySignal) -> ConnectionState {
        match signal {
            ConnectivitySignal::Disconnected => self.report_disconnected(),
            ConnectivitySignal::Reachable => self.report_reachable(),
        }
    }

    /// Applies an input and emits its transitions while still holding the
    /// lock, so events leave in the order the state changed.
    fn apply(
        &self,
        input: impl FnOnce(&mut ConnectionMachine) -> Vec<Transition>,
    ) -> ConnectionState {
        let mut machine = self.machine();
        for Transition { from, to } in input(&mut *machine) {
            let event = ConnectivityEvent {
                channel: self.channel.clone(),
                from,
                to,
                at: machine.last_transition_at().unwrap_or_else(chrono::Utc::now),
                epoch: machine.epoch(),
            };
            info!(
                channel = %self.channel,
                from = %from,
                to = %to,
                epoch = event.epoch,
                "connectivity changed"
            );
            metrics::counter!(
                "doppel_connectivity_transitions_total",
                "channel" => self.channel.to_string(),
                "to" => to.to_string()
            )
            .increment(1);
            if self.events.send(event).is_err() {
                debug!(channel = %self.channel, "connectivity listener gone");
            }
        }
        machine.state()
    }

    /// Probes every `probe_interval` until `cancel` fires. The first probe
    /// runs immediately.
    pub async fn run_probe_loop(self: Arc<Self>, cancel: CancellationToken) {
        let mut ticker = tokio::time::interval(self.settings.probe_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    self.probe_once().await;
                }
            }
        }
        debug!(channel = %self.channel, "probe loop stopped");
    }

    /// Forwards the adapter's pushed signals into the state machine until
    /// the adapter runs out of them or `cancel` fires.
    pub async fn run_signal_loop(self: Arc<Self>, cancel: CancellationToken) {
        loop {
            let signal = tokio::select! {
                _ = cancel.cancelled() => break,
                signal = self.adapter.next_signal() => signal,
            };
            let Some(signal) = signal else {
                debug!(channel = %self.channel, "adapter pushes no connectivity signals");
                break;
            };
            debug!(channel = %self.channel, signal = %signal, "adapter signal");
            self.report(signal);
        }
        debug!(channel = %self.channel, "signal loop stopped");
    }

    /// Delivers `reply`, retrying transport failures with backoff.
    ///
    /// `prior_attempts` are the attempts already spent on this item; only
    /// the remainder of the total budget is used, further reduced while the
    /// channel is Degraded. Retrying stops early when the channel goes
    /// Offline or `cancel` fires, and the attempts spent are reported as a
    /// retryable failure.
    pub async fn send(
        &self,
        reply: &OutboundReply,
        prior_attempts: u32,
        cancel: &CancellationToken,
    ) -> DeliveryOutcome {
        let state = self.state();
        if !state.accepts_sends() {
            return DeliveryOutcome::NotAttempted;
        }

        let per_call = match state {
            ConnectionState::Degraded => self.settings.degraded_max_attempts,
            _ => self.settings.max_attempts,
        };
        let budget = self
            .settings
            .max_attempts
            .saturating_sub(prior_attempts)
            .min(per_call);
        if budget == 0 {
            return DeliveryOutcome::Failed {
                attempts: 0,
                error: DoppelError::transport("delivery budget already spent"),
                retryable: true,
            };
        }

        let mut attempts = 0;
        loop {
            attempts += 1;
            let send = tokio::time::timeout(self.settings.send_timeout, self.adapter.send(reply));
            let error = match send.await {
                Ok(Ok(receipt)) => {
                    debug!(
                        channel = %self.channel,
                        in_reply_to = %reply.in_reply_to,
                        attempts,
                        "reply delivered"
                    );
                    return DeliveryOutcome::Delivered { receipt, attempts };
                }
                Ok(Err(e)) if !e.is_retryable() => {
                    warn!(
                        channel = %self.channel,
                        in_reply_to = %reply.in_reply_to,
                        error = %e,
                        "reply rejected"
                    );
                    return DeliveryOutcome::Failed {
                        attempts,
                        error: e,
                        retryable: false,
                    };
                }
                Ok(Err(e)) => e,
                Err(_) => DoppelError::Timeout {
                    duration: self.settings.send_timeout,
                },
            };

            if attempts >= budget {
                return DeliveryOutcome::Failed {
                    attempts,
                    error,
                    retryable: true,
                };
            }

            let delay = self.settings.backoff.delay(prior_attempts + attempts - 1);
            debug!(
                channel = %self.channel,
                in_reply_to = %reply.in_reply_to,
                attempt = attempts,
                delay_ms = delay.as_millis() as u64,
                error = %error,
                "send failed, backing off"
            );

            let interrupted = tokio::select! {
                _ = cancel.cancelled() => true,
                _ = tokio::time::sleep(delay) => !self.state().accepts_sends(),
            };
            if interrupted {
                info!(
                    channel = %self.channel,
                    in_reply_to = %reply.in_reply_to,
                    attempts,
                    "delivery interrupted"
                );
                return DeliveryOutcome::Failed {
                    attempts,
                    error,
                    retryable: true,
                };
            }
        }
    }

    /// Next inbound message from the adapter.
    pub async fn receive(&self) -> Result<InboundMessage, DoppelError> {
        self.adapter.receive().await
    }
}
