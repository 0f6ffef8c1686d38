// SPDX-FileCopyrightText: 2026 Doppel Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Connectivity transitions and delivery retry behavior, on a paused clock.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use doppel_connection::{ChannelConnection, ConnectionSettings, DeliveryOutcome};
use doppel_core::{
    AdapterType, ChannelId, ConnectionState, ConnectivitySignal, DeliveryReceipt, DoppelError,
    HealthStatus, InboundMessage, MessageId, OutboundReply, PlatformAdapter, PlatformKind,
    PluginAdapter,
};
use tokio_util::sync::CancellationToken;

/// Answers probes and sends from scripts; an empty script means success.
#[derive(Default)]
struct ScriptedPlatform {
    probes: Mutex<VecDeque<Result<HealthStatus, DoppelError>>>,
    sends: Mutex<VecDeque<Result<(), DoppelError>>>,
    send_calls: Mutex<u32>,
    probe_delay: Option<Duration>,
    /// Pushed signals; the stream ends once drained.
    signals: Mutex<VecDeque<ConnectivitySignal>>,
}

impl ScriptedPlatform {
    fn with_sends(sends: Vec<Result<(), DoppelError>>) -> Self {
        Self {
            sends: Mutex::new(sends.into()),
            ..Self::default()
        }
    }

    fn calls(&self) -> u32 {
        *self.send_calls.lock().unwrap()
    }
}

#[async_trait]
impl PluginAdapter for ScriptedPlatform {
    fn name(&self) -> &str {
        "scripted"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Platform
    }
}

#[async_trait]
impl PlatformAdapter for ScriptedPlatform {
    fn kind(&self) -> PlatformKind {
        PlatformKind::from("scripted")
    }

    async fn probe(&self) -> Result<HealthStatus, DoppelError> {
        if let Some(delay) = self.probe_delay {
            tokio::time::sleep(delay).await;
        }
        self.probes
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Ok(HealthStatus::Healthy))
    }

    async fn send(&self, _reply: &OutboundReply) -> Result<DeliveryReceipt, DoppelError> {
        *self.send_calls.lock().unwrap() += 1;
        let next = self.sends.lock().unwrap().pop_front().unwrap_or(Ok(()));
        next.map(|()| DeliveryReceipt {
            platform_message_id: None,
            delivered_at: Utc::now(),
        })
    }

    async fn receive(&self) -> Result<InboundMessage, DoppelError> {
        Err(DoppelError::ChannelClosed {
            channel: ChannelId::from("chat"),
        })
    }

    async fn next_signal(&self) -> Option<ConnectivitySignal> {
        self.signals.lock().unwrap().pop_front()
    }
}

fn reply() -> OutboundReply {
    OutboundReply {
        channel: ChannelId::from("chat"),
        in_reply_to: MessageId::from("m1"),
        recipient: "bob".into(),
        body: "sounds good".into(),
        generated_at: Utc::now(),
    }
}

fn connect(
    platform: Arc<ScriptedPlatform>,
) -> (
    ChannelConnection,
    tokio::sync::mpsc::UnboundedReceiver<doppel_core::ConnectivityEvent>,
) {
    ChannelConnection::new(
        ChannelId::from("chat"),
        platform,
        ConnectionSettings::default(),
    )
}

fn transport_failures(n: usize) -> Vec<Result<(), DoppelError>> {
    (0..n)
        .map(|_| Err(DoppelError::transport("connection reset")))
        .collect()
}

#[tokio::test(start_paused = true)]
async fn five_transport_failures_exhaust_the_budget() {
    let platform = Arc::new(ScriptedPlatform::with_sends(transport_failures(5)));
    let (conn, _events) = connect(Arc::clone(&platform));
    conn.report_reachable();

    let started = tokio::time::Instant::now();
    let outcome = conn.send(&reply(), 0, &CancellationToken::new()).await;

    match outcome {
        DeliveryOutcome::Failed {
            attempts,
            retryable,
            error,
        } => {
            assert_eq!(attempts, 5);
            assert!(retryable);
            assert!(error.is_retryable());
        }
        other => panic!("expected failure, got {other:?}"),
    }
    assert_eq!(platform.calls(), 5);
    // 1s + 2s + 4s + 8s of backoff between the five attempts.
    let waited = started.elapsed();
    assert!(waited >= Duration::from_secs(15) && waited < Duration::from_secs(16));
}

#[tokio::test(start_paused = true)]
async fn four_failures_then_success_delivers() {
    let mut script = transport_failures(4);
    script.push(Ok(()));
    let platform = Arc::new(ScriptedPlatform::with_sends(script));
    let (conn, _events) = connect(Arc::clone(&platform));
    conn.report_reachable();

    let outcome = conn.send(&reply(), 0, &CancellationToken::new()).await;
    assert!(matches!(outcome, DeliveryOutcome::Delivered { attempts: 5, .. }));
}

#[tokio::test(start_paused = true)]
async fn prior_attempts_shrink_the_budget() {
    let platform = Arc::new(ScriptedPlatform::with_sends(transport_failures(5)));
    let (conn, _events) = connect(Arc::clone(&platform));
    conn.report_reachable();

    let outcome = conn.send(&reply(), 3, &CancellationToken::new()).await;
    assert!(matches!(outcome, DeliveryOutcome::Failed { attempts: 2, .. }));
    assert_eq!(platform.calls(), 2);
}

#[tokio::test(start_paused = true)]
async fn degraded_channel_uses_reduced_budget() {
    let platform = Arc::new(ScriptedPlatform::with_sends(transport_failures(5)));
    platform
        .probes
        .lock()
        .unwrap()
        .extend([Ok(HealthStatus::Healthy), Ok(HealthStatus::Degraded("slow".into()))]);
    let (conn, _events) = connect(Arc::clone(&platform));
    conn.probe_once().await;
    assert_eq!(conn.probe_once().await, ConnectionState::Degraded);

    let outcome = conn.send(&reply(), 0, &CancellationToken::new()).await;
    assert!(matches!(outcome, DeliveryOutcome::Failed { attempts: 2, .. }));
}

#[tokio::test(start_paused = true)]
async fn rejection_is_not_retried() {
    let platform = Arc::new(ScriptedPlatform::with_sends(vec![Err(
        DoppelError::Rejected {
            message: "recipient blocked".into(),
        },
    )]));
    let (conn, _events) = connect(Arc::clone(&platform));
    conn.report_reachable();

    let outcome = conn.send(&reply(), 0, &CancellationToken::new()).await;
    assert!(matches!(
        outcome,
        DeliveryOutcome::Failed {
            attempts: 1,
            retryable: false,
            ..
        }
    ));
    assert_eq!(platform.calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn offline_channel_does_not_attempt() {
    let platform = Arc::new(ScriptedPlatform::default());
    let (conn, _events) = connect(Arc::clone(&platform));

    let outcome = conn.send(&reply(), 0, &CancellationToken::new()).await;
    assert!(matches!(outcome, DeliveryOutcome::NotAttempted));
    assert_eq!(platform.calls(), 0);
}

#[tokio::test(start_paused = true)]
async fn cancellation_stops_retrying() {
    let platform = Arc::new(ScriptedPlatform::with_sends(transport_failures(5)));
    let (conn, _events) = connect(Arc::clone(&platform));
    conn.report_reachable();

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(1500)).await;
        trigger.cancel();
    });

    let outcome = conn.send(&reply(), 0, &cancel).await;
    assert!(matches!(
        outcome,
        DeliveryOutcome::Failed {
            attempts: 2,
            retryable: true,
            ..
        }
    ));
}

#[tokio::test(start_paused = true)]
async fn going_offline_between_attempts_interrupts_delivery() {
    let platform = Arc::new(ScriptedPlatform::with_sends(transport_failures(5)));
    let (conn, _events) = connect(Arc::clone(&platform));
    conn.report_reachable();
    let conn = Arc::new(conn);

    let dropper = Arc::clone(&conn);
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(500)).await;
        dropper.report_disconnected();
    });

    let outcome = conn.send(&reply(), 0, &CancellationToken::new()).await;
    assert!(matches!(outcome, DeliveryOutcome::Failed { attempts: 1, .. }));
}

#[tokio::test(start_paused = true)]
async fn transitions_are_emitted_once_and_in_order() {
    let platform = Arc::new(ScriptedPlatform::default());
    platform.probes.lock().unwrap().extend([
        Ok(HealthStatus::Healthy),
        Ok(HealthStatus::Healthy),
        Err(DoppelError::transport("dns")),
        Ok(HealthStatus::Unhealthy("500".into())),
        Ok(HealthStatus::Unhealthy("500".into())),
        Ok(HealthStatus::Unhealthy("500".into())),
        Ok(HealthStatus::Unhealthy("500".into())),
        Ok(HealthStatus::Healthy),
    ]);
    let (conn, mut events) = connect(platform);

    for _ in 0..8 {
        conn.probe_once().await;
    }

    let mut seen = Vec::new();
    while let Ok(event) = events.try_recv() {
        seen.push((event.from, event.to, event.epoch));
    }
    use ConnectionState::*;
    assert_eq!(
        seen,
        vec![
            (Offline, Online, 1),
            (Online, Degraded, 1),
            (Degraded, Offline, 1),
            (Offline, Online, 2),
        ]
    );
    let status = conn.status();
    assert!(status.online);
    assert_eq!(status.epoch, 2);
}

#[tokio::test(start_paused = true)]
async fn slow_probe_counts_as_failure() {
    let platform = Arc::new(ScriptedPlatform {
        probe_delay: Some(Duration::from_secs(30)),
        ..ScriptedPlatform::default()
    });
    let (conn, _events) = connect(platform);
    conn.report_reachable();

    assert_eq!(conn.probe_once().await, ConnectionState::Degraded);
}

#[tokio::test(start_paused = true)]
async fn probe_loop_runs_until_cancelled() {
    let platform = Arc::new(ScriptedPlatform::default());
    let (conn, mut events) = connect(platform);
    let conn = Arc::new(conn);
    let cancel = CancellationToken::new();

    let handle = tokio::spawn(Arc::clone(&conn).run_probe_loop(cancel.clone()));
    let first = events.recv().await.unwrap();
    assert_eq!(first.to, ConnectionState::Online);

    cancel.cancel();
    handle.await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn pushed_signals_drive_the_state_machine() {
    let platform = Arc::new(ScriptedPlatform::default());
    platform.signals.lock().unwrap().extend([
        ConnectivitySignal::Reachable,
        ConnectivitySignal::Disconnected,
        ConnectivitySignal::Reachable,
    ]);
    let (conn, mut events) = connect(platform);
    let conn = Arc::new(conn);

    // Returns once the adapter has no more signals.
    Arc::clone(&conn)
        .run_signal_loop(CancellationToken::new())
        .await;

    let mut seen = Vec::new();
    while let Ok(event) = events.try_recv() {
        seen.push((event.from, event.to, event.epoch));
    }
    use ConnectionState::*;
    assert_eq!(
        seen,
        vec![
            (Offline, Online, 1),
            (Online, Degraded, 1),
            (Degraded, Offline, 1),
            (Offline, Online, 2),
        ]
    );
}
