// SPDX-FileCopyrightText: 2026 Doppel Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, mpsc};
use tracing::{debug, info, warn};

use doppel_config::ChannelConfig;
use doppel_config::model::ConnectionConfig;
use doppel_connection::HttpHealthProbe;
use doppel_core::{
    AdapterType, ChannelId, ConnectivitySignal, DeliveryReceipt, DoppelError, HealthStatus,
    InboundMessage, OutboundReply, PlatformAdapter, PlatformKind, PluginAdapter,
};

#[derive(Debug, Serialize)]
struct ReplyPayload<'a> {
    channel: &'a str,
    in_reply_to: &'a str,
    recipient: &'a str,
    body: &'a str,
    generated_at: DateTime<Utc>,
}

#[derive(Debug, Default, Deserialize)]
struct SendAck {
    #[serde(default)]
    message_id: Option<String>,
}

/// Platform adapter for a bridge that accepts replies as JSON POSTs.
pub struct WebhookAdapter {
    channel: ChannelId,
    kind: PlatformKind,
    client: reqwest::Client,
    send_url: String,
    auth_token: Option<SecretString>,
    probe: Option<HttpHealthProbe>,
    probe_timeout: Duration,
    send_timeout: Duration,
    signal_tx: mpsc::UnboundedSender<ConnectivitySignal>,
    signal_rx: Mutex<mpsc::UnboundedReceiver<ConnectivitySignal>>,
    /// Set after a refused connection until the next successful send.
    unreachable: AtomicBool,
}

impl std::fmt::Debug for WebhookAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebhookAdapter")
            .field("channel", &self.channel)
            .field("kind", &self.kind)
            .field("send_url", &self.send_url)
            .finish_non_exhaustive()
    }
}

impl WebhookAdapter {
    /// Builds an adapter for `channel`.
    ///
    /// Requires `send_url`. Without a `health_url` probes always pass, and a
    /// send whose connection is refused pushes
    /// [`ConnectivitySignal::Disconnected`]; the channel then stays paused
    /// until the next probe. With a `health_url` the probe alone decides.
    pub fn new(
        channel: &ChannelConfig,
        connection: &ConnectionConfig,
    ) -> Result<Self, DoppelError> {
        let send_url = channel
            .send_url
            .as_deref()
            .filter(|url| !url.trim().is_empty())
            .ok_or_else(|| {
                DoppelError::Config(format!(
                    "channel {} needs a send_url for the webhook adapter",
                    channel.id
                ))
            })?
            .to_string();

        let client = reqwest::Client::builder()
            .timeout(connection.send_timeout())
            .build()
            .map_err(|e| DoppelError::Config(format!("failed to build HTTP client: {e}")))?;

        let probe = channel.health_url.as_ref().map(|url| {
            HttpHealthProbe::new(client.clone(), url.clone())
                .with_bearer_token(channel.auth_token.clone())
        });

        let (signal_tx, signal_rx) = mpsc::unbounded_channel();

        Ok(Self {
            channel: ChannelId::new(channel.id.clone()),
            kind: PlatformKind::from(channel.resolved_kind()),
            client,
            send_url,
            auth_token: channel.auth_token.clone().map(SecretString::from),
            probe,
            probe_timeout: connection.probe_timeout(),
            send_timeout: connection.send_timeout(),
            signal_tx,
            signal_rx: Mutex::new(signal_rx),
            unreachable: AtomicBool::new(false),
        })
    }

    pub fn send_url(&self) -> &str {
        &self.send_url
    }

    /// Records reachability seen on the send path. Only changes are pushed,
    /// and only when no health URL is probed.
    fn observe(&self, reachable: bool) {
        if self.probe.is_some() {
            return;
        }
        let was_unreachable = self.unreachable.swap(!reachable, Ordering::SeqCst);
        if was_unreachable == !reachable {
            return;
        }
        let signal = if reachable {
            ConnectivitySignal::Reachable
        } else {
            ConnectivitySignal::Disconnected
        };
        info!(channel = %self.channel, signal = %signal, "bridge reachability changed");
        // The receiver lives as long as `self`.
        let _ = self.signal_tx.send(signal);
    }
}

/// Factory closure for the adapter registry: builds a [`WebhookAdapter`]
/// for any channel config.
pub fn webhook_factory(
    connection: ConnectionConfig,
) -> impl Fn(&ChannelConfig) -> Result<Arc<dyn PlatformAdapter>, DoppelError>
+ Send
+ Sync
+ 'static {
    move |channel| {
        let adapter = WebhookAdapter::new(channel, &connection)?;
        Ok(Arc::new(adapter) as Arc<dyn PlatformAdapter>)
    }
}

/// 408, 429 and 5xx are worth another attempt; every other 4xx is final.
fn is_transient(status: reqwest::StatusCode) -> bool {
    status.is_server_error() || matches!(status.as_u16(), 408 | 429)
}

#[async_trait]
impl PluginAdapter for WebhookAdapter {
    fn name(&self) -> &str {
        "webhook"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Platform
    }
}

#[async_trait]
impl PlatformAdapter for WebhookAdapter {
    fn kind(&self) -> PlatformKind {
        self.kind.clone()
    }

    async fn probe(&self) -> Result<HealthStatus, DoppelError> {
        match &self.probe {
            Some(probe) => probe.check(self.probe_timeout).await,
            None => Ok(HealthStatus::Healthy),
        }
    }

    async fn send(&self, reply: &OutboundReply) -> Result<DeliveryReceipt, DoppelError> {
        let payload = ReplyPayload {
            channel: reply.channel.as_str(),
            in_reply_to: &reply.in_reply_to.0,
            recipient: &reply.recipient,
            body: &reply.body,
            generated_at: reply.generated_at,
        };

        let mut request = self.client.post(&self.send_url).json(&payload);
        if let Some(token) = &self.auth_token {
            request = request.bearer_auth(token.expose_secret());
        }

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                DoppelError::Timeout {
                    duration: self.send_timeout,
                }
            } else {
                if e.is_connect() {
                    self.observe(false);
                }
                DoppelError::Transport {
                    message: format!("send to {} failed", self.send_url),
                    source: Some(Box::new(e)),
                }
            }
        })?;
        self.observe(true);

        let status = response.status();
        let text = response.text().await.unwrap_or_default();
        debug!(channel = %self.channel, status = %status, "webhook send answered");

        if status.is_success() {
            let ack: SendAck = serde_json::from_str(&text).unwrap_or_default();
            return Ok(DeliveryReceipt {
                platform_message_id: ack.message_id,
                delivered_at: Utc::now(),
            });
        }

        if is_transient(status) {
            warn!(channel = %self.channel, status = %status, "transient webhook failure");
            return Err(DoppelError::transport(format!(
                "bridge answered {status}: {text}"
            )));
        }

        Err(DoppelError::Rejected {
            message: if text.is_empty() {
                format!("bridge answered {status}")
            } else {
                format!("bridge answered {status}: {text}")
            },
        })
    }

    async fn receive(&self) -> Result<InboundMessage, DoppelError> {
        Err(DoppelError::ChannelClosed {
            channel: self.channel.clone(),
        })
    }

    async fn next_signal(&self) -> Option<ConnectivitySignal> {
        if self.probe.is_some() {
            return None;
        }
        self.signal_rx.lock().await.recv().await
    }
}
