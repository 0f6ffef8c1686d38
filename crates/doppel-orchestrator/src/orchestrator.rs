// SPDX-FileCopyrightText: 2026 Doppel Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The [`Orchestrator`]: owns the queue, the style store, the generator and
//! one connection per channel, and runs their tasks.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use doppel_config::DoppelConfig;
use doppel_connection::{ChannelConnection, ConnectionSettings};
use doppel_core::{
    ChannelId, ConnectivityEvent, ConnectivityStatus, DoppelError, InboundMessage,
    PlatformAdapter, QueuedItem, StorageAdapter, StyleSample, TextGenerator,
};
use doppel_generator::ReplyGenerator;
use doppel_queue::{MessageQueue, QueueStats};
use doppel_style::{StyleProfileStore, StyleSummary};

use crate::registry::AdapterRegistry;
use crate::shutdown::drain_tasks;
use crate::status::ConnectivityBoard;
use crate::worker::ChannelWorker;

/// Style profile as exposed to readers.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct ProfileView {
    pub channel: ChannelId,
    /// False when no sample has been ingested and `summary` is the neutral default.
    pub trained: bool,
    pub summary: StyleSummary,
}

/// Assembles an [`Orchestrator`].
pub struct OrchestratorBuilder {
    config: DoppelConfig,
    generator: Option<Arc<dyn TextGenerator>>,
    storage: Option<Arc<dyn StorageAdapter>>,
    channels: Vec<(ChannelId, Arc<dyn PlatformAdapter>)>,
}

impl OrchestratorBuilder {
    pub fn generator(mut self, backend: Arc<dyn TextGenerator>) -> Self {
        self.generator = Some(backend);
        self
    }

    /// Journal and sample history. Without one, state lives in memory only.
    pub fn storage(mut self, storage: Arc<dyn StorageAdapter>) -> Self {
        self.storage = Some(storage);
        self
    }

    pub fn channel(mut self, id: impl Into<String>, adapter: Arc<dyn PlatformAdapter>) -> Self {
        self.channels.push((ChannelId::new(id), adapter));
        self
    }

    /// Adds every enabled `[[channels]]` entry, building adapters through `registry`.
    pub fn channels_from_registry(
        mut self,
        registry: &AdapterRegistry,
    ) -> Result<Self, DoppelError> {
        let configured: Vec<_> = self
            .config
            .channels
            .iter()
            .filter(|c| c.enabled)
            .cloned()
            .collect();
        for channel in configured {
            let adapter = registry.build(&channel)?;
            debug!(
                channel = %channel.id,
                kind = channel.resolved_kind(),
                adapter = adapter.name(),
                "adapter built"
            );
            self.channels.push((ChannelId::new(channel.id), adapter));
        }
        Ok(self)
    }

    pub fn build(self) -> Result<Orchestrator, DoppelError> {
        let backend = self
            .generator
            .ok_or_else(|| DoppelError::Config("no text generator configured".into()))?;
        if self.channels.is_empty() {
            return Err(DoppelError::Config("no channels configured".into()));
        }

        let config = self.config;
        let mut queue = MessageQueue::new(&config.queue);
        if let Some(storage) = &self.storage {
            queue = queue.with_journal(Arc::clone(storage));
        }
        let queue = Arc::new(queue);

        let max_concurrency = config
            .generator
            .max_concurrency
            .unwrap_or(self.channels.len());
        let generator = Arc::new(ReplyGenerator::new(
            backend,
            config.generator.timeout(),
            max_concurrency,
        ));
        let styles = Arc::new(StyleProfileStore::new(&config.style));
        let board = Arc::new(ConnectivityBoard::new());
        let settings = ConnectionSettings::from_config(
            &config.connection,
            &config.backoff,
            config.queue.max_delivery_attempts,
        );

        let mut connections = BTreeMap::new();
        let mut events = HashMap::new();
        for (channel, adapter) in self.channels {
            if connections.contains_key(&channel) {
                return Err(DoppelError::Config(format!(
                    "channel `{channel}` configured twice"
                )));
            }
            let (connection, rx) =
                ChannelConnection::new(channel.clone(), adapter, settings.clone());
            queue.register_channel(&channel);
            board.register(&channel);
            connections.insert(channel.clone(), Arc::new(connection));
            events.insert(channel, rx);
        }

        info!(
            channels = connections.len(),
            max_concurrency,
            generation_budget = config.orchestrator.generation_failure_budget,
            "orchestrator assembled"
        );

        Ok(Orchestrator {
            queue,
            styles,
            generator,
            storage: self.storage,
            board,
            connections,
            events: Mutex::new(events),
            generation_budget: config.orchestrator.generation_failure_budget,
            shutdown_grace: config.orchestrator.shutdown_grace(),
        })
    }
}

/// Drives the reply pipeline for every channel.
pub struct Orchestrator {
    queue: Arc<MessageQueue>,
    styles: Arc<StyleProfileStore>,
    generator: Arc<ReplyGenerator>,
    storage: Option<Arc<dyn StorageAdapter>>,
    board: Arc<ConnectivityBoard>,
    connections: BTreeMap<ChannelId, Arc<ChannelConnection>>,
    /// Taken by `run`; each connection's receiver can be consumed once.
    events: Mutex<HashMap<ChannelId, mpsc::UnboundedReceiver<ConnectivityEvent>>>,
    generation_budget: u32,
    shutdown_grace: Duration,
}

impl Orchestrator {
    pub fn builder(config: DoppelConfig) -> OrchestratorBuilder {
        OrchestratorBuilder {
            config,
            generator: None,
            storage: None,
            channels: Vec::new(),
        }
    }

    /// Rebuilds queue lanes and style profiles from storage. Call once,
    /// before [`run`](Self::run). State of channels that are no longer
    /// configured stays in storage and is not loaded.
    pub async fn restore(&self) -> Result<(), DoppelError> {
        let Some(storage) = &self.storage else {
            return Ok(());
        };

        let items = storage.load_items().await?;
        let live = self.queue.restore(items).await;

        let mut by_channel: BTreeMap<ChannelId, Vec<StyleSample>> = BTreeMap::new();
        for (channel, sample) in storage.load_samples().await? {
            if self.connections.contains_key(&channel) {
                by_channel.entry(channel).or_default().push(sample);
            }
        }
        let mut samples = 0;
        for (channel, history) in by_channel {
            samples += self.styles.replay(&channel, history)?;
        }

        info!(live_items = live, samples, "state restored from storage");
        Ok(())
    }

    /// Runs every channel until `cancel` fires, then waits up to the
    /// shutdown grace for in-flight work before aborting it.
    pub async fn run(self: Arc<Self>, cancel: CancellationToken) -> Result<(), DoppelError> {
        let mut events = std::mem::take(
            &mut *self.events.lock().unwrap_or_else(PoisonError::into_inner),
        );
        if events.is_empty() {
            return Err(DoppelError::Internal("orchestrator is already running".into()));
        }

        let mut tasks = Vec::new();
        for (channel, connection) in &self.connections {
            let Some(rx) = events.remove(channel) else {
                continue;
            };
            let worker = ChannelWorker {
                channel: channel.clone(),
                queue: Arc::clone(&self.queue),
                connection: Arc::clone(connection),
                generator: Arc::clone(&self.generator),
                styles: Arc::clone(&self.styles),
                board: Arc::clone(&self.board),
                generation_budget: self.generation_budget,
            };

            tasks.push(tokio::spawn(
                worker.clone().watch_connectivity(rx, cancel.clone()),
            ));
            tasks.push(tokio::spawn(
                Arc::clone(connection).run_probe_loop(cancel.clone()),
            ));
            tasks.push(tokio::spawn(
                Arc::clone(connection).run_signal_loop(cancel.clone()),
            ));
            tasks.push(tokio::spawn(receive_loop(
                Arc::clone(connection),
                Arc::clone(&self.queue),
                cancel.clone(),
            )));
            tasks.push(tokio::spawn(worker.run(cancel.clone())));
        }

        info!(channels = self.connections.len(), "orchestrator running");
        cancel.cancelled().await;
        info!("shutdown requested, draining channel tasks");

        drain_tasks(tasks, self.shutdown_grace).await;

        for connection in self.connections.values() {
            if let Err(e) = connection.adapter().shutdown().await {
                warn!(channel = %connection.channel(), error = %e, "adapter shutdown error");
            }
        }
        if let Some(storage) = &self.storage {
            storage.close().await?;
        }
        info!("orchestrator stopped");
        Ok(())
    }

    /// Push entry point for webhook-style inbound adapters.
    pub async fn submit(&self, message: InboundMessage) -> Result<QueuedItem, DoppelError> {
        self.ensure_channel(&message.channel)?;
        self.queue.enqueue(message).await
    }

    /// Ingests one training sample: validated, persisted, then applied.
    pub async fn add_sample(
        &self,
        channel: &ChannelId,
        sample: StyleSample,
    ) -> Result<usize, DoppelError> {
        self.ensure_channel(channel)?;
        self.styles.validate_sample(&sample)?;
        if let Some(storage) = &self.storage {
            storage.append_sample(channel, &sample).await?;
        }
        self.styles.add_sample(channel, sample)?;
        Ok(self.styles.sample_count(channel))
    }

    pub fn profile(&self, channel: &ChannelId) -> Result<ProfileView, DoppelError> {
        self.ensure_channel(channel)?;
        let summary = self.styles.get_profile(channel);
        Ok(ProfileView {
            channel: channel.clone(),
            trained: summary.is_some(),
            summary: summary.unwrap_or_else(StyleSummary::neutral),
        })
    }

    pub fn connectivity(&self) -> Vec<ConnectivityStatus> {
        self.board.snapshot()
    }

    pub fn channel_status(&self, channel: &ChannelId) -> Option<ConnectivityStatus> {
        self.board.get(channel)
    }

    /// Terminal failed items awaiting manual review.
    pub fn failed_items(&self) -> Vec<QueuedItem> {
        self.queue.failed_items()
    }

    pub fn queue_stats(&self, channel: &ChannelId) -> Result<QueueStats, DoppelError> {
        self.queue.stats(channel)
    }

    pub fn channels(&self) -> Vec<ChannelId> {
        self.connections.keys().cloned().collect()
    }

    pub fn connection(&self, channel: &ChannelId) -> Option<&Arc<ChannelConnection>> {
        self.connections.get(channel)
    }

    pub fn queue(&self) -> &Arc<MessageQueue> {
        &self.queue
    }

    pub fn styles(&self) -> &Arc<StyleProfileStore> {
        &self.styles
    }

    fn ensure_channel(&self, channel: &ChannelId) -> Result<(), DoppelError> {
        if self.connections.contains_key(channel) {
            Ok(())
        } else {
            Err(DoppelError::UnknownChannel {
                channel: channel.clone(),
            })
        }
    }
}

/// Pulls inbound messages from the adapter into the queue until the adapter
/// closes or `cancel` fires.
async fn receive_loop(
    connection: Arc<ChannelConnection>,
    queue: Arc<MessageQueue>,
    cancel: CancellationToken,
) {
    let channel = connection.channel().clone();
    loop {
        let received = tokio::select! {
            _ = cancel.cancelled() => break,
            received = connection.receive() => received,
        };
        match received {
            Ok(mut message) => {
                if message.channel != channel {
                    debug!(
                        channel = %channel,
                        reported = %message.channel,
                        "adapter reported foreign channel id, rewriting"
                    );
                    message.channel = channel.clone();
                }
                match queue.enqueue(message).await {
                    Ok(_) => {}
                    Err(DoppelError::Duplicate { message_id, .. }) => {
                        debug!(
                            channel = %channel,
                            message_id = %message_id,
                            "duplicate inbound message dropped"
                        );
                    }
                    Err(e) => warn!(channel = %channel, error = %e, "inbound message refused"),
                }
            }
            Err(DoppelError::ChannelClosed { .. }) => {
                debug!(channel = %channel, "adapter has no inbound stream");
                break;
            }
            Err(e) => {
                warn!(channel = %channel, error = %e, "receive failed");
                if !e.is_retryable() {
                    break;
                }
                let delay = connection.settings().backoff.delay(0);
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = tokio::time::sleep(delay) => {}
                }
            }
        }
    }
    debug!(channel = %channel, "receive loop stopped");
}
