// SPDX-FileCopyrightText: 2026 Doppel Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test harness for end-to-end pipeline testing.
//!
//! `PipelineHarness` assembles an orchestrator over mock platforms, a mock
//! generator and, optionally, a temporary SQLite database, and runs it in
//! the background.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use doppel_config::DoppelConfig;
use doppel_config::model::StorageConfig;
use doppel_core::{ChannelId, DoppelError, ItemStatus, MessageId, QueuedItem, StorageAdapter};
use doppel_orchestrator::Orchestrator;
use doppel_storage::SqliteStorage;

use crate::mock_generator::MockGenerator;
use crate::mock_platform::MockPlatform;

/// Builder for [`PipelineHarness`].
pub struct PipelineHarnessBuilder {
    config: DoppelConfig,
    channels: Vec<(String, Arc<MockPlatform>)>,
    generator: Arc<MockGenerator>,
    database: Option<PathBuf>,
}

impl PipelineHarnessBuilder {
    fn new() -> Self {
        let mut config = DoppelConfig::default();
        config.connection.probe_interval_secs = 1;
        config.connection.probe_timeout_secs = 1;
        config.orchestrator.shutdown_grace_secs = 5;
        Self {
            config,
            channels: Vec::new(),
            generator: Arc::new(MockGenerator::new()),
            database: None,
        }
    }

    /// Adds a healthy pull-capable mock platform under `id`.
    pub fn channel(self, id: &str) -> Self {
        let kind = ChannelId::from(id).platform_kind().0;
        self.channel_with(id, Arc::new(MockPlatform::new(kind)))
    }

    pub fn channel_with(mut self, id: &str, platform: Arc<MockPlatform>) -> Self {
        self.channels.push((id.to_string(), platform));
        self
    }

    pub fn generator(mut self, generator: Arc<MockGenerator>) -> Self {
        self.generator = generator;
        self
    }

    pub fn configure(mut self, f: impl FnOnce(&mut DoppelConfig)) -> Self {
        f(&mut self.config);
        self
    }

    /// Journals to a SQLite file at `path`. Reuse the path to simulate a restart.
    pub fn sqlite(mut self, path: impl Into<PathBuf>) -> Self {
        self.database = Some(path.into());
        self
    }

    /// Builds the orchestrator and restores any stored state. Nothing runs
    /// until [`PipelineHarness::start`].
    pub async fn build(self) -> Result<PipelineHarness, DoppelError> {
        let storage = match &self.database {
            Some(path) => {
                let storage = Arc::new(SqliteStorage::new(StorageConfig {
                    database_path: path.to_string_lossy().into_owned(),
                    wal_mode: true,
                }));
                storage.initialize().await?;
                Some(storage)
            }
            None => None,
        };

        let mut builder = Orchestrator::builder(self.config).generator(self.generator.clone());
        if let Some(storage) = &storage {
            builder = builder.storage(storage.clone());
        }
        let mut platforms = BTreeMap::new();
        for (id, platform) in self.channels {
            builder = builder.channel(id.clone(), platform.clone());
            platforms.insert(id, platform);
        }

        let orchestrator = Arc::new(builder.build()?);
        orchestrator.restore().await?;

        Ok(PipelineHarness {
            orchestrator,
            platforms,
            generator: self.generator,
            storage,
            cancel: CancellationToken::new(),
            task: None,
        })
    }
}

/// A running (or ready-to-run) pipeline over mock collaborators.
pub struct PipelineHarness {
    pub orchestrator: Arc<Orchestrator>,
    pub generator: Arc<MockGenerator>,
    pub storage: Option<Arc<SqliteStorage>>,
    platforms: BTreeMap<String, Arc<MockPlatform>>,
    cancel: CancellationToken,
    task: Option<JoinHandle<Result<(), DoppelError>>>,
}

impl PipelineHarness {
    pub fn builder() -> PipelineHarnessBuilder {
        PipelineHarnessBuilder::new()
    }

    /// Spawns the orchestrator's run loop.
    pub fn start(&mut self) {
        let orchestrator = Arc::clone(&self.orchestrator);
        let cancel = self.cancel.clone();
        self.task = Some(tokio::spawn(orchestrator.run(cancel)));
    }

    /// Mock platform registered under `id`.
    pub fn platform(&self, id: &str) -> Option<Arc<MockPlatform>> {
        self.platforms.get(id).cloned()
    }

    pub fn item(&self, channel: &str, message_id: &str) -> Option<QueuedItem> {
        self.orchestrator
            .queue()
            .get(&ChannelId::from(channel), &MessageId::from(message_id))
    }

    pub fn status_of(&self, channel: &str, message_id: &str) -> Option<ItemStatus> {
        self.item(channel, message_id).map(|item| item.status)
    }

    /// Polls `condition` every 10ms until it holds or `timeout` elapses.
    /// Works under paused test time.
    pub async fn wait_until(&self, timeout: Duration, condition: impl Fn() -> bool) -> bool {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            if condition() {
                return true;
            }
            if tokio::time::Instant::now() >= deadline {
                return false;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }

    /// Waits until `message_id` reaches a terminal status.
    pub async fn wait_for_terminal(
        &self,
        channel: &str,
        message_id: &str,
        timeout: Duration,
    ) -> Option<QueuedItem> {
        let reached = self
            .wait_until(timeout, || {
                self.status_of(channel, message_id)
                    .is_some_and(ItemStatus::is_terminal)
            })
            .await;
        if reached {
            self.item(channel, message_id)
        } else {
            None
        }
    }

    /// Cancels the run loop and waits for it to finish.
    pub async fn shutdown(mut self) -> Result<(), DoppelError> {
        self.cancel.cancel();
        match self.task.take() {
            Some(task) => task
                .await
                .map_err(|e| DoppelError::Internal(format!("orchestrator task failed: {e}")))?,
            None => {
                if let Some(storage) = &self.storage {
                    storage.close().await?;
                }
                Ok(())
            }
        }
    }
}
