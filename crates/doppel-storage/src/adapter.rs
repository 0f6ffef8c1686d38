// SPDX-FileCopyrightText: 2026 Doppel Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite implementation of the StorageAdapter trait.

use async_trait::async_trait;
use tokio::sync::OnceCell;
use tracing::debug;

use doppel_config::model::StorageConfig;
use doppel_core::{
    AdapterType, ChannelId, DoppelError, MessageId, PluginAdapter, QueuedItem, StorageAdapter,
    StyleSample,
};

use crate::database::Database;
use crate::queries;

/// SQLite-backed storage adapter.
///
/// The database is opened on the first call to
/// [`StorageAdapter::initialize`]; every other call fails until then.
pub struct SqliteStorage {
    config: StorageConfig,
    db: OnceCell<Database>,
}

impl SqliteStorage {
    pub fn new(config: StorageConfig) -> Self {
        Self {
            config,
            db: OnceCell::new(),
        }
    }

    fn db(&self) -> Result<&Database, DoppelError> {
        self.db.get().ok_or_else(|| DoppelError::Storage {
            source: "storage not initialized -- call initialize() first".into(),
        })
    }

    /// Terminal failed items, for manual review.
    pub async fn failed_items(&self) -> Result<Vec<QueuedItem>, DoppelError> {
        queries::queue::load_failed(self.db()?).await
    }

    pub async fn sample_count(&self, channel: &ChannelId) -> Result<u64, DoppelError> {
        queries::samples::count_samples(self.db()?, channel).await
    }
}

#[async_trait]
impl PluginAdapter for SqliteStorage {
    fn name(&self) -> &str {
        "sqlite"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Storage
    }

    async fn shutdown(&self) -> Result<(), DoppelError> {
        if let Some(db) = self.db.get() {
            db.checkpoint().await?;
            debug!("shutdown: WAL checkpoint complete");
        }
        Ok(())
    }
}

#[async_trait]
impl StorageAdapter for SqliteStorage {
    async fn initialize(&self) -> Result<(), DoppelError> {
        let db = Database::open_with(&self.config.database_path, self.config.wal_mode).await?;
        self.db.set(db).map_err(|_| DoppelError::Storage {
            source: "storage already initialized".into(),
        })?;
        debug!(path = %self.config.database_path, "SQLite storage initialized");
        Ok(())
    }

    async fn save_item(&self, item: &QueuedItem) -> Result<(), DoppelError> {
        let changed = queries::queue::save_item(self.db()?, item).await?;
        if !changed {
            debug!(
                channel = %item.channel(),
                message_id = %item.message_id(),
                revision = item.revision,
                "stale snapshot ignored"
            );
        }
        Ok(())
    }

    async fn load_items(&self) -> Result<Vec<QueuedItem>, DoppelError> {
        queries::queue::load_items(self.db()?).await
    }

    async fn contains_item(
        &self,
        channel: &ChannelId,
        message_id: &MessageId,
    ) -> Result<bool, DoppelError> {
        queries::queue::item_exists(self.db()?, channel, message_id).await
    }

    async fn append_sample(
        &self,
        channel: &ChannelId,
        sample: &StyleSample,
    ) -> Result<(), DoppelError> {
        queries::samples::append_sample(self.db()?, channel, sample).await?;
        Ok(())
    }

    async fn load_samples(&self) -> Result<Vec<(ChannelId, StyleSample)>, DoppelError> {
        queries::samples::load_samples(self.db()?).await
    }

    async fn close(&self) -> Result<(), DoppelError> {
        self.db()?.checkpoint().await?;
        debug!("WAL checkpoint complete");
        Ok(())
    }
}
