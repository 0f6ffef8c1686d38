// SPDX-FileCopyrightText: 2026 Doppel Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Storage adapter trait for the queue journal and the training-sample history.

use async_trait::async_trait;

use crate::error::DoppelError;
use crate::traits::adapter::PluginAdapter;
use crate::types::{ChannelId, MessageId, QueuedItem, StyleSample};

/// Durable backing for queue state and style history.
#[async_trait]
pub trait StorageAdapter: PluginAdapter {
    /// Prepares the backend (runs migrations, opens connections).
    async fn initialize(&self) -> Result<(), DoppelError>;

    /// Upserts an item snapshot. A snapshot whose `revision` is not newer
    /// than the stored one is ignored.
    async fn save_item(&self, item: &QueuedItem) -> Result<(), DoppelError>;

    /// Loads every stored item, ordered by channel then sequence.
    async fn load_items(&self) -> Result<Vec<QueuedItem>, DoppelError>;

    /// Whether a snapshot for `message_id` on `channel` was ever stored.
    async fn contains_item(
        &self,
        channel: &ChannelId,
        message_id: &MessageId,
    ) -> Result<bool, DoppelError>;

    /// Appends a training sample to a channel's history.
    async fn append_sample(
        &self,
        channel: &ChannelId,
        sample: &StyleSample,
    ) -> Result<(), DoppelError>;

    /// Loads the full sample history in insertion order.
    async fn load_samples(&self) -> Result<Vec<(ChannelId, StyleSample)>, DoppelError>;

    /// Closes the backend.
    async fn close(&self) -> Result<(), DoppelError>;
}
