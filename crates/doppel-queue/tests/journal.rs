// SPDX-FileCopyrightText: 2026 Doppel Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Write-through journaling of queue state.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use doppel_config::model::QueueConfig;
use doppel_core::{
    AdapterType, ChannelId, DoppelError, InboundMessage, ItemStatus, MessageId, PluginAdapter,
    QueuedItem, StorageAdapter, StyleSample,
};
use doppel_queue::MessageQueue;

#[derive(Default)]
struct RecordingJournal {
    saved: Mutex<Vec<QueuedItem>>,
    broken: bool,
}

#[async_trait]
impl PluginAdapter for RecordingJournal {
    fn name(&self) -> &str {
        "recording"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 0, 1)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Storage
    }
}

#[async_trait]
impl StorageAdapter for RecordingJournal {
    async fn initialize(&self) -> Result<(), DoppelError> {
        Ok(())
    }

    async fn save_item(&self, item: &QueuedItem) -> Result<(), DoppelError> {
        if self.broken {
            return Err(DoppelError::Internal("disk full".into()));
        }
        self.saved.lock().unwrap().push(item.clone());
        Ok(())
    }

    async fn load_items(&self) -> Result<Vec<QueuedItem>, DoppelError> {
        Ok(self.saved.lock().unwrap().clone())
    }

    async fn contains_item(
        &self,
        channel: &ChannelId,
        message_id: &MessageId,
    ) -> Result<bool, DoppelError> {
        if self.broken {
            return Err(DoppelError::Internal("disk full".into()));
        }
        Ok(self
            .saved
            .lock()
            .unwrap()
            .iter()
            .any(|item| item.channel() == channel && item.message_id() == message_id))
    }

    async fn append_sample(&self, _: &ChannelId, _: &StyleSample) -> Result<(), DoppelError> {
        Ok(())
    }

    async fn load_samples(&self) -> Result<Vec<(ChannelId, StyleSample)>, DoppelError> {
        Ok(Vec::new())
    }

    async fn close(&self) -> Result<(), DoppelError> {
        Ok(())
    }
}

fn queue_with(journal: Arc<RecordingJournal>) -> MessageQueue {
    let queue = MessageQueue::new(&QueueConfig::default()).with_journal(journal);
    queue.register_channel(&ChannelId::from("email"));
    queue.resume(&ChannelId::from("email")).unwrap();
    queue
}

#[tokio::test]
async fn every_transition_is_journaled_with_rising_revision() {
    let journal = Arc::new(RecordingJournal::default());
    let queue = queue_with(Arc::clone(&journal));

    queue
        .enqueue(InboundMessage::new("email", "m1", "ann", "hello"))
        .await
        .unwrap();
    let item = queue.claim(&"email".into()).await.unwrap().unwrap();
    queue.complete(&item, 1).await.unwrap();

    let saved = journal.saved.lock().unwrap().clone();
    let statuses: Vec<ItemStatus> = saved.iter().map(|i| i.status).collect();
    assert_eq!(
        statuses,
        vec![ItemStatus::Pending, ItemStatus::InFlight, ItemStatus::Delivered]
    );
    assert!(saved.windows(2).all(|w| w[0].revision < w[1].revision));
}

#[tokio::test]
async fn journal_failure_does_not_fail_the_operation() {
    let journal = Arc::new(RecordingJournal {
        broken: true,
        ..RecordingJournal::default()
    });
    let queue = queue_with(journal);

    let item = queue
        .enqueue(InboundMessage::new("email", "m1", "ann", "hello"))
        .await
        .unwrap();
    assert_eq!(item.status, ItemStatus::Pending);
    assert_eq!(queue.len(&"email".into()), 1);
}

#[tokio::test]
async fn evicted_ids_are_still_duplicates_through_the_journal() {
    let journal = Arc::new(RecordingJournal::default());
    let queue = MessageQueue::new(&QueueConfig {
        retained_delivered: 1,
        ..QueueConfig::default()
    })
    .with_journal(journal);
    let email = ChannelId::from("email");
    queue.register_channel(&email);
    queue.resume(&email).unwrap();

    for id in ["m1", "m2"] {
        queue
            .enqueue(InboundMessage::new("email", id, "ann", "hello"))
            .await
            .unwrap();
        let item = queue.claim(&email).await.unwrap().unwrap();
        queue.complete(&item, 1).await.unwrap();
    }
    assert!(queue.get(&email, &MessageId::from("m1")).is_none());

    let err = queue
        .enqueue(InboundMessage::new("email", "m1", "ann", "hello again"))
        .await
        .unwrap_err();
    assert!(matches!(err, DoppelError::Duplicate { .. }));
    queue
        .enqueue(InboundMessage::new("email", "m3", "ann", "new"))
        .await
        .unwrap();
}
