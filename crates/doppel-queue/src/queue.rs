// SPDX-FileCopyrightText: 2026 Doppel Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The per-channel message queue.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::Utc;
use serde::Serialize;
use tokio::sync::Notify;
use tracing::{debug, info, warn};

use doppel_config::model::QueueConfig;
use doppel_core::{
    ChannelId, DoppelError, FailureReason, InboundMessage, ItemStatus, MessageId, OutboundReply,
    QueuedItem, StorageAdapter,
};

use crate::lane::{Lane, Placement, touch};

/// Counts for one channel lane.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct QueueStats {
    pub pending: usize,
    pub in_flight: usize,
    pub delivered: usize,
    pub failed: usize,
    pub paused: bool,
}

/// Ordered, per-channel queue of inbound messages awaiting a delivered reply.
///
/// All state lives in memory behind one lock; every mutation is written
/// through to the optional journal after the lock is released. Journal
/// failures are logged and counted, never surfaced to callers.
pub struct MessageQueue {
    capacity: usize,
    max_delivery_attempts: u32,
    retained_delivered: usize,
    lanes: Mutex<HashMap<ChannelId, Lane>>,
    journal: Option<Arc<dyn StorageAdapter>>,
}

impl MessageQueue {
    pub fn new(config: &QueueConfig) -> Self {
        Self {
            capacity: config.capacity,
            max_delivery_attempts: config.max_delivery_attempts,
            retained_delivered: config.retained_delivered,
            lanes: Mutex::new(HashMap::new()),
            journal: None,
        }
    }

    /// Writes every state change through `journal`.
    pub fn with_journal(mut self, journal: Arc<dyn StorageAdapter>) -> Self {
        self.journal = Some(journal);
        self
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn max_delivery_attempts(&self) -> u32 {
        self.max_delivery_attempts
    }

    fn lanes(&self) -> MutexGuard<'_, HashMap<ChannelId, Lane>> {
        self.lanes.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn with_lane<T>(
        &self,
        channel: &ChannelId,
        f: impl FnOnce(&mut Lane) -> Result<T, DoppelError>,
    ) -> Result<T, DoppelError> {
        let mut lanes = self.lanes();
        let lane = lanes
            .get_mut(channel)
            .ok_or_else(|| DoppelError::UnknownChannel {
                channel: channel.clone(),
            })?;
        f(lane)
    }

    /// Creates a paused lane for `channel`. Registering twice is a no-op.
    pub fn register_channel(&self, channel: &ChannelId) {
        self.lanes().entry(channel.clone()).or_insert_with(Lane::new);
    }

    /// Registered channels, sorted.
    pub fn channels(&self) -> Vec<ChannelId> {
        let mut channels: Vec<ChannelId> = self.lanes().keys().cloned().collect();
        channels.sort();
        channels
    }

    /// Adds a message at the tail of its channel's lane.
    ///
    /// Enqueue is idempotent on the message id: an id already seen on the
    /// channel, in any status, is refused with [`DoppelError::Duplicate`].
    /// Ids of delivered items evicted from memory are checked in the journal.
    pub async fn enqueue(&self, message: InboundMessage) -> Result<QueuedItem, DoppelError> {
        if message.channel.as_str().trim().is_empty() {
            return Err(DoppelError::validation("channel id must not be empty"));
        }
        if message.message_id.0.trim().is_empty() {
            return Err(DoppelError::validation("message id must not be empty"));
        }

        let channel = message.channel.clone();
        let evicted = self.with_lane(&channel, |lane| Ok(lane.evicted))?;
        if evicted > 0 && self.journaled(&channel, &message.message_id).await {
            return Err(DoppelError::Duplicate {
                channel,
                message_id: message.message_id,
            });
        }

        let capacity = self.capacity;
        let item = self.with_lane(&channel, |lane| {
            if lane.items.contains_key(&message.message_id) {
                return Err(DoppelError::Duplicate {
                    channel: channel.clone(),
                    message_id: message.message_id.clone(),
                });
            }
            if lane.live() >= capacity {
                return Err(DoppelError::CapacityExceeded {
                    channel: channel.clone(),
                    capacity,
                });
            }

            let item = QueuedItem {
                sequence: lane.next_sequence,
                message,
                reply: None,
                status: ItemStatus::Pending,
                attempt_count: 0,
                generation_failures: 0,
                last_error: None,
                failure_reason: None,
                revision: 1,
                updated_at: Utc::now(),
            };
            lane.next_sequence += 1;
            lane.pending.push_back(item.message_id().clone());
            lane.items.insert(item.message_id().clone(), item.clone());
            lane.notify.notify_one();
            Ok(item)
        })?;

        metrics::counter!("doppel_messages_enqueued_total", "channel" => channel.to_string())
            .increment(1);
        debug!(
            channel = %channel,
            message_id = %item.message_id(),
            sequence = item.sequence,
            "message enqueued"
        );
        self.record(&item).await;
        Ok(item)
    }

    /// Takes the oldest pending item of `channel`, or `None` if the lane is
    /// empty or paused.
    pub async fn claim(&self, channel: &ChannelId) -> Result<Option<QueuedItem>, DoppelError> {
        let claimed = self.with_lane(channel, |lane| Ok(lane.claim()))?;
        if let Some(item) = &claimed {
            self.record(item).await;
        }
        Ok(claimed)
    }

    /// Stores the generated reply on an in-flight item so retries reuse it.
    pub async fn attach_reply(
        &self,
        item: &QueuedItem,
        reply: OutboundReply,
    ) -> Result<QueuedItem, DoppelError> {
        self.settle(item, |stored| {
            stored.reply = Some(reply);
            Placement::Stay
        })
        .await
    }

    /// Marks the item delivered after `attempts` further delivery attempts.
    pub async fn complete(
        &self,
        item: &QueuedItem,
        attempts: u32,
    ) -> Result<QueuedItem, DoppelError> {
        let settled = self
            .settle(item, |stored| {
                stored.attempt_count += attempts;
                stored.last_error = None;
                Placement::Done(ItemStatus::Delivered)
            })
            .await?;
        metrics::counter!(
            "doppel_replies_delivered_total",
            "channel" => settled.channel().to_string()
        )
        .increment(1);
        Ok(settled)
    }

    /// Records a retryable delivery failure.
    ///
    /// The item goes back to the tail of the lane, or to terminal
    /// `delivery-exhausted` once its attempts reach the configured maximum.
    pub async fn fail(
        &self,
        item: &QueuedItem,
        attempts: u32,
        error: &str,
    ) -> Result<QueuedItem, DoppelError> {
        let max = self.max_delivery_attempts;
        let settled = self
            .settle(item, |stored| {
                stored.attempt_count += attempts;
                stored.last_error = Some(error.to_string());
                if stored.attempt_count >= max {
                    stored.failure_reason = Some(FailureReason::DeliveryExhausted);
                    Placement::Done(ItemStatus::Failed)
                } else {
                    Placement::Tail
                }
            })
            .await?;
        if settled.status == ItemStatus::Failed {
            self.note_terminal(&settled);
        }
        Ok(settled)
    }

    /// Returns the item to the tail after a failed generation.
    pub async fn requeue_generation(
        &self,
        item: &QueuedItem,
        error: &str,
    ) -> Result<QueuedItem, DoppelError> {
        self.settle(item, |stored| {
            stored.generation_failures += 1;
            stored.last_error = Some(error.to_string());
            Placement::Tail
        })
        .await
    }

    /// Moves the item to terminal `failed` with `reason`.
    pub async fn mark_failed(
        &self,
        item: &QueuedItem,
        reason: FailureReason,
        error: &str,
    ) -> Result<QueuedItem, DoppelError> {
        let settled = self
            .settle(item, |stored| {
                if reason == FailureReason::GenerationExhausted {
                    stored.generation_failures += 1;
                }
                stored.last_error = Some(error.to_string());
                stored.failure_reason = Some(reason);
                Placement::Done(ItemStatus::Failed)
            })
            .await?;
        self.note_terminal(&settled);
        Ok(settled)
    }

    /// Returns a claimed but unattempted item to the head, counters untouched.
    pub async fn release(&self, item: &QueuedItem) -> Result<QueuedItem, DoppelError> {
        self.settle(item, |_| Placement::Head).await
    }

    async fn settle(
        &self,
        item: &QueuedItem,
        apply: impl FnOnce(&mut QueuedItem) -> Placement,
    ) -> Result<QueuedItem, DoppelError> {
        let keep = self.retained_delivered;
        let settled = self.with_lane(item.channel(), |lane| {
            let settled = lane.settle(item, apply)?;
            lane.retain_delivered(keep);
            Ok(settled)
        })?;
        self.record(&settled).await;
        Ok(settled)
    }

    fn note_terminal(&self, item: &QueuedItem) {
        let reason = item
            .failure_reason
            .map(|r| r.to_string())
            .unwrap_or_default();
        metrics::counter!(
            "doppel_items_failed_total",
            "channel" => item.channel().to_string(),
            "reason" => reason.clone()
        )
        .increment(1);
        warn!(
            channel = %item.channel(),
            message_id = %item.message_id(),
            reason = %reason,
            attempts = item.attempt_count,
            generation_failures = item.generation_failures,
            error = item.last_error.as_deref().unwrap_or(""),
            "item failed permanently"
        );
    }

    /// Stops `claim` from handing out items on `channel`.
    pub fn pause(&self, channel: &ChannelId) -> Result<(), DoppelError> {
        self.with_lane(channel, |lane| {
            lane.paused = true;
            Ok(())
        })
    }

    /// Re-enables claiming and wakes the channel's worker.
    pub fn resume(&self, channel: &ChannelId) -> Result<(), DoppelError> {
        self.with_lane(channel, |lane| {
            lane.paused = false;
            lane.notify.notify_one();
            Ok(())
        })
    }

    pub fn is_paused(&self, channel: &ChannelId) -> Result<bool, DoppelError> {
        self.with_lane(channel, |lane| Ok(lane.paused))
    }

    /// Wake-up handle signalled on enqueue, resume and requeue.
    pub fn notifier(&self, channel: &ChannelId) -> Result<Arc<Notify>, DoppelError> {
        self.with_lane(channel, |lane| Ok(Arc::clone(&lane.notify)))
    }

    pub fn stats(&self, channel: &ChannelId) -> Result<QueueStats, DoppelError> {
        self.with_lane(channel, |lane| {
            let mut stats = QueueStats {
                pending: lane.pending.len(),
                in_flight: lane.in_flight,
                delivered: lane.evicted,
                paused: lane.paused,
                ..QueueStats::default()
            };
            for item in lane.items.values() {
                match item.status {
                    ItemStatus::Delivered => stats.delivered += 1,
                    ItemStatus::Failed => stats.failed += 1,
                    ItemStatus::Pending | ItemStatus::InFlight => {}
                }
            }
            Ok(stats)
        })
    }

    /// Live (pending + in-flight) items on `channel`; zero for unknown channels.
    pub fn len(&self, channel: &ChannelId) -> usize {
        self.lanes().get(channel).map_or(0, Lane::live)
    }

    pub fn is_empty(&self, channel: &ChannelId) -> bool {
        self.len(channel) == 0
    }

    pub fn get(&self, channel: &ChannelId, message_id: &MessageId) -> Option<QueuedItem> {
        self.lanes()
            .get(channel)
            .and_then(|lane| lane.items.get(message_id).cloned())
    }

    /// Terminal failures awaiting manual review, by channel then arrival.
    pub fn failed_items(&self) -> Vec<QueuedItem> {
        let mut failed: Vec<QueuedItem> = self
            .lanes()
            .values()
            .flat_map(|lane| lane.items.values())
            .filter(|item| item.status == ItemStatus::Failed)
            .cloned()
            .collect();
        failed.sort_by(|a, b| {
            a.channel()
                .cmp(b.channel())
                .then(a.sequence.cmp(&b.sequence))
        });
        failed
    }

    /// Rebuilds registered lanes from journaled snapshots.
    ///
    /// Items left in-flight by a crash come back as pending. Terminal items
    /// are kept for duplicate detection and review, delivered ones up to the
    /// retention window. Items of channels that are not registered are left
    /// in the journal untouched. Returns the number of live items restored.
    pub async fn restore(&self, mut items: Vec<QueuedItem>) -> usize {
        items.sort_by(|a, b| {
            a.channel()
                .cmp(b.channel())
                .then(a.sequence.cmp(&b.sequence))
        });

        let mut reverted = Vec::new();
        let mut live = 0;
        let mut orphaned: HashMap<ChannelId, usize> = HashMap::new();
        {
            let mut lanes = self.lanes();
            for mut item in items {
                let Some(lane) = lanes.get_mut(item.channel()) else {
                    *orphaned.entry(item.channel().clone()).or_default() += 1;
                    continue;
                };
                if lane.items.contains_key(item.message_id()) {
                    continue;
                }
                lane.next_sequence = lane.next_sequence.max(item.sequence + 1);

                if item.status == ItemStatus::InFlight {
                    item.status = ItemStatus::Pending;
                    touch(&mut item);
                    reverted.push(item.clone());
                }
                match item.status {
                    ItemStatus::Pending => {
                        lane.pending.push_back(item.message_id().clone());
                        live += 1;
                    }
                    ItemStatus::Delivered => lane.delivered.push_back(item.message_id().clone()),
                    ItemStatus::InFlight | ItemStatus::Failed => {}
                }
                lane.items.insert(item.message_id().clone(), item);
            }
            for lane in lanes.values_mut() {
                lane.retain_delivered(self.retained_delivered);
            }
        }

        for (channel, count) in &orphaned {
            warn!(
                channel = %channel,
                items = count,
                "journal holds items for a channel that is not configured, skipping"
            );
        }

        for item in &reverted {
            self.record(item).await;
        }
        info!(
            live,
            reverted = reverted.len(),
            "queue restored from journal"
        );
        live
    }

    /// Journal lookup for an evicted id. Lookup errors count as unseen.
    async fn journaled(&self, channel: &ChannelId, message_id: &MessageId) -> bool {
        let Some(journal) = &self.journal else {
            return false;
        };
        match journal.contains_item(channel, message_id).await {
            Ok(seen) => seen,
            Err(e) => {
                metrics::counter!("doppel_journal_errors_total").increment(1);
                warn!(
                    channel = %channel,
                    message_id = %message_id,
                    error = %e,
                    "journal lookup failed, treating message as new"
                );
                false
            }
        }
    }

    async fn record(&self, item: &QueuedItem) {
        let Some(journal) = &self.journal else {
            return;
        };
        if let Err(e) = journal.save_item(item).await {
            metrics::counter!("doppel_journal_errors_total").increment(1);
            warn!(
                channel = %item.channel(),
                message_id = %item.message_id(),
                error = %e,
                "failed to journal queue item"
            );
        }
    }
}
