// SPDX-FileCopyrightText: 2026 Doppel Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! One channel's FIFO lane.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::Notify;

use doppel_core::{DoppelError, ItemStatus, MessageId, QueuedItem};

/// Pending order plus the items seen on the channel.
///
/// Failed items stay in `items` for review. Delivered items stay only
/// until `retain_delivered` evicts them, oldest delivery first; `evicted`
/// counts the ids that must be checked against the journal instead.
#[derive(Debug)]
pub(crate) struct Lane {
    pub(crate) pending: VecDeque<MessageId>,
    pub(crate) items: HashMap<MessageId, QueuedItem>,
    pub(crate) in_flight: usize,
    pub(crate) paused: bool,
    pub(crate) next_sequence: u64,
    pub(crate) notify: Arc<Notify>,
    /// Delivered ids still in `items`, in delivery order.
    pub(crate) delivered: VecDeque<MessageId>,
    pub(crate) evicted: usize,
}

impl Lane {
    /// Lanes start paused: a connection is Offline until its first probe succeeds.
    pub(crate) fn new() -> Self {
        Self {
            pending: VecDeque::new(),
            items: HashMap::new(),
            in_flight: 0,
            paused: true,
            next_sequence: 1,
            notify: Arc::new(Notify::new()),
            delivered: VecDeque::new(),
            evicted: 0,
        }
    }

    /// Items counted against capacity.
    pub(crate) fn live(&self) -> usize {
        self.pending.len() + self.in_flight
    }

    /// Moves the oldest pending item to in-flight.
    pub(crate) fn claim(&mut self) -> Option<QueuedItem> {
        if self.paused {
            return None;
        }
        while let Some(id) = self.pending.pop_front() {
            // Ids only sit in `pending` while their item is pending.
            let Some(item) = self.items.get_mut(&id) else {
                continue;
            };
            item.status = ItemStatus::InFlight;
            touch(item);
            self.in_flight += 1;
            return Some(item.clone());
        }
        None
    }

    /// Runs `apply` on the stored copy of an in-flight item and returns the new snapshot.
    pub(crate) fn settle(
        &mut self,
        claimed: &QueuedItem,
        apply: impl FnOnce(&mut QueuedItem) -> Placement,
    ) -> Result<QueuedItem, DoppelError> {
        let id = claimed.message_id().clone();
        let item = self.items.get_mut(&id).ok_or_else(|| {
            DoppelError::Internal(format!("message `{id}` is not queued"))
        })?;
        if item.status != ItemStatus::InFlight {
            return Err(DoppelError::Internal(format!(
                "message `{id}` is {} rather than in-flight",
                item.status
            )));
        }

        let placement = apply(item);
        match placement {
            Placement::Stay => {
                touch(item);
                return Ok(item.clone());
            }
            Placement::Head => {
                item.status = ItemStatus::Pending;
                self.pending.push_front(id);
            }
            Placement::Tail => {
                item.status = ItemStatus::Pending;
                self.pending.push_back(id);
            }
            Placement::Done(status) => {
                item.status = status;
                if status == ItemStatus::Delivered {
                    self.delivered.push_back(id);
                }
            }
        }
        touch(item);
        let snapshot = item.clone();
        self.in_flight = self.in_flight.saturating_sub(1);
        if matches!(placement, Placement::Head | Placement::Tail) {
            self.notify.notify_one();
        }
        Ok(snapshot)
    }

    /// Drops the oldest delivered items beyond `keep`.
    pub(crate) fn retain_delivered(&mut self, keep: usize) {
        while self.delivered.len() > keep {
            let Some(id) = self.delivered.pop_front() else {
                break;
            };
            self.items.remove(&id);
            self.evicted += 1;
        }
    }
}

/// Where a settled item goes next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Placement {
    /// Still in flight (reply attached).
    Stay,
    Head,
    Tail,
    Done(ItemStatus),
}

/// Bumps the revision so journals keep the newest snapshot.
pub(crate) fn touch(item: &mut QueuedItem) {
    item.revision += 1;
    item.updated_at = Utc::now();
}
