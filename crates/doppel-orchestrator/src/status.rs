// SPDX-FileCopyrightText: 2026 Doppel Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Read-only connectivity board shown to dashboards.

use std::collections::BTreeMap;
use std::sync::{PoisonError, RwLock};

use doppel_core::{ChannelId, ConnectionState, ConnectivityEvent, ConnectivityStatus};

/// Latest connectivity per channel, fed by connection events.
#[derive(Debug, Default)]
pub struct ConnectivityBoard {
    entries: RwLock<BTreeMap<ChannelId, ConnectivityStatus>>,
}

impl ConnectivityBoard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `channel` as Offline if it is not on the board yet.
    pub fn register(&self, channel: &ChannelId) {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(channel.clone())
            .or_insert_with(|| ConnectivityStatus::initial(channel.clone()));
    }

    pub fn apply(&self, event: &ConnectivityEvent) {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        let entry = entries
            .entry(event.channel.clone())
            .or_insert_with(|| ConnectivityStatus::initial(event.channel.clone()));
        entry.state = event.to;
        entry.online = event.to == ConnectionState::Online;
        entry.last_transition_at = Some(event.at);
        entry.epoch = event.epoch;
    }

    pub fn get(&self, channel: &ChannelId) -> Option<ConnectivityStatus> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(channel)
            .cloned()
    }

    /// Every channel, sorted by id.
    pub fn snapshot(&self) -> Vec<ConnectivityStatus> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect()
    }
}
