// SPDX-FileCopyrightText: 2026 Doppel Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! In-memory store of per-channel style profiles.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use tracing::debug;

use doppel_config::model::StyleConfig;
use doppel_core::{ChannelId, DoppelError, StyleSample};

use crate::summary::{StyleSummary, SummaryLimits, summarize};

/// Append-only sample history of one channel plus its cached summary.
#[derive(Debug, Default)]
struct StyleProfile {
    samples: Vec<StyleSample>,
    cached: Option<StyleSummary>,
}

impl StyleProfile {
    /// Recomputes only when samples were appended since the last read.
    fn summary(&mut self, limits: SummaryLimits) -> StyleSummary {
        match &self.cached {
            Some(cached) if cached.sample_count == self.samples.len() => cached.clone(),
            _ => {
                let fresh = summarize(&self.samples, limits);
                self.cached = Some(fresh.clone());
                fresh
            }
        }
    }
}

/// Owns every channel's style profile.
///
/// The only write path is [`add_sample`](Self::add_sample) (and
/// [`replay`](Self::replay) on startup); profiles are never deleted.
#[derive(Debug)]
pub struct StyleProfileStore {
    max_sample_chars: usize,
    limits: SummaryLimits,
    profiles: Mutex<HashMap<ChannelId, StyleProfile>>,
}

impl StyleProfileStore {
    pub fn new(config: &StyleConfig) -> Self {
        Self {
            max_sample_chars: config.max_sample_chars,
            limits: SummaryLimits {
                tone_descriptors: config.max_tone_descriptors,
                vocabulary_hints: config.max_vocabulary_hints,
            },
            profiles: Mutex::new(HashMap::new()),
        }
    }

    fn profiles(&self) -> MutexGuard<'_, HashMap<ChannelId, StyleProfile>> {
        self.profiles.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Checks a sample without storing it.
    pub fn validate_sample(&self, sample: &StyleSample) -> Result<(), DoppelError> {
        if sample.body.trim().is_empty() {
            return Err(DoppelError::validation("sample body must not be empty"));
        }
        let chars = sample.body.chars().count();
        if chars > self.max_sample_chars {
            return Err(DoppelError::validation(format!(
                "sample body is {chars} characters, limit is {}",
                self.max_sample_chars
            )));
        }
        Ok(())
    }

    /// Appends one training sample to `channel`'s history.
    pub fn add_sample(&self, channel: &ChannelId, sample: StyleSample) -> Result<(), DoppelError> {
        self.validate_sample(&sample)?;
        let mut profiles = self.profiles();
        let profile = profiles.entry(channel.clone()).or_default();
        profile.samples.push(sample);
        debug!(
            channel = %channel,
            samples = profile.samples.len(),
            "style sample added"
        );
        Ok(())
    }

    /// Re-appends a persisted history, in order. Returns how many were applied.
    ///
    /// Stops at the first invalid sample.
    pub fn replay(
        &self,
        channel: &ChannelId,
        samples: impl IntoIterator<Item = StyleSample>,
    ) -> Result<usize, DoppelError> {
        let mut applied = 0;
        for sample in samples {
            self.add_sample(channel, sample)?;
            applied += 1;
        }
        Ok(applied)
    }

    /// The derived summary, or `None` when the channel has no samples.
    pub fn get_profile(&self, channel: &ChannelId) -> Option<StyleSummary> {
        let limits = self.limits;
        self.profiles()
            .get_mut(channel)
            .map(|profile| profile.summary(limits))
    }

    /// The derived summary, falling back to [`StyleSummary::neutral`].
    pub fn summary_or_neutral(&self, channel: &ChannelId) -> StyleSummary {
        self.get_profile(channel)
            .unwrap_or_else(StyleSummary::neutral)
    }

    pub fn has_profile(&self, channel: &ChannelId) -> bool {
        self.profiles().contains_key(channel)
    }

    pub fn sample_count(&self, channel: &ChannelId) -> usize {
        self.profiles()
            .get(channel)
            .map_or(0, |profile| profile.samples.len())
    }

    /// Channels with at least one sample, sorted.
    pub fn channels(&self) -> Vec<ChannelId> {
        let mut channels: Vec<ChannelId> = self.profiles().keys().cloned().collect();
        channels.sort();
        channels
    }
}
