// SPDX-FileCopyrightText: 2026 Doppel Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Platform adapter registry keyed by platform kind.

use std::collections::HashMap;
use std::sync::Arc;

use doppel_config::ChannelConfig;
use doppel_core::{DoppelError, PlatformAdapter, PlatformKind};

/// Builds the adapter for one configured channel.
pub type AdapterFactory =
    Arc<dyn Fn(&ChannelConfig) -> Result<Arc<dyn PlatformAdapter>, DoppelError> + Send + Sync>;

/// Maps platform kinds ("whatsapp", "email", ...) to adapter factories.
///
/// A fallback factory, when set, serves every kind without its own entry.
#[derive(Default, Clone)]
pub struct AdapterRegistry {
    factories: HashMap<PlatformKind, AdapterFactory>,
    fallback: Option<AdapterFactory>,
}

impl AdapterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<F>(&mut self, kind: impl Into<String>, factory: F) -> &mut Self
    where
        F: Fn(&ChannelConfig) -> Result<Arc<dyn PlatformAdapter>, DoppelError>
            + Send
            + Sync
            + 'static,
    {
        self.factories
            .insert(PlatformKind(kind.into()), Arc::new(factory));
        self
    }

    pub fn set_fallback<F>(&mut self, factory: F) -> &mut Self
    where
        F: Fn(&ChannelConfig) -> Result<Arc<dyn PlatformAdapter>, DoppelError>
            + Send
            + Sync
            + 'static,
    {
        self.fallback = Some(Arc::new(factory));
        self
    }

    /// Registered kinds, sorted.
    pub fn kinds(&self) -> Vec<PlatformKind> {
        let mut kinds: Vec<PlatformKind> = self.factories.keys().cloned().collect();
        kinds.sort();
        kinds
    }

    pub fn supports(&self, kind: &PlatformKind) -> bool {
        self.fallback.is_some() || self.factories.contains_key(kind)
    }

    /// Builds the adapter for `channel` from its resolved kind.
    pub fn build(&self, channel: &ChannelConfig) -> Result<Arc<dyn PlatformAdapter>, DoppelError> {
        let kind = PlatformKind::from(channel.resolved_kind());
        let factory = self
            .factories
            .get(&kind)
            .or(self.fallback.as_ref())
            .ok_or_else(|| {
                DoppelError::Config(format!(
                    "no adapter registered for platform kind `{kind}` (channel `{}`)",
                    channel.id
                ))
            })?;
        factory(channel)
    }
}

impl std::fmt::Debug for AdapterRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdapterRegistry")
            .field("kinds", &self.kinds())
            .field("fallback", &self.fallback.is_some())
            .finish()
    }
}
