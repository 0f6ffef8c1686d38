// SPDX-FileCopyrightText: 2026 Doppel Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Base adapter trait that every pluggable collaborator implements.

use async_trait::async_trait;

use crate::error::DoppelError;
use crate::types::AdapterType;

/// Identity and lifecycle shared by platform, generator and storage adapters.
#[async_trait]
pub trait PluginAdapter: Send + Sync + 'static {
    /// Returns the human-readable name of this adapter instance.
    fn name(&self) -> &str;

    /// Returns the semantic version of this adapter.
    fn version(&self) -> semver::Version;

    /// Returns the type of adapter (platform, generator, storage).
    fn adapter_type(&self) -> AdapterType;

    /// Releases any held resources.
    async fn shutdown(&self) -> Result<(), DoppelError> {
        Ok(())
    }
}
