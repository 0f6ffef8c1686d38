// SPDX-FileCopyrightText: 2026 Doppel Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Text-generation service trait. The service is a black box: prompt in, text out.

use async_trait::async_trait;

use crate::error::DoppelError;
use crate::traits::adapter::PluginAdapter;

#[async_trait]
pub trait TextGenerator: PluginAdapter {
    /// Completes `prompt`. Timeouts are enforced by the caller.
    async fn generate(&self, prompt: &str) -> Result<String, DoppelError>;
}
