// SPDX-FileCopyrightText: 2026 Doppel Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Webhook platform adapter.
//!
//! Speaks to any platform bridge that exposes a health URL and accepts
//! replies as JSON POSTs. Inbound traffic for these channels arrives
//! through the gateway, so [`WebhookAdapter`] is push-only.

pub mod adapter;

pub use adapter::{WebhookAdapter, webhook_factory};
