// SPDX-FileCopyrightText: 2026 Doppel Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP gateway over the orchestrator.
//!
//! Webhook-style platform bridges push inbound messages here, operators feed
//! training samples, and the UI layer reads the connectivity indicator and
//! the manual-review list. Everything under `/v1` needs the bearer token.

pub mod auth;
pub mod error;
pub mod handlers;
pub mod server;

pub use auth::AuthConfig;
pub use error::ApiError;
pub use server::{GatewayState, build_router, start_server};
