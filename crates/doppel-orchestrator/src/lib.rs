// SPDX-FileCopyrightText: 2026 Doppel Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Pipeline driver for the Doppel autoresponder.
//!
//! The [`Orchestrator`] is the central coordinator that:
//! - Restores queue state and style history from storage
//! - Runs a probe loop, a receive loop and a worker per channel
//! - Generates replies under the channel's style profile
//! - Pauses delivery while a channel is Offline and replays the backlog on reconnect
//! - Handles graceful shutdown

pub mod metrics;
pub mod orchestrator;
pub mod registry;
pub mod shutdown;
pub mod status;
mod worker;

pub use orchestrator::{Orchestrator, OrchestratorBuilder, ProfileView};
pub use registry::{AdapterFactory, AdapterRegistry};
pub use shutdown::install_signal_handler;
pub use status::ConnectivityBoard;
