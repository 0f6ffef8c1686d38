// SPDX-FileCopyrightText: 2026 Doppel Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Channel connections for the Doppel autoresponder.
//!
//! A [`ChannelConnection`] owns the connectivity state of one platform,
//! probes it on an interval, and delivers replies with capped exponential
//! backoff. Transitions are published on an unbounded event stream.

pub mod backoff;
pub mod connection;
pub mod probe;
pub mod state;

pub use backoff::Backoff;
pub use connection::{ChannelConnection, ConnectionSettings, DeliveryOutcome};
pub use probe::HttpHealthProbe;
pub use state::{ConnectionMachine, Transition};
