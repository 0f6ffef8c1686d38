// SPDX-FileCopyrightText: 2026 Doppel Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Style profiles for the Doppel autoresponder.
//!
//! Each channel accumulates training samples; the summary the reply
//! generator conditions on is derived from that history alone and cached
//! until the history grows.

pub mod store;
pub mod summary;

pub use store::StyleProfileStore;
pub use summary::{Formality, StyleSummary, SummaryLimits, summarize};
