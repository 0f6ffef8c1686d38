// SPDX-FileCopyrightText: 2026 Doppel Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Reply generation for the Doppel autoresponder.
//!
//! [`ReplyGenerator`] builds a prompt from the inbound message and the
//! channel's style summary and calls a [`TextGenerator`] backend.
//! [`HttpTextGenerator`] is the default backend.
//!
//! [`TextGenerator`]: doppel_core::TextGenerator

pub mod client;
pub mod generator;
pub mod prompt;

pub use client::HttpTextGenerator;
pub use generator::ReplyGenerator;
pub use prompt::build_prompt;
