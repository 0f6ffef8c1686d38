// SPDX-FileCopyrightText: 2026 Doppel Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Prompt assembly from a message and a style summary.

use std::fmt::Write;

use doppel_core::InboundMessage;
use doppel_style::{Formality, StyleSummary};

/// Builds the completion prompt. Deterministic for a given message and summary.
pub fn build_prompt(message: &InboundMessage, style: &StyleSummary) -> String {
    let mut prompt = String::with_capacity(512 + message.body.len());

    let _ = writeln!(
        prompt,
        "You are replying on the user's behalf on the `{}` channel. \
         Write only the reply text, in the user's own voice.",
        message.channel
    );
    prompt.push('\n');
    prompt.push_str(&describe_style(style));
    prompt.push('\n');
    let _ = writeln!(prompt, "Message from {}:", message.sender_id);
    let _ = writeln!(prompt, "\"\"\"\n{}\n\"\"\"", message.body.trim());
    prompt.push_str("\nReply:");
    prompt
}

fn describe_style(style: &StyleSummary) -> String {
    if style.sample_count == 0 {
        return "Style: neutral and polite, moderate length.\n".to_string();
    }

    let mut out = String::from("Style guide:\n");
    let register = match style.formality {
        Formality::Casual => "casual, relaxed",
        Formality::Neutral => "neutral",
        Formality::Formal => "formal, courteous",
    };
    let _ = writeln!(out, "- register: {register}");
    let _ = writeln!(
        out,
        "- typical length: about {} words",
        style.average_words.round() as u64
    );
    if !style.tone_descriptors.is_empty() {
        let _ = writeln!(out, "- tone: {}", style.tone_descriptors.join(", "));
    }
    if !style.vocabulary_hints.is_empty() {
        let _ = writeln!(
            out,
            "- favourite words: {}",
            style.vocabulary_hints.join(", ")
        );
    }
    if !style.common_openers.is_empty() {
        let _ = writeln!(
            out,
            "- usually opens with: {}",
            style.common_openers.join(", ")
        );
    }
    let _ = writeln!(
        out,
        "- emoji: {}",
        if style.uses_emoji { "yes, sparingly" } else { "no" }
    );
    out
}
