// SPDX-FileCopyrightText: 2026 Doppel Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Pure derivation of a [`StyleSummary`] from an ordered sample history.
//!
//! Every ranking breaks ties lexicographically, so the same history always
//! yields the same summary regardless of hash ordering or process.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use strum::Display;

use doppel_core::StyleSample;

/// Words too common to say anything about a writer's vocabulary.
const STOP_WORDS: &[&str] = &[
    "about", "all", "and", "are", "but", "can", "for", "from", "had", "has", "have", "her",
    "his", "how", "its", "just", "not", "now", "our", "out", "she", "that", "the", "their",
    "them", "then", "there", "they", "this", "was", "were", "what", "when", "which", "who",
    "will", "with", "would", "you", "your",
];

const CASUAL_MARKERS: &[&str] = &[
    "lol", "hey", "haha", "yeah", "gonna", "wanna", "btw", "omg", "cool", "yep",
];

const FORMAL_MARKERS: &[&str] = &[
    "regards", "dear", "sincerely", "please", "kindly", "furthermore", "therefore",
];

const OPENER_LIMIT: usize = 3;

/// Coarse register of a writer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Serialize, Deserialize)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Formality {
    Casual,
    Neutral,
    Formal,
}

/// The derived, read-only view of a channel's style.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StyleSummary {
    /// Number of samples the summary was computed from.
    pub sample_count: usize,
    pub tone_descriptors: Vec<String>,
    pub formality: Formality,
    pub vocabulary_hints: Vec<String>,
    pub average_words: f64,
    pub uses_emoji: bool,
    pub common_openers: Vec<String>,
}

impl StyleSummary {
    /// Default style used when a channel has no training samples yet.
    pub fn neutral() -> Self {
        Self {
            sample_count: 0,
            tone_descriptors: Vec::new(),
            formality: Formality::Neutral,
            vocabulary_hints: Vec::new(),
            average_words: 0.0,
            uses_emoji: false,
            common_openers: Vec::new(),
        }
    }
}

/// Output sizes for the ranked lists.
#[derive(Debug, Clone, Copy)]
pub struct SummaryLimits {
    pub tone_descriptors: usize,
    pub vocabulary_hints: usize,
}

impl Default for SummaryLimits {
    fn default() -> Self {
        Self {
            tone_descriptors: 5,
            vocabulary_hints: 12,
        }
    }
}

/// Derives the summary of `samples`. An empty history yields [`StyleSummary::neutral`].
pub fn summarize(samples: &[StyleSample], limits: SummaryLimits) -> StyleSummary {
    if samples.is_empty() {
        return StyleSummary::neutral();
    }

    let mut tones = BTreeMap::<String, usize>::new();
    let mut vocabulary = BTreeMap::<String, usize>::new();
    let mut openers = BTreeMap::<String, usize>::new();
    let mut total_words = 0usize;
    let mut emoji_samples = 0usize;
    let mut formality_score = 0i64;

    for sample in samples {
        for tag in &sample.tone_tags {
            let tag = tag.trim().to_lowercase();
            if !tag.is_empty() {
                *tones.entry(tag).or_default() += 1;
            }
        }

        let words: Vec<&str> = sample.body.split_whitespace().collect();
        total_words += words.len();

        if let Some(opener) = words.first().map(|w| normalize_word(w))
            && !opener.is_empty()
        {
            *openers.entry(opener).or_default() += 1;
        }

        for token in sample
            .body
            .split(|c: char| !c.is_alphabetic())
            .filter(|t| t.chars().count() >= 3)
        {
            let token = token.to_lowercase();
            if !STOP_WORDS.contains(&token.as_str()) {
                *vocabulary.entry(token).or_default() += 1;
            }
        }

        if sample.body.chars().any(is_emoji) {
            emoji_samples += 1;
        }

        formality_score += formality_signal(&sample.body, &words);
    }

    let count = samples.len();
    StyleSummary {
        sample_count: count,
        tone_descriptors: top_ranked(tones, limits.tone_descriptors),
        formality: classify(formality_score, count),
        vocabulary_hints: top_ranked(vocabulary, limits.vocabulary_hints),
        average_words: total_words as f64 / count as f64,
        uses_emoji: emoji_samples * 2 >= count,
        common_openers: top_ranked(openers, OPENER_LIMIT),
    }
}

/// Highest counts first, ties in lexicographic order.
fn top_ranked(counts: BTreeMap<String, usize>, limit: usize) -> Vec<String> {
    let mut ranked: Vec<(String, usize)> = counts.into_iter().collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    ranked.into_iter().take(limit).map(|(word, _)| word).collect()
}

/// Lower-cases and strips surrounding punctuation, keeping inner apostrophes.
fn normalize_word(word: &str) -> String {
    word.trim_matches(|c: char| !c.is_alphanumeric())
        .to_lowercase()
}

/// Positive leans formal, negative leans casual.
fn formality_signal(body: &str, words: &[&str]) -> i64 {
    let mut score = 0i64;

    for word in words {
        let normalized = normalize_word(word);
        if normalized.contains('\'') || normalized.contains('\u{2019}') {
            score -= 1;
        }
        if CASUAL_MARKERS.contains(&normalized.as_str()) {
            score -= 1;
        }
        if FORMAL_MARKERS.contains(&normalized.as_str()) {
            score += 1;
        }
    }

    score -= body.matches('!').count() as i64;

    let sentences = body
        .split(['.', '!', '?'])
        .filter(|s| !s.trim().is_empty())
        .count()
        .max(1);
    let words_per_sentence = words.len() / sentences;
    if words_per_sentence >= 20 {
        score += 2;
    } else if words_per_sentence > 0 && words_per_sentence < 6 {
        score -= 1;
    }

    score
}

fn classify(score: i64, samples: usize) -> Formality {
    let threshold = (samples as i64 + 1) / 2;
    if score >= threshold && score > 0 {
        Formality::Formal
    } else if -score >= threshold && score < 0 {
        Formality::Casual
    } else {
        Formality::Neutral
    }
}

fn is_emoji(c: char) -> bool {
    matches!(
        c as u32,
        0x1F300..=0x1FAFF | 0x2600..=0x27BF | 0x1F000..=0x1F2FF
    )
}
