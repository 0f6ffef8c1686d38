// SPDX-FileCopyrightText: 2026 Doppel Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Same ordered history, same summary: across reads and across fresh stores.

use doppel_config::model::StyleConfig;
use doppel_core::{ChannelId, StyleSample};
use doppel_style::StyleProfileStore;
use proptest::prelude::*;

fn sample_strategy() -> impl Strategy<Value = (String, Vec<String>)> {
    (
        "[a-zA-Z!',. ]{1,80}".prop_filter("non-blank", |s| !s.trim().is_empty()),
        prop::collection::vec("[a-z]{3,8}", 0..4),
    )
}

fn build(history: &[(String, Vec<String>)]) -> StyleProfileStore {
    let store = StyleProfileStore::new(&StyleConfig::default());
    let channel = ChannelId::from("chat");
    for (body, tags) in history {
        store
            .add_sample(&channel, StyleSample::new(body.clone(), tags.clone()))
            .unwrap();
    }
    store
}

proptest! {
    #[test]
    fn identical_history_gives_identical_summary(
        history in prop::collection::vec(sample_strategy(), 1..20),
    ) {
        let channel = ChannelId::from("chat");
        let first = build(&history);
        let second = build(&history);

        let a = first.get_profile(&channel).unwrap();
        let again = first.get_profile(&channel).unwrap();
        let b = second.get_profile(&channel).unwrap();

        prop_assert_eq!(&a, &again);
        prop_assert_eq!(
            serde_json::to_string(&a).unwrap(),
            serde_json::to_string(&b).unwrap()
        );
        prop_assert_eq!(a.sample_count, history.len());
        prop_assert!(a.tone_descriptors.len() <= 5);
        prop_assert!(a.vocabulary_hints.len() <= 12);
    }
}
