// SPDX-FileCopyrightText: 2026 Doppel Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! State survives a restart through the SQLite journal. Runs on real time:
//! the SQLite writer thread does not cooperate with paused test clocks.

use std::sync::Arc;
use std::time::Duration;

use doppel_config::model::StorageConfig;
use doppel_core::{ChannelId, DoppelError, InboundMessage, ItemStatus, StorageAdapter, StyleSample};
use doppel_storage::SqliteStorage;
use doppel_test_utils::{MockPlatform, PipelineHarness};
use tempfile::tempdir;

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn backlog_and_profile_survive_restart() {
    let dir = tempdir().unwrap();
    let db = dir.path().join("doppel.db");
    let chat = ChannelId::from("chat");

    {
        let offline = Arc::new(MockPlatform::new("chat"));
        offline.set_healthy(false);
        let mut harness = PipelineHarness::builder()
            .channel_with("chat", offline)
            .sqlite(&db)
            .build()
            .await
            .unwrap();
        harness.start();

        for id in ["m1", "m2"] {
            harness
                .orchestrator
                .submit(InboundMessage::new("chat", id, "ann", "are you around?"))
                .await
                .unwrap();
        }
        harness
            .orchestrator
            .add_sample(&chat, StyleSample::new("yep, on it", vec!["brief".into()]))
            .await
            .unwrap();
        harness.shutdown().await.unwrap();
    }

    let mut harness = PipelineHarness::builder()
        .channel("chat")
        .sqlite(&db)
        .build()
        .await
        .unwrap();

    let profile = harness.orchestrator.profile(&chat).unwrap();
    assert!(profile.trained);
    assert_eq!(profile.summary.tone_descriptors, vec!["brief".to_string()]);
    assert_eq!(harness.status_of("chat", "m1"), Some(ItemStatus::Pending));

    harness.start();
    let item = harness
        .wait_for_terminal("chat", "m2", Duration::from_secs(30))
        .await
        .unwrap();
    assert_eq!(item.status, ItemStatus::Delivered);

    let order: Vec<String> = harness
        .platform("chat")
        .unwrap()
        .sent()
        .iter()
        .map(|r| r.in_reply_to.0.clone())
        .collect();
    assert_eq!(order, vec!["m1", "m2"]);

    harness.shutdown().await.unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn dropped_channel_is_not_revived_by_its_journal() {
    let dir = tempdir().unwrap();
    let db = dir.path().join("doppel.db");

    {
        let offline = Arc::new(MockPlatform::new("email"));
        offline.set_healthy(false);
        let harness = PipelineHarness::builder()
            .channel("chat")
            .channel_with("email", offline)
            .sqlite(&db)
            .build()
            .await
            .unwrap();
        harness
            .orchestrator
            .submit(InboundMessage::new("email", "e1", "boss", "report?"))
            .await
            .unwrap();
        harness.shutdown().await.unwrap();
    }

    let harness = PipelineHarness::builder()
        .channel("chat")
        .sqlite(&db)
        .build()
        .await
        .unwrap();
    let email = ChannelId::from("email");

    assert_eq!(harness.orchestrator.channels(), vec![ChannelId::from("chat")]);
    assert!(harness.item("email", "e1").is_none());
    let refused = harness
        .orchestrator
        .submit(InboundMessage::new("email", "e2", "boss", "hello?"))
        .await;
    assert!(matches!(refused, Err(DoppelError::UnknownChannel { .. })));
    assert!(matches!(
        harness.orchestrator.queue_stats(&email),
        Err(DoppelError::UnknownChannel { .. })
    ));
    harness.shutdown().await.unwrap();

    let storage = SqliteStorage::new(StorageConfig {
        database_path: db.to_string_lossy().into_owned(),
        ..StorageConfig::default()
    });
    storage.initialize().await.unwrap();
    let kept = storage.load_items().await.unwrap();
    assert_eq!(kept.len(), 1);
    assert_eq!(kept[0].message_id().0, "e1");
    storage.close().await.unwrap();
}
