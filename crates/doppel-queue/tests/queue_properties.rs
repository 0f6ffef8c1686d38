// SPDX-FileCopyrightText: 2026 Doppel Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Ordering, capacity and exclusivity properties of the message queue.

use std::collections::HashSet;
use std::sync::Arc;

use doppel_config::model::QueueConfig;
use doppel_core::{ChannelId, InboundMessage};
use doppel_queue::MessageQueue;
use proptest::prelude::*;

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .build()
        .unwrap()
}

fn open_queue(capacity: usize) -> MessageQueue {
    let queue = MessageQueue::new(&QueueConfig {
        capacity,
        max_delivery_attempts: 5,
        ..QueueConfig::default()
    });
    let channel = ChannelId::from("chat");
    queue.register_channel(&channel);
    queue.resume(&channel).unwrap();
    queue
}

#[derive(Debug, Clone)]
enum Op {
    Enqueue(u8),
    ClaimAndComplete,
    ClaimAndFail,
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        3 => any::<u8>().prop_map(Op::Enqueue),
        1 => Just(Op::ClaimAndComplete),
        1 => Just(Op::ClaimAndFail),
    ]
}

proptest! {
    #[test]
    fn live_items_never_exceed_capacity(
        capacity in 1..8usize,
        ops in prop::collection::vec(op_strategy(), 1..60),
    ) {
        let rt = runtime();
        let queue = open_queue(capacity);
        let channel = ChannelId::from("chat");

        rt.block_on(async {
            for op in ops {
                match op {
                    Op::Enqueue(id) => {
                        let _ = queue
                            .enqueue(InboundMessage::new("chat", format!("m{id}"), "bob", "hi"))
                            .await;
                    }
                    Op::ClaimAndComplete => {
                        if let Some(item) = queue.claim(&channel).await.unwrap() {
                            queue.complete(&item, 1).await.unwrap();
                        }
                    }
                    Op::ClaimAndFail => {
                        if let Some(item) = queue.claim(&channel).await.unwrap() {
                            queue.fail(&item, 1, "reset").await.unwrap();
                        }
                    }
                }
                assert!(queue.len(&channel) <= capacity);
            }
        });
    }

    #[test]
    fn claims_follow_arrival_order(count in 1..30usize) {
        let rt = runtime();
        let queue = open_queue(64);
        let channel = ChannelId::from("chat");

        let claimed = rt.block_on(async {
            for i in 0..count {
                queue
                    .enqueue(InboundMessage::new("chat", format!("m{i}"), "bob", "hi"))
                    .await
                    .unwrap();
            }
            let mut order = Vec::new();
            while let Some(item) = queue.claim(&channel).await.unwrap() {
                order.push(item.sequence);
                queue.complete(&item, 1).await.unwrap();
            }
            order
        });

        let expected: Vec<u64> = (1..=count as u64).collect();
        prop_assert_eq!(claimed, expected);
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_claims_never_share_an_item() {
    let queue = Arc::new(open_queue(500));
    let channel = ChannelId::from("chat");
    for i in 0..200 {
        queue
            .enqueue(InboundMessage::new("chat", format!("m{i}"), "bob", "hi"))
            .await
            .unwrap();
    }

    let mut tasks = Vec::new();
    for _ in 0..8 {
        let queue = Arc::clone(&queue);
        let channel = channel.clone();
        tasks.push(tokio::spawn(async move {
            let mut mine = Vec::new();
            while let Some(item) = queue.claim(&channel).await.unwrap() {
                mine.push(item.message_id().clone());
            }
            mine
        }));
    }

    let mut seen = HashSet::new();
    for task in tasks {
        for id in task.await.unwrap() {
            assert!(seen.insert(id), "item claimed twice");
        }
    }
    assert_eq!(seen.len(), 200);
    assert_eq!(queue.stats(&channel).unwrap().in_flight, 200);
}
