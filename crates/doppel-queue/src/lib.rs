// SPDX-FileCopyrightText: 2026 Doppel Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Per-channel message queue for the Doppel autoresponder.
//!
//! Lanes are FIFO by arrival. Failed deliveries and failed generations go
//! to the tail so one poison message cannot block its channel; items claimed
//! but never attempted go back to the head. Capacity bounds the live
//! (pending + in-flight) items of each lane.

mod lane;
pub mod queue;

pub use queue::{MessageQueue, QueueStats};

#[cfg(test)]
mod tests {
    use doppel_config::model::QueueConfig;
    use doppel_core::{
        ChannelId, DoppelError, FailureReason, InboundMessage, ItemStatus, MessageId,
        OutboundReply,
    };

    use super::*;

    fn queue(capacity: usize) -> MessageQueue {
        let queue = MessageQueue::new(&QueueConfig {
            capacity,
            max_delivery_attempts: 5,
            ..QueueConfig::default()
        });
        queue.register_channel(&ChannelId::from("chat"));
        queue.resume(&ChannelId::from("chat")).unwrap();
        queue
    }

    fn msg(id: &str) -> InboundMessage {
        InboundMessage::new("chat", id, "bob", format!("body of {id}"))
    }

    fn chat() -> ChannelId {
        ChannelId::from("chat")
    }

    #[tokio::test]
    async fn claims_in_arrival_order() {
        let q = queue(10);
        q.enqueue(msg("m1")).await.unwrap();
        q.enqueue(msg("m2")).await.unwrap();

        let first = q.claim(&chat()).await.unwrap().unwrap();
        assert_eq!(first.message_id(), &MessageId::from("m1"));
        assert_eq!(first.status, ItemStatus::InFlight);
        q.complete(&first, 1).await.unwrap();

        let second = q.claim(&chat()).await.unwrap().unwrap();
        assert_eq!(second.message_id(), &MessageId::from("m2"));
    }

    #[tokio::test]
    async fn duplicate_is_refused_in_every_status() {
        let q = queue(10);
        q.enqueue(msg("m1")).await.unwrap();
        let err = q.enqueue(msg("m1")).await.unwrap_err();
        assert!(matches!(err, DoppelError::Duplicate { .. }));

        let item = q.claim(&chat()).await.unwrap().unwrap();
        q.complete(&item, 1).await.unwrap();
        let err = q.enqueue(msg("m1")).await.unwrap_err();
        assert!(matches!(err, DoppelError::Duplicate { .. }));
        assert_eq!(q.stats(&chat()).unwrap().delivered, 1);
    }

    #[tokio::test]
    async fn empty_ids_are_validation_errors() {
        let q = queue(10);
        let err = q.enqueue(msg("  ")).await.unwrap_err();
        assert!(matches!(err, DoppelError::Validation { .. }));
    }

    #[tokio::test]
    async fn unknown_channel_is_refused() {
        let q = queue(10);
        let err = q
            .enqueue(InboundMessage::new("sms", "m1", "bob", "hi"))
            .await
            .unwrap_err();
        assert!(matches!(err, DoppelError::UnknownChannel { .. }));
    }

    #[tokio::test]
    async fn capacity_counts_in_flight_items() {
        let q = queue(2);
        q.enqueue(msg("m1")).await.unwrap();
        q.enqueue(msg("m2")).await.unwrap();
        let err = q.enqueue(msg("m3")).await.unwrap_err();
        assert!(matches!(err, DoppelError::CapacityExceeded { capacity: 2, .. }));

        let claimed = q.claim(&chat()).await.unwrap().unwrap();
        assert!(q.enqueue(msg("m3")).await.is_err());

        q.complete(&claimed, 1).await.unwrap();
        q.enqueue(msg("m3")).await.unwrap();
        assert_eq!(q.len(&chat()), 2);
    }

    #[tokio::test]
    async fn paused_lane_claims_nothing() {
        let q = queue(10);
        q.pause(&chat()).unwrap();
        q.enqueue(msg("m1")).await.unwrap();
        assert!(q.claim(&chat()).await.unwrap().is_none());

        q.resume(&chat()).unwrap();
        let item = q.claim(&chat()).await.unwrap().unwrap();
        assert_eq!(item.message_id(), &MessageId::from("m1"));
    }

    #[tokio::test]
    async fn lanes_start_paused() {
        let q = MessageQueue::new(&QueueConfig::default());
        q.register_channel(&chat());
        assert!(q.is_paused(&chat()).unwrap());
    }

    #[tokio::test]
    async fn failed_delivery_goes_to_tail() {
        let q = queue(10);
        q.enqueue(msg("m1")).await.unwrap();
        q.enqueue(msg("m2")).await.unwrap();

        let first = q.claim(&chat()).await.unwrap().unwrap();
        let failed = q.fail(&first, 2, "connection reset").await.unwrap();
        assert_eq!(failed.status, ItemStatus::Pending);
        assert_eq!(failed.attempt_count, 2);

        let next = q.claim(&chat()).await.unwrap().unwrap();
        assert_eq!(next.message_id(), &MessageId::from("m2"));
    }

    #[tokio::test]
    async fn exhausted_delivery_is_terminal() {
        let q = queue(10);
        q.enqueue(msg("m1")).await.unwrap();
        let item = q.claim(&chat()).await.unwrap().unwrap();
        let failed = q.fail(&item, 5, "timeout").await.unwrap();

        assert_eq!(failed.status, ItemStatus::Failed);
        assert_eq!(failed.failure_reason, Some(FailureReason::DeliveryExhausted));
        assert!(q.claim(&chat()).await.unwrap().is_none());
        assert_eq!(q.failed_items().len(), 1);
        assert_eq!(q.len(&chat()), 0);
    }

    #[tokio::test]
    async fn release_returns_to_head() {
        let q = queue(10);
        q.enqueue(msg("m1")).await.unwrap();
        q.enqueue(msg("m2")).await.unwrap();

        let first = q.claim(&chat()).await.unwrap().unwrap();
        let released = q.release(&first).await.unwrap();
        assert_eq!(released.attempt_count, 0);

        let again = q.claim(&chat()).await.unwrap().unwrap();
        assert_eq!(again.message_id(), &MessageId::from("m1"));
    }

    #[tokio::test]
    async fn attached_reply_survives_requeue() {
        let q = queue(10);
        q.enqueue(msg("m1")).await.unwrap();
        let item = q.claim(&chat()).await.unwrap().unwrap();
        let reply = OutboundReply {
            channel: chat(),
            in_reply_to: MessageId::from("m1"),
            recipient: "bob".into(),
            body: "on it".into(),
            generated_at: chrono::Utc::now(),
        };
        let item = q.attach_reply(&item, reply.clone()).await.unwrap();
        assert_eq!(item.status, ItemStatus::InFlight);
        q.fail(&item, 1, "reset").await.unwrap();

        let again = q.claim(&chat()).await.unwrap().unwrap();
        assert_eq!(again.reply, Some(reply));
    }

    #[tokio::test]
    async fn settling_an_unclaimed_item_is_an_error() {
        let q = queue(10);
        let item = q.enqueue(msg("m1")).await.unwrap();
        assert!(matches!(
            q.complete(&item, 1).await,
            Err(DoppelError::Internal(_))
        ));
    }

    #[tokio::test]
    async fn restore_reverts_in_flight_items() {
        let q = queue(10);
        q.enqueue(msg("m1")).await.unwrap();
        q.enqueue(msg("m2")).await.unwrap();
        let claimed = q.claim(&chat()).await.unwrap().unwrap();
        let mut snapshot = vec![claimed, q.get(&chat(), &MessageId::from("m2")).unwrap()];
        snapshot.reverse();

        let fresh = MessageQueue::new(&QueueConfig::default());
        fresh.register_channel(&chat());
        assert_eq!(fresh.restore(snapshot).await, 2);
        fresh.resume(&chat()).unwrap();

        let first = fresh.claim(&chat()).await.unwrap().unwrap();
        assert_eq!(first.message_id(), &MessageId::from("m1"));
        let third = fresh.enqueue(msg("m3")).await.unwrap();
        assert_eq!(third.sequence, 3);
    }

    #[tokio::test]
    async fn restore_skips_channels_that_are_not_registered() {
        let q = queue(10);
        q.enqueue(msg("m1")).await.unwrap();
        let mut stray = q.get(&chat(), &MessageId::from("m1")).unwrap();
        stray.message.channel = ChannelId::from("email");

        let fresh = MessageQueue::new(&QueueConfig::default());
        fresh.register_channel(&chat());
        assert_eq!(fresh.restore(vec![stray]).await, 0);
        assert_eq!(fresh.channels(), vec![chat()]);
        assert!(matches!(
            fresh.enqueue(InboundMessage::new("email", "m2", "bob", "hi")).await,
            Err(DoppelError::UnknownChannel { .. })
        ));
    }

    #[tokio::test]
    async fn delivered_items_beyond_the_window_are_evicted() {
        let q = MessageQueue::new(&QueueConfig {
            retained_delivered: 1,
            ..QueueConfig::default()
        });
        q.register_channel(&chat());
        q.resume(&chat()).unwrap();

        for id in ["m1", "m2"] {
            q.enqueue(msg(id)).await.unwrap();
            let item = q.claim(&chat()).await.unwrap().unwrap();
            q.complete(&item, 1).await.unwrap();
        }

        assert!(q.get(&chat(), &MessageId::from("m1")).is_none());
        assert!(q.get(&chat(), &MessageId::from("m2")).is_some());
        assert_eq!(q.stats(&chat()).unwrap().delivered, 2);
        let err = q.enqueue(msg("m2")).await.unwrap_err();
        assert!(matches!(err, DoppelError::Duplicate { .. }));
    }

    #[tokio::test]
    async fn notifier_is_signalled_on_enqueue() {
        let q = queue(10);
        let notify = q.notifier(&chat()).unwrap();
        q.enqueue(msg("m1")).await.unwrap();
        tokio::time::timeout(std::time::Duration::from_secs(1), notify.notified())
            .await
            .expect("enqueue should wake the worker");
    }
}
