// SPDX-FileCopyrightText: 2026 Doppel Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Per-channel worker: claim, generate, deliver, settle.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use doppel_connection::{ChannelConnection, DeliveryOutcome};
use doppel_core::{
    ChannelId, ConnectionState, ConnectivityEvent, DoppelError, FailureReason, ItemStatus,
    OutboundReply, QueuedItem,
};
use doppel_generator::ReplyGenerator;
use doppel_queue::MessageQueue;
use doppel_style::StyleProfileStore;

use crate::status::ConnectivityBoard;

/// Everything one channel's worker needs. Cheap to clone.
#[derive(Clone)]
pub(crate) struct ChannelWorker {
    pub channel: ChannelId,
    pub queue: Arc<MessageQueue>,
    pub connection: Arc<ChannelConnection>,
    pub generator: Arc<ReplyGenerator>,
    pub styles: Arc<StyleProfileStore>,
    pub board: Arc<ConnectivityBoard>,
    pub generation_budget: u32,
}

/// What happened to one claimed item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Settled {
    Delivered,
    /// Back at the tail after a retryable delivery failure, with the
    /// item's total attempts so far.
    Requeued { attempts: u32 },
    /// Back at the tail after a failed generation.
    Regenerate,
    Released,
    Failed,
}

impl ChannelWorker {
    /// Applies connectivity events: updates the board, pauses the lane on
    /// Offline and resumes it on any other state.
    pub async fn watch_connectivity(
        self,
        mut events: mpsc::UnboundedReceiver<ConnectivityEvent>,
        cancel: CancellationToken,
    ) {
        loop {
            let event = tokio::select! {
                _ = cancel.cancelled() => break,
                event = events.recv() => match event {
                    Some(event) => event,
                    None => break,
                },
            };
            self.board.apply(&event);
            let result = if event.to == ConnectionState::Offline {
                self.queue.pause(&self.channel)
            } else {
                self.queue.resume(&self.channel)
            };
            match result {
                Ok(()) if event.to == ConnectionState::Offline => {
                    info!(channel = %self.channel, "delivery paused");
                }
                Ok(()) if event.from == ConnectionState::Offline => {
                    info!(
                        channel = %self.channel,
                        backlog = self.queue.len(&self.channel),
                        epoch = event.epoch,
                        "delivery resumed"
                    );
                }
                Ok(()) => {}
                Err(e) => error!(channel = %self.channel, error = %e, "failed to update lane"),
            }
        }
        debug!(channel = %self.channel, "connectivity watcher stopped");
    }

    /// Claims and processes items one at a time until `cancel` fires.
    pub async fn run(self, cancel: CancellationToken) {
        let notify = match self.queue.notifier(&self.channel) {
            Ok(notify) => notify,
            Err(e) => {
                error!(channel = %self.channel, error = %e, "worker has no lane");
                return;
            }
        };

        info!(channel = %self.channel, "worker started");
        while !cancel.is_cancelled() {
            let claimed = match self.queue.claim(&self.channel).await {
                Ok(claimed) => claimed,
                Err(e) => {
                    error!(channel = %self.channel, error = %e, "claim failed");
                    None
                }
            };

            let Some(item) = claimed else {
                crate::metrics::set_pending(self.channel.as_str(), self.queue.len(&self.channel));
                tokio::select! {
                    _ = cancel.cancelled() => {}
                    _ = notify.notified() => {}
                }
                continue;
            };

            match self.process(item, &cancel).await {
                Ok(Settled::Requeued { attempts }) => {
                    self.pause_before_retry(attempts, &cancel).await
                }
                Ok(Settled::Released) => self.hold_until_reachable(),
                Ok(_) => {}
                Err(e) => error!(channel = %self.channel, error = %e, "failed to settle item"),
            }
        }
        info!(channel = %self.channel, "worker stopped");
    }

    /// Backs off before the next claim so a lane holding only a requeued
    /// item does not spin. The delay continues the item's own backoff
    /// sequence, as if the retry had happened inside one `send`.
    async fn pause_before_retry(&self, attempts: u32, cancel: &CancellationToken) {
        let delay = self
            .connection
            .settings()
            .backoff
            .delay(attempts.saturating_sub(1));
        tokio::select! {
            _ = cancel.cancelled() => {}
            _ = tokio::time::sleep(delay) => {}
        }
    }

    /// Pauses the lane after an unattempted send unless the channel is
    /// already reachable again. The connectivity watcher resumes it on the
    /// next transition out of Offline.
    fn hold_until_reachable(&self) {
        if let Err(e) = self.queue.pause(&self.channel) {
            error!(channel = %self.channel, error = %e, "failed to pause lane");
            return;
        }
        if self.connection.state().accepts_sends()
            && let Err(e) = self.queue.resume(&self.channel)
        {
            error!(channel = %self.channel, error = %e, "failed to resume lane");
        }
    }

    /// Drives one claimed item to its next resting state.
    pub async fn process(
        &self,
        item: QueuedItem,
        cancel: &CancellationToken,
    ) -> Result<Settled, DoppelError> {
        let (item, reply) = match item.reply.clone() {
            Some(reply) => (item, reply),
            None => match self.generate(&item, cancel).await {
                Generated::Reply(reply) => {
                    let item = self.queue.attach_reply(&item, reply.clone()).await?;
                    (item, reply)
                }
                Generated::Failed(e) => return self.on_generation_failure(&item, &e).await,
                Generated::Cancelled => {
                    self.queue.release(&item).await?;
                    return Ok(Settled::Released);
                }
            },
        };

        if cancel.is_cancelled() {
            self.queue.release(&item).await?;
            return Ok(Settled::Released);
        }

        let outcome = self
            .connection
            .send(&reply, item.attempt_count, cancel)
            .await;
        self.on_delivery(&item, outcome).await
    }

    async fn generate(&self, item: &QueuedItem, cancel: &CancellationToken) -> Generated {
        let style = self.styles.summary_or_neutral(&self.channel);
        tokio::select! {
            _ = cancel.cancelled() => Generated::Cancelled,
            result = self.generator.generate(&item.message, &style) => match result {
                Ok(reply) => Generated::Reply(reply),
                Err(e) => Generated::Failed(e),
            },
        }
    }

    async fn on_generation_failure(
        &self,
        item: &QueuedItem,
        error: &DoppelError,
    ) -> Result<Settled, DoppelError> {
        crate::metrics::record_generation_failure(self.channel.as_str());
        let failures = item.generation_failures + 1;
        if failures >= self.generation_budget {
            self.queue
                .mark_failed(item, FailureReason::GenerationExhausted, &error.to_string())
                .await?;
            return Ok(Settled::Failed);
        }

        warn!(
            channel = %self.channel,
            message_id = %item.message_id(),
            failures,
            budget = self.generation_budget,
            error = %error,
            "generation failed, requeueing"
        );
        self.queue
            .requeue_generation(item, &error.to_string())
            .await?;
        Ok(Settled::Regenerate)
    }

    async fn on_delivery(
        &self,
        item: &QueuedItem,
        outcome: DeliveryOutcome,
    ) -> Result<Settled, DoppelError> {
        match outcome {
            DeliveryOutcome::Delivered { receipt, attempts } => {
                let done = self.queue.complete(item, attempts).await?;
                info!(
                    channel = %self.channel,
                    message_id = %done.message_id(),
                    attempts = done.attempt_count,
                    platform_message_id = receipt.platform_message_id.as_deref().unwrap_or(""),
                    "reply delivered"
                );
                Ok(Settled::Delivered)
            }
            DeliveryOutcome::Failed {
                attempts,
                error,
                retryable: true,
            } => {
                let settled = self.queue.fail(item, attempts, &error.to_string()).await?;
                if settled.status == ItemStatus::Failed {
                    Ok(Settled::Failed)
                } else {
                    debug!(
                        channel = %self.channel,
                        message_id = %settled.message_id(),
                        attempts = settled.attempt_count,
                        "delivery failed, requeued at tail"
                    );
                    Ok(Settled::Requeued {
                        attempts: settled.attempt_count,
                    })
                }
            }
            DeliveryOutcome::Failed { error, .. } => {
                self.queue
                    .mark_failed(item, FailureReason::DeliveryRejected, &error.to_string())
                    .await?;
                Ok(Settled::Failed)
            }
            DeliveryOutcome::NotAttempted => {
                debug!(
                    channel = %self.channel,
                    message_id = %item.message_id(),
                    "channel offline, item released"
                );
                self.queue.release(item).await?;
                Ok(Settled::Released)
            }
        }
    }
}

enum Generated {
    Reply(OutboundReply),
    Failed(DoppelError),
    Cancelled,
}
