// SPDX-FileCopyrightText: 2026 Doppel Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Reply generation with a timeout and a global concurrency cap.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use tokio::sync::Semaphore;
use tracing::{debug, warn};

use doppel_core::{DoppelError, InboundMessage, OutboundReply, TextGenerator};
use doppel_style::StyleSummary;

use crate::prompt::build_prompt;

/// Turns an inbound message plus a style summary into a candidate reply.
///
/// Each call is bounded by `timeout` and does not retry. A semaphore
/// caps simultaneous calls to the backend across every channel.
pub struct ReplyGenerator {
    backend: Arc<dyn TextGenerator>,
    timeout: Duration,
    permits: Arc<Semaphore>,
}

impl ReplyGenerator {
    pub fn new(backend: Arc<dyn TextGenerator>, timeout: Duration, max_concurrency: usize) -> Self {
        Self {
            backend,
            timeout,
            permits: Arc::new(Semaphore::new(max_concurrency.max(1))),
        }
    }

    /// Permits currently free.
    pub fn available_permits(&self) -> usize {
        self.permits.available_permits()
    }

    pub async fn generate(
        &self,
        message: &InboundMessage,
        style: &StyleSummary,
    ) -> Result<OutboundReply, DoppelError> {
        let prompt = build_prompt(message, style);

        let _permit = self
            .permits
            .acquire()
            .await
            .map_err(|_| DoppelError::Internal("generation semaphore closed".into()))?;

        let started = Instant::now();
        let result = tokio::time::timeout(self.timeout, self.backend.generate(&prompt)).await;
        metrics::histogram!("doppel_generation_latency_seconds")
            .record(started.elapsed().as_secs_f64());

        let text = match result {
            Ok(Ok(text)) => text,
            Ok(Err(e)) => {
                warn!(
                    channel = %message.channel,
                    message_id = %message.message_id,
                    error = %e,
                    "generation failed"
                );
                return Err(match e {
                    DoppelError::Generation { .. } => e,
                    other => DoppelError::Generation {
                        message: other.to_string(),
                        source: Some(Box::new(other)),
                    },
                });
            }
            Err(_) => {
                warn!(
                    channel = %message.channel,
                    message_id = %message.message_id,
                    timeout_ms = self.timeout.as_millis() as u64,
                    "generation timed out"
                );
                return Err(DoppelError::Generation {
                    message: format!("generation timed out after {:?}", self.timeout),
                    source: Some(Box::new(DoppelError::Timeout {
                        duration: self.timeout,
                    })),
                });
            }
        };

        let body = text.trim();
        if body.is_empty() {
            return Err(DoppelError::generation("generation returned an empty reply"));
        }

        debug!(
            channel = %message.channel,
            message_id = %message.message_id,
            chars = body.chars().count(),
            "reply generated"
        );
        Ok(OutboundReply {
            channel: message.channel.clone(),
            in_reply_to: message.message_id.clone(),
            recipient: message.sender_id.clone(),
            body: body.to_string(),
            generated_at: Utc::now(),
        })
    }
}
