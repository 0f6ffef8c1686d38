// SPDX-FileCopyrightText: 2026 Doppel Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP request handlers for the gateway REST API.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use doppel_core::{
    ChannelId, ConnectivityStatus, FailureReason, InboundMessage, ItemStatus, MessageId,
    QueuedItem, StyleSample,
};
use doppel_orchestrator::ProfileView;
use doppel_queue::QueueStats;

use crate::error::ApiError;
use crate::server::GatewayState;

/// Request body for `POST /v1/channels/{channel}/messages`.
#[derive(Debug, Deserialize)]
pub struct PushMessageRequest {
    /// Platform message id. Generated when absent, which forgoes idempotency.
    #[serde(default)]
    pub message_id: Option<String>,
    pub sender_id: String,
    pub body: String,
    #[serde(default)]
    pub received_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize)]
pub struct PushMessageResponse {
    pub channel: ChannelId,
    pub message_id: MessageId,
    pub sequence: u64,
    pub status: ItemStatus,
}

/// Request body for `POST /v1/channels/{channel}/samples`.
#[derive(Debug, Deserialize)]
pub struct SampleRequest {
    pub body: String,
    #[serde(default)]
    pub tone_tags: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct SampleResponse {
    pub channel: ChannelId,
    pub sample_count: usize,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub uptime_secs: u64,
}

/// One channel's connectivity indicator plus its queue counts.
#[derive(Debug, Serialize)]
pub struct ChannelStatusView {
    #[serde(flatten)]
    pub connectivity: ConnectivityStatus,
    pub queue: QueueStats,
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub channels: Vec<ChannelStatusView>,
}

/// A terminally failed item awaiting manual review.
#[derive(Debug, Serialize)]
pub struct ReviewEntry {
    pub channel: ChannelId,
    pub message_id: MessageId,
    pub sender_id: String,
    pub body: String,
    pub received_at: DateTime<Utc>,
    pub failure_reason: Option<FailureReason>,
    pub last_error: Option<String>,
    pub attempt_count: u32,
    pub generation_failures: u32,
    /// The generated reply, when generation got that far.
    pub reply: Option<String>,
    pub failed_at: DateTime<Utc>,
}

impl From<QueuedItem> for ReviewEntry {
    fn from(item: QueuedItem) -> Self {
        Self {
            channel: item.message.channel,
            message_id: item.message.message_id,
            sender_id: item.message.sender_id,
            body: item.message.body,
            received_at: item.message.received_at,
            failure_reason: item.failure_reason,
            last_error: item.last_error,
            attempt_count: item.attempt_count,
            generation_failures: item.generation_failures,
            reply: item.reply.map(|reply| reply.body),
            failed_at: item.updated_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ReviewResponse {
    pub items: Vec<ReviewEntry>,
}

/// GET /health
pub async fn get_public_health(State(state): State<GatewayState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        uptime_secs: state.started_at.elapsed().as_secs(),
    })
}

/// GET /v1/status
///
/// Connectivity indicator for every channel, in channel order.
pub async fn get_status(
    State(state): State<GatewayState>,
) -> Result<Json<StatusResponse>, ApiError> {
    let mut channels = Vec::new();
    for connectivity in state.orchestrator.connectivity() {
        let queue = state.orchestrator.queue_stats(&connectivity.channel)?;
        channels.push(ChannelStatusView {
            connectivity,
            queue,
        });
    }
    Ok(Json(StatusResponse { channels }))
}

/// POST /v1/channels/{channel}/messages
pub async fn post_message(
    State(state): State<GatewayState>,
    Path(channel): Path<String>,
    Json(body): Json<PushMessageRequest>,
) -> Result<(StatusCode, Json<PushMessageResponse>), ApiError> {
    let message_id = body
        .message_id
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
    let mut message = InboundMessage::new(channel, message_id, body.sender_id, body.body);
    if let Some(received_at) = body.received_at {
        message.received_at = received_at;
    }

    let item = state.orchestrator.submit(message).await?;
    tracing::debug!(
        channel = %item.channel(),
        message_id = %item.message_id(),
        sequence = item.sequence,
        "message accepted over HTTP"
    );
    Ok((
        StatusCode::ACCEPTED,
        Json(PushMessageResponse {
            channel: item.message.channel,
            message_id: item.message.message_id,
            sequence: item.sequence,
            status: item.status,
        }),
    ))
}

/// POST /v1/channels/{channel}/samples
pub async fn post_sample(
    State(state): State<GatewayState>,
    Path(channel): Path<String>,
    Json(body): Json<SampleRequest>,
) -> Result<(StatusCode, Json<SampleResponse>), ApiError> {
    let channel = ChannelId::new(channel);
    let sample_count = state
        .orchestrator
        .add_sample(&channel, StyleSample::new(body.body, body.tone_tags))
        .await?;
    Ok((
        StatusCode::CREATED,
        Json(SampleResponse {
            channel,
            sample_count,
        }),
    ))
}

/// GET /v1/channels/{channel}/profile
pub async fn get_profile(
    State(state): State<GatewayState>,
    Path(channel): Path<String>,
) -> Result<Json<ProfileView>, ApiError> {
    Ok(Json(state.orchestrator.profile(&ChannelId::new(channel))?))
}

/// GET /v1/review
pub async fn get_review(State(state): State<GatewayState>) -> Json<ReviewResponse> {
    let items = state
        .orchestrator
        .failed_items()
        .into_iter()
        .map(ReviewEntry::from)
        .collect();
    Json(ReviewResponse { items })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_request_needs_only_sender_and_body() {
        let req: PushMessageRequest =
            serde_json::from_str(r#"{"sender_id": "ann", "body": "hi"}"#).unwrap();
        assert!(req.message_id.is_none());
        assert!(req.received_at.is_none());
    }

    #[test]
    fn sample_request_defaults_tags() {
        let req: SampleRequest = serde_json::from_str(r#"{"body": "hey!"}"#).unwrap();
        assert!(req.tone_tags.is_empty());
    }
}
