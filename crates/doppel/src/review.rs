// SPDX-FileCopyrightText: 2026 Doppel Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `doppel review` command: lists terminally failed items straight from the
//! database, so it works whether or not the service is running.

use serde::Serialize;

use doppel_config::DoppelConfig;
use doppel_core::{DoppelError, QueuedItem, StorageAdapter};
use doppel_storage::SqliteStorage;

#[derive(Debug, Serialize)]
struct ReviewRow<'a> {
    channel: &'a str,
    message_id: &'a str,
    sender_id: &'a str,
    reason: String,
    attempts: u32,
    generation_failures: u32,
    last_error: Option<&'a str>,
    body: &'a str,
    failed_at: String,
}

impl<'a> From<&'a QueuedItem> for ReviewRow<'a> {
    fn from(item: &'a QueuedItem) -> Self {
        Self {
            channel: item.channel().as_str(),
            message_id: &item.message_id().0,
            sender_id: &item.message.sender_id,
            reason: item
                .failure_reason
                .map(|reason| reason.to_string())
                .unwrap_or_else(|| "unknown".to_string()),
            attempts: item.attempt_count,
            generation_failures: item.generation_failures,
            last_error: item.last_error.as_deref(),
            body: &item.message.body,
            failed_at: item.updated_at.to_rfc3339(),
        }
    }
}

fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        text.to_string()
    } else {
        let cut: String = text.chars().take(max.saturating_sub(1)).collect();
        format!("{cut}…")
    }
}

fn render_table(items: &[QueuedItem]) -> String {
    if items.is_empty() {
        return "no failed items\n".to_string();
    }

    let mut out = format!(
        "{:<20} {:<16} {:<22} {:>8}  {}\n",
        "CHANNEL", "MESSAGE", "REASON", "ATTEMPTS", "LAST ERROR"
    );
    for item in items {
        let row = ReviewRow::from(item);
        out.push_str(&format!(
            "{:<20} {:<16} {:<22} {:>8}  {}\n",
            truncate(row.channel, 20),
            truncate(row.message_id, 16),
            row.reason,
            row.attempts,
            truncate(row.last_error.unwrap_or("-"), 60),
        ));
    }
    out.push_str(&format!("{} failed item(s)\n", items.len()));
    out
}

fn render_json(items: &[QueuedItem]) -> Result<String, DoppelError> {
    let rows: Vec<ReviewRow<'_>> = items.iter().map(ReviewRow::from).collect();
    serde_json::to_string_pretty(&rows)
        .map_err(|e| DoppelError::Internal(format!("failed to encode review: {e}")))
}

pub async fn run_review(config: &DoppelConfig, json: bool) -> Result<(), DoppelError> {
    let storage = SqliteStorage::new(config.storage.clone());
    storage.initialize().await?;
    let items = storage.failed_items().await?;
    storage.close().await?;

    if json {
        println!("{}", render_json(&items)?);
    } else {
        print!("{}", render_table(&items));
    }
    Ok(())
}
