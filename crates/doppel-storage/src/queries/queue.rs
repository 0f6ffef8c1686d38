// SPDX-FileCopyrightText: 2026 Doppel Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Queue journal: revisioned item snapshots.

use doppel_core::{ChannelId, DoppelError, MessageId, QueuedItem};
use rusqlite::params;

use crate::database::{Database, map_tr_err};

/// Upserts an item snapshot. Rows whose stored revision is newer or equal
/// are left untouched. Returns whether the row changed.
pub async fn save_item(db: &Database, item: &QueuedItem) -> Result<bool, DoppelError> {
    let snapshot = serde_json::to_string(item).map_err(DoppelError::storage)?;
    let channel = item.channel().to_string();
    let message_id = item.message_id().to_string();
    let sequence = item.sequence as i64;
    let status = item.status.to_string();
    let revision = item.revision as i64;
    let updated_at = item.updated_at.to_rfc3339();

    let changed = db
        .connection()
        .call(move |conn| -> Result<usize, rusqlite::Error> {
            conn.execute(
                "INSERT INTO queue_items
                     (channel, message_id, sequence, status, revision, snapshot, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                 ON CONFLICT(channel, message_id) DO UPDATE SET
                     sequence = excluded.sequence,
                     status = excluded.status,
                     revision = excluded.revision,
                     snapshot = excluded.snapshot,
                     updated_at = excluded.updated_at
                 WHERE excluded.revision > queue_items.revision",
                params![channel, message_id, sequence, status, revision, snapshot, updated_at],
            )
        })
        .await
        .map_err(map_tr_err)?;
    Ok(changed > 0)
}

/// Loads every snapshot ordered by channel, then sequence.
pub async fn load_items(db: &Database) -> Result<Vec<QueuedItem>, DoppelError> {
    let snapshots = db
        .connection()
        .call(|conn| -> Result<Vec<String>, rusqlite::Error> {
            let mut stmt =
                conn.prepare("SELECT snapshot FROM queue_items ORDER BY channel ASC, sequence ASC")?;
            let rows = stmt.query_map([], |row| row.get(0))?;
            rows.collect()
        })
        .await
        .map_err(map_tr_err)?;

    snapshots
        .iter()
        .map(|s| serde_json::from_str(s).map_err(DoppelError::storage))
        .collect()
}

/// Whether any snapshot exists for `message_id` on `channel`.
pub async fn item_exists(
    db: &Database,
    channel: &ChannelId,
    message_id: &MessageId,
) -> Result<bool, DoppelError> {
    let channel = channel.to_string();
    let message_id = message_id.to_string();
    db.connection()
        .call(move |conn| -> Result<bool, rusqlite::Error> {
            let mut stmt = conn.prepare_cached(
                "SELECT EXISTS(SELECT 1 FROM queue_items WHERE channel = ?1 AND message_id = ?2)",
            )?;
            stmt.query_row(params![channel, message_id], |row| row.get(0))
        })
        .await
        .map_err(map_tr_err)
}

/// Loads terminal failed items, oldest update first.
pub async fn load_failed(db: &Database) -> Result<Vec<QueuedItem>, DoppelError> {
    let snapshots = db
        .connection()
        .call(|conn| -> Result<Vec<String>, rusqlite::Error> {
            let mut stmt = conn.prepare(
                "SELECT snapshot FROM queue_items WHERE status = 'failed'
                 ORDER BY updated_at ASC, channel ASC, sequence ASC",
            )?;
            let rows = stmt.query_map([], |row| row.get(0))?;
            rows.collect()
        })
        .await
        .map_err(map_tr_err)?;

    snapshots
        .iter()
        .map(|s| serde_json::from_str(s).map_err(DoppelError::storage))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use doppel_core::{FailureReason, InboundMessage, ItemStatus};
    use tempfile::tempdir;

    async fn setup_db() -> (Database, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("test.db");
        let db = Database::open(db_path.to_str().unwrap()).await.unwrap();
        (db, dir)
    }

    fn item(channel: &str, id: &str, sequence: u64, revision: u64) -> QueuedItem {
        QueuedItem {
            sequence,
            message: InboundMessage::new(channel, id, "alice", format!("body of {id}")),
            reply: None,
            status: ItemStatus::Pending,
            attempt_count: 0,
            generation_failures: 0,
            last_error: None,
            failure_reason: None,
            revision,
            updated_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn newer_revision_overwrites() {
        let (db, _dir) = setup_db().await;

        let mut it = item("chat", "m1", 1, 1);
        assert!(save_item(&db, &it).await.unwrap());

        it.status = ItemStatus::InFlight;
        it.revision = 2;
        assert!(save_item(&db, &it).await.unwrap());

        let loaded = load_items(&db).await.unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].status, ItemStatus::InFlight);
        assert_eq!(loaded[0].revision, 2);

        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn stale_revision_is_ignored() {
        let (db, _dir) = setup_db().await;

        let mut it = item("chat", "m1", 1, 5);
        it.status = ItemStatus::Delivered;
        save_item(&db, &it).await.unwrap();

        let mut stale = item("chat", "m1", 1, 3);
        stale.status = ItemStatus::Pending;
        assert!(!save_item(&db, &stale).await.unwrap());

        let same = it.clone();
        assert!(!save_item(&db, &same).await.unwrap());

        let loaded = load_items(&db).await.unwrap();
        assert_eq!(loaded[0].status, ItemStatus::Delivered);
        assert_eq!(loaded[0].revision, 5);

        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn load_orders_by_channel_then_sequence() {
        let (db, _dir) = setup_db().await;

        save_item(&db, &item("email", "e2", 2, 1)).await.unwrap();
        save_item(&db, &item("chat", "c1", 1, 1)).await.unwrap();
        save_item(&db, &item("email", "e1", 1, 1)).await.unwrap();

        let ids: Vec<String> = load_items(&db)
            .await
            .unwrap()
            .iter()
            .map(|i| i.message_id().to_string())
            .collect();
        assert_eq!(ids, vec!["c1", "e1", "e2"]);

        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn item_exists_is_scoped_to_the_channel() {
        let (db, _dir) = setup_db().await;

        save_item(&db, &item("chat", "m1", 1, 1)).await.unwrap();
        let chat = ChannelId::from("chat");
        assert!(item_exists(&db, &chat, &MessageId::from("m1")).await.unwrap());
        assert!(!item_exists(&db, &chat, &MessageId::from("m2")).await.unwrap());
        assert!(
            !item_exists(&db, &ChannelId::from("email"), &MessageId::from("m1"))
                .await
                .unwrap()
        );

        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn load_failed_returns_only_terminal_failures() {
        let (db, _dir) = setup_db().await;

        save_item(&db, &item("chat", "ok", 1, 1)).await.unwrap();
        let mut failed = item("chat", "bad", 2, 4);
        failed.status = ItemStatus::Failed;
        failed.failure_reason = Some(FailureReason::GenerationExhausted);
        failed.last_error = Some("model unavailable".into());
        save_item(&db, &failed).await.unwrap();

        let review = load_failed(&db).await.unwrap();
        assert_eq!(review.len(), 1);
        assert_eq!(review[0].message_id().to_string(), "bad");
        assert_eq!(
            review[0].failure_reason,
            Some(FailureReason::GenerationExhausted)
        );

        db.close().await.unwrap();
    }
}
