// SPDX-FileCopyrightText: 2026 Doppel Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Append-only training-sample history.

use chrono::{DateTime, Utc};
use doppel_core::{ChannelId, DoppelError, StyleSample};
use rusqlite::params;

use crate::database::{Database, map_tr_err};

/// Appends one sample. Returns its row id.
pub async fn append_sample(
    db: &Database,
    channel: &ChannelId,
    sample: &StyleSample,
) -> Result<i64, DoppelError> {
    let channel = channel.to_string();
    let body = sample.body.clone();
    let tone_tags = serde_json::to_string(&sample.tone_tags).map_err(DoppelError::storage)?;
    let added_at = sample.added_at.to_rfc3339();

    db.connection()
        .call(move |conn| -> Result<i64, rusqlite::Error> {
            conn.execute(
                "INSERT INTO style_samples (channel, body, tone_tags, added_at)
                 VALUES (?1, ?2, ?3, ?4)",
                params![channel, body, tone_tags, added_at],
            )?;
            Ok(conn.last_insert_rowid())
        })
        .await
        .map_err(map_tr_err)
}

/// Loads the whole history in insertion order.
pub async fn load_samples(db: &Database) -> Result<Vec<(ChannelId, StyleSample)>, DoppelError> {
    let rows = db
        .connection()
        .call(|conn| -> Result<Vec<(String, String, String, String)>, rusqlite::Error> {
            let mut stmt = conn.prepare(
                "SELECT channel, body, tone_tags, added_at FROM style_samples ORDER BY id ASC",
            )?;
            let rows = stmt.query_map([], |row| {
                Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?))
            })?;
            rows.collect()
        })
        .await
        .map_err(map_tr_err)?;

    rows.into_iter()
        .map(|(channel, body, tone_tags, added_at)| {
            let tone_tags: Vec<String> =
                serde_json::from_str(&tone_tags).map_err(DoppelError::storage)?;
            let added_at = DateTime::parse_from_rfc3339(&added_at)
                .map_err(DoppelError::storage)?
                .with_timezone(&Utc);
            Ok((
                ChannelId(channel),
                StyleSample {
                    body,
                    tone_tags,
                    added_at,
                },
            ))
        })
        .collect()
}

/// Number of stored samples for one channel.
pub async fn count_samples(db: &Database, channel: &ChannelId) -> Result<u64, DoppelError> {
    let channel = channel.to_string();
    let count = db
        .connection()
        .call(move |conn| -> Result<i64, rusqlite::Error> {
            conn.query_row(
                "SELECT COUNT(*) FROM style_samples WHERE channel = ?1",
                params![channel],
                |row| row.get(0),
            )
        })
        .await
        .map_err(map_tr_err)?;
    Ok(count as u64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn history_replays_in_insertion_order() {
        let dir = tempdir().unwrap();
        let db = Database::open(dir.path().join("s.db").to_str().unwrap())
            .await
            .unwrap();

        let chat = ChannelId::from("chat");
        let email = ChannelId::from("email");
        append_sample(&db, &chat, &StyleSample::new("hey!", vec!["warm".into()]))
            .await
            .unwrap();
        append_sample(&db, &email, &StyleSample::new("Dear Sir,", vec![]))
            .await
            .unwrap();
        append_sample(&db, &chat, &StyleSample::new("sure thing", vec![]))
            .await
            .unwrap();

        let history = load_samples(&db).await.unwrap();
        let bodies: Vec<&str> = history.iter().map(|(_, s)| s.body.as_str()).collect();
        assert_eq!(bodies, vec!["hey!", "Dear Sir,", "sure thing"]);
        assert_eq!(history[0].1.tone_tags, vec!["warm".to_string()]);
        assert_eq!(history[1].0, email);

        assert_eq!(count_samples(&db, &chat).await.unwrap(), 2);
        assert_eq!(count_samples(&db, &ChannelId::from("sms")).await.unwrap(), 0);

        db.close().await.unwrap();
    }
}
