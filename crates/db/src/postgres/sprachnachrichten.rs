//! Postgres-Implementierung des SprachnachrichtRepository

use sqlx::Row as _;
use uuid::Uuid;

use crate::error::DbResult;
use crate::models::{NeueSprachnachricht, SprachnachrichtRecord};
use crate::postgres::pool::PostgresDb;
use crate::repository::SprachnachrichtRepository;

impl SprachnachrichtRepository for PostgresDb {
    async fn erstellen(&self, data: NeueSprachnachricht<'_>) -> DbResult<SprachnachrichtRecord> {
        sqlx::query(
            "INSERT INTO voice_messages
             (id, room_id, sender_id, blob_key, duration_seconds, created_at)
             VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(data.id)
        .bind(data.room_id)
        .bind(data.sender_id)
        .bind(data.blob_key)
        .bind(data.duration_seconds)
        .bind(data.created_at)
        .execute(&self.pool)
        .await?;

        Ok(SprachnachrichtRecord {
            id: data.id,
            room_id: data.room_id,
            sender_id: data.sender_id,
            blob_key: data.blob_key.to_string(),
            duration_seconds: data.duration_seconds,
            created_at: data.created_at,
        })
    }

    async fn laden(&self, id: Uuid) -> DbResult<Option<SprachnachrichtRecord>> {
        let row = sqlx::query(
            "SELECT id, room_id, sender_id, blob_key, duration_seconds, created_at
             FROM voice_messages WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|r| zeile_zu_nachricht(&r)).transpose()
    }

    async fn fuer_raum(
        &self,
        raum_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> DbResult<Vec<SprachnachrichtRecord>> {
        let rows = sqlx::query(
            "SELECT id, room_id, sender_id, blob_key, duration_seconds, created_at
             FROM voice_messages
             WHERE room_id = $1
             ORDER BY created_at DESC
             LIMIT $2 OFFSET $3",
        )
        .bind(raum_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(zeile_zu_nachricht).collect()
    }

    async fn loeschen(&self, id: Uuid) -> DbResult<bool> {
        let affected = sqlx::query("DELETE FROM voice_messages WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?
            .rows_affected();

        Ok(affected > 0)
    }
}

fn zeile_zu_nachricht(row: &sqlx::postgres::PgRow) -> DbResult<SprachnachrichtRecord> {
    Ok(SprachnachrichtRecord {
        id: row.try_get("id")?,
        room_id: row.try_get("room_id")?,
        sender_id: row.try_get("sender_id")?,
        blob_key: row.try_get("blob_key")?,
        duration_seconds: row.try_get("duration_seconds")?,
        created_at: row.try_get("created_at")?,
    })
}
