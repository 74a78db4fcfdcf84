//! Postgres-Implementierung des RaumRepository
//!
//! Die Mitgliedschaftspruefung `ist_mitglied` ist der heisseste Pfad
//! (jeder Upload und jedes Socket-Upgrade fragt sie ab) und laeuft als
//! indizierter EXISTS-Lookup ueber den Primaerschluessel von
//! `room_participants`.

use chrono::Utc;
use sqlx::Row as _;
use uuid::Uuid;

use crate::error::DbResult;
use crate::models::RaumRecord;
use crate::postgres::pool::PostgresDb;
use crate::repository::RaumRepository;

impl RaumRepository for PostgresDb {
    async fn erstellen(&self, name: &str, ersteller: Uuid) -> DbResult<RaumRecord> {
        let id = Uuid::new_v4();
        let now = Utc::now();

        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "INSERT INTO rooms (id, name, created_at, updated_at) VALUES ($1, $2, $3, $3)",
        )
        .bind(id)
        .bind(name)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            "INSERT INTO room_participants (room_id, user_id, joined_at) VALUES ($1, $2, $3)",
        )
        .bind(id)
        .bind(ersteller)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(RaumRecord {
            id,
            name: name.to_string(),
            created_at: now,
            updated_at: now,
        })
    }

    async fn laden(&self, id: Uuid) -> DbResult<Option<RaumRecord>> {
        let row = sqlx::query(
            "SELECT id, name, created_at, updated_at FROM rooms WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|r| zeile_zu_raum(&r)).transpose()
    }

    async fn fuer_benutzer(&self, user_id: Uuid) -> DbResult<Vec<RaumRecord>> {
        let rows = sqlx::query(
            "SELECT r.id, r.name, r.created_at, r.updated_at
             FROM rooms r
             JOIN room_participants p ON p.room_id = r.id
             WHERE p.user_id = $1
             ORDER BY r.created_at DESC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(zeile_zu_raum).collect()
    }

    async fn loeschen(&self, id: Uuid) -> DbResult<bool> {
        let affected = sqlx::query("DELETE FROM rooms WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?
            .rows_affected();

        Ok(affected > 0)
    }

    async fn mitglied_hinzufuegen(&self, raum_id: Uuid, user_id: Uuid) -> DbResult<()> {
        sqlx::query(
            "INSERT INTO room_participants (room_id, user_id, joined_at)
             VALUES ($1, $2, $3)
             ON CONFLICT (room_id, user_id) DO NOTHING",
        )
        .bind(raum_id)
        .bind(user_id)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn mitglied_entfernen(&self, raum_id: Uuid, user_id: Uuid) -> DbResult<bool> {
        let affected = sqlx::query(
            "DELETE FROM room_participants WHERE room_id = $1 AND user_id = $2",
        )
        .bind(raum_id)
        .bind(user_id)
        .execute(&self.pool)
        .await?
        .rows_affected();

        Ok(affected > 0)
    }

    async fn ist_mitglied(&self, raum_id: Uuid, user_id: Uuid) -> DbResult<bool> {
        let row = sqlx::query(
            "SELECT EXISTS(
                 SELECT 1 FROM room_participants
                 WHERE room_id = $1 AND user_id = $2
             ) AS mitglied",
        )
        .bind(raum_id)
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(row.try_get("mitglied")?)
    }
}

fn zeile_zu_raum(row: &sqlx::postgres::PgRow) -> DbResult<RaumRecord> {
    Ok(RaumRecord {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}
