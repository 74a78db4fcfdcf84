//! Postgres-Implementierung des BenutzerRepository

use chrono::Utc;
use sqlx::Row as _;
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use crate::models::{BenutzerRecord, NeuerBenutzer};
use crate::postgres::pool::PostgresDb;
use crate::repository::BenutzerRepository;

impl BenutzerRepository for PostgresDb {
    async fn erstellen(&self, data: NeuerBenutzer<'_>) -> DbResult<BenutzerRecord> {
        let id = Uuid::new_v4();
        let now = Utc::now();

        let ergebnis = sqlx::query(
            "INSERT INTO users (id, email, username, password_hash, created_at)
             VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(id)
        .bind(data.email)
        .bind(data.username)
        .bind(data.password_hash)
        .bind(now)
        .execute(&self.pool)
        .await;

        if let Err(e) = ergebnis {
            let fehler = DbError::from(e);
            if fehler.ist_eindeutigkeit() {
                return Err(DbError::Eindeutigkeit(format!("email {}", data.email)));
            }
            return Err(fehler);
        }

        Ok(BenutzerRecord {
            id,
            email: data.email.to_string(),
            username: data.username.to_string(),
            password_hash: data.password_hash.to_string(),
            created_at: now,
        })
    }

    async fn laden(&self, id: Uuid) -> DbResult<Option<BenutzerRecord>> {
        let row = sqlx::query(
            "SELECT id, email, username, password_hash, created_at
             FROM users WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|r| zeile_zu_benutzer(&r)).transpose()
    }

    async fn laden_nach_email(&self, email: &str) -> DbResult<Option<BenutzerRecord>> {
        let row = sqlx::query(
            "SELECT id, email, username, password_hash, created_at
             FROM users WHERE email = $1",
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|r| zeile_zu_benutzer(&r)).transpose()
    }
}

fn zeile_zu_benutzer(row: &sqlx::postgres::PgRow) -> DbResult<BenutzerRecord> {
    Ok(BenutzerRecord {
        id: row.try_get("id")?,
        email: row.try_get("email")?,
        username: row.try_get("username")?,
        password_hash: row.try_get("password_hash")?,
        created_at: row.try_get("created_at")?,
    })
}
