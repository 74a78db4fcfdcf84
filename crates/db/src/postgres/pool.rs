//! Postgres Connection Pool

use sqlx::postgres::{PgPool, PgPoolOptions};
use std::time::Duration;
use tracing::info;

use crate::error::DbError;
use crate::repository::DatabaseConfig;

/// Wrapper um den Postgres Connection Pool
///
/// Implementiert alle Repository-Traits; ein Clone teilt den Pool.
#[derive(Debug, Clone)]
pub struct PostgresDb {
    pub(crate) pool: PgPool,
}

impl PostgresDb {
    /// Stellt die Verbindung her und fuehrt Migrationen aus
    pub async fn verbinden(config: &DatabaseConfig) -> Result<Self, DbError> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_verbindungen)
            .acquire_timeout(Duration::from_secs(config.timeout_sek))
            .connect(&config.url)
            .await?;

        info!(max_verbindungen = config.max_verbindungen, "Postgres-Pool geoeffnet");

        let db = Self { pool };
        db.migrationen_ausfuehren().await?;

        Ok(db)
    }

    /// Fuehrt alle ausstehenden Migrationen aus
    pub async fn migrationen_ausfuehren(&self) -> Result<(), DbError> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        info!("Datenbank-Migrationen abgeschlossen");
        Ok(())
    }

    /// Gibt den internen Pool zurueck (fuer Tests und Health-Checks)
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}
