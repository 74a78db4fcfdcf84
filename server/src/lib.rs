//! funkraum-server – Bibliotheks-Root
//!
//! Verdrahtet alle Subsysteme: Datenbank, Blob-Store, Token-Service,
//! Verbindungs-Manager, Sprachnachricht-Pipeline und die
//! HTTP-Oberflaeche.

pub mod config;
pub mod error;
pub mod http;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;

use funkraum_auth::TokenService;
use funkraum_db::{DatabaseConfig, PostgresDb};
use funkraum_observability::{FunkraumMetriken, HealthState};
use funkraum_realtime::VerbindungsManager;
use funkraum_storage::{S3BlobStore, S3Config};
use funkraum_voice::SprachnachrichtService;

use config::ServerConfig;
use http::AppState;

/// Intervall in dem leere Hubs eingesammelt werden
const AUFRAEUM_INTERVALL: Duration = Duration::from_secs(60);

/// Haelt den laufenden Server-Zustand zusammen
pub struct Server {
    pub config: ServerConfig,
}

impl Server {
    /// Erstellt einen neuen Server aus der gegebenen Konfiguration
    pub fn neu(config: ServerConfig) -> Self {
        Self { config }
    }

    /// Startet alle Subsysteme und laeuft bis zum Shutdown-Signal
    ///
    /// Reihenfolge:
    /// 1. Konfiguration pruefen
    /// 2. Datenbankverbindung herstellen und Migrationen ausfuehren
    /// 3. Blob-Store und Token-Service initialisieren
    /// 4. Verbindungs-Manager und Sprachnachricht-Pipeline aufbauen
    /// 5. Aufraeum- und Metriken-Takt starten
    /// 6. HTTP-Server bedienen bis Ctrl-C; dann Hubs herunterfahren
    pub async fn starten(self) -> Result<()> {
        self.config.validieren()?;

        let db_deadline = Duration::from_secs(self.config.datenbank.timeout_sek);

        // --- Datenbank ---
        let db_config = DatabaseConfig {
            url: self.config.datenbank_url(),
            max_verbindungen: self.config.datenbank.max_verbindungen,
            timeout_sek: self.config.datenbank.timeout_sek,
        };
        let db = Arc::new(PostgresDb::verbinden(&db_config).await?);
        tracing::info!("Datenbankverbindung hergestellt, Migrationen ausgefuehrt");

        // --- Blob-Store ---
        let blobs = Arc::new(
            S3BlobStore::verbinden(&S3Config {
                endpoint: self.config.s3.endpoint.clone(),
                access_key_id: self.config.s3.access_key_id.clone(),
                secret_access_key: self.config.s3.secret_access_key.clone(),
                use_ssl: self.config.s3.use_ssl,
                bucket_name: self.config.s3.bucket_name.clone(),
            })
            .await?,
        );

        // --- Token-Service ---
        let tokens = Arc::new(TokenService::neu(
            &self.config.allgemein.secret_key,
            chrono::Duration::minutes(self.config.allgemein.access_token_ttl_minuten),
            chrono::Duration::days(self.config.allgemein.refresh_token_ttl_tage),
        ));

        // --- Echtzeit & Pipeline ---
        let manager = Arc::new(VerbindungsManager::neu());
        let voice = SprachnachrichtService::neu(
            Arc::clone(&db),
            Arc::clone(&db),
            blobs,
            Arc::clone(&manager),
            db_deadline,
        );

        // --- Observability ---
        let metriken = FunkraumMetriken::neu()?;
        let health = HealthState::neu();

        // Aufraeumen leerer Hubs und Metriken-Abgleich; der Takt gehoert
        // dem Server, nicht dem Manager
        let aufraeum_manager = Arc::clone(&manager);
        let aufraeum_metriken = metriken.clone();
        tokio::spawn(async move {
            let mut takt = tokio::time::interval(AUFRAEUM_INTERVALL);
            takt.tick().await;
            loop {
                takt.tick().await;

                let entfernt = aufraeum_manager
                    .leerlauf_einsammeln(VerbindungsManager::leerlauf_schwelle())
                    .await;
                if entfernt > 0 {
                    tracing::debug!(entfernt, "Leere Hubs eingesammelt");
                }

                aufraeum_metriken
                    .aktive_hubs
                    .set(aufraeum_manager.aktive_hubs() as f64);
                aufraeum_metriken
                    .verbundene_clients
                    .set(aufraeum_manager.verbundene_clients() as f64);
            }
        });

        // --- HTTP ---
        let state = AppState {
            db,
            tokens,
            manager: Arc::clone(&manager),
            voice,
            metriken,
            db_deadline,
        };
        let app = http::router(state, health);

        let adresse = self.config.http_bind_adresse();
        let listener = tokio::net::TcpListener::bind(&adresse).await?;
        tracing::info!(adresse = %adresse, env = %self.config.allgemein.env, "Funkraum-Server bereit");

        // Ctrl-C: erst die Hubs schliessen (Close-Frames innerhalb des
        // 10-Sekunden-Budgets), dann den HTTP-Server entleeren
        let shutdown_manager = Arc::clone(&manager);
        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = tokio::signal::ctrl_c().await;
                tracing::info!("Shutdown-Signal empfangen");
                shutdown_manager.herunterfahren().await;
            })
            .await?;

        tracing::info!("Server beendet");
        Ok(())
    }
}
