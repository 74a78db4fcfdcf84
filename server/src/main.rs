//! Funkraum Server – Einstiegspunkt
//!
//! Laedt die Konfiguration, initialisiert das Logging und startet den
//! Server. Exit-Code 0 bei normalem Ende, 1 bei Start- oder
//! Laufzeitfehlern.

use anyhow::Result;
use funkraum_observability::logging_initialisieren;
use funkraum_server::{config::ServerConfig, Server};

#[tokio::main]
async fn main() -> Result<()> {
    // Konfigurationsdatei-Pfad aus Umgebungsvariable oder Standard
    let config_pfad =
        std::env::var("FUNKRAUM_CONFIG").unwrap_or_else(|_| "config.toml".into());

    let config = ServerConfig::laden(&config_pfad)?;

    logging_initialisieren(&config.logging.level, &config.logging.format);

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        config = %config_pfad,
        "Funkraum wird initialisiert"
    );

    let server = Server::neu(config);
    server.starten().await?;

    Ok(())
}
