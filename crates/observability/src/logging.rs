//! Structured Logging via tracing-subscriber
//!
//! Level und Format kommen aus der Server-Konfiguration; die
//! Umgebungsvariable `RUST_LOG` gewinnt wenn gesetzt.

use tracing_subscriber::{fmt, EnvFilter};

/// Initialisiert das Logging-System
///
/// `format` ist "json" oder "text"; alles andere faellt auf "text"
/// zurueck.
pub fn logging_initialisieren(level: &str, format: &str) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    match format {
        "json" => {
            fmt()
                .json()
                .with_env_filter(filter)
                .with_target(true)
                .with_current_span(true)
                .init();
        }
        _ => {
            fmt().with_env_filter(filter).with_target(true).init();
        }
    }
}

/// Validiert einen Log-Level-String
pub fn log_level_gueltig(level: &str) -> bool {
    matches!(level, "trace" | "debug" | "info" | "warn" | "error")
}

/// Validiert einen Log-Format-String
pub fn log_format_gueltig(format: &str) -> bool {
    matches!(format, "text" | "json")
}
