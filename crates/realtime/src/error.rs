//! Fehlertypen fuer das Realtime-Crate

use thiserror::Error;

/// Echtzeit-Fehler
#[derive(Debug, Error)]
pub enum RealtimeError {
    /// Eingehender Frame mit unbekanntem `type`-Feld
    ///
    /// Wird dem Client als error-Ereignis gemeldet; die Verbindung
    /// bleibt offen.
    #[error("Unbekannter Ereignistyp: {0}")]
    UnbekannterTyp(String),

    /// Eingehender Frame ist kein gueltiges Ereignis-JSON
    #[error("Ereignis nicht dekodierbar: {0}")]
    Dekodierung(#[from] serde_json::Error),
}
