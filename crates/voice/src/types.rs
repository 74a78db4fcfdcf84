//! Datentypen der Sprachnachricht-Pipeline

use funkraum_db::models::SprachnachrichtRecord;
use uuid::Uuid;

/// Eingang der Upload-Pipeline (aus dem Multipart-Formular)
#[derive(Debug, Clone)]
pub struct NeuerUpload {
    pub raum_id: Uuid,
    pub sender_id: Uuid,
    pub dauer_sekunden: i32,
    /// Dateiname des Audio-Parts, falls der Client einen mitschickt
    pub dateiname: Option<String>,
    /// Content-Type des Audio-Parts
    pub content_type: Option<String>,
    pub daten: Vec<u8>,
}

/// Sprachnachricht samt vorsignierter Abspiel-URL
///
/// `url` ist leer wenn das Presigning fehlschlug; der Client holt sich
/// dann spaeter eine frische URL ueber die Einzelabfrage.
#[derive(Debug, Clone)]
pub struct SprachnachrichtMitUrl {
    pub nachricht: SprachnachrichtRecord,
    pub url: String,
}
