//! Deterministischer Blob-Schluessel fuer Sprachaufnahmen
//!
//! Form: `messages/JJJJ/MM/TT/<uuid>.<endung>` mit UTC-Kalenderdatum
//! zum Upload-Zeitpunkt. Jahr/Monat/Tag in dieser Reihenfolge, damit
//! Prefix-Listings chronologisch sortieren.

use chrono::{DateTime, Datelike, Utc};
use uuid::Uuid;

use crate::format::AudioFormat;

/// Baut den Objektschluessel fuer eine Sprachaufnahme
pub fn blob_schluessel(zeitpunkt: DateTime<Utc>, id: Uuid, format: AudioFormat) -> String {
    format!(
        "messages/{:04}/{:02}/{:02}/{}.{}",
        zeitpunkt.year(),
        zeitpunkt.month(),
        zeitpunkt.day(),
        id,
        format.endung()
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn schluessel_form() {
        let zeitpunkt = Utc.with_ymd_and_hms(2025, 3, 7, 12, 0, 0).unwrap();
        let id = Uuid::nil();

        let key = blob_schluessel(zeitpunkt, id, AudioFormat::Webm);
        assert_eq!(
            key,
            "messages/2025/03/07/00000000-0000-0000-0000-000000000000.webm"
        );
    }

    #[test]
    fn monat_vor_tag() {
        // 2. Januar: der Pfad muss .../01/02/... lauten, nicht .../02/01/...
        let zeitpunkt = Utc.with_ymd_and_hms(2025, 1, 2, 0, 0, 0).unwrap();
        let key = blob_schluessel(zeitpunkt, Uuid::nil(), AudioFormat::Mp3);
        assert!(key.starts_with("messages/2025/01/02/"));
    }

    #[test]
    fn endung_aus_format() {
        let zeitpunkt = Utc.with_ymd_and_hms(2025, 6, 15, 0, 0, 0).unwrap();
        let key = blob_schluessel(zeitpunkt, Uuid::new_v4(), AudioFormat::Ogg);
        assert!(key.ends_with(".ogg"));
    }
}
