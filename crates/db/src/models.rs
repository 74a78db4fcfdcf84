//! Datensatz-Strukturen fuer die Repositories
//!
//! `...Record` sind gelesene Zeilen, `Neue...` sind Einfuege-Daten mit
//! geliehenen Feldern (kein unnoetiges Klonen beim Insert).

use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Datensatz eines Benutzerkontos
#[derive(Debug, Clone)]
pub struct BenutzerRecord {
    pub id: Uuid,
    pub email: String,
    pub username: String,
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
}

/// Einfuege-Daten fuer einen neuen Benutzer
#[derive(Debug, Clone, Copy)]
pub struct NeuerBenutzer<'a> {
    pub email: &'a str,
    pub username: &'a str,
    pub password_hash: &'a str,
}

/// Datensatz eines Raums
#[derive(Debug, Clone)]
pub struct RaumRecord {
    pub id: Uuid,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Datensatz einer Sprachnachricht (nur Metadaten – die Audiodaten
/// liegen im Blob-Store unter `blob_key`)
#[derive(Debug, Clone)]
pub struct SprachnachrichtRecord {
    pub id: Uuid,
    pub room_id: Uuid,
    pub sender_id: Uuid,
    pub blob_key: String,
    pub duration_seconds: i32,
    pub created_at: DateTime<Utc>,
}

/// Einfuege-Daten fuer eine neue Sprachnachricht
///
/// `id` und `created_at` werden vom Aufrufer gestellt: die Pipeline
/// vergibt die ID vor dem Blob-Upload, damit der Blob-Schluessel sie
/// bereits enthaelt.
#[derive(Debug, Clone, Copy)]
pub struct NeueSprachnachricht<'a> {
    pub id: Uuid,
    pub room_id: Uuid,
    pub sender_id: Uuid,
    pub blob_key: &'a str,
    pub duration_seconds: i32,
    pub created_at: DateTime<Utc>,
}
