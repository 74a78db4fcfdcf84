//! Fehlertypen fuer das Storage-Crate

use thiserror::Error;

/// Result-Alias fuer Blob-Store-Operationen
pub type StorageResult<T> = Result<T, StorageError>;

/// Blob-Store-Fehler
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Blob nicht gefunden: {0}")]
    NichtGefunden(String),

    #[error("Upload fehlgeschlagen: {0}")]
    Upload(String),

    #[error("Download fehlgeschlagen: {0}")]
    Download(String),

    #[error("Loeschen fehlgeschlagen: {0}")]
    Loeschen(String),

    #[error("Presign fehlgeschlagen: {0}")]
    Presign(String),

    #[error("Storage-Konfiguration ungueltig: {0}")]
    Konfiguration(String),
}
