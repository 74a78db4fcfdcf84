//! funkraum-storage – Blob-Store-Anbindung
//!
//! Das [`BlobStore`]-Trait abstrahiert den Objektspeicher fuer
//! Sprachaufnahmen. [`S3BlobStore`] spricht S3-kompatible Dienste
//! (AWS S3, MinIO) an; [`InMemoryBlobStore`] traegt Tests und lokale
//! Entwicklung. Dazu kommen Audioformat-Erkennung und der
//! deterministische Blob-Schluessel.

pub mod blob_store;
pub mod error;
pub mod format;
pub mod schluessel;

pub use blob_store::{BlobMetadaten, BlobStore, InMemoryBlobStore, S3BlobStore, S3Config};
pub use error::{StorageError, StorageResult};
pub use format::AudioFormat;
pub use schluessel::blob_schluessel;
