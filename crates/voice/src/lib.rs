//! funkraum-voice – Sprachnachricht-Pipeline
//!
//! Koordiniert die beiden Speichersysteme (Metadaten in Postgres, Audio
//! im Blob-Store) mit kompensierendem Aufraeumen bei Teilfehlern und
//! stoesst den Echtzeit-Fanout an.

pub mod service;
pub mod types;

pub use service::{EreignisVerteiler, SprachnachrichtService};
pub use types::{NeuerUpload, SprachnachrichtMitUrl};
