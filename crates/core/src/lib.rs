//! funkraum-core – Gemeinsame Typen und Fehler
//!
//! Dieses Crate stellt die Newtype-IDs und die zentrale Fehlertaxonomie
//! bereit, die alle anderen Funkraum-Crates teilen. Es enthaelt bewusst
//! keine Logik und keine async-Abhaengigkeiten.

pub mod error;
pub mod types;

pub use error::{FunkraumError, Result};
pub use types::{NachrichtId, RaumId, UserId};
