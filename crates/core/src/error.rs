//! Fehlertaxonomie fuer Funkraum
//!
//! Zentraler Fehler-Enum nach Fehlerart, nicht nach Subsystem. Die
//! HTTP-Schicht bildet jede Art auf genau einen Statuscode ab; die
//! Untermodule definieren eigene Fehler und konvertieren an der Grenze.

use thiserror::Error;

/// Globaler Result-Alias fuer Funkraum
pub type Result<T> = std::result::Result<T, FunkraumError>;

/// Alle Fehlerarten im Funkraum-System
#[derive(Debug, Error)]
pub enum FunkraumError {
    /// Fehlerhafte Eingabe, lokal behandelbar (HTTP 400)
    #[error("{grund}")]
    Validierung {
        grund: String,
        /// Maschinenlesbare Details (Feld -> Problem)
        details: Option<serde_json::Value>,
    },

    /// Fehlende oder ungueltige Authentifizierung (HTTP 401)
    #[error("{0}")]
    Authentifizierung(String),

    /// Authentifiziert, aber nicht berechtigt (HTTP 403)
    #[error("{0}")]
    ZugriffVerweigert(String),

    /// Entitaet nicht vorhanden (HTTP 404)
    #[error("{0}")]
    NichtGefunden(String),

    /// Eindeutigkeitsverletzung, z.B. E-Mail vergeben (HTTP 409)
    #[error("{0}")]
    Konflikt(String),

    /// Transiente Infrastruktur: Transport, Timeout, Contention (HTTP 500)
    ///
    /// Wird innerhalb des Requests nie wiederholt.
    #[error("Infrastrukturfehler: {0}")]
    Infrastruktur(String),

    /// Invariantenverletzung (HTTP 500, mit Korrelations-ID geloggt)
    #[error("Interner Fehler: {0}")]
    Intern(String),
}

impl FunkraumError {
    /// Validierungsfehler ohne Details
    pub fn validierung(grund: impl Into<String>) -> Self {
        Self::Validierung {
            grund: grund.into(),
            details: None,
        }
    }

    /// Validierungsfehler mit maschinenlesbaren Details
    pub fn validierung_mit_details(
        grund: impl Into<String>,
        details: serde_json::Value,
    ) -> Self {
        Self::Validierung {
            grund: grund.into(),
            details: Some(details),
        }
    }

    pub fn authentifizierung(grund: impl Into<String>) -> Self {
        Self::Authentifizierung(grund.into())
    }

    pub fn zugriff_verweigert(grund: impl Into<String>) -> Self {
        Self::ZugriffVerweigert(grund.into())
    }

    pub fn nicht_gefunden(was: impl Into<String>) -> Self {
        Self::NichtGefunden(was.into())
    }

    pub fn konflikt(grund: impl Into<String>) -> Self {
        Self::Konflikt(grund.into())
    }

    pub fn infrastruktur(grund: impl Into<String>) -> Self {
        Self::Infrastruktur(grund.into())
    }

    pub fn intern(grund: impl Into<String>) -> Self {
        Self::Intern(grund.into())
    }

    /// Gibt true zurueck wenn der Fehler serverseitig ist (>= 500)
    pub fn ist_serverfehler(&self) -> bool {
        matches!(self, Self::Infrastruktur(_) | Self::Intern(_))
    }
}
