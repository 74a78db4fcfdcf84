//! Fehlertypen fuer das Datenbank-Crate

use thiserror::Error;

/// Result-Alias fuer alle Repository-Operationen
pub type DbResult<T> = Result<T, DbError>;

/// Datenbank-Fehlertypen
#[derive(Debug, Error)]
pub enum DbError {
    #[error("Datensatz nicht gefunden: {0}")]
    NichtGefunden(String),

    #[error("Eindeutigkeitsverletzung: {0}")]
    Eindeutigkeit(String),

    #[error("Zeitlimit ueberschritten: {0}")]
    Zeitlimit(String),

    #[error("SQLx-Fehler: {0}")]
    Sqlx(#[from] sqlx::Error),

    #[error("Migration-Fehler: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("Interner DB-Fehler: {0}")]
    Intern(String),
}

impl DbError {
    pub fn nicht_gefunden(msg: impl Into<String>) -> Self {
        Self::NichtGefunden(msg.into())
    }

    pub fn intern(msg: impl Into<String>) -> Self {
        Self::Intern(msg.into())
    }

    /// Gibt true zurueck wenn es sich um einen Eindeutigkeitsfehler handelt
    pub fn ist_eindeutigkeit(&self) -> bool {
        match self {
            Self::Eindeutigkeit(_) => true,
            Self::Sqlx(sqlx::Error::Database(db)) => db.is_unique_violation(),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nicht_gefunden_anzeige() {
        let e = DbError::nicht_gefunden("Sprachnachricht abc");
        assert_eq!(e.to_string(), "Datensatz nicht gefunden: Sprachnachricht abc");
    }

    #[test]
    fn eindeutigkeit_direkt_erkannt() {
        assert!(DbError::Eindeutigkeit("email".into()).ist_eindeutigkeit());
        assert!(!DbError::intern("x").ist_eindeutigkeit());
    }
}
