//! funkraum-db – Metadatenspeicher
//!
//! Dieses Crate stellt das Repository-Pattern bereit: die Traits in
//! [`repository`] entkoppeln die Geschaeftslogik von der konkreten
//! Datenbank, [`postgres`] liefert die PostgreSQL-Implementierung via sqlx.

pub mod error;
pub mod models;
pub mod postgres;
pub mod repository;

pub use error::{DbError, DbResult};
pub use postgres::PostgresDb;
pub use repository::{
    BenutzerRepository, DatabaseConfig, RaumRepository, SprachnachrichtRepository,
};
