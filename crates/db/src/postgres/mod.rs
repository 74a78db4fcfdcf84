//! PostgreSQL-Implementierung der Repositories

mod benutzer;
mod pool;
mod raeume;
mod sprachnachrichten;

pub use pool::PostgresDb;
