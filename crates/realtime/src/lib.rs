//! funkraum-realtime – Echtzeit-Fanout-Subsystem
//!
//! Das Herzstueck des Servers: pro Raum ein Hub als Single-Writer-Actor,
//! pro Socket zwei Pumpen (Lesen, Schreiben), darueber ein Manager der
//! Hubs lazy anlegt, externe Broadcasts routet und leere Hubs einsammelt.
//!
//! ## Eigentum
//! Jeder [`client::Client`] gehoert zwischen Register und Unregister
//! exklusiv seinem [`hub::RaumHub`]; die Hubs gehoeren dem
//! [`manager::VerbindungsManager`]. Clients schauen nie in den
//! Hub-Zustand – alle Signale laufen ueber begrenzte Kanaele.

pub mod client;
pub mod ereignis;
pub mod error;
pub mod hub;
pub mod manager;

pub use client::Client;
pub use ereignis::{Ereignis, EreignisTyp};
pub use error::RealtimeError;
pub use hub::{HubSchnappschuss, HubZustand, RaumHub};
pub use manager::VerbindungsManager;
