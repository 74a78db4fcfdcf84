//! Ereignis-Taxonomie und Wire-Codec
//!
//! Jedes Ereignis wandert als selbstbeschreibender Text-Frame ueber den
//! Socket: `{"type": <string>, "timestamp": <epoch-sekunden>, "data": ...}`.
//! `data` ist typspezifisch und entfaellt wo es nichts zu sagen gibt.
//!
//! Unbekannte Typen auf dem Eingangsweg werden als Fehler gemeldet ohne
//! die Verbindung zu schliessen; Kodierfehler auf dem Ausgangsweg
//! verwerfen nur das betroffene Ereignis.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use funkraum_core::{NachrichtId, RaumId, UserId};

use crate::error::RealtimeError;

// ---------------------------------------------------------------------------
// Typ-Menge
// ---------------------------------------------------------------------------

/// Geschlossene Menge der Ereignistypen
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EreignisTyp {
    // Ausgehend
    ConnectionAck,
    UserJoined,
    UserLeft,
    NewVoiceMessage,
    Error,
    Pong,
    // Nur eingehend
    Ping,
    Typing,
    ReadReceipt,
}

impl EreignisTyp {
    /// Wire-Name des Typs
    pub fn als_str(&self) -> &'static str {
        match self {
            Self::ConnectionAck => "connection_ack",
            Self::UserJoined => "user_joined",
            Self::UserLeft => "user_left",
            Self::NewVoiceMessage => "new_voice_message",
            Self::Error => "error",
            Self::Pong => "pong",
            Self::Ping => "ping",
            Self::Typing => "typing",
            Self::ReadReceipt => "read_receipt",
        }
    }

    /// Parst einen Wire-Namen; None fuer unbekannte Typen
    pub fn aus_wire(s: &str) -> Option<Self> {
        match s {
            "connection_ack" => Some(Self::ConnectionAck),
            "user_joined" => Some(Self::UserJoined),
            "user_left" => Some(Self::UserLeft),
            "new_voice_message" => Some(Self::NewVoiceMessage),
            "error" => Some(Self::Error),
            "pong" => Some(Self::Pong),
            "ping" => Some(Self::Ping),
            "typing" => Some(Self::Typing),
            "read_receipt" => Some(Self::ReadReceipt),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Daten-Formen
// ---------------------------------------------------------------------------

/// Daten eines `connection_ack`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionAckDaten {
    pub room_id: RaumId,
    pub user_id: UserId,
}

/// Daten eines `user_joined`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserJoinedDaten {
    pub user_id: UserId,
}

/// Daten eines `user_left`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserLeftDaten {
    pub user_id: UserId,
}

/// Daten eines `new_voice_message`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NeueSprachnachrichtDaten {
    pub message_id: NachrichtId,
    pub sender_id: UserId,
    pub duration: i32,
    pub url: String,
}

/// Daten eines `error`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FehlerDaten {
    pub code: String,
    pub message: String,
}

// ---------------------------------------------------------------------------
// Ereignis
// ---------------------------------------------------------------------------

/// Ein Ereignis auf dem Draht
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Ereignis {
    #[serde(rename = "type")]
    pub typ: EreignisTyp,
    /// Epoch-Sekunden, gesetzt beim Versand
    pub timestamp: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

/// Rohform zum Dekodieren: `type` bleibt String damit unbekannte Typen
/// von kaputtem JSON unterscheidbar sind
#[derive(Debug, Deserialize)]
struct RohEreignis {
    #[serde(rename = "type")]
    typ: String,
    #[serde(default)]
    timestamp: i64,
    #[serde(default)]
    data: Option<Value>,
}

impl Ereignis {
    /// Baut ein Ereignis mit Zeitstempel jetzt
    fn neu(typ: EreignisTyp, data: Option<Value>) -> Self {
        Self {
            typ,
            timestamp: Utc::now().timestamp(),
            data,
        }
    }

    /// `connection_ack` – erstes Ereignis jedes neuen Clients
    pub fn connection_ack(room_id: RaumId, user_id: UserId) -> Self {
        let daten = ConnectionAckDaten { room_id, user_id };
        Self::neu(
            EreignisTyp::ConnectionAck,
            serde_json::to_value(daten).ok(),
        )
    }

    /// `user_joined`
    pub fn user_joined(user_id: UserId) -> Self {
        Self::neu(
            EreignisTyp::UserJoined,
            serde_json::to_value(UserJoinedDaten { user_id }).ok(),
        )
    }

    /// `user_left`
    pub fn user_left(user_id: UserId) -> Self {
        Self::neu(
            EreignisTyp::UserLeft,
            serde_json::to_value(UserLeftDaten { user_id }).ok(),
        )
    }

    /// `new_voice_message`
    pub fn neue_sprachnachricht(
        message_id: NachrichtId,
        sender_id: UserId,
        duration: i32,
        url: String,
    ) -> Self {
        let daten = NeueSprachnachrichtDaten {
            message_id,
            sender_id,
            duration,
            url,
        };
        Self::neu(
            EreignisTyp::NewVoiceMessage,
            serde_json::to_value(daten).ok(),
        )
    }

    /// `error`
    pub fn fehler(code: impl Into<String>, message: impl Into<String>) -> Self {
        let daten = FehlerDaten {
            code: code.into(),
            message: message.into(),
        };
        Self::neu(EreignisTyp::Error, serde_json::to_value(daten).ok())
    }

    /// `pong` – Antwort auf ein eingehendes Anwendungs-`ping`
    pub fn pong() -> Self {
        Self::neu(EreignisTyp::Pong, None)
    }

    /// Setzt den Zeitstempel auf jetzt (beim Versand durch den Hub)
    pub fn zeitstempel_setzen(&mut self) {
        self.timestamp = Utc::now().timestamp();
    }

    /// Serialisiert das Ereignis zum Text-Frame
    pub fn kodieren(&self) -> Result<String, RealtimeError> {
        Ok(serde_json::to_string(self)?)
    }

    /// Dekodiert einen eingehenden Text-Frame
    ///
    /// Unbekannte `type`-Werte ergeben [`RealtimeError::UnbekannterTyp`],
    /// kaputtes JSON [`RealtimeError::Dekodierung`].
    pub fn dekodieren(frame: &str) -> Result<Self, RealtimeError> {
        let roh: RohEreignis = serde_json::from_str(frame)?;

        let typ = EreignisTyp::aus_wire(&roh.typ)
            .ok_or_else(|| RealtimeError::UnbekannterTyp(roh.typ.clone()))?;

        Ok(Self {
            typ,
            timestamp: roh.timestamp,
            data: roh.data,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kodieren_dekodieren_ist_identitaet() {
        // Rundreise fuer die komplette geschlossene Typ-Menge
        let ereignisse = vec![
            Ereignis::connection_ack(RaumId::new(), UserId::new()),
            Ereignis::user_joined(UserId::new()),
            Ereignis::user_left(UserId::new()),
            Ereignis::neue_sprachnachricht(NachrichtId::new(), UserId::new(), 3, "https://example.com/x".into()),
            Ereignis::fehler("unknown_message_type", "unbekannter Typ"),
            Ereignis::pong(),
            Ereignis { typ: EreignisTyp::Ping, timestamp: 12345, data: None },
            Ereignis { typ: EreignisTyp::Typing, timestamp: 12345, data: None },
            Ereignis { typ: EreignisTyp::ReadReceipt, timestamp: 12345, data: None },
        ];

        for original in ereignisse {
            let frame = original.kodieren().unwrap();
            let dekodiert = Ereignis::dekodieren(&frame).unwrap();
            assert_eq!(dekodiert.typ, original.typ);
            assert_eq!(dekodiert.timestamp, original.timestamp);
            assert_eq!(dekodiert.data, original.data);
        }
    }

    #[test]
    fn wire_namen_stabil() {
        assert_eq!(EreignisTyp::NewVoiceMessage.als_str(), "new_voice_message");
        assert_eq!(EreignisTyp::ConnectionAck.als_str(), "connection_ack");
        assert_eq!(EreignisTyp::ReadReceipt.als_str(), "read_receipt");

        for typ in [
            EreignisTyp::ConnectionAck,
            EreignisTyp::UserJoined,
            EreignisTyp::UserLeft,
            EreignisTyp::NewVoiceMessage,
            EreignisTyp::Error,
            EreignisTyp::Pong,
            EreignisTyp::Ping,
            EreignisTyp::Typing,
            EreignisTyp::ReadReceipt,
        ] {
            assert_eq!(EreignisTyp::aus_wire(typ.als_str()), Some(typ));
        }
    }

    #[test]
    fn unbekannter_typ_schliesst_nicht() {
        let frame = r#"{"type": "selfie", "timestamp": 1, "data": {}}"#;
        match Ereignis::dekodieren(frame) {
            Err(RealtimeError::UnbekannterTyp(t)) => assert_eq!(t, "selfie"),
            anderes => panic!("UnbekannterTyp erwartet, war {anderes:?}"),
        }
    }

    #[test]
    fn kaputtes_json_ist_dekodierfehler() {
        assert!(matches!(
            Ereignis::dekodieren("{nicht json"),
            Err(RealtimeError::Dekodierung(_))
        ));
    }

    #[test]
    fn pong_ohne_data_feld() {
        let frame = Ereignis::pong().kodieren().unwrap();
        assert!(!frame.contains("\"data\""));
    }

    #[test]
    fn ping_ohne_timestamp_dekodierbar() {
        // Clients duerfen den Zeitstempel weglassen
        let ereignis = Ereignis::dekodieren(r#"{"type": "ping"}"#).unwrap();
        assert_eq!(ereignis.typ, EreignisTyp::Ping);
        assert_eq!(ereignis.timestamp, 0);
    }

    #[test]
    fn sprachnachricht_daten_form() {
        let mid = NachrichtId::new();
        let uid = UserId::new();
        let frame = Ereignis::neue_sprachnachricht(mid, uid, 7, "u".into())
            .kodieren()
            .unwrap();

        let wert: serde_json::Value = serde_json::from_str(&frame).unwrap();
        assert_eq!(wert["type"], "new_voice_message");
        assert_eq!(wert["data"]["message_id"], mid.inner().to_string());
        assert_eq!(wert["data"]["sender_id"], uid.inner().to_string());
        assert_eq!(wert["data"]["duration"], 7);
        assert_eq!(wert["data"]["url"], "u");
        assert!(wert["timestamp"].is_i64());
    }
}
