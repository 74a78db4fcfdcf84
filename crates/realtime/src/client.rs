//! Client-Verbindung – eine Socket-Verbindung, zwei Pumpen
//!
//! Jede akzeptierte WebSocket-Verbindung bekommt einen [`Client`] und
//! zwei tokio-Tasks: die Lese-Pumpe (Frames vom Socket, Keepalive-
//! Deadline, Rate-Limit) und die Schreib-Pumpe (Sende-Queue zum Socket,
//! Ping-Ticker, Write-Deadline).
//!
//! ## Back-Pressure
//! Die Sende-Queue ist begrenzt und wird vom Hub nicht-blockierend
//! befuellt. Ist sie voll, gilt der Client als langsamer Konsument und
//! wird vom Hub ausgetragen – das ist die einzige unfreiwillige
//! Trennung aus Performance-Gruenden.
//!
//! ## Schliessen
//! Das Schliess-Signal laeuft ueber einen eigenen watch-Kanal, nicht
//! ueber die Sende-Queue: es muss auch dann ankommen wenn die Queue
//! randvoll ist.

use std::time::{Duration, Instant};

use axum::extract::ws::{close_code, CloseFrame, Message, WebSocket};
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::{mpsc, watch};
use uuid::Uuid;

use funkraum_core::{RaumId, UserId};

use crate::ereignis::{Ereignis, EreignisTyp};
use crate::error::RealtimeError;
use crate::hub::HubHandle;

// ---------------------------------------------------------------------------
// Konstanten
// ---------------------------------------------------------------------------

/// Kapazitaet der Sende-Queue pro Client (Frames)
pub const SENDE_QUEUE_GROESSE: usize = 256;

/// Deadline fuer einen einzelnen Socket-Read
pub const PONG_WAIT: Duration = Duration::from_secs(60);

/// Intervall der Protokoll-Pings (muss kleiner als `PONG_WAIT` sein)
pub const PING_PERIOD: Duration = Duration::from_secs(30);

/// Deadline fuer einen einzelnen Socket-Write
pub const WRITE_WAIT: Duration = Duration::from_secs(10);

/// Maximale Groesse eines eingehenden Frames
///
/// Wird beim Upgrade via `WebSocketUpgrade::max_message_size` gesetzt;
/// groessere Frames enden als Lesefehler.
pub const MAX_FRAME_BYTES: usize = 8 * 1024;

/// Mindestabstand zwischen eingehenden Anwendungsnachrichten
const NACHRICHTEN_ABSTAND: Duration = Duration::from_secs(1);

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

/// Ergebnis eines nicht-blockierenden Enqueues
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendeErgebnis {
    Eingereiht,
    /// Queue voll – Client ist ein langsamer Konsument
    Voll,
    /// Schreib-Pumpe bereits beendet
    Geschlossen,
}

/// Empfangsseite eines Clients: Frames plus Schliess-Signal
///
/// Gehoert der Schreib-Pumpe.
pub struct SendeEmpfaenger {
    pub frames: mpsc::Receiver<String>,
    pub schliessen: watch::Receiver<bool>,
}

/// Eine lebende Socket-Verbindung aus Sicht des Hubs
///
/// Zwischen Register und Unregister gehoert der Client exklusiv seinem
/// Hub. Die `verbindungs_id` unterscheidet zwei Sockets desselben
/// Benutzers.
#[derive(Debug, Clone)]
pub struct Client {
    pub verbindungs_id: Uuid,
    pub user_id: UserId,
    pub username: String,
    pub raum_id: RaumId,
    sender: mpsc::Sender<String>,
    schliessen_tx: std::sync::Arc<watch::Sender<bool>>,
}

impl Client {
    /// Erstellt einen Client samt Empfangsseite seiner Sende-Queue
    pub fn neu(user_id: UserId, username: String, raum_id: RaumId) -> (Self, SendeEmpfaenger) {
        let (sender, frames) = mpsc::channel(SENDE_QUEUE_GROESSE);
        let (schliessen_tx, schliessen) = watch::channel(false);
        (
            Self {
                verbindungs_id: Uuid::new_v4(),
                user_id,
                username,
                raum_id,
                sender,
                schliessen_tx: std::sync::Arc::new(schliessen_tx),
            },
            SendeEmpfaenger { frames, schliessen },
        )
    }

    /// Reiht einen Frame nicht-blockierend ein
    pub fn senden(&self, frame: String) -> SendeErgebnis {
        match self.sender.try_send(frame) {
            Ok(()) => SendeErgebnis::Eingereiht,
            Err(mpsc::error::TrySendError::Full(_)) => SendeErgebnis::Voll,
            Err(mpsc::error::TrySendError::Closed(_)) => SendeErgebnis::Geschlossen,
        }
    }

    /// Signalisiert der Schreib-Pumpe das saubere Ende
    ///
    /// Kommt auch bei randvoller Sende-Queue an; die Pumpe sendet noch
    /// einen Close-Frame und beendet sich.
    pub fn schliessen(&self) {
        let _ = self.schliessen_tx.send(true);
    }
}

// ---------------------------------------------------------------------------
// Rate-Limit
// ---------------------------------------------------------------------------

/// Begrenzung eingehender Anwendungsnachrichten auf 1 pro Sekunde
#[derive(Debug, Default)]
pub struct NachrichtenBremse {
    letzte: Option<Instant>,
}

impl NachrichtenBremse {
    pub fn neu() -> Self {
        Self::default()
    }

    /// Gibt true zurueck wenn die Nachricht verarbeitet werden darf
    pub fn erlaubt(&mut self) -> bool {
        let jetzt = Instant::now();
        match self.letzte {
            Some(vorher) if jetzt.duration_since(vorher) < NACHRICHTEN_ABSTAND => false,
            _ => {
                self.letzte = Some(jetzt);
                true
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Lese-Pumpe
// ---------------------------------------------------------------------------

/// Pumpt Frames vom Socket zum Hub bis zur Trennung
///
/// Jeder Read laeuft unter der `PONG_WAIT`-Deadline. Jeder Lesefehler
/// (auch Deadline-Ablauf) beendet die Pumpe; davor wird das Unregister
/// beim Hub angefordert.
pub(crate) async fn lese_pumpe(
    mut socket_rx: SplitStream<WebSocket>,
    client: Client,
    hub: HubHandle,
) {
    let mut bremse = NachrichtenBremse::neu();

    loop {
        let frame = match tokio::time::timeout(PONG_WAIT, socket_rx.next()).await {
            Err(_) => {
                tracing::warn!(
                    user_id = %client.user_id,
                    raum_id = %client.raum_id,
                    "Read-Deadline abgelaufen"
                );
                break;
            }
            Ok(None) => {
                tracing::debug!(user_id = %client.user_id, "Socket geschlossen");
                break;
            }
            Ok(Some(Err(e))) => {
                tracing::warn!(user_id = %client.user_id, fehler = %e, "Socket-Lesefehler");
                break;
            }
            Ok(Some(Ok(frame))) => frame,
        };

        match frame {
            Message::Text(text) => {
                eingehenden_frame_verarbeiten(&client, text.as_str(), &mut bremse);
            }
            Message::Close(_) => {
                tracing::debug!(
                    user_id = %client.user_id,
                    raum_id = %client.raum_id,
                    "Close-Frame empfangen"
                );
                break;
            }
            // Protokoll-Pings beantwortet axum selbst; Pongs zaehlen
            // allein dadurch als Aktivitaet dass der Read zurueckkam
            Message::Ping(_) | Message::Pong(_) => {}
            Message::Binary(_) => {
                fehler_einreihen(&client, "unsupported_frame", "binary frames are not supported");
            }
        }
    }

    hub.abmelden(client).await;
}

/// Dekodiert und verarbeitet einen eingehenden Text-Frame
fn eingehenden_frame_verarbeiten(client: &Client, text: &str, bremse: &mut NachrichtenBremse) {
    let ereignis = match Ereignis::dekodieren(text) {
        Ok(e) => e,
        Err(RealtimeError::UnbekannterTyp(typ)) => {
            tracing::debug!(user_id = %client.user_id, typ = %typ, "Unbekannter Ereignistyp");
            fehler_einreihen(
                client,
                "unknown_message_type",
                format!("unknown message type: {typ}"),
            );
            return;
        }
        Err(e) => {
            tracing::debug!(user_id = %client.user_id, fehler = %e, "Frame nicht dekodierbar");
            fehler_einreihen(client, "bad_payload", "payload is not a valid event");
            return;
        }
    };

    // Dekodiert wird immer, Seiteneffekte nur innerhalb des Rate-Limits
    if !bremse.erlaubt() {
        fehler_einreihen(client, "rate_limited", "at most one message per second");
        return;
    }

    match ereignis.typ {
        EreignisTyp::Ping => {
            if let Ok(frame) = Ereignis::pong().kodieren() {
                let _ = client.senden(frame);
            }
        }
        // Beobachtet, aber ohne Fanout (bewusst nicht spezifiziert)
        EreignisTyp::Typing | EreignisTyp::ReadReceipt => {
            tracing::debug!(
                user_id = %client.user_id,
                raum_id = %client.raum_id,
                typ = ereignis.typ.als_str(),
                "Eingehendes Ereignis ohne Seiteneffekt"
            );
        }
        anderes => {
            fehler_einreihen(
                client,
                "unknown_message_type",
                format!("unknown message type: {}", anderes.als_str()),
            );
        }
    }
}

/// Reiht ein error-Ereignis auf die eigene Sende-Queue
fn fehler_einreihen(client: &Client, code: &str, message: impl Into<String>) {
    if let Ok(frame) = Ereignis::fehler(code, message).kodieren() {
        let _ = client.senden(frame);
    }
}

// ---------------------------------------------------------------------------
// Schreib-Pumpe
// ---------------------------------------------------------------------------

/// Pumpt die Sende-Queue zum Socket und haelt die Verbindung am Leben
///
/// Beendet sich bei Write-Fehlern (die Lese-Pumpe folgt ueber den
/// Socket-Close), beim Schliess-Signal des Hubs und wenn die Queue
/// geschlossen wird. Das Schliess-Signal hat Vorrang vor wartenden
/// Frames: ein ausgetragener Client bekommt nichts mehr zugestellt.
pub(crate) async fn schreib_pumpe(
    mut socket_tx: SplitSink<WebSocket, Message>,
    mut empfaenger: SendeEmpfaenger,
    user_id: UserId,
    raum_id: RaumId,
) {
    let mut ticker = tokio::time::interval(PING_PERIOD);
    // Der erste Tick feuert sofort; verbrauchen, damit der Ping-Takt
    // erst nach `PING_PERIOD` beginnt
    ticker.tick().await;

    loop {
        tokio::select! {
            biased;

            ergebnis = empfaenger.schliessen.changed() => {
                let beendet = match ergebnis {
                    Ok(()) => *empfaenger.schliessen.borrow(),
                    // Alle Client-Handles weg: ebenfalls beenden
                    Err(_) => true,
                };
                if beendet {
                    tracing::debug!(
                        user_id = %user_id,
                        raum_id = %raum_id,
                        "Schliess-Signal, Verbindung wird beendet"
                    );
                    close_frame_senden(&mut socket_tx).await;
                    break;
                }
            }

            frame = empfaenger.frames.recv() => {
                match frame {
                    Some(text) => {
                        let schreiben = socket_tx.send(Message::Text(text.into()));
                        match tokio::time::timeout(WRITE_WAIT, schreiben).await {
                            Ok(Ok(())) => {}
                            Ok(Err(e)) => {
                                tracing::warn!(user_id = %user_id, fehler = %e, "Socket-Schreibfehler");
                                break;
                            }
                            Err(_) => {
                                tracing::warn!(user_id = %user_id, "Write-Deadline abgelaufen");
                                break;
                            }
                        }
                    }
                    None => {
                        close_frame_senden(&mut socket_tx).await;
                        break;
                    }
                }
            }

            _ = ticker.tick() => {
                let ping = socket_tx.send(Message::Ping(Vec::new().into()));
                match tokio::time::timeout(WRITE_WAIT, ping).await {
                    Ok(Ok(())) => {}
                    Ok(Err(e)) => {
                        tracing::warn!(user_id = %user_id, fehler = %e, "Ping fehlgeschlagen");
                        break;
                    }
                    Err(_) => {
                        tracing::warn!(user_id = %user_id, "Ping-Deadline abgelaufen");
                        break;
                    }
                }
            }
        }
    }

    tracing::debug!(user_id = %user_id, raum_id = %raum_id, "Schreib-Pumpe beendet");
}

/// Normal-Closure-Frame, best-effort unter der Write-Deadline
async fn close_frame_senden(socket_tx: &mut SplitSink<WebSocket, Message>) {
    let close = Message::Close(Some(CloseFrame {
        code: close_code::NORMAL,
        reason: "hub closed".into(),
    }));
    let _ = tokio::time::timeout(WRITE_WAIT, socket_tx.send(close)).await;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_client() -> (Client, SendeEmpfaenger) {
        Client::neu(UserId::new(), "tester".into(), RaumId::new())
    }

    #[tokio::test]
    async fn senden_reiht_frame_ein() {
        let (client, mut rx) = test_client();

        assert_eq!(client.senden("{}".into()), SendeErgebnis::Eingereiht);
        assert_eq!(rx.frames.recv().await, Some("{}".to_string()));
    }

    #[tokio::test]
    async fn volle_queue_meldet_voll() {
        let (client, _rx) = test_client();

        for i in 0..SENDE_QUEUE_GROESSE {
            assert_eq!(
                client.senden(format!("frame-{i}")),
                SendeErgebnis::Eingereiht
            );
        }
        // Das (Kapazitaet+1)-te Enqueue schlaegt fehl
        assert_eq!(client.senden("zu viel".into()), SendeErgebnis::Voll);
    }

    #[tokio::test]
    async fn geschlossene_queue_meldet_geschlossen() {
        let (client, rx) = test_client();
        drop(rx);
        assert_eq!(client.senden("{}".into()), SendeErgebnis::Geschlossen);
    }

    #[tokio::test]
    async fn schliessen_kommt_trotz_voller_queue_an() {
        let (client, mut rx) = test_client();

        // Queue komplett fuellen, dann schliessen
        for i in 0..SENDE_QUEUE_GROESSE {
            client.senden(format!("frame-{i}"));
        }
        client.schliessen();

        rx.schliessen.changed().await.unwrap();
        assert!(*rx.schliessen.borrow());
    }

    #[test]
    fn bremse_erlaubt_erste_nachricht() {
        let mut bremse = NachrichtenBremse::neu();
        assert!(bremse.erlaubt());
        // Direkt danach ist Schluss
        assert!(!bremse.erlaubt());
        assert!(!bremse.erlaubt());
    }

    #[test]
    fn verbindungs_ids_eindeutig() {
        let (a, _ra) = test_client();
        let (b, _rb) = test_client();
        assert_ne!(a.verbindungs_id, b.verbindungs_id);
    }
}
