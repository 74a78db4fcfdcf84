//! Raum-Hub – Single-Writer-Actor pro aktivem Raum
//!
//! Genau ein Task fuehrt die Event-Schleife aus und ist der einzige
//! Mutator der Client-Menge. Eingaben kommen ueber vier Kanaele
//! (Register, Unregister, Broadcast, Shutdown) plus einen
//! Health-Check-Ticker.
//!
//! ## Ordnung
//! Weil alle Broadcasts auf dem einen Hub-Task laufen, sehen alle noch
//! verbundenen Clients dieselbe Reihenfolge – eine strikte Totalordnung
//! pro Hub.
//!
//! ## Back-Pressure
//! Einreihen beim Client ist nie blockierend: eine volle Sende-Queue
//! markiert den Client als langsamen Konsumenten und er wird noch im
//! selben Durchlauf ausgetragen. Auch der Broadcast-Eingang ist
//! begrenzt; externe Produzenten blockieren nie (voll = zaehlen +
//! verwerfen).
//!
//! ## Zustaende
//! `Idle -> Running -> Draining -> Stopped`

use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, AtomicU64, AtomicU8, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::{mpsc, watch};
use uuid::Uuid;

use funkraum_core::RaumId;

use crate::client::{Client, SendeErgebnis};
use crate::ereignis::Ereignis;

// ---------------------------------------------------------------------------
// Konstanten
// ---------------------------------------------------------------------------

/// Kapazitaet des Broadcast-Eingangs
pub const BROADCAST_QUEUE_GROESSE: usize = 256;

/// Kapazitaet der Register-/Unregister-Eingaenge
const LEBENSZYKLUS_QUEUE_GROESSE: usize = 64;

/// Intervall des Health-Check-Tickers
const HEALTH_CHECK_INTERVALL: Duration = Duration::from_secs(30);

/// Leerlaufdauer ab der ein leerer Hub als einsammelbar gilt
pub const LEERLAUF_SCHWELLE: Duration = Duration::from_secs(300);

// ---------------------------------------------------------------------------
// Zustand & Metriken
// ---------------------------------------------------------------------------

/// Lebenszyklus-Zustand eines Hubs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HubZustand {
    Idle,
    Running,
    Draining,
    Stopped,
}

impl HubZustand {
    fn als_u8(self) -> u8 {
        match self {
            Self::Idle => 0,
            Self::Running => 1,
            Self::Draining => 2,
            Self::Stopped => 3,
        }
    }

    fn aus_u8(wert: u8) -> Self {
        match wert {
            1 => Self::Running,
            2 => Self::Draining,
            3 => Self::Stopped,
            _ => Self::Idle,
        }
    }
}

/// Vom Hub-Task gepflegte, von aussen lesbare Zaehler
///
/// Der Hub-Task ist der einzige Schreiber; Manager und Metriken lesen
/// lock-frei ueber den Arc.
#[derive(Debug)]
struct HubStatus {
    verbunden: AtomicUsize,
    gesendet: AtomicU64,
    verworfen: AtomicU64,
    letzte_aktivitaet: AtomicI64,
    zustand: AtomicU8,
}

impl HubStatus {
    fn neu() -> Self {
        Self {
            verbunden: AtomicUsize::new(0),
            gesendet: AtomicU64::new(0),
            verworfen: AtomicU64::new(0),
            letzte_aktivitaet: AtomicI64::new(Utc::now().timestamp()),
            zustand: AtomicU8::new(HubZustand::Idle.als_u8()),
        }
    }
}

/// Momentaufnahme der Hub-Zaehler
#[derive(Debug, Clone, Copy)]
pub struct HubSchnappschuss {
    pub verbunden: usize,
    pub gesendet: u64,
    pub verworfen: u64,
    pub zustand: HubZustand,
    /// Sekunden seit der letzten Aktivitaet (Register/Unregister/Broadcast)
    pub leerlauf_sek: i64,
}

// ---------------------------------------------------------------------------
// Handle
// ---------------------------------------------------------------------------

/// Clonbarer Zugriff auf einen laufenden Hub
#[derive(Debug, Clone)]
pub struct HubHandle {
    pub raum_id: RaumId,
    register_tx: mpsc::Sender<Client>,
    unregister_tx: mpsc::Sender<Client>,
    broadcast_tx: mpsc::Sender<Ereignis>,
    shutdown_tx: Arc<watch::Sender<bool>>,
    status: Arc<HubStatus>,
}

impl HubHandle {
    /// Meldet einen Client beim Hub an
    pub async fn anmelden(&self, client: Client) {
        if self.register_tx.send(client).await.is_err() {
            tracing::debug!(raum_id = %self.raum_id, "Anmelden bei gestopptem Hub");
        }
    }

    /// Fordert das Austragen eines Clients an (idempotent)
    pub async fn abmelden(&self, client: Client) {
        if self.unregister_tx.send(client).await.is_err() {
            tracing::debug!(raum_id = %self.raum_id, "Abmelden bei gestopptem Hub");
        }
    }

    /// Reiht ein Ereignis nicht-blockierend in den Broadcast-Eingang
    ///
    /// Produzenten (insbesondere die Upload-Pipeline) werden nie an die
    /// Zustell-Latenz gekoppelt: ist der Eingang voll, wird gezaehlt
    /// und verworfen.
    pub fn senden(&self, ereignis: Ereignis) -> bool {
        match self.broadcast_tx.try_send(ereignis) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(_)) => {
                self.status.verworfen.fetch_add(1, Ordering::Relaxed);
                tracing::warn!(raum_id = %self.raum_id, "Broadcast-Eingang voll, Ereignis verworfen");
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                tracing::debug!(raum_id = %self.raum_id, "Broadcast an gestoppten Hub");
                false
            }
        }
    }

    /// Signalisiert dem Hub das Herunterfahren
    pub fn herunterfahren(&self) {
        let _ = self.shutdown_tx.send(true);
    }

    /// Momentaufnahme der Zaehler
    pub fn schnappschuss(&self) -> HubSchnappschuss {
        HubSchnappschuss {
            verbunden: self.status.verbunden.load(Ordering::Relaxed),
            gesendet: self.status.gesendet.load(Ordering::Relaxed),
            verworfen: self.status.verworfen.load(Ordering::Relaxed),
            zustand: HubZustand::aus_u8(self.status.zustand.load(Ordering::Relaxed)),
            leerlauf_sek: Utc::now().timestamp()
                - self.status.letzte_aktivitaet.load(Ordering::Relaxed),
        }
    }
}

// ---------------------------------------------------------------------------
// Hub
// ---------------------------------------------------------------------------

/// Der Hub eines Raums: Event-Schleife und Client-Menge
pub struct RaumHub {
    raum_id: RaumId,
    clients: HashMap<Uuid, Client>,
    register_rx: mpsc::Receiver<Client>,
    unregister_rx: mpsc::Receiver<Client>,
    broadcast_rx: mpsc::Receiver<Ereignis>,
    shutdown_rx: watch::Receiver<bool>,
    status: Arc<HubStatus>,
}

impl RaumHub {
    /// Erstellt Hub und Handle; die Schleife startet erst mit [`RaumHub::laufen`]
    pub fn neu(raum_id: RaumId) -> (HubHandle, RaumHub) {
        let (register_tx, register_rx) = mpsc::channel(LEBENSZYKLUS_QUEUE_GROESSE);
        let (unregister_tx, unregister_rx) = mpsc::channel(LEBENSZYKLUS_QUEUE_GROESSE);
        let (broadcast_tx, broadcast_rx) = mpsc::channel(BROADCAST_QUEUE_GROESSE);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let status = Arc::new(HubStatus::neu());

        let handle = HubHandle {
            raum_id,
            register_tx,
            unregister_tx,
            broadcast_tx,
            shutdown_tx: Arc::new(shutdown_tx),
            status: Arc::clone(&status),
        };

        let hub = RaumHub {
            raum_id,
            clients: HashMap::new(),
            register_rx,
            unregister_rx,
            broadcast_rx,
            shutdown_rx,
            status,
        };

        (handle, hub)
    }

    /// Die Event-Schleife; laeuft bis zum Shutdown-Signal
    pub async fn laufen(mut self) {
        tracing::debug!(raum_id = %self.raum_id, "Hub gestartet");

        let mut ticker = tokio::time::interval(HEALTH_CHECK_INTERVALL);
        ticker.tick().await;

        loop {
            tokio::select! {
                Some(client) = self.register_rx.recv() => {
                    self.registrieren(client);
                }

                Some(client) = self.unregister_rx.recv() => {
                    self.austragen(client.verbindungs_id);
                }

                Some(ereignis) = self.broadcast_rx.recv() => {
                    self.verteilen(ereignis);
                }

                _ = ticker.tick() => {
                    self.gesundheit_pruefen();
                }

                ergebnis = self.shutdown_rx.changed() => {
                    match ergebnis {
                        Ok(()) if !*self.shutdown_rx.borrow() => continue,
                        // Signal oder Handle weg: in beiden Faellen beenden
                        _ => break,
                    }
                }
            }
        }

        self.entleeren();
    }

    /// Nimmt einen Client in die Menge auf
    ///
    /// Reihenfolge-Garantie: das `connection_ack` wird direkt auf die
    /// Queue des Clients gelegt, bevor irgendein weiteres Ereignis
    /// diesen Client erreichen kann.
    fn registrieren(&mut self, client: Client) {
        if self.clients.contains_key(&client.verbindungs_id) {
            // Doppeltes Register ist ein No-op
            return;
        }

        self.zustand_setzen(HubZustand::Running);
        self.aktivitaet_vermerken();

        let ack = Ereignis::connection_ack(self.raum_id, client.user_id);
        let ack_zugestellt = match ack.kodieren() {
            Ok(frame) => match client.senden(frame) {
                SendeErgebnis::Eingereiht => {
                    self.status.gesendet.fetch_add(1, Ordering::Relaxed);
                    true
                }
                SendeErgebnis::Voll => {
                    self.status.verworfen.fetch_add(1, Ordering::Relaxed);
                    false
                }
                SendeErgebnis::Geschlossen => false,
            },
            Err(e) => {
                // Serverseitiger Kodierfehler: Ereignis verwerfen, Client behalten
                tracing::error!(raum_id = %self.raum_id, fehler = %e, "connection_ack nicht kodierbar");
                true
            }
        };

        let user_id = client.user_id;
        let verbindungs_id = client.verbindungs_id;
        self.clients.insert(verbindungs_id, client);
        self.status
            .verbunden
            .store(self.clients.len(), Ordering::Relaxed);

        tracing::debug!(
            raum_id = %self.raum_id,
            user_id = %user_id,
            verbunden = self.clients.len(),
            "Client registriert"
        );

        if !ack_zugestellt {
            // Schon beim Ack nicht erreichbar: direkt wieder austragen
            self.austragen(verbindungs_id);
            return;
        }

        self.verteilen(Ereignis::user_joined(user_id));
    }

    /// Traegt einen Client aus und meldet `user_left`
    ///
    /// Idempotent; verarbeitet Folge-Evictions (das `user_left` kann
    /// weitere volle Queues aufdecken) ueber eine Arbeitsliste statt
    /// Rekursion.
    fn austragen(&mut self, verbindungs_id: Uuid) {
        let mut arbeitsliste = vec![verbindungs_id];

        while let Some(id) = arbeitsliste.pop() {
            let Some(client) = self.clients.remove(&id) else {
                continue;
            };

            self.aktivitaet_vermerken();
            client.schliessen();
            self.status
                .verbunden
                .store(self.clients.len(), Ordering::Relaxed);

            tracing::debug!(
                raum_id = %self.raum_id,
                user_id = %client.user_id,
                verbunden = self.clients.len(),
                "Client ausgetragen"
            );

            let weitere = self.an_alle_senden(Ereignis::user_left(client.user_id));
            arbeitsliste.extend(weitere);
        }
    }

    /// Verarbeitet ein Broadcast-Ereignis inklusive Folge-Evictions
    fn verteilen(&mut self, ereignis: Ereignis) {
        self.aktivitaet_vermerken();
        let langsame = self.an_alle_senden(ereignis);
        for id in langsame {
            self.austragen(id);
        }
    }

    /// Serialisiert einmal und reiht bei allen Clients ein
    ///
    /// Gibt die Verbindungs-IDs der Clients zurueck deren Queue voll
    /// oder geschlossen war; die Schleife blockiert nie.
    fn an_alle_senden(&mut self, mut ereignis: Ereignis) -> Vec<Uuid> {
        ereignis.zeitstempel_setzen();

        let frame = match ereignis.kodieren() {
            Ok(frame) => frame,
            Err(e) => {
                tracing::error!(
                    raum_id = %self.raum_id,
                    typ = ereignis.typ.als_str(),
                    fehler = %e,
                    "Ereignis nicht kodierbar, wird verworfen"
                );
                return Vec::new();
            }
        };

        let mut langsame = Vec::new();

        for (id, client) in &self.clients {
            match client.senden(frame.clone()) {
                SendeErgebnis::Eingereiht => {
                    self.status.gesendet.fetch_add(1, Ordering::Relaxed);
                }
                SendeErgebnis::Voll => {
                    self.status.verworfen.fetch_add(1, Ordering::Relaxed);
                    tracing::warn!(
                        raum_id = %self.raum_id,
                        user_id = %client.user_id,
                        "Sende-Queue voll, langsamer Konsument wird getrennt"
                    );
                    langsame.push(*id);
                }
                SendeErgebnis::Geschlossen => {
                    langsame.push(*id);
                }
            }
        }

        langsame
    }

    /// Health-Check: leere Hubs im Leerlauf melden
    fn gesundheit_pruefen(&self) {
        if !self.clients.is_empty() {
            return;
        }

        let leerlauf =
            Utc::now().timestamp() - self.status.letzte_aktivitaet.load(Ordering::Relaxed);
        if leerlauf >= LEERLAUF_SCHWELLE.as_secs() as i64 {
            tracing::debug!(
                raum_id = %self.raum_id,
                leerlauf_sek = leerlauf,
                "Hub im Leerlauf, kann eingesammelt werden"
            );
        }
    }

    /// Draining: alle Queues schliessen, Menge leeren, stoppen
    fn entleeren(&mut self) {
        self.zustand_setzen(HubZustand::Draining);

        for (_, client) in self.clients.drain() {
            client.schliessen();
        }
        self.status.verbunden.store(0, Ordering::Relaxed);

        self.register_rx.close();
        self.unregister_rx.close();
        self.broadcast_rx.close();

        self.zustand_setzen(HubZustand::Stopped);
        tracing::debug!(raum_id = %self.raum_id, "Hub gestoppt");
    }

    fn zustand_setzen(&self, zustand: HubZustand) {
        self.status
            .zustand
            .store(zustand.als_u8(), Ordering::Relaxed);
    }

    fn aktivitaet_vermerken(&self) {
        self.status
            .letzte_aktivitaet
            .store(Utc::now().timestamp(), Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::{SendeEmpfaenger, SENDE_QUEUE_GROESSE};
    use crate::ereignis::EreignisTyp;
    use funkraum_core::UserId;

    fn test_client(raum_id: RaumId) -> (Client, SendeEmpfaenger) {
        Client::neu(UserId::new(), "tester".into(), raum_id)
    }

    async fn naechstes_ereignis(rx: &mut SendeEmpfaenger) -> Ereignis {
        match rx.frames.recv().await {
            Some(frame) => Ereignis::dekodieren(&frame).unwrap(),
            None => panic!("Frame erwartet, Queue war geschlossen"),
        }
    }

    /// Wartet bis das Schliess-Signal des Clients gesetzt ist
    async fn auf_schliessen_warten(rx: &mut SendeEmpfaenger) {
        loop {
            if *rx.schliessen.borrow() {
                return;
            }
            if rx.schliessen.changed().await.is_err() {
                // Alle Sender weg zaehlt ebenfalls als geschlossen
                return;
            }
        }
    }

    #[tokio::test]
    async fn ack_ist_das_erste_ereignis() {
        let raum = RaumId::new();
        let (handle, hub) = RaumHub::neu(raum);
        tokio::spawn(hub.laufen());

        let (client, mut rx) = test_client(raum);
        let user_id = client.user_id;
        handle.anmelden(client).await;

        let erstes = naechstes_ereignis(&mut rx).await;
        assert_eq!(erstes.typ, EreignisTyp::ConnectionAck);
        assert_eq!(
            erstes.data.unwrap()["user_id"],
            user_id.inner().to_string()
        );

        let zweites = naechstes_ereignis(&mut rx).await;
        assert_eq!(zweites.typ, EreignisTyp::UserJoined);
    }

    #[tokio::test]
    async fn broadcasts_in_reihenfolge() {
        let raum = RaumId::new();
        let (handle, hub) = RaumHub::neu(raum);
        tokio::spawn(hub.laufen());

        let (client, mut rx) = test_client(raum);
        handle.anmelden(client).await;

        // ack + eigenes user_joined ueberspringen
        naechstes_ereignis(&mut rx).await;
        naechstes_ereignis(&mut rx).await;

        for i in 0..50 {
            assert!(handle.senden(Ereignis::fehler("test", format!("nr-{i}"))));
            let empfangen = naechstes_ereignis(&mut rx).await;
            assert_eq!(empfangen.typ, EreignisTyp::Error);
            assert_eq!(empfangen.data.unwrap()["message"], format!("nr-{i}"));
        }
    }

    #[tokio::test]
    async fn doppeltes_register_ist_noop() {
        let raum = RaumId::new();
        let (handle, hub) = RaumHub::neu(raum);
        tokio::spawn(hub.laufen());

        let (client, mut rx) = test_client(raum);
        handle.anmelden(client.clone()).await;
        handle.anmelden(client).await;

        // Genau ein ack und ein user_joined
        assert_eq!(naechstes_ereignis(&mut rx).await.typ, EreignisTyp::ConnectionAck);
        assert_eq!(naechstes_ereignis(&mut rx).await.typ, EreignisTyp::UserJoined);

        tokio::task::yield_now().await;
        assert!(rx.frames.try_recv().is_err(), "kein weiteres Ereignis erwartet");
    }

    #[tokio::test]
    async fn langsamer_konsument_wird_ausgetragen() {
        let raum = RaumId::new();
        let (handle, hub) = RaumHub::neu(raum);
        tokio::spawn(hub.laufen());

        let (schnell, mut schnell_rx) = test_client(raum);
        let (langsam, _langsam_rx) = test_client(raum);
        let langsam_uid = langsam.user_id;

        handle.anmelden(schnell.clone()).await;
        naechstes_ereignis(&mut schnell_rx).await; // ack
        naechstes_ereignis(&mut schnell_rx).await; // eigenes user_joined

        handle.anmelden(langsam).await;
        naechstes_ereignis(&mut schnell_rx).await; // user_joined(langsam)

        // Der langsame Client wird nie gelesen; nach Kapazitaet+1
        // Zustellversuchen muss er ausgetragen sein
        let mut user_left_gesehen = false;
        let mut normale_ereignisse = 0;
        let gesamt = SENDE_QUEUE_GROESSE + 10;

        for i in 0..gesamt {
            assert!(handle.senden(Ereignis::fehler("test", format!("nr-{i}"))));

            // Alles einsammeln was fuer den schnellen Client anfaellt
            loop {
                let ereignis = naechstes_ereignis(&mut schnell_rx).await;
                match ereignis.typ {
                    EreignisTyp::UserLeft => {
                        assert_eq!(
                            ereignis.data.unwrap()["user_id"],
                            langsam_uid.inner().to_string()
                        );
                        user_left_gesehen = true;
                    }
                    EreignisTyp::Error => {
                        assert_eq!(ereignis.data.unwrap()["message"], format!("nr-{i}"));
                        normale_ereignisse += 1;
                        break;
                    }
                    anderes => panic!("unerwartetes Ereignis {anderes:?}"),
                }
            }
        }

        assert!(user_left_gesehen, "user_left fuer den langsamen Client fehlt");
        assert_eq!(normale_ereignisse, gesamt, "schneller Client verliert nichts");

        let status = handle.schnappschuss();
        assert!(status.verworfen >= 1);
        assert_eq!(status.verbunden, 1);
    }

    #[tokio::test]
    async fn abmelden_ist_idempotent() {
        let raum = RaumId::new();
        let (handle, hub) = RaumHub::neu(raum);
        tokio::spawn(hub.laufen());

        let (bleibt, mut bleibt_rx) = test_client(raum);
        let (geht, mut geht_rx) = test_client(raum);
        let geht_uid = geht.user_id;

        handle.anmelden(bleibt.clone()).await;
        naechstes_ereignis(&mut bleibt_rx).await; // ack
        naechstes_ereignis(&mut bleibt_rx).await; // eigenes joined

        handle.anmelden(geht.clone()).await;
        naechstes_ereignis(&mut bleibt_rx).await; // joined(geht)

        handle.abmelden(geht.clone()).await;
        handle.abmelden(geht).await;

        // Genau ein user_left
        let ereignis = naechstes_ereignis(&mut bleibt_rx).await;
        assert_eq!(ereignis.typ, EreignisTyp::UserLeft);
        assert_eq!(ereignis.data.unwrap()["user_id"], geht_uid.inner().to_string());

        tokio::task::yield_now().await;
        assert!(bleibt_rx.frames.try_recv().is_err());

        // Queue des Ausgetragenen wurde geschlossen
        auf_schliessen_warten(&mut geht_rx).await;
    }

    #[tokio::test]
    async fn herunterfahren_schliesst_alle_queues() {
        let raum = RaumId::new();
        let (handle, hub) = RaumHub::neu(raum);
        let task = tokio::spawn(hub.laufen());

        let mut empfaenger = Vec::new();
        for _ in 0..5 {
            let (client, rx) = test_client(raum);
            handle.anmelden(client).await;
            empfaenger.push(rx);
        }

        handle.herunterfahren();
        task.await.unwrap();

        let status = handle.schnappschuss();
        assert_eq!(status.zustand, HubZustand::Stopped);
        assert_eq!(status.verbunden, 0);

        for mut rx in empfaenger {
            auf_schliessen_warten(&mut rx).await;
        }
    }

    #[tokio::test]
    async fn voller_broadcast_eingang_blockiert_nicht() {
        let raum = RaumId::new();
        // Schleife absichtlich nicht gestartet: der Eingang laeuft voll
        let (handle, _hub) = RaumHub::neu(raum);

        for _ in 0..BROADCAST_QUEUE_GROESSE {
            assert!(handle.senden(Ereignis::pong()));
        }

        assert!(!handle.senden(Ereignis::pong()));
        assert!(handle.schnappschuss().verworfen >= 1);
    }
}
