//! Verbindungs-Manager – Hub-Lebenszyklus und Broadcast-Routing
//!
//! Besitzt die `raum -> hub`-Zuordnung in einer DashMap. Hubs entstehen
//! lazy beim ersten Verbindungsaufbau; das Entry-API garantiert dass
//! pro Raum genau ein Hub-Task gestartet wird, auch unter
//! konkurrierenden Aufrufen.
//!
//! Einsammeln leerer Hubs passiert auf Zuruf (`leerlauf_einsammeln`);
//! den Takt gibt der besitzende Prozess vor, nicht der Manager.

use std::time::Duration;

use axum::extract::ws::WebSocket;
use dashmap::DashMap;
use futures_util::future::join_all;
use futures_util::StreamExt;
use tokio::task::JoinHandle;

use funkraum_core::{RaumId, UserId};

use crate::client::{lese_pumpe, schreib_pumpe, Client};
use crate::ereignis::Ereignis;
use crate::hub::{HubHandle, RaumHub, LEERLAUF_SCHWELLE};

/// Wanduhr-Budget fuer das Herunterfahren aller Hubs
const SHUTDOWN_BUDGET: Duration = Duration::from_secs(10);

/// Ein laufender Hub samt seinem Task
struct HubEintrag {
    handle: HubHandle,
    task: JoinHandle<()>,
}

/// Verwaltet alle aktiven Raum-Hubs
#[derive(Default)]
pub struct VerbindungsManager {
    hubs: DashMap<RaumId, HubEintrag>,
}

impl VerbindungsManager {
    pub fn neu() -> Self {
        Self::default()
    }

    /// Holt den Hub eines Raums oder startet ihn
    ///
    /// Der Gewinner des Insert-Rennens konstruiert und startet den Hub;
    /// Verlierer bekommen denselben Handle.
    pub fn hub_holen_oder_starten(&self, raum_id: RaumId) -> HubHandle {
        self.hubs
            .entry(raum_id)
            .or_insert_with(|| {
                let (handle, hub) = RaumHub::neu(raum_id);
                let task = tokio::spawn(hub.laufen());
                tracing::debug!(raum_id = %raum_id, "Hub angelegt");
                HubEintrag { handle, task }
            })
            .handle
            .clone()
    }

    /// Reiht ein Ereignis beim Hub des Raums ein (nicht-blockierend)
    ///
    /// Ohne Hub ist niemand verbunden: loggen und verwerfen.
    pub fn senden(&self, raum_id: RaumId, ereignis: Ereignis) -> bool {
        match self.hubs.get(&raum_id) {
            Some(eintrag) => eintrag.handle.senden(ereignis),
            None => {
                tracing::debug!(raum_id = %raum_id, "Kein Hub fuer Broadcast, niemand verbunden");
                false
            }
        }
    }

    /// Bindet einen frisch akzeptierten Socket an den Hub seines Raums
    ///
    /// Startet Schreib- und Lese-Pumpe und reicht das Register beim Hub
    /// ein. Kehrt zurueck sobald das Register eingereicht ist; auf die
    /// Pumpen wird nie gewartet.
    pub async fn verbindung_starten(
        &self,
        socket: WebSocket,
        user_id: UserId,
        username: String,
        raum_id: RaumId,
    ) {
        let hub = self.hub_holen_oder_starten(raum_id);
        let (client, sende_queue) = Client::neu(user_id, username, raum_id);

        let (socket_tx, socket_rx) = socket.split();

        // Schreib-Pumpe zuerst, damit das connection_ack sofort fliessen kann
        tokio::spawn(schreib_pumpe(socket_tx, sende_queue, user_id, raum_id));

        hub.anmelden(client.clone()).await;

        tokio::spawn(lese_pumpe(socket_rx, client, hub));

        tracing::info!(user_id = %user_id, raum_id = %raum_id, "Verbindung aufgebaut");
    }

    /// Anzahl der aktiven Hubs (fuer Metriken)
    pub fn aktive_hubs(&self) -> usize {
        self.hubs.len()
    }

    /// Summiert die verbundenen Clients ueber alle Hubs (fuer Metriken)
    pub fn verbundene_clients(&self) -> usize {
        self.hubs
            .iter()
            .map(|e| e.handle.schnappschuss().verbunden)
            .sum()
    }

    /// Sammelt Hubs ein die leer sind und mindestens `schwelle` im
    /// Leerlauf waren; gibt die Anzahl der entfernten Hubs zurueck
    pub async fn leerlauf_einsammeln(&self, schwelle: Duration) -> usize {
        let kandidaten: Vec<RaumId> = self
            .hubs
            .iter()
            .filter(|e| {
                let status = e.handle.schnappschuss();
                status.verbunden == 0 && status.leerlauf_sek >= schwelle.as_secs() as i64
            })
            .map(|e| *e.key())
            .collect();

        let mut entfernt = 0;

        for raum_id in kandidaten {
            let Some((_, eintrag)) = self.hubs.remove(&raum_id) else {
                continue;
            };

            // Zwischen Auswahl und Remove kann sich jemand verbunden haben
            if eintrag.handle.schnappschuss().verbunden > 0 {
                self.hubs.insert(raum_id, eintrag);
                continue;
            }

            eintrag.handle.herunterfahren();
            let _ = tokio::time::timeout(Duration::from_secs(5), eintrag.task).await;
            entfernt += 1;

            tracing::debug!(raum_id = %raum_id, "Leeren Hub eingesammelt");
        }

        entfernt
    }

    /// Standard-Schwelle fuer das Einsammeln
    pub fn leerlauf_schwelle() -> Duration {
        LEERLAUF_SCHWELLE
    }

    /// Faehrt alle Hubs herunter und wartet bis sie gestoppt sind
    ///
    /// Das Wanduhr-Budget betraegt 10 Sekunden fuer alle Hubs zusammen.
    pub async fn herunterfahren(&self) {
        let eintraege: Vec<(RaumId, HubEintrag)> = {
            let raum_ids: Vec<RaumId> = self.hubs.iter().map(|e| *e.key()).collect();
            raum_ids
                .into_iter()
                .filter_map(|id| self.hubs.remove(&id))
                .collect()
        };

        if eintraege.is_empty() {
            return;
        }

        tracing::info!(hubs = eintraege.len(), "Alle Hubs werden heruntergefahren");

        let mut tasks = Vec::with_capacity(eintraege.len());
        for (_, eintrag) in eintraege {
            eintrag.handle.herunterfahren();
            tasks.push(eintrag.task);
        }

        if tokio::time::timeout(SHUTDOWN_BUDGET, join_all(tasks))
            .await
            .is_err()
        {
            tracing::warn!("Shutdown-Budget ueberschritten, Hubs werden abgebrochen");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ereignis::EreignisTyp;
    use crate::hub::HubZustand;
    use std::sync::Arc;

    #[tokio::test]
    async fn konkurrierendes_holen_startet_einen_hub() {
        let manager = Arc::new(VerbindungsManager::neu());
        let raum = RaumId::new();

        let mut tasks = Vec::new();
        for _ in 0..16 {
            let manager = Arc::clone(&manager);
            tasks.push(tokio::spawn(async move {
                manager.hub_holen_oder_starten(raum)
            }));
        }
        for task in tasks {
            task.await.unwrap();
        }

        assert_eq!(manager.aktive_hubs(), 1);
    }

    #[tokio::test]
    async fn broadcast_ueber_manager_erreicht_clients() {
        let manager = VerbindungsManager::neu();
        let raum = RaumId::new();

        let hub = manager.hub_holen_oder_starten(raum);
        let (client, mut rx) = Client::neu(UserId::new(), "a".into(), raum);
        hub.anmelden(client).await;

        // ack + user_joined ueberspringen
        for _ in 0..2 {
            rx.frames.recv().await.unwrap();
        }

        assert!(manager.senden(raum, Ereignis::fehler("test", "hallo")));

        let frame = rx.frames.recv().await.expect("Frame erwartet");
        let ereignis = Ereignis::dekodieren(&frame).unwrap();
        assert_eq!(ereignis.typ, EreignisTyp::Error);
    }

    #[tokio::test]
    async fn broadcast_ohne_hub_wird_verworfen() {
        let manager = VerbindungsManager::neu();
        assert!(!manager.senden(RaumId::new(), Ereignis::pong()));
        assert_eq!(manager.aktive_hubs(), 0);
    }

    #[tokio::test]
    async fn leere_hubs_werden_eingesammelt() {
        let manager = VerbindungsManager::neu();
        let raum = RaumId::new();
        manager.hub_holen_oder_starten(raum);
        assert_eq!(manager.aktive_hubs(), 1);

        let entfernt = manager.leerlauf_einsammeln(Duration::ZERO).await;
        assert_eq!(entfernt, 1);
        assert_eq!(manager.aktive_hubs(), 0);
    }

    #[tokio::test]
    async fn hubs_mit_clients_bleiben() {
        let manager = VerbindungsManager::neu();
        let raum = RaumId::new();

        let hub = manager.hub_holen_oder_starten(raum);
        let (client, _rx) = Client::neu(UserId::new(), "a".into(), raum);
        hub.anmelden(client).await;

        // Warten bis das Register verarbeitet ist
        while hub.schnappschuss().verbunden == 0 {
            tokio::task::yield_now().await;
        }

        let entfernt = manager.leerlauf_einsammeln(Duration::ZERO).await;
        assert_eq!(entfernt, 0);
        assert_eq!(manager.aktive_hubs(), 1);
    }

    #[tokio::test]
    async fn herunterfahren_stoppt_alle_hubs_im_budget() {
        let manager = VerbindungsManager::neu();

        // 10 Raeume mit je 10 Clients
        let mut empfaenger = Vec::new();
        let mut handles = Vec::new();
        for _ in 0..10 {
            let raum = RaumId::new();
            let hub = manager.hub_holen_oder_starten(raum);
            for i in 0..10 {
                let (client, rx) = Client::neu(UserId::new(), format!("user-{i}"), raum);
                hub.anmelden(client).await;
                empfaenger.push(rx);
            }
            handles.push(hub);
        }
        assert_eq!(manager.aktive_hubs(), 10);

        let start = std::time::Instant::now();
        manager.herunterfahren().await;
        assert!(start.elapsed() < Duration::from_secs(10));

        assert_eq!(manager.aktive_hubs(), 0);
        for handle in handles {
            assert_eq!(handle.schnappschuss().zustand, HubZustand::Stopped);
        }

        // Jede Client-Queue traegt am Ende das Schliess-Signal
        for mut rx in empfaenger {
            loop {
                if *rx.schliessen.borrow() {
                    break;
                }
                if rx.schliessen.changed().await.is_err() {
                    break;
                }
            }
        }
    }
}
