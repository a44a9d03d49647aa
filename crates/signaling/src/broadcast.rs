//! Event-Broadcaster – Sendet Ereignisse an alle relevanten Verbindungen
//!
//! Der EventBroadcaster verwaltet die Send-Queues aller verbundenen Clients
//! und die Raum-Mitgliedschaft (das gruppenadressierbare Primitiv des
//! Transports). Eine Verbindung kann gleichzeitig Mitglied mehrerer Raeume
//! sein; die Mitgliedschaft ist pro Raum unabhaengig.
//!
//! ## Selektives Broadcasting
//! - An alle Verbindungen: `an_alle_senden`
//! - An einen Raum: `an_raum_senden`
//! - An einen Raum ausser einer Verbindung: `an_raum_ausser_senden`
//! - An eine einzelne Verbindung: `an_verbindung_senden`

use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::mpsc;
use treffpunkt_core::types::{ConnectionId, RoomId};
use treffpunkt_protocol::control::ServerEvent;

// ---------------------------------------------------------------------------
// Konfiguration
// ---------------------------------------------------------------------------

/// Groesse der Send-Queue pro Verbindung
const SEND_QUEUE_GROESSE: usize = 64;

// ---------------------------------------------------------------------------
// ClientSender
// ---------------------------------------------------------------------------

/// Handle auf die Send-Queue einer verbundenen Verbindung
#[derive(Clone, Debug)]
pub struct ClientSender {
    pub connection_id: ConnectionId,
    pub tx: mpsc::Sender<ServerEvent>,
}

impl ClientSender {
    /// Sendet ein Ereignis nicht-blockierend an die Verbindung
    ///
    /// Gibt `false` zurueck wenn die Queue voll oder geschlossen ist.
    pub fn senden(&self, ereignis: ServerEvent) -> bool {
        match self.tx.try_send(ereignis) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(_)) => {
                tracing::warn!(conn_id = %self.connection_id, "Send-Queue voll – Ereignis verworfen");
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                tracing::debug!(conn_id = %self.connection_id, "Send-Queue geschlossen (Client getrennt)");
                false
            }
        }
    }
}

// ---------------------------------------------------------------------------
// EventBroadcaster
// ---------------------------------------------------------------------------

/// Zentraler Event-Broadcaster fuer alle verbundenen Clients
///
/// Thread-safe via Arc + DashMap. Clone teilt den inneren Zustand.
#[derive(Clone)]
pub struct EventBroadcaster {
    inner: Arc<EventBroadcasterInner>,
}

struct EventBroadcasterInner {
    /// Client-Sender, indiziert nach ConnectionId
    clients: DashMap<ConnectionId, ClientSender>,
    /// Raum-Mitgliedschaft: room_id -> Vec<ConnectionId>
    raum_mitglieder: DashMap<RoomId, Vec<ConnectionId>>,
}

impl EventBroadcaster {
    /// Erstellt einen neuen EventBroadcaster
    pub fn neu() -> Self {
        Self {
            inner: Arc::new(EventBroadcasterInner {
                clients: DashMap::new(),
                raum_mitglieder: DashMap::new(),
            }),
        }
    }

    /// Registriert eine neue Verbindung und gibt ihre Empfangs-Queue zurueck
    ///
    /// Die `ClientConnection` liest aus dieser Queue und sendet via TCP.
    pub fn client_registrieren(&self, connection_id: ConnectionId) -> mpsc::Receiver<ServerEvent> {
        let (tx, rx) = mpsc::channel(SEND_QUEUE_GROESSE);
        let sender = ClientSender { connection_id, tx };
        self.inner.clients.insert(connection_id, sender);
        tracing::debug!(conn_id = %connection_id, "Client im Broadcaster registriert");
        rx
    }

    /// Entfernt eine Verbindung aus dem Broadcaster und allen Raeumen
    pub fn client_entfernen(&self, connection_id: &ConnectionId) {
        self.inner.clients.remove(connection_id);
        self.inner.raum_mitglieder.iter_mut().for_each(|mut eintrag| {
            eintrag.value_mut().retain(|cid| cid != connection_id);
        });
        // Leere Raum-Eintraege aufraeumen
        self.inner
            .raum_mitglieder
            .retain(|_, mitglieder| !mitglieder.is_empty());
        tracing::debug!(conn_id = %connection_id, "Client aus Broadcaster entfernt");
    }

    /// Fuegt eine Verbindung einem Raum hinzu
    ///
    /// Mitgliedschaft in anderen Raeumen bleibt unberuehrt; mehrfacher
    /// Beitritt zum selben Raum ist ein No-op.
    pub fn raum_beitreten(&self, connection_id: ConnectionId, room: &RoomId) {
        let mut mitglieder = self
            .inner
            .raum_mitglieder
            .entry(room.clone())
            .or_default();
        if !mitglieder.contains(&connection_id) {
            mitglieder.push(connection_id);
        }
    }

    /// Entfernt eine Verbindung aus einem bestimmten Raum
    pub fn raum_verlassen(&self, connection_id: &ConnectionId, room: &RoomId) {
        if let Some(mut mitglieder) = self.inner.raum_mitglieder.get_mut(room) {
            mitglieder.retain(|cid| cid != connection_id);
            let ist_leer = mitglieder.is_empty();
            drop(mitglieder);
            if ist_leer {
                self.inner.raum_mitglieder.remove(room);
            }
        }
    }

    /// Raeumt einen Raum vollstaendig (alle Mitglieder werden entfernt)
    ///
    /// Wird beim host-initiierten Raum-Ende verwendet. Gibt die bisherigen
    /// Mitglieder zurueck.
    pub fn raum_raeumen(&self, room: &RoomId) -> Vec<ConnectionId> {
        self.inner
            .raum_mitglieder
            .remove(room)
            .map(|(_, mitglieder)| mitglieder)
            .unwrap_or_default()
    }

    /// Prueft ob die Verbindung Mitglied des Raums ist
    pub fn ist_mitglied(&self, connection_id: &ConnectionId, room: &RoomId) -> bool {
        self.inner
            .raum_mitglieder
            .get(room)
            .map(|mitglieder| mitglieder.contains(connection_id))
            .unwrap_or(false)
    }

    /// Gibt alle Mitglieder eines Raums zurueck
    pub fn mitglieder(&self, room: &RoomId) -> Vec<ConnectionId> {
        self.inner
            .raum_mitglieder
            .get(room)
            .map(|mitglieder| mitglieder.clone())
            .unwrap_or_default()
    }

    /// Sendet ein Ereignis an eine einzelne Verbindung
    ///
    /// Gibt `true` zurueck wenn die Verbindung gefunden und das Ereignis
    /// eingereiht wurde.
    pub fn an_verbindung_senden(
        &self,
        connection_id: &ConnectionId,
        ereignis: ServerEvent,
    ) -> bool {
        match self.inner.clients.get(connection_id) {
            Some(sender) => sender.senden(ereignis),
            None => {
                tracing::debug!(conn_id = %connection_id, "Senden an unbekannte Verbindung");
                false
            }
        }
    }

    /// Sendet ein Ereignis an alle Mitglieder eines Raums
    ///
    /// Gibt die Anzahl der erfolgreichen Sendungen zurueck.
    pub fn an_raum_senden(&self, room: &RoomId, ereignis: ServerEvent) -> usize {
        let mitglieder = self.mitglieder(room);

        let mut gesendet = 0;
        for connection_id in &mitglieder {
            if let Some(sender) = self.inner.clients.get(connection_id) {
                if sender.senden(ereignis.clone()) {
                    gesendet += 1;
                }
            }
        }
        gesendet
    }

    /// Sendet ein Ereignis an alle Mitglieder eines Raums ausser einer Verbindung
    ///
    /// Nuetzlich um Join/Leave-Ereignisse zu verteilen ohne den Ausloeser
    /// zu informieren.
    pub fn an_raum_ausser_senden(
        &self,
        room: &RoomId,
        ausgeschlossen: &ConnectionId,
        ereignis: ServerEvent,
    ) -> usize {
        let mitglieder = self.mitglieder(room);

        let mut gesendet = 0;
        for connection_id in &mitglieder {
            if connection_id == ausgeschlossen {
                continue;
            }
            if let Some(sender) = self.inner.clients.get(connection_id) {
                if sender.senden(ereignis.clone()) {
                    gesendet += 1;
                }
            }
        }
        gesendet
    }

    /// Sendet ein Ereignis an alle verbundenen Clients
    ///
    /// Gibt die Anzahl der erfolgreichen Sendungen zurueck.
    pub fn an_alle_senden(&self, ereignis: ServerEvent) -> usize {
        let mut gesendet = 0;
        self.inner.clients.iter().for_each(|eintrag| {
            if eintrag.value().senden(ereignis.clone()) {
                gesendet += 1;
            }
        });
        gesendet
    }

    /// Gibt die Anzahl der registrierten Verbindungen zurueck
    pub fn client_anzahl(&self) -> usize {
        self.inner.clients.len()
    }

    /// Prueft ob eine Verbindung registriert ist
    pub fn ist_registriert(&self, connection_id: &ConnectionId) -> bool {
        self.inner.clients.contains_key(connection_id)
    }
}

impl Default for EventBroadcaster {
    fn default() -> Self {
        Self::neu()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn test_ereignis() -> ServerEvent {
        ServerEvent::ping(12345)
    }

    #[tokio::test]
    async fn client_registrieren_und_senden() {
        let broadcaster = EventBroadcaster::neu();
        let conn = ConnectionId::new();

        let mut rx = broadcaster.client_registrieren(conn);
        assert!(broadcaster.ist_registriert(&conn));

        let gesendet = broadcaster.an_verbindung_senden(&conn, test_ereignis());
        assert!(gesendet);

        let empfangen = rx.try_recv().expect("Ereignis muss vorhanden sein");
        assert!(matches!(empfangen, ServerEvent::Ping(_)));
    }

    #[tokio::test]
    async fn an_raum_senden() {
        let broadcaster = EventBroadcaster::neu();
        let raum = RoomId::new("r1");

        let c1 = ConnectionId::new();
        let c2 = ConnectionId::new();
        let c3 = ConnectionId::new(); // kein Raum-Mitglied

        let mut rx1 = broadcaster.client_registrieren(c1);
        let mut rx2 = broadcaster.client_registrieren(c2);
        let mut rx3 = broadcaster.client_registrieren(c3);

        broadcaster.raum_beitreten(c1, &raum);
        broadcaster.raum_beitreten(c2, &raum);

        let gesendet = broadcaster.an_raum_senden(&raum, test_ereignis());
        assert_eq!(gesendet, 2);

        assert!(rx1.try_recv().is_ok());
        assert!(rx2.try_recv().is_ok());
        assert!(rx3.try_recv().is_err(), "c3 darf nichts empfangen");
    }

    #[tokio::test]
    async fn an_raum_ausser_senden() {
        let broadcaster = EventBroadcaster::neu();
        let raum = RoomId::new("r1");

        let c1 = ConnectionId::new();
        let c2 = ConnectionId::new();

        let mut rx1 = broadcaster.client_registrieren(c1);
        let mut rx2 = broadcaster.client_registrieren(c2);

        broadcaster.raum_beitreten(c1, &raum);
        broadcaster.raum_beitreten(c2, &raum);

        // c1 ist der Ausloeser und bekommt kein Ereignis
        broadcaster.an_raum_ausser_senden(&raum, &c1, test_ereignis());

        assert!(rx1.try_recv().is_err(), "Ausloeser darf nichts empfangen");
        assert!(rx2.try_recv().is_ok());
    }

    #[tokio::test]
    async fn an_alle_senden() {
        let broadcaster = EventBroadcaster::neu();

        let conns: Vec<ConnectionId> = (0..5).map(|_| ConnectionId::new()).collect();
        let mut receivers: Vec<_> = conns
            .iter()
            .map(|cid| broadcaster.client_registrieren(*cid))
            .collect();

        let gesendet = broadcaster.an_alle_senden(test_ereignis());
        assert_eq!(gesendet, 5);

        for rx in &mut receivers {
            assert!(rx.try_recv().is_ok());
        }
    }

    #[test]
    fn mitgliedschaft_ist_pro_raum_unabhaengig() {
        let broadcaster = EventBroadcaster::neu();
        let conn = ConnectionId::new();
        let r1 = RoomId::new("r1");
        let r2 = RoomId::new("r2");

        let _rx = broadcaster.client_registrieren(conn);
        broadcaster.raum_beitreten(conn, &r1);
        broadcaster.raum_beitreten(conn, &r2);

        assert!(broadcaster.ist_mitglied(&conn, &r1));
        assert!(broadcaster.ist_mitglied(&conn, &r2));

        broadcaster.raum_verlassen(&conn, &r1);
        assert!(!broadcaster.ist_mitglied(&conn, &r1));
        assert!(broadcaster.ist_mitglied(&conn, &r2), "r2 bleibt unberuehrt");
    }

    #[test]
    fn doppelter_beitritt_ist_noop() {
        let broadcaster = EventBroadcaster::neu();
        let conn = ConnectionId::new();
        let raum = RoomId::new("r1");

        let _rx = broadcaster.client_registrieren(conn);
        broadcaster.raum_beitreten(conn, &raum);
        broadcaster.raum_beitreten(conn, &raum);

        assert_eq!(broadcaster.mitglieder(&raum).len(), 1);
    }

    #[test]
    fn raum_raeumen_entfernt_alle_mitglieder() {
        let broadcaster = EventBroadcaster::neu();
        let raum = RoomId::new("r1");
        let c1 = ConnectionId::new();
        let c2 = ConnectionId::new();

        let _rx1 = broadcaster.client_registrieren(c1);
        let _rx2 = broadcaster.client_registrieren(c2);
        broadcaster.raum_beitreten(c1, &raum);
        broadcaster.raum_beitreten(c2, &raum);

        let bisherige = broadcaster.raum_raeumen(&raum);
        assert_eq!(bisherige.len(), 2);
        assert!(broadcaster.mitglieder(&raum).is_empty());
        // Die Verbindungen selbst bleiben registriert
        assert!(broadcaster.ist_registriert(&c1));
        assert!(broadcaster.ist_registriert(&c2));
    }

    #[test]
    fn client_entfernen_bereinigt_raum_zugehoerigkeit() {
        let broadcaster = EventBroadcaster::neu();
        let raum = RoomId::new("r1");
        let conn = ConnectionId::new();

        let _rx = broadcaster.client_registrieren(conn);
        broadcaster.raum_beitreten(conn, &raum);
        assert_eq!(broadcaster.mitglieder(&raum).len(), 1);

        broadcaster.client_entfernen(&conn);
        assert!(!broadcaster.ist_registriert(&conn));
        assert!(broadcaster.mitglieder(&raum).is_empty());
    }
}
