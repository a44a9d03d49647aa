//! Raum-Autoritaet – Verwaltet den Host-Slot jedes Raums
//!
//! Pro Raum gibt es hoechstens einen Host: die Verbindung die als erste
//! beigetreten ist. Nur der Host darf die Raum-Sitzung fuer alle beenden.
//! Der Slot bleibt besetzt bis der Host die Verbindung trennt oder der
//! Raum beendet wird; danach beansprucht ihn der naechste Beitretende.
//!
//! Alle Operationen sind totale Funktionen ueber moeglicherweise fehlende
//! Schluessel – es gibt keine Fehlerzustaende.

use dashmap::DashMap;
use std::sync::Arc;
use treffpunkt_core::types::{ConnectionId, RoomId};

/// Verwaltet die Host-Zuordnung aller Raeume
///
/// Thread-safe via Arc + DashMap. Clone teilt den inneren Zustand.
#[derive(Clone)]
pub struct RoomAuthority {
    inner: Arc<RoomAuthorityInner>,
}

struct RoomAuthorityInner {
    /// Raum -> Host-Verbindung
    hosts: DashMap<RoomId, ConnectionId>,
}

impl RoomAuthority {
    /// Erstellt eine neue RoomAuthority
    pub fn neu() -> Self {
        Self {
            inner: Arc::new(RoomAuthorityInner {
                hosts: DashMap::new(),
            }),
        }
    }

    /// Traegt die Verbindung als Host ein falls der Raum noch keinen hat
    ///
    /// Idempotent: hat der Raum bereits einen Host, passiert nichts.
    /// Gibt `true` zurueck wenn der Slot neu besetzt wurde.
    pub fn host_beanspruchen(&self, room: &RoomId, connection_id: ConnectionId) -> bool {
        match self.inner.hosts.entry(room.clone()) {
            dashmap::mapref::entry::Entry::Vacant(eintrag) => {
                eintrag.insert(connection_id);
                tracing::info!(raum = %room, host = %connection_id, "Host-Slot besetzt");
                true
            }
            dashmap::mapref::entry::Entry::Occupied(_) => false,
        }
    }

    /// Prueft ob die Verbindung der Host des Raums ist
    pub fn ist_host(&self, room: &RoomId, connection_id: &ConnectionId) -> bool {
        self.inner
            .hosts
            .get(room)
            .map(|host| host.value() == connection_id)
            .unwrap_or(false)
    }

    /// Gibt den Host eines Raums zurueck
    pub fn host_von(&self, room: &RoomId) -> Option<ConnectionId> {
        self.inner.hosts.get(room).map(|host| *host.value())
    }

    /// Raeumt alle Host-Slots dieser Verbindung (Trennung oder Raum-Ende)
    ///
    /// Eine Verbindung kann Host von null oder mehreren Raeumen sein –
    /// alle Treffer werden geraeumt. Gibt die betroffenen Raeume zurueck.
    pub fn freigeben_wenn_host(&self, connection_id: &ConnectionId) -> Vec<RoomId> {
        let betroffen: Vec<RoomId> = self
            .inner
            .hosts
            .iter()
            .filter(|eintrag| eintrag.value() == connection_id)
            .map(|eintrag| eintrag.key().clone())
            .collect();

        for raum in &betroffen {
            self.inner.hosts.remove(raum);
            tracing::debug!(raum = %raum, host = %connection_id, "Host-Slot freigegeben");
        }

        betroffen
    }

    /// Raeumt den Host-Slot eines Raums bedingungslos
    pub fn beenden(&self, room: &RoomId) {
        if self.inner.hosts.remove(room).is_some() {
            tracing::info!(raum = %room, "Raum beendet, Host-Slot geraeumt");
        }
    }

    /// Gibt die Anzahl der Raeume mit besetztem Host-Slot zurueck
    pub fn raum_anzahl(&self) -> usize {
        self.inner.hosts.len()
    }
}

impl Default for RoomAuthority {
    fn default() -> Self {
        Self::neu()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
