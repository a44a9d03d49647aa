//! Presence-Registry – Verwaltet die Liste aller verbundenen Teilnehmer
//!
//! Wer ist verbunden, und unter welchem Namen? Die Registry haelt den
//! ephemeren Zustand aller Verbindungen in Beitritts-Reihenfolge. Die
//! Reihenfolge dient ausschliesslich deterministischen Schnappschuessen,
//! nicht der Korrektheit.
//!
//! Die Registry sendet selbst nie: nach jeder mutierenden Operation muss
//! der Aufrufer den Schnappschuss an alle Teilnehmer verteilen.

use parking_lot::RwLock;
use std::sync::Arc;
use treffpunkt_core::types::ConnectionId;

// ---------------------------------------------------------------------------
// Teilnehmer
// ---------------------------------------------------------------------------

/// Eine verbundene Verbindung und ihre angekuendigte Identitaet
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Teilnehmer {
    pub connection_id: ConnectionId,
    /// Leer bis der Client sich per `identify` gemeldet hat
    pub user_id: String,
}

/// Ergebnis einer Identitaets-Ankuendigung
///
/// Fall 3 der Merge-Richtlinie (eine fremde Verbindung traegt den Namen
/// bereits) ist absichtlich beobachtbar: der Dispatcher verschickt dafuer
/// eine `identity-reassigned`-Benachrichtigung.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AnkuendigungsErgebnis {
    /// Leerer Name – keine Zustandsaenderung
    Ignoriert,
    /// Bestehender Eintrag dieser Verbindung wurde umbenannt
    Umbenannt,
    /// Neuer Eintrag wurde angelegt
    Eingetragen,
    /// Die Identitaet wurde einer anderen Verbindung weggenommen
    Uebernommen { vorher: ConnectionId },
}

impl AnkuendigungsErgebnis {
    /// Prueft ob die Ankuendigung den Registry-Zustand veraendert hat
    pub fn hat_mutiert(&self) -> bool {
        !matches!(self, Self::Ignoriert)
    }
}

// ---------------------------------------------------------------------------
// PresenceRegistry
// ---------------------------------------------------------------------------

/// Verwaltet die geordnete Menge aller verbundenen Teilnehmer
///
/// Thread-safe via Arc + RwLock. Clone der Registry teilt den inneren
/// Zustand. Die Vec-Repraesentation haelt die Beitritts-Reihenfolge fest;
/// `connection_id` ist innerhalb der Menge eindeutig.
#[derive(Clone)]
pub struct PresenceRegistry {
    inner: Arc<PresenceRegistryInner>,
}

struct PresenceRegistryInner {
    teilnehmer: RwLock<Vec<Teilnehmer>>,
}

impl PresenceRegistry {
    /// Erstellt eine neue, leere PresenceRegistry
    pub fn neu() -> Self {
        Self {
            inner: Arc::new(PresenceRegistryInner {
                teilnehmer: RwLock::new(Vec::new()),
            }),
        }
    }

    /// Registriert eine neue Verbindung mit leerer Identitaet
    pub fn verbinden(&self, connection_id: ConnectionId) -> Teilnehmer {
        let teilnehmer = Teilnehmer {
            connection_id,
            user_id: String::new(),
        };
        self.inner.teilnehmer.write().push(teilnehmer.clone());

        tracing::info!(conn_id = %connection_id, "Teilnehmer verbunden");
        teilnehmer
    }

    /// Wendet eine Identitaets-Ankuendigung an
    ///
    /// Merge-Richtlinie, in dieser Reihenfolge:
    /// 1. Eintrag mit dieser `connection_id` existiert -> `user_id`
    ///    ueberschreiben (Umbenennung, idempotent pro Verbindung)
    /// 2. Kein Eintrag traegt diese `user_id` -> neuen Eintrag anhaengen
    /// 3. Eine andere Verbindung traegt die `user_id` bereits -> deren
    ///    Eintrag auf die neue Verbindung umschreiben; die juengste
    ///    Ankuendigung gewinnt den Identitaets-Slot
    pub fn ankuendigen(
        &self,
        connection_id: ConnectionId,
        user_id: &str,
    ) -> AnkuendigungsErgebnis {
        if user_id.is_empty() {
            return AnkuendigungsErgebnis::Ignoriert;
        }

        let mut teilnehmer = self.inner.teilnehmer.write();

        // Fall 1: Umbenennung der eigenen Verbindung
        if let Some(eintrag) = teilnehmer
            .iter_mut()
            .find(|t| t.connection_id == connection_id)
        {
            eintrag.user_id = user_id.to_string();
            tracing::debug!(conn_id = %connection_id, user_id, "Teilnehmer umbenannt");
            return AnkuendigungsErgebnis::Umbenannt;
        }

        // Fall 3: Identitaet gehoert bereits einer anderen Verbindung
        if let Some(eintrag) = teilnehmer.iter_mut().find(|t| t.user_id == user_id) {
            let vorher = eintrag.connection_id;
            eintrag.connection_id = connection_id;
            tracing::info!(
                user_id,
                vorher = %vorher,
                nachher = %connection_id,
                "Identitaet auf neue Verbindung uebernommen"
            );
            return AnkuendigungsErgebnis::Uebernommen { vorher };
        }

        // Fall 2: Unbekannte Verbindung mit freiem Namen
        teilnehmer.push(Teilnehmer {
            connection_id,
            user_id: user_id.to_string(),
        });
        tracing::debug!(conn_id = %connection_id, user_id, "Teilnehmer eingetragen");
        AnkuendigungsErgebnis::Eingetragen
    }

    /// Entfernt die Verbindung aus der Registry (falls vorhanden)
    pub fn getrennt(&self, connection_id: &ConnectionId) {
        let mut teilnehmer = self.inner.teilnehmer.write();
        let vorher = teilnehmer.len();
        teilnehmer.retain(|t| &t.connection_id != connection_id);

        if teilnehmer.len() < vorher {
            tracing::info!(conn_id = %connection_id, "Teilnehmer getrennt");
        }
    }

    /// Geordneter Schnappschuss aller Teilnehmer (Beitritts-Reihenfolge)
    pub fn schnappschuss(&self) -> Vec<Teilnehmer> {
        self.inner.teilnehmer.read().clone()
    }

    /// Gibt den Teilnehmer zu einer Verbindung zurueck
    pub fn teilnehmer(&self, connection_id: &ConnectionId) -> Option<Teilnehmer> {
        self.inner
            .teilnehmer
            .read()
            .iter()
            .find(|t| &t.connection_id == connection_id)
            .cloned()
    }

    /// Prueft ob eine Verbindung registriert ist
    pub fn ist_verbunden(&self, connection_id: &ConnectionId) -> bool {
        self.inner
            .teilnehmer
            .read()
            .iter()
            .any(|t| &t.connection_id == connection_id)
    }

    /// Gibt die Anzahl der registrierten Teilnehmer zurueck
    pub fn anzahl(&self) -> usize {
        self.inner.teilnehmer.read().len()
    }
}

impl Default for PresenceRegistry {
    fn default() -> Self {
        Self::neu()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
