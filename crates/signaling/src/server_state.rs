//! Gemeinsamer Server-Zustand fuer den Signaling-Service
//!
//! Haelt alle geteilten Zustands-Manager als eigene, explizit uebergebene
//! Objekte – kein ambienter/statischer Zugriff. Dadurch laesst sich jede
//! Komponente isoliert gegen ein In-Memory-Double des Transports testen.

use std::sync::Arc;
use std::time::Instant;

use crate::broadcast::EventBroadcaster;
use crate::presence::PresenceRegistry;
use crate::rooms::RoomAuthority;

/// Konfiguration fuer den Signaling-Service
#[derive(Debug, Clone)]
pub struct SignalingConfig {
    /// Anzeigename des Servers
    pub server_name: String,
    /// Maximale gleichzeitige Verbindungen
    pub max_clients: u32,
    /// Keepalive-Intervall in Sekunden
    pub keepalive_sek: u64,
    /// Timeout fuer inaktive Verbindungen in Sekunden
    pub verbindungs_timeout_sek: u64,
}

impl Default for SignalingConfig {
    fn default() -> Self {
        Self {
            server_name: "Treffpunkt Server".to_string(),
            max_clients: 512,
            keepalive_sek: 30,
            verbindungs_timeout_sek: 90,
        }
    }
}

/// Gemeinsamer Server-Zustand (thread-safe, Arc-geteilt)
///
/// Alle Manager teilen ihren inneren Zustand ueber Clone; der State selbst
/// wird als Arc zwischen den Verbindungs-Tasks gereicht.
pub struct SignalingState {
    /// Server-Konfiguration
    pub config: Arc<SignalingConfig>,
    /// Presence-Registry (wer ist verbunden, unter welchem Namen)
    pub presence: PresenceRegistry,
    /// Raum-Autoritaet (welcher Verbindung gehoert der Host-Slot)
    pub rooms: RoomAuthority,
    /// Event-Broadcaster (Ereignisse an Clients senden, Raum-Mitgliedschaft)
    pub broadcaster: EventBroadcaster,
    /// Startzeitpunkt des Servers (fuer Uptime-Berechnung)
    pub start_time: Instant,
}

impl SignalingState {
    /// Erstellt einen neuen SignalingState
    pub fn neu(config: SignalingConfig) -> Arc<Self> {
        Arc::new(Self {
            config: Arc::new(config),
            presence: PresenceRegistry::neu(),
            rooms: RoomAuthority::neu(),
            broadcaster: EventBroadcaster::neu(),
            start_time: Instant::now(),
        })
    }

    /// Gibt die Uptime in Sekunden zurueck
    pub fn uptime_sek(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }
}
