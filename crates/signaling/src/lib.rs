//! treffpunkt-signaling – Presence-, Raum- und Relay-Service
//!
//! Dieser Crate implementiert den Kern des Treffpunkt-Relays: er verwaltet
//! die Presence aller verbundenen Teilnehmer, verteilt Chat-Nachrichten,
//! leitet Verbindungs-Aushandlung (Offer/Answer/Candidate) zwischen
//! einzelnen Teilnehmern weiter und setzt die Host-Autoritaet pro Raum
//! durch.
//!
//! ## Architektur
//!
//! ```text
//! TCP Listener (SignalingServer)
//!     |
//!     v
//! ClientConnection (pro Verbindung ein Task, vergibt die ConnectionId)
//!     |  Lebenszyklus: Connecting -> Connected -> Disconnected
//!     |
//!     v
//! EventDispatcher
//!     |
//!     +-- PresenceRegistry (wer ist verbunden, unter welchem Namen)
//!     +-- ChatHandler      (Nachricht trimmen, stempeln, an alle)
//!     +-- SignalHandler    (Join, Leave, Offer, Answer, Ice, RaumEnde)
//!     +-- RoomAuthority    (Host-Slot pro Raum, erster Beitretender gewinnt)
//!
//! EventBroadcaster – Ereignisse an eine Verbindung, einen Raum oder alle
//! ```

pub mod broadcast;
pub mod connection;
pub mod dispatcher;
pub mod error;
pub mod handlers;
pub mod presence;
pub mod rooms;
pub mod server_state;
pub mod tcp;

// Bequeme Re-Exporte
pub use broadcast::EventBroadcaster;
pub use connection::ClientConnection;
pub use dispatcher::EventDispatcher;
pub use error::{SignalingError, SignalingResult};
pub use presence::PresenceRegistry;
pub use rooms::RoomAuthority;
pub use server_state::{SignalingConfig, SignalingState};
pub use tcp::SignalingServer;
