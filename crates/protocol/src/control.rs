//! Ereignis-Protokoll zwischen Client und Relay
//!
//! Definiert alle Ereignisse die ueber die TCP-Verbindung zwischen Client
//! und Server ausgetauscht werden.
//!
//! ## Design
//! - Getrennte Enums fuer beide Richtungen: `ClientEvent` (eingehend) und
//!   `ServerEvent` (ausgehend) – der Relay spricht je Richtung ein anderes
//!   Vokabular
//! - JSON-Serialisierung via serde, Tagged Enums fuer typsichere
//!   Ereignistypen ("type"-Feld mit kebab-case Namen)
//! - Payload-Felder auf dem Draht in camelCase
//! - Offer/Answer/Candidate sind opake `serde_json::Value` – der Relay
//!   leitet sie nur weiter und interpretiert sie nie
//! - Pflichtfelder tragen `#[serde(default)]`: ein fehlendes Feld ergibt
//!   ein leeres/Null-Payload das der Handler still verwirft, statt die
//!   Verbindung an einem Parse-Fehler scheitern zu lassen

use serde::{Deserialize, Serialize};
use serde_json::Value;
use treffpunkt_core::types::{ConnectionId, RoomId};

// ---------------------------------------------------------------------------
// Eingehende Ereignisse (Client -> Server)
// ---------------------------------------------------------------------------

/// Identitaet ankuendigen oder umbenennen
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IdentifyRequest {
    /// Vom Client gewaehlter Anzeigename (leer = ignoriert)
    #[serde(default)]
    pub user_id: String,
}

/// Chat-Nachricht an alle Teilnehmer
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatSendRequest {
    /// Absender-Identitaet (optional – sonst Presence-Registry bzw. ConnectionId)
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub message: String,
    /// Client-Zeitstempel (optional – sonst stempelt der Relay)
    #[serde(default)]
    pub timestamp: Option<String>,
}

/// Raum beitreten
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignalJoinRequest {
    #[serde(default)]
    pub room: RoomId,
}

/// Raum verlassen (Signaling-Pfad)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignalLeaveRequest {
    #[serde(default)]
    pub room: RoomId,
}

/// SDP-Offer an einen bestimmten Teilnehmer weiterleiten
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignalOfferRequest {
    #[serde(default)]
    pub room: RoomId,
    /// Ziel-Verbindung (fehlend = Ereignis wird verworfen)
    #[serde(default)]
    pub to: Option<ConnectionId>,
    #[serde(default)]
    pub offer: Value,
}

/// SDP-Answer an einen bestimmten Teilnehmer weiterleiten
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignalAnswerRequest {
    #[serde(default)]
    pub room: RoomId,
    #[serde(default)]
    pub to: Option<ConnectionId>,
    #[serde(default)]
    pub answer: Value,
}

/// ICE-Candidate an einen bestimmten Teilnehmer weiterleiten
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignalIceRequest {
    #[serde(default)]
    pub room: RoomId,
    #[serde(default)]
    pub to: Option<ConnectionId>,
    #[serde(default)]
    pub candidate: Value,
}

/// Raum-Sitzung beenden (nur der Host darf das)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomEndRequest {
    #[serde(default)]
    pub room: RoomId,
}

/// Raum freiwillig verlassen ("Meeting verlassen")
///
/// Getrennt von [`SignalLeaveRequest`] obwohl das Ergebnis derzeit gleich
/// ist – beide Pfade koennen spaeter unabhaengige Richtlinien bekommen.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomLeaveRequest {
    #[serde(default)]
    pub room: RoomId,
}

/// Pong-Antwort auf ein Server-Ping (spiegelt Timestamp zurueck)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PongMessage {
    #[serde(default)]
    pub echo_timestamp_ms: u64,
}

/// Alle eingehenden Ereignisse (typsicher via Tagged Enum)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ClientEvent {
    Identify(IdentifyRequest),
    ChatSend(ChatSendRequest),
    SignalJoin(SignalJoinRequest),
    SignalLeave(SignalLeaveRequest),
    SignalOffer(SignalOfferRequest),
    SignalAnswer(SignalAnswerRequest),
    SignalIce(SignalIceRequest),
    RoomEndRequest(RoomEndRequest),
    RoomLeave(RoomLeaveRequest),
    Pong(PongMessage),
}

impl ClientEvent {
    /// Serialisiert das Ereignis als JSON
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    /// Deserialisiert ein Ereignis aus JSON
    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }
}

// ---------------------------------------------------------------------------
// Ausgehende Ereignisse (Server -> Client)
// ---------------------------------------------------------------------------

/// Ein Eintrag im Presence-Schnappschuss
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TeilnehmerInfo {
    pub connection_id: ConnectionId,
    /// Leer solange der Client sich noch nicht identifiziert hat
    pub user_id: String,
}

/// Vollstaendiger Presence-Schnappschuss (Beitritts-Reihenfolge)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PresenceUpdateEvent {
    pub participants: Vec<TeilnehmerInfo>,
}

/// Chat-Nachricht an alle Teilnehmer (inklusive Absender)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessageEvent {
    pub user_id: String,
    pub message: String,
    /// RFC-3339-Zeitstempel (sortierbar)
    pub timestamp: String,
}

/// Ein Peer ist dem Raum beigetreten (an die uebrigen Mitglieder)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignalJoinedEvent {
    pub from: ConnectionId,
}

/// Ein Peer hat den Raum verlassen (an die verbleibenden Mitglieder)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignalLeftEvent {
    pub from: ConnectionId,
}

/// Weitergeleitetes SDP-Offer (nur an das Ziel)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignalOfferEvent {
    pub from: ConnectionId,
    pub offer: Value,
}

/// Weitergeleitete SDP-Answer (nur an das Ziel)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignalAnswerEvent {
    pub from: ConnectionId,
    pub answer: Value,
}

/// Weitergeleiteter ICE-Candidate (nur an das Ziel)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignalIceEvent {
    pub from: ConnectionId,
    pub candidate: Value,
}

/// Eine Identitaet ist auf eine andere Verbindung umgezogen
///
/// Wird an die bisherige und die neue Verbindung gesendet wenn ein
/// `identify` eine bereits vergebene Identitaet uebernimmt.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IdentityReassignedEvent {
    pub user_id: String,
    /// Verbindung die die Identitaet bisher trug
    pub from: ConnectionId,
    /// Verbindung die die Identitaet uebernommen hat
    pub to: ConnectionId,
}

/// Ping (Server -> Client, Keepalive)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PingMessage {
    /// Unix-Timestamp in Millisekunden fuer RTT-Messung
    pub timestamp_ms: u64,
}

/// Alle ausgehenden Ereignisse
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ServerEvent {
    PresenceUpdate(PresenceUpdateEvent),
    ChatMessage(ChatMessageEvent),
    SignalJoined(SignalJoinedEvent),
    SignalLeft(SignalLeftEvent),
    SignalOffer(SignalOfferEvent),
    SignalAnswer(SignalAnswerEvent),
    SignalIce(SignalIceEvent),
    /// Der Host hat die Raum-Sitzung beendet (an alle Mitglieder)
    RoomEnded,
    /// Beenden-Anfrage eines Nicht-Hosts abgelehnt (nur an den Anfrager)
    RoomEndDenied,
    IdentityReassigned(IdentityReassignedEvent),
    Ping(PingMessage),
}

impl ServerEvent {
    /// Erstellt einen Presence-Schnappschuss
    pub fn presence_update(participants: Vec<TeilnehmerInfo>) -> Self {
        Self::PresenceUpdate(PresenceUpdateEvent { participants })
    }

    /// Erstellt eine Chat-Nachricht
    pub fn chat_message(
        user_id: impl Into<String>,
        message: impl Into<String>,
        timestamp: impl Into<String>,
    ) -> Self {
        Self::ChatMessage(ChatMessageEvent {
            user_id: user_id.into(),
            message: message.into(),
            timestamp: timestamp.into(),
        })
    }

    /// Erstellt eine Ping-Nachricht
    pub fn ping(timestamp_ms: u64) -> Self {
        Self::Ping(PingMessage { timestamp_ms })
    }

    /// Serialisiert das Ereignis als JSON
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    /// Deserialisiert ein Ereignis aus JSON
    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_event_tags_sind_kebab_case() {
        let faelle = [
            (
                ClientEvent::Identify(IdentifyRequest {
                    user_id: "alice".into(),
                }),
                "identify",
            ),
            (
                ClientEvent::SignalJoin(SignalJoinRequest {
                    room: RoomId::new("r1"),
                }),
                "signal-join",
            ),
            (
                ClientEvent::RoomEndRequest(RoomEndRequest {
                    room: RoomId::new("r1"),
                }),
                "room-end-request",
            ),
            (
                ClientEvent::RoomLeave(RoomLeaveRequest {
                    room: RoomId::new("r1"),
                }),
                "room-leave",
            ),
        ];

        for (event, tag) in &faelle {
            let json = event.to_json().unwrap();
            assert!(
                json.contains(&format!("\"type\":\"{}\"", tag)),
                "Tag '{}' fehlt in {}",
                tag,
                json
            );
        }
    }

    #[test]
    fn felder_auf_dem_draht_sind_camel_case() {
        let event = ServerEvent::presence_update(vec![TeilnehmerInfo {
            connection_id: ConnectionId::new(),
            user_id: "bob".into(),
        }]);
        let json = event.to_json().unwrap();
        assert!(json.contains("\"connectionId\""));
        assert!(json.contains("\"userId\""));
    }

    #[test]
    fn chat_send_round_trip() {
        let json = r#"{"type":"chat-send","userId":"alice","message":"hallo","timestamp":"2026-01-01T00:00:00Z"}"#;
        let event = ClientEvent::from_json(json).unwrap();
        if let ClientEvent::ChatSend(req) = event {
            assert_eq!(req.user_id.as_deref(), Some("alice"));
            assert_eq!(req.message, "hallo");
        } else {
            panic!("Erwartet ChatSend-Payload");
        }
    }

    #[test]
    fn fehlende_felder_ergeben_leere_defaults() {
        // Ein Client der Pflichtfelder weglaesst darf die Verbindung nicht
        // zum Absturz bringen – der Handler verwirft das Ereignis dann still.
        let event = ClientEvent::from_json(r#"{"type":"chat-send"}"#).unwrap();
        if let ClientEvent::ChatSend(req) = event {
            assert!(req.message.is_empty());
            assert!(req.user_id.is_none());
        } else {
            panic!("Erwartet ChatSend-Payload");
        }

        let event = ClientEvent::from_json(r#"{"type":"signal-offer","room":"r1"}"#).unwrap();
        if let ClientEvent::SignalOffer(req) = event {
            assert!(req.to.is_none());
            assert!(req.offer.is_null());
        } else {
            panic!("Erwartet SignalOffer-Payload");
        }
    }

    #[test]
    fn offer_payload_bleibt_opak() {
        let offer = serde_json::json!({"sdp": "v=0...", "typ": "offer", "extra": [1, 2, 3]});
        let event = ServerEvent::SignalOffer(SignalOfferEvent {
            from: ConnectionId::new(),
            offer: offer.clone(),
        });
        let json = event.to_json().unwrap();
        let decoded = ServerEvent::from_json(&json).unwrap();
        if let ServerEvent::SignalOffer(e) = decoded {
            assert_eq!(e.offer, offer, "Offer muss unveraendert durchgereicht werden");
        } else {
            panic!("Erwartet SignalOffer-Payload");
        }
    }

    #[test]
    fn room_ended_ohne_payload() {
        let json = ServerEvent::RoomEnded.to_json().unwrap();
        assert_eq!(json, r#"{"type":"room-ended"}"#);
        let json = ServerEvent::RoomEndDenied.to_json().unwrap();
        assert_eq!(json, r#"{"type":"room-end-denied"}"#);
    }

    #[test]
    fn ping_pong_serialisierung() {
        let ping = ServerEvent::ping(1234567890);
        let json = ping.to_json().unwrap();
        assert!(json.contains("\"timestampMs\":1234567890"));

        let pong = ClientEvent::from_json(r#"{"type":"pong","echoTimestampMs":1234567890}"#).unwrap();
        if let ClientEvent::Pong(p) = pong {
            assert_eq!(p.echo_timestamp_ms, 1234567890);
        } else {
            panic!("Erwartet Pong-Payload");
        }
    }

    #[test]
    fn identity_reassigned_serialisierung() {
        let von = ConnectionId::new();
        let zu = ConnectionId::new();
        let event = ServerEvent::IdentityReassigned(IdentityReassignedEvent {
            user_id: "alice".into(),
            from: von,
            to: zu,
        });
        let json = event.to_json().unwrap();
        let decoded = ServerEvent::from_json(&json).unwrap();
        if let ServerEvent::IdentityReassigned(e) = decoded {
            assert_eq!(e.from, von);
            assert_eq!(e.to, zu);
            assert_eq!(e.user_id, "alice");
        } else {
            panic!("Erwartet IdentityReassigned-Payload");
        }
    }
}
