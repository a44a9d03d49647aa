//! Chat-Handler – Nachrichten an alle Teilnehmer verteilen
//!
//! Der Relay speichert nichts: eine Chat-Nachricht wird validiert, mit
//! Absender-Identitaet und Zeitstempel versehen und an alle verbundenen
//! Teilnehmer verteilt – einschliesslich des Absenders (Echo, kein
//! Ausschluss).

use std::sync::Arc;
use treffpunkt_core::types::ConnectionId;
use treffpunkt_protocol::control::{ChatSendRequest, ServerEvent};

use crate::server_state::SignalingState;

/// Verarbeitet eine Chat-Nachricht
///
/// - Leere Nachricht (nach Trim): still verworfen, kein Broadcast
/// - Absender-Identitaet: Payload-`user_id`, sonst Presence-Registry,
///   sonst die `connection_id` als letzte Anzeige-Identitaet
/// - Zeitstempel: Payload-Wert falls vorhanden, sonst Serverzeit beim
///   Weiterleiten (RFC 3339)
pub fn handle_chat_send(
    connection_id: ConnectionId,
    request: ChatSendRequest,
    state: &Arc<SignalingState>,
) {
    let nachricht = request.message.trim();
    if nachricht.is_empty() {
        tracing::debug!(conn_id = %connection_id, "Leere Chat-Nachricht verworfen");
        return;
    }

    let user_id = request
        .user_id
        .filter(|uid| !uid.is_empty())
        .or_else(|| {
            state
                .presence
                .teilnehmer(&connection_id)
                .map(|t| t.user_id)
                .filter(|uid| !uid.is_empty())
        })
        .unwrap_or_else(|| connection_id.to_string());

    let timestamp = request
        .timestamp
        .filter(|ts| !ts.is_empty())
        .unwrap_or_else(|| chrono::Utc::now().to_rfc3339());

    let empfaenger = state.broadcaster.an_alle_senden(ServerEvent::chat_message(
        user_id.clone(),
        nachricht,
        timestamp,
    ));

    tracing::debug!(
        conn_id = %connection_id,
        user_id = %user_id,
        empfaenger,
        "Chat-Nachricht verteilt"
    );
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
