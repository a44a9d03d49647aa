//! Signal-Handler – Raum-Beitritt, Punkt-zu-Punkt-Weiterleitung, Raum-Ende
//!
//! Pro (Verbindung, Raum)-Paar gilt die Zustandsfolge
//! Unjoined -> Joined -> Left; ein erneuter Beitritt startet den Zyklus
//! neu. Die Mitgliedschaft ist pro Raum unabhaengig.
//!
//! Jede Operation prueft ihre Pflichtfelder und verwirft fehlerhafte
//! Ereignisse still – der Absender bekommt keine Fehlermeldung. Einzige
//! Ausnahme ist die abgelehnte Beenden-Anfrage eines Nicht-Hosts: sie wird
//! mit einer regulaeren Protokoll-Nachricht beantwortet.

use std::sync::Arc;
use treffpunkt_core::types::{ConnectionId, RoomId};
use treffpunkt_protocol::control::{
    RoomEndRequest, RoomLeaveRequest, ServerEvent, SignalAnswerEvent, SignalAnswerRequest,
    SignalIceEvent, SignalIceRequest, SignalJoinRequest, SignalJoinedEvent, SignalLeaveRequest,
    SignalLeftEvent, SignalOfferEvent, SignalOfferRequest,
};

use crate::server_state::SignalingState;

/// Verarbeitet einen Raum-Beitritt
///
/// Der erste Beitretende beansprucht den Host-Slot. Die uebrigen
/// Mitglieder (nicht der Beitretende selbst) werden benachrichtigt.
pub fn handle_join(
    connection_id: ConnectionId,
    request: SignalJoinRequest,
    state: &Arc<SignalingState>,
) {
    let raum = request.room;
    if raum.ist_leer() {
        tracing::debug!(conn_id = %connection_id, "Beitritt ohne Raum-Name verworfen");
        return;
    }

    state.broadcaster.raum_beitreten(connection_id, &raum);
    state.rooms.host_beanspruchen(&raum, connection_id);

    state.broadcaster.an_raum_ausser_senden(
        &raum,
        &connection_id,
        ServerEvent::SignalJoined(SignalJoinedEvent {
            from: connection_id,
        }),
    );

    tracing::info!(conn_id = %connection_id, raum = %raum, "Raum beigetreten");
}

/// Verarbeitet ein Raum-Verlassen (Signaling-Pfad)
pub fn handle_leave(
    connection_id: ConnectionId,
    request: SignalLeaveRequest,
    state: &Arc<SignalingState>,
) {
    raum_verlassen(connection_id, request.room, state);
}

/// Verarbeitet ein freiwilliges "Meeting verlassen"
///
/// Derzeit dasselbe beobachtbare Verhalten wie [`handle_leave`]; bewusst
/// ein eigener Einstiegspunkt, damit beide Pfade spaeter unabhaengige
/// Richtlinien bekommen koennen.
pub fn handle_room_leave(
    connection_id: ConnectionId,
    request: RoomLeaveRequest,
    state: &Arc<SignalingState>,
) {
    raum_verlassen(connection_id, request.room, state);
}

fn raum_verlassen(connection_id: ConnectionId, raum: RoomId, state: &Arc<SignalingState>) {
    if raum.ist_leer() {
        tracing::debug!(conn_id = %connection_id, "Verlassen ohne Raum-Name verworfen");
        return;
    }

    state.broadcaster.raum_verlassen(&connection_id, &raum);

    state.broadcaster.an_raum_senden(
        &raum,
        ServerEvent::SignalLeft(SignalLeftEvent {
            from: connection_id,
        }),
    );

    tracing::info!(conn_id = %connection_id, raum = %raum, "Raum verlassen");
}

/// Leitet ein SDP-Offer an die Ziel-Verbindung weiter
///
/// Punkt-zu-Punkt: nur das Ziel erhaelt das Ereignis, markiert mit dem
/// Absender. Das `room`-Feld wird als Kontext mitgefuehrt, die
/// Mitgliedschaft aber nicht nachgeprueft.
pub fn handle_offer(
    connection_id: ConnectionId,
    request: SignalOfferRequest,
    state: &Arc<SignalingState>,
) {
    if request.room.ist_leer() || request.offer.is_null() {
        tracing::debug!(conn_id = %connection_id, "Unvollstaendiges Offer verworfen");
        return;
    }
    let Some(ziel) = request.to else {
        tracing::debug!(conn_id = %connection_id, "Offer ohne Ziel verworfen");
        return;
    };

    let zugestellt = state.broadcaster.an_verbindung_senden(
        &ziel,
        ServerEvent::SignalOffer(SignalOfferEvent {
            from: connection_id,
            offer: request.offer,
        }),
    );

    tracing::debug!(von = %connection_id, an = %ziel, zugestellt, "Offer weitergeleitet");
}

/// Leitet eine SDP-Answer an die Ziel-Verbindung weiter
pub fn handle_answer(
    connection_id: ConnectionId,
    request: SignalAnswerRequest,
    state: &Arc<SignalingState>,
) {
    if request.room.ist_leer() || request.answer.is_null() {
        tracing::debug!(conn_id = %connection_id, "Unvollstaendige Answer verworfen");
        return;
    }
    let Some(ziel) = request.to else {
        tracing::debug!(conn_id = %connection_id, "Answer ohne Ziel verworfen");
        return;
    };

    let zugestellt = state.broadcaster.an_verbindung_senden(
        &ziel,
        ServerEvent::SignalAnswer(SignalAnswerEvent {
            from: connection_id,
            answer: request.answer,
        }),
    );

    tracing::debug!(von = %connection_id, an = %ziel, zugestellt, "Answer weitergeleitet");
}

/// Leitet einen ICE-Candidate an die Ziel-Verbindung weiter
pub fn handle_ice(
    connection_id: ConnectionId,
    request: SignalIceRequest,
    state: &Arc<SignalingState>,
) {
    if request.room.ist_leer() || request.candidate.is_null() {
        tracing::debug!(conn_id = %connection_id, "Unvollstaendiger Candidate verworfen");
        return;
    }
    let Some(ziel) = request.to else {
        tracing::debug!(conn_id = %connection_id, "Candidate ohne Ziel verworfen");
        return;
    };

    let zugestellt = state.broadcaster.an_verbindung_senden(
        &ziel,
        ServerEvent::SignalIce(SignalIceEvent {
            from: connection_id,
            candidate: request.candidate,
        }),
    );

    tracing::debug!(von = %connection_id, an = %ziel, zugestellt, "Candidate weitergeleitet");
}

/// Verarbeitet eine Beenden-Anfrage fuer einen Raum
///
/// Nur der Host darf beenden: alle Mitglieder erhalten `room-ended`, der
/// Host-Slot wird geraeumt und die Mitgliedschaft des Raums vollstaendig
/// geleert (einschliesslich des Anfragers). Ein Nicht-Host erhaelt nur
/// `room-end-denied`; Raum und Mitgliedschaft bleiben unveraendert.
pub fn handle_room_end(
    connection_id: ConnectionId,
    request: RoomEndRequest,
    state: &Arc<SignalingState>,
) {
    let raum = request.room;
    if raum.ist_leer() {
        tracing::debug!(conn_id = %connection_id, "Beenden-Anfrage ohne Raum-Name verworfen");
        return;
    }

    if !state.rooms.ist_host(&raum, &connection_id) {
        state
            .broadcaster
            .an_verbindung_senden(&connection_id, ServerEvent::RoomEndDenied);
        tracing::info!(conn_id = %connection_id, raum = %raum, "Beenden-Anfrage abgelehnt (kein Host)");
        return;
    }

    // Reihenfolge: erst benachrichtigen, dann Host-Slot raeumen, dann die
    // Mitgliedschaft zwangsweise leeren.
    state.broadcaster.an_raum_senden(&raum, ServerEvent::RoomEnded);
    state.rooms.beenden(&raum);
    let entfernt = state.broadcaster.raum_raeumen(&raum);

    tracing::info!(
        conn_id = %connection_id,
        raum = %raum,
        mitglieder = entfernt.len(),
        "Raum-Sitzung beendet"
    );
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
