//! Event-Dispatcher – Routet Client-Ereignisse an die richtigen Handler
//!
//! Der Dispatcher ist der Lebenszyklus-Koordinator jeder Verbindung:
//! er reagiert auf Connect/Disconnect des Transports und verteilt alle
//! eingehenden Ereignisse an Presence-Registry, Chat- und Signal-Handler.
//!
//! ## Zustandsfolge pro Verbindung
//! ```text
//! Connecting -> Connected -> Disconnected (terminal)
//! ```
//!
//! Jedes Ereignis wird vollstaendig verarbeitet (alle Mutationen und alle
//! ausgehenden Sendungen) bevor das naechste Ereignis derselben Verbindung
//! an die Reihe kommt. Kein Handler blockiert oder suspendiert; Ereignisse
//! verschiedener Verbindungen duerfen beliebig verzahnt eintreffen.

use std::sync::Arc;
use treffpunkt_core::types::ConnectionId;
use treffpunkt_protocol::control::{
    ClientEvent, IdentityReassignedEvent, ServerEvent, TeilnehmerInfo,
};

use crate::handlers::{chat_handler, signal_handler};
use crate::presence::AnkuendigungsErgebnis;
use crate::server_state::SignalingState;

/// Zentraler Event-Dispatcher und Lebenszyklus-Koordinator
pub struct EventDispatcher {
    state: Arc<SignalingState>,
}

impl EventDispatcher {
    /// Erstellt einen neuen Dispatcher
    pub fn neu(state: Arc<SignalingState>) -> Self {
        Self { state }
    }

    /// Behandelt den Verbindungsaufbau einer neuen Verbindung
    ///
    /// Die Verbindung muss zu diesem Zeitpunkt bereits im Broadcaster
    /// registriert sein, damit sie den Schnappschuss selbst mitbekommt.
    pub fn client_verbunden(&self, connection_id: ConnectionId) {
        self.state.presence.verbinden(connection_id);
        self.presence_verteilen();
    }

    /// Verarbeitet ein eingehendes Client-Ereignis
    pub fn dispatch(&self, connection_id: ConnectionId, ereignis: ClientEvent) {
        match ereignis {
            // -----------------------------------------------------------
            // Identitaet
            // -----------------------------------------------------------
            ClientEvent::Identify(req) => {
                let ergebnis = self
                    .state
                    .presence
                    .ankuendigen(connection_id, &req.user_id);

                if let AnkuendigungsErgebnis::Uebernommen { vorher } = &ergebnis {
                    // Identitaets-Uebernahme sichtbar machen: die bisherige
                    // und die neue Verbindung werden informiert.
                    let notiz = ServerEvent::IdentityReassigned(IdentityReassignedEvent {
                        user_id: req.user_id.clone(),
                        from: *vorher,
                        to: connection_id,
                    });
                    self.state.broadcaster.an_verbindung_senden(vorher, notiz.clone());
                    self.state
                        .broadcaster
                        .an_verbindung_senden(&connection_id, notiz);
                }

                if ergebnis.hat_mutiert() {
                    self.presence_verteilen();
                }
            }

            // -----------------------------------------------------------
            // Chat
            // -----------------------------------------------------------
            ClientEvent::ChatSend(req) => {
                chat_handler::handle_chat_send(connection_id, req, &self.state);
            }

            // -----------------------------------------------------------
            // Signaling
            // -----------------------------------------------------------
            ClientEvent::SignalJoin(req) => {
                signal_handler::handle_join(connection_id, req, &self.state);
            }
            ClientEvent::SignalLeave(req) => {
                signal_handler::handle_leave(connection_id, req, &self.state);
            }
            ClientEvent::SignalOffer(req) => {
                signal_handler::handle_offer(connection_id, req, &self.state);
            }
            ClientEvent::SignalAnswer(req) => {
                signal_handler::handle_answer(connection_id, req, &self.state);
            }
            ClientEvent::SignalIce(req) => {
                signal_handler::handle_ice(connection_id, req, &self.state);
            }
            ClientEvent::RoomEndRequest(req) => {
                signal_handler::handle_room_end(connection_id, req, &self.state);
            }
            ClientEvent::RoomLeave(req) => {
                signal_handler::handle_room_leave(connection_id, req, &self.state);
            }

            // -----------------------------------------------------------
            // Keepalive
            // -----------------------------------------------------------
            ClientEvent::Pong(_) => {
                // Jedes empfangene Frame zaehlt als Lebenszeichen; hier nur loggen
                tracing::trace!(conn_id = %connection_id, "Pong empfangen");
            }
        }
    }

    /// Behandelt die Trennung einer Verbindung (terminal)
    ///
    /// Presence-Eintrag und Host-Slots werden geraeumt bevor der
    /// Schnappschuss verteilt wird, damit Beobachter nur konsistenten
    /// Zustand sehen.
    pub fn client_getrennt(&self, connection_id: ConnectionId) {
        self.state.presence.getrennt(&connection_id);
        let freigegebene_raeume = self.state.rooms.freigeben_wenn_host(&connection_id);
        self.state.broadcaster.client_entfernen(&connection_id);

        self.presence_verteilen();

        tracing::debug!(
            conn_id = %connection_id,
            freigegebene_raeume = freigegebene_raeume.len(),
            "Verbindungs-Ressourcen bereinigt"
        );
    }

    /// Verteilt den aktuellen Presence-Schnappschuss an alle Verbindungen
    fn presence_verteilen(&self) {
        let participants: Vec<TeilnehmerInfo> = self
            .state
            .presence
            .schnappschuss()
            .into_iter()
            .map(|t| TeilnehmerInfo {
                connection_id: t.connection_id,
                user_id: t.user_id,
            })
            .collect();

        self.state
            .broadcaster
            .an_alle_senden(ServerEvent::presence_update(participants));
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::server_state::SignalingConfig;
    use tokio::sync::mpsc;
    use treffpunkt_core::types::RoomId;
    use treffpunkt_protocol::control::{
        ChatSendRequest, IdentifyRequest, RoomEndRequest, SignalJoinRequest,
    };

    struct TestUmgebung {
        state: Arc<SignalingState>,
        dispatcher: EventDispatcher,
    }

    impl TestUmgebung {
        fn neu() -> Self {
            let state = SignalingState::neu(SignalingConfig::default());
            let dispatcher = EventDispatcher::neu(Arc::clone(&state));
            Self { state, dispatcher }
        }

        /// Simuliert einen Transport-Connect: registrieren + Lebenszyklus
        fn verbinden(&self) -> (ConnectionId, mpsc::Receiver<ServerEvent>) {
            let conn = ConnectionId::new();
            let rx = self.state.broadcaster.client_registrieren(conn);
            self.dispatcher.client_verbunden(conn);
            (conn, rx)
        }

        fn identify(&self, conn: ConnectionId, name: &str) {
            self.dispatcher.dispatch(
                conn,
                ClientEvent::Identify(IdentifyRequest {
                    user_id: name.to_string(),
                }),
            );
        }

        fn join(&self, conn: ConnectionId, raum: &str) {
            self.dispatcher.dispatch(
                conn,
                ClientEvent::SignalJoin(SignalJoinRequest {
                    room: RoomId::new(raum),
                }),
            );
        }
    }

    fn letzter_schnappschuss(rx: &mut mpsc::Receiver<ServerEvent>) -> Vec<TeilnehmerInfo> {
        let mut letzter = None;
        while let Ok(ereignis) = rx.try_recv() {
            if let ServerEvent::PresenceUpdate(e) = ereignis {
                letzter = Some(e.participants);
            }
        }
        letzter.expect("Mindestens ein Presence-Schnappschuss erwartet")
    }

    #[tokio::test]
    async fn n_connects_ergeben_n_eintraege() {
        let umgebung = TestUmgebung::neu();
        let (_c1, _rx1) = umgebung.verbinden();
        let (_c2, _rx2) = umgebung.verbinden();
        let (_c3, mut rx3) = umgebung.verbinden();

        let schnappschuss = letzter_schnappschuss(&mut rx3);
        assert_eq!(schnappschuss.len(), 3);
    }

    #[tokio::test]
    async fn connect_disconnect_hinterlaesst_keine_reste() {
        let umgebung = TestUmgebung::neu();
        let (_c1, mut rx1) = umgebung.verbinden();
        let vorher = letzter_schnappschuss(&mut rx1);

        let (c2, _rx2) = umgebung.verbinden();
        umgebung.dispatcher.client_getrennt(c2);

        let nachher = letzter_schnappschuss(&mut rx1);
        assert_eq!(nachher, vorher);
    }

    #[tokio::test]
    async fn identify_verteilt_neuen_schnappschuss() {
        let umgebung = TestUmgebung::neu();
        let (c1, mut rx1) = umgebung.verbinden();

        umgebung.identify(c1, "alice");

        let schnappschuss = letzter_schnappschuss(&mut rx1);
        assert_eq!(schnappschuss.len(), 1);
        assert_eq!(schnappschuss[0].user_id, "alice");
        assert_eq!(schnappschuss[0].connection_id, c1);
    }

    #[tokio::test]
    async fn leeres_identify_verteilt_nichts() {
        let umgebung = TestUmgebung::neu();
        let (c1, mut rx1) = umgebung.verbinden();
        let _ = letzter_schnappschuss(&mut rx1); // Connect-Schnappschuss abraeumen

        umgebung.identify(c1, "");

        assert!(rx1.try_recv().is_err(), "Kein Broadcast fuer leeres identify");
    }

    #[tokio::test]
    async fn identitaets_uebernahme_benachrichtigt_beide_seiten() {
        let umgebung = TestUmgebung::neu();
        let (c1, mut rx1) = umgebung.verbinden();
        let (c2, mut rx2) = umgebung.verbinden();

        umgebung.identify(c1, "alice");
        // c2 ist verbunden, meldet aber denselben Namen an nachdem sein
        // eigener Eintrag entfernt wurde (z.B. Reconnect-Szenario).
        umgebung.state.presence.getrennt(&c2);
        umgebung.identify(c2, "alice");

        let reassigned_an = |rx: &mut mpsc::Receiver<ServerEvent>| {
            let mut gefunden = None;
            while let Ok(ereignis) = rx.try_recv() {
                if let ServerEvent::IdentityReassigned(e) = ereignis {
                    gefunden = Some(e);
                }
            }
            gefunden
        };

        let an_alt = reassigned_an(&mut rx1).expect("Notiz an bisherige Verbindung");
        assert_eq!(an_alt.from, c1);
        assert_eq!(an_alt.to, c2);
        assert_eq!(an_alt.user_id, "alice");
        assert!(reassigned_an(&mut rx2).is_some(), "Notiz an Uebernehmer");

        // Genau ein Eintrag traegt den Namen, beim juengsten Ankuendiger
        let schnappschuss = umgebung.state.presence.schnappschuss();
        let traeger: Vec<_> = schnappschuss.iter().filter(|t| t.user_id == "alice").collect();
        assert_eq!(traeger.len(), 1);
        assert_eq!(traeger[0].connection_id, c2);
    }

    #[tokio::test]
    async fn chat_ende_zu_ende() {
        // connect(c1) -> identify(alice) -> connect(c2) -> identify(bob)
        // -> chat "  hi  " von c1 => chat-message an beide mit "hi"/alice
        let umgebung = TestUmgebung::neu();
        let (c1, mut rx1) = umgebung.verbinden();
        umgebung.identify(c1, "alice");
        let (c2, mut rx2) = umgebung.verbinden();
        umgebung.identify(c2, "bob");

        umgebung.dispatcher.dispatch(
            c1,
            ClientEvent::ChatSend(ChatSendRequest {
                user_id: None,
                message: "  hi  ".to_string(),
                timestamp: None,
            }),
        );

        for rx in [&mut rx1, &mut rx2] {
            let mut chat = None;
            while let Ok(ereignis) = rx.try_recv() {
                if let ServerEvent::ChatMessage(e) = ereignis {
                    chat = Some(e);
                }
            }
            let chat = chat.expect("Chat-Nachricht an beide Teilnehmer");
            assert_eq!(chat.user_id, "alice");
            assert_eq!(chat.message, "hi");
            assert!(!chat.timestamp.is_empty());
        }
    }

    #[tokio::test]
    async fn raum_ende_nur_durch_den_host() {
        // join(c1) -> join(c2): c1 ist Host. Beenden durch c2 wird
        // abgelehnt; Beenden durch c1 verteilt room-ended und raeumt den Slot.
        let umgebung = TestUmgebung::neu();
        let (c1, mut rx1) = umgebung.verbinden();
        let (c2, mut rx2) = umgebung.verbinden();
        let raum = RoomId::new("r1");

        umgebung.join(c1, "r1");
        umgebung.join(c2, "r1");

        umgebung.dispatcher.dispatch(
            c2,
            ClientEvent::RoomEndRequest(RoomEndRequest {
                room: RoomId::new("r1"),
            }),
        );

        let hat_ereignis = |rx: &mut mpsc::Receiver<ServerEvent>, gesucht: fn(&ServerEvent) -> bool| {
            let mut gefunden = false;
            while let Ok(ereignis) = rx.try_recv() {
                if gesucht(&ereignis) {
                    gefunden = true;
                }
            }
            gefunden
        };

        assert!(hat_ereignis(&mut rx2, |e| matches!(e, ServerEvent::RoomEndDenied)));
        assert!(!hat_ereignis(&mut rx1, |e| matches!(e, ServerEvent::RoomEnded)));
        assert!(umgebung.state.rooms.ist_host(&raum, &c1));

        umgebung.dispatcher.dispatch(
            c1,
            ClientEvent::RoomEndRequest(RoomEndRequest {
                room: RoomId::new("r1"),
            }),
        );

        assert!(hat_ereignis(&mut rx1, |e| matches!(e, ServerEvent::RoomEnded)));
        assert!(hat_ereignis(&mut rx2, |e| matches!(e, ServerEvent::RoomEnded)));
        assert_eq!(umgebung.state.rooms.host_von(&raum), None);
    }

    #[tokio::test]
    async fn host_trennung_gibt_den_slot_fuer_den_naechsten_frei() {
        let umgebung = TestUmgebung::neu();
        let (c1, _rx1) = umgebung.verbinden();
        let (c2, _rx2) = umgebung.verbinden();
        let raum = RoomId::new("r1");

        umgebung.join(c1, "r1");
        assert!(umgebung.state.rooms.ist_host(&raum, &c1));

        umgebung.dispatcher.client_getrennt(c1);
        assert_eq!(umgebung.state.rooms.host_von(&raum), None);

        umgebung.join(c2, "r1");
        assert!(umgebung.state.rooms.ist_host(&raum, &c2));
    }

    #[tokio::test]
    async fn trennung_waehrend_laufendem_raum_zustand() {
        // Disconnect verzahnt mit einem verspaeteten Join derselben
        // Verbindung: es bleibt hoechstens eine haengende Mitgliedschaft,
        // Presence und Host-Slots bleiben unversehrt.
        let umgebung = TestUmgebung::neu();
        let (c1, _rx1) = umgebung.verbinden();
        let (c2, mut rx2) = umgebung.verbinden();
        let raum = RoomId::new("r1");

        umgebung.join(c2, "r1");
        umgebung.dispatcher.client_getrennt(c1);
        // Verspaetetes Join der bereits getrennten Verbindung
        umgebung.join(c1, "r1");

        let schnappschuss = letzter_schnappschuss(&mut rx2);
        assert_eq!(schnappschuss.len(), 1, "Presence kennt c1 nicht mehr");
        assert_eq!(schnappschuss[0].connection_id, c2);
        assert!(umgebung.state.rooms.ist_host(&raum, &c2));
    }
}
