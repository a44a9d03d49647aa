//! Client-Connection – Verwaltet eine einzelne TCP-Verbindung
//!
//! Jede TCP-Verbindung bekommt eine `ClientConnection` in einem eigenen
//! tokio-Task. Die Verbindungs-ID wird hier beim Aufbau vergeben und bleibt
//! fuer die Lebensdauer der Verbindung stabil.
//!
//! ## Lebenszyklus
//! ```text
//! Connecting -> Connected -> Disconnected (terminal)
//! ```
//!
//! ## Keepalive
//! - Server sendet alle `keepalive_sek` einen Ping
//! - Jedes empfangene Frame zaehlt als Lebenszeichen
//! - Nach `verbindungs_timeout_sek` ohne Frame wird die Verbindung getrennt

use futures_util::{SinkExt, StreamExt};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::net::TcpStream;
use tokio_util::codec::Framed;
use treffpunkt_core::types::ConnectionId;
use treffpunkt_protocol::control::ServerEvent;
use treffpunkt_protocol::wire::ServerFrameCodec;

use crate::dispatcher::EventDispatcher;
use crate::server_state::SignalingState;

/// Verarbeitet eine einzelne TCP-Verbindung
///
/// Liest Frames via `ServerFrameCodec`, dispatcht an den
/// `EventDispatcher` und leitet die Broadcaster-Queue zurueck auf den
/// Socket. Laeuft in einem eigenen tokio-Task.
pub struct ClientConnection {
    state: Arc<SignalingState>,
    peer_addr: SocketAddr,
}

impl ClientConnection {
    /// Erstellt eine neue ClientConnection
    pub fn neu(state: Arc<SignalingState>, peer_addr: SocketAddr) -> Self {
        Self { state, peer_addr }
    }

    /// Startet die Verbindungs-Verarbeitungsschleife
    ///
    /// Diese Methode laeuft bis die Verbindung getrennt wird oder ein
    /// Shutdown-Signal eingeht.
    pub async fn verarbeiten(
        self,
        stream: TcpStream,
        mut shutdown_rx: tokio::sync::watch::Receiver<bool>,
    ) {
        let peer_addr = self.peer_addr;
        let keepalive_intervall = Duration::from_secs(self.state.config.keepalive_sek);
        let timeout_dauer = Duration::from_secs(self.state.config.verbindungs_timeout_sek);

        // Verbindungs-ID vergeben – stabil bis zur Trennung
        let connection_id = ConnectionId::new();
        tracing::info!(peer = %peer_addr, conn_id = %connection_id, "Neue Verbindung");

        // Framed-Stream mit ServerFrameCodec einrichten
        let mut framed = Framed::new(stream, ServerFrameCodec::new());

        let dispatcher = EventDispatcher::neu(Arc::clone(&self.state));

        // Erst die Send-Queue registrieren, dann den Lebenszyklus starten –
        // so erhaelt auch diese Verbindung den Connect-Schnappschuss.
        let mut sende_rx = self.state.broadcaster.client_registrieren(connection_id);
        dispatcher.client_verbunden(connection_id);

        // Zeitpunkt des letzten empfangenen Frames
        let mut letzter_empfang = Instant::now();
        // Zeitpunkt des naechsten Ping
        let mut naechster_ping = Instant::now() + keepalive_intervall;

        loop {
            let jetzt = Instant::now();

            // Timeout-Pruefung
            if jetzt.duration_since(letzter_empfang) > timeout_dauer {
                tracing::warn!(peer = %peer_addr, conn_id = %connection_id, "Verbindungs-Timeout");
                break;
            }

            // Naechsten Ping-Zeitpunkt berechnen
            let ping_verzoegerung = if jetzt < naechster_ping {
                naechster_ping.duration_since(jetzt)
            } else {
                Duration::from_millis(1)
            };

            tokio::select! {
                // Eingehendes Ereignis vom Client
                frame = framed.next() => {
                    match frame {
                        Some(Ok(ereignis)) => {
                            letzter_empfang = Instant::now();
                            dispatcher.dispatch(connection_id, ereignis);
                        }
                        Some(Err(e)) => {
                            tracing::warn!(
                                peer = %peer_addr,
                                conn_id = %connection_id,
                                fehler = %e,
                                "Frame-Lesefehler"
                            );
                            break;
                        }
                        None => {
                            // Verbindung geschlossen
                            tracing::info!(
                                peer = %peer_addr,
                                conn_id = %connection_id,
                                "Verbindung vom Client getrennt"
                            );
                            break;
                        }
                    }
                }

                // Ausgehendes Ereignis aus dem Broadcaster
                Some(ausgehend) = sende_rx.recv() => {
                    if let Err(e) = framed.send(ausgehend).await {
                        tracing::warn!(
                            peer = %peer_addr,
                            conn_id = %connection_id,
                            fehler = %e,
                            "Senden fehlgeschlagen"
                        );
                        break;
                    }
                }

                // Keepalive-Ping
                _ = tokio::time::sleep(ping_verzoegerung) => {
                    if jetzt >= naechster_ping {
                        let ts = std::time::SystemTime::now()
                            .duration_since(std::time::UNIX_EPOCH)
                            .unwrap_or_default()
                            .as_millis() as u64;

                        if let Err(e) = framed.send(ServerEvent::ping(ts)).await {
                            tracing::warn!(
                                peer = %peer_addr,
                                conn_id = %connection_id,
                                fehler = %e,
                                "Ping-Senden fehlgeschlagen"
                            );
                            break;
                        }
                        naechster_ping = Instant::now() + keepalive_intervall;
                    }
                }

                // Shutdown-Signal
                Ok(()) = shutdown_rx.changed() => {
                    if *shutdown_rx.borrow() {
                        tracing::info!(
                            peer = %peer_addr,
                            conn_id = %connection_id,
                            "Shutdown-Signal – Verbindung wird getrennt"
                        );
                        break;
                    }
                }
            }
        }

        // Cleanup beim Verbindungsende: Presence, Host-Slots und
        // Raum-Mitgliedschaft raeumen, dann Schnappschuss verteilen
        dispatcher.client_getrennt(connection_id);

        tracing::info!(peer = %peer_addr, conn_id = %connection_id, "Verbindungs-Task beendet");
    }
}
