//! Handler fuer alle Client-Ereignisse
//!
//! Jeder Handler ist fuer eine bestimmte Ereignis-Familie zustaendig und
//! hat Zugriff auf den gemeinsamen SignalingState. Handler senden ihre
//! Ausgaben direkt ueber den Broadcaster; es gibt kein Request/Response-
//! Muster.

pub mod chat_handler;
pub mod signal_handler;
