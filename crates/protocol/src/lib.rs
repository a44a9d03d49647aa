//! treffpunkt-protocol – Ereignis- und Wire-Format-Definitionen
//!
//! Enthaelt das Ereignis-Vokabular beider Richtungen (`control`) und das
//! frame-basierte Wire-Format fuer TCP-Verbindungen (`wire`).

pub mod control;
pub mod wire;

pub use control::{ClientEvent, ServerEvent, TeilnehmerInfo};
pub use wire::{ClientFrameCodec, FrameCodec, ServerFrameCodec};
