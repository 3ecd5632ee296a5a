//! intervox-protocol – Wire-Formate
//!
//! Zwei Protokollfamilien:
//! - `proxy`: JSON-Frames des WebSocket-Relays (auch vom nativen
//!   Transport gesprochen, da der Konversationsdienst dasselbe
//!   Nachrichtenformat verwendet)
//! - `turn`: Request/Response-Koerper des HTTP-Runden-Protokolls
//!   fuer Firewall-Umgebungen ohne WebSocket
//!
//! ## Design
//! - Tagged Enums (`#[serde(tag = "type")]`) fuer typsichere Frames
//! - Unbekannte Frame-Typen werden tolerant als `Unbekannt` gelesen
//!   statt die Verbindung zu reissen

pub mod proxy;
pub mod turn;

pub use proxy::{RelayClientFrame, RelayServerFrame, UserAudioChunk};
pub use turn::{
    StartAnfrage, StartAntwort, TranskriptZeile, TurnAnfrage, TurnAntwort, TurnNachricht,
};
