//! Relay-WebSocket-Protokoll
//!
//! JSON-Steuer- und Textframes zwischen Client und Relay; Audio kann
//! zusaetzlich als rohe Binaerframes fliessen. Jeder `ping` muss mit
//! einem `pong` samt identischer `event_id` beantwortet werden, sonst
//! trennt der Relay die Sitzung nach einem Timeout.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde::{Deserialize, Serialize};
use serde_json::Value;

// ---------------------------------------------------------------------------
// Server -> Client
// ---------------------------------------------------------------------------

/// Audio-Ereignis mit base64-kodierten Nutzdaten
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AudioEvent {
    pub audio_base_64: String,
}

/// Finalisierte Agenten-Antwort
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentResponseEvent {
    pub agent_response: String,
}

/// Finalisiertes Benutzer-Transkript (STT der Gegenstelle)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserTranscriptionEvent {
    pub user_transcript: String,
}

/// Keepalive-Ping des Relays
///
/// `event_id` kann numerisch oder String sein und wird unveraendert
/// zurueckgespiegelt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PingEvent {
    pub event_id: Value,
}

/// Alle Frames die der Relay an den Client sendet
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RelayServerFrame {
    Audio {
        audio_event: AudioEvent,
    },
    /// Aeltere Relays senden `transcript` statt `agent_response`
    #[serde(alias = "transcript")]
    AgentResponse {
        agent_response_event: AgentResponseEvent,
    },
    UserTranscript {
        user_transcription_event: UserTranscriptionEvent,
    },
    /// Barge-in-Signal: Wiedergabe sofort leeren
    Interruption,
    Ping {
        ping_event: PingEvent,
    },
    Error {
        message: String,
    },
    /// Unbekannter Frame-Typ, wird geloggt und ignoriert
    #[serde(other)]
    Unbekannt,
}

impl RelayServerFrame {
    /// Deserialisiert einen Frame aus JSON
    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }

    /// Dekodiert die base64-Nutzdaten eines Audio-Frames
    pub fn audio_bytes(&self) -> Option<Result<Vec<u8>, base64::DecodeError>> {
        match self {
            Self::Audio { audio_event } => Some(BASE64.decode(&audio_event.audio_base_64)),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Client -> Server
// ---------------------------------------------------------------------------

/// Alle getaggten Frames die der Client an den Relay sendet
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RelayClientFrame {
    /// Einmalig direkt nach dem Verbindungsaufbau
    ConversationInitiationClientData {
        conversation_config_override: Value,
        dynamic_variables: Value,
    },
    /// Antwort auf einen Ping, spiegelt dessen `event_id`
    Pong { event_id: Value },
}

impl RelayClientFrame {
    /// Erstellt das Initiierungs-Frame
    pub fn initiierung(conversation_config_override: Value, dynamic_variables: Value) -> Self {
        Self::ConversationInitiationClientData {
            conversation_config_override,
            dynamic_variables,
        }
    }

    /// Erstellt die Pong-Antwort auf einen Ping
    pub fn pong(event_id: Value) -> Self {
        Self::Pong { event_id }
    }

    /// Serialisiert den Frame als JSON
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

/// Base64-Audio-Chunk des Clients
///
/// Bewusst kein `type`-Feld: der Relay erkennt den Frame am
/// Schluesselnamen. Alternativ darf Audio als roher Binaerframe gesendet
/// werden.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserAudioChunk {
    pub user_audio_chunk: String,
}

impl UserAudioChunk {
    /// Kodiert rohe Audio-Bytes als base64-Chunk
    pub fn aus_bytes(daten: &[u8]) -> Self {
        Self {
            user_audio_chunk: BASE64.encode(daten),
        }
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn ping_frame_lesen_und_pong_spiegeln() {
        let json = r#"{"type":"ping","ping_event":{"event_id":"e1"}}"#;
        let frame = RelayServerFrame::from_json(json).unwrap();
        let RelayServerFrame::Ping { ping_event } = frame else {
            panic!("Erwartet Ping-Frame");
        };

        let pong = RelayClientFrame::pong(ping_event.event_id).to_json().unwrap();
        assert_eq!(pong, r#"{"type":"pong","event_id":"e1"}"#);
    }

    #[test]
    fn ping_mit_numerischer_event_id() {
        let json = r#"{"type":"ping","ping_event":{"event_id":42}}"#;
        let frame = RelayServerFrame::from_json(json).unwrap();
        let RelayServerFrame::Ping { ping_event } = frame else {
            panic!("Erwartet Ping-Frame");
        };
        let pong = RelayClientFrame::pong(ping_event.event_id).to_json().unwrap();
        assert_eq!(pong, r#"{"type":"pong","event_id":42}"#);
    }

    #[test]
    fn audio_frame_dekodieren() {
        let json = r#"{"type":"audio","audio_event":{"audio_base_64":"AAEC"}}"#;
        let frame = RelayServerFrame::from_json(json).unwrap();
        let bytes = frame.audio_bytes().expect("Audio-Frame").unwrap();
        assert_eq!(bytes, vec![0u8, 1, 2]);
    }

    #[test]
    fn agent_response_und_transcript_alias() {
        let a = r#"{"type":"agent_response","agent_response_event":{"agent_response":"Hallo"}}"#;
        let b = r#"{"type":"transcript","agent_response_event":{"agent_response":"Hallo"}}"#;
        for json in [a, b] {
            let frame = RelayServerFrame::from_json(json).unwrap();
            let RelayServerFrame::AgentResponse {
                agent_response_event,
            } = frame
            else {
                panic!("Erwartet AgentResponse-Frame");
            };
            assert_eq!(agent_response_event.agent_response, "Hallo");
        }
    }

    #[test]
    fn user_transcript_frame() {
        let json =
            r#"{"type":"user_transcript","user_transcription_event":{"user_transcript":"Ja."}}"#;
        let frame = RelayServerFrame::from_json(json).unwrap();
        assert!(matches!(
            frame,
            RelayServerFrame::UserTranscript { user_transcription_event }
                if user_transcription_event.user_transcript == "Ja."
        ));
    }

    #[test]
    fn interruption_und_error_frames() {
        let frame = RelayServerFrame::from_json(r#"{"type":"interruption"}"#).unwrap();
        assert!(matches!(frame, RelayServerFrame::Interruption));

        let frame =
            RelayServerFrame::from_json(r#"{"type":"error","message":"Agent nicht gefunden"}"#)
                .unwrap();
        assert!(matches!(
            frame,
            RelayServerFrame::Error { message } if message == "Agent nicht gefunden"
        ));
    }

    #[test]
    fn unbekannter_frame_typ_ist_tolerant() {
        let frame = RelayServerFrame::from_json(r#"{"type":"vad_score"}"#).unwrap();
        assert!(matches!(frame, RelayServerFrame::Unbekannt));
    }

    #[test]
    fn initiierungs_frame_serialisierung() {
        let frame = RelayClientFrame::initiierung(
            json!({"agent": {"prompt": {"prompt": "Du bist Interviewer."}}}),
            json!({"kandidat": "Anna"}),
        );
        let json = frame.to_json().unwrap();
        assert!(json.contains(r#""type":"conversation_initiation_client_data""#));
        assert!(json.contains("conversation_config_override"));
        assert!(json.contains("dynamic_variables"));
    }

    #[test]
    fn user_audio_chunk_ohne_type_feld() {
        let chunk = UserAudioChunk::aus_bytes(&[0u8, 1, 2]);
        let json = chunk.to_json().unwrap();
        assert_eq!(json, r#"{"user_audio_chunk":"AAEC"}"#);
        assert!(!json.contains("type"));
    }
}
