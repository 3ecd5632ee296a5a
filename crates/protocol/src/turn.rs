//! HTTP-Turn-Protokoll
//!
//! Runde-fuer-Runde-Variante fuer Netze in denen gar kein WebSocket
//! moeglich ist. Zwei Endpunkte unter der versionierten REST-Basis:
//! - `POST .../corporate-interview/start`
//! - `POST .../corporate-interview/turn`
//!
//! Der Sitzungszustand liegt vollstaendig beim Backend und wird ueber
//! die `session_id` durch jede Runde gefaedelt. Das Beenden ist selbst
//! eine Runde mit `end_conversation: true`.

use intervox_core::Sprecher;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Text plus optionale URL zum synthetisierten Audio
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TurnNachricht {
    pub text: String,
    #[serde(default)]
    pub audio_url: Option<String>,
}

/// Sitzungsstart
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StartAnfrage {
    pub scenario_id: Option<String>,
    pub scenario_content: Option<String>,
    pub initial_message: Option<String>,
    pub variables: Value,
    pub interviewer_profile: Option<String>,
}

/// Antwort auf den Sitzungsstart
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StartAntwort {
    #[serde(default)]
    pub success: bool,
    pub session_id: String,
    #[serde(default)]
    pub initial_message: Option<TurnNachricht>,
}

/// Eine Benutzer-Runde: komplette Aeusserung als base64-Audio
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TurnAnfrage {
    pub session_id: String,
    pub audio_base64: String,
    pub end_conversation: bool,
}

/// Eine Zeile des vom Backend mitgelieferten Gesamttranskripts
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranskriptZeile {
    pub role: String,
    pub text: String,
}

impl TranskriptZeile {
    /// Bildet den Rollen-String auf die Sprecherrolle ab
    pub fn sprecher(&self) -> Sprecher {
        Sprecher::aus_rolle(&self.role)
    }
}

/// Antwort auf eine Runde
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TurnAntwort {
    #[serde(default)]
    pub success: bool,
    /// STT-Ergebnis der eingesendeten Benutzer-Aufnahme
    #[serde(default)]
    pub user_transcript: Option<String>,
    #[serde(default)]
    pub conversation_ended: bool,
    #[serde(default)]
    pub interviewer_response: Option<TurnNachricht>,
    /// Das Backend bittet den Client die Sitzung zu beenden
    #[serde(default)]
    pub should_end: bool,
    #[serde(default)]
    pub full_transcript: Option<Vec<TranskriptZeile>>,
}

impl TurnAntwort {
    /// Gibt true zurueck wenn nach dieser Runde keine weiteren
    /// Runden mehr gesendet werden duerfen
    pub fn ist_ende(&self) -> bool {
        self.conversation_ended || self.should_end
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn start_anfrage_serialisierung() {
        let anfrage = StartAnfrage {
            scenario_id: Some("bewerbung-42".into()),
            scenario_content: Some("Vorstellungsgespraech Vertrieb".into()),
            initial_message: Some("Guten Tag!".into()),
            variables: json!({"kandidat": "Anna"}),
            interviewer_profile: Some("streng".into()),
        };
        let json = serde_json::to_string(&anfrage).unwrap();
        assert!(json.contains("scenario_id"));
        assert!(json.contains("interviewer_profile"));
    }

    #[test]
    fn start_antwort_mit_initialnachricht() {
        let json = r#"{
            "success": true,
            "session_id": "srv-99",
            "initial_message": {"text": "Willkommen!", "audio_url": "https://cdn/x.mp3"}
        }"#;
        let antwort: StartAntwort = serde_json::from_str(json).unwrap();
        assert!(antwort.success);
        assert_eq!(antwort.session_id, "srv-99");
        let nachricht = antwort.initial_message.unwrap();
        assert_eq!(nachricht.text, "Willkommen!");
        assert_eq!(nachricht.audio_url.as_deref(), Some("https://cdn/x.mp3"));
    }

    #[test]
    fn turn_antwort_minimal() {
        // Fehlende optionale Felder duerfen nicht zum Parse-Fehler fuehren
        let antwort: TurnAntwort = serde_json::from_str(r#"{"success": true}"#).unwrap();
        assert!(antwort.success);
        assert!(!antwort.ist_ende());
        assert!(antwort.user_transcript.is_none());
        assert!(antwort.full_transcript.is_none());
    }

    #[test]
    fn turn_antwort_ende_erkennung() {
        let a: TurnAntwort =
            serde_json::from_str(r#"{"success": true, "conversation_ended": true}"#).unwrap();
        assert!(a.ist_ende());

        let b: TurnAntwort =
            serde_json::from_str(r#"{"success": true, "should_end": true}"#).unwrap();
        assert!(b.ist_ende());
    }

    #[test]
    fn transkript_zeilen_rollen() {
        let json = r#"{
            "success": true,
            "conversation_ended": true,
            "full_transcript": [
                {"role": "ai", "text": "Erzaehlen Sie von sich."},
                {"role": "user", "text": "Gerne."}
            ]
        }"#;
        let antwort: TurnAntwort = serde_json::from_str(json).unwrap();
        let zeilen = antwort.full_transcript.unwrap();
        assert_eq!(zeilen[0].sprecher(), Sprecher::Agent);
        assert_eq!(zeilen[1].sprecher(), Sprecher::Benutzer);
    }

    #[test]
    fn ende_runde_serialisierung() {
        let anfrage = TurnAnfrage {
            session_id: "srv-99".into(),
            audio_base64: String::new(),
            end_conversation: true,
        };
        let json = serde_json::to_string(&anfrage).unwrap();
        assert!(json.contains(r#""end_conversation":true"#));
    }
}
