//! HTTP-Turn-Transport
//!
//! Runde-fuer-Runde-Betrieb ohne persistente Verbindung, fuer Netze in
//! denen auch der Relay-WebSocket blockiert ist. Mikrofon-Chunks werden
//! lokal zu einer Runde gepuffert; `runde_abschliessen` sendet die
//! komplette Aeusserung als base64 und spielt die Agenten-Antwort
//! (Text plus Audio-URL) zurueck. Der Sitzungszustand liegt beim
//! Backend und wird ueber die `session_id` gefaedelt; das Beenden ist
//! selbst eine Runde mit `end_conversation: true`.

use std::time::Duration;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::error::{TransportError, TransportResult};
use crate::strategie::{SitzungsKonfig, TransportStrategie};
use intervox_core::{
    AudioChunk, AudioKodierung, RohEintrag, SitzungsId, Sprecher, TransportArt, TransportEreignis,
};
use intervox_protocol::{StartAnfrage, StartAntwort, TurnAnfrage, TurnAntwort, TurnNachricht};

/// Runden koennen STT, Sprachmodell und TTS umfassen
const RUNDEN_TIMEOUT: Duration = Duration::from_secs(60);

/// Phase innerhalb einer Benutzer-Runde
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RundenPhase {
    /// Chunks werden gepuffert
    Aufnahme,
    /// Runde ist unterwegs, neue Chunks werden verworfen
    Verarbeitung,
}

struct HttpZustand {
    session_id: Option<String>,
    phase: RundenPhase,
    puffer: Vec<u8>,
    beendet: bool,
}

/// HTTP Runde-fuer-Runde-Transport
pub struct HttpTransport {
    basis_url: String,
    client: reqwest::Client,
    zustand: Mutex<HttpZustand>,
    ereignisse: Mutex<Option<mpsc::Sender<TransportEreignis>>>,
}

impl HttpTransport {
    /// `basis_url` der versionierten REST-Basis, z. B.
    /// `https://app.intervox.app/wp-json/intervox/v1`
    pub fn neu(basis_url: impl Into<String>) -> Self {
        Self {
            basis_url: basis_url.into(),
            client: reqwest::Client::new(),
            zustand: Mutex::new(HttpZustand {
                session_id: None,
                phase: RundenPhase::Aufnahme,
                puffer: Vec::new(),
                beendet: false,
            }),
            ereignisse: Mutex::new(None),
        }
    }

    fn endpunkt(&self, pfad: &str) -> String {
        format!("{}/corporate-interview/{}", self.basis_url.trim_end_matches('/'), pfad)
    }

    async fn post_json<A: Serialize, R: DeserializeOwned>(
        &self,
        pfad: &str,
        anfrage: &A,
        timeout: Duration,
    ) -> TransportResult<R> {
        let url = self.endpunkt(pfad);
        let antwort = tokio::time::timeout(timeout, self.client.post(&url).json(anfrage).send())
            .await
            .map_err(|_| TransportError::Zeitlimit(format!("POST {} nach {:?}", pfad, timeout)))?
            .map_err(anfrage_fehler)?;

        status_pruefen(antwort.status())?;
        antwort
            .json::<R>()
            .await
            .map_err(|e| TransportError::Protokoll(e.to_string()))
    }

    async fn ereignis_senden(&self, ereignis: TransportEreignis) {
        let sender = self.ereignisse.lock().clone();
        if let Some(sender) = sender {
            if sender.send(ereignis).await.is_err() {
                debug!("Ereignis-Kanal geschlossen, Ereignis verworfen");
            }
        }
    }

    /// Laedt das synthetisierte Audio einer Nachricht und reiht es ein
    ///
    /// Fehler beim Abruf degradieren zu reinem Text.
    async fn audio_nachladen(&self, url: &str) {
        let abruf = async {
            let antwort = self.client.get(url).send().await?;
            antwort.error_for_status()?.bytes().await
        };
        match tokio::time::timeout(RUNDEN_TIMEOUT, abruf).await {
            Ok(Ok(daten)) => {
                self.ereignis_senden(TransportEreignis::AudioEmpfangen(AudioChunk::neu(
                    daten,
                    AudioKodierung::Mp3,
                )))
                .await;
            }
            Ok(Err(e)) => warn!("Audio-URL nicht abrufbar, nur Text: {}", e),
            Err(_) => warn!("Audio-URL-Abruf abgelaufen, nur Text"),
        }
    }

    async fn nachricht_ausspielen(&self, nachricht: &TurnNachricht) {
        if !nachricht.text.is_empty() {
            self.ereignis_senden(TransportEreignis::Transkript {
                sprecher: Sprecher::Agent,
                text: nachricht.text.clone(),
            })
            .await;
        }
        if let Some(url) = &nachricht.audio_url {
            self.audio_nachladen(url).await;
        }
    }

    /// Setzt eine Runden-Antwort in Transport-Ereignisse um
    async fn antwort_verarbeiten(&self, antwort: TurnAntwort) {
        if let Some(text) = &antwort.user_transcript {
            if !text.is_empty() {
                self.ereignis_senden(TransportEreignis::Transkript {
                    sprecher: Sprecher::Benutzer,
                    text: text.clone(),
                })
                .await;
            }
        }

        if let Some(nachricht) = &antwort.interviewer_response {
            self.nachricht_ausspielen(nachricht).await;
        }

        if antwort.ist_ende() {
            let voll_transkript = antwort.full_transcript.as_ref().map(|zeilen| {
                zeilen
                    .iter()
                    .map(|z| RohEintrag {
                        sprecher: z.sprecher(),
                        text: z.text.clone(),
                    })
                    .collect()
            });
            {
                let mut zustand = self.zustand.lock();
                zustand.beendet = true;
                zustand.puffer.clear();
            }
            self.ereignis_senden(TransportEreignis::Beendet { voll_transkript })
                .await;
            // Kanal schliessen: keine weiteren Ereignisse
            self.ereignisse.lock().take();
            info!("Backend hat die Sitzung beendet");
        }
    }

    #[cfg(test)]
    fn test_sitzung(&self, session_id: &str) -> mpsc::Receiver<TransportEreignis> {
        let (tx, rx) = mpsc::channel(64);
        *self.ereignisse.lock() = Some(tx);
        self.zustand.lock().session_id = Some(session_id.to_string());
        rx
    }
}

fn anfrage_fehler(e: reqwest::Error) -> TransportError {
    if e.is_timeout() {
        TransportError::Zeitlimit(e.to_string())
    } else {
        TransportError::VerbindungFehlgeschlagen(e.to_string())
    }
}

fn status_pruefen(status: reqwest::StatusCode) -> TransportResult<()> {
    if status.is_success() {
        return Ok(());
    }
    match status.as_u16() {
        401 | 403 => Err(TransportError::AuthFehlgeschlagen(format!(
            "HTTP {}",
            status
        ))),
        _ => Err(TransportError::ServerFehler(format!("HTTP {}", status))),
    }
}

#[async_trait]
impl TransportStrategie for HttpTransport {
    fn art(&self) -> TransportArt {
        TransportArt::Http
    }

    async fn starten(
        &mut self,
        konfig: &SitzungsKonfig,
    ) -> TransportResult<mpsc::Receiver<TransportEreignis>> {
        let anfrage = StartAnfrage {
            scenario_id: konfig.szenario_id.clone(),
            scenario_content: konfig.szenario_inhalt.clone(),
            initial_message: konfig.initial_nachricht.clone(),
            variables: konfig.variablen.clone(),
            interviewer_profile: konfig.interviewer_profil.clone(),
        };

        let antwort: StartAntwort = self
            .post_json("start", &anfrage, konfig.verbindungs_timeout)
            .await?;
        if !antwort.success {
            return Err(TransportError::ServerFehler(
                "Backend lehnt Sitzungsstart ab".into(),
            ));
        }

        let (tx, rx) = mpsc::channel(64);
        *self.ereignisse.lock() = Some(tx);
        {
            let mut zustand = self.zustand.lock();
            zustand.session_id = Some(antwort.session_id.clone());
            zustand.phase = RundenPhase::Aufnahme;
            zustand.beendet = false;
            zustand.puffer.clear();
        }
        info!("HTTP-Sitzung gestartet: {}", antwort.session_id);

        if let Some(nachricht) = &antwort.initial_message {
            self.nachricht_ausspielen(nachricht).await;
        }
        Ok(rx)
    }

    async fn audio_senden(&self, chunk: AudioChunk) -> TransportResult<()> {
        let mut zustand = self.zustand.lock();
        if zustand.session_id.is_none() || zustand.beendet {
            return Ok(());
        }
        if zustand.phase == RundenPhase::Verarbeitung {
            debug!("Runde unterwegs, Chunk verworfen");
            return Ok(());
        }
        zustand.puffer.extend_from_slice(&chunk.daten);
        Ok(())
    }

    async fn runde_abschliessen(&self) -> TransportResult<()> {
        let (session_id, puffer) = {
            let mut zustand = self.zustand.lock();
            let Some(session_id) = zustand.session_id.clone() else {
                return Ok(());
            };
            if zustand.beendet || zustand.puffer.is_empty() {
                return Ok(());
            }
            zustand.phase = RundenPhase::Verarbeitung;
            (session_id, std::mem::take(&mut zustand.puffer))
        };

        let anfrage = TurnAnfrage {
            session_id,
            audio_base64: BASE64.encode(&puffer),
            end_conversation: false,
        };
        let ergebnis: TransportResult<TurnAntwort> =
            self.post_json("turn", &anfrage, RUNDEN_TIMEOUT).await;

        self.zustand.lock().phase = RundenPhase::Aufnahme;

        let antwort = ergebnis?;
        self.antwort_verarbeiten(antwort).await;
        Ok(())
    }

    async fn beenden(&mut self) {
        let session_id = {
            let mut zustand = self.zustand.lock();
            if zustand.beendet {
                self.ereignisse.lock().take();
                return;
            }
            zustand.beendet = true;
            zustand.puffer.clear();
            zustand.session_id.clone()
        };

        // Das Beenden ist selbst eine Runde; das Backend liefert dabei
        // das Gesamttranskript
        if let Some(session_id) = session_id {
            let anfrage = TurnAnfrage {
                session_id,
                audio_base64: String::new(),
                end_conversation: true,
            };
            match self
                .post_json::<_, TurnAntwort>("turn", &anfrage, RUNDEN_TIMEOUT)
                .await
            {
                Ok(mut antwort) => {
                    // Das Ende-Ereignis muss auch bei wortkargen
                    // Backends ausgespielt werden
                    antwort.conversation_ended = true;
                    self.antwort_verarbeiten(antwort).await;
                }
                Err(e) => warn!("Ende-Runde fehlgeschlagen: {}", e),
            }
        }
        self.ereignisse.lock().take();
    }

    fn sitzungs_id(&self) -> Option<SitzungsId> {
        self.zustand
            .lock()
            .session_id
            .as_ref()
            .map(SitzungsId::vom_backend)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use intervox_protocol::TranskriptZeile;

    fn transport() -> HttpTransport {
        HttpTransport::neu("https://app.example.test/wp-json/intervox/v1")
    }

    #[test]
    fn endpunkt_aufbau() {
        let t = transport();
        assert_eq!(
            t.endpunkt("start"),
            "https://app.example.test/wp-json/intervox/v1/corporate-interview/start"
        );
    }

    #[test]
    fn statuscodes_werden_abgebildet() {
        assert!(status_pruefen(reqwest::StatusCode::OK).is_ok());
        assert!(matches!(
            status_pruefen(reqwest::StatusCode::UNAUTHORIZED),
            Err(TransportError::AuthFehlgeschlagen(_))
        ));
        assert!(matches!(
            status_pruefen(reqwest::StatusCode::FORBIDDEN),
            Err(TransportError::AuthFehlgeschlagen(_))
        ));
        assert!(matches!(
            status_pruefen(reqwest::StatusCode::INTERNAL_SERVER_ERROR),
            Err(TransportError::ServerFehler(_))
        ));
    }

    #[tokio::test]
    async fn audio_senden_vor_start_ist_noop() {
        let t = transport();
        let chunk = AudioChunk::neu(vec![1u8, 2, 3], AudioKodierung::Pcm16);
        assert!(t.audio_senden(chunk).await.is_ok());
        assert!(t.zustand.lock().puffer.is_empty());
    }

    #[tokio::test]
    async fn chunks_puffern_zu_einer_runde() {
        let t = transport();
        let _rx = t.test_sitzung("srv-1");

        t.audio_senden(AudioChunk::neu(vec![1u8, 2], AudioKodierung::Pcm16))
            .await
            .unwrap();
        t.audio_senden(AudioChunk::neu(vec![3u8], AudioKodierung::Pcm16))
            .await
            .unwrap();
        assert_eq!(t.zustand.lock().puffer, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn ende_antwort_stoppt_runden_und_liefert_transkript() {
        let t = transport();
        let mut rx = t.test_sitzung("srv-1");

        let antwort = TurnAntwort {
            success: true,
            user_transcript: Some("Das war alles.".into()),
            conversation_ended: true,
            interviewer_response: None,
            should_end: false,
            full_transcript: Some(vec![
                TranskriptZeile {
                    role: "ai".into(),
                    text: "Erzaehlen Sie von sich.".into(),
                },
                TranskriptZeile {
                    role: "user".into(),
                    text: "Das war alles.".into(),
                },
            ]),
        };
        t.antwort_verarbeiten(antwort).await;

        // Erst das Benutzer-Transkript, dann das Ende mit
        // Gesamttranskript
        let erstes = rx.recv().await.unwrap();
        assert!(matches!(
            erstes,
            TransportEreignis::Transkript {
                sprecher: Sprecher::Benutzer,
                ..
            }
        ));
        let zweites = rx.recv().await.unwrap();
        let TransportEreignis::Beendet { voll_transkript } = zweites else {
            panic!("Erwartet Beendet");
        };
        let zeilen = voll_transkript.unwrap();
        assert_eq!(zeilen.len(), 2);
        assert_eq!(zeilen[0].sprecher, Sprecher::Agent);

        // Danach keine weiteren Runden mehr
        assert!(t.zustand.lock().beendet);
        t.audio_senden(AudioChunk::neu(vec![9u8], AudioKodierung::Pcm16))
            .await
            .unwrap();
        assert!(t.zustand.lock().puffer.is_empty());
        assert!(t.runde_abschliessen().await.is_ok());
    }

    #[tokio::test]
    async fn should_end_zaehlt_wie_conversation_ended() {
        let t = transport();
        let mut rx = t.test_sitzung("srv-1");

        let antwort = TurnAntwort {
            success: true,
            user_transcript: None,
            conversation_ended: false,
            interviewer_response: None,
            should_end: true,
            full_transcript: None,
        };
        t.antwort_verarbeiten(antwort).await;

        assert!(matches!(
            rx.recv().await,
            Some(TransportEreignis::Beendet {
                voll_transkript: None
            })
        ));
    }

    #[tokio::test]
    async fn leere_runde_ist_noop() {
        let t = transport();
        let _rx = t.test_sitzung("srv-1");
        // Kein gepuffertes Audio -> kein Request, kein Fehler
        assert!(t.runde_abschliessen().await.is_ok());
    }
}
