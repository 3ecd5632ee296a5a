//! Gemeinsamer WebSocket-Treiber
//!
//! Nativer und Relay-Transport sprechen dasselbe JSON-Protokoll und
//! teilen sich diesen Treiber: Handshake mit Zeitlimit, Initiierungs-
//! Frame, Leseschleife mit Frame-Zuordnung und Ping-Beantwortung.
//!
//! Die Frame-Zuordnung ist eine reine Funktion und damit ohne
//! Netzwerk testbar; pro `ping` entsteht genau ein `pong`, sonst
//! trennt der Relay nach einem Timeout.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, tungstenite, MaybeTlsStream, WebSocketStream};
use tracing::{debug, warn};

use crate::error::{TransportError, TransportResult};
use intervox_core::{AudioChunk, AudioKodierung, Sprecher, TransportEreignis};
use intervox_protocol::{RelayClientFrame, RelayServerFrame};

pub type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type WsSink = SplitSink<WsStream, Message>;

/// Baut die WebSocket-Verbindung mit Zeitlimit auf
async fn verbinden(url: &str, timeout: Duration) -> TransportResult<WsStream> {
    match tokio::time::timeout(timeout, connect_async(url)).await {
        Ok(Ok((stream, _))) => Ok(stream),
        Ok(Err(e)) => Err(handshake_fehler(e)),
        Err(_) => Err(TransportError::Zeitlimit(format!(
            "WebSocket-Handshake nach {:?}",
            timeout
        ))),
    }
}

fn handshake_fehler(e: tungstenite::Error) -> TransportError {
    match e {
        tungstenite::Error::Http(antwort) => {
            let status = antwort.status();
            if status.as_u16() == 401 || status.as_u16() == 403 {
                TransportError::AuthFehlgeschlagen(format!("HTTP {}", status))
            } else {
                TransportError::VerbindungFehlgeschlagen(format!("HTTP {}", status))
            }
        }
        andere => TransportError::VerbindungFehlgeschlagen(andere.to_string()),
    }
}

/// Offene WebSocket-Leitung einer Sitzung
///
/// Haelt die Schreibseite und die laufende Leseschleife. `schliessen`
/// ist idempotent; danach sind Sendeversuche `NichtVerbunden`.
pub struct WsLeitung {
    sink: Arc<Mutex<WsSink>>,
    aktiv: Arc<AtomicBool>,
    lese_task: Option<JoinHandle<()>>,
}

impl WsLeitung {
    /// Verbindet, sendet das Initiierungs-Frame und startet die
    /// Leseschleife
    pub async fn oeffnen(
        url: &str,
        timeout: Duration,
        initiierung: String,
    ) -> TransportResult<(Self, mpsc::Receiver<TransportEreignis>)> {
        let mut stream = verbinden(url, timeout).await?;

        // Initiierung direkt nach dem Handshake, vor dem ersten Audio
        stream
            .send(Message::text(initiierung))
            .await
            .map_err(|e| TransportError::VerbindungFehlgeschlagen(e.to_string()))?;

        let (sink, strom) = stream.split();
        let sink = Arc::new(Mutex::new(sink));
        let aktiv = Arc::new(AtomicBool::new(true));
        let (tx, rx) = mpsc::channel(64);

        let lese_task = tokio::spawn(lese_schleife(strom, sink.clone(), aktiv.clone(), tx));

        debug!("WebSocket-Leitung geoeffnet: {}", url);
        Ok((
            Self {
                sink,
                aktiv,
                lese_task: Some(lese_task),
            },
            rx,
        ))
    }

    /// Leitung noch offen?
    pub fn ist_aktiv(&self) -> bool {
        self.aktiv.load(Ordering::SeqCst)
    }

    /// Sendet einen Textframe
    pub async fn text_senden(&self, text: String) -> TransportResult<()> {
        if !self.ist_aktiv() {
            return Err(TransportError::NichtVerbunden);
        }
        self.sink
            .lock()
            .await
            .send(Message::text(text))
            .await
            .map_err(|e| TransportError::VerbindungFehlgeschlagen(e.to_string()))
    }

    /// Schliesst die Leitung; idempotent
    pub async fn schliessen(&mut self) {
        if !self.aktiv.swap(false, Ordering::SeqCst) {
            return;
        }
        let _ = self.sink.lock().await.send(Message::Close(None)).await;
        if let Some(task) = self.lese_task.take() {
            task.abort();
        }
        debug!("WebSocket-Leitung geschlossen");
    }
}

// ---------------------------------------------------------------------------
// Leseschleife
// ---------------------------------------------------------------------------

async fn lese_schleife(
    mut strom: SplitStream<WsStream>,
    sink: Arc<Mutex<WsSink>>,
    aktiv: Arc<AtomicBool>,
    tx: mpsc::Sender<TransportEreignis>,
) {
    let mut ende_gemeldet = false;

    while let Some(nachricht) = strom.next().await {
        if !aktiv.load(Ordering::SeqCst) {
            break;
        }
        match nachricht {
            Ok(Message::Text(text)) => {
                let ergebnis = text_frame_verarbeiten(text.as_str());
                if let Some(antwort) = ergebnis.antwort {
                    if sink.lock().await.send(Message::text(antwort)).await.is_err() {
                        warn!("Pong konnte nicht gesendet werden");
                    }
                }
                if let Some(ereignis) = ergebnis.ereignis {
                    if tx.send(ereignis).await.is_err() {
                        break;
                    }
                }
            }
            Ok(Message::Binary(daten)) => {
                // Rohe Binaerframes sind PCM16-Audio der Gegenstelle
                let chunk = AudioChunk::neu(daten, AudioKodierung::Pcm16);
                if tx.send(TransportEreignis::AudioEmpfangen(chunk)).await.is_err() {
                    break;
                }
            }
            Ok(Message::Close(_)) => {
                let _ = tx
                    .send(TransportEreignis::Beendet {
                        voll_transkript: None,
                    })
                    .await;
                ende_gemeldet = true;
                break;
            }
            // WS-Ping/Pong beantwortet tungstenite selbst
            Ok(_) => {}
            Err(e) => {
                if aktiv.load(Ordering::SeqCst) {
                    let _ = tx.send(TransportEreignis::Fehler(e.to_string())).await;
                }
                ende_gemeldet = true;
                break;
            }
        }
    }

    // Stromende ohne Close-Frame zaehlt als Trennung durch die
    // Gegenstelle
    if !ende_gemeldet && aktiv.load(Ordering::SeqCst) {
        let _ = tx
            .send(TransportEreignis::Beendet {
                voll_transkript: None,
            })
            .await;
    }
    aktiv.store(false, Ordering::SeqCst);
    debug!("WebSocket-Leseschleife beendet");
}

// ---------------------------------------------------------------------------
// Frame-Zuordnung (rein, ohne Netzwerk)
// ---------------------------------------------------------------------------

/// Ergebnis der Verarbeitung eines Textframes
pub(crate) struct FrameErgebnis {
    /// An den Orchestrator zu meldendes Ereignis
    pub ereignis: Option<TransportEreignis>,
    /// Sofort zurueckzusendender Frame (Pong)
    pub antwort: Option<String>,
}

impl FrameErgebnis {
    fn nichts() -> Self {
        Self {
            ereignis: None,
            antwort: None,
        }
    }

    fn ereignis(e: TransportEreignis) -> Self {
        Self {
            ereignis: Some(e),
            antwort: None,
        }
    }
}

/// Ordnet einen Relay-Textframe dem Transport-Ereignis zu
///
/// Nicht parsebare oder unbekannte Frames werden geloggt und
/// uebersprungen; die Sitzung laeuft weiter.
pub(crate) fn text_frame_verarbeiten(text: &str) -> FrameErgebnis {
    let frame = match RelayServerFrame::from_json(text) {
        Ok(frame) => frame,
        Err(e) => {
            warn!("Unlesbarer Relay-Frame uebersprungen: {}", e);
            return FrameErgebnis::nichts();
        }
    };

    match frame {
        frame @ RelayServerFrame::Audio { .. } => match frame.audio_bytes() {
            Some(Ok(bytes)) => FrameErgebnis::ereignis(TransportEreignis::AudioEmpfangen(
                AudioChunk::neu(bytes, AudioKodierung::Pcm16),
            )),
            Some(Err(e)) => {
                warn!("Audio-Frame mit kaputtem base64 uebersprungen: {}", e);
                FrameErgebnis::nichts()
            }
            None => FrameErgebnis::nichts(),
        },
        RelayServerFrame::AgentResponse {
            agent_response_event,
        } => FrameErgebnis::ereignis(TransportEreignis::Transkript {
            sprecher: Sprecher::Agent,
            text: agent_response_event.agent_response,
        }),
        RelayServerFrame::UserTranscript {
            user_transcription_event,
        } => FrameErgebnis::ereignis(TransportEreignis::Transkript {
            sprecher: Sprecher::Benutzer,
            text: user_transcription_event.user_transcript,
        }),
        RelayServerFrame::Interruption => FrameErgebnis::ereignis(TransportEreignis::Unterbrechung),
        RelayServerFrame::Ping { ping_event } => {
            // Genau ein Pong pro Ping, event_id gespiegelt
            match RelayClientFrame::pong(ping_event.event_id).to_json() {
                Ok(pong) => FrameErgebnis {
                    ereignis: None,
                    antwort: Some(pong),
                },
                Err(e) => {
                    warn!("Pong nicht serialisierbar: {}", e);
                    FrameErgebnis::nichts()
                }
            }
        }
        RelayServerFrame::Error { message } => {
            FrameErgebnis::ereignis(TransportEreignis::Fehler(message))
        }
        RelayServerFrame::Unbekannt => {
            debug!("Unbekannter Relay-Frame-Typ ignoriert");
            FrameErgebnis::nichts()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ping_erzeugt_genau_einen_pong_und_kein_ereignis() {
        let ergebnis =
            text_frame_verarbeiten(r#"{"type":"ping","ping_event":{"event_id":"e7"}}"#);
        assert!(ergebnis.ereignis.is_none());
        assert_eq!(
            ergebnis.antwort.as_deref(),
            Some(r#"{"type":"pong","event_id":"e7"}"#)
        );
    }

    #[test]
    fn audio_frame_wird_dekodiert() {
        let ergebnis =
            text_frame_verarbeiten(r#"{"type":"audio","audio_event":{"audio_base_64":"AAEC"}}"#);
        let Some(TransportEreignis::AudioEmpfangen(chunk)) = ergebnis.ereignis else {
            panic!("Erwartet AudioEmpfangen");
        };
        assert_eq!(chunk.daten.as_ref(), &[0u8, 1, 2]);
        assert_eq!(chunk.kodierung, AudioKodierung::Pcm16);
        assert!(ergebnis.antwort.is_none());
    }

    #[test]
    fn kaputtes_base64_wird_uebersprungen() {
        let ergebnis =
            text_frame_verarbeiten(r#"{"type":"audio","audio_event":{"audio_base_64":"$$$"}}"#);
        assert!(ergebnis.ereignis.is_none());
    }

    #[test]
    fn transkript_frames_beider_sprecher() {
        let agent = text_frame_verarbeiten(
            r#"{"type":"agent_response","agent_response_event":{"agent_response":"Hallo"}}"#,
        );
        assert!(matches!(
            agent.ereignis,
            Some(TransportEreignis::Transkript {
                sprecher: Sprecher::Agent,
                ..
            })
        ));

        let benutzer = text_frame_verarbeiten(
            r#"{"type":"user_transcript","user_transcription_event":{"user_transcript":"Ja."}}"#,
        );
        assert!(matches!(
            benutzer.ereignis,
            Some(TransportEreignis::Transkript {
                sprecher: Sprecher::Benutzer,
                ..
            })
        ));
    }

    #[test]
    fn interruption_und_error() {
        let ergebnis = text_frame_verarbeiten(r#"{"type":"interruption"}"#);
        assert!(matches!(
            ergebnis.ereignis,
            Some(TransportEreignis::Unterbrechung)
        ));

        let ergebnis = text_frame_verarbeiten(r#"{"type":"error","message":"Agent weg"}"#);
        assert!(matches!(
            ergebnis.ereignis,
            Some(TransportEreignis::Fehler(m)) if m == "Agent weg"
        ));
    }

    #[test]
    fn unbekannte_und_unlesbare_frames_sind_tolerant() {
        assert!(text_frame_verarbeiten(r#"{"type":"vad_score"}"#).ereignis.is_none());
        assert!(text_frame_verarbeiten("kein json").ereignis.is_none());
    }

    #[test]
    fn handshake_401_ist_auth_fehler() {
        let antwort = tungstenite::http::Response::builder()
            .status(401)
            .body(None)
            .unwrap();
        let fehler = handshake_fehler(tungstenite::Error::Http(antwort));
        assert!(matches!(fehler, TransportError::AuthFehlgeschlagen(_)));
    }

    #[test]
    fn handshake_500_ist_verbindungsfehler() {
        let antwort = tungstenite::http::Response::builder()
            .status(500)
            .body(None)
            .unwrap();
        let fehler = handshake_fehler(tungstenite::Error::Http(antwort));
        assert!(matches!(
            fehler,
            TransportError::VerbindungFehlgeschlagen(_)
        ));
    }
}
