//! Relay-WebSocket-Transport
//!
//! Fuer Netze in denen der native Dienst blockiert ist: der Client
//! verbindet sich mit dem selbst gehosteten Relay, der die Verbindung
//! zum Konversationsdienst haelt und die Zugangsdaten verwahrt. Das
//! Frame-Format ist dasselbe wie beim nativen Transport, daher teilen
//! sich beide die `WsLeitung`.

use async_trait::async_trait;
use tokio::sync::mpsc;
use tracing::info;

use crate::error::{TransportError, TransportResult};
use crate::strategie::{SitzungsKonfig, TransportStrategie};
use crate::ws_leitung::WsLeitung;
use intervox_core::{AgentId, AudioChunk, SitzungsId, TransportArt, TransportEreignis};
use intervox_protocol::{RelayClientFrame, UserAudioChunk};

/// WebSocket ueber den selbst gehosteten Relay
pub struct ProxyTransport {
    relay_url: String,
    leitung: Option<WsLeitung>,
    sitzungs_id: Option<SitzungsId>,
}

impl ProxyTransport {
    /// `relay_url` inklusive Pfad, z. B. `wss://relay.intervox.app/ws`
    pub fn neu(relay_url: impl Into<String>) -> Self {
        Self {
            relay_url: relay_url.into(),
            leitung: None,
            sitzungs_id: None,
        }
    }
}

fn relay_url_mit_agent(relay_url: &str, agent_id: &AgentId) -> String {
    let trenner = if relay_url.contains('?') { '&' } else { '?' };
    format!("{}{}agent_id={}", relay_url, trenner, agent_id)
}

#[async_trait]
impl TransportStrategie for ProxyTransport {
    fn art(&self) -> TransportArt {
        TransportArt::Proxy
    }

    async fn starten(
        &mut self,
        konfig: &SitzungsKonfig,
    ) -> TransportResult<mpsc::Receiver<TransportEreignis>> {
        let url = relay_url_mit_agent(&self.relay_url, &konfig.agent_id);
        // Der Relay injiziert die Zugangsdaten; der Client liefert nur
        // Szenario-Override und Variablen
        let initiierung =
            RelayClientFrame::initiierung(konfig.konfig_override.clone(), konfig.variablen.clone())
                .to_json()
                .map_err(|e| TransportError::Protokoll(e.to_string()))?;

        let (leitung, ereignisse) =
            WsLeitung::oeffnen(&url, konfig.verbindungs_timeout, initiierung).await?;

        self.leitung = Some(leitung);
        self.sitzungs_id = Some(SitzungsId::neu());
        info!("Relay-Transport verbunden: agent={}", konfig.agent_id);
        Ok(ereignisse)
    }

    async fn audio_senden(&self, chunk: AudioChunk) -> TransportResult<()> {
        let Some(leitung) = &self.leitung else {
            return Ok(());
        };
        if !leitung.ist_aktiv() {
            return Ok(());
        }
        let json = UserAudioChunk::aus_bytes(&chunk.daten)
            .to_json()
            .map_err(|e| TransportError::Protokoll(e.to_string()))?;
        leitung.text_senden(json).await
    }

    async fn beenden(&mut self) {
        if let Some(mut leitung) = self.leitung.take() {
            leitung.schliessen().await;
        }
    }

    fn sitzungs_id(&self) -> Option<SitzungsId> {
        self.sitzungs_id.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relay_url_ohne_query() {
        let url = relay_url_mit_agent("wss://relay.intervox.app/ws", &AgentId::neu("a1"));
        assert_eq!(url, "wss://relay.intervox.app/ws?agent_id=a1");
    }

    #[test]
    fn relay_url_mit_bestehender_query() {
        let url = relay_url_mit_agent("wss://relay.intervox.app/ws?v=2", &AgentId::neu("a1"));
        assert_eq!(url, "wss://relay.intervox.app/ws?v=2&agent_id=a1");
    }

    #[tokio::test]
    async fn audio_senden_vor_start_ist_noop() {
        let transport = ProxyTransport::neu("wss://relay.example.test/ws");
        let chunk = AudioChunk::neu(vec![1u8, 2], intervox_core::AudioKodierung::Pcm16);
        assert!(transport.audio_senden(chunk).await.is_ok());
    }
}
