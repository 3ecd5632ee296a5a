//! Nativer WebSocket-Transport
//!
//! Direkte wss-Verbindung zum Konversationsdienst. Die Stimme und das
//! Szenario liegen im `konfig_override` und sind ab dem Start fest.

use async_trait::async_trait;
use tokio::sync::mpsc;
use tracing::info;

use crate::error::{TransportError, TransportResult};
use crate::strategie::{SitzungsKonfig, TransportStrategie};
use crate::ws_leitung::WsLeitung;
use intervox_core::{AgentId, AudioChunk, SitzungsId, TransportArt, TransportEreignis};
use intervox_protocol::{RelayClientFrame, UserAudioChunk};

/// Direkter WebSocket zum Konversationsdienst
pub struct NativTransport {
    basis_url: String,
    leitung: Option<WsLeitung>,
    sitzungs_id: Option<SitzungsId>,
}

impl NativTransport {
    /// `basis_url` ohne Pfad, z. B. `wss://api.elevenlabs.io`
    pub fn neu(basis_url: impl Into<String>) -> Self {
        Self {
            basis_url: basis_url.into(),
            leitung: None,
            sitzungs_id: None,
        }
    }
}

pub(crate) fn sitzungs_url(basis: &str, agent_id: &AgentId) -> String {
    format!(
        "{}/v1/convai/conversation?agent_id={}",
        basis.trim_end_matches('/'),
        agent_id
    )
}

#[async_trait]
impl TransportStrategie for NativTransport {
    fn art(&self) -> TransportArt {
        TransportArt::Nativ
    }

    async fn starten(
        &mut self,
        konfig: &SitzungsKonfig,
    ) -> TransportResult<mpsc::Receiver<TransportEreignis>> {
        let url = sitzungs_url(&self.basis_url, &konfig.agent_id);
        let initiierung =
            RelayClientFrame::initiierung(konfig.konfig_override.clone(), konfig.variablen.clone())
                .to_json()
                .map_err(|e| TransportError::Protokoll(e.to_string()))?;

        let (leitung, ereignisse) =
            WsLeitung::oeffnen(&url, konfig.verbindungs_timeout, initiierung).await?;

        self.leitung = Some(leitung);
        self.sitzungs_id = Some(SitzungsId::neu());
        info!("Nativer Transport verbunden: agent={}", konfig.agent_id);
        Ok(ereignisse)
    }

    async fn audio_senden(&self, chunk: AudioChunk) -> TransportResult<()> {
        // Vor dem Start und nach dem Ende ein No-op
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
