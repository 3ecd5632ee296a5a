//! Chunk-Schneider
//!
//! Sammelt Mikrofon-Samples und gibt im festen Takt kodierte
//! AudioChunks aus (Standard 200 ms). Die Logik ist vom cpal-Callback
//! getrennt und dadurch ohne Audio-Hardware testbar.

use tracing::warn;

use crate::codec::{self, OpusKodierer};
use intervox_core::{AudioChunk, AudioKodierung};

/// Schneidet den Sample-Strom in kodierte Chunks
pub struct ChunkSchneider {
    kodierer: Option<OpusKodierer>,
    kodierung: AudioKodierung,
    puffer: Vec<f32>,
    samples_pro_chunk: usize,
}

impl ChunkSchneider {
    /// Erstellt einen Schneider mit Faehigkeits-Probe (Opus, sonst PCM16)
    pub fn neu(sample_rate: u32, chunk_ms: u32) -> Self {
        let (kodierung, kodierer) = codec::bevorzugte_kodierung(sample_rate, 1);
        Self::mit_kodierer(kodierung, kodierer, sample_rate, chunk_ms)
    }

    /// Erstellt einen Schneider mit fester Kodierung (fuer Tests)
    pub fn mit_kodierer(
        kodierung: AudioKodierung,
        kodierer: Option<OpusKodierer>,
        sample_rate: u32,
        chunk_ms: u32,
    ) -> Self {
        // Chunk-Dauer auf volle Opus-Frames runden
        let chunk_ms = chunk_ms.max(codec::FRAME_MS) / codec::FRAME_MS * codec::FRAME_MS;
        Self {
            kodierer,
            kodierung,
            puffer: Vec::new(),
            samples_pro_chunk: (sample_rate / 1000 * chunk_ms) as usize,
        }
    }

    /// Gewaehlte Kodierung der ausgegebenen Chunks
    pub fn kodierung(&self) -> AudioKodierung {
        self.kodierung
    }

    /// Nimmt Samples auf und gibt null oder mehr fertige Chunks zurueck
    pub fn schieben(&mut self, samples: &[f32]) -> Vec<AudioChunk> {
        self.puffer.extend_from_slice(samples);
        let mut chunks = Vec::new();
        while self.puffer.len() >= self.samples_pro_chunk {
            let block: Vec<f32> = self.puffer.drain(..self.samples_pro_chunk).collect();
            if let Some(chunk) = self.block_kodieren(&block) {
                chunks.push(chunk);
            }
        }
        chunks
    }

    /// Gibt den Restpuffer als letzten (mit Stille aufgefuellten) Chunk aus
    pub fn rest_leeren(&mut self) -> Option<AudioChunk> {
        if self.puffer.is_empty() {
            return None;
        }
        let mut block = std::mem::take(&mut self.puffer);
        block.resize(self.samples_pro_chunk, 0.0);
        self.block_kodieren(&block)
    }

    fn block_kodieren(&mut self, block: &[f32]) -> Option<AudioChunk> {
        match &mut self.kodierer {
            Some(kodierer) => {
                let frame_groesse = kodierer.frame_groesse();
                let mut frames = Vec::with_capacity(block.len() / frame_groesse);
                for frame in block.chunks_exact(frame_groesse) {
                    match kodierer.kodieren(frame) {
                        Ok(opus) => frames.push(opus),
                        Err(e) => {
                            // Lokaler Fehler: Chunk verwerfen, Strom laeuft weiter
                            warn!("Opus-Kodierung fehlgeschlagen, Chunk verworfen: {}", e);
                            return None;
                        }
                    }
                }
                Some(AudioChunk::neu(
                    codec::frames_einpacken(&frames),
                    AudioKodierung::Opus,
                ))
            }
            None => Some(AudioChunk::neu(
                codec::f32_zu_pcm16(block),
                AudioKodierung::Pcm16,
            )),
        }
    }
}
