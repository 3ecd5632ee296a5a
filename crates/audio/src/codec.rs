//! Opus Encoder/Decoder Wrapper und PCM-Hilfen
//!
//! Kapselt audiopus hinter einer f32-PCM-API. Mehrere Opus-Frames eines
//! Chunks werden laengenpraefixiert verpackt (u16 LE pro Frame), da
//! Opus-Frames nicht selbst-abgrenzend sind.
//!
//! Die Kodierungswahl laeuft als Faehigkeits-Probe: bevorzugt Opus,
//! Fallback auf rohes PCM16 wenn der Encoder nicht erstellbar ist
//! (z. B. nicht unterstuetzte Abtastrate).

use audiopus::{
    coder::{Decoder, Encoder},
    Application, Channels, SampleRate,
};
use tracing::{debug, warn};

use crate::error::{AudioError, AudioResult};
use intervox_core::AudioKodierung;

/// Frame-Dauer in Millisekunden (fest 20 ms, Sprach-Standard)
pub const FRAME_MS: u32 = 20;

fn rate_zu_audiopus(rate: u32) -> AudioResult<SampleRate> {
    match rate {
        8000 => Ok(SampleRate::Hz8000),
        12000 => Ok(SampleRate::Hz12000),
        16000 => Ok(SampleRate::Hz16000),
        24000 => Ok(SampleRate::Hz24000),
        48000 => Ok(SampleRate::Hz48000),
        andere => Err(AudioError::CodecFehler(format!(
            "Abtastrate {} von Opus nicht unterstuetzt",
            andere
        ))),
    }
}

fn kanaele_zu_audiopus(kanaele: u16) -> AudioResult<Channels> {
    match kanaele {
        1 => Ok(Channels::Mono),
        2 => Ok(Channels::Stereo),
        andere => Err(AudioError::CodecFehler(format!(
            "Kanalanzahl {} von Opus nicht unterstuetzt",
            andere
        ))),
    }
}

/// Opus-Encoder: kodiert f32-PCM zu Opus-Frames
pub struct OpusKodierer {
    encoder: Encoder,
    frame_groesse: usize,
}

impl OpusKodierer {
    /// Erstellt einen Encoder im Voip-Profil
    pub fn neu(sample_rate: u32, kanaele: u16) -> AudioResult<Self> {
        let sr = rate_zu_audiopus(sample_rate)?;
        let ch = kanaele_zu_audiopus(kanaele)?;

        let encoder = Encoder::new(sr, ch, Application::Voip)
            .map_err(|e| AudioError::CodecFehler(e.to_string()))?;

        let frame_groesse = (sample_rate / 1000 * FRAME_MS) as usize * kanaele as usize;
        debug!(
            "OpusKodierer erstellt: {}Hz {}ch frame_groesse={}",
            sample_rate, kanaele, frame_groesse
        );

        Ok(Self {
            encoder,
            frame_groesse,
        })
    }

    /// Kodiert genau einen PCM-Frame (`frame_groesse()` Samples)
    pub fn kodieren(&mut self, pcm: &[f32]) -> AudioResult<Vec<u8>> {
        if pcm.len() != self.frame_groesse {
            return Err(AudioError::Konfiguration(format!(
                "PCM-Frame muss {} Samples lang sein, war {}",
                self.frame_groesse,
                pcm.len()
            )));
        }

        // 4000 Bytes reichen fuer jeden Opus-Frame
        let mut ausgabe = vec![0u8; 4000];
        let geschrieben = self
            .encoder
            .encode_float(pcm, &mut ausgabe)
            .map_err(|e| AudioError::CodecFehler(e.to_string()))?;
        ausgabe.truncate(geschrieben);
        Ok(ausgabe)
    }

    /// Erwartete Frame-Groesse in Samples
    pub fn frame_groesse(&self) -> usize {
        self.frame_groesse
    }
}

/// Opus-Decoder: dekodiert Opus-Frames zu f32-PCM
pub struct OpusDekodierer {
    decoder: Decoder,
    frame_groesse: usize,
    kanaele: u16,
}

impl OpusDekodierer {
    pub fn neu(sample_rate: u32, kanaele: u16) -> AudioResult<Self> {
        let sr = rate_zu_audiopus(sample_rate)?;
        let ch = kanaele_zu_audiopus(kanaele)?;
        let decoder = Decoder::new(sr, ch).map_err(|e| AudioError::CodecFehler(e.to_string()))?;

        // Platz fuer bis zu 120ms pro Paket
        let frame_groesse = (sample_rate / 1000 * 120) as usize;

        Ok(Self {
            decoder,
            frame_groesse,
            kanaele,
        })
    }

    /// Dekodiert einen einzelnen Opus-Frame zu f32-PCM
    pub fn dekodieren(&mut self, opus_daten: &[u8]) -> AudioResult<Vec<f32>> {
        let mut ausgabe = vec![0.0f32; self.frame_groesse * self.kanaele as usize];
        let dekodiert = self
            .decoder
            .decode_float(Some(opus_daten), &mut ausgabe, false)
            .map_err(|e| AudioError::DekodierFehler(e.to_string()))?;
        ausgabe.truncate(dekodiert * self.kanaele as usize);
        Ok(ausgabe)
    }
}

// ---------------------------------------------------------------------------
// Frame-Verpackung (u16-LE-Laengenpraefix pro Opus-Frame)
// ---------------------------------------------------------------------------

/// Verpackt mehrere Opus-Frames in einen Chunk
pub fn frames_einpacken(frames: &[Vec<u8>]) -> Vec<u8> {
    let gesamt: usize = frames.iter().map(|f| f.len() + 2).sum();
    let mut chunk = Vec::with_capacity(gesamt);
    for frame in frames {
        chunk.extend_from_slice(&(frame.len() as u16).to_le_bytes());
        chunk.extend_from_slice(frame);
    }
    chunk
}

/// Zerlegt einen Chunk wieder in einzelne Opus-Frames
pub fn frames_auspacken(chunk: &[u8]) -> AudioResult<Vec<&[u8]>> {
    let mut frames = Vec::new();
    let mut pos = 0usize;
    while pos < chunk.len() {
        if pos + 2 > chunk.len() {
            return Err(AudioError::DekodierFehler(
                "Abgeschnittenes Laengenpraefix".into(),
            ));
        }
        let laenge = u16::from_le_bytes([chunk[pos], chunk[pos + 1]]) as usize;
        pos += 2;
        if pos + laenge > chunk.len() {
            return Err(AudioError::DekodierFehler(format!(
                "Frame-Laenge {} ueberschreitet Chunk-Ende",
                laenge
            )));
        }
        frames.push(&chunk[pos..pos + laenge]);
        pos += laenge;
    }
    Ok(frames)
}

// ---------------------------------------------------------------------------
// PCM16-Konvertierung
// ---------------------------------------------------------------------------

/// f32-PCM (-1.0..1.0) zu 16-Bit-Little-Endian-Bytes
pub fn f32_zu_pcm16(samples: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(samples.len() * 2);
    for s in samples {
        let wert = (s.clamp(-1.0, 1.0) * i16::MAX as f32) as i16;
        bytes.extend_from_slice(&wert.to_le_bytes());
    }
    bytes
}

/// 16-Bit-Little-Endian-Bytes zu f32-PCM
///
/// Ein ungerades Endbyte wird verworfen (abgeschnittener Frame).
pub fn pcm16_zu_f32(bytes: &[u8]) -> Vec<f32> {
    bytes
        .chunks_exact(2)
        .map(|paar| i16::from_le_bytes([paar[0], paar[1]]) as f32 / i16::MAX as f32)
        .collect()
}

/// Naive lineare Umtastung zwischen zwei Abtastraten
pub fn linear_umtasten(samples: &[f32], von_rate: u32, nach_rate: u32) -> Vec<f32> {
    if von_rate == nach_rate || samples.is_empty() {
        return samples.to_vec();
    }
    let verhaeltnis = von_rate as f64 / nach_rate as f64;
    let ziel_laenge = (samples.len() as f64 / verhaeltnis).round() as usize;
    let mut ausgabe = Vec::with_capacity(ziel_laenge);
    for i in 0..ziel_laenge {
        let quelle = i as f64 * verhaeltnis;
        let index = quelle as usize;
        let rest = (quelle - index as f64) as f32;
        let a = samples[index.min(samples.len() - 1)];
        let b = samples[(index + 1).min(samples.len() - 1)];
        ausgabe.push(a + (b - a) * rest);
    }
    ausgabe
}

// ---------------------------------------------------------------------------
// Kodierungswahl
// ---------------------------------------------------------------------------

/// Faehigkeits-Probe: bevorzugt Opus, Fallback auf PCM16
pub fn bevorzugte_kodierung(sample_rate: u32, kanaele: u16) -> (AudioKodierung, Option<OpusKodierer>) {
    match OpusKodierer::neu(sample_rate, kanaele) {
        Ok(kodierer) => (AudioKodierung::Opus, Some(kodierer)),
        Err(e) => {
            warn!("Opus nicht verfuegbar ({}), Fallback auf PCM16", e);
            (AudioKodierung::Pcm16, None)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sinus(frequenz: f32, rate: u32, samples: usize) -> Vec<f32> {
        (0..samples)
            .map(|i| (i as f32 * frequenz * 2.0 * std::f32::consts::PI / rate as f32).sin() * 0.5)
            .collect()
    }

    #[test]
    fn kodierer_frame_groesse_16khz() {
        let kodierer = OpusKodierer::neu(16000, 1).unwrap();
        // 20ms bei 16kHz = 320 Samples
        assert_eq!(kodierer.frame_groesse(), 320);
    }

    #[test]
    fn opus_hin_und_zurueck() {
        let mut kodierer = OpusKodierer::neu(16000, 1).unwrap();
        let mut dekodierer = OpusDekodierer::neu(16000, 1).unwrap();

        let pcm = sinus(440.0, 16000, 320);
        let opus = kodierer.kodieren(&pcm).unwrap();
        assert!(!opus.is_empty());
        assert!(opus.len() < pcm.len() * 4, "Opus sollte komprimieren");

        let zurueck = dekodierer.dekodieren(&opus).unwrap();
        assert_eq!(zurueck.len(), 320);
    }

    #[test]
    fn kodieren_falsche_frame_laenge() {
        let mut kodierer = OpusKodierer::neu(16000, 1).unwrap();
        let pcm = vec![0.0f32; 100];
        assert!(matches!(
            kodierer.kodieren(&pcm),
            Err(AudioError::Konfiguration(_))
        ));
    }

    #[test]
    fn frames_ein_und_auspacken() {
        let frames = vec![vec![1u8, 2, 3], vec![4u8], vec![5u8, 6]];
        let chunk = frames_einpacken(&frames);
        let entpackt = frames_auspacken(&chunk).unwrap();
        assert_eq!(entpackt.len(), 3);
        assert_eq!(entpackt[0], &[1, 2, 3]);
        assert_eq!(entpackt[1], &[4]);
        assert_eq!(entpackt[2], &[5, 6]);
    }

    #[test]
    fn auspacken_abgeschnitten() {
        let frames = vec![vec![1u8, 2, 3]];
        let mut chunk = frames_einpacken(&frames);
        chunk.truncate(chunk.len() - 1);
        assert!(matches!(
            frames_auspacken(&chunk),
            Err(AudioError::DekodierFehler(_))
        ));
    }

    #[test]
    fn pcm16_hin_und_zurueck() {
        let samples = vec![0.0f32, 0.5, -0.5, 1.0, -1.0];
        let bytes = f32_zu_pcm16(&samples);
        assert_eq!(bytes.len(), 10);
        let zurueck = pcm16_zu_f32(&bytes);
        for (a, b) in samples.iter().zip(zurueck.iter()) {
            assert!((a - b).abs() < 0.001, "{} vs {}", a, b);
        }
    }

    #[test]
    fn pcm16_ungerades_endbyte() {
        let zurueck = pcm16_zu_f32(&[0, 0, 7]);
        assert_eq!(zurueck.len(), 1);
    }

    #[test]
    fn umtasten_identisch() {
        let samples = vec![0.1f32, 0.2, 0.3];
        assert_eq!(linear_umtasten(&samples, 16000, 16000), samples);
    }

    #[test]
    fn umtasten_halbiert() {
        let samples: Vec<f32> = (0..100).map(|i| i as f32).collect();
        let ergebnis = linear_umtasten(&samples, 32000, 16000);
        assert_eq!(ergebnis.len(), 50);
    }

    #[test]
    fn umtasten_verdoppelt() {
        let samples: Vec<f32> = (0..50).map(|i| i as f32).collect();
        let ergebnis = linear_umtasten(&samples, 16000, 32000);
        assert_eq!(ergebnis.len(), 100);
    }

    #[test]
    fn kodierungswahl_bevorzugt_opus() {
        let (kodierung, kodierer) = bevorzugte_kodierung(16000, 1);
        assert_eq!(kodierung, AudioKodierung::Opus);
        assert!(kodierer.is_some());
    }

    #[test]
    fn kodierungswahl_fallback_pcm() {
        // 44100 Hz kann Opus nicht -> PCM16-Fallback
        let (kodierung, kodierer) = bevorzugte_kodierung(44100, 1);
        assert_eq!(kodierung, AudioKodierung::Pcm16);
        assert!(kodierer.is_none());
    }
}
