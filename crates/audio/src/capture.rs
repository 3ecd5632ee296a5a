//! Mikrofon-Capture via cpal
//!
//! Der cpal-Stream ist nicht Send und lebt deshalb in einem eigenen
//! Capture-Thread: der cpal-Callback schreibt Samples in einen
//! lock-free Ring-Buffer, der Thread liest im 20-ms-Takt, misst den
//! Pegel und schneidet kodierte Chunks. Startfehler werden ueber einen
//! Kanal an den Aufrufer gemeldet.

use std::thread::JoinHandle;
use std::time::Duration;

use cpal::traits::{DeviceTrait, StreamTrait};
use cpal::{BuildStreamError, Device, SampleFormat, Stream, StreamConfig};
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use ringbuf::traits::{Consumer, Producer, Split};
use ringbuf::{HeapCons, HeapRb};
use tokio::sync::{mpsc, watch};
use tracing::{debug, error, info, warn};

use crate::chunker::ChunkSchneider;
use crate::codec::FRAME_MS;
use crate::device;
use crate::error::{AudioError, AudioResult};
use crate::pegel::PegelMesser;
use intervox_core::{AudioChunk, AudioKodierung};

/// Konfiguration fuer den Mikrofon-Capture
#[derive(Debug, Clone)]
pub struct CaptureKonfig {
    /// Abtastrate in Hz
    pub sample_rate: u32,
    /// Kanalanzahl (1 = Mono)
    pub kanaele: u16,
    /// Chunk-Dauer in Millisekunden
    pub chunk_ms: u32,
    /// Ring-Buffer Kapazitaet in Sekunden
    pub puffer_sekunden: u32,
}

impl Default for CaptureKonfig {
    fn default() -> Self {
        Self {
            sample_rate: 16000,
            kanaele: 1,
            chunk_ms: 200,
            puffer_sekunden: 2,
        }
    }
}

/// Laufzeit-Optionen beim Start einer Aufnahme
#[derive(Debug, Clone, Default)]
pub struct CaptureOptionen {
    /// Gewuenschtes Eingabegeraet (Teilstring des Namens), `None` fuer
    /// das Standardgeraet
    pub geraet_id: Option<String>,
}

/// Ausgabe-Stroeme einer laufenden Aufnahme
pub struct CaptureStroeme {
    /// Kodierte Audio-Chunks im festen Takt
    pub chunks: mpsc::Receiver<AudioChunk>,
    /// Geglaetteter Eingangspegel in [0,1]
    pub pegel: watch::Receiver<f32>,
    /// Tatsaechlich gewaehlte Kodierung der Chunks
    pub kodierung: AudioKodierung,
}

/// Laufende Mikrofon-Aufnahme
///
/// Haelt den Capture-Thread am Leben. `stoppen` (oder Drop) beendet
/// den Thread und gibt das Mikrofon deterministisch frei.
pub struct CaptureEngine {
    stop_tx: Sender<()>,
    handle: Option<JoinHandle<()>>,
}

impl CaptureEngine {
    /// Startet die Aufnahme auf dem gewaehlten Geraet
    ///
    /// Blockiert bis der Capture-Thread den Stream geoeffnet hat (oder
    /// gescheitert ist). Ein abgelehnter Mikrofon-Zugriff ergibt
    /// `MikrofonVerweigert`, eine unbekannte Geraete-ID
    /// `GeraetNichtGefunden` ohne dass ein Stream geoeffnet wird.
    pub fn starten(
        konfig: CaptureKonfig,
        optionen: CaptureOptionen,
    ) -> AudioResult<(Self, CaptureStroeme)> {
        let (start_tx, start_rx) = crossbeam_channel::bounded::<AudioResult<AudioKodierung>>(1);
        let (stop_tx, stop_rx) = crossbeam_channel::bounded::<()>(1);
        let (chunk_tx, chunk_rx) = mpsc::channel::<AudioChunk>(32);
        let (pegel_tx, pegel_rx) = watch::channel(0.0f32);

        let thread_konfig = konfig.clone();
        let handle = std::thread::Builder::new()
            .name("intervox-capture".into())
            .spawn(move || {
                capture_thread(thread_konfig, optionen, start_tx, stop_rx, chunk_tx, pegel_tx)
            })
            .map_err(|e| AudioError::StreamFehler(e.to_string()))?;

        let kodierung = match start_rx.recv() {
            Ok(Ok(kodierung)) => kodierung,
            Ok(Err(e)) => {
                let _ = handle.join();
                return Err(e);
            }
            Err(_) => {
                let _ = handle.join();
                return Err(AudioError::StreamFehler(
                    "Capture-Thread vorzeitig beendet".into(),
                ));
            }
        };

        info!(
            "Aufnahme gestartet: {}Hz, Chunks alle {}ms als {:?}",
            konfig.sample_rate, konfig.chunk_ms, kodierung
        );

        Ok((
            Self {
                stop_tx,
                handle: Some(handle),
            },
            CaptureStroeme {
                chunks: chunk_rx,
                pegel: pegel_rx,
                kodierung,
            },
        ))
    }

    /// Beendet die Aufnahme und wartet auf den Capture-Thread
    ///
    /// Idempotent: weitere Aufrufe sind wirkungslos.
    pub fn stoppen(&mut self) {
        if let Some(handle) = self.handle.take() {
            let _ = self.stop_tx.send(());
            if handle.join().is_err() {
                error!("Capture-Thread ist abgestuerzt");
            }
            debug!("Aufnahme gestoppt, Mikrofon freigegeben");
        }
    }
}

impl Drop for CaptureEngine {
    fn drop(&mut self) {
        self.stoppen();
    }
}

// ---------------------------------------------------------------------------
// Capture-Thread
// ---------------------------------------------------------------------------

fn capture_thread(
    konfig: CaptureKonfig,
    optionen: CaptureOptionen,
    start_tx: Sender<AudioResult<AudioKodierung>>,
    stop_rx: Receiver<()>,
    chunk_tx: mpsc::Sender<AudioChunk>,
    pegel_tx: watch::Sender<f32>,
) {
    let eroeffnung = device::eingabegeraet_finden(optionen.geraet_id.as_deref())
        .and_then(|geraet| eingabestream_oeffnen(&geraet, &konfig));

    let (stream, mut consumer) = match eroeffnung {
        Ok(paar) => paar,
        Err(e) => {
            let _ = start_tx.send(Err(e));
            return;
        }
    };

    let mut schneider = ChunkSchneider::neu(konfig.sample_rate, konfig.chunk_ms);
    let mut messer = PegelMesser::default();
    if start_tx.send(Ok(schneider.kodierung())).is_err() {
        return;
    }

    let takt = Duration::from_millis(FRAME_MS as u64);
    let mut block = vec![0.0f32; (konfig.sample_rate / 1000 * FRAME_MS * 2) as usize];

    loop {
        match stop_rx.recv_timeout(takt) {
            Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
            Err(RecvTimeoutError::Timeout) => {}
        }

        let gelesen = consumer.pop_slice(&mut block);
        if gelesen == 0 {
            continue;
        }
        let _ = pegel_tx.send(messer.verarbeiten(&block[..gelesen]));
        for chunk in schneider.schieben(&block[..gelesen]) {
            if chunk_tx.try_send(chunk).is_err() {
                warn!("Chunk-Kanal voll, Audio-Chunk verworfen");
            }
        }
    }

    // Restpuffer als letzten (aufgefuellten) Chunk ausgeben
    if let Some(rest) = schneider.rest_leeren() {
        let _ = chunk_tx.try_send(rest);
    }

    drop(stream);
    debug!("Capture-Thread beendet");
}

fn stream_fehler(e: BuildStreamError) -> AudioError {
    match e {
        // Geraet belegt oder Zugriff vom System verweigert
        BuildStreamError::DeviceNotAvailable => AudioError::MikrofonVerweigert,
        andere => AudioError::StreamFehler(andere.to_string()),
    }
}

fn eingabestream_oeffnen(
    geraet: &Device,
    konfig: &CaptureKonfig,
) -> AudioResult<(Stream, HeapCons<f32>)> {
    let stream_config = StreamConfig {
        channels: konfig.kanaele,
        sample_rate: cpal::SampleRate(konfig.sample_rate),
        buffer_size: cpal::BufferSize::Default,
    };

    let kapazitaet = (konfig.sample_rate * konfig.puffer_sekunden) as usize;
    let rb = HeapRb::<f32>::new(kapazitaet.max(1024));
    let (mut producer, consumer) = rb.split();

    let err_fn = |err| error!("Capture-Fehler: {}", err);

    let supported = geraet
        .supported_input_configs()
        .map_err(|e| AudioError::StreamFehler(e.to_string()))?
        .find(|c| {
            c.min_sample_rate().0 <= konfig.sample_rate
                && c.max_sample_rate().0 >= konfig.sample_rate
                && c.channels() >= konfig.kanaele
        });

    let sample_format = supported
        .map(|c| c.sample_format())
        .unwrap_or(SampleFormat::F32);

    let stream = match sample_format {
        SampleFormat::F32 => geraet
            .build_input_stream(
                &stream_config,
                move |data: &[f32], _| {
                    let geschrieben = producer.push_slice(data);
                    if geschrieben < data.len() {
                        warn!(
                            "Capture Ring-Buffer voll, {} Samples verworfen",
                            data.len() - geschrieben
                        );
                    }
                },
                err_fn,
                None,
            )
            .map_err(stream_fehler)?,
        SampleFormat::I16 => geraet
            .build_input_stream(
                &stream_config,
                move |data: &[i16], _| {
                    let floats: Vec<f32> =
                        data.iter().map(|&s| s as f32 / i16::MAX as f32).collect();
                    let geschrieben = producer.push_slice(&floats);
                    if geschrieben < floats.len() {
                        warn!("Capture Ring-Buffer voll");
                    }
                },
                err_fn,
                None,
            )
            .map_err(stream_fehler)?,
        andere => {
            return Err(AudioError::StreamFehler(format!(
                "Nicht unterstuetztes Sample-Format: {:?}",
                andere
            )))
        }
    };

    stream
        .play()
        .map_err(|e| AudioError::StreamFehler(e.to_string()))?;

    debug!(
        "Capture-Stream geoeffnet: {}Hz {}ch",
        konfig.sample_rate, konfig.kanaele
    );

    Ok((stream, consumer))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capture_konfig_default() {
        let konfig = CaptureKonfig::default();
        assert_eq!(konfig.sample_rate, 16000);
        assert_eq!(konfig.kanaele, 1);
        assert_eq!(konfig.chunk_ms, 200);
    }

    #[test]
    fn geraete_verweigerung_wird_abgebildet() {
        let fehler = stream_fehler(BuildStreamError::DeviceNotAvailable);
        assert!(matches!(fehler, AudioError::MikrofonVerweigert));
    }

    #[test]
    #[ignore = "Benoetigt Audio-Hardware"]
    fn aufnahme_starten_und_stoppen() {
        let (mut engine, stroeme) =
            CaptureEngine::starten(CaptureKonfig::default(), CaptureOptionen::default())
                .expect("Aufnahme sollte startbar sein");
        std::thread::sleep(Duration::from_millis(300));
        engine.stoppen();
        // Zweites Stoppen ist wirkungslos
        engine.stoppen();
        drop(stroeme);
    }

    #[test]
    #[ignore = "Benoetigt Audio-Hardware"]
    fn unbekanntes_geraet_verhindert_start() {
        let optionen = CaptureOptionen {
            geraet_id: Some("definitiv-nicht-vorhanden-4711".into()),
        };
        let ergebnis = CaptureEngine::starten(CaptureKonfig::default(), optionen);
        assert!(matches!(
            ergebnis,
            Err(AudioError::GeraetNichtGefunden(_))
        ));
    }
}
