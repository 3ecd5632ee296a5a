//! Strikt sequentielle Audio-Wiedergabe
//!
//! Die `WiedergabeWarteschlange` spielt Agenten-Chunks in
//! Ankunftsreihenfolge ab, nie ueberlappend. Bei einer Unterbrechung
//! (Barge-in) verwirft `leeren` die Warteschlange samt laufendem Chunk.
//!
//! Die Abspielschleife schreibt in 20-ms-Scheiben in eine `SampleSenke`
//! und taktet per Timer; dadurch greift ein Flush innerhalb einer
//! Scheibe und die Schleife laesst sich ohne Audio-Hardware testen.

use std::collections::VecDeque;
use std::io::Cursor;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::thread::JoinHandle;
use std::time::Duration;

use cpal::traits::{DeviceTrait, StreamTrait};
use cpal::{Device, SampleFormat, Stream, StreamConfig};
use crossbeam_channel::Sender;
use parking_lot::Mutex;
use ringbuf::traits::{Consumer, Producer, Split};
use ringbuf::{HeapProd, HeapRb};
use rodio::Source;
use tokio::sync::Notify;
use tracing::{debug, error, warn};

use crate::codec::{self, OpusDekodierer};
use crate::device;
use crate::error::{AudioError, AudioResult};
use intervox_core::{AudioChunk, AudioKodierung};

/// Konfiguration der Wiedergabe
#[derive(Debug, Clone)]
pub struct WiedergabeKonfig {
    /// Abtastrate der Ausgabe in Hz
    pub sample_rate: u32,
    /// Kanalanzahl der Ausgabe
    pub kanaele: u16,
    /// Angenommene Abtastrate eingehender Opus/PCM16-Chunks
    pub quell_rate: u32,
    /// Scheiben-Dauer der Abspielschleife in Millisekunden
    pub scheiben_ms: u32,
    /// Ring-Buffer Kapazitaet in Sekunden
    pub puffer_sekunden: u32,
}

impl Default for WiedergabeKonfig {
    fn default() -> Self {
        Self {
            sample_rate: 48000,
            kanaele: 1,
            quell_rate: 16000,
            scheiben_ms: 20,
            puffer_sekunden: 1,
        }
    }
}

/// Abnehmer fuer dekodierte Samples
///
/// Produktiv schreibt die `AusgabeSenke` in den Ring-Buffer des
/// cpal-Streams; Tests haengen eine aufzeichnende Senke ein.
pub trait SampleSenke: Send {
    /// Nimmt einen Block dekodierter Samples entgegen
    fn schreiben(&mut self, samples: &[f32]) -> AudioResult<()>;
    /// Abtastrate der Senke in Hz
    fn sample_rate(&self) -> u32;
}

/// Sequentielle Wiedergabe-Warteschlange mit Barge-in-Flush
pub struct WiedergabeWarteschlange {
    warteschlange: Mutex<VecDeque<AudioChunk>>,
    wecker: Notify,
    generation: AtomicU64,
    spielt: AtomicBool,
    laeuft: AtomicBool,
    konfig: WiedergabeKonfig,
}

impl WiedergabeWarteschlange {
    pub fn neu(konfig: WiedergabeKonfig) -> Self {
        Self {
            warteschlange: Mutex::new(VecDeque::new()),
            wecker: Notify::new(),
            generation: AtomicU64::new(0),
            spielt: AtomicBool::new(false),
            laeuft: AtomicBool::new(true),
            konfig,
        }
    }

    /// Reiht einen Chunk ans Ende der Warteschlange ein
    pub fn einreihen(&self, chunk: AudioChunk) {
        if chunk.ist_leer() {
            return;
        }
        self.warteschlange.lock().push_back(chunk);
        self.wecker.notify_one();
    }

    /// Verwirft Warteschlange und laufenden Chunk (Barge-in)
    pub fn leeren(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
        let verworfen = {
            let mut warteschlange = self.warteschlange.lock();
            let n = warteschlange.len();
            warteschlange.clear();
            n
        };
        debug!("Wiedergabe geleert, {} Chunks verworfen", verworfen);
    }

    /// Spielt gerade ein Chunk?
    pub fn spielt(&self) -> bool {
        self.spielt.load(Ordering::SeqCst)
    }

    /// Beendet die Abspielschleife endgueltig
    pub fn beenden(&self) {
        self.laeuft.store(false, Ordering::SeqCst);
        self.wecker.notify_one();
    }

    /// Abspielschleife: dekodiert und schreibt Chunks in die Senke
    ///
    /// Laeuft bis `beenden` gerufen wird. Nicht dekodierbare Chunks
    /// werden mit Warnung uebersprungen, die Sitzung laeuft weiter.
    pub async fn abspielen(&self, senke: &mut dyn SampleSenke) {
        let mut opus: Option<OpusDekodierer> = None;
        let ziel_rate = senke.sample_rate();
        let scheibe = (ziel_rate / 1000 * self.konfig.scheiben_ms) as usize;
        let scheiben_dauer = Duration::from_millis(self.konfig.scheiben_ms as u64);

        while self.laeuft.load(Ordering::SeqCst) {
            let chunk = self.warteschlange.lock().pop_front();
            let Some(chunk) = chunk else {
                self.spielt.store(false, Ordering::SeqCst);
                self.wecker.notified().await;
                continue;
            };

            let generation = self.generation.load(Ordering::SeqCst);
            let samples =
                match chunk_dekodieren(&mut opus, &chunk, self.konfig.quell_rate, ziel_rate) {
                    Ok(samples) => samples,
                    Err(e) => {
                        warn!("Chunk nicht dekodierbar, uebersprungen: {}", e);
                        continue;
                    }
                };

            self.spielt.store(true, Ordering::SeqCst);
            for block in samples.chunks(scheibe.max(1)) {
                if self.generation.load(Ordering::SeqCst) != generation
                    || !self.laeuft.load(Ordering::SeqCst)
                {
                    break;
                }
                if let Err(e) = senke.schreiben(block) {
                    warn!("Senke verweigert Samples: {}", e);
                    break;
                }
                tokio::time::sleep(scheiben_dauer).await;
            }
        }
        self.spielt.store(false, Ordering::SeqCst);
        debug!("Abspielschleife beendet");
    }
}

/// Dekodiert einen Chunk zu f32-Samples in Ziel-Abtastrate
fn chunk_dekodieren(
    opus: &mut Option<OpusDekodierer>,
    chunk: &AudioChunk,
    quell_rate: u32,
    ziel_rate: u32,
) -> AudioResult<Vec<f32>> {
    match chunk.kodierung {
        AudioKodierung::Opus => {
            if opus.is_none() {
                *opus = Some(OpusDekodierer::neu(quell_rate, 1)?);
            }
            let dekodierer = opus.as_mut().ok_or_else(|| {
                AudioError::DekodierFehler("Opus-Dekodierer nicht initialisiert".into())
            })?;
            let mut samples = Vec::new();
            for frame in codec::frames_auspacken(&chunk.daten)? {
                samples.extend(dekodierer.dekodieren(frame)?);
            }
            Ok(codec::linear_umtasten(&samples, quell_rate, ziel_rate))
        }
        AudioKodierung::Pcm16 => {
            let samples = codec::pcm16_zu_f32(&chunk.daten);
            Ok(codec::linear_umtasten(&samples, quell_rate, ziel_rate))
        }
        AudioKodierung::Mp3 => {
            let cursor = Cursor::new(chunk.daten.to_vec());
            let dekodierer = rodio::Decoder::new(cursor)
                .map_err(|e| AudioError::DekodierFehler(e.to_string()))?;
            let rate = dekodierer.sample_rate();
            let kanaele = dekodierer.channels().max(1) as usize;
            let roh: Vec<f32> = dekodierer
                .map(|s| s as f32 / i16::MAX as f32)
                .collect();
            // Mehrkanal auf Mono mitteln
            let mono: Vec<f32> = roh
                .chunks(kanaele)
                .map(|k| k.iter().sum::<f32>() / k.len() as f32)
                .collect();
            Ok(codec::linear_umtasten(&mono, rate, ziel_rate))
        }
    }
}

// ---------------------------------------------------------------------------
// cpal-Ausgabe
// ---------------------------------------------------------------------------

/// Schreibt Samples in den Ring-Buffer des Ausgabe-Streams
pub struct AusgabeSenke {
    producer: HeapProd<f32>,
    sample_rate: u32,
}

impl SampleSenke for AusgabeSenke {
    fn schreiben(&mut self, samples: &[f32]) -> AudioResult<()> {
        let geschrieben = self.producer.push_slice(samples);
        if geschrieben < samples.len() {
            warn!(
                "Ausgabe Ring-Buffer voll, {} Samples verworfen",
                samples.len() - geschrieben
            );
        }
        Ok(())
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }
}

/// Haelt den Ausgabe-Thread samt cpal-Stream am Leben
pub struct AusgabeGriff {
    stop_tx: Sender<()>,
    handle: Option<JoinHandle<()>>,
}

impl AusgabeGriff {
    /// Schliesst den Ausgabe-Stream und wartet auf den Thread
    pub fn schliessen(&mut self) {
        if let Some(handle) = self.handle.take() {
            let _ = self.stop_tx.send(());
            if handle.join().is_err() {
                error!("Ausgabe-Thread ist abgestuerzt");
            }
        }
    }
}

impl Drop for AusgabeGriff {
    fn drop(&mut self) {
        self.schliessen();
    }
}

/// Oeffnet den cpal-Ausgabe-Stream in einem eigenen Thread
///
/// Der Stream ist nicht Send und bleibt im Thread; zurueck kommen der
/// Griff zum Schliessen und die Senke fuer die Abspielschleife.
pub fn ausgabe_oeffnen(
    konfig: &WiedergabeKonfig,
    geraet_id: Option<&str>,
) -> AudioResult<(AusgabeGriff, AusgabeSenke)> {
    let (start_tx, start_rx) = crossbeam_channel::bounded::<AudioResult<HeapProd<f32>>>(1);
    let (stop_tx, stop_rx) = crossbeam_channel::bounded::<()>(1);

    let thread_konfig = konfig.clone();
    let geraet_id = geraet_id.map(str::to_owned);
    let handle = std::thread::Builder::new()
        .name("intervox-ausgabe".into())
        .spawn(move || {
            let eroeffnung = device::ausgabegeraet_finden(geraet_id.as_deref())
                .and_then(|geraet| ausgabestream_oeffnen(&geraet, &thread_konfig));
            let stream = match eroeffnung {
                Ok((stream, producer)) => {
                    if start_tx.send(Ok(producer)).is_err() {
                        return;
                    }
                    stream
                }
                Err(e) => {
                    let _ = start_tx.send(Err(e));
                    return;
                }
            };
            // Stream halten bis zum Stopp-Signal
            let _ = stop_rx.recv();
            drop(stream);
            debug!("Ausgabe-Thread beendet");
        })
        .map_err(|e| AudioError::StreamFehler(e.to_string()))?;

    let producer = match start_rx.recv() {
        Ok(Ok(producer)) => producer,
        Ok(Err(e)) => {
            let _ = handle.join();
            return Err(e);
        }
        Err(_) => {
            let _ = handle.join();
            return Err(AudioError::StreamFehler(
                "Ausgabe-Thread vorzeitig beendet".into(),
            ));
        }
    };

    Ok((
        AusgabeGriff {
            stop_tx,
            handle: Some(handle),
        },
        AusgabeSenke {
            producer,
            sample_rate: konfig.sample_rate,
        },
    ))
}

fn ausgabestream_oeffnen(
    geraet: &Device,
    konfig: &WiedergabeKonfig,
) -> AudioResult<(Stream, HeapProd<f32>)> {
    let stream_config = StreamConfig {
        channels: konfig.kanaele,
        sample_rate: cpal::SampleRate(konfig.sample_rate),
        buffer_size: cpal::BufferSize::Default,
    };

    let kapazitaet = (konfig.sample_rate * konfig.puffer_sekunden) as usize;
    let rb = HeapRb::<f32>::new(kapazitaet.max(1024));
    let (producer, mut consumer) = rb.split();

    let err_fn = |err| error!("Wiedergabe-Fehler: {}", err);

    let supported = geraet
        .supported_output_configs()
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
            .build_output_stream(
                &stream_config,
                move |data: &mut [f32], _| {
                    let gelesen = consumer.pop_slice(data);
                    // Stille fuer fehlende Samples
                    if gelesen < data.len() {
                        data[gelesen..].fill(0.0);
                    }
                },
                err_fn,
                None,
            )
            .map_err(|e| AudioError::StreamFehler(e.to_string()))?,
        SampleFormat::I16 => geraet
            .build_output_stream(
                &stream_config,
                move |data: &mut [i16], _| {
                    let mut float_buf = vec![0.0f32; data.len()];
                    let gelesen = consumer.pop_slice(&mut float_buf);
                    float_buf[gelesen..].fill(0.0);
                    for (out, s) in data.iter_mut().zip(float_buf.iter()) {
                        *out = (*s * i16::MAX as f32)
                            .clamp(i16::MIN as f32, i16::MAX as f32)
                            as i16;
                    }
                },
                err_fn,
                None,
            )
            .map_err(|e| AudioError::StreamFehler(e.to_string()))?,
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
        "Ausgabe-Stream geoeffnet: {}Hz {}ch",
        konfig.sample_rate, konfig.kanaele
    );

    Ok((stream, producer))
}
