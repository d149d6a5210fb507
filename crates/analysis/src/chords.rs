use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use tracing::{debug, info, instrument};

use tonika_audio::chroma::SEMITONES;
use tonika_audio::{normalize_chroma, Chroma, ChromaExtractor, MonoAudio};
use tonika_domain::{ChordEvent, PitchClass, NO_CHORD};

/// Source of timestamped chord labels for an audio file.
///
/// `audio` is the already decoded content of `audio_path`; detectors that
/// only need the location may ignore it.
pub trait ChordDetector {
    fn detect(&self, audio_path: &Path, audio: &MonoAudio) -> Result<Vec<ChordEvent>>;
}

/// Reads chords from a `.lab` style sidecar file.
///
/// Each non-empty line is either `<time> <label>` or `<start> <end> <label>`;
/// lines starting with `#` are ignored. Without an explicit sidecar the file
/// next to the audio with a `.lab` extension is used.
#[derive(Debug, Clone, Default)]
pub struct LabChordDetector {
    sidecar: Option<PathBuf>,
}

impl LabChordDetector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_sidecar(path: impl Into<PathBuf>) -> Self {
        Self {
            sidecar: Some(path.into()),
        }
    }

    fn sidecar_for(&self, audio_path: &Path) -> PathBuf {
        self.sidecar
            .clone()
            .unwrap_or_else(|| audio_path.with_extension("lab"))
    }
}

impl ChordDetector for LabChordDetector {
    fn detect(&self, audio_path: &Path, _audio: &MonoAudio) -> Result<Vec<ChordEvent>> {
        let path = self.sidecar_for(audio_path);
        let content = fs::read_to_string(&path)
            .with_context(|| format!("read chord sidecar {:?}", path))?;
        let events =
            parse_lab(&content).with_context(|| format!("parse chord sidecar {:?}", path))?;
        info!(path = ?path, events = events.len(), "loaded chord sidecar");
        Ok(events)
    }
}

pub fn parse_lab(content: &str) -> Result<Vec<ChordEvent>> {
    let mut events = Vec::new();
    for (index, line) in content.lines().enumerate() {
        let line_no = index + 1;
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let fields: Vec<&str> = line.split_whitespace().collect();
        let (time, label) = match fields.as_slice() {
            [time, label] => (*time, *label),
            [start, _end, label] => (*start, *label),
            _ => bail!("line {line_no}: expected `<time> <label>` or `<start> <end> <label>`"),
        };
        let timestamp: f64 = time
            .parse()
            .with_context(|| format!("line {line_no}: invalid timestamp {time:?}"))?;
        events.push(ChordEvent::new(label, timestamp).with_context(|| format!("line {line_no}"))?);
    }
    Ok(events)
}

pub const CHROMA_FRAME_SIZE: usize = 4096;
pub const CHROMA_HOP_SIZE: usize = 1024;
const CHROMA_FMIN: f32 = 60.0;
const CHROMA_FMAX: f32 = 2000.0;
/// Windows quieter than this RMS are labelled as no chord.
const SILENCE_RMS: f32 = 1e-3;

/// Chord qualities with their intervals above the root, in template order.
const CHORD_TEMPLATES: [(&str, &[usize]); 5] = [
    ("", &[0, 4, 7]),
    ("m", &[0, 3, 7]),
    ("7", &[0, 4, 7, 10]),
    ("maj7", &[0, 4, 7, 11]),
    ("m7", &[0, 3, 7, 10]),
];

/// Template matcher over fixed-length chroma windows.
pub struct ChromaChordDetector {
    extractor: ChromaExtractor,
    window_seconds: f64,
}

impl ChromaChordDetector {
    pub fn new(frame_size: usize, hop_size: usize, window_seconds: f64) -> Self {
        Self {
            extractor: ChromaExtractor::new(frame_size, hop_size, CHROMA_FMIN, CHROMA_FMAX),
            window_seconds,
        }
    }

    pub fn with_window(window_seconds: f64) -> Self {
        Self::new(CHROMA_FRAME_SIZE, CHROMA_HOP_SIZE, window_seconds)
    }

    /// One event per label change; the first window always produces one.
    #[instrument(skip_all, fields(duration = audio.duration()))]
    pub fn detect_audio(&self, audio: &MonoAudio) -> Result<Vec<ChordEvent>> {
        let window = ((self.window_seconds * audio.sample_rate as f64).round() as usize).max(1);
        let mut events: Vec<ChordEvent> = Vec::new();
        for (index, chunk) in audio.samples.chunks(window).enumerate() {
            let timestamp = (index * window) as f64 / audio.sample_rate as f64;
            let label = if rms(chunk) < SILENCE_RMS {
                NO_CHORD.to_string()
            } else {
                let (chroma, _) = self.extractor.extract(chunk, audio.sample_rate)?;
                best_template(&normalize_chroma(&chroma))
            };
            if events.last().map_or(true, |last| last.chord != label) {
                debug!(timestamp, chord = %label, "chord change");
                events.push(ChordEvent::new(label, timestamp)?);
            }
        }
        Ok(events)
    }
}

impl Default for ChromaChordDetector {
    fn default() -> Self {
        Self::with_window(0.5)
    }
}

impl ChordDetector for ChromaChordDetector {
    fn detect(&self, _audio_path: &Path, audio: &MonoAudio) -> Result<Vec<ChordEvent>> {
        self.detect_audio(audio)
    }
}

fn rms(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    (samples.iter().map(|s| s * s).sum::<f32>() / samples.len() as f32).sqrt()
}

/// Mean chroma on the template minus mean chroma off it; the first best template wins.
fn template_score(chroma: &Chroma, root: usize, intervals: &[usize]) -> f32 {
    let mut on = 0.0;
    let mut off = 0.0;
    for (class, value) in chroma.iter().enumerate() {
        let interval = (class + SEMITONES - root) % SEMITONES;
        if intervals.contains(&interval) {
            on += value;
        } else {
            off += value;
        }
    }
    on / intervals.len() as f32 - off / (SEMITONES - intervals.len()) as f32
}

pub fn best_template(chroma: &Chroma) -> String {
    let mut best = (f32::NEG_INFINITY, String::from(NO_CHORD));
    for root in PitchClass::ALL {
        for (suffix, intervals) in CHORD_TEMPLATES {
            let score = template_score(chroma, root.index(), intervals);
            if score > best.0 {
                best = (score, format!("{}{}", root.name(), suffix));
            }
        }
    }
    best.1
}
