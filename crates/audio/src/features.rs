//! Feature extraction seam: onset strength, beat frames and pitch tracks.
//!
//! [`FeatureProvider`] is what the analysis pipeline talks to. The default
//! [`SpectralFeatures`] implementation works on a Hann-window STFT and aims
//! for stable, plausible features rather than bit-exact parity with any
//! particular DSP library.

use std::path::Path;

use anyhow::Result;
use ndarray::Array2;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::dsp::Stft;
use crate::io::{AudioDecoder, MonoAudio};

/// Tempo assumed when the onset envelope carries no periodicity at all.
pub const DEFAULT_START_BPM: f64 = 120.0;

/// Weight of the tempo-deviation penalty in dynamic-programming beat tracking.
const BEAT_TIGHTNESS: f32 = 100.0;

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct FeatureSettings {
    pub frame_size: usize,
    pub hop_size: usize,
    pub min_bpm: f64,
    pub max_bpm: f64,
    /// Lowest frequency the pitch tracker reports, in Hz.
    pub pitch_fmin: f32,
    /// Highest frequency the pitch tracker reports, in Hz.
    pub pitch_fmax: f32,
    /// Peak threshold relative to the loudest bin of each frame.
    pub pitch_threshold: f32,
}

impl Default for FeatureSettings {
    fn default() -> Self {
        Self {
            frame_size: 2048,
            hop_size: 512,
            min_bpm: 60.0,
            max_bpm: 200.0,
            pitch_fmin: 150.0,
            pitch_fmax: 4000.0,
            pitch_threshold: 0.1,
        }
    }
}

/// Per-frame onset strength.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct OnsetEnvelope {
    pub values: Vec<f32>,
    pub hop_size: usize,
    pub sample_rate: u32,
}

impl OnsetEnvelope {
    pub fn frame_to_time(&self, frame: usize) -> f64 {
        frame as f64 * self.hop_size as f64 / self.sample_rate as f64
    }

    pub fn frames_to_times(&self, frames: &[usize]) -> Vec<f64> {
        frames.iter().map(|&frame| self.frame_to_time(frame)).collect()
    }
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq)]
pub struct TempoCandidate {
    pub bpm: f64,
    /// Normalised autocorrelation strength in `[0, 1]`.
    pub confidence: f64,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct BeatTrack {
    /// Strongest first.
    pub tempo_candidates: Vec<TempoCandidate>,
    /// Onset-envelope frame indices, increasing.
    pub beat_frames: Vec<usize>,
}

/// Peak pitches and their magnitudes, shaped `(bins, frames)`; zero where no peak was found.
#[derive(Clone, Debug, PartialEq)]
pub struct PitchSpectrogram {
    pub pitches: Array2<f32>,
    pub magnitudes: Array2<f32>,
}

impl PitchSpectrogram {
    pub fn is_empty(&self) -> bool {
        self.magnitudes.is_empty()
    }
}

pub trait FeatureProvider {
    fn load(&self, path: &Path) -> Result<MonoAudio>;
    fn onset_strength(&self, audio: &MonoAudio) -> Result<OnsetEnvelope>;
    fn track_beats(&self, envelope: &OnsetEnvelope) -> Result<BeatTrack>;
    fn pitch_track(&self, segment: &[f32], sample_rate: u32) -> Result<PitchSpectrogram>;
}

pub struct SpectralFeatures {
    settings: FeatureSettings,
    stft: Stft,
}

impl SpectralFeatures {
    pub fn new(settings: FeatureSettings) -> Self {
        let stft = Stft::new(settings.frame_size, settings.hop_size);
        Self { settings, stft }
    }

    pub fn settings(&self) -> &FeatureSettings {
        &self.settings
    }

    fn tempo_candidates(&self, envelope: &OnsetEnvelope) -> Vec<TempoCandidate> {
        let values = &envelope.values;
        let frame_duration = envelope.hop_size as f64 / envelope.sample_rate as f64;
        let min_lag = ((60.0 / (self.settings.max_bpm * frame_duration)).floor() as usize).max(1);
        let max_lag = ((60.0 / (self.settings.min_bpm * frame_duration)).ceil() as usize)
            .min(values.len() / 2);
        if min_lag + 2 > max_lag {
            return Vec::new();
        }

        let mean = values.iter().sum::<f32>() / values.len() as f32;
        let centered: Vec<f32> = values.iter().map(|&x| x - mean).collect();
        let energy: f32 = centered.iter().map(|&x| x * x).sum();
        if energy < 1e-10 {
            return Vec::new();
        }
        let correlation = |lag: usize| -> f32 {
            centered[..centered.len() - lag]
                .iter()
                .zip(centered[lag..].iter())
                .map(|(&a, &b)| a * b)
                .sum::<f32>()
                / energy
        };
        let scores: Vec<f32> = (min_lag - 1..=max_lag + 1)
            .map(|lag| if lag + 1 < centered.len() { correlation(lag) } else { 0.0 })
            .collect();

        let mut candidates: Vec<TempoCandidate> = (1..scores.len() - 1)
            .filter(|&i| scores[i] > 0.0 && scores[i] > scores[i - 1] && scores[i] >= scores[i + 1])
            .map(|i| {
                let lag = (min_lag - 1 + i) as f64;
                let bpm = 60.0 / (lag * frame_duration);
                TempoCandidate {
                    bpm,
                    confidence: (scores[i] as f64 * tempo_prior(bpm)).clamp(0.0, 1.0),
                }
            })
            .collect();
        candidates.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));
        candidates.truncate(3);
        candidates
    }
}

impl Default for SpectralFeatures {
    fn default() -> Self {
        Self::new(FeatureSettings::default())
    }
}

impl FeatureProvider for SpectralFeatures {
    fn load(&self, path: &Path) -> Result<MonoAudio> {
        AudioDecoder::open(path)
    }

    fn onset_strength(&self, audio: &MonoAudio) -> Result<OnsetEnvelope> {
        let spectrogram = self.stft.magnitudes(&audio.samples)?;
        let log_spec = spectrogram.mapv(|m| m.ln_1p());
        let frames = log_spec.ncols();
        let mut values = vec![0.0f32; frames];
        for frame in 1..frames {
            let flux: f32 = log_spec
                .column(frame)
                .iter()
                .zip(log_spec.column(frame - 1).iter())
                .map(|(now, before)| (now - before).max(0.0))
                .sum();
            values[frame] = flux / log_spec.nrows() as f32;
        }
        Ok(OnsetEnvelope {
            values,
            hop_size: self.stft.hop_size(),
            sample_rate: audio.sample_rate,
        })
    }

    fn track_beats(&self, envelope: &OnsetEnvelope) -> Result<BeatTrack> {
        let mut tempo_candidates = self.tempo_candidates(envelope);
        if tempo_candidates.is_empty() {
            tempo_candidates.push(TempoCandidate {
                bpm: DEFAULT_START_BPM,
                confidence: 0.0,
            });
        }
        let bpm = tempo_candidates[0].bpm;
        let frame_duration = envelope.hop_size as f64 / envelope.sample_rate as f64;
        let period = (60.0 / (bpm * frame_duration)) as f32;
        let beat_frames = dynamic_beats(&envelope.values, period);
        debug!(bpm, beats = beat_frames.len(), "tracked beats");
        Ok(BeatTrack {
            tempo_candidates,
            beat_frames,
        })
    }

    fn pitch_track(&self, segment: &[f32], sample_rate: u32) -> Result<PitchSpectrogram> {
        let spectrogram = self.stft.magnitudes(segment)?;
        let (bins, frames) = spectrogram.dim();
        let mut pitches = Array2::zeros((bins, frames));
        let mut magnitudes = Array2::zeros((bins, frames));
        let bin_of = |hz: f32| hz * self.stft.frame_size() as f32 / sample_rate as f32;
        let low = (bin_of(self.settings.pitch_fmin).floor() as usize).max(1);
        let high = (bin_of(self.settings.pitch_fmax).ceil() as usize).min(bins.saturating_sub(1));
        if low >= high {
            return Ok(PitchSpectrogram {
                pitches,
                magnitudes,
            });
        }

        for frame in 0..frames {
            let column = spectrogram.column(frame);
            let peak = (low..high).map(|bin| column[bin]).fold(0.0f32, f32::max);
            let threshold = self.settings.pitch_threshold * peak;
            if peak <= 0.0 {
                continue;
            }
            for bin in low..high {
                let (alpha, beta, gamma) = (column[bin - 1], column[bin], column[bin + 1]);
                if beta <= threshold || beta <= alpha || beta < gamma {
                    continue;
                }
                let denom = alpha - 2.0 * beta + gamma;
                let shift = if denom.abs() > f32::EPSILON {
                    0.5 * (alpha - gamma) / denom
                } else {
                    0.0
                };
                pitches[[bin, frame]] = self.stft.bin_frequency(bin as f32 + shift, sample_rate);
                magnitudes[[bin, frame]] = beta - 0.25 * (alpha - gamma) * shift;
            }
        }
        Ok(PitchSpectrogram {
            pitches,
            magnitudes,
        })
    }
}

/// Log-normal weighting around [`DEFAULT_START_BPM`], one octave wide.
fn tempo_prior(bpm: f64) -> f64 {
    let octaves = (bpm / DEFAULT_START_BPM).log2();
    (-0.5 * octaves * octaves).exp()
}

/// Dynamic-programming beat tracker: rewards onset strength, penalises
/// spacing that strays from `period` frames.
fn dynamic_beats(onsets: &[f32], period: f32) -> Vec<usize> {
    if onsets.is_empty() || !period.is_finite() || period < 1.0 {
        return Vec::new();
    }
    let mean = onsets.iter().sum::<f32>() / onsets.len() as f32;
    let std = (onsets.iter().map(|&x| (x - mean).powi(2)).sum::<f32>() / onsets.len() as f32).sqrt();
    if std <= f32::EPSILON {
        return Vec::new();
    }
    let local: Vec<f32> = onsets.iter().map(|&x| x / std).collect();

    let max_back = (2.0 * period).round() as usize;
    let min_back = ((period / 2.0).round() as usize).max(1);
    let mut cumulative = vec![0.0f32; local.len()];
    let mut backlink: Vec<Option<usize>> = vec![None; local.len()];
    for t in 0..local.len() {
        let mut best: Option<(usize, f32)> = None;
        if t >= min_back {
            let earliest = t.saturating_sub(max_back);
            for prev in earliest..=t - min_back {
                let spacing = ((t - prev) as f32 / period).ln();
                let score = cumulative[prev] - BEAT_TIGHTNESS * spacing * spacing;
                if best.map_or(true, |(_, current)| score > current) {
                    best = Some((prev, score));
                }
            }
        }
        cumulative[t] = local[t] + best.map_or(0.0, |(_, score)| score.max(0.0));
        backlink[t] = best.filter(|(_, score)| *score > 0.0).map(|(prev, _)| prev);
    }

    let tail_start = local.len().saturating_sub(period.round() as usize);
    let mut cursor = (tail_start..local.len())
        .max_by(|&a, &b| cumulative[a].total_cmp(&cumulative[b]));
    let mut beats = Vec::new();
    while let Some(frame) = cursor {
        beats.push(frame);
        cursor = backlink[frame];
    }
    beats.reverse();

    // drop weak beats at the edges
    let threshold = 0.5 * local.iter().cloned().fold(0.0f32, f32::max) / 10.0;
    while beats.first().map_or(false, |&b| local[b] < threshold) {
        beats.remove(0);
    }
    while beats.last().map_or(false, |&b| local[b] < threshold) {
        beats.pop();
    }
    beats
}
