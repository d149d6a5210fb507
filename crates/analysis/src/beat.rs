use anyhow::{anyhow, Result};
use tracing::{debug, instrument};

use tonika_audio::{FeatureProvider, MonoAudio, TempoCandidate};
use tonika_domain::{BeatGrid, Meter};

/// Expected beat spacing, as a fraction of `60 / bpm`, for each meter label.
/// Checked in order; the first one within tolerance wins.
const METER_RATIOS: [(f64, Meter); 3] = [
    (1.0, Meter::FourFour),
    (3.0 / 4.0, Meter::ThreeFour),
    (3.0 / 3.0, Meter::ThreeThree),
];

pub struct BeatGridEstimator {
    meter_tolerance: f64,
    smoothing_window: usize,
}

impl BeatGridEstimator {
    pub fn new(meter_tolerance: f64, smoothing_window: usize) -> Self {
        Self {
            meter_tolerance,
            smoothing_window: smoothing_window.max(1),
        }
    }

    #[instrument(skip_all, fields(sample_rate = audio.sample_rate))]
    pub fn estimate(&self, features: &dyn FeatureProvider, audio: &MonoAudio) -> Result<BeatGrid> {
        let envelope = features.onset_strength(audio)?;
        let track = features.track_beats(&envelope)?;
        let tempo = select_tempo(&track.tempo_candidates)
            .ok_or_else(|| anyhow!("feature provider returned no tempo candidates"))?;
        let beats = envelope.frames_to_times(&track.beat_frames);
        debug!(
            tempo,
            candidates = track.tempo_candidates.len(),
            beats = beats.len(),
            "estimated beat grid"
        );
        Ok(BeatGrid::new(tempo, beats)?)
    }

    pub fn smoothed_intervals(&self, grid: &BeatGrid) -> Vec<f64> {
        smooth_intervals(&grid.interval_durations(), self.smoothing_window)
    }

    pub fn classify_meter(&self, grid: &BeatGrid) -> Meter {
        classify_meter(grid, self.meter_tolerance)
    }
}

impl Default for BeatGridEstimator {
    fn default() -> Self {
        Self::new(0.05, 5)
    }
}

/// Highest-confidence candidate; the earlier one wins ties.
pub fn select_tempo(candidates: &[TempoCandidate]) -> Option<f64> {
    let mut best: Option<&TempoCandidate> = None;
    for candidate in candidates {
        if !candidate.bpm.is_finite() || candidate.bpm <= 0.0 {
            continue;
        }
        if best.map_or(true, |current| candidate.confidence > current.confidence) {
            best = Some(candidate);
        }
    }
    best.map(|candidate| candidate.bpm)
}

/// Sliding mean over `window` intervals; shorter inputs come back unchanged.
pub fn smooth_intervals(intervals: &[f64], window: usize) -> Vec<f64> {
    let window = window.max(1);
    if intervals.len() < window {
        return intervals.to_vec();
    }
    intervals
        .windows(window)
        .map(|chunk| chunk.iter().sum::<f64>() / window as f64)
        .collect()
}

/// Best-effort meter label from mean beat spacing; `Unknown` when nothing is within tolerance.
pub fn classify_meter(grid: &BeatGrid, tolerance: f64) -> Meter {
    let Some(mean_duration) = grid.mean_interval() else {
        return Meter::Unknown;
    };
    let beat_duration = grid.seconds_per_beat();
    METER_RATIOS
        .iter()
        .find(|(ratio, _)| (mean_duration - beat_duration * ratio).abs() < tolerance)
        .map(|(_, meter)| *meter)
        .unwrap_or(Meter::Unknown)
}
