use std::fmt;

use serde::{Deserialize, Serialize};

use crate::DomainError;

/// Tempo estimate plus the ordered beat timestamps of a track.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(try_from = "RawBeatGrid")]
pub struct BeatGrid {
    /// Beats per minute.
    pub tempo: f64,
    /// Seconds from the start of the track, strictly increasing.
    pub(crate) beats: Vec<f64>,
}

#[derive(Deserialize)]
struct RawBeatGrid {
    tempo: f64,
    #[serde(default)]
    beats: Vec<f64>,
}

impl TryFrom<RawBeatGrid> for BeatGrid {
    type Error = DomainError;

    fn try_from(raw: RawBeatGrid) -> Result<Self, Self::Error> {
        BeatGrid::new(raw.tempo, raw.beats)
    }
}

impl BeatGrid {
    pub fn new(tempo: f64, beats: Vec<f64>) -> Result<Self, DomainError> {
        if !tempo.is_finite() || tempo <= 0.0 {
            return Err(DomainError::validation("tempo must be a positive bpm"));
        }
        if let Some(first) = beats.first() {
            if !first.is_finite() || *first < 0.0 {
                return Err(DomainError::validation(
                    "beat timestamps cannot be negative",
                ));
            }
        }
        if beats.windows(2).any(|pair| !(pair[1] > pair[0])) {
            return Err(DomainError::validation(
                "beat timestamps must be strictly increasing",
            ));
        }
        Ok(Self { tempo, beats })
    }

    pub fn beats(&self) -> &[f64] {
        &self.beats
    }

    pub fn seconds_per_beat(&self) -> f64 {
        60.0 / self.tempo
    }

    /// Consecutive beat pairs; empty when the grid has fewer than two beats.
    pub fn intervals(&self) -> impl Iterator<Item = (f64, f64)> + '_ {
        self.beats.windows(2).map(|pair| (pair[0], pair[1]))
    }

    pub fn interval_count(&self) -> usize {
        self.beats.len().saturating_sub(1)
    }

    pub fn interval_durations(&self) -> Vec<f64> {
        self.intervals().map(|(start, end)| end - start).collect()
    }

    pub fn mean_interval(&self) -> Option<f64> {
        let durations = self.interval_durations();
        if durations.is_empty() {
            return None;
        }
        Some(durations.iter().sum::<f64>() / durations.len() as f64)
    }

    /// Evenly spaced bar starts at the rounded tempo, covering `duration` seconds.
    pub fn bar_timeline(&self, duration: f64) -> BarTimeline {
        let rounded_bpm = self.tempo.round().max(0.0) as u32;
        let bar_count = (duration.max(0.0) * rounded_bpm as f64 / 60.0).round() as usize;
        let bar_starts = if rounded_bpm > 0 && bar_count > 0 {
            let bar_duration = 60.0 / rounded_bpm as f64;
            (0..bar_count).map(|i| i as f64 * bar_duration).collect()
        } else {
            Vec::new()
        };
        BarTimeline {
            rounded_bpm,
            bar_count,
            bar_starts,
        }
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct BarTimeline {
    pub rounded_bpm: u32,
    pub bar_count: usize,
    pub bar_starts: Vec<f64>,
}

/// Best-effort time signature label derived from beat spacing.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum Meter {
    FourFour,
    ThreeFour,
    ThreeThree,
    Unknown,
}

impl Meter {
    pub fn label(&self) -> &'static str {
        match self {
            Meter::FourFour => "4/4",
            Meter::ThreeFour => "3/4",
            Meter::ThreeThree => "3/3",
            Meter::Unknown => "Unknown",
        }
    }
}

impl fmt::Display for Meter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}
