use std::path::PathBuf;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

use tonika_audio::{FeatureProvider, SpectralFeatures};
use tonika_domain::{
    BarTimeline, BeatGrid, ChordEvent, KeyEstimate, Meter, ScaleCatalog, ToneObservation,
};
use tonika_ledger::AnalysisRecord;

use crate::beat::BeatGridEstimator;
use crate::chords::{ChordDetector, ChromaChordDetector};
use crate::config::AnalysisConfig;
use crate::key::ScaleMatcher;
use crate::report::TempoReport;
use crate::tonal::TonalEstimator;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisJob {
    pub audio_path: PathBuf,
    pub artist: String,
    pub title: String,
}

/// Everything derived from one audio file, before it reaches the ledger.
#[derive(Debug, Clone, Serialize)]
pub struct SongAnalysis {
    pub artist: String,
    pub title: String,
    pub duration: f64,
    pub beat_grid: BeatGrid,
    pub meter: Meter,
    pub bar_timeline: BarTimeline,
    pub smoothed_intervals: Vec<f64>,
    pub tones: Vec<ToneObservation>,
    pub chords: Vec<ChordEvent>,
    pub key: KeyEstimate,
}

impl SongAnalysis {
    pub fn record(&self) -> AnalysisRecord<'_> {
        AnalysisRecord {
            artist: &self.artist,
            title: &self.title,
            chords: &self.chords,
            bpm: self.beat_grid.tempo,
            beats: self.beat_grid.beats(),
            tones: &self.tones,
            key: &self.key,
        }
    }

    pub fn tempo_report(&self) -> TempoReport {
        TempoReport::new(self.beat_grid.tempo, self.meter, self.bar_timeline.clone())
    }
}

pub struct AnalysisPipeline {
    features: Box<dyn FeatureProvider>,
    chords: Box<dyn ChordDetector>,
    beat: BeatGridEstimator,
    tonal: TonalEstimator,
    matcher: ScaleMatcher,
    catalog: ScaleCatalog,
}

impl AnalysisPipeline {
    pub fn new(
        features: Box<dyn FeatureProvider>,
        chords: Box<dyn ChordDetector>,
        beat: BeatGridEstimator,
        matcher: ScaleMatcher,
        catalog: ScaleCatalog,
    ) -> Self {
        Self {
            features,
            chords,
            beat,
            tonal: TonalEstimator,
            matcher,
            catalog,
        }
    }

    /// Spectral features and chroma chord detection, tuned by `config`.
    pub fn from_config(config: &AnalysisConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self::new(
            Box::new(SpectralFeatures::new(config.features.clone())),
            Box::new(ChromaChordDetector::with_window(config.chord_window_seconds)),
            BeatGridEstimator::new(config.meter_tolerance, config.smoothing_window),
            ScaleMatcher::new(config.match_tolerance)?,
            config.load_catalog()?,
        ))
    }

    pub fn with_chord_detector(mut self, chords: Box<dyn ChordDetector>) -> Self {
        self.chords = chords;
        self
    }

    /// Runs every estimator over the job's audio. Nothing is persisted here,
    /// so a failure leaves the ledger untouched.
    #[instrument(skip(self, job), fields(path = ?job.audio_path, title = %job.title))]
    pub fn analyze(&self, job: &AnalysisJob) -> Result<SongAnalysis> {
        info!("loading audio");
        let audio = self
            .features
            .load(&job.audio_path)
            .with_context(|| format!("load audio {:?}", job.audio_path))?;

        let beat_grid = self
            .beat
            .estimate(self.features.as_ref(), &audio)
            .context("beat grid estimation")?;
        let meter = self.beat.classify_meter(&beat_grid);
        let smoothed_intervals = self.beat.smoothed_intervals(&beat_grid);
        let bar_timeline = beat_grid.bar_timeline(audio.duration());

        let tones = self
            .tonal
            .estimate_tones(self.features.as_ref(), &audio, &beat_grid)
            .context("tonal estimation")?;
        let chords = self
            .chords
            .detect(&job.audio_path, &audio)
            .context("chord detection")?;
        let key = self.matcher.match_chords(&chords, &self.catalog);

        info!(
            bpm = beat_grid.tempo,
            beats = beat_grid.beats().len(),
            %meter,
            tones = tones.len(),
            chords = chords.len(),
            key = ?key.best_keynote,
            "analysis complete"
        );
        Ok(SongAnalysis {
            artist: job.artist.clone(),
            title: job.title.clone(),
            duration: audio.duration(),
            beat_grid,
            meter,
            bar_timeline,
            smoothed_intervals,
            tones,
            chords,
            key,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    use anyhow::bail;
    use ndarray::Array2;
    use tonika_audio::{BeatTrack, MonoAudio, OnsetEnvelope, PitchSpectrogram, TempoCandidate};
    use tonika_domain::KeyField;
    use tonika_ledger::{AnalysisAggregator, ChordUsageSummary, InMemoryLedger, LedgerStore};

    const RATE: u32 = 1000;

    /// Two seconds of audio with a beat every half second and a steady A4.
    struct SteadyFeatures;

    impl FeatureProvider for SteadyFeatures {
        fn load(&self, path: &Path) -> Result<MonoAudio> {
            if path.ends_with("missing.wav") {
                bail!("no such file");
            }
            Ok(MonoAudio::new(RATE, vec![0.1; 2 * RATE as usize]))
        }

        fn onset_strength(&self, audio: &MonoAudio) -> Result<OnsetEnvelope> {
            Ok(OnsetEnvelope {
                values: vec![0.0; 200],
                hop_size: 10,
                sample_rate: audio.sample_rate,
            })
        }

        fn track_beats(&self, _envelope: &OnsetEnvelope) -> Result<BeatTrack> {
            Ok(BeatTrack {
                tempo_candidates: vec![TempoCandidate {
                    bpm: 120.0,
                    confidence: 0.9,
                }],
                beat_frames: vec![0, 50, 100, 150],
            })
        }

        fn pitch_track(&self, _segment: &[f32], _sample_rate: u32) -> Result<PitchSpectrogram> {
            Ok(PitchSpectrogram {
                pitches: Array2::from_shape_vec((2, 1), vec![440.0, 0.0])?,
                magnitudes: Array2::from_shape_vec((2, 1), vec![1.0, 0.0])?,
            })
        }
    }

    struct FixedChords(Vec<(&'static str, f64)>);

    impl ChordDetector for FixedChords {
        fn detect(&self, _audio_path: &Path, audio: &MonoAudio) -> Result<Vec<ChordEvent>> {
            if audio.samples.len() != 2 * RATE as usize {
                bail!("detector was not handed the loaded audio");
            }
            self.0
                .iter()
                .map(|(label, time)| ChordEvent::new(*label, *time).map_err(anyhow::Error::from))
                .collect()
        }
    }

    fn pipeline(tolerance: f64) -> AnalysisPipeline {
        AnalysisPipeline::new(
            Box::new(SteadyFeatures),
            Box::new(FixedChords(vec![("C", 0.0), ("F", 0.5), ("G", 1.0), ("C", 1.5)])),
            BeatGridEstimator::default(),
            ScaleMatcher::new(tolerance).unwrap(),
            ScaleCatalog::builtin(),
        )
    }

    fn job(path: &str) -> AnalysisJob {
        AnalysisJob {
            audio_path: PathBuf::from(path),
            artist: "Artist".to_string(),
            title: "Song".to_string(),
        }
    }

    #[test]
    fn analyzes_scripted_song() {
        let analysis = pipeline(0.5).analyze(&job("song.wav")).unwrap();
        assert_eq!(analysis.beat_grid.tempo, 120.0);
        assert_eq!(analysis.beat_grid.beats(), &[0.0, 0.5, 1.0, 1.5]);
        assert_eq!(analysis.meter, Meter::FourFour);
        assert_eq!(analysis.bar_timeline.bar_count, 4);
        assert_eq!(analysis.tones.len(), 3);
        assert!(analysis.tones.iter().all(|obs| obs.tone.to_string() == "A4"));
        assert_eq!(analysis.key.best_keynote.as_deref(), Some("C"));
        assert_eq!(analysis.key.score_of("C", "major"), Some(1.0));
    }

    #[test]
    fn analysis_feeds_the_aggregator() {
        let analysis = pipeline(0.5).analyze(&job("song.wav")).unwrap();
        let aggregator = AnalysisAggregator::new(InMemoryLedger::new());
        aggregator.record(analysis.record()).unwrap();
        let ledger = aggregator.record(analysis.record()).unwrap();
        assert_eq!(ledger.len(), 2);
        assert_eq!(ledger[0].chords.get("C"), Some(&2));
        assert_eq!(ledger[0].tones_at_beats.len(), 3);
        let KeyField::Scores(scores) = &ledger[0].keynote else {
            panic!("expected a score map");
        };
        assert_eq!(scores.get("C-major"), Some(1.0));
        assert_eq!(scores.get("A-minor"), Some(1.0));
    }

    #[test]
    fn history_names_the_analyzed_key() {
        let analysis = pipeline(0.5).analyze(&job("song.wav")).unwrap();
        let aggregator = AnalysisAggregator::new(InMemoryLedger::new());
        let ledger = aggregator.record(analysis.record()).unwrap();

        let best_label = ledger[0].keynote.best().unwrap();
        let keynote = best_label.split_once('-').map(|(keynote, _)| keynote);
        assert_eq!(keynote, analysis.key.best_keynote.as_deref());

        let summary = ChordUsageSummary::from_entries(&ledger);
        assert!(summary.rows.iter().all(|row| row.keynote == best_label));
        assert_eq!(summary.rows[0].keynote, "C-major");
    }

    #[test]
    fn missing_audio_fails_before_recording() {
        let aggregator = AnalysisAggregator::new(InMemoryLedger::new());
        let result = pipeline(0.5).analyze(&job("missing.wav"));
        assert!(result.is_err());
        assert!(aggregator.store().load().unwrap().is_empty());

        let real = AnalysisPipeline::from_config(&AnalysisConfig::default()).unwrap();
        assert!(real.analyze(&job("does/not/exist.wav")).is_err());
    }

    #[test]
    fn report_mirrors_analysis() {
        let analysis = pipeline(0.5).analyze(&job("song.wav")).unwrap();
        let report = analysis.tempo_report().to_string();
        assert!(report.starts_with("BPM real: 120.000000\nBPM fixed: 120\nBar estimated: 4\n"));
        assert!(report.contains("Bar type estimated: 4/4"));
    }
}
