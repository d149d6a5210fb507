pub mod beat;
pub mod chords;
pub mod config;
pub mod key;
pub mod pipeline;
pub mod report;
pub mod tonal;

pub use beat::{classify_meter, select_tempo, smooth_intervals, BeatGridEstimator};
pub use chords::{ChordDetector, ChromaChordDetector, LabChordDetector};
pub use config::AnalysisConfig;
pub use key::ScaleMatcher;
pub use pipeline::{AnalysisJob, AnalysisPipeline, SongAnalysis};
pub use report::TempoReport;
pub use tonal::TonalEstimator;
