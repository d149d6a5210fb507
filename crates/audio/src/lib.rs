pub mod chroma;
pub mod dsp;
pub mod features;
pub mod io;

pub use chroma::{normalize_chroma, Chroma, ChromaExtractor};
pub use dsp::{median, Stft};
pub use features::{
    BeatTrack, FeatureProvider, FeatureSettings, OnsetEnvelope, PitchSpectrogram,
    SpectralFeatures, TempoCandidate,
};
pub use io::{AudioDecoder, MonoAudio};
