use anyhow::Result;
use tracing::{debug, instrument};

use tonika_audio::{median, FeatureProvider, MonoAudio, PitchSpectrogram};
use tonika_domain::{hz_to_midi, BeatGrid, Tone, ToneObservation};

pub const REFERENCE_FALLBACK_HZ: f64 = 440.0;

/// Pitches within half an octave of A4 feed the reference estimate.
fn reference_band() -> (f64, f64) {
    (
        REFERENCE_FALLBACK_HZ * 2f64.powf(-0.5),
        REFERENCE_FALLBACK_HZ * 2f64.powf(0.5),
    )
}

/// Estimates one dominant tone per inter-beat interval.
#[derive(Default)]
pub struct TonalEstimator;

impl TonalEstimator {
    /// Intervals without a pitch above their median magnitude are left out,
    /// so the result never has more entries than the grid has intervals.
    #[instrument(skip_all, fields(intervals = grid.interval_count()))]
    pub fn estimate_tones(
        &self,
        features: &dyn FeatureProvider,
        audio: &MonoAudio,
        grid: &BeatGrid,
    ) -> Result<Vec<ToneObservation>> {
        let mut observations = Vec::new();
        for (beat_index, (start, end)) in grid.intervals().enumerate() {
            let segment = audio.segment(start, end);
            let spectrogram = features.pitch_track(segment, audio.sample_rate)?;
            match observe_interval(&spectrogram) {
                Some((tone, reference_hz)) => observations.push(ToneObservation {
                    beat_index,
                    timestamp: start,
                    tone,
                    reference_hz,
                }),
                None => debug!(beat_index, start, end, "no confident pitch in interval"),
            }
        }
        Ok(observations)
    }
}

fn observe_interval(spectrogram: &PitchSpectrogram) -> Option<(Tone, f64)> {
    let floor = median(spectrogram.magnitudes.iter().copied())?;
    let tone = dominant_tone(spectrogram, floor)?;
    Some((tone, reference_pitch(spectrogram, floor)))
}

/// Frequencies of the peaks louder than the magnitude floor.
fn significant_pitches(
    spectrogram: &PitchSpectrogram,
    floor: f32,
) -> impl Iterator<Item = f64> + '_ {
    spectrogram
        .pitches
        .iter()
        .zip(spectrogram.magnitudes.iter())
        .filter(move |(&pitch, &magnitude)| magnitude > floor && pitch > 0.0)
        .map(|(&pitch, _)| pitch as f64)
}

/// Mean of the significant pitches near A4, or 440 Hz when there are none.
pub fn reference_pitch(spectrogram: &PitchSpectrogram, floor: f32) -> f64 {
    let (low, high) = reference_band();
    let (sum, count) = significant_pitches(spectrogram, floor)
        .filter(|hz| (low..=high).contains(hz))
        .fold((0.0, 0usize), |(sum, count), hz| (sum + hz, count + 1));
    if count == 0 {
        REFERENCE_FALLBACK_HZ
    } else {
        sum / count as f64
    }
}

/// Median MIDI tone of the significant pitches, snapped to the nearest note.
pub fn dominant_tone(spectrogram: &PitchSpectrogram, floor: f32) -> Option<Tone> {
    let tones = significant_pitches(spectrogram, floor).map(|hz| hz_to_midi(hz) as f32);
    median(tones).map(|midi| Tone::from_midi(midi as f64))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::Array2;
    use tonika_audio::dsp::sine_wave;
    use tonika_audio::SpectralFeatures;
    use tonika_domain::PitchClass;

    fn spectrogram(pitches: &[f32], magnitudes: &[f32]) -> PitchSpectrogram {
        PitchSpectrogram {
            pitches: Array2::from_shape_vec((pitches.len(), 1), pitches.to_vec()).unwrap(),
            magnitudes: Array2::from_shape_vec((magnitudes.len(), 1), magnitudes.to_vec())
                .unwrap(),
        }
    }

    #[test]
    fn dominant_tone_is_median_of_strong_pitches() {
        let spec = spectrogram(
            &[0.0, 220.0, 261.63, 0.0, 329.63, 1000.0],
            &[0.0, 2.0, 3.0, 0.0, 4.0, 0.0],
        );
        let floor = median(spec.magnitudes.iter().copied()).unwrap();
        assert_eq!(floor, 1.0);
        assert_eq!(dominant_tone(&spec, floor), Some(Tone::new(PitchClass::C, 4)));
    }

    #[test]
    fn reference_pitch_averages_a4_band() {
        let spec = spectrogram(&[430.0, 450.0, 100.0, 0.0], &[5.0, 5.0, 5.0, 0.0]);
        assert_relative_eq!(reference_pitch(&spec, 2.5), 440.0);

        let low = spectrogram(&[110.0, 0.0], &[5.0, 0.0]);
        assert_relative_eq!(reference_pitch(&low, 0.0), REFERENCE_FALLBACK_HZ);
    }

    #[test]
    fn flat_magnitudes_give_no_tone() {
        let spec = spectrogram(&[440.0, 440.0], &[1.0, 1.0]);
        assert_eq!(dominant_tone(&spec, 1.0), None);
        assert!(observe_interval(&spectrogram(&[], &[])).is_none());
    }

    /// Sine with 20 ms linear fades, so segment edges do not smear the spectrum.
    fn faded_sine(frequency: f32, sample_rate: u32, seconds: f32) -> Vec<f32> {
        let mut samples = sine_wave(frequency, sample_rate, seconds);
        let ramp = (sample_rate / 50) as usize;
        let len = samples.len();
        for i in 0..ramp.min(len / 2) {
            let gain = i as f32 / ramp as f32;
            samples[i] *= gain;
            samples[len - 1 - i] *= gain;
        }
        samples
    }

    #[test]
    fn silent_intervals_are_omitted() {
        let sample_rate = 22_050;
        let mut samples = faded_sine(440.0, sample_rate, 0.5);
        samples.extend(vec![0.0; sample_rate as usize / 2]);
        samples.extend(faded_sine(261.63, sample_rate, 0.5));
        let audio = MonoAudio::new(sample_rate, samples);
        let grid = BeatGrid::new(120.0, vec![0.0, 0.5, 1.0, 1.5]).unwrap();

        let tones = TonalEstimator
            .estimate_tones(&SpectralFeatures::default(), &audio, &grid)
            .unwrap();
        assert_eq!(tones.len(), 2);
        assert!(tones.len() <= grid.interval_count());
        assert_eq!((tones[0].beat_index, tones[0].tone.to_string().as_str()), (0, "A4"));
        assert_relative_eq!(tones[0].reference_hz, 440.0, epsilon = 10.0);
        assert_eq!((tones[1].beat_index, tones[1].tone.to_string().as_str()), (2, "C4"));
        assert_eq!(tones[1].timestamp, 1.0);
        assert_relative_eq!(tones[1].reference_hz, REFERENCE_FALLBACK_HZ);
    }

    #[test]
    fn degenerate_grid_has_no_observations() {
        let audio = MonoAudio::new(22_050, sine_wave(440.0, 22_050, 1.0));
        let grid = BeatGrid::new(120.0, vec![0.25]).unwrap();
        let tones = TonalEstimator
            .estimate_tones(&SpectralFeatures::default(), &audio, &grid)
            .unwrap();
        assert!(tones.is_empty());
    }
}
