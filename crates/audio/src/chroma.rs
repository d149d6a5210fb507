use anyhow::Result;

use crate::dsp::Stft;

pub const SEMITONES: usize = 12;

/// Twelve pitch-class energies, index 0 = C.
pub type Chroma = [f32; SEMITONES];

/// Folds STFT energy between `fmin` and `fmax` into pitch classes.
pub struct ChromaExtractor {
    stft: Stft,
    fmin: f32,
    fmax: f32,
}

impl ChromaExtractor {
    pub fn new(frame_size: usize, hop_size: usize, fmin: f32, fmax: f32) -> Self {
        Self {
            stft: Stft::new(frame_size, hop_size),
            fmin,
            fmax,
        }
    }

    /// Summed chroma over every frame of the segment, plus the total energy folded in.
    pub fn extract(&self, segment: &[f32], sample_rate: u32) -> Result<(Chroma, f32)> {
        let spectrogram = self.stft.magnitudes(segment)?;
        let mut chroma = [0.0f32; SEMITONES];
        for (bin, row) in spectrogram.outer_iter().enumerate().skip(1) {
            let frequency = self.stft.bin_frequency(bin as f32, sample_rate);
            if frequency < self.fmin || frequency > self.fmax {
                continue;
            }
            let midi = 12.0 * (frequency / 440.0).log2() + 69.0;
            let class = (midi.round() as i64).rem_euclid(SEMITONES as i64) as usize;
            chroma[class] += row.iter().map(|m| m * m).sum::<f32>();
        }
        let energy = chroma.iter().sum();
        Ok((chroma, energy))
    }
}

/// Scales a chroma vector so its largest entry is 1.
pub fn normalize_chroma(chroma: &Chroma) -> Chroma {
    let peak = chroma.iter().cloned().fold(0.0f32, f32::max);
    if peak <= 0.0 {
        return [0.0; SEMITONES];
    }
    chroma.map(|value| value / peak)
}
