use std::f32::consts::PI;
use std::sync::Arc;

use anyhow::{anyhow, Result};
use ndarray::Array2;
use realfft::{RealFftPlanner, RealToComplex};

/// Short-time Fourier transform with a Hann window and centred frames.
pub struct Stft {
    frame_size: usize,
    hop_size: usize,
    window: Vec<f32>,
    fft: Arc<dyn RealToComplex<f32>>,
}

impl Stft {
    pub fn new(frame_size: usize, hop_size: usize) -> Self {
        let mut planner = RealFftPlanner::<f32>::new();
        let fft = planner.plan_fft_forward(frame_size);
        Self {
            frame_size,
            hop_size: hop_size.max(1),
            window: hann_window(frame_size),
            fft,
        }
    }

    pub fn frame_size(&self) -> usize {
        self.frame_size
    }

    pub fn hop_size(&self) -> usize {
        self.hop_size
    }

    pub fn bin_count(&self) -> usize {
        self.frame_size / 2 + 1
    }

    /// Centre frequency of an FFT bin.
    pub fn bin_frequency(&self, bin: f32, sample_rate: u32) -> f32 {
        bin * sample_rate as f32 / self.frame_size as f32
    }

    /// Magnitude spectrogram shaped `(bins, frames)`. Frame `t` is centred on sample `t * hop`.
    pub fn magnitudes(&self, samples: &[f32]) -> Result<Array2<f32>> {
        if samples.is_empty() {
            return Ok(Array2::zeros((self.bin_count(), 0)));
        }
        let pad = self.frame_size / 2;
        let mut padded = vec![0.0f32; pad];
        padded.extend_from_slice(samples);
        padded.resize(padded.len() + pad, 0.0);
        let frames = if padded.len() < self.frame_size {
            1
        } else {
            1 + (padded.len() - self.frame_size) / self.hop_size
        };
        padded.resize(padded.len().max(self.frame_size), 0.0);

        let mut output = Array2::zeros((self.bin_count(), frames));
        let mut input = self.fft.make_input_vec();
        let mut spectrum = self.fft.make_output_vec();
        for frame in 0..frames {
            let start = frame * self.hop_size;
            for (i, slot) in input.iter_mut().enumerate() {
                *slot = padded[start + i] * self.window[i];
            }
            self.fft
                .process(&mut input, &mut spectrum)
                .map_err(|err| anyhow!("fft failed: {err}"))?;
            for (bin, value) in spectrum.iter().enumerate() {
                output[[bin, frame]] = value.norm();
            }
        }
        Ok(output)
    }
}

pub fn hann_window(size: usize) -> Vec<f32> {
    (0..size)
        .map(|i| 0.5 * (1.0 - (2.0 * PI * i as f32 / size as f32).cos()))
        .collect()
}

/// Median of the finite values, averaging the middle pair for even counts.
pub fn median<I: IntoIterator<Item = f32>>(values: I) -> Option<f32> {
    let mut sorted: Vec<f32> = values.into_iter().filter(|v| v.is_finite()).collect();
    if sorted.is_empty() {
        return None;
    }
    sorted.sort_by(|a, b| a.total_cmp(b));
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        Some((sorted[mid - 1] + sorted[mid]) / 2.0)
    } else {
        Some(sorted[mid])
    }
}

pub fn sine_wave(frequency: f32, sample_rate: u32, seconds: f32) -> Vec<f32> {
    let count = (sample_rate as f32 * seconds) as usize;
    (0..count)
        .map(|i| (2.0 * PI * frequency * i as f32 / sample_rate as f32).sin())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn median_handles_even_and_odd() {
        assert_eq!(median(vec![3.0, 1.0, 2.0]), Some(2.0));
        assert_eq!(median(vec![4.0, 1.0, 2.0, 3.0]), Some(2.5));
        assert_eq!(median(Vec::<f32>::new()), None);
        assert_eq!(median(vec![f32::NAN, 1.0]), Some(1.0));
    }

    #[test]
    fn stft_peaks_at_tone_bin() {
        let stft = Stft::new(1024, 256);
        let samples = sine_wave(1000.0, 16_000, 0.5);
        let mags = stft.magnitudes(&samples).unwrap();
        assert_eq!(mags.nrows(), 513);
        assert_eq!(mags.ncols(), 1 + samples.len() / 256);
        let column = mags.column(mags.ncols() / 2);
        let peak_bin = column
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(b.1))
            .map(|(bin, _)| bin)
            .unwrap();
        assert_relative_eq!(stft.bin_frequency(peak_bin as f32, 16_000), 1000.0, epsilon = 16.0);
    }

    #[test]
    fn stft_of_empty_input_has_no_frames() {
        let stft = Stft::new(512, 128);
        assert_eq!(stft.magnitudes(&[]).unwrap().ncols(), 0);
        assert_eq!(stft.magnitudes(&[0.0; 10]).unwrap().ncols(), 1);
    }
}
