use std::fs::File;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::DecoderOptions;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use tracing::debug;

/// Decoded audio, downmixed to a single channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonoAudio {
    pub sample_rate: u32,
    pub samples: Vec<f32>,
}

impl MonoAudio {
    pub fn new(sample_rate: u32, samples: Vec<f32>) -> Self {
        Self {
            sample_rate,
            samples,
        }
    }

    /// Length in seconds.
    pub fn duration(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.samples.len() as f64 / self.sample_rate as f64
    }

    /// Samples between two timestamps, clamped to the buffer.
    pub fn segment(&self, start: f64, end: f64) -> &[f32] {
        let to_index = |seconds: f64| {
            ((seconds.max(0.0) * self.sample_rate as f64) as usize).min(self.samples.len())
        };
        let (from, to) = (to_index(start), to_index(end));
        if from >= to {
            return &[];
        }
        &self.samples[from..to]
    }
}

pub struct AudioDecoder;

impl AudioDecoder {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<MonoAudio> {
        let path_ref = path.as_ref();
        let file =
            File::open(path_ref).with_context(|| format!("open audio file {:?}", path_ref))?;
        let mss = MediaSourceStream::new(Box::new(file), Default::default());
        let mut hint = Hint::new();
        if let Some(ext) = path_ref.extension().and_then(|ext| ext.to_str()) {
            hint.with_extension(ext);
        }

        let probed = symphonia::default::get_probe()
            .format(
                &hint,
                mss,
                &FormatOptions::default(),
                &MetadataOptions::default(),
            )
            .with_context(|| format!("probe audio format of {:?}", path_ref))?;
        let mut format = probed.format;
        let track = format
            .default_track()
            .ok_or_else(|| anyhow::anyhow!("no default track found"))?;
        let track_id = track.id;
        let mut decoder = symphonia::default::get_codecs()
            .make(&track.codec_params, &DecoderOptions::default())?;
        let sample_rate = track.codec_params.sample_rate.unwrap_or(44_100);
        let mut samples = Vec::new();

        loop {
            match format.next_packet() {
                Ok(packet) => {
                    if packet.track_id() != track_id {
                        continue;
                    }
                    let buffer = match decoder.decode(&packet) {
                        Ok(buffer) => buffer,
                        // skip undecodable packet
                        Err(symphonia::core::errors::Error::DecodeError(_)) => continue,
                        Err(err) => return Err(err.into()),
                    };
                    let spec = *buffer.spec();
                    let channels = spec.channels.count().max(1);
                    let mut interleaved = SampleBuffer::<f32>::new(buffer.capacity() as u64, spec);
                    interleaved.copy_interleaved_ref(buffer);
                    samples.extend(
                        interleaved
                            .samples()
                            .chunks(channels)
                            .map(|frame| frame.iter().sum::<f32>() / channels as f32),
                    );
                }
                Err(err) => {
                    use symphonia::core::errors::Error as SymphError;
                    match err {
                        SymphError::IoError(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                            break;
                        }
                        SymphError::DecodeError(_) => {}
                        _ => return Err(err.into()),
                    }
                }
            }
        }

        debug!(path = ?path_ref, sample_rate, sample_count = samples.len(), "decoded audio");
        Ok(MonoAudio {
            sample_rate,
            samples,
        })
    }
}
