use crate::error::{Result, StarSonicError};
use rubato::{FftFixedIn, Resampler};

/// Offline sample-rate conversion for whole sounds, used once at load time.
pub struct AudioResampler {
    source_sample_rate: u32,
    target_sample_rate: u32,
    channels: u16,
    chunk_size: usize,
}

impl AudioResampler {
    pub fn new(
        source_sample_rate: u32,
        target_sample_rate: u32,
        channels: u16,
        chunk_size: Option<usize>,
    ) -> Result<Self> {
        if source_sample_rate == 0 || target_sample_rate == 0 {
            return Err(StarSonicError::AudioFormat(
                "Sample rates must be greater than 0".to_string(),
            ));
        }

        if channels == 0 {
            return Err(StarSonicError::AudioFormat(
                "Channel count must be greater than 0".to_string(),
            ));
        }

        Ok(Self {
            source_sample_rate,
            target_sample_rate,
            channels,
            chunk_size: chunk_size.unwrap_or(1024).max(16),
        })
    }

    /// Resample one channel per inner vector, compensating for the filter delay
    /// so the output lines up with the input and has `ceil(frames * ratio)` frames.
    pub fn resample_planar(&self, input: &[Vec<f32>]) -> Result<Vec<Vec<f32>>> {
        if self.source_sample_rate == self.target_sample_rate {
            return Ok(input.to_vec());
        }
        let channels = self.channels as usize;
        if input.len() != channels {
            return Err(StarSonicError::AudioFormat(format!(
                "Expected {} channels, got {}",
                channels,
                input.len()
            )));
        }

        let mut resampler = FftFixedIn::<f32>::new(
            self.source_sample_rate as usize,
            self.target_sample_rate as usize,
            self.chunk_size,
            2,
            channels,
        )
        .map_err(|e| StarSonicError::AudioLoading(format!("Failed to create resampler: {}", e)))?;

        let frames = input.iter().map(Vec::len).min().unwrap_or(0);
        let expected = (frames as f64 * self.resample_ratio()).ceil() as usize;
        let delay = resampler.output_delay();
        let mut output: Vec<Vec<f32>> = vec![Vec::with_capacity(expected + delay); channels];

        let mut position = 0;
        while output[0].len() < expected + delay {
            let needed = resampler.input_frames_next();
            let chunk: Vec<Vec<f32>> = input
                .iter()
                .map(|samples| {
                    // Past the end the input is zero-padded to flush the filter.
                    let mut chunk = vec![0.0f32; needed];
                    if position < frames {
                        let end = (position + needed).min(frames);
                        chunk[..end - position].copy_from_slice(&samples[position..end]);
                    }
                    chunk
                })
                .collect();
            position += needed;

            let waves_out = resampler
                .process(&chunk, None)
                .map_err(|e| StarSonicError::AudioLoading(format!("Resampling error: {}", e)))?;
            for (dst, src) in output.iter_mut().zip(waves_out) {
                dst.extend_from_slice(&src);
            }
        }

        for samples in output.iter_mut() {
            samples.drain(..delay.min(samples.len()));
            samples.truncate(expected);
        }
        Ok(output)
    }

    pub fn resample_interleaved(&self, interleaved: &[f32]) -> Result<Vec<f32>> {
        if self.source_sample_rate == self.target_sample_rate {
            return Ok(interleaved.to_vec());
        }

        let channels = self.channels as usize;
        let planar: Vec<Vec<f32>> = (0..channels)
            .map(|ch| {
                interleaved
                    .chunks_exact(channels)
                    .map(|frame| frame[ch])
                    .collect()
            })
            .collect();

        let resampled = self.resample_planar(&planar)?;
        let frames = resampled.first().map_or(0, Vec::len);
        let mut out = Vec::with_capacity(frames * channels);
        for frame in 0..frames {
            for samples in &resampled {
                out.push(samples[frame]);
            }
        }
        Ok(out)
    }

    pub fn target_sample_rate(&self) -> u32 {
        self.target_sample_rate
    }

    pub fn source_sample_rate(&self) -> u32 {
        self.source_sample_rate
    }

    pub fn resample_ratio(&self) -> f64 {
        self.target_sample_rate as f64 / self.source_sample_rate as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resampler_creation() {
        let resampler = AudioResampler::new(44100, 48000, 2, None).unwrap();
        assert_eq!(resampler.source_sample_rate(), 44100);
        assert_eq!(resampler.target_sample_rate(), 48000);
    }

    #[test]
    fn test_no_resampling_needed() {
        let resampler = AudioResampler::new(44100, 44100, 1, None).unwrap();
        let samples = vec![0.1, 0.2, 0.3, 0.4];
        assert_eq!(resampler.resample_interleaved(&samples).unwrap(), samples);
    }

    #[test]
    fn test_invalid_parameters() {
        assert!(AudioResampler::new(0, 48000, 2, None).is_err());
        assert!(AudioResampler::new(44100, 0, 2, None).is_err());
        assert!(AudioResampler::new(44100, 48000, 0, None).is_err());
    }

    #[test]
    fn test_output_length_and_level() {
        let resampler = AudioResampler::new(24000, 48000, 2, Some(256)).unwrap();
        let input: Vec<f32> = std::iter::repeat([0.5f32, -0.5]).take(2400).flatten().collect();
        let out = resampler.resample_interleaved(&input).unwrap();
        assert_eq!(out.len(), 4800 * 2);
        // Away from the edges a DC input stays at its level.
        let mid = 2400 * 2;
        assert!((out[mid] - 0.5).abs() < 0.05);
        assert!((out[mid + 1] + 0.5).abs() < 0.05);
    }
}
