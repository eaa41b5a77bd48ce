mod load_options;
mod loader;
mod resampler;

use crate::error::Result;
pub use load_options::LoadOptions;
pub(crate) use loader::probe_bytes;
pub use loader::{decode_bytes, extension_of};
pub use resampler::AudioResampler;
use std::sync::Arc;
use std::time::Duration;

/// Fully decoded interleaved PCM. Clones share the same samples.
#[derive(Debug, Clone)]
pub struct SoundData {
    inner: Arc<SoundDataInner>,
}

#[derive(Debug)]
struct SoundDataInner {
    samples: Vec<f32>,
    sample_rate: u32,
    channels: u16,
    duration: Duration,
}

impl SoundData {
    pub fn new(samples: Vec<f32>, sample_rate: u32, channels: u16) -> Self {
        let channels = channels.max(1);
        let frames = samples.len() / channels as usize;
        let duration = if sample_rate > 0 {
            Duration::from_secs_f64(frames as f64 / sample_rate as f64)
        } else {
            Duration::ZERO
        };
        Self {
            inner: Arc::new(SoundDataInner {
                samples,
                sample_rate,
                channels,
                duration,
            }),
        }
    }

    pub fn sample_rate(&self) -> u32 {
        self.inner.sample_rate
    }

    pub fn channels(&self) -> u16 {
        self.inner.channels
    }

    pub fn duration(&self) -> Duration {
        self.inner.duration
    }

    pub fn samples(&self) -> &[f32] {
        &self.inner.samples
    }

    pub fn total_frames(&self) -> usize {
        self.inner.samples.len() / self.inner.channels as usize
    }

    pub fn is_empty(&self) -> bool {
        self.inner.samples.is_empty()
    }

    /// Downmix by averaging all channels
    pub fn to_mono(&self) -> Self {
        if self.inner.channels == 1 {
            return self.clone();
        }
        let channels = self.inner.channels as usize;
        let mono = self
            .inner
            .samples
            .chunks(channels)
            .map(|frame| frame.iter().sum::<f32>() / channels as f32)
            .collect();
        Self::new(mono, self.inner.sample_rate, 1)
    }

    /// Resample to a different sample rate using rubato
    pub fn resample(&self, target_sample_rate: u32) -> Result<Self> {
        if target_sample_rate == self.inner.sample_rate {
            return Ok(self.clone());
        }
        let resampler = AudioResampler::new(
            self.inner.sample_rate,
            target_sample_rate,
            self.inner.channels,
            None,
        )?;
        let samples = resampler.resample_interleaved(&self.inner.samples)?;
        Ok(Self::new(samples, target_sample_rate, self.inner.channels))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duration_and_mono() {
        let data = SoundData::new(vec![0.2, 0.4, 0.6, 0.8], 2, 2);
        assert_eq!(data.total_frames(), 2);
        assert_eq!(data.duration(), Duration::from_secs(1));

        let mono = data.to_mono();
        assert_eq!(mono.channels(), 1);
        assert!((mono.samples()[0] - 0.3).abs() < 1e-6);
        assert!((mono.samples()[1] - 0.7).abs() < 1e-6);
    }

    #[test]
    fn test_resample_same_rate_shares_samples() {
        let data = SoundData::new(vec![0.0; 16], 48000, 1);
        let same = data.resample(48000).unwrap();
        assert!(Arc::ptr_eq(&data.inner, &same.inner));
    }
}
