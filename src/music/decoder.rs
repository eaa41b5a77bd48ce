use crate::error::{Result, StarSonicError};
use crate::music::ReplayGain;
use std::time::Duration;
use thiserror::Error;

/// Failures a stream can report while reading.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// A gap in the compressed data; the next read may succeed
    #[error("hole in stream")]
    Hole,
    /// Corrupt or invalid section; the current fill cannot complete
    #[error("bad link: {0}")]
    BadLink(String),
}

/// An incrementally decoded music track.
pub trait StreamDecoder: Send {
    fn channels(&self) -> u16;

    fn sample_rate(&self) -> u32;

    fn replay_gain(&self) -> Option<ReplayGain>;

    /// Decode interleaved samples into `out`, whole frames only.
    ///
    /// Returns the number of samples written; `Ok(0)` means end of stream.
    fn read(&mut self, out: &mut [f32]) -> std::result::Result<usize, DecodeError>;

    fn seek(&mut self, position: Duration) -> Result<()>;

    /// Position of the next sample `read` will return.
    fn position(&self) -> Duration;
}

/// A stream over already decoded PCM, with optional injected faults.
pub struct MemoryStreamDecoder {
    samples: Vec<f32>,
    channels: u16,
    sample_rate: u32,
    cursor: usize,
    replay_gain: Option<ReplayGain>,
    fault: Option<(usize, DecodeError)>,
}

impl MemoryStreamDecoder {
    pub fn new(samples: Vec<f32>, channels: u16, sample_rate: u32) -> Self {
        Self {
            samples,
            channels: channels.max(1),
            sample_rate,
            cursor: 0,
            replay_gain: None,
            fault: None,
        }
    }

    pub fn with_replay_gain(mut self, gain: ReplayGain) -> Self {
        self.replay_gain = Some(gain);
        self
    }

    /// Report `error` once the read cursor reaches `sample`. A hole fires once;
    /// a bad link fires on every read from that point.
    pub fn with_fault_at(mut self, sample: usize, error: DecodeError) -> Self {
        self.fault = Some((sample, error));
        self
    }
}

impl StreamDecoder for MemoryStreamDecoder {
    fn channels(&self) -> u16 {
        self.channels
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn replay_gain(&self) -> Option<ReplayGain> {
        self.replay_gain
    }

    fn read(&mut self, out: &mut [f32]) -> std::result::Result<usize, DecodeError> {
        let channels = self.channels as usize;
        let mut end = self.samples.len();

        if let Some((at, error)) = self.fault.clone() {
            if self.cursor >= at {
                if error == DecodeError::Hole {
                    self.fault = None;
                }
                return Err(error);
            }
            end = end.min(at);
        }

        let available = end - self.cursor;
        let take = (out.len().min(available) / channels) * channels;
        out[..take].copy_from_slice(&self.samples[self.cursor..self.cursor + take]);
        self.cursor += take;
        Ok(take)
    }

    fn seek(&mut self, position: Duration) -> Result<()> {
        let frame = (position.as_secs_f64() * self.sample_rate as f64) as usize;
        let sample = frame * self.channels as usize;
        if sample > self.samples.len() {
            return Err(StarSonicError::Decode(format!(
                "seek to {:?} is past the end",
                position
            )));
        }
        self.cursor = sample;
        Ok(())
    }

    fn position(&self) -> Duration {
        let frames = self.cursor / self.channels as usize;
        Duration::from_secs_f64(frames as f64 / self.sample_rate.max(1) as f64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reads_whole_frames() {
        let mut decoder = MemoryStreamDecoder::new(vec![0.5; 10], 2, 10);
        let mut out = [0.0; 3];
        assert_eq!(decoder.read(&mut out), Ok(2));
        let mut out = [0.0; 16];
        assert_eq!(decoder.read(&mut out), Ok(8));
        assert_eq!(decoder.read(&mut out), Ok(0));
        assert_eq!(decoder.position(), Duration::from_millis(500));
    }

    #[test]
    fn test_hole_fires_once() {
        let mut decoder =
            MemoryStreamDecoder::new(vec![0.1; 8], 1, 8).with_fault_at(4, DecodeError::Hole);
        let mut out = [0.0; 8];
        assert_eq!(decoder.read(&mut out), Ok(4));
        assert_eq!(decoder.read(&mut out), Err(DecodeError::Hole));
        assert_eq!(decoder.read(&mut out), Ok(4));
    }

    #[test]
    fn test_bad_link_persists() {
        let error = DecodeError::BadLink("crc".into());
        let mut decoder =
            MemoryStreamDecoder::new(vec![0.1; 8], 1, 8).with_fault_at(0, error.clone());
        let mut out = [0.0; 8];
        assert_eq!(decoder.read(&mut out), Err(error.clone()));
        assert_eq!(decoder.read(&mut out), Err(error));
    }

    #[test]
    fn test_seek() {
        let mut decoder = MemoryStreamDecoder::new(vec![0.0; 200], 2, 100);
        decoder.seek(Duration::from_millis(500)).unwrap();
        assert_eq!(decoder.position(), Duration::from_millis(500));
        assert!(decoder.seek(Duration::from_secs(2)).is_err());
    }
}
