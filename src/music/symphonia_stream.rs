use crate::audio_data::probe_bytes;
use crate::error::{Result, StarSonicError};
use crate::music::{DecodeError, ReplayGain, StreamDecoder};
use std::time::Duration;
use symphonia::core::{
    audio::SampleBuffer,
    codecs::{Decoder, DecoderOptions},
    errors::Error,
    formats::{FormatReader, SeekMode, SeekTo},
    meta::{MetadataRevision, StandardTagKey, Value},
    units::{Time, TimeBase},
};
use symphonia::default::get_codecs;

/// Streams a compressed track held in memory through symphonia.
pub struct SymphoniaStream {
    format: Box<dyn FormatReader>,
    decoder: Box<dyn Decoder>,
    track_id: u32,
    channels: u16,
    sample_rate: u32,
    time_base: Option<TimeBase>,
    replay_gain: Option<ReplayGain>,
    sample_buf: Option<SampleBuffer<f32>>,
    pending: Vec<f32>,
    pending_pos: usize,
    /// Frames handed out since the last seek target
    frames_read: u64,
    base: Duration,
}

impl SymphoniaStream {
    pub fn open(bytes: Vec<u8>, extension: Option<&str>) -> Result<Self> {
        let mut probed = probe_bytes(bytes, extension)?;

        let mut replay_gain = None;
        if let Some(mut metadata) = probed.metadata.get() {
            if let Some(rev) = metadata.skip_to_latest() {
                read_replay_gain(rev, &mut replay_gain);
            }
        }
        let mut format = probed.format;
        {
            let mut metadata = format.metadata();
            if let Some(rev) = metadata.skip_to_latest() {
                read_replay_gain(rev, &mut replay_gain);
            }
        }

        let track = format
            .default_track()
            .ok_or_else(|| StarSonicError::AudioLoading("No default audio track found".into()))?;
        let track_id = track.id;
        let params = track.codec_params.clone();

        let sample_rate = params
            .sample_rate
            .ok_or_else(|| StarSonicError::AudioLoading("Sample rate not found".into()))?;
        let channels = params
            .channels
            .map(|c| c.count() as u16)
            .filter(|c| *c > 0)
            .ok_or_else(|| StarSonicError::AudioLoading("Channel count not found".into()))?;

        let decoder = get_codecs()
            .make(&params, &DecoderOptions::default())
            .map_err(|e| StarSonicError::AudioLoading(format!("Failed to create decoder: {}", e)))?;

        if replay_gain.is_none() {
            log::debug!("Track has no replaygain information");
        }

        Ok(Self {
            format,
            decoder,
            track_id,
            channels,
            sample_rate,
            time_base: params.time_base,
            replay_gain,
            sample_buf: None,
            pending: Vec::new(),
            pending_pos: 0,
            frames_read: 0,
            base: Duration::ZERO,
        })
    }

    /// Decode the next packet of our track into `pending`.
    ///
    /// Returns false at end of stream.
    fn refill(&mut self) -> std::result::Result<bool, DecodeError> {
        loop {
            let packet = match self.format.next_packet() {
                Ok(packet) => packet,
                Err(Error::IoError(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                    return Ok(false);
                }
                Err(Error::ResetRequired) => {
                    return Err(DecodeError::BadLink("stream reset required".into()));
                }
                Err(e) => return Err(DecodeError::BadLink(e.to_string())),
            };
            if packet.track_id() != self.track_id {
                continue;
            }

            match self.decoder.decode(&packet) {
                Ok(decoded) => {
                    let spec = *decoded.spec();
                    let needs_realloc = self
                        .sample_buf
                        .as_ref()
                        .is_none_or(|buf| buf.capacity() < decoded.capacity());
                    if needs_realloc {
                        self.sample_buf =
                            Some(SampleBuffer::<f32>::new(decoded.capacity() as u64, spec));
                    }
                    let Some(sample_buf) = self.sample_buf.as_mut() else {
                        return Err(DecodeError::BadLink("sample buffer unavailable".into()));
                    };
                    sample_buf.copy_interleaved_ref(decoded);
                    self.pending.clear();
                    self.pending.extend_from_slice(sample_buf.samples());
                    self.pending_pos = 0;
                    return Ok(true);
                }
                Err(Error::DecodeError(_)) => return Err(DecodeError::Hole),
                Err(e) => return Err(DecodeError::BadLink(e.to_string())),
            }
        }
    }
}

impl StreamDecoder for SymphoniaStream {
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
        let want = (out.len() / channels) * channels;
        let mut written = 0;

        while written < want {
            if self.pending_pos >= self.pending.len() {
                match self.refill() {
                    Ok(true) => {}
                    Ok(false) => break,
                    // Hand back what we have; the error repeats on the next call if it persists.
                    Err(DecodeError::Hole) if written > 0 => break,
                    Err(e) => return Err(e),
                }
            }
            let take = (want - written).min(self.pending.len() - self.pending_pos);
            out[written..written + take]
                .copy_from_slice(&self.pending[self.pending_pos..self.pending_pos + take]);
            self.pending_pos += take;
            written += take;
        }

        self.frames_read += (written / channels) as u64;
        Ok(written)
    }

    fn seek(&mut self, position: Duration) -> Result<()> {
        let seeked = self
            .format
            .seek(
                SeekMode::Accurate,
                SeekTo::Time {
                    time: Time::new(position.as_secs(), position.subsec_nanos() as f64 / 1e9),
                    track_id: Some(self.track_id),
                },
            )
            .map_err(|e| StarSonicError::Decode(format!("Unable to seek: {}", e)))?;

        self.decoder.reset();
        self.pending.clear();
        self.pending_pos = 0;
        self.frames_read = 0;
        self.base = match self.time_base {
            Some(tb) => {
                let t = tb.calc_time(seeked.actual_ts);
                Duration::from_secs(t.seconds) + Duration::from_secs_f64(t.frac)
            }
            None => position,
        };
        Ok(())
    }

    fn position(&self) -> Duration {
        self.base + Duration::from_secs_f64(self.frames_read as f64 / self.sample_rate as f64)
    }
}

fn read_replay_gain(rev: &MetadataRevision, gain: &mut Option<ReplayGain>) {
    for tag in rev.tags() {
        let text = match &tag.value {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        let Some(value) = ReplayGain::parse_value(&text) else {
            continue;
        };
        match tag.std_key {
            Some(StandardTagKey::ReplayGainTrackGain) => {
                gain.get_or_insert_with(ReplayGain::default).track_gain_db = value;
            }
            Some(StandardTagKey::ReplayGainTrackPeak) => {
                gain.get_or_insert_with(ReplayGain::default).track_peak = value;
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::wav_bytes;

    #[test]
    fn test_streams_wav_in_pieces() {
        let pcm: Vec<i16> = (0..2000).map(|i| (i % 100) as i16 * 100).collect();
        let mut stream = SymphoniaStream::open(wav_bytes(&pcm, 2, 8000), Some("wav")).unwrap();
        assert_eq!(stream.channels(), 2);
        assert_eq!(stream.sample_rate(), 8000);
        assert!(stream.replay_gain().is_none());

        let mut total = 0;
        let mut out = [0.0; 333];
        loop {
            let n = stream.read(&mut out).unwrap();
            assert_eq!(n % 2, 0);
            if n == 0 {
                break;
            }
            total += n;
        }
        assert_eq!(total, 2000);
        assert_eq!(stream.position(), Duration::from_millis(125));
    }

    #[test]
    fn test_seek_back_to_start() {
        let pcm = vec![1000i16; 8000];
        let mut stream = SymphoniaStream::open(wav_bytes(&pcm, 1, 8000), Some("wav")).unwrap();
        let mut out = [0.0; 4000];
        assert_eq!(stream.read(&mut out).unwrap(), 4000);
        stream.seek(Duration::ZERO).unwrap();
        assert!(stream.position() < Duration::from_millis(10));
        let mut rest = 0;
        loop {
            let n = stream.read(&mut out).unwrap();
            if n == 0 {
                break;
            }
            rest += n;
        }
        assert!(rest >= 7900);
    }
}
