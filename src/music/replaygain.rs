//! Loudness normalisation applied while decoding music.

/// Track replaygain tags.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReplayGain {
    pub track_gain_db: f32,
    pub track_peak: f32,
}

impl Default for ReplayGain {
    fn default() -> Self {
        Self {
            track_gain_db: 0.0,
            track_peak: 1.0,
        }
    }
}

impl ReplayGain {
    /// Parse tag text such as `"-6.48 dB"` or `"0.988251"`.
    pub fn parse_value(text: &str) -> Option<f32> {
        let number: String = text
            .trim()
            .chars()
            .take_while(|c| c.is_ascii_digit() || matches!(c, '-' | '+' | '.' | 'e' | 'E'))
            .collect();
        number.parse().ok()
    }
}

const KNEE: f32 = 0.5;

/// Limiter for samples the scale would push past the track's headroom.
fn soft_knee(x: f32) -> f32 {
    if x < -KNEE {
        ((x + KNEE) / (1.0 - KNEE)).tanh() * (1.0 - KNEE) - KNEE
    } else if x > KNEE {
        ((x - KNEE) / (1.0 - KNEE)).tanh() * (1.0 - KNEE) + KNEE
    } else {
        x
    }
}

/// Per-track gain stage derived from replaygain tags and a preamp.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct GainStage {
    scale: f32,
    max_scale: f32,
}

impl GainStage {
    pub fn new(gain: Option<ReplayGain>, preamp_db: f32) -> Self {
        let gain = gain.unwrap_or_default();
        let peak = if gain.track_peak > 0.0 {
            gain.track_peak
        } else {
            1.0
        };
        Self {
            scale: 10f32.powf((gain.track_gain_db + preamp_db) / 20.0),
            max_scale: 1.0 / peak,
        }
    }

    pub fn scale(&self) -> f32 {
        self.scale
    }

    pub fn apply(&self, samples: &mut [f32]) {
        if self.scale > self.max_scale {
            for sample in samples.iter_mut() {
                *sample = soft_knee(*sample * self.scale);
            }
        } else if self.scale > 0.0 && self.scale != 1.0 {
            for sample in samples.iter_mut() {
                *sample *= self.scale;
            }
        }
    }
}
