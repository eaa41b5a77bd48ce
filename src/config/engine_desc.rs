use crate::config::MusicConfig;
use crate::error::{Result, StarSonicError};
use std::time::Duration;

/// Reverb parameters attached to the shared effect slot.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReverbParams {
    /// Decay time in seconds
    pub decay_time: f32,
    /// High-frequency decay ratio
    pub hf_ratio: f32,
}

impl Default for ReverbParams {
    fn default() -> Self {
        Self {
            decay_time: 10.0,
            hf_ratio: 0.5,
        }
    }
}

/// Distance attenuation applied to every general-purpose source at creation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SourceDefaults {
    pub reference_distance: f32,
    pub max_distance: f32,
    pub rolloff: f32,
}

impl Default for SourceDefaults {
    fn default() -> Self {
        Self {
            reference_distance: 500.0,
            max_distance: 25000.0,
            rolloff: 1.0,
        }
    }
}

/// The ambience that swells as game speed climbs past `threshold`.
#[derive(Debug, Clone)]
pub struct CompressionDesc {
    /// Sound name looked up in the registry; no group is made if it is missing
    pub sound_name: String,
    /// Speed at which the ambience starts to be heard
    pub threshold: f32,
    /// Speed span over which it reaches full volume when no max speed is known
    pub span: f32,
}

impl Default for CompressionDesc {
    fn default() -> Self {
        Self {
            sound_name: "compression".to_string(),
            threshold: 2.0,
            span: 10.0,
        }
    }
}

/// Configuration descriptor for a StarSonic engine
#[derive(Debug, Clone)]
pub struct StarSonicDesc {
    /// When false every sound call is a neutral no-op
    pub sound_enabled: bool,
    /// When false no music worker is spawned
    pub music_enabled: bool,
    /// Number of backend sources allocated at startup
    pub voices: usize,
    /// Output sample rate; sounds are resampled to it at load time
    pub sample_rate: u32,
    /// Number of output channels (typically 2 for stereo)
    pub channels: u16,
    /// Frames per device callback
    pub block_size: usize,
    /// Asset prefix scanned for `.wav`/`.ogg` sounds
    pub sound_path: String,
    /// Asset prefix scanned for `.ogg` music
    pub music_path: String,
    /// Initial linear sound volume
    pub sound_volume: f32,
    /// Initial linear music volume
    pub music_volume: f32,
    /// Length of a group fade-out
    pub group_fade: Duration,
    pub compression: CompressionDesc,
    /// Whether the backend's reverb effect should be used
    pub efx: bool,
    pub nebula_reverb: ReverbParams,
    /// Speed of sound in the normal environment
    pub speed_of_sound: f32,
    pub source_defaults: SourceDefaults,
    /// Distance from the listener beyond which positional voices are culled
    pub audible_range: f32,
    /// Capacity of the event channel; events are dropped when it is full
    pub event_capacity: usize,
    pub music: MusicConfig,
}

impl Default for StarSonicDesc {
    fn default() -> Self {
        Self {
            sound_enabled: true,
            music_enabled: true,
            voices: 128,
            sample_rate: 48000,
            channels: 2,
            block_size: 1024,
            sound_path: "snd/sounds/".to_string(),
            music_path: "snd/music/".to_string(),
            sound_volume: 0.7,
            music_volume: 0.8,
            group_fade: Duration::from_millis(100),
            compression: CompressionDesc::default(),
            efx: true,
            nebula_reverb: ReverbParams::default(),
            speed_of_sound: 3433.0,
            source_defaults: SourceDefaults::default(),
            audible_range: 25000.0,
            event_capacity: 256,
            music: MusicConfig::default(),
        }
    }
}

impl StarSonicDesc {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sound_enabled(mut self, enabled: bool) -> Self {
        self.sound_enabled = enabled;
        self
    }

    pub fn music_enabled(mut self, enabled: bool) -> Self {
        self.music_enabled = enabled;
        self
    }

    pub fn voices(mut self, voices: usize) -> Self {
        self.voices = voices;
        self
    }

    pub fn sample_rate(mut self, rate: u32) -> Self {
        self.sample_rate = rate;
        self
    }

    pub fn channels(mut self, channels: u16) -> Self {
        self.channels = channels;
        self
    }

    pub fn block_size(mut self, size: usize) -> Self {
        self.block_size = size;
        self
    }

    pub fn sound_path(mut self, path: impl Into<String>) -> Self {
        self.sound_path = path.into();
        self
    }

    pub fn music_path(mut self, path: impl Into<String>) -> Self {
        self.music_path = path.into();
        self
    }

    pub fn sound_volume(mut self, volume: f32) -> Self {
        self.sound_volume = volume;
        self
    }

    pub fn music_volume(mut self, volume: f32) -> Self {
        self.music_volume = volume;
        self
    }

    pub fn group_fade(mut self, duration: Duration) -> Self {
        self.group_fade = duration;
        self
    }

    pub fn compression(mut self, compression: CompressionDesc) -> Self {
        self.compression = compression;
        self
    }

    pub fn efx(mut self, enabled: bool) -> Self {
        self.efx = enabled;
        self
    }

    pub fn audible_range(mut self, range: f32) -> Self {
        self.audible_range = range;
        self
    }

    pub fn music(mut self, music: MusicConfig) -> Self {
        self.music = music;
        self
    }

    /// Rejects descriptors the engine cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.sample_rate == 0 {
            return Err(StarSonicError::Configuration(
                "sample_rate must be greater than 0".into(),
            ));
        }
        if self.channels == 0 {
            return Err(StarSonicError::Configuration(
                "channels must be greater than 0".into(),
            ));
        }
        if self.voices == 0 {
            return Err(StarSonicError::Configuration(
                "voices must be greater than 0".into(),
            ));
        }
        if self.music.buffer_samples == 0 {
            return Err(StarSonicError::Configuration(
                "music buffer_samples must be greater than 0".into(),
            ));
        }
        Ok(())
    }
}
