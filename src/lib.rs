//! StarSonic: a game audio engine.
//!
//! Sound effects play on a fixed pool of backend sources. Short one-shots and
//! positional sounds borrow a source per voice and hand it back once the
//! voice finishes; groups reserve sources for looping ambience. Background
//! music streams on its own thread through a double-buffered source.
//!
//! All driver access goes through [`backend::AudioBackend`]. The bundled
//! [`SoftwareBackend`] mixes in process and can be played through
//! [`AudioOutput`] or rendered offline.

pub mod assets;
pub mod audio_data;
pub mod backend;
pub mod config;
pub mod engine;
pub mod environment;
pub mod error;
pub mod events;
pub mod math;
pub mod music;
pub mod sound;
pub mod volume;

#[cfg(test)]
mod test_support;

pub use assets::{AssetSource, DirectoryAssets, MemoryAssets};
pub use backend::{AudioBackend, AudioOutput, SharedBackend, SoftwareBackend};
pub use config::{MusicConfig, StarSonicDesc};
pub use engine::{AudibleRange, DistanceRange, StarSonicEngine};
pub use environment::SoundEnvironment;
pub use error::{Result, StarSonicError};
pub use events::StarSonicEvent;
pub use music::{MusicPlayer, MusicState, Playlist, TrackSelector};
pub use sound::{GroupId, PlayOutcome, SoundId, SourceAccounting, VoiceId};
