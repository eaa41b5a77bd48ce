//! Abstract audio backend.
//!
//! The backend is a non-reentrant driver in the OpenAL mould: sources play
//! queues of buffers, listener and environment parameters are global. Every
//! caller goes through [`SharedBackend`], whose mutex is the single lock that
//! serializes backend access between the game thread, the music worker and
//! the device callback.

mod device;
mod software;

pub use device::AudioOutput;
pub use software::SoftwareBackend;

use crate::config::{ReverbParams, SourceDefaults};
use crate::error::Result;
use crate::math::{ListenerPose, Vec3};
use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;

/// Opaque handle to a backend playback channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SourceHandle(pub(crate) u32);

impl fmt::Display for SourceHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "source#{}", self.0)
    }
}

/// Opaque handle to backend-resident PCM.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BufferHandle(pub(crate) u32);

impl fmt::Display for BufferHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "buffer#{}", self.0)
    }
}

/// Hardware playback state of a source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceState {
    Initial,
    Playing,
    Paused,
    Stopped,
}

/// The driver interface every part of the engine talks to.
///
/// Creation calls report failure directly. All other calls are fire-and-forget:
/// failures latch an error that callers collect with [`AudioBackend::take_error`]
/// after a batch of calls.
pub trait AudioBackend: Send {
    fn create_source(&mut self) -> Result<SourceHandle>;
    fn delete_source(&mut self, source: SourceHandle);
    fn create_buffer(&mut self) -> Result<BufferHandle>;
    fn delete_buffer(&mut self, buffer: BufferHandle);

    /// Uploads interleaved PCM into `buffer`, replacing its previous contents.
    fn buffer_data(&mut self, buffer: BufferHandle, samples: &[f32], channels: u16, sample_rate: u32);

    /// Replaces the source's queue with a single static buffer, or clears it.
    fn attach_buffer(&mut self, source: SourceHandle, buffer: Option<BufferHandle>);
    fn queue_buffer(&mut self, source: SourceHandle, buffer: BufferHandle);
    /// Removes the oldest fully played buffer from the queue.
    fn unqueue_processed(&mut self, source: SourceHandle) -> Option<BufferHandle>;
    fn buffers_processed(&self, source: SourceHandle) -> usize;
    fn buffers_queued(&self, source: SourceHandle) -> usize;

    /// Starts the source from the head of its queue, or resumes it when paused.
    /// Has no effect on a source that is already playing.
    fn play(&mut self, source: SourceHandle);
    fn pause(&mut self, source: SourceHandle);
    /// Halts playback; every queued buffer becomes processed.
    fn stop(&mut self, source: SourceHandle);
    fn source_state(&self, source: SourceHandle) -> SourceState;

    fn set_gain(&mut self, source: SourceHandle, gain: f32);
    fn set_pitch(&mut self, source: SourceHandle, pitch: f32);
    fn set_position(&mut self, source: SourceHandle, position: Vec3);
    fn set_velocity(&mut self, source: SourceHandle, velocity: Vec3);
    /// Relative sources are positioned in listener space.
    fn set_relative(&mut self, source: SourceHandle, relative: bool);
    fn set_looping(&mut self, source: SourceHandle, looping: bool);
    fn set_distance(&mut self, source: SourceHandle, defaults: SourceDefaults);
    fn set_air_absorption(&mut self, source: SourceHandle, factor: f32);
    /// Routes the source into the shared reverb slot.
    fn set_effect_send(&mut self, source: SourceHandle, enabled: bool);

    fn set_listener(&mut self, pose: &ListenerPose);
    fn set_speed_of_sound(&mut self, speed: f32);
    /// Attaches reverb to the shared effect slot, or disconnects it.
    fn set_reverb(&mut self, reverb: Option<ReverbParams>);
    fn supports_effects(&self) -> bool;

    /// Returns and clears the first error latched since the last call.
    fn take_error(&mut self) -> Option<String>;
}

/// The backend lock. Held for a batch of calls, never across a blocking wait.
pub type SharedBackend = Arc<Mutex<dyn AudioBackend>>;

/// Logs and clears any error latched by the preceding batch of calls.
pub(crate) fn check_backend(backend: &mut dyn AudioBackend, context: &str) -> bool {
    match backend.take_error() {
        Some(err) => {
            log::warn!("Audio backend error during {}: {}", context, err);
            false
        }
        None => true,
    }
}
