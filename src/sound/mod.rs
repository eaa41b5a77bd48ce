//! Sound effects: buffers, hardware sources, voices and groups.

mod group;
mod pool;
mod registry;
mod voice;

pub use group::GroupId;
pub use registry::{SoundId, SoundRegistry};
pub use voice::VoiceId;

pub(crate) use group::GroupMixer;
pub(crate) use pool::SourcePool;
pub(crate) use voice::{VoiceRegistry, VoiceState};

/// Result of a play request. Only `Started` produced audible output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayOutcome {
    Started(VoiceId),
    /// Positional sound outside audible range; nothing was allocated
    Skipped,
    /// Every source is busy; the request was dropped
    NoChannel,
    /// Sound is disabled for this engine
    Disabled,
    UnknownSound,
}

impl PlayOutcome {
    pub fn voice(&self) -> Option<VoiceId> {
        match self {
            Self::Started(id) => Some(*id),
            _ => None,
        }
    }

    /// Started or deliberately culled.
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Started(_) | Self::Skipped)
    }
}

/// Where every allocated source currently belongs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SourceAccounting {
    pub free: usize,
    pub voices: usize,
    pub groups: usize,
    pub total: usize,
}

impl SourceAccounting {
    /// Every source is in exactly one of the free pool, a voice, or a group.
    pub fn is_balanced(&self) -> bool {
        self.free + self.voices + self.groups == self.total
    }
}
