//! Event types for StarSonic

use crate::sound::{GroupId, VoiceId};

/// Notifications drained with `StarSonicEngine::poll_events`.
#[derive(Debug, Clone, PartialEq)]
pub enum StarSonicEvent {
    /// A voice's source stopped on its own and went back to the pool
    VoiceFinished { voice: VoiceId },
    /// A group fade-out completed and its sources were stopped
    GroupFadeComplete { group: GroupId },
    TrackStarted { name: String },
    /// The track played through to its end
    TrackFinished { name: String },
    MusicError { error: String },
}

impl StarSonicEvent {
    pub fn is_error(&self) -> bool {
        matches!(self, Self::MusicError { .. })
    }

    pub fn is_music(&self) -> bool {
        matches!(
            self,
            Self::TrackStarted { .. } | Self::TrackFinished { .. } | Self::MusicError { .. }
        )
    }
}

/// Publish without blocking; events are dropped when nobody drains the channel.
pub(crate) fn emit(sender: &crossbeam_channel::Sender<StarSonicEvent>, event: StarSonicEvent) {
    if let Err(crossbeam_channel::TrySendError::Full(event)) = sender.try_send(event) {
        log::debug!("Event channel full, dropping {:?}", event);
    }
}
