use crate::backend::{AudioBackend, BufferHandle, SourceHandle, SourceState, check_backend};
use crate::error::{Result, StarSonicError};
use crate::volume::MixLevels;
use std::fmt;
use std::time::{Duration, Instant};

/// Identifier of a group. Starts at 1; groups live until the engine is dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GroupId(pub(crate) u32);

impl GroupId {
    pub fn get(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for GroupId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "group#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum GroupState {
    /// Idle or sounding; either way armed for `play`
    Playing,
    FadeOut,
}

#[derive(Debug)]
pub(crate) struct Group {
    pub id: GroupId,
    pub sources: Vec<SourceHandle>,
    pub state: GroupState,
    pub fade_start: Option<Instant>,
    pub speed_affected: bool,
    pub volume: f32,
}

/// Groups of permanently reserved sources with their own volume and fade.
pub(crate) struct GroupMixer {
    groups: Vec<Group>,
    next_id: u32,
    fade: Duration,
}

impl GroupMixer {
    pub fn new(fade: Duration) -> Self {
        Self {
            groups: Vec::new(),
            next_id: 1,
            fade,
        }
    }

    /// Register sources already taken out of the pool.
    pub fn create(&mut self, sources: Vec<SourceHandle>) -> GroupId {
        let id = GroupId(self.next_id);
        self.next_id += 1;
        log::debug!("Created {} with {} sources", id, sources.len());
        self.groups.push(Group {
            id,
            sources,
            state: GroupState::Playing,
            fade_start: None,
            speed_affected: true,
            volume: 1.0,
        });
        id
    }

    pub fn get(&self, id: GroupId) -> Result<&Group> {
        self.groups
            .iter()
            .find(|g| g.id == id)
            .ok_or(StarSonicError::GroupNotFound(id.0))
    }

    fn get_mut(&mut self, id: GroupId) -> Result<&mut Group> {
        self.groups
            .iter_mut()
            .find(|g| g.id == id)
            .ok_or(StarSonicError::GroupNotFound(id.0))
    }

    /// Start `buffer` on the first idle slot, evicting the last slot when all are busy.
    ///
    /// Returns the slot index used.
    pub fn play(
        &mut self,
        id: GroupId,
        buffer: BufferHandle,
        once: bool,
        levels: &MixLevels,
        backend: &mut dyn AudioBackend,
    ) -> Result<usize> {
        let group = self.get_mut(id)?;
        group.state = GroupState::Playing;
        group.fade_start = None;

        let last = group.sources.len().saturating_sub(1);
        let mut chosen = None;
        for (index, source) in group.sources.iter().enumerate() {
            let state = backend.source_state(*source);
            if index == last {
                if state != SourceState::Stopped {
                    backend.stop(*source);
                }
            } else if matches!(state, SourceState::Playing | SourceState::Paused) {
                continue;
            }
            chosen = Some((index, *source));
            break;
        }
        let Some((index, source)) = chosen else {
            return Err(StarSonicError::Engine(format!("{} has no sources", id)));
        };

        backend.attach_buffer(source, Some(buffer));
        backend.set_relative(source, true);
        backend.set_looping(source, !once);
        backend.set_gain(source, levels.group_gain(group.volume, group.speed_affected));
        backend.set_pitch(
            source,
            if group.speed_affected { levels.speed } else { 1.0 },
        );
        backend.play(source);
        check_backend(backend, "group play");
        log::debug!("{} playing on slot {} (once={})", id, index, once);
        Ok(index)
    }

    /// Begin a fade-out; sources are stopped once it completes.
    pub fn stop(&mut self, id: GroupId, now: Instant) -> Result<()> {
        let group = self.get_mut(id)?;
        group.state = GroupState::FadeOut;
        group.fade_start = Some(now);
        Ok(())
    }

    pub fn pause(&self, id: GroupId, backend: &mut dyn AudioBackend) -> Result<()> {
        for source in &self.get(id)?.sources {
            if backend.source_state(*source) == SourceState::Playing {
                backend.pause(*source);
            }
        }
        check_backend(backend, "group pause");
        Ok(())
    }

    pub fn resume(&self, id: GroupId, backend: &mut dyn AudioBackend) -> Result<()> {
        for source in &self.get(id)?.sources {
            if backend.source_state(*source) == SourceState::Paused {
                backend.play(*source);
            }
        }
        check_backend(backend, "group resume");
        Ok(())
    }

    pub fn set_volume(&mut self, id: GroupId, volume: f32) -> Result<()> {
        self.get_mut(id)?.volume = volume.clamp(0.0, 1.0);
        Ok(())
    }

    pub fn set_speed_affected(&mut self, id: GroupId, affected: bool) -> Result<()> {
        self.get_mut(id)?.speed_affected = affected;
        Ok(())
    }

    /// Advance fades. Returns the groups whose fade finished this call.
    pub fn update(
        &mut self,
        now: Instant,
        levels: &MixLevels,
        backend: &mut dyn AudioBackend,
    ) -> Vec<GroupId> {
        let mut finished = Vec::new();
        for group in self.groups.iter_mut() {
            if group.state != GroupState::FadeOut {
                continue;
            }
            let start = *group.fade_start.get_or_insert(now);
            let elapsed = now.saturating_duration_since(start);
            let rest = levels.group_gain(group.volume, group.speed_affected);

            if elapsed < self.fade {
                let d = 1.0 - elapsed.as_secs_f32() / self.fade.as_secs_f32();
                for source in &group.sources {
                    backend.set_gain(*source, d * rest);
                }
            } else {
                for source in &group.sources {
                    backend.stop(*source);
                    backend.attach_buffer(*source, None);
                    backend.set_gain(*source, rest);
                }
                group.state = GroupState::Playing;
                group.fade_start = None;
                finished.push(group.id);
            }
        }
        check_backend(backend, "group fade");
        finished
    }

    /// Push the current volume to every group slot that is sounding.
    pub fn apply_volume(&self, levels: &MixLevels, backend: &mut dyn AudioBackend) {
        for group in &self.groups {
            if group.state == GroupState::FadeOut {
                continue;
            }
            let gain = levels.group_gain(group.volume, group.speed_affected);
            for source in &group.sources {
                if backend.source_state(*source) == SourceState::Playing {
                    backend.set_gain(*source, gain);
                }
            }
        }
    }

    pub fn apply_pitch(&self, speed: f32, backend: &mut dyn AudioBackend) {
        for group in self.groups.iter().filter(|g| g.speed_affected) {
            for source in &group.sources {
                backend.set_pitch(*source, speed);
            }
        }
    }

    pub fn is_playing(&self, id: GroupId, backend: &dyn AudioBackend) -> bool {
        self.get(id).is_ok_and(|g| {
            g.sources
                .iter()
                .any(|s| backend.source_state(*s) == SourceState::Playing)
        })
    }

    pub fn reserved_sources(&self) -> usize {
        self.groups.iter().map(|g| g.sources.len()).sum()
    }

    pub fn sources(&self) -> impl Iterator<Item = SourceHandle> + '_ {
        self.groups.iter().flat_map(|g| g.sources.iter().copied())
    }
}
