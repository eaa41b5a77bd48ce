//! The StarSonic engine: one owned context for sound effects and music.

use crate::assets::AssetSource;
use crate::backend::{AudioBackend, SharedBackend, SourceHandle, SourceState, check_backend};
use crate::config::StarSonicDesc;
use crate::environment::{SoundEnvironment, apply_environment};
use crate::error::{Result, StarSonicError};
use crate::events::{StarSonicEvent, emit};
use crate::math::{ListenerPose, Vec2, Vec3, plane};
use crate::music::MusicPlayer;
use crate::sound::{
    GroupId, GroupMixer, PlayOutcome, SoundId, SoundRegistry, SourceAccounting, SourcePool,
    VoiceId, VoiceRegistry, VoiceState,
};
use crate::volume::{MixLevels, VolumeLevel};
use crossbeam_channel::{Receiver, Sender};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Decides whether a positional sound is worth playing.
pub trait AudibleRange: Send + Sync {
    fn is_audible(&self, listener: &ListenerPose, position: Vec2) -> bool;
}

impl<F> AudibleRange for F
where
    F: Fn(&ListenerPose, Vec2) -> bool + Send + Sync,
{
    fn is_audible(&self, listener: &ListenerPose, position: Vec2) -> bool {
        self(listener, position)
    }
}

/// Everything within `range` of the listener is audible.
#[derive(Debug, Clone, Copy)]
pub struct DistanceRange {
    pub range: f32,
}

impl AudibleRange for DistanceRange {
    fn is_audible(&self, listener: &ListenerPose, position: Vec2) -> bool {
        let offset = position - listener.position.truncate();
        offset.length_squared() <= self.range * self.range
    }
}

/// Mixer state touched together: pool, groups and the global levels.
struct MixState {
    pool: SourcePool,
    groups: GroupMixer,
    levels: MixLevels,
    /// Current compression ambience volume; above zero while it plays
    compression_gain: f32,
    listener: ListenerPose,
}

struct Compression {
    group: GroupId,
    sound: SoundId,
}

/// The sound-effect half of the engine; absent when sound is disabled.
///
/// Lock order is voices, then mix, then backend. The voice lock is never held
/// across backend calls.
struct SoundSystem {
    registry: SoundRegistry,
    voices: Mutex<VoiceRegistry>,
    mix: Mutex<MixState>,
    compression: Option<Compression>,
    range: Mutex<Box<dyn AudibleRange>>,
    effects: bool,
}

pub struct StarSonicEngine {
    desc: StarSonicDesc,
    backend: SharedBackend,
    sound: Option<SoundSystem>,
    music: Option<MusicPlayer>,
    environment: Mutex<SoundEnvironment>,
    events_tx: Sender<StarSonicEvent>,
    events_rx: Receiver<StarSonicEvent>,
}

impl StarSonicEngine {
    /// Load sounds, allocate sources and start the music worker.
    pub fn new(
        desc: StarSonicDesc,
        assets: Arc<dyn AssetSource>,
        backend: SharedBackend,
    ) -> Result<Self> {
        desc.validate()?;
        let (events_tx, events_rx) = crossbeam_channel::bounded(desc.event_capacity.max(1));

        // The music source is created before the pool takes what is left.
        let music = if desc.music_enabled {
            Some(MusicPlayer::new(
                desc.music.clone(),
                backend.clone(),
                assets.clone(),
                desc.music_path.clone(),
                desc.music_volume,
                events_tx.clone(),
            )?)
        } else {
            log::info!("Music disabled");
            None
        };

        let sound = if desc.sound_enabled {
            Some(SoundSystem::new(&desc, assets.as_ref(), &backend)?)
        } else {
            log::info!("Sound disabled");
            None
        };

        let engine = Self {
            desc,
            backend,
            sound,
            music,
            environment: Mutex::new(SoundEnvironment::Normal),
            events_tx,
            events_rx,
        };
        engine.set_environment(SoundEnvironment::Normal);
        log::info!(
            "StarSonic ready: {} sources, {} sounds",
            engine.source_accounting().total,
            engine.sound.as_ref().map_or(0, |s| s.registry.len())
        );
        Ok(engine)
    }

    pub fn desc(&self) -> &StarSonicDesc {
        &self.desc
    }

    pub fn is_sound_enabled(&self) -> bool {
        self.sound.is_some()
    }

    /// Advance one simulation tick: reclaim finished voices, run group fades and music timers.
    pub fn update(&self, dt: Duration) {
        if let Some(sound) = &self.sound {
            sound.reclaim(&self.backend, &self.events_tx);
            sound.update_groups(Instant::now(), &self.backend, &self.events_tx);
        }
        if let Some(music) = &self.music {
            music.update(dt);
        }
    }

    pub fn poll_events(&self) -> Vec<StarSonicEvent> {
        self.events_rx.try_iter().collect()
    }

    pub fn music(&self) -> Option<&MusicPlayer> {
        self.music.as_ref()
    }

    pub fn sounds(&self) -> Option<&SoundRegistry> {
        self.sound.as_ref().map(|s| &s.registry)
    }

    pub fn sound_get(&self, name: &str) -> Option<SoundId> {
        self.sound.as_ref()?.registry.get(name)
    }

    pub fn sound_length(&self, sound: SoundId) -> Option<Duration> {
        self.sound.as_ref()?.registry.length(sound)
    }

    /// Set the linear sound-effect volume and push it to every source.
    pub fn set_volume(&self, volume: f32) {
        let Some(sound) = &self.sound else {
            return;
        };
        let mut mix = sound.mix.lock();
        mix.levels.sound = VolumeLevel::from_linear(volume);
        let mut backend = self.backend.lock();
        sound.sweep_volume(&mix, &mut *backend);
    }

    pub fn volume(&self) -> f32 {
        self.sound
            .as_ref()
            .map_or(0.0, |s| s.mix.lock().levels.sound.linear())
    }

    pub fn volume_log(&self) -> f32 {
        self.sound
            .as_ref()
            .map_or(0.0, |s| s.mix.lock().levels.sound.gain())
    }

    /// Play a sound at the listener.
    pub fn play(&self, sound_id: SoundId) -> PlayOutcome {
        match &self.sound {
            Some(sound) => sound.start_voice(sound_id, None, &self.backend),
            None => PlayOutcome::Disabled,
        }
    }

    /// Play a sound at a world position; skipped when out of range.
    pub fn play_positional(&self, sound_id: SoundId, position: Vec2, velocity: Vec2) -> PlayOutcome {
        let Some(sound) = &self.sound else {
            return PlayOutcome::Disabled;
        };
        let listener = sound.mix.lock().listener;
        if !sound.range.lock().is_audible(&listener, position) {
            return PlayOutcome::Skipped;
        }
        sound.start_voice(
            sound_id,
            Some((plane(position), plane(velocity))),
            &self.backend,
        )
    }

    /// Halt a voice. Its source is returned on the next update.
    pub fn stop(&self, voice: VoiceId) {
        let Some(sound) = &self.sound else {
            return;
        };
        let source = sound.voices.lock().get(voice).and_then(|v| v.source);
        if let Some(source) = source {
            let mut backend = self.backend.lock();
            backend.stop(source);
            check_backend(&mut *backend, "voice stop");
        }
    }

    pub fn stop_all(&self) {
        let Some(sound) = &self.sound else {
            return;
        };
        let sources: Vec<SourceHandle> =
            sound.voices.lock().iter().filter_map(|v| v.source).collect();
        let mut backend = self.backend.lock();
        for source in sources {
            backend.stop(source);
        }
        check_backend(&mut *backend, "stop all");
    }

    /// Move a positional voice; applied on the next update. Unknown voices are ignored.
    pub fn update_voice_position(&self, voice: VoiceId, position: Vec2, velocity: Vec2) {
        if let Some(sound) = &self.sound {
            sound
                .voices
                .lock()
                .set_motion(voice, plane(position), plane(velocity));
        }
    }

    pub fn update_listener(&self, heading: f32, position: Vec2, velocity: Vec2) {
        let Some(sound) = &self.sound else {
            return;
        };
        let pose = ListenerPose::new(heading, position, velocity);
        sound.mix.lock().listener = pose;
        let mut backend = self.backend.lock();
        backend.set_listener(&pose);
        check_backend(&mut *backend, "listener");
    }

    /// Set the global playback speed, driving pitch and the compression ambience.
    pub fn set_speed(&self, speed: f32) {
        let Some(sound) = &self.sound else {
            return;
        };
        let compression = &self.desc.compression;
        let mut mix = sound.mix.lock();
        mix.levels.speed = speed;

        let excess = speed - compression.threshold;
        let mut v = excess / compression.span;
        if mix.levels.max_speed > compression.threshold {
            v = v.max(excess / (mix.levels.max_speed - compression.threshold));
        }
        let v = v.clamp(0.0, 1.0);
        let playing = mix.compression_gain > 0.0;

        let mut backend = self.backend.lock();
        if v > 0.0 {
            if let Some(c) = &sound.compression {
                if !playing {
                    let levels = mix.levels;
                    if let Some(buffer) = sound.registry.buffer(c.sound) {
                        if let Err(e) = mix.groups.play(c.group, buffer, false, &levels, &mut *backend)
                        {
                            log::warn!("Unable to start compression ambience: {}", e);
                        }
                    }
                }
                let _ = mix.groups.set_volume(c.group, v);
            }
            mix.levels.speed_gain = 1.0 - v;
        } else if playing {
            if let Some(c) = &sound.compression {
                let _ = mix.groups.stop(c.group, Instant::now());
            }
            mix.levels.speed_gain = 1.0;
        }
        mix.compression_gain = v;

        sound.sweep_volume(&mix, &mut *backend);
        for source in mix.pool.general() {
            backend.set_pitch(*source, speed);
        }
        mix.groups.apply_pitch(speed, &mut *backend);
        check_backend(&mut *backend, "speed");
    }

    /// Highest speed the game can reach; steepens the compression curve.
    pub fn set_max_speed(&self, max_speed: f32) {
        if let Some(sound) = &self.sound {
            sound.mix.lock().levels.max_speed = max_speed;
        }
    }

    pub fn speed(&self) -> f32 {
        self.sound.as_ref().map_or(1.0, |s| s.mix.lock().levels.speed)
    }

    /// Reserve `size` sources for exclusive use. `None` when the pool cannot supply them.
    pub fn create_group(&self, size: usize) -> Option<GroupId> {
        self.sound.as_ref()?.create_group(size, &self.backend)
    }

    /// Play a sound on a group, looping unless `once`.
    pub fn play_group(&self, group: GroupId, sound_id: SoundId, once: bool) -> Result<()> {
        let Some(sound) = &self.sound else {
            return Ok(());
        };
        let buffer = sound.registry.buffer(sound_id).ok_or_else(|| {
            StarSonicError::AssetNotFound(format!("sound {}", sound_id))
        })?;
        let mut mix = sound.mix.lock();
        let levels = mix.levels;
        let mut backend = self.backend.lock();
        mix.groups
            .play(group, buffer, once, &levels, &mut *backend)
            .map(|_| ())
            .inspect_err(|e| log::warn!("Group play failed: {}", e))
    }

    /// Fade a group out over the group fade time.
    pub fn stop_group(&self, group: GroupId) -> Result<()> {
        self.with_groups(|groups, _| groups.stop(group, Instant::now()))
    }

    pub fn pause_group(&self, group: GroupId) -> Result<()> {
        self.with_groups(|groups, backend| groups.pause(group, backend))
    }

    pub fn resume_group(&self, group: GroupId) -> Result<()> {
        self.with_groups(|groups, backend| groups.resume(group, backend))
    }

    pub fn set_group_volume(&self, group: GroupId, volume: f32) -> Result<()> {
        self.with_groups(|groups, _| groups.set_volume(group, volume))
    }

    pub fn set_group_speed_affected(&self, group: GroupId, affected: bool) -> Result<()> {
        self.with_groups(|groups, _| groups.set_speed_affected(group, affected))
    }

    pub fn is_group_playing(&self, group: GroupId) -> bool {
        let Some(sound) = &self.sound else {
            return false;
        };
        let mix = sound.mix.lock();
        let backend = self.backend.lock();
        mix.groups.is_playing(group, &*backend)
    }

    fn with_groups<F>(&self, f: F) -> Result<()>
    where
        F: FnOnce(&mut GroupMixer, &mut dyn AudioBackend) -> Result<()>,
    {
        let Some(sound) = &self.sound else {
            return Ok(());
        };
        let mut mix = sound.mix.lock();
        let mut backend = self.backend.lock();
        f(&mut mix.groups, &mut *backend).inspect_err(|e| log::warn!("{}", e))
    }

    pub fn set_environment(&self, environment: SoundEnvironment) {
        *self.environment.lock() = environment;
        let Some(sound) = &self.sound else {
            return;
        };
        let params = environment.params(self.desc.speed_of_sound, self.desc.nebula_reverb);
        let mix = sound.mix.lock();
        let mut backend = self.backend.lock();
        apply_environment(&params, sound.effects, mix.pool.general(), &mut *backend);
        log::debug!("Environment set to {:?}", environment);
    }

    pub fn environment(&self) -> SoundEnvironment {
        *self.environment.lock()
    }

    /// Pause every playing general source and the compression ambience.
    pub fn pause_all(&self) {
        self.for_general_and_compression(SourceState::Playing, |backend, source| {
            backend.pause(source)
        });
    }

    pub fn resume_all(&self) {
        self.for_general_and_compression(SourceState::Paused, |backend, source| {
            backend.play(source)
        });
    }

    fn for_general_and_compression<F>(&self, state: SourceState, mut f: F)
    where
        F: FnMut(&mut dyn AudioBackend, SourceHandle),
    {
        let Some(sound) = &self.sound else {
            return;
        };
        let mix = sound.mix.lock();
        let mut sources: Vec<SourceHandle> = mix.pool.general().to_vec();
        if let Some(c) = &sound.compression {
            if let Ok(group) = mix.groups.get(c.group) {
                sources.extend(group.sources.iter().copied());
            }
        }
        let mut backend = self.backend.lock();
        for source in sources {
            if backend.source_state(source) == state {
                f(&mut *backend, source);
            }
        }
        check_backend(&mut *backend, "pause/resume all");
    }

    /// Replace the positional culling policy.
    pub fn set_range_check(&self, range: impl AudibleRange + 'static) {
        if let Some(sound) = &self.sound {
            *sound.range.lock() = Box::new(range);
        }
    }

    /// Where every allocated source currently belongs.
    pub fn source_accounting(&self) -> SourceAccounting {
        let Some(sound) = &self.sound else {
            return SourceAccounting::default();
        };
        let voices = sound.voices.lock().owned_sources();
        let mix = sound.mix.lock();
        SourceAccounting {
            free: mix.pool.free_count(),
            voices,
            groups: mix.groups.reserved_sources(),
            total: mix.pool.total(),
        }
    }

    /// Number of voices not yet reclaimed.
    pub fn active_voices(&self) -> usize {
        self.sound
            .as_ref()
            .map_or(0, |s| s.voices.lock().active_len())
    }
}

impl Drop for StarSonicEngine {
    fn drop(&mut self) {
        self.stop_all();
        // Kill the worker before its source goes away with the rest.
        self.music.take();
        if let Some(mut sound) = self.sound.take() {
            sound.shutdown(&self.backend);
        }
        log::info!("StarSonic shut down");
    }
}

impl SoundSystem {
    fn new(desc: &StarSonicDesc, assets: &dyn AssetSource, backend: &SharedBackend) -> Result<Self> {
        let registry = SoundRegistry::load(assets, &desc.sound_path, desc.sample_rate, backend)?;

        let (pool, effects) = {
            let mut guard = backend.lock();
            let pool = SourcePool::allocate(&mut *guard, desc.voices, desc.source_defaults)?;
            let effects = desc.efx && guard.supports_effects();
            if effects {
                for source in pool.general() {
                    guard.set_effect_send(*source, true);
                }
            }
            check_backend(&mut *guard, "source setup");
            (pool, effects)
        };

        let mut system = Self {
            registry,
            voices: Mutex::new(VoiceRegistry::new()),
            mix: Mutex::new(MixState {
                pool,
                groups: GroupMixer::new(desc.group_fade),
                levels: MixLevels::new(desc.sound_volume),
                compression_gain: 0.0,
                listener: ListenerPose::default(),
            }),
            compression: None,
            range: Mutex::new(Box::new(DistanceRange {
                range: desc.audible_range,
            })),
            effects,
        };

        let name = &desc.compression.sound_name;
        if let Some(sound) = system.registry.get(name) {
            match system.create_group(1, backend) {
                Some(group) => {
                    let _ = system.mix.lock().groups.set_speed_affected(group, false);
                    system.compression = Some(Compression { group, sound });
                }
                None => log::warn!("Unable to reserve a source for '{}'", name),
            }
        }

        {
            let mix = system.mix.lock();
            let mut guard = backend.lock();
            system.sweep_volume(&mix, &mut *guard);
        }
        Ok(system)
    }

    fn start_voice(
        &self,
        sound_id: SoundId,
        motion: Option<(Vec3, Vec3)>,
        backend: &SharedBackend,
    ) -> PlayOutcome {
        let Some(buffer) = self.registry.buffer(sound_id) else {
            return PlayOutcome::UnknownSound;
        };

        let (source, levels) = {
            let mut mix = self.mix.lock();
            match mix.pool.acquire() {
                Some(source) => (source, mix.levels),
                None => {
                    log::debug!("No free source for {}", sound_id);
                    return PlayOutcome::NoChannel;
                }
            }
        };

        let (position, velocity) = motion.unwrap_or((Vec3::ZERO, Vec3::ZERO));
        {
            let mut backend = backend.lock();
            backend.attach_buffer(source, Some(buffer));
            backend.set_relative(source, motion.is_none());
            backend.set_position(source, position);
            backend.set_velocity(source, velocity);
            backend.set_looping(source, false);
            backend.set_gain(source, levels.voice_gain());
            backend.set_pitch(source, levels.speed);
            backend.play(source);
            check_backend(&mut *backend, "voice play");
        }

        let id = self
            .voices
            .lock()
            .insert(sound_id, Some(source), motion.is_some(), position, velocity);
        log::debug!("{} playing {} on {}", id, sound_id, source);
        PlayOutcome::Started(id)
    }

    /// Return sources of finished voices to the pool and sync positional voices.
    fn reclaim(&self, backend: &SharedBackend, events: &Sender<StarSonicEvent>) {
        let snapshot = self.voices.lock().snapshot();
        if snapshot.is_empty() {
            return;
        }

        let mut finished = Vec::new();
        {
            let mut backend = backend.lock();
            for voice in &snapshot {
                let Some(source) = voice.source else {
                    finished.push((voice, VoiceState::Destroy));
                    continue;
                };
                if backend.source_state(source) == SourceState::Stopped {
                    backend.attach_buffer(source, None);
                    finished.push((voice, VoiceState::Stopped));
                } else if voice.positional {
                    backend.set_position(source, voice.position);
                    backend.set_velocity(source, voice.velocity);
                }
            }
            check_backend(&mut *backend, "voice reclaim");
        }
        if finished.is_empty() {
            return;
        }

        let mut released = Vec::new();
        {
            let mut voices = self.voices.lock();
            for (voice, state) in &finished {
                if voices.retire(voice.slot, voice.id, *state) {
                    released.push((voice.id, voice.source));
                }
            }
        }

        let mut mix = self.mix.lock();
        for (id, source) in released {
            if let Some(source) = source {
                mix.pool.release(source);
            }
            log::debug!("{} finished", id);
            emit(events, StarSonicEvent::VoiceFinished { voice: id });
        }
    }

    fn update_groups(&self, now: Instant, backend: &SharedBackend, events: &Sender<StarSonicEvent>) {
        let mut mix = self.mix.lock();
        let levels = mix.levels;
        let done = {
            let mut backend = backend.lock();
            mix.groups.update(now, &levels, &mut *backend)
        };
        for group in done {
            emit(events, StarSonicEvent::GroupFadeComplete { group });
        }
    }

    fn create_group(&self, size: usize, backend: &SharedBackend) -> Option<GroupId> {
        if size == 0 {
            log::warn!("Refusing to create an empty group");
            return None;
        }
        let mut mix = self.mix.lock();
        let Some(sources) = mix.pool.reserve(size) else {
            log::warn!(
                "Unable to create group of {} sources: only {} free",
                size,
                mix.pool.free_count()
            );
            return None;
        };
        if self.effects {
            let mut backend = backend.lock();
            for source in &sources {
                backend.set_air_absorption(*source, 0.0);
                backend.set_effect_send(*source, false);
            }
            check_backend(&mut *backend, "group setup");
        }
        Some(mix.groups.create(sources))
    }

    /// Push gain to every general source and every sounding group slot.
    fn sweep_volume(&self, mix: &MixState, backend: &mut dyn AudioBackend) {
        let gain = mix.levels.voice_gain();
        for source in mix.pool.general() {
            backend.set_gain(*source, gain);
        }
        mix.groups.apply_volume(&mix.levels, backend);
        check_backend(backend, "volume");
    }

    fn shutdown(&mut self, backend: &SharedBackend) {
        let mix = self.mix.get_mut();
        let mut backend = backend.lock();
        let sources: Vec<SourceHandle> = mix
            .pool
            .general()
            .iter()
            .copied()
            .chain(mix.groups.sources())
            .collect();
        for source in sources {
            backend.stop(source);
            backend.attach_buffer(source, None);
            backend.delete_source(source);
        }
        self.registry.release(&mut *backend);
        check_backend(&mut *backend, "shutdown");
    }
}
