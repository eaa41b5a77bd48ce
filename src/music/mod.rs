//! Streaming background music.
//!
//! A dedicated worker thread owns one backend source with two alternating
//! buffers and runs the playback state machine. The game thread talks to it
//! through [`MusicPlayer`]: every control call sends a command and blocks
//! until the worker acknowledges it in a settled state.

mod decoder;
mod replaygain;
mod selector;
mod state;
mod symphonia_stream;
mod worker;

pub use decoder::{DecodeError, MemoryStreamDecoder, StreamDecoder};
pub use replaygain::ReplayGain;
pub use selector::{Playlist, TrackSelector};
pub use state::{MusicCommand, MusicState};
pub use symphonia_stream::SymphoniaStream;

use crate::assets::AssetSource;
use crate::backend::{BufferHandle, SharedBackend, SourceHandle, check_backend};
use crate::config::MusicConfig;
use crate::error::{Result, StarSonicError};
use crate::events::{StarSonicEvent, emit};
use crate::volume::VolumeLevel;
use crossbeam_channel::Sender;
use parking_lot::Mutex;
use replaygain::GainStage;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};
use worker::{Control, Envelope, LoadedTrack, SharedGain, StreamSlot, Worker, WorkerParts};

const MUSIC_EXTENSION: &str = ".ogg";

/// Deferred and pending track selection, driven by [`MusicPlayer::update`].
#[derive(Debug, Default)]
struct Chooser {
    delay: Option<Duration>,
    pending: bool,
    situation: String,
}

/// Handle to the music worker.
pub struct MusicPlayer {
    commands: Option<Sender<Envelope>>,
    control: Arc<Control>,
    stream: StreamSlot,
    backend: SharedBackend,
    source: SourceHandle,
    buffers: [BufferHandle; 2],
    gain: Arc<SharedGain>,
    volume: Mutex<VolumeLevel>,
    seq: AtomicU64,
    /// One command in flight at a time
    command_lock: Mutex<()>,
    assets: Arc<dyn AssetSource>,
    music_path: String,
    config: MusicConfig,
    events: Sender<StarSonicEvent>,
    selector: Mutex<Option<Box<dyn TrackSelector>>>,
    chooser: Mutex<Chooser>,
    loaded_at: Mutex<Option<Instant>>,
    thread: Option<JoinHandle<()>>,
}

impl MusicPlayer {
    /// Create the music source and buffers and start the worker.
    pub fn new(
        config: MusicConfig,
        backend: SharedBackend,
        assets: Arc<dyn AssetSource>,
        music_path: impl Into<String>,
        volume: f32,
        events: Sender<StarSonicEvent>,
    ) -> Result<Self> {
        let volume = VolumeLevel::from_linear(volume);
        let (source, buffers) = {
            let mut guard = backend.lock();
            let source = guard.create_source()?;
            let first = guard.create_buffer()?;
            let second = guard.create_buffer()?;
            guard.set_relative(source, true);
            guard.set_gain(source, volume.gain());
            check_backend(&mut *guard, "music setup");
            (source, [first, second])
        };

        let control = Arc::new(Control::new());
        let stream: StreamSlot = Arc::new(Mutex::new(None));
        let gain = Arc::new(SharedGain::new(volume.gain()));
        let (tx, rx) = crossbeam_channel::unbounded();

        let worker = Worker::new(WorkerParts {
            commands: rx,
            control: control.clone(),
            stream: stream.clone(),
            backend: backend.clone(),
            source,
            buffers,
            gain: gain.clone(),
            config: config.clone(),
            events: events.clone(),
        });
        let thread = std::thread::Builder::new()
            .name("starsonic-music".into())
            .spawn(move || worker.run())
            .map_err(|e| StarSonicError::Music(format!("Failed to spawn music thread: {}", e)))?;

        let player = Self {
            commands: Some(tx),
            control,
            stream,
            backend,
            source,
            buffers,
            gain,
            volume: Mutex::new(volume),
            seq: AtomicU64::new(0),
            command_lock: Mutex::new(()),
            assets,
            music_path: music_path.into(),
            config,
            events,
            selector: Mutex::new(None),
            chooser: Mutex::new(Chooser::default()),
            loaded_at: Mutex::new(None),
            thread: Some(thread),
        };

        let deadline = Instant::now() + player.config.command_timeout;
        let mut shared = player.control.shared.lock();
        while shared.state == MusicState::Startup {
            if player
                .control
                .changed
                .wait_until(&mut shared, deadline)
                .timed_out()
            {
                break;
            }
        }
        let state = shared.state;
        drop(shared);
        if state != MusicState::Idle {
            return Err(StarSonicError::Music(format!(
                "Music thread failed to start (state {})",
                state
            )));
        }
        log::debug!("Music ready on {}", player.source);
        Ok(player)
    }

    /// Send a command and wait for the worker to settle after applying it.
    fn command(
        &self,
        command: MusicCommand,
        forced: bool,
        accept: impl Fn(MusicState) -> bool,
    ) -> Result<MusicState> {
        let _serial = self.command_lock.lock();
        let commands = self
            .commands
            .as_ref()
            .ok_or_else(|| StarSonicError::Music("Music thread is not running".into()))?;

        let seq = self.seq.fetch_add(1, Ordering::SeqCst) + 1;
        commands
            .send(Envelope {
                seq,
                command,
                forced,
            })
            .map_err(|_| StarSonicError::Music("Music thread is not running".into()))?;

        let deadline = Instant::now() + self.config.command_timeout;
        let mut shared = self.control.shared.lock();
        loop {
            if shared.state == MusicState::Dead {
                return Err(StarSonicError::Music("Music thread is dead".into()));
            }
            if shared.acked >= seq && !shared.state.is_transient() {
                let state = shared.state;
                return if accept(state) {
                    Ok(state)
                } else {
                    Err(StarSonicError::Music(format!(
                        "{:?} left music in state {}",
                        command, state
                    )))
                };
            }
            if self
                .control
                .changed
                .wait_until(&mut shared, deadline)
                .timed_out()
                && shared.acked < seq
            {
                return Err(StarSonicError::Music(format!(
                    "Timed out waiting for {:?}",
                    command
                )));
            }
        }
    }

    /// Load `name` from the music directory, stopping whatever is playing.
    pub fn load(&self, name: &str) -> Result<()> {
        let path = format!("{}{}{}", self.music_path, name, MUSIC_EXTENSION);
        let decoder = self
            .assets
            .read(&path)
            .and_then(|bytes| SymphoniaStream::open(bytes, Some("ogg")));
        match decoder {
            Ok(decoder) => self.load_decoder(name, Box::new(decoder)),
            Err(e) => {
                log::warn!("Unable to load music '{}': {}", path, e);
                self.stop_now()?;
                *self.stream.lock() = None;
                *self.loaded_at.lock() = None;
                Err(e)
            }
        }
    }

    /// Load an already opened stream under `name`.
    pub fn load_decoder(&self, name: &str, decoder: Box<dyn StreamDecoder>) -> Result<()> {
        self.stop_now()?;
        let gain = GainStage::new(decoder.replay_gain(), self.config.preamp_db);
        log::debug!(
            "Loaded music '{}' ({}ch @ {}Hz, gain x{:.3})",
            name,
            decoder.channels(),
            decoder.sample_rate(),
            gain.scale()
        );
        *self.stream.lock() = Some(LoadedTrack {
            name: name.to_string(),
            decoder,
            gain,
        });
        *self.loaded_at.lock() = Some(Instant::now());
        Ok(())
    }

    /// Start the loaded track with a fade-in, or resume a paused one.
    pub fn play(&self) -> Result<()> {
        self.command(MusicCommand::FadeIn, false, |s| s.is_playing())
            .map(|_| ())
    }

    /// Fade out and stop.
    pub fn stop(&self) -> Result<()> {
        self.command(MusicCommand::FadeOut, false, |s| {
            matches!(s, MusicState::Idle | MusicState::FadeOut)
        })
        .map(|_| ())
    }

    /// Stop immediately without triggering a new selection.
    pub fn stop_now(&self) -> Result<()> {
        self.command(MusicCommand::Stop, true, |s| s == MusicState::Idle)
            .map(|_| ())
    }

    pub fn pause(&self) -> Result<()> {
        self.command(MusicCommand::Pause, false, |s| {
            matches!(s, MusicState::Idle | MusicState::Paused)
        })
        .map(|_| ())
    }

    pub fn resume(&self) -> Result<()> {
        self.command(MusicCommand::Play, false, |s| s.is_playing())
            .map(|_| ())
    }

    pub fn state(&self) -> MusicState {
        self.control.shared.lock().state
    }

    pub fn is_playing(&self) -> bool {
        self.state().is_playing()
    }

    pub fn set_volume(&self, volume: f32) {
        let level = VolumeLevel::from_linear(volume);
        *self.volume.lock() = level;
        self.gain.set(level.gain());
        if self.is_playing() {
            let mut backend = self.backend.lock();
            backend.set_gain(self.source, level.gain());
            check_backend(&mut *backend, "music volume");
        }
    }

    pub fn volume(&self) -> f32 {
        self.volume.lock().linear()
    }

    pub fn volume_log(&self) -> f32 {
        self.volume.lock().gain()
    }

    /// Seek the loaded track.
    pub fn set_position(&self, seconds: f64) -> Result<()> {
        let mut stream = self.stream.lock();
        let Some(track) = stream.as_mut() else {
            return Err(StarSonicError::Music("No music loaded".into()));
        };
        track
            .decoder
            .seek(Duration::from_secs_f64(seconds.max(0.0)))
            .inspect_err(|e| log::warn!("Unable to seek '{}': {}", track.name, e))
    }

    pub fn playing_name(&self) -> Option<String> {
        self.stream.lock().as_ref().map(|t| t.name.clone())
    }

    /// Wall time since the current track was loaded.
    pub fn playing_time(&self) -> Duration {
        self.loaded_at
            .lock()
            .map(|at| at.elapsed())
            .unwrap_or(Duration::ZERO)
    }

    /// Decoder position of the loaded track.
    pub fn track_position(&self) -> Option<Duration> {
        self.stream.lock().as_ref().map(|t| t.decoder.position())
    }

    pub fn set_selector(&self, selector: impl TrackSelector + 'static) {
        *self.selector.lock() = Some(Box::new(selector));
    }

    /// Ask the selector for a track for `situation` right away.
    pub fn choose(&self, situation: &str) {
        self.chooser.lock().delay = None;
        self.run_selector(situation);
    }

    /// Ask the selector after `delay` of game time has passed in [`MusicPlayer::update`].
    pub fn choose_delay(&self, situation: &str, delay: Duration) {
        let mut chooser = self.chooser.lock();
        chooser.delay = Some(delay);
        chooser.pending = false;
        chooser.situation = situation.to_string();
    }

    /// Schedule an "idle" selection for the next update.
    pub fn rechoose(&self) {
        let mut chooser = self.chooser.lock();
        chooser.delay = None;
        chooser.pending = true;
        chooser.situation = "idle".to_string();
    }

    pub fn update(&self, dt: Duration) {
        let wanted = std::mem::take(&mut self.control.shared.lock().rechoose);
        if wanted {
            self.rechoose();
        }

        let situation = {
            let mut chooser = self.chooser.lock();
            if let Some(delay) = chooser.delay {
                match delay.checked_sub(dt).filter(|d| !d.is_zero()) {
                    Some(rest) => chooser.delay = Some(rest),
                    None => {
                        chooser.delay = None;
                        chooser.pending = true;
                    }
                }
            }
            if !chooser.pending {
                return;
            }
            chooser.pending = false;
            std::mem::take(&mut chooser.situation)
        };

        self.run_selector(&situation);
        if !self.is_playing() && situation != "idle" {
            self.run_selector("idle");
        }
    }

    fn run_selector(&self, situation: &str) {
        let choice = match self.selector.lock().as_mut() {
            Some(selector) => selector.choose(situation),
            None => {
                log::debug!("No music selector for situation '{}'", situation);
                return;
            }
        };
        let Some(name) = choice else {
            return;
        };
        log::debug!("Selected music '{}' for '{}'", name, situation);
        if let Err(e) = self.load(&name).and_then(|()| self.play()) {
            log::warn!("Unable to play music '{}': {}", name, e);
            emit(
                &self.events,
                StarSonicEvent::MusicError {
                    error: e.to_string(),
                },
            );
        }
    }

    /// Track names available in the music directory.
    pub fn available_tracks(&self) -> Vec<String> {
        match self.assets.list(&self.music_path) {
            Ok(files) => files
                .iter()
                .filter_map(|f| f.strip_suffix(MUSIC_EXTENSION))
                .map(str::to_string)
                .collect(),
            Err(e) => {
                log::warn!("Unable to list music in '{}': {}", self.music_path, e);
                Vec::new()
            }
        }
    }
}

impl Drop for MusicPlayer {
    fn drop(&mut self) {
        if let Some(commands) = self.commands.take() {
            let seq = self.seq.fetch_add(1, Ordering::SeqCst) + 1;
            let _ = commands.send(Envelope {
                seq,
                command: MusicCommand::Kill,
                forced: true,
            });
        }

        let deadline = Instant::now() + self.config.kill_timeout;
        let mut dead = true;
        {
            let mut shared = self.control.shared.lock();
            while shared.state != MusicState::Dead {
                if self
                    .control
                    .changed
                    .wait_until(&mut shared, deadline)
                    .timed_out()
                {
                    dead = shared.state == MusicState::Dead;
                    break;
                }
            }
        }

        if !dead {
            log::warn!("Music thread did not exit when asked, ignoring it");
            self.thread.take();
            return;
        }
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }

        *self.stream.lock() = None;
        let mut backend = self.backend.lock();
        backend.stop(self.source);
        backend.attach_buffer(self.source, None);
        backend.delete_source(self.source);
        for buffer in self.buffers {
            backend.delete_buffer(buffer);
        }
        check_backend(&mut *backend, "music shutdown");
        log::debug!("Music shut down");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::MemoryAssets;
    use crate::backend::{AudioBackend, SoftwareBackend, SourceState};
    use crate::test_support::tone_wav;
    use crossbeam_channel::Receiver;

    const RATE: u32 = 8000;

    struct Rig {
        backend: Arc<Mutex<SoftwareBackend>>,
        player: MusicPlayer,
        events: Receiver<StarSonicEvent>,
    }

    fn rig_with(config: MusicConfig, assets: MemoryAssets) -> Rig {
        let backend = Arc::new(Mutex::new(SoftwareBackend::new(RATE, 2)));
        let shared: SharedBackend = backend.clone();
        let (tx, rx) = crossbeam_channel::bounded(64);
        let player =
            MusicPlayer::new(config, shared, Arc::new(assets), "music/", 1.0, tx).unwrap();
        Rig {
            backend,
            player,
            events: rx,
        }
    }

    fn quick_config() -> MusicConfig {
        MusicConfig::default()
            .buffer_samples(1024)
            .fade_in(Duration::ZERO)
            .fade_out(Duration::ZERO)
            .worker_poll(Duration::from_millis(1))
    }

    fn rig() -> Rig {
        rig_with(quick_config(), MemoryAssets::new())
    }

    fn tone(seconds: f32) -> Box<dyn StreamDecoder> {
        let frames = (RATE as f32 * seconds) as usize;
        Box::new(MemoryStreamDecoder::new(vec![0.25; frames], 1, RATE))
    }

    /// Render until `done` holds or the deadline passes.
    fn render_until(rig: &Rig, done: impl Fn(&Rig) -> bool) -> bool {
        let deadline = Instant::now() + Duration::from_secs(5);
        let mut block = vec![0.0; 256];
        while Instant::now() < deadline {
            if done(rig) {
                return true;
            }
            rig.backend.lock().render(&mut block);
            std::thread::sleep(Duration::from_millis(1));
        }
        done(rig)
    }

    #[test]
    fn test_starts_idle() {
        let rig = rig();
        assert_eq!(rig.player.state(), MusicState::Idle);
        assert!(!rig.player.is_playing());
        assert_eq!(rig.player.playing_time(), Duration::ZERO);
    }

    #[test]
    fn test_play_pause_resume_stop() {
        let rig = rig();
        rig.player.load_decoder("theme", tone(10.0)).unwrap();
        rig.player.play().unwrap();
        assert!(rig.player.is_playing());
        assert_eq!(rig.player.playing_name().as_deref(), Some("theme"));
        assert!(rig.backend.lock().buffers_queued(rig.player.source) >= 1);

        rig.player.pause().unwrap();
        assert_eq!(rig.player.state(), MusicState::Paused);
        assert_eq!(
            rig.backend.lock().source_state(rig.player.source),
            SourceState::Paused
        );

        rig.player.resume().unwrap();
        assert_eq!(rig.player.state(), MusicState::Playing);

        rig.player.stop().unwrap();
        assert!(render_until(&rig, |r| r.player.state() == MusicState::Idle));
        assert_eq!(rig.backend.lock().buffers_queued(rig.player.source), 0);

        let events: Vec<_> = rig.events.try_iter().collect();
        assert!(events.contains(&StarSonicEvent::TrackStarted {
            name: "theme".into()
        }));
    }

    #[test]
    fn test_short_track_queues_one_buffer_and_finishes() {
        let rig = rig();
        // Less than one buffer of audio.
        rig.player.load_decoder("sting", tone(0.05)).unwrap();
        rig.player.play().unwrap();
        assert_eq!(rig.backend.lock().buffers_queued(rig.player.source), 1);

        assert!(render_until(&rig, |r| r.player.state() == MusicState::Idle));
        let events: Vec<_> = rig.events.try_iter().collect();
        assert!(events.contains(&StarSonicEvent::TrackFinished {
            name: "sting".into()
        }));
    }

    #[test]
    fn test_natural_end_triggers_rechoose() {
        let rig = rig();
        let picks = Arc::new(Mutex::new(Vec::new()));
        let seen = picks.clone();
        rig.player.set_selector(move |situation: &str| {
            seen.lock().push(situation.to_string());
            None::<String>
        });

        rig.player.load_decoder("short", tone(0.2)).unwrap();
        rig.player.play().unwrap();
        assert!(render_until(&rig, |r| r.player.state() == MusicState::Idle));
        assert!(render_until(&rig, |r| r.control_rechoose()));

        rig.player.update(Duration::from_millis(16));
        assert_eq!(picks.lock().as_slice(), ["idle"]);
    }

    #[test]
    fn test_forced_stop_does_not_rechoose() {
        let rig = rig();
        rig.player.load_decoder("a", tone(10.0)).unwrap();
        rig.player.play().unwrap();
        rig.player.load_decoder("b", tone(10.0)).unwrap();
        assert_eq!(rig.player.state(), MusicState::Idle);
        assert!(!rig.control_rechoose());
    }

    impl Rig {
        fn control_rechoose(&self) -> bool {
            self.player.control.shared.lock().rechoose
        }
    }

    #[test]
    fn test_user_stop_requests_rechoose() {
        let rig = rig();
        rig.player.load_decoder("a", tone(10.0)).unwrap();
        rig.player.play().unwrap();
        rig.player.stop().unwrap();
        assert!(render_until(&rig, |r| r.player.state() == MusicState::Idle));
        assert!(rig.control_rechoose());
    }

    #[test]
    fn test_fade_in_ramps_gain() {
        let config = quick_config().fade_in(Duration::from_millis(400));
        let rig = rig_with(config, MemoryAssets::new());
        rig.player.load_decoder("theme", tone(10.0)).unwrap();
        rig.player.play().unwrap();
        assert_eq!(rig.player.state(), MusicState::FadeIn);
        let gain = rig.backend.lock().source_gain(rig.player.source).unwrap();
        assert!(gain < 0.5);

        assert!(render_until(&rig, |r| r.player.state() == MusicState::Playing));
        let gain = rig.backend.lock().source_gain(rig.player.source).unwrap();
        assert!((gain - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_fade_out_reversal_keeps_playing() {
        let config = quick_config()
            .fade_in(Duration::from_secs(2))
            .fade_out(Duration::from_secs(2));
        let rig = rig_with(config, MemoryAssets::new());
        rig.player.load_decoder("theme", tone(10.0)).unwrap();
        rig.player.play().unwrap();
        rig.player.stop().unwrap();
        assert_eq!(rig.player.state(), MusicState::FadeOut);
        rig.player.play().unwrap();
        assert!(rig.player.is_playing());
        assert_eq!(rig.player.state(), MusicState::FadeIn);
    }

    #[test]
    fn test_empty_stream_returns_to_idle() {
        let rig = rig();
        rig.player
            .load_decoder("silence", Box::new(MemoryStreamDecoder::new(Vec::new(), 1, RATE)))
            .unwrap();
        assert!(rig.player.play().is_err());
        assert_eq!(rig.player.state(), MusicState::Idle);
    }

    #[test]
    fn test_bad_link_ends_track() {
        let rig = rig();
        let decoder = MemoryStreamDecoder::new(vec![0.1; 4096], 1, RATE)
            .with_fault_at(2048, DecodeError::BadLink("corrupt page".into()));
        rig.player.load_decoder("broken", Box::new(decoder)).unwrap();
        rig.player.play().unwrap();
        assert!(render_until(&rig, |r| r.player.state() == MusicState::Idle));
        let events: Vec<_> = rig.events.try_iter().collect();
        assert!(events.iter().any(|e| e.is_error()));
    }

    #[test]
    fn test_hole_is_skipped() {
        let rig = rig();
        let decoder = MemoryStreamDecoder::new(vec![0.1; 4096], 1, RATE)
            .with_fault_at(1500, DecodeError::Hole);
        rig.player.load_decoder("scratched", Box::new(decoder)).unwrap();
        rig.player.play().unwrap();
        assert!(render_until(&rig, |r| r.player.state() == MusicState::Idle));

        let events: Vec<_> = rig.events.try_iter().collect();
        assert!(!events.iter().any(|e| e.is_error()));
        assert!(events.contains(&StarSonicEvent::TrackFinished {
            name: "scratched".into()
        }));
        assert_eq!(rig.player.track_position(), Some(Duration::from_millis(512)));
    }

    /// Plays `good` samples and then reports nothing but holes.
    struct EndlessHoles {
        good: usize,
        cursor: usize,
    }

    impl StreamDecoder for EndlessHoles {
        fn channels(&self) -> u16 {
            1
        }

        fn sample_rate(&self) -> u32 {
            RATE
        }

        fn replay_gain(&self) -> Option<ReplayGain> {
            None
        }

        fn read(&mut self, out: &mut [f32]) -> std::result::Result<usize, DecodeError> {
            let n = out.len().min(self.good - self.cursor);
            if n == 0 {
                return Err(DecodeError::Hole);
            }
            out[..n].fill(0.1);
            self.cursor += n;
            Ok(n)
        }

        fn seek(&mut self, _position: Duration) -> Result<()> {
            Ok(())
        }

        fn position(&self) -> Duration {
            Duration::from_secs_f64(self.cursor as f64 / RATE as f64)
        }
    }

    #[test]
    fn test_repeated_holes_end_track() {
        let rig = rig();
        let decoder = EndlessHoles {
            good: 2048,
            cursor: 0,
        };
        rig.player.load_decoder("worn", Box::new(decoder)).unwrap();
        rig.player.play().unwrap();
        assert!(render_until(&rig, |r| r.player.state() == MusicState::Idle));

        let events: Vec<_> = rig.events.try_iter().collect();
        assert!(events.iter().any(|e| e.is_error()));
        assert!(events.contains(&StarSonicEvent::TrackFinished {
            name: "worn".into()
        }));
        assert!(rig.control_rechoose());
    }

    #[test]
    fn test_volume_applies_while_playing() {
        let rig = rig();
        rig.player.load_decoder("theme", tone(10.0)).unwrap();
        rig.player.play().unwrap();
        assert!(render_until(&rig, |r| r.player.state() == MusicState::Playing));
        rig.player.set_volume(0.5);
        assert_eq!(rig.player.volume(), 0.5);
        let expected = VolumeLevel::from_linear(0.5).gain();
        assert_eq!(rig.player.volume_log(), expected);
        assert_eq!(
            rig.backend.lock().source_gain(rig.player.source),
            Some(expected)
        );
    }

    #[test]
    fn test_seek_and_missing_track() {
        let rig = rig();
        assert!(rig.player.set_position(1.0).is_err());
        rig.player.load_decoder("theme", tone(4.0)).unwrap();
        rig.player.set_position(2.0).unwrap();
        assert_eq!(rig.player.track_position(), Some(Duration::from_secs(2)));
        assert!(rig.player.load("nope").is_err());
        assert!(rig.player.playing_name().is_none());
    }

    #[test]
    fn test_choose_delay_runs_after_countdown() {
        let rig = rig();
        let picks = Arc::new(Mutex::new(Vec::new()));
        let seen = picks.clone();
        rig.player.set_selector(move |situation: &str| {
            seen.lock().push(situation.to_string());
            None::<String>
        });
        rig.player
            .choose_delay("combat", Duration::from_millis(100));
        rig.player.update(Duration::from_millis(60));
        assert!(picks.lock().is_empty());
        rig.player.update(Duration::from_millis(60));
        // Nothing started, so idle is consulted as well.
        assert_eq!(picks.lock().as_slice(), ["combat", "idle"]);
    }

    #[test]
    fn test_load_from_assets_and_list() {
        let assets = MemoryAssets::new()
            .with("music/intro.ogg", tone_wav(4000, RATE))
            .with("music/readme.txt", Vec::new());
        let rig = rig_with(quick_config(), assets);
        assert_eq!(rig.player.available_tracks(), vec!["intro".to_string()]);
        // WAV bytes behind an .ogg name still probe by content.
        rig.player.load("intro").unwrap();
        rig.player.play().unwrap();
        assert!(rig.player.is_playing());
    }

    #[test]
    fn test_drop_releases_backend_objects() {
        let rig = rig();
        let backend = rig.backend.clone();
        assert_eq!(backend.lock().source_count(), 1);
        drop(rig.player);
        assert_eq!(backend.lock().source_count(), 0);
    }
}
