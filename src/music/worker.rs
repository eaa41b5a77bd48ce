use crate::backend::{BufferHandle, SharedBackend, SourceHandle, SourceState, check_backend};
use crate::config::MusicConfig;
use crate::events::{StarSonicEvent, emit};
use crate::music::replaygain::GainStage;
use crate::music::state::{FadeMark, MusicCommand, MusicState, transition};
use crate::music::{DecodeError, StreamDecoder};
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use parking_lot::{Condvar, Mutex};
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::{Duration, Instant};

/// Consecutive holes tolerated in one fill before the stream counts as broken.
const MAX_HOLES: usize = 8;

/// A command tagged with the sequence number the caller waits on.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Envelope {
    pub seq: u64,
    pub command: MusicCommand,
    /// Stop without asking for a new track afterwards
    pub forced: bool,
}

/// State the worker publishes after every iteration.
#[derive(Debug)]
pub(crate) struct Shared {
    pub state: MusicState,
    /// Highest command sequence number applied so far
    pub acked: u64,
    /// The worker wants the game thread to pick a new track
    pub rechoose: bool,
}

pub(crate) struct Control {
    pub shared: Mutex<Shared>,
    pub changed: Condvar,
}

impl Control {
    pub fn new() -> Self {
        Self {
            shared: Mutex::new(Shared {
                state: MusicState::Startup,
                acked: 0,
                rechoose: false,
            }),
            changed: Condvar::new(),
        }
    }
}

/// The loaded track. Guarded by the decode-stream lock.
pub(crate) struct LoadedTrack {
    pub name: String,
    pub decoder: Box<dyn StreamDecoder>,
    pub gain: GainStage,
}

pub(crate) type StreamSlot = Arc<Mutex<Option<LoadedTrack>>>;

/// Music gain stored as f32 bits so both threads can read it without a lock.
#[derive(Debug, Default)]
pub(crate) struct SharedGain(AtomicU32);

impl SharedGain {
    pub fn new(gain: f32) -> Self {
        Self(AtomicU32::new(gain.to_bits()))
    }

    pub fn get(&self) -> f32 {
        f32::from_bits(self.0.load(Ordering::Relaxed))
    }

    pub fn set(&self, gain: f32) {
        self.0.store(gain.to_bits(), Ordering::Relaxed);
    }
}

#[derive(Debug, Clone, Copy)]
struct FadeClock {
    start: Instant,
    offset: Duration,
}

impl FadeClock {
    fn starting_at(offset: Duration) -> Self {
        Self {
            start: Instant::now(),
            offset,
        }
    }

    fn elapsed(&self) -> Duration {
        self.start.elapsed() + self.offset
    }
}

fn progress(elapsed: Duration, total: Duration) -> f32 {
    if total.is_zero() {
        1.0
    } else {
        (elapsed.as_secs_f32() / total.as_secs_f32()).min(1.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Fill {
    Full,
    /// End of stream reached after some data
    Last,
    Empty,
}

pub(crate) struct WorkerParts {
    pub commands: Receiver<Envelope>,
    pub control: Arc<Control>,
    pub stream: StreamSlot,
    pub backend: SharedBackend,
    pub source: SourceHandle,
    pub buffers: [BufferHandle; 2],
    pub gain: Arc<SharedGain>,
    pub config: MusicConfig,
    pub events: Sender<StarSonicEvent>,
}

/// The music thread: a single consumer of the command channel that owns the
/// state machine and keeps the source's two buffers fed.
pub(crate) struct Worker {
    parts: WorkerParts,
    state: MusicState,
    acked: u64,
    killing: bool,
    forced: bool,
    fade_in_on_load: bool,
    fade: FadeClock,
    /// The decoder hit the end; no more buffers will be queued
    exhausted: bool,
    scratch: Vec<f32>,
}

impl Worker {
    pub fn new(parts: WorkerParts) -> Self {
        Self {
            parts,
            state: MusicState::Startup,
            acked: 0,
            killing: false,
            forced: false,
            fade_in_on_load: false,
            fade: FadeClock::starting_at(Duration::ZERO),
            exhausted: false,
            scratch: Vec::new(),
        }
    }

    pub fn run(mut self) {
        log::debug!("Music worker started");
        loop {
            if self.state != MusicState::Startup {
                let next = self.next_envelope();
                if let Some(envelope) = next {
                    self.acked = envelope.seq;
                }
                let (command, forced) = match next {
                    _ if self.killing => (MusicCommand::Kill, true),
                    Some(envelope) => (envelope.command, envelope.forced),
                    None => (MusicCommand::None, false),
                };
                self.apply(command, forced);
            }

            let alive = self.act();
            self.publish();
            if !alive {
                break;
            }
        }
        log::debug!("Music worker exited");
    }

    fn next_envelope(&mut self) -> Option<Envelope> {
        if self.killing {
            return self.parts.commands.try_recv().ok();
        }
        let received = if matches!(self.state, MusicState::Idle | MusicState::Paused) {
            self.parts
                .commands
                .recv()
                .map_err(|_| RecvTimeoutError::Disconnected)
        } else {
            self.parts.commands.recv_timeout(self.parts.config.worker_poll)
        };
        match received {
            Ok(envelope) => {
                if envelope.command == MusicCommand::Kill {
                    self.killing = true;
                }
                Some(envelope)
            }
            Err(RecvTimeoutError::Timeout) => None,
            Err(RecvTimeoutError::Disconnected) => {
                log::debug!("Music command channel closed, shutting down");
                self.killing = true;
                None
            }
        }
    }

    fn apply(&mut self, command: MusicCommand, forced: bool) {
        let (next, mark) = transition(self.state, command);
        if command == MusicCommand::Kill || (forced && next == MusicState::Stopping) {
            self.forced = true;
        }

        match mark {
            FadeMark::Keep => {}
            FadeMark::StartFadeIn => {
                self.fade = FadeClock::starting_at(Duration::ZERO);
                self.fade_in_on_load = true;
            }
            FadeMark::NoFade => self.fade_in_on_load = false,
            FadeMark::StartFadeOut => self.fade = FadeClock::starting_at(Duration::ZERO),
            FadeMark::CompleteFadeIn => {
                self.fade = FadeClock::starting_at(self.parts.config.fade_in);
            }
            FadeMark::FadeInFromOut => {
                let gain = 1.0 - progress(self.fade.elapsed(), self.parts.config.fade_out);
                self.fade = FadeClock::starting_at(self.parts.config.fade_in.mul_f32(gain));
            }
            FadeMark::FadeOutFromIn => {
                let gain = progress(self.fade.elapsed(), self.parts.config.fade_in);
                self.fade =
                    FadeClock::starting_at(self.parts.config.fade_out.mul_f32(1.0 - gain));
            }
        }

        if next != self.state {
            log::debug!("Music {} -> {} ({:?})", self.state, next, command);
        }
        self.state = next;
    }

    /// Run the action for the current state. Returns false once the worker is dead.
    fn act(&mut self) -> bool {
        match self.state {
            MusicState::Dead => return false,
            MusicState::Startup => self.state = MusicState::Idle,
            MusicState::Idle | MusicState::Paused => {}
            MusicState::Loading => self.load(),
            MusicState::Stopping => self.stop(),
            MusicState::Pausing => {
                let mut backend = self.parts.backend.lock();
                backend.pause(self.parts.source);
                check_backend(&mut *backend, "music pause");
                self.state = MusicState::Paused;
            }
            MusicState::Resuming => {
                let mut backend = self.parts.backend.lock();
                backend.set_gain(self.parts.source, self.parts.gain.get());
                backend.play(self.parts.source);
                check_backend(&mut *backend, "music resume");
                self.state = MusicState::Playing;
            }
            MusicState::FadeIn => {
                let t = progress(self.fade.elapsed(), self.parts.config.fade_in);
                self.set_source_gain(t * self.parts.gain.get());
                if t >= 1.0 {
                    self.state = MusicState::Playing;
                }
                self.stream();
            }
            MusicState::FadeOut => {
                let t = progress(self.fade.elapsed(), self.parts.config.fade_out);
                if t >= 1.0 {
                    self.stop();
                } else {
                    self.set_source_gain((1.0 - t) * self.parts.gain.get());
                    self.stream();
                }
            }
            MusicState::Playing => self.stream(),
        }
        true
    }

    fn publish(&self) {
        {
            let mut shared = self.parts.control.shared.lock();
            shared.state = self.state;
            shared.acked = self.acked;
        }
        self.parts.control.changed.notify_all();
    }

    fn set_source_gain(&self, gain: f32) {
        let mut backend = self.parts.backend.lock();
        backend.set_gain(self.parts.source, gain);
        check_backend(&mut *backend, "music gain");
    }

    fn track_name(&self) -> Option<String> {
        self.parts.stream.lock().as_ref().map(|t| t.name.clone())
    }

    fn emit(&self, event: StarSonicEvent) {
        emit(&self.parts.events, event);
    }

    /// Settle in IDLE, asking for a new track unless the stop was forced.
    fn finish(&mut self, natural_end: bool) {
        self.state = MusicState::Idle;
        self.exhausted = false;
        if natural_end {
            if let Some(name) = self.track_name() {
                log::debug!("Music track '{}' finished", name);
                self.emit(StarSonicEvent::TrackFinished { name });
            }
        }
        if !self.forced {
            self.parts.control.shared.lock().rechoose = true;
        }
        if !self.killing {
            self.forced = false;
        }
    }

    /// Halt the source and return both buffers.
    fn release_queue(&self, halt: bool) {
        let source = self.parts.source;
        let mut backend = self.parts.backend.lock();
        if halt {
            backend.stop(source);
        }
        while backend.unqueue_processed(source).is_some() {}
        backend.attach_buffer(source, None);
        check_backend(&mut *backend, "music release");
    }

    fn stop(&mut self) {
        self.release_queue(true);
        self.set_source_gain(self.parts.gain.get());
        self.finish(false);
    }

    fn load(&mut self) {
        self.release_queue(true);
        match self.prime() {
            Ok(()) => {
                let gain = if self.fade_in_on_load {
                    0.0
                } else {
                    self.parts.gain.get()
                };
                let mut backend = self.parts.backend.lock();
                backend.set_gain(self.parts.source, gain);
                backend.play(self.parts.source);
                check_backend(&mut *backend, "music start");
                drop(backend);

                self.state = if self.fade_in_on_load {
                    MusicState::FadeIn
                } else {
                    MusicState::Playing
                };
                if let Some(name) = self.track_name() {
                    log::info!("Music playing '{}'", name);
                    self.emit(StarSonicEvent::TrackStarted { name });
                }
            }
            Err(error) => {
                log::warn!("Unable to start music: {}", error);
                if self.parts.stream.lock().is_some() {
                    self.emit(StarSonicEvent::MusicError {
                        error: error.to_string(),
                    });
                }
                self.finish(false);
            }
        }
    }

    /// Fill and queue both buffers from the current decoder position.
    fn prime(&mut self) -> Result<(), DecodeError> {
        let [first, second] = self.parts.buffers;
        match self.fill(first)? {
            Fill::Empty => return Err(DecodeError::BadLink("stream is empty".into())),
            Fill::Last => {
                self.queue(first);
                self.exhausted = true;
                return Ok(());
            }
            Fill::Full => self.queue(first),
        }
        self.refill_into(second);
        Ok(())
    }

    fn queue(&self, buffer: BufferHandle) {
        let mut backend = self.parts.backend.lock();
        backend.queue_buffer(self.parts.source, buffer);
        check_backend(&mut *backend, "music queue");
    }

    /// Fill `buffer` and queue it if it got data, marking the end of the stream.
    fn refill_into(&mut self, buffer: BufferHandle) {
        match self.fill(buffer) {
            Ok(Fill::Full) => self.queue(buffer),
            Ok(Fill::Last) => {
                self.queue(buffer);
                self.exhausted = true;
            }
            Ok(Fill::Empty) => self.exhausted = true,
            Err(error) => {
                log::warn!("Music stream error, ending track: {}", error);
                self.emit(StarSonicEvent::MusicError {
                    error: error.to_string(),
                });
                self.exhausted = true;
            }
        }
    }

    /// Decode up to one buffer's worth of samples and upload them.
    fn fill(&mut self, buffer: BufferHandle) -> Result<Fill, DecodeError> {
        let mut slot = self.parts.stream.lock();
        let Some(track) = slot.as_mut() else {
            return Err(DecodeError::BadLink("no track loaded".into()));
        };

        let channels = track.decoder.channels().max(1);
        let sample_rate = track.decoder.sample_rate();
        let capacity = (self.parts.config.buffer_samples / channels as usize).max(1)
            * channels as usize;
        self.scratch.resize(capacity, 0.0);

        let mut size = 0;
        let mut holes = 0;
        let mut outcome = Fill::Full;
        while size < capacity {
            match track.decoder.read(&mut self.scratch[size..capacity]) {
                Ok(0) => {
                    outcome = if size == 0 { Fill::Empty } else { Fill::Last };
                    break;
                }
                Ok(n) => size += n,
                Err(DecodeError::Hole) => {
                    holes += 1;
                    log::warn!("Hole in music stream '{}'", track.name);
                    if holes >= MAX_HOLES {
                        return Err(DecodeError::BadLink(format!("{} holes in a row", holes)));
                    }
                }
                Err(error) => return Err(error),
            }
        }
        if outcome == Fill::Empty {
            return Ok(outcome);
        }

        track.gain.apply(&mut self.scratch[..size]);
        drop(slot);

        let mut backend = self.parts.backend.lock();
        backend.buffer_data(buffer, &self.scratch[..size], channels, sample_rate);
        check_backend(&mut *backend, "music upload");
        Ok(outcome)
    }

    /// Recycle played buffers, detect the end of the track and recover from underruns.
    fn stream(&mut self) {
        let source = self.parts.source;
        let mut backend = self.parts.backend.lock();
        let state = backend.source_state(source);

        if self.exhausted {
            if state == SourceState::Stopped {
                drop(backend);
                self.release_queue(false);
                self.finish(true);
            }
            return;
        }

        if state == SourceState::Stopped {
            drop(backend);
            log::warn!("Music stream underrun, restarting");
            self.release_queue(false);
            match self.prime() {
                Ok(()) => {
                    let mut backend = self.parts.backend.lock();
                    backend.play(source);
                    check_backend(&mut *backend, "music restart");
                }
                Err(error) => {
                    log::warn!("Music stream ended during underrun: {}", error);
                    self.finish(true);
                }
            }
            return;
        }

        if backend.buffers_processed(source) == 0 {
            return;
        }
        let Some(buffer) = backend.unqueue_processed(source) else {
            return;
        };
        check_backend(&mut *backend, "music unqueue");
        drop(backend);
        self.refill_into(buffer);
    }
}
