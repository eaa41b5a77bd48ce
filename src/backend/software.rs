use super::{AudioBackend, BufferHandle, SourceHandle, SourceState};
use crate::config::{ReverbParams, SourceDefaults};
use crate::error::{Result, StarSonicError};
use crate::math::{ListenerPose, Vec3};
use std::collections::{HashMap, VecDeque};
use std::f32::consts::FRAC_PI_4;
use std::sync::Arc;

const METERS_PER_UNIT: f32 = 5.0;
/// High-frequency gain lost per meter at air absorption factor 1.
const AIR_ABSORPTION_HF: f32 = 0.994;
const AIR_LOWPASS: f32 = 0.1;
const DOPPLER_FACTOR: f32 = 1.0;
const REVERB_DELAY_SECS: f32 = 0.047;
const REVERB_WET: f32 = 0.3;

struct PcmBuffer {
    samples: Arc<[f32]>,
    channels: u16,
    sample_rate: u32,
}

impl PcmBuffer {
    fn empty() -> Self {
        Self {
            samples: Arc::from(Vec::new()),
            channels: 1,
            sample_rate: 1,
        }
    }

    fn frames(&self) -> usize {
        self.samples.len() / self.channels.max(1) as usize
    }

    /// Linearly interpolated frame at `offset`, as (left, right).
    fn frame_at(&self, offset: f64) -> (f32, f32) {
        let frames = self.frames();
        if frames == 0 {
            return (0.0, 0.0);
        }
        let index = (offset.floor() as usize).min(frames - 1);
        let next = (index + 1).min(frames - 1);
        let t = (offset - index as f64).clamp(0.0, 1.0) as f32;
        let channels = self.channels as usize;
        let read = |frame: usize, ch: usize| self.samples[frame * channels + ch.min(channels - 1)];
        let lerp = |ch: usize| read(index, ch) + (read(next, ch) - read(index, ch)) * t;
        (lerp(0), lerp(1))
    }
}

struct SourceSlot {
    state: SourceState,
    queue: VecDeque<BufferHandle>,
    /// Index of the buffer being played; everything before it is processed
    current: usize,
    offset: f64,
    gain: f32,
    pitch: f32,
    position: Vec3,
    velocity: Vec3,
    relative: bool,
    looping: bool,
    distance: SourceDefaults,
    air_absorption: f32,
    effect_send: bool,
    lowpass: [f32; 2],
}

impl Default for SourceSlot {
    fn default() -> Self {
        Self {
            state: SourceState::Initial,
            queue: VecDeque::new(),
            current: 0,
            offset: 0.0,
            gain: 1.0,
            pitch: 1.0,
            position: Vec3::ZERO,
            velocity: Vec3::ZERO,
            relative: false,
            looping: false,
            distance: SourceDefaults::default(),
            air_absorption: 0.0,
            effect_send: false,
            lowpass: [0.0; 2],
        }
    }
}

impl SourceSlot {
    fn processed(&self) -> usize {
        match self.state {
            SourceState::Stopped => self.queue.len(),
            SourceState::Initial => 0,
            _ => self.current.min(self.queue.len()),
        }
    }

    fn rewind(&mut self) {
        self.current = 0;
        self.offset = 0.0;
        self.lowpass = [0.0; 2];
    }

    fn advance(&mut self) {
        self.current += 1;
        self.offset = 0.0;
        if self.current >= self.queue.len() {
            if self.looping && !self.queue.is_empty() {
                self.current = 0;
            } else {
                self.state = SourceState::Stopped;
                self.current = self.queue.len();
            }
        }
    }
}

/// Per-block spatial parameters of one source.
struct SpatialMix {
    left: f32,
    right: f32,
    hf: f32,
    doppler: f32,
}

impl SpatialMix {
    fn compute(slot: &SourceSlot, listener: &ListenerPose, speed_of_sound: f32) -> Self {
        let rel = if slot.relative {
            slot.position
        } else {
            slot.position - listener.position
        };
        let dist = rel.length();

        let reference = slot.distance.reference_distance;
        let max = slot.distance.max_distance.max(reference);
        let clamped = dist.clamp(reference, max);
        let attenuation = if reference > 0.0 {
            reference / (reference + slot.distance.rolloff * (clamped - reference))
        } else {
            1.0
        };
        let gain = slot.gain * attenuation;

        let lateral = if dist > 1e-3 {
            (rel / dist).dot(listener.right()).clamp(-1.0, 1.0)
        } else {
            0.0
        };
        let theta = (lateral + 1.0) * FRAC_PI_4;

        let meters = (clamped - reference).max(0.0) * METERS_PER_UNIT;
        let hf = AIR_ABSORPTION_HF.powf(slot.air_absorption * meters);

        let mut doppler = 1.0;
        if !slot.relative && speed_of_sound > 0.0 && dist > 1e-3 {
            // Unit vector pointing from the source to the listener.
            let to_listener = -rel / dist;
            let limit = speed_of_sound / DOPPLER_FACTOR;
            let vls = listener.velocity.dot(to_listener).min(limit);
            let vss = slot.velocity.dot(to_listener).min(limit * 0.99);
            doppler = ((speed_of_sound - DOPPLER_FACTOR * vls)
                / (speed_of_sound - DOPPLER_FACTOR * vss))
                .max(0.0);
        }

        Self {
            left: gain * theta.cos(),
            right: gain * theta.sin(),
            hf,
            doppler,
        }
    }
}

struct Reverb {
    params: ReverbParams,
    line: Vec<f32>,
    cursor: usize,
    feedback: f32,
    damp: f32,
}

impl Reverb {
    fn new(params: ReverbParams, sample_rate: u32) -> Self {
        let len = ((REVERB_DELAY_SECS * sample_rate as f32) as usize).max(1);
        let decay = params.decay_time.max(0.01);
        Self {
            params,
            line: vec![0.0; len],
            cursor: 0,
            feedback: 10f32.powf(-3.0 * REVERB_DELAY_SECS / decay),
            damp: 0.0,
        }
    }

    fn process(&mut self, input: f32) -> f32 {
        let delayed = self.line[self.cursor];
        self.damp += self.params.hf_ratio.clamp(0.0, 1.0) * (delayed - self.damp);
        self.line[self.cursor] = input + self.damp * self.feedback;
        self.cursor = (self.cursor + 1) % self.line.len();
        delayed * REVERB_WET
    }
}

/// In-process backend that mixes its sources into interleaved f32 blocks.
///
/// Pair it with [`AudioOutput`](super::AudioOutput) to hear it, or call
/// [`SoftwareBackend::render`] directly to drive it offline.
pub struct SoftwareBackend {
    sample_rate: u32,
    channels: u16,
    sources: HashMap<u32, SourceSlot>,
    buffers: HashMap<u32, PcmBuffer>,
    next_source: u32,
    next_buffer: u32,
    source_limit: usize,
    listener: ListenerPose,
    speed_of_sound: f32,
    effects: bool,
    reverb: Option<Reverb>,
    error: Option<String>,
    frames_rendered: u64,
}

impl SoftwareBackend {
    pub fn new(sample_rate: u32, channels: u16) -> Self {
        Self {
            sample_rate,
            channels: channels.max(1),
            sources: HashMap::new(),
            buffers: HashMap::new(),
            next_source: 1,
            next_buffer: 1,
            source_limit: 256,
            listener: ListenerPose::default(),
            speed_of_sound: 3433.0,
            effects: true,
            reverb: None,
            error: None,
            frames_rendered: 0,
        }
    }

    /// Caps how many sources may exist at once, like a hardware mixer.
    pub fn with_source_limit(mut self, limit: usize) -> Self {
        self.source_limit = limit;
        self
    }

    pub fn without_effects(mut self) -> Self {
        self.effects = false;
        self
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn channels(&self) -> u16 {
        self.channels
    }

    pub fn frames_rendered(&self) -> u64 {
        self.frames_rendered
    }

    pub fn source_count(&self) -> usize {
        self.sources.len()
    }

    pub fn source_gain(&self, source: SourceHandle) -> Option<f32> {
        self.sources.get(&source.0).map(|s| s.gain)
    }

    pub fn source_pitch(&self, source: SourceHandle) -> Option<f32> {
        self.sources.get(&source.0).map(|s| s.pitch)
    }

    pub fn source_looping(&self, source: SourceHandle) -> Option<bool> {
        self.sources.get(&source.0).map(|s| s.looping)
    }

    pub fn source_relative(&self, source: SourceHandle) -> Option<bool> {
        self.sources.get(&source.0).map(|s| s.relative)
    }

    pub fn source_position(&self, source: SourceHandle) -> Option<Vec3> {
        self.sources.get(&source.0).map(|s| s.position)
    }

    pub fn source_air_absorption(&self, source: SourceHandle) -> Option<f32> {
        self.sources.get(&source.0).map(|s| s.air_absorption)
    }

    pub fn source_effect_send(&self, source: SourceHandle) -> Option<bool> {
        self.sources.get(&source.0).map(|s| s.effect_send)
    }

    pub fn queued(&self, source: SourceHandle) -> Vec<BufferHandle> {
        self.sources
            .get(&source.0)
            .map(|s| s.queue.iter().copied().collect())
            .unwrap_or_default()
    }

    pub fn buffer_frames(&self, buffer: BufferHandle) -> Option<usize> {
        self.buffers.get(&buffer.0).map(PcmBuffer::frames)
    }

    pub fn listener(&self) -> ListenerPose {
        self.listener
    }

    pub fn speed_of_sound(&self) -> f32 {
        self.speed_of_sound
    }

    pub fn reverb(&self) -> Option<ReverbParams> {
        self.reverb.as_ref().map(|r| r.params)
    }

    /// Sources currently in the playing state.
    pub fn playing_sources(&self) -> Vec<SourceHandle> {
        let mut playing: Vec<SourceHandle> = self
            .sources
            .iter()
            .filter(|(_, s)| s.state == SourceState::Playing)
            .map(|(id, _)| SourceHandle(*id))
            .collect();
        playing.sort();
        playing
    }

    /// Mixes every playing source into `out` (interleaved, `channels` wide).
    pub fn render(&mut self, out: &mut [f32]) {
        out.fill(0.0);
        let channels = self.channels as usize;
        let frames = out.len() / channels;
        let out_rate = self.sample_rate.max(1) as f64;
        let listener = self.listener;
        let speed_of_sound = self.speed_of_sound;
        let mut send = vec![0.0f32; if self.reverb.is_some() { frames } else { 0 }];

        let Self {
            sources, buffers, ..
        } = self;
        let empty = PcmBuffer::empty();

        for slot in sources.values_mut() {
            if slot.state != SourceState::Playing {
                continue;
            }
            let mix = SpatialMix::compute(slot, &listener, speed_of_sound);
            let filtered = mix.hf < 0.999;

            for frame in 0..frames {
                if slot.state != SourceState::Playing {
                    break;
                }
                let buffer = slot
                    .queue
                    .get(slot.current)
                    .and_then(|b| buffers.get(&b.0))
                    .unwrap_or(&empty);
                if buffer.frames() == 0 {
                    slot.advance();
                    continue;
                }

                let (raw_l, raw_r) = buffer.frame_at(slot.offset);
                let (mut l, mut r) = if buffer.channels == 1 {
                    (raw_l * mix.left, raw_l * mix.right)
                } else {
                    // Multichannel buffers are not spatialized.
                    let flat = slot.gain;
                    (raw_l * flat, raw_r * flat)
                };

                if filtered {
                    for (ch, x) in [&mut l, &mut r].into_iter().enumerate() {
                        let lp = &mut slot.lowpass[ch];
                        *lp += AIR_LOWPASS * (*x - *lp);
                        *x = *lp + mix.hf * (*x - *lp);
                    }
                }

                let base = frame * channels;
                if channels == 1 {
                    out[base] += 0.5 * (l + r);
                } else {
                    out[base] += l;
                    out[base + 1] += r;
                }
                if slot.effect_send && !send.is_empty() {
                    send[frame] += 0.5 * (l + r);
                }

                let step = slot.pitch.max(0.0) as f64 * buffer.sample_rate as f64 / out_rate
                    * mix.doppler as f64;
                slot.offset += step;
                if slot.offset >= buffer.frames() as f64 {
                    slot.advance();
                }
            }
        }

        if let Some(reverb) = self.reverb.as_mut() {
            for (frame, input) in send.iter().enumerate() {
                let wet = reverb.process(*input);
                let base = frame * channels;
                for ch in 0..channels.min(2) {
                    out[base + ch] += wet;
                }
            }
        }

        self.frames_rendered += frames as u64;
    }

    fn latch(&mut self, message: String) {
        if self.error.is_none() {
            self.error = Some(message);
        }
    }

    fn source_mut(&mut self, source: SourceHandle) -> Option<&mut SourceSlot> {
        if !self.sources.contains_key(&source.0) {
            self.latch(format!("invalid {}", source));
            return None;
        }
        self.sources.get_mut(&source.0)
    }
}

impl AudioBackend for SoftwareBackend {
    fn create_source(&mut self) -> Result<SourceHandle> {
        if self.sources.len() >= self.source_limit {
            return Err(StarSonicError::Backend(format!(
                "source limit of {} reached",
                self.source_limit
            )));
        }
        let id = self.next_source;
        self.next_source += 1;
        self.sources.insert(id, SourceSlot::default());
        Ok(SourceHandle(id))
    }

    fn delete_source(&mut self, source: SourceHandle) {
        if self.sources.remove(&source.0).is_none() {
            self.latch(format!("invalid {}", source));
        }
    }

    fn create_buffer(&mut self) -> Result<BufferHandle> {
        let id = self.next_buffer;
        self.next_buffer += 1;
        self.buffers.insert(id, PcmBuffer::empty());
        Ok(BufferHandle(id))
    }

    fn delete_buffer(&mut self, buffer: BufferHandle) {
        let in_use = self.sources.values().any(|s| s.queue.contains(&buffer));
        if in_use {
            self.latch(format!("{} is still queued", buffer));
        } else if self.buffers.remove(&buffer.0).is_none() {
            self.latch(format!("invalid {}", buffer));
        }
    }

    fn buffer_data(&mut self, buffer: BufferHandle, samples: &[f32], channels: u16, sample_rate: u32) {
        if channels == 0 || sample_rate == 0 {
            self.latch(format!("invalid format for {}", buffer));
            return;
        }
        match self.buffers.get_mut(&buffer.0) {
            Some(pcm) => {
                *pcm = PcmBuffer {
                    samples: Arc::from(samples),
                    channels,
                    sample_rate,
                };
            }
            None => self.latch(format!("invalid {}", buffer)),
        }
    }

    fn attach_buffer(&mut self, source: SourceHandle, buffer: Option<BufferHandle>) {
        if let Some(b) = buffer {
            if !self.buffers.contains_key(&b.0) {
                self.latch(format!("invalid {}", b));
                return;
            }
        }
        let Some(state) = self.sources.get(&source.0).map(|s| s.state) else {
            self.latch(format!("invalid {}", source));
            return;
        };
        if matches!(state, SourceState::Playing | SourceState::Paused) {
            self.latch(format!("buffer change on active {}", source));
            return;
        }
        if let Some(slot) = self.source_mut(source) {
            slot.queue.clear();
            slot.queue.extend(buffer);
            slot.rewind();
        }
    }

    fn queue_buffer(&mut self, source: SourceHandle, buffer: BufferHandle) {
        if !self.buffers.contains_key(&buffer.0) {
            self.latch(format!("invalid {}", buffer));
            return;
        }
        if let Some(slot) = self.source_mut(source) {
            slot.queue.push_back(buffer);
        }
    }

    fn unqueue_processed(&mut self, source: SourceHandle) -> Option<BufferHandle> {
        let slot = self.source_mut(source)?;
        if slot.processed() == 0 {
            return None;
        }
        let buffer = slot.queue.pop_front();
        if slot.state != SourceState::Stopped {
            slot.current = slot.current.saturating_sub(1);
        } else {
            slot.current = slot.queue.len();
        }
        buffer
    }

    fn buffers_processed(&self, source: SourceHandle) -> usize {
        self.sources.get(&source.0).map_or(0, SourceSlot::processed)
    }

    fn buffers_queued(&self, source: SourceHandle) -> usize {
        self.sources.get(&source.0).map_or(0, |s| s.queue.len())
    }

    fn play(&mut self, source: SourceHandle) {
        if let Some(slot) = self.source_mut(source) {
            match slot.state {
                SourceState::Playing => {}
                SourceState::Paused => slot.state = SourceState::Playing,
                SourceState::Initial | SourceState::Stopped => {
                    slot.rewind();
                    slot.state = if slot.queue.is_empty() {
                        SourceState::Stopped
                    } else {
                        SourceState::Playing
                    };
                }
            }
        }
    }

    fn pause(&mut self, source: SourceHandle) {
        if let Some(slot) = self.source_mut(source) {
            if slot.state == SourceState::Playing {
                slot.state = SourceState::Paused;
            }
        }
    }

    fn stop(&mut self, source: SourceHandle) {
        if let Some(slot) = self.source_mut(source) {
            if slot.state != SourceState::Initial {
                slot.state = SourceState::Stopped;
                slot.current = slot.queue.len();
                slot.offset = 0.0;
            }
        }
    }

    fn source_state(&self, source: SourceHandle) -> SourceState {
        self.sources
            .get(&source.0)
            .map_or(SourceState::Stopped, |s| s.state)
    }

    fn set_gain(&mut self, source: SourceHandle, gain: f32) {
        if let Some(slot) = self.source_mut(source) {
            slot.gain = gain.max(0.0);
        }
    }

    fn set_pitch(&mut self, source: SourceHandle, pitch: f32) {
        if let Some(slot) = self.source_mut(source) {
            slot.pitch = pitch;
        }
    }

    fn set_position(&mut self, source: SourceHandle, position: Vec3) {
        if let Some(slot) = self.source_mut(source) {
            slot.position = position;
        }
    }

    fn set_velocity(&mut self, source: SourceHandle, velocity: Vec3) {
        if let Some(slot) = self.source_mut(source) {
            slot.velocity = velocity;
        }
    }

    fn set_relative(&mut self, source: SourceHandle, relative: bool) {
        if let Some(slot) = self.source_mut(source) {
            slot.relative = relative;
        }
    }

    fn set_looping(&mut self, source: SourceHandle, looping: bool) {
        if let Some(slot) = self.source_mut(source) {
            slot.looping = looping;
        }
    }

    fn set_distance(&mut self, source: SourceHandle, defaults: SourceDefaults) {
        if let Some(slot) = self.source_mut(source) {
            slot.distance = defaults;
        }
    }

    fn set_air_absorption(&mut self, source: SourceHandle, factor: f32) {
        if let Some(slot) = self.source_mut(source) {
            slot.air_absorption = factor.clamp(0.0, 10.0);
        }
    }

    fn set_effect_send(&mut self, source: SourceHandle, enabled: bool) {
        let effects = self.effects;
        if let Some(slot) = self.source_mut(source) {
            slot.effect_send = enabled && effects;
        }
    }

    fn set_listener(&mut self, pose: &ListenerPose) {
        self.listener = *pose;
    }

    fn set_speed_of_sound(&mut self, speed: f32) {
        if speed > 0.0 {
            self.speed_of_sound = speed;
        } else {
            self.latch(format!("invalid speed of sound {}", speed));
        }
    }

    fn set_reverb(&mut self, reverb: Option<ReverbParams>) {
        match reverb {
            Some(_) if !self.effects => self.latch("effects are not supported".to_string()),
            Some(params) => self.reverb = Some(Reverb::new(params, self.sample_rate)),
            None => self.reverb = None,
        }
    }

    fn supports_effects(&self) -> bool {
        self.effects
    }

    fn take_error(&mut self) -> Option<String> {
        self.error.take()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn backend_with_tone(frames: usize, channels: u16) -> (SoftwareBackend, SourceHandle, BufferHandle) {
        let mut backend = SoftwareBackend::new(48000, 2);
        let source = backend.create_source().unwrap();
        let buffer = backend.create_buffer().unwrap();
        let samples = vec![0.5; frames * channels as usize];
        backend.buffer_data(buffer, &samples, channels, 48000);
        (backend, source, buffer)
    }

    #[test]
    fn test_static_buffer_plays_to_completion() {
        let (mut backend, source, buffer) = backend_with_tone(100, 1);
        backend.attach_buffer(source, Some(buffer));
        backend.set_relative(source, true);
        backend.play(source);
        assert_eq!(backend.source_state(source), SourceState::Playing);

        let mut out = vec![0.0; 2 * 64];
        backend.render(&mut out);
        assert!(out[0] > 0.0 && out[1] > 0.0);
        assert_eq!(backend.source_state(source), SourceState::Playing);

        backend.render(&mut out);
        assert_eq!(backend.source_state(source), SourceState::Stopped);
        assert_eq!(backend.buffers_processed(source), 1);
        assert!(backend.take_error().is_none());
    }

    #[test]
    fn test_looping_never_finishes() {
        let (mut backend, source, buffer) = backend_with_tone(10, 1);
        backend.attach_buffer(source, Some(buffer));
        backend.set_looping(source, true);
        backend.play(source);
        let mut out = vec![0.0; 2 * 256];
        backend.render(&mut out);
        assert_eq!(backend.source_state(source), SourceState::Playing);
        assert_eq!(backend.buffers_processed(source), 0);
    }

    #[test]
    fn test_queue_rotation() {
        let (mut backend, source, first) = backend_with_tone(32, 2);
        let second = backend.create_buffer().unwrap();
        backend.buffer_data(second, &[0.25; 64], 2, 48000);
        backend.queue_buffer(source, first);
        backend.queue_buffer(source, second);
        backend.play(source);

        let mut out = vec![0.0; 2 * 40];
        backend.render(&mut out);
        assert_eq!(backend.buffers_processed(source), 1);
        assert_eq!(backend.unqueue_processed(source), Some(first));
        assert_eq!(backend.buffers_queued(source), 1);
        assert_eq!(backend.unqueue_processed(source), None);

        backend.queue_buffer(source, first);
        backend.render(&mut out);
        assert_eq!(backend.buffers_processed(source), 1);
        assert_eq!(backend.source_state(source), SourceState::Playing);
    }

    #[test]
    fn test_pause_resume_and_stop() {
        let (mut backend, source, buffer) = backend_with_tone(1000, 1);
        backend.attach_buffer(source, Some(buffer));
        backend.play(source);
        backend.pause(source);
        assert_eq!(backend.source_state(source), SourceState::Paused);

        let mut out = vec![0.0; 2 * 16];
        backend.render(&mut out);
        assert!(out.iter().all(|s| *s == 0.0));

        backend.play(source);
        assert_eq!(backend.source_state(source), SourceState::Playing);
        backend.stop(source);
        assert_eq!(backend.source_state(source), SourceState::Stopped);
        assert_eq!(backend.buffers_processed(source), 1);
    }

    #[test]
    fn test_detach_keeps_stopped_state() {
        let (mut backend, source, buffer) = backend_with_tone(1000, 1);
        backend.attach_buffer(source, Some(buffer));
        assert_eq!(backend.source_state(source), SourceState::Initial);
        backend.play(source);

        backend.attach_buffer(source, None);
        assert!(backend.take_error().unwrap().contains("active"));
        assert_eq!(backend.buffers_queued(source), 1);

        backend.stop(source);
        backend.attach_buffer(source, None);
        assert!(backend.take_error().is_none());
        assert_eq!(backend.source_state(source), SourceState::Stopped);
        assert_eq!(backend.buffers_queued(source), 0);
    }

    #[test]
    fn test_invalid_handle_latches_error() {
        let mut backend = SoftwareBackend::new(48000, 2);
        backend.set_gain(SourceHandle(99), 1.0);
        backend.play(SourceHandle(42));
        let err = backend.take_error().unwrap();
        assert!(err.contains("source#99"));
        assert!(backend.take_error().is_none());
    }

    #[test]
    fn test_source_limit() {
        let mut backend = SoftwareBackend::new(48000, 2).with_source_limit(2);
        assert!(backend.create_source().is_ok());
        assert!(backend.create_source().is_ok());
        assert!(matches!(
            backend.create_source(),
            Err(StarSonicError::Backend(_))
        ));
    }

    #[test]
    fn test_pan_follows_listener_right() {
        let (mut backend, source, buffer) = backend_with_tone(1000, 1);
        backend.attach_buffer(source, Some(buffer));
        // Listener faces +X, so +Y is to the left and -Y to the right.
        backend.set_position(source, Vec3::new(0.0, -100.0, 0.0));
        backend.play(source);
        let mut out = vec![0.0; 2 * 8];
        backend.render(&mut out);
        assert!(out[1] > out[0]);
    }

    #[test]
    fn test_reverb_requires_effects() {
        let mut backend = SoftwareBackend::new(48000, 2).without_effects();
        backend.set_reverb(Some(ReverbParams::default()));
        assert!(backend.reverb().is_none());
        assert!(backend.take_error().is_some());

        let mut backend = SoftwareBackend::new(48000, 2);
        backend.set_reverb(Some(ReverbParams::default()));
        assert_eq!(backend.reverb(), Some(ReverbParams::default()));
        backend.set_reverb(None);
        assert!(backend.reverb().is_none());
    }
}
