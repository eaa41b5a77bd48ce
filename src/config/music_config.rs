use std::time::Duration;

/// Tuning for the music streaming worker.
#[derive(Debug, Clone)]
pub struct MusicConfig {
    /// Interleaved samples decoded into each of the two stream buffers
    pub buffer_samples: usize,
    /// Duration of a fade-in started by `play`
    pub fade_in: Duration,
    /// Duration of a fade-out started by `stop`
    pub fade_out: Duration,
    /// How long shutdown waits for the worker to reach DEAD
    pub kill_timeout: Duration,
    /// How long a control call waits for the worker to acknowledge it
    pub command_timeout: Duration,
    /// Sleep between worker iterations while streaming
    pub worker_poll: Duration,
    /// Added to the track's replaygain before the scale is computed
    pub preamp_db: f32,
}

impl Default for MusicConfig {
    fn default() -> Self {
        Self {
            buffer_samples: 16384,
            fade_in: Duration::from_millis(2000),
            fade_out: Duration::from_millis(1000),
            kill_timeout: Duration::from_secs(3),
            command_timeout: Duration::from_secs(5),
            worker_poll: Duration::from_millis(5),
            preamp_db: 0.0,
        }
    }
}

impl MusicConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn buffer_samples(mut self, samples: usize) -> Self {
        self.buffer_samples = samples;
        self
    }

    pub fn fade_in(mut self, duration: Duration) -> Self {
        self.fade_in = duration;
        self
    }

    pub fn fade_out(mut self, duration: Duration) -> Self {
        self.fade_out = duration;
        self
    }

    pub fn kill_timeout(mut self, timeout: Duration) -> Self {
        self.kill_timeout = timeout;
        self
    }

    pub fn command_timeout(mut self, timeout: Duration) -> Self {
        self.command_timeout = timeout;
        self
    }

    pub fn worker_poll(mut self, poll: Duration) -> Self {
        self.worker_poll = poll;
        self
    }

    pub fn preamp_db(mut self, preamp: f32) -> Self {
        self.preamp_db = preamp;
        self
    }
}
