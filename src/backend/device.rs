use super::SoftwareBackend;
use crate::config::StarSonicDesc;
use crate::error::{Result, StarSonicError};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{FromSample, SizedSample};
use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

/// Plays a [`SoftwareBackend`] through the default output device.
///
/// The device callback only ever `try_lock`s the backend; when the game or
/// music thread holds the backend lock the block is filled with silence.
pub struct AudioOutput {
    stream: Option<cpal::Stream>,
    is_running: Arc<AtomicBool>,
    frames_processed: Arc<AtomicUsize>,
    contended_blocks: Arc<AtomicUsize>,
}

impl AudioOutput {
    /// Open the default output device and start pulling from `backend`.
    ///
    /// # Errors
    ///
    /// Returns `AudioDevice` if there is no output device or the stream cannot
    /// be built, and `AudioFormat` for device sample formats other than f32/i16/u16.
    pub fn start(desc: &StarSonicDesc, backend: Arc<Mutex<SoftwareBackend>>) -> Result<Self> {
        let host = cpal::default_host();
        let device = host.default_output_device().ok_or_else(|| {
            StarSonicError::AudioDevice("No default output device available".into())
        })?;

        let config = cpal::StreamConfig {
            channels: desc.channels,
            sample_rate: cpal::SampleRate(desc.sample_rate),
            buffer_size: cpal::BufferSize::Fixed(desc.block_size as u32),
        };

        let default_config = device.default_output_config().map_err(|e| {
            StarSonicError::AudioDevice(format!("Failed to get default config: {}", e))
        })?;

        let mut output = Self {
            stream: None,
            is_running: Arc::new(AtomicBool::new(true)),
            frames_processed: Arc::new(AtomicUsize::new(0)),
            contended_blocks: Arc::new(AtomicUsize::new(0)),
        };

        let stream = match default_config.sample_format() {
            cpal::SampleFormat::F32 => output.create_stream::<f32>(&device, &config, backend)?,
            cpal::SampleFormat::I16 => output.create_stream::<i16>(&device, &config, backend)?,
            cpal::SampleFormat::U16 => output.create_stream::<u16>(&device, &config, backend)?,
            other => {
                return Err(StarSonicError::AudioFormat(format!(
                    "Unsupported sample format: {:?}",
                    other
                )));
            }
        };

        stream.play().map_err(|e| {
            StarSonicError::AudioDevice(format!("Failed to start stream: {}", e))
        })?;
        log::info!(
            "Audio output started: {} Hz, {} channels",
            desc.sample_rate,
            desc.channels
        );

        output.stream = Some(stream);
        Ok(output)
    }

    pub fn stop(&mut self) {
        if let Some(stream) = self.stream.take() {
            self.is_running.store(false, Ordering::Relaxed);
            drop(stream);
            log::info!("Audio output stopped");
        }
    }

    pub fn is_running(&self) -> bool {
        self.is_running.load(Ordering::Relaxed)
    }

    pub fn frames_processed(&self) -> usize {
        self.frames_processed.load(Ordering::Relaxed)
    }

    /// Blocks rendered as silence because the backend lock was busy.
    pub fn contended_blocks(&self) -> usize {
        self.contended_blocks.load(Ordering::Relaxed)
    }

    fn create_stream<T>(
        &self,
        device: &cpal::Device,
        config: &cpal::StreamConfig,
        backend: Arc<Mutex<SoftwareBackend>>,
    ) -> Result<cpal::Stream>
    where
        T: SizedSample + FromSample<f32>,
    {
        let channels = config.channels.max(1) as usize;
        let is_running = self.is_running.clone();
        let frames_processed = self.frames_processed.clone();
        let contended_blocks = self.contended_blocks.clone();
        let mut scratch: Vec<f32> = Vec::new();

        let stream = device
            .build_output_stream(
                config,
                move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
                    scratch.clear();
                    scratch.resize(data.len(), 0.0);

                    if is_running.load(Ordering::Relaxed) {
                        match backend.try_lock() {
                            Some(mut guard) => guard.render(&mut scratch),
                            None => {
                                contended_blocks.fetch_add(1, Ordering::Relaxed);
                            }
                        }
                    }

                    for (sample, value) in data.iter_mut().zip(scratch.iter()) {
                        *sample = T::from_sample(value.clamp(-1.0, 1.0));
                    }
                    frames_processed.fetch_add(data.len() / channels, Ordering::Relaxed);
                },
                move |err| {
                    log::error!("Audio stream error: {}", err);
                },
                None,
            )
            .map_err(|e| StarSonicError::AudioDevice(format!("Failed to build stream: {}", e)))?;

        Ok(stream)
    }
}

impl Drop for AudioOutput {
    fn drop(&mut self) {
        self.stop();
    }
}
