use crate::assets::AssetSource;
use crate::audio_data::{LoadOptions, SoundData, decode_bytes, extension_of};
use crate::backend::{AudioBackend, BufferHandle, SharedBackend, check_backend};
use crate::error::Result;
use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

const SOUND_SUFFIXES: [&str; 2] = [".wav", ".ogg"];

/// Index of a loaded sound.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SoundId(pub(crate) u32);

impl fmt::Display for SoundId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sound#{}", self.0)
    }
}

struct SoundEntry {
    name: String,
    buffer: BufferHandle,
    length: Duration,
}

/// Every sound effect found at startup, each uploaded to one backend buffer.
pub struct SoundRegistry {
    sounds: Vec<SoundEntry>,
    by_name: HashMap<String, usize>,
}

impl SoundRegistry {
    pub(crate) fn empty() -> Self {
        Self {
            sounds: Vec::new(),
            by_name: HashMap::new(),
        }
    }

    /// Scan `prefix` for `.wav`/`.ogg` files and upload each one.
    ///
    /// Files that fail to decode are skipped with a warning. Only a failure to
    /// create backend buffers is returned as an error.
    pub(crate) fn load(
        assets: &dyn AssetSource,
        prefix: &str,
        sample_rate: u32,
        backend: &SharedBackend,
    ) -> Result<Self> {
        let mut registry = Self::empty();
        let files = match assets.list(prefix) {
            Ok(files) => files,
            Err(e) => {
                log::warn!("Unable to list sounds in '{}': {}", prefix, e);
                return Ok(registry);
            }
        };

        for file in files {
            let Some(name) = SOUND_SUFFIXES
                .iter()
                .find_map(|suffix| file.strip_suffix(suffix))
            else {
                continue;
            };
            if registry.by_name.contains_key(name) {
                log::warn!("Duplicate sound '{}' ignored", file);
                continue;
            }

            let path = format!("{}{}", prefix, file);
            let data = match Self::decode(assets, &path, sample_rate) {
                Ok(data) => data,
                Err(e) => {
                    log::warn!("Failed to load sound '{}': {}", path, e);
                    continue;
                }
            };

            let buffer = {
                let mut guard = backend.lock();
                let buffer = guard.create_buffer()?;
                guard.buffer_data(buffer, data.samples(), data.channels(), data.sample_rate());
                check_backend(&mut *guard, "sound upload");
                buffer
            };
            registry.insert(name.to_string(), buffer, data.duration());
        }

        log::info!("Loaded {} sounds from '{}'", registry.len(), prefix);
        Ok(registry)
    }

    fn decode(assets: &dyn AssetSource, path: &str, sample_rate: u32) -> Result<SoundData> {
        let bytes = assets.read(path)?;
        let mut options = LoadOptions::new()
            .convert_to_mono(true)
            .target_sample_rate(sample_rate);
        options.extension = extension_of(path);
        decode_bytes(bytes, &options)
    }

    fn insert(&mut self, name: String, buffer: BufferHandle, length: Duration) {
        log::debug!("Sound '{}' -> {} ({:?})", name, buffer, length);
        self.by_name.insert(name.clone(), self.sounds.len());
        self.sounds.push(SoundEntry {
            name,
            buffer,
            length,
        });
    }

    /// Look a sound up by name (file name without suffix).
    pub fn get(&self, name: &str) -> Option<SoundId> {
        match self.by_name.get(name) {
            Some(index) => Some(SoundId(*index as u32)),
            None => {
                log::warn!("Sound '{}' not loaded", name);
                None
            }
        }
    }

    pub fn name(&self, id: SoundId) -> Option<&str> {
        self.sounds.get(id.0 as usize).map(|s| s.name.as_str())
    }

    pub fn length(&self, id: SoundId) -> Option<Duration> {
        self.sounds.get(id.0 as usize).map(|s| s.length)
    }

    /// Loaded sound names in load order.
    pub fn names(&self) -> impl Iterator<Item = &str> + '_ {
        self.sounds.iter().map(|s| s.name.as_str())
    }

    pub fn len(&self) -> usize {
        self.sounds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sounds.is_empty()
    }

    pub(crate) fn buffer(&self, id: SoundId) -> Option<BufferHandle> {
        self.sounds.get(id.0 as usize).map(|s| s.buffer)
    }

    pub(crate) fn release(&mut self, backend: &mut dyn AudioBackend) {
        for sound in self.sounds.drain(..) {
            backend.delete_buffer(sound.buffer);
        }
        self.by_name.clear();
        check_backend(backend, "sound release");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::MemoryAssets;
    use crate::backend::SoftwareBackend;
    use crate::test_support::tone_wav;
    use parking_lot::Mutex;
    use std::sync::Arc;

    #[test]
    fn test_scan_strips_suffixes_and_skips_junk() {
        let assets = MemoryAssets::new()
            .with("snd/sounds/laser.wav", tone_wav(4800, 48000))
            .with("snd/sounds/explosion.wav", tone_wav(9600, 48000))
            .with("snd/sounds/readme.txt", b"not audio".to_vec())
            .with("snd/sounds/broken.wav", vec![0, 1, 2]);
        let software = Arc::new(Mutex::new(SoftwareBackend::new(48000, 2)));
        let backend: SharedBackend = software.clone();

        let registry = SoundRegistry::load(&assets, "snd/sounds/", 48000, &backend).unwrap();
        assert_eq!(registry.len(), 2);

        let laser = registry.get("laser").unwrap();
        assert_eq!(registry.name(laser), Some("laser"));
        assert_eq!(registry.length(laser), Some(Duration::from_millis(100)));
        let buffer = registry.buffer(laser).unwrap();
        assert_eq!(software.lock().buffer_frames(buffer), Some(4800));

        assert!(registry.get("broken").is_none());
        assert!(registry.get("readme").is_none());
    }

    #[test]
    fn test_missing_directory_gives_empty_registry() {
        let assets = MemoryAssets::new();
        let backend: SharedBackend = Arc::new(Mutex::new(SoftwareBackend::new(48000, 2)));
        let registry = SoundRegistry::load(&assets, "snd/sounds/", 48000, &backend).unwrap();
        assert!(registry.is_empty());
    }
}
