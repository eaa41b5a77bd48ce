use crate::backend::{AudioBackend, SourceHandle, check_backend};
use crate::config::SourceDefaults;
use crate::error::{Result, StarSonicError};

/// The fixed set of backend sources and which of them are free.
///
/// `general` holds every source not reserved by a group; the free stack is a
/// subset of it. Sources handed out by [`SourcePool::reserve`] leave both.
pub(crate) struct SourcePool {
    free: Vec<SourceHandle>,
    general: Vec<SourceHandle>,
    reserved: usize,
}

impl SourcePool {
    /// Allocate up to `count` sources, stopping early when the backend runs out.
    pub fn allocate(
        backend: &mut dyn AudioBackend,
        count: usize,
        defaults: SourceDefaults,
    ) -> Result<Self> {
        let mut general = Vec::with_capacity(count);
        for _ in 0..count {
            match backend.create_source() {
                Ok(source) => {
                    backend.set_distance(source, defaults);
                    general.push(source);
                }
                Err(e) => {
                    log::warn!(
                        "Only {} of {} sources could be allocated: {}",
                        general.len(),
                        count,
                        e
                    );
                    break;
                }
            }
        }
        check_backend(backend, "source allocation");

        if general.is_empty() {
            return Err(StarSonicError::Backend("no sources available".into()));
        }
        log::info!("Allocated {} sources", general.len());

        // Popping from the end hands out the lowest handles first.
        let free = general.iter().rev().copied().collect();
        Ok(Self {
            free,
            general,
            reserved: 0,
        })
    }

    /// Pop a free source. Never blocks.
    pub fn acquire(&mut self) -> Option<SourceHandle> {
        self.free.pop()
    }

    /// Return a source. The caller must already have detached its buffer.
    pub fn release(&mut self, source: SourceHandle) {
        debug_assert!(!self.free.contains(&source));
        self.free.push(source);
    }

    /// Take `count` free sources out of general use, or none at all.
    pub fn reserve(&mut self, count: usize) -> Option<Vec<SourceHandle>> {
        let mut taken = Vec::with_capacity(count);
        for _ in 0..count {
            match self.free.pop() {
                Some(source) => taken.push(source),
                None => {
                    while let Some(source) = taken.pop() {
                        self.free.push(source);
                    }
                    return None;
                }
            }
        }
        self.general.retain(|s| !taken.contains(s));
        self.reserved += taken.len();
        Some(taken)
    }

    /// Sources that environment, pitch and pause-all apply to.
    pub fn general(&self) -> &[SourceHandle] {
        &self.general
    }

    pub fn free_count(&self) -> usize {
        self.free.len()
    }

    pub fn total(&self) -> usize {
        self.general.len() + self.reserved
    }
}
