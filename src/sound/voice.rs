use crate::backend::SourceHandle;
use crate::math::Vec3;
use crate::sound::SoundId;
use std::fmt;

/// Identifier of a play request. Starts at 1 and is never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VoiceId(pub(crate) u32);

impl VoiceId {
    pub fn get(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for VoiceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "voice#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum VoiceState {
    Playing,
    Stopped,
    /// Never had a source; dropped on the next reclaim pass
    Destroy,
}

#[derive(Debug, Clone)]
pub(crate) struct Voice {
    pub id: VoiceId,
    pub state: VoiceState,
    pub source: Option<SourceHandle>,
    pub sound: SoundId,
    pub positional: bool,
    pub position: Vec3,
    pub velocity: Vec3,
}

/// What the reclaim pass needs from a voice without holding the voice lock.
#[derive(Debug, Clone, Copy)]
pub(crate) struct VoiceSnapshot {
    pub slot: u32,
    pub id: VoiceId,
    pub source: Option<SourceHandle>,
    pub positional: bool,
    pub position: Vec3,
    pub velocity: Vec3,
}

struct Slot {
    voice: Voice,
    prev: Option<u32>,
    next: Option<u32>,
    active: bool,
}

/// Arena of voices threaded onto two intrusive chains.
///
/// Active voices form a doubly linked chain in play order; retired slots sit on
/// a singly linked free chain (through `next`) and are reused before the arena
/// grows.
pub(crate) struct VoiceRegistry {
    slots: Vec<Slot>,
    active_head: Option<u32>,
    active_tail: Option<u32>,
    free_head: Option<u32>,
    active_len: usize,
    next_id: u32,
}

impl VoiceRegistry {
    pub fn new() -> Self {
        Self {
            slots: Vec::new(),
            active_head: None,
            active_tail: None,
            free_head: None,
            active_len: 0,
            next_id: 1,
        }
    }

    /// Record a voice whose source is already playing and append it to the active chain.
    pub fn insert(
        &mut self,
        sound: SoundId,
        source: Option<SourceHandle>,
        positional: bool,
        position: Vec3,
        velocity: Vec3,
    ) -> VoiceId {
        let id = VoiceId(self.next_id);
        self.next_id += 1;
        let voice = Voice {
            id,
            state: VoiceState::Playing,
            source,
            sound,
            positional,
            position,
            velocity,
        };

        let index = match self.free_head {
            Some(index) => {
                let slot = &mut self.slots[index as usize];
                self.free_head = slot.next;
                slot.voice = voice;
                index
            }
            None => {
                self.slots.push(Slot {
                    voice,
                    prev: None,
                    next: None,
                    active: false,
                });
                (self.slots.len() - 1) as u32
            }
        };

        let slot = &mut self.slots[index as usize];
        slot.active = true;
        slot.prev = self.active_tail;
        slot.next = None;
        match self.active_tail {
            Some(tail) => self.slots[tail as usize].next = Some(index),
            None => self.active_head = Some(index),
        }
        self.active_tail = Some(index);
        self.active_len += 1;
        id
    }

    fn find(&self, id: VoiceId) -> Option<u32> {
        let mut cursor = self.active_head;
        while let Some(index) = cursor {
            let slot = &self.slots[index as usize];
            if slot.voice.id == id {
                return Some(index);
            }
            cursor = slot.next;
        }
        None
    }

    pub fn get(&self, id: VoiceId) -> Option<&Voice> {
        self.find(id).map(|index| &self.slots[index as usize].voice)
    }

    /// Overwrite position and velocity; applied on the next reclaim pass.
    pub fn set_motion(&mut self, id: VoiceId, position: Vec3, velocity: Vec3) -> bool {
        match self.find(id) {
            Some(index) => {
                let voice = &mut self.slots[index as usize].voice;
                voice.position = position;
                voice.velocity = velocity;
                true
            }
            None => false,
        }
    }

    /// Active voices in play order.
    pub fn iter(&self) -> impl Iterator<Item = &Voice> + '_ {
        let mut cursor = self.active_head;
        std::iter::from_fn(move || {
            let index = cursor?;
            let slot = &self.slots[index as usize];
            cursor = slot.next;
            Some(&slot.voice)
        })
    }

    pub fn snapshot(&self) -> Vec<VoiceSnapshot> {
        let mut out = Vec::with_capacity(self.active_len);
        let mut cursor = self.active_head;
        while let Some(index) = cursor {
            let slot = &self.slots[index as usize];
            let voice = &slot.voice;
            out.push(VoiceSnapshot {
                slot: index,
                id: voice.id,
                source: voice.source,
                positional: voice.positional,
                position: voice.position,
                velocity: voice.velocity,
            });
            cursor = slot.next;
        }
        out
    }

    /// Mark the voice in `slot` finished and move it to the free chain.
    ///
    /// Returns false if the slot no longer holds the active voice `id`.
    pub fn retire(&mut self, slot: u32, id: VoiceId, state: VoiceState) -> bool {
        let Some(entry) = self.slots.get(slot as usize) else {
            return false;
        };
        if !entry.active || entry.voice.id != id {
            return false;
        }
        let (prev, next) = (entry.prev, entry.next);

        match prev {
            Some(p) => self.slots[p as usize].next = next,
            None => self.active_head = next,
        }
        match next {
            Some(n) => self.slots[n as usize].prev = prev,
            None => self.active_tail = prev,
        }

        let entry = &mut self.slots[slot as usize];
        entry.voice.state = state;
        entry.voice.source = None;
        entry.active = false;
        entry.prev = None;
        entry.next = self.free_head;
        self.free_head = Some(slot);
        self.active_len -= 1;
        true
    }

    pub fn active_len(&self) -> usize {
        self.active_len
    }

    /// Sources currently owned by active voices.
    pub fn owned_sources(&self) -> usize {
        self.iter().filter(|v| v.source.is_some()).count()
    }

    /// Slots ever allocated, active or free.
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn insert(registry: &mut VoiceRegistry, source: u32) -> VoiceId {
        registry.insert(
            SoundId(0),
            Some(SourceHandle(source)),
            false,
            Vec3::ZERO,
            Vec3::ZERO,
        )
    }

    fn retire(registry: &mut VoiceRegistry, id: VoiceId) -> bool {
        let slot = registry
            .snapshot()
            .into_iter()
            .find(|s| s.id == id)
            .map(|s| s.slot)
            .unwrap();
        registry.retire(slot, id, VoiceState::Stopped)
    }

    #[test]
    fn test_ids_increase_and_order_is_kept() {
        let mut registry = VoiceRegistry::new();
        let ids: Vec<VoiceId> = (1..=3).map(|s| insert(&mut registry, s)).collect();
        assert_eq!(ids, vec![VoiceId(1), VoiceId(2), VoiceId(3)]);
        let order: Vec<VoiceId> = registry.iter().map(|v| v.id).collect();
        assert_eq!(order, ids);
    }

    #[test]
    fn test_retire_middle_and_reuse_slot() {
        let mut registry = VoiceRegistry::new();
        let a = insert(&mut registry, 1);
        let b = insert(&mut registry, 2);
        let c = insert(&mut registry, 3);

        assert!(retire(&mut registry, b));
        assert_eq!(registry.active_len(), 2);
        assert!(registry.get(b).is_none());
        let order: Vec<VoiceId> = registry.iter().map(|v| v.id).collect();
        assert_eq!(order, vec![a, c]);

        let d = insert(&mut registry, 4);
        assert_eq!(d, VoiceId(4));
        assert_eq!(registry.capacity(), 3);
        let order: Vec<VoiceId> = registry.iter().map(|v| v.id).collect();
        assert_eq!(order, vec![a, c, d]);
    }

    #[test]
    fn test_retire_head_and_tail() {
        let mut registry = VoiceRegistry::new();
        let a = insert(&mut registry, 1);
        let b = insert(&mut registry, 2);
        assert!(retire(&mut registry, a));
        assert!(retire(&mut registry, b));
        assert_eq!(registry.active_len(), 0);
        assert_eq!(registry.iter().count(), 0);

        let c = insert(&mut registry, 3);
        assert_eq!(registry.iter().map(|v| v.id).collect::<Vec<_>>(), vec![c]);
        assert_eq!(registry.capacity(), 2);
    }

    #[test]
    fn test_stale_handles() {
        let mut registry = VoiceRegistry::new();
        let a = insert(&mut registry, 1);
        let slot = registry.snapshot()[0].slot;
        assert!(registry.retire(slot, a, VoiceState::Stopped));
        assert!(!registry.retire(slot, a, VoiceState::Stopped));

        let b = insert(&mut registry, 2);
        // The slot now belongs to `b`; the old id must not touch it.
        assert!(!registry.retire(slot, a, VoiceState::Stopped));
        assert!(!registry.set_motion(a, Vec3::ONE, Vec3::ZERO));
        assert!(registry.set_motion(b, Vec3::ONE, Vec3::ZERO));
        assert_eq!(registry.get(b).unwrap().position, Vec3::ONE);
    }
}
