// Copyright (c) 2024 Mike Tsao

use super::{voice::Voice, Voice3dData};
use crate::{prelude::*, types::MAX_VOICE_CAPACITY};

/// The fixed-capacity voice table. A voice's slot index is the low part of
/// its [Handle], and its play index (a creation counter) is the generation
/// that makes stale handles stop resolving.
///
/// The 3D mirror holds each slot's spatial state outside the voice so the 3D
/// pass can snapshot it cheaply. Its indices match the slots exactly.
#[derive(Debug)]
pub(crate) struct VoiceRepository {
    slots: Vec<Option<Voice>>,
    spatial: Vec<Voice3dData>,
    /// One past the highest slot that might be occupied. Scans stop here.
    highest: usize,
    play_index: u32,
}
impl VoiceRepository {
    pub(crate) fn new(capacity: usize) -> Self {
        let capacity = capacity.clamp(1, MAX_VOICE_CAPACITY);
        Self {
            slots: (0..capacity).map(|_| None).collect(),
            spatial: vec![Voice3dData::default(); capacity],
            highest: 0,
            play_index: 0,
        }
    }

    pub(crate) fn capacity(&self) -> usize {
        self.slots.len()
    }

    pub(crate) fn highest(&self) -> usize {
        self.highest
    }

    pub(crate) fn get(&self, slot: usize) -> Option<&Voice> {
        self.slots.get(slot).and_then(Option::as_ref)
    }

    pub(crate) fn get_mut(&mut self, slot: usize) -> Option<&mut Voice> {
        self.slots.get_mut(slot).and_then(Option::as_mut)
    }

    /// Both halves of a slot at once.
    pub(crate) fn get_with_spatial_mut(
        &mut self,
        slot: usize,
    ) -> Option<(&mut Voice, &mut Voice3dData)> {
        let voice = self.slots.get_mut(slot)?.as_mut()?;
        Some((voice, &mut self.spatial[slot]))
    }

    pub(crate) fn spatial(&self, slot: usize) -> Option<&Voice3dData> {
        self.spatial.get(slot)
    }

    pub(crate) fn spatial_mut(&mut self, slot: usize) -> Option<&mut Voice3dData> {
        self.spatial.get_mut(slot)
    }

    /// The slot `handle` refers to, if that voice is still alive. Group
    /// handles don't resolve here.
    pub(crate) fn resolve(&self, handle: Handle) -> Option<usize> {
        let slot = handle.slot()?;
        let voice = self.get(slot)?;
        (voice.state.play_index == handle.generation()).then_some(slot)
    }

    /// The handle of whatever is in `slot` right now.
    pub(crate) fn handle_of(&self, slot: usize) -> Handle {
        self.get(slot)
            .map(|v| Handle::for_voice(slot, v.state.play_index))
            .unwrap_or_default()
    }

    /// Issues the next play index. Indices use 20 bits and skip the all-ones
    /// value, which would look like a group handle.
    pub(crate) fn next_play_index(&mut self) -> u32 {
        let index = self.play_index;
        self.play_index += 1;
        if self.play_index >= Handle::GENERATION_MASK {
            self.play_index = 0;
        }
        index
    }

    /// Picks the slot for a new voice: the first empty slot if there is one,
    /// or else the unprotected voice with the oldest play index. The caller
    /// must stop whatever is in the returned slot.
    ///
    /// If every voice is protected, the oldest protected voice goes instead.
    pub(crate) fn find_free_slot(&mut self) -> usize {
        if self.highest > 0 && self.slots[self.highest - 1].is_none() {
            self.highest -= 1;
        }
        let mut oldest: Option<(usize, u32)> = None;
        let mut oldest_protected: Option<(usize, u32)> = None;
        for (slot, occupant) in self.slots.iter().enumerate() {
            let Some(voice) = occupant else {
                if slot + 1 > self.highest {
                    self.highest = slot + 1;
                }
                return slot;
            };
            let candidate = if voice.state.flags.protected {
                &mut oldest_protected
            } else {
                &mut oldest
            };
            if candidate.map_or(true, |(_, index)| voice.state.play_index < index) {
                *candidate = Some((slot, voice.state.play_index));
            }
        }
        match (oldest, oldest_protected) {
            (Some((slot, _)), _) => {
                log::debug!("evicting voice in slot {slot} to make room");
                slot
            }
            (None, Some((slot, _))) => {
                log::warn!("every voice is protected; evicting protected voice in slot {slot}");
                slot
            }
            (None, None) => 0,
        }
    }

    /// Puts a voice into an empty slot and resets the slot's 3D mirror.
    pub(crate) fn insert(&mut self, slot: usize, voice: Voice, spatial: Voice3dData) {
        debug_assert!(self.slots[slot].is_none());
        self.slots[slot] = Some(voice);
        self.spatial[slot] = spatial;
        if slot + 1 > self.highest {
            self.highest = slot + 1;
        }
    }

    /// Empties `slot`, returning what was there.
    pub(crate) fn take(&mut self, slot: usize) -> Option<Voice> {
        let voice = self.slots.get_mut(slot)?.take();
        if voice.is_some() {
            // Drop shared collider/attenuator references along with the voice.
            self.spatial[slot] = Voice3dData::default();
        }
        voice
    }

    /// Occupied slots and their voices, in slot order.
    pub(crate) fn iter(&self) -> impl Iterator<Item = (usize, &Voice)> {
        self.slots[..self.highest]
            .iter()
            .enumerate()
            .filter_map(|(slot, v)| v.as_ref().map(|v| (slot, v)))
    }

    pub(crate) fn count(&self) -> usize {
        self.iter().count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orchestration::{voice::VoiceState, SourceSettings};

    #[derive(Debug)]
    struct Silence;
    impl AudioSourceInstance for Silence {
        fn get_audio(&mut self, _: &mut [f32], _: usize, _: usize) -> usize {
            0
        }
        fn has_ended(&self) -> bool {
            false
        }
    }

    fn voice(repo: &mut VoiceRepository, protected: bool) -> Voice {
        let settings = SourceSettings::default();
        let mut state = VoiceState::new(&settings, repo.next_play_index(), Handle::NONE);
        state.flags.protected = protected;
        Voice {
            instance: Box::new(Silence),
            state,
            filters: Default::default(),
        }
    }

    fn fill(repo: &mut VoiceRepository, protected: bool) -> Handle {
        let slot = repo.find_free_slot();
        repo.take(slot);
        let v = voice(repo, protected);
        repo.insert(slot, v, Voice3dData::default());
        repo.handle_of(slot)
    }

    #[test]
    fn handles_resolve_until_slot_is_reused() {
        let mut repo = VoiceRepository::new(2);
        let a = fill(&mut repo, false);
        let b = fill(&mut repo, false);
        assert_eq!(repo.resolve(a), Some(0));
        assert_eq!(repo.resolve(b), Some(1));
        assert_eq!(repo.resolve(repo.handle_of(0)), Some(0));

        let c = fill(&mut repo, false);
        assert_eq!(repo.resolve(a), None, "the oldest voice should be evicted");
        assert_eq!(repo.resolve(c), Some(0));
        assert_eq!(repo.resolve(b), Some(1));
        assert_eq!(repo.count(), 2);
    }

    #[test]
    fn protected_voices_are_skipped_unless_all_are_protected() {
        let mut repo = VoiceRepository::new(3);
        let protected = fill(&mut repo, true);
        let b = fill(&mut repo, false);
        let c = fill(&mut repo, false);
        let d = fill(&mut repo, false);
        assert!(repo.resolve(protected).is_some());
        assert!(repo.resolve(b).is_none());
        assert!(repo.resolve(c).is_some());
        assert!(repo.resolve(d).is_some());

        let mut repo = VoiceRepository::new(2);
        let p1 = fill(&mut repo, true);
        let p2 = fill(&mut repo, true);
        let e = fill(&mut repo, false);
        assert!(repo.resolve(p1).is_none(), "the oldest protected voice goes last");
        assert!(repo.resolve(p2).is_some());
        assert!(repo.resolve(e).is_some());
    }

    #[test]
    fn highest_shrinks_lazily() {
        let mut repo = VoiceRepository::new(4);
        fill(&mut repo, false);
        fill(&mut repo, false);
        assert_eq!(repo.highest(), 2);
        repo.take(1);
        assert_eq!(repo.find_free_slot(), 1);
        assert_eq!(repo.highest(), 2, "reusing the top slot should keep it counted");
    }

    #[test]
    fn play_index_skips_group_space() {
        let mut repo = VoiceRepository::new(1);
        repo.play_index = Handle::GENERATION_MASK - 1;
        assert_eq!(repo.next_play_index(), Handle::GENERATION_MASK - 1);
        assert_eq!(repo.next_play_index(), 0);
    }
}
