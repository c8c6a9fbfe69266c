// Copyright (c) 2024 Mike Tsao

//! Generation-checked references to voices and voice groups.

use synonym::Synonym;

/// An opaque reference to a playing voice or to a voice group.
///
/// The low 12 bits hold the voice-table slot plus one (so that zero is never a
/// valid handle), and the next 20 bits hold the play index of the voice that
/// occupied the slot when the handle was minted. A handle whose top 20 bits are
/// all set refers to a voice group instead of a voice.
///
/// Handles are cheap to copy and never dangle: once the voice behind a handle
/// stops, or its slot is reused, the handle simply stops resolving.
#[derive(Synonym)]
pub struct Handle(pub u32);

#[allow(missing_docs)]
impl Handle {
    /// The handle that never refers to anything. As a bus handle, it means
    /// "the main mix."
    pub const NONE: Handle = Handle(0);

    pub(crate) const SLOT_BITS: u32 = 12;
    pub(crate) const SLOT_MASK: u32 = (1 << Self::SLOT_BITS) - 1;
    pub(crate) const GENERATION_MASK: u32 = 0xfffff;
    pub(crate) const GROUP_BITS: u32 = Self::GENERATION_MASK << Self::SLOT_BITS;

    /// The largest slot index a handle can encode.
    pub const MAX_SLOTS: usize = Self::SLOT_MASK as usize;

    pub(crate) fn for_voice(slot: usize, play_index: u32) -> Self {
        debug_assert!(slot < Self::MAX_SLOTS);
        Self(((slot as u32) + 1) | ((play_index & Self::GENERATION_MASK) << Self::SLOT_BITS))
    }

    pub(crate) fn for_group(index: usize) -> Self {
        Self(Self::GROUP_BITS | (index as u32 & Self::SLOT_MASK))
    }

    pub fn is_none(&self) -> bool {
        self.0 == 0
    }

    /// Whether this handle names a voice group rather than a single voice.
    pub fn is_group(&self) -> bool {
        self.0 & Self::GROUP_BITS == Self::GROUP_BITS
    }

    /// The voice-table slot this handle points at, if it is a voice handle.
    /// This says nothing about whether the voice is still alive.
    pub(crate) fn slot(&self) -> Option<usize> {
        if self.is_group() {
            return None;
        }
        match self.0 & Self::SLOT_MASK {
            0 => None,
            slot => Some(slot as usize - 1),
        }
    }

    pub(crate) fn generation(&self) -> u32 {
        self.0 >> Self::SLOT_BITS
    }

    pub(crate) fn group_index(&self) -> Option<usize> {
        if self.is_group() {
            Some((self.0 & Self::SLOT_MASK) as usize)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn voice_handles_encode_slot_and_generation() {
        let h = Handle::for_voice(0, 0);
        assert_eq!(h.0, 1, "slot 0 with play index 0 should encode as 1");
        assert_eq!(h.slot(), Some(0));
        assert_eq!(h.generation(), 0);
        assert!(!h.is_group());

        let h = Handle::for_voice(41, 7);
        assert_eq!(h.slot(), Some(41));
        assert_eq!(h.generation(), 7);

        let h = Handle::for_voice(Handle::MAX_SLOTS - 1, Handle::GENERATION_MASK - 1);
        assert_eq!(h.slot(), Some(Handle::MAX_SLOTS - 1));
        assert!(
            !h.is_group(),
            "the largest legal play index must not collide with the group id space"
        );
    }

    #[test]
    fn generation_wraps_at_twenty_bits() {
        let h = Handle::for_voice(3, Handle::GENERATION_MASK + 5);
        assert_eq!(h.generation(), 4);
    }

    #[test]
    fn none_and_group_handles() {
        assert!(Handle::NONE.is_none());
        assert_eq!(Handle::NONE.slot(), None);
        assert_eq!(Handle::default(), Handle::NONE);

        let g = Handle::for_group(5);
        assert!(g.is_group());
        assert_eq!(g.group_index(), Some(5));
        assert_eq!(g.slot(), None, "group handles never resolve to a slot");
        assert_eq!(Handle::for_voice(5, 1).group_index(), None);
    }
}
