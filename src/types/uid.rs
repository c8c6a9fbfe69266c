// Copyright (c) 2024 Mike Tsao

//! Unique identifiers for audio sources, and a factory that helps ensure they
//! are in fact unique.

use core::sync::atomic::Ordering;
use core::{hash::Hash, marker::PhantomData, sync::atomic::AtomicUsize};
use synonym::Synonym;

/// Identifies an [AudioSource](crate::traits::AudioSource) for the lifetime of
/// the process. Every voice remembers the uid of the source that created it,
/// which is how "stop everything this source is playing" finds its voices.
#[derive(Synonym)]
pub struct SourceUid(pub usize);
impl IsUid for SourceUid {
    fn as_usize(&self) -> usize {
        self.0
    }
}
impl SourceUid {
    /// Mints a uid that no other source in this process has.
    pub fn mint() -> Self {
        SOURCE_UID_FACTORY.mint_next()
    }
}

static SOURCE_UID_FACTORY: UidFactory<SourceUid> = UidFactory::new(1);

/// An optional Uid trait.
pub trait IsUid: Eq + Hash + Clone + From<usize> {
    /// Returns the raw uid.
    fn as_usize(&self) -> usize;
}

/// Generates unique uids.
#[derive(Debug)]
pub struct UidFactory<U: IsUid> {
    next_uid_value: AtomicUsize,
    _phantom: PhantomData<U>,
}
impl<U: IsUid> UidFactory<U> {
    /// Creates a new [UidFactory] starting with the given value.
    pub const fn new(first_uid: usize) -> Self {
        Self {
            next_uid_value: AtomicUsize::new(first_uid),
            _phantom: PhantomData,
        }
    }

    /// Generates the next unique uid.
    pub fn mint_next(&self) -> U {
        let uid_value = self.next_uid_value.fetch_add(1, Ordering::Relaxed);
        U::from(uid_value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uid_factory() {
        let f = UidFactory::<SourceUid>::new(1);

        let uid_1 = f.mint_next();
        let uid_2 = f.mint_next();
        assert_ne!(uid_1, uid_2, "Minted Uids should not repeat");
        assert_eq!(uid_1.as_usize(), 1);

        let mut ids: std::collections::HashSet<SourceUid> = Default::default();
        for _ in 0..64 {
            let uid = f.mint_next();
            assert!(!ids.contains(&uid), "minted uids should be unique");
            ids.insert(uid);
        }
    }

    #[test]
    fn global_source_uids_are_unique() {
        let a = SourceUid::mint();
        let b = SourceUid::mint();
        assert_ne!(a, b);
        assert_ne!(
            a,
            SourceUid::default(),
            "the default uid is reserved for 'no source'"
        );
    }
}
