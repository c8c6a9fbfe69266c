// Copyright (c) 2024 Mike Tsao

use crate::{
    error::{Error, Result},
    prelude::*,
};
use rustc_hash::FxHashMap;

/// Named collections of voice handles that bulk operations fan out over.
#[derive(Debug, Default)]
pub(crate) struct VoiceGroups {
    groups: FxHashMap<usize, Vec<Handle>>,
}
impl VoiceGroups {
    /// The most groups that can exist at once, set by the 12-bit index in a
    /// group handle.
    const MAX_GROUPS: usize = Handle::MAX_SLOTS + 1;

    pub(crate) fn create(&mut self) -> Result<Handle> {
        let index = (0..Self::MAX_GROUPS)
            .find(|i| !self.groups.contains_key(i))
            .ok_or_else(|| Error::invalid("no voice group ids left"))?;
        self.groups.insert(index, Vec::default());
        Ok(Handle::for_group(index))
    }

    pub(crate) fn destroy(&mut self, group: Handle) -> Result<()> {
        let index = Self::index_of(group)?;
        self.groups
            .remove(&index)
            .map(|_| ())
            .ok_or_else(|| Error::invalid(format!("voice group {group} doesn't exist")))
    }

    pub(crate) fn members(&self, group: Handle) -> Option<&[Handle]> {
        self.groups
            .get(&group.group_index()?)
            .map(|members| members.as_slice())
    }

    pub(crate) fn members_mut(&mut self, group: Handle) -> Result<&mut Vec<Handle>> {
        let index = Self::index_of(group)?;
        self.groups
            .get_mut(&index)
            .ok_or_else(|| Error::invalid(format!("voice group {group} doesn't exist")))
    }

    fn index_of(group: Handle) -> Result<usize> {
        group
            .group_index()
            .ok_or_else(|| Error::invalid(format!("{group} is not a voice group")))
    }
}
