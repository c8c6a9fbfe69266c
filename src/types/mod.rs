// Copyright (c) 2024 Mike Tsao

//! Common data types used throughout the system.

/// The most commonly used imports.
pub mod prelude {
    pub use super::{
        ChannelVolumes, Handle, SampleRate, SourceFlags, SourceUid, Vec3, VoiceFlags,
        FILTERS_PER_STREAM, MAX_CHANNELS, SAMPLE_GRANULARITY,
    };
}

pub use {
    flags::{SourceFlags, VoiceFlags},
    handle::Handle,
    limits::*,
    numbers::{ChannelVolumes, SampleRate, Vec3},
    uid::{IsUid, SourceUid, UidFactory},
};

mod flags;
mod handle;
mod limits;
mod numbers;
mod uid;
