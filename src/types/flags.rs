// Copyright (c) 2024 Mike Tsao

//! Behavior switches for sources and for the voices they create.

/// Flags a source hands to every voice it creates.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SourceFlags {
    /// New voices loop.
    pub should_loop: bool,
    /// Playing the source stops any voice it is already playing.
    pub single_instance: bool,
    /// Capture waveform and peak data (meaningful for buses).
    pub visualization_data: bool,
    /// New voices take part in the 3D pass.
    pub process_3d: bool,
    /// 3D positions are relative to the listener instead of the world.
    pub listener_relative: bool,
    /// 3D voices start late by the time sound takes to reach the listener.
    pub distance_delay: bool,
    /// Stop voices as soon as they become inaudible.
    pub inaudible_kill: bool,
    /// Keep advancing voices while they are inaudible.
    pub inaudible_tick: bool,
    /// Don't stop voices when their instance reports the end of the stream.
    pub disable_autostop: bool,
    /// New voices are never evicted. Buses and queues set this.
    pub protected: bool,
}

/// Per-voice state bits.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[allow(missing_docs)]
pub struct VoiceFlags {
    pub looping: bool,
    /// Never chosen for eviction.
    pub protected: bool,
    pub paused: bool,
    pub process_3d: bool,
    pub listener_relative: bool,
    /// Set when the overall volume fell below the audibility threshold.
    pub inaudible: bool,
    pub inaudible_kill: bool,
    pub inaudible_tick: bool,
    pub disable_autostop: bool,
}
impl From<&SourceFlags> for VoiceFlags {
    fn from(value: &SourceFlags) -> Self {
        Self {
            looping: value.should_loop,
            protected: value.protected,
            process_3d: value.process_3d,
            listener_relative: value.listener_relative,
            inaudible_kill: value.inaudible_kill,
            inaudible_tick: value.inaudible_tick,
            disable_autostop: value.disable_autostop,
            ..Default::default()
        }
    }
}
