// Copyright (c) 2024 Mike Tsao

//! Fixed sizes that shape the engine's buffers and tables.

/// Frames processed per mixer tick, and the size of each resample block.
pub const SAMPLE_GRANULARITY: usize = 512;

/// The most channels a voice or output format can have.
pub const MAX_CHANNELS: usize = 8;

/// Filter slots available to each voice, each bus, and the main output.
pub const FILTERS_PER_STREAM: usize = 8;

/// Default voice-table capacity.
pub const VOICE_COUNT: usize = 1024;

/// The hard upper bound on voice-table capacity, set by the 12-bit slot field
/// of a [Handle](super::Handle).
pub const MAX_VOICE_CAPACITY: usize = 4095;

/// Default number of voices actually mixed per tick.
pub const DEFAULT_MAX_ACTIVE_VOICES: usize = 16;

/// Overall volume below which a voice counts as inaudible.
pub const INAUDIBLE_THRESHOLD: f32 = 0.001;

/// The stricter threshold used when a 3D voice is first placed.
pub const PLAY_3D_INAUDIBLE_THRESHOLD: f32 = 0.01;

/// Clocked playback never delays a voice by more frames than this.
pub const MAX_CLOCKED_DELAY_SAMPLES: usize = 2048;

/// Samples kept for waveform visualization.
pub const VISUALIZATION_WINDOW: usize = 256;

/// Entries a [Queue](crate::orchestration::Queue) can hold.
pub const QUEUE_CAPACITY: usize = 32;

/// Fractional bits of the resampler's fixed-point playhead.
pub const FIXPOINT_FRAC_BITS: u32 = 16;
/// One whole source sample in playhead units.
pub const FIXPOINT_FRAC_MUL: u32 = 1 << FIXPOINT_FRAC_BITS;
/// Selects the fractional part of a playhead position.
pub const FIXPOINT_FRAC_MASK: u32 = FIXPOINT_FRAC_MUL - 1;
