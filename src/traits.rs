// Copyright (c) 2024 Mike Tsao

//! The traits that define how sounds, filters, and 3D customizations plug into
//! the engine.

use crate::{
    elements::FilterParams,
    orchestration::{BusInstance, SourceSettings, Voice3dData},
};

/// Quick import of all important traits.
pub mod prelude {
    pub use super::{
        AudioAttenuator, AudioCollider, AudioSource, AudioSourceInstance, Filter, FilterInstance,
        HasSettings,
    };
}

/// Anything that can be played. A source is a factory for
/// [AudioSourceInstance]s, one per voice, plus the configuration every new
/// voice starts with.
pub trait AudioSource: core::fmt::Debug + Send + Sync {
    /// Makes a fresh instance positioned at the start of the sound.
    fn create_instance(&self) -> Box<dyn AudioSourceInstance>;

    /// The configuration copied into each new voice.
    fn settings(&self) -> &SourceSettings;

    #[allow(missing_docs)]
    fn settings_mut(&mut self) -> &mut SourceSettings;
}

/// The playing state of one sound. The engine owns each instance exclusively
/// through the voice that plays it.
pub trait AudioSourceInstance: core::fmt::Debug + Send {
    /// Writes up to `samples` frames of planar audio into `buffer`, with
    /// channel `c` starting at `c * stride`. Returns how many frames were
    /// written. Anything not written is treated as silence.
    fn get_audio(&mut self, buffer: &mut [f32], samples: usize, stride: usize) -> usize;

    /// True once the instance has nothing more to say.
    fn has_ended(&self) -> bool;

    /// Goes back to the start of the sound. Returns false if the instance
    /// can't do that.
    fn rewind(&mut self) -> bool {
        false
    }

    /// Jumps directly to `seconds`. Returns false if the instance has no fast
    /// way to do it, in which case the engine rewinds and discards audio
    /// until it reaches the requested position.
    #[allow(unused_variables)]
    fn seek(&mut self, seconds: f64) -> bool {
        false
    }

    /// A numeric diagnostic identified by `key`. The meaning of each key is up
    /// to the instance.
    #[allow(unused_variables)]
    fn info(&self, key: u32) -> f32 {
        0.0
    }

    /// Instances that are sub-mixes return themselves here so the mixer can
    /// fill them before reading from them.
    fn as_bus_mut(&mut self) -> Option<&mut BusInstance> {
        None
    }
}

/// A kind of audio processing that can be attached to a source, a bus, or the
/// main output.
pub trait Filter: core::fmt::Debug + Send + Sync {
    /// Makes the per-voice state for this filter.
    fn create_instance(&self) -> Box<dyn FilterInstance>;
}

/// The stateful half of a [Filter].
pub trait FilterInstance: core::fmt::Debug + Send {
    /// Processes `samples` frames of planar audio in place. `time` is the
    /// stream time of the voice (or of the engine, for global filters).
    ///
    /// The default advances the parameter faders and then calls
    /// [FilterInstance::filter_channel()] for each channel.
    fn filter(
        &mut self,
        buffer: &mut [f32],
        samples: usize,
        stride: usize,
        channels: usize,
        sample_rate: f32,
        time: f64,
    ) {
        self.params_mut().update(time);
        for (channel, chunk) in buffer.chunks_mut(stride).take(channels).enumerate() {
            let len = samples.min(chunk.len());
            self.filter_channel(&mut chunk[..len], sample_rate, time, channel, channels);
        }
    }

    /// Processes one channel in place.
    #[allow(unused_variables)]
    fn filter_channel(
        &mut self,
        buffer: &mut [f32],
        sample_rate: f32,
        time: f64,
        channel: usize,
        channels: usize,
    ) {
    }

    #[allow(missing_docs)]
    fn params(&self) -> &FilterParams;
    #[allow(missing_docs)]
    fn params_mut(&mut self) -> &mut FilterParams;

    /// Reads parameter `id`.
    fn filter_parameter(&self, id: usize) -> f32 {
        self.params().get(id)
    }

    /// Sets parameter `id` now.
    fn set_filter_parameter(&mut self, id: usize, value: f32) {
        self.params_mut().set(id, value);
    }

    /// Ramps parameter `id` to `to` over `duration` seconds starting at
    /// `now`.
    fn fade_filter_parameter(&mut self, id: usize, to: f32, duration: f64, now: f64) {
        self.params_mut().fade(id, to, duration, now);
    }

    /// Oscillates parameter `id` between `from` and `to`.
    fn oscillate_filter_parameter(&mut self, id: usize, from: f32, to: f32, period: f64, now: f64) {
        self.params_mut().oscillate(id, from, to, period, now);
    }
}

/// Custom 3D volume, for example occlusion by level geometry. The result
/// replaces the volume the 3D pass would otherwise start from.
pub trait AudioCollider: core::fmt::Debug + Send + Sync {
    /// Returns the volume for a voice given its current 3D state.
    fn collide(&self, data: &Voice3dData, user_data: i32) -> f32;
}

/// A custom distance-attenuation curve that takes the place of the built-in
/// [AttenuationModel](crate::elements::AttenuationModel)s.
pub trait AudioAttenuator: core::fmt::Debug + Send + Sync {
    /// Gain at `distance`.
    fn attenuate(&self, distance: f32, min_distance: f32, max_distance: f32, rolloff: f32) -> f32;
}

/// Settings structs implement this so that a composed settings struct can
/// tell when any of its parts needs saving.
pub trait HasSettings {
    /// Whether the current state of this struct has been saved to disk.
    fn has_been_saved(&self) -> bool;
    /// Call this whenever the struct changes.
    fn needs_save(&mut self);
    /// Call this after a load() or a save().
    fn mark_clean(&mut self);
}
