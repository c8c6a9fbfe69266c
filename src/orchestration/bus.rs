// Copyright (c) 2024 Mike Tsao

//! Sub-mixes. A [Bus] is a source whose voice plays whatever other voices are
//! routed into it, so its output can be filtered, panned, and positioned as a
//! unit.

use super::{engine_core::RESAMPLE_BUFFER_SIZE, Engine, PlayOptions, SourceSettings};
use crate::{
    elements::{Resampler, Visualization},
    error::{Error, Result},
    prelude::*,
    types::VISUALIZATION_WINDOW,
};
use delegate::delegate;
use parking_lot::Mutex;
use std::sync::Arc;

/// State a [Bus] shares with its playing instance.
#[derive(Debug, Default)]
pub(crate) struct BusShared {
    resampler: Resampler,
    visualization_enabled: bool,
    visualization: Visualization,
}

/// A mixing target for other voices. Play the bus like any other source, then
/// play sounds through it with [Bus::play()] and friends. A bus can have only
/// one voice at a time; playing it again replaces the old voice and drops
/// everything that was routed to it.
#[derive(Debug)]
pub struct Bus {
    settings: SourceSettings,
    shared: Arc<Mutex<BusShared>>,
}
impl Default for Bus {
    fn default() -> Self {
        let mut settings = SourceSettings::default();
        let flags = settings.flags_mut();
        flags.single_instance = true;
        flags.protected = true;
        flags.inaudible_tick = true;
        if let Err(e) = settings.set_format(SampleRate::DEFAULT_SAMPLE_RATE as f32, 2) {
            log::warn!("couldn't set bus format: {e}");
        }
        Self {
            settings,
            shared: Default::default(),
        }
    }
}
impl AudioSource for Bus {
    fn create_instance(&self) -> Box<dyn AudioSourceInstance> {
        Box::new(BusInstance::new(
            self.settings.channels(),
            Arc::clone(&self.shared),
        ))
    }

    fn settings(&self) -> &SourceSettings {
        &self.settings
    }

    fn settings_mut(&mut self) -> &mut SourceSettings {
        &mut self.settings
    }
}
impl Bus {
    delegate! {
        to self.settings {
            /// Installs `filter` in slot `id` of the bus's filter chain. Takes
            /// effect the next time the bus is played.
            pub fn set_filter(&mut self, id: usize, filter: Option<Arc<dyn Filter>>) -> Result<()>;
            #[allow(missing_docs)]
            pub fn channels(&self) -> usize;
        }
    }

    /// Sets how many channels the bus mixes to. Takes effect the next time
    /// the bus is played.
    pub fn set_channels(&mut self, channels: usize) -> Result<()> {
        if !matches!(channels, 1 | 2 | 4 | 6 | 8) {
            return Err(Error::invalid(format!(
                "a bus can't have {channels} channels"
            )));
        }
        let rate = self.settings.base_sample_rate();
        self.settings.set_format(rate, channels)
    }

    /// The handle of the bus's voice, or [Handle::NONE] if it isn't playing.
    pub fn handle(&self, engine: &Engine) -> Handle {
        engine.find_source_handle(self.settings.uid())
    }

    fn routed(&self, engine: &Engine, options: &PlayOptions) -> Option<PlayOptions> {
        let bus = self.handle(engine);
        if bus.is_none() {
            log::debug!("bus isn't playing, so nothing can play through it");
            return None;
        }
        Some(PlayOptions {
            bus,
            ..options.clone()
        })
    }

    /// Plays `source` through this bus. Returns [Handle::NONE] if the bus
    /// itself isn't playing.
    pub fn play(&self, engine: &Engine, source: &dyn AudioSource, options: &PlayOptions) -> Handle {
        self.routed(engine, options)
            .map_or(Handle::NONE, |o| engine.play(source, &o))
    }

    #[allow(missing_docs)]
    pub fn play_clocked(
        &self,
        engine: &Engine,
        sound_time: f64,
        source: &dyn AudioSource,
        options: &PlayOptions,
    ) -> Handle {
        self.routed(engine, options)
            .map_or(Handle::NONE, |o| engine.play_clocked(sound_time, source, &o))
    }

    #[allow(missing_docs)]
    pub fn play_3d(
        &self,
        engine: &Engine,
        source: &dyn AudioSource,
        position: Vec3,
        velocity: Vec3,
        options: &PlayOptions,
    ) -> Handle {
        self.routed(engine, options)
            .map_or(Handle::NONE, |o| engine.play_3d(source, position, velocity, &o))
    }

    #[allow(missing_docs)]
    pub fn play_3d_clocked(
        &self,
        engine: &Engine,
        sound_time: f64,
        source: &dyn AudioSource,
        position: Vec3,
        velocity: Vec3,
        options: &PlayOptions,
    ) -> Handle {
        self.routed(engine, options).map_or(Handle::NONE, |o| {
            engine.play_3d_clocked(sound_time, source, position, velocity, &o)
        })
    }

    /// Moves an already playing voice (or every voice in a group) onto this
    /// bus.
    pub fn annex_sound(&self, engine: &Engine, voice: Handle) {
        let bus = self.handle(engine);
        if bus.is_none() {
            return;
        }
        engine.lock().for_each_voice(voice, |core, slot| {
            if let Some(v) = core.voices.get_mut(slot) {
                v.state.bus_handle = bus;
            }
        });
    }

    /// How many of the voices mixed on the last tick were routed here.
    pub fn active_voice_count(&self, engine: &Engine) -> usize {
        let bus = self.handle(engine);
        if bus.is_none() {
            return 0;
        }
        let core = engine.lock();
        core.active
            .iter()
            .filter(|slot| {
                core.voices
                    .get(**slot)
                    .is_some_and(|v| v.state.bus_handle == bus)
            })
            .count()
    }

    #[allow(missing_docs)]
    pub fn resampler(&self) -> Resampler {
        self.shared.lock().resampler
    }

    /// How voices are resampled into this bus. Takes effect immediately.
    pub fn set_resampler(&self, resampler: Resampler) {
        self.shared.lock().resampler = resampler;
    }

    /// Turns waveform and peak capture on or off.
    pub fn set_visualization_enabled(&mut self, enabled: bool) {
        self.settings.set_visualization_enabled(enabled);
        let mut shared = self.shared.lock();
        shared.visualization_enabled = enabled;
        if !enabled {
            shared.visualization.clear();
        }
    }

    /// The last [VISUALIZATION_WINDOW] samples the bus produced,
    /// summed across channels.
    pub fn wave(&self) -> [f32; VISUALIZATION_WINDOW] {
        *self.shared.lock().visualization.wave()
    }

    /// Peak level of `channel` on the bus's last block.
    pub fn approximate_volume(&self, channel: usize) -> f32 {
        self.shared.lock().visualization.approximate_volume(channel)
    }

    /// The spectrum of [Bus::wave()], computed on each call.
    pub fn calc_fft(&self, engine: &Engine) -> [f32; VISUALIZATION_WINDOW] {
        let visualization = self.shared.lock().visualization.clone();
        visualization.calc_fft(engine.backend_sample_rate())
    }

    pub(crate) fn shared(&self) -> &Arc<Mutex<BusShared>> {
        &self.shared
    }
}

impl BusShared {
    pub(crate) fn peaks(&self) -> [f32; MAX_CHANNELS] {
        *self.visualization.peaks()
    }

    #[cfg(test)]
    pub(crate) fn capture_for_test(&mut self, buffer: &[f32], channels: usize) {
        let frames = buffer.len() / channels;
        self.visualization.capture(buffer, channels, frames, frames);
    }
}

/// The playing half of a [Bus]. The mixer fills its accumulator with the
/// voices routed to the bus just before reading from it.
#[derive(Debug)]
pub struct BusInstance {
    channels: usize,
    shared: Arc<Mutex<BusShared>>,
    accumulator: Vec<f32>,
    scratch: Vec<f32>,
}
impl BusInstance {
    fn new(channels: usize, shared: Arc<Mutex<BusShared>>) -> Self {
        Self {
            channels,
            shared,
            accumulator: vec![0.0; RESAMPLE_BUFFER_SIZE],
            scratch: vec![0.0; RESAMPLE_BUFFER_SIZE],
        }
    }

    pub(crate) fn channels(&self) -> usize {
        self.channels
    }

    pub(crate) fn resampler(&self) -> Resampler {
        self.shared.lock().resampler
    }

    /// Lends out the mix buffers while the mixer fills them.
    pub(crate) fn take_buffers(&mut self) -> (Vec<f32>, Vec<f32>) {
        (
            core::mem::take(&mut self.accumulator),
            core::mem::take(&mut self.scratch),
        )
    }

    pub(crate) fn restore_buffers(&mut self, accumulator: Vec<f32>, scratch: Vec<f32>) {
        self.accumulator = accumulator;
        self.scratch = scratch;
    }
}
impl AudioSourceInstance for BusInstance {
    fn get_audio(&mut self, buffer: &mut [f32], samples: usize, stride: usize) -> usize {
        if self.accumulator.is_empty() {
            return 0;
        }
        let samples = samples.min(SAMPLE_GRANULARITY);
        for c in 0..self.channels {
            let from = &self.accumulator[c * SAMPLE_GRANULARITY..][..samples];
            if let Some(to) = buffer.get_mut(c * stride..c * stride + samples) {
                to.copy_from_slice(from);
            }
        }
        let mut shared = self.shared.lock();
        if shared.visualization_enabled {
            shared
                .visualization
                .capture(&self.accumulator, self.channels, SAMPLE_GRANULARITY, samples);
        }
        samples
    }

    fn has_ended(&self) -> bool {
        false
    }

    fn as_bus_mut(&mut self) -> Option<&mut BusInstance> {
        Some(self)
    }
}
impl Drop for BusInstance {
    // A stopped bus is silent, so stale peaks shouldn't keep anyone ducking.
    fn drop(&mut self) {
        self.shared.lock().visualization.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bus_defaults() {
        let bus = Bus::default();
        let flags = bus.settings().flags();
        assert!(flags.protected);
        assert!(flags.inaudible_tick);
        assert!(flags.single_instance);
        assert_eq!(bus.channels(), 2);
    }

    #[test]
    fn channel_counts_are_validated() {
        let mut bus = Bus::default();
        assert!(bus.set_channels(3).is_err());
        assert_eq!(bus.channels(), 2);
        assert!(bus.set_channels(6).is_ok());
        assert_eq!(bus.channels(), 6);
    }

    #[test]
    fn instance_hands_over_its_accumulator() {
        let mut bus = Bus::default();
        bus.set_visualization_enabled(true);
        let mut instance = BusInstance::new(2, Arc::clone(bus.shared()));
        let (mut accumulator, scratch) = instance.take_buffers();
        accumulator[..4].fill(0.5);
        accumulator[SAMPLE_GRANULARITY..SAMPLE_GRANULARITY + 4].fill(-0.25);
        instance.restore_buffers(accumulator, scratch);

        let mut out = vec![1.0; 8];
        assert_eq!(instance.get_audio(&mut out, 4, 4), 4);
        assert_eq!(out, [0.5, 0.5, 0.5, 0.5, -0.25, -0.25, -0.25, -0.25]);
        assert!(!instance.has_ended());
        assert_eq!(bus.approximate_volume(0), 0.5);
        assert_eq!(bus.approximate_volume(1), 0.25);

        drop(instance);
        assert_eq!(bus.approximate_volume(0), 0.0);
    }
}
