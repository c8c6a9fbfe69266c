// Copyright (c) 2024 Mike Tsao

//! The public face of the mixer: starting voices, global state, the listener,
//! voice groups, and the entry point the audio driver calls.

use super::{
    engine_core::{EngineCore, FilterSlots},
    spatializer::Voice3dData,
};
use crate::{
    elements::{Clipper, Resampler},
    error::{Error, Result},
    prelude::*,
    types::{MAX_CLOCKED_DELAY_SAMPLES, PLAY_3D_INAUDIBLE_THRESHOLD, VISUALIZATION_WINDOW},
    util::EngineSettings,
};
use derive_builder::Builder;
use parking_lot::{Mutex, MutexGuard};
use std::sync::Arc;

/// How a new voice starts.
#[derive(Clone, Builder, Debug, Default, PartialEq)]
#[builder(default)]
pub struct PlayOptions {
    /// The voice's volume. `None` uses the source's default volume.
    #[builder(setter(strip_option))]
    pub volume: Option<f32>,
    /// -1.0 is hard left, 1.0 hard right.
    pub pan: f32,
    /// Start paused.
    pub paused: bool,
    /// The bus to mix into. [Handle::NONE] means the main output.
    pub bus: Handle,
}

/// A real-time audio mixer.
///
/// Control threads call into an `Engine` (usually shared through an [Arc]) to
/// start, change, and stop voices. The audio driver calls [Engine::mix()]
/// periodically to get finished audio. Every call takes one short lock, and
/// the 3D math runs outside it.
#[derive(Debug)]
pub struct Engine {
    pub(crate) core: Mutex<EngineCore>,
    spatial_snapshot: Mutex<Vec<(usize, Voice3dData)>>,
}
impl Default for Engine {
    fn default() -> Self {
        Self::new_with(EngineSettings::default())
    }
}
impl Engine {
    #[allow(missing_docs)]
    pub fn new_with(settings: EngineSettings) -> Self {
        let core = EngineCore::new(&settings);
        log::info!(
            "voice engine: {} Hz, {} channels, {} voices ({} active), {} resampler",
            core.sample_rate,
            core.channels,
            core.voices.capacity(),
            core.max_active,
            core.resampler
        );
        let capacity = core.voices.capacity();
        Self {
            core: Mutex::new(core),
            spatial_snapshot: Mutex::new(Vec::with_capacity(capacity)),
        }
    }

    pub(crate) fn lock(&self) -> MutexGuard<EngineCore> {
        self.core.lock()
    }

    fn prepare(source: &dyn AudioSource) -> (Box<dyn AudioSourceInstance>, FilterSlots) {
        let instance = source.create_instance();
        let filters = source.settings().filters();
        let filters = core::array::from_fn(|i| filters[i].as_ref().map(|f| f.create_instance()));
        (instance, filters)
    }

    /// Starts playing `source` and returns a handle to the new voice. If the
    /// voice table is full, the oldest unprotected voice makes room.
    pub fn play(&self, source: &dyn AudioSource, options: &PlayOptions) -> Handle {
        let (instance, filters) = Self::prepare(source);
        self.lock()
            .play_instance(instance, filters, source.settings(), options)
    }

    /// Like [Engine::play()], but delays the start so that sounds triggered
    /// within one tick keep their relative timing. `sound_time` is on the
    /// caller's clock, in seconds.
    pub fn play_clocked(
        &self,
        sound_time: f64,
        source: &dyn AudioSource,
        options: &PlayOptions,
    ) -> Handle {
        let (instance, filters) = Self::prepare(source);
        let mut core = self.lock();
        let paused = PlayOptions {
            paused: true,
            ..options.clone()
        };
        let handle = core.play_instance(instance, filters, source.settings(), &paused);
        let delay = core.clocked_delay(sound_time);
        if let Some(slot) = core.voices.resolve(handle) {
            if let Some(voice) = core.voices.get_mut(slot) {
                voice.state.delay_samples = delay;
            }
            core.set_voice_pause(slot, options.paused);
        }
        handle
    }

    /// Starts a 3D voice at `position` moving at `velocity`. Its gains are
    /// computed before it makes any sound.
    pub fn play_3d(
        &self,
        source: &dyn AudioSource,
        position: Vec3,
        velocity: Vec3,
        options: &PlayOptions,
    ) -> Handle {
        self.start_3d(source, position, velocity, options, None)
    }

    /// The 3D version of [Engine::play_clocked()]. Distance delay, if the
    /// source asks for it, is measured from the origin of `position`.
    pub fn play_3d_clocked(
        &self,
        sound_time: f64,
        source: &dyn AudioSource,
        position: Vec3,
        velocity: Vec3,
        options: &PlayOptions,
    ) -> Handle {
        self.start_3d(source, position, velocity, options, Some(sound_time))
    }

    fn start_3d(
        &self,
        source: &dyn AudioSource,
        position: Vec3,
        velocity: Vec3,
        options: &PlayOptions,
        sound_time: Option<f64>,
    ) -> Handle {
        let (instance, filters) = Self::prepare(source);
        let mut core = self.lock();
        let paused = PlayOptions {
            paused: true,
            ..options.clone()
        };
        let handle = core.play_instance(instance, filters, source.settings(), &paused);
        let Some(slot) = core.voices.resolve(handle) else {
            return handle;
        };
        if let Some((voice, data)) = core.voices.get_with_spatial_mut(slot) {
            voice.state.flags.process_3d = true;
            data.process_3d = true;
            data.position = position;
            data.velocity = velocity;
        }

        let distance_delay = source.settings().flags().distance_delay;
        let delay = match sound_time {
            Some(sound_time) => {
                let mut delay = core.clocked_delay(sound_time);
                if distance_delay {
                    delay += core.samples_for_distance(position.norm());
                }
                delay
            }
            None if distance_delay => {
                core.samples_for_distance(core.distance_to_listener(slot))
            }
            None => 0,
        };

        core.update_3d_voice(slot);
        if let Some(voice) = core.voices.get_mut(slot) {
            voice.state.snap_current_channel_volume();
        }
        core.update_audibility(slot, PLAY_3D_INAUDIBLE_THRESHOLD);
        if let Some(voice) = core.voices.get_mut(slot) {
            voice.state.delay_samples = delay;
            core.set_voice_pause(slot, options.paused);
        }
        handle
    }

    /// Runs the 3D pass: copies 3D voice state under the lock, does the math
    /// without it, and writes the results back. [Engine::mix()] calls this
    /// once per tick.
    pub fn update_3d_audio(&self) {
        let mut snapshot = self.spatial_snapshot.lock();
        let scene = self.lock().snapshot_3d(&mut snapshot);
        if snapshot.is_empty() {
            return;
        }
        for (_, data) in snapshot.iter_mut() {
            data.compute(&scene);
        }
        self.lock().apply_3d(&snapshot);
    }

    /// Fills `out` with interleaved audio in the engine's channel count. Any
    /// length that's a whole number of frames works. This is the call an
    /// audio driver makes from its callback.
    pub fn mix(&self, out: &mut [f32]) {
        let channels = self.backend_channels();
        for chunk in out.chunks_mut(SAMPLE_GRANULARITY * channels) {
            let frames = chunk.len() / channels;
            self.update_3d_audio();
            let mut core = self.lock();
            core.mix_tick(frames);
            for (frame, samples) in chunk.chunks_exact_mut(channels).enumerate() {
                for (channel, sample) in samples.iter_mut().enumerate() {
                    *sample = core.output[channel * SAMPLE_GRANULARITY + frame];
                }
            }
        }
    }

    /// Like [Engine::mix()], but writes planar audio: channel `c` of frame
    /// `i` goes to `out[c * stride + i]`.
    pub fn mix_planar(&self, out: &mut [f32], frames: usize, stride: usize) {
        let channels = self.backend_channels();
        let mut done = 0;
        while done < frames {
            let n = (frames - done).min(SAMPLE_GRANULARITY);
            self.update_3d_audio();
            let mut core = self.lock();
            core.mix_tick(n);
            for channel in 0..channels {
                let from = &core.output[channel * SAMPLE_GRANULARITY..][..n];
                if let Some(to) = out.get_mut(channel * stride + done..channel * stride + done + n) {
                    to.copy_from_slice(from);
                }
            }
            done += n;
        }
    }

    /// The driver's shutdown hook. Stops every voice.
    pub fn deinit(&self) {
        log::info!("voice engine shutting down");
        self.lock().stop_all();
    }

    /// Stops every voice that `source` is playing.
    pub fn stop_audio_source(&self, source: &dyn AudioSource) {
        self.lock().stop_audio_source(source.settings().uid());
    }

    /// How many voices `source` is playing.
    pub fn count_audio_source(&self, source: &dyn AudioSource) -> usize {
        self.lock().count_audio_source(source.settings().uid())
    }

    pub(crate) fn find_source_handle(&self, uid: SourceUid) -> Handle {
        self.lock().find_source_handle(uid)
    }

    #[allow(missing_docs)]
    pub fn stop_all(&self) {
        self.lock().stop_all();
    }

    /// Pauses or resumes every voice.
    pub fn set_pause_all(&self, pause: bool) {
        let mut core = self.lock();
        for slot in 0..core.voices.highest() {
            core.set_voice_pause(slot, pause);
        }
    }

    /// Voices that currently exist, playing or not.
    pub fn voice_count(&self) -> usize {
        self.lock().voices.count()
    }

    /// Voices that were mixed on the last tick.
    pub fn active_voice_count(&self) -> usize {
        let mut core = self.lock();
        if core.active_dirty {
            core.calc_active_voices();
        }
        core.active.len()
    }

    #[allow(missing_docs)]
    pub fn max_active_voice_count(&self) -> usize {
        self.lock().max_active
    }

    /// Changes how many voices get mixed per tick. Not real-time safe: the
    /// resample buffers are reallocated.
    pub fn set_max_active_voice_count(&self, count: usize) -> Result<()> {
        self.lock().set_max_active_voice_count(count)
    }

    /// Seconds of audio the engine has produced.
    pub fn stream_time(&self) -> f64 {
        self.lock().stream_time
    }

    #[allow(missing_docs)]
    pub fn backend_channels(&self) -> usize {
        self.lock().channels
    }

    #[allow(missing_docs)]
    pub fn backend_sample_rate(&self) -> usize {
        self.lock().sample_rate
    }

    #[allow(missing_docs)]
    pub fn global_volume(&self) -> f32 {
        self.lock().global_volume
    }

    /// Sets the main output gain, cancelling any fade or oscillation.
    pub fn set_global_volume(&self, volume: f32) {
        let mut core = self.lock();
        core.global_volume_fader.deactivate();
        core.global_volume = volume;
    }

    /// Ramps the main output gain to `to` over `seconds`.
    pub fn fade_global_volume(&self, to: f32, seconds: f64) {
        let mut core = self.lock();
        let from = core.global_volume;
        if seconds <= 0.0 || to == from {
            core.global_volume_fader.deactivate();
            core.global_volume = to;
            return;
        }
        let now = core.stream_time;
        core.global_volume_fader.set(from, to, seconds, now);
    }

    /// Swings the main output gain between `from` and `to`, once per `period`
    /// seconds.
    pub fn oscillate_global_volume(&self, from: f32, to: f32, period: f64) {
        let mut core = self.lock();
        if period <= 0.0 || to == from {
            core.global_volume_fader.deactivate();
            core.global_volume = to;
            return;
        }
        let now = core.stream_time;
        core.global_volume_fader.set_lfo(from, to, period, now);
    }

    #[allow(missing_docs)]
    pub fn post_clip_scaler(&self) -> f32 {
        self.lock().post_clip_scaler
    }

    #[allow(missing_docs)]
    pub fn set_post_clip_scaler(&self, scaler: f32) {
        self.lock().post_clip_scaler = scaler;
    }

    #[allow(missing_docs)]
    pub fn main_resampler(&self) -> Resampler {
        self.lock().resampler
    }

    #[allow(missing_docs)]
    pub fn set_main_resampler(&self, resampler: Resampler) {
        self.lock().resampler = resampler;
    }

    #[allow(missing_docs)]
    pub fn clipper(&self) -> Clipper {
        self.lock().clipper
    }

    #[allow(missing_docs)]
    pub fn set_clipper(&self, clipper: Clipper) {
        self.lock().clipper = clipper;
    }

    /// Turns waveform and peak capture of the main output on or off.
    pub fn set_visualization_enabled(&self, enabled: bool) {
        let mut core = self.lock();
        core.visualization_enabled = enabled;
        if !enabled {
            core.visualization.clear();
        }
    }

    /// The last [VISUALIZATION_WINDOW] samples of the main output,
    /// summed across channels.
    pub fn wave(&self) -> [f32; VISUALIZATION_WINDOW] {
        *self.lock().visualization.wave()
    }

    /// Peak level of `channel` on the last tick.
    pub fn approximate_volume(&self, channel: usize) -> f32 {
        self.lock().visualization.approximate_volume(channel)
    }

    /// The spectrum of [Engine::wave()]. Computed on each call.
    pub fn calc_fft(&self) -> [f32; VISUALIZATION_WINDOW] {
        let (visualization, sample_rate) = {
            let core = self.lock();
            (core.visualization.clone(), core.sample_rate)
        };
        visualization.calc_fft(sample_rate)
    }

    /// Installs `filter` in slot `id` of the main output's filter chain, or
    /// clears the slot if `filter` is `None`.
    pub fn set_global_filter(&self, id: usize, filter: Option<&Arc<dyn Filter>>) -> Result<()> {
        if id >= FILTERS_PER_STREAM {
            return Err(Error::invalid(format!("filter slot {id} out of range")));
        }
        let instance = filter.map(|f| f.create_instance());
        let old = core::mem::replace(&mut self.lock().global_filters[id], instance);
        drop(old);
        Ok(())
    }

    /// Where the listener is, which way it faces, and how it's moving.
    pub fn set_3d_listener_parameters(&self, position: Vec3, at: Vec3, up: Vec3, velocity: Vec3) {
        let mut core = self.lock();
        let listener = &mut core.spatializer.listener;
        listener.position = position;
        listener.at = at;
        listener.up = up;
        listener.velocity = velocity;
    }

    #[allow(missing_docs)]
    pub fn set_3d_listener_position(&self, position: Vec3) {
        self.lock().spatializer.listener.position = position;
    }

    #[allow(missing_docs)]
    pub fn set_3d_listener_at(&self, at: Vec3) {
        self.lock().spatializer.listener.at = at;
    }

    #[allow(missing_docs)]
    pub fn set_3d_listener_up(&self, up: Vec3) {
        self.lock().spatializer.listener.up = up;
    }

    #[allow(missing_docs)]
    pub fn set_3d_listener_velocity(&self, velocity: Vec3) {
        self.lock().spatializer.listener.velocity = velocity;
    }

    #[allow(missing_docs)]
    pub fn listener(&self) -> super::Listener {
        self.lock().spatializer.listener
    }

    /// Sets the speed of sound used for doppler and distance delay. Must be
    /// positive.
    pub fn set_3d_sound_speed(&self, speed: f32) -> Result<()> {
        if speed <= 0.0 || !speed.is_finite() {
            return Err(Error::invalid(format!(
                "speed of sound must be positive, not {speed}"
            )));
        }
        self.lock().spatializer.sound_speed = speed;
        Ok(())
    }

    #[allow(missing_docs)]
    pub fn sound_speed_3d(&self) -> f32 {
        self.lock().spatializer.sound_speed
    }

    /// Moves the virtual speaker for output `channel`. A speaker at the
    /// origin gets full gain from every direction.
    pub fn set_speaker_position(&self, channel: usize, position: Vec3) -> Result<()> {
        let mut core = self.lock();
        if channel >= core.channels {
            return Err(Error::invalid(format!("no speaker for channel {channel}")));
        }
        core.spatializer.speakers[channel] = position;
        Ok(())
    }

    #[allow(missing_docs)]
    pub fn speaker_position(&self, channel: usize) -> Result<Vec3> {
        let core = self.lock();
        if channel >= core.channels {
            return Err(Error::invalid(format!("no speaker for channel {channel}")));
        }
        Ok(core.spatializer.speakers[channel])
    }

    /// Makes an empty voice group. Operations on the group's handle apply to
    /// every voice in it.
    pub fn create_voice_group(&self) -> Result<Handle> {
        self.lock().groups.create()
    }

    #[allow(missing_docs)]
    pub fn destroy_voice_group(&self, group: Handle) -> Result<()> {
        self.lock().groups.destroy(group)
    }

    /// Adds `voice` to `group`. Members that have stopped since they were
    /// added are dropped first. Groups can't contain groups.
    pub fn add_voice_to_group(&self, group: Handle, voice: Handle) -> Result<()> {
        if voice.is_group() {
            return Err(Error::invalid("voice groups can't contain voice groups"));
        }
        let mut core = self.lock();
        let core = &mut *core;
        let voices = &core.voices;
        let members = core.groups.members_mut(group)?;
        members.retain(|h| voices.resolve(*h).is_some());
        if voices.resolve(voice).is_some() && !members.contains(&voice) {
            members.push(voice);
        }
        Ok(())
    }

    #[allow(missing_docs)]
    pub fn is_voice_group(&self, group: Handle) -> bool {
        self.lock().groups.members(group).is_some()
    }

    /// True if the group has no live members, or doesn't exist.
    pub fn is_voice_group_empty(&self, group: Handle) -> bool {
        let core = self.lock();
        core.groups
            .members(group)
            .map_or(true, |m| m.iter().all(|h| core.voices.resolve(*h).is_none()))
    }
}

impl EngineCore {
    /// Frames to delay a clocked voice so that it starts `sound_time -
    /// reference` seconds into the next tick.
    pub(crate) fn clocked_delay(&mut self, sound_time: f64) -> usize {
        if self.last_clocked_time == 0.0 {
            self.last_clocked_time = sound_time;
        }
        let samples = ((sound_time - self.last_clocked_time) * self.sample_rate as f64).floor();
        if samples < 0.0 || samples > MAX_CLOCKED_DELAY_SAMPLES as f64 {
            0
        } else {
            samples as usize
        }
    }
}
