// Copyright (c) 2024 Mike Tsao

//! Per-voice operations. Every method takes a voice handle or a voice-group
//! handle. Setters on a stale handle do nothing, and getters on one return a
//! default. Getters on a group read its first live member.

use super::{engine_core::EngineCore, Engine};
use crate::{
    elements::AttenuationModel,
    error::{Error, Result},
    prelude::*,
};
use std::sync::Arc;

/// Which of a voice's automatable values a fade or oscillation drives.
#[derive(Clone, Copy, Debug)]
enum Automated {
    Volume,
    Pan,
    Speed,
}

impl Engine {
    /// Stops the voice, or every voice in the group.
    pub fn stop(&self, handle: Handle) {
        self.lock().for_each_voice(handle, |core, slot| core.stop_voice(slot));
    }

    /// True if `handle` still refers to a playing voice or to an existing
    /// voice group.
    pub fn is_valid_voice_handle(&self, handle: Handle) -> bool {
        let core = self.lock();
        core.voices.resolve(handle).is_some() || core.groups.members(handle).is_some()
    }

    #[allow(missing_docs)]
    pub fn set_pause(&self, handle: Handle, pause: bool) {
        self.lock()
            .for_each_voice(handle, |core, slot| core.set_voice_pause(slot, pause));
    }

    #[allow(missing_docs)]
    pub fn pause(&self, handle: Handle) -> bool {
        self.lock()
            .read_voice(handle, false, |v| v.state.flags.paused)
    }

    /// Pauses the voice after `seconds` of its own playback time.
    pub fn schedule_pause(&self, handle: Handle, seconds: f64) {
        if seconds <= 0.0 {
            self.set_pause(handle, true);
            return;
        }
        self.lock().for_each_voice(handle, |core, slot| {
            if let Some(voice) = core.voices.get_mut(slot) {
                let now = voice.state.stream_time;
                voice.state.pause_scheduler.set(1.0, 0.0, seconds, now);
            }
        });
    }

    /// Stops the voice after `seconds` of its own playback time.
    pub fn schedule_stop(&self, handle: Handle, seconds: f64) {
        if seconds <= 0.0 {
            self.stop(handle);
            return;
        }
        self.lock().for_each_voice(handle, |core, slot| {
            if let Some(voice) = core.voices.get_mut(slot) {
                let now = voice.state.stream_time;
                voice.state.stop_scheduler.set(1.0, 0.0, seconds, now);
            }
        });
    }

    /// Sets the voice's volume, cancelling any volume fade.
    pub fn set_volume(&self, handle: Handle, volume: f32) {
        self.lock().for_each_voice(handle, |core, slot| {
            if let Some(voice) = core.voices.get_mut(slot) {
                voice.state.volume_fader.deactivate();
            }
            core.set_voice_volume(slot, volume);
        });
    }

    /// The volume set on the voice, before 3D attenuation.
    pub fn volume(&self, handle: Handle) -> f32 {
        self.lock().read_voice(handle, 0.0, |v| v.state.set_volume)
    }

    /// The volume the mixer uses: the set volume times the 3D volume.
    pub fn overall_volume(&self, handle: Handle) -> f32 {
        self.lock()
            .read_voice(handle, 0.0, |v| v.state.overall_volume)
    }

    /// The gain the voice currently sends to output `channel`, including its
    /// overall volume.
    pub fn channel_volume(&self, handle: Handle, channel: usize) -> f32 {
        if channel >= MAX_CHANNELS {
            return 0.0;
        }
        self.lock().read_voice(handle, 0.0, |v| {
            v.state.channel_volume[channel] * v.state.overall_volume
        })
    }

    /// Sets the voice's pan, cancelling any pan fade.
    pub fn set_pan(&self, handle: Handle, pan: f32) {
        self.lock().for_each_voice(handle, |core, slot| {
            if let Some(voice) = core.voices.get_mut(slot) {
                voice.state.pan_fader.deactivate();
            }
            core.set_voice_pan(slot, pan);
        });
    }

    #[allow(missing_docs)]
    pub fn pan(&self, handle: Handle) -> f32 {
        self.lock().read_voice(handle, 0.0, |v| v.state.pan)
    }

    /// Sets left and right gains directly instead of deriving them from a pan
    /// position. Center channels get the average of the two.
    pub fn set_pan_absolute(&self, handle: Handle, left: f32, right: f32) {
        self.lock().for_each_voice(handle, |core, slot| {
            let channels = core.channels;
            if let Some(voice) = core.voices.get_mut(slot) {
                voice.state.pan_fader.deactivate();
                voice.state.set_pan_absolute(left, right, channels);
            }
        });
    }

    /// Sets the voice's gain for a single output channel.
    pub fn set_channel_volume(&self, handle: Handle, channel: usize, volume: f32) {
        self.lock().for_each_voice(handle, |core, slot| {
            if channel >= core.channels {
                return;
            }
            if let Some(voice) = core.voices.get_mut(slot) {
                voice.state.channel_volume[channel] = volume;
            }
        });
    }

    /// Changes the voice's pitch and speed together. 1.0 is normal. Must be
    /// positive.
    pub fn set_relative_play_speed(&self, handle: Handle, speed: f32) -> Result<()> {
        if speed <= 0.0 || !speed.is_finite() {
            return Err(Error::invalid(format!(
                "relative play speed must be positive, not {speed}"
            )));
        }
        self.lock().for_each_voice(handle, |core, slot| {
            if let Some(voice) = core.voices.get_mut(slot) {
                voice.state.relative_play_speed_fader.deactivate();
            }
            core.set_voice_relative_play_speed(slot, speed);
        });
        Ok(())
    }

    #[allow(missing_docs)]
    pub fn relative_play_speed(&self, handle: Handle) -> f32 {
        self.lock()
            .read_voice(handle, 1.0, |v| v.state.set_relative_play_speed)
    }

    /// The voice's source sample rate, before speed changes.
    pub fn sample_rate(&self, handle: Handle) -> f32 {
        self.lock()
            .read_voice(handle, 0.0, |v| v.state.base_sample_rate)
    }

    /// Changes the rate at which the voice's source samples are played.
    pub fn set_samplerate(&self, handle: Handle, sample_rate: f32) -> Result<()> {
        if sample_rate <= 0.0 || !sample_rate.is_finite() {
            return Err(Error::invalid(format!(
                "sample rate must be positive, not {sample_rate}"
            )));
        }
        self.lock().for_each_voice(handle, |core, slot| {
            if let Some((voice, data)) = core.voices.get_with_spatial_mut(slot) {
                voice.state.base_sample_rate = sample_rate;
                voice.state.update_relative_play_speed(data.doppler_value);
            }
        });
        Ok(())
    }

    #[allow(missing_docs)]
    pub fn looping(&self, handle: Handle) -> bool {
        self.lock()
            .read_voice(handle, false, |v| v.state.flags.looping)
    }

    #[allow(missing_docs)]
    pub fn set_looping(&self, handle: Handle, looping: bool) {
        self.update_voices(handle, |voice| voice.state.flags.looping = looping);
    }

    /// Where looping voices jump back to, in seconds.
    pub fn loop_point(&self, handle: Handle) -> f64 {
        self.lock().read_voice(handle, 0.0, |v| v.state.loop_point)
    }

    #[allow(missing_docs)]
    pub fn set_loop_point(&self, handle: Handle, seconds: f64) {
        self.update_voices(handle, |voice| voice.state.loop_point = seconds);
    }

    /// How many times the voice has looped.
    pub fn loop_count(&self, handle: Handle) -> u32 {
        self.lock().read_voice(handle, 0, |v| v.state.loop_count)
    }

    /// Whether the voice stops once its source runs out.
    pub fn auto_stop(&self, handle: Handle) -> bool {
        self.lock()
            .read_voice(handle, false, |v| !v.state.flags.disable_autostop)
    }

    #[allow(missing_docs)]
    pub fn set_auto_stop(&self, handle: Handle, auto_stop: bool) {
        self.update_voices(handle, |voice| voice.state.flags.disable_autostop = !auto_stop);
    }

    /// Protected voices are never evicted to make room for new ones.
    pub fn set_protect_voice(&self, handle: Handle, protect: bool) {
        self.update_voices(handle, |voice| voice.state.flags.protected = protect);
    }

    #[allow(missing_docs)]
    pub fn is_voice_protected(&self, handle: Handle) -> bool {
        self.lock()
            .read_voice(handle, false, |v| v.state.flags.protected)
    }

    /// What happens when the voice drops below the audibility threshold:
    /// `must_tick` keeps it advancing, `kill` stops it.
    pub fn set_inaudible_behavior(&self, handle: Handle, must_tick: bool, kill: bool) {
        let mut core = self.lock();
        core.for_each_voice(handle, |core, slot| {
            if let Some(voice) = core.voices.get_mut(slot) {
                voice.state.flags.inaudible_tick = must_tick;
                voice.state.flags.inaudible_kill = kill;
                core.active_dirty = true;
            }
        });
    }

    /// Delays the voice's next output by `samples` frames of silence.
    pub fn set_delay_samples(&self, handle: Handle, samples: usize) {
        self.update_voices(handle, |voice| voice.state.delay_samples = samples);
    }

    /// Seconds the voice has been playing, excluding pauses.
    pub fn voice_stream_time(&self, handle: Handle) -> f64 {
        self.lock().read_voice(handle, 0.0, |v| v.state.stream_time)
    }

    /// Position in the source, in seconds, accounting for speed changes.
    pub fn stream_position(&self, handle: Handle) -> f64 {
        self.lock()
            .read_voice(handle, 0.0, |v| v.state.stream_position)
    }

    /// A diagnostic value from the voice's instance.
    pub fn info(&self, handle: Handle, key: u32) -> f32 {
        self.lock().read_voice(handle, 0.0, |v| v.instance.info(key))
    }

    /// Moves the voice to `seconds` into its source. Instances without a
    /// fast seek are rewound and read forward, which can take a while.
    pub fn seek(&self, handle: Handle, seconds: f64) -> Result<()> {
        let mut result = Ok(());
        self.lock().for_each_voice(handle, |core, slot| {
            if let Err(e) = core.seek_voice(slot, seconds) {
                result = Err(e);
            }
        });
        result
    }

    /// Goes back to the start of the voice's source.
    pub fn rewind(&self, handle: Handle) -> Result<()> {
        let mut result = Ok(());
        self.update_voices(handle, |voice| {
            if let Err(e) = voice.rewind() {
                result = Err(e);
            }
        });
        result
    }

    /// Ramps the voice's volume to `to` over `seconds`.
    pub fn fade_volume(&self, handle: Handle, to: f32, seconds: f64) {
        self.automate(handle, Automated::Volume, None, to, seconds, false);
    }

    /// Ramps the voice's pan to `to` over `seconds`.
    pub fn fade_pan(&self, handle: Handle, to: f32, seconds: f64) {
        self.automate(handle, Automated::Pan, None, to, seconds, false);
    }

    /// Ramps the voice's relative play speed to `to` over `seconds`.
    pub fn fade_relative_play_speed(&self, handle: Handle, to: f32, seconds: f64) {
        self.automate(handle, Automated::Speed, None, to, seconds, false);
    }

    /// Swings the voice's volume between `from` and `to`, once per `period`
    /// seconds.
    pub fn oscillate_volume(&self, handle: Handle, from: f32, to: f32, period: f64) {
        self.automate(handle, Automated::Volume, Some(from), to, period, true);
    }

    #[allow(missing_docs)]
    pub fn oscillate_pan(&self, handle: Handle, from: f32, to: f32, period: f64) {
        self.automate(handle, Automated::Pan, Some(from), to, period, true);
    }

    #[allow(missing_docs)]
    pub fn oscillate_relative_play_speed(&self, handle: Handle, from: f32, to: f32, period: f64) {
        self.automate(handle, Automated::Speed, Some(from), to, period, true);
    }

    fn automate(
        &self,
        handle: Handle,
        what: Automated,
        from: Option<f32>,
        to: f32,
        seconds: f64,
        oscillate: bool,
    ) {
        self.lock().for_each_voice(handle, |core, slot| {
            let Some(voice) = core.voices.get_mut(slot) else {
                return;
            };
            let state = &mut voice.state;
            let current = match what {
                Automated::Volume => state.set_volume,
                Automated::Pan => state.pan,
                Automated::Speed => state.set_relative_play_speed,
            };
            let from = from.unwrap_or(current);
            if seconds <= 0.0 || to == from {
                match what {
                    Automated::Volume => {
                        state.volume_fader.deactivate();
                        core.set_voice_volume(slot, to);
                    }
                    Automated::Pan => {
                        state.pan_fader.deactivate();
                        core.set_voice_pan(slot, to);
                    }
                    Automated::Speed => {
                        state.relative_play_speed_fader.deactivate();
                        if to > 0.0 {
                            core.set_voice_relative_play_speed(slot, to);
                        }
                    }
                }
                return;
            }
            let now = state.stream_time;
            let fader = match what {
                Automated::Volume => &mut state.volume_fader,
                Automated::Pan => &mut state.pan_fader,
                Automated::Speed => &mut state.relative_play_speed_fader,
            };
            if oscillate {
                fader.set_lfo(from, to, seconds, now);
            } else {
                fader.set(from, to, seconds, now);
            }
        });
    }

    /// Installs `filter` in slot `id` of each addressed voice's filter chain,
    /// or clears the slot if `filter` is `None`. The new filter instances are
    /// created outside the engine lock.
    pub fn set_voice_filter(
        &self,
        handle: Handle,
        id: usize,
        filter: Option<&Arc<dyn Filter>>,
    ) -> Result<()> {
        if id >= FILTERS_PER_STREAM {
            return Err(Error::invalid(format!("filter slot {id} out of range")));
        }
        let mut count = 0;
        self.lock().for_each_voice(handle, |_, _| count += 1);

        let mut fresh: Vec<_> = (0..count)
            .map(|_| filter.map(|f| f.create_instance()))
            .collect();
        let mut retired = Vec::with_capacity(count);
        self.lock().for_each_voice(handle, |core, slot| {
            if let Some(voice) = core.voices.get_mut(slot) {
                let instance = match fresh.pop() {
                    Some(instance) => instance,
                    None => filter.map(|f| f.create_instance()),
                };
                retired.push(core::mem::replace(&mut voice.filters[id], instance));
            }
        });
        drop(retired);
        Ok(())
    }

    /// Sets parameter `attribute` of the filter in slot `filter_id`.
    /// [Handle::NONE] addresses the main output's filters.
    pub fn set_filter_parameter(&self, handle: Handle, filter_id: usize, attribute: usize, value: f32) {
        self.with_filter(handle, filter_id, |filter, _| {
            filter.set_filter_parameter(attribute, value)
        });
    }

    /// Reads parameter `attribute` of the filter in slot `filter_id`, or 0.0
    /// if there's no such filter.
    pub fn filter_parameter(&self, handle: Handle, filter_id: usize, attribute: usize) -> f32 {
        if filter_id >= FILTERS_PER_STREAM {
            return 0.0;
        }
        let core = self.lock();
        if handle.is_none() {
            return core.global_filters[filter_id]
                .as_ref()
                .map_or(0.0, |f| f.filter_parameter(attribute));
        }
        core.read_voice(handle, 0.0, |v| {
            v.filters[filter_id]
                .as_ref()
                .map_or(0.0, |f| f.filter_parameter(attribute))
        })
    }

    /// Ramps a filter parameter to `to` over `seconds`.
    pub fn fade_filter_parameter(
        &self,
        handle: Handle,
        filter_id: usize,
        attribute: usize,
        to: f32,
        seconds: f64,
    ) {
        self.with_filter(handle, filter_id, |filter, now| {
            filter.fade_filter_parameter(attribute, to, seconds, now)
        });
    }

    /// Swings a filter parameter between `from` and `to`.
    pub fn oscillate_filter_parameter(
        &self,
        handle: Handle,
        filter_id: usize,
        attribute: usize,
        from: f32,
        to: f32,
        period: f64,
    ) {
        self.with_filter(handle, filter_id, |filter, now| {
            filter.oscillate_filter_parameter(attribute, from, to, period, now)
        });
    }

    /// Places the voice in 3D space.
    pub fn set_3d_source_parameters(&self, handle: Handle, position: Vec3, velocity: Vec3) {
        self.update_spatial(handle, |data| {
            data.position = position;
            data.velocity = velocity;
        });
    }

    #[allow(missing_docs)]
    pub fn set_3d_source_position(&self, handle: Handle, position: Vec3) {
        self.update_spatial(handle, |data| data.position = position);
    }

    #[allow(missing_docs)]
    pub fn set_3d_source_velocity(&self, handle: Handle, velocity: Vec3) {
        self.update_spatial(handle, |data| data.velocity = velocity);
    }

    #[allow(missing_docs)]
    pub fn set_3d_source_min_max_distance(&self, handle: Handle, min: f32, max: f32) {
        self.update_spatial(handle, |data| {
            data.min_distance = min;
            data.max_distance = max;
        });
    }

    #[allow(missing_docs)]
    pub fn set_3d_source_attenuation(&self, handle: Handle, model: AttenuationModel, rolloff: f32) {
        self.update_spatial(handle, |data| {
            data.attenuation_model = model;
            data.rolloff = rolloff;
        });
    }

    #[allow(missing_docs)]
    pub fn set_3d_source_doppler_factor(&self, handle: Handle, factor: f32) {
        self.update_spatial(handle, |data| data.doppler_factor = factor);
    }

    /// The 3D state the last 3D pass left on the voice.
    pub fn voice_3d_data(&self, handle: Handle) -> Option<super::Voice3dData> {
        let core = self.lock();
        let slot = core.resolve_first(handle)?;
        core.voices.spatial(slot).cloned()
    }

    fn update_voices(&self, handle: Handle, mut f: impl FnMut(&mut super::voice::Voice)) {
        self.lock().for_each_voice(handle, |core, slot| {
            if let Some(voice) = core.voices.get_mut(slot) {
                f(voice);
            }
        });
    }

    fn update_spatial(&self, handle: Handle, mut f: impl FnMut(&mut super::Voice3dData)) {
        self.lock().for_each_voice(handle, |core, slot| {
            if let Some(data) = core.voices.spatial_mut(slot) {
                f(data);
            }
        });
    }

    fn with_filter(
        &self,
        handle: Handle,
        filter_id: usize,
        mut f: impl FnMut(&mut Box<dyn FilterInstance>, f64),
    ) {
        if filter_id >= FILTERS_PER_STREAM {
            return;
        }
        let mut core = self.lock();
        if handle.is_none() {
            let now = core.stream_time;
            if let Some(filter) = core.global_filters[filter_id].as_mut() {
                f(filter, now);
            }
            return;
        }
        core.for_each_voice(handle, |core: &mut EngineCore, slot| {
            if let Some(voice) = core.voices.get_mut(slot) {
                let now = voice.state.stream_time;
                if let Some(filter) = voice.filters[filter_id].as_mut() {
                    f(filter, now);
                }
            }
        });
    }
}
