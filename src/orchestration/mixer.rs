// Copyright (c) 2024 Mike Tsao

//! The per-tick mix: faders, voice selection, resampling, filtering, panning,
//! and summing into the main output or into buses.

use super::{engine_core::EngineCore, voice::VoiceState};
use crate::{
    elements::{ChannelMap, Fader, Resampler},
    prelude::*,
    types::{FIXPOINT_FRAC_MUL, INAUDIBLE_THRESHOLD},
};

const BLOCK: usize = SAMPLE_GRANULARITY;
/// One whole resample block in playhead units.
const BLOCK_FIXED: u32 = BLOCK as u32 * FIXPOINT_FRAC_MUL;

impl EngineCore {
    /// Produces `frames` (at most [SAMPLE_GRANULARITY]) frames of finished
    /// audio in `self.output`, planar with a stride of [SAMPLE_GRANULARITY].
    pub(crate) fn mix_tick(&mut self, frames: usize) {
        let frames = frames.min(BLOCK);
        let buffer_time = frames as f64 / self.sample_rate as f64;
        self.stream_time += buffer_time;
        self.last_clocked_time = 0.0;

        let volume_start = self.global_volume;
        if self.global_volume_fader.is_active() {
            self.global_volume = self.global_volume_fader.get(self.stream_time);
        }
        let volume_end = self.global_volume;

        self.run_faders(buffer_time);
        if self.active_dirty {
            self.calc_active_voices();
        }

        let mut output = core::mem::take(&mut self.output);
        let mut scratch = core::mem::take(&mut self.scratch);
        self.mix_bus(
            &mut output,
            &mut scratch,
            Handle::NONE,
            frames,
            BLOCK,
            self.sample_rate as f32,
            self.channels,
            self.resampler,
        );
        for filter in self.global_filters.iter_mut().flatten() {
            filter.filter(
                &mut output,
                frames,
                BLOCK,
                self.channels,
                self.sample_rate as f32,
                self.stream_time,
            );
        }
        self.clipper.clip(
            &mut output,
            self.channels,
            BLOCK,
            frames,
            volume_start,
            volume_end,
            self.post_clip_scaler,
        );
        if self.visualization_enabled {
            self.visualization
                .capture(&output, self.channels, BLOCK, frames);
        }
        self.output = output;
        self.scratch = scratch;
    }

    /// Advances every unpaused voice's clocks and faders, and acts on
    /// scheduled pauses and stops.
    fn run_faders(&mut self, buffer_time: f64) {
        let channels = self.channels;
        for slot in 0..self.voices.highest() {
            let Some((voice, data)) = self.voices.get_with_spatial_mut(slot) else {
                continue;
            };
            let state = &mut voice.state;
            if state.flags.paused {
                continue;
            }
            state.stream_time += buffer_time;
            state.stream_position += buffer_time * state.overall_relative_play_speed as f64;
            let now = state.stream_time;

            if state.relative_play_speed_fader.is_active() {
                state.set_relative_play_speed = state.relative_play_speed_fader.get(now);
                state.update_relative_play_speed(data.doppler_value);
            }
            if state.volume_fader.is_active() {
                state.set_volume = state.volume_fader.get(now);
                state.update_volume(data.volume_3d);
                self.active_dirty = true;
            }
            if state.pan_fader.is_active() {
                let pan = state.pan_fader.get(now);
                state.set_pan(pan, channels);
            }
            let pause = Self::scheduler_fired(&mut state.pause_scheduler, now);
            let stop = Self::scheduler_fired(&mut state.stop_scheduler, now);

            if pause {
                self.set_voice_pause(slot, true);
            }
            if stop {
                self.stop_voice(slot);
                continue;
            }
            self.update_audibility(slot, INAUDIBLE_THRESHOLD);
        }
    }

    fn scheduler_fired(scheduler: &mut Fader, now: f64) -> bool {
        if !scheduler.is_active() {
            return false;
        }
        scheduler.get(now);
        if scheduler.has_stopped() {
            scheduler.deactivate();
            true
        } else {
            false
        }
    }

    /// Chooses which voices get mixed. Voices that must tick while inaudible
    /// always make the cut, and the loudest of the rest fill the remaining
    /// budget.
    pub(crate) fn calc_active_voices(&mut self) {
        self.active_dirty = false;
        let mut candidates = core::mem::take(&mut self.candidates);
        candidates.clear();
        for (slot, voice) in self.voices.iter() {
            if voice.state.must_tick() {
                candidates.push(slot);
            }
        }
        let must_live = candidates.len();
        for (slot, voice) in self.voices.iter() {
            let flags = &voice.state.flags;
            if !flags.inaudible_tick && !flags.inaudible && !flags.paused {
                candidates.push(slot);
            }
        }

        if candidates.len() > self.max_active && must_live < self.max_active {
            let needed = self.max_active - must_live;
            let voices = &self.voices;
            let volume = |slot: usize| voices.get(slot).map_or(0.0, |v| v.state.overall_volume);
            candidates[must_live..]
                .select_nth_unstable_by(needed - 1, |a, b| volume(*b).total_cmp(&volume(*a)));
        }
        candidates.truncate(self.max_active);

        self.active.clear();
        self.active.extend_from_slice(&candidates);
        self.candidates = candidates;
        self.map_resample_buffers();
    }

    /// Hands resample buffers to newly active voices and takes them back from
    /// voices that dropped out.
    fn map_resample_buffers(&mut self) {
        for (index, owner) in self.resample_owners.iter_mut().enumerate() {
            let Some(slot) = *owner else {
                continue;
            };
            if !self.active.contains(&slot) {
                *owner = None;
                if let Some(voice) = self.voices.get_mut(slot) {
                    if voice.state.resample_buffers == Some(index) {
                        voice.state.resample_buffers = None;
                    }
                }
            }
        }
        for &slot in self.active.iter() {
            let Some(voice) = self.voices.get_mut(slot) else {
                continue;
            };
            if voice.state.resample_buffers.is_some() {
                continue;
            }
            if let Some(index) = self.resample_owners.iter().position(Option::is_none) {
                self.resample_owners[index] = Some(slot);
                voice.state.resample_buffers = Some(index);
                // Fresh buffers hold no audio, so start over with a new block.
                voice.state.src_offset = 0;
                voice.state.leftover_samples = 0;
                for buffer in self.resample_pool[index].iter_mut() {
                    buffer.fill(0.0);
                }
            }
        }
    }

    /// Mixes every active voice routed to `bus` into `output`. `scratch` holds
    /// each voice's resampled audio on its way in.
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn mix_bus(
        &mut self,
        output: &mut [f32],
        scratch: &mut [f32],
        bus: Handle,
        frames: usize,
        stride: usize,
        sample_rate: f32,
        channels: usize,
        resampler: Resampler,
    ) {
        for chunk in output.chunks_mut(stride).take(channels) {
            chunk[..frames].fill(0.0);
        }

        for i in 0..self.active.len() {
            let slot = self.active[i];
            let Some(voice) = self.voices.get(slot) else {
                continue;
            };
            let flags = voice.state.flags;
            if voice.state.bus_handle != bus || flags.paused {
                continue;
            }
            if !flags.inaudible {
                self.render_voice(slot, Some(&mut *scratch), frames, stride, sample_rate, resampler);
                let Some(voice) = self.voices.get_mut(slot) else {
                    continue;
                };
                let voice_channels = voice.state.channels;
                for filter in voice.filters.iter_mut().flatten() {
                    filter.filter(
                        scratch,
                        frames,
                        stride,
                        voice_channels,
                        sample_rate,
                        voice.state.stream_time,
                    );
                }
                pan_and_expand(&mut voice.state, output, scratch, frames, stride, channels);
            } else if flags.inaudible_tick {
                self.render_voice(slot, None, frames, stride, sample_rate, resampler);
            } else {
                continue;
            }

            if let Some(voice) = self.voices.get(slot) {
                let flags = voice.state.flags;
                if !flags.looping && !flags.disable_autostop && voice.instance.has_ended() {
                    self.stop_voice(slot);
                }
            }
        }
    }

    /// Pulls source blocks for one voice and, if `scratch` is given,
    /// resamples `frames` frames of them into it. Without `scratch`, the voice
    /// just advances as though it had been heard.
    fn render_voice(
        &mut self,
        slot: usize,
        mut scratch: Option<&mut [f32]>,
        frames: usize,
        stride: usize,
        bus_sample_rate: f32,
        resampler: Resampler,
    ) {
        let Some(voice) = self.voices.get_mut(slot) else {
            return;
        };
        let Some(pool_index) = voice.state.resample_buffers else {
            if let Some(scratch) = scratch {
                for c in 0..voice.state.channels {
                    scratch[c * stride..c * stride + frames].fill(0.0);
                }
            }
            return;
        };
        let step = voice.state.sample_rate / bus_sample_rate;
        let step_fixed = if step.is_finite() && step > 0.0 {
            // Past 512x the playhead would skip whole blocks.
            ((step * FIXPOINT_FRAC_MUL as f32).floor() as u64).min(BLOCK_FIXED as u64 - 1) as u32
        } else {
            0
        };
        let channels = voice.state.channels;

        let delay = voice.state.delay_samples.min(frames);
        voice.state.delay_samples -= delay;
        let mut written = delay;

        while step_fixed != 0 && written < frames {
            let needs_block = self
                .voices
                .get(slot)
                .is_some_and(|v| v.state.leftover_samples == 0);
            if needs_block {
                self.fetch_block(slot, pool_index);
            }
            let Some(voice) = self.voices.get_mut(slot) else {
                return;
            };
            let state = &mut voice.state;
            if needs_block {
                state.src_offset = state.src_offset.saturating_sub(BLOCK_FIXED);
            } else {
                state.leftover_samples = 0;
            }

            let src_offset = state.src_offset;
            // Every playhead position that lands inside this block.
            let mut count = if src_offset < BLOCK_FIXED {
                (BLOCK_FIXED - src_offset).div_ceil(step_fixed) as usize
            } else {
                0
            };
            if count + written > frames {
                state.leftover_samples = count + written - frames;
                count = frames - written;
            }

            if count > 0 {
                if let Some(scratch) = scratch.as_deref_mut() {
                    let [current, previous] = &self.resample_pool[pool_index];
                    for c in 0..channels {
                        let block = c * BLOCK..(c + 1) * BLOCK;
                        let start = c * stride + written;
                        resampler.resample(
                            &current[block.clone()],
                            &previous[block],
                            &mut scratch[start..start + count],
                            src_offset,
                            step_fixed,
                        );
                    }
                }
            }
            written += count;
            state.src_offset = state
                .src_offset
                .wrapping_add((count as u32).wrapping_mul(step_fixed));
        }

        if let Some(scratch) = scratch {
            for c in 0..channels {
                let start = c * stride;
                // Silence for the delay at the front and for anything the
                // voice couldn't produce at the back.
                scratch[start..start + delay].fill(0.0);
                if written < frames {
                    scratch[start + written..start + frames].fill(0.0);
                }
            }
        }
    }

    /// Swaps the voice's ping-pong buffers and reads a fresh block of source
    /// audio, looping back to the loop point if the voice loops.
    fn fetch_block(&mut self, slot: usize, pool_index: usize) {
        self.prerender_bus(slot);

        let Self {
            voices,
            resample_pool,
            seek_scratch,
            ..
        } = self;
        let Some(voice) = voices.get_mut(slot) else {
            return;
        };
        let Some([current, previous]) = resample_pool.get_mut(pool_index) else {
            return;
        };
        core::mem::swap(current, previous);

        let looping = voice.state.flags.looping;
        let mut read = 0;
        if !voice.instance.has_ended() || looping {
            read = voice.instance.get_audio(current, BLOCK, BLOCK).min(BLOCK);
            if looping {
                let loop_point = voice.state.loop_point;
                while read < BLOCK && voice.seek(loop_point, seek_scratch).is_ok() {
                    voice.state.loop_count += 1;
                    let more = voice
                        .instance
                        .get_audio(&mut current[read..], BLOCK - read, BLOCK)
                        .min(BLOCK - read);
                    read += more;
                    if more == 0 {
                        break;
                    }
                }
            }
        }
        if read < BLOCK {
            for c in 0..voice.state.channels {
                current[c * BLOCK + read..(c + 1) * BLOCK].fill(0.0);
            }
        }
    }

    /// If the voice in `slot` is a bus, mixes everything routed to it so that
    /// the bus has a block ready to hand over.
    fn prerender_bus(&mut self, slot: usize) {
        let handle = self.voices.handle_of(slot);
        let Some(voice) = self.voices.get_mut(slot) else {
            return;
        };
        let sample_rate = voice.state.sample_rate;
        let Some(bus) = voice.instance.as_bus_mut() else {
            return;
        };
        let channels = bus.channels();
        let resampler = bus.resampler();
        let (mut accumulator, mut scratch) = bus.take_buffers();
        self.mix_bus(
            &mut accumulator,
            &mut scratch,
            handle,
            BLOCK,
            BLOCK,
            sample_rate,
            channels,
            resampler,
        );
        if let Some(bus) = self
            .voices
            .get_mut(slot)
            .and_then(|v| v.instance.as_bus_mut())
        {
            bus.restore_buffers(accumulator, scratch);
        }
    }
}

/// Adds a voice's resampled audio into `output`, mapping its channels onto
/// the destination's and ramping each channel's gain from where the last tick
/// left it to its current target.
fn pan_and_expand(
    state: &mut VoiceState,
    output: &mut [f32],
    scratch: &[f32],
    frames: usize,
    stride: usize,
    channels: usize,
) {
    if frames == 0 {
        return;
    }
    let map = ChannelMap::new(state.channels, channels);
    for (channel, out) in output.chunks_mut(stride).take(channels).enumerate() {
        let start = state.current_channel_volume[channel];
        let target = state.channel_volume[channel] * state.overall_volume;
        let step = (target - start) / frames as f32;
        let weights = map.weights_for(channel);
        for (i, sample) in out[..frames].iter_mut().enumerate() {
            let mut sum = 0.0;
            for (source, weight) in weights.iter().enumerate().take(state.channels) {
                if *weight != 0.0 {
                    sum += weight * scratch[source * stride + i];
                }
            }
            *sample += sum * (start + step * i as f32);
        }
        state.current_channel_volume[channel] = target;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use float_cmp::approx_eq;

    #[test]
    fn pan_and_expand_ramps_gain() {
        let settings = crate::orchestration::SourceSettings::default();
        let mut state = VoiceState::new(&settings, 0, Handle::NONE);
        state.channel_volume = [1.0; MAX_CHANNELS];
        state.overall_volume = 1.0;
        state.current_channel_volume = [0.0; MAX_CHANNELS];

        let scratch = vec![1.0; 4];
        let mut output = vec![0.0; 8];
        pan_and_expand(&mut state, &mut output, &scratch, 4, 4, 2);
        assert_eq!(output[..4], [0.0, 0.25, 0.5, 0.75]);
        assert_eq!(output[4..], [0.0, 0.25, 0.5, 0.75], "mono should reach both sides");
        assert!(approx_eq!(f32, state.current_channel_volume[0], 1.0));

        let mut output = vec![0.5; 8];
        pan_and_expand(&mut state, &mut output, &scratch, 4, 4, 2);
        assert!(
            output.iter().all(|s| approx_eq!(f32, *s, 1.5)),
            "a settled voice adds at full gain on top of what's there"
        );
    }
}
