// Copyright (c) 2024 Mike Tsao

use super::SourceSettings;
use crate::{
    elements::{absolute_channel_volumes, pan_channel_volumes, Fader},
    error::{Error, Result},
    prelude::*,
};

/// Everything the engine tracks about a playing voice apart from the instance
/// itself.
#[derive(Debug)]
pub(crate) struct VoiceState {
    pub(crate) play_index: u32,
    pub(crate) source_uid: SourceUid,
    pub(crate) bus_handle: Handle,
    pub(crate) flags: VoiceFlags,

    pub(crate) channels: usize,
    pub(crate) base_sample_rate: f32,
    /// `base_sample_rate` scaled by the overall relative play speed.
    pub(crate) sample_rate: f32,
    pub(crate) set_relative_play_speed: f32,
    pub(crate) overall_relative_play_speed: f32,

    pub(crate) pan: f32,
    pub(crate) set_volume: f32,
    /// `set_volume` times the 3D volume.
    pub(crate) overall_volume: f32,
    pub(crate) channel_volume: ChannelVolumes,
    /// Channel gains reached at the end of the last tick. The mixer ramps from
    /// these to the targets.
    pub(crate) current_channel_volume: ChannelVolumes,

    pub(crate) stream_time: f64,
    pub(crate) stream_position: f64,
    pub(crate) loop_point: f64,
    pub(crate) loop_count: u32,
    pub(crate) delay_samples: usize,

    pub(crate) volume_fader: Fader,
    pub(crate) pan_fader: Fader,
    pub(crate) relative_play_speed_fader: Fader,
    pub(crate) pause_scheduler: Fader,
    pub(crate) stop_scheduler: Fader,

    /// Fixed-point playhead within the current resample block.
    pub(crate) src_offset: u32,
    pub(crate) leftover_samples: usize,
    /// Which pair of resample buffers the voice owns while it is active.
    pub(crate) resample_buffers: Option<usize>,
}
impl VoiceState {
    pub(crate) fn new(settings: &SourceSettings, play_index: u32, bus_handle: Handle) -> Self {
        Self {
            play_index,
            source_uid: settings.uid(),
            bus_handle,
            flags: VoiceFlags::from(settings.flags()),
            channels: settings.channels(),
            base_sample_rate: settings.base_sample_rate(),
            sample_rate: settings.base_sample_rate(),
            set_relative_play_speed: 1.0,
            overall_relative_play_speed: 1.0,
            pan: 0.0,
            set_volume: 1.0,
            overall_volume: 1.0,
            channel_volume: [1.0; MAX_CHANNELS],
            current_channel_volume: [0.0; MAX_CHANNELS],
            stream_time: 0.0,
            stream_position: 0.0,
            loop_point: settings.loop_point(),
            loop_count: 0,
            delay_samples: 0,
            volume_fader: Default::default(),
            pan_fader: Default::default(),
            relative_play_speed_fader: Default::default(),
            pause_scheduler: Default::default(),
            stop_scheduler: Default::default(),
            src_offset: 0,
            leftover_samples: 0,
            resample_buffers: None,
        }
    }

    /// Recomputes the overall volume from the set volume and the 3D volume.
    /// A paused voice jumps straight to its new gains so that it doesn't
    /// ramp when it resumes.
    pub(crate) fn update_volume(&mut self, volume_3d: f32) {
        self.overall_volume = self.set_volume * volume_3d;
        if self.flags.paused {
            self.snap_current_channel_volume();
        }
    }

    pub(crate) fn update_relative_play_speed(&mut self, doppler: f32) {
        self.overall_relative_play_speed = doppler * self.set_relative_play_speed;
        self.sample_rate = self.base_sample_rate * self.overall_relative_play_speed;
    }

    pub(crate) fn snap_current_channel_volume(&mut self) {
        for (current, target) in self
            .current_channel_volume
            .iter_mut()
            .zip(self.channel_volume.iter())
        {
            *current = target * self.overall_volume;
        }
    }

    pub(crate) fn set_pan(&mut self, pan: f32, output_channels: usize) {
        self.pan = pan;
        self.channel_volume = pan_channel_volumes(pan, output_channels);
    }

    pub(crate) fn set_pan_absolute(&mut self, left: f32, right: f32, output_channels: usize) {
        self.channel_volume = absolute_channel_volumes(left, right, output_channels);
    }

    /// Whether the mixer must keep advancing this voice even though nobody
    /// can hear it.
    pub(crate) fn must_tick(&self) -> bool {
        self.flags.inaudible_tick
    }
}

/// A slot's occupant: the instance, its bookkeeping, and its filters.
#[derive(Debug)]
pub(crate) struct Voice {
    pub(crate) instance: Box<dyn AudioSourceInstance>,
    pub(crate) state: VoiceState,
    pub(crate) filters: [Option<Box<dyn FilterInstance>>; FILTERS_PER_STREAM],
}
impl Voice {
    /// Moves the voice to `seconds`. Instances without a fast seek are
    /// rewound if necessary and then read forward through `scratch`, which
    /// can be slow for long distances.
    pub(crate) fn seek(&mut self, seconds: f64, scratch: &mut [f32]) -> Result<()> {
        if self.instance.seek(seconds) {
            self.state.stream_position = seconds;
            return Ok(());
        }
        let mut offset = seconds - self.state.stream_position;
        if offset <= 0.0 {
            if !self.instance.rewind() {
                return Err(Error::NotImplemented);
            }
            self.state.stream_position = 0.0;
            offset = seconds;
        }
        let channels = self.state.channels.max(1);
        let chunk = (scratch.len() / channels).min(SAMPLE_GRANULARITY);
        if chunk == 0 {
            return Err(Error::NotImplemented);
        }
        let mut to_discard = (self.state.base_sample_rate as f64 * offset).floor() as usize;
        while to_discard > 0 {
            let n = to_discard.min(chunk);
            let read = self.instance.get_audio(scratch, n, chunk);
            if read == 0 {
                break;
            }
            to_discard -= read.min(to_discard);
        }
        self.state.stream_position = seconds;
        Ok(())
    }

    /// Goes back to the start of the sound.
    pub(crate) fn rewind(&mut self) -> Result<()> {
        if self.instance.rewind() {
            self.state.stream_position = 0.0;
            Ok(())
        } else {
            Err(Error::NotImplemented)
        }
    }
}
