// Copyright (c) 2024 Mike Tsao

use super::{
    groups::VoiceGroups,
    repositories::VoiceRepository,
    spatializer::Spatializer,
    voice::{Voice, VoiceState},
    PlayOptions, SourceSettings, Voice3dData,
};
use crate::{
    elements::{Clipper, Fader, Resampler, Visualization},
    error::{Error, Result},
    prelude::*,
    util::EngineSettings,
};

/// Samples in one resample buffer: a block for every channel.
pub(crate) const RESAMPLE_BUFFER_SIZE: usize = SAMPLE_GRANULARITY * MAX_CHANNELS;

pub(crate) type FilterSlots = [Option<Box<dyn FilterInstance>>; FILTERS_PER_STREAM];

/// Everything behind the engine lock.
#[derive(Debug)]
pub(crate) struct EngineCore {
    pub(crate) voices: VoiceRepository,
    pub(crate) groups: VoiceGroups,
    pub(crate) spatializer: Spatializer,

    pub(crate) sample_rate: usize,
    pub(crate) channels: usize,
    pub(crate) resampler: Resampler,
    pub(crate) clipper: Clipper,
    pub(crate) post_clip_scaler: f32,
    pub(crate) global_volume: f32,
    pub(crate) global_volume_fader: Fader,
    pub(crate) global_filters: FilterSlots,

    pub(crate) stream_time: f64,
    /// Reference time for clocked playback. Zero means "not yet set this
    /// tick."
    pub(crate) last_clocked_time: f64,

    pub(crate) max_active: usize,
    /// Slots that get mixed this tick.
    pub(crate) active: Vec<usize>,
    pub(crate) candidates: Vec<usize>,
    pub(crate) active_dirty: bool,
    /// Ping-pong source buffers, one pair per active voice.
    pub(crate) resample_pool: Vec<[Vec<f32>; 2]>,
    /// Which slot owns each pair in `resample_pool`.
    pub(crate) resample_owners: Vec<Option<usize>>,

    /// Planar main mix, `SAMPLE_GRANULARITY` frames per channel.
    pub(crate) output: Vec<f32>,
    pub(crate) scratch: Vec<f32>,
    /// Where seeks discard audio. Separate from `scratch`, which is busy
    /// during the mix when a looping voice seeks.
    pub(crate) seek_scratch: Vec<f32>,

    pub(crate) visualization_enabled: bool,
    pub(crate) visualization: Visualization,

    slot_scratch: Vec<usize>,
}
impl EngineCore {
    pub(crate) fn new(settings: &EngineSettings) -> Self {
        let capacity = settings.voice_capacity();
        let channels = settings.channel_count();
        let max_active = settings.max_active_voices();
        let mut r = Self {
            voices: VoiceRepository::new(capacity),
            groups: Default::default(),
            spatializer: Spatializer::new(
                channels,
                if settings.sound_speed() > 0.0 {
                    settings.sound_speed()
                } else {
                    Spatializer::DEFAULT_SOUND_SPEED
                },
                settings.left_handed_3d(),
            ),
            sample_rate: settings.sample_rate().0,
            channels,
            resampler: settings.resampler(),
            clipper: settings.clipper(),
            post_clip_scaler: settings.post_clip_scaler(),
            global_volume: settings.global_volume(),
            global_volume_fader: Default::default(),
            global_filters: Default::default(),
            stream_time: 0.0,
            last_clocked_time: 0.0,
            max_active,
            active: Vec::default(),
            candidates: Vec::with_capacity(capacity),
            active_dirty: true,
            resample_pool: Vec::default(),
            resample_owners: Vec::default(),
            output: vec![0.0; RESAMPLE_BUFFER_SIZE],
            scratch: vec![0.0; RESAMPLE_BUFFER_SIZE],
            seek_scratch: vec![0.0; RESAMPLE_BUFFER_SIZE],
            visualization_enabled: settings.visualization(),
            visualization: Default::default(),
            slot_scratch: Vec::with_capacity(capacity),
        };
        r.allocate_resample_pool();
        r
    }

    fn allocate_resample_pool(&mut self) {
        self.resample_pool = (0..self.max_active)
            .map(|_| [vec![0.0; RESAMPLE_BUFFER_SIZE], vec![0.0; RESAMPLE_BUFFER_SIZE]])
            .collect();
        self.resample_owners = vec![None; self.max_active];
        self.active = Vec::with_capacity(self.max_active);
        for slot in 0..self.voices.highest() {
            if let Some(voice) = self.voices.get_mut(slot) {
                voice.state.resample_buffers = None;
            }
        }
        self.active_dirty = true;
    }

    /// Changes how many voices are mixed per tick. This reallocates the
    /// resample buffers, so it isn't real-time safe.
    pub(crate) fn set_max_active_voice_count(&mut self, count: usize) -> Result<()> {
        if count == 0 || count > self.voices.capacity() {
            return Err(Error::invalid(format!(
                "max active voice count must be between 1 and {}, not {count}",
                self.voices.capacity()
            )));
        }
        self.max_active = count;
        self.allocate_resample_pool();
        Ok(())
    }

    /// Calls `f` once for each live voice `handle` names: the voice itself,
    /// or every live member of a group.
    pub(crate) fn for_each_voice(&mut self, handle: Handle, mut f: impl FnMut(&mut Self, usize)) {
        let mut slots = core::mem::take(&mut self.slot_scratch);
        slots.clear();
        if let Some(members) = self.groups.members(handle) {
            for member in members {
                if let Some(slot) = self.voices.resolve(*member) {
                    if slots.len() < slots.capacity() {
                        slots.push(slot);
                    }
                }
            }
        } else if let Some(slot) = self.voices.resolve(handle) {
            slots.push(slot);
        }
        for slot in slots.iter() {
            f(self, *slot);
        }
        self.slot_scratch = slots;
    }

    /// The slot that getters read for `handle`. For a group, that's its first
    /// live member.
    pub(crate) fn resolve_first(&self, handle: Handle) -> Option<usize> {
        match self.groups.members(handle) {
            Some(members) => members.iter().find_map(|h| self.voices.resolve(*h)),
            None => self.voices.resolve(handle),
        }
    }

    /// Reads something from the voice `handle` names, or returns `default`.
    pub(crate) fn read_voice<T>(&self, handle: Handle, default: T, f: impl FnOnce(&Voice) -> T) -> T {
        self.resolve_first(handle)
            .and_then(|slot| self.voices.get(slot))
            .map_or(default, f)
    }

    /// Installs a new voice. The caller has already created the instance and
    /// its filters so that no allocation happens here.
    pub(crate) fn play_instance(
        &mut self,
        mut instance: Box<dyn AudioSourceInstance>,
        filters: FilterSlots,
        settings: &SourceSettings,
        options: &PlayOptions,
    ) -> Handle {
        if settings.flags().single_instance {
            self.stop_audio_source(settings.uid());
        }
        let slot = self.voices.find_free_slot();
        self.stop_voice(slot);

        let play_index = self.voices.next_play_index();
        let handle = Handle::for_voice(slot, play_index);
        let mut state = VoiceState::new(settings, play_index, options.bus);
        if instance.as_bus_mut().is_some() {
            // A bus produces audio at the rate of whatever it's mixed into.
            state.base_sample_rate = self.sample_rate as f32;
        }
        state.flags.paused = options.paused;
        state.set_pan(options.pan, self.channels);
        state.set_volume = options.volume.unwrap_or(settings.volume());
        state.update_relative_play_speed(1.0);
        state.update_volume(1.0);
        state.snap_current_channel_volume();

        self.voices.insert(
            slot,
            Voice {
                instance,
                state,
                filters,
            },
            Voice3dData::new(settings, handle),
        );
        self.active_dirty = true;
        handle
    }

    /// Stops whatever is in `slot`. Stopping a bus also stops everything
    /// routed to it.
    pub(crate) fn stop_voice(&mut self, slot: usize) {
        let handle = self.voices.handle_of(slot);
        let Some(mut voice) = self.voices.take(slot) else {
            return;
        };
        self.active_dirty = true;
        if let Some(owner) = voice
            .state
            .resample_buffers
            .and_then(|index| self.resample_owners.get_mut(index))
        {
            *owner = None;
        }
        let was_bus = voice.instance.as_bus_mut().is_some();
        drop(voice);
        if was_bus {
            for other in 0..self.voices.highest() {
                if self
                    .voices
                    .get(other)
                    .is_some_and(|v| v.state.bus_handle == handle)
                {
                    self.stop_voice(other);
                }
            }
        }
    }

    /// Stops every voice the source with `uid` is playing.
    pub(crate) fn stop_audio_source(&mut self, uid: SourceUid) {
        for slot in 0..self.voices.highest() {
            if self
                .voices
                .get(slot)
                .is_some_and(|v| v.state.source_uid == uid)
            {
                self.stop_voice(slot);
            }
        }
    }

    pub(crate) fn count_audio_source(&self, uid: SourceUid) -> usize {
        self.voices
            .iter()
            .filter(|(_, v)| v.state.source_uid == uid)
            .count()
    }

    /// The handle of the first voice playing the source with `uid`.
    pub(crate) fn find_source_handle(&self, uid: SourceUid) -> Handle {
        self.voices
            .iter()
            .find(|(_, v)| v.state.source_uid == uid)
            .map(|(slot, _)| self.voices.handle_of(slot))
            .unwrap_or_default()
    }

    pub(crate) fn stop_all(&mut self) {
        for slot in 0..self.voices.highest() {
            self.stop_voice(slot);
        }
    }

    pub(crate) fn set_voice_pause(&mut self, slot: usize, pause: bool) {
        if let Some(voice) = self.voices.get_mut(slot) {
            voice.state.pause_scheduler.deactivate();
            voice.state.flags.paused = pause;
            self.active_dirty = true;
        }
    }

    pub(crate) fn set_voice_volume(&mut self, slot: usize, volume: f32) {
        if let Some((voice, data)) = self.voices.get_with_spatial_mut(slot) {
            voice.state.set_volume = volume;
            voice.state.update_volume(data.volume_3d);
            self.active_dirty = true;
        }
    }

    pub(crate) fn set_voice_relative_play_speed(&mut self, slot: usize, speed: f32) {
        if let Some((voice, data)) = self.voices.get_with_spatial_mut(slot) {
            voice.state.set_relative_play_speed = speed;
            voice.state.update_relative_play_speed(data.doppler_value);
        }
    }

    pub(crate) fn set_voice_pan(&mut self, slot: usize, pan: f32) {
        let channels = self.channels;
        if let Some(voice) = self.voices.get_mut(slot) {
            voice.state.set_pan(pan, channels);
        }
    }

    /// Flags the voice inaudible if its overall volume is under `threshold`,
    /// or stops it if it asked to be killed when inaudible.
    pub(crate) fn update_audibility(&mut self, slot: usize, threshold: f32) {
        let Some(voice) = self.voices.get_mut(slot) else {
            return;
        };
        let inaudible = voice.state.overall_volume < threshold;
        if inaudible && voice.state.flags.inaudible_kill {
            self.stop_voice(slot);
            return;
        }
        if voice.state.flags.inaudible != inaudible {
            voice.state.flags.inaudible = inaudible;
            self.active_dirty = true;
        }
    }

    /// Seeks the voice in `slot` using the engine's scratch buffer.
    pub(crate) fn seek_voice(&mut self, slot: usize, seconds: f64) -> Result<()> {
        let Self {
            voices,
            seek_scratch,
            ..
        } = self;
        match voices.get_mut(slot) {
            Some(voice) => voice.seek(seconds, seek_scratch),
            None => Ok(()),
        }
    }

    /// Where a voice in `slot` is relative to the listener, for distance
    /// delay.
    pub(crate) fn distance_to_listener(&self, slot: usize) -> f32 {
        let Some(data) = self.voices.spatial(slot) else {
            return 0.0;
        };
        let listener_relative = self
            .voices
            .get(slot)
            .is_some_and(|v| v.state.flags.listener_relative);
        if listener_relative {
            data.position.norm()
        } else {
            (data.position - self.spatializer.listener.position).norm()
        }
    }

    pub(crate) fn samples_for_distance(&self, distance: f32) -> usize {
        (distance / self.spatializer.sound_speed * self.sample_rate as f32)
            .floor()
            .max(0.0) as usize
    }
}
