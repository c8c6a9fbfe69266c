// Copyright (c) 2024 Mike Tsao

use crate::{
    elements::AttenuationModel,
    error::{Error, Result},
    prelude::*,
};
use std::sync::Arc;

/// The configuration an [AudioSource] hands to every voice it starts. Each
/// settings struct carries its own [SourceUid], so it isn't [Clone].
#[derive(Debug)]
pub struct SourceSettings {
    uid: SourceUid,
    flags: SourceFlags,
    base_sample_rate: f32,
    channels: usize,
    volume: f32,
    loop_point: f64,
    min_distance: f32,
    max_distance: f32,
    rolloff: f32,
    attenuation_model: AttenuationModel,
    doppler_factor: f32,
    collider: Option<Arc<dyn AudioCollider>>,
    collider_data: i32,
    attenuator: Option<Arc<dyn AudioAttenuator>>,
    filters: [Option<Arc<dyn Filter>>; FILTERS_PER_STREAM],
}
impl Default for SourceSettings {
    fn default() -> Self {
        Self {
            uid: SourceUid::mint(),
            flags: Default::default(),
            base_sample_rate: SampleRate::DEFAULT_SAMPLE_RATE as f32,
            channels: 1,
            volume: 1.0,
            loop_point: 0.0,
            min_distance: 1.0,
            max_distance: 1_000_000.0,
            rolloff: 1.0,
            attenuation_model: AttenuationModel::None,
            doppler_factor: 1.0,
            collider: None,
            collider_data: 0,
            attenuator: None,
            filters: Default::default(),
        }
    }
}
impl SourceSettings {
    #[allow(missing_docs)]
    pub fn uid(&self) -> SourceUid {
        self.uid
    }

    #[allow(missing_docs)]
    pub fn flags(&self) -> &SourceFlags {
        &self.flags
    }

    #[allow(missing_docs)]
    pub fn flags_mut(&mut self) -> &mut SourceFlags {
        &mut self.flags
    }

    /// Sample rate of the raw data the source produces.
    pub fn base_sample_rate(&self) -> f32 {
        self.base_sample_rate
    }

    #[allow(missing_docs)]
    pub fn channels(&self) -> usize {
        self.channels
    }

    /// Sets the format of the raw data. Channel counts run from 1 to
    /// [MAX_CHANNELS].
    pub fn set_format(&mut self, base_sample_rate: f32, channels: usize) -> Result<()> {
        if base_sample_rate <= 0.0 {
            return Err(Error::invalid(format!(
                "sample rate must be positive, not {base_sample_rate}"
            )));
        }
        if !(1..=MAX_CHANNELS).contains(&channels) {
            return Err(Error::invalid(format!("unsupported channel count {channels}")));
        }
        self.base_sample_rate = base_sample_rate;
        self.channels = channels;
        Ok(())
    }

    /// Volume new voices start with.
    pub fn volume(&self) -> f32 {
        self.volume
    }

    #[allow(missing_docs)]
    pub fn set_volume(&mut self, volume: f32) {
        self.volume = volume;
    }

    #[allow(missing_docs)]
    pub fn set_looping(&mut self, should_loop: bool) {
        self.flags.should_loop = should_loop;
    }

    /// When set, playing the source first stops any voice it's already
    /// playing.
    pub fn set_single_instance(&mut self, single_instance: bool) {
        self.flags.single_instance = single_instance;
    }

    /// Where looping voices jump back to, in seconds.
    pub fn loop_point(&self) -> f64 {
        self.loop_point
    }

    #[allow(missing_docs)]
    pub fn set_loop_point(&mut self, seconds: f64) {
        self.loop_point = seconds;
    }

    /// Whether voices stop by themselves at the end of the stream.
    pub fn set_auto_stop(&mut self, auto_stop: bool) {
        self.flags.disable_autostop = !auto_stop;
    }

    /// What voices do when they become inaudible: keep advancing
    /// (`must_tick`), stop (`kill`), or neither, which pauses their progress
    /// until they can be heard again.
    pub fn set_inaudible_behavior(&mut self, must_tick: bool, kill: bool) {
        self.flags.inaudible_tick = must_tick;
        self.flags.inaudible_kill = kill;
    }

    #[allow(missing_docs)]
    pub fn set_visualization_enabled(&mut self, enabled: bool) {
        self.flags.visualization_data = enabled;
    }

    #[allow(missing_docs)]
    pub fn min_distance(&self) -> f32 {
        self.min_distance
    }

    #[allow(missing_docs)]
    pub fn max_distance(&self) -> f32 {
        self.max_distance
    }

    #[allow(missing_docs)]
    pub fn rolloff(&self) -> f32 {
        self.rolloff
    }

    #[allow(missing_docs)]
    pub fn attenuation_model(&self) -> AttenuationModel {
        self.attenuation_model
    }

    #[allow(missing_docs)]
    pub fn doppler_factor(&self) -> f32 {
        self.doppler_factor
    }

    #[allow(missing_docs)]
    pub fn set_3d_min_max_distance(&mut self, min_distance: f32, max_distance: f32) {
        self.min_distance = min_distance;
        self.max_distance = max_distance;
    }

    #[allow(missing_docs)]
    pub fn set_3d_attenuation(&mut self, model: AttenuationModel, rolloff: f32) {
        self.attenuation_model = model;
        self.rolloff = rolloff;
    }

    #[allow(missing_docs)]
    pub fn set_3d_doppler_factor(&mut self, doppler_factor: f32) {
        self.doppler_factor = doppler_factor;
    }

    /// Positions of new voices are relative to the listener rather than the
    /// world.
    pub fn set_3d_listener_relative(&mut self, listener_relative: bool) {
        self.flags.listener_relative = listener_relative;
    }

    /// New 3D voices start late by the time sound takes to travel to the
    /// listener.
    pub fn set_3d_distance_delay(&mut self, distance_delay: bool) {
        self.flags.distance_delay = distance_delay;
    }

    #[allow(missing_docs)]
    pub fn set_3d_collider(&mut self, collider: Option<Arc<dyn AudioCollider>>, user_data: i32) {
        self.collider = collider;
        self.collider_data = user_data;
    }

    #[allow(missing_docs)]
    pub fn set_3d_attenuator(&mut self, attenuator: Option<Arc<dyn AudioAttenuator>>) {
        self.attenuator = attenuator;
    }

    #[allow(missing_docs)]
    pub fn collider(&self) -> (Option<&Arc<dyn AudioCollider>>, i32) {
        (self.collider.as_ref(), self.collider_data)
    }

    #[allow(missing_docs)]
    pub fn attenuator(&self) -> Option<&Arc<dyn AudioAttenuator>> {
        self.attenuator.as_ref()
    }

    /// Attaches `filter` to slot `id`, or clears the slot. Only new voices
    /// pick up the change.
    pub fn set_filter(&mut self, id: usize, filter: Option<Arc<dyn Filter>>) -> Result<()> {
        let slot = self
            .filters
            .get_mut(id)
            .ok_or_else(|| Error::invalid(format!("filter id {id} is out of range")))?;
        *slot = filter;
        Ok(())
    }

    #[allow(missing_docs)]
    pub fn filters(&self) -> &[Option<Arc<dyn Filter>>; FILTERS_PER_STREAM] {
        &self.filters
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let s = SourceSettings::default();
        assert_eq!(s.base_sample_rate(), 44100.0);
        assert_eq!(s.channels(), 1);
        assert_eq!(s.volume(), 1.0);
        assert_eq!(s.min_distance(), 1.0);
        assert_eq!(s.max_distance(), 1_000_000.0);
        assert_eq!(s.attenuation_model(), AttenuationModel::None);
        assert!(s.filters().iter().all(Option::is_none));
        assert_ne!(
            s.uid(),
            SourceSettings::default().uid(),
            "every source should get its own uid"
        );
    }

    #[test]
    fn setters_validate() {
        let mut s = SourceSettings::default();
        assert!(s.set_format(48000.0, 2).is_ok());
        assert_eq!(s.channels(), 2);
        assert!(matches!(s.set_format(48000.0, 9), Err(Error::InvalidParameter(_))));
        assert!(matches!(s.set_format(0.0, 1), Err(Error::InvalidParameter(_))));
        assert_eq!(s.base_sample_rate(), 48000.0, "a rejected format changes nothing");
        assert!(s.set_filter(FILTERS_PER_STREAM, None).is_err());

        s.set_auto_stop(false);
        assert!(s.flags().disable_autostop);
        s.set_inaudible_behavior(true, false);
        assert!(s.flags().inaudible_tick);
        assert!(!s.flags().inaudible_kill);
    }
}
