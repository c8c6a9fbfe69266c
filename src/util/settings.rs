// Copyright (c) 2024 Mike Tsao

//! Structs that hold configuration information about various parts of the
//! system. Intended to be serialized.

use crate::{
    elements::{Clipper, Resampler},
    prelude::*,
    types::{DEFAULT_MAX_ACTIVE_VOICES, MAX_VOICE_CAPACITY, VOICE_COUNT},
};
use derivative::Derivative;
use serde::{Deserialize, Serialize};

/// How an [Engine](crate::orchestration::Engine) is set up when it's created.
#[derive(Clone, Debug, Derivative, Serialize, Deserialize)]
#[derivative(Default)]
#[serde(rename_all = "kebab-case", default)]
pub struct EngineSettings {
    sample_rate: SampleRate,
    #[derivative(Default(value = "2"))]
    channel_count: usize,
    #[derivative(Default(value = "VOICE_COUNT"))]
    voice_capacity: usize,
    #[derivative(Default(value = "DEFAULT_MAX_ACTIVE_VOICES"))]
    max_active_voices: usize,
    resampler: Resampler,
    clipper: Clipper,
    #[derivative(Default(value = "0.95"))]
    post_clip_scaler: f32,
    #[derivative(Default(value = "1.0"))]
    global_volume: f32,
    visualization: bool,
    left_handed_3d: bool,
    #[derivative(Default(value = "343.3"))]
    sound_speed: f32,

    #[serde(skip)]
    has_been_saved: bool,
}
impl HasSettings for EngineSettings {
    fn has_been_saved(&self) -> bool {
        self.has_been_saved
    }

    fn needs_save(&mut self) {
        self.has_been_saved = false;
    }

    fn mark_clean(&mut self) {
        self.has_been_saved = true;
    }
}
impl EngineSettings {
    /// Output samples per second.
    pub fn sample_rate(&self) -> SampleRate {
        self.sample_rate
    }

    #[allow(missing_docs)]
    pub fn set_sample_rate(&mut self, sample_rate: SampleRate) {
        self.sample_rate = sample_rate;
        self.needs_save();
    }

    /// Output channels. The engine supports 1, 2, 4, 6, and 8; anything else
    /// falls back to stereo.
    pub fn channel_count(&self) -> usize {
        match self.channel_count {
            1 | 2 | 4 | 6 | 8 => self.channel_count,
            _ => 2,
        }
    }

    #[allow(missing_docs)]
    pub fn set_channel_count(&mut self, channel_count: usize) {
        self.channel_count = channel_count;
        self.needs_save();
    }

    /// How many voices can exist at once, from 1 to 4095.
    pub fn voice_capacity(&self) -> usize {
        self.voice_capacity.clamp(1, MAX_VOICE_CAPACITY)
    }

    #[allow(missing_docs)]
    pub fn set_voice_capacity(&mut self, voice_capacity: usize) {
        self.voice_capacity = voice_capacity;
        self.needs_save();
    }

    /// How many voices are actually mixed per tick, from 1 to the capacity.
    pub fn max_active_voices(&self) -> usize {
        self.max_active_voices.clamp(1, self.voice_capacity())
    }

    #[allow(missing_docs)]
    pub fn set_max_active_voices(&mut self, max_active_voices: usize) {
        self.max_active_voices = max_active_voices;
        self.needs_save();
    }

    #[allow(missing_docs)]
    pub fn resampler(&self) -> Resampler {
        self.resampler
    }

    #[allow(missing_docs)]
    pub fn set_resampler(&mut self, resampler: Resampler) {
        self.resampler = resampler;
        self.needs_save();
    }

    #[allow(missing_docs)]
    pub fn clipper(&self) -> Clipper {
        self.clipper
    }

    #[allow(missing_docs)]
    pub fn set_clipper(&mut self, clipper: Clipper) {
        self.clipper = clipper;
        self.needs_save();
    }

    /// Gain applied after clipping.
    pub fn post_clip_scaler(&self) -> f32 {
        self.post_clip_scaler
    }

    #[allow(missing_docs)]
    pub fn set_post_clip_scaler(&mut self, post_clip_scaler: f32) {
        self.post_clip_scaler = post_clip_scaler;
        self.needs_save();
    }

    #[allow(missing_docs)]
    pub fn global_volume(&self) -> f32 {
        self.global_volume
    }

    #[allow(missing_docs)]
    pub fn set_global_volume(&mut self, global_volume: f32) {
        self.global_volume = global_volume;
        self.needs_save();
    }

    /// Whether the main mix captures waveform and peak data.
    pub fn visualization(&self) -> bool {
        self.visualization
    }

    #[allow(missing_docs)]
    pub fn set_visualization(&mut self, visualization: bool) {
        self.visualization = visualization;
        self.needs_save();
    }

    /// Whether 3D coordinates are left-handed.
    pub fn left_handed_3d(&self) -> bool {
        self.left_handed_3d
    }

    #[allow(missing_docs)]
    pub fn set_left_handed_3d(&mut self, left_handed_3d: bool) {
        self.left_handed_3d = left_handed_3d;
        self.needs_save();
    }

    /// Speed of sound for doppler and distance delay, in world units per
    /// second.
    pub fn sound_speed(&self) -> f32 {
        self.sound_speed
    }

    #[allow(missing_docs)]
    pub fn set_sound_speed(&mut self, sound_speed: f32) {
        self.sound_speed = sound_speed;
        self.needs_save();
    }

    /// Serializes to JSON.
    pub fn to_json(&self) -> anyhow::Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Deserializes from JSON. Missing fields take their defaults.
    pub fn from_json(json: &str) -> anyhow::Result<Self> {
        let mut settings: Self = serde_json::from_str(json)?;
        settings.mark_clean();
        Ok(settings)
    }
}
