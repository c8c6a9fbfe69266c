// Copyright (c) 2024 Mike Tsao

//! The 3D pass: where each 3D voice sits relative to the listener, and what
//! that does to its gain, pitch, and speaker balance.

use super::{engine_core::EngineCore, SourceSettings};
use crate::{
    elements::{default_speakers, doppler, look_at, speaker_gain, AttenuationModel},
    prelude::*,
    types::{INAUDIBLE_THRESHOLD, MAX_CHANNELS},
};
use derivative::Derivative;
use std::sync::Arc;

/// A voice's spatial state. The engine keeps one per voice-table slot, and the
/// 3D pass works on copies so it can run without holding the engine lock.
#[derive(Clone, Debug, Derivative)]
#[derivative(Default)]
pub struct Voice3dData {
    /// The voice this data belonged to when it was copied.
    pub handle: Handle,
    #[allow(missing_docs)]
    pub process_3d: bool,
    /// Position is relative to the listener rather than the world.
    pub listener_relative: bool,
    #[derivative(Default(value = "Vec3::zeros()"))]
    #[allow(missing_docs)]
    pub position: Vec3,
    #[derivative(Default(value = "Vec3::zeros()"))]
    #[allow(missing_docs)]
    pub velocity: Vec3,
    #[derivative(Default(value = "1.0"))]
    #[allow(missing_docs)]
    pub min_distance: f32,
    #[derivative(Default(value = "1_000_000.0"))]
    #[allow(missing_docs)]
    pub max_distance: f32,
    #[derivative(Default(value = "1.0"))]
    #[allow(missing_docs)]
    pub rolloff: f32,
    #[allow(missing_docs)]
    pub attenuation_model: AttenuationModel,
    #[derivative(Default(value = "1.0"))]
    #[allow(missing_docs)]
    pub doppler_factor: f32,
    #[allow(missing_docs)]
    pub collider: Option<Arc<dyn AudioCollider>>,
    #[allow(missing_docs)]
    pub collider_data: i32,
    #[allow(missing_docs)]
    pub attenuator: Option<Arc<dyn AudioAttenuator>>,

    /// Speaker gains from the last 3D pass.
    pub channel_volume: ChannelVolumes,
    /// Pitch multiplier from the last 3D pass.
    #[derivative(Default(value = "1.0"))]
    pub doppler_value: f32,
    /// Volume from the last 3D pass, before speaker gains.
    #[derivative(Default(value = "1.0"))]
    pub volume_3d: f32,
}
impl Voice3dData {
    pub(crate) fn new(settings: &SourceSettings, handle: Handle) -> Self {
        let (collider, collider_data) = settings.collider();
        Self {
            handle,
            process_3d: settings.flags().process_3d,
            listener_relative: settings.flags().listener_relative,
            min_distance: settings.min_distance(),
            max_distance: settings.max_distance(),
            rolloff: settings.rolloff(),
            attenuation_model: settings.attenuation_model(),
            doppler_factor: settings.doppler_factor(),
            collider: collider.cloned(),
            collider_data,
            attenuator: settings.attenuator().cloned(),
            ..Default::default()
        }
    }

    /// Runs the 3D math for this voice against `scene`, storing speaker gains,
    /// doppler, and volume.
    pub(crate) fn compute(&mut self, scene: &Scene) {
        let mut volume = self
            .collider
            .as_ref()
            .map_or(1.0, |c| c.collide(self, self.collider_data));

        let mut position = self.position;
        if !self.listener_relative {
            position -= scene.listener.position;
        }
        let distance = position.norm();
        volume *= match &self.attenuator {
            Some(a) => a.attenuate(distance, self.min_distance, self.max_distance, self.rolloff),
            None => self.attenuation_model.attenuate(
                distance,
                self.min_distance,
                self.max_distance,
                self.rolloff,
            ),
        };

        self.doppler_value = doppler(
            &position,
            &self.velocity,
            &scene.listener.velocity,
            self.doppler_factor,
            scene.sound_speed,
        );

        let direction = (scene.orientation * position)
            .try_normalize(f32::EPSILON)
            .unwrap_or_else(Vec3::zeros);
        for (channel, gain) in self.channel_volume.iter_mut().enumerate() {
            *gain = if channel < scene.channels {
                volume * speaker_gain(&scene.speakers[channel], &direction)
            } else {
                0.0
            };
        }
        self.volume_3d = volume;
    }
}

/// Where the listener is and which way it faces.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Listener {
    #[allow(missing_docs)]
    pub position: Vec3,
    /// The direction the listener faces.
    pub at: Vec3,
    #[allow(missing_docs)]
    pub up: Vec3,
    #[allow(missing_docs)]
    pub velocity: Vec3,
}
impl Default for Listener {
    fn default() -> Self {
        Self {
            position: Vec3::zeros(),
            at: Vec3::new(0.0, 0.0, -1.0),
            up: Vec3::new(0.0, 1.0, 0.0),
            velocity: Vec3::zeros(),
        }
    }
}

/// Everything global the 3D math needs, captured once per pass.
#[derive(Clone, Debug)]
pub(crate) struct Scene {
    listener: Listener,
    orientation: nalgebra::Matrix3<f32>,
    speakers: [Vec3; MAX_CHANNELS],
    sound_speed: f32,
    channels: usize,
}

/// The engine's 3D configuration.
#[derive(Clone, Debug)]
pub(crate) struct Spatializer {
    pub(crate) listener: Listener,
    pub(crate) speakers: [Vec3; MAX_CHANNELS],
    pub(crate) sound_speed: f32,
    pub(crate) left_handed: bool,
}
impl Spatializer {
    pub(crate) const DEFAULT_SOUND_SPEED: f32 = 343.3;

    pub(crate) fn new(channels: usize, sound_speed: f32, left_handed: bool) -> Self {
        Self {
            listener: Default::default(),
            speakers: default_speakers(channels),
            sound_speed,
            left_handed,
        }
    }

    pub(crate) fn scene(&self, channels: usize) -> Scene {
        let mut speakers = self.speakers;
        for speaker in speakers.iter_mut() {
            *speaker = speaker.try_normalize(f32::EPSILON).unwrap_or_else(Vec3::zeros);
        }
        Scene {
            listener: self.listener,
            orientation: look_at(&self.listener.at, &self.listener.up, self.left_handed),
            speakers,
            sound_speed: self.sound_speed,
            channels,
        }
    }
}

impl EngineCore {
    /// Copies the 3D state of every 3D voice into `snapshot` and returns the
    /// scene to evaluate it against. Doesn't allocate while `snapshot` has
    /// room.
    pub(crate) fn snapshot_3d(&self, snapshot: &mut Vec<(usize, Voice3dData)>) -> Scene {
        snapshot.clear();
        for (slot, voice) in self.voices.iter() {
            if voice.state.flags.process_3d && snapshot.len() < snapshot.capacity() {
                if let Some(data) = self.voices.spatial(slot) {
                    let mut data = data.clone();
                    data.listener_relative = voice.state.flags.listener_relative;
                    snapshot.push((slot, data));
                }
            }
        }
        self.spatializer.scene(self.channels)
    }

    /// Writes computed 3D results back into voices that still exist.
    pub(crate) fn apply_3d(&mut self, results: &[(usize, Voice3dData)]) {
        for (slot, computed) in results {
            let slot = *slot;
            let Some((voice, data)) = self.voices.get_with_spatial_mut(slot) else {
                continue;
            };
            if data.handle != computed.handle {
                // The slot was reused while the pass ran unlocked.
                continue;
            }
            data.channel_volume = computed.channel_volume;
            data.doppler_value = computed.doppler_value;
            data.volume_3d = computed.volume_3d;

            voice.state.update_relative_play_speed(data.doppler_value);
            voice.state.channel_volume = data.channel_volume;
            voice.state.update_volume(data.volume_3d);
            self.update_audibility(slot, INAUDIBLE_THRESHOLD);
        }
    }

    /// Runs the 3D math for one voice immediately. Used when a 3D voice starts
    /// so that its first tick already has the right gains.
    pub(crate) fn update_3d_voice(&mut self, slot: usize) {
        let scene = self.spatializer.scene(self.channels);
        let Some((voice, data)) = self.voices.get_with_spatial_mut(slot) else {
            return;
        };
        data.listener_relative = voice.state.flags.listener_relative;
        data.compute(&scene);
        voice.state.update_relative_play_speed(data.doppler_value);
        voice.state.channel_volume = data.channel_volume;
        voice.state.update_volume(data.volume_3d);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use float_cmp::approx_eq;
    use more_asserts::assert_gt;

    fn scene() -> Scene {
        Spatializer::new(2, Spatializer::DEFAULT_SOUND_SPEED, false).scene(2)
    }

    #[derive(Debug)]
    struct HalfWall;
    impl AudioCollider for HalfWall {
        fn collide(&self, _: &Voice3dData, user_data: i32) -> f32 {
            user_data as f32 / 100.0
        }
    }

    #[derive(Debug)]
    struct Constant;
    impl AudioAttenuator for Constant {
        fn attenuate(&self, _: f32, _: f32, _: f32, _: f32) -> f32 {
            0.25
        }
    }

    #[test]
    fn compute_attenuates_and_pans() {
        let mut data = Voice3dData {
            position: Vec3::new(10.0, 0.0, 0.0),
            attenuation_model: AttenuationModel::InverseDistance,
            max_distance: 100.0,
            ..Default::default()
        };
        data.compute(&scene());
        assert!(approx_eq!(f32, data.volume_3d, 0.1, epsilon = 0.0001));
        assert_gt!(
            data.channel_volume[1],
            data.channel_volume[0],
            "a source to the right should favor the right speaker"
        );
        assert_eq!(data.channel_volume[2], 0.0, "unused channels get nothing");
        assert_eq!(data.doppler_value, 1.0);
    }

    #[test]
    fn listener_relative_ignores_listener_position() {
        let mut s = Spatializer::new(2, Spatializer::DEFAULT_SOUND_SPEED, false);
        s.listener.position = Vec3::new(1000.0, 0.0, 0.0);
        let scene = s.scene(2);
        let mut data = Voice3dData {
            position: Vec3::new(0.0, 0.0, -1.0),
            attenuation_model: AttenuationModel::LinearDistance,
            max_distance: 10.0,
            listener_relative: true,
            ..Default::default()
        };
        data.compute(&scene);
        assert_eq!(data.volume_3d, 1.0);
        assert!(approx_eq!(f32, data.channel_volume[0], data.channel_volume[1]));
    }

    #[test]
    fn collider_and_attenuator_take_over() {
        let mut data = Voice3dData {
            position: Vec3::new(0.0, 0.0, -50.0),
            attenuation_model: AttenuationModel::InverseDistance,
            collider: Some(Arc::new(HalfWall)),
            collider_data: 50,
            attenuator: Some(Arc::new(Constant)),
            ..Default::default()
        };
        data.compute(&scene());
        assert!(approx_eq!(f32, data.volume_3d, 0.125));
    }
}
