// Copyright (c) 2024 Mike Tsao

//! The math behind 3D audio: distance attenuation, doppler shift, and how a
//! direction maps onto speaker gains.

use crate::types::Vec3;
use nalgebra::Matrix3;
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumIter, FromRepr, IntoStaticStr};

/// How a 3D voice gets quieter as it moves away from the listener. Every model
/// clamps the distance to the voice's `[min, max]` range first.
#[derive(
    Clone,
    Copy,
    Debug,
    Default,
    Display,
    EnumIter,
    FromRepr,
    IntoStaticStr,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
)]
#[serde(rename_all = "kebab-case")]
pub enum AttenuationModel {
    /// Distance doesn't matter.
    #[default]
    None,
    /// `min / (min + rolloff * (d - min))`
    InverseDistance,
    /// `1 - rolloff * (d - min) / (max - min)`
    LinearDistance,
    /// `(d / min) ^ -rolloff`
    ExponentialDistance,
}
impl AttenuationModel {
    /// Gain at `distance` for a voice with the given range and rolloff.
    pub fn attenuate(&self, distance: f32, min_distance: f32, max_distance: f32, rolloff: f32) -> f32 {
        match self {
            AttenuationModel::None => 1.0,
            AttenuationModel::InverseDistance => {
                let d = distance.clamp(min_distance, max_distance);
                min_distance / (min_distance + rolloff * (d - min_distance))
            }
            AttenuationModel::LinearDistance => {
                let d = distance.clamp(min_distance, max_distance);
                let range = max_distance - min_distance;
                if range <= 0.0 {
                    1.0
                } else {
                    1.0 - rolloff * (d - min_distance) / range
                }
            }
            AttenuationModel::ExponentialDistance => {
                let d = distance.clamp(min_distance, max_distance);
                if min_distance <= 0.0 {
                    1.0
                } else {
                    (d / min_distance).powf(-rolloff)
                }
            }
        }
    }
}

/// The pitch multiplier for a source at `position` relative to the listener.
///
/// Radial speeds are capped at `speed_of_sound / factor` so a source moving
/// at or above the speed of sound doesn't divide by zero.
pub fn doppler(
    position: &Vec3,
    source_velocity: &Vec3,
    listener_velocity: &Vec3,
    factor: f32,
    speed_of_sound: f32,
) -> f32 {
    let length = position.norm();
    if length == 0.0 {
        return 1.0;
    }
    let cap = if factor != 0.0 {
        speed_of_sound / factor
    } else {
        f32::MAX
    };
    let listener_speed = (position.dot(listener_velocity) / length).min(cap);
    let source_speed = (position.dot(source_velocity) / length).min(cap);
    let denominator = speed_of_sound - factor * source_speed;
    if denominator == 0.0 {
        return 1.0;
    }
    (speed_of_sound - factor * listener_speed) / denominator
}

/// Rotation that takes world-space directions into listener space, given
/// where the listener faces (`at`) and which way is up.
pub fn look_at(at: &Vec3, up: &Vec3, left_handed: bool) -> Matrix3<f32> {
    let z = at.try_normalize(f32::EPSILON).unwrap_or_else(|| Vec3::new(0.0, 0.0, -1.0));
    let x = up
        .cross(&z)
        .try_normalize(f32::EPSILON)
        .unwrap_or_else(|| Vec3::new(1.0, 0.0, 0.0));
    let y = z.cross(&x);
    let x = if left_handed { -x } else { x };
    Matrix3::from_rows(&[x.transpose(), y.transpose(), z.transpose()])
}

/// How much of a sound coming from `direction` (a unit vector in listener
/// space) a speaker at `speaker` (also normalized) receives. A speaker at the
/// origin hears everything at full volume.
pub fn speaker_gain(speaker: &Vec3, direction: &Vec3) -> f32 {
    if *speaker == Vec3::zeros() {
        1.0
    } else {
        (speaker.dot(direction) + 1.0) / 2.0
    }
}

/// The default speaker layout for an output with `channels` channels.
pub fn default_speakers(channels: usize) -> [Vec3; crate::types::MAX_CHANNELS] {
    let mut speakers = [Vec3::zeros(); crate::types::MAX_CHANNELS];
    let layout: &[(f32, f32, f32)] = match channels {
        2 => &[(2.0, 0.0, 1.0), (-2.0, 0.0, 1.0)],
        4 => &[
            (2.0, 0.0, 1.0),
            (-2.0, 0.0, 1.0),
            (2.0, 0.0, -1.0),
            (-2.0, 0.0, -1.0),
        ],
        6 => &[
            (2.0, 0.0, 1.0),
            (-2.0, 0.0, 1.0),
            (0.0, 0.0, 1.0),
            (0.0, 0.0, 0.0),
            (2.0, 0.0, -1.0),
            (-2.0, 0.0, -1.0),
        ],
        8 => &[
            (2.0, 0.0, 1.0),
            (-2.0, 0.0, 1.0),
            (0.0, 0.0, 1.0),
            (0.0, 0.0, 0.0),
            (2.0, 0.0, -1.0),
            (-2.0, 0.0, -1.0),
            (2.0, 0.0, 0.0),
            (-2.0, 0.0, 0.0),
        ],
        _ => &[],
    };
    for (speaker, (x, y, z)) in speakers.iter_mut().zip(layout) {
        *speaker = Vec3::new(*x, *y, *z);
    }
    speakers
}

#[cfg(test)]
mod tests {
    use super::*;
    use float_cmp::approx_eq;
    use more_asserts::{assert_gt, assert_lt};
    use strum::IntoEnumIterator;

    #[test]
    fn attenuation_is_unity_at_min_distance() {
        for model in AttenuationModel::iter() {
            for rolloff in [0.1, 0.5, 1.0, 2.0, 7.5] {
                assert!(
                    approx_eq!(f32, model.attenuate(3.0, 3.0, 100.0, rolloff), 1.0),
                    "{model} with rolloff {rolloff} should have unity gain at min distance"
                );
            }
        }
    }

    #[test]
    fn attenuation_clamps_distance() {
        for model in AttenuationModel::iter() {
            let at_max = model.attenuate(50.0, 1.0, 50.0, 1.0);
            let beyond = model.attenuate(100.0, 1.0, 50.0, 1.0);
            assert_eq!(at_max, beyond, "{model} should clamp to max distance");
            let inside = model.attenuate(0.1, 1.0, 50.0, 1.0);
            assert_eq!(inside, 1.0, "{model} should clamp to min distance");
        }
        assert!(approx_eq!(
            f32,
            AttenuationModel::InverseDistance.attenuate(3.0, 1.0, 10.0, 1.0),
            1.0 / 3.0
        ));
        assert!(approx_eq!(
            f32,
            AttenuationModel::LinearDistance.attenuate(10.0, 1.0, 10.0, 1.0),
            0.0
        ));
        assert!(approx_eq!(
            f32,
            AttenuationModel::ExponentialDistance.attenuate(4.0, 2.0, 10.0, 2.0),
            0.25
        ));
    }

    #[test]
    fn doppler_shifts_pitch() {
        let position = Vec3::new(0.0, 0.0, 10.0);
        let still = Vec3::zeros();
        assert_eq!(doppler(&position, &still, &still, 1.0, 343.3), 1.0);
        assert_eq!(doppler(&Vec3::zeros(), &still, &still, 1.0, 343.3), 1.0);

        let away = Vec3::new(0.0, 0.0, 30.0);
        let toward = Vec3::new(0.0, 0.0, -30.0);
        assert_gt!(doppler(&position, &away, &still, 1.0, 343.3), 1.0);
        assert_lt!(doppler(&position, &toward, &still, 1.0, 343.3), 1.0);

        let supersonic = Vec3::new(0.0, 0.0, 1000.0);
        let result = doppler(&position, &supersonic, &still, 1.0, 343.3);
        assert!(result.is_finite(), "capped speed should stay finite");
    }

    #[test]
    fn look_at_and_speaker_gain() {
        let m = look_at(&Vec3::new(0.0, 0.0, -1.0), &Vec3::new(0.0, 1.0, 0.0), false);
        let ahead = (m * Vec3::new(0.0, 0.0, -5.0)).normalize();
        assert!(approx_eq!(f32, ahead.z, 1.0, epsilon = 0.0001));

        let speakers = default_speakers(2);
        let left = speakers[0].normalize();
        let right = speakers[1].normalize();
        let side = (m * Vec3::new(5.0, 0.0, 0.0)).normalize();
        assert!(
            speaker_gain(&left, &side) != speaker_gain(&right, &side),
            "a sound off to one side should favor one speaker"
        );
        let flipped = look_at(&Vec3::new(0.0, 0.0, -1.0), &Vec3::new(0.0, 1.0, 0.0), true);
        let side_lh = (flipped * Vec3::new(5.0, 0.0, 0.0)).normalize();
        assert!(approx_eq!(f32, side_lh.x, -side.x, epsilon = 0.0001));

        assert_eq!(speaker_gain(&Vec3::zeros(), &side), 1.0);
    }
}
