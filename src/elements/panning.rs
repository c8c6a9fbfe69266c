// Copyright (c) 2024 Mike Tsao

//! Pan laws and the channel mapping used when a voice's channel count differs
//! from its destination's.

use crate::types::{ChannelVolumes, MAX_CHANNELS};
use core::f32::consts::{FRAC_1_SQRT_2, FRAC_PI_4};

/// Per-channel gains for `pan` in [-1, 1] on an output with `channels`
/// channels, using a constant-power law. Channels the layout doesn't mention
/// keep a gain of 1.0.
pub fn pan_channel_volumes(pan: f32, channels: usize) -> ChannelVolumes {
    let left = ((pan + 1.0) * FRAC_PI_4).cos();
    let right = ((pan + 1.0) * FRAC_PI_4).sin();
    let mut volumes = [1.0; MAX_CHANNELS];
    volumes[0] = left;
    volumes[1] = right;
    match channels {
        4 => {
            volumes[2] = left;
            volumes[3] = right;
        }
        6 => {
            volumes[2] = FRAC_1_SQRT_2;
            volumes[3] = 1.0;
            volumes[4] = left;
            volumes[5] = right;
        }
        8 => {
            volumes[2] = FRAC_1_SQRT_2;
            volumes[3] = 1.0;
            volumes[4] = left;
            volumes[5] = right;
            volumes[6] = left;
            volumes[7] = right;
        }
        _ => {}
    }
    volumes
}

/// Per-channel gains from explicit left and right volumes. Center channels
/// get the average of the two.
pub fn absolute_channel_volumes(left: f32, right: f32, channels: usize) -> ChannelVolumes {
    let center = (left + right) * 0.5;
    let mut volumes = [1.0; MAX_CHANNELS];
    volumes[0] = left;
    volumes[1] = right;
    match channels {
        4 => {
            volumes[2] = left;
            volumes[3] = right;
        }
        6 => {
            volumes[2] = center;
            volumes[3] = center;
            volumes[4] = left;
            volumes[5] = right;
        }
        8 => {
            volumes[2] = center;
            volumes[3] = center;
            volumes[4] = left;
            volumes[5] = right;
            volumes[6] = left;
            volumes[7] = right;
        }
        _ => {}
    }
    volumes
}

/// How much of each source channel lands in each destination channel.
/// Layouts follow the usual order: left, right, then center and LFE for 5.1
/// and 7.1, then surrounds.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ChannelMap {
    weights: [[f32; MAX_CHANNELS]; MAX_CHANNELS],
}
impl ChannelMap {
    /// Builds the map for a `source`-channel voice feeding a
    /// `destination`-channel mix.
    pub fn new(source: usize, destination: usize) -> Self {
        let source = source.clamp(1, MAX_CHANNELS);
        let destination = destination.clamp(1, MAX_CHANNELS);
        let mut w = [[0.0; MAX_CHANNELS]; MAX_CHANNELS];

        if destination == 1 || source == 1 {
            // Everything folds into mono, or mono spreads everywhere.
            for row in w.iter_mut().take(destination) {
                row.iter_mut().take(source).for_each(|x| *x = 1.0);
            }
            return Self { weights: w };
        }

        match (source, destination) {
            (8, 2) => {
                for s in [0, 2, 3, 4, 6] {
                    w[0][s] = 0.2;
                }
                for s in [1, 2, 3, 5, 7] {
                    w[1][s] = 0.2;
                }
            }
            (6, 2) => {
                for s in [0, 2, 3, 4] {
                    w[0][s] = 0.3;
                }
                for s in [1, 2, 3, 5] {
                    w[1][s] = 0.3;
                }
            }
            (4, 2) => {
                w[0][0] = 0.5;
                w[0][2] = 0.5;
                w[1][1] = 0.5;
                w[1][3] = 0.5;
            }
            (8, 4) | (6, 4) => {
                w[0][0] = 1.0;
                w[0][2] = 0.7;
                w[0][3] = 0.7;
                w[1][1] = 1.0;
                w[1][2] = 0.7;
                w[1][3] = 0.7;
                if source == 8 {
                    w[2][4] = 0.5;
                    w[2][6] = 0.5;
                    w[3][5] = 0.5;
                    w[3][7] = 0.5;
                } else {
                    w[2][4] = 1.0;
                    w[3][5] = 1.0;
                }
            }
            (2, 4) => {
                w[0][0] = 1.0;
                w[1][1] = 1.0;
                w[2][0] = 1.0;
                w[3][1] = 1.0;
            }
            (8, 6) => {
                for c in 0..4 {
                    w[c][c] = 1.0;
                }
                w[4][4] = 0.5;
                w[4][6] = 0.5;
                w[5][5] = 0.5;
                w[5][7] = 0.5;
            }
            (4, 6) | (4, 8) => {
                w[0][0] = 1.0;
                w[1][1] = 1.0;
                w[2][0] = 0.5;
                w[2][1] = 0.5;
                for s in 0..4 {
                    w[3][s] = 0.25;
                }
                let rear = if destination == 6 { 1.0 } else { 0.5 };
                w[4][2] = rear;
                w[5][3] = rear;
                if destination == 8 {
                    w[6][2] = 0.5;
                    w[7][3] = 0.5;
                }
            }
            (2, 6) | (2, 8) => {
                w[0][0] = 1.0;
                w[1][1] = 1.0;
                w[2][0] = 0.5;
                w[2][1] = 0.5;
                w[3][0] = 0.5;
                w[3][1] = 0.5;
                for c in (4..destination).step_by(2) {
                    w[c][0] = 1.0;
                    w[c + 1][1] = 1.0;
                }
            }
            (6, 8) => {
                for c in 0..4 {
                    w[c][c] = 1.0;
                }
                w[4][4] = 0.5;
                w[5][5] = 0.5;
                w[6][4] = 0.5;
                w[7][5] = 0.5;
            }
            _ => {
                // Same layout, or one we have no opinion about: pass channels
                // straight through and drop the extras.
                for c in 0..source.min(destination) {
                    w[c][c] = 1.0;
                }
            }
        }
        Self { weights: w }
    }

    /// The weights that feed destination channel `channel`, indexed by source
    /// channel.
    pub fn weights_for(&self, channel: usize) -> &[f32; MAX_CHANNELS] {
        &self.weights[channel]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use float_cmp::approx_eq;

    #[test]
    fn constant_power_pan() {
        let center = pan_channel_volumes(0.0, 2);
        assert!(approx_eq!(f32, center[0], FRAC_1_SQRT_2, epsilon = 0.0001));
        assert!(approx_eq!(f32, center[1], FRAC_1_SQRT_2, epsilon = 0.0001));

        let hard_left = pan_channel_volumes(-1.0, 2);
        assert!(approx_eq!(f32, hard_left[0], 1.0, epsilon = 0.0001));
        assert!(approx_eq!(f32, hard_left[1], 0.0, epsilon = 0.0001));

        for i in -10..=10 {
            let v = pan_channel_volumes(i as f32 / 10.0, 2);
            assert!(
                approx_eq!(f32, v[0] * v[0] + v[1] * v[1], 1.0, epsilon = 0.0001),
                "power should be constant across the pan range"
            );
        }
    }

    #[test]
    fn surround_pan_layouts() {
        let v = pan_channel_volumes(1.0, 6);
        assert!(approx_eq!(f32, v[2], FRAC_1_SQRT_2));
        assert_eq!(v[3], 1.0);
        assert!(approx_eq!(f32, v[5], 1.0, epsilon = 0.0001));
        assert!(approx_eq!(f32, v[4], 0.0, epsilon = 0.0001));

        let v = pan_channel_volumes(-1.0, 8);
        assert!(approx_eq!(f32, v[6], 1.0, epsilon = 0.0001));
        assert!(approx_eq!(f32, v[7], 0.0, epsilon = 0.0001));
    }

    #[test]
    fn absolute_pan_centers() {
        let v = absolute_channel_volumes(0.2, 0.6, 6);
        assert_eq!(v[0], 0.2);
        assert_eq!(v[1], 0.6);
        assert!(approx_eq!(f32, v[2], 0.4));
        assert!(approx_eq!(f32, v[3], 0.4));
        assert_eq!(v[4], 0.2);
        assert_eq!(v[5], 0.6);
    }

    #[test]
    fn channel_maps() {
        let mono_to_stereo = ChannelMap::new(1, 2);
        assert_eq!(mono_to_stereo.weights_for(0)[0], 1.0);
        assert_eq!(mono_to_stereo.weights_for(1)[0], 1.0);

        let stereo_to_mono = ChannelMap::new(2, 1);
        assert_eq!(stereo_to_mono.weights_for(0)[..2], [1.0, 1.0]);

        let stereo = ChannelMap::new(2, 2);
        assert_eq!(stereo.weights_for(0)[..2], [1.0, 0.0]);
        assert_eq!(stereo.weights_for(1)[..2], [0.0, 1.0]);

        let quad_to_stereo = ChannelMap::new(4, 2);
        assert_eq!(quad_to_stereo.weights_for(0)[..4], [0.5, 0.0, 0.5, 0.0]);

        let stereo_to_71 = ChannelMap::new(2, 8);
        assert_eq!(stereo_to_71.weights_for(6)[..2], [1.0, 0.0]);
        assert_eq!(stereo_to_71.weights_for(7)[..2], [0.0, 1.0]);
    }
}
