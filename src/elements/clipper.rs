// Copyright (c) 2024 Mike Tsao

use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumIter, IntoStaticStr};

/// The last stage of the main mix, which keeps summed voices inside [-1, 1].
#[derive(
    Clone, Copy, Debug, Default, Display, EnumIter, IntoStaticStr, PartialEq, Eq, Serialize, Deserialize,
)]
#[serde(rename_all = "kebab-case")]
pub enum Clipper {
    /// A cubic soft knee that reaches full scale gently.
    #[default]
    RoundOff,
    /// Clamp.
    Hard,
}
impl Clipper {
    const ROUNDOFF_KNEE: f32 = 1.65;
    const ROUNDOFF_CEILING: f32 = 0.986_287_5;

    /// Applies the volume ramp, the clipper curve, and then the post-clip
    /// scaler to a planar buffer, in place. Volume moves linearly from
    /// `volume_start` to `volume_end` across each channel's `frames` samples.
    #[allow(clippy::too_many_arguments)]
    pub fn clip(
        &self,
        buffer: &mut [f32],
        channels: usize,
        stride: usize,
        frames: usize,
        volume_start: f32,
        volume_end: f32,
        post_clip_scaler: f32,
    ) {
        let volume_step = if frames > 0 {
            (volume_end - volume_start) / frames as f32
        } else {
            0.0
        };
        for channel in buffer.chunks_mut(stride).take(channels) {
            let mut volume = volume_start;
            for sample in channel.iter_mut().take(frames) {
                let f = *sample * volume;
                volume += volume_step;
                *sample = self.shape(f) * post_clip_scaler;
            }
        }
    }

    /// The clipper curve for one sample.
    pub fn shape(&self, f: f32) -> f32 {
        match self {
            Clipper::RoundOff => {
                if f <= -Self::ROUNDOFF_KNEE {
                    -Self::ROUNDOFF_CEILING
                } else if f >= Self::ROUNDOFF_KNEE {
                    Self::ROUNDOFF_CEILING
                } else {
                    0.87 * f - 0.1 * f * f * f
                }
            }
            Clipper::Hard => f.clamp(-1.0, 1.0),
        }
    }
}
