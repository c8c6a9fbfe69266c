// Copyright (c) 2024 Mike Tsao

use crate::types::{FIXPOINT_FRAC_BITS, FIXPOINT_FRAC_MASK, FIXPOINT_FRAC_MUL};
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumIter, FromRepr, IntoStaticStr};

/// How the mixer turns a voice's source samples into output-rate samples.
///
/// The playhead is a 16.16 fixed-point position into the current source block.
/// A step of exactly [FIXPOINT_FRAC_MUL] means the voice plays at the output
/// rate; larger steps raise pitch, smaller steps lower it.
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
pub enum Resampler {
    /// Nearest earlier sample. Cheapest, and aliases the most.
    Point,
    /// Straight line between neighboring samples.
    #[default]
    Linear,
    /// Cubic Catmull-Rom spline through four neighboring samples.
    CatmullRom,
}
impl Resampler {
    /// Writes `dst.len()` output samples for one channel.
    ///
    /// `src` is the channel's current source block and `prev` the block before
    /// it. `src_offset` is the playhead at the first output sample, and the
    /// playhead advances by `step` for each sample after that.
    ///
    /// The interpolators never look past the playhead, so a block can be
    /// resampled without the one after it. Instead they read history from
    /// `prev`, which costs one sample of latency for [Resampler::Linear] and
    /// two for [Resampler::CatmullRom].
    pub fn resample(&self, src: &[f32], prev: &[f32], dst: &mut [f32], src_offset: u32, step: u32) {
        if src.is_empty() {
            dst.fill(0.0);
            return;
        }
        let history = History { src, prev };
        let mut position = src_offset;
        for out in dst.iter_mut() {
            let (index, fraction) = split_position(position, src.len());
            *out = match self {
                Resampler::Point => src[index],
                Resampler::Linear => {
                    let s0 = history.at(index, 1);
                    let s1 = src[index];
                    s0 + (s1 - s0) * fraction
                }
                Resampler::CatmullRom => catmull_rom(
                    fraction,
                    history.at(index, 3),
                    history.at(index, 2),
                    history.at(index, 1),
                    src[index],
                ),
            };
            position = position.wrapping_add(step);
        }
    }
}

/// Reads samples behind the playhead, reaching into the previous block when
/// the playhead is near the start of the current one.
struct History<'a> {
    src: &'a [f32],
    prev: &'a [f32],
}
impl History<'_> {
    #[inline]
    fn at(&self, index: usize, back: usize) -> f32 {
        if index >= back {
            self.src[index - back]
        } else {
            let from_end = back - index;
            self.prev
                .len()
                .checked_sub(from_end)
                .map_or(0.0, |i| self.prev[i])
        }
    }
}

#[inline]
fn split_position(position: u32, len: usize) -> (usize, f32) {
    let index = ((position >> FIXPOINT_FRAC_BITS) as usize).min(len - 1);
    let fraction = (position & FIXPOINT_FRAC_MASK) as f32 / FIXPOINT_FRAC_MUL as f32;
    (index, fraction)
}

/// Interpolates between `p1` and `p2`.
#[inline]
fn catmull_rom(t: f32, p0: f32, p1: f32, p2: f32, p3: f32) -> f32 {
    0.5 * ((2.0 * p1)
        + (-p0 + p2) * t
        + (2.0 * p0 - 5.0 * p1 + 4.0 * p2 - p3) * t * t
        + (-p0 + 3.0 * p1 - 3.0 * p2 + p3) * t * t * t)
}

#[cfg(test)]
mod tests {
    use super::*;
    use float_cmp::approx_eq;

    fn wave(len: usize) -> Vec<f32> {
        (0..len).map(|i| (i as f32 * 0.37).sin()).collect()
    }

    /// Resamples `blocks` consecutive blocks of `source`, carrying the
    /// playhead from one block to the next the way the mixer does.
    fn resample_blocks(
        resampler: Resampler,
        source: &[f32],
        block: usize,
        step: u32,
    ) -> Vec<f32> {
        let block_fixed = block as u32 * FIXPOINT_FRAC_MUL;
        let silence = vec![0.0; block];
        let mut out = Vec::new();
        let mut offset = 0;
        for (i, src) in source.chunks_exact(block).enumerate() {
            let prev = if i == 0 {
                &silence[..]
            } else {
                &source[(i - 1) * block..i * block]
            };
            let count = ((block_fixed - offset + step - 1) / step) as usize;
            let mut dst = vec![0.0; count];
            resampler.resample(src, prev, &mut dst, offset, step);
            out.extend(dst);
            offset = offset + count as u32 * step - block_fixed;
        }
        out
    }

    #[test]
    fn point_resampler_is_exact() {
        let src = wave(32);
        let mut dst = vec![0.0; 32];
        Resampler::Point.resample(&src, &[], &mut dst, 0, FIXPOINT_FRAC_MUL);
        assert_eq!(src, dst, "point sampling at 1:1 must be bit-exact");
    }

    #[test]
    fn unity_step_reproduces_source_after_latency() {
        let src = wave(64);
        let prev = wave(128)[64..].to_vec();
        for (resampler, latency) in [(Resampler::Linear, 1), (Resampler::CatmullRom, 2)] {
            let mut dst = vec![0.0; 64];
            resampler.resample(&src, &prev, &mut dst, 0, FIXPOINT_FRAC_MUL);
            for i in latency..64 {
                assert!(
                    approx_eq!(f32, dst[i], src[i - latency], epsilon = f32::EPSILON * 4.0),
                    "{resampler} at 1:1 should reproduce sample {} at {i}",
                    i - latency
                );
            }
            assert_eq!(
                dst[latency - 1],
                prev[63],
                "{resampler} should start from the previous block"
            );
        }
    }

    #[test]
    fn double_step_skips_samples() {
        let src: Vec<f32> = (0..16).map(|i| i as f32).collect();
        let mut dst = vec![0.0; 8];
        Resampler::Point.resample(&src, &[], &mut dst, 0, FIXPOINT_FRAC_MUL * 2);
        assert_eq!(dst, vec![0.0, 2.0, 4.0, 6.0, 8.0, 10.0, 12.0, 14.0]);
    }

    #[test]
    fn half_step_interpolates_linearly() {
        let src: Vec<f32> = (0..8).map(|i| i as f32).collect();
        let prev: Vec<f32> = (0..8).map(|i| i as f32 - 8.0).collect();
        let mut dst = vec![0.0; 8];
        Resampler::Linear.resample(&src, &prev, &mut dst, 0, FIXPOINT_FRAC_MUL / 2);
        assert_eq!(dst, vec![-1.0, -0.5, 0.0, 0.5, 1.0, 1.5, 2.0, 2.5]);
    }

    #[test]
    fn fractional_steps_stay_smooth_across_blocks() {
        let ramp: Vec<f32> = (0..64).map(|i| i as f32).collect();
        for resampler in [Resampler::Linear, Resampler::CatmullRom] {
            for step in [FIXPOINT_FRAC_MUL / 2, FIXPOINT_FRAC_MUL * 3 / 4] {
                let out = resample_blocks(resampler, &ramp, 8, step);
                let expected = step as f32 / FIXPOINT_FRAC_MUL as f32;
                // Skip the warm-up, where history is still silence.
                let warm = 3 * FIXPOINT_FRAC_MUL as usize / step as usize + 1;
                for (i, pair) in out.windows(2).enumerate().skip(warm) {
                    assert!(
                        approx_eq!(f32, pair[1] - pair[0], expected, epsilon = 0.0001),
                        "{resampler} jumped by {} at {i} with step {expected}",
                        pair[1] - pair[0]
                    );
                }
            }
        }
    }
}
