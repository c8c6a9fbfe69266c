// Copyright (c) 2024 Mike Tsao

//! Numeric types used throughout the system.

use super::MAX_CHANNELS;
use derivative::Derivative;
use serde::{Deserialize, Serialize};
use synonym::Synonym;

/// A position, direction, or velocity in 3D space.
pub type Vec3 = nalgebra::Vector3<f32>;

/// One gain per output channel.
pub type ChannelVolumes = [f32; MAX_CHANNELS];

/// Samples per second. Always a positive integer; cannot be zero.
#[derive(Synonym, Serialize, Deserialize, Derivative)]
#[derivative(Default)]
#[synonym(skip(Default))]
#[serde(rename_all = "kebab-case")]
pub struct SampleRate(#[derivative(Default(value = "44100"))] pub usize);
#[allow(missing_docs)]
impl SampleRate {
    pub const DEFAULT_SAMPLE_RATE: usize = 44100;
    pub const DEFAULT: SampleRate = SampleRate::new(Self::DEFAULT_SAMPLE_RATE);

    pub const fn new(value: usize) -> Self {
        if value != 0 {
            Self(value)
        } else {
            Self(Self::DEFAULT_SAMPLE_RATE)
        }
    }
}
impl From<SampleRate> for f32 {
    fn from(value: SampleRate) -> Self {
        value.0 as f32
    }
}
impl From<SampleRate> for f64 {
    fn from(value: SampleRate) -> Self {
        value.0 as f64
    }
}
