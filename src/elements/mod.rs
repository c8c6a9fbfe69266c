// Copyright (c) 2024 Mike Tsao

//! Building blocks for the mixer: automation, resampling, panning, 3D math,
//! and metering.

/// The most commonly used imports.
pub mod prelude {
    pub use super::{
        AttenuationModel, Clipper, Fader, FaderState, FilterParams, ParamInfo, Resampler,
    };
}

pub use {
    clipper::Clipper,
    fader::{Fader, FaderState},
    filter_params::{FilterParams, ParamInfo},
    panning::{absolute_channel_volumes, pan_channel_volumes, ChannelMap},
    resampler::Resampler,
    spatial::{default_speakers, doppler, look_at, speaker_gain, AttenuationModel},
    visualization::Visualization,
};

mod clipper;
mod fader;
mod filter_params;
mod panning;
mod resampler;
mod spatial;
mod visualization;
