// Copyright (c) 2024 Mike Tsao

#![deny(missing_docs, unused_imports, unused_variables)]
#![allow(rustdoc::private_intra_doc_links)]

//! Voicebox mixes many simultaneously playing sounds into one output stream.
//!
//! Every sound you start becomes a *voice*, addressed by a [Handle] that
//! safely goes stale when the voice ends. The [Engine] keeps a fixed table of
//! voices and, on each audio tick, resamples, filters, pans, and sums them,
//! optionally through sub-mix [Bus]es and a 3D pass that turns positions and
//! velocities into per-speaker gains.
//!
//! * *Playing sounds*: build an [Engine], load a [Wav](cores::Wav) or make a
//! [Tone](cores::Tone), and call [Engine::play()].
//! * *Driving output*: call [Engine::mix()] from your audio callback, or use
//! the `voicebox-services` crate to do it with the default output device.
//! * *Extending*: implement [AudioSource](traits::AudioSource) for new kinds
//! of sound and [Filter](traits::Filter) for new kinds of processing.

/// A collection of imports that are useful to users of this crate. `use
/// voicebox::prelude::*;` for easier onboarding.
pub mod prelude {
    pub use super::{
        elements::prelude::*, orchestration::prelude::*, traits::prelude::*, types::prelude::*,
        util::prelude::*,
    };
}

// Fundamental structures that are important enough to re-export at top level.
pub use {
    error::{Error, Result},
    orchestration::{Bus, Engine, PlayOptions},
    types::Handle,
};

pub mod cores;
pub mod elements;
pub mod error;
pub mod orchestration;
pub mod traits;
pub mod types;
pub mod util;
