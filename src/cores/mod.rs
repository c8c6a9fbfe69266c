// Copyright (c) 2024 Mike Tsao

//! Ready-made sounds and filters. Anything here could just as well live
//! outside the crate, since it reaches the engine only through
//! [AudioSource](crate::traits::AudioSource) and
//! [Filter](crate::traits::Filter).

pub use filters::*;
pub use sources::*;

mod filters;
mod sources;
