// Copyright (c) 2024 Mike Tsao

//! The engine: voices, the mixer that sums them, sub-mix buses and queues, and
//! the 3D pass.

/// The most commonly used imports.
pub mod prelude {
    pub use super::{Bus, Engine, PlayOptions, PlayOptionsBuilder, Queue, SourceSettings};
}

pub(crate) use bus::BusShared;
pub use {
    bus::{Bus, BusInstance},
    engine::{Engine, PlayOptions, PlayOptionsBuilder},
    queue::Queue,
    source_settings::SourceSettings,
    spatializer::{Listener, Voice3dData},
};

mod bus;
mod engine;
mod engine_core;
mod groups;
mod mixer;
mod queue;
mod repositories;
mod source_settings;
mod spatializer;
mod voice;
mod voice_ops;
