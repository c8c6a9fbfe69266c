// Copyright (c) 2024 Mike Tsao

//! System utilities.

/// Commonly used imports.
pub mod prelude {
    pub use super::{EngineSettings, Pool, Rng};
}

pub use pool::{Pool, Task};
pub use rng::Rng;
pub use settings::EngineSettings;

mod pool;
mod rng;
mod settings;
