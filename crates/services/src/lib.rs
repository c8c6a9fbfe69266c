// Copyright (c) 2024 Mike Tsao

//! Connects a [voicebox::Engine] to the outside world, with crossbeam channels
//! for control.

#![deny(missing_docs)]

/// The most commonly used imports.
pub mod prelude {
    #[cfg(feature = "audio")]
    pub use super::{CpalDriver, CpalDriverEvent, CpalDriverInput};
    pub use super::{CrossbeamChannel, ProvidesService};
}

#[cfg(feature = "audio")]
pub use audio::{CpalDriver, CpalDriverEvent, CpalDriverInput};
pub use traits::ProvidesService;
pub use types::CrossbeamChannel;

#[cfg(feature = "audio")]
mod audio;
mod traits;
mod types;
