// Copyright (c) 2024 Mike Tsao

pub use tone::{Tone, Waveform};
pub use wav::Wav;

mod tone;
mod wav;
