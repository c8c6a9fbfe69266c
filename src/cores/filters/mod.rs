// Copyright (c) 2024 Mike Tsao

pub use dc_removal::DcRemovalFilter;
pub use duck::DuckFilter;
pub use echo::EchoFilter;
pub use wave_shaper::WaveShaperFilter;

mod dc_removal;
mod duck;
mod echo;
mod wave_shaper;
