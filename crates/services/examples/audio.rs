// Copyright (c) 2024 Mike Tsao

use clap::Parser;
use std::time::Duration;
use voicebox::{
    cores::{Tone, Waveform},
    prelude::*,
};
use voicebox_services::prelude::*;

#[derive(clap::Parser, Debug, Default)]
#[clap(author, about, long_about = None)]
struct Args {
    /// The frequency to play
    #[clap(short = 'f', long, value_parser, default_value_t = 440.0)]
    frequency: f32,

    /// sine, square, saw, triangle, or noise
    #[clap(short = 'w', long, value_parser, default_value = "sine")]
    waveform: String,

    /// How long to play, in seconds
    #[clap(short = 's', long, value_parser, default_value_t = 3.0)]
    seconds: f32,
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let args = Args::parse();
    let waveform: Waveform = args.waveform.parse()?;

    // The driver starts playing as soon as it exists, and stops when it's
    // dropped, so keep it in scope.
    let driver = CpalDriver::new_with(EngineSettings::default(), None)?;
    if let Ok(CpalDriverEvent::Reset(sample_rate, channels)) = driver.receiver().try_recv() {
        println!("Playing {channels} channels at {sample_rate}Hz");
    }

    let engine = driver.engine();
    let tone = Tone::new_with(waveform, args.frequency);
    let handle = engine.play(
        &tone,
        &PlayOptionsBuilder::default().volume(0.0).build()?,
    );
    engine.fade_volume(handle, 0.5, 0.1);
    engine.schedule_stop(handle, args.seconds as f64);

    while engine.is_valid_voice_handle(handle) {
        std::thread::sleep(Duration::from_millis(50));
        while let Ok(event) = driver.receiver().try_recv() {
            if let CpalDriverEvent::StreamError(e) = event {
                eprintln!("stream error: {e}");
            }
        }
    }
    driver.send_input(CpalDriverInput::Quit);
    Ok(())
}
