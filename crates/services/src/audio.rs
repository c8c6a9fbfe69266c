// Copyright (c) 2024 Mike Tsao

//! [CpalDriver] plays a [voicebox::Engine] through the default output device
//! of the [cpal](https://crates.io/crates/cpal) audio interface.

use crate::{CrossbeamChannel, ProvidesService};
use core::fmt::Debug;
use cpal::{
    traits::{DeviceTrait, HostTrait, StreamTrait},
    BufferSize, FromSample, SizedSample, Stream, StreamConfig, SupportedStreamConfig,
};
use crossbeam::channel::{Receiver, Sender};
use std::{sync::Arc, thread::JoinHandle};
use voicebox::{prelude::*, Engine};

/// A [CpalDriverInput] tells [CpalDriver] what to do.
#[derive(Debug)]
pub enum CpalDriverInput {
    /// Starts pulling audio from the engine.
    Play,
    /// Stops pulling audio. Voices keep their places.
    Pause,
    /// Stops every voice and closes the stream.
    Quit,
}

/// A [CpalDriverEvent] informs clients what's going on.
#[derive(Debug)]
pub enum CpalDriverEvent {
    /// The stream is open. Provides the device's sample rate and channel
    /// count.
    Reset(usize, u16),
    /// The audio interface reported a problem with the stream.
    StreamError(String),
}

/// Scratch space for the stream callback. It only grows when the device asks
/// for a bigger window than it ever has before.
struct Window {
    buffer: Vec<f32>,
    engine_channels: usize,
}
impl Window {
    fn new_with(period_size: usize, engine_channels: usize) -> Self {
        Self {
            buffer: vec![0.0; period_size * engine_channels],
            engine_channels,
        }
    }

    /// Mixes `output.len() / device_channels` frames and writes them in the
    /// device's format. Device channels the engine doesn't have are silent.
    fn fill<T>(&mut self, engine: &Engine, output: &mut [T], device_channels: usize)
    where
        T: SizedSample + FromSample<f32>,
    {
        let frames = output.len() / device_channels;
        let needed = frames * self.engine_channels;
        if self.buffer.len() < needed {
            self.buffer.resize(needed, 0.0);
        }
        let mixed = &mut self.buffer[..needed];
        engine.mix(mixed);
        for (out_frame, in_frame) in output
            .chunks_exact_mut(device_channels)
            .zip(mixed.chunks_exact(self.engine_channels))
        {
            for (channel, sample) in out_frame.iter_mut().enumerate() {
                *sample = T::from_sample(in_frame.get(channel).copied().unwrap_or_default());
            }
        }
    }
}

/// [CpalDriver] owns an [Engine] and a cpal output stream that calls
/// [Engine::mix()] whenever the device needs audio. Control the stream with
/// [CpalDriverInput]s; control the sound through [CpalDriver::engine()].
pub struct CpalDriver {
    inputs: CrossbeamChannel<CpalDriverInput>,
    events: CrossbeamChannel<CpalDriverEvent>,
    engine: Arc<Engine>,
    thread: Option<JoinHandle<()>>,
}
impl Debug for CpalDriver {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("CpalDriver")
            .field("engine", &self.engine)
            .field("thread", &self.thread)
            .finish()
    }
}
impl ProvidesService<CpalDriverInput, CpalDriverEvent> for CpalDriver {
    fn sender(&self) -> &Sender<CpalDriverInput> {
        &self.inputs.sender
    }

    fn receiver(&self) -> &Receiver<CpalDriverEvent> {
        &self.events.receiver
    }
}
impl CpalDriver {
    /// On the upper edge of perceptible latency at 44.1KHz (512 / 44100 =
    /// 11.6 milliseconds).
    pub const SUGGESTED_PERIOD_SIZE: usize = 512;

    /// Opens the default output device and builds an [Engine] from
    /// `settings`, with the sample rate and channel count replaced by the
    /// device's. The stream starts playing right away.
    pub fn new_with(
        mut settings: EngineSettings,
        period_size: Option<usize>,
    ) -> anyhow::Result<Self> {
        let period_size = period_size.unwrap_or(Self::SUGGESTED_PERIOD_SIZE);
        let (device, config) = Self::host_device_setup()?;
        let sample_rate = config.sample_rate().0 as usize;
        let device_channels = config.channels();
        settings.set_sample_rate(SampleRate::new(sample_rate));
        settings.set_channel_count(device_channels as usize);
        let engine = Arc::new(Engine::new_with(settings));
        if engine.backend_channels() != device_channels as usize {
            log::warn!(
                "device has {device_channels} channels; mixing {} and leaving the rest silent",
                engine.backend_channels()
            );
        }

        let inputs = CrossbeamChannel::default();
        let events = CrossbeamChannel::default();
        let ready = CrossbeamChannel::bounded(1);

        // cpal streams aren't `Send`, so the stream is built and owned by its
        // own thread. <https://github.com/RustAudio/cpal/issues/818>
        let thread = {
            let engine = Arc::clone(&engine);
            let receiver = inputs.receiver.clone();
            let events = events.sender.clone();
            let ready = ready.sender;
            std::thread::Builder::new()
                .name("voicebox-cpal".to_string())
                .spawn(move || {
                    let stream = match Self::stream_setup_for(
                        &device,
                        config,
                        period_size,
                        Arc::clone(&engine),
                        events.clone(),
                    ) {
                        Ok(stream) => stream,
                        Err(e) => {
                            let _ = ready.send(Err(e));
                            return;
                        }
                    };
                    let _ = ready.send(stream.play().map_err(anyhow::Error::from));
                    Self::run(&stream, &engine, &receiver);
                })?
        };
        ready.receiver.recv()??;

        let _ = events
            .sender
            .send(CpalDriverEvent::Reset(sample_rate, device_channels));
        log::info!(
            "audio output: {sample_rate} Hz, {device_channels} channels, period {period_size}"
        );
        Ok(Self {
            inputs,
            events,
            engine,
            thread: Some(thread),
        })
    }

    /// The engine this driver plays. Clone the [Arc] to share it with other
    /// threads.
    pub fn engine(&self) -> &Arc<Engine> {
        &self.engine
    }

    fn run(stream: &Stream, engine: &Engine, receiver: &Receiver<CpalDriverInput>) {
        while let Ok(input) = receiver.recv() {
            let result = match input {
                CpalDriverInput::Play => stream.play().map_err(anyhow::Error::from),
                CpalDriverInput::Pause => stream.pause().map_err(anyhow::Error::from),
                CpalDriverInput::Quit => break,
            };
            if let Err(e) = result {
                log::warn!("audio stream: {e}");
            }
        }
        engine.deinit();
    }

    /// Returns the default output device and its preferred stream config.
    fn host_device_setup() -> anyhow::Result<(cpal::Device, SupportedStreamConfig)> {
        let host = cpal::default_host();
        let device = host
            .default_output_device()
            .ok_or_else(|| anyhow::Error::msg("Default output device is not available"))?;
        let config = device.default_output_config()?;
        Ok((device, config))
    }

    /// Picks the [Self::stream_make()] that matches the device's sample
    /// format.
    fn stream_setup_for(
        device: &cpal::Device,
        config: SupportedStreamConfig,
        period_size: usize,
        engine: Arc<Engine>,
        events: Sender<CpalDriverEvent>,
    ) -> anyhow::Result<Stream> {
        let sample_format = config.sample_format();
        let mut config: StreamConfig = config.into();
        config.buffer_size = BufferSize::Fixed(period_size as u32);

        match sample_format {
            cpal::SampleFormat::I8 => {
                Self::stream_make::<i8>(&config, device, period_size, engine, events)
            }
            cpal::SampleFormat::I16 => {
                Self::stream_make::<i16>(&config, device, period_size, engine, events)
            }
            cpal::SampleFormat::I32 => {
                Self::stream_make::<i32>(&config, device, period_size, engine, events)
            }
            cpal::SampleFormat::I64 => {
                Self::stream_make::<i64>(&config, device, period_size, engine, events)
            }
            cpal::SampleFormat::U8 => {
                Self::stream_make::<u8>(&config, device, period_size, engine, events)
            }
            cpal::SampleFormat::U16 => {
                Self::stream_make::<u16>(&config, device, period_size, engine, events)
            }
            cpal::SampleFormat::U32 => {
                Self::stream_make::<u32>(&config, device, period_size, engine, events)
            }
            cpal::SampleFormat::U64 => {
                Self::stream_make::<u64>(&config, device, period_size, engine, events)
            }
            cpal::SampleFormat::F32 => {
                Self::stream_make::<f32>(&config, device, period_size, engine, events)
            }
            cpal::SampleFormat::F64 => {
                Self::stream_make::<f64>(&config, device, period_size, engine, events)
            }
            _ => Err(anyhow::anyhow!("unsupported sample format {sample_format:?}")),
        }
    }

    fn stream_make<T>(
        config: &StreamConfig,
        device: &cpal::Device,
        period_size: usize,
        engine: Arc<Engine>,
        events: Sender<CpalDriverEvent>,
    ) -> anyhow::Result<Stream>
    where
        T: SizedSample + FromSample<f32>,
    {
        let device_channels = config.channels as usize;
        let mut window = Window::new_with(period_size, engine.backend_channels());
        let err_fn = move |err: cpal::StreamError| {
            log::error!("audio stream: {err}");
            let _ = events.try_send(CpalDriverEvent::StreamError(err.to_string()));
        };
        let stream = device.build_output_stream(
            config,
            move |output: &mut [T], _: &cpal::OutputCallbackInfo| {
                window.fill(&engine, output, device_channels)
            },
            err_fn,
            None,
        )?;
        Ok(stream)
    }
}
impl Drop for CpalDriver {
    fn drop(&mut self) {
        let _ = self.inputs.sender.send(CpalDriverInput::Quit);
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                log::error!("audio thread panicked");
            }
        }
    }
}
