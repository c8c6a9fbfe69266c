// Copyright (c) 2024 Mike Tsao

use crate::{
    error::{Error, Result},
    orchestration::SourceSettings,
    prelude::*,
};
use byteorder::{ByteOrder, LittleEndian};
use std::sync::Arc;

/// A sound held entirely in memory. Every voice playing it shares the same
/// sample data.
#[derive(Debug)]
pub struct Wav {
    settings: SourceSettings,
    /// Planar: all of channel 0, then all of channel 1, and so on.
    data: Arc<[f32]>,
    frames: usize,
}
impl AudioSource for Wav {
    fn create_instance(&self) -> Box<dyn AudioSourceInstance> {
        Box::new(WavInstance {
            data: Arc::clone(&self.data),
            frames: self.frames,
            channels: self.settings.channels(),
            sample_rate: self.settings.base_sample_rate(),
            position: 0,
        })
    }

    fn settings(&self) -> &SourceSettings {
        &self.settings
    }

    fn settings_mut(&mut self) -> &mut SourceSettings {
        &mut self.settings
    }
}
impl Wav {
    /// Builds a sound from interleaved float samples.
    pub fn from_samples(samples: &[f32], sample_rate: f32, channels: usize) -> Result<Self> {
        let mut settings = SourceSettings::default();
        settings.set_format(sample_rate, channels)?;
        let frames = samples.len() / channels;
        let mut data = vec![0.0; frames * channels];
        for (frame, chunk) in samples.chunks_exact(channels).enumerate() {
            for (channel, sample) in chunk.iter().enumerate() {
                data[channel * frames + frame] = *sample;
            }
        }
        Ok(Self {
            settings,
            data: data.into(),
            frames,
        })
    }

    /// Builds a sound from interleaved little-endian signed 16-bit PCM.
    pub fn from_pcm16_bytes(bytes: &[u8], sample_rate: f32, channels: usize) -> Result<Self> {
        let mut samples = vec![0; bytes.len() / 2];
        LittleEndian::read_i16_into(&bytes[..samples.len() * 2], &mut samples);
        let samples: Vec<f32> = samples
            .into_iter()
            .map(|s| s as f32 / i16::MAX as f32)
            .collect();
        Self::from_samples(&samples, sample_rate, channels)
    }

    /// Loads a WAV file.
    #[cfg(feature = "hound")]
    pub fn load_wav(path: &std::path::Path) -> Result<Self> {
        let (samples, sample_rate, channels) =
            Self::read_wav(path).map_err(|e| Error::Load(format!("{}: {e}", path.display())))?;
        log::debug!(
            "loaded {}: {} Hz, {channels} channels, {} frames",
            path.display(),
            sample_rate,
            samples.len() / channels.max(1)
        );
        Self::from_samples(&samples, sample_rate as f32, channels)
    }

    #[cfg(feature = "hound")]
    fn read_wav(path: &std::path::Path) -> anyhow::Result<(Vec<f32>, u32, usize)> {
        let reader = hound::WavReader::open(path)?;
        let spec = reader.spec();
        let samples = match spec.sample_format {
            hound::SampleFormat::Float => reader
                .into_samples::<f32>()
                .collect::<core::result::Result<Vec<_>, _>>()?,
            hound::SampleFormat::Int => {
                let scale = 2.0f32.powi(spec.bits_per_sample as i32 - 1);
                reader
                    .into_samples::<i32>()
                    .map(|s| s.map(|s| s as f32 / scale))
                    .collect::<core::result::Result<Vec<_>, _>>()?
            }
        };
        Ok((samples, spec.sample_rate, spec.channels as usize))
    }

    /// Length in seconds.
    pub fn length(&self) -> f64 {
        self.frames as f64 / self.settings.base_sample_rate() as f64
    }

    #[allow(missing_docs)]
    pub fn frames(&self) -> usize {
        self.frames
    }
}

#[derive(Debug)]
struct WavInstance {
    data: Arc<[f32]>,
    frames: usize,
    channels: usize,
    sample_rate: f32,
    position: usize,
}
impl AudioSourceInstance for WavInstance {
    fn get_audio(&mut self, buffer: &mut [f32], samples: usize, stride: usize) -> usize {
        let n = samples.min(self.frames - self.position);
        for c in 0..self.channels {
            let from = &self.data[c * self.frames + self.position..][..n];
            if let Some(to) = buffer.get_mut(c * stride..c * stride + n) {
                to.copy_from_slice(from);
            }
        }
        self.position += n;
        n
    }

    fn has_ended(&self) -> bool {
        self.position >= self.frames
    }

    fn rewind(&mut self) -> bool {
        self.position = 0;
        true
    }

    fn seek(&mut self, seconds: f64) -> bool {
        let frame = (seconds.max(0.0) * self.sample_rate as f64).floor() as usize;
        self.position = frame.min(self.frames);
        true
    }
}
