// Copyright (c) 2024 Mike Tsao

use crate::{error::Result, orchestration::SourceSettings, prelude::*, util::Rng};
use core::f64::consts::PI;
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumCount, EnumIter, EnumString, FromRepr, IntoStaticStr};

/// Classic oscillator waveforms.
#[derive(
    Clone,
    Copy,
    Debug,
    Default,
    Display,
    EnumCount,
    EnumIter,
    EnumString,
    FromRepr,
    IntoStaticStr,
    PartialEq,
    Serialize,
    Deserialize,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum Waveform {
    /// Sine wave
    #[default]
    Sine,
    /// Square wave
    Square,
    /// Sawtooth wave
    Saw,
    /// Triangle wave
    Triangle,
    /// White noise
    Noise,
}

/// An endless periodic test signal, written identically to every channel.
#[derive(Debug)]
pub struct Tone {
    settings: SourceSettings,
    waveform: Waveform,
    frequency: f64,
    amplitude: f32,
}
impl Default for Tone {
    fn default() -> Self {
        let mut settings = SourceSettings::default();
        if let Err(e) = settings.set_format(SampleRate::DEFAULT_SAMPLE_RATE as f32, 1) {
            log::warn!("couldn't set tone format: {e}");
        }
        Self {
            settings,
            waveform: Waveform::default(),
            frequency: 440.0,
            amplitude: 1.0,
        }
    }
}
impl AudioSource for Tone {
    fn create_instance(&self) -> Box<dyn AudioSourceInstance> {
        Box::new(ToneInstance {
            waveform: self.waveform,
            frequency: self.frequency,
            amplitude: self.amplitude,
            sample_rate: self.settings.base_sample_rate() as f64,
            channels: self.settings.channels(),
            frame: 0,
            rng: Rng::default(),
        })
    }

    fn settings(&self) -> &SourceSettings {
        &self.settings
    }

    fn settings_mut(&mut self) -> &mut SourceSettings {
        &mut self.settings
    }
}
impl Tone {
    #[allow(missing_docs)]
    pub fn new_with(waveform: Waveform, frequency: f64) -> Self {
        Self {
            waveform,
            frequency,
            ..Default::default()
        }
    }

    #[allow(missing_docs)]
    pub fn waveform(&self) -> Waveform {
        self.waveform
    }

    #[allow(missing_docs)]
    pub fn set_waveform(&mut self, waveform: Waveform) {
        self.waveform = waveform;
    }

    #[allow(missing_docs)]
    pub fn frequency(&self) -> f64 {
        self.frequency
    }

    #[allow(missing_docs)]
    pub fn set_frequency(&mut self, frequency: f64) {
        self.frequency = frequency;
    }

    /// Peak level of the generated signal.
    pub fn set_amplitude(&mut self, amplitude: f32) {
        self.amplitude = amplitude;
    }

    /// Changes the rate the tone is generated at and how many channels it
    /// fills.
    pub fn set_format(&mut self, sample_rate: f32, channels: usize) -> Result<()> {
        self.settings.set_format(sample_rate, channels)
    }
}

#[derive(Debug)]
struct ToneInstance {
    waveform: Waveform,
    frequency: f64,
    amplitude: f32,
    sample_rate: f64,
    channels: usize,
    frame: u64,
    rng: Rng,
}
impl ToneInstance {
    fn amplitude_for_position(&mut self, cycle_position: f64) -> f64 {
        match self.waveform {
            Waveform::Sine => (cycle_position * 2.0 * PI).sin(),
            Waveform::Square => -(cycle_position - 0.5).signum(),
            Waveform::Triangle => {
                4.0 * (cycle_position - (0.5 + cycle_position).floor()).abs() - 1.0
            }
            Waveform::Saw => 2.0 * (cycle_position - (0.5 + cycle_position).floor()),
            Waveform::Noise => self.rng.rand_bipolar(),
        }
    }
}
impl AudioSourceInstance for ToneInstance {
    fn get_audio(&mut self, buffer: &mut [f32], samples: usize, stride: usize) -> usize {
        let samples = samples.min(stride);
        for i in 0..samples {
            let t = (self.frame + i as u64) as f64 / self.sample_rate;
            let cycle_position = (t * self.frequency).fract();
            let value = self.amplitude_for_position(cycle_position) as f32 * self.amplitude;
            for c in 0..self.channels {
                if let Some(s) = buffer.get_mut(c * stride + i) {
                    *s = value;
                }
            }
        }
        self.frame += samples as u64;
        samples
    }

    fn has_ended(&self) -> bool {
        false
    }

    fn rewind(&mut self) -> bool {
        self.frame = 0;
        true
    }

    fn seek(&mut self, seconds: f64) -> bool {
        self.frame = (seconds.max(0.0) * self.sample_rate) as u64;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use float_cmp::approx_eq;
    use more_asserts::{assert_ge, assert_le};

    fn render(tone: &Tone, frames: usize) -> Vec<f32> {
        let mut instance = tone.create_instance();
        let mut buffer = vec![0.0; frames];
        assert_eq!(instance.get_audio(&mut buffer, frames, frames), frames);
        buffer
    }

    #[test]
    fn waveforms_start_where_expected() {
        // One cycle every four samples.
        let mut tone = Tone::new_with(Waveform::Sine, 1.0);
        tone.set_format(4.0, 1).unwrap();
        let sine = render(&tone, 4);
        assert!(approx_eq!(f32, sine[0], 0.0, epsilon = 0.0001));
        assert!(approx_eq!(f32, sine[1], 1.0, epsilon = 0.0001));
        assert!(approx_eq!(f32, sine[3], -1.0, epsilon = 0.0001));

        tone.set_waveform(Waveform::Square);
        assert_eq!(render(&tone, 4), [1.0, 1.0, -1.0, -1.0]);

        tone.set_waveform(Waveform::Triangle);
        assert_eq!(render(&tone, 4), [-1.0, 0.0, 1.0, 0.0]);

        tone.set_waveform(Waveform::Saw);
        assert_eq!(render(&tone, 4), [0.0, 0.5, -1.0, -0.5]);
    }

    #[test]
    fn noise_stays_in_range() {
        let tone = Tone::new_with(Waveform::Noise, 1.0);
        for s in render(&tone, 1000) {
            assert_ge!(s, -1.0);
            assert_le!(s, 1.0);
        }
    }

    #[test]
    fn never_ends_and_can_seek() {
        let mut tone = Tone::new_with(Waveform::Saw, 1.0);
        tone.set_format(4.0, 2).unwrap();
        let mut instance = tone.create_instance();
        let mut buffer = [0.0; 4];
        assert_eq!(instance.get_audio(&mut buffer, 2, 2), 2);
        assert_eq!(buffer, [0.0, 0.5, 0.0, 0.5], "both channels get the same signal");
        assert!(!instance.has_ended());
        assert!(instance.seek(0.25));
        instance.get_audio(&mut buffer, 1, 2);
        assert_eq!(buffer[0], 0.5);
        assert!(instance.rewind());
        instance.get_audio(&mut buffer, 1, 2);
        assert_eq!(buffer[0], 0.0);
    }

    #[test]
    fn waveforms_parse_from_names() {
        assert_eq!("saw".parse::<Waveform>().unwrap(), Waveform::Saw);
        assert_eq!(Waveform::Triangle.to_string(), "triangle");
        assert!("sawtooth".parse::<Waveform>().is_err());
    }
}
