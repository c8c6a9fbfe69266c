// Copyright (c) 2024 Mike Tsao

use crate::types::{MAX_CHANNELS, VISUALIZATION_WINDOW};
use spectrum_analyzer::{scaling::divide_by_N_sqrt, FrequencyLimit};

/// The most recent tick's waveform and per-channel peaks, for meters and
/// scopes.
#[derive(Clone, Debug, PartialEq)]
pub struct Visualization {
    wave: [f32; VISUALIZATION_WINDOW],
    peaks: [f32; MAX_CHANNELS],
}
impl Default for Visualization {
    fn default() -> Self {
        Self {
            wave: [0.0; VISUALIZATION_WINDOW],
            peaks: [0.0; MAX_CHANNELS],
        }
    }
}
impl Visualization {
    /// Records the first [VISUALIZATION_WINDOW] frames of a planar buffer,
    /// summed across channels, and the loudest absolute sample of each
    /// channel. Ticks shorter than the window repeat to fill it.
    pub fn capture(&mut self, buffer: &[f32], channels: usize, stride: usize, frames: usize) {
        self.peaks = [0.0; MAX_CHANNELS];
        if frames == 0 {
            self.wave = [0.0; VISUALIZATION_WINDOW];
            return;
        }
        for (channel, samples) in buffer.chunks(stride).take(channels).enumerate() {
            self.peaks[channel] = samples
                .iter()
                .take(frames)
                .fold(0.0f32, |peak, s| peak.max(s.abs()));
        }
        for (i, w) in self.wave.iter_mut().enumerate() {
            let index = i % frames;
            *w = (0..channels).map(|c| buffer[c * stride + index]).sum();
        }
    }

    /// Forgets everything captured so far.
    pub fn clear(&mut self) {
        *self = Self::default();
    }

    #[allow(missing_docs)]
    pub fn wave(&self) -> &[f32; VISUALIZATION_WINDOW] {
        &self.wave
    }

    /// Peak absolute amplitude of `channel` during the last tick.
    pub fn approximate_volume(&self, channel: usize) -> f32 {
        self.peaks.get(channel).copied().unwrap_or_default()
    }

    /// Peak absolute amplitude of every channel during the last tick.
    pub fn peaks(&self) -> &[f32; MAX_CHANNELS] {
        &self.peaks
    }

    /// Magnitude spectrum of the captured waveform. The window is zero-padded
    /// to twice its length before the transform, and the lower half of the
    /// bins comes back.
    pub fn calc_fft(&self, sample_rate: usize) -> [f32; VISUALIZATION_WINDOW] {
        let mut result = [0.0; VISUALIZATION_WINDOW];
        let mut padded = [0.0f32; VISUALIZATION_WINDOW * 2];
        padded[..VISUALIZATION_WINDOW].copy_from_slice(&self.wave);
        match spectrum_analyzer::samples_fft_to_spectrum(
            &padded,
            sample_rate as u32,
            FrequencyLimit::All,
            Some(&divide_by_N_sqrt),
        ) {
            Ok(spectrum) => {
                for (r, (_, value)) in result.iter_mut().zip(spectrum.data().iter()) {
                    *r = value.val();
                }
            }
            Err(e) => log::warn!("samples_fft_to_spectrum failed: {e:?}"),
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use more_asserts::assert_gt;

    #[test]
    fn capture_sums_channels_and_tracks_peaks() {
        let mut v = Visualization::default();
        let mut buffer = vec![0.0; 1024];
        buffer[..512].fill(0.25);
        buffer[512..].fill(-0.5);
        v.capture(&buffer, 2, 512, 512);
        assert!(v.wave().iter().all(|w| *w == -0.25));
        assert_eq!(v.approximate_volume(0), 0.25);
        assert_eq!(v.approximate_volume(1), 0.5);
        assert_eq!(v.approximate_volume(7), 0.0);
        assert_eq!(v.approximate_volume(99), 0.0, "out of range reads zero");
    }

    #[test]
    fn short_ticks_repeat_to_fill_window() {
        let mut v = Visualization::default();
        let buffer = [1.0, 2.0, 3.0];
        v.capture(&buffer, 1, 3, 3);
        assert_eq!(v.wave()[..6], [1.0, 2.0, 3.0, 1.0, 2.0, 3.0]);
    }

    #[test]
    fn fft_finds_energy() {
        let mut v = Visualization::default();
        let buffer: Vec<f32> = (0..VISUALIZATION_WINDOW)
            .map(|i| (i as f32 * core::f32::consts::PI / 4.0).sin())
            .collect();
        v.capture(&buffer, 1, VISUALIZATION_WINDOW, VISUALIZATION_WINDOW);
        let fft = v.calc_fft(44100);
        assert_gt!(fft.iter().copied().fold(0.0f32, f32::max), 0.0);

        v.clear();
        assert!(v.calc_fft(44100).iter().all(|m| *m == 0.0));
    }
}
