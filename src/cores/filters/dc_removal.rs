// Copyright (c) 2024 Mike Tsao

use crate::{elements::FilterParams, prelude::*};
use derivative::Derivative;
use serde::{Deserialize, Serialize};

/// Subtracts the running average of the last `length` seconds, which removes
/// any constant offset from the signal.
#[derive(Clone, Debug, Derivative, Serialize, Deserialize)]
#[derivative(Default)]
#[serde(rename_all = "kebab-case", default)]
pub struct DcRemovalFilter {
    /// Averaging window, in seconds.
    #[derivative(Default(value = "0.1"))]
    pub length: f32,
}
impl Filter for DcRemovalFilter {
    fn create_instance(&self) -> Box<dyn FilterInstance> {
        Box::new(DcRemovalInstance {
            params: FilterParams::new(&[]),
            length: self.length,
            history: Vec::default(),
            totals: Vec::default(),
            frames: 0,
            offset: 0,
        })
    }
}

#[derive(Debug)]
struct DcRemovalInstance {
    params: FilterParams,
    length: f32,
    /// One ring of `frames` samples per channel.
    history: Vec<f32>,
    totals: Vec<f32>,
    frames: usize,
    offset: usize,
}
impl FilterInstance for DcRemovalInstance {
    fn filter(
        &mut self,
        buffer: &mut [f32],
        samples: usize,
        stride: usize,
        channels: usize,
        sample_rate: f32,
        time: f64,
    ) {
        self.params.update(time);
        if self.history.is_empty() {
            self.frames = ((self.length * sample_rate).ceil() as usize).max(1);
            self.history = vec![0.0; self.frames * channels];
            self.totals = vec![0.0; channels];
        }
        let channels = channels.min(self.totals.len());
        let wet = self.params.wet();
        let frames = self.frames as f32;
        for i in 0..samples {
            for c in 0..channels {
                let Some(x) = buffer.get_mut(c * stride + i) else {
                    continue;
                };
                let slot = &mut self.history[c * self.frames + self.offset];
                self.totals[c] += *x - *slot;
                *slot = *x;
                let n = *x - self.totals[c] / frames;
                *x += (n - *x) * wet;
            }
            self.offset = (self.offset + 1) % self.frames;
        }
    }

    fn params(&self) -> &FilterParams {
        &self.params
    }

    fn params_mut(&mut self) -> &mut FilterParams {
        &mut self.params
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use float_cmp::approx_eq;

    #[test]
    fn constant_offset_fades_out() {
        let filter = DcRemovalFilter { length: 1.0 };
        let mut instance = filter.create_instance();
        let mut buffer = [0.5; 20];
        instance.filter(&mut buffer, 10, 10, 2, 10.0, 0.0);
        assert!(approx_eq!(f32, buffer[0], 0.45, epsilon = 0.0001));
        assert!(
            approx_eq!(f32, buffer[9], 0.0, epsilon = 0.0001),
            "once the window is full of DC, the output should be silent"
        );
        assert!(approx_eq!(f32, buffer[19], 0.0, epsilon = 0.0001));
    }

    #[test]
    fn has_only_wet() {
        let instance = DcRemovalFilter::default().create_instance();
        assert_eq!(instance.params().count(), 1);
    }
}
