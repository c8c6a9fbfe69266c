// Copyright (c) 2024 Mike Tsao

use crate::{
    elements::{FilterParams, ParamInfo},
    prelude::*,
};
use derivative::Derivative;
use serde::{Deserialize, Serialize};

/// A feedback delay line with an optional low-pass in the feedback path.
#[derive(Clone, Debug, Derivative, Serialize, Deserialize)]
#[derivative(Default)]
#[serde(rename_all = "kebab-case", default)]
pub struct EchoFilter {
    /// Seconds between repeats.
    #[derivative(Default(value = "0.3"))]
    pub delay: f32,
    /// How much of each repeat survives into the next one.
    #[derivative(Default(value = "0.7"))]
    pub decay: f32,
    /// How strongly each repeat is smoothed, from 0 (not at all) to 1.
    pub filter: f32,
}
impl EchoFilter {
    /// Parameter id of the delay time.
    pub const DELAY: usize = 1;
    /// Parameter id of the feedback amount.
    pub const DECAY: usize = 2;
    /// Parameter id of the feedback smoothing.
    pub const FILTER: usize = 3;

    #[allow(missing_docs)]
    pub fn new_with(delay: f32, decay: f32, filter: f32) -> Self {
        Self {
            delay,
            decay,
            filter,
        }
    }

    fn param_info(&self) -> [ParamInfo; 3] {
        [
            ParamInfo {
                name: "Delay",
                default: self.delay,
                min: 0.0,
                max: 1.0,
            },
            ParamInfo {
                name: "Decay",
                default: self.decay,
                min: 0.0,
                max: 1.0,
            },
            ParamInfo {
                name: "Filter",
                default: self.filter,
                min: 0.0,
                max: 1.0,
            },
        ]
    }
}
impl Filter for EchoFilter {
    fn create_instance(&self) -> Box<dyn FilterInstance> {
        Box::new(EchoInstance {
            params: FilterParams::new(&self.param_info()),
            buffer: Vec::default(),
            max_frames: 0,
            frames: 0,
            offset: 0,
        })
    }
}

/// The delay line is sized on the first block, once the sample rate is known,
/// and never grows after that.
#[derive(Debug)]
struct EchoInstance {
    params: FilterParams,
    buffer: Vec<f32>,
    max_frames: usize,
    frames: usize,
    offset: usize,
}
impl FilterInstance for EchoInstance {
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
        let delay_frames = (self.params.get(EchoFilter::DELAY) * sample_rate).ceil() as usize;
        if self.buffer.is_empty() {
            self.max_frames = delay_frames.max(1);
            self.buffer = vec![0.0; self.max_frames * channels];
        }
        self.frames = delay_frames.clamp(1, self.max_frames);
        let channels = channels.min(self.buffer.len() / self.max_frames);

        let decay = self.params.get(EchoFilter::DECAY);
        let smoothing = self.params.get(EchoFilter::FILTER);
        let wet = self.params.wet();
        let mut prev = (self.offset + self.frames - 1) % self.frames;
        for i in 0..samples {
            for c in 0..channels {
                let line = c * self.max_frames;
                let Some(x) = buffer.get_mut(c * stride + i) else {
                    continue;
                };
                let echoed = smoothing * self.buffer[line + prev]
                    + (1.0 - smoothing) * self.buffer[line + self.offset];
                let n = *x + echoed * decay;
                self.buffer[line + self.offset] = n;
                *x += (n - *x) * wet;
            }
            prev = self.offset;
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
