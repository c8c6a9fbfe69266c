// Copyright (c) 2024 Mike Tsao

use crate::{
    elements::{FilterParams, ParamInfo},
    prelude::*,
};
use serde::{Deserialize, Serialize};

/// Soft saturation. Positive amounts push the signal toward clipping, negative
/// amounts pull it back.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct WaveShaperFilter {
    /// From -1.0 to 1.0.
    pub amount: f32,
}
impl WaveShaperFilter {
    /// Parameter id of the shaping amount.
    pub const AMOUNT: usize = 1;
}
impl Filter for WaveShaperFilter {
    fn create_instance(&self) -> Box<dyn FilterInstance> {
        Box::new(WaveShaperInstance {
            params: FilterParams::new(&[ParamInfo {
                name: "Amount",
                default: self.amount,
                min: -1.0,
                max: 1.0,
            }]),
        })
    }
}

#[derive(Debug)]
struct WaveShaperInstance {
    params: FilterParams,
}
impl FilterInstance for WaveShaperInstance {
    fn filter_channel(
        &mut self,
        buffer: &mut [f32],
        _sample_rate: f32,
        _time: f64,
        _channel: usize,
        _channels: usize,
    ) {
        let amount = self.params.get(WaveShaperFilter::AMOUNT);
        let k = if amount == 1.0 {
            2.0 * amount / 0.01
        } else {
            2.0 * amount / (1.0 - amount)
        };
        let wet = self.params.wet();
        for x in buffer.iter_mut() {
            let shaped = (1.0 + k) * *x / (1.0 + k * x.abs());
            *x += (shaped - *x) * wet;
        }
    }

    fn params(&self) -> &FilterParams {
        &self.params
    }

    fn params_mut(&mut self) -> &mut FilterParams {
        &mut self.params
    }
}
