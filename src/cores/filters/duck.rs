// Copyright (c) 2024 Mike Tsao

use crate::{
    elements::{FilterParams, ParamInfo},
    orchestration::{Bus, BusShared},
    prelude::*,
};
use parking_lot::Mutex;
use std::sync::Arc;

/// Lowers the volume of whatever it's attached to while a [Bus] is making
/// noise, for example music ducking under dialogue.
#[derive(Debug)]
pub struct DuckFilter {
    listen_to: Arc<Mutex<BusShared>>,
    on_ramp: f32,
    off_ramp: f32,
    level: f32,
}
impl DuckFilter {
    /// Parameter id of the seconds it takes to duck.
    pub const ON_RAMP: usize = 1;
    /// Parameter id of the seconds it takes to recover.
    pub const OFF_RAMP: usize = 2;
    /// Parameter id of the volume while ducked.
    pub const LEVEL: usize = 3;

    /// Ducks while `bus` is audible. Turns on the bus's metering, which is
    /// how the filter hears it.
    pub fn new(bus: &mut Bus) -> Self {
        bus.set_visualization_enabled(true);
        Self {
            listen_to: Arc::clone(bus.shared()),
            on_ramp: 0.1,
            off_ramp: 0.5,
            level: 0.1,
        }
    }

    #[allow(missing_docs)]
    pub fn set_params(&mut self, on_ramp: f32, off_ramp: f32, level: f32) {
        self.on_ramp = on_ramp;
        self.off_ramp = off_ramp;
        self.level = level;
    }
}
impl Filter for DuckFilter {
    fn create_instance(&self) -> Box<dyn FilterInstance> {
        Box::new(DuckInstance {
            params: FilterParams::new(&[
                ParamInfo {
                    name: "Onramp",
                    default: self.on_ramp,
                    min: 0.0,
                    max: 10.0,
                },
                ParamInfo {
                    name: "Offramp",
                    default: self.off_ramp,
                    min: 0.0,
                    max: 10.0,
                },
                ParamInfo {
                    name: "Level",
                    default: self.level,
                    min: 0.0,
                    max: 1.0,
                },
            ]),
            listen_to: Arc::clone(&self.listen_to),
            current: 1.0,
        })
    }
}

#[derive(Debug)]
struct DuckInstance {
    params: FilterParams,
    listen_to: Arc<Mutex<BusShared>>,
    current: f32,
}
impl DuckInstance {
    const AUDIBLE: f32 = 0.01;
}
impl FilterInstance for DuckInstance {
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
        let level = self.params.get(DuckFilter::LEVEL);
        let step = |ramp: f32| {
            if ramp > 0.01 {
                (1.0 - level) / (ramp * sample_rate)
            } else {
                1.0
            }
        };
        let on_step = step(self.params.get(DuckFilter::ON_RAMP));
        let off_step = step(self.params.get(DuckFilter::OFF_RAMP));
        let sound_on = self.listen_to.lock().peaks().iter().sum::<f32>() > Self::AUDIBLE;
        let wet = self.params.wet();

        let start = self.current;
        let mut current = start;
        for c in 0..channels {
            current = start;
            for i in 0..samples {
                if sound_on {
                    current = (current - on_step).max(level);
                } else {
                    current = (current + off_step).min(1.0);
                }
                if let Some(x) = buffer.get_mut(c * stride + i) {
                    *x += (-*x + *x * current) * wet;
                }
            }
        }
        self.current = current;
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
    use crate::types::VISUALIZATION_WINDOW;
    use float_cmp::approx_eq;

    #[test]
    fn ducks_while_bus_is_loud() {
        let mut bus = Bus::default();
        let mut duck = DuckFilter::new(&mut bus);
        duck.set_params(0.0, 0.0, 0.25);
        let mut instance = duck.create_instance();

        let mut buffer = [1.0; 4];
        instance.filter(&mut buffer, 2, 2, 2, 44100.0, 0.0);
        assert_eq!(buffer, [1.0; 4], "a silent bus shouldn't duck anything");

        bus.shared()
            .lock()
            .capture_for_test(&[0.5; VISUALIZATION_WINDOW * 2], 2);
        instance.filter(&mut buffer, 2, 2, 2, 44100.0, 0.0);
        assert!(approx_eq!(f32, buffer[0], 0.25));
        assert!(approx_eq!(f32, buffer[3], 0.25));
    }

    #[test]
    fn ramps_take_time() {
        let mut bus = Bus::default();
        let duck = DuckFilter::new(&mut bus);
        bus.shared()
            .lock()
            .capture_for_test(&[1.0; VISUALIZATION_WINDOW * 2], 2);
        let mut instance = duck.create_instance();
        let mut buffer = [1.0; 10];
        // 0.1 seconds at 100 Hz is 10 samples to go from 1.0 to 0.1.
        instance.filter(&mut buffer, 10, 10, 1, 100.0, 0.0);
        assert!(approx_eq!(f32, buffer[0], 0.91, epsilon = 0.0001));
        assert!(approx_eq!(f32, buffer[9], 0.1, epsilon = 0.0001));
    }
}
