// Copyright (c) 2024 Mike Tsao

use super::Fader;

/// Describes one automatable filter parameter.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ParamInfo {
    /// Short human-readable name.
    pub name: &'static str,
    /// Value before anyone changes it.
    pub default: f32,
    /// Smallest accepted value.
    pub min: f32,
    /// Largest accepted value.
    pub max: f32,
}
impl ParamInfo {
    /// Every filter's parameter 0: how much of the filtered signal replaces
    /// the dry signal.
    pub const WET: ParamInfo = ParamInfo {
        name: "Wet",
        default: 1.0,
        min: 0.0,
        max: 1.0,
    };
}

/// The parameter store shared by filter instances. Each parameter has a
/// current value and a [Fader] that can drive it. Ids index into the list the
/// store was built from, and id 0 is always [ParamInfo::WET].
#[derive(Clone, Debug, Default)]
pub struct FilterParams {
    info: Vec<ParamInfo>,
    values: Vec<f32>,
    faders: Vec<Fader>,
}
impl FilterParams {
    /// Builds a store holding [ParamInfo::WET] followed by `extra`.
    pub fn new(extra: &[ParamInfo]) -> Self {
        let info: Vec<ParamInfo> = core::iter::once(ParamInfo::WET)
            .chain(extra.iter().copied())
            .collect();
        Self {
            values: info.iter().map(|i| i.default).collect(),
            faders: vec![Fader::default(); info.len()],
            info,
        }
    }

    /// Advances every active fader to `time` and stores the results.
    pub fn update(&mut self, time: f64) {
        for ((value, fader), info) in self
            .values
            .iter_mut()
            .zip(self.faders.iter_mut())
            .zip(self.info.iter())
        {
            if fader.is_active() {
                *value = fader.get(time).clamp(info.min, info.max);
            }
        }
    }

    /// The current value of `id`, or 0.0 for an unknown id.
    pub fn get(&self, id: usize) -> f32 {
        self.values.get(id).copied().unwrap_or_default()
    }

    /// Sets `id` immediately, clamped to its range. Stops any fade on it.
    pub fn set(&mut self, id: usize, value: f32) {
        if let (Some(v), Some(f), Some(info)) = (
            self.values.get_mut(id),
            self.faders.get_mut(id),
            self.info.get(id),
        ) {
            f.deactivate();
            *v = value.clamp(info.min, info.max);
        }
    }

    /// Ramps `id` from its current value to `to` over `duration` seconds.
    pub fn fade(&mut self, id: usize, to: f32, duration: f64, now: f64) {
        if let (Some(v), Some(f)) = (self.values.get(id), self.faders.get_mut(id)) {
            f.set(*v, to, duration, now);
        }
    }

    /// Oscillates `id` between `from` and `to`.
    pub fn oscillate(&mut self, id: usize, from: f32, to: f32, period: f64, now: f64) {
        if let Some(f) = self.faders.get_mut(id) {
            f.set_lfo(from, to, period, now);
        }
    }

    /// Number of parameters, including wet.
    pub fn count(&self) -> usize {
        self.info.len()
    }

    #[allow(missing_docs)]
    pub fn info(&self, id: usize) -> Option<&ParamInfo> {
        self.info.get(id)
    }

    /// Shorthand for parameter 0.
    pub fn wet(&self) -> f32 {
        self.get(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use float_cmp::approx_eq;

    const DELAY: ParamInfo = ParamInfo {
        name: "Delay",
        default: 0.3,
        min: 0.0,
        max: 2.0,
    };

    #[test]
    fn wet_is_always_first() {
        let p = FilterParams::new(&[DELAY]);
        assert_eq!(p.count(), 2);
        assert_eq!(p.wet(), 1.0);
        assert_eq!(p.get(1), 0.3);
        assert_eq!(p.get(2), 0.0, "unknown ids read as zero");
        assert_eq!(p.info(1).map(|i| i.name), Some("Delay"));
    }

    #[test]
    fn set_clamps_and_cancels_fades() {
        let mut p = FilterParams::new(&[DELAY]);
        p.set(1, 5.0);
        assert_eq!(p.get(1), 2.0);
        p.fade(1, 0.0, 1.0, 0.0);
        p.update(0.5);
        assert!(approx_eq!(f32, p.get(1), 1.0, epsilon = 0.0001));
        p.set(1, 1.5);
        p.update(0.9);
        assert_eq!(p.get(1), 1.5, "a direct set should win over a stale fade");
        p.set(17, 1.0);
    }

    #[test]
    fn oscillation_drives_value() {
        let mut p = FilterParams::new(&[]);
        p.oscillate(0, 0.0, 1.0, 2.0, 0.0);
        p.update(1.0);
        assert!(approx_eq!(f32, p.wet(), 1.0, epsilon = 0.0001));
        p.update(2.0);
        assert!(approx_eq!(f32, p.wet(), 0.0, epsilon = 0.0001));
    }
}
