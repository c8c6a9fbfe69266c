// Copyright (c) 2024 Mike Tsao

use serde::{Deserialize, Serialize};

/// What a [Fader] is currently doing. The discriminants match the numeric
/// states that diagnostics report.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[repr(i8)]
pub enum FaderState {
    /// Not doing anything. The owner ignores the fader.
    #[default]
    Inactive = 0,
    /// Moving linearly from `from` to `to`.
    Ramp = 1,
    /// Sweeping back and forth between `from` and `to` until deactivated.
    Lfo = 2,
    /// A ramp reached its end time. Owners that schedule something (a pause,
    /// a stop) watch for this state.
    Stopped = -1,
}

/// A [Fader] changes one float over time, either as a one-shot linear ramp or
/// as an endless oscillation. Time is whatever clock the owner passes to
/// [Fader::get()], usually a voice's stream time in seconds.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Fader {
    from: f32,
    to: f32,
    delta: f32,
    duration: f64,
    start_time: f64,
    end_time: f64,
    current: f32,
    state: FaderState,
}
impl Fader {
    /// Arms a ramp from `from` to `to` that starts at `start_time` and lasts
    /// `duration` seconds.
    pub fn set(&mut self, from: f32, to: f32, duration: f64, start_time: f64) {
        self.current = from;
        self.from = from;
        self.to = to;
        self.duration = duration;
        self.start_time = start_time;
        self.delta = to - from;
        self.end_time = start_time + duration;
        self.state = FaderState::Ramp;
    }

    /// Arms an oscillation between `from` and `to` with the given period. The
    /// wave starts at `from`, reaches `to` half a period later, and keeps going
    /// until someone calls [Fader::deactivate()].
    pub fn set_lfo(&mut self, from: f32, to: f32, period: f64, start_time: f64) {
        self.current = from;
        self.from = from;
        self.to = to;
        self.delta = to - from;
        self.duration = period;
        self.start_time = start_time;
        self.end_time = start_time;
        self.state = FaderState::Lfo;
    }

    /// Returns the value at time `now`. A ramp switches to
    /// [FaderState::Stopped] once `now` reaches its end time.
    pub fn get(&mut self, now: f64) -> f32 {
        match self.state {
            FaderState::Lfo => self.oscillate(now),
            FaderState::Ramp => self.ramp(now),
            FaderState::Inactive | FaderState::Stopped => self.current,
        }
    }

    fn oscillate(&mut self, now: f64) -> f32 {
        // The owner's clock went backwards. Restart the cycle rather than
        // extrapolate into negative time.
        if now < self.start_time {
            self.start_time = now;
        }
        if self.duration <= 0.0 {
            self.current = self.from;
            return self.current;
        }
        let cycle_position = ((now - self.start_time) / self.duration).fract();
        let triangle = 4.0 * (cycle_position - (0.5 + cycle_position).floor()).abs() - 1.0;
        self.current = self.from + self.delta * ((triangle + 1.0) / 2.0) as f32;
        self.current
    }

    fn ramp(&mut self, now: f64) -> f32 {
        if now < self.start_time {
            // The clock rolled back. Continue from wherever the ramp had
            // gotten to, over whatever time it had left.
            let progress = if self.delta != 0.0 {
                ((self.current - self.from) / self.delta).clamp(0.0, 1.0)
            } else {
                0.0
            };
            self.from = self.current;
            self.start_time = now;
            self.duration *= 1.0 - progress as f64;
            self.delta = self.to - self.from;
            self.end_time = self.start_time + self.duration;
        }
        if now >= self.end_time {
            self.state = FaderState::Stopped;
            self.current = self.to;
            return self.to;
        }
        let progress = ((now - self.start_time) / self.duration) as f32;
        let (low, high) = if self.from <= self.to {
            (self.from, self.to)
        } else {
            (self.to, self.from)
        };
        self.current = (self.from + self.delta * progress).clamp(low, high);
        self.current
    }

    #[allow(missing_docs)]
    pub fn state(&self) -> FaderState {
        self.state
    }

    /// True while the fader is ramping or oscillating.
    pub fn is_active(&self) -> bool {
        matches!(self.state, FaderState::Ramp | FaderState::Lfo)
    }

    /// True once a ramp has reached its end.
    pub fn has_stopped(&self) -> bool {
        self.state == FaderState::Stopped
    }

    /// Stops the fader without changing the value it last produced.
    pub fn deactivate(&mut self) {
        self.state = FaderState::Inactive;
    }

    /// The most recent value returned by [Fader::get()].
    pub fn current(&self) -> f32 {
        self.current
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use float_cmp::approx_eq;
    use more_asserts::{assert_ge, assert_le};

    #[test]
    fn ramp_hits_both_endpoints() {
        let mut f = Fader::default();
        f.set(0.0, 1.0, 1.0, 10.0);
        assert_eq!(f.state(), FaderState::Ramp);
        assert!(approx_eq!(f32, f.get(10.0), 0.0), "ramp should start at from");
        assert!(
            approx_eq!(f32, f.get(10.5), 0.5, epsilon = 0.0001),
            "ramp should be linear"
        );
        assert!(approx_eq!(f32, f.get(11.0), 1.0), "ramp should end at to");
        assert_eq!(
            f.state(),
            FaderState::Stopped,
            "reaching the end time should stop the ramp"
        );
        assert!(approx_eq!(f32, f.get(50.0), 1.0));
    }

    #[test]
    fn ramp_is_monotonic() {
        let mut f = Fader::default();
        f.set(0.2, 0.9, 2.0, 0.0);
        let mut last = f.get(0.0);
        for i in 1..=200 {
            let value = f.get(i as f64 * 0.01);
            assert_ge!(value, last, "an ascending ramp must never decrease");
            assert_le!(value, 0.9, "a ramp must never overshoot");
            last = value;
        }

        let mut f = Fader::default();
        f.set(1.0, 0.0, 1.0, 0.0);
        let mut last = f.get(0.0);
        for i in 1..=100 {
            let value = f.get(i as f64 * 0.01);
            assert_le!(value, last, "a descending ramp must never increase");
            last = value;
        }
    }

    #[test]
    fn zero_length_ramp_jumps_to_target() {
        let mut f = Fader::default();
        f.set(0.0, 0.7, 0.0, 3.0);
        assert!(approx_eq!(f32, f.get(3.0), 0.7));
        assert!(f.has_stopped());
    }

    #[test]
    fn ramp_survives_clock_rollback() {
        let mut f = Fader::default();
        f.set(0.0, 1.0, 1.0, 5.0);
        let before = f.get(5.5);
        let after = f.get(1.0);
        assert!(
            approx_eq!(f32, before, after, epsilon = 0.0001),
            "rolling the clock back should resume from the last value"
        );
        assert!(approx_eq!(f32, f.get(1.5), 1.0, epsilon = 0.0001));
    }

    #[test]
    fn lfo_oscillates_until_deactivated() {
        let mut f = Fader::default();
        f.set_lfo(0.25, 0.75, 2.0, 0.0);
        assert!(approx_eq!(f32, f.get(0.0), 0.25));
        assert!(approx_eq!(f32, f.get(1.0), 0.75, epsilon = 0.0001));
        assert!(approx_eq!(f32, f.get(2.0), 0.25, epsilon = 0.0001));
        for i in 0..1000 {
            let value = f.get(i as f64 * 0.037);
            assert_ge!(value, 0.25 - f32::EPSILON);
            assert_le!(value, 0.75 + f32::EPSILON);
        }
        assert!(f.is_active(), "an LFO never stops on its own");
        f.deactivate();
        assert!(!f.is_active());
        assert_eq!(f.state(), FaderState::Inactive);
    }
}
