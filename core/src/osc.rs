//! Unit-modulus phasor oscillator
//!
//! Complex NCO advanced by multiplication with a fixed per-sample step.
//! The state is renormalized on every call so the magnitude cannot drift
//! over the length of a burst.

use num_complex::Complex;

type Cf32 = Complex<f32>;

#[derive(Debug, Clone)]
pub struct Phasor {
    state: Cf32,
    step: Cf32,
}

impl Phasor {
    pub fn new() -> Self {
        Self {
            state: Cf32::new(1.0, 0.0),
            step: Cf32::new(1.0, 0.0),
        }
    }

    /// Set the per-sample phase increment in radians.
    pub fn omega(&mut self, omega: f32) {
        self.step = Cf32::from_polar(1.0, omega);
    }

    /// Set the per-sample phase increment in cycles.
    pub fn freq(&mut self, cycles: f32) {
        self.omega(2.0 * std::f32::consts::PI * cycles);
    }

    /// Restart at phase zero.
    pub fn reset(&mut self) {
        self.state = Cf32::new(1.0, 0.0);
    }

    /// Jump the phase by `radians` without changing the step.
    pub fn advance(&mut self, radians: f32) {
        self.state *= Cf32::from_polar(1.0, radians);
        self.state /= self.state.norm();
    }

    /// Current phasor; advances the state by one step.
    pub fn get(&mut self) -> Cf32 {
        let out = self.state;
        self.state *= self.step;
        self.state /= self.state.norm();
        out
    }
}

impl Default for Phasor {
    fn default() -> Self {
        Self::new()
    }
}
