//! Analytic front-end filters
//!
//! A one-pole DC blocker removes the capture chain's offset, then a
//! Kaiser-windowed FIR Hilbert transformer lifts the real microphone feed
//! to the analytic signal the correlator and demodulator consume. The I/Q
//! input path uses the DC blocker alone.

use crate::window::kaiser;
use num_complex::Complex;

type Cf32 = Complex<f32>;

/// One-pole high-pass DC blocker.
///
/// y[n] = b*(x[n] - x[n-1]) + a*y[n-1] with a = (s-1)/s, b = (1+a)/2
/// for an averaging window of `s` samples.
#[derive(Debug, Clone)]
pub struct BlockDc {
    a: f32,
    b: f32,
    x1: Cf32,
    y1: Cf32,
}

impl BlockDc {
    pub fn new(window: usize) -> Self {
        let s = window.max(2) as f32;
        let a = (s - 1.0) / s;
        Self {
            a,
            b: (1.0 + a) / 2.0,
            x1: Cf32::new(0.0, 0.0),
            y1: Cf32::new(0.0, 0.0),
        }
    }

    pub fn process(&mut self, x: Cf32) -> Cf32 {
        let y = (x - self.x1) * self.b + self.y1 * self.a;
        self.x1 = x;
        self.y1 = y;
        y
    }

    pub fn process_real(&mut self, x: f32) -> f32 {
        self.process(Cf32::new(x, 0.0)).re
    }
}

/// FIR Hilbert transformer producing the analytic signal.
///
/// Tap count is `(((33 * rate / 8000) & !3) | 1)` so the group delay is an
/// even number of samples and the filter stays type III (odd length,
/// antisymmetric, even-offset taps zero).
#[derive(Debug, Clone)]
pub struct Hilbert {
    weights: Vec<f32>,
    buf: Vec<f32>,
    pos: usize,
    delay: usize,
    taps: usize,
}

impl Hilbert {
    pub fn new(rate: u32) -> Self {
        let taps = ((33 * rate as usize / 8000) & !3) | 1;
        let delay = taps / 2;
        // one weight per odd offset from the center tap
        let weights: Vec<f32> = (0..delay / 2)
            .map(|i| {
                let k = 2 * i + 1;
                2.0 / (k as f32 * std::f32::consts::PI) * kaiser(2.0, delay + k, taps)
            })
            .collect();
        Self {
            weights,
            buf: vec![0.0; taps],
            pos: 0,
            delay,
            taps,
        }
    }

    pub fn taps(&self) -> usize {
        self.taps
    }

    /// Push one real sample, get the analytic sample (group-delayed).
    pub fn process(&mut self, x: f32) -> Cf32 {
        self.buf[self.pos] = x;
        let at = |back: usize| self.buf[(self.pos + self.taps - back) % self.taps];
        let re = at(self.delay);
        let mut im = 0.0;
        for (i, &w) in self.weights.iter().enumerate() {
            let k = 2 * i + 1;
            // antisymmetric kernel: +w at offset -k, -w at offset +k
            im += w * (at(self.delay + k) - at(self.delay - k));
        }
        self.pos = (self.pos + 1) % self.taps;
        Cf32::new(re, im)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::PI;

    #[test]
    fn test_blockdc_removes_offset() {
        let mut dc = BlockDc::new(320);
        let mut out = 0.0;
        for i in 0..8000 {
            out = dc.process_real(0.5 + 0.1 * (0.05 * i as f32).sin());
        }
        // settled output tracks only the AC part
        let mut acc = 0.0;
        for i in 8000..16000 {
            acc += dc.process_real(0.5 + 0.1 * (0.05 * i as f32).sin());
        }
        assert!((acc / 8000.0).abs() < 0.01, "residual DC {}", acc / 8000.0);
        let _ = out;
    }

    #[test]
    fn test_hilbert_tap_counts() {
        assert_eq!(Hilbert::new(8000).taps(), 33);
        assert_eq!(Hilbert::new(16000).taps(), 65);
        assert_eq!(Hilbert::new(48000).taps(), 197);
    }

    #[test]
    fn test_hilbert_analytic_magnitude_of_tone() {
        // a cosine should come out with near-constant unit magnitude
        let mut h = Hilbert::new(8000);
        let mut mags = Vec::new();
        for n in 0..4000 {
            let x = (2.0 * PI * 1500.0 * n as f32 / 8000.0).cos();
            let y = h.process(x);
            if n > 200 {
                mags.push(y.norm());
            }
        }
        let mean: f32 = mags.iter().sum::<f32>() / mags.len() as f32;
        assert!((mean - 1.0).abs() < 0.05, "mean magnitude {}", mean);
        for &m in &mags {
            assert!((m - 1.0).abs() < 0.2, "magnitude ripple {}", m);
        }
    }

    #[test]
    fn test_hilbert_quadrature_phase() {
        // analytic signal of cos should rotate counterclockwise at +f
        let mut h = Hilbert::new(8000);
        let mut prev = Cf32::new(0.0, 0.0);
        let mut sum = 0.0;
        let mut count = 0;
        for n in 0..2000 {
            let x = (2.0 * PI * 1000.0 * n as f32 / 8000.0).cos();
            let y = h.process(x);
            if n > 200 {
                sum += (y * prev.conj()).arg();
                count += 1;
            }
            prev = y;
        }
        let step = sum / count as f32;
        let expect = 2.0 * PI * 1000.0 / 8000.0;
        assert!((step - expect).abs() < 0.02, "phase step {}", step);
    }
}
