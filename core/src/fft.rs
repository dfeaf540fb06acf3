//! Complex transform pair for one symbol size
//!
//! Thin owner around rustfft's mixed-radix planner: the symbol sizes here
//! factor over small primes (7680 = 2^9 * 3 * 5 at 48 kHz) and the planner
//! picks the decomposition. Both directions are unnormalized; callers apply
//! the pipeline's own scale factors. The plan and scratch are allocated
//! once at construction so the steady state stays allocation-free.

use num_complex::Complex;
use rustfft::{Fft, FftPlanner};
use std::sync::Arc;

type Cf32 = Complex<f32>;

pub struct Transform {
    size: usize,
    fwd: Arc<dyn Fft<f32>>,
    inv: Arc<dyn Fft<f32>>,
    scratch: Vec<Cf32>,
}

impl Transform {
    pub fn new(size: usize) -> Self {
        let mut planner = FftPlanner::new();
        let fwd = planner.plan_fft_forward(size);
        let inv = planner.plan_fft_inverse(size);
        let scratch_len = fwd
            .get_inplace_scratch_len()
            .max(inv.get_inplace_scratch_len());
        Self {
            size,
            fwd,
            inv,
            scratch: vec![Cf32::new(0.0, 0.0); scratch_len],
        }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// In-place forward DFT (no scaling).
    pub fn forward(&mut self, data: &mut [Cf32]) {
        debug_assert_eq!(data.len(), self.size);
        self.fwd.process_with_scratch(data, &mut self.scratch);
    }

    /// In-place inverse DFT (no scaling; forward then inverse gains `size`).
    pub fn inverse(&mut self, data: &mut [Cf32]) {
        debug_assert_eq!(data.len(), self.size);
        self.inv.process_with_scratch(data, &mut self.scratch);
    }
}

impl std::fmt::Debug for Transform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Transform").field("size", &self.size).finish()
    }
}
