//! Schmidl-Cox burst acquisition
//!
//! Streaming correlator over the analytic signal. The transmitted
//! correlation symbol carries an MLS-derived sequence on even bins only,
//! so its body repeats with lag L/2; the running metric
//! `M = |P|^2 / R^2` (P over lag-L/2 products, R over the forward 2L
//! power) rises over the two correlation symbols and a Schmitt trigger
//! with a matched-filter sum marks the plateau. On the falling edge the
//! latched peak yields the fractional CFO from the phase of P, and a
//! frequency-domain kernel correlation refines the sample position and
//! resolves the even integer carrier shift.

use crate::buffers::{DelayLine, SlidingSum};
use crate::fft::Transform;
use crate::osc::Phasor;
use crate::prng::Mls;
use crate::trigger::{FallingEdge, SchmittTrigger};
use crate::{Geometry, COR_SEQ_LEN, COR_SEQ_OFF, COR_SEQ_POLY};
use num_complex::Complex;

type Cf32 = Complex<f32>;

/// Even carrier shifts tried against the kernel (two-bin steps; the
/// fractional CFO estimate already resolves anything finer).
const SHIFT_RANGE: i32 = 8;

/// Accepted sync candidate.
#[derive(Debug, Clone, Copy)]
pub struct SyncHit {
    /// Absolute sample index of the first correlation symbol's body.
    pub position: i64,
    /// Carrier frequency offset from nominal, radians per sample.
    pub cfo_rad: f32,
}

/// Frequency-domain correlation sequence at the given carrier bin,
/// shared verbatim between the encoder and the receive kernel. The values
/// chain differentially along the comb.
pub fn correlation_sequence(geo: &Geometry, carrier_bin: i32) -> Vec<Cf32> {
    let mut freq = vec![Cf32::new(0.0, 0.0); geo.symbol];
    let mut seq = Mls::new(COR_SEQ_POLY);
    let mut value = Cf32::new(1.0, 0.0);
    for j in 0..COR_SEQ_LEN as i32 {
        value *= if seq.next() { -1.0 } else { 1.0 };
        freq[geo.bin(carrier_bin + COR_SEQ_OFF + 2 * j)] = value;
    }
    freq
}

pub struct SchmidlCox {
    geo: Geometry,
    carrier_bin: i32,
    search_position: usize,
    match_len: usize,
    kernel: Vec<Cf32>,
    fft: Transform,
    // streaming state
    delay_half: DelayLine<Cf32>,
    sma_p: SlidingSum<Cf32>,
    sma_r: SlidingSum<f32>,
    delay_p: DelayLine<Cf32>,
    match_sum: SlidingSum<f32>,
    delay_phase: DelayLine<Cf32>,
    schmitt: SchmittTrigger,
    falling: FallingEdge,
    sample_count: i64,
    peak_metric: f32,
    peak_phase: f32,
    peak_index: i64,
    latched_phase: f32,
    latched_index: i64,
    // fine-sync scratch
    window: Vec<Cf32>,
    spectrum: Vec<Cf32>,
    product: Vec<Cf32>,
}

impl SchmidlCox {
    pub fn new(geo: Geometry, carrier_bin: i32) -> Self {
        let l = geo.symbol;
        let match_len = geo.guard | 1;
        let kernel: Vec<Cf32> = correlation_sequence(&geo, carrier_bin)
            .iter()
            .map(|v| v.conj())
            .collect();
        Self {
            geo,
            carrier_bin,
            // aims the refinement window a quarter guard early, inside the
            // cyclic prefix, so the peak-tracker's latch jitter stays on
            // the ISI-free side of the body
            search_position: 3 * geo.guard / 4,
            match_len,
            kernel,
            fft: Transform::new(l),
            delay_half: DelayLine::new(l / 2),
            sma_p: SlidingSum::new(l),
            sma_r: SlidingSum::new(2 * l),
            delay_p: DelayLine::new(3 * l / 2),
            match_sum: SlidingSum::new(match_len),
            delay_phase: DelayLine::new((match_len - 1) / 2),
            schmitt: SchmittTrigger::new(0.17 * match_len as f32, 0.19 * match_len as f32),
            falling: FallingEdge::new(),
            sample_count: 0,
            peak_metric: 0.0,
            peak_phase: 0.0,
            peak_index: 0,
            latched_phase: 0.0,
            latched_index: 0,
            window: vec![Cf32::new(0.0, 0.0); l],
            spectrum: vec![Cf32::new(0.0, 0.0); l],
            product: vec![Cf32::new(0.0, 0.0); l],
        }
    }

    /// Samples of history `extract` may reach back from the newest sample.
    pub fn reach(&self) -> usize {
        4 * self.geo.symbol
    }

    /// Consume one analytic sample. True marks a detection plateau's
    /// falling edge; call `extract` before feeding further samples.
    pub fn put(&mut self, x: Cf32) -> bool {
        let l = self.geo.symbol as i64;
        let delayed = self.delay_half.put(x);
        let p_raw = self.sma_p.put(delayed.conj() * x);
        let r_raw = 0.5 * self.sma_r.put(x.norm_sqr());
        let p_del = self.delay_p.put(p_raw);
        let metric = if r_raw > 1e-12 {
            p_del.norm_sqr() / (r_raw * r_raw)
        } else {
            0.0
        };
        let filtered = self.match_sum.put(metric);
        let p_centered = self.delay_phase.put(p_del);

        let high = self.schmitt.put(filtered);
        // the margin keeps the earliest of near-equal plateau maxima, so a
        // late secondary lobe cannot steal the anchor
        if high && filtered > self.peak_metric * 1.02 {
            self.peak_metric = filtered;
            self.peak_phase = p_centered.arg();
            self.peak_index =
                self.sample_count - 3 * l + 1 - (self.match_len as i64 - 1) / 2;
        }
        let fall = self.falling.put(high);
        if fall {
            self.latched_phase = self.peak_phase;
            self.latched_index = self.peak_index;
            self.peak_metric = 0.0;
        }
        self.sample_count += 1;
        fall
    }

    /// Fine synchronization on the latched candidate. `view` holds the
    /// most recent samples, `view_start` the absolute index of `view[0]`.
    pub fn extract(&mut self, view: &[Cf32], view_start: i64) -> Option<SyncHit> {
        let l = self.geo.symbol;
        let guard = self.geo.guard;
        // latched index points at the start of the periodic region
        let body = self.latched_index + self.search_position as i64;
        let rel = body - view_start;
        if rel < 0 || rel as usize + l > view.len() {
            return None;
        }
        let rel = rel as usize;

        let frac_cfo = self.latched_phase / (l as f32 / 2.0);
        let mut osc = Phasor::new();
        osc.omega(-frac_cfo);
        for (w, &x) in self.window.iter_mut().zip(&view[rel..rel + l]) {
            *w = x * osc.get();
        }
        self.fft.forward(&mut self.window);
        self.spectrum.copy_from_slice(&self.window);

        // erase quiet bins so only comb energy correlates
        let mean_pwr = self.spectrum.iter().map(|v| v.norm_sqr()).sum::<f32>() / l as f32;
        for v in self.spectrum.iter_mut() {
            if v.norm_sqr() < mean_pwr {
                *v = Cf32::new(0.0, 0.0);
            }
        }

        let mut best_power = 0.0f32;
        let mut best_shift = 0i32;
        let mut best_pos = 0usize;
        for shift in (-SHIFT_RANGE..=SHIFT_RANGE).step_by(2) {
            for (k, p) in self.product.iter_mut().enumerate() {
                let kk = self.geo.bin(k as i32 - shift);
                *p = self.spectrum[k] * self.kernel[kk];
            }
            self.fft.inverse(&mut self.product);
            for (n, v) in self.product.iter().enumerate() {
                let power = v.norm_sqr();
                if power > best_power {
                    best_power = power;
                    best_shift = shift;
                    best_pos = n;
                }
            }
        }
        if best_power <= 0.0 {
            return None;
        }

        // runner-up in the winning rotation, outside the folded main lobe
        for (k, p) in self.product.iter_mut().enumerate() {
            let kk = self.geo.bin(k as i32 - best_shift);
            *p = self.spectrum[k] * self.kernel[kk];
        }
        self.fft.inverse(&mut self.product);
        let half = l / 2;
        let exclusion = (l / 256).max(2);
        let mut runner_up = 0.0f32;
        for (n, v) in self.product.iter().enumerate() {
            // distance to the peak modulo the half-symbol period, so the
            // repetition aliases of the main lobe are excluded too
            let df = (n + half - best_pos % half) % half;
            let dist = df.min(half - df);
            if dist > exclusion {
                runner_up = runner_up.max(v.norm_sqr());
            }
        }
        if best_power <= 4.0 * runner_up {
            return None;
        }

        // fold the peak index into the signed half-period range
        let quarter = (l / 4) as i64;
        let folded = ((best_pos as i64 + quarter).rem_euclid(half as i64)) - quarter;
        let pos_err = -folded;
        if pos_err.unsigned_abs() as usize > guard / 2 {
            return None;
        }

        let mut cfo_rad =
            frac_cfo + best_shift as f32 * 2.0 * std::f32::consts::PI / l as f32;
        while cfo_rad > std::f32::consts::PI {
            cfo_rad -= 2.0 * std::f32::consts::PI;
        }
        while cfo_rad <= -std::f32::consts::PI {
            cfo_rad += 2.0 * std::f32::consts::PI;
        }

        Some(SyncHit {
            position: body - pos_err,
            cfo_rad,
        })
    }

    pub fn carrier_bin(&self) -> i32 {
        self.carrier_bin
    }
}
