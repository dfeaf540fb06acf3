//! Crest-factor reduction by oversampled clipping
//!
//! Each outbound symbol's sparse spectrum is zero-padded to an oversampled
//! grid, taken to the time domain, magnitude-clipped at unit level and
//! brought back, keeping only the originally active bins. Out-of-band
//! clipping products land on inactive bins and are discarded, so the
//! subcarrier set is preserved while the peak-to-average ratio drops.

use crate::fft::Transform;
use crate::Geometry;
use num_complex::Complex;

type Cf32 = Complex<f32>;

pub struct PaprReducer {
    size: usize,
    over: usize,
    fft: Transform,
    buf: Vec<Cf32>,
}

impl PaprReducer {
    pub fn new(geo: &Geometry) -> Self {
        let factor = ((32000 + geo.rate / 2) / geo.rate) as usize;
        let over = factor.max(1) * geo.symbol;
        Self {
            size: geo.symbol,
            over,
            fft: Transform::new(over),
            buf: vec![Cf32::new(0.0, 0.0); over],
        }
    }

    /// Oversampling factor in use (1 at 32 kHz and above).
    pub fn factor(&self) -> usize {
        self.over / self.size
    }

    /// Clip `freq` (length L, wrap-around layout) in the oversampled time
    /// domain; only bins listed in `active` survive the trip back.
    pub fn reduce(&mut self, freq: &mut [Cf32], active: &[usize]) {
        debug_assert_eq!(freq.len(), self.size);
        let pad = self.over - self.size;
        self.buf.fill(Cf32::new(0.0, 0.0));
        for &bin in active {
            let dst = if bin < self.size / 2 { bin } else { bin + pad };
            self.buf[dst] = freq[bin];
        }

        let scale = 1.0 / (self.over as f32).sqrt();
        self.fft.inverse(&mut self.buf);
        for v in self.buf.iter_mut() {
            *v *= scale;
            let mag = v.norm();
            if mag > 1.0 {
                *v /= mag;
            }
        }

        self.fft.forward(&mut self.buf);
        freq.fill(Cf32::new(0.0, 0.0));
        for &bin in active {
            let src = if bin < self.size / 2 { bin } else { bin + pad };
            freq[bin] = self.buf[src] * scale;
        }
    }
}
