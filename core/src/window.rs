//! Window functions evaluated pointwise
//!
//! Only the Kaiser window is on the signal path (Hilbert FIR design); Hann
//! shapes the guard cross-fade and Blackman is kept for analysis use. None
//! of these are materialized as tables.

/// Zeroth-order modified Bessel function of the first kind.
fn bessel_i0(x: f64) -> f64 {
    let mut sum = 1.0;
    let mut term = 1.0;
    let half = x / 2.0;
    let mut k = 1.0;
    loop {
        term *= (half / k) * (half / k);
        sum += term;
        if term < sum * 1e-12 {
            return sum;
        }
        k += 1.0;
    }
}

/// Kaiser window of shape `alpha` (beta = pi * alpha) at tap `n` of `len`.
pub fn kaiser(alpha: f64, n: usize, len: usize) -> f32 {
    debug_assert!(n < len);
    let beta = std::f64::consts::PI * alpha;
    let x = 2.0 * n as f64 / (len - 1) as f64 - 1.0;
    (bessel_i0(beta * (1.0 - x * x).max(0.0).sqrt()) / bessel_i0(beta)) as f32
}

pub fn hann(n: usize, len: usize) -> f32 {
    debug_assert!(n < len);
    let x = n as f64 / (len - 1) as f64;
    (0.5 - 0.5 * (2.0 * std::f64::consts::PI * x).cos()) as f32
}

pub fn blackman(n: usize, len: usize) -> f32 {
    debug_assert!(n < len);
    let x = 2.0 * std::f64::consts::PI * n as f64 / (len - 1) as f64;
    (0.42 - 0.5 * x.cos() + 0.08 * (2.0 * x).cos()) as f32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bessel_i0_known_values() {
        assert!((bessel_i0(0.0) - 1.0).abs() < 1e-12);
        // I0(1) = 1.2660658...
        assert!((bessel_i0(1.0) - 1.2660658).abs() < 1e-6);
    }

    #[test]
    fn test_kaiser_symmetric_unit_center() {
        let len = 33;
        assert!((kaiser(2.0, len / 2, len) - 1.0).abs() < 1e-6);
        for n in 0..len {
            let a = kaiser(2.0, n, len);
            let b = kaiser(2.0, len - 1 - n, len);
            assert!((a - b).abs() < 1e-6);
            assert!(a > 0.0 && a <= 1.0);
        }
    }

    #[test]
    fn test_hann_endpoints_and_center() {
        assert!(hann(0, 65).abs() < 1e-6);
        assert!(hann(64, 65).abs() < 1e-6);
        assert!((hann(32, 65) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_blackman_endpoints_near_zero() {
        assert!(blackman(0, 65).abs() < 1e-5);
        assert!((blackman(32, 65) - 1.0).abs() < 1e-5);
    }
}
