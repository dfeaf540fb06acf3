//! Visual callsign header
//!
//! Optional trailer of eleven symbols that paints the callsign into the
//! waterfall: each symbol carries one pixel row of the nine glyphs, eight
//! carriers per character cell, BPSK with alternating signs. Receivers
//! never decode it; it exists for the operator watching a spectrogram.

use crate::base37;
use crate::{Geometry, CALLSIGN_LEN};
use num_complex::Complex;

type Cf32 = Complex<f32>;

/// Symbols in the header (glyph rows plus blank padding).
pub const FANCY_ROWS: usize = 11;

/// Pixel columns per character cell.
const CELL: usize = 8;

/// 5x7 glyphs, one per base-37 digit; bit 4 is the leftmost pixel.
const GLYPHS: [[u8; 7]; 37] = [
    [0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00], // space
    [0x0E, 0x11, 0x13, 0x15, 0x19, 0x11, 0x0E], // 0
    [0x04, 0x0C, 0x04, 0x04, 0x04, 0x04, 0x0E], // 1
    [0x0E, 0x11, 0x01, 0x02, 0x04, 0x08, 0x1F], // 2
    [0x1F, 0x02, 0x04, 0x02, 0x01, 0x11, 0x0E], // 3
    [0x02, 0x06, 0x0A, 0x12, 0x1F, 0x02, 0x02], // 4
    [0x1F, 0x10, 0x1E, 0x01, 0x01, 0x11, 0x0E], // 5
    [0x06, 0x08, 0x10, 0x1E, 0x11, 0x11, 0x0E], // 6
    [0x1F, 0x01, 0x02, 0x04, 0x08, 0x08, 0x08], // 7
    [0x0E, 0x11, 0x11, 0x0E, 0x11, 0x11, 0x0E], // 8
    [0x0E, 0x11, 0x11, 0x0F, 0x01, 0x02, 0x0C], // 9
    [0x0E, 0x11, 0x11, 0x1F, 0x11, 0x11, 0x11], // A
    [0x1E, 0x11, 0x11, 0x1E, 0x11, 0x11, 0x1E], // B
    [0x0E, 0x11, 0x10, 0x10, 0x10, 0x11, 0x0E], // C
    [0x1C, 0x12, 0x11, 0x11, 0x11, 0x12, 0x1C], // D
    [0x1F, 0x10, 0x10, 0x1E, 0x10, 0x10, 0x1F], // E
    [0x1F, 0x10, 0x10, 0x1E, 0x10, 0x10, 0x10], // F
    [0x0E, 0x11, 0x10, 0x17, 0x11, 0x11, 0x0F], // G
    [0x11, 0x11, 0x11, 0x1F, 0x11, 0x11, 0x11], // H
    [0x0E, 0x04, 0x04, 0x04, 0x04, 0x04, 0x0E], // I
    [0x07, 0x02, 0x02, 0x02, 0x02, 0x12, 0x0C], // J
    [0x11, 0x12, 0x14, 0x18, 0x14, 0x12, 0x11], // K
    [0x10, 0x10, 0x10, 0x10, 0x10, 0x10, 0x1F], // L
    [0x11, 0x1B, 0x15, 0x15, 0x11, 0x11, 0x11], // M
    [0x11, 0x19, 0x15, 0x13, 0x11, 0x11, 0x11], // N
    [0x0E, 0x11, 0x11, 0x11, 0x11, 0x11, 0x0E], // O
    [0x1E, 0x11, 0x11, 0x1E, 0x10, 0x10, 0x10], // P
    [0x0E, 0x11, 0x11, 0x11, 0x15, 0x12, 0x0D], // Q
    [0x1E, 0x11, 0x11, 0x1E, 0x14, 0x12, 0x11], // R
    [0x0F, 0x10, 0x10, 0x0E, 0x01, 0x01, 0x1E], // S
    [0x1F, 0x04, 0x04, 0x04, 0x04, 0x04, 0x04], // T
    [0x11, 0x11, 0x11, 0x11, 0x11, 0x11, 0x0E], // U
    [0x11, 0x11, 0x11, 0x11, 0x11, 0x0A, 0x04], // V
    [0x11, 0x11, 0x11, 0x15, 0x15, 0x15, 0x0A], // W
    [0x11, 0x11, 0x0A, 0x04, 0x0A, 0x11, 0x11], // X
    [0x11, 0x11, 0x0A, 0x04, 0x04, 0x04, 0x04], // Y
    [0x1F, 0x01, 0x02, 0x04, 0x08, 0x10, 0x1F], // Z
];

/// Paint one pixel row of the callsign onto `freq`; returns the bins lit.
/// Rows run top to bottom with two blank rows above and below the glyphs.
pub fn paint_row(
    freq: &mut [Cf32],
    geo: &Geometry,
    carrier_bin: i32,
    callsign: u64,
    row: usize,
) -> Vec<usize> {
    debug_assert!(row < FANCY_ROWS);
    let mut active = Vec::new();
    if !(2..9).contains(&row) {
        return active;
    }
    let glyph_row = row - 2;
    let text = base37::decode(callsign, CALLSIGN_LEN);
    let width = (CALLSIGN_LEN * CELL) as i32;
    for (k, ch) in text.bytes().enumerate() {
        let digit = match ch {
            b'0'..=b'9' => ch - b'0' + 1,
            b'A'..=b'Z' => ch - b'A' + 11,
            _ => 0,
        } as usize;
        let pixels = GLYPHS[digit][glyph_row];
        for col in 0..5usize {
            if (pixels >> (4 - col)) & 1 != 0 {
                // waterfall reads left to right as ascending frequency
                let cell = (k * CELL) as i32 + col as i32 + 1;
                let bin = geo.bin(carrier_bin - width / 2 + cell);
                let sign = if (row + k + col) % 2 == 0 { 1.0 } else { -1.0 };
                freq[bin] = Cf32::new(sign, 0.0);
                active.push(bin);
            }
        }
    }
    active
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blank_rows_paint_nothing() {
        let geo = Geometry::new(8000).unwrap();
        let mut freq = vec![Cf32::new(0.0, 0.0); geo.symbol];
        for row in [0usize, 1, 9, 10] {
            assert!(paint_row(&mut freq, &geo, 240, base37::encode("W1AW"), row).is_empty());
        }
    }

    #[test]
    fn test_glyph_rows_light_carriers() {
        let geo = Geometry::new(8000).unwrap();
        let call = base37::encode("W1AW");
        let mut total = 0;
        for row in 2..9 {
            let mut freq = vec![Cf32::new(0.0, 0.0); geo.symbol];
            let active = paint_row(&mut freq, &geo, 240, call, row);
            for &bin in &active {
                assert!(freq[bin].norm() > 0.0);
            }
            total += active.len();
        }
        // four glyphs worth of pixels, well over zero
        assert!(total > 40, "lit {} pixels", total);
    }

    #[test]
    fn test_space_padded_tail_is_dark() {
        let geo = Geometry::new(8000).unwrap();
        let call = base37::encode("A");
        let active = paint_row(&mut vec![Cf32::new(0.0, 0.0); geo.symbol], &geo, 240, call, 5);
        // only the first cell can be lit
        for &bin in &active {
            let rel = bin as i32 - (240 - 36);
            assert!((0..8).contains(&rel), "pixel outside first cell at {}", rel);
        }
    }
}
