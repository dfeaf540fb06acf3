//! Ordered-statistics decoding for the preamble code
//!
//! Soft decoder over the BCH(255,71) generator matrix. The 71 most
//! reliable independent coordinates are driven to an identity block by
//! Gauss-Jordan elimination with column pivoting, hard decisions on those
//! coordinates seed a base codeword, and reprocessing tests every single
//! and pair flip of the basis (order 2). A decode is accepted only when
//! the best correlation metric strictly beats the runner-up.

use crate::bch;
use crate::bits::set_be_bit;

const WORDS: usize = 4;

fn get_bit(row: &[u64; WORDS], col: usize) -> bool {
    (row[col / 64] >> (col % 64)) & 1 != 0
}

fn correlation(cand: &[u64; WORDS], soft: &[f32]) -> f32 {
    // sum(soft * nrz(bit)) = total - 2 * sum(soft over set bits)
    let mut flipped = 0.0f32;
    for (w, &word) in cand.iter().enumerate() {
        let mut bits = word;
        while bits != 0 {
            let b = bits.trailing_zeros() as usize;
            flipped += soft[w * 64 + b];
            bits &= bits - 1;
        }
    }
    soft.iter().sum::<f32>() - 2.0 * flipped
}

pub struct OsdDecoder {
    rows: Vec<[u64; WORDS]>,
}

impl OsdDecoder {
    pub fn new(bch: &bch::Bch) -> Self {
        Self {
            rows: bch.generator_matrix(),
        }
    }

    /// Decode 255 soft values (positive = bit 0) into the 71 information
    /// bits (big-endian bit order). Returns false when the decision is not
    /// unambiguous.
    pub fn decode(&self, soft: &[f32], data_out: &mut [u8]) -> bool {
        debug_assert_eq!(soft.len(), bch::N);
        let mut rows = self.rows.clone();
        let mut perm: Vec<usize> = (0..bch::N).collect();
        perm.sort_by(|&a, &b| soft[b].abs().partial_cmp(&soft[a].abs()).unwrap());

        // most reliable independent basis via Gauss-Jordan, column pivoting
        let mut pos = 0;
        for r in 0..bch::K {
            loop {
                if pos >= bch::N {
                    return false;
                }
                let col = perm[pos];
                if let Some(pivot) = (r..bch::K).find(|&rr| get_bit(&rows[rr], col)) {
                    rows.swap(r, pivot);
                    for j in 0..bch::K {
                        if j != r && get_bit(&rows[j], col) {
                            let src = rows[r];
                            for (d, s) in rows[j].iter_mut().zip(&src) {
                                *d ^= s;
                            }
                        }
                    }
                    perm.swap(r, pos);
                    pos += 1;
                    break;
                }
                pos += 1;
            }
        }

        // hard decisions on the basis seed the base codeword
        let mut base = [0u64; WORDS];
        for r in 0..bch::K {
            if soft[perm[r]] < 0.0 {
                for (d, s) in base.iter_mut().zip(&rows[r]) {
                    *d ^= s;
                }
            }
        }

        let mut best = base;
        let mut best_metric = correlation(&base, soft);
        let mut second_metric = f32::NEG_INFINITY;
        let mut consider = |cand: [u64; WORDS], metric: f32| {
            if metric > best_metric {
                second_metric = best_metric;
                best_metric = metric;
                best = cand;
            } else if metric > second_metric {
                second_metric = metric;
            }
        };

        for i in 0..bch::K {
            let mut one = base;
            for (d, s) in one.iter_mut().zip(&rows[i]) {
                *d ^= s;
            }
            consider(one, correlation(&one, soft));
            for j in i + 1..bch::K {
                let mut two = one;
                for (d, s) in two.iter_mut().zip(&rows[j]) {
                    *d ^= s;
                }
                consider(two, correlation(&two, soft));
            }
        }

        if best_metric <= second_metric {
            return false;
        }
        for i in 0..bch::K {
            set_be_bit(data_out, i, get_bit(&best, i));
        }
        true
    }
}
