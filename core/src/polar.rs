//! Polar code for the payload
//!
//! Length-2048 polar code in NRZ form (+1/-1, multiplication is XOR).
//! Three operating modes share the code length and differ in rate through
//! their frozen-bit tables; each information block carries a trailing
//! CRC-32 that steers list-path selection at the receiver. The systematic
//! encoder (transform, re-insert frozen ones, transform again) puts the
//! message bits directly on the non-frozen codeword positions.

use crate::bits::{get_le_bit, set_le_bit};
use crate::crc::Crc32;
use crate::polar_list::{PolarListDecoder, LANES};
use crate::{CODE_LEN, DATA_CRC_POLY};

/// CRC bits appended to each information block.
pub const CRC_BITS: usize = 32;

/// Payload capacity in bits per mode, None for unsupported modes.
pub fn data_bits(mode: u8) -> Option<usize> {
    match mode {
        14 => Some(1360),
        15 => Some(1024),
        16 => Some(680),
        _ => None,
    }
}

/// Smallest mode whose capacity holds `bytes` payload bytes.
pub fn mode_for_length(bytes: usize) -> u8 {
    match bytes * 8 {
        0..=680 => 16,
        681..=1024 => 15,
        _ => 14,
    }
}

pub fn is_frozen(table: &[u32], i: usize) -> bool {
    (table[i / 32] >> (i % 32)) & 1 != 0
}

/// Frozen table for `info_count` information positions, packed 32 per word.
///
/// Channel reliabilities follow the beta-expansion polarization weight
/// (beta = 2^(1/4)); ties break on index so the table is deterministic.
pub fn frozen_table(info_count: usize) -> Vec<u32> {
    let beta = 2f64.powf(0.25);
    let weight = |i: usize| -> f64 {
        (0..11)
            .filter(|&j| (i >> j) & 1 == 1)
            .map(|j| beta.powi(j))
            .sum()
    };
    let mut order: Vec<usize> = (0..CODE_LEN).collect();
    order.sort_by(|&a, &b| {
        weight(b)
            .partial_cmp(&weight(a))
            .unwrap()
            .then(a.cmp(&b))
    });
    let mut table = vec![0u32; CODE_LEN / 32];
    for &i in &order[info_count..] {
        table[i / 32] |= 1 << (i % 32);
    }
    table
}

/// In-place polar transform (the transform is an involution over GF(2)).
fn transform(code: &mut [i8]) {
    let n = code.len();
    let mut h = 1;
    while h < n {
        let mut i = 0;
        while i < n {
            for j in i..i + h {
                code[j] *= code[j + h];
            }
            i += 2 * h;
        }
        h *= 2;
    }
}

/// Non-systematic encode: message bits land on the non-frozen u positions.
pub fn encode(code: &mut [i8], message: &[i8], frozen: &[u32]) {
    let mut mi = 0;
    for (i, c) in code.iter_mut().enumerate() {
        if is_frozen(frozen, i) {
            *c = 1;
        } else {
            *c = message[mi];
            mi += 1;
        }
    }
    transform(code);
}

/// Systematic encode: non-frozen codeword positions equal the message.
pub fn encode_systematic(code: &mut [i8], message: &[i8], frozen: &[u32]) {
    encode(code, message, frozen);
    for (i, c) in code.iter_mut().enumerate() {
        if is_frozen(frozen, i) {
            *c = 1;
        }
    }
    transform(code);
}

struct ModeTable {
    mode: u8,
    data_bits: usize,
    frozen: Vec<u32>,
}

/// CRC-aided polar codec covering all three payload modes.
pub struct PolarCodec {
    tables: Vec<ModeTable>,
    list: PolarListDecoder,
    message: Vec<i8>,
    codeword: Vec<i8>,
}

impl PolarCodec {
    pub fn new() -> Self {
        let tables: Vec<ModeTable> = [14u8, 15, 16]
            .iter()
            .map(|&mode| {
                let bits = data_bits(mode).unwrap();
                let frozen = frozen_table(bits + CRC_BITS);
                debug_assert_eq!(
                    bits + CRC_BITS
                        + frozen.iter().map(|w| w.count_ones() as usize).sum::<usize>(),
                    CODE_LEN
                );
                ModeTable {
                    mode,
                    data_bits: bits,
                    frozen,
                }
            })
            .collect();
        Self {
            tables,
            list: PolarListDecoder::new(CODE_LEN),
            message: vec![0; CODE_LEN],
            codeword: vec![0; CODE_LEN],
        }
    }

    fn table(&self, mode: u8) -> &ModeTable {
        self.tables
            .iter()
            .find(|t| t.mode == mode)
            .expect("unsupported mode")
    }

    /// Systematically encode scrambled payload bytes plus their CRC-32.
    pub fn encode(&mut self, code: &mut [i8], payload: &[u8], mode: u8) {
        let (bits, frozen) = {
            let t = self.table(mode);
            (t.data_bits, t.frozen.clone())
        };
        debug_assert_eq!(payload.len() * 8, bits);
        let crc = Crc32::compute(DATA_CRC_POLY, payload);
        let info = bits + CRC_BITS;
        for i in 0..bits {
            self.message[i] = if get_le_bit(payload, i) { -1 } else { 1 };
        }
        for j in 0..CRC_BITS {
            self.message[bits + j] = if (crc >> j) & 1 != 0 { -1 } else { 1 };
        }
        encode_systematic(code, &self.message[..info], &frozen);
    }

    /// List-decode, pick the first CRC-consistent path, unpack the
    /// (still scrambled) payload bytes. Returns the number of corrected
    /// bit flips against the received hard decisions, or -1.
    pub fn decode(&mut self, payload_out: &mut [u8], code: &[i8], mode: u8) -> i32 {
        let (info, bits, frozen) = {
            let t = self.table(mode);
            (t.data_bits + CRC_BITS, t.data_bits, t.frozen.clone())
        };
        self.list.decode(code, &frozen, info);
        let order = self.list.lane_order();
        let data_bytes = bits / 8;
        for &lane in order.iter().take(LANES) {
            self.list.extract(lane, &mut self.message[..info]);
            encode(&mut self.codeword, &self.message[..info], &frozen);
            // message as seen by the systematic transmitter
            let mut bytes = vec![0u8; (info + 7) / 8];
            let mut k = 0;
            for (i, &c) in self.codeword.iter().enumerate() {
                if !is_frozen(&frozen, i) {
                    set_le_bit(&mut bytes, k, c < 0);
                    k += 1;
                }
            }
            let mut crc = 0u32;
            for j in 0..CRC_BITS {
                crc |= (get_le_bit(&bytes, bits + j) as u32) << j;
            }
            if Crc32::compute(DATA_CRC_POLY, &bytes[..data_bytes]) == crc {
                let flips = self
                    .codeword
                    .iter()
                    .zip(code.iter())
                    .filter(|(&cw, &llr)| (cw < 0) != (llr < 0))
                    .count() as i32;
                payload_out[..data_bytes].copy_from_slice(&bytes[..data_bytes]);
                return flips;
            }
        }
        -1
    }
}

impl Default for PolarCodec {
    fn default() -> Self {
        Self::new()
    }
}
