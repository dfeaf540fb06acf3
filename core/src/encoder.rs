//! Burst assembly
//!
//! The encoder is reconfigured once per message and then pulled one
//! extended-length symbol at a time: optional noise preroll, two identical
//! Schmidl-Cox symbols, the BCH-protected metadata preamble, four
//! differential-QPSK payload symbols carrying the polar codeword, the
//! optional visual callsign header and a closing silence. Every symbol is
//! shaped in the frequency domain, crest-reduced, brought to time with a
//! cosine cross-faded guard and emitted as Int16.

use crate::base37;
use crate::bch::Bch;
use crate::bits::set_be_bit;
use crate::crc::Crc16;
use crate::fancy;
use crate::fft::Transform;
use crate::papr::PaprReducer;
use crate::polar::{self, PolarCodec};
use crate::prng::{Mls, Xorshift32};
use crate::sync::correlation_sequence;
use crate::{
    Geometry, Result, CODE_LEN, MAX_PAYLOAD_BYTES, META_CRC_POLY, NOISE_POLY, PAY_CAR_CNT,
    PAY_CAR_OFF, PAY_SYM_CNT, PRE_SEQ_LEN, PRE_SEQ_OFF, PRE_SEQ_POLY,
};
use num_complex::Complex;

type Cf32 = Complex<f32>;

const FRAC_1_SQRT_2: f32 = std::f32::consts::FRAC_1_SQRT_2;

enum Symbol {
    Noise,
    Correlation,
    Preamble,
    Payload(usize),
    Fancy(usize),
    Silence,
}

pub struct Encoder {
    geo: Geometry,
    fft: Transform,
    papr: PaprReducer,
    codec: PolarCodec,
    bch: Bch,
    // burst state
    carrier_bin: i32,
    mode: u8,
    meta: u64,
    code: Vec<i8>,
    count_down: u8,
    noise_count: usize,
    fancy_header: bool,
    fancy_row: usize,
    pay_sym: usize,
    // symbol pipeline
    fdom: Vec<Cf32>,
    prev_fdom: Vec<Cf32>,
    tdom: Vec<Cf32>,
    tail: Vec<f32>,
    active: Vec<usize>,
    noise_seq: Mls,
}

impl Encoder {
    pub fn new(rate: u32) -> Result<Self> {
        let geo = Geometry::new(rate)?;
        Ok(Self {
            geo,
            fft: Transform::new(geo.symbol),
            papr: PaprReducer::new(&geo),
            codec: PolarCodec::new(),
            bch: Bch::new(),
            carrier_bin: 0,
            mode: 0,
            meta: 0,
            code: vec![0; CODE_LEN],
            count_down: 0,
            noise_count: 0,
            fancy_header: false,
            fancy_row: 0,
            pay_sym: 0,
            fdom: vec![Cf32::new(0.0, 0.0); geo.symbol],
            prev_fdom: vec![Cf32::new(0.0, 0.0); PAY_CAR_CNT],
            tdom: vec![Cf32::new(0.0, 0.0); geo.symbol],
            tail: vec![0.0; geo.guard],
            active: Vec::with_capacity(geo.symbol),
            noise_seq: Mls::new(NOISE_POLY),
        })
    }

    pub fn rate(&self) -> u32 {
        self.geo.rate
    }

    pub fn extended_length(&self) -> usize {
        self.geo.extended
    }

    /// Stage a message. The payload is truncated to 170 bytes, the
    /// callsign to 9 characters; the mode follows the payload length and
    /// an empty payload sends a ping.
    pub fn configure(
        &mut self,
        payload: &[u8],
        callsign: &str,
        carrier_hz: f32,
        noise_symbols: usize,
        fancy_header: bool,
    ) {
        let payload = &payload[..payload.len().min(MAX_PAYLOAD_BYTES)];
        self.carrier_bin = self.geo.carrier_bin(carrier_hz);
        self.mode = if payload.is_empty() {
            0
        } else {
            polar::mode_for_length(payload.len())
        };
        self.meta = (base37::encode(callsign) << 8) | self.mode as u64;

        if self.mode != 0 {
            let data_bytes = polar::data_bits(self.mode).unwrap() / 8;
            let mut block = vec![0u8; data_bytes];
            block[..payload.len()].copy_from_slice(payload);
            let mut scrambler = Xorshift32::default();
            for b in block.iter_mut() {
                *b ^= scrambler.next_byte();
            }
            self.codec.encode(&mut self.code, &block, self.mode);
        }

        self.count_down = 5;
        self.noise_count = noise_symbols;
        self.fancy_header = fancy_header;
        self.fancy_row = 0;
        self.pay_sym = 0;
        self.tail.fill(0.0);
        self.prev_fdom.fill(Cf32::new(0.0, 0.0));
        self.noise_seq.reset();
    }

    /// Emit the next extended-length symbol. False once the burst is over;
    /// the output is silence from then on.
    pub fn produce(&mut self, samples: &mut [i16]) -> bool {
        debug_assert!(samples.len() >= self.geo.extended);
        let symbol = match self.count_down {
            5 => {
                if self.noise_count > 0 {
                    self.noise_count -= 1;
                    Symbol::Noise
                } else {
                    self.count_down = 4;
                    Symbol::Correlation
                }
            }
            4 => {
                self.count_down = 3;
                Symbol::Correlation
            }
            3 => {
                self.count_down = if self.mode == 0 { 1 } else { 2 };
                Symbol::Preamble
            }
            2 => {
                let k = self.pay_sym;
                self.pay_sym += 1;
                if self.pay_sym == PAY_SYM_CNT {
                    self.count_down = 1;
                }
                Symbol::Payload(k)
            }
            1 => {
                if self.fancy_header && self.fancy_row < fancy::FANCY_ROWS {
                    let row = self.fancy_row;
                    self.fancy_row += 1;
                    Symbol::Fancy(row)
                } else {
                    self.count_down = 0;
                    Symbol::Silence
                }
            }
            _ => {
                samples[..self.geo.extended].fill(0);
                return false;
            }
        };
        self.emit(samples, symbol);
        true
    }

    fn emit(&mut self, samples: &mut [i16], symbol: Symbol) {
        self.fdom.fill(Cf32::new(0.0, 0.0));
        self.active.clear();
        let keep_reference = matches!(symbol, Symbol::Preamble | Symbol::Payload(_));
        match symbol {
            Symbol::Noise => self.build_noise(),
            Symbol::Correlation => self.build_correlation(),
            Symbol::Preamble => self.build_preamble(),
            Symbol::Payload(k) => self.build_payload(k),
            Symbol::Fancy(row) => {
                let bins = fancy::paint_row(
                    &mut self.fdom,
                    &self.geo,
                    self.carrier_bin,
                    self.meta >> 8,
                    row,
                );
                self.active.extend(bins);
            }
            Symbol::Silence => {
                self.write_silence(samples);
                return;
            }
        }

        self.papr.reduce(&mut self.fdom, &self.active);
        if keep_reference {
            for (i, slot) in self.prev_fdom.iter_mut().enumerate() {
                *slot = self.fdom[self.geo.bin(self.carrier_bin + PAY_CAR_OFF + i as i32)];
            }
        }

        self.tdom.copy_from_slice(&self.fdom);
        self.fft.inverse(&mut self.tdom);
        let scale = 1.0 / (8.0 * self.geo.symbol as f32).sqrt();
        let l = self.geo.symbol;
        let g = self.geo.guard;

        // guard: cross-fade from the previous symbol's cyclic suffix into
        // this symbol's cyclic prefix over the first half of the interval
        for j in 0..g {
            let prefix = self.tdom[l - g + j].re * scale;
            let out = if j < g / 2 {
                let w = fade(j, g / 2);
                self.tail[j] * (1.0 - w) + prefix * w
            } else {
                prefix
            };
            samples[j] = to_i16(out);
        }
        for n in 0..l {
            samples[g + n] = to_i16(self.tdom[n].re * scale);
        }
        for (j, t) in self.tail.iter_mut().enumerate() {
            *t = self.tdom[j].re * scale;
        }
    }

    fn write_silence(&mut self, samples: &mut [i16]) {
        let g = self.geo.guard;
        for j in 0..g {
            let w = fade(j, g);
            samples[j] = to_i16(self.tail[j] * (1.0 - w));
        }
        samples[g..self.geo.extended].fill(0);
        self.tail.fill(0.0);
    }

    fn build_noise(&mut self) {
        for i in 0..PAY_CAR_CNT as i32 {
            let re = if self.noise_seq.next() { -1.0 } else { 1.0 };
            let im = if self.noise_seq.next() { -1.0 } else { 1.0 };
            let bin = self.geo.bin(self.carrier_bin + PAY_CAR_OFF + i);
            self.fdom[bin] = Cf32::new(re, im) * FRAC_1_SQRT_2;
            self.active.push(bin);
        }
    }

    fn build_correlation(&mut self) {
        let seq = correlation_sequence(&self.geo, self.carrier_bin);
        for (bin, &v) in seq.iter().enumerate() {
            if v.norm_sqr() > 0.0 {
                self.fdom[bin] = v;
                self.active.push(bin);
            }
        }
    }

    fn build_preamble(&mut self) {
        // 55 metadata bits and their CRC-16 make the 71 information bits
        let mut data = [0u8; 9];
        for i in 0..55 {
            set_be_bit(&mut data, i, (self.meta >> i) & 1 != 0);
        }
        let crc = Crc16::compute(META_CRC_POLY, &(self.meta << 9).to_le_bytes());
        for i in 0..16 {
            set_be_bit(&mut data, 55 + i, (crc >> i) & 1 != 0);
        }
        let mut code = [0u8; 32];
        self.bch.encode(&data, &mut code);

        // differential BPSK along the bins, scrambled by the MLS, anchored
        // at the carrier below the preamble span
        let anchor = self.geo.bin(self.carrier_bin + PAY_CAR_OFF);
        self.fdom[anchor] = Cf32::new(1.0, 0.0);
        self.active.push(anchor);
        let mut seq = Mls::new(PRE_SEQ_POLY);
        let mut value = Cf32::new(1.0, 0.0);
        for i in 0..PRE_SEQ_LEN {
            let bit = crate::bits::get_be_bit(&code, i) ^ seq.next();
            value *= if bit { -1.0 } else { 1.0 };
            let bin = self.geo.bin(self.carrier_bin + PRE_SEQ_OFF + i as i32);
            self.fdom[bin] = value;
            self.active.push(bin);
        }
    }

    fn build_payload(&mut self, k: usize) {
        for i in 0..PAY_CAR_CNT {
            let c0 = self.code[2 * (k * PAY_CAR_CNT + i)];
            let c1 = self.code[2 * (k * PAY_CAR_CNT + i) + 1];
            let phasor = Cf32::new(c0 as f32, c1 as f32) * FRAC_1_SQRT_2;
            let bin = self.geo.bin(self.carrier_bin + PAY_CAR_OFF + i as i32);
            self.fdom[bin] = self.prev_fdom[i] * phasor;
            self.active.push(bin);
        }
    }
}

fn fade(j: usize, len: usize) -> f32 {
    0.5 - 0.5 * (std::f32::consts::PI * j as f32 / len as f32).cos()
}

fn to_i16(x: f32) -> i16 {
    (32767.0 * x).round_ties_even().clamp(-32767.0, 32767.0) as i16
}

#[cfg(test)]
mod tests {
    use super::*;

    fn symbols(enc: &mut Encoder) -> Vec<Vec<i16>> {
        let mut out = Vec::new();
        let mut buf = vec![0i16; enc.extended_length()];
        while enc.produce(&mut buf) {
            out.push(buf.clone());
            assert!(out.len() < 32, "encoder never finished");
        }
        out
    }

    #[test]
    fn test_text_burst_symbol_count() {
        let mut enc = Encoder::new(8000).unwrap();
        enc.configure(b"HELLO", "TEST", 1500.0, 0, false);
        // 2 sync + preamble + 4 payload + silence
        assert_eq!(symbols(&mut enc).len(), 8);
    }

    #[test]
    fn test_ping_burst_symbol_count() {
        let mut enc = Encoder::new(8000).unwrap();
        enc.configure(b"", "TEST", 1500.0, 0, false);
        // 2 sync + preamble + silence
        assert_eq!(symbols(&mut enc).len(), 4);
    }

    #[test]
    fn test_noise_and_fancy_extend_burst() {
        let mut enc = Encoder::new(8000).unwrap();
        enc.configure(b"HI", "TEST", 1500.0, 2, true);
        // 2 noise + 2 sync + preamble + 4 payload + 11 fancy + silence
        assert_eq!(symbols(&mut enc).len(), 21);
    }

    #[test]
    fn test_samples_are_bounded_and_nonsilent() {
        let mut enc = Encoder::new(8000).unwrap();
        enc.configure(b"CQ CQ CQ", "W1AW", 1500.0, 0, false);
        let all = symbols(&mut enc);
        let peak = all
            .iter()
            .flat_map(|s| s.iter())
            .map(|&v| (v as i32).abs())
            .max()
            .unwrap();
        assert!(peak > 1000, "burst too quiet: {}", peak);
        assert!(peak <= 32767);
    }

    #[test]
    fn test_correlation_symbols_identical() {
        let mut enc = Encoder::new(8000).unwrap();
        enc.configure(b"HELLO", "TEST", 1500.0, 0, false);
        let all = symbols(&mut enc);
        // the two sync symbols only differ in their guard cross-fade
        let g = enc.extended_length() - 1280;
        assert_eq!(&all[0][g..], &all[1][g..]);
    }

    #[test]
    fn test_half_symbol_repetition() {
        let mut enc = Encoder::new(8000).unwrap();
        enc.configure(b"HELLO", "TEST", 1500.0, 0, false);
        let all = symbols(&mut enc);
        let g = 160;
        let body = &all[0][g..g + 1280];
        for n in 0..640 {
            let d = (body[n] as i32 - body[n + 640] as i32).abs();
            assert!(d <= 1, "no repetition at {}: {} vs {}", n, body[n], body[n + 640]);
        }
    }

    #[test]
    fn test_produce_after_done_is_silent() {
        let mut enc = Encoder::new(8000).unwrap();
        enc.configure(b"", "TEST", 1500.0, 0, false);
        let mut buf = vec![0i16; enc.extended_length()];
        while enc.produce(&mut buf) {}
        assert!(!enc.produce(&mut buf));
        assert!(buf.iter().all(|&v| v == 0));
    }
}
