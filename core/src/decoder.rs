//! Streaming burst decoder
//!
//! Long-lived consumer of microphone samples. Input is lifted to the
//! analytic signal (DC blocker plus Hilbert FIR, or directly for I/Q
//! feeds), mirrored into the bip buffer and scanned by the Schmidl-Cox
//! correlator on every sample. Once per extended-length of input `feed`
//! hands control to `process`, which walks the burst: latched sync
//! candidate, preamble OSD + CRC-16, then four payload symbols of
//! differential QPSK demodulation into polar LLRs. `fetch` finishes with
//! the CRC-aided list decode and descrambling.

use crate::bch::Bch;
use crate::bits::get_be_bit;
use crate::buffers::BipBuffer;
use crate::crc::Crc16;
use crate::fft::Transform;
use crate::filters::{BlockDc, Hilbert};
use crate::fixed::quantize;
use crate::osc::Phasor;
use crate::osd::OsdDecoder;
use crate::polar::{self, PolarCodec};
use crate::prng::{Mls, Xorshift32};
use crate::sync::{SchmidlCox, SyncHit};
use crate::theilsen::TheilSen;
use crate::{
    base37, Geometry, Result, CALLSIGN_LEN, CODE_LEN, MAX_PAYLOAD_BYTES, META_CRC_POLY,
    PAY_CAR_CNT, PAY_CAR_OFF, PAY_SYM_CNT, PRE_SEQ_LEN, PRE_SEQ_OFF, PRE_SEQ_POLY,
};
use num_complex::Complex;

type Cf32 = Complex<f32>;

/// One status per `process` call; the values are part of the API.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum Status {
    Ok = 0,
    Fail = 1,
    Sync = 2,
    Done = 3,
    /// Reserved, never emitted.
    Heap = 4,
    Nope = 5,
    Ping = 6,
}

/// Input channel routing for `feed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Channel {
    /// Single-channel input.
    Mono = 0,
    /// Left of an interleaved stereo stream.
    Left = 1,
    /// Right of an interleaved stereo stream.
    Right = 2,
    /// Mid of an interleaved stereo stream.
    Sum = 3,
    /// Interleaved pairs are complex baseband; skips the Hilbert.
    Iq = 4,
}

/// Snapshot of the last accepted preamble.
#[derive(Debug, Clone, PartialEq)]
pub struct Staged {
    pub cfo_hz: f32,
    pub mode: u8,
    pub callsign: String,
}

pub struct Decoder {
    geo: Geometry,
    channel: Channel,
    carrier_bin: i32,
    dc: BlockDc,
    hilbert: Hilbert,
    buffer: BipBuffer<Cf32>,
    sync: SchmidlCox,
    fft: Transform,
    codec: PolarCodec,
    osd: OsdDecoder,
    theil: TheilSen,
    // stream bookkeeping
    sample_count: i64,
    since_boundary: usize,
    boundary: bool,
    stored: Option<SyncHit>,
    // active burst
    operation_mode: u8,
    staged_call: u64,
    staged_cfo: f32,
    symbol_number: i32,
    symbol_position: i64,
    base_position: i64,
    omega: f32,
    prev: Vec<Cf32>,
    code: Vec<i8>,
    // scratch
    window: Vec<Cf32>,
    cons: Vec<Cf32>,
    erased: Vec<bool>,
    points: Vec<(f32, f32)>,
}

impl Decoder {
    pub fn new(rate: u32, carrier_hz: f32, channel: Channel) -> Result<Self> {
        let geo = Geometry::new(rate)?;
        let carrier_bin = geo.carrier_bin(carrier_hz);
        let bch = Bch::new();
        Ok(Self {
            geo,
            channel,
            carrier_bin,
            dc: BlockDc::new(2 * geo.extended),
            hilbert: Hilbert::new(rate),
            buffer: BipBuffer::new(4 * geo.extended),
            sync: SchmidlCox::new(geo, carrier_bin),
            fft: Transform::new(geo.symbol),
            codec: PolarCodec::new(),
            osd: OsdDecoder::new(&bch),
            theil: TheilSen::new(PAY_CAR_CNT),
            sample_count: 0,
            since_boundary: 0,
            boundary: false,
            stored: None,
            operation_mode: 0,
            staged_call: 0,
            staged_cfo: 0.0,
            symbol_number: PAY_SYM_CNT as i32 + 1,
            symbol_position: 0,
            base_position: 0,
            omega: 0.0,
            prev: vec![Cf32::new(0.0, 0.0); PAY_CAR_CNT],
            code: vec![0; CODE_LEN],
            window: vec![Cf32::new(0.0, 0.0); geo.symbol],
            cons: vec![Cf32::new(0.0, 0.0); PAY_CAR_CNT],
            erased: vec![false; PAY_CAR_CNT],
            points: Vec::with_capacity(PAY_CAR_CNT),
        })
    }

    pub fn extended_length(&self) -> usize {
        self.geo.extended
    }

    /// Consume PCM samples. Stereo and I/Q channels expect interleaved
    /// pairs. True means an extended-length boundary passed: call
    /// `process` once before feeding again.
    pub fn feed(&mut self, samples: &[i16]) -> bool {
        match self.channel {
            Channel::Mono => {
                for &s in samples {
                    let x = s as f32 / 32768.0;
                    let y = self.dc.process_real(x);
                    let a = self.hilbert.process(y);
                    self.push(a);
                }
            }
            Channel::Left | Channel::Right | Channel::Sum => {
                for pair in samples.chunks_exact(2) {
                    let x = match self.channel {
                        Channel::Left => pair[0] as f32,
                        Channel::Right => pair[1] as f32,
                        _ => (pair[0] as f32 + pair[1] as f32) / 2.0,
                    } / 32768.0;
                    let y = self.dc.process_real(x);
                    let a = self.hilbert.process(y);
                    self.push(a);
                }
            }
            Channel::Iq => {
                for pair in samples.chunks_exact(2) {
                    let x = Cf32::new(pair[0] as f32 / 32768.0, pair[1] as f32 / 32768.0);
                    let a = self.dc.process(x);
                    self.push(a);
                }
            }
        }
        self.boundary
    }

    fn push(&mut self, a: Cf32) {
        self.buffer.write(a);
        self.sample_count += 1;
        if self.sync.put(a) {
            let start = self.sample_count - self.buffer.capacity() as i64;
            if let Some(hit) = self.sync.extract(self.buffer.view(), start) {
                log::debug!(
                    "sync candidate at {} cfo {:.4} rad",
                    hit.position,
                    hit.cfo_rad
                );
                self.stored = Some(hit);
            }
        }
        self.since_boundary += 1;
        if self.since_boundary >= self.geo.extended {
            self.since_boundary -= self.geo.extended;
            self.boundary = true;
        }
    }

    /// Advance the burst state machine by one symbol slot.
    pub fn process(&mut self) -> Status {
        self.boundary = false;
        let burst_active = self.symbol_number <= PAY_SYM_CNT as i32;
        if !burst_active {
            if let Some(hit) = self.stored.take() {
                return self.preamble(hit);
            }
            return Status::Ok;
        }
        self.payload_symbol()
    }

    /// Decode staged metadata after `Sync`, `Ping` or `Done`.
    pub fn staged(&self) -> Staged {
        Staged {
            cfo_hz: self.staged_cfo * self.geo.rate as f32
                / (2.0 * std::f32::consts::PI),
            mode: self.operation_mode,
            callsign: base37::decode(self.staged_call, CALLSIGN_LEN),
        }
    }

    /// Run the polar list decode into `payload`, descramble, zero-fill.
    /// Returns corrected bit flips, or -1 when every list path fails the
    /// CRC.
    pub fn fetch(&mut self, payload: &mut [u8]) -> i32 {
        debug_assert!(payload.len() >= MAX_PAYLOAD_BYTES);
        let Some(bits) = polar::data_bits(self.operation_mode) else {
            payload[..MAX_PAYLOAD_BYTES].fill(0);
            return -1;
        };
        let flips = self.codec.decode(payload, &self.code, self.operation_mode);
        if flips < 0 {
            payload[..MAX_PAYLOAD_BYTES].fill(0);
            return -1;
        }
        let mut scrambler = Xorshift32::default();
        for b in payload.iter_mut().take(bits / 8) {
            *b ^= scrambler.next_byte();
        }
        payload[bits / 8..MAX_PAYLOAD_BYTES].fill(0);
        log::debug!("fetched payload, {} bit flips", flips);
        flips
    }

    /// FFT one symbol body at `position` with the burst's CFO correction.
    fn transform_symbol(&mut self, position: i64) -> bool {
        let start = self.sample_count - self.buffer.capacity() as i64;
        let rel = position - start;
        if position + self.geo.symbol as i64 > self.sample_count || rel < 0 {
            return false;
        }
        let rel = rel as usize;
        let view = self.buffer.view();
        let phase = (-(self.omega as f64) * (position - self.base_position) as f64)
            .rem_euclid(2.0 * std::f64::consts::PI) as f32;
        let mut osc = Phasor::new();
        osc.omega(-self.omega);
        osc.advance(phase);
        for (w, &x) in self.window.iter_mut().zip(&view[rel..rel + self.geo.symbol]) {
            *w = x * osc.get();
        }
        self.fft.forward(&mut self.window);
        true
    }

    fn preamble(&mut self, hit: SyncHit) -> Status {
        let l = self.geo.symbol as i64;
        // symbol bodies sit one extended length apart; the hit position is
        // the first correlation symbol's body start
        let pre_body = hit.position + 2 * self.geo.extended as i64;
        if pre_body + l > self.sample_count {
            // not fully received; keep the candidate for the next slot
            self.stored = Some(hit);
            return Status::Ok;
        }
        self.omega = self.carrier_bin as f32 * 2.0 * std::f32::consts::PI
            / self.geo.symbol as f32
            + hit.cfo_rad;
        self.base_position = pre_body;
        if !self.transform_symbol(pre_body) {
            log::debug!("sync candidate aged out of the buffer");
            return Status::Fail;
        }

        // differential BPSK across bins, descrambled, into the OSD
        let mut seq = Mls::new(PRE_SEQ_POLY);
        let mut soft = [0.0f32; PRE_SEQ_LEN];
        let mut prev = self.window[self.geo.bin(PAY_CAR_OFF)];
        for (i, s) in soft.iter_mut().enumerate() {
            let cur = self.window[self.geo.bin(PRE_SEQ_OFF + i as i32)];
            let m = if seq.next() { -1.0 } else { 1.0 };
            *s = (cur * prev.conj()).re * m;
            prev = cur;
        }
        let scale = soft.iter().map(|v| v.abs()).sum::<f32>() / PRE_SEQ_LEN as f32;
        if scale > 0.0 {
            for s in soft.iter_mut() {
                *s /= scale;
            }
        }

        let mut data = [0u8; 9];
        if !self.osd.decode(&soft, &mut data) {
            log::debug!("preamble OSD rejected");
            return Status::Fail;
        }
        let mut meta = 0u64;
        for i in 0..55 {
            meta |= (get_be_bit(&data, i) as u64) << i;
        }
        let mut crc = 0u16;
        for i in 0..16 {
            crc |= (get_be_bit(&data, 55 + i) as u16) << i;
        }
        if Crc16::compute(META_CRC_POLY, &(meta << 9).to_le_bytes()) != crc {
            log::debug!("preamble CRC-16 mismatch");
            return Status::Fail;
        }

        let mode = (meta & 0xFF) as u8;
        let call = meta >> 8;
        self.staged_cfo = hit.cfo_rad;
        if mode == 0 {
            self.operation_mode = 0;
            self.staged_call = call;
            log::debug!("ping from {}", base37::decode(call, CALLSIGN_LEN));
            return Status::Ping;
        }
        if polar::data_bits(mode).is_none() || !base37::valid(call) {
            log::debug!("unsupported mode {} or invalid callsign", mode);
            return Status::Nope;
        }
        self.operation_mode = mode;
        self.staged_call = call;
        self.symbol_number = -1;
        self.symbol_position = pre_body;
        log::debug!(
            "sync: mode {} callsign {}",
            mode,
            base37::decode(call, CALLSIGN_LEN)
        );
        Status::Sync
    }

    fn payload_symbol(&mut self) -> Status {
        if !self.transform_symbol(self.symbol_position) {
            if self.symbol_position + (self.geo.symbol as i64) <= self.sample_count {
                // aged out of the buffer; abandon the burst
                self.symbol_number = PAY_SYM_CNT as i32 + 1;
                return Status::Fail;
            }
            return Status::Ok;
        }

        if self.symbol_number < 0 {
            // reference pass over the preamble symbol
            for (i, p) in self.prev.iter_mut().enumerate() {
                *p = self.window[self.geo.bin(PAY_CAR_OFF + i as i32)];
            }
            self.symbol_number = 0;
            self.symbol_position += self.geo.extended as i64;
            return Status::Ok;
        }

        let sym = self.symbol_number as usize;
        for i in 0..PAY_CAR_CNT {
            let cur = self.window[self.geo.bin(PAY_CAR_OFF + i as i32)];
            let refp = self.prev[i];
            self.erased[i] = refp.norm_sqr() <= f32::EPSILON || cur.norm_sqr() <= f32::EPSILON;
            let ratio = if self.erased[i] {
                Cf32::new(0.0, 0.0)
            } else {
                cur / refp
            };
            if ratio.norm_sqr() > 4.0 {
                self.erased[i] = true;
            }
            self.cons[i] = ratio;
            self.prev[i] = cur;
        }

        // straighten the residual phase ramp across carriers
        self.points.clear();
        for i in 0..PAY_CAR_CNT {
            if !self.erased[i] {
                let residual = (self.cons[i] * hard_qpsk(self.cons[i]).conj()).arg();
                self.points.push(((i as i32 + PAY_CAR_OFF) as f32, residual));
            }
        }
        self.theil.fit(&self.points);
        for i in 0..PAY_CAR_CNT {
            let x = (i as i32 + PAY_CAR_OFF) as f32;
            self.cons[i] *= Cf32::from_polar(1.0, -self.theil.evaluate(x));
        }

        // soft gain from the decision-to-error energy ratio
        let mut e_hard = 0.0f32;
        let mut e_error = 0.0f32;
        for i in 0..PAY_CAR_CNT {
            if !self.erased[i] {
                let hard = hard_qpsk(self.cons[i]);
                e_hard += hard.norm_sqr();
                e_error += (self.cons[i] - hard).norm_sqr();
            }
        }
        let precision = if e_error > 1e-9 {
            (e_hard / e_error).min(16384.0)
        } else {
            16384.0
        };

        for i in 0..PAY_CAR_CNT {
            let (l0, l1) = if self.erased[i] {
                (0, 0)
            } else {
                (
                    quantize(self.cons[i].re * std::f32::consts::SQRT_2 * precision),
                    quantize(self.cons[i].im * std::f32::consts::SQRT_2 * precision),
                )
            };
            self.code[2 * (sym * PAY_CAR_CNT + i)] = l0;
            self.code[2 * (sym * PAY_CAR_CNT + i) + 1] = l1;
        }

        self.symbol_number += 1;
        self.symbol_position += self.geo.extended as i64;
        if self.symbol_number == PAY_SYM_CNT as i32 {
            self.symbol_number = PAY_SYM_CNT as i32 + 1;
            log::debug!("payload demodulated");
            return Status::Done;
        }
        Status::Ok
    }
}

/// Nearest QPSK constellation point.
fn hard_qpsk(z: Cf32) -> Cf32 {
    Cf32::new(
        if z.re < 0.0 { -1.0 } else { 1.0 },
        if z.im < 0.0 { -1.0 } else { 1.0 },
    ) * std::f32::consts::FRAC_1_SQRT_2
}
