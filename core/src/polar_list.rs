//! Successive-cancellation list decoding, 16 paths wide
//!
//! Every value in the decoder is a 16-lane int8 vector: lane p belongs to
//! list path p. The soft tree keeps one node per size (the DFS path), so a
//! node of size s lives at `soft[s..2s]` and the root input at
//! `soft[n..2n]`. At each information leaf the list forks to 2W candidates,
//! the W best (smallest path metric) survive in sorted order, and the
//! permutation is recorded so the per-path message can be unwound at the
//! end. All-frozen subtrees short-circuit to hard +1 with a
//! `max(0, -llr)` metric charge per position.

use crate::fixed::{madd, prod};
use crate::polar::is_frozen;

pub const LANES: usize = 16;

type Lane = [i8; LANES];

/// Parked-lane metric: only lane 0 is live before the first fork.
const IDLE: i32 = 1 << 24;

fn f_lane(a: &Lane, b: &Lane) -> Lane {
    let mut out = [0i8; LANES];
    for p in 0..LANES {
        out[p] = prod(a[p], b[p]);
    }
    out
}

fn g_lane(a: &Lane, b: &Lane, h: &Lane) -> Lane {
    let mut out = [0i8; LANES];
    for p in 0..LANES {
        out[p] = madd(h[p], a[p], b[p]);
    }
    out
}

pub struct PolarListDecoder {
    n: usize,
    soft: Vec<Lane>,
    hard: Vec<Lane>,
    metric: [i32; LANES],
    maps: Vec<[u8; LANES]>,
    message: Vec<Lane>,
    frozen_prefix: Vec<u32>,
}

impl PolarListDecoder {
    pub fn new(n: usize) -> Self {
        debug_assert!(n.is_power_of_two());
        Self {
            n,
            soft: vec![[0; LANES]; 2 * n],
            hard: vec![[0; LANES]; n],
            metric: [0; LANES],
            maps: Vec::with_capacity(n),
            message: Vec::with_capacity(n),
            frozen_prefix: vec![0; n + 1],
        }
    }

    pub fn decode(&mut self, llr: &[i8], frozen: &[u32], info_count: usize) {
        debug_assert_eq!(llr.len(), self.n);
        self.maps.clear();
        self.message.clear();
        self.metric = [IDLE; LANES];
        self.metric[0] = 0;
        for (i, &l) in llr.iter().enumerate() {
            self.soft[self.n + i] = [l; LANES];
        }
        for i in 0..self.n {
            self.frozen_prefix[i + 1] =
                self.frozen_prefix[i] + is_frozen(frozen, i) as u32;
        }
        let n = self.n;
        self.rec(n, 0, frozen);
        debug_assert_eq!(self.message.len(), info_count);
    }

    fn frozen_run(&self, offset: usize, size: usize) -> bool {
        self.frozen_prefix[offset + size] - self.frozen_prefix[offset] == size as u32
    }

    fn rec(&mut self, size: usize, offset: usize, frozen: &[u32]) {
        if self.frozen_run(offset, size) {
            for i in 0..size {
                let l = self.soft[size + i];
                for p in 0..LANES {
                    if l[p] < 0 {
                        self.metric[p] -= l[p] as i32;
                    }
                }
                self.hard[offset + i] = [1; LANES];
            }
            return;
        }
        if size == 1 {
            let l = self.soft[1];
            self.fork(offset, &l);
            return;
        }
        let h = size / 2;
        for i in 0..h {
            let a = self.soft[size + i];
            let b = self.soft[size + i + h];
            self.soft[h + i] = f_lane(&a, &b);
        }
        self.rec(h, offset, frozen);
        for i in 0..h {
            let a = self.soft[size + i];
            let b = self.soft[size + i + h];
            let hd = self.hard[offset + i];
            self.soft[h + i] = g_lane(&a, &b, &hd);
        }
        self.rec(h, offset + h, frozen);
        for i in 0..h {
            let right = self.hard[offset + h + i];
            for p in 0..LANES {
                self.hard[offset + i][p] *= right[p];
            }
        }
    }

    /// Fork every path on one information bit and keep the best 16.
    fn fork(&mut self, offset: usize, llr: &Lane) {
        let mut cand: Vec<(i32, u8, i8)> = Vec::with_capacity(2 * LANES);
        for p in 0..LANES {
            let pen = (llr[p] as i32).abs();
            let agree: i8 = if llr[p] < 0 { -1 } else { 1 };
            cand.push((self.metric[p], p as u8, agree));
            cand.push((self.metric[p] + pen, p as u8, -agree));
        }
        cand.sort_by_key(|&(m, p, _)| (m, p));

        let mut map = [0u8; LANES];
        let mut bits = [0i8; LANES];
        let mut metric = [0i32; LANES];
        for (k, &(m, p, b)) in cand.iter().take(LANES).enumerate() {
            map[k] = p;
            bits[k] = b;
            metric[k] = m;
        }
        self.permute(&map);
        self.metric = metric;
        self.hard[offset] = bits;
        self.maps.push(map);
        self.message.push(bits);
    }

    fn permute(&mut self, map: &[u8; LANES]) {
        for entry in self.soft.iter_mut().skip(1) {
            let tmp = *entry;
            for k in 0..LANES {
                entry[k] = tmp[map[k] as usize];
            }
        }
        for entry in self.hard.iter_mut() {
            let tmp = *entry;
            for k in 0..LANES {
                entry[k] = tmp[map[k] as usize];
            }
        }
    }

    /// Lanes ordered best metric first.
    pub fn lane_order(&self) -> [usize; LANES] {
        let mut order = [0usize; LANES];
        for (i, o) in order.iter_mut().enumerate() {
            *o = i;
        }
        order.sort_by_key(|&p| self.metric[p]);
        order
    }

    pub fn metric(&self, lane: usize) -> i32 {
        self.metric[lane]
    }

    /// Unwind one surviving path's message bits (NRZ).
    pub fn extract(&self, lane: usize, out: &mut [i8]) {
        debug_assert_eq!(out.len(), self.message.len());
        let mut p = lane;
        for k in (0..self.message.len()).rev() {
            out[k] = self.message[k][p];
            p = self.maps[k][p] as usize;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixed::SOFT_MAX;
    use crate::polar::{encode, frozen_table};

    fn round_trip(info: usize, gain: i8, noise: &[usize]) -> bool {
        let frozen = frozen_table(info);
        let message: Vec<i8> = (0..info)
            .map(|i| if (i * 7 + 1) % 3 == 0 { -1 } else { 1 })
            .collect();
        let mut code = vec![0i8; crate::CODE_LEN];
        encode(&mut code, &message, &frozen);
        let mut llr: Vec<i8> = code.iter().map(|&c| c * gain).collect();
        for &i in noise {
            llr[i] = -llr[i];
        }
        let mut dec = PolarListDecoder::new(crate::CODE_LEN);
        dec.decode(&llr, &frozen, info);
        let mut out = vec![0i8; info];
        let best = dec.lane_order()[0];
        dec.extract(best, &mut out);
        out == message
    }

    #[test]
    fn test_clean_decode_all_rates() {
        for info in [712usize, 1056, 1392] {
            assert!(round_trip(info, SOFT_MAX, &[]), "info {}", info);
        }
    }

    #[test]
    fn test_decode_with_scattered_errors() {
        let noise: Vec<usize> = (0..crate::CODE_LEN).step_by(131).collect();
        assert!(round_trip(712, 24, &noise));
    }

    #[test]
    fn test_erasures_tolerated() {
        let frozen = frozen_table(712);
        let message: Vec<i8> = (0..712).map(|i| if i % 2 == 0 { 1 } else { -1 }).collect();
        let mut code = vec![0i8; crate::CODE_LEN];
        encode(&mut code, &message, &frozen);
        let mut llr: Vec<i8> = code.iter().map(|&c| c * 40).collect();
        // a handful of zero-LLR erasures
        for i in (0..crate::CODE_LEN).step_by(200) {
            llr[i] = 0;
        }
        let mut dec = PolarListDecoder::new(crate::CODE_LEN);
        dec.decode(&llr, &frozen, 712);
        let mut out = vec![0i8; 712];
        dec.extract(dec.lane_order()[0], &mut out);
        assert_eq!(out, message);
    }

    #[test]
    fn test_list_paths_are_distinct_metric_sorted() {
        let frozen = frozen_table(712);
        let message = vec![1i8; 712];
        let mut code = vec![0i8; crate::CODE_LEN];
        encode(&mut code, &message, &frozen);
        let llr: Vec<i8> = code.iter().map(|&c| c * 10).collect();
        let mut dec = PolarListDecoder::new(crate::CODE_LEN);
        dec.decode(&llr, &frozen, 712);
        let order = dec.lane_order();
        for w in order.windows(2) {
            assert!(dec.metric(w[0]) <= dec.metric(w[1]));
        }
        // best path carries no penalty on a clean signal
        assert_eq!(dec.metric(order[0]), 0);
    }
}
