//! Sample buffers for the streaming decode path
//!
//! The bip buffer keeps the last `capacity` samples readable as one
//! contiguous slice by mirroring every write into two halves. The sliding
//! sum maintains a windowed running total through a binary tree so long
//! windows neither drift nor cost O(N) per sample. The delay line is a
//! plain fixed-length FIFO.

/// Circular buffer with a contiguous view of the newest `capacity` samples.
#[derive(Debug, Clone)]
pub struct BipBuffer<T> {
    buf: Vec<T>,
    capacity: usize,
    pos0: usize,
    pos1: usize,
}

impl<T: Copy + Default> BipBuffer<T> {
    pub fn new(capacity: usize) -> Self {
        Self {
            buf: vec![T::default(); 2 * capacity],
            capacity,
            pos0: 0,
            pos1: capacity,
        }
    }

    pub fn write(&mut self, value: T) {
        self.buf[self.pos0] = value;
        self.buf[self.pos1] = value;
        self.pos0 = (self.pos0 + 1) % (2 * self.capacity);
        self.pos1 = (self.pos1 + 1) % (2 * self.capacity);
    }

    /// Oldest-to-newest view of the last `capacity` samples.
    pub fn view(&self) -> &[T] {
        let start = self.pos0.min(self.pos1);
        &self.buf[start..start + self.capacity]
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

/// Windowed running sum over the last `len` samples, O(log len) per update.
#[derive(Debug, Clone)]
pub struct SlidingSum<T> {
    tree: Vec<T>,
    leaves: usize,
    len: usize,
    next: usize,
}

impl<T> SlidingSum<T>
where
    T: Copy + Default + std::ops::Add<Output = T>,
{
    pub fn new(len: usize) -> Self {
        let leaves = len.next_power_of_two();
        Self {
            tree: vec![T::default(); 2 * leaves],
            leaves,
            len,
            next: 0,
        }
    }

    /// Replace the oldest sample with `value`; returns the new window sum.
    pub fn put(&mut self, value: T) -> T {
        let mut node = self.leaves + self.next;
        self.tree[node] = value;
        while node > 1 {
            node /= 2;
            self.tree[node] = self.tree[2 * node] + self.tree[2 * node + 1];
        }
        self.next = (self.next + 1) % self.len;
        self.tree[1]
    }

    pub fn sum(&self) -> T {
        self.tree[1]
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

impl<T> SlidingSum<T>
where
    T: Copy + Default + std::ops::Add<Output = T> + std::ops::Div<f32, Output = T>,
{
    /// Window sum normalized to a mean.
    pub fn mean(&self) -> T {
        self.sum() / self.len as f32
    }
}

/// Fixed-length FIFO delay.
#[derive(Debug, Clone)]
pub struct DelayLine<T> {
    buf: Vec<T>,
    pos: usize,
}

impl<T: Copy + Default> DelayLine<T> {
    pub fn new(delay: usize) -> Self {
        Self {
            buf: vec![T::default(); delay.max(1)],
            pos: 0,
        }
    }

    /// Push a sample, pop the one `delay` samples old.
    pub fn put(&mut self, value: T) -> T {
        let out = self.buf[self.pos];
        self.buf[self.pos] = value;
        self.pos = (self.pos + 1) % self.buf.len();
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use num_complex::Complex;

    #[test]
    fn test_bip_view_is_contiguous_history() {
        let mut bip = BipBuffer::<f32>::new(8);
        for i in 0..20 {
            bip.write(i as f32);
        }
        let view = bip.view();
        assert_eq!(view.len(), 8);
        for (k, &v) in view.iter().enumerate() {
            assert_eq!(v, (12 + k) as f32);
        }
    }

    #[test]
    fn test_bip_partial_fill_pads_with_default() {
        let mut bip = BipBuffer::<f32>::new(4);
        bip.write(7.0);
        let view = bip.view();
        assert_eq!(view, &[0.0, 0.0, 0.0, 7.0]);
    }

    #[test]
    fn test_sliding_sum_window() {
        let mut sma = SlidingSum::<f32>::new(3);
        assert_eq!(sma.put(1.0), 1.0);
        assert_eq!(sma.put(2.0), 3.0);
        assert_eq!(sma.put(4.0), 7.0);
        // 1.0 leaves the window
        assert_eq!(sma.put(8.0), 14.0);
        assert!((sma.mean() - 14.0 / 3.0).abs() < 1e-6);
    }

    #[test]
    fn test_sliding_sum_odd_window_long_run() {
        let mut sma = SlidingSum::<f32>::new(161);
        for i in 0..1000 {
            sma.put(i as f32);
        }
        let expect: f32 = (839..1000).map(|i| i as f32).sum();
        assert!((sma.sum() - expect).abs() < 1.0);
    }

    #[test]
    fn test_sliding_sum_complex() {
        let mut sma = SlidingSum::<Complex<f32>>::new(4);
        for _ in 0..4 {
            sma.put(Complex::new(1.0, -1.0));
        }
        assert_eq!(sma.sum(), Complex::new(4.0, -4.0));
        assert_eq!(sma.mean(), Complex::new(1.0, -1.0));
    }

    #[test]
    fn test_delay_line() {
        let mut dl = DelayLine::<f32>::new(3);
        assert_eq!(dl.put(1.0), 0.0);
        assert_eq!(dl.put(2.0), 0.0);
        assert_eq!(dl.put(3.0), 0.0);
        assert_eq!(dl.put(4.0), 1.0);
        assert_eq!(dl.put(5.0), 2.0);
    }
}
