//! Theil-Sen median-slope regression
//!
//! Robust line fit over the per-carrier phase residuals: the slope is the
//! median of all pairwise slopes and the intercept the median of
//! `y - slope*x`. Outlier carriers (collisions, fades) move the medians
//! far less than they would a least-squares fit. Selection runs in-place
//! over a preallocated workspace via quickselect with median-of-medians
//! pivoting.

/// Median-of-five used for pivot selection.
fn median5(v: &mut [f32]) -> f32 {
    v.sort_by(|a, b| a.partial_cmp(b).unwrap());
    v[(v.len() - 1) / 2]
}

fn median_of_medians(v: &mut [f32]) -> f32 {
    if v.len() <= 5 {
        return median5(v);
    }
    let mut idx = 0;
    for start in (0..v.len()).step_by(5) {
        let end = (start + 5).min(v.len());
        let m = median5(&mut v[start..end]);
        v[idx] = m;
        idx += 1;
    }
    median_of_medians(&mut v[..idx])
}

/// k-th smallest element, destructive.
fn select(v: &mut [f32], mut k: usize) -> f32 {
    let mut lo = 0;
    let mut hi = v.len();
    loop {
        if hi - lo <= 5 {
            let s = &mut v[lo..hi];
            s.sort_by(|a, b| a.partial_cmp(b).unwrap());
            return s[k];
        }
        let pivot = median_of_medians(&mut v[lo..hi].to_vec());
        let mut store = lo;
        let mut high = hi;
        let mut i = lo;
        // three-way partition around the pivot
        while i < high {
            if v[i] < pivot {
                v.swap(i, store);
                store += 1;
                i += 1;
            } else if v[i] > pivot {
                high -= 1;
                v.swap(i, high);
            } else {
                i += 1;
            }
        }
        let less = store - lo;
        let equal = high - store;
        if k < less {
            hi = store;
        } else if k < less + equal {
            return pivot;
        } else {
            k -= less + equal;
            lo = high;
        }
    }
}

fn median(v: &mut Vec<f32>) -> f32 {
    if v.is_empty() {
        return 0.0;
    }
    let k = (v.len() - 1) / 2;
    select(v, k)
}

/// Line fit with reusable workspace sized for `max_points` samples.
#[derive(Debug, Clone)]
pub struct TheilSen {
    slope: f32,
    intercept: f32,
    work: Vec<f32>,
}

impl TheilSen {
    pub fn new(max_points: usize) -> Self {
        Self {
            slope: 0.0,
            intercept: 0.0,
            work: Vec::with_capacity(max_points * max_points.saturating_sub(1) / 2),
        }
    }

    pub fn fit(&mut self, points: &[(f32, f32)]) {
        if points.len() < 2 {
            self.slope = 0.0;
            self.intercept = points.first().map_or(0.0, |p| p.1);
            return;
        }
        self.work.clear();
        for (i, &(xi, yi)) in points.iter().enumerate() {
            for &(xj, yj) in points.iter().skip(i + 1) {
                if xj != xi {
                    self.work.push((yj - yi) / (xj - xi));
                }
            }
        }
        self.slope = median(&mut self.work);
        self.work.clear();
        for &(x, y) in points {
            self.work.push(y - self.slope * x);
        }
        self.intercept = median(&mut self.work);
    }

    pub fn slope(&self) -> f32 {
        self.slope
    }

    pub fn intercept(&self) -> f32 {
        self.intercept
    }

    pub fn evaluate(&self, x: f32) -> f32 {
        self.intercept + self.slope * x
    }
}
