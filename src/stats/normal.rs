use std::f64::consts::PI;

/// A normal distribution used to build the theoretical GC curve a library
/// should follow if its composition were random.
#[derive(Debug, Clone, Copy)]
pub struct NormalDistribution {
    mean: f64,
    stdev: f64,
}

impl NormalDistribution {
    pub fn new(mean: f64, stdev: f64) -> NormalDistribution {
        NormalDistribution { mean, stdev }
    }

    /// Probability density at `value`.
    pub fn density(&self, value: f64) -> f64 {
        let lhs = 1.0 / (self.stdev * (2.0 * PI).sqrt());
        let rhs = (-((value - self.mean).powi(2)) / (2.0 * self.stdev * self.stdev)).exp();
        lhs * rhs
    }
}

/// Estimate the centre of a histogram via its "plateau mode".
///
/// The raw mode can be a poor centre estimate when several adjacent bins sit
/// at nearly the same height, so we extend outward from the modal bin while
/// neighbours stay within 10% of the modal height and average the extended
/// index range. If the plateau runs off either edge of the histogram the raw
/// mode is kept instead.
pub fn plateau_mode(histogram: &[f64]) -> f64 {
    let mut first_mode = 0usize;
    let mut mode_count = 0.0f64;

    for (i, &v) in histogram.iter().enumerate() {
        if v > mode_count {
            mode_count = v;
            first_mode = i;
        }
    }

    let threshold = histogram[first_mode] - histogram[first_mode] / 10.0;

    let mut mode = 0.0f64;
    let mut mode_duplicates = 0usize;

    let mut fell_off_top = true;
    for i in first_mode..histogram.len() {
        if histogram[i] > threshold {
            mode += i as f64;
            mode_duplicates += 1;
        } else {
            fell_off_top = false;
            break;
        }
    }

    let mut fell_off_bottom = true;
    for i in (0..first_mode).rev() {
        if histogram[i] > threshold {
            mode += i as f64;
            mode_duplicates += 1;
        } else {
            fell_off_bottom = false;
            break;
        }
    }

    if fell_off_bottom || fell_off_top {
        first_mode as f64
    } else {
        mode / mode_duplicates as f64
    }
}
