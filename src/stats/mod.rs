pub mod base_group;
pub mod gc_model;
pub mod normal;
pub mod phred;

pub use base_group::BaseGroup;
pub use gc_model::{GcModel, GcModelCache, GcModelValue};
pub use normal::{plateau_mode, NormalDistribution};
pub use phred::PhredEncoding;

/// Choose a histogram start and bin width so that at most 50 bins span
/// `[min, max]`, with widths of the form `10^n * {1, 2, 5}`. The start is
/// rounded down to a whole multiple of the chosen width.
pub fn size_distribution(min: i64, max: i64) -> (i64, i64) {
    let span = max - min;

    let mut base = 1i64;
    let interval = 'outer: loop {
        for division in [1i64, 2, 5] {
            let tester = base * division;
            if span / tester <= 50 {
                break 'outer tester;
            }
        }
        base *= 10;
    };

    let starting = (min / interval) * interval;
    (starting, interval)
}
