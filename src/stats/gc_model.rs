use std::collections::HashMap;

/// One contribution a raw GC count makes to the 0-100% histogram.
#[derive(Debug, Clone, Copy)]
pub struct GcModelValue {
    pub percentage: usize,
    pub increment: f64,
}

/// Precomputed mapping from a raw GC count to the percentage buckets it
/// contributes to, for one read length.
///
/// A read of length `l` with `c` GC bases covers the fractional percentage
/// interval `[100(c-0.5)/l, 100(c+0.5)/l]`; each integer bucket in that
/// interval is claimed with weight `1/claims(bucket)`, so buckets shared
/// between adjacent counts split their mass instead of double counting.
/// Building the table once per distinct length avoids redoing this per
/// record.
#[derive(Debug)]
pub struct GcModel {
    models: Vec<Vec<GcModelValue>>,
}

impl GcModel {
    pub fn new(read_length: usize) -> GcModel {
        let len = read_length as f64;
        let bucket_range = |count: usize| {
            let low = (count as f64 - 0.5).clamp(0.0, len);
            let high = (count as f64 + 0.5).clamp(0.0, len);
            let low_percent = ((low * 100.0) / len).round() as usize;
            let high_percent = ((high * 100.0) / len).round() as usize;
            (low_percent, high_percent)
        };

        let mut claiming_counts = [0.0f64; 101];
        for count in 0..=read_length {
            let (low, high) = bucket_range(count);
            for p in low..=high {
                claiming_counts[p] += 1.0;
            }
        }

        let mut models = Vec::with_capacity(read_length + 1);
        for count in 0..=read_length {
            let (low, high) = bucket_range(count);
            let values = (low..=high)
                .map(|p| GcModelValue {
                    percentage: p,
                    increment: 1.0 / claiming_counts[p],
                })
                .collect();
            models.push(values);
        }

        GcModel { models }
    }

    pub fn values_for_count(&self, gc_count: usize) -> &[GcModelValue] {
        &self.models[gc_count]
    }
}

/// Cache of GC models keyed by observed read length, built lazily and kept
/// for the life of the owning module.
#[derive(Debug, Default)]
pub struct GcModelCache {
    models: HashMap<usize, GcModel>,
}

impl GcModelCache {
    pub fn new() -> GcModelCache {
        GcModelCache::default()
    }

    pub fn model_for_length(&mut self, read_length: usize) -> &GcModel {
        self.models
            .entry(read_length)
            .or_insert_with(|| GcModel::new(read_length))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn each_bucket_receives_unit_mass_across_all_counts() {
        for len in [1usize, 10, 36, 100] {
            let model = GcModel::new(len);
            let mut bucket_totals = [0.0f64; 101];
            for count in 0..=len {
                for value in model.values_for_count(count) {
                    bucket_totals[value.percentage] += value.increment;
                }
            }
            for (p, &total) in bucket_totals.iter().enumerate() {
                if total > 0.0 {
                    assert!(
                        (total - 1.0).abs() < 1e-9,
                        "len {} bucket {} summed to {}",
                        len,
                        p,
                        total
                    );
                }
            }
        }
    }

    #[test]
    fn extremes_map_to_scale_edges() {
        let model = GcModel::new(50);
        assert_eq!(model.values_for_count(0)[0].percentage, 0);
        let last = model.values_for_count(50).last().unwrap();
        assert_eq!(last.percentage, 100);
    }

    #[test]
    fn cache_reuses_models_per_length() {
        let mut cache = GcModelCache::default();
        let first = cache.model_for_length(36) as *const GcModel;
        let again = cache.model_for_length(36) as *const GcModel;
        assert_eq!(first, again);
    }
}
