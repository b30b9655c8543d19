/// An inclusive range of 1-based read positions binned together for
/// position-wise plots and threshold checks. Early positions get a group to
/// themselves and later positions are averaged so long reads still show
/// their overall trend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BaseGroup {
    lower: usize,
    upper: usize,
}

impl BaseGroup {
    /// Partition `[1, max_length]` into contiguous, non-overlapping groups.
    ///
    /// The interval starts at 1 and widens at fixed positions, each widening
    /// gated on the read length being long enough to need it. With
    /// `no_group` set every position keeps its own group.
    pub fn make_base_groups(max_length: usize, no_group: bool) -> Vec<BaseGroup> {
        let mut groups = Vec::new();
        let mut starting_base = 1usize;
        let mut interval = 1usize;

        while starting_base <= max_length {
            let end_base = (starting_base + interval - 1).min(max_length);
            groups.push(BaseGroup {
                lower: starting_base,
                upper: end_base,
            });
            starting_base += interval;

            if !no_group {
                if starting_base == 10 && max_length > 75 {
                    interval = 5;
                }
                if starting_base == 50 && max_length > 200 {
                    interval = 10;
                }
                if starting_base == 100 && max_length > 300 {
                    interval = 50;
                }
                if starting_base == 500 && max_length > 1000 {
                    interval = 100;
                }
                if starting_base == 1000 && max_length > 2000 {
                    interval = 500;
                }
            }
        }

        groups
    }

    pub fn lower(&self) -> usize {
        self.lower
    }

    pub fn upper(&self) -> usize {
        self.upper
    }

    pub fn label(&self) -> String {
        if self.lower == self.upper {
            format!("{}", self.lower)
        } else {
            format!("{}-{}", self.lower, self.upper)
        }
    }
}
