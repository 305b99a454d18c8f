use std::fmt;

/// Range of family sizes the model considers, for all nodes and for the root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FamilySizeDomain {
    pub min: u32,
    pub max: u32,
    pub root_min: u32,
    pub root_max: u32,
}

impl Default for FamilySizeDomain {
    fn default() -> Self {
        FamilySizeDomain::for_max_size(0)
    }
}

impl FamilySizeDomain {
    /// Domain wide enough for data whose largest observed family is `max`.
    /// Bounds saturate at `u32::MAX`.
    pub fn for_max_size(max: u32) -> Self {
        FamilySizeDomain {
            min: 0,
            max: max.saturating_add(std::cmp::max(50, max / 5)),
            root_min: 1,
            root_max: std::cmp::max(30, (f64::from(max) * 1.25).round() as u32),
        }
    }

    pub fn size_count(&self) -> usize {
        (self.max - self.min) as usize + 1
    }

    pub fn contains(&self, size: u32) -> bool {
        size >= self.min && size <= self.max
    }
}

impl fmt::Display for FamilySizeDomain {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "{}..={} (root {}..={})",
            self.min, self.max, self.root_min, self.root_max
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn small_families_get_the_floor() {
        let domain = FamilySizeDomain::for_max_size(10);
        assert_eq!(domain.min, 0);
        assert_eq!(domain.max, 60);
        assert_eq!(domain.root_min, 1);
        assert_eq!(domain.root_max, 30);
    }

    #[test]
    fn large_families_scale() {
        let domain = FamilySizeDomain::for_max_size(400);
        assert_eq!(domain.max, 480);
        assert_eq!(domain.root_max, 500);
        assert_eq!(domain.size_count(), 481);
        assert!(domain.contains(480));
        assert!(!domain.contains(481));
    }

    #[test]
    fn huge_counts_saturate() {
        let domain = FamilySizeDomain::for_max_size(4_000_000_000);
        assert_eq!(domain.max, u32::MAX);
        assert_eq!(domain.root_max, u32::MAX);
        assert!(domain.contains(4_000_000_000));
        assert_eq!(FamilySizeDomain::for_max_size(u32::MAX).max, u32::MAX);
    }
}
