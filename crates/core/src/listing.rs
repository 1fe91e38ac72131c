//! Listing size policy for recency listings.

use serde::{Deserialize, Serialize};

/// Bounds applied to a requested listing size.
///
/// Numeric requests are clamped into `[min, max]`; absent or unparsable
/// requests use `default`.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListPolicy {
    default: usize,
    min: usize,
    max: usize,
}

impl ListPolicy {
    pub const DEFAULT_LIMIT: usize = 20;
    pub const MIN_LIMIT: usize = 1;
    pub const MAX_LIMIT: usize = 200;

    /// Build a policy, repairing inconsistent bounds.
    ///
    /// `min` is at least 1, `max` at least `min`, and `default` is clamped
    /// into the resulting range.
    pub fn new(default: usize, min: usize, max: usize) -> Self {
        let min = min.max(1);
        let max = max.max(min);
        Self {
            default: default.clamp(min, max),
            min,
            max,
        }
    }

    pub fn default_limit(&self) -> usize {
        self.default
    }

    pub fn min(&self) -> usize {
        self.min
    }

    pub fn max(&self) -> usize {
        self.max
    }

    /// Clamp an explicit numeric request.
    pub fn clamp(&self, requested: i64) -> ListLimit {
        let n = if requested < 0 {
            self.min
        } else {
            usize::try_from(requested).unwrap_or(self.max).clamp(self.min, self.max)
        };
        ListLimit(n)
    }

    /// Resolve a raw request as received from the transport layer.
    pub fn parse(&self, requested: Option<&str>) -> ListLimit {
        match requested.map(str::trim).and_then(|s| s.parse::<i64>().ok()) {
            Some(n) => self.clamp(n),
            None => ListLimit(self.default),
        }
    }

    /// Resolve an optional numeric request.
    pub fn resolve(&self, requested: Option<i64>) -> ListLimit {
        match requested {
            Some(n) => self.clamp(n),
            None => ListLimit(self.default),
        }
    }
}

impl Default for ListPolicy {
    fn default() -> Self {
        Self::new(Self::DEFAULT_LIMIT, Self::MIN_LIMIT, Self::MAX_LIMIT)
    }
}

/// A listing size that has already been resolved against a [`ListPolicy`].
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct ListLimit(usize);

impl ListLimit {
    pub fn get(self) -> usize {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clamps_out_of_range_requests() {
        let policy = ListPolicy::default();
        assert_eq!(policy.clamp(0).get(), 1);
        assert_eq!(policy.clamp(-5).get(), 1);
        assert_eq!(policy.clamp(500).get(), 200);
        assert_eq!(policy.clamp(37).get(), 37);
        assert_eq!(policy.clamp(i64::MAX).get(), 200);
    }

    #[test]
    fn unparsable_or_absent_request_uses_default() {
        let policy = ListPolicy::default();
        assert_eq!(policy.parse(Some("not-a-number")).get(), 20);
        assert_eq!(policy.parse(Some("")).get(), 20);
        assert_eq!(policy.parse(None).get(), 20);
        assert_eq!(policy.parse(Some(" 0 ")).get(), 1);
        assert_eq!(policy.parse(Some("500")).get(), 200);
        assert_eq!(policy.resolve(None).get(), 20);
    }

    #[test]
    fn inconsistent_bounds_are_repaired() {
        let policy = ListPolicy::new(1000, 0, 0);
        assert_eq!(policy.min(), 1);
        assert_eq!(policy.max(), 1);
        assert_eq!(policy.default_limit(), 1);

        let policy = ListPolicy::new(5, 10, 50);
        assert_eq!(policy.default_limit(), 10);
    }
}
