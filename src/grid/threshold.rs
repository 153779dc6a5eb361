//! Ordered index of energy thresholds.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use super::types::Amount;

/// Compound key of a threshold: the level, then a tiebreak that keeps equal
/// levels from different observers apart.
#[derive(Debug, Clone, Copy)]
pub struct ThresholdKey {
    value: Amount,
    tiebreak: i64,
}

impl ThresholdKey {
    /// Returns `None` for NaN levels. `-0.0` is stored as `0.0`.
    pub fn new(value: Amount, tiebreak: i64) -> Option<Self> {
        if value.is_nan() {
            return None;
        }
        let value = if value == 0.0 { 0.0 } else { value };
        Some(Self { value, tiebreak })
    }

    pub fn value(&self) -> Amount {
        self.value
    }

    pub fn tiebreak(&self) -> i64 {
        self.tiebreak
    }
}

impl PartialEq for ThresholdKey {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for ThresholdKey {}

impl PartialOrd for ThresholdKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ThresholdKey {
    fn cmp(&self, other: &Self) -> Ordering {
        self.value
            .total_cmp(&other.value)
            .then(self.tiebreak.cmp(&other.tiebreak))
    }
}

/// A threshold together with the observer that asked for it.
#[derive(Debug, Clone, PartialEq)]
pub struct EnergyThreshold<O> {
    pub key: ThresholdKey,
    pub observer: O,
}

impl<O> EnergyThreshold<O> {
    /// Returns `None` for NaN levels.
    pub fn new(value: Amount, tiebreak: i64, observer: O) -> Option<Self> {
        ThresholdKey::new(value, tiebreak).map(|key| Self { key, observer })
    }

    pub fn value(&self) -> Amount {
        self.key.value
    }
}

/// Thresholds sorted by level.
#[derive(Debug, Clone)]
pub struct ThresholdIndex<O> {
    entries: BTreeMap<ThresholdKey, O>,
}

impl<O> Default for ThresholdIndex<O> {
    fn default() -> Self {
        Self {
            entries: BTreeMap::new(),
        }
    }
}

impl<O> ThresholdIndex<O> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a threshold. Returns `false` if the key is already taken.
    pub fn register(&mut self, threshold: EnergyThreshold<O>) -> bool {
        if self.entries.contains_key(&threshold.key) {
            return false;
        }
        self.entries.insert(threshold.key, threshold.observer);
        true
    }

    /// Removes the threshold under `key`. Returns `false` if it was absent.
    pub fn unregister(&mut self, key: &ThresholdKey) -> bool {
        self.entries.remove(key).is_some()
    }

    /// Calls `f` once for every threshold inside the inclusive range spanned
    /// by `old` and `new`, in ascending order. Returns the number delivered.
    pub fn notify_range<F>(&self, old: Amount, new: Amount, mut f: F) -> usize
    where
        F: FnMut(&ThresholdKey, &O),
    {
        if old.is_nan() || new.is_nan() {
            return 0;
        }
        let lo = old.min(new);
        let hi = old.max(new);
        let (Some(from), Some(to)) = (
            ThresholdKey::new(lo, i64::MIN),
            ThresholdKey::new(hi, i64::MAX),
        ) else {
            return 0;
        };
        let mut delivered = 0;
        for (key, observer) in self.entries.range(from..=to) {
            f(key, observer);
            delivered += 1;
        }
        delivered
    }

    /// Keeps only the thresholds whose observer satisfies `keep`.
    pub fn retain_observers<F>(&mut self, mut keep: F) -> usize
    where
        F: FnMut(&O) -> bool,
    {
        let before = self.entries.len();
        self.entries.retain(|_, observer| keep(observer));
        before - self.entries.len()
    }

    pub fn contains(&self, key: &ThresholdKey) -> bool {
        self.entries.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&ThresholdKey, &O)> + '_ {
        self.entries.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn index(levels: &[(f64, i64)]) -> ThresholdIndex<&'static str> {
        let mut index = ThresholdIndex::new();
        for &(value, tiebreak) in levels {
            let threshold = EnergyThreshold::new(value, tiebreak, "obs");
            assert!(threshold.is_some_and(|t| index.register(t)));
        }
        index
    }

    fn notified(index: &ThresholdIndex<&'static str>, old: f64, new: f64) -> Vec<f64> {
        let mut seen = Vec::new();
        index.notify_range(old, new, |key, _| seen.push(key.value()));
        seen
    }

    #[test]
    fn only_crossed_levels_are_delivered() {
        let index = index(&[(10.0, 0), (50.0, 0), (90.0, 0)]);
        assert_eq!(notified(&index, 40.0, 60.0), vec![50.0]);
        assert_eq!(notified(&index, 60.0, 40.0), vec![50.0]);
    }

    #[test]
    fn range_is_inclusive_on_both_ends() {
        let index = index(&[(10.0, 0), (50.0, 0), (90.0, 0)]);
        assert_eq!(notified(&index, 10.0, 90.0), vec![10.0, 50.0, 90.0]);
        assert_eq!(notified(&index, 50.0, 50.0), vec![50.0]);
        assert!(notified(&index, 51.0, 52.0).is_empty());
    }

    #[test]
    fn duplicate_values_are_kept_apart_by_tiebreak() {
        let mut index = index(&[(50.0, 1), (50.0, 2)]);
        assert_eq!(index.len(), 2);
        assert_eq!(notified(&index, 0.0, 100.0).len(), 2);
        let dup = EnergyThreshold::new(50.0, 1, "other");
        assert!(dup.is_some_and(|t| !index.register(t)));
    }

    #[test]
    fn nan_is_rejected() {
        assert!(EnergyThreshold::new(f64::NAN, 0, ()).is_none());
        let index = index(&[(1.0, 0)]);
        assert_eq!(index.notify_range(f64::NAN, 5.0, |_, _| {}), 0);
    }

    #[test]
    fn negative_zero_matches_zero() {
        let index = index(&[(-0.0, 0)]);
        assert_eq!(notified(&index, 0.0, 0.0), vec![0.0]);
    }

    #[test]
    fn unregister_and_retain() {
        let mut index = ThresholdIndex::new();
        for (value, owner) in [(1.0, 1u64), (2.0, 2), (3.0, 1)] {
            if let Some(t) = EnergyThreshold::new(value, owner as i64, owner) {
                index.register(t);
            }
        }
        let key = ThresholdKey::new(2.0, 2);
        assert!(key.is_some_and(|k| index.unregister(&k)));
        assert_eq!(index.retain_observers(|owner| *owner != 1), 2);
        assert!(index.is_empty());
    }
}
