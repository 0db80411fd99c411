use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::Add;

/// Observed click and impression counts for one subject.
///
/// `clicks <= impressions` is not checked, callers aggregating raw events
/// are responsible for it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Record {
    clicks: u64,
    impressions: u64,
}

impl Record {
    /// Additive identity for `merge`
    pub const ZERO: Record = Record {
        clicks: 0,
        impressions: 0,
    };

    pub fn new(clicks: u64, impressions: u64) -> Self {
        Self {
            clicks,
            impressions,
        }
    }

    /// Build a record from signed counts, rejecting negative values.
    pub fn from_signed(clicks: i64, impressions: i64) -> Result<Self> {
        if clicks < 0 || impressions < 0 {
            bail!(
                "illegal parameters: clicks({}) / impressions({})",
                clicks,
                impressions
            );
        }
        Ok(Self::new(clicks as u64, impressions as u64))
    }

    pub fn clicks(&self) -> u64 {
        self.clicks
    }

    pub fn impressions(&self) -> u64 {
        self.impressions
    }

    /// Raw click-through rate, 0 for records without impressions.
    pub fn ctr(&self) -> f64 {
        if self.impressions == 0 {
            return 0.0;
        }
        self.clicks as f64 / self.impressions as f64
    }

    /// Impressions that did not lead to a click
    pub fn non_clicks(&self) -> f64 {
        self.impressions as f64 - self.clicks as f64
    }

    pub fn is_empty(&self) -> bool {
        self.impressions == 0
    }

    /// Component-wise sum of two records.
    ///
    /// The counts must not overflow `u64`; use `checked_merge` on untrusted
    /// input.
    pub fn merge(&self, other: &Record) -> Record {
        Record {
            clicks: self.clicks + other.clicks,
            impressions: self.impressions + other.impressions,
        }
    }

    /// `merge`, or `None` if either count would overflow.
    pub fn checked_merge(&self, other: &Record) -> Option<Record> {
        Some(Record {
            clicks: self.clicks.checked_add(other.clicks)?,
            impressions: self.impressions.checked_add(other.impressions)?,
        })
    }
}

impl TryFrom<(i64, i64)> for Record {
    type Error = anyhow::Error;

    fn try_from((clicks, impressions): (i64, i64)) -> Result<Self, Self::Error> {
        Record::from_signed(clicks, impressions)
    }
}

/// Same overflow precondition as `merge`
impl Add for Record {
    type Output = Record;

    fn add(self, rhs: Record) -> Record {
        self.merge(&rhs)
    }
}

impl Sum for Record {
    fn sum<I: Iterator<Item = Record>>(iter: I) -> Self {
        iter.fold(Record::ZERO, |acc, r| acc + r)
    }
}

impl<'a> Sum<&'a Record> for Record {
    fn sum<I: Iterator<Item = &'a Record>>(iter: I) -> Self {
        iter.fold(Record::ZERO, |acc, r| acc.merge(r))
    }
}

impl fmt::Display for Record {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}/{}({:.4})", self.clicks, self.impressions, self.ctr())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn record_strategy() -> impl Strategy<Value = Record> {
        (0u64..1_000_000, 0u64..1_000_000).prop_map(|(c, i)| Record::new(c, i))
    }

    #[test]
    fn test_ctr() {
        assert_eq!(Record::new(1, 4).ctr(), 0.25);
        assert_eq!(Record::new(3, 0).ctr(), 0.0);
        assert_eq!(Record::ZERO.ctr(), 0.0);
    }

    #[test]
    fn test_negative_counts_rejected() {
        assert!(Record::from_signed(-1, 10).is_err());
        assert!(Record::from_signed(1, -10).is_err());
        assert!(Record::try_from((-5i64, -5i64)).is_err());
        let record = Record::try_from((2i64, 10i64)).unwrap();
        assert_eq!(record, Record::new(2, 10));
    }

    #[test]
    fn test_display() {
        assert_eq!(Record::new(1, 3).to_string(), "1/3(0.3333)");
        assert_eq!(Record::ZERO.to_string(), "0/0(0.0000)");
    }

    #[test]
    fn test_sum() {
        let records = vec![Record::new(1, 10), Record::new(2, 20), Record::new(3, 30)];
        let total: Record = records.iter().sum();
        assert_eq!(total, Record::new(6, 60));
        let total: Record = records.into_iter().sum();
        assert_eq!(total, Record::new(6, 60));
        let empty: Vec<Record> = Vec::new();
        assert_eq!(empty.into_iter().sum::<Record>(), Record::ZERO);
    }

    #[test]
    fn test_checked_merge() {
        let big = Record::new(0, u64::MAX - 1);
        assert_eq!(
            big.checked_merge(&Record::new(3, 1)),
            Some(Record::new(3, u64::MAX))
        );
        assert_eq!(big.checked_merge(&Record::new(0, 2)), None);
        assert_eq!(Record::new(u64::MAX, 0).checked_merge(&Record::new(1, 0)), None);
    }

    #[test]
    fn test_default_is_zero() {
        assert_eq!(Record::default(), Record::ZERO);
    }

    proptest! {
        #[test]
        fn merge_is_associative(a in record_strategy(), b in record_strategy(), c in record_strategy()) {
            prop_assert_eq!(a.merge(&b).merge(&c), a.merge(&b.merge(&c)));
        }

        #[test]
        fn merge_is_commutative(a in record_strategy(), b in record_strategy()) {
            prop_assert_eq!(a.merge(&b), b.merge(&a));
        }

        #[test]
        fn checked_merge_agrees_with_merge(a in record_strategy(), b in record_strategy()) {
            prop_assert_eq!(a.checked_merge(&b), Some(a.merge(&b)));
        }

        #[test]
        fn zero_is_identity(a in record_strategy()) {
            prop_assert_eq!(a.merge(&Record::ZERO), a);
            prop_assert_eq!(Record::ZERO.merge(&a), a);
        }
    }
}
