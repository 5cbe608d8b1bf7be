use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::InvalidInterval;

/// Charting step between two intervals, in minutes.
pub const STEP_MINUTES: u16 = 15;

/// Last interval of a monitoring window, in minutes.
pub const MAX_MINUTES: u16 = 240;

/// A 15-minute charting slot, counted in minutes from the start of
/// monitoring (0, 15, 30, ..., 240).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub struct Interval(u16);

impl Interval {
    pub const START: Interval = Interval(0);

    pub fn new(minutes: i64) -> Result<Self, InvalidInterval> {
        Self::try_from(minutes)
    }

    pub fn minutes(self) -> u16 {
        self.0
    }

    /// The slot 15 minutes earlier. `None` at the start of monitoring.
    pub fn previous(self) -> Option<Interval> {
        self.0.checked_sub(STEP_MINUTES).map(Interval)
    }

    /// Every valid slot in ascending order.
    pub fn all() -> impl Iterator<Item = Interval> {
        (0..=MAX_MINUTES).step_by(STEP_MINUTES as usize).map(Interval)
    }
}

impl TryFrom<i64> for Interval {
    type Error = InvalidInterval;

    fn try_from(minutes: i64) -> Result<Self, Self::Error> {
        if (0..=MAX_MINUTES as i64).contains(&minutes) && minutes % STEP_MINUTES as i64 == 0 {
            Ok(Interval(minutes as u16))
        } else {
            Err(InvalidInterval(minutes))
        }
    }
}

impl From<Interval> for i64 {
    fn from(interval: Interval) -> Self {
        interval.0 as i64
    }
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case(0 ; "start")]
    #[test_case(15 ; "first step")]
    #[test_case(240 ; "last slot")]
    fn accepts_charting_slots(minutes: i64) {
        assert_eq!(i64::from(Interval::new(minutes).unwrap()), minutes);
    }

    #[test_case(-15 ; "negative")]
    #[test_case(7 ; "off grid")]
    #[test_case(255 ; "past window")]
    fn rejects_other_values(minutes: i64) {
        assert!(Interval::new(minutes).is_err());
    }

    #[test]
    fn previous_walks_back_one_step() {
        assert_eq!(Interval::START.previous(), None);
        assert_eq!(Interval::new(30).unwrap().previous(), Some(Interval::new(15).unwrap()));
    }

    #[test]
    fn all_covers_the_window() {
        let slots: Vec<_> = Interval::all().map(Interval::minutes).collect();
        assert_eq!(slots.len(), 17);
        assert_eq!(slots.first(), Some(&0));
        assert_eq!(slots.last(), Some(&240));
    }

    #[test]
    fn deserializes_from_plain_integer() {
        let interval: Interval = serde_json::from_str("45").unwrap();
        assert_eq!(interval.minutes(), 45);
        assert!(serde_json::from_str::<Interval>("50").is_err());
    }
}
