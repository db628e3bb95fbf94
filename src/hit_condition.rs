//! Hit-condition evaluator (§4.1).
//!
//! Parses `hitCondition` strings of the form `<op><n>` into a stateful
//! predicate over a monotonic per-breakpoint hit counter. Grounded on the
//! grammar of `trust-debug::session::parse_hit_condition`, extended from its
//! `ge`/`gt`/`eq` trio to the full operator set the spec names (adding `<`,
//! `<=`, and `%`).

use crate::error::BreakpointError;

/// A parsed hit-condition operator/operand pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HitCondition {
    GreaterThan(u64),
    AtLeast(u64),
    Equal(u64),
    LessThan(u64),
    AtMost(u64),
    DivisibleBy(u64),
}

impl HitCondition {
    /// Parses a `hitCondition` string matching
    /// `^(>|>=|={1,3}|<|<=|%)?\s*([0-9]+)$`. The operator defaults to `=`.
    pub fn parse(raw: &str) -> Result<Self, BreakpointError> {
        let trimmed = raw.trim();
        let invalid = || BreakpointError::InvalidHitCondition(raw.to_string());

        let (op, rest) = if let Some(rest) = trimmed.strip_prefix(">=") {
            ("ge", rest)
        } else if let Some(rest) = trimmed.strip_prefix("<=") {
            ("le", rest)
        } else if let Some(rest) = trimmed.strip_prefix("===") {
            ("eq", rest)
        } else if let Some(rest) = trimmed.strip_prefix("==") {
            ("eq", rest)
        } else if let Some(rest) = trimmed.strip_prefix('>') {
            ("gt", rest)
        } else if let Some(rest) = trimmed.strip_prefix('<') {
            ("lt", rest)
        } else if let Some(rest) = trimmed.strip_prefix('%') {
            ("mod", rest)
        } else if let Some(rest) = trimmed.strip_prefix('=') {
            ("eq", rest)
        } else {
            ("eq", trimmed)
        };

        let value: u64 = rest.trim().parse().map_err(|_| invalid())?;
        match op {
            "ge" => Ok(Self::AtLeast(value)),
            "le" => Ok(Self::AtMost(value)),
            "gt" => Ok(Self::GreaterThan(value)),
            "lt" => Ok(Self::LessThan(value)),
            "mod" => {
                if value == 0 {
                    Err(invalid())
                } else {
                    Ok(Self::DivisibleBy(value))
                }
            }
            _ => Ok(Self::Equal(value)),
        }
    }

    fn test(self, count: u64) -> bool {
        match self {
            Self::GreaterThan(k) => count > k,
            Self::AtLeast(k) => count >= k,
            Self::Equal(k) => count == k,
            Self::LessThan(k) => count < k,
            Self::AtMost(k) => count <= k,
            Self::DivisibleBy(k) => count % k == 0,
        }
    }

    /// Builds the stateful predicate described above, with its counter at 0.
    #[must_use]
    pub fn into_predicate(self) -> HitConditionPredicate {
        HitConditionPredicate {
            condition: Some(self),
            count: 0,
        }
    }
}

/// A stateful predicate over a monotonic hit counter.
///
/// `NeverResolved` breakpoints use [`HitConditionPredicate::never`], the
/// constant-false predicate, so they never cause a pause even if somehow
/// hit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HitConditionPredicate {
    condition: Option<HitCondition>,
    count: u64,
}

impl HitConditionPredicate {
    /// A predicate with no hit condition: every hit should pause.
    #[must_use]
    pub fn always() -> Self {
        Self {
            condition: None,
            count: 0,
        }
    }

    /// The constant-false predicate used by `NeverResolved` breakpoints.
    #[must_use]
    pub fn never() -> Self {
        Self {
            condition: Some(HitCondition::Equal(u64::MAX)),
            count: 0,
        }
    }

    /// Increments the counter and tests it against the condition. Returns
    /// `true` if the breakpoint should stay paused.
    pub fn record_hit(&mut self) -> bool {
        self.count += 1;
        match self.condition {
            None => true,
            Some(condition) => condition.test(self.count),
        }
    }

    #[must_use]
    pub fn hit_count(&self) -> u64 {
        self.count
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_all_operators() {
        assert_eq!(HitCondition::parse("3").unwrap(), HitCondition::Equal(3));
        assert_eq!(HitCondition::parse("== 3").unwrap(), HitCondition::Equal(3));
        assert_eq!(
            HitCondition::parse("=== 3").unwrap(),
            HitCondition::Equal(3)
        );
        assert_eq!(
            HitCondition::parse(">= 4").unwrap(),
            HitCondition::AtLeast(4)
        );
        assert_eq!(
            HitCondition::parse("> 5").unwrap(),
            HitCondition::GreaterThan(5)
        );
        assert_eq!(
            HitCondition::parse("<= 6").unwrap(),
            HitCondition::AtMost(6)
        );
        assert_eq!(HitCondition::parse("< 7").unwrap(), HitCondition::LessThan(7));
        assert_eq!(
            HitCondition::parse("% 2").unwrap(),
            HitCondition::DivisibleBy(2)
        );
    }

    #[test]
    fn rejects_garbage() {
        assert!(HitCondition::parse("nope").is_err());
        assert!(HitCondition::parse("% 0").is_err());
        assert!(HitCondition::parse("").is_err());
    }

    #[test]
    fn greater_than_becomes_true_on_kplus1th_hit() {
        let mut pred = HitCondition::parse("> 2").unwrap().into_predicate();
        assert!(!pred.record_hit());
        assert!(!pred.record_hit());
        assert!(pred.record_hit());
    }

    #[test]
    fn divisible_by_fires_every_kth_hit() {
        let mut pred = HitCondition::parse("% 3").unwrap().into_predicate();
        let results: Vec<bool> = (0..6).map(|_| pred.record_hit()).collect();
        assert_eq!(results, vec![false, false, true, false, false, true]);
    }

    #[test]
    fn equal_fires_exactly_once() {
        let mut pred = HitCondition::parse("3").unwrap().into_predicate();
        let results: Vec<bool> = (0..5).map(|_| pred.record_hit()).collect();
        assert_eq!(results, vec![false, false, true, false, false]);
    }

    #[test]
    fn never_resolved_predicate_always_false() {
        let mut pred = HitConditionPredicate::never();
        for _ in 0..100 {
            assert!(!pred.record_hit());
        }
    }
}
