//! Call-count budgets and their verification.

use crate::request::HttpMethod;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Expected number of requests a handler serves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum TimesBudget {
    #[default]
    Unconstrained,
    Exact { count: usize },
    Range { min: usize, max: usize },
}

impl TimesBudget {
    pub fn exact(count: usize) -> Self {
        TimesBudget::Exact { count }
    }

    /// Inclusive range. Bounds given in reverse order are swapped.
    pub fn range(min: usize, max: usize) -> Self {
        let (min, max) = if min <= max { (min, max) } else { (max, min) };
        if min == max {
            TimesBudget::Exact { count: min }
        } else {
            TimesBudget::Range { min, max }
        }
    }

    pub fn is_declared(&self) -> bool {
        !matches!(self, TimesBudget::Unconstrained)
    }

    pub fn allows(&self, count: usize) -> bool {
        match *self {
            TimesBudget::Unconstrained => true,
            TimesBudget::Exact { count: expected } => count == expected,
            TimesBudget::Range { min, max } => (min..=max).contains(&count),
        }
    }
}

impl fmt::Display for TimesBudget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let plural = |n: usize| if n == 1 { "request" } else { "requests" };
        match *self {
            TimesBudget::Unconstrained => f.write_str("any number of requests"),
            TimesBudget::Exact { count } => write!(f, "exactly {count} {}", plural(count)),
            TimesBudget::Range { min, max } => {
                write!(f, "at least {min} and at most {max} {}", plural(max))
            }
        }
    }
}

/// One handler whose observed count is outside its budget.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimesViolation {
    pub method: HttpMethod,
    pub path: String,
    pub budget: TimesBudget,
    pub observed: usize,
    /// Requests to the endpoint rejected by the handler's restrictions
    pub unmatched: usize,
}

impl fmt::Display for TimesViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {}: expected {}, but got {}",
            self.method, self.path, self.budget, self.observed
        )?;
        if self.unmatched > 0 {
            write!(
                f,
                " ({} other {} did not match the handler restrictions)",
                self.unmatched,
                if self.unmatched == 1 { "request" } else { "requests" }
            )?;
        }
        Ok(())
    }
}

/// Aggregate of every violation found by `check_times`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimesCheckFailure {
    pub violations: Vec<TimesViolation>,
}

impl fmt::Display for TimesCheckFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} handler(s) did not match the expected number of requests:",
            self.violations.len()
        )?;
        for (index, violation) in self.violations.iter().enumerate() {
            write!(f, "\n  {}. {}", index + 1, violation)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exact_budget() {
        let budget = TimesBudget::exact(2);
        assert!(!budget.allows(0));
        assert!(!budget.allows(1));
        assert!(budget.allows(2));
        assert!(!budget.allows(3));
    }

    #[test]
    fn test_range_budget() {
        let budget = TimesBudget::range(1, 3);
        assert!(!budget.allows(0));
        assert!(budget.allows(1));
        assert!(budget.allows(3));
        assert!(!budget.allows(4));
    }

    #[test]
    fn test_range_normalization() {
        assert_eq!(TimesBudget::range(3, 1), TimesBudget::Range { min: 1, max: 3 });
        assert_eq!(TimesBudget::range(2, 2), TimesBudget::Exact { count: 2 });
    }

    #[test]
    fn test_failure_lists_every_violation() {
        let failure = TimesCheckFailure {
            violations: vec![
                TimesViolation {
                    method: HttpMethod::Get,
                    path: "/users".to_string(),
                    budget: TimesBudget::exact(1),
                    observed: 0,
                    unmatched: 0,
                },
                TimesViolation {
                    method: HttpMethod::Post,
                    path: "/users/:id".to_string(),
                    budget: TimesBudget::range(1, 2),
                    observed: 3,
                    unmatched: 1,
                },
            ],
        };
        let message = failure.to_string();
        assert!(message.contains("2 handler(s)"));
        assert!(message.contains("1. GET /users: expected exactly 1 request, but got 0"));
        assert!(message.contains(
            "2. POST /users/:id: expected at least 1 and at most 2 requests, but got 3"
        ));
        assert!(message.contains("1 other request did not match"));
    }
}
