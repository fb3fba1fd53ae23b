//! Evaluation trace types for debugging rule-set decisions.
//!
//! [`EvalTrace`] mirrors [`WatchRuleSet::matches`](crate::WatchRuleSet::matches)
//! but records every rule consulted on the way to the decision. Use
//! `evaluate_with_trace()` when a URL is (or is not) intercepted and you need
//! to know which rule is responsible.
//!
//! # Example
//!
//! ```
//! use urlwatch::prelude::*;
//!
//! let rules = WatchRuleSet::from_descriptors(vec![
//!     RuleDescriptor::parse("!https://x/private/*"),
//!     RuleDescriptor::parse("https://x/*"),
//! ])
//! .unwrap();
//!
//! let trace = rules.evaluate_with_trace("https://x/private/keys");
//! assert!(!trace.result);
//! assert_eq!(trace.decided_by, Some(0));
//! assert_eq!(trace.steps.len(), 1);
//! ```

use std::fmt;

/// One rule consulted during evaluation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EvalStep {
    /// Position of the rule in the set.
    pub index: usize,
    /// The rule in short notation (e.g. `"!https://x/*"`).
    pub rule: String,
    /// Whether the rule's pattern accepted the input.
    pub matched: bool,
}

/// Full record of one evaluation.
///
/// Steps stop at the deciding rule; rules after it were never consulted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EvalTrace {
    /// The evaluated URL or pattern.
    pub input: String,
    /// Rules consulted, in order.
    pub steps: Vec<EvalStep>,
    /// Index of the rule that decided, `None` if nothing matched.
    pub decided_by: Option<usize>,
    /// The final answer, identical to what `matches` returns.
    pub result: bool,
}

impl EvalTrace {
    /// The deciding step, if any.
    #[must_use]
    pub fn deciding_step(&self) -> Option<&EvalStep> {
        let idx = self.decided_by?;
        self.steps.iter().find(|s| s.index == idx)
    }
}

impl fmt::Display for EvalTrace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.input)?;
        for step in &self.steps {
            let mark = if step.matched { "match" } else { "-" };
            writeln!(f, "  [{}] {:<5} {}", step.index, mark, step.rule)?;
        }
        match self.decided_by {
            Some(idx) => write!(f, "  => {} (rule #{idx})", self.result),
            None => write!(f, "  => {} (no rule matched)", self.result),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn step(index: usize, rule: &str, matched: bool) -> EvalStep {
        EvalStep {
            index,
            rule: rule.into(),
            matched,
        }
    }

    #[test]
    fn deciding_step_found() {
        let trace = EvalTrace {
            input: "https://x/a".into(),
            steps: vec![step(0, "https://y/*", false), step(1, "!https://x/*", true)],
            decided_by: Some(1),
            result: false,
        };
        assert_eq!(trace.deciding_step(), Some(&step(1, "!https://x/*", true)));
    }

    #[test]
    fn display_lists_steps_and_outcome() {
        let trace = EvalTrace {
            input: "https://x/a".into(),
            steps: vec![step(0, "https://y/*", false)],
            decided_by: None,
            result: false,
        };
        let out = trace.to_string();
        assert!(out.starts_with("https://x/a\n"));
        assert!(out.contains("[0] -     https://y/*"));
        assert!(out.ends_with("=> false (no rule matched)"));
    }
}
