//! Lead scoring
//!
//! Evaluates an ordered set of scoring rules against the submitted field
//! values. Evaluation is a pure function: the same rules and values always
//! produce the same outcome, and malformed data degrades to a non-match
//! instead of an error.

use crate::field_value::parse_number;
use crate::FieldValue;
use std::collections::HashMap;

/// Default score at which a lead becomes marketing qualified
pub const DEFAULT_MQL_THRESHOLD: u32 = 70;

/// Upper bound of the lead score
pub const MAX_SCORE: u32 = 100;

/// Comparison performed by a scoring rule
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Condition {
    /// Case-insensitive equality of the text views
    Equals,
    /// Case-insensitive substring match
    Contains,
    /// Numeric value strictly above the comparison value
    GreaterThan,
    /// Numeric value strictly below the comparison value
    LessThan,
    /// Trimmed value is non-empty
    NotEmpty,
    /// Numeric value within `"min,max"`, inclusive
    Range,
}

impl Condition {
    /// Get the condition name as used in configuration
    pub fn as_str(&self) -> &'static str {
        match self {
            Condition::Equals => "equals",
            Condition::Contains => "contains",
            Condition::GreaterThan => "greater_than",
            Condition::LessThan => "less_than",
            Condition::NotEmpty => "not_empty",
            Condition::Range => "range",
        }
    }

    /// Parse a condition name
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "equals" => Some(Condition::Equals),
            "contains" => Some(Condition::Contains),
            "greater_than" => Some(Condition::GreaterThan),
            "less_than" => Some(Condition::LessThan),
            "not_empty" => Some(Condition::NotEmpty),
            "range" => Some(Condition::Range),
            _ => None,
        }
    }
}

impl std::str::FromStr for Condition {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| format!("Invalid scoring condition: {}", s))
    }
}

/// A single scoring rule
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScoringRule {
    /// Field the rule inspects
    pub field_id: String,
    /// Comparison to perform
    pub condition: Condition,
    /// Right-hand side of the comparison (ignored by `not_empty`)
    pub comparison_value: String,
    /// Points awarded on match
    pub points: u32,
}

impl ScoringRule {
    /// Create a new scoring rule
    pub fn new(
        field_id: impl Into<String>,
        condition: Condition,
        comparison_value: impl Into<String>,
        points: u32,
    ) -> Self {
        Self {
            field_id: field_id.into(),
            condition,
            comparison_value: comparison_value.into(),
            points,
        }
    }

    /// Whether this rule matches the given value
    ///
    /// Empty values never match; callers skip them before getting here, but
    /// the check is repeated so the rule is safe to use on its own.
    pub fn matches(&self, value: &FieldValue) -> bool {
        if value.is_empty() {
            return false;
        }

        match self.condition {
            Condition::Equals => {
                value.text().trim().to_lowercase() == self.comparison_value.trim().to_lowercase()
            }
            Condition::Contains => value
                .text()
                .to_lowercase()
                .contains(&self.comparison_value.to_lowercase()),
            Condition::GreaterThan => compare_numeric(value, &self.comparison_value, |v, c| v > c),
            Condition::LessThan => compare_numeric(value, &self.comparison_value, |v, c| v < c),
            Condition::NotEmpty => !value.text().trim().is_empty(),
            Condition::Range => match (value.number(), parse_range(&self.comparison_value)) {
                (Some(v), Some((min, max))) => v >= min && v <= max,
                _ => false,
            },
        }
    }
}

fn compare_numeric(value: &FieldValue, comparison: &str, op: impl Fn(f64, f64) -> bool) -> bool {
    match (value.number(), parse_number(comparison)) {
        (Some(v), Some(c)) => op(v, c),
        _ => false,
    }
}

/// Parse a `"min,max"` range bound
///
/// Whitespace around either bound is ignored and reversed bounds are
/// normalized, so `"100, 10"` is the same range as `"10,100"`.
pub fn parse_range(raw: &str) -> Option<(f64, f64)> {
    let (min, max) = raw.split_once(',')?;
    let min = parse_number(min)?;
    let max = parse_number(max)?;
    Some(if min <= max { (min, max) } else { (max, min) })
}

/// Per-rule evaluation detail, for score breakdown panels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RuleOutcome {
    /// Position of the rule in the evaluated rule set
    pub rule_index: usize,
    /// Whether the rule matched
    pub matched: bool,
    /// Points contributed (0 when not matched)
    pub points_awarded: u32,
}

/// Result of scoring a submission
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScoreOutcome {
    /// Clamped score in [0, 100]
    pub score: u8,
    /// Whether the score reaches the MQL threshold
    pub is_mql: bool,
    /// Sum of matched points before clamping
    pub raw_points: u32,
    /// One entry per rule, in rule order
    pub breakdown: Vec<RuleOutcome>,
}

/// Scoring engine holding the MQL cutoff
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScoringEngine {
    mql_threshold: u32,
}

impl Default for ScoringEngine {
    fn default() -> Self {
        Self::new(DEFAULT_MQL_THRESHOLD)
    }
}

impl ScoringEngine {
    /// Create an engine with the given MQL threshold
    pub fn new(mql_threshold: u32) -> Self {
        Self { mql_threshold }
    }

    /// Get the configured MQL threshold
    pub fn mql_threshold(&self) -> u32 {
        self.mql_threshold
    }

    /// Score the field values against the rules
    ///
    /// # Examples
    ///
    /// ```
    /// use leadflow_domain::{Condition, FieldValue, ScoringEngine, ScoringRule};
    /// use std::collections::HashMap;
    ///
    /// let rules = vec![
    ///     ScoringRule::new("budget", Condition::GreaterThan, "1000", 50),
    ///     ScoringRule::new("email", Condition::NotEmpty, "", 20),
    /// ];
    /// let mut values = HashMap::new();
    /// values.insert("budget".to_string(), FieldValue::from("5000"));
    /// values.insert("email".to_string(), FieldValue::from("a@b.com"));
    ///
    /// let outcome = ScoringEngine::default().evaluate(&rules, &values);
    /// assert_eq!(outcome.score, 70);
    /// assert!(outcome.is_mql);
    /// ```
    pub fn evaluate(&self, rules: &[ScoringRule], values: &HashMap<String, FieldValue>) -> ScoreOutcome {
        let mut raw_points: u32 = 0;
        let mut breakdown = Vec::with_capacity(rules.len());

        for (rule_index, rule) in rules.iter().enumerate() {
            let matched = match values.get(&rule.field_id) {
                Some(value) if !value.is_empty() => rule.matches(value),
                _ => false,
            };

            let points_awarded = if matched { rule.points } else { 0 };
            raw_points = raw_points.saturating_add(points_awarded);

            breakdown.push(RuleOutcome {
                rule_index,
                matched,
                points_awarded,
            });
        }

        let score = raw_points.min(MAX_SCORE) as u8;

        ScoreOutcome {
            score,
            is_mql: u32::from(score) >= self.mql_threshold,
            raw_points,
            breakdown,
        }
    }
}
