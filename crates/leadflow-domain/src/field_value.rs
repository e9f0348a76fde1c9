//! Submitted field values
//!
//! Form backends deliver loosely typed values. Instead of relying on implicit
//! coercion, every value is one of four explicit variants and each scoring
//! condition asks for exactly the view it needs:
//!
//! | Variant | `text()` | `number()` | `is_empty()` |
//! |---------|----------|------------|--------------|
//! | Text    | itself   | trimmed parse, finite only | trimmed empty |
//! | Number  | shortest decimal (`5000`, `12.5`) | itself if finite | never |
//! | Boolean | `true` / `false` | none | never |
//! | Date    | epoch millis | epoch millis | never |

/// A single submitted field value
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    /// Free text
    Text(String),
    /// Numeric input
    Number(f64),
    /// Checkbox or toggle
    Boolean(bool),
    /// Date or datetime, as milliseconds since the Unix epoch
    Date(i64),
}

impl FieldValue {
    /// Text view used by `equals`, `contains` and `not_empty`
    pub fn text(&self) -> String {
        match self {
            FieldValue::Text(s) => s.clone(),
            FieldValue::Number(n) => n.to_string(),
            FieldValue::Boolean(b) => b.to_string(),
            FieldValue::Date(ms) => ms.to_string(),
        }
    }

    /// Numeric view used by `greater_than`, `less_than` and `range`
    ///
    /// Returns `None` when the value has no meaningful numeric reading.
    pub fn number(&self) -> Option<f64> {
        match self {
            FieldValue::Text(s) => parse_number(s),
            FieldValue::Number(n) if n.is_finite() => Some(*n),
            FieldValue::Number(_) => None,
            FieldValue::Boolean(_) => None,
            FieldValue::Date(ms) => Some(*ms as f64),
        }
    }

    /// Whether the value counts as absent for scoring purposes
    pub fn is_empty(&self) -> bool {
        match self {
            FieldValue::Text(s) => s.trim().is_empty(),
            _ => false,
        }
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::Text(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        FieldValue::Text(value)
    }
}

impl From<f64> for FieldValue {
    fn from(value: f64) -> Self {
        FieldValue::Number(value)
    }
}

impl From<bool> for FieldValue {
    fn from(value: bool) -> Self {
        FieldValue::Boolean(value)
    }
}

/// Parse a trimmed decimal, rejecting NaN and infinities
pub(crate) fn parse_number(raw: &str) -> Option<f64> {
    raw.trim().parse::<f64>().ok().filter(|n| n.is_finite())
}
