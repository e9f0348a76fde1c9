//! Submission module - the raw, immutable input of intake

use crate::{FieldValue, SubmissionId};
use std::collections::HashMap;

/// UTM tracking parameters captured with the submission
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UtmParams {
    /// `utm_source` (e.g. "google")
    pub source: Option<String>,
    /// `utm_medium` (e.g. "cpc")
    pub medium: Option<String>,
    /// `utm_campaign`
    pub campaign: Option<String>,
    /// `utm_content`
    pub content: Option<String>,
    /// `utm_term`
    pub term: Option<String>,
}

/// A raw form submission
///
/// Submissions are never mutated after construction; every later stage
/// derives new values from them.
#[derive(Debug, Clone, PartialEq)]
pub struct Submission {
    /// Idempotency key
    pub id: SubmissionId,

    /// Form this submission was posted to
    pub form_id: String,

    /// Submitted values keyed by field id
    pub field_values: HashMap<String, FieldValue>,

    /// Campaign tracking parameters
    pub utm: UtmParams,

    /// HTTP referrer, passed through to the lead origin unchanged
    pub referrer: Option<String>,

    /// Page the visitor landed on, passed through unchanged
    pub landing_page: Option<String>,

    /// Client IP address used for the best-effort geo lookup
    pub client_ip: Option<String>,

    /// Client user agent
    pub user_agent: Option<String>,

    /// When the submission was received (ms since epoch)
    pub timestamp: u64,
}

impl Submission {
    /// Create a submission with no tracking metadata
    pub fn new(form_id: impl Into<String>, timestamp: u64) -> Self {
        Self {
            id: SubmissionId::new(),
            form_id: form_id.into(),
            field_values: HashMap::new(),
            utm: UtmParams::default(),
            referrer: None,
            landing_page: None,
            client_ip: None,
            user_agent: None,
            timestamp,
        }
    }

    /// Add a field value (builder style)
    pub fn with_field(mut self, field_id: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.field_values.insert(field_id.into(), value.into());
        self
    }

    /// Replace the UTM parameters (builder style)
    pub fn with_utm(mut self, utm: UtmParams) -> Self {
        self.utm = utm;
        self
    }

    /// Look up a field value, treating empty text as absent
    pub fn value(&self, field_id: &str) -> Option<&FieldValue> {
        self.field_values.get(field_id).filter(|v| !v.is_empty())
    }
}
