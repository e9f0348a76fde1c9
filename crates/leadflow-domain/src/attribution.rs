//! Lead attribution
//!
//! Maps a form's tracking configuration plus the submission's UTM and
//! referrer data to an origin descriptor. Resolution is pure: nothing is
//! looked up or written.

use crate::Submission;
use std::collections::HashMap;

/// Origin name used when nothing more specific is known
pub const DEFAULT_ORIGIN: &str = "Website";

/// How the origin of a lead was determined
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SourceType {
    /// Tracking disabled
    Default,
    /// Derived from UTM parameters
    UtmAutomatic,
    /// Static values configured on the form
    CustomDefined,
    /// Named after the form itself
    FormBased,
}

impl SourceType {
    /// Get the source type name as stored
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceType::Default => "default",
            SourceType::UtmAutomatic => "utm_automatic",
            SourceType::CustomDefined => "custom_defined",
            SourceType::FormBased => "form_based",
        }
    }

    /// Parse a stored source type name
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "default" => Some(SourceType::Default),
            "utm_automatic" => Some(SourceType::UtmAutomatic),
            "custom_defined" => Some(SourceType::CustomDefined),
            "form_based" => Some(SourceType::FormBased),
            _ => None,
        }
    }
}

/// Static attribution values for `custom` tracking
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CustomSource {
    /// Origin name shown on the lead
    pub name: String,
    /// Source label
    pub source: Option<String>,
    /// Medium label
    pub medium: Option<String>,
    /// Campaign label
    pub campaign: Option<String>,
}

/// Tracking mode configured on a form (`lead_tracking.leadSource`)
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrackingMode {
    /// No tracking, every lead comes from "Website"
    Disabled,
    /// Derive the origin from `utm_source`
    Utm,
    /// Use fixed configured values
    Custom(CustomSource),
    /// Use the form's display name
    Form,
}

impl TrackingMode {
    /// Get the mode name as used in configuration
    pub fn as_str(&self) -> &'static str {
        match self {
            TrackingMode::Disabled => "disabled",
            TrackingMode::Utm => "utm",
            TrackingMode::Custom(_) => "custom",
            TrackingMode::Form => "form",
        }
    }
}

/// Friendly names for `utm_source` values, keyed by lowercased source
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SourceNameTable {
    names: HashMap<String, String>,
}

impl SourceNameTable {
    /// Create an empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// Table with the common ad and social networks
    pub fn builtin() -> Self {
        let mut table = Self::new();
        for (key, name) in [
            ("google", "Google Ads"),
            ("adwords", "Google Ads"),
            ("facebook", "Facebook Ads"),
            ("fb", "Facebook Ads"),
            ("instagram", "Instagram"),
            ("ig", "Instagram"),
            ("linkedin", "LinkedIn"),
            ("twitter", "Twitter"),
            ("x", "Twitter"),
            ("tiktok", "TikTok"),
            ("youtube", "YouTube"),
            ("bing", "Bing Ads"),
            ("email", "Email Marketing"),
            ("newsletter", "Email Marketing"),
            ("whatsapp", "WhatsApp"),
        ] {
            table.insert(key, name);
        }
        table
    }

    /// Add or replace a mapping; the key is lowercased
    pub fn insert(&mut self, source: &str, name: impl Into<String>) {
        self.names.insert(source.trim().to_lowercase(), name.into());
    }

    /// Merge another table on top of this one
    pub fn extend(&mut self, other: &SourceNameTable) {
        for (k, v) in &other.names {
            self.names.insert(k.clone(), v.clone());
        }
    }

    /// Look up the friendly name for a raw `utm_source`
    pub fn lookup(&self, source: &str) -> Option<&str> {
        self.names.get(&source.trim().to_lowercase()).map(String::as_str)
    }

    /// Number of mappings
    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// Whether the table has no mappings
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

/// Where a lead came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Origin {
    /// Display name of the origin
    pub name: String,
    /// How the name was determined
    pub source_type: SourceType,
    /// Source label (raw `utm_source` or custom value)
    pub source: Option<String>,
    /// Medium label
    pub medium: Option<String>,
    /// Campaign label
    pub campaign: Option<String>,
    /// `utm_content`
    pub content: Option<String>,
    /// `utm_term`
    pub term: Option<String>,
    /// Referrer, unchanged
    pub referrer: Option<String>,
    /// Landing page, unchanged
    pub landing_page: Option<String>,
}

impl Origin {
    fn bare(name: impl Into<String>, source_type: SourceType, submission: &Submission) -> Self {
        Self {
            name: name.into(),
            source_type,
            source: None,
            medium: None,
            campaign: None,
            content: None,
            term: None,
            referrer: submission.referrer.clone(),
            landing_page: submission.landing_page.clone(),
        }
    }
}

/// Resolves origins using a source-name table
#[derive(Debug, Clone, Default)]
pub struct AttributionResolver {
    source_names: SourceNameTable,
}

impl AttributionResolver {
    /// Create a resolver with the given source-name table
    pub fn new(source_names: SourceNameTable) -> Self {
        Self { source_names }
    }

    /// Get the source-name table
    pub fn source_names(&self) -> &SourceNameTable {
        &self.source_names
    }

    /// Resolve the origin of a submission
    ///
    /// # Examples
    ///
    /// ```
    /// use leadflow_domain::{AttributionResolver, SourceNameTable, SourceType, Submission, TrackingMode, UtmParams};
    ///
    /// let mut names = SourceNameTable::new();
    /// names.insert("google", "Google Ads");
    /// let resolver = AttributionResolver::new(names);
    ///
    /// let submission = Submission::new("contact", 1).with_utm(UtmParams {
    ///     source: Some("google".to_string()),
    ///     ..Default::default()
    /// });
    ///
    /// let origin = resolver.resolve(&TrackingMode::Utm, &submission, "Contact us");
    /// assert_eq!(origin.name, "Google Ads");
    /// assert_eq!(origin.source_type, SourceType::UtmAutomatic);
    /// ```
    pub fn resolve(&self, mode: &TrackingMode, submission: &Submission, form_name: &str) -> Origin {
        match mode {
            TrackingMode::Disabled => Origin::bare(DEFAULT_ORIGIN, SourceType::Default, submission),
            TrackingMode::Utm => self.resolve_utm(submission),
            TrackingMode::Custom(custom) => {
                let name = non_blank(Some(custom.name.as_str())).unwrap_or_else(|| DEFAULT_ORIGIN.to_string());
                Origin {
                    source: custom.source.clone(),
                    medium: custom.medium.clone(),
                    campaign: custom.campaign.clone(),
                    ..Origin::bare(name, SourceType::CustomDefined, submission)
                }
            }
            TrackingMode::Form => {
                let name = non_blank(Some(form_name)).unwrap_or_else(|| DEFAULT_ORIGIN.to_string());
                Origin::bare(name, SourceType::FormBased, submission)
            }
        }
    }

    fn resolve_utm(&self, submission: &Submission) -> Origin {
        let utm = &submission.utm;
        let raw_source = non_blank(utm.source.as_deref());

        let name = match raw_source.as_deref() {
            Some(source) => self
                .source_names
                .lookup(source)
                .map(str::to_string)
                .unwrap_or_else(|| source.to_string()),
            None => DEFAULT_ORIGIN.to_string(),
        };

        Origin {
            source: raw_source,
            medium: non_blank(utm.medium.as_deref()),
            campaign: non_blank(utm.campaign.as_deref()),
            content: non_blank(utm.content.as_deref()),
            term: non_blank(utm.term.as_deref()),
            ..Origin::bare(name, SourceType::UtmAutomatic, submission)
        }
    }
}

fn non_blank(value: Option<&str>) -> Option<String> {
    value.map(|v| v.trim()).filter(|v| !v.is_empty()).map(str::to_string)
}
