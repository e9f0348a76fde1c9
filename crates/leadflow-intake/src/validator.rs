//! Submission validation

use leadflow_domain::{FormDefinition, Submission};
use std::fmt;

/// Reasons for rejecting a submission
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RejectionReason {
    /// The submission names no form
    MissingFormId,

    /// The form is not registered
    UnknownForm(String),

    /// A required field is absent or blank
    MissingRequiredField(String),

    /// A field value is keyed by an empty id
    EmptyFieldId,

    /// The submission carries no timestamp
    MissingTimestamp,
}

impl fmt::Display for RejectionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RejectionReason::MissingFormId => write!(f, "form_id is required"),
            RejectionReason::UnknownForm(id) => write!(f, "unknown form: {}", id),
            RejectionReason::MissingRequiredField(field) => write!(f, "required field missing: {}", field),
            RejectionReason::EmptyFieldId => write!(f, "field ids cannot be empty"),
            RejectionReason::MissingTimestamp => write!(f, "timestamp is required"),
        }
    }
}

/// Checks submissions before any lead is built
#[derive(Debug, Clone, Copy, Default)]
pub struct SubmissionValidator;

impl SubmissionValidator {
    /// Create a validator
    pub fn new() -> Self {
        Self
    }

    /// Validate a submission against its form
    ///
    /// `form` is the registered definition for `submission.form_id`, if any.
    /// Returns every problem found, in a stable order; an empty list means
    /// the submission is acceptable.
    pub fn validate(&self, submission: &Submission, form: Option<&FormDefinition>) -> Vec<RejectionReason> {
        let mut reasons = Vec::new();

        if submission.form_id.trim().is_empty() {
            reasons.push(RejectionReason::MissingFormId);
        } else if form.is_none() {
            reasons.push(RejectionReason::UnknownForm(submission.form_id.clone()));
        }

        if submission.timestamp == 0 {
            reasons.push(RejectionReason::MissingTimestamp);
        }

        if submission.field_values.keys().any(|k| k.trim().is_empty()) {
            reasons.push(RejectionReason::EmptyFieldId);
        }

        if let Some(form) = form {
            for field in &form.required_fields {
                // value() already filters out blank text
                if submission.value(field).is_none() {
                    reasons.push(RejectionReason::MissingRequiredField(field.clone()));
                }
            }
        }

        reasons
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use leadflow_domain::TrackingMode;

    fn form() -> FormDefinition {
        FormDefinition {
            id: "contact".to_string(),
            name: "Contact".to_string(),
            pipeline_id: "sales".to_string(),
            tracking: TrackingMode::Disabled,
            scoring_rules: vec![],
            mql_threshold: None,
            required_fields: vec!["email".to_string(), "name".to_string()],
        }
    }

    #[test]
    fn test_valid_submission() {
        let submission = Submission::new("contact", 1)
            .with_field("email", "a@b.com")
            .with_field("name", "Ada");
        assert!(SubmissionValidator::new().validate(&submission, Some(&form())).is_empty());
    }

    #[test]
    fn test_missing_and_blank_required_fields() {
        let submission = Submission::new("contact", 1).with_field("email", "   ");
        let reasons = SubmissionValidator::new().validate(&submission, Some(&form()));
        assert_eq!(
            reasons,
            vec![
                RejectionReason::MissingRequiredField("email".to_string()),
                RejectionReason::MissingRequiredField("name".to_string()),
            ]
        );
    }

    #[test]
    fn test_non_text_values_satisfy_required() {
        let mut form = form();
        form.required_fields = vec!["budget".to_string(), "consent".to_string()];
        let submission = Submission::new("contact", 1)
            .with_field("budget", 0.0)
            .with_field("consent", false);
        assert!(SubmissionValidator::new().validate(&submission, Some(&form)).is_empty());
    }

    #[test]
    fn test_missing_form() {
        let validator = SubmissionValidator::new();

        let reasons = validator.validate(&Submission::new(" ", 1), None);
        assert_eq!(reasons, vec![RejectionReason::MissingFormId]);

        let reasons = validator.validate(&Submission::new("ghost", 1), None);
        assert_eq!(reasons, vec![RejectionReason::UnknownForm("ghost".to_string())]);
    }

    #[test]
    fn test_structural_problems() {
        let submission = Submission::new("contact", 0)
            .with_field("", "x")
            .with_field("email", "a@b.com")
            .with_field("name", "Ada");
        let reasons = SubmissionValidator::new().validate(&submission, Some(&form()));
        assert_eq!(reasons, vec![RejectionReason::MissingTimestamp, RejectionReason::EmptyFieldId]);
    }

    #[test]
    fn test_reason_messages() {
        assert_eq!(
            RejectionReason::MissingRequiredField("email".to_string()).to_string(),
            "required field missing: email"
        );
        assert_eq!(RejectionReason::UnknownForm("x".to_string()).to_string(), "unknown form: x");
    }
}
