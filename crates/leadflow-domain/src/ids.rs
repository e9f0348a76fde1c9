//! Identifier types

use std::fmt;

/// Unique identifier for a lead based on UUIDv7
///
/// UUIDv7 keeps lead ids chronologically sortable, which the store relies on
/// for stable listing order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct LeadId(u128);

impl LeadId {
    /// Generate a new UUIDv7-based LeadId
    ///
    /// # Examples
    ///
    /// ```
    /// use leadflow_domain::LeadId;
    ///
    /// let id = LeadId::new();
    /// assert!(id.value() > 0);
    /// ```
    pub fn new() -> Self {
        Self(uuid::Uuid::now_v7().as_u128())
    }

    /// Create a LeadId from a raw u128 value (storage deserialization)
    pub fn from_value(value: u128) -> Self {
        Self(value)
    }

    /// Parse a LeadId from its hyphenated string form
    ///
    /// # Examples
    ///
    /// ```
    /// use leadflow_domain::LeadId;
    ///
    /// let id = LeadId::new();
    /// let parsed = LeadId::from_string(&id.to_string()).unwrap();
    /// assert_eq!(id, parsed);
    /// ```
    pub fn from_string(s: &str) -> Result<Self, String> {
        uuid::Uuid::parse_str(s)
            .map(|u| Self(u.as_u128()))
            .map_err(|e| format!("Invalid lead id: {}", e))
    }

    /// Get the raw u128 value
    pub fn value(&self) -> u128 {
        self.0
    }
}

impl Default for LeadId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for LeadId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", uuid::Uuid::from_u128(self.0))
    }
}

/// Identifier of an inbound submission
///
/// Clients may supply their own (any UUID version); the submission id is the
/// idempotency key that prevents a retried submission from consuming a second
/// rotation slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubmissionId(uuid::Uuid);

impl SubmissionId {
    /// Generate a fresh random submission id
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4())
    }

    /// Parse a submission id from a UUID string
    pub fn from_string(s: &str) -> Result<Self, String> {
        uuid::Uuid::parse_str(s)
            .map(Self)
            .map_err(|e| format!("Invalid submission id: {}", e))
    }
}

impl Default for SubmissionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SubmissionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lead_id_chronological() {
        let id1 = LeadId::new();
        std::thread::sleep(std::time::Duration::from_millis(2));
        let id2 = LeadId::new();

        assert!(id1 < id2, "Earlier UUIDv7 should sort first");
    }

    #[test]
    fn test_lead_id_display_and_parse() {
        let id = LeadId::new();
        let id_str = id.to_string();
        assert_eq!(id_str.len(), 36);
        assert_eq!(LeadId::from_string(&id_str).unwrap(), id);
    }

    #[test]
    fn test_invalid_ids() {
        assert!(LeadId::from_string("not-a-uuid").is_err());
        assert!(SubmissionId::from_string("").is_err());
    }

    #[test]
    fn test_submission_id_parse() {
        let raw = "6f1c2b1e-3a77-4c41-9a2e-0d7f4f0c9b11";
        let id = SubmissionId::from_string(raw).unwrap();
        assert_eq!(id.to_string(), raw);
    }
}
