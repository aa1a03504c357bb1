//! Form validation.

use std::collections::BTreeMap;

use crate::constants::MIN_FIELD_LENGTH;
use crate::dream::{FIELDS, field_label};

/// What is wrong with a single field.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum IssueKind {
    /// Absent or blank after trimming
    MissingField,
    /// Shorter than the minimum length after trimming
    TooShort,
}

impl IssueKind {
    /// Hint shown next to the offending input.
    pub fn hint(self) -> &'static str {
        match self {
            IssueKind::MissingField => "This field is required",
            IssueKind::TooShort => "Enter at least 2 characters",
        }
    }
}

/// A field that failed validation.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct FieldIssue {
    /// Field key, one of [`FIELDS`]
    pub field: &'static str,
    /// What is wrong
    pub kind: IssueKind,
}

/// Result of validating the whole form. Empty means valid.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct ValidationResult {
    /// Offending fields, in form order.
    pub issues: Vec<FieldIssue>,
}

impl ValidationResult {
    /// True when no field is offending.
    pub fn is_valid(&self) -> bool {
        self.issues.is_empty()
    }

    /// Keys of the offending fields, in form order.
    pub fn offending_fields(&self) -> Vec<&'static str> {
        self.issues.iter().map(|issue| issue.field).collect()
    }

    /// One-line message naming the offending fields by label.
    pub fn summary(&self) -> String {
        let labels = self
            .issues
            .iter()
            .map(|issue| field_label(issue.field))
            .collect::<Vec<_>>();
        format!("Please fill in these fields: {}", labels.join(", "))
    }
}

/// Checks one input value.
pub fn validate_field(value: &str) -> Option<IssueKind> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        Some(IssueKind::MissingField)
    } else if trimmed.chars().count() < MIN_FIELD_LENGTH {
        Some(IssueKind::TooShort)
    } else {
        None
    }
}

/// Checks all six required fields.
pub fn validate(fields: &BTreeMap<String, String>) -> ValidationResult {
    let issues = FIELDS
        .iter()
        .filter_map(|&field| {
            let kind = match fields.get(field) {
                Some(value) => validate_field(value)?,
                None => IssueKind::MissingField,
            };
            Some(FieldIssue { field, kind })
        })
        .collect::<Vec<_>>();
    if !issues.is_empty() {
        tracing::debug!("Form validation failed: {:?}", issues);
    }
    ValidationResult { issues }
}
