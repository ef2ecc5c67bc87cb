//! Error types for CodeCapsule Core.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Core errors for parsing identifiers and enumerations.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("invalid capsule id: {0}")]
    InvalidCapsuleId(String),

    #[error("unknown access mode: {0}")]
    UnknownAccessMode(String),

    #[error("timestamp out of range: {0}")]
    TimestampOutOfRange(i64),
}

/// A single problem with one input field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldIssue {
    /// Name of the offending field, as the caller submitted it.
    pub field: String,
    /// Human-readable description.
    pub message: String,
}

impl FieldIssue {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for FieldIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Malformed input, reported field by field.
///
/// All problems found in one pass are collected so that the boundary can
/// return a complete report instead of one issue at a time.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("validation failed: {}", join_issues(.issues))]
pub struct ValidationError {
    pub issues: Vec<FieldIssue>,
}

impl ValidationError {
    /// A report with a single issue.
    pub fn single(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            issues: vec![FieldIssue::new(field, message)],
        }
    }

    /// Whether any issue concerns the given field.
    pub fn has_field(&self, field: &str) -> bool {
        self.issues.iter().any(|i| i.field == field)
    }

    /// Turn a list of issues into a result.
    pub fn check(issues: Vec<FieldIssue>) -> Result<(), Self> {
        if issues.is_empty() {
            Ok(())
        } else {
            Err(Self { issues })
        }
    }
}

fn join_issues(issues: &[FieldIssue]) -> String {
    issues
        .iter()
        .map(|i| i.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}
