//! Creation-time validation.
//!
//! Everything here is a caller-side bound. The envelope codec itself imposes
//! no payload limits.

use chrono::{DateTime, FixedOffset, TimeZone, Utc};

use crate::capsule::NewCapsule;
use crate::error::{CoreError, FieldIssue, ValidationError};
use crate::types::AccessMode;

/// Minimum passphrase length accepted by the sealing client.
pub const MIN_PASSPHRASE_LEN: usize = 8;

/// Length bounds for capsule fields, in characters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Limits {
    pub title_max: usize,
    pub description_max: usize,
    pub note_max: usize,
    pub hint_max: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            title_max: 100,
            description_max: 500,
            note_max: 2000,
            hint_max: 100,
        }
    }
}

/// Start of the calendar day after `now`, in the reference timezone.
///
/// This is the earliest unlock date a new capsule may carry.
pub fn earliest_unlock_date(now: i64, offset: FixedOffset) -> Result<i64, CoreError> {
    let local = DateTime::<Utc>::from_timestamp_millis(now)
        .ok_or(CoreError::TimestampOutOfRange(now))?
        .with_timezone(&offset);
    let midnight = local
        .date_naive()
        .succ_opt()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .ok_or(CoreError::TimestampOutOfRange(now))?;
    offset
        .from_local_datetime(&midnight)
        .single()
        .map(|dt| dt.timestamp_millis())
        .ok_or(CoreError::TimestampOutOfRange(now))
}

/// Validate creation input, collecting every issue.
pub fn validate_new_capsule(
    draft: &NewCapsule,
    now: i64,
    offset: FixedOffset,
    limits: &Limits,
) -> Result<(), ValidationError> {
    let mut issues = Vec::new();

    if draft.title.trim().is_empty() {
        issues.push(FieldIssue::new("title", "must not be empty"));
    } else if too_long(&draft.title, limits.title_max) {
        issues.push(FieldIssue::new(
            "title",
            format!("must be at most {} characters", limits.title_max),
        ));
    }

    check_optional(&mut issues, "description", &draft.description, limits.description_max);
    check_optional(&mut issues, "note", &draft.note, limits.note_max);
    check_optional(&mut issues, "passphraseHint", &draft.passphrase_hint, limits.hint_max);

    if draft.envelope.trim().is_empty() {
        issues.push(FieldIssue::new("envelope", "must not be empty"));
    }

    match earliest_unlock_date(now, offset) {
        Ok(earliest) if draft.unlock_date >= earliest => {}
        Ok(_) => issues.push(FieldIssue::new("unlockDate", "must be at least tomorrow")),
        Err(e) => issues.push(FieldIssue::new("unlockDate", e.to_string())),
    }

    if draft.access_mode == AccessMode::Shared {
        for (i, recipient) in draft.shared_with.iter().enumerate() {
            if !is_valid_email(recipient) {
                issues.push(FieldIssue::new(
                    format!("sharedWith[{i}]"),
                    "must be a valid e-mail address",
                ));
            }
        }
    }

    ValidationError::check(issues)
}

/// Client-side passphrase policy: minimum length and matching confirmation.
pub fn validate_passphrase(passphrase: &str, confirmation: &str) -> Result<(), ValidationError> {
    let mut issues = Vec::new();
    if passphrase.is_empty() {
        issues.push(FieldIssue::new("passphrase", "is required"));
    } else if passphrase.chars().count() < MIN_PASSPHRASE_LEN {
        issues.push(FieldIssue::new(
            "passphrase",
            format!("must be at least {MIN_PASSPHRASE_LEN} characters"),
        ));
    }
    if passphrase != confirmation {
        issues.push(FieldIssue::new("confirmPassphrase", "does not match"));
    }
    ValidationError::check(issues)
}

/// Syntactic e-mail check: `local@domain.tld`, no whitespace.
pub fn is_valid_email(s: &str) -> bool {
    let s = s.trim();
    if s.chars().any(char::is_whitespace) {
        return false;
    }
    let Some((local, domain)) = s.split_once('@') else {
        return false;
    };
    if local.is_empty() || domain.contains('@') {
        return false;
    }
    let labels: Vec<&str> = domain.split('.').collect();
    labels.len() >= 2 && labels.iter().all(|l| !l.is_empty())
}

fn too_long(value: &str, max: usize) -> bool {
    value.chars().count() > max
}

fn check_optional(issues: &mut Vec<FieldIssue>, field: &str, value: &Option<String>, max: usize) {
    if let Some(v) = value {
        if too_long(v, max) {
            issues.push(FieldIssue::new(
                field,
                format!("must be at most {max} characters"),
            ));
        }
    }
}
