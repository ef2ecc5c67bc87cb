//! Unlock-date vectors.
//!
//! Known `(now, offset) -> earliest unlock date` cases. Any implementation of
//! the calendar-day policy must agree with every vector.

use chrono::FixedOffset;
use codecapsule_core::earliest_unlock_date;
use serde::{Deserialize, Serialize};

/// A single unlock-date vector.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnlockDateVector {
    pub name: String,
    pub description: String,
    /// Unix ms.
    pub now: i64,
    /// Reference timezone, minutes east of UTC.
    pub offset_minutes: i32,
    /// Start of the next local calendar day, Unix ms.
    pub earliest: i64,
}

impl UnlockDateVector {
    pub fn offset(&self) -> Option<FixedOffset> {
        FixedOffset::east_opt(self.offset_minutes * 60)
    }
}

fn vector(name: &str, description: &str, now: i64, offset_minutes: i32, earliest: i64) -> UnlockDateVector {
    UnlockDateVector {
        name: name.into(),
        description: description.into(),
        now,
        offset_minutes,
        earliest,
    }
}

/// All unlock-date vectors.
pub fn all_vectors() -> Vec<UnlockDateVector> {
    vec![
        vector(
            "utc_afternoon",
            "2024-03-15T13:45Z -> 2024-03-16T00:00Z",
            1_710_510_300_000,
            0,
            1_710_547_200_000,
        ),
        vector(
            "utc_exact_midnight",
            "midnight itself is today, so the next midnight is required",
            1_710_547_200_000,
            0,
            1_710_633_600_000,
        ),
        vector(
            "utc_last_millisecond",
            "2024-03-15T23:59:59.999Z -> 2024-03-16T00:00Z",
            1_710_547_199_999,
            0,
            1_710_547_200_000,
        ),
        vector(
            "east_offset_next_local_day",
            "+09:00, local 2024-03-16 05:00 -> local 2024-03-17 00:00",
            1_710_532_800_000,
            540,
            1_710_601_200_000,
        ),
        vector(
            "west_offset_previous_utc_day",
            "-05:00, local 2024-03-15 21:00 -> local 2024-03-16 00:00",
            1_710_554_400_000,
            -300,
            1_710_565_200_000,
        ),
        vector(
            "leap_day",
            "2024-02-28T12:00Z -> 2024-02-29T00:00Z",
            1_709_121_600_000,
            0,
            1_709_164_800_000,
        ),
        vector(
            "year_end",
            "2023-12-31T18:00Z -> 2024-01-01T00:00Z",
            1_704_045_600_000,
            0,
            1_704_067_200_000,
        ),
    ]
}

/// Check every vector. Returns the names of the ones that failed.
pub fn verify_all_vectors() -> Vec<String> {
    all_vectors()
        .into_iter()
        .filter(|v| {
            v.offset()
                .and_then(|offset| earliest_unlock_date(v.now, offset).ok())
                != Some(v.earliest)
        })
        .map(|v| v.name)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_vectors_pass() {
        let failed = verify_all_vectors();
        assert!(failed.is_empty(), "failed vectors: {failed:?}");
    }

    #[test]
    fn test_vectors_serialize() {
        let json = serde_json::to_string_pretty(&all_vectors()).unwrap();
        let back: Vec<UnlockDateVector> = serde_json::from_str(&json).unwrap();
        assert_eq!(back, all_vectors());
    }

    #[test]
    fn test_earliest_is_always_after_now() {
        for v in all_vectors() {
            assert!(v.earliest > v.now, "{}", v.name);
            assert!(v.earliest - v.now <= 86_400_000, "{}", v.name);
        }
    }
}
