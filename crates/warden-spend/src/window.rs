//! Calendar-window labels.
//!
//! Spend is keyed by the wall-clock hour and day an entry lands in, not by
//! a rolling lookback. Two entries share a window exactly when their labels
//! are equal, which makes the accounting auditable by eye and matches how
//! the hourly/daily caps in `TreasuryPolicy` are expressed.

use chrono::{DateTime, Utc};

/// Label of the wall-clock hour containing `ts`, e.g. `"2026-08-05T14"`.
pub fn hour_label(ts: DateTime<Utc>) -> String {
    ts.format("%Y-%m-%dT%H").to_string()
}

/// Label of the wall-clock day containing `ts`, e.g. `"2026-08-05"`.
pub fn day_label(ts: DateTime<Utc>) -> String {
    ts.format("%Y-%m-%d").to_string()
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    #[test]
    fn labels_align_to_calendar_boundaries() {
        let before = Utc.with_ymd_and_hms(2026, 8, 5, 13, 59, 59).unwrap();
        let after = Utc.with_ymd_and_hms(2026, 8, 5, 14, 0, 0).unwrap();

        assert_eq!(hour_label(before), "2026-08-05T13");
        assert_eq!(hour_label(after), "2026-08-05T14");
        // Same day either side of the hour boundary.
        assert_eq!(day_label(before), day_label(after));

        let next_day = Utc.with_ymd_and_hms(2026, 8, 6, 0, 0, 0).unwrap();
        assert_ne!(day_label(after), day_label(next_day));
    }
}
