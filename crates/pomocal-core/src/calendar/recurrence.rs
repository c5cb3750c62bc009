//! Recurrence expansion.
//!
//! Materializes the occurrences of a master event between its own start and
//! its `end_repetition` (inclusive). Expansion is a pure function of the
//! master; persisting the result is the caller's job.
//!
//! Month-based rules remember the master's day of month. When the target month
//! is shorter the occurrence is clamped to that month's last day, and later
//! months return to the original day:
//!
//! ```text
//! Jan 31 -> Feb 29 (2024) -> Mar 31 -> Apr 30 -> May 31
//! ```

use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc};

use super::event::{Event, Repetition};

/// Generate the child occurrences of `master`.
///
/// Returns an empty list when the master does not repeat or has no
/// `end_repetition`. The master itself is never part of the result.
pub fn expand(master: &Event) -> Vec<Event> {
    let Some(until) = master.end_repetition else {
        return Vec::new();
    };
    occurrence_windows(master.repetition, master.start, master.end, until)
        .into_iter()
        .map(|(start, end)| master.occurrence(start, end))
        .collect()
}

/// The `(start, end)` pairs following `start`/`end` under `rule`, up to and
/// including `until`.
///
/// Each occurrence keeps the master's duration.
pub fn occurrence_windows(
    rule: Repetition,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    until: DateTime<Utc>,
) -> Vec<(DateTime<Utc>, DateTime<Utc>)> {
    if !rule.is_repeating() {
        return Vec::new();
    }

    let length = end - start;
    let mut windows = Vec::new();
    let mut step: u32 = 1;

    while let Some(next_start) = nth_start(rule, start, step) {
        if next_start > until {
            break;
        }
        windows.push((next_start, next_start + length));
        step += 1;
    }

    windows
}

/// Start of the `n`-th occurrence after `start`.
///
/// Always computed from the master so clamped months do not drift the day of
/// month for the rest of the series.
fn nth_start(rule: Repetition, start: DateTime<Utc>, n: u32) -> Option<DateTime<Utc>> {
    match rule {
        Repetition::NoRepetition => None,
        Repetition::Daily => start.checked_add_signed(Duration::days(i64::from(n))),
        Repetition::Weekly => start.checked_add_signed(Duration::days(7 * i64::from(n))),
        Repetition::Monthly => shift_months(start, n),
        Repetition::Yearly => shift_months(start, n.checked_mul(12)?),
    }
}

/// Move `start` forward by whole calendar months, clamping the day of month.
fn shift_months(start: DateTime<Utc>, months: u32) -> Option<DateTime<Utc>> {
    let months = i32::try_from(months).ok()?;
    let index = start.year().checked_mul(12)? + start.month0() as i32 + months;
    let year = index.div_euclid(12);
    let month = index.rem_euclid(12) as u32 + 1;
    let day = start.day().min(days_in_month(year, month));

    let date = NaiveDate::from_ymd_opt(year, month, day)?;
    Some(date.and_time(start.time()).and_utc())
}

pub fn days_in_month(year: i32, month: u32) -> u32 {
    let (next_year, next_month) = if month == 12 {
        (year + 1, 1)
    } else {
        (year, month + 1)
    };
    NaiveDate::from_ymd_opt(next_year, next_month, 1)
        .and_then(|first| first.pred_opt())
        .map(|last| last.day())
        .unwrap_or(28)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calendar::event::{EventDraft, DEFAULT_EVENT_COLOR};
    use chrono::TimeZone;
    use proptest::prelude::*;

    fn utc(y: i32, m: u32, d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, 10, 0, 0).unwrap()
    }

    fn starts(rule: Repetition, from: DateTime<Utc>, until: DateTime<Utc>) -> Vec<DateTime<Utc>> {
        occurrence_windows(rule, from, from, until)
            .into_iter()
            .map(|(s, _)| s)
            .collect()
    }

    #[test]
    fn weekly_includes_end_boundary() {
        let got = starts(Repetition::Weekly, utc(2024, 1, 1), utc(2024, 1, 22));
        assert_eq!(got, vec![utc(2024, 1, 8), utc(2024, 1, 15), utc(2024, 1, 22)]);
    }

    #[test]
    fn daily_stops_before_until() {
        let until = Utc.with_ymd_and_hms(2024, 1, 4, 9, 59, 59).unwrap();
        let got = starts(Repetition::Daily, utc(2024, 1, 1), until);
        assert_eq!(got, vec![utc(2024, 1, 2), utc(2024, 1, 3)]);
    }

    #[test]
    fn monthly_clamps_to_leap_february() {
        let got = starts(Repetition::Monthly, utc(2024, 1, 31), utc(2024, 5, 31));
        assert_eq!(
            got,
            vec![utc(2024, 2, 29), utc(2024, 3, 31), utc(2024, 4, 30), utc(2024, 5, 31)]
        );
    }

    #[test]
    fn monthly_clamps_to_common_february() {
        let got = starts(Repetition::Monthly, utc(2023, 1, 31), utc(2023, 3, 1));
        assert_eq!(got, vec![utc(2023, 2, 28)]);
    }

    #[test]
    fn monthly_crosses_year_boundary() {
        let got = starts(Repetition::Monthly, utc(2023, 11, 30), utc(2024, 2, 29));
        assert_eq!(got, vec![utc(2023, 12, 30), utc(2024, 1, 30), utc(2024, 2, 29)]);
    }

    #[test]
    fn yearly_keeps_leap_day_when_possible() {
        let got = starts(Repetition::Yearly, utc(2024, 2, 29), utc(2028, 12, 31));
        assert_eq!(
            got,
            vec![utc(2025, 2, 28), utc(2026, 2, 28), utc(2027, 2, 28), utc(2028, 2, 29)]
        );
    }

    #[test]
    fn occurrences_keep_master_length() {
        let start = utc(2024, 1, 31);
        let end = start + Duration::hours(26);
        let windows = occurrence_windows(Repetition::Monthly, start, end, utc(2024, 2, 29));
        assert_eq!(windows, vec![(utc(2024, 2, 29), utc(2024, 2, 29) + Duration::hours(26))]);
    }

    #[test]
    fn nothing_to_expand() {
        assert!(starts(Repetition::NoRepetition, utc(2024, 1, 1), utc(2025, 1, 1)).is_empty());
        assert!(starts(Repetition::Daily, utc(2024, 1, 10), utc(2024, 1, 1)).is_empty());
        assert!(starts(Repetition::Daily, utc(2024, 1, 10), utc(2024, 1, 10)).is_empty());
    }

    #[test]
    fn expand_builds_children_of_master() {
        let master = EventDraft::new("Review", utc(2024, 1, 1), utc(2024, 1, 1))
            .repeating(Repetition::Weekly, utc(2024, 1, 22))
            .into_event("owner", DEFAULT_EVENT_COLOR);
        let children = expand(&master);

        assert_eq!(children.len(), 3);
        assert!(children
            .iter()
            .all(|c| c.parent_event.as_deref() == Some(master.id.as_str())));
        assert!(children.iter().all(|c| c.id != master.id));
    }

    #[test]
    fn days_in_month_handles_leap_years() {
        assert_eq!(days_in_month(2024, 2), 29);
        assert_eq!(days_in_month(2023, 2), 28);
        assert_eq!(days_in_month(1900, 2), 28);
        assert_eq!(days_in_month(2000, 2), 29);
        assert_eq!(days_in_month(2024, 12), 31);
    }

    fn any_rule() -> impl Strategy<Value = Repetition> {
        prop_oneof![
            Just(Repetition::Daily),
            Just(Repetition::Weekly),
            Just(Repetition::Monthly),
            Just(Repetition::Yearly),
        ]
    }

    proptest! {
        #[test]
        fn never_passes_end_repetition(
            rule in any_rule(),
            start_secs in 946_684_800i64..4_102_444_800i64,
            span_secs in 0i64..(3 * 366 * 86_400),
            length_secs in 0i64..(3 * 86_400),
        ) {
            let start = DateTime::from_timestamp(start_secs, 0).unwrap();
            let until = start + Duration::seconds(span_secs);
            let end = start + Duration::seconds(length_secs);
            let windows = occurrence_windows(rule, start, end, until);

            let mut previous = start;
            for (s, e) in windows {
                prop_assert!(s <= until);
                prop_assert!(s > previous);
                prop_assert_eq!(e - s, end - start);
                previous = s;
            }
        }

        #[test]
        fn monthly_day_never_exceeds_original(
            day in 1u32..=31,
            month in 1u32..=12,
            span_months in 1u32..40,
        ) {
            let day = day.min(days_in_month(2023, month));
            let start = Utc.with_ymd_and_hms(2023, month, day, 8, 0, 0).unwrap();
            let until = shift_months(start, span_months).unwrap();
            for (s, _) in occurrence_windows(Repetition::Monthly, start, start, until) {
                prop_assert!(s.day() <= day);
                prop_assert!(s.day() == day || s.day() == days_in_month(s.year(), s.month()));
            }
        }
    }
}
