//! Worked-hours aggregation.
//!
//! Check-in/check-out events for one student are paired and the durations
//! are bucketed into the current week, month or year as seen from the
//! configured local offset. Everything here is a pure function of the
//! events, the reference instant and the [`TimePolicy`].

use crate::errors::AggregateError;
use crate::models::{
    AttendanceEvent, AttendanceKind, AttendanceRecord, BucketedDuration, Granularity,
};
use chrono::{
    DateTime, Datelike, Days, Duration, FixedOffset, Months, NaiveDate, NaiveDateTime, NaiveTime,
    Offset, Utc, Weekday,
};
use tracing::warn;

const MILLIS_PER_HOUR: f64 = 3_600_000.0;

/// Local-time convention shared by every aggregation: timestamps are stored
/// in UTC and bucketed in `offset`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimePolicy {
    pub offset: FixedOffset,
    pub week_start: Weekday,
}

impl Default for TimePolicy {
    fn default() -> Self {
        Self {
            offset: FixedOffset::east_opt(9 * 3600).unwrap_or(Utc.fix()),
            week_start: Weekday::Mon,
        }
    }
}

impl TimePolicy {
    pub fn local_date(&self, at: DateTime<Utc>) -> NaiveDate {
        at.with_timezone(&self.offset).date_naive()
    }

    /// UTC instant of local midnight at the start of `date`.
    pub fn start_of(&self, date: NaiveDate) -> DateTime<Utc> {
        let shift = Duration::seconds(i64::from(self.offset.local_minus_utc()));
        (date.and_time(NaiveTime::MIN) - shift).and_utc()
    }

    pub fn week_start_date(&self, date: NaiveDate) -> NaiveDate {
        let back = (7 + date.weekday().num_days_from_monday()
            - self.week_start.num_days_from_monday())
            % 7;
        date - Days::new(u64::from(back))
    }

    /// Earliest instant any granularity looks at for `now`: the week may
    /// begin in the previous year.
    pub fn fetch_since(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        let week = Frame::new(now, Granularity::Weekly, self).start;
        week.min(self.start_of_year(now))
    }

    pub fn start_of_today(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        self.start_of(self.local_date(now))
    }

    /// Local midnight on January 1 of the year containing `now`.
    pub fn start_of_year(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        Frame::new(now, Granularity::Yearly, self).start
    }
}

/// One granularity's period and bucket layout around a reference instant.
struct Frame<'a> {
    granularity: Granularity,
    policy: &'a TimePolicy,
    first_day: NaiveDate,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    keys: Vec<String>,
}

impl<'a> Frame<'a> {
    fn new(now: DateTime<Utc>, granularity: Granularity, policy: &'a TimePolicy) -> Self {
        let today = policy.local_date(now);
        let (first_day, next_first_day) = match granularity {
            Granularity::Weekly => {
                let start = policy.week_start_date(today);
                (start, start + Days::new(7))
            }
            Granularity::Monthly => {
                let start = today - Days::new(u64::from(today.day0()));
                (start, start + Months::new(1))
            }
            Granularity::Yearly => {
                let start = today - Days::new(u64::from(today.ordinal0()));
                (start, start + Months::new(12))
            }
        };

        let keys = match granularity {
            Granularity::Weekly => {
                let mut day = policy.week_start;
                let mut keys = Vec::with_capacity(7);
                for _ in 0..7 {
                    keys.push(day.to_string());
                    day = day.succ();
                }
                keys
            }
            Granularity::Monthly => {
                let days = (next_first_day - first_day).num_days();
                (1..=days).map(|day| day.to_string()).collect()
            }
            Granularity::Yearly => (1..=12).map(|month| month.to_string()).collect(),
        };

        Self {
            granularity,
            policy,
            first_day,
            start: policy.start_of(first_day),
            end: policy.start_of(next_first_day),
            keys,
        }
    }

    fn contains(&self, at: DateTime<Utc>) -> bool {
        at >= self.start && at < self.end
    }

    fn bucket_of(&self, at: DateTime<Utc>) -> usize {
        let date = self.policy.local_date(at);
        match self.granularity {
            Granularity::Weekly => (date - self.first_day).num_days().max(0) as usize,
            Granularity::Monthly => date.day0() as usize,
            Granularity::Yearly => date.month0() as usize,
        }
    }
}

/// Pairing walk state.
#[derive(Debug, Clone, Copy)]
enum Walk {
    Idle,
    AwaitingCheckOut(DateTime<Utc>),
}

/// Worked hours per bucket for the period containing `now`.
///
/// Every bucket of the granularity is present, in canonical order, even
/// when no event falls into it. Events may be given in any order.
pub fn aggregate(
    events: &[AttendanceEvent],
    now: DateTime<Utc>,
    granularity: Granularity,
    policy: &TimePolicy,
) -> Vec<BucketedDuration> {
    let frame = Frame::new(now, granularity, policy);

    let mut in_period: Vec<&AttendanceEvent> = events
        .iter()
        .filter(|event| frame.contains(event.occurred_at))
        .collect();
    // check-ins sort before check-outs at the same instant so ties do not
    // depend on input order
    in_period.sort_by_key(|event| (event.occurred_at, event.kind == AttendanceKind::CheckOut));

    let mut hours = vec![0.0_f64; frame.keys.len()];
    let mut state = Walk::Idle;
    for event in in_period {
        state = match (state, event.kind) {
            (_, AttendanceKind::CheckIn) => Walk::AwaitingCheckOut(event.occurred_at),
            (Walk::AwaitingCheckOut(started), AttendanceKind::CheckOut) => {
                let millis = (event.occurred_at - started).num_milliseconds();
                if let Some(slot) = hours.get_mut(frame.bucket_of(started)) {
                    *slot += millis as f64 / MILLIS_PER_HOUR;
                }
                Walk::Idle
            }
            (Walk::Idle, AttendanceKind::CheckOut) => Walk::Idle,
        };
    }

    frame
        .keys
        .into_iter()
        .zip(hours)
        .map(|(bucket_key, hours)| BucketedDuration { bucket_key, hours })
        .collect()
}

#[derive(Debug, Clone, PartialEq)]
pub struct AttendanceSeries {
    pub weekly: Vec<BucketedDuration>,
    pub monthly: Vec<BucketedDuration>,
    pub yearly: Vec<BucketedDuration>,
}

pub fn aggregate_all(
    events: &[AttendanceEvent],
    now: DateTime<Utc>,
    policy: &TimePolicy,
) -> AttendanceSeries {
    AttendanceSeries {
        weekly: aggregate(events, now, Granularity::Weekly, policy),
        monthly: aggregate(events, now, Granularity::Monthly, policy),
        yearly: aggregate(events, now, Granularity::Yearly, policy),
    }
}

/// Parses a stored timestamp. RFC 3339 is preferred; values without an
/// offset are read as UTC.
pub fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, chrono::ParseError> {
    let raw = raw.trim();
    if let Ok(at) = DateTime::parse_from_rfc3339(raw) {
        return Ok(at.with_timezone(&Utc));
    }
    if let Ok(at) = DateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f%#z") {
        return Ok(at.with_timezone(&Utc));
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f") {
        return Ok(naive.and_utc());
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f").map(|naive| naive.and_utc())
}

impl TryFrom<&AttendanceRecord> for AttendanceEvent {
    type Error = AggregateError;

    fn try_from(record: &AttendanceRecord) -> Result<Self, Self::Error> {
        let occurred_at =
            parse_timestamp(&record.time).map_err(|source| AggregateError::InvalidTimestamp {
                record_id: record.id,
                value: record.time.clone(),
                source,
            })?;
        Ok(AttendanceEvent {
            subject_id: record.student_id,
            kind: record.kind,
            occurred_at,
        })
    }
}

/// Converts stored rows into events, setting aside rows whose timestamp
/// does not parse.
pub fn parse_records(records: &[AttendanceRecord]) -> (Vec<AttendanceEvent>, Vec<AggregateError>) {
    let mut events = Vec::with_capacity(records.len());
    let mut rejected = Vec::new();
    for record in records {
        match AttendanceEvent::try_from(record) {
            Ok(event) => events.push(event),
            Err(err) => {
                warn!("excluding attendance record from aggregation: {err}");
                rejected.push(err);
            }
        }
    }
    (events, rejected)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn policy() -> TimePolicy {
        TimePolicy::default()
    }

    /// Local (+09:00) wall-clock time as a UTC instant.
    fn local(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Utc> {
        FixedOffset::east_opt(9 * 3600)
            .unwrap()
            .with_ymd_and_hms(y, m, d, h, min, 0)
            .unwrap()
            .with_timezone(&Utc)
    }

    fn event(kind: AttendanceKind, at: DateTime<Utc>) -> AttendanceEvent {
        AttendanceEvent {
            subject_id: 1,
            kind,
            occurred_at: at,
        }
    }

    fn check_in(at: DateTime<Utc>) -> AttendanceEvent {
        event(AttendanceKind::CheckIn, at)
    }

    fn check_out(at: DateTime<Utc>) -> AttendanceEvent {
        event(AttendanceKind::CheckOut, at)
    }

    fn total(buckets: &[BucketedDuration]) -> f64 {
        buckets.iter().map(|bucket| bucket.hours).sum()
    }

    // Wednesday 2026-10-14, week starts Monday 2026-10-12.
    fn now() -> DateTime<Utc> {
        local(2026, 10, 14, 12, 0)
    }

    #[test]
    fn empty_input_is_zero_filled() {
        let series = aggregate_all(&[], now(), &policy());
        assert_eq!(series.weekly.len(), 7);
        assert_eq!(series.monthly.len(), 31);
        assert_eq!(series.yearly.len(), 12);
        assert!(series.weekly.iter().all(|bucket| bucket.hours == 0.0));
        assert_eq!(series.weekly[0].bucket_key, "Mon");
        assert_eq!(series.weekly[6].bucket_key, "Sun");
        assert_eq!(series.monthly[30].bucket_key, "31");
        assert_eq!(series.yearly[0].bucket_key, "1");
    }

    #[test]
    fn monthly_bucket_count_follows_month_length() {
        let feb = aggregate(&[], local(2026, 2, 10, 8, 0), Granularity::Monthly, &policy());
        assert_eq!(feb.len(), 28);
        let leap = aggregate(&[], local(2028, 2, 10, 8, 0), Granularity::Monthly, &policy());
        assert_eq!(leap.len(), 29);
        let april = aggregate(&[], local(2026, 4, 30, 23, 59), Granularity::Monthly, &policy());
        assert_eq!(april.len(), 30);
    }

    #[test]
    fn monday_pair_lands_on_monday() {
        let events = [
            check_in(local(2026, 10, 12, 9, 0)),
            check_out(local(2026, 10, 12, 17, 0)),
        ];
        let weekly = aggregate(&events, now(), Granularity::Weekly, &policy());
        assert_eq!(weekly[0].bucket_key, "Mon");
        assert_eq!(weekly[0].hours, 8.0);
        assert!(weekly[1..].iter().all(|bucket| bucket.hours == 0.0));

        let monthly = aggregate(&events, now(), Granularity::Monthly, &policy());
        assert_eq!(monthly[11].hours, 8.0);
        let yearly = aggregate(&events, now(), Granularity::Yearly, &policy());
        assert_eq!(yearly[9].hours, 8.0);
    }

    #[test]
    fn orphan_check_out_is_ignored() {
        let events = [check_out(local(2026, 10, 13, 10, 0))];
        let series = aggregate_all(&events, now(), &policy());
        assert_eq!(total(&series.weekly), 0.0);
        assert_eq!(total(&series.monthly), 0.0);
        assert_eq!(total(&series.yearly), 0.0);
    }

    #[test]
    fn later_duplicate_check_in_wins() {
        let events = [
            check_in(local(2026, 10, 13, 9, 0)),
            check_in(local(2026, 10, 13, 11, 0)),
            check_out(local(2026, 10, 13, 12, 0)),
        ];
        let weekly = aggregate(&events, now(), Granularity::Weekly, &policy());
        assert_eq!(weekly[1].hours, 1.0);
        assert_eq!(total(&weekly), 1.0);
    }

    #[test]
    fn trailing_check_in_contributes_nothing() {
        let events = [
            check_in(local(2026, 10, 13, 9, 0)),
            check_out(local(2026, 10, 13, 10, 30)),
            check_in(local(2026, 10, 14, 9, 0)),
        ];
        let weekly = aggregate(&events, now(), Granularity::Weekly, &policy());
        assert_eq!(weekly[1].hours, 1.5);
        assert_eq!(weekly[2].hours, 0.0);
    }

    #[test]
    fn previous_month_pair_is_excluded() {
        let events = [
            check_in(local(2026, 9, 30, 9, 0)),
            check_out(local(2026, 9, 30, 18, 0)),
            check_in(local(2026, 10, 1, 9, 0)),
            check_out(local(2026, 10, 1, 10, 0)),
        ];
        let monthly = aggregate(&events, now(), Granularity::Monthly, &policy());
        assert_eq!(total(&monthly), 1.0);
        assert_eq!(monthly[0].hours, 1.0);

        let yearly = aggregate(&events, now(), Granularity::Yearly, &policy());
        assert_eq!(yearly[8].hours, 9.0);
        assert_eq!(yearly[9].hours, 1.0);
    }

    #[test]
    fn period_boundaries_use_local_offset() {
        // 2026-10-11 23:30 local is still Sunday of the previous week even
        // though it is 14:30 UTC.
        let events = [
            check_in(local(2026, 10, 11, 23, 30)),
            check_out(local(2026, 10, 12, 0, 30)),
            check_in(local(2026, 10, 12, 0, 45)),
            check_out(local(2026, 10, 12, 1, 45)),
        ];
        let weekly = aggregate(&events, now(), Granularity::Weekly, &policy());
        assert_eq!(weekly[0].hours, 1.0);
        assert_eq!(total(&weekly), 1.0);
    }

    #[test]
    fn sunday_first_weeks_reorder_keys() {
        let policy = TimePolicy {
            week_start: Weekday::Sun,
            ..TimePolicy::default()
        };
        let events = [
            check_in(local(2026, 10, 11, 10, 0)),
            check_out(local(2026, 10, 11, 12, 0)),
        ];
        let weekly = aggregate(&events, now(), Granularity::Weekly, &policy);
        assert_eq!(weekly[0].bucket_key, "Sun");
        assert_eq!(weekly[0].hours, 2.0);
        assert_eq!(weekly[6].bucket_key, "Sat");
    }

    #[test]
    fn shuffled_input_matches_sorted_input() {
        let sorted = vec![
            check_in(local(2026, 10, 12, 9, 0)),
            check_out(local(2026, 10, 12, 12, 0)),
            check_in(local(2026, 10, 12, 13, 0)),
            check_out(local(2026, 10, 12, 18, 15)),
            check_in(local(2026, 10, 14, 8, 0)),
            check_out(local(2026, 10, 14, 11, 0)),
        ];
        let mut shuffled = sorted.clone();
        shuffled.reverse();
        shuffled.swap(0, 3);

        let expected = aggregate_all(&sorted, now(), &policy());
        assert_eq!(aggregate_all(&shuffled, now(), &policy()), expected);
        assert_eq!(expected.weekly[0].hours, 8.25);
        assert_eq!(expected.weekly[2].hours, 3.0);
    }

    #[test]
    fn repeated_calls_are_identical() {
        let events = [
            check_in(local(2026, 10, 12, 9, 0)),
            check_out(local(2026, 10, 12, 9, 20)),
        ];
        let first = aggregate_all(&events, now(), &policy());
        let second = aggregate_all(&events, now(), &policy());
        assert_eq!(first, second);
    }

    #[test]
    fn fetch_since_covers_week_crossing_new_year() {
        // Friday 2027-01-01; the week began Monday 2026-12-28.
        let now = local(2027, 1, 1, 12, 0);
        assert_eq!(policy().fetch_since(now), local(2026, 12, 28, 0, 0));
        assert_eq!(policy().start_of_year(now), local(2027, 1, 1, 0, 0));
        let later = local(2027, 3, 3, 12, 0);
        assert_eq!(policy().fetch_since(later), local(2027, 1, 1, 0, 0));
    }

    #[test]
    fn parse_timestamp_accepts_common_shapes() {
        let expected = Utc.with_ymd_and_hms(2026, 10, 12, 0, 0, 0).unwrap();
        assert_eq!(parse_timestamp("2026-10-12T00:00:00.000Z").unwrap(), expected);
        assert_eq!(parse_timestamp("2026-10-12T09:00:00+09:00").unwrap(), expected);
        assert_eq!(parse_timestamp("2026-10-12 09:00:00+09").unwrap(), expected);
        assert_eq!(parse_timestamp("2026-10-12T00:00:00").unwrap(), expected);
        assert_eq!(
            parse_timestamp("2026-10-12 00:00:00.5").unwrap(),
            expected + Duration::milliseconds(500)
        );
        assert!(parse_timestamp("yesterday").is_err());
    }

    #[test]
    fn invalid_timestamps_are_set_aside() {
        let records = vec![
            AttendanceRecord {
                id: 1,
                student_id: 7,
                kind: AttendanceKind::CheckIn,
                time: "2026-10-12T00:00:00Z".into(),
            },
            AttendanceRecord {
                id: 2,
                student_id: 7,
                kind: AttendanceKind::CheckOut,
                time: "not a time".into(),
            },
            AttendanceRecord {
                id: 3,
                student_id: 7,
                kind: AttendanceKind::CheckOut,
                time: "2026-10-12T02:00:00Z".into(),
            },
        ];
        let (events, rejected) = parse_records(&records);
        assert_eq!(events.len(), 2);
        assert_eq!(rejected.len(), 1);
        assert!(matches!(
            rejected[0],
            AggregateError::InvalidTimestamp { record_id: 2, .. }
        ));

        let weekly = aggregate(&events, now(), Granularity::Weekly, &policy());
        assert_eq!(weekly[0].hours, 2.0);
    }

    #[test]
    fn fully_malformed_input_still_zero_fills() {
        let records = vec![AttendanceRecord {
            id: 1,
            student_id: 7,
            kind: AttendanceKind::CheckIn,
            time: "??".into(),
        }];
        let (events, rejected) = parse_records(&records);
        assert!(events.is_empty());
        assert_eq!(rejected.len(), 1);
        let series = aggregate_all(&events, now(), &policy());
        assert_eq!(series.weekly.len(), 7);
        assert_eq!(series.yearly.len(), 12);
    }
}
