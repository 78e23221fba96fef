use crate::errors::{AggregateError, AppError, StoreError};
use crate::models::{AttendanceKind, AttendanceRecord};
use crate::roster::find_student;
use crate::stats::parse_timestamp;
use crate::store::{Filter, Query, RecordStore, Row, Table, from_row};
use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::Value;
use std::collections::HashMap;
use tracing::{info, warn};

/// Storage form of an instant: UTC, millisecond precision.
pub fn format_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

pub async fn record_attendance(
    store: &dyn RecordStore,
    student_id: i64,
    kind: AttendanceKind,
    at: DateTime<Utc>,
) -> Result<AttendanceRecord, AppError> {
    let student = find_student(store, student_id)
        .await?
        .ok_or_else(|| AppError::not_found(format!("no student with id {student_id}")))?;

    let mut row = Row::new();
    row.insert("student_id".to_string(), Value::from(student_id));
    row.insert("kind".to_string(), Value::from(kind.as_str()));
    row.insert("time".to_string(), Value::from(format_timestamp(at)));

    let stored = store.insert(Table::Attendances, row).await?;
    let record: AttendanceRecord = from_row(Table::Attendances, stored)?;
    info!(
        student_id,
        kind = kind.as_str(),
        "recorded attendance for {}",
        student.name
    );
    Ok(record)
}

/// Decodes attendance rows one by one. Rows that do not fit
/// [`AttendanceRecord`] are logged and returned separately.
fn decode_rows(rows: Vec<Row>) -> (Vec<AttendanceRecord>, Vec<AggregateError>) {
    let mut records = Vec::with_capacity(rows.len());
    let mut malformed = Vec::new();
    for row in rows {
        let record_id = row.get("id").and_then(Value::as_i64);
        match serde_json::from_value::<AttendanceRecord>(Value::Object(row)) {
            Ok(record) => records.push(record),
            Err(source) => {
                let err = AggregateError::InvalidRow { record_id, source };
                warn!("skipping attendance row: {err}");
                malformed.push(err);
            }
        }
    }
    (records, malformed)
}

/// Every stored event of one student at or after `since`, in no particular
/// order, plus the rows that could not be decoded.
pub async fn fetch_events(
    store: &dyn RecordStore,
    subject_id: i64,
    since: DateTime<Utc>,
) -> Result<(Vec<AttendanceRecord>, Vec<AggregateError>), StoreError> {
    let rows = store
        .query(
            Table::Attendances,
            &Query::all()
                .filter(Filter::equals("student_id", subject_id))
                .filter(Filter::at_least("time", format_timestamp(since))),
        )
        .await?;
    Ok(decode_rows(rows))
}

/// Latest event kind per student at or after `since`.
pub async fn latest_kinds_since(
    store: &dyn RecordStore,
    since: DateTime<Utc>,
) -> Result<HashMap<i64, AttendanceKind>, StoreError> {
    let rows = store
        .query(
            Table::Attendances,
            &Query::all().filter(Filter::at_least("time", format_timestamp(since))),
        )
        .await?;

    let (records, _) = decode_rows(rows);
    let mut latest: HashMap<i64, (DateTime<Utc>, AttendanceKind)> = HashMap::new();
    for record in records {
        let Ok(at) = parse_timestamp(&record.time) else {
            warn!(
                record_id = record.id,
                "skipping attendance row with bad time {}", record.time
            );
            continue;
        };
        let newer = match latest.get(&record.student_id) {
            Some((seen, seen_kind)) => {
                at > *seen || (at == *seen && *seen_kind == AttendanceKind::CheckIn)
            }
            None => true,
        };
        if newer {
            latest.insert(record.student_id, (at, record.kind));
        }
    }

    Ok(latest
        .into_iter()
        .map(|(student_id, (_, kind))| (student_id, kind))
        .collect())
}
