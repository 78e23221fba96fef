use crate::attendance::latest_kinds_since;
use crate::errors::{AppError, StoreError};
use crate::models::{
    AttendanceKind, Grade, GradeSection, GRADES, RosterEntry, RosterResponse, Student,
};
use crate::store::{Filter, Query, RecordStore, Row, Table, from_row};
use chrono::{DateTime, Utc};
use serde_json::Value;
use tracing::info;

pub async fn list_students(store: &dyn RecordStore) -> Result<Vec<Student>, StoreError> {
    let rows = store.query(Table::Students, &Query::all()).await?;
    let mut students = rows
        .into_iter()
        .map(|row| from_row::<Student>(Table::Students, row))
        .collect::<Result<Vec<_>, _>>()?;
    students.sort_by(|a, b| a.grade.cmp(&b.grade).then_with(|| a.name.cmp(&b.name)));
    Ok(students)
}

pub async fn find_student(
    store: &dyn RecordStore,
    id: i64,
) -> Result<Option<Student>, StoreError> {
    let rows = store
        .query(
            Table::Students,
            &Query::all().filter(Filter::equals("id", id)),
        )
        .await?;
    rows.into_iter()
        .next()
        .map(|row| from_row(Table::Students, row))
        .transpose()
}

/// Students grouped by grade in display order, each flagged present when
/// their latest event since `today_start` is a check-in.
pub async fn roster(
    store: &dyn RecordStore,
    today_start: DateTime<Utc>,
) -> Result<RosterResponse, StoreError> {
    let students = list_students(store).await?;
    let latest = latest_kinds_since(store, today_start).await?;

    let sections = GRADES
        .iter()
        .map(|grade| GradeSection {
            grade: *grade,
            students: students
                .iter()
                .filter(|student| student.grade == *grade)
                .map(|student| RosterEntry {
                    id: student.id,
                    name: student.name.clone(),
                    present: latest.get(&student.id) == Some(&AttendanceKind::CheckIn),
                })
                .collect(),
        })
        .collect();

    Ok(RosterResponse { sections })
}

fn clean_name(name: &str) -> Result<String, AppError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(AppError::bad_request("name must not be empty"));
    }
    Ok(name.to_string())
}

pub async fn add_student(
    store: &dyn RecordStore,
    name: &str,
    grade: Grade,
) -> Result<Student, AppError> {
    let name = clean_name(name)?;
    let mut row = Row::new();
    row.insert("name".to_string(), Value::from(name));
    row.insert("grade".to_string(), Value::from(grade.as_str()));

    let stored = store.insert(Table::Students, row).await?;
    let student: Student = from_row(Table::Students, stored)?;
    info!(id = student.id, grade = %student.grade, "added student {}", student.name);
    Ok(student)
}

pub async fn update_student(
    store: &dyn RecordStore,
    id: i64,
    name: Option<&str>,
    grade: Option<Grade>,
) -> Result<Student, AppError> {
    let mut patch = Row::new();
    if let Some(name) = name {
        patch.insert("name".to_string(), Value::from(clean_name(name)?));
    }
    if let Some(grade) = grade {
        patch.insert("grade".to_string(), Value::from(grade.as_str()));
    }
    if patch.is_empty() {
        return Err(AppError::bad_request("nothing to update"));
    }

    let changed = store
        .update(Table::Students, &[Filter::equals("id", id)], patch)
        .await?;
    if changed == 0 {
        return Err(AppError::not_found(format!("no student with id {id}")));
    }

    let student = find_student(store, id)
        .await?
        .ok_or_else(|| AppError::not_found(format!("no student with id {id}")))?;
    info!(id, "updated student {}", student.name);
    Ok(student)
}

/// Removes the student named `name` in `grade` together with their
/// attendance rows.
pub async fn delete_student(
    store: &dyn RecordStore,
    name: &str,
    grade: Grade,
) -> Result<Student, AppError> {
    let name = clean_name(name)?;
    let rows = store
        .query(
            Table::Students,
            &Query::all()
                .filter(Filter::equals("name", name.as_str()))
                .filter(Filter::equals("grade", grade.as_str())),
        )
        .await?;
    let student: Student = match rows.into_iter().next() {
        Some(row) => from_row(Table::Students, row)?,
        None => {
            return Err(AppError::not_found(format!(
                "no student named {name} in {grade}"
            )));
        }
    };

    let events = store
        .delete(
            Table::Attendances,
            &[Filter::equals("student_id", student.id)],
        )
        .await?;
    store
        .delete(Table::Students, &[Filter::equals("id", student.id)])
        .await?;
    info!(id = student.id, events, "deleted student {}", student.name);
    Ok(student)
}

/// Clears the roster and every attendance row. Returns the number of
/// students removed.
pub async fn delete_all_students(store: &dyn RecordStore) -> Result<usize, StoreError> {
    let events = store
        .delete(Table::Attendances, &[Filter::NotNull("student_id")])
        .await?;
    let students = store
        .delete(Table::Students, &[Filter::NotNull("name")])
        .await?;
    info!(students, events, "deleted all students");
    Ok(students)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attendance::record_attendance;
    use crate::store::FileStore;
    use axum::http::StatusCode;
    use chrono::TimeZone;

    async fn temp_store(label: &str) -> FileStore {
        let nanos = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap()
            .as_nanos();
        let mut path = std::env::temp_dir();
        path.push(format!(
            "lams_roster_{label}_{}_{}.json",
            std::process::id(),
            nanos
        ));
        FileStore::open(path).await.unwrap()
    }

    #[tokio::test]
    async fn roster_groups_by_grade_and_flags_presence() {
        let store = temp_store("group").await;
        let aoi = add_student(&store, " Aoi ", Grade::M1).await.unwrap();
        let ren = add_student(&store, "Ren", Grade::M2).await.unwrap();
        add_student(&store, "Sora", Grade::B4).await.unwrap();
        assert_eq!(aoi.name, "Aoi");

        let morning = Utc.with_ymd_and_hms(2026, 10, 14, 0, 0, 0).unwrap();
        record_attendance(&store, aoi.id, AttendanceKind::CheckIn, morning)
            .await
            .unwrap();
        record_attendance(&store, ren.id, AttendanceKind::CheckIn, morning)
            .await
            .unwrap();
        record_attendance(
            &store,
            ren.id,
            AttendanceKind::CheckOut,
            morning + chrono::Duration::hours(2),
        )
        .await
        .unwrap();

        let today_start = Utc.with_ymd_and_hms(2026, 10, 13, 15, 0, 0).unwrap();
        let listing = roster(&store, today_start).await.unwrap();
        let grades: Vec<Grade> = listing.sections.iter().map(|section| section.grade).collect();
        assert_eq!(grades, vec![Grade::M2, Grade::M1, Grade::B4]);
        assert_eq!(listing.sections[0].students[0].name, "Ren");
        assert!(!listing.sections[0].students[0].present);
        assert!(listing.sections[1].students[0].present);
        assert!(!listing.sections[2].students[0].present);
    }

    #[tokio::test]
    async fn delete_student_removes_their_events() {
        let store = temp_store("delete").await;
        let aoi = add_student(&store, "Aoi", Grade::M1).await.unwrap();
        let ren = add_student(&store, "Ren", Grade::M1).await.unwrap();
        let at = Utc.with_ymd_and_hms(2026, 10, 14, 0, 0, 0).unwrap();
        record_attendance(&store, aoi.id, AttendanceKind::CheckIn, at)
            .await
            .unwrap();
        record_attendance(&store, ren.id, AttendanceKind::CheckIn, at)
            .await
            .unwrap();

        let err = delete_student(&store, "Aoi", Grade::B4).await.unwrap_err();
        assert_eq!(err.status, StatusCode::NOT_FOUND);

        let deleted = delete_student(&store, "Aoi", Grade::M1).await.unwrap();
        assert_eq!(deleted.id, aoi.id);
        let left = list_students(&store).await.unwrap();
        assert_eq!(left.len(), 1);
        let events = store.query(Table::Attendances, &Query::all()).await.unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0]["student_id"], Value::from(ren.id));
    }

    #[tokio::test]
    async fn update_and_clear_roster() {
        let store = temp_store("update").await;
        let aoi = add_student(&store, "Aoi", Grade::B4).await.unwrap();
        let moved = update_student(&store, aoi.id, None, Some(Grade::M1))
            .await
            .unwrap();
        assert_eq!(moved.grade, Grade::M1);
        assert_eq!(moved.name, "Aoi");

        let err = update_student(&store, 999, Some("Ghost"), None)
            .await
            .unwrap_err();
        assert_eq!(err.status, StatusCode::NOT_FOUND);
        let err = add_student(&store, "   ", Grade::M2).await.unwrap_err();
        assert_eq!(err.status, StatusCode::BAD_REQUEST);

        add_student(&store, "Ren", Grade::M2).await.unwrap();
        assert_eq!(delete_all_students(&store).await.unwrap(), 2);
        assert!(list_students(&store).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn roster_survives_malformed_attendance_row() {
        let store = temp_store("malformed").await;
        let aoi = add_student(&store, "Aoi", Grade::M2).await.unwrap();
        let at = Utc.with_ymd_and_hms(2026, 10, 14, 0, 0, 0).unwrap();
        record_attendance(&store, aoi.id, AttendanceKind::CheckIn, at)
            .await
            .unwrap();
        let mut row = Row::new();
        row.insert("student_id".to_string(), Value::from(aoi.id));
        row.insert("kind".to_string(), Value::from("present"));
        row.insert("time".to_string(), Value::from("2026-10-14T01:00:00Z"));
        store.insert(Table::Attendances, row).await.unwrap();

        let today_start = Utc.with_ymd_and_hms(2026, 10, 13, 15, 0, 0).unwrap();
        let listing = roster(&store, today_start).await.unwrap();
        assert!(listing.sections[0].students[0].present);
    }
}
