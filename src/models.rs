use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Roster grades in display order.
pub const GRADES: [Grade; 3] = [Grade::M2, Grade::M1, Grade::B4];

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Grade {
    M2,
    M1,
    B4,
}

impl Grade {
    pub fn as_str(&self) -> &'static str {
        match self {
            Grade::M2 => "M2",
            Grade::M1 => "M1",
            Grade::B4 => "B4",
        }
    }
}

impl fmt::Display for Grade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Student {
    pub id: i64,
    pub name: String,
    pub grade: Grade,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AttendanceKind {
    #[serde(rename = "check_in", alias = "出勤")]
    CheckIn,
    #[serde(rename = "check_out", alias = "退勤")]
    CheckOut,
}

impl AttendanceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AttendanceKind::CheckIn => "check_in",
            AttendanceKind::CheckOut => "check_out",
        }
    }
}

/// Attendance row as stored. `time` is kept raw so a bad value only
/// excludes that row from aggregation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttendanceRecord {
    pub id: i64,
    pub student_id: i64,
    pub kind: AttendanceKind,
    pub time: String,
}

/// Attendance row with a parsed instant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttendanceEvent {
    pub subject_id: i64,
    pub kind: AttendanceKind,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Granularity {
    Weekly,
    Monthly,
    Yearly,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BucketedDuration {
    pub bucket_key: String,
    pub hours: f64,
}

#[derive(Debug, Deserialize)]
pub struct AttendanceRequest {
    pub student_id: i64,
    pub kind: AttendanceKind,
}

#[derive(Debug, Deserialize)]
pub struct NewStudentRequest {
    pub name: String,
    pub grade: Grade,
}

#[derive(Debug, Deserialize)]
pub struct UpdateStudentRequest {
    pub name: Option<String>,
    pub grade: Option<Grade>,
}

#[derive(Debug, Deserialize)]
pub struct DeleteStudentRequest {
    pub name: String,
    pub grade: Grade,
}

#[derive(Debug, Deserialize)]
pub struct SettingsRequest {
    pub endpoint: String,
    pub access_key: String,
}

#[derive(Debug, Deserialize)]
pub struct StatsQuery {
    pub granularity: Option<Granularity>,
}

#[derive(Debug, Serialize)]
pub struct RosterEntry {
    pub id: i64,
    pub name: String,
    pub present: bool,
}

#[derive(Debug, Serialize)]
pub struct GradeSection {
    pub grade: Grade,
    pub students: Vec<RosterEntry>,
}

#[derive(Debug, Serialize)]
pub struct RosterResponse {
    pub sections: Vec<GradeSection>,
}

#[derive(Debug, Serialize)]
pub struct EventsResponse {
    pub student_id: i64,
    pub events: Vec<AttendanceRecord>,
}

#[derive(Debug, Serialize)]
pub struct StatsResponse {
    pub student_id: i64,
    pub generated_at: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub weekly: Option<Vec<BucketedDuration>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub monthly: Option<Vec<BucketedDuration>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub yearly: Option<Vec<BucketedDuration>>,
    pub invalid_events: usize,
}

#[derive(Debug, Serialize)]
pub struct DeletedResponse {
    pub deleted: usize,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub store: &'static str,
}
