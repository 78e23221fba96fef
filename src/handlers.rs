use crate::attendance::{fetch_events, record_attendance};
use crate::config::StoreConfig;
use crate::errors::AppError;
use crate::models::{
    AttendanceRecord, AttendanceRequest, DeleteStudentRequest, DeletedResponse, EventsResponse,
    Granularity, HealthResponse, NewStudentRequest, RosterResponse, SettingsRequest, StatsQuery,
    StatsResponse, Student, UpdateStudentRequest,
};
use crate::roster::{self, add_student, delete_all_students, delete_student, update_student};
use crate::state::AppState;
use crate::stats::{aggregate, aggregate_all, parse_records, parse_timestamp};
use crate::store::{RecordStore, RestStore};
use crate::ui::render_index;
use axum::{
    Json,
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::Html,
};
use chrono::Utc;
use std::sync::Arc;
use tracing::{info, warn};

const ADMIN_HEADER: &str = "x-admin-password";

fn require_admin(state: &AppState, headers: &HeaderMap) -> Result<(), AppError> {
    let supplied = headers
        .get(ADMIN_HEADER)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default();
    if supplied != state.config.admin_password {
        warn!("rejected admin request without a valid password");
        return Err(AppError::unauthorized());
    }
    Ok(())
}

async fn existing_student(store: &dyn RecordStore, id: i64) -> Result<Student, AppError> {
    roster::find_student(store, id)
        .await?
        .ok_or_else(|| AppError::not_found(format!("no student with id {id}")))
}

pub async fn index(State(state): State<AppState>) -> Html<String> {
    Html(render_index(&state.config.time_policy))
}

pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let store = state.store().await;
    Json(HealthResponse {
        status: "ok",
        store: store.kind(),
    })
}

pub async fn list_roster(State(state): State<AppState>) -> Result<Json<RosterResponse>, AppError> {
    let store = state.store().await;
    let today_start = state.config.time_policy.start_of_today(Utc::now());
    Ok(Json(roster::roster(store.as_ref(), today_start).await?))
}

pub async fn create_student(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<NewStudentRequest>,
) -> Result<(StatusCode, Json<Student>), AppError> {
    require_admin(&state, &headers)?;
    let store = state.store().await;
    let student = add_student(store.as_ref(), &payload.name, payload.grade).await?;
    Ok((StatusCode::CREATED, Json(student)))
}

pub async fn edit_student(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    headers: HeaderMap,
    Json(payload): Json<UpdateStudentRequest>,
) -> Result<Json<Student>, AppError> {
    require_admin(&state, &headers)?;
    let store = state.store().await;
    let student =
        update_student(store.as_ref(), id, payload.name.as_deref(), payload.grade).await?;
    Ok(Json(student))
}

pub async fn remove_student(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<DeleteStudentRequest>,
) -> Result<Json<Student>, AppError> {
    require_admin(&state, &headers)?;
    let store = state.store().await;
    let student = delete_student(store.as_ref(), &payload.name, payload.grade).await?;
    Ok(Json(student))
}

pub async fn remove_all_students(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<DeletedResponse>, AppError> {
    require_admin(&state, &headers)?;
    let store = state.store().await;
    let deleted = delete_all_students(store.as_ref()).await?;
    Ok(Json(DeletedResponse { deleted }))
}

pub async fn record(
    State(state): State<AppState>,
    Json(payload): Json<AttendanceRequest>,
) -> Result<(StatusCode, Json<AttendanceRecord>), AppError> {
    let store = state.store().await;
    let record =
        record_attendance(store.as_ref(), payload.student_id, payload.kind, Utc::now()).await?;
    Ok((StatusCode::CREATED, Json(record)))
}

pub async fn get_events(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<EventsResponse>, AppError> {
    let store = state.store().await;
    existing_student(store.as_ref(), id).await?;

    let since = state.config.time_policy.start_of_year(Utc::now());
    let (mut events, _) = fetch_events(store.as_ref(), id, since).await?;
    events.sort_by_key(|record| parse_timestamp(&record.time).ok());
    Ok(Json(EventsResponse {
        student_id: id,
        events,
    }))
}

pub async fn get_stats(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Query(query): Query<StatsQuery>,
) -> Result<Json<StatsResponse>, AppError> {
    let store = state.store().await;
    existing_student(store.as_ref(), id).await?;

    let policy = &state.config.time_policy;
    let now = Utc::now();
    let since = policy.fetch_since(now);
    let (records, malformed) = fetch_events(store.as_ref(), id, since).await?;
    let (events, rejected) = parse_records(&records);

    let mut response = StatsResponse {
        student_id: id,
        generated_at: now.to_rfc3339(),
        weekly: None,
        monthly: None,
        yearly: None,
        invalid_events: malformed.len() + rejected.len(),
    };
    match query.granularity {
        Some(Granularity::Weekly) => {
            response.weekly = Some(aggregate(&events, now, Granularity::Weekly, policy));
        }
        Some(Granularity::Monthly) => {
            response.monthly = Some(aggregate(&events, now, Granularity::Monthly, policy));
        }
        Some(Granularity::Yearly) => {
            response.yearly = Some(aggregate(&events, now, Granularity::Yearly, policy));
        }
        None => {
            let series = aggregate_all(&events, now, policy);
            response.weekly = Some(series.weekly);
            response.monthly = Some(series.monthly);
            response.yearly = Some(series.yearly);
        }
    }

    Ok(Json(response))
}

pub async fn update_settings(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<SettingsRequest>,
) -> Result<Json<HealthResponse>, AppError> {
    require_admin(&state, &headers)?;
    let config = StoreConfig::new(&payload.endpoint, &payload.access_key)?;
    let store = RestStore::new(config)?;
    info!("switching record store to {}", store.endpoint());

    let store: Arc<dyn RecordStore> = Arc::new(store);
    let kind = store.kind();
    state.replace_store(store).await;
    Ok(Json(HealthResponse {
        status: "ok",
        store: kind,
    }))
}
