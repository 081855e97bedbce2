use crate::{
    api::{attendance::MAX_NOTE_LEN, local_today, now_to_minute, recap::MonthQuery},
    auth::auth::AuthUser,
    config::Config,
    error::ApiError,
    model::{
        attendance::CheckInRecord,
        status::{AttendanceStatus, CheckInMethod},
    },
    report::stats::StatusCounts,
    utils::storage::{PhotoStorage, looks_like_jpeg},
};
use actix_web::{HttpResponse, Responder, web};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use chrono::{NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::MySqlPool;
use std::collections::BTreeMap;
use tracing::{info, instrument, warn};
use utoipa::ToSchema;

pub const LATE_NOTE: &str = "Late arrival";

#[derive(Deserialize, ToSchema)]
pub struct CameraCheckIn {
    /// Base64 JPEG, optionally as a `data:image/jpeg;base64,` URL
    pub photo: String,
    #[schema(example = -6.2)]
    pub latitude: f64,
    #[schema(example = 106.816666)]
    pub longitude: f64,
    /// Metres
    #[schema(example = 12.5)]
    pub accuracy: f64,
}

#[derive(Deserialize, ToSchema)]
pub struct ExcuseRequest {
    /// `sakit` or `izin`
    #[schema(example = "sakit")]
    pub status: AttendanceStatus,
    #[schema(example = "Demam, surat dokter menyusul")]
    pub note: String,
}

#[derive(Serialize, ToSchema)]
pub struct CheckInStats {
    #[schema(example = "2026-10")]
    pub month: String,
    pub counts: StatusCounts,
    /// `round((present + late) / total * 100)`
    pub attendance_percentage: u32,
}

/// Late strictly after the cutoff minute.
pub fn decide_status(now: NaiveTime, cutoff: NaiveTime) -> AttendanceStatus {
    if now > cutoff {
        AttendanceStatus::Late
    } else {
        AttendanceStatus::Present
    }
}

fn check_location(latitude: f64, longitude: f64, accuracy: f64) -> Result<(), ApiError> {
    let mut errors = BTreeMap::new();
    if !(-90.0..=90.0).contains(&latitude) {
        errors.insert("latitude", "Latitude must be between -90 and 90".to_string());
    }
    if !(-180.0..=180.0).contains(&longitude) {
        errors.insert("longitude", "Longitude must be between -180 and 180".to_string());
    }
    if !(accuracy >= 0.0) {
        errors.insert("accuracy", "Accuracy must not be negative".to_string());
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(ApiError::Validation(errors))
    }
}

/// Decodes the captured frame and checks it is a JPEG.
pub fn decode_photo(raw: &str) -> Result<Vec<u8>, ApiError> {
    let payload = match raw.split_once(";base64,") {
        Some((scheme, data)) if scheme.starts_with("data:") => data,
        _ => raw,
    };
    let payload = payload.trim();
    if payload.is_empty() {
        return Err(ApiError::bad_request("Photo is required"));
    }

    let bytes = STANDARD
        .decode(payload)
        .map_err(|_| ApiError::bad_request("Photo is not valid base64"))?;

    if !looks_like_jpeg(&bytes) {
        return Err(ApiError::bad_request("Photo must be a JPEG image"));
    }
    Ok(bytes)
}

fn check_excuse(req: &ExcuseRequest) -> Result<&str, ApiError> {
    if !matches!(req.status, AttendanceStatus::Sick | AttendanceStatus::Excused) {
        return Err(ApiError::bad_request("Invalid status. Allowed: sakit, izin"));
    }
    let note = req.note.trim();
    if note.is_empty() {
        return Err(ApiError::bad_request("Note is required"));
    }
    if note.chars().count() > MAX_NOTE_LEN {
        return Err(ApiError::bad_request(format!(
            "Note must be at most {MAX_NOTE_LEN} characters"
        )));
    }
    Ok(note)
}

// -------------------- queries --------------------

struct NewCheckIn<'a> {
    user_id: u64,
    user_email: &'a str,
    date: NaiveDate,
    time: NaiveTime,
    status: AttendanceStatus,
    method: CheckInMethod,
    latitude: Option<f64>,
    longitude: Option<f64>,
    accuracy: Option<f64>,
    photo_url: Option<String>,
    note: Option<&'a str>,
}

async fn fetch_for_date(
    pool: &MySqlPool,
    user_id: u64,
    date: NaiveDate,
) -> Result<Option<CheckInRecord>, sqlx::Error> {
    sqlx::query_as::<_, CheckInRecord>(
        r#"
        SELECT * FROM attendance_records
        WHERE user_id = ? AND date = ?
        ORDER BY created_at DESC, id DESC
        LIMIT 1
        "#,
    )
    .bind(user_id)
    .bind(date)
    .fetch_optional(pool)
    .await
}

async fn fetch_between(
    pool: &MySqlPool,
    user_id: u64,
    first: NaiveDate,
    last: NaiveDate,
) -> Result<Vec<CheckInRecord>, sqlx::Error> {
    sqlx::query_as::<_, CheckInRecord>(
        r#"
        SELECT * FROM attendance_records
        WHERE user_id = ? AND date BETWEEN ? AND ?
        ORDER BY date DESC, time DESC, id DESC
        "#,
    )
    .bind(user_id)
    .bind(first)
    .bind(last)
    .fetch_all(pool)
    .await
}

async fn insert_check_in(pool: &MySqlPool, row: NewCheckIn<'_>) -> Result<u64, sqlx::Error> {
    let result = sqlx::query(
        r#"
        INSERT INTO attendance_records
            (user_id, user_email, date, time, status, method,
             latitude, longitude, accuracy, photo_url, note)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(row.user_id)
    .bind(row.user_email)
    .bind(row.date)
    .bind(row.time)
    .bind(row.status.as_ref())
    .bind(row.method.as_ref())
    .bind(row.latitude)
    .bind(row.longitude)
    .bind(row.accuracy)
    .bind(row.photo_url)
    .bind(row.note)
    .execute(pool)
    .await?;

    Ok(result.last_insert_id())
}

async fn ensure_not_checked_in(
    pool: &MySqlPool,
    user_id: u64,
    date: NaiveDate,
) -> Result<(), ApiError> {
    let existing = fetch_for_date(pool, user_id, date)
        .await
        .map_err(|e| ApiError::internal("Failed to fetch check-in", e))?;
    reject_if_checked_in(existing.as_ref())
}

/// One check-in per user per day.
fn reject_if_checked_in(existing: Option<&CheckInRecord>) -> Result<(), ApiError> {
    match existing {
        Some(_) => Err(ApiError::conflict("Already checked in today")),
        None => Ok(()),
    }
}

async fn fetch_check_in(pool: &MySqlPool, id: u64) -> Result<CheckInRecord, ApiError> {
    sqlx::query_as::<_, CheckInRecord>("SELECT * FROM attendance_records WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await
        .map_err(|e| ApiError::internal("Failed to fetch check-in", e))?
        .ok_or(ApiError::Internal)
}

// -------------------- handlers --------------------

/// Today's own check-in, `null` when none
#[utoipa::path(
    get,
    path = "/api/me/attendance/today",
    responses(
        (status = 200, description = "Today's record or null", body = CheckInRecord),
        (status = 401, description = "Unauthorized")
    ),
    tag = "Check-in",
    security(("bearer_auth" = []))
)]
pub async fn today_check_in(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
) -> actix_web::Result<impl Responder> {
    auth.require_student()?;

    let record = fetch_for_date(pool.get_ref(), auth.user_id, local_today())
        .await
        .map_err(|e| ApiError::internal("Failed to fetch check-in", e))?;

    Ok(HttpResponse::Ok().json(record))
}

/// Check in with a photo and the device location
#[utoipa::path(
    post,
    path = "/api/me/attendance/camera",
    request_body = CameraCheckIn,
    responses(
        (status = 201, description = "Checked in", body = CheckInRecord),
        (status = 400, description = "Missing photo or invalid location"),
        (status = 409, description = "Already checked in today", body = Object, example = json!({
            "message": "Already checked in today"
        }))
    ),
    tag = "Check-in",
    security(("bearer_auth" = []))
)]
#[instrument(skip_all, fields(user_id = auth.user_id))]
pub async fn camera_check_in(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
    storage: web::Data<PhotoStorage>,
    payload: web::Json<CameraCheckIn>,
) -> actix_web::Result<impl Responder> {
    auth.require_student()?;
    let CameraCheckIn {
        photo,
        latitude,
        longitude,
        accuracy,
    } = payload.into_inner();

    check_location(latitude, longitude, accuracy)?;
    let bytes = decode_photo(&photo)?;

    let today = local_today();
    ensure_not_checked_in(pool.get_ref(), auth.user_id, today).await?;

    let photo_url = storage
        .upload(auth.user_id, bytes, Utc::now())
        .await
        .map_err(|e| ApiError::internal("Failed to store photo", format!("{e:#}")))?;

    let time = now_to_minute();
    let status = decide_status(time, config.late_cutoff);
    let note = (status == AttendanceStatus::Late).then_some(LATE_NOTE);

    let record_id = insert_check_in(
        pool.get_ref(),
        NewCheckIn {
            user_id: auth.user_id,
            user_email: &auth.email,
            date: today,
            time,
            status,
            method: CheckInMethod::Camera,
            latitude: Some(latitude),
            longitude: Some(longitude),
            accuracy: Some(accuracy),
            photo_url: Some(photo_url),
            note,
        },
    )
    .await
    .map_err(|e| ApiError::internal("Failed to save check-in", e))?;

    if status == AttendanceStatus::Late {
        warn!(%time, cutoff = %config.late_cutoff, "Late check-in");
    }
    info!(record_id, %today, %status, "Camera check-in recorded");

    Ok(HttpResponse::Created().json(fetch_check_in(pool.get_ref(), record_id).await?))
}

/// Report sick or excused for today
#[utoipa::path(
    post,
    path = "/api/me/attendance/excuse",
    request_body = ExcuseRequest,
    responses(
        (status = 201, description = "Excuse recorded", body = CheckInRecord),
        (status = 400, description = "Invalid status or missing note"),
        (status = 409, description = "Already checked in today")
    ),
    tag = "Check-in",
    security(("bearer_auth" = []))
)]
pub async fn excuse_check_in(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    payload: web::Json<ExcuseRequest>,
) -> actix_web::Result<impl Responder> {
    auth.require_student()?;
    let note = check_excuse(&payload)?;

    let today = local_today();
    ensure_not_checked_in(pool.get_ref(), auth.user_id, today).await?;

    let record_id = insert_check_in(
        pool.get_ref(),
        NewCheckIn {
            user_id: auth.user_id,
            user_email: &auth.email,
            date: today,
            time: now_to_minute(),
            status: payload.status,
            method: CheckInMethod::Excused,
            latitude: None,
            longitude: None,
            accuracy: None,
            photo_url: None,
            note: Some(note),
        },
    )
    .await
    .map_err(|e| ApiError::internal("Failed to save excuse", e))?;

    info!(record_id, user_id = auth.user_id, %today, status = %payload.status, "Excuse recorded");
    Ok(HttpResponse::Created().json(fetch_check_in(pool.get_ref(), record_id).await?))
}

/// Own check-ins of a month, newest first
#[utoipa::path(
    get,
    path = "/api/me/attendance",
    params(MonthQuery),
    responses(
        (status = 200, description = "Check-ins of the month", body = Vec<CheckInRecord>),
        (status = 400, description = "Malformed month")
    ),
    tag = "Check-in",
    security(("bearer_auth" = []))
)]
pub async fn my_history(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<MonthQuery>,
) -> actix_web::Result<impl Responder> {
    auth.require_student()?;
    let (_, first, last) = query.resolve()?;

    let records = fetch_between(pool.get_ref(), auth.user_id, first, last)
        .await
        .map_err(|e| ApiError::internal("Failed to fetch check-ins", e))?;

    Ok(HttpResponse::Ok().json(records))
}

/// Own attendance figures for a month
#[utoipa::path(
    get,
    path = "/api/me/attendance/stats",
    params(MonthQuery),
    responses(
        (status = 200, description = "Counts and percentage", body = CheckInStats),
        (status = 400, description = "Malformed month")
    ),
    tag = "Check-in",
    security(("bearer_auth" = []))
)]
pub async fn my_stats(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<MonthQuery>,
) -> actix_web::Result<impl Responder> {
    auth.require_student()?;
    let (month, first, last) = query.resolve()?;

    let records = fetch_between(pool.get_ref(), auth.user_id, first, last)
        .await
        .map_err(|e| ApiError::internal("Failed to fetch check-ins", e))?;

    let counts = StatusCounts::tally(records.iter().map(|r| r.status));
    Ok(HttpResponse::Ok().json(CheckInStats {
        month,
        counts,
        attendance_percentage: counts.attendance_percentage(),
    }))
}

/// A stored check-in photo
#[utoipa::path(
    get,
    path = "/photos/attendance-photos/{file}",
    params(("file", Path, description = "Photo file name")),
    responses(
        (status = 200, description = "JPEG bytes", body = String, content_type = "image/jpeg"),
        (status = 404, description = "No such photo")
    ),
    tag = "Check-in"
)]
pub async fn serve_photo(
    storage: web::Data<PhotoStorage>,
    path: web::Path<String>,
) -> actix_web::Result<impl Responder> {
    let name = path.into_inner();
    let bytes = storage
        .read(&name)
        .await
        .map_err(|e| ApiError::internal("Failed to read photo", format!("{e:#}")))?
        .ok_or_else(|| ApiError::not_found("Photo not found"))?;

    Ok(HttpResponse::Ok().content_type("image/jpeg").body(bytes))
}
