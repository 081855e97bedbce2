use crate::{
    api::{deserialize_opt_time, local_today, now_to_minute, student::fetch_student},
    auth::auth::AuthUser,
    error::ApiError,
    model::{attendance::AttendanceRecord, status::AttendanceStatus},
    report::stats::{StatusCounts, counts_for_date},
    utils::db_utils::{SqlValue, build_update, execute_update, patch_object},
};
use actix_web::{HttpResponse, Responder, web};
use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use sqlx::MySqlPool;
use tracing::info;
use utoipa::{IntoParams, ToSchema};

pub const MAX_NOTE_LEN: usize = 500;

const ATTENDANCE_COLUMNS: [&str; 4] = ["date", "status", "time", "note"];

#[derive(Debug, Deserialize, IntoParams, ToSchema)]
#[into_params(parameter_in = Query)]
pub struct DailyQuery {
    /// Defaults to today
    #[schema(example = "2026-10-17", value_type = Option<String>, format = "date")]
    #[param(value_type = Option<String>, format = "date")]
    pub date: Option<NaiveDate>,
    /// Only rows with this status
    #[param(value_type = Option<String>)]
    pub status: Option<AttendanceStatus>,
    /// Matches student name or class (case-insensitive) or NIS
    pub search: Option<String>,
}

#[derive(Serialize, ToSchema)]
pub struct DailyAttendanceResponse {
    #[schema(value_type = String, format = "date")]
    pub date: NaiveDate,
    pub data: Vec<AttendanceRecord>,
    /// Counts over every record of the date, ignoring filters
    pub counts: StatusCounts,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateAttendance {
    #[schema(example = 1)]
    pub student_id: u64,
    /// Defaults to today
    #[schema(example = "2026-10-17", value_type = Option<String>, format = "date")]
    pub date: Option<NaiveDate>,
    #[schema(example = "hadir")]
    pub status: AttendanceStatus,
    /// Defaults to the current minute
    #[schema(example = "07:15", value_type = Option<String>)]
    #[serde(default, deserialize_with = "deserialize_opt_time")]
    pub time: Option<NaiveTime>,
    pub note: Option<String>,
}

/// Partial update of a record. Absent fields keep their value.
#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateAttendance {
    #[schema(example = "2026-10-17", value_type = Option<String>, format = "date")]
    pub date: Option<NaiveDate>,
    #[schema(example = "terlambat")]
    pub status: Option<AttendanceStatus>,
    #[schema(example = "07:40", value_type = Option<String>)]
    #[serde(default, deserialize_with = "deserialize_opt_time")]
    pub time: Option<NaiveTime>,
    pub note: Option<String>,
}

impl UpdateAttendance {
    /// Reads a checked patch; nulls and unknown keys never get this far.
    pub fn from_patch(body: &Value) -> Result<Self, ApiError> {
        let patch = patch_object(body, &ATTENDANCE_COLUMNS)?;
        let update: UpdateAttendance = serde_json::from_value(Value::Object(patch.clone()))
            .map_err(|e| ApiError::bad_request(format!("Invalid attendance data: {e}")))?;
        if let Some(status) = update.status {
            check_admin_status(status)?;
        }
        if let Some(note) = &update.note {
            check_note(note.trim())?;
        }
        Ok(update)
    }

    /// Each column bound with its own type.
    fn assignments(self) -> Vec<(&'static str, SqlValue)> {
        let mut out = Vec::new();
        if let Some(date) = self.date {
            out.push(("date", SqlValue::Date(date)));
        }
        if let Some(status) = self.status {
            out.push(("status", SqlValue::String(status.as_ref().to_string())));
        }
        if let Some(time) = self.time {
            out.push(("time", SqlValue::Time(time)));
        }
        if let Some(note) = self.note {
            out.push(("note", SqlValue::String(note.trim().to_string())));
        }
        out
    }
}

fn check_admin_status(status: AttendanceStatus) -> Result<(), ApiError> {
    if AttendanceStatus::ADMIN_ENTRY.contains(&status) {
        Ok(())
    } else {
        Err(ApiError::bad_request(
            "Invalid status. Allowed: hadir, terlambat, sakit, alpha",
        ))
    }
}

fn check_note(note: &str) -> Result<(), ApiError> {
    if note.chars().count() > MAX_NOTE_LEN {
        Err(ApiError::bad_request(format!(
            "Note must be at most {MAX_NOTE_LEN} characters"
        )))
    } else {
        Ok(())
    }
}

/// Status and trimmed note of a new admin entry.
fn checked_entry(payload: &CreateAttendance) -> Result<&str, ApiError> {
    check_admin_status(payload.status)?;
    let note = payload.note.as_deref().unwrap_or("").trim();
    check_note(note)?;
    Ok(note)
}

fn matches_search(record: &AttendanceRecord, term: &str) -> bool {
    let lower = term.to_lowercase();
    record.student_name.to_lowercase().contains(&lower)
        || record.class_name.to_lowercase().contains(&lower)
        || record.nis.contains(term)
}

/// Rows shown in the daily table.
pub fn filter_daily(
    records: &[AttendanceRecord],
    status: Option<AttendanceStatus>,
    search: Option<&str>,
) -> Vec<AttendanceRecord> {
    records
        .iter()
        .filter(|r| status.is_none_or(|s| r.status == s))
        .filter(|r| search.is_none_or(|term| matches_search(r, term)))
        .cloned()
        .collect()
}

// -------------------- queries shared with other modules --------------------

pub async fn fetch_records_between(
    pool: &MySqlPool,
    first: NaiveDate,
    last: NaiveDate,
) -> Result<Vec<AttendanceRecord>, sqlx::Error> {
    sqlx::query_as::<_, AttendanceRecord>(
        r#"
        SELECT * FROM absensi
        WHERE date BETWEEN ? AND ?
        ORDER BY date, time, id
        "#,
    )
    .bind(first)
    .bind(last)
    .fetch_all(pool)
    .await
}

async fn fetch_record(pool: &MySqlPool, id: u64) -> Result<Option<AttendanceRecord>, sqlx::Error> {
    sqlx::query_as::<_, AttendanceRecord>("SELECT * FROM absensi WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await
}

// -------------------- handlers --------------------

/// Daily attendance table
#[utoipa::path(
    get,
    path = "/api/attendance",
    params(DailyQuery),
    responses(
        (status = 200, description = "Records of the date", body = DailyAttendanceResponse),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden")
    ),
    tag = "Attendance",
    security(("bearer_auth" = []))
)]
pub async fn list_attendance(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<DailyQuery>,
) -> actix_web::Result<impl Responder> {
    auth.require_admin()?;

    let date = query.date.unwrap_or_else(local_today);
    let records = fetch_records_between(pool.get_ref(), date, date)
        .await
        .map_err(|e| ApiError::internal("Failed to fetch attendance", e))?;

    let counts = counts_for_date(&records, date);
    let search = query.search.as_deref().filter(|s| !s.is_empty());
    let data = filter_daily(&records, query.status, search);

    Ok(HttpResponse::Ok().json(DailyAttendanceResponse { date, data, counts }))
}

/// Record attendance for one student
#[utoipa::path(
    post,
    path = "/api/attendance",
    request_body = CreateAttendance,
    responses(
        (status = 201, description = "Attendance recorded", body = AttendanceRecord),
        (status = 400, description = "Invalid status or note"),
        (status = 404, description = "Student not found", body = Object, example = json!({
            "message": "Student not found"
        }))
    ),
    tag = "Attendance",
    security(("bearer_auth" = []))
)]
pub async fn create_attendance(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    payload: web::Json<CreateAttendance>,
) -> actix_web::Result<impl Responder> {
    auth.require_admin()?;
    let note = checked_entry(&payload)?;

    let student = fetch_student(pool.get_ref(), payload.student_id)
        .await
        .map_err(|e| ApiError::internal("Failed to fetch student", e))?
        .ok_or_else(|| ApiError::not_found("Student not found"))?;

    let date = payload.date.unwrap_or_else(local_today);
    let time = payload.time.unwrap_or_else(now_to_minute);

    // no duplicate check: several rows per (student, date) are allowed
    let result = sqlx::query(
        r#"
        INSERT INTO absensi
            (date, student_id, student_name, class_name, nis, status, time, note)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(date)
    .bind(student.id)
    .bind(&student.name)
    .bind(&student.class_name)
    .bind(&student.nis)
    .bind(payload.status.as_ref())
    .bind(time)
    .bind(note)
    .execute(pool.get_ref())
    .await
    .map_err(|e| ApiError::internal("Failed to record attendance", e))?;

    let record_id = result.last_insert_id();
    info!(record_id, student_id = student.id, %date, status = %payload.status, "Attendance recorded");

    let record = fetch_record(pool.get_ref(), record_id)
        .await
        .map_err(|e| ApiError::internal("Failed to fetch attendance", e))?
        .ok_or(ApiError::Internal)?;

    Ok(HttpResponse::Created().json(record))
}

/// Update an attendance record
#[utoipa::path(
    put,
    path = "/api/attendance/{record_id}",
    params(("record_id", Path, description = "Attendance record ID")),
    request_body = UpdateAttendance,
    responses(
        (status = 200, description = "Record updated", body = AttendanceRecord),
        (status = 400, description = "Invalid field"),
        (status = 404, description = "Record not found")
    ),
    tag = "Attendance",
    security(("bearer_auth" = []))
)]
pub async fn update_attendance(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
    body: web::Json<Value>,
) -> actix_web::Result<impl Responder> {
    auth.require_admin()?;
    let record_id = path.into_inner();

    let update = UpdateAttendance::from_patch(&body)?;
    let update = build_update("absensi", update.assignments(), "id", record_id)?;
    let affected = execute_update(pool.get_ref(), update)
        .await
        .map_err(|e| ApiError::internal("Failed to update attendance", e))?;

    let record = fetch_record(pool.get_ref(), record_id)
        .await
        .map_err(|e| ApiError::internal("Failed to fetch attendance", e))?
        .ok_or_else(|| ApiError::not_found("Attendance record not found"))?;

    info!(record_id, affected, "Attendance updated");
    Ok(HttpResponse::Ok().json(record))
}

/// Delete an attendance record
#[utoipa::path(
    delete,
    path = "/api/attendance/{record_id}",
    params(("record_id", Path, description = "Attendance record ID")),
    responses(
        (status = 200, description = "Successfully deleted", body = Object, example = json!({
            "message": "Successfully deleted"
        })),
        (status = 404, description = "Record not found")
    ),
    tag = "Attendance",
    security(("bearer_auth" = []))
)]
pub async fn delete_attendance(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> actix_web::Result<impl Responder> {
    auth.require_admin()?;
    let record_id = path.into_inner();

    let result = sqlx::query("DELETE FROM absensi WHERE id = ?")
        .bind(record_id)
        .execute(pool.get_ref())
        .await
        .map_err(|e| ApiError::internal("Failed to delete attendance", e))?;

    if result.rows_affected() == 0 {
        return Err(ApiError::not_found("Attendance record not found").into());
    }

    Ok(HttpResponse::Ok().json(json!({ "message": "Successfully deleted" })))
}
