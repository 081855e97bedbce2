use crate::{
    api::{attendance::fetch_records_between, local_today, student::count_students},
    auth::auth::AuthUser,
    error::ApiError,
    model::attendance::AttendanceRecord,
    report::stats::{
        DashboardStats, WeeklyPoint, dashboard_stats, recent_activity, weekly_chart,
    },
};
use actix_web::{HttpResponse, Responder, web};
use chrono::Duration;
use serde::Serialize;
use sqlx::MySqlPool;
use utoipa::ToSchema;

const RECENT_LIMIT: i64 = 5;

#[derive(Serialize, ToSchema)]
pub struct DashboardResponse {
    pub stats: DashboardStats,
    pub weekly: Vec<WeeklyPoint>,
    pub recent: Vec<AttendanceRecord>,
}

async fn fetch_recent(pool: &MySqlPool, limit: i64) -> Result<Vec<AttendanceRecord>, sqlx::Error> {
    sqlx::query_as::<_, AttendanceRecord>(
        "SELECT * FROM absensi ORDER BY created_at DESC, id DESC LIMIT ?",
    )
    .bind(limit)
    .fetch_all(pool)
    .await
}

/// Admin dashboard
#[utoipa::path(
    get,
    path = "/api/dashboard",
    responses(
        (status = 200, description = "Today's figures, the last seven days and recent activity", body = DashboardResponse),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden")
    ),
    tag = "Dashboard",
    security(("bearer_auth" = []))
)]
pub async fn get_dashboard(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
) -> actix_web::Result<impl Responder> {
    auth.require_admin()?;

    let today = local_today();
    let total_students = count_students(pool.get_ref())
        .await
        .map_err(|e| ApiError::internal("Failed to count students", e))?;
    let week = fetch_records_between(pool.get_ref(), today - Duration::days(6), today)
        .await
        .map_err(|e| ApiError::internal("Failed to fetch attendance", e))?;
    let latest = fetch_recent(pool.get_ref(), RECENT_LIMIT)
        .await
        .map_err(|e| ApiError::internal("Failed to fetch attendance", e))?;

    Ok(HttpResponse::Ok().json(DashboardResponse {
        stats: dashboard_stats(&week, today, total_students.max(0) as u64),
        weekly: weekly_chart(&week, today),
        recent: recent_activity(&latest, RECENT_LIMIT as usize),
    }))
}
