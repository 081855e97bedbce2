use crate::{
    api::{attendance::fetch_records_between, local_today, student::fetch_students},
    auth::auth::AuthUser,
    error::ApiError,
    report::{
        csv_export::recap_csv,
        stats::{MonthlyRecap, month_range, monthly_recap},
    },
};
use actix_web::{HttpResponse, Responder, http::header, web};
use chrono::NaiveDate;
use serde::Deserialize;
use sqlx::MySqlPool;
use utoipa::IntoParams;

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct MonthQuery {
    /// `YYYY-MM`, defaults to the current month
    #[param(example = "2026-10")]
    pub month: Option<String>,
}

impl MonthQuery {
    /// The month label with its first and last day.
    pub fn resolve(&self) -> Result<(String, NaiveDate, NaiveDate), ApiError> {
        let month = match self.month.as_deref().map(str::trim) {
            Some(m) if !m.is_empty() => m.to_string(),
            _ => local_today().format("%Y-%m").to_string(),
        };
        let (first, last) = month_range(&month)
            .ok_or_else(|| ApiError::bad_request("Invalid month, expected YYYY-MM"))?;
        Ok((month, first, last))
    }
}

async fn build_recap(pool: &MySqlPool, query: &MonthQuery) -> Result<MonthlyRecap, ApiError> {
    let (month, first, last) = query.resolve()?;

    let records = fetch_records_between(pool, first, last)
        .await
        .map_err(|e| ApiError::internal("Failed to fetch attendance", e))?;
    let students = fetch_students(pool)
        .await
        .map_err(|e| ApiError::internal("Failed to fetch students", e))?;

    Ok(monthly_recap(&month, first, last, &records, &students))
}

/// Monthly attendance recap
#[utoipa::path(
    get,
    path = "/api/recap",
    params(MonthQuery),
    responses(
        (status = 200, description = "Recap of the month", body = MonthlyRecap),
        (status = 400, description = "Malformed month"),
        (status = 403, description = "Forbidden")
    ),
    tag = "Recap",
    security(("bearer_auth" = []))
)]
pub async fn get_recap(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<MonthQuery>,
) -> actix_web::Result<impl Responder> {
    auth.require_admin()?;
    let recap = build_recap(pool.get_ref(), &query).await?;
    Ok(HttpResponse::Ok().json(recap))
}

/// Monthly recap as CSV
#[utoipa::path(
    get,
    path = "/api/recap/export",
    params(MonthQuery),
    responses(
        (status = 200, description = "Per-student rows", body = String, content_type = "text/csv"),
        (status = 400, description = "Malformed month"),
        (status = 403, description = "Forbidden")
    ),
    tag = "Recap",
    security(("bearer_auth" = []))
)]
pub async fn export_recap(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<MonthQuery>,
) -> actix_web::Result<impl Responder> {
    auth.require_admin()?;
    let recap = build_recap(pool.get_ref(), &query).await?;

    let body = recap_csv(&recap).map_err(|e| ApiError::internal("Failed to render CSV", e))?;

    Ok(HttpResponse::Ok()
        .content_type("text/csv; charset=utf-8")
        .insert_header((
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"rekap-absensi-{}.csv\"", recap.month),
        ))
        .body(body))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::stats::fixtures::date;

    fn query(month: Option<&str>) -> MonthQuery {
        MonthQuery {
            month: month.map(str::to_string),
        }
    }

    #[test]
    fn explicit_month_resolves_to_calendar_bounds() {
        let (month, first, last) = query(Some("2024-02")).resolve().unwrap();
        assert_eq!(month, "2024-02");
        assert_eq!(first, date("2024-02-01"));
        assert_eq!(last, date("2024-02-29"));
    }

    #[test]
    fn missing_month_means_current_month() {
        let (month, first, _) = query(None).resolve().unwrap();
        assert_eq!(month, local_today().format("%Y-%m").to_string());
        assert_eq!(first.format("%Y-%m").to_string(), month);

        let (blank, _, _) = query(Some("  ")).resolve().unwrap();
        assert_eq!(blank, month);
    }

    #[test]
    fn malformed_month_is_a_bad_request() {
        for bad in ["2026-13", "2026/10", "26-10", "october"] {
            assert!(
                matches!(query(Some(bad)).resolve(), Err(ApiError::BadRequest(_))),
                "{bad}"
            );
        }
    }
}
