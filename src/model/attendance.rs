use super::status::{AttendanceStatus, CheckInMethod};
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// A row of the admin-entered daily attendance table.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
pub struct AttendanceRecord {
    pub id: u64,
    #[schema(value_type = String, format = "date")]
    pub date: NaiveDate,
    pub student_id: u64,
    pub student_name: String,
    pub class_name: String,
    pub nis: String,
    #[sqlx(try_from = "String")]
    pub status: AttendanceStatus,
    #[schema(value_type = String, example = "07:15:00")]
    pub time: NaiveTime,
    pub note: String,
    #[schema(value_type = String, format = "date-time")]
    pub created_at: DateTime<Utc>,
}

/// A student's own check-in.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
pub struct CheckInRecord {
    pub id: u64,
    pub user_id: u64,
    pub user_email: String,
    #[schema(value_type = String, format = "date")]
    pub date: NaiveDate,
    #[schema(value_type = String, example = "07:58:00")]
    pub time: NaiveTime,
    #[sqlx(try_from = "String")]
    pub status: AttendanceStatus,
    #[sqlx(try_from = "String")]
    pub method: CheckInMethod,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub accuracy: Option<f64>,
    pub photo_url: Option<String>,
    pub note: Option<String>,
    #[schema(value_type = String, format = "date-time")]
    pub created_at: DateTime<Utc>,
}
