use crate::api::attendance::{CreateAttendance, DailyAttendanceResponse, DailyQuery, UpdateAttendance};
use crate::api::checkin::{CameraCheckIn, CheckInStats, ExcuseRequest};
use crate::api::dashboard::DashboardResponse;
use crate::api::student::{StudentInput, StudentListResponse};
use crate::auth::handlers::SessionResponse;
use crate::model::attendance::{AttendanceRecord, CheckInRecord};
use crate::model::status::{AttendanceStatus, CheckInMethod};
use crate::model::student::{Gender, Student, StudentStatus};
use crate::models::{ResetPasswordReq, SignInReq, SignUpReq, TokenPair, UpdatePasswordReq};
use crate::report::roster::{RosterSummary, StudentFilter};
use crate::report::stats::{
    DailyRecap, DashboardStats, MonthlyRecap, StatusCounts, StudentRecap, WeeklyPoint,
};
use utoipa::Modify;
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{OpenApi, openapi};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "School Attendance API",
        version = "1.0.0",
        description = r#"
## School Attendance (Absensi) System

Backend for a school attendance dashboard and the student check-in app.

### Key Features
- **Student Roster**
  - Search, create, update, delete and export students
- **Daily Attendance**
  - Record present, late, sick or absent per student and date
- **Dashboard & Recap**
  - Today's figures, the last seven days, monthly recap with CSV export
- **Student Check-in**
  - Camera check-in with location, sick/excused reports, personal history

### Security
Endpoints under `/api` need a **JWT Bearer** access token.
Roster, attendance, dashboard and recap are **admin** only;
`/api/me/*` is for **students**.

### Status values
`hadir` present, `terlambat` late, `sakit` sick, `alpha` absent, `izin` excused.
"#,
    ),
    paths(
        crate::auth::handlers::sign_up,
        crate::auth::handlers::sign_in,
        crate::auth::handlers::refresh,
        crate::auth::handlers::sign_out,
        crate::auth::handlers::reset_password,
        crate::auth::handlers::update_password,
        crate::auth::handlers::session,

        crate::api::student::list_students,
        crate::api::student::student_summary,
        crate::api::student::get_student,
        crate::api::student::create_student,
        crate::api::student::update_student,
        crate::api::student::delete_student,
        crate::api::student::export_students,

        crate::api::attendance::list_attendance,
        crate::api::attendance::create_attendance,
        crate::api::attendance::update_attendance,
        crate::api::attendance::delete_attendance,

        crate::api::dashboard::get_dashboard,

        crate::api::recap::get_recap,
        crate::api::recap::export_recap,

        crate::api::checkin::today_check_in,
        crate::api::checkin::camera_check_in,
        crate::api::checkin::excuse_check_in,
        crate::api::checkin::my_history,
        crate::api::checkin::my_stats,
        crate::api::checkin::serve_photo
    ),
    components(
        schemas(
            SignUpReq,
            SignInReq,
            ResetPasswordReq,
            UpdatePasswordReq,
            TokenPair,
            SessionResponse,
            Student,
            Gender,
            StudentStatus,
            StudentInput,
            StudentFilter,
            StudentListResponse,
            RosterSummary,
            AttendanceStatus,
            CheckInMethod,
            AttendanceRecord,
            CheckInRecord,
            DailyQuery,
            DailyAttendanceResponse,
            CreateAttendance,
            UpdateAttendance,
            StatusCounts,
            DashboardStats,
            WeeklyPoint,
            DashboardResponse,
            StudentRecap,
            DailyRecap,
            MonthlyRecap,
            CameraCheckIn,
            ExcuseRequest,
            CheckInStats
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Auth", description = "Accounts and tokens"),
        (name = "Students", description = "Student roster APIs"),
        (name = "Attendance", description = "Daily attendance APIs"),
        (name = "Dashboard", description = "Admin dashboard"),
        (name = "Recap", description = "Monthly recap APIs"),
        (name = "Check-in", description = "Student self check-in APIs"),
    )
)]
pub struct ApiDoc;

pub struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_route_is_documented_with_bearer_scheme() {
        let doc = ApiDoc::openapi();
        for path in [
            "/auth/sign-in",
            "/api/session",
            "/api/students/{student_id}",
            "/api/students/export",
            "/api/attendance/{record_id}",
            "/api/dashboard",
            "/api/recap/export",
            "/api/me/attendance/camera",
            "/photos/attendance-photos/{file}",
        ] {
            assert!(doc.paths.paths.contains_key(path), "{path}");
        }
        let components = doc.components.unwrap();
        assert!(components.security_schemes.contains_key("bearer_auth"));
    }
}
