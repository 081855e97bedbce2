use crate::{
    auth::auth::AuthUser,
    error::ApiError,
    model::student::{Gender, Student, StudentStatus},
    report::{
        csv_export::roster_csv,
        roster::{StudentFilter, roster_summary},
    },
    utils::db_utils::{SqlValue, build_update, execute_update, patch_object},
};
use actix_web::{HttpResponse, Responder, http::header, web};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use sqlx::MySqlPool;
use std::collections::BTreeMap;
use tracing::{debug, info};
use utoipa::ToSchema;

const STUDENT_COLUMNS: [&str; 10] = [
    "name",
    "nis",
    "class_name",
    "gender",
    "address",
    "phone",
    "email",
    "birth_date",
    "homeroom_teacher",
    "status",
];

const MIN_NIS_LEN: usize = 8;

#[derive(Debug, Deserialize, Serialize, ToSchema)]
pub struct StudentInput {
    #[serde(default)]
    #[schema(example = "Ahmad Rizki Maulana")]
    pub name: String,
    #[serde(default)]
    #[schema(example = "12345001")]
    pub nis: String,
    #[serde(default)]
    #[schema(example = "XII IPA 1")]
    pub class_name: String,
    pub gender: Gender,
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    #[schema(example = "081234567890")]
    pub phone: String,
    #[serde(default)]
    #[schema(example = "ahmad.rizki@email.com", format = "email")]
    pub email: String,
    #[schema(example = "2005-03-15", value_type = String, format = "date")]
    pub birth_date: NaiveDate,
    #[serde(default)]
    #[schema(example = "Bu Sari Indrawati")]
    pub homeroom_teacher: String,
    pub status: Option<StudentStatus>,
}

fn is_valid_phone(phone: &str) -> bool {
    phone
        .chars()
        .all(|c| c.is_ascii_digit() || c.is_whitespace() || "+-()".contains(c))
}

fn is_valid_email(email: &str) -> bool {
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    let clean = |s: &str| !s.is_empty() && !s.contains('@') && !s.chars().any(char::is_whitespace);
    clean(local)
        && clean(domain)
        && domain
            .char_indices()
            .any(|(i, c)| c == '.' && i > 0 && i + 1 < domain.len())
}

impl StudentInput {
    /// Collects every field problem instead of stopping at the first.
    pub fn validate(&self) -> Result<(), ApiError> {
        let mut errors: BTreeMap<&'static str, String> = BTreeMap::new();

        if self.name.trim().is_empty() {
            errors.insert("name", "Name is required".into());
        }

        let nis = self.nis.trim();
        if nis.is_empty() {
            errors.insert("nis", "NIS is required".into());
        } else if nis.chars().count() < MIN_NIS_LEN {
            errors.insert("nis", format!("NIS must be at least {MIN_NIS_LEN} characters"));
        }

        if self.class_name.trim().is_empty() {
            errors.insert("class_name", "Class is required".into());
        }

        if self.address.trim().is_empty() {
            errors.insert("address", "Address is required".into());
        }

        let phone = self.phone.trim();
        if phone.is_empty() {
            errors.insert("phone", "Phone number is required".into());
        } else if !is_valid_phone(phone) {
            errors.insert("phone", "Phone number format is invalid".into());
        }

        let email = self.email.trim();
        if email.is_empty() {
            errors.insert("email", "Email is required".into());
        } else if !is_valid_email(email) {
            errors.insert("email", "Email format is invalid".into());
        }

        if self.homeroom_teacher.trim().is_empty() {
            errors.insert("homeroom_teacher", "Homeroom teacher is required".into());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ApiError::Validation(errors))
        }
    }
}

/// Overlays a checked patch on the stored row.
fn merge_student(current: &Student, patch: &Map<String, Value>) -> Result<StudentInput, ApiError> {
    let mut merged =
        serde_json::to_value(current).map_err(|e| ApiError::internal("Failed to read student", e))?;
    if let Some(obj) = merged.as_object_mut() {
        for (k, v) in patch {
            obj.insert(k.clone(), v.clone());
        }
    }
    serde_json::from_value(merged)
        .map_err(|e| ApiError::bad_request(format!("Invalid student data: {e}")))
}

/// Every column, trimmed the same way `create_student` stores them.
fn student_assignments(
    input: &StudentInput,
    current_status: StudentStatus,
) -> Vec<(&'static str, SqlValue)> {
    let text = |s: &str| SqlValue::String(s.trim().to_string());
    vec![
        ("name", text(&input.name)),
        ("nis", text(&input.nis)),
        ("class_name", text(&input.class_name)),
        ("gender", text(input.gender.as_ref())),
        ("address", text(&input.address)),
        ("phone", text(&input.phone)),
        ("email", text(&input.email)),
        ("birth_date", SqlValue::Date(input.birth_date)),
        ("homeroom_teacher", text(&input.homeroom_teacher)),
        ("status", text(input.status.unwrap_or(current_status).as_ref())),
    ]
}

#[derive(Serialize, ToSchema)]
pub struct StudentListResponse {
    pub data: Vec<Student>,
    /// Rows after filtering
    pub filtered: usize,
    /// Rows on the roster
    pub total: usize,
}

// -------------------- queries shared with other modules --------------------

pub async fn fetch_students(pool: &MySqlPool) -> Result<Vec<Student>, sqlx::Error> {
    sqlx::query_as::<_, Student>("SELECT * FROM students ORDER BY id")
        .fetch_all(pool)
        .await
}

pub async fn fetch_student(pool: &MySqlPool, id: u64) -> Result<Option<Student>, sqlx::Error> {
    sqlx::query_as::<_, Student>("SELECT * FROM students WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await
}

pub async fn count_students(pool: &MySqlPool) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM students")
        .fetch_one(pool)
        .await
}

// -------------------- handlers --------------------

/// List students
#[utoipa::path(
    get,
    path = "/api/students",
    params(StudentFilter),
    responses(
        (status = 200, description = "Filtered roster", body = StudentListResponse),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden")
    ),
    tag = "Students",
    security(("bearer_auth" = []))
)]
pub async fn list_students(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<StudentFilter>,
) -> actix_web::Result<impl Responder> {
    auth.require_admin()?;

    let students = fetch_students(pool.get_ref())
        .await
        .map_err(|e| ApiError::internal("Failed to fetch students", e))?;
    let total = students.len();
    let data = query.apply(students);
    debug!(total, filtered = data.len(), "Listed students");

    Ok(HttpResponse::Ok().json(StudentListResponse {
        filtered: data.len(),
        total,
        data,
    }))
}

/// Roster summary
#[utoipa::path(
    get,
    path = "/api/students/summary",
    responses(
        (status = 200, description = "Roster counts", body = RosterSummary),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden")
    ),
    tag = "Students",
    security(("bearer_auth" = []))
)]
pub async fn student_summary(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
) -> actix_web::Result<impl Responder> {
    auth.require_admin()?;

    let students = fetch_students(pool.get_ref())
        .await
        .map_err(|e| ApiError::internal("Failed to fetch students", e))?;

    Ok(HttpResponse::Ok().json(roster_summary(&students)))
}

/// Get Student by ID
#[utoipa::path(
    get,
    path = "/api/students/{student_id}",
    params(("student_id", Path, description = "Student ID")),
    responses(
        (status = 200, description = "Student found", body = Student),
        (status = 404, description = "Student not found", body = Object, example = json!({
            "message": "Student not found"
        }))
    ),
    tag = "Students",
    security(("bearer_auth" = []))
)]
pub async fn get_student(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> actix_web::Result<impl Responder> {
    auth.require_admin()?;
    let student_id = path.into_inner();

    let student = fetch_student(pool.get_ref(), student_id)
        .await
        .map_err(|e| ApiError::internal("Failed to fetch student", e))?
        .ok_or_else(|| ApiError::not_found("Student not found"))?;

    Ok(HttpResponse::Ok().json(student))
}

/// Create Student
#[utoipa::path(
    post,
    path = "/api/students",
    request_body = StudentInput,
    responses(
        (status = 201, description = "Student created", body = Student),
        (status = 400, description = "Validation failed", body = Object, example = json!({
            "message": "Validation failed",
            "errors": {"nis": "NIS must be at least 8 characters"}
        }))
    ),
    tag = "Students",
    security(("bearer_auth" = []))
)]
pub async fn create_student(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    payload: web::Json<StudentInput>,
) -> actix_web::Result<impl Responder> {
    auth.require_admin()?;
    payload.validate()?;

    let status = payload.status.unwrap_or(StudentStatus::Active);
    let result = sqlx::query(
        r#"
        INSERT INTO students
        (name, nis, class_name, gender, address, phone, email, birth_date, homeroom_teacher, status)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(payload.name.trim())
    .bind(payload.nis.trim())
    .bind(payload.class_name.trim())
    .bind(payload.gender.as_ref())
    .bind(payload.address.trim())
    .bind(payload.phone.trim())
    .bind(payload.email.trim())
    .bind(payload.birth_date)
    .bind(payload.homeroom_teacher.trim())
    .bind(status.as_ref())
    .execute(pool.get_ref())
    .await
    .map_err(|e| ApiError::internal("Failed to create student", e))?;

    let student_id = result.last_insert_id();
    info!(student_id, nis = %payload.nis, "Student created");

    let student = fetch_student(pool.get_ref(), student_id)
        .await
        .map_err(|e| ApiError::internal("Failed to fetch student", e))?
        .ok_or(ApiError::Internal)?;

    Ok(HttpResponse::Created().json(student))
}

/// Update Student
///
/// Accepts any subset of the student fields; the merged result must
/// still pass validation.
#[utoipa::path(
    put,
    path = "/api/students/{student_id}",
    params(("student_id", Path, description = "Student ID")),
    request_body = Object,
    responses(
        (status = 200, description = "Student updated", body = Student),
        (status = 400, description = "Validation failed"),
        (status = 404, description = "Student not found")
    ),
    tag = "Students",
    security(("bearer_auth" = []))
)]
pub async fn update_student(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
    body: web::Json<Value>,
) -> actix_web::Result<impl Responder> {
    auth.require_admin()?;
    let student_id = path.into_inner();

    let patch = patch_object(&body, &STUDENT_COLUMNS)?;

    let current = fetch_student(pool.get_ref(), student_id)
        .await
        .map_err(|e| ApiError::internal("Failed to fetch student", e))?
        .ok_or_else(|| ApiError::not_found("Student not found"))?;

    let merged = merge_student(&current, patch)?;
    merged.validate()?;

    let update = build_update(
        "students",
        student_assignments(&merged, current.status),
        "id",
        student_id,
    )?;
    execute_update(pool.get_ref(), update)
        .await
        .map_err(|e| ApiError::internal("Failed to update student", e))?;

    let student = fetch_student(pool.get_ref(), student_id)
        .await
        .map_err(|e| ApiError::internal("Failed to fetch student", e))?
        .ok_or_else(|| ApiError::not_found("Student not found"))?;

    Ok(HttpResponse::Ok().json(student))
}

/// Delete Student
#[utoipa::path(
    delete,
    path = "/api/students/{student_id}",
    params(("student_id", Path, description = "Student ID")),
    responses(
        (status = 200, description = "Successfully deleted", body = Object, example = json!({
            "message": "Successfully deleted"
        })),
        (status = 404, description = "Student not found")
    ),
    tag = "Students",
    security(("bearer_auth" = []))
)]
pub async fn delete_student(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> actix_web::Result<impl Responder> {
    auth.require_admin()?;
    let student_id = path.into_inner();

    let result = sqlx::query("DELETE FROM students WHERE id = ?")
        .bind(student_id)
        .execute(pool.get_ref())
        .await
        .map_err(|e| ApiError::internal("Failed to delete student", e))?;

    if result.rows_affected() == 0 {
        return Err(ApiError::not_found("Student not found").into());
    }

    info!(student_id, "Student deleted");
    Ok(HttpResponse::Ok().json(json!({ "message": "Successfully deleted" })))
}

/// Export the roster as CSV
#[utoipa::path(
    get,
    path = "/api/students/export",
    responses(
        (status = 200, description = "CSV file, header plus one row per student", body = String, content_type = "text/csv")
    ),
    tag = "Students",
    security(("bearer_auth" = []))
)]
pub async fn export_students(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
) -> actix_web::Result<impl Responder> {
    auth.require_admin()?;

    let students = fetch_students(pool.get_ref())
        .await
        .map_err(|e| ApiError::internal("Failed to fetch students", e))?;
    let body = roster_csv(&students).map_err(|e| ApiError::internal("Failed to render CSV", e))?;

    Ok(HttpResponse::Ok()
        .content_type("text/csv; charset=utf-8")
        .insert_header((
            header::CONTENT_DISPOSITION,
            "attachment; filename=\"data-siswa.csv\"",
        ))
        .body(body))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid() -> StudentInput {
        StudentInput {
            name: "Ahmad Rizki Maulana".into(),
            nis: "12345001".into(),
            class_name: "XII IPA 1".into(),
            gender: Gender::Male,
            address: "Jl. Merdeka No. 123".into(),
            phone: "+62 (812) 3456-7890".into(),
            email: "ahmad.rizki@email.com".into(),
            birth_date: NaiveDate::from_ymd_opt(2005, 3, 15).unwrap(),
            homeroom_teacher: "Bu Sari Indrawati".into(),
            status: None,
        }
    }

    fn field_errors(input: StudentInput) -> BTreeMap<&'static str, String> {
        match input.validate() {
            Err(ApiError::Validation(errors)) => errors,
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn complete_form_passes() {
        assert!(valid().validate().is_ok());
    }

    #[test]
    fn short_nis_is_rejected() {
        let errors = field_errors(StudentInput {
            nis: "1234567".into(),
            ..valid()
        });
        assert_eq!(errors["nis"], "NIS must be at least 8 characters");
        assert_eq!(errors.len(), 1);
    }

    #[test]
    fn all_missing_fields_are_reported_together() {
        let errors = field_errors(StudentInput {
            name: " ".into(),
            class_name: String::new(),
            address: String::new(),
            phone: String::new(),
            email: String::new(),
            homeroom_teacher: String::new(),
            ..valid()
        });
        let fields: Vec<&str> = errors.keys().copied().collect();
        assert_eq!(
            fields,
            vec!["address", "class_name", "email", "homeroom_teacher", "name", "phone"]
        );
    }

    #[test]
    fn phone_and_email_shapes() {
        assert!(is_valid_phone("0812-3456-7890"));
        assert!(!is_valid_phone("0812 abc"));

        assert!(is_valid_email("a@b.co"));
        assert!(!is_valid_email("a@b"));
        assert!(!is_valid_email("a b@c.id"));
        assert!(!is_valid_email("@c.id"));
        assert!(!is_valid_email("a@.id"));
        assert!(!is_valid_email("a@@c.id"));
    }

    #[test]
    fn missing_strings_deserialize_empty_and_fail_validation() {
        let input: StudentInput =
            serde_json::from_value(json!({"gender": "P", "birth_date": "2005-07-22"})).unwrap();
        assert!(matches!(input.validate(), Err(ApiError::Validation(_))));
    }

    fn stored() -> Student {
        Student {
            id: 1,
            name: "Sari".into(),
            nis: "12345002".into(),
            class_name: "XII IPA 1".into(),
            gender: Gender::Female,
            address: "Jl. Sudirman".into(),
            phone: "081234567891".into(),
            email: "sari@email.com".into(),
            birth_date: NaiveDate::from_ymd_opt(2005, 7, 22).unwrap(),
            homeroom_teacher: "Bu Sari".into(),
            status: StudentStatus::Active,
        }
    }

    #[test]
    fn patch_merges_over_stored_row() {
        let body = json!({"status": "Nonaktif"});
        let patch = patch_object(&body, &STUDENT_COLUMNS).unwrap();
        let input = merge_student(&stored(), patch).unwrap();
        assert_eq!(input.status, Some(StudentStatus::Inactive));
        assert_eq!(input.name, "Sari");
        assert!(input.validate().is_ok());
    }

    #[test]
    fn null_fields_never_reach_the_update() {
        for body in [json!({"status": null}), json!({"name": null})] {
            let err = patch_object(&body, &STUDENT_COLUMNS).unwrap_err();
            assert!(matches!(err, ApiError::BadRequest(_)));
        }
    }

    #[test]
    fn update_writes_trimmed_merged_values() {
        let body = json!({"name": "  Sari Dewi  ", "phone": " 0812 "});
        let patch = patch_object(&body, &STUDENT_COLUMNS).unwrap();
        let input = merge_student(&stored(), patch).unwrap();

        let assignments = student_assignments(&input, StudentStatus::Active);
        let columns: Vec<&str> = assignments.iter().map(|(c, _)| *c).collect();
        assert_eq!(columns, STUDENT_COLUMNS.to_vec());
        assert_eq!(assignments[0].1, SqlValue::String("Sari Dewi".into()));
        assert_eq!(assignments[5].1, SqlValue::String("0812".into()));
        assert_eq!(assignments[3].1, SqlValue::String("P".into()));
        assert_eq!(assignments[9].1, SqlValue::String("Aktif".into()));
    }

    #[test]
    fn bad_enum_in_patch_is_a_bad_request() {
        let body = json!({"gender": "X"});
        let patch = patch_object(&body, &STUDENT_COLUMNS).unwrap();
        assert!(matches!(
            merge_student(&stored(), patch),
            Err(ApiError::BadRequest(_))
        ));
    }
}
