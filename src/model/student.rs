use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};
use utoipa::ToSchema;

#[derive(
    Debug, Copy, Clone, Eq, PartialEq, Serialize, Deserialize, ToSchema, EnumString, Display, AsRefStr,
)]
pub enum Gender {
    #[serde(rename = "L")]
    #[strum(serialize = "L")]
    Male,
    #[serde(rename = "P")]
    #[strum(serialize = "P")]
    Female,
}

impl TryFrom<String> for Gender {
    type Error = strum::ParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// Enrollment status. Parsing is case-insensitive so list filters can
/// pass `aktif` / `nonaktif`.
#[derive(
    Debug, Copy, Clone, Eq, PartialEq, Serialize, Deserialize, ToSchema, EnumString, Display, AsRefStr,
)]
#[strum(ascii_case_insensitive)]
pub enum StudentStatus {
    #[serde(rename = "Aktif")]
    #[strum(serialize = "Aktif")]
    Active,
    #[serde(rename = "Nonaktif")]
    #[strum(serialize = "Nonaktif")]
    Inactive,
}

impl TryFrom<String> for StudentStatus {
    type Error = strum::ParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
#[schema(
    example = json!({
        "id": 1,
        "name": "Ahmad Rizki Maulana",
        "nis": "12345001",
        "class_name": "XII IPA 1",
        "gender": "L",
        "address": "Jl. Merdeka No. 123, Kebayoran Baru, Jakarta Selatan",
        "phone": "081234567890",
        "email": "ahmad.rizki@email.com",
        "birth_date": "2005-03-15",
        "homeroom_teacher": "Bu Sari Indrawati",
        "status": "Aktif"
    })
)]
pub struct Student {
    pub id: u64,
    pub name: String,
    /// Student number (NIS)
    pub nis: String,
    pub class_name: String,
    #[sqlx(try_from = "String")]
    pub gender: Gender,
    pub address: String,
    pub phone: String,
    pub email: String,
    #[schema(value_type = String, format = "date")]
    pub birth_date: NaiveDate,
    pub homeroom_teacher: String,
    #[sqlx(try_from = "String")]
    pub status: StudentStatus,
}

impl Student {
    pub fn is_active(&self) -> bool {
        self.status == StudentStatus::Active
    }
}
