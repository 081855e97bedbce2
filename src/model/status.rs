use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumIter, EnumString};
use utoipa::ToSchema;

/// Attendance status as stored in the backend tables.
#[derive(
    Debug,
    Copy,
    Clone,
    Eq,
    PartialEq,
    Hash,
    Serialize,
    Deserialize,
    ToSchema,
    EnumString,
    Display,
    AsRefStr,
    EnumIter,
)]
pub enum AttendanceStatus {
    #[serde(rename = "hadir")]
    #[strum(serialize = "hadir")]
    Present,
    #[serde(rename = "terlambat")]
    #[strum(serialize = "terlambat")]
    Late,
    #[serde(rename = "sakit")]
    #[strum(serialize = "sakit")]
    Sick,
    #[serde(rename = "alpha")]
    #[strum(serialize = "alpha")]
    Absent,
    #[serde(rename = "izin")]
    #[strum(serialize = "izin")]
    Excused,
}

impl AttendanceStatus {
    /// Statuses an administrator can pick on the daily form.
    pub const ADMIN_ENTRY: [AttendanceStatus; 4] = [
        AttendanceStatus::Present,
        AttendanceStatus::Late,
        AttendanceStatus::Sick,
        AttendanceStatus::Absent,
    ];
}

impl TryFrom<String> for AttendanceStatus {
    type Error = strum::ParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// How a self check-in was captured.
#[derive(
    Debug,
    Copy,
    Clone,
    Eq,
    PartialEq,
    Serialize,
    Deserialize,
    ToSchema,
    EnumString,
    Display,
    AsRefStr,
)]
pub enum CheckInMethod {
    #[serde(rename = "kamera")]
    #[strum(serialize = "kamera")]
    Camera,
    #[serde(rename = "manual")]
    #[strum(serialize = "manual")]
    Manual,
    #[serde(rename = "izin")]
    #[strum(serialize = "izin")]
    Excused,
}

impl TryFrom<String> for CheckInMethod {
    type Error = strum::ParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strum::IntoEnumIterator;

    #[test]
    fn wire_values_match_backend_rows() {
        let wire: Vec<String> = AttendanceStatus::iter().map(|s| s.to_string()).collect();
        assert_eq!(wire, ["hadir", "terlambat", "sakit", "alpha", "izin"]);
        assert_eq!(
            serde_json::to_string(&AttendanceStatus::Late).unwrap(),
            "\"terlambat\""
        );
        assert_eq!(CheckInMethod::Camera.as_ref(), "kamera");
    }

    #[test]
    fn unknown_status_is_rejected() {
        assert!(AttendanceStatus::try_from("present".to_string()).is_err());
        assert_eq!(
            AttendanceStatus::try_from("alpha".to_string()).unwrap(),
            AttendanceStatus::Absent
        );
    }
}
