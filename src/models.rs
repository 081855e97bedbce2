use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Deserialize, ToSchema)]
pub struct SignUpReq {
    #[schema(example = "siswa@sekolah.sch.id", format = "email")]
    pub email: String,
    #[schema(example = "rahasia123")]
    pub password: String,
    #[schema(example = "Ahmad Rizki Maulana")]
    pub full_name: Option<String>,
}

#[derive(Deserialize, ToSchema)]
pub struct SignInReq {
    #[schema(example = "siswa@sekolah.sch.id", format = "email")]
    pub email: String,
    pub password: String,
}

#[derive(Deserialize, ToSchema)]
pub struct ResetPasswordReq {
    #[schema(example = "siswa@sekolah.sch.id", format = "email")]
    pub email: String,
}

#[derive(Deserialize, ToSchema)]
pub struct UpdatePasswordReq {
    pub password: String,
}

#[derive(Serialize, Deserialize, ToSchema)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub user_id: u64,
    /// email
    pub sub: String,
    pub role: u8,
    pub exp: usize,
    pub jti: String,

    pub token_type: TokenType,
    /// Present only if this account is linked to a roster entry
    pub student_id: Option<u64>,
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub enum TokenType {
    Access,
    Refresh,
    Reset,
}
