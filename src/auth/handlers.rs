use crate::{
    auth::{
        auth::{AuthUser, bearer_token},
        jwt::{Subject, generate_access_token, generate_refresh_token, generate_token, verify_token},
        password::{MIN_PASSWORD_LEN, hash_password, verify_password},
    },
    config::Config,
    error::ApiError,
    model::{role::Role, user::User},
    models::{
        Claims, ResetPasswordReq, SignInReq, SignUpReq, TokenPair, TokenType, UpdatePasswordReq,
    },
    utils::{email_cache, email_filter},
};
use actix_web::{HttpRequest, HttpResponse, Responder, web};
use serde::Serialize;
use serde_json::json;
use sqlx::MySqlPool;
use tracing::{debug, error, info, instrument, warn};
use utoipa::ToSchema;

const USER_COLUMNS: &str = "id, email, password, full_name, role_id, student_id";

#[derive(Debug, Serialize, ToSchema)]
pub struct SessionResponse {
    pub id: u64,
    pub email: String,
    pub full_name: Option<String>,
    /// `admin` or `student`
    #[schema(example = "student")]
    pub role: String,
    pub student_id: Option<u64>,
}

fn check_credentials(email: &str, password: &str) -> Result<String, ApiError> {
    let email = email_filter::normalize(email);
    if email.is_empty() || password.is_empty() {
        return Err(ApiError::bad_request("Email and password must not be empty"));
    }
    Ok(email)
}

fn check_new_password(password: &str) -> Result<(), ApiError> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(ApiError::bad_request(format!(
            "Password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }
    Ok(())
}

fn reset_link(base: &str, token: &str) -> String {
    format!("{}?token={}", base.trim_end_matches('/'), token)
}

fn subject_of(user: &User) -> Subject {
    Subject {
        user_id: user.id,
        email: user.email.clone(),
        role: user.role_id,
        student_id: user.student_id,
    }
}

fn token_error(e: jsonwebtoken::errors::Error) -> ApiError {
    ApiError::internal("Failed to sign token", e)
}

async fn find_user_by_email(pool: &MySqlPool, email: &str) -> Result<Option<User>, sqlx::Error> {
    sqlx::query_as::<_, User>(&format!("SELECT {USER_COLUMNS} FROM users WHERE email = ?"))
        .bind(email)
        .fetch_optional(pool)
        .await
}

async fn find_user_by_id(pool: &MySqlPool, id: u64) -> Result<Option<User>, sqlx::Error> {
    sqlx::query_as::<_, User>(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?"))
        .bind(id)
        .fetch_optional(pool)
        .await
}

/// true  => email AVAILABLE
/// false => email TAKEN
pub async fn is_email_available(email: &str, pool: &MySqlPool) -> Result<bool, sqlx::Error> {
    let email = email_filter::normalize(email);

    // cuckoo filter: a miss is definite
    if !email_filter::might_exist(&email) {
        return Ok(true);
    }

    // moka cache: a hit is definite
    if email_cache::is_taken(&email).await {
        return Ok(false);
    }

    let exists = sqlx::query_scalar::<_, bool>(
        "SELECT EXISTS(SELECT 1 FROM users WHERE email = ? LIMIT 1)",
    )
    .bind(&email)
    .fetch_one(pool)
    .await?;

    if exists {
        email_cache::mark_taken(&email).await;
    }
    Ok(!exists)
}

async fn store_refresh_token(pool: &MySqlPool, claims: &Claims) -> Result<(), ApiError> {
    sqlx::query(
        r#"
        INSERT INTO refresh_tokens (user_id, jti, expires_at)
        VALUES (?, ?, FROM_UNIXTIME(?))
        "#,
    )
    .bind(claims.user_id)
    .bind(&claims.jti)
    .bind(claims.exp as i64)
    .execute(pool)
    .await
    .map_err(|e| ApiError::internal("Failed to store refresh token", e))?;
    Ok(())
}

async fn issue_pair(pool: &MySqlPool, config: &Config, subject: &Subject) -> Result<TokenPair, ApiError> {
    let access_token =
        generate_access_token(subject, &config.jwt_secret, config.access_token_ttl)
            .map_err(token_error)?;
    let (refresh_token, refresh_claims) =
        generate_refresh_token(subject, &config.jwt_secret, config.refresh_token_ttl)
            .map_err(token_error)?;

    debug!(user_id = subject.user_id, jti = %refresh_claims.jti, "Storing refresh token");
    store_refresh_token(pool, &refresh_claims).await?;

    Ok(TokenPair {
        access_token,
        refresh_token,
    })
}

/// Create a student account
#[utoipa::path(
    post,
    path = "/auth/sign-up",
    request_body = SignUpReq,
    responses(
        (status = 201, description = "Account created", body = Object, example = json!({
            "message": "Account created"
        })),
        (status = 400, description = "Missing fields or short password"),
        (status = 409, description = "Email already registered")
    ),
    tag = "Auth"
)]
pub async fn sign_up(
    body: web::Json<SignUpReq>,
    pool: web::Data<MySqlPool>,
) -> actix_web::Result<impl Responder> {
    let email = check_credentials(&body.email, &body.password)?;
    check_new_password(&body.password)?;

    let available = is_email_available(&email, pool.get_ref())
        .await
        .map_err(|e| ApiError::internal("Failed to check email", e))?;
    if !available {
        return Err(ApiError::conflict("Email already registered").into());
    }

    let hashed = hash_password(&body.password)
        .map_err(|e| ApiError::internal("Failed to hash password", e))?;
    let full_name = body
        .full_name
        .as_deref()
        .map(str::trim)
        .filter(|n| !n.is_empty());

    let result = sqlx::query(
        "INSERT INTO users (email, password, full_name, role_id) VALUES (?, ?, ?, ?)",
    )
    .bind(&email)
    .bind(&hashed)
    .bind(full_name)
    .bind(Role::Student.id())
    .execute(pool.get_ref())
    .await;

    match result {
        Ok(done) => {
            email_filter::insert(&email);
            email_cache::mark_taken(&email).await;
            info!(user_id = done.last_insert_id(), "Account created");
            Ok(HttpResponse::Created().json(json!({ "message": "Account created" })))
        }
        Err(sqlx::Error::Database(db_err)) if db_err.code().as_deref() == Some("23000") => {
            email_cache::mark_taken(&email).await;
            Err(ApiError::conflict("Email already registered").into())
        }
        Err(e) => Err(ApiError::internal("Failed to register user", e).into()),
    }
}

/// Sign in with email and password
#[utoipa::path(
    post,
    path = "/auth/sign-in",
    request_body = SignInReq,
    responses(
        (status = 200, description = "Token pair", body = TokenPair),
        (status = 400, description = "Missing fields"),
        (status = 401, description = "Invalid credentials")
    ),
    tag = "Auth"
)]
#[instrument(name = "auth_sign_in", skip(pool, config, body), fields(email = %body.email))]
pub async fn sign_in(
    body: web::Json<SignInReq>,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
) -> actix_web::Result<impl Responder> {
    info!("Sign-in request received");
    let email = check_credentials(&body.email, &body.password)?;

    let user = find_user_by_email(pool.get_ref(), &email)
        .await
        .map_err(|e| ApiError::internal("Failed to fetch user", e))?;
    let Some(user) = user else {
        info!("Invalid credentials: unknown email");
        return Err(ApiError::Unauthorized("Invalid credentials".into()).into());
    };

    if let Err(e) = verify_password(&body.password, &user.password) {
        info!(error = %e, "Invalid credentials: password mismatch");
        return Err(ApiError::Unauthorized("Invalid credentials".into()).into());
    }

    let pair = issue_pair(pool.get_ref(), &config, &subject_of(&user)).await?;

    if let Err(e) = sqlx::query("UPDATE users SET last_login_at = NOW() WHERE id = ?")
        .bind(user.id)
        .execute(pool.get_ref())
        .await
    {
        // sign-in still succeeds
        error!(error = %e, "Failed to update last_login_at");
    }

    info!(user_id = user.id, "Sign-in successful");
    Ok(HttpResponse::Ok().json(pair))
}

/// Exchange a refresh token for a new pair
#[utoipa::path(
    post,
    path = "/auth/refresh",
    responses(
        (status = 200, description = "Rotated token pair", body = TokenPair),
        (status = 401, description = "Missing, revoked or invalid refresh token")
    ),
    tag = "Auth",
    security(("bearer_auth" = []))
)]
pub async fn refresh(
    req: HttpRequest,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
) -> actix_web::Result<impl Responder> {
    let token = bearer_token(&req).ok_or_else(|| ApiError::Unauthorized("Missing token".into()))?;
    let claims = verify_token(token, &config.jwt_secret)
        .map_err(|_| ApiError::Unauthorized("Invalid token".into()))?;
    if claims.token_type != TokenType::Refresh {
        return Err(ApiError::Unauthorized("Refresh token required".into()).into());
    }

    // revoke first; only one rotation per token succeeds
    let revoked = sqlx::query("UPDATE refresh_tokens SET revoked = 1 WHERE jti = ? AND revoked = 0")
        .bind(&claims.jti)
        .execute(pool.get_ref())
        .await
        .map_err(|e| ApiError::internal("Failed to revoke refresh token", e))?;
    if revoked.rows_affected() == 0 {
        warn!(user_id = claims.user_id, "Refresh with unknown or revoked token");
        return Err(ApiError::Unauthorized("Invalid token".into()).into());
    }

    let pair = issue_pair(pool.get_ref(), &config, &Subject::from(&claims)).await?;
    Ok(HttpResponse::Ok().json(pair))
}

/// Revoke a refresh token
#[utoipa::path(
    post,
    path = "/auth/sign-out",
    responses((status = 204, description = "Signed out")),
    tag = "Auth",
    security(("bearer_auth" = []))
)]
pub async fn sign_out(
    req: HttpRequest,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
) -> impl Responder {
    let claims = bearer_token(&req).and_then(|t| verify_token(t, &config.jwt_secret).ok());

    if let Some(claims) = claims.filter(|c| c.token_type == TokenType::Refresh) {
        if let Err(e) = sqlx::query("UPDATE refresh_tokens SET revoked = 1 WHERE jti = ?")
            .bind(&claims.jti)
            .execute(pool.get_ref())
            .await
        {
            error!(error = %e, "Failed to revoke refresh token");
        }
    }

    HttpResponse::NoContent().finish()
}

/// Request a password reset link
#[utoipa::path(
    post,
    path = "/auth/reset-password",
    request_body = ResetPasswordReq,
    responses((status = 202, description = "Accepted, whether or not the email is registered")),
    tag = "Auth"
)]
pub async fn reset_password(
    body: web::Json<ResetPasswordReq>,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
) -> actix_web::Result<impl Responder> {
    let email = email_filter::normalize(&body.email);
    if email.is_empty() {
        return Err(ApiError::bad_request("Email must not be empty").into());
    }
    let accepted = HttpResponse::Accepted().json(json!({
        "message": "If the email is registered, a reset link has been sent"
    }));

    let user = find_user_by_email(pool.get_ref(), &email)
        .await
        .map_err(|e| ApiError::internal("Failed to fetch user", e))?;
    let Some(user) = user else {
        debug!("Reset requested for unknown email");
        return Ok(accepted);
    };

    let (token, claims) = generate_token(
        &subject_of(&user),
        TokenType::Reset,
        &config.jwt_secret,
        config.reset_token_ttl,
    )
    .map_err(token_error)?;

    sqlx::query(
        r#"
        INSERT INTO password_resets (user_id, jti, expires_at)
        VALUES (?, ?, FROM_UNIXTIME(?))
        "#,
    )
    .bind(user.id)
    .bind(&claims.jti)
    .bind(claims.exp as i64)
    .execute(pool.get_ref())
    .await
    .map_err(|e| ApiError::internal("Failed to store reset token", e))?;

    // no mailer: the delivery log is the outbox
    info!(
        target: "absensi::outbox",
        to = %user.email,
        link = %reset_link(&config.reset_url_base, &token),
        "Password reset link"
    );

    Ok(accepted)
}

/// Set a new password
#[utoipa::path(
    post,
    path = "/auth/update-password",
    request_body = UpdatePasswordReq,
    responses(
        (status = 200, description = "Password updated"),
        (status = 400, description = "Password too short"),
        (status = 401, description = "Missing, used or invalid token")
    ),
    tag = "Auth",
    security(("bearer_auth" = []))
)]
pub async fn update_password(
    req: HttpRequest,
    body: web::Json<UpdatePasswordReq>,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
) -> actix_web::Result<impl Responder> {
    check_new_password(&body.password)?;

    let token = bearer_token(&req).ok_or_else(|| ApiError::Unauthorized("Missing token".into()))?;
    let claims = verify_token(token, &config.jwt_secret)
        .map_err(|_| ApiError::Unauthorized("Invalid token".into()))?;

    match claims.token_type {
        TokenType::Access => {}
        TokenType::Reset => {
            let used = sqlx::query("UPDATE password_resets SET used = 1 WHERE jti = ? AND used = 0")
                .bind(&claims.jti)
                .execute(pool.get_ref())
                .await
                .map_err(|e| ApiError::internal("Failed to consume reset token", e))?;
            if used.rows_affected() == 0 {
                return Err(ApiError::Unauthorized("Reset link already used".into()).into());
            }
        }
        TokenType::Refresh => {
            return Err(ApiError::Unauthorized("Invalid token".into()).into());
        }
    }

    let hashed = hash_password(&body.password)
        .map_err(|e| ApiError::internal("Failed to hash password", e))?;
    let updated = sqlx::query("UPDATE users SET password = ? WHERE id = ?")
        .bind(&hashed)
        .bind(claims.user_id)
        .execute(pool.get_ref())
        .await
        .map_err(|e| ApiError::internal("Failed to update password", e))?;
    if updated.rows_affected() == 0 {
        return Err(ApiError::Unauthorized("Account no longer exists".into()).into());
    }

    // a new password ends every other session
    if let Err(e) = sqlx::query("UPDATE refresh_tokens SET revoked = 1 WHERE user_id = ?")
        .bind(claims.user_id)
        .execute(pool.get_ref())
        .await
    {
        error!(error = %e, "Failed to revoke refresh tokens");
    }

    info!(user_id = claims.user_id, via = ?claims.token_type, "Password updated");
    Ok(HttpResponse::Ok().json(json!({ "message": "Password updated" })))
}

/// The signed-in account
#[utoipa::path(
    get,
    path = "/api/session",
    responses(
        (status = 200, description = "Current user", body = SessionResponse),
        (status = 401, description = "Unauthorized")
    ),
    tag = "Auth",
    security(("bearer_auth" = []))
)]
pub async fn session(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
) -> actix_web::Result<impl Responder> {
    let user = find_user_by_id(pool.get_ref(), auth.user_id)
        .await
        .map_err(|e| ApiError::internal("Failed to fetch user", e))?
        .ok_or_else(|| ApiError::Unauthorized("Account no longer exists".into()))?;

    let role = Role::from_id(user.role_id).unwrap_or(auth.role);
    Ok(HttpResponse::Ok().json(SessionResponse {
        id: user.id,
        email: user.email,
        full_name: user.full_name,
        role: role.as_str().to_string(),
        student_id: user.student_id,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::mysql::MySqlPoolOptions;

    #[test]
    fn credentials_are_trimmed_and_lowercased() {
        assert_eq!(
            check_credentials("  Siswa@Sekolah.SCH.id ", "secret").unwrap(),
            "siswa@sekolah.sch.id"
        );
        assert!(check_credentials("   ", "secret").is_err());
        assert!(check_credentials("a@b.c", "").is_err());
    }

    #[test]
    fn new_password_needs_six_characters() {
        assert!(check_new_password("12345").is_err());
        assert!(check_new_password("123456").is_ok());
    }

    #[test]
    fn reset_link_carries_token() {
        assert_eq!(
            reset_link("https://absensi.sch.id/reset-password/", "abc.def"),
            "https://absensi.sch.id/reset-password?token=abc.def"
        );
    }

    #[test]
    fn subject_copies_identity() {
        let user = User {
            id: 3,
            email: "admin@sekolah.sch.id".into(),
            password: "hash".into(),
            full_name: None,
            role_id: Role::Admin.id(),
            student_id: None,
        };
        let subject = subject_of(&user);
        assert_eq!((subject.user_id, subject.role), (3, 1));
        assert_eq!(subject.email, "admin@sekolah.sch.id");
    }

    #[actix_web::test]
    async fn unseen_email_is_available_without_a_query() {
        // lazy pool: any query would fail to connect
        let pool = MySqlPoolOptions::new()
            .connect_lazy("mysql://nobody@127.0.0.1:1/none")
            .unwrap();
        let email = format!("{}@fresh.test", uuid::Uuid::new_v4());
        assert!(is_email_available(&email, &pool).await.unwrap());
    }

    #[actix_web::test]
    async fn cached_email_is_taken_without_a_query() {
        let pool = MySqlPoolOptions::new()
            .connect_lazy("mysql://nobody@127.0.0.1:1/none")
            .unwrap();
        let email = format!("{}@taken.test", uuid::Uuid::new_v4());
        email_filter::insert(&email);
        email_cache::mark_taken(&email).await;
        assert!(!is_email_available(&email, &pool).await.unwrap());
    }
}
