use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use axum::http::header::COOKIE;
use axum::http::HeaderMap;
use chrono::{Duration, Utc};
use rand::Rng;
use serde::Deserialize;
use sqlx::PgPool;
use uuid::Uuid;

use crate::config::Config;
use crate::mailer::{
    login_notice_body, password_reset_body, verification_body, Mailer,
};
use crate::models::{AuthSession, PasswordResetRequest, User, VerificationSession};
use crate::utils::cookie::{session_from_cookie_header, sign_session_id};
use crate::utils::error::AppError;
use crate::utils::validate::{
    email_is_valid, password_meets_policy, ValidationErrors, PASSWORD_MIN_LEN,
};

const SESSION_TTL_DAYS: i64 = 7;
const VERIFICATION_TTL_MINUTES: i64 = 30;
const RESET_TTL_MINUTES: i64 = 30;

#[derive(Debug, Deserialize)]
pub struct SignupInput {
    pub full_name: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginInput {
    pub email: String,
    pub password: String,
}

/// A successful login: the signed value destined for the session cookie
/// plus the authenticated user.
pub struct LoginSession {
    pub cookie_value: String,
    pub user: User,
}

pub fn hash_password(password: &str) -> Result<String, AppError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AppError::Internal(format!("password hashing failed: {e}")))
}

pub fn verify_password(hash: &str, password: &str) -> bool {
    PasswordHash::new(hash)
        .map(|parsed| {
            Argon2::default()
                .verify_password(password.as_bytes(), &parsed)
                .is_ok()
        })
        .unwrap_or(false)
}

/// Six-digit numeric code for password resets, zero-padded.
pub fn generate_reset_code() -> String {
    format!("{:06}", rand::thread_rng().gen_range(0..1_000_000))
}

fn validate_signup(input: &SignupInput) -> Result<(), ValidationErrors> {
    let mut errors = ValidationErrors::default();

    if input.full_name.trim().is_empty() {
        errors.push("full_name", "Full name is required");
    }
    if !email_is_valid(&input.email) {
        errors.push("email", "Email address is invalid");
    }
    if !password_meets_policy(&input.password) {
        errors.push(
            "password",
            format!(
                "Password must be at least {PASSWORD_MIN_LEN} characters and \
                 contain a letter, a digit and a symbol"
            ),
        );
    }

    errors.into_result()
}

/// Create a dashboard account. Only allow-listed addresses may sign up;
/// the account starts unverified and a verification link is emailed.
pub async fn create_account(
    pool: &PgPool,
    config: &Config,
    mailer: &Mailer,
    input: SignupInput,
) -> Result<(), AppError> {
    validate_signup(&input).map_err(AppError::Validation)?;

    let email = input.email.trim().to_string();
    if !config.email_is_allowed(&email) {
        return Err(AppError::Forbidden(
            "This email is not allowed to create an account".to_string(),
        ));
    }

    let exists: bool =
        sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM users WHERE LOWER(email) = LOWER($1))")
            .bind(&email)
            .fetch_one(pool)
            .await?;
    if exists {
        return Err(AppError::Conflict(
            "An account with this email already exists".to_string(),
        ));
    }

    let user: User = sqlx::query_as(
        "INSERT INTO users (id, full_name, email, password_hash, verified, access_level) \
         VALUES ($1, $2, $3, $4, FALSE, 0) \
         RETURNING id, full_name, email, password_hash, verified, access_level, created_at",
    )
    .bind(Uuid::new_v4())
    .bind(input.full_name.trim())
    .bind(&email)
    .bind(hash_password(&input.password)?)
    .fetch_one(pool)
    .await?;

    issue_verification(pool, config, mailer, &user).await
}

/// Issue a fresh verification session, superseding (deleting) any earlier
/// ones for the same user, and email the link.
async fn issue_verification(
    pool: &PgPool,
    config: &Config,
    mailer: &Mailer,
    user: &User,
) -> Result<(), AppError> {
    sqlx::query("DELETE FROM verification_sessions WHERE user_id = $1")
        .bind(user.id)
        .execute(pool)
        .await?;

    let token = Uuid::new_v4();
    sqlx::query(
        "INSERT INTO verification_sessions (id, user_id, expires_at) VALUES ($1, $2, $3)",
    )
    .bind(token)
    .bind(user.id)
    .bind(Utc::now() + Duration::minutes(VERIFICATION_TTL_MINUTES))
    .execute(pool)
    .await?;

    let link = format!("{}/auth/verify?token={token}", config.base_url);
    mailer.send_detached(
        user.email.clone(),
        "Verify your email address",
        verification_body(&user.full_name, &link, VERIFICATION_TTL_MINUTES),
    );

    Ok(())
}

pub async fn login(
    pool: &PgPool,
    config: &Config,
    mailer: &Mailer,
    input: LoginInput,
) -> Result<LoginSession, AppError> {
    let user: Option<User> = sqlx::query_as(
        "SELECT id, full_name, email, password_hash, verified, access_level, created_at \
         FROM users WHERE LOWER(email) = LOWER($1)",
    )
    .bind(input.email.trim())
    .fetch_optional(pool)
    .await?;

    // Same message for unknown email and bad password
    let invalid = || AppError::Auth("Invalid email or password".to_string());
    let user = user.ok_or_else(invalid)?;
    if !verify_password(&user.password_hash, &input.password) {
        return Err(invalid());
    }

    if !user.verified {
        return Err(AppError::Auth(
            "Please verify your email address before logging in".to_string(),
        ));
    }

    let session_id = Uuid::new_v4();
    sqlx::query("INSERT INTO auth_sessions (id, user_id, expires_at) VALUES ($1, $2, $3)")
        .bind(session_id)
        .bind(user.id)
        .bind(Utc::now() + Duration::days(SESSION_TTL_DAYS))
        .execute(pool)
        .await?;

    let cookie_value = sign_session_id(session_id, &config.cookie_secret)
        .ok_or_else(|| AppError::Internal("cookie signing failed".to_string()))?;

    mailer.send_detached(
        user.email.clone(),
        "New login to your account",
        login_notice_body(&user.full_name, mailer.support_email()),
    );

    Ok(LoginSession { cookie_value, user })
}

/// Consume a verification token. Re-verifying an already-verified account
/// is a no-op success.
pub async fn verify_account(pool: &PgPool, token: Uuid) -> Result<(), AppError> {
    let session: Option<VerificationSession> = sqlx::query_as(
        "SELECT id, user_id, created_at, expires_at, expired \
         FROM verification_sessions WHERE id = $1",
    )
    .bind(token)
    .fetch_optional(pool)
    .await?;

    let Some(session) = session else {
        return Err(AppError::NotFound(
            "This verification link is invalid".to_string(),
        ));
    };
    if !session.is_valid(Utc::now()) {
        return Err(AppError::NotFound(
            "This verification link has expired".to_string(),
        ));
    }

    sqlx::query("UPDATE users SET verified = TRUE WHERE id = $1")
        .bind(session.user_id)
        .execute(pool)
        .await?;

    // One-shot: the consumed token can never re-trigger its effect
    sqlx::query("UPDATE verification_sessions SET expired = TRUE WHERE id = $1")
        .bind(session.id)
        .execute(pool)
        .await?;

    Ok(())
}

pub async fn resend_verification(
    pool: &PgPool,
    config: &Config,
    mailer: &Mailer,
    email: &str,
) -> Result<(), AppError> {
    let user = user_by_email(pool, email).await?;
    if user.verified {
        // Nothing left to verify
        return Ok(());
    }
    issue_verification(pool, config, mailer, &user).await
}

pub async fn request_password_reset(
    pool: &PgPool,
    mailer: &Mailer,
    email: &str,
) -> Result<Uuid, AppError> {
    let user = user_by_email(pool, email).await?;

    sqlx::query("DELETE FROM password_reset_requests WHERE user_id = $1")
        .bind(user.id)
        .execute(pool)
        .await?;

    let request_id = Uuid::new_v4();
    let code = generate_reset_code();
    sqlx::query(
        "INSERT INTO password_reset_requests (id, user_id, expires_at, code) \
         VALUES ($1, $2, $3, $4)",
    )
    .bind(request_id)
    .bind(user.id)
    .bind(Utc::now() + Duration::minutes(RESET_TTL_MINUTES))
    .bind(&code)
    .execute(pool)
    .await?;

    mailer.send_detached(
        user.email.clone(),
        "Your password reset code",
        password_reset_body(&user.full_name, &code, RESET_TTL_MINUTES),
    );

    Ok(request_id)
}

pub async fn confirm_password_reset(
    pool: &PgPool,
    request_id: Uuid,
    code: &str,
    new_password: &str,
) -> Result<(), AppError> {
    if !password_meets_policy(new_password) {
        let mut errors = ValidationErrors::default();
        errors.push(
            "password",
            format!(
                "Password must be at least {PASSWORD_MIN_LEN} characters and \
                 contain a letter, a digit and a symbol"
            ),
        );
        return Err(AppError::Validation(errors));
    }

    let request: Option<PasswordResetRequest> = sqlx::query_as(
        "SELECT id, user_id, created_at, expires_at, expired, code \
         FROM password_reset_requests WHERE id = $1",
    )
    .bind(request_id)
    .fetch_optional(pool)
    .await?;

    let Some(request) = request else {
        return Err(AppError::NotFound(
            "This reset request is invalid".to_string(),
        ));
    };
    if !request.is_valid(Utc::now()) {
        return Err(AppError::NotFound(
            "This reset code has expired".to_string(),
        ));
    }
    if request.code != code.trim() {
        return Err(AppError::Auth("Incorrect reset code".to_string()));
    }

    sqlx::query("UPDATE users SET password_hash = $1 WHERE id = $2")
        .bind(hash_password(new_password)?)
        .bind(request.user_id)
        .execute(pool)
        .await?;

    sqlx::query("UPDATE password_reset_requests SET expired = TRUE WHERE id = $1")
        .bind(request.id)
        .execute(pool)
        .await?;

    Ok(())
}

/// Resolve the current user from the request cookie. Every failure mode
/// (no cookie, bad signature, dead session, vanished user) yields
/// anonymous, never an error.
pub async fn current_user(pool: &PgPool, config: &Config, headers: &HeaderMap) -> Option<User> {
    let cookie_header = headers.get(COOKIE)?.to_str().ok()?;
    let session_id = session_from_cookie_header(cookie_header, &config.cookie_secret)?;

    let session: AuthSession = sqlx::query_as(
        "SELECT id, user_id, created_at, expires_at, expired FROM auth_sessions WHERE id = $1",
    )
    .bind(session_id)
    .fetch_optional(pool)
    .await
    .ok()
    .flatten()?;

    if !session.is_valid(Utc::now()) {
        return None;
    }

    sqlx::query_as(
        "SELECT id, full_name, email, password_hash, verified, access_level, created_at \
         FROM users WHERE id = $1",
    )
    .bind(session.user_id)
    .fetch_optional(pool)
    .await
    .ok()
    .flatten()
}

/// Admin surfaces require a logged-in user with elevated access.
pub async fn require_admin(
    pool: &PgPool,
    config: &Config,
    headers: &HeaderMap,
) -> Result<User, AppError> {
    let user = current_user(pool, config, headers)
        .await
        .ok_or_else(|| AppError::Auth("You must be logged in".to_string()))?;

    if !user.is_admin() {
        return Err(AppError::Forbidden(
            "Elevated access is required".to_string(),
        ));
    }

    Ok(user)
}

async fn user_by_email(pool: &PgPool, email: &str) -> Result<User, AppError> {
    let user: Option<User> = sqlx::query_as(
        "SELECT id, full_name, email, password_hash, verified, access_level, created_at \
         FROM users WHERE LOWER(email) = LOWER($1)",
    )
    .bind(email.trim())
    .fetch_optional(pool)
    .await?;

    user.ok_or_else(|| AppError::NotFound("No account with this email".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_then_verify_roundtrip() {
        let hash = hash_password("s3cret-pass!").unwrap();
        assert!(verify_password(&hash, "s3cret-pass!"));
        assert!(!verify_password(&hash, "wrong-pass1!"));
    }

    #[test]
    fn malformed_hash_never_verifies() {
        assert!(!verify_password("not-a-phc-string", "anything"));
    }

    #[test]
    fn reset_codes_are_six_digits() {
        for _ in 0..32 {
            let code = generate_reset_code();
            assert_eq!(code.len(), 6);
            assert!(code.chars().all(|c| c.is_ascii_digit()));
        }
    }

    #[test]
    fn signup_validation_collects_field_errors() {
        let input = SignupInput {
            full_name: " ".to_string(),
            email: "bad".to_string(),
            password: "weak".to_string(),
        };
        let errors = validate_signup(&input).unwrap_err();
        let fields: Vec<_> = errors.fields.iter().map(|f| f.field).collect();
        assert_eq!(fields, vec!["full_name", "email", "password"]);
    }

    #[test]
    fn signup_validation_accepts_good_input() {
        let input = SignupInput {
            full_name: "Ada Lovelace".to_string(),
            email: "ada@example.com".to_string(),
            password: "s3cret-pass!".to_string(),
        };
        assert!(validate_signup(&input).is_ok());
    }
}
