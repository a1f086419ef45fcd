use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use uuid::Uuid;

type HmacSha256 = Hmac<Sha256>;

pub const SESSION_COOKIE: &str = "session";

/// 7-day cookie lifetime, matching the auth session TTL.
pub const SESSION_MAX_AGE_SECS: i64 = 7 * 24 * 60 * 60;

/// Cookie value is `{session_id}.{base64(hmac_sha256(session_id))}` so a
/// forged or tampered id never reaches the database.
pub fn sign_session_id(session_id: Uuid, secret: &str) -> Option<String> {
    let signature = compute_signature(session_id, secret)?;
    Some(format!("{session_id}.{signature}"))
}

/// Recover the session id from a cookie value, rejecting anything whose
/// signature does not verify.
pub fn verify_session_cookie(value: &str, secret: &str) -> Option<Uuid> {
    let (id_part, signature_part) = value.split_once('.')?;
    let session_id = id_part.parse::<Uuid>().ok()?;
    let presented = URL_SAFE_NO_PAD.decode(signature_part).ok()?;

    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).ok()?;
    mac.update(session_id.to_string().as_bytes());
    mac.verify_slice(&presented).ok()?;

    Some(session_id)
}

/// Extract and verify the session id from a raw `Cookie` request header.
pub fn session_from_cookie_header(header: &str, secret: &str) -> Option<Uuid> {
    header
        .split(';')
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == SESSION_COOKIE)
        .and_then(|(_, value)| verify_session_cookie(value, secret))
}

/// `Set-Cookie` header value for a freshly signed session.
pub fn build_session_cookie(signed_value: &str) -> String {
    format!(
        "{SESSION_COOKIE}={signed_value}; Path=/; Max-Age={SESSION_MAX_AGE_SECS}; HttpOnly; Secure; SameSite=Lax"
    )
}

fn compute_signature(session_id: Uuid, secret: &str) -> Option<String> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).ok()?;
    mac.update(session_id.to_string().as_bytes());
    Some(URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes()))
}
