use anyhow::{Context, Result};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use uuid::Uuid;

use crate::error::ApiError;

type HmacSha256 = Hmac<Sha256>;

const MIN_PASSWORD_LEN: usize = 6;

/// Password hashing and bearer tokens.
///
/// A token is `<user_id>.<nonce>.<signature>` where the nonce is a random
/// UUID and the signature is hex HMAC-SHA256 of `<user_id>.<nonce>` under
/// the server secret. Tokens carry no expiry.
pub struct AuthService {
    secret: String,
}

impl AuthService {
    pub fn new(secret: String) -> Self {
        Self { secret }
    }

    pub async fn hash_password(&self, password: &str) -> Result<String> {
        let password = password.to_string();
        let hash = tokio::task::spawn_blocking(move || bcrypt::hash(password, bcrypt::DEFAULT_COST))
            .await
            .context("password hashing task failed")??;
        Ok(hash)
    }

    /// A malformed stored hash counts as a mismatch
    pub async fn verify_password(&self, password: &str, hash: &str) -> Result<bool> {
        let password = password.to_string();
        let hash = hash.to_string();
        let matches = tokio::task::spawn_blocking(move || bcrypt::verify(password, &hash).unwrap_or(false))
            .await
            .context("password verification task failed")?;
        Ok(matches)
    }

    pub fn issue_token(&self, user_id: Uuid) -> String {
        let payload = format!("{}.{}", user_id, Uuid::new_v4().simple());
        let signature = hex::encode(self.mac(&payload).finalize().into_bytes());
        format!("{}.{}", payload, signature)
    }

    pub fn verify_token(&self, token: &str) -> Option<Uuid> {
        let (payload, signature) = token.rsplit_once('.')?;
        let (user_id, nonce) = payload.split_once('.')?;
        if nonce.is_empty() {
            return None;
        }

        let signature = hex::decode(signature).ok()?;
        self.mac(payload).verify_slice(&signature).ok()?;

        Uuid::parse_str(user_id).ok()
    }

    fn mac(&self, payload: &str) -> HmacSha256 {
        let mut mac = HmacSha256::new_from_slice(self.secret.as_bytes())
            .expect("HMAC accepts keys of any length");
        mac.update(payload.as_bytes());
        mac
    }
}

/// Lowercased, trimmed email if it looks like `local@domain`
pub fn normalize_email(email: &str) -> Result<String, ApiError> {
    let email = email.trim().to_lowercase();
    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && !domain.is_empty() && !domain.contains('@') => Ok(email),
        _ => Err(ApiError::InvalidInput("email address is not valid".to_string())),
    }
}

pub fn validate_password(password: &str) -> Result<(), ApiError> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(ApiError::InvalidInput(format!(
            "password must be at least {} characters",
            MIN_PASSWORD_LEN
        )));
    }
    Ok(())
}

pub fn validate_name(name: &str) -> Result<String, ApiError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(ApiError::InvalidInput("name is required".to_string()));
    }
    Ok(name.to_string())
}

/// Token part of an `Authorization: Bearer <token>` header value
pub fn bearer_token(header_value: &str) -> Option<&str> {
    let (scheme, token) = header_value.trim().split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    (!token.is_empty()).then_some(token)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service() -> AuthService {
        AuthService::new("test-secret".to_string())
    }

    #[test]
    fn test_token_roundtrip() {
        let user_id = Uuid::new_v4();
        let token = service().issue_token(user_id);

        assert!(token.starts_with(&user_id.to_string()));
        assert_eq!(service().verify_token(&token), Some(user_id));
    }

    #[test]
    fn test_tokens_are_unique() {
        let user_id = Uuid::new_v4();
        assert_ne!(service().issue_token(user_id), service().issue_token(user_id));
    }

    #[test]
    fn test_tampered_token_rejected() {
        let auth = service();
        let token = auth.issue_token(Uuid::new_v4());
        let (_, rest) = token.split_once('.').unwrap();
        let forged = format!("{}.{}", Uuid::new_v4(), rest);

        assert_eq!(auth.verify_token(&forged), None);
        assert_eq!(auth.verify_token("garbage"), None);
        assert_eq!(auth.verify_token(""), None);
    }

    #[test]
    fn test_token_from_other_secret_rejected() {
        let token = AuthService::new("other-secret".to_string()).issue_token(Uuid::new_v4());
        assert_eq!(service().verify_token(&token), None);
    }

    #[tokio::test]
    async fn test_password_hash_and_verify() {
        let auth = service();
        let hash = auth.hash_password("password123").await.unwrap();

        assert_ne!(hash, "password123");
        assert!(auth.verify_password("password123", &hash).await.unwrap());
        assert!(!auth.verify_password("password124", &hash).await.unwrap());
        assert!(!auth.verify_password("password123", "not-a-hash").await.unwrap());
    }

    #[test]
    fn test_normalize_email() {
        assert_eq!(normalize_email("  Test@Example.com ").unwrap(), "test@example.com");
        assert!(normalize_email("no-at-sign").is_err());
        assert!(normalize_email("@example.com").is_err());
        assert!(normalize_email("user@").is_err());
        assert!(normalize_email("a@b@c").is_err());
    }

    #[test]
    fn test_validate_password_and_name() {
        assert!(validate_password("12345").is_err());
        assert!(validate_password("123456").is_ok());
        assert_eq!(validate_name("  Test User ").unwrap(), "Test User");
        assert!(validate_name("   ").is_err());
    }

    #[test]
    fn test_bearer_token() {
        assert_eq!(bearer_token("Bearer abc.def"), Some("abc.def"));
        assert_eq!(bearer_token("bearer   abc"), Some("abc"));
        assert_eq!(bearer_token("Basic abc"), None);
        assert_eq!(bearer_token("Bearer "), None);
        assert_eq!(bearer_token("abc"), None);
    }
}
