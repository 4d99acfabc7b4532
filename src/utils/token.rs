use axum::http::StatusCode;
use chrono::{Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};

use crate::{
    error::{ErrorMessage, HttpError},
    models::User,
};

/// Session token payload: subject id plus enough identity to render the
/// caller without a lookup. Expiry is checked by the jsonwebtoken
/// Validation on decode.
#[derive(Debug, Serialize, Deserialize)]
pub struct TokenClaims {
    pub sub: String,
    pub email: String,
    pub role: String,
    pub status: String,
    pub iat: usize,
    pub exp: usize,
}

pub fn create_token(
    user: &User,
    secret: &[u8],
    expires_in_seconds: i64,
) -> Result<String, jsonwebtoken::errors::Error> {
    let now = Utc::now();
    let iat = now.timestamp() as usize;
    let exp = (now + Duration::seconds(expires_in_seconds)).timestamp() as usize;
    let claims = TokenClaims {
        sub: user.id.to_string(),
        email: user.email.clone(),
        role: user.role.to_str().to_string(),
        status: user.status.to_str().to_string(),
        iat,
        exp,
    };

    encode(&Header::default(), &claims, &EncodingKey::from_secret(secret))
}

pub fn decode_token<T: Into<String>>(token: T, secret: &[u8]) -> Result<TokenClaims, HttpError> {
    let decoded = decode::<TokenClaims>(
        &token.into(),
        &DecodingKey::from_secret(secret),
        &Validation::new(Algorithm::HS256),
    );

    match decoded {
        Ok(token) => Ok(token.claims),
        Err(e) => {
            // Expiry gets its own message; every other decode failure is a
            // generic invalid token.
            let message = match e.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => ErrorMessage::TokenExpired,
                _ => ErrorMessage::InvalidToken,
            };
            Err(HttpError::new(message.to_string(), StatusCode::UNAUTHORIZED))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{UserRole, UserStatus};
    use uuid::Uuid;

    fn sample_user() -> User {
        User {
            id: Uuid::new_v4(),
            name: "Ada".to_string(),
            email: "ada@example.com".to_string(),
            password: Some("hash".to_string()),
            role: UserRole::Instructor,
            status: UserStatus::Active,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn token_round_trip_preserves_identity_claims() {
        let user = sample_user();
        let secret = b"test-secret";

        let token = create_token(&user, secret, 3600).unwrap();
        let claims = decode_token(token, secret).unwrap();

        assert_eq!(claims.sub, user.id.to_string());
        assert_eq!(claims.email, user.email);
        assert_eq!(claims.role, "instructor");
        assert_eq!(claims.status, "active");
    }

    #[test]
    fn wrong_secret_rejected() {
        let user = sample_user();
        let token = create_token(&user, b"secret-a", 3600).unwrap();
        assert!(decode_token(token, b"secret-b").is_err());
    }

    #[test]
    fn expired_token_rejected() {
        let user = sample_user();
        let secret = b"test-secret";
        // Issued already expired; leeway in Validation defaults to 60s, so
        // go well past it.
        let token = create_token(&user, secret, -120).unwrap();
        assert!(decode_token(token, secret).is_err());
    }

    #[test]
    fn expired_and_malformed_tokens_get_distinct_messages() {
        let user = sample_user();
        let secret = b"test-secret";

        let expired = create_token(&user, secret, -120).unwrap();
        let expired_err = decode_token(expired, secret).unwrap_err();
        let garbage_err = decode_token("not-a-jwt", secret).unwrap_err();

        assert_eq!(expired_err.message, ErrorMessage::TokenExpired.to_string());
        assert_eq!(garbage_err.message, ErrorMessage::InvalidToken.to_string());
        assert_ne!(expired_err.message, garbage_err.message);
    }
}
