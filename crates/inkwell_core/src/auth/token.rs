use super::identity::Identity;
use crate::clock::now_secs;
use crate::model::Role;
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TokenError {
    /// Signing key misconfiguration. A server fault, not a caller fault.
    #[error("failed to sign token: {0}")]
    Signing(String),
    #[error("token expired")]
    Expired,
    #[error("invalid token signature")]
    InvalidSignature,
    #[error("malformed token: {0}")]
    Malformed(String),
}

impl From<jsonwebtoken::errors::Error> for TokenError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        match err.kind() {
            ErrorKind::ExpiredSignature => Self::Expired,
            ErrorKind::InvalidSignature => Self::InvalidSignature,
            _ => Self::Malformed(err.to_string()),
        }
    }
}

/// Registered claims carried by every bearer token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// User id.
    pub sub: String,
    pub role: String,
    /// Absolute expiry, Unix seconds.
    pub exp: i64,
    /// Issued at, Unix seconds.
    pub iat: i64,
}

/// Issues and validates HS256 tokens with one process-wide secret.
#[derive(Clone)]
pub struct TokenService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    ttl: Duration,
}

impl std::fmt::Debug for TokenService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenService")
            .field("ttl", &self.ttl)
            .finish_non_exhaustive()
    }
}

impl TokenService {
    pub fn new(secret: &str, ttl: Duration) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.validate_exp = true;
        validation.set_required_spec_claims(&["exp", "sub"]);

        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
            ttl,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Issues a token for `user_id` expiring `ttl` from now.
    pub fn issue_token(&self, user_id: &str, role: Role) -> Result<String, TokenError> {
        self.issue_token_at(user_id, role, now_secs())
    }

    /// Issues a token as if it had been minted at `issued_at` (Unix seconds).
    pub fn issue_token_at(
        &self,
        user_id: &str,
        role: Role,
        issued_at: i64,
    ) -> Result<String, TokenError> {
        let claims = Claims {
            sub: user_id.to_string(),
            role: role.as_str().to_string(),
            exp: issued_at + self.ttl.as_secs() as i64,
            iat: issued_at,
        };
        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|err| TokenError::Signing(err.to_string()))
    }

    /// Verifies signature and expiry, then extracts the embedded identity.
    pub fn validate_token(&self, token: &str) -> Result<Identity, TokenError> {
        let data = decode::<Claims>(token, &self.decoding_key, &self.validation)?;
        let claims = data.claims;
        if claims.sub.is_empty() {
            return Err(TokenError::Malformed("empty subject".to_string()));
        }
        let role = Role::parse(&claims.role)
            .ok_or_else(|| TokenError::Malformed(format!("unknown role `{}`", claims.role)))?;
        Ok(Identity::new(claims.sub, role))
    }
}

#[cfg(test)]
mod tests {
    use super::{TokenError, TokenService};
    use crate::clock::now_secs;
    use crate::model::Role;
    use std::time::Duration;

    const DAY: Duration = Duration::from_secs(24 * 60 * 60);

    #[test]
    fn issued_token_round_trips_identity() {
        let service = TokenService::new("secret", DAY);
        let token = service.issue_token("user-1", Role::Admin).unwrap();
        let identity = service.validate_token(&token).unwrap();
        assert_eq!(identity.user_id, "user-1");
        assert_eq!(identity.role, Role::Admin);
    }

    #[test]
    fn expired_token_is_rejected_even_with_valid_signature() {
        let service = TokenService::new("secret", DAY);
        let issued_long_ago = now_secs() - 2 * DAY.as_secs() as i64;
        let token = service
            .issue_token_at("user-1", Role::User, issued_long_ago)
            .unwrap();
        assert!(matches!(
            service.validate_token(&token),
            Err(TokenError::Expired)
        ));
    }

    #[test]
    fn token_signed_with_other_secret_is_rejected() {
        let issuer = TokenService::new("secret-a", DAY);
        let verifier = TokenService::new("secret-b", DAY);
        let token = issuer.issue_token("user-1", Role::User).unwrap();
        assert!(matches!(
            verifier.validate_token(&token),
            Err(TokenError::InvalidSignature)
        ));
    }

    #[test]
    fn garbage_is_malformed() {
        let service = TokenService::new("secret", DAY);
        assert!(matches!(
            service.validate_token("not.a.jwt"),
            Err(TokenError::Malformed(_))
        ));
        assert!(matches!(
            service.validate_token(""),
            Err(TokenError::Malformed(_))
        ));
    }

    #[test]
    fn tampered_payload_is_rejected() {
        let service = TokenService::new("secret", DAY);
        let token = service.issue_token("user-1", Role::User).unwrap();
        let mut parts: Vec<String> = token.split('.').map(str::to_string).collect();
        let other = service.issue_token("user-2", Role::Admin).unwrap();
        parts[1] = other.split('.').nth(1).unwrap().to_string();
        let forged = parts.join(".");
        assert!(service.validate_token(&forged).is_err());
    }
}
