use anyhow::Result;
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::AppConfig;
use crate::error::AppResult;

/// Stateless token service. Tokens are self-contained HS256 JWTs carrying
/// the subject, role and an absolute expiry; the server keeps no session
/// state beyond the signing secret.
#[derive(Clone)]
pub struct JwtService {
    encoding: EncodingKey,
    decoding: DecodingKey,
    issuer: String,
    audience: String,
    expiry: Duration,
}

impl JwtService {
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        Ok(Self {
            encoding: EncodingKey::from_secret(config.jwt_secret.as_bytes()),
            decoding: DecodingKey::from_secret(config.jwt_secret.as_bytes()),
            issuer: config.jwt_issuer.clone(),
            audience: config.jwt_audience.clone(),
            expiry: Duration::minutes(config.jwt_expiry_minutes),
        })
    }

    pub fn issue(&self, user_id: Uuid, username: &str, role: &str) -> Result<String> {
        let now = Utc::now();
        let exp = now + self.expiry;
        let claims = Claims {
            sub: user_id,
            username: username.to_owned(),
            role: role.to_owned(),
            iss: self.issuer.clone(),
            aud: self.audience.clone(),
            iat: now.timestamp() as usize,
            exp: exp.timestamp() as usize,
        };

        Ok(encode(&Header::default(), &claims, &self.encoding)?)
    }

    /// Validates signature, issuer, audience and expiry. Expiry is compared
    /// against the validation instant with zero leeway, so a token is
    /// rejected the moment its TTL elapses.
    pub fn validate(&self, token: &str) -> AppResult<Claims> {
        let mut validation = Validation::default();
        validation.leeway = 0;
        validation.set_audience(&[self.audience.clone()]);
        validation.set_issuer(&[self.issuer.clone()]);
        let data = decode::<Claims>(token, &self.decoding, &validation)?;
        Ok(data.claims)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub username: String,
    pub role: String,
    pub iss: String,
    pub aud: String,
    pub iat: usize,
    pub exp: usize,
}

#[cfg(test)]
mod tests {
    use super::JwtService;
    use crate::config::AppConfig;
    use crate::error::ErrorKind;
    use uuid::Uuid;

    fn config(secret: &str, expiry_minutes: i64) -> AppConfig {
        AppConfig {
            database_url: "postgres://localhost/unused".to_string(),
            database_max_pool_size: 1,
            server_host: "127.0.0.1".to_string(),
            server_port: 0,
            jwt_secret: secret.to_string(),
            jwt_issuer: "issuer".to_string(),
            jwt_audience: "audience".to_string(),
            jwt_expiry_minutes: expiry_minutes,
            cors_allowed_origin: None,
        }
    }

    #[test]
    fn roundtrip_preserves_subject_and_role() {
        let service = JwtService::from_config(&config("secret", 60)).unwrap();
        let user_id = Uuid::new_v4();

        let token = service.issue(user_id, "alice", "admin").unwrap();
        let claims = service.validate(&token).unwrap();

        assert_eq!(claims.sub, user_id);
        assert_eq!(claims.username, "alice");
        assert_eq!(claims.role, "admin");
    }

    #[test]
    fn expired_token_is_rejected_as_expired() {
        let service = JwtService::from_config(&config("secret", -5)).unwrap();
        let token = service.issue(Uuid::new_v4(), "alice", "admin").unwrap();

        let err = service.validate(&token).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::TokenExpired);
    }

    #[test]
    fn forged_signature_is_invalid() {
        let issuing = JwtService::from_config(&config("secret-a", 60)).unwrap();
        let validating = JwtService::from_config(&config("secret-b", 60)).unwrap();
        let token = issuing.issue(Uuid::new_v4(), "mallory", "admin").unwrap();

        let err = validating.validate(&token).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::TokenInvalid);
    }

    #[test]
    fn garbage_token_is_invalid() {
        let service = JwtService::from_config(&config("secret", 60)).unwrap();
        let err = service.validate("not-a-jwt").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::TokenInvalid);
    }
}
