use anyhow::{Context, Result};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::config::AppConfig;
use crate::models::Role;

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
        let secret = config
            .jwt_secret
            .as_deref()
            .context("JWT_SECRET must be set")?;
        Ok(Self::new(
            secret,
            &config.jwt_issuer,
            &config.jwt_audience,
            config.jwt_expiry_minutes,
        ))
    }

    pub fn new(secret: &str, issuer: &str, audience: &str, expiry_minutes: i64) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            issuer: issuer.to_owned(),
            audience: audience.to_owned(),
            expiry: Duration::minutes(expiry_minutes),
        }
    }

    pub fn generate_token(&self, user_id: &str, email: Option<&str>, role: Role) -> Result<String> {
        let now = Utc::now();
        let exp = now + self.expiry;
        let claims = Claims {
            sub: user_id.to_owned(),
            email: email.map(str::to_owned),
            role,
            iss: self.issuer.clone(),
            aud: self.audience.clone(),
            iat: now.timestamp() as usize,
            exp: exp.timestamp() as usize,
        };

        Ok(encode(&Header::default(), &claims, &self.encoding)?)
    }

    pub fn verify_token(&self, token: &str) -> Result<Claims> {
        let mut validation = Validation::default();
        validation.set_audience(&[self.audience.clone()]);
        validation.set_issuer(&[self.issuer.clone()]);
        let data = decode::<Claims>(token, &self.decoding, &validation)?;
        Ok(data.claims)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub email: Option<String>,
    pub role: Role,
    pub iss: String,
    pub aud: String,
    pub iat: usize,
    pub exp: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn issued_tokens_verify() {
        let jwt = JwtService::new("secret", "reviewdesk", "reviewdesk-clients", 5);
        let token = jwt
            .generate_token("u-1", Some("jane.doe@example.com"), Role::Reviewer)
            .unwrap();
        let claims = jwt.verify_token(&token).unwrap();
        assert_eq!(claims.sub, "u-1");
        assert_eq!(claims.email.as_deref(), Some("jane.doe@example.com"));
        assert_eq!(claims.role, Role::Reviewer);
    }

    #[test]
    fn tokens_from_other_audience_are_rejected() {
        let issuer = JwtService::new("secret", "reviewdesk", "other-clients", 5);
        let verifier = JwtService::new("secret", "reviewdesk", "reviewdesk-clients", 5);
        let token = issuer.generate_token("u-1", None, Role::Creator).unwrap();
        assert!(verifier.verify_token(&token).is_err());
    }
}
