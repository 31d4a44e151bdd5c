//! Bearer-token authentication.
//!
//! The storefront does not issue tokens itself; the identity provider does, signing them with a shared HS256 secret.
//! The server's job is only to verify the signature and expiry and to hand the asserted customer identity to the
//! handlers as an explicit [`JwtClaims`] parameter — there is deliberately no ambient "current user" state anywhere.
use std::future::{ready, Ready};

use actix_web::{web, FromRequest, HttpRequest};
use chrono::{DateTime, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use log::debug;
use serde::{Deserialize, Serialize};

use crate::{
    config::AuthConfig,
    errors::{AuthError, ServerError},
};

/// The verified identity asserted by a bearer token. `sub` is the customer identifier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JwtClaims {
    pub sub: String,
    pub exp: i64,
}

impl JwtClaims {
    pub fn customer_id(&self) -> &str {
        &self.sub
    }
}

impl FromRequest for JwtClaims {
    type Error = ServerError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut actix_web::dev::Payload) -> Self::Future {
        ready(extract_claims(req))
    }
}

fn extract_claims(req: &HttpRequest) -> Result<JwtClaims, ServerError> {
    let verifier = req
        .app_data::<web::Data<TokenVerifier>>()
        .ok_or_else(|| ServerError::InitializeError("TokenVerifier is not registered in app data".to_string()))?;
    let header = req.headers().get("Authorization").ok_or(AuthError::MissingToken)?;
    let header = header
        .to_str()
        .map_err(|e| AuthError::PoorlyFormattedToken(format!("Authorization header is not valid UTF-8: {e}")))?;
    let token = header
        .strip_prefix("Bearer ")
        .ok_or_else(|| AuthError::PoorlyFormattedToken("Authorization header is not a Bearer token".to_string()))?;
    let claims = verifier.verify(token)?;
    debug!("💻️ Bearer token verified for customer {}", claims.sub);
    Ok(claims)
}

/// Verifies HS256 bearer tokens against the identity provider's shared secret.
#[derive(Clone)]
pub struct TokenVerifier {
    key: DecodingKey,
}

impl TokenVerifier {
    pub fn new(config: &AuthConfig) -> Self {
        Self { key: DecodingKey::from_secret(config.jwt_secret.reveal().as_bytes()) }
    }

    pub fn verify(&self, token: &str) -> Result<JwtClaims, AuthError> {
        let validation = Validation::new(Algorithm::HS256);
        let data = decode::<JwtClaims>(token, &self.key, &validation)
            .map_err(|e| AuthError::ValidationError(e.to_string()))?;
        Ok(data.claims)
    }
}

/// Issues tokens signed with the shared secret. The production identity provider does this; the issuer here exists
/// for tests and local tooling.
pub struct TokenIssuer {
    key: EncodingKey,
}

impl TokenIssuer {
    pub fn new(config: &AuthConfig) -> Self {
        Self { key: EncodingKey::from_secret(config.jwt_secret.reveal().as_bytes()) }
    }

    pub fn issue_token(&self, customer_id: &str, expiry: DateTime<Utc>) -> Result<String, ServerError> {
        let claims = JwtClaims { sub: customer_id.to_string(), exp: expiry.timestamp() };
        encode(&Header::new(Algorithm::HS256), &claims, &self.key)
            .map_err(|e| ServerError::Unspecified(format!("Could not sign token: {e}")))
    }
}
