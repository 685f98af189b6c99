pub mod jwt;

use axum::{async_trait, extract::FromRequestParts, http::request::Parts};
use axum_extra::headers::{authorization::Bearer, Authorization};
use axum_extra::TypedHeader;
use serde::{Deserialize, Serialize};

use crate::{
    error::AppError,
    models::{Role, RoleInfo},
    state::AppState,
};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthenticatedUser {
    pub user_id: String,
    pub email: Option<String>,
    pub role: Role,
}

impl AuthenticatedUser {
    /// With a configured reviewer list the role is decided by membership and
    /// locked; otherwise the role claimed by the token stands.
    pub fn effective_role(&self, reviewer_emails: &[String]) -> RoleInfo {
        if reviewer_emails.is_empty() {
            return RoleInfo {
                role: self.role,
                locked: false,
            };
        }
        let listed = self
            .email
            .as_deref()
            .is_some_and(|email| reviewer_emails.iter().any(|r| r.eq_ignore_ascii_case(email)));
        RoleInfo {
            role: if listed { Role::Reviewer } else { Role::Creator },
            locked: true,
        }
    }
}

#[async_trait]
impl FromRequestParts<AppState> for AuthenticatedUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let TypedHeader(Authorization(bearer)) =
            TypedHeader::<Authorization<Bearer>>::from_request_parts(parts, state)
                .await
                .map_err(|_| AppError::unauthorized())?;

        let claims = state
            .jwt
            .verify_token(bearer.token())
            .map_err(|_| AppError::unauthorized())?;

        Ok(AuthenticatedUser {
            user_id: claims.sub,
            email: claims.email,
            role: claims.role,
        })
    }
}
