use axum::{extract::State, Json};
use serde::Serialize;

use crate::{
    auth::AuthenticatedUser,
    models::{Role, RoleInfo},
    state::AppState,
};

#[derive(Serialize)]
pub struct MeResponse {
    pub user_id: String,
    pub email: Option<String>,
    pub role: Role,
}

pub async fn me(user: AuthenticatedUser) -> Json<MeResponse> {
    Json(MeResponse {
        user_id: user.user_id,
        email: user.email,
        role: user.role,
    })
}

pub async fn role(State(state): State<AppState>, user: AuthenticatedUser) -> Json<RoleInfo> {
    Json(user.effective_role(&state.config.reviewer_emails))
}
