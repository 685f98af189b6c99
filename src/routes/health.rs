use axum::{extract::State, http::StatusCode, response::Json};
use serde_json::{json, Value};

use crate::models::{Asset, Event, TextItem};
use crate::state::AppState;

pub async fn health_check(State(state): State<AppState>) -> (StatusCode, Json<Value>) {
    let backend = &state.backend;
    (
        StatusCode::OK,
        Json(json!({
            "status": "ok",
            "version": env!("CARGO_PKG_VERSION"),
            "events": backend.list::<Event>().await.len(),
            "assets": backend.list::<Asset>().await.len(),
            "textItems": backend.list::<TextItem>().await.len(),
        })),
    )
}
