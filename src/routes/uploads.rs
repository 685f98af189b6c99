//! Stand-in for a presigning object store: the presign endpoint hands out a
//! URL under `/uploads/` that accepts one PUT and then serves the object.

use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::{header::CONTENT_TYPE, HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::{
    error::{AppError, AppResult},
    state::{AppState, StoredObject},
    storage::PresignedUpload,
};

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PresignRequest {
    pub file_name: String,
    pub file_type: String,
    pub event_id: String,
}

#[derive(Deserialize)]
pub struct DeleteQuery {
    pub url: String,
}

fn sanitize(segment: &str) -> String {
    let cleaned: String = segment
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '-'
            }
        })
        .collect();
    if cleaned.trim_matches('-').is_empty() {
        "file".to_string()
    } else {
        cleaned
    }
}

fn object_url(state: &AppState, key: &str) -> String {
    format!(
        "{}/uploads/{key}",
        state.config.api_base_url.trim_end_matches('/')
    )
}

pub async fn presign(
    State(state): State<AppState>,
    Json(payload): Json<PresignRequest>,
) -> AppResult<Json<PresignedUpload>> {
    if !(payload.file_type.starts_with("image/") || payload.file_type.starts_with("video/")) {
        return Err(AppError::bad_request("only images and videos can be uploaded"));
    }
    let key = format!(
        "{}/{}-{}",
        sanitize(&payload.event_id),
        Uuid::new_v4(),
        sanitize(&payload.file_name)
    );
    let url = object_url(&state, &key);
    Ok(Json(PresignedUpload {
        upload_url: url.clone(),
        public_url: url,
    }))
}

pub async fn put_object(
    State(state): State<AppState>,
    Path(key): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> AppResult<StatusCode> {
    let content_type = headers
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .unwrap_or("application/octet-stream")
        .to_string();
    state
        .backend
        .put_object(
            key,
            StoredObject {
                bytes: body,
                content_type,
            },
        )
        .await;
    Ok(StatusCode::OK)
}

pub async fn get_object(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> AppResult<impl IntoResponse> {
    let object = state
        .backend
        .object(&key)
        .await
        .ok_or_else(AppError::not_found)?;
    Ok(([(CONTENT_TYPE, object.content_type)], object.bytes))
}

pub async fn delete_object(
    State(state): State<AppState>,
    Query(query): Query<DeleteQuery>,
) -> AppResult<StatusCode> {
    let prefix = object_url(&state, "");
    let key = query
        .url
        .strip_prefix(&prefix)
        .ok_or_else(|| AppError::bad_request("url does not belong to this store"))?;
    if state.backend.delete_object(key).await {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::not_found())
    }
}

#[cfg(test)]
mod tests {
    use super::sanitize;

    #[test]
    fn sanitizes_object_key_segments() {
        assert_eq!(sanitize("Hero shot (1).png"), "Hero-shot--1-.png");
        assert_eq!(sanitize("///"), "file");
    }
}
