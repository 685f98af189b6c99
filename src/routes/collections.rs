//! One set of handlers for every synchronized collection, instantiated per
//! record type in the router.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde_json::{Map, Value};
use tracing::debug;

use crate::error::{AppError, AppResult};
use crate::models::Record;
use crate::normalize;
use crate::state::AppState;
use crate::store::Stored;
use crate::utils::json::clear_blank_references;

/// Soft references that may be cleared with `null` (or a blank string).
const NULLABLE_REFERENCES: [&str; 4] = ["reviewer", "eventId", "groupId", "sectionId"];

fn wrap<T: Record>(records: &[T]) -> AppResult<Json<Value>> {
    let mut body = Map::new();
    body.insert(
        T::COLLECTION.body_field().to_string(),
        serde_json::to_value(records).map_err(AppError::internal)?,
    );
    Ok(Json(Value::Object(body)))
}

pub async fn list<T: Stored>(State(state): State<AppState>) -> AppResult<Json<Value>> {
    let records = state.backend.list::<T>().await;
    wrap(&records)
}

/// Batch upsert. Accepts `{ "<field>": [...] }` or a bare array; invalid
/// records are dropped.
pub async fn upsert<T: Stored>(
    State(state): State<AppState>,
    Json(payload): Json<Value>,
) -> AppResult<Json<Value>> {
    let field = T::COLLECTION.body_field();
    let raw = match payload {
        Value::Array(_) => payload,
        Value::Object(mut body) => body
            .remove(field)
            .filter(Value::is_array)
            .ok_or_else(|| AppError::bad_request(format!("expected a `{field}` array")))?,
        _ => return Err(AppError::bad_request(format!("expected a `{field}` array"))),
    };

    let submitted = raw.as_array().map(Vec::len).unwrap_or_default();
    let records: Vec<T> = normalize::collection(&raw);
    if records.len() < submitted {
        debug!(
            collection = %T::COLLECTION,
            dropped = submitted - records.len(),
            "discarded invalid records"
        );
    }

    state.backend.upsert(records.clone()).await;
    wrap(&records)
}

pub async fn patch<T: Stored>(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(payload): Json<Value>,
) -> AppResult<Json<T>> {
    let Value::Object(mut changes) = payload else {
        return Err(AppError::bad_request("expected an object"));
    };
    clear_blank_references(&mut changes, &NULLABLE_REFERENCES).map_err(AppError::bad_request)?;

    let current = state
        .backend
        .get::<T>(&id)
        .await
        .ok_or_else(AppError::not_found)?;
    let mut merged = serde_json::to_value(&current).map_err(AppError::internal)?;
    if let Value::Object(fields) = &mut merged {
        for (key, value) in changes {
            if key != "id" {
                fields.insert(key, value);
            }
        }
    }

    let updated = T::from_untrusted(&merged)
        .ok_or_else(|| AppError::bad_request("patched record is invalid"))?;
    state.backend.upsert(vec![updated.clone()]).await;
    Ok(Json(updated))
}

pub async fn remove<T: Stored>(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<StatusCode> {
    if state.backend.delete::<T>(&id).await {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::not_found())
    }
}
