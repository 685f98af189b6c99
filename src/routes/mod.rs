use axum::http::HeaderValue;
use axum::{
    extract::DefaultBodyLimit,
    middleware,
    routing::{get, patch, post},
    Router,
};
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::warn;

use crate::models::{ActivityEntry, Asset, Event, TextGroup, TextItem, TextSection};
use crate::store::Stored;
use crate::{auth::AuthenticatedUser, state::AppState};

pub mod auth;
pub mod collections;
pub mod health;
pub mod uploads;

fn collection_routes<T: Stored>() -> Router<AppState> {
    Router::new()
        .route("/", get(collections::list::<T>).post(collections::upsert::<T>))
        .route(
            "/:id",
            patch(collections::patch::<T>).delete(collections::remove::<T>),
        )
}

fn cors_layer(state: &AppState) -> CorsLayer {
    let allow_origin = match state.config.cors_allowed_origin.as_ref() {
        Some(origins) => {
            let headers: Vec<HeaderValue> = origins
                .split(',')
                .map(str::trim)
                .filter(|value| !value.is_empty())
                .filter_map(|value| match value.parse::<HeaderValue>() {
                    Ok(header) => Some(header),
                    Err(_) => {
                        warn!(origin = value, "ignoring invalid CORS origin");
                        None
                    }
                })
                .collect();
            AllowOrigin::list(headers)
        }
        None => AllowOrigin::mirror_request(),
    };

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods(tower_http::cors::AllowMethods::mirror_request())
        .allow_headers(tower_http::cors::AllowHeaders::mirror_request())
        .allow_credentials(true)
}

pub fn create_router(state: AppState) -> Router<()> {
    let cors = cors_layer(&state);

    // Activity is append-only over the API: no patch or delete.
    let activity_routes = Router::new().route(
        "/",
        get(collections::list::<ActivityEntry>).post(collections::upsert::<ActivityEntry>),
    );

    let protected_state = state.clone();
    let protected_routes = Router::new()
        .nest("/api/assets", collection_routes::<Asset>())
        .nest("/api/events", collection_routes::<Event>())
        .nest("/api/text-items", collection_routes::<TextItem>())
        .nest("/api/text-groups", collection_routes::<TextGroup>())
        .nest("/api/text-sections", collection_routes::<TextSection>())
        .nest("/api/activity", activity_routes)
        .route("/api/role", get(auth::role))
        .route("/api/me", get(auth::me))
        .route(
            "/api/uploads/presign",
            post(uploads::presign).delete(uploads::delete_object),
        )
        .layer(middleware::from_extractor_with_state::<AuthenticatedUser, _>(protected_state));

    let object_routes = Router::new().route(
        "/uploads/*key",
        get(uploads::get_object).put(uploads::put_object),
    );

    Router::new()
        .merge(protected_routes)
        .merge(object_routes)
        .route("/api/health", get(health::health_check))
        .with_state(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .layer(DefaultBodyLimit::max(1024 * 1024 * 64))
}
