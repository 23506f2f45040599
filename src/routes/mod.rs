use axum::http::HeaderValue;
use axum::{
    middleware,
    routing::{get, post, put},
    Router,
};
use tower_http::cors::{AllowHeaders, AllowMethods, AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::{
    auth::AuthenticatedUser,
    models::{File, Image, Link, Note},
    state::AppState,
};

pub mod auth;
pub mod health;
pub mod labels;
pub mod resources;
pub mod search;

fn cors_layer(allowed: Option<&str>) -> CorsLayer {
    let allow_origin = match allowed {
        Some(origins) => {
            let headers: Vec<HeaderValue> = origins
                .split(',')
                .map(str::trim)
                .filter(|value| !value.is_empty())
                .filter_map(|value| match value.parse::<HeaderValue>() {
                    Ok(header) => Some(header),
                    Err(_) => {
                        tracing::warn!(origin = value, "ignoring invalid CORS origin");
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
        .allow_methods(AllowMethods::mirror_request())
        .allow_headers(AllowHeaders::mirror_request())
        .allow_credentials(true)
}

pub fn create_router(state: AppState) -> Router<()> {
    let cors = cors_layer(state.config.cors_allowed_origin.as_deref());

    let auth_routes = Router::new()
        .route("/login", post(auth::login))
        .route("/me", get(auth::me));

    let labels_routes = Router::new()
        .route("/", get(labels::list_labels).post(labels::create_label))
        .route(
            "/:id",
            put(labels::update_label).delete(labels::delete_label),
        );

    let protected_state = state.clone();
    let protected_routes = Router::new()
        .nest("/api/notes", resources::resource_routes::<Note>())
        .nest("/api/links", resources::resource_routes::<Link>())
        .nest("/api/images", resources::resource_routes::<Image>())
        .nest("/api/files", resources::resource_routes::<File>())
        .nest("/api/labels", labels_routes)
        .route("/api/search", get(search::search_all))
        .layer(middleware::from_extractor_with_state::<AuthenticatedUser, _>(protected_state));

    Router::new()
        .merge(protected_routes)
        .nest("/api/auth", auth_routes)
        .route("/api/health", get(health::health_check))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}
