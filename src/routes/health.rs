use axum::{extract::State, http::StatusCode, response::Json};
use diesel::prelude::*;
use serde_json::{json, Value};

use crate::state::AppState;

pub async fn health_check(State(state): State<AppState>) -> (StatusCode, Json<Value>) {
    let database = state
        .with_db(|conn| diesel::sql_query("SELECT 1").execute(conn))
        .await
        .is_ok();

    if database {
        (StatusCode::OK, Json(json!({ "status": "ok", "database": "ok" })))
    } else {
        tracing::warn!("health check could not reach the database");
        (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({ "status": "degraded", "database": "unavailable" })),
        )
    }
}
