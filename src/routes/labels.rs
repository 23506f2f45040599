use axum::{
    extract::State,
    http::StatusCode,
    Json,
};
use uuid::Uuid;

use super::resources::{DataResponse, ListParams, ListResponse, MessageResponse};
use crate::auth::AuthenticatedUser;
use crate::error::AppResult;
use crate::extract::{JsonBody, PathParam, QueryParams};
use crate::models::Label;
use crate::state::AppState;
use crate::store::catalog::{self, LabelInput, LabelPatch};

pub async fn list_labels(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    QueryParams(params): QueryParams<ListParams>,
) -> AppResult<Json<ListResponse<Label>>> {
    let query = params.into_query();
    let page = state
        .with_db(move |conn| catalog::list_labels(conn, user.user_id, &query))
        .await?;
    Ok(Json(page.into()))
}

pub async fn create_label(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    JsonBody(payload): JsonBody<LabelInput>,
) -> AppResult<(StatusCode, Json<DataResponse<Label>>)> {
    let label = state
        .with_db(move |conn| catalog::create_label(conn, user.user_id, &payload))
        .await?;
    Ok((
        StatusCode::CREATED,
        Json(DataResponse::with_message(label, "Label created successfully")),
    ))
}

pub async fn update_label(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    PathParam(label_id): PathParam<Uuid>,
    JsonBody(payload): JsonBody<LabelPatch>,
) -> AppResult<Json<DataResponse<Label>>> {
    let label = state
        .with_db(move |conn| catalog::update_label(conn, label_id, user.user_id, &payload))
        .await?;
    Ok(Json(DataResponse::with_message(
        label,
        "Label updated successfully",
    )))
}

pub async fn delete_label(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    PathParam(label_id): PathParam<Uuid>,
) -> AppResult<Json<MessageResponse>> {
    state
        .with_db(move |conn| catalog::delete_label(conn, label_id, user.user_id))
        .await?;
    Ok(Json(MessageResponse::new("Label deleted successfully")))
}
