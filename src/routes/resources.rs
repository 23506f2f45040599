//! HTTP handlers shared by every resource collection. Each handler is
//! generic over [`Resource`] and mounted once per type by
//! [`resource_routes`].

use axum::{
    extract::State,
    http::StatusCode,
    routing::{delete, get, put},
    Json, Router,
};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::auth::AuthenticatedUser;
use crate::error::AppResult;
use crate::extract::{JsonBody, PathParam, QueryParams};
use crate::state::AppState;
use crate::store::{
    ListQuery, Page, PageRequest, Resource, ResourceItem, ResourceStore, SortDirection,
};

/// Raw list query string. Values are parsed leniently: anything that does
/// not parse falls back to the default.
#[derive(Debug, Default, Deserialize)]
pub struct ListParams {
    pub page: Option<String>,
    pub page_size: Option<String>,
    pub search: Option<String>,
    pub sort_by: Option<String>,
    pub sort_order: Option<String>,
    pub archived: Option<String>,
    pub trashed: Option<String>,
}

fn parse_number(value: Option<&str>) -> Option<i64> {
    value.and_then(|value| value.trim().parse().ok())
}

/// A flag counts as supplied only when non-empty; it is true only for the
/// literal `"true"`.
fn parse_flag(value: Option<&str>) -> Option<bool> {
    value
        .filter(|value| !value.is_empty())
        .map(|value| value == "true")
}

impl ListParams {
    pub fn into_query(self) -> ListQuery {
        ListQuery {
            page: PageRequest::new(
                parse_number(self.page.as_deref()),
                parse_number(self.page_size.as_deref()),
            ),
            sort_dir: SortDirection::parse(self.sort_order.as_deref()),
            archived: parse_flag(self.archived.as_deref()),
            trashed: parse_flag(self.trashed.as_deref()),
            search: self.search,
            sort_key: self.sort_by,
        }
    }
}

/// Request body carrying the type's own fields plus an optional label set.
/// `labels` absent or null leaves associations alone; `[]` clears them.
#[derive(Debug, Deserialize)]
#[serde(bound(deserialize = "T: DeserializeOwned"))]
pub struct WithLabels<T> {
    #[serde(flatten)]
    pub fields: T,
    pub labels: Option<Vec<Uuid>>,
}

#[derive(Debug, Serialize)]
pub struct PageMeta {
    pub total: i64,
    pub page: i64,
    pub page_size: i64,
    pub pages: i64,
}

#[derive(Debug, Serialize)]
pub struct ListResponse<T> {
    pub data: Vec<T>,
    pub meta: PageMeta,
}

impl<T> From<Page<T>> for ListResponse<T> {
    fn from(page: Page<T>) -> Self {
        Self {
            data: page.items,
            meta: PageMeta {
                total: page.total,
                page: page.page,
                page_size: page.page_size,
                pages: page.pages,
            },
        }
    }
}

#[derive(Debug, Serialize)]
pub struct DataResponse<T> {
    pub data: T,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl<T> DataResponse<T> {
    pub fn new(data: T) -> Self {
        Self {
            data,
            message: None,
        }
    }

    pub fn with_message(data: T, message: impl Into<String>) -> Self {
        Self {
            data,
            message: Some(message.into()),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

pub fn resource_routes<R: Resource>() -> Router<AppState> {
    Router::new()
        .route("/", get(list::<R>).post(create::<R>))
        .route("/:id", get(show::<R>).put(update::<R>).delete(trash::<R>))
        .route("/:id/restore", put(restore::<R>))
        .route("/:id/permanent", delete(permanent_delete::<R>))
}

pub async fn list<R: Resource>(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    QueryParams(params): QueryParams<ListParams>,
) -> AppResult<Json<ListResponse<ResourceItem<R::Row>>>> {
    let query = params.into_query();
    let page = state
        .with_db(move |conn| ResourceStore::<R>::new().list(conn, user.user_id, &query))
        .await?;
    Ok(Json(page.into()))
}

pub async fn show<R: Resource>(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    PathParam(id): PathParam<Uuid>,
) -> AppResult<Json<DataResponse<ResourceItem<R::Row>>>> {
    let item = state
        .with_db(move |conn| ResourceStore::<R>::new().get(conn, id, user.user_id))
        .await?;
    Ok(Json(DataResponse::new(item)))
}

pub async fn create<R: Resource>(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    JsonBody(body): JsonBody<WithLabels<R::Input>>,
) -> AppResult<(StatusCode, Json<DataResponse<ResourceItem<R::Row>>>)> {
    let owner_id = user.user_id;
    let item = state
        .with_db(move |conn| {
            ResourceStore::<R>::new().create(conn, owner_id, &body.fields, body.labels.as_deref())
        })
        .await?;
    tracing::info!(kind = R::KIND, owner_id = %user.user_id, id = %R::id(&item.record), "created");
    Ok((
        StatusCode::CREATED,
        Json(DataResponse::with_message(
            item,
            format!("{} created successfully", R::DISPLAY_NAME),
        )),
    ))
}

pub async fn update<R: Resource>(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    PathParam(id): PathParam<Uuid>,
    JsonBody(body): JsonBody<WithLabels<R::Patch>>,
) -> AppResult<Json<DataResponse<ResourceItem<R::Row>>>> {
    let owner_id = user.user_id;
    let item = state
        .with_db(move |conn| {
            ResourceStore::<R>::new().update(
                conn,
                id,
                owner_id,
                &body.fields,
                body.labels.as_deref(),
            )
        })
        .await?;
    Ok(Json(DataResponse::with_message(
        item,
        format!("{} updated successfully", R::DISPLAY_NAME),
    )))
}

pub async fn trash<R: Resource>(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    PathParam(id): PathParam<Uuid>,
) -> AppResult<Json<MessageResponse>> {
    let owner_id = user.user_id;
    state
        .with_db(move |conn| ResourceStore::<R>::new().trash(conn, id, owner_id))
        .await?;
    Ok(Json(MessageResponse::new(format!(
        "{} moved to trash",
        R::DISPLAY_NAME
    ))))
}

pub async fn restore<R: Resource>(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    PathParam(id): PathParam<Uuid>,
) -> AppResult<Json<MessageResponse>> {
    let owner_id = user.user_id;
    state
        .with_db(move |conn| ResourceStore::<R>::new().restore(conn, id, owner_id))
        .await?;
    Ok(Json(MessageResponse::new(format!(
        "{} restored successfully",
        R::DISPLAY_NAME
    ))))
}

pub async fn permanent_delete<R: Resource>(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    PathParam(id): PathParam<Uuid>,
) -> AppResult<Json<MessageResponse>> {
    let owner_id = user.user_id;
    state
        .with_db(move |conn| ResourceStore::<R>::new().permanent_delete(conn, id, owner_id))
        .await?;
    tracing::info!(kind = R::KIND, owner_id = %user.user_id, id = %id, "permanently deleted");
    Ok(Json(MessageResponse::new(format!(
        "{} permanently deleted",
        R::DISPLAY_NAME
    ))))
}
