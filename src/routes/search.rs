use axum::{
    extract::State,
    Json,
};
use serde::{Deserialize, Serialize};

use crate::auth::AuthenticatedUser;
use crate::error::AppResult;
use crate::extract::QueryParams;
use crate::state::AppState;
use crate::store::{search, SearchHit};

#[derive(Debug, Deserialize)]
pub struct SearchParams {
    #[serde(default)]
    pub q: String,
}

#[derive(Debug, Serialize)]
pub struct SearchMeta {
    pub query: String,
    pub total: usize,
}

#[derive(Debug, Serialize)]
pub struct SearchResponse {
    pub data: Vec<SearchHit>,
    pub meta: SearchMeta,
}

pub async fn search_all(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    QueryParams(params): QueryParams<SearchParams>,
) -> AppResult<Json<SearchResponse>> {
    let query = params.q.clone();
    let hits = state
        .with_db(move |conn| search::search(conn, user.user_id, &query))
        .await?;
    Ok(Json(SearchResponse {
        meta: SearchMeta {
            query: params.q,
            total: hits.len(),
        },
        data: hits,
    }))
}
