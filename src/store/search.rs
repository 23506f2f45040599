use chrono::{DateTime, Utc};
use diesel::pg::PgConnection;
use serde::Serialize;
use uuid::Uuid;

use super::{Resource, ResourceStore, StoreError, StoreResult};
use crate::models::{File, Image, Link, Note};

/// Matches returned per resource type.
pub const PER_KIND_LIMIT: i64 = 20;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchHit {
    pub id: Uuid,
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub title: String,
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Searches the caller's untrashed notes, links, images and files. Archived
/// records are included. Hits are grouped by type in that order, newest
/// first within a group.
pub fn search(conn: &mut PgConnection, owner_id: Uuid, query: &str) -> StoreResult<Vec<SearchHit>> {
    let term = query.trim();
    if term.is_empty() {
        return Err(StoreError::Validation("search query is required".into()));
    }

    let mut hits = Vec::new();
    collect::<Note>(conn, owner_id, term, &mut hits)?;
    collect::<Link>(conn, owner_id, term, &mut hits)?;
    collect::<Image>(conn, owner_id, term, &mut hits)?;
    collect::<File>(conn, owner_id, term, &mut hits)?;

    tracing::debug!(owner_id = %owner_id, hits = hits.len(), "search completed");
    Ok(hits)
}

fn collect<R: Resource>(
    conn: &mut PgConnection,
    owner_id: Uuid,
    term: &str,
    hits: &mut Vec<SearchHit>,
) -> StoreResult<()> {
    let rows = ResourceStore::<R>::new().search_rows(conn, owner_id, term, PER_KIND_LIMIT)?;
    hits.extend(rows.into_iter().map(R::search_hit));
    Ok(())
}
