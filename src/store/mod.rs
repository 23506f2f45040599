//! Resource lifecycle and query engine shared by notes, links, images and
//! files.
//!
//! Every resource type implements [`Resource`], which carries its table
//! names, searchable columns, sort allow-list and typed insert/patch logic.
//! [`ResourceStore`] runs the shared operations (listing, lookup, trash,
//! restore, tombstoning, label replacement) once for all four.

use std::marker::PhantomData;

use chrono::{DateTime, Utc};
use diesel::pg::{Pg, PgConnection};
use diesel::prelude::*;
use diesel::query_builder::{BoxedSqlQuery, SqlQuery};
use diesel::result::{DatabaseErrorKind, Error as DieselError};
use diesel::sql_types;
use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

use crate::jobs::{self, JobQueueError};
use crate::models::Label;

pub mod catalog;
pub mod labels;
pub mod query;
pub mod resources;
pub mod search;

pub use query::{ListQuery, Page, PageRequest, SortDirection};
pub use search::SearchHit;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("resource not found")]
    NotFound,
    #[error("{0}")]
    Validation(String),
    #[error("{0}")]
    Conflict(String),
    #[error("database error: {0}")]
    Database(DieselError),
}

pub type StoreResult<T> = Result<T, StoreError>;

impl From<DieselError> for StoreError {
    fn from(value: DieselError) -> Self {
        match value {
            DieselError::NotFound => StoreError::NotFound,
            DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, info) => {
                StoreError::Conflict(info.message().to_string())
            }
            other => StoreError::Database(other),
        }
    }
}

impl From<JobQueueError> for StoreError {
    fn from(value: JobQueueError) -> Self {
        match value {
            JobQueueError::Database(err) => StoreError::from(err),
            JobQueueError::Payload(err) => StoreError::Validation(err.to_string()),
        }
    }
}

pub trait Resource: Send + Sync + 'static {
    /// Lowercase type name used in search hits and job payloads.
    const KIND: &'static str;
    /// Capitalised name used in response messages.
    const DISPLAY_NAME: &'static str;
    const TABLE: &'static str;
    const LABEL_TABLE: &'static str;
    const SEARCH_COLUMNS: &'static [&'static str];
    const SORT_KEYS: &'static [&'static str];

    type Row: QueryableByName<Pg> + Serialize + Clone + Send + Sync + 'static;
    type Input: DeserializeOwned + Send + Sync + 'static;
    type Patch: DeserializeOwned + Default + Send + Sync + 'static;

    fn id(row: &Self::Row) -> Uuid;

    fn validate(_input: &Self::Input) -> Result<(), String> {
        Ok(())
    }

    fn validate_patch(_patch: &Self::Patch) -> Result<(), String> {
        Ok(())
    }

    fn insert(
        conn: &mut PgConnection,
        owner_id: Uuid,
        input: &Self::Input,
        now: DateTime<Utc>,
    ) -> QueryResult<Uuid>;

    /// Applies the present fields of `patch` to a visible owned row and
    /// returns the number of rows touched.
    fn apply(
        conn: &mut PgConnection,
        id: Uuid,
        owner_id: Uuid,
        patch: &Self::Patch,
        now: DateTime<Utc>,
    ) -> QueryResult<usize>;

    fn search_hit(row: Self::Row) -> SearchHit;

    /// Object storage key of the uploaded original, if the type has one.
    fn stored_object(_row: &Self::Row) -> Option<&str> {
        None
    }

    /// Object to render a thumbnail from after creation.
    fn thumbnail_source(_row: &Self::Row) -> Option<&str> {
        None
    }
}

/// Resource types whose rows carry a pipeline-owned `thumbnail_url`.
pub trait HasThumbnail: Resource {}

#[derive(Debug, Clone, Serialize)]
pub struct ResourceItem<T> {
    #[serde(flatten)]
    pub record: T,
    pub labels: Vec<Label>,
}

#[derive(QueryableByName)]
struct CountRow {
    #[diesel(sql_type = sql_types::BigInt)]
    count: i64,
}

pub(crate) enum Bind {
    Uuid(Uuid),
    UuidList(Vec<Uuid>),
    Bool(bool),
    Text(String),
    BigInt(i64),
    Timestamp(DateTime<Utc>),
}

/// Raw SQL under construction. Identifiers spliced into `sql` come from
/// `Resource` constants; every value goes through a numbered bind.
pub(crate) struct Statement {
    sql: String,
    binds: Vec<Bind>,
}

impl Statement {
    pub(crate) fn new(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            binds: Vec::new(),
        }
    }

    pub(crate) fn push_sql(&mut self, sql: &str) {
        self.sql.push_str(sql);
    }

    pub(crate) fn bind(&mut self, value: Bind) -> String {
        self.binds.push(value);
        format!("${}", self.binds.len())
    }

    pub(crate) fn and_eq(&mut self, column: &str, value: Bind) {
        let placeholder = self.bind(value);
        self.sql
            .push_str(&format!(" AND {column} = {placeholder}"));
    }

    pub(crate) fn and_matches(&mut self, columns: &[&str], term: &str) {
        if columns.is_empty() {
            return;
        }
        let placeholder = self.bind(Bind::Text(query::contains_pattern(term)));
        let predicate = columns
            .iter()
            .map(|column| format!("{column} ILIKE {placeholder}"))
            .collect::<Vec<_>>()
            .join(" OR ");
        self.sql.push_str(&format!(" AND ({predicate})"));
    }

    pub(crate) fn build(self) -> BoxedSqlQuery<'static, Pg, SqlQuery> {
        let mut query = diesel::sql_query(self.sql).into_boxed::<Pg>();
        for value in self.binds {
            query = match value {
                Bind::Uuid(v) => query.bind::<sql_types::Uuid, _>(v),
                Bind::UuidList(v) => query.bind::<sql_types::Array<sql_types::Uuid>, _>(v),
                Bind::Bool(v) => query.bind::<sql_types::Bool, _>(v),
                Bind::Text(v) => query.bind::<sql_types::Text, _>(v),
                Bind::BigInt(v) => query.bind::<sql_types::BigInt, _>(v),
                Bind::Timestamp(v) => query.bind::<sql_types::Timestamptz, _>(v),
            };
        }
        query
    }
}

pub struct ResourceStore<R> {
    marker: PhantomData<fn() -> R>,
}

impl<R> Default for ResourceStore<R> {
    fn default() -> Self {
        Self {
            marker: PhantomData,
        }
    }
}

impl<R: Resource> ResourceStore<R> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn list(
        &self,
        conn: &mut PgConnection,
        owner_id: Uuid,
        query: &ListQuery,
    ) -> StoreResult<Page<ResourceItem<R::Row>>> {
        let total = Self::filtered("SELECT COUNT(*) AS count", owner_id, query)
            .build()
            .get_result::<CountRow>(conn)?
            .count;

        let sort_key = query::resolve_sort_key(query.sort_key.as_deref(), R::SORT_KEYS);
        let direction = query.sort_dir.as_sql();
        let mut statement = Self::filtered("SELECT *", owner_id, query);
        statement.push_sql(&format!(
            " ORDER BY {sort_key} {direction}, id {direction}"
        ));
        let limit = statement.bind(Bind::BigInt(query.page.page_size));
        let offset = statement.bind(Bind::BigInt(query.page.offset()));
        statement.push_sql(&format!(" LIMIT {limit} OFFSET {offset}"));

        let rows = statement.build().load::<R::Row>(conn)?;
        let items = Self::attach_labels(conn, rows)?;

        Ok(Page {
            items,
            total,
            page: query.page.page,
            page_size: query.page.page_size,
            pages: query.page.page_count(total),
        })
    }

    pub fn get(
        &self,
        conn: &mut PgConnection,
        id: Uuid,
        owner_id: Uuid,
    ) -> StoreResult<ResourceItem<R::Row>> {
        let row = Self::find_row(conn, id, owner_id)?;
        let mut items = Self::attach_labels(conn, vec![row])?;
        items.pop().ok_or(StoreError::NotFound)
    }

    /// Inserts a new row, attaching labels when `label_ids` is present and
    /// queueing a thumbnail job for types that render one.
    pub fn create(
        &self,
        conn: &mut PgConnection,
        owner_id: Uuid,
        input: &R::Input,
        label_ids: Option<&[Uuid]>,
    ) -> StoreResult<ResourceItem<R::Row>> {
        R::validate(input).map_err(StoreError::Validation)?;

        conn.transaction::<_, StoreError, _>(|conn| {
            let id = R::insert(conn, owner_id, input, Utc::now())?;
            if let Some(label_ids) = label_ids {
                labels::replace_labels::<R>(conn, id, label_ids, owner_id)?;
            }
            let item = self.get(conn, id, owner_id)?;
            if let Some(source) = R::thumbnail_source(&item.record) {
                let job = jobs::enqueue_thumbnail(conn, R::KIND, id, source)?;
                tracing::debug!(kind = R::KIND, record_id = %id, job_id = %job.id, "queued thumbnail");
            }
            Ok(item)
        })
    }

    pub fn update(
        &self,
        conn: &mut PgConnection,
        id: Uuid,
        owner_id: Uuid,
        patch: &R::Patch,
        label_ids: Option<&[Uuid]>,
    ) -> StoreResult<ResourceItem<R::Row>> {
        R::validate_patch(patch).map_err(StoreError::Validation)?;

        conn.transaction::<_, StoreError, _>(|conn| {
            if R::apply(conn, id, owner_id, patch, Utc::now())? == 0 {
                return Err(StoreError::NotFound);
            }
            if let Some(label_ids) = label_ids {
                labels::replace_labels::<R>(conn, id, label_ids, owner_id)?;
            }
            self.get(conn, id, owner_id)
        })
    }

    /// Moves a row to the trash. Trashing an already trashed row succeeds.
    pub fn trash(&self, conn: &mut PgConnection, id: Uuid, owner_id: Uuid) -> StoreResult<()> {
        Self::set_trashed(conn, id, owner_id, true)
    }

    pub fn restore(&self, conn: &mut PgConnection, id: Uuid, owner_id: Uuid) -> StoreResult<()> {
        Self::set_trashed(conn, id, owner_id, false)
    }

    /// Tombstones the row and drops its label associations. The row stays
    /// in the table until a purge removes it physically.
    pub fn permanent_delete(
        &self,
        conn: &mut PgConnection,
        id: Uuid,
        owner_id: Uuid,
    ) -> StoreResult<()> {
        conn.transaction::<_, StoreError, _>(|conn| {
            if Self::tombstone(id, owner_id, Utc::now()).build().execute(conn)? == 0 {
                return Err(StoreError::NotFound);
            }

            let mut detach =
                Statement::new(format!("DELETE FROM {} WHERE TRUE", R::LABEL_TABLE));
            detach.and_eq("resource_id", Bind::Uuid(id));
            detach.build().execute(conn)?;
            Ok(())
        })
    }

    /// Untrashed rows matching `term`, newest first, archived included.
    pub fn search_rows(
        &self,
        conn: &mut PgConnection,
        owner_id: Uuid,
        term: &str,
        limit: i64,
    ) -> StoreResult<Vec<R::Row>> {
        let mut statement = Self::visible("SELECT *", owner_id);
        statement.push_sql(" AND is_trashed = FALSE");
        statement.and_matches(R::SEARCH_COLUMNS, term);
        let limit = statement.bind(Bind::BigInt(limit));
        statement.push_sql(&format!(" ORDER BY created_at DESC, id DESC LIMIT {limit}"));
        Ok(statement.build().load::<R::Row>(conn)?)
    }

    /// Rows tombstoned before `cutoff`, across all owners.
    pub fn tombstoned_before(
        &self,
        conn: &mut PgConnection,
        cutoff: DateTime<Utc>,
    ) -> StoreResult<Vec<R::Row>> {
        let mut statement = Statement::new(format!(
            "SELECT * FROM {} WHERE deleted_at IS NOT NULL AND deleted_at < ",
            R::TABLE
        ));
        let cutoff = statement.bind(Bind::Timestamp(cutoff));
        statement.push_sql(&cutoff);
        Ok(statement.build().load::<R::Row>(conn)?)
    }

    /// Physically removes tombstoned rows by id. Live rows are never touched.
    pub fn purge(&self, conn: &mut PgConnection, ids: &[Uuid]) -> StoreResult<usize> {
        if ids.is_empty() {
            return Ok(0);
        }
        let mut statement = Statement::new(format!(
            "DELETE FROM {} WHERE deleted_at IS NOT NULL AND id = ANY(",
            R::TABLE
        ));
        let ids = statement.bind(Bind::UuidList(ids.to_vec()));
        statement.push_sql(&format!("{ids})"));
        Ok(statement.build().execute(conn)?)
    }

    fn visible(select: &str, owner_id: Uuid) -> Statement {
        let mut statement = Statement::new(format!(
            "{select} FROM {} WHERE deleted_at IS NULL",
            R::TABLE
        ));
        statement.and_eq("owner_id", Bind::Uuid(owner_id));
        statement
    }

    fn filtered(select: &str, owner_id: Uuid, query: &ListQuery) -> Statement {
        let mut statement = Self::visible(select, owner_id);
        match (query.archived, query.trashed) {
            (None, None) => statement.push_sql(" AND is_archived = FALSE AND is_trashed = FALSE"),
            (archived, trashed) => {
                if let Some(archived) = archived {
                    statement.and_eq("is_archived", Bind::Bool(archived));
                }
                if let Some(trashed) = trashed {
                    statement.and_eq("is_trashed", Bind::Bool(trashed));
                }
            }
        }
        if let Some(term) = query.search_term() {
            statement.and_matches(R::SEARCH_COLUMNS, term);
        }
        statement
    }

    fn tombstone(id: Uuid, owner_id: Uuid, now: DateTime<Utc>) -> Statement {
        let mut statement = Statement::new(format!("UPDATE {} SET deleted_at = ", R::TABLE));
        let now = statement.bind(Bind::Timestamp(now));
        statement.push_sql(&format!("{now}, updated_at = {now} WHERE deleted_at IS NULL"));
        statement.and_eq("id", Bind::Uuid(id));
        statement.and_eq("owner_id", Bind::Uuid(owner_id));
        statement
    }

    fn trash_flag(id: Uuid, owner_id: Uuid, trashed: bool, now: DateTime<Utc>) -> Statement {
        let mut statement = Statement::new(format!("UPDATE {} SET is_trashed = ", R::TABLE));
        let flag = statement.bind(Bind::Bool(trashed));
        let now = statement.bind(Bind::Timestamp(now));
        statement.push_sql(&format!("{flag}, updated_at = {now} WHERE deleted_at IS NULL"));
        statement.and_eq("id", Bind::Uuid(id));
        statement.and_eq("owner_id", Bind::Uuid(owner_id));
        statement
    }

    fn find_row(conn: &mut PgConnection, id: Uuid, owner_id: Uuid) -> StoreResult<R::Row> {
        let mut statement = Self::visible("SELECT *", owner_id);
        statement.and_eq("id", Bind::Uuid(id));
        statement
            .build()
            .get_result::<R::Row>(conn)
            .optional()?
            .ok_or(StoreError::NotFound)
    }

    fn set_trashed(
        conn: &mut PgConnection,
        id: Uuid,
        owner_id: Uuid,
        trashed: bool,
    ) -> StoreResult<()> {
        match Self::trash_flag(id, owner_id, trashed, Utc::now())
            .build()
            .execute(conn)?
        {
            0 => Err(StoreError::NotFound),
            _ => Ok(()),
        }
    }

    fn attach_labels(
        conn: &mut PgConnection,
        rows: Vec<R::Row>,
    ) -> StoreResult<Vec<ResourceItem<R::Row>>> {
        let ids: Vec<Uuid> = rows.iter().map(R::id).collect();
        let mut labels_by_id = labels::load_labels::<R>(conn, &ids)?;

        Ok(rows
            .into_iter()
            .map(|record| {
                let labels = labels_by_id.remove(&R::id(&record)).unwrap_or_default();
                ResourceItem { record, labels }
            })
            .collect())
    }
}

impl<R: HasThumbnail> ResourceStore<R> {
    /// Whether a row with `id` exists and has not been tombstoned, regardless
    /// of owner.
    pub fn is_live(&self, conn: &mut PgConnection, id: Uuid) -> StoreResult<bool> {
        let mut statement = Statement::new(format!(
            "SELECT COUNT(*) AS count FROM {} WHERE deleted_at IS NULL",
            R::TABLE
        ));
        statement.and_eq("id", Bind::Uuid(id));
        Ok(statement.build().get_result::<CountRow>(conn)?.count > 0)
    }

    /// Records a rendered thumbnail. Returns `false` when the row no longer
    /// exists or has been tombstoned.
    pub fn set_thumbnail(
        &self,
        conn: &mut PgConnection,
        id: Uuid,
        thumbnail_url: &str,
    ) -> StoreResult<bool> {
        let mut statement = Statement::new(format!("UPDATE {} SET thumbnail_url = ", R::TABLE));
        let url = statement.bind(Bind::Text(thumbnail_url.to_string()));
        statement.push_sql(&format!("{url} WHERE deleted_at IS NULL"));
        statement.and_eq("id", Bind::Uuid(id));
        Ok(statement.build().execute(conn)? > 0)
    }
}
