//! User-owned label catalog.

use chrono::{DateTime, Utc};
use diesel::pg::{Pg, PgConnection};
use diesel::prelude::*;
use serde::Deserialize;
use uuid::Uuid;

use super::query::{contains_pattern, resolve_sort_key, ListQuery, Page, SortDirection};
use super::{StoreError, StoreResult};
use crate::models::{Label, NewLabel};
use crate::schema::labels;

pub const DEFAULT_LABEL_COLOR: &str = "#6c5ce7";
pub const SORT_KEYS: &[&str] = &["id", "name", "slug", "created_at", "updated_at"];

const DUPLICATE_LABEL: &str = "a label with this name already exists";

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LabelInput {
    #[serde(default)]
    pub name: String,
    pub color: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LabelPatch {
    pub name: Option<String>,
    pub color: Option<String>,
}

#[derive(AsChangeset)]
#[diesel(table_name = labels)]
struct LabelChangeset<'a> {
    name: Option<&'a str>,
    slug: Option<&'a str>,
    color: Option<&'a str>,
    updated_at: DateTime<Utc>,
}

/// Lowercases `name`, collapses every run of characters outside `[a-z0-9]`
/// into a single `-` and trims leading and trailing dashes.
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    let mut pending_dash = false;
    for ch in name.to_lowercase().chars() {
        if ch.is_ascii_lowercase() || ch.is_ascii_digit() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(ch);
        } else {
            pending_dash = true;
        }
    }
    slug
}

pub fn is_hex_color(value: &str) -> bool {
    value.len() == 7
        && value.starts_with('#')
        && value[1..].chars().all(|ch| ch.is_ascii_hexdigit())
}

fn validated_name(name: &str) -> StoreResult<(&str, String)> {
    let name = name.trim();
    if name.is_empty() {
        return Err(StoreError::Validation("label name must not be empty".into()));
    }
    let slug = slugify(name);
    if slug.is_empty() {
        return Err(StoreError::Validation(
            "label name must contain at least one letter or digit".into(),
        ));
    }
    Ok((name, slug))
}

fn validated_color(color: &str) -> StoreResult<&str> {
    let color = color.trim();
    if is_hex_color(color) {
        Ok(color)
    } else {
        Err(StoreError::Validation(
            "color must be a hex value such as #6c5ce7".into(),
        ))
    }
}

fn duplicate_as_conflict(err: diesel::result::Error) -> StoreError {
    match StoreError::from(err) {
        StoreError::Conflict(_) => StoreError::Conflict(DUPLICATE_LABEL.into()),
        other => other,
    }
}

fn owned_labels(owner_id: Uuid, term: Option<&str>) -> labels::BoxedQuery<'static, Pg> {
    let mut query = labels::table
        .filter(labels::owner_id.eq(owner_id))
        .into_boxed();
    if let Some(term) = term {
        query = query.filter(labels::name.ilike(contains_pattern(term)));
    }
    query
}

fn ordered(
    query: labels::BoxedQuery<'static, Pg>,
    sort_key: &str,
    direction: SortDirection,
) -> labels::BoxedQuery<'static, Pg> {
    macro_rules! by {
        ($column:expr) => {
            match direction {
                SortDirection::Asc => query.order(($column.asc(), labels::id.asc())),
                SortDirection::Desc => query.order(($column.desc(), labels::id.desc())),
            }
        };
    }

    match sort_key {
        "id" => by!(labels::id),
        "name" => by!(labels::name),
        "slug" => by!(labels::slug),
        "updated_at" => by!(labels::updated_at),
        _ => by!(labels::created_at),
    }
}

pub fn list_labels(
    conn: &mut PgConnection,
    owner_id: Uuid,
    query: &ListQuery,
) -> StoreResult<Page<Label>> {
    let term = query.search_term();
    let total: i64 = owned_labels(owner_id, term).count().get_result(conn)?;

    let sort_key = resolve_sort_key(query.sort_key.as_deref(), SORT_KEYS);
    let items = ordered(owned_labels(owner_id, term), sort_key, query.sort_dir)
        .offset(query.page.offset())
        .limit(query.page.page_size)
        .load::<Label>(conn)?;

    Ok(Page {
        items,
        total,
        page: query.page.page,
        page_size: query.page.page_size,
        pages: query.page.page_count(total),
    })
}

pub fn create_label(
    conn: &mut PgConnection,
    owner_id: Uuid,
    input: &LabelInput,
) -> StoreResult<Label> {
    let (name, slug) = validated_name(&input.name)?;
    let color = match input.color.as_deref().map(str::trim) {
        None | Some("") => DEFAULT_LABEL_COLOR,
        Some(color) => validated_color(color)?,
    };

    let new_label = NewLabel {
        owner_id,
        name: name.to_string(),
        slug,
        color: color.to_string(),
    };

    let label = diesel::insert_into(labels::table)
        .values(&new_label)
        .returning(Label::as_returning())
        .get_result(conn)
        .map_err(duplicate_as_conflict)?;

    tracing::debug!(owner_id = %owner_id, label_id = %label.id, slug = %label.slug, "created label");
    Ok(label)
}

pub fn update_label(
    conn: &mut PgConnection,
    id: Uuid,
    owner_id: Uuid,
    patch: &LabelPatch,
) -> StoreResult<Label> {
    let name = patch.name.as_deref().map(validated_name).transpose()?;
    let color = patch.color.as_deref().map(validated_color).transpose()?;

    let changeset = LabelChangeset {
        name: name.as_ref().map(|(name, _)| *name),
        slug: name.as_ref().map(|(_, slug)| slug.as_str()),
        color,
        updated_at: Utc::now(),
    };

    diesel::update(
        labels::table
            .filter(labels::id.eq(id))
            .filter(labels::owner_id.eq(owner_id)),
    )
    .set(&changeset)
    .returning(Label::as_returning())
    .get_result(conn)
    .optional()
    .map_err(duplicate_as_conflict)?
    .ok_or(StoreError::NotFound)
}

/// Deletes the label. Its associations with resources cascade.
pub fn delete_label(conn: &mut PgConnection, id: Uuid, owner_id: Uuid) -> StoreResult<()> {
    let deleted = diesel::delete(
        labels::table
            .filter(labels::id.eq(id))
            .filter(labels::owner_id.eq(owner_id)),
    )
    .execute(conn)?;

    if deleted == 0 {
        return Err(StoreError::NotFound);
    }
    Ok(())
}
