use std::collections::HashMap;

use diesel::pg::PgConnection;
use diesel::prelude::*;
use diesel::sql_types;
use uuid::Uuid;

use super::{Bind, Resource, Statement, StoreResult};
use crate::models::Label;
use crate::schema::labels;

#[derive(QueryableByName)]
struct LabelAssignment {
    #[diesel(sql_type = sql_types::Uuid)]
    resource_id: Uuid,
    #[diesel(embed)]
    label: Label,
}

/// Replaces the labels on `resource_id` with the subset of `label_ids`
/// owned by `owner_id`. Unknown or foreign ids are dropped without error.
/// Returns the ids that were attached.
pub fn replace_labels<R: Resource>(
    conn: &mut PgConnection,
    resource_id: Uuid,
    label_ids: &[Uuid],
    owner_id: Uuid,
) -> StoreResult<Vec<Uuid>> {
    let resolved: Vec<Uuid> = if label_ids.is_empty() {
        Vec::new()
    } else {
        labels::table
            .filter(labels::id.eq_any(label_ids))
            .filter(labels::owner_id.eq(owner_id))
            .select(labels::id)
            .load(conn)?
    };

    let dropped = label_ids.len().saturating_sub(resolved.len());
    if dropped > 0 {
        tracing::debug!(
            kind = R::KIND,
            resource_id = %resource_id,
            dropped,
            "ignored labels not owned by caller"
        );
    }

    let mut clear = Statement::new(format!("DELETE FROM {} WHERE TRUE", R::LABEL_TABLE));
    clear.and_eq("resource_id", Bind::Uuid(resource_id));
    clear.build().execute(conn)?;

    if !resolved.is_empty() {
        let mut attach = Statement::new(format!(
            "INSERT INTO {} (resource_id, label_id) SELECT ",
            R::LABEL_TABLE
        ));
        let resource = attach.bind(Bind::Uuid(resource_id));
        let ids = attach.bind(Bind::UuidList(resolved.clone()));
        attach.push_sql(&format!("{resource}, UNNEST({ids}) ON CONFLICT DO NOTHING"));
        attach.build().execute(conn)?;
    }

    Ok(resolved)
}

/// Loads the labels of every id in `resource_ids` in a single query,
/// ordered by name within each resource.
pub fn load_labels<R: Resource>(
    conn: &mut PgConnection,
    resource_ids: &[Uuid],
) -> StoreResult<HashMap<Uuid, Vec<Label>>> {
    let mut by_resource: HashMap<Uuid, Vec<Label>> = HashMap::new();
    if resource_ids.is_empty() {
        return Ok(by_resource);
    }

    let mut statement = Statement::new(format!(
        "SELECT j.resource_id, l.* FROM {} j JOIN labels l ON l.id = j.label_id \
         WHERE j.resource_id = ANY(",
        R::LABEL_TABLE
    ));
    let ids = statement.bind(Bind::UuidList(resource_ids.to_vec()));
    statement.push_sql(&format!("{ids}) ORDER BY l.name ASC, l.id ASC"));

    for assignment in statement.build().load::<LabelAssignment>(conn)? {
        by_resource
            .entry(assignment.resource_id)
            .or_default()
            .push(assignment.label);
    }

    Ok(by_resource)
}
