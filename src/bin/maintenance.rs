use std::env;

use anyhow::{bail, Context, Result};
use chrono::{Duration, Utc};
use diesel::pg::PgConnection;
use diesel::prelude::*;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

use keep::{
    auth::password::hash_password,
    config::AppConfig,
    db,
    models::{File, Image, Link, NewUser, Note},
    s3,
    schema::users,
    storage::{ObjectStorage, S3Storage},
    store::{Resource, ResourceStore},
    workers::thumbnails::thumbnail_key,
};

const USAGE: &str = "Usage:
  maintenance purge-tombstones [days]
  maintenance create-user <username> <password> [role]";

const DEFAULT_RETENTION_DAYS: i64 = 30;

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    init_tracing();

    let args: Vec<String> = env::args().skip(1).collect();
    match args.first().map(String::as_str) {
        Some("purge-tombstones") => {
            let days = match args.get(1) {
                Some(value) => value
                    .parse::<i64>()
                    .context("days must be a whole number")?,
                None => DEFAULT_RETENTION_DAYS,
            };
            purge_tombstones(days).await?
        }
        Some("create-user") => match (args.get(1), args.get(2)) {
            (Some(username), Some(password)) => {
                let role = args.get(3).map(String::as_str).unwrap_or("user");
                create_user(username, password, role)?
            }
            _ => {
                eprintln!("{USAGE}");
                std::process::exit(1);
            }
        },
        Some(cmd) => {
            eprintln!("Unknown command: {cmd}\n{USAGE}");
            std::process::exit(1);
        }
        None => {
            eprintln!("{USAGE}");
            std::process::exit(1);
        }
    }

    Ok(())
}

fn load_config() -> Result<AppConfig> {
    let config = AppConfig::from_env()?;
    tracing::info!(
        component = "maintenance",
        database_url = %config.redacted_database_url(),
        s3_bucket = %config.s3_bucket,
        "loaded configuration"
    );
    Ok(config)
}

async fn purge_tombstones(days: i64) -> Result<()> {
    if days < 0 {
        bail!("days must not be negative");
    }
    let config = load_config()?;
    let pool = db::init_pool_with_size(&config.database_url, 1)?;
    let s3_client = s3::build_client(&config).await?;
    let storage = S3Storage::new(
        s3_client,
        config.s3_bucket.clone(),
        config.storage_public_url.clone(),
    );

    let mut conn = pool.get().context("failed to get database connection")?;
    let cutoff = Utc::now() - Duration::days(days);

    let mut removed = 0;
    removed += purge::<Note>(&mut conn, &storage, cutoff).await?;
    removed += purge::<Link>(&mut conn, &storage, cutoff).await?;
    removed += purge::<Image>(&mut conn, &storage, cutoff).await?;
    removed += purge::<File>(&mut conn, &storage, cutoff).await?;

    println!("Purged {removed} records deleted more than {days} days ago.");
    Ok(())
}

/// Deletes stored objects of every tombstoned row first, then the rows.
/// Object deletion failures are reported but do not keep the row.
async fn purge<R: Resource>(
    conn: &mut PgConnection,
    storage: &dyn ObjectStorage,
    cutoff: chrono::DateTime<Utc>,
) -> Result<usize> {
    let store = ResourceStore::<R>::new();
    let rows = store
        .tombstoned_before(conn, cutoff)
        .with_context(|| format!("failed to load tombstoned {}", R::TABLE))?;
    if rows.is_empty() {
        return Ok(0);
    }

    let mut ids: Vec<Uuid> = Vec::with_capacity(rows.len());
    for row in &rows {
        let id = R::id(row);
        if let Some(key) = R::stored_object(row) {
            for key in [key.to_string(), thumbnail_key(R::KIND, id)] {
                if let Err(err) = storage.delete_object(&key).await {
                    eprintln!("Failed to delete object {key} from storage: {err}");
                }
            }
        }
        ids.push(id);
    }

    let removed = store
        .purge(conn, &ids)
        .with_context(|| format!("failed to purge {}", R::TABLE))?;
    tracing::info!(table = R::TABLE, removed, "purged tombstoned records");
    Ok(removed)
}

fn create_user(username: &str, password: &str, role: &str) -> Result<()> {
    let username = username.trim();
    if username.is_empty() || password.is_empty() {
        bail!("username and password must not be empty");
    }
    let config = load_config()?;
    let pool = db::init_pool_with_size(&config.database_url, 1)?;
    let mut conn = pool.get().context("failed to get database connection")?;

    let user = NewUser {
        id: Uuid::new_v4(),
        username: username.to_string(),
        password_hash: hash_password(password)?,
        role: role.to_string(),
    };
    diesel::insert_into(users::table)
        .values(&user)
        .execute(&mut conn)
        .context("failed to insert user")?;

    println!("Created user {} ({}) with id {}", user.username, user.role, user.id);
    Ok(())
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();
}
