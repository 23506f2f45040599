use std::{io::Cursor, sync::Arc, time::Duration};

use async_trait::async_trait;
use diesel::pg::PgConnection;
use image::{DynamicImage, GenericImageView, ImageFormat, ImageReader};
use tokio::task;
use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    jobs::{ThumbnailPayload, JOB_GENERATE_THUMBNAIL},
    models::{File, Image, Job},
    state::AppState,
    store::{Resource, ResourceStore, StoreResult},
};

use super::{JobExecution, JobHandler};

pub const THUMBNAIL_MAX_WIDTH: u32 = 256;
pub const THUMBNAIL_MAX_HEIGHT: u32 = 256;

const RETRY_DELAY: Duration = Duration::from_secs(30);

/// Storage key of the rendered thumbnail. Depends only on the record, so a
/// re-delivered job overwrites the object it wrote before.
pub fn thumbnail_key(kind: &str, record_id: Uuid) -> String {
    format!("thumbnails/{kind}/{record_id}.png")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ThumbnailTarget {
    Image,
    File,
}

impl ThumbnailTarget {
    fn parse(kind: &str) -> Option<Self> {
        match kind {
            k if k == Image::KIND => Some(Self::Image),
            k if k == File::KIND => Some(Self::File),
            _ => None,
        }
    }

    fn is_live(self, conn: &mut PgConnection, id: Uuid) -> StoreResult<bool> {
        match self {
            Self::Image => ResourceStore::<Image>::new().is_live(conn, id),
            Self::File => ResourceStore::<File>::new().is_live(conn, id),
        }
    }

    fn record(self, conn: &mut PgConnection, id: Uuid, url: &str) -> StoreResult<bool> {
        match self {
            Self::Image => ResourceStore::<Image>::new().set_thumbnail(conn, id, url),
            Self::File => ResourceStore::<File>::new().set_thumbnail(conn, id, url),
        }
    }
}

pub struct GenerateThumbnailJob;

impl GenerateThumbnailJob {
    pub fn new() -> Self {
        Self
    }
}

impl Default for GenerateThumbnailJob {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl JobHandler for GenerateThumbnailJob {
    fn job_type(&self) -> &'static str {
        JOB_GENERATE_THUMBNAIL
    }

    async fn handle(&self, state: Arc<AppState>, job: Job) -> JobExecution {
        let payload: ThumbnailPayload = match serde_json::from_value(job.payload.clone()) {
            Ok(payload) => payload,
            Err(err) => {
                return JobExecution::Failed {
                    error: format!("invalid thumbnail payload: {err}"),
                }
            }
        };
        let Some(target) = ThumbnailTarget::parse(&payload.kind) else {
            return JobExecution::Failed {
                error: format!("thumbnails are not supported for {}", payload.kind),
            };
        };
        let record_id = payload.record_id;

        match state
            .with_db(move |conn| target.is_live(conn, record_id))
            .await
        {
            Ok(true) => {}
            Ok(false) => {
                info!(job_id = %job.id, record_id = %record_id, "record is gone; skipping thumbnail");
                return JobExecution::Success;
            }
            Err(err) => {
                return JobExecution::Retry {
                    delay: RETRY_DELAY,
                    error: err.to_string(),
                }
            }
        }

        let original = match state.storage.get_object(&payload.storage_key).await {
            Ok(bytes) => bytes,
            Err(err) => {
                warn!(job_id = %job.id, error = %err, "thumbnail fetch failed; will retry");
                return JobExecution::Retry {
                    delay: RETRY_DELAY,
                    error: err.to_string(),
                };
            }
        };

        let rendered = match task::spawn_blocking(move || render_thumbnail(&original)).await {
            Ok(Ok(png)) => png,
            Ok(Err(err)) => {
                return JobExecution::Failed {
                    error: format!("could not render thumbnail: {err}"),
                }
            }
            Err(join_err) => {
                return JobExecution::Retry {
                    delay: RETRY_DELAY,
                    error: format!("render panicked: {join_err}"),
                }
            }
        };

        let key = thumbnail_key(&payload.kind, record_id);
        if let Err(err) = state
            .storage
            .put_object(&key, rendered, Some("image/png".into()))
            .await
        {
            warn!(job_id = %job.id, error = %err, "failed to upload thumbnail; retrying");
            return JobExecution::Retry {
                delay: RETRY_DELAY,
                error: err.to_string(),
            };
        }

        let url = state.storage.object_url(&key);
        match state
            .with_db(move |conn| target.record(conn, record_id, &url))
            .await
        {
            Ok(true) => {
                info!(job_id = %job.id, kind = %payload.kind, record_id = %record_id, "thumbnail stored");
                JobExecution::Success
            }
            Ok(false) => {
                info!(job_id = %job.id, record_id = %record_id, "record removed while rendering");
                JobExecution::Success
            }
            Err(err) => {
                warn!(job_id = %job.id, error = %err, "failed to record thumbnail; retrying");
                JobExecution::Retry {
                    delay: RETRY_DELAY,
                    error: err.to_string(),
                }
            }
        }
    }
}

/// Decodes `bytes` and re-encodes them as a PNG no larger than
/// `THUMBNAIL_MAX_WIDTH` x `THUMBNAIL_MAX_HEIGHT`, keeping the aspect ratio.
/// Smaller images keep their size.
pub fn render_thumbnail(bytes: &[u8]) -> Result<Vec<u8>, String> {
    let reader = ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(|err| err.to_string())?;
    let image = reader.decode().map_err(|err| err.to_string())?;

    let thumbnail = fit_within_bounds(image);
    let mut cursor = Cursor::new(Vec::new());
    thumbnail
        .write_to(&mut cursor, ImageFormat::Png)
        .map_err(|err| err.to_string())?;
    Ok(cursor.into_inner())
}

fn fit_within_bounds(image: DynamicImage) -> DynamicImage {
    let (width, height) = image.dimensions();
    if width > THUMBNAIL_MAX_WIDTH || height > THUMBNAIL_MAX_HEIGHT {
        image.thumbnail(THUMBNAIL_MAX_WIDTH, THUMBNAIL_MAX_HEIGHT)
    } else {
        image
    }
}
