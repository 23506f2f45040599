use chrono::{DateTime, Utc};
use diesel::pg::PgConnection;
use diesel::prelude::*;
use uuid::Uuid;

use super::catalog::is_hex_color;
use super::{HasThumbnail, Resource, SearchHit};
use crate::models::{
    File, FileInput, FilePatch, Image, ImageInput, ImagePatch, Link, LinkInput, LinkPatch, Note,
    NoteInput, NotePatch,
};
use crate::schema::{files, images, links, notes};

pub const DEFAULT_NOTE_COLOR: &str = "#ffffff";

fn require(value: &str, field: &str) -> Result<(), String> {
    if value.trim().is_empty() {
        Err(format!("{field} is required"))
    } else {
        Ok(())
    }
}

fn check_color(color: &str) -> Result<(), String> {
    if is_hex_color(color) {
        Ok(())
    } else {
        Err("color must be a hex value such as #ffffff".into())
    }
}

fn check_url(value: &str) -> Result<(), String> {
    url::Url::parse(value.trim())
        .map(|_| ())
        .map_err(|_| "url must be an absolute URL".to_string())
}

fn check_size(size_bytes: i64) -> Result<(), String> {
    if size_bytes < 0 {
        Err("size_bytes must not be negative".into())
    } else {
        Ok(())
    }
}

#[derive(Insertable)]
#[diesel(table_name = notes)]
struct NoteRecord<'a> {
    owner_id: Uuid,
    title: &'a str,
    body: &'a str,
    color: &'a str,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(AsChangeset)]
#[diesel(table_name = notes)]
struct NoteChangeset<'a> {
    title: Option<&'a str>,
    body: Option<&'a str>,
    color: Option<&'a str>,
    is_pinned: Option<bool>,
    is_archived: Option<bool>,
    updated_at: DateTime<Utc>,
}

impl Resource for Note {
    const KIND: &'static str = "note";
    const DISPLAY_NAME: &'static str = "Note";
    const TABLE: &'static str = "notes";
    const LABEL_TABLE: &'static str = "note_labels";
    const SEARCH_COLUMNS: &'static [&'static str] = &["title", "body"];
    const SORT_KEYS: &'static [&'static str] = &[
        "id",
        "title",
        "color",
        "is_pinned",
        "is_archived",
        "created_at",
        "updated_at",
    ];

    type Row = Note;
    type Input = NoteInput;
    type Patch = NotePatch;

    fn id(row: &Note) -> Uuid {
        row.id
    }

    fn validate(input: &NoteInput) -> Result<(), String> {
        match input.color.as_deref() {
            Some(color) if !color.is_empty() => check_color(color),
            _ => Ok(()),
        }
    }

    fn validate_patch(patch: &NotePatch) -> Result<(), String> {
        patch.color.as_deref().map_or(Ok(()), check_color)
    }

    fn insert(
        conn: &mut PgConnection,
        owner_id: Uuid,
        input: &NoteInput,
        now: DateTime<Utc>,
    ) -> QueryResult<Uuid> {
        let color = input
            .color
            .as_deref()
            .filter(|color| !color.is_empty())
            .unwrap_or(DEFAULT_NOTE_COLOR);
        let record = NoteRecord {
            owner_id,
            title: &input.title,
            body: &input.body,
            color,
            created_at: now,
            updated_at: now,
        };
        diesel::insert_into(notes::table)
            .values(&record)
            .returning(notes::id)
            .get_result(conn)
    }

    fn apply(
        conn: &mut PgConnection,
        id: Uuid,
        owner_id: Uuid,
        patch: &NotePatch,
        now: DateTime<Utc>,
    ) -> QueryResult<usize> {
        let changeset = NoteChangeset {
            title: patch.title.as_deref(),
            body: patch.body.as_deref(),
            color: patch.color.as_deref(),
            is_pinned: patch.is_pinned,
            is_archived: patch.is_archived,
            updated_at: now,
        };
        diesel::update(
            notes::table
                .filter(notes::id.eq(id))
                .filter(notes::owner_id.eq(owner_id))
                .filter(notes::deleted_at.is_null()),
        )
        .set(&changeset)
        .execute(conn)
    }

    fn search_hit(row: Note) -> SearchHit {
        SearchHit {
            id: row.id,
            kind: Self::KIND,
            title: row.title,
            content: row.body,
            url: None,
            created_at: row.created_at,
        }
    }
}

#[derive(Insertable)]
#[diesel(table_name = links)]
struct LinkRecord<'a> {
    owner_id: Uuid,
    url: &'a str,
    title: &'a str,
    description: &'a str,
    thumbnail_url: &'a str,
    favicon_url: &'a str,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(AsChangeset)]
#[diesel(table_name = links)]
struct LinkChangeset<'a> {
    url: Option<&'a str>,
    title: Option<&'a str>,
    description: Option<&'a str>,
    thumbnail_url: Option<&'a str>,
    favicon_url: Option<&'a str>,
    is_pinned: Option<bool>,
    is_archived: Option<bool>,
    updated_at: DateTime<Utc>,
}

impl Resource for Link {
    const KIND: &'static str = "link";
    const DISPLAY_NAME: &'static str = "Link";
    const TABLE: &'static str = "links";
    const LABEL_TABLE: &'static str = "link_labels";
    const SEARCH_COLUMNS: &'static [&'static str] = &["title", "url", "description"];
    const SORT_KEYS: &'static [&'static str] = &[
        "id",
        "title",
        "url",
        "is_pinned",
        "is_archived",
        "created_at",
        "updated_at",
    ];

    type Row = Link;
    type Input = LinkInput;
    type Patch = LinkPatch;

    fn id(row: &Link) -> Uuid {
        row.id
    }

    fn validate(input: &LinkInput) -> Result<(), String> {
        require(&input.url, "url")?;
        check_url(&input.url)
    }

    fn validate_patch(patch: &LinkPatch) -> Result<(), String> {
        match patch.url.as_deref() {
            Some(url) => {
                require(url, "url")?;
                check_url(url)
            }
            None => Ok(()),
        }
    }

    fn insert(
        conn: &mut PgConnection,
        owner_id: Uuid,
        input: &LinkInput,
        now: DateTime<Utc>,
    ) -> QueryResult<Uuid> {
        let record = LinkRecord {
            owner_id,
            url: input.url.trim(),
            title: &input.title,
            description: &input.description,
            thumbnail_url: &input.thumbnail_url,
            favicon_url: &input.favicon_url,
            created_at: now,
            updated_at: now,
        };
        diesel::insert_into(links::table)
            .values(&record)
            .returning(links::id)
            .get_result(conn)
    }

    fn apply(
        conn: &mut PgConnection,
        id: Uuid,
        owner_id: Uuid,
        patch: &LinkPatch,
        now: DateTime<Utc>,
    ) -> QueryResult<usize> {
        let changeset = LinkChangeset {
            url: patch.url.as_deref().map(str::trim),
            title: patch.title.as_deref(),
            description: patch.description.as_deref(),
            thumbnail_url: patch.thumbnail_url.as_deref(),
            favicon_url: patch.favicon_url.as_deref(),
            is_pinned: patch.is_pinned,
            is_archived: patch.is_archived,
            updated_at: now,
        };
        diesel::update(
            links::table
                .filter(links::id.eq(id))
                .filter(links::owner_id.eq(owner_id))
                .filter(links::deleted_at.is_null()),
        )
        .set(&changeset)
        .execute(conn)
    }

    fn search_hit(row: Link) -> SearchHit {
        SearchHit {
            id: row.id,
            kind: Self::KIND,
            title: row.title,
            content: row.description,
            url: Some(row.url),
            created_at: row.created_at,
        }
    }
}

#[derive(Insertable)]
#[diesel(table_name = images)]
struct ImageRecord<'a> {
    owner_id: Uuid,
    title: &'a str,
    storage_key: &'a str,
    url: &'a str,
    mime_type: &'a str,
    size_bytes: i64,
    width: i32,
    height: i32,
    folder: &'a str,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(AsChangeset)]
#[diesel(table_name = images)]
struct ImageChangeset<'a> {
    title: Option<&'a str>,
    folder: Option<&'a str>,
    is_pinned: Option<bool>,
    is_archived: Option<bool>,
    updated_at: DateTime<Utc>,
}

impl Resource for Image {
    const KIND: &'static str = "image";
    const DISPLAY_NAME: &'static str = "Image";
    const TABLE: &'static str = "images";
    const LABEL_TABLE: &'static str = "image_labels";
    const SEARCH_COLUMNS: &'static [&'static str] = &["title"];
    const SORT_KEYS: &'static [&'static str] = &[
        "id",
        "title",
        "size_bytes",
        "width",
        "height",
        "folder",
        "is_pinned",
        "is_archived",
        "created_at",
        "updated_at",
    ];

    type Row = Image;
    type Input = ImageInput;
    type Patch = ImagePatch;

    fn id(row: &Image) -> Uuid {
        row.id
    }

    fn validate(input: &ImageInput) -> Result<(), String> {
        require(&input.storage_key, "storage_key")?;
        require(&input.url, "url")?;
        check_size(input.size_bytes)?;
        if input.width < 0 || input.height < 0 {
            return Err("width and height must not be negative".into());
        }
        Ok(())
    }

    fn insert(
        conn: &mut PgConnection,
        owner_id: Uuid,
        input: &ImageInput,
        now: DateTime<Utc>,
    ) -> QueryResult<Uuid> {
        let record = ImageRecord {
            owner_id,
            title: &input.title,
            storage_key: &input.storage_key,
            url: &input.url,
            mime_type: &input.mime_type,
            size_bytes: input.size_bytes,
            width: input.width,
            height: input.height,
            folder: &input.folder,
            created_at: now,
            updated_at: now,
        };
        diesel::insert_into(images::table)
            .values(&record)
            .returning(images::id)
            .get_result(conn)
    }

    fn apply(
        conn: &mut PgConnection,
        id: Uuid,
        owner_id: Uuid,
        patch: &ImagePatch,
        now: DateTime<Utc>,
    ) -> QueryResult<usize> {
        let changeset = ImageChangeset {
            title: patch.title.as_deref(),
            folder: patch.folder.as_deref(),
            is_pinned: patch.is_pinned,
            is_archived: patch.is_archived,
            updated_at: now,
        };
        diesel::update(
            images::table
                .filter(images::id.eq(id))
                .filter(images::owner_id.eq(owner_id))
                .filter(images::deleted_at.is_null()),
        )
        .set(&changeset)
        .execute(conn)
    }

    fn search_hit(row: Image) -> SearchHit {
        SearchHit {
            id: row.id,
            kind: Self::KIND,
            title: row.title,
            content: String::new(),
            url: Some(row.url),
            created_at: row.created_at,
        }
    }

    fn stored_object(row: &Image) -> Option<&str> {
        Some(&row.storage_key)
    }

    fn thumbnail_source(row: &Image) -> Option<&str> {
        Some(&row.storage_key)
    }
}

impl HasThumbnail for Image {}

#[derive(Insertable)]
#[diesel(table_name = files)]
struct FileRecord<'a> {
    owner_id: Uuid,
    title: &'a str,
    original_name: &'a str,
    storage_key: &'a str,
    url: &'a str,
    mime_type: &'a str,
    size_bytes: i64,
    extension: &'a str,
    folder: &'a str,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(AsChangeset)]
#[diesel(table_name = files)]
struct FileChangeset<'a> {
    title: Option<&'a str>,
    folder: Option<&'a str>,
    is_pinned: Option<bool>,
    is_archived: Option<bool>,
    updated_at: DateTime<Utc>,
}

/// Extension of `name` without the dot, lowercased, or empty when there is
/// none.
pub fn extension_of(name: &str) -> String {
    match name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() && !ext.is_empty() => ext.to_ascii_lowercase(),
        _ => String::new(),
    }
}

impl Resource for File {
    const KIND: &'static str = "file";
    const DISPLAY_NAME: &'static str = "File";
    const TABLE: &'static str = "files";
    const LABEL_TABLE: &'static str = "file_labels";
    const SEARCH_COLUMNS: &'static [&'static str] = &["title", "original_name"];
    const SORT_KEYS: &'static [&'static str] = &[
        "id",
        "title",
        "original_name",
        "size_bytes",
        "extension",
        "folder",
        "is_pinned",
        "is_archived",
        "created_at",
        "updated_at",
    ];

    type Row = File;
    type Input = FileInput;
    type Patch = FilePatch;

    fn id(row: &File) -> Uuid {
        row.id
    }

    fn validate(input: &FileInput) -> Result<(), String> {
        require(&input.original_name, "original_name")?;
        require(&input.storage_key, "storage_key")?;
        require(&input.url, "url")?;
        check_size(input.size_bytes)
    }

    fn insert(
        conn: &mut PgConnection,
        owner_id: Uuid,
        input: &FileInput,
        now: DateTime<Utc>,
    ) -> QueryResult<Uuid> {
        let derived_extension;
        let extension = if input.extension.is_empty() {
            derived_extension = extension_of(&input.original_name);
            derived_extension.as_str()
        } else {
            input.extension.trim_start_matches('.')
        };
        let record = FileRecord {
            owner_id,
            title: &input.title,
            original_name: &input.original_name,
            storage_key: &input.storage_key,
            url: &input.url,
            mime_type: &input.mime_type,
            size_bytes: input.size_bytes,
            extension,
            folder: &input.folder,
            created_at: now,
            updated_at: now,
        };
        diesel::insert_into(files::table)
            .values(&record)
            .returning(files::id)
            .get_result(conn)
    }

    fn apply(
        conn: &mut PgConnection,
        id: Uuid,
        owner_id: Uuid,
        patch: &FilePatch,
        now: DateTime<Utc>,
    ) -> QueryResult<usize> {
        let changeset = FileChangeset {
            title: patch.title.as_deref(),
            folder: patch.folder.as_deref(),
            is_pinned: patch.is_pinned,
            is_archived: patch.is_archived,
            updated_at: now,
        };
        diesel::update(
            files::table
                .filter(files::id.eq(id))
                .filter(files::owner_id.eq(owner_id))
                .filter(files::deleted_at.is_null()),
        )
        .set(&changeset)
        .execute(conn)
    }

    fn search_hit(row: File) -> SearchHit {
        SearchHit {
            id: row.id,
            kind: Self::KIND,
            title: row.title,
            content: row.original_name,
            url: Some(row.url),
            created_at: row.created_at,
        }
    }

    fn stored_object(row: &File) -> Option<&str> {
        Some(&row.storage_key)
    }

    fn thumbnail_source(row: &File) -> Option<&str> {
        row.mime_type
            .starts_with("image/")
            .then_some(row.storage_key.as_str())
    }
}

impl HasThumbnail for File {}
