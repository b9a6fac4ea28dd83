//! Domain entities mirrored from persistent storage.

use serde::Serialize;
use time::OffsetDateTime;
use uuid::Uuid;

/// Ceiling for titles, names and usernames, mirrored by the schema.
pub const MAX_TEXT_FIELD_LEN: usize = 256;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UserRecord {
    pub id: Uuid,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub created_at: OffsetDateTime,
}

impl UserRecord {
    /// Display name for profile pages: full name when present, else the username.
    pub fn display_name(&self) -> String {
        let full = format!("{} {}", self.first_name, self.last_name);
        let full = full.trim();
        if full.is_empty() {
            self.username.clone()
        } else {
            full.to_string()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionRecord {
    pub token_hash: String,
    pub user_id: Uuid,
    pub created_at: OffsetDateTime,
    pub expires_at: OffsetDateTime,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LocationRecord {
    pub id: Uuid,
    pub name: String,
    pub is_published: bool,
    pub created_at: OffsetDateTime,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryRecord {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub slug: String,
    pub is_published: bool,
    pub created_at: OffsetDateTime,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PostRecord {
    pub id: Uuid,
    pub title: String,
    pub text: String,
    pub pub_date: OffsetDateTime,
    pub author_id: Uuid,
    pub location_id: Option<Uuid>,
    pub category_id: Option<Uuid>,
    pub image_path: Option<String>,
    pub is_published: bool,
    pub created_at: OffsetDateTime,
}

/// Category fields a post listing needs without loading the full record.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryRef {
    pub id: Uuid,
    pub title: String,
    pub slug: String,
    pub is_published: bool,
}

/// A post joined with the display metadata every read surface wants:
/// author username, category reference, location name and the number of
/// comments (counted, never materialized).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PostWithMeta {
    pub post: PostRecord,
    pub author_username: String,
    pub category: Option<CategoryRef>,
    pub location_name: Option<String>,
    pub comment_count: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CommentRecord {
    pub id: Uuid,
    pub text: String,
    pub post_id: Uuid,
    pub author_id: Uuid,
    pub created_at: OffsetDateTime,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CommentWithAuthor {
    pub comment: CommentRecord,
    pub author_username: String,
}
