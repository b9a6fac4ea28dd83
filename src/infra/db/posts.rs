use async_trait::async_trait;
use sqlx::QueryBuilder;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::application::pagination::PageRequest;
use crate::application::repos::{
    CreatePostParams, PostQuery, PostsRepo, PostsWriteRepo, RepoError, UpdatePostParams,
};
use crate::domain::entities::{CategoryRef, PostRecord, PostWithMeta};

use super::PostgresRepositories;
use super::map_sqlx_error;

const POST_COLUMNS: &str = "id, title, text, pub_date, author_id, location_id, category_id, \
     image_path, is_published, created_at";

/// Joined select used by every read surface: author username, category
/// reference, location name and the comment count (a correlated subquery,
/// so comments are never materialized for lists).
const POST_META_SELECT: &str = "SELECT p.id, p.title, p.text, p.pub_date, p.author_id, \
     p.location_id, p.category_id, p.image_path, p.is_published, p.created_at, \
     u.username AS author_username, \
     c.title AS category_title, c.slug AS category_slug, \
     c.is_published AS category_is_published, \
     l.name AS location_name, \
     (SELECT COUNT(*) FROM comments cm WHERE cm.post_id = p.id) AS comment_count \
     FROM posts p \
     JOIN users u ON u.id = p.author_id \
     LEFT JOIN categories c ON c.id = p.category_id \
     LEFT JOIN locations l ON l.id = p.location_id \
     WHERE 1=1 ";

#[derive(sqlx::FromRow)]
struct PostRow {
    id: Uuid,
    title: String,
    text: String,
    pub_date: OffsetDateTime,
    author_id: Uuid,
    location_id: Option<Uuid>,
    category_id: Option<Uuid>,
    image_path: Option<String>,
    is_published: bool,
    created_at: OffsetDateTime,
}

impl From<PostRow> for PostRecord {
    fn from(row: PostRow) -> Self {
        PostRecord {
            id: row.id,
            title: row.title,
            text: row.text,
            pub_date: row.pub_date,
            author_id: row.author_id,
            location_id: row.location_id,
            category_id: row.category_id,
            image_path: row.image_path,
            is_published: row.is_published,
            created_at: row.created_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct PostMetaRow {
    id: Uuid,
    title: String,
    text: String,
    pub_date: OffsetDateTime,
    author_id: Uuid,
    location_id: Option<Uuid>,
    category_id: Option<Uuid>,
    image_path: Option<String>,
    is_published: bool,
    created_at: OffsetDateTime,
    author_username: String,
    category_title: Option<String>,
    category_slug: Option<String>,
    category_is_published: Option<bool>,
    location_name: Option<String>,
    comment_count: i64,
}

impl From<PostMetaRow> for PostWithMeta {
    fn from(row: PostMetaRow) -> Self {
        let category = match (row.category_id, row.category_title, row.category_slug) {
            (Some(id), Some(title), Some(slug)) => Some(CategoryRef {
                id,
                title,
                slug,
                is_published: row.category_is_published.unwrap_or(false),
            }),
            _ => None,
        };

        PostWithMeta {
            post: PostRecord {
                id: row.id,
                title: row.title,
                text: row.text,
                pub_date: row.pub_date,
                author_id: row.author_id,
                location_id: row.location_id,
                category_id: row.category_id,
                image_path: row.image_path,
                is_published: row.is_published,
                created_at: row.created_at,
            },
            author_username: row.author_username,
            category,
            location_name: row.location_name,
            comment_count: row.comment_count,
        }
    }
}

#[async_trait]
impl PostsRepo for PostgresRepositories {
    async fn list_posts(
        &self,
        query: &PostQuery,
        page: PageRequest,
    ) -> Result<Vec<PostWithMeta>, RepoError> {
        let mut qb = QueryBuilder::new(POST_META_SELECT);
        Self::apply_scope_conditions(&mut qb, query.scope);
        Self::apply_post_filters(&mut qb, query);

        qb.push(" ORDER BY p.pub_date DESC, p.title ASC ");
        qb.push(" LIMIT ");
        qb.push_bind(i64::from(page.limit()));
        qb.push(" OFFSET ");
        qb.push_bind(page.offset() as i64);

        let rows = qb
            .build_query_as::<PostMetaRow>()
            .fetch_all(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        Ok(rows.into_iter().map(PostWithMeta::from).collect())
    }

    async fn count_posts(&self, query: &PostQuery) -> Result<u64, RepoError> {
        let mut qb = QueryBuilder::new(
            "SELECT COUNT(*) FROM posts p \
             LEFT JOIN categories c ON c.id = p.category_id \
             WHERE 1=1 ",
        );
        Self::apply_scope_conditions(&mut qb, query.scope);
        Self::apply_post_filters(&mut qb, query);

        let count: i64 = qb
            .build_query_scalar()
            .fetch_one(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        Self::convert_count(count)
    }

    async fn find_with_meta(&self, id: Uuid) -> Result<Option<PostWithMeta>, RepoError> {
        let mut qb = QueryBuilder::new(POST_META_SELECT);
        qb.push(" AND p.id = ");
        qb.push_bind(id);

        let row = qb
            .build_query_as::<PostMetaRow>()
            .fetch_optional(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        Ok(row.map(PostWithMeta::from))
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<PostRecord>, RepoError> {
        let row = sqlx::query_as::<_, PostRow>(&format!(
            "SELECT {POST_COLUMNS} FROM posts WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(row.map(PostRecord::from))
    }
}

#[async_trait]
impl PostsWriteRepo for PostgresRepositories {
    async fn create_post(&self, params: CreatePostParams) -> Result<PostRecord, RepoError> {
        let row = sqlx::query_as::<_, PostRow>(&format!(
            "INSERT INTO posts (title, text, pub_date, author_id, location_id, category_id, \
             image_path, is_published) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8) \
             RETURNING {POST_COLUMNS}"
        ))
        .bind(params.title)
        .bind(params.text)
        .bind(params.pub_date)
        .bind(params.author_id)
        .bind(params.location_id)
        .bind(params.category_id)
        .bind(params.image_path)
        .bind(params.is_published)
        .fetch_one(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(row.into())
    }

    async fn update_post(&self, params: UpdatePostParams) -> Result<PostRecord, RepoError> {
        let row = sqlx::query_as::<_, PostRow>(&format!(
            "UPDATE posts SET title = $2, text = $3, pub_date = $4, location_id = $5, \
             category_id = $6, image_path = $7, is_published = $8 \
             WHERE id = $1 \
             RETURNING {POST_COLUMNS}"
        ))
        .bind(params.id)
        .bind(params.title)
        .bind(params.text)
        .bind(params.pub_date)
        .bind(params.location_id)
        .bind(params.category_id)
        .bind(params.image_path)
        .bind(params.is_published)
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        row.map(PostRecord::from).ok_or(RepoError::NotFound)
    }

    async fn delete_post(&self, id: Uuid) -> Result<(), RepoError> {
        let result = sqlx::query("DELETE FROM posts WHERE id = $1")
            .bind(id)
            .execute(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        if result.rows_affected() == 0 {
            return Err(RepoError::NotFound);
        }
        Ok(())
    }
}
