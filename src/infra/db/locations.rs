use async_trait::async_trait;
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::application::repos::{LocationsRepo, RepoError};
use crate::domain::entities::LocationRecord;

use super::PostgresRepositories;
use super::map_sqlx_error;

#[derive(FromRow)]
struct LocationRow {
    id: Uuid,
    name: String,
    is_published: bool,
    created_at: OffsetDateTime,
}

impl From<LocationRow> for LocationRecord {
    fn from(row: LocationRow) -> Self {
        LocationRecord {
            id: row.id,
            name: row.name,
            is_published: row.is_published,
            created_at: row.created_at,
        }
    }
}

#[async_trait]
impl LocationsRepo for PostgresRepositories {
    async fn list_published(&self) -> Result<Vec<LocationRecord>, RepoError> {
        let rows = sqlx::query_as::<_, LocationRow>(
            "SELECT id, name, is_published, created_at \
             FROM locations WHERE is_published = TRUE ORDER BY name ASC",
        )
        .fetch_all(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(rows.into_iter().map(LocationRecord::from).collect())
    }
}
