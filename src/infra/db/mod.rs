//! Postgres-backed repository implementations.

mod categories;
mod comments;
mod locations;
mod posts;
mod users;
mod util;

pub use util::map_sqlx_error;

use std::sync::Arc;

use sqlx::{
    Postgres, QueryBuilder,
    postgres::{PgPool, PgPoolOptions},
    query,
};

use crate::application::repos::{PostListScope, PostQuery, RepoError};

#[derive(Clone)]
pub struct PostgresRepositories {
    pool: Arc<PgPool>,
}

impl PostgresRepositories {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub async fn connect(url: &str, max_connections: u32) -> Result<PgPool, sqlx::Error> {
        PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(url)
            .await
    }

    pub async fn run_migrations(pool: &PgPool) -> Result<(), sqlx::Error> {
        sqlx::migrate!("./migrations")
            .run(pool)
            .await
            .map_err(Into::into)
    }

    pub async fn health_check(&self) -> Result<(), sqlx::Error> {
        query("SELECT 1").execute(self.pool()).await.map(|_| ())
    }

    /// The public scope is the SQL mirror of the domain visibility
    /// predicate; the own-profile scope applies nothing.
    fn apply_scope_conditions(qb: &mut QueryBuilder<'_, Postgres>, scope: PostListScope) {
        match scope {
            PostListScope::Public => {
                qb.push(
                    " AND p.is_published = TRUE AND c.is_published = TRUE \
                     AND p.pub_date <= now() ",
                );
            }
            PostListScope::OwnProfile => {}
        }
    }

    fn apply_post_filters<'q>(qb: &mut QueryBuilder<'q, Postgres>, query: &'q PostQuery) {
        if let Some(category_id) = query.category_id {
            qb.push(" AND p.category_id = ");
            qb.push_bind(category_id);
        }
        if let Some(author_id) = query.author_id {
            qb.push(" AND p.author_id = ");
            qb.push_bind(author_id);
        }
    }

    fn convert_count(count: i64) -> Result<u64, RepoError> {
        u64::try_from(count)
            .map_err(|_| RepoError::from_persistence("negative row count from database"))
    }
}
