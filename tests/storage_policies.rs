//! Live validation of the foreign-key deletion policy table against a
//! running Postgres.
//!
//! - Reads the connection string from `DATABASE_URL`.
//! - Runs the embedded migrations before each scenario.
//! - Marked `#[ignore]` so it only runs manually against a disposable
//!   database.

use sqlx::PgPool;
use uuid::Uuid;

type TestResult<T> = Result<T, Box<dyn std::error::Error>>;

async fn connect() -> TestResult<PgPool> {
    let url = std::env::var("DATABASE_URL")?;
    let pool = PgPool::connect(&url).await?;
    sqlx::migrate!("./migrations").run(&pool).await?;
    Ok(pool)
}

async fn insert_user(pool: &PgPool, username: &str) -> TestResult<Uuid> {
    let id: (Uuid,) = sqlx::query_as(
        "INSERT INTO users (username, password_hash) VALUES ($1, 'x') RETURNING id",
    )
    .bind(format!("{username}-{}", Uuid::new_v4().simple()))
    .fetch_one(pool)
    .await?;
    Ok(id.0)
}

async fn insert_category(pool: &PgPool) -> TestResult<Uuid> {
    let id: (Uuid,) = sqlx::query_as(
        "INSERT INTO categories (title, slug) VALUES ('Travel', $1) RETURNING id",
    )
    .bind(format!("travel-{}", Uuid::new_v4().simple()))
    .fetch_one(pool)
    .await?;
    Ok(id.0)
}

async fn insert_location(pool: &PgPool) -> TestResult<Uuid> {
    let id: (Uuid,) =
        sqlx::query_as("INSERT INTO locations (name) VALUES ('Kyoto') RETURNING id")
            .fetch_one(pool)
            .await?;
    Ok(id.0)
}

async fn insert_post(
    pool: &PgPool,
    author: Uuid,
    category: Option<Uuid>,
    location: Option<Uuid>,
) -> TestResult<Uuid> {
    let id: (Uuid,) = sqlx::query_as(
        "INSERT INTO posts (title, text, pub_date, author_id, category_id, location_id) \
         VALUES ('t', 'b', now(), $1, $2, $3) RETURNING id",
    )
    .bind(author)
    .bind(category)
    .bind(location)
    .fetch_one(pool)
    .await?;
    Ok(id.0)
}

async fn insert_comment(pool: &PgPool, post: Uuid, author: Uuid) -> TestResult<Uuid> {
    let id: (Uuid,) = sqlx::query_as(
        "INSERT INTO comments (text, post_id, author_id) VALUES ('c', $1, $2) RETURNING id",
    )
    .bind(post)
    .bind(author)
    .fetch_one(pool)
    .await?;
    Ok(id.0)
}

async fn count(pool: &PgPool, sql: &str, id: Uuid) -> TestResult<i64> {
    let row: (i64,) = sqlx::query_as(sql).bind(id).fetch_one(pool).await?;
    Ok(row.0)
}

#[tokio::test]
#[ignore]
async fn category_delete_nullifies_posts() -> TestResult<()> {
    let pool = connect().await?;
    let author = insert_user(&pool, "author").await?;
    let category = insert_category(&pool).await?;
    let post = insert_post(&pool, author, Some(category), None).await?;

    sqlx::query("DELETE FROM categories WHERE id = $1")
        .bind(category)
        .execute(&pool)
        .await?;

    let row: (Option<Uuid>,) = sqlx::query_as("SELECT category_id FROM posts WHERE id = $1")
        .bind(post)
        .fetch_one(&pool)
        .await?;
    assert_eq!(row.0, None, "post survives with a nulled category");
    Ok(())
}

#[tokio::test]
#[ignore]
async fn location_delete_nullifies_posts() -> TestResult<()> {
    let pool = connect().await?;
    let author = insert_user(&pool, "author").await?;
    let location = insert_location(&pool).await?;
    let post = insert_post(&pool, author, None, Some(location)).await?;

    sqlx::query("DELETE FROM locations WHERE id = $1")
        .bind(location)
        .execute(&pool)
        .await?;

    let row: (Option<Uuid>,) = sqlx::query_as("SELECT location_id FROM posts WHERE id = $1")
        .bind(post)
        .fetch_one(&pool)
        .await?;
    assert_eq!(row.0, None, "post survives with a nulled location");
    Ok(())
}

#[tokio::test]
#[ignore]
async fn post_delete_cascades_comments() -> TestResult<()> {
    let pool = connect().await?;
    let author = insert_user(&pool, "author").await?;
    let commenter = insert_user(&pool, "commenter").await?;
    let post = insert_post(&pool, author, None, None).await?;
    insert_comment(&pool, post, commenter).await?;
    insert_comment(&pool, post, commenter).await?;

    sqlx::query("DELETE FROM posts WHERE id = $1")
        .bind(post)
        .execute(&pool)
        .await?;

    let remaining = count(
        &pool,
        "SELECT COUNT(*) FROM comments WHERE post_id = $1",
        post,
    )
    .await?;
    assert_eq!(remaining, 0, "no orphan comments remain");
    Ok(())
}

#[tokio::test]
#[ignore]
async fn user_delete_cascades_posts_and_comments() -> TestResult<()> {
    let pool = connect().await?;
    let author = insert_user(&pool, "author").await?;
    let commenter = insert_user(&pool, "commenter").await?;
    let post = insert_post(&pool, author, None, None).await?;
    insert_comment(&pool, post, commenter).await?;

    sqlx::query("DELETE FROM users WHERE id = $1")
        .bind(author)
        .execute(&pool)
        .await?;

    let posts = count(&pool, "SELECT COUNT(*) FROM posts WHERE id = $1", post).await?;
    assert_eq!(posts, 0, "author's posts are gone");

    let comments = count(
        &pool,
        "SELECT COUNT(*) FROM comments WHERE post_id = $1",
        post,
    )
    .await?;
    assert_eq!(comments, 0, "comments under the author's posts are gone");
    Ok(())
}

#[tokio::test]
#[ignore]
async fn comment_author_delete_cascades_their_comments() -> TestResult<()> {
    let pool = connect().await?;
    let author = insert_user(&pool, "author").await?;
    let commenter = insert_user(&pool, "commenter").await?;
    let post = insert_post(&pool, author, None, None).await?;
    insert_comment(&pool, post, commenter).await?;

    sqlx::query("DELETE FROM users WHERE id = $1")
        .bind(commenter)
        .execute(&pool)
        .await?;

    let remaining = count(
        &pool,
        "SELECT COUNT(*) FROM comments WHERE post_id = $1",
        post,
    )
    .await?;
    assert_eq!(remaining, 0, "the commenter's comments are gone");

    let posts = count(&pool, "SELECT COUNT(*) FROM posts WHERE id = $1", post).await?;
    assert_eq!(posts, 1, "the post itself survives");
    Ok(())
}
