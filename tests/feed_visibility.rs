//! Service-level coverage of visibility, ordering, pagination and the
//! ownership guard, driven against in-memory repositories.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use time::{Duration, OffsetDateTime};
use uuid::Uuid;

use chronica::application::comments::{CommentService, CommentWriteError};
use chronica::application::feed::{FeedError, FeedService};
use chronica::application::pagination::PageRequest;
use chronica::application::posts::{PostInput, PostService, PostWriteError};
use chronica::application::repos::{
    CategoriesRepo, CommentsRepo, CommentsWriteRepo, CreateCommentParams, CreatePostParams,
    CreateUserParams, LocationsRepo, PostListScope, PostQuery, PostsRepo, PostsWriteRepo,
    RepoError, UpdatePostParams, UpdateProfileParams, UsersRepo,
};
use chronica::domain::entities::{
    CategoryRecord, CategoryRef, CommentRecord, CommentWithAuthor, LocationRecord, PostRecord,
    PostWithMeta, UserRecord,
};
use chronica::domain::visibility::{self, Viewer};

#[derive(Default)]
struct World {
    users: Mutex<Vec<UserRecord>>,
    categories: Mutex<Vec<CategoryRecord>>,
    posts: Mutex<Vec<PostWithMeta>>,
    comments: Mutex<Vec<CommentWithAuthor>>,
}

impl World {
    fn add_user(&self, username: &str) -> UserRecord {
        let user = UserRecord {
            id: Uuid::new_v4(),
            username: username.to_string(),
            first_name: String::new(),
            last_name: String::new(),
            email: String::new(),
            password_hash: String::new(),
            created_at: OffsetDateTime::now_utc(),
        };
        self.users.lock().unwrap().push(user.clone());
        user
    }

    fn add_category(&self, slug: &str, is_published: bool) -> CategoryRecord {
        let category = CategoryRecord {
            id: Uuid::new_v4(),
            title: slug.to_string(),
            description: format!("posts about {slug}"),
            slug: slug.to_string(),
            is_published,
            created_at: OffsetDateTime::now_utc(),
        };
        self.categories.lock().unwrap().push(category.clone());
        category
    }

    fn add_post(
        &self,
        author: &UserRecord,
        category: Option<&CategoryRecord>,
        title: &str,
        pub_date: OffsetDateTime,
        is_published: bool,
    ) -> PostWithMeta {
        let post = PostWithMeta {
            post: PostRecord {
                id: Uuid::new_v4(),
                title: title.to_string(),
                text: format!("{title} body"),
                pub_date,
                author_id: author.id,
                location_id: None,
                category_id: category.map(|c| c.id),
                image_path: None,
                is_published,
                created_at: OffsetDateTime::now_utc(),
            },
            author_username: author.username.clone(),
            category: category.map(|c| CategoryRef {
                id: c.id,
                title: c.title.clone(),
                slug: c.slug.clone(),
                is_published: c.is_published,
            }),
            location_name: None,
            comment_count: 0,
        };
        self.posts.lock().unwrap().push(post.clone());
        post
    }

    fn matching(&self, query: &PostQuery) -> Vec<PostWithMeta> {
        let now = OffsetDateTime::now_utc();
        let mut matched: Vec<PostWithMeta> = self
            .posts
            .lock()
            .unwrap()
            .iter()
            .filter(|p| match query.scope {
                PostListScope::Public => visibility::is_publicly_visible(p, now),
                PostListScope::OwnProfile => true,
            })
            .filter(|p| {
                query
                    .category_id
                    .is_none_or(|id| p.post.category_id == Some(id))
            })
            .filter(|p| query.author_id.is_none_or(|id| p.post.author_id == id))
            .cloned()
            .collect();
        matched.sort_by(visibility::list_order);
        matched
    }
}

#[async_trait]
impl PostsRepo for World {
    async fn list_posts(
        &self,
        query: &PostQuery,
        page: PageRequest,
    ) -> Result<Vec<PostWithMeta>, RepoError> {
        Ok(self
            .matching(query)
            .into_iter()
            .skip(page.offset() as usize)
            .take(page.limit() as usize)
            .collect())
    }

    async fn count_posts(&self, query: &PostQuery) -> Result<u64, RepoError> {
        Ok(self.matching(query).len() as u64)
    }

    async fn find_with_meta(&self, id: Uuid) -> Result<Option<PostWithMeta>, RepoError> {
        Ok(self
            .posts
            .lock()
            .unwrap()
            .iter()
            .find(|p| p.post.id == id)
            .cloned())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<PostRecord>, RepoError> {
        Ok(self
            .posts
            .lock()
            .unwrap()
            .iter()
            .find(|p| p.post.id == id)
            .map(|p| p.post.clone()))
    }
}

#[async_trait]
impl PostsWriteRepo for World {
    async fn create_post(&self, params: CreatePostParams) -> Result<PostRecord, RepoError> {
        let author_username = self
            .users
            .lock()
            .unwrap()
            .iter()
            .find(|u| u.id == params.author_id)
            .map(|u| u.username.clone())
            .unwrap_or_default();

        let record = PostRecord {
            id: Uuid::new_v4(),
            title: params.title,
            text: params.text,
            pub_date: params.pub_date,
            author_id: params.author_id,
            location_id: params.location_id,
            category_id: params.category_id,
            image_path: params.image_path,
            is_published: params.is_published,
            created_at: OffsetDateTime::now_utc(),
        };
        self.posts.lock().unwrap().push(PostWithMeta {
            post: record.clone(),
            author_username,
            category: None,
            location_name: None,
            comment_count: 0,
        });
        Ok(record)
    }

    async fn update_post(&self, params: UpdatePostParams) -> Result<PostRecord, RepoError> {
        let mut posts = self.posts.lock().unwrap();
        let entry = posts
            .iter_mut()
            .find(|p| p.post.id == params.id)
            .ok_or(RepoError::NotFound)?;
        entry.post.title = params.title;
        entry.post.text = params.text;
        entry.post.pub_date = params.pub_date;
        entry.post.location_id = params.location_id;
        entry.post.category_id = params.category_id;
        entry.post.image_path = params.image_path;
        entry.post.is_published = params.is_published;
        Ok(entry.post.clone())
    }

    async fn delete_post(&self, id: Uuid) -> Result<(), RepoError> {
        let mut posts = self.posts.lock().unwrap();
        let before = posts.len();
        posts.retain(|p| p.post.id != id);
        if posts.len() == before {
            return Err(RepoError::NotFound);
        }
        // Storage cascades comments with their post.
        self.comments
            .lock()
            .unwrap()
            .retain(|c| c.comment.post_id != id);
        Ok(())
    }
}

#[async_trait]
impl CategoriesRepo for World {
    async fn find_published_by_slug(
        &self,
        slug: &str,
    ) -> Result<Option<CategoryRecord>, RepoError> {
        Ok(self
            .categories
            .lock()
            .unwrap()
            .iter()
            .find(|c| c.slug == slug && c.is_published)
            .cloned())
    }

    async fn list_published(&self) -> Result<Vec<CategoryRecord>, RepoError> {
        Ok(self
            .categories
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.is_published)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl LocationsRepo for World {
    async fn list_published(&self) -> Result<Vec<LocationRecord>, RepoError> {
        Ok(Vec::new())
    }
}

#[async_trait]
impl CommentsRepo for World {
    async fn list_for_post(&self, post_id: Uuid) -> Result<Vec<CommentWithAuthor>, RepoError> {
        let mut comments: Vec<CommentWithAuthor> = self
            .comments
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.comment.post_id == post_id)
            .cloned()
            .collect();
        comments.sort_by_key(|c| c.comment.created_at);
        Ok(comments)
    }

    async fn find_for_post(
        &self,
        post_id: Uuid,
        comment_id: Uuid,
    ) -> Result<Option<CommentRecord>, RepoError> {
        Ok(self
            .comments
            .lock()
            .unwrap()
            .iter()
            .find(|c| c.comment.id == comment_id && c.comment.post_id == post_id)
            .map(|c| c.comment.clone()))
    }
}

#[async_trait]
impl CommentsWriteRepo for World {
    async fn create_comment(
        &self,
        params: CreateCommentParams,
    ) -> Result<CommentRecord, RepoError> {
        let author_username = self
            .users
            .lock()
            .unwrap()
            .iter()
            .find(|u| u.id == params.author_id)
            .map(|u| u.username.clone())
            .unwrap_or_default();

        let record = CommentRecord {
            id: Uuid::new_v4(),
            text: params.text,
            post_id: params.post_id,
            author_id: params.author_id,
            created_at: OffsetDateTime::now_utc(),
        };
        self.comments.lock().unwrap().push(CommentWithAuthor {
            comment: record.clone(),
            author_username,
        });
        Ok(record)
    }

    async fn update_comment(&self, id: Uuid, text: String) -> Result<CommentRecord, RepoError> {
        let mut comments = self.comments.lock().unwrap();
        let entry = comments
            .iter_mut()
            .find(|c| c.comment.id == id)
            .ok_or(RepoError::NotFound)?;
        entry.comment.text = text;
        Ok(entry.comment.clone())
    }

    async fn delete_comment(&self, id: Uuid) -> Result<(), RepoError> {
        let mut comments = self.comments.lock().unwrap();
        let before = comments.len();
        comments.retain(|c| c.comment.id != id);
        if comments.len() == before {
            return Err(RepoError::NotFound);
        }
        Ok(())
    }
}

#[async_trait]
impl UsersRepo for World {
    async fn create_user(&self, params: CreateUserParams) -> Result<UserRecord, RepoError> {
        let user = UserRecord {
            id: Uuid::new_v4(),
            username: params.username,
            first_name: params.first_name,
            last_name: params.last_name,
            email: params.email,
            password_hash: params.password_hash,
            created_at: OffsetDateTime::now_utc(),
        };
        self.users.lock().unwrap().push(user.clone());
        Ok(user)
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<UserRecord>, RepoError> {
        Ok(self
            .users
            .lock()
            .unwrap()
            .iter()
            .find(|u| u.username == username)
            .cloned())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<UserRecord>, RepoError> {
        Ok(self
            .users
            .lock()
            .unwrap()
            .iter()
            .find(|u| u.id == id)
            .cloned())
    }

    async fn update_profile(&self, params: UpdateProfileParams) -> Result<UserRecord, RepoError> {
        let mut users = self.users.lock().unwrap();
        let user = users
            .iter_mut()
            .find(|u| u.id == params.id)
            .ok_or(RepoError::NotFound)?;
        user.username = params.username;
        user.first_name = params.first_name;
        user.last_name = params.last_name;
        user.email = params.email;
        Ok(user.clone())
    }
}

fn feed(world: &Arc<World>, page_size: u32) -> FeedService {
    FeedService::new(
        world.clone(),
        world.clone(),
        world.clone(),
        world.clone(),
        page_size,
    )
}

fn post_service(world: &Arc<World>) -> PostService {
    PostService::new(world.clone(), world.clone(), world.clone(), world.clone())
}

fn comment_service(world: &Arc<World>) -> CommentService {
    CommentService::new(world.clone(), world.clone(), world.clone())
}

fn past() -> OffsetDateTime {
    OffsetDateTime::now_utc() - Duration::hours(1)
}

#[tokio::test]
async fn public_list_applies_the_three_part_predicate() {
    let world = Arc::new(World::default());
    let author = world.add_user("alice");
    let travel = world.add_category("travel", true);
    let drafts = world.add_category("drafts", false);

    world.add_post(&author, Some(&travel), "visible", past(), true);
    world.add_post(&author, Some(&travel), "unpublished", past(), false);
    world.add_post(
        &author,
        Some(&travel),
        "scheduled",
        OffsetDateTime::now_utc() + Duration::days(1),
        true,
    );
    world.add_post(&author, Some(&drafts), "hidden-category", past(), true);
    world.add_post(&author, None, "uncategorized", past(), true);

    let slice = feed(&world, 10).home_page(1).await.expect("home page");
    let titles: Vec<&str> = slice.items.iter().map(|p| p.post.title.as_str()).collect();
    assert_eq!(titles, ["visible"]);
}

#[tokio::test]
async fn author_sees_own_posts_regardless_of_predicate() {
    let world = Arc::new(World::default());
    let author = world.add_user("alice");
    let other = world.add_user("bob");
    let travel = world.add_category("travel", true);

    world.add_post(&author, Some(&travel), "visible", past(), true);
    world.add_post(
        &author,
        Some(&travel),
        "scheduled",
        OffsetDateTime::now_utc() + Duration::days(1),
        true,
    );

    let svc = feed(&world, 10);

    let (_, own) = svc
        .profile_page("alice", Viewer::User(author.id), 1)
        .await
        .expect("own profile");
    assert_eq!(own.items.len(), 2);

    let (_, as_other) = svc
        .profile_page("alice", Viewer::User(other.id), 1)
        .await
        .expect("profile as another user");
    assert_eq!(as_other.items.len(), 1);
}

#[tokio::test]
async fn list_order_is_pub_date_desc_title_asc() {
    let world = Arc::new(World::default());
    let author = world.add_user("alice");
    let travel = world.add_category("travel", true);

    let newer = OffsetDateTime::now_utc() - Duration::hours(2);
    let older = newer - Duration::days(1);
    world.add_post(&author, Some(&travel), "B", newer, true);
    world.add_post(&author, Some(&travel), "A", newer, true);
    world.add_post(&author, Some(&travel), "C", older, true);

    let slice = feed(&world, 10).home_page(1).await.expect("home page");
    let titles: Vec<&str> = slice.items.iter().map(|p| p.post.title.as_str()).collect();
    assert_eq!(titles, ["A", "B", "C"]);
}

#[tokio::test]
async fn pagination_splits_and_clamps() {
    let world = Arc::new(World::default());
    let author = world.add_user("alice");
    let travel = world.add_category("travel", true);

    for index in 0..25 {
        world.add_post(
            &author,
            Some(&travel),
            &format!("post-{index:02}"),
            past() - Duration::minutes(index),
            true,
        );
    }

    let svc = feed(&world, 10);

    let first = svc.home_page(1).await.expect("page 1");
    let third = svc.home_page(3).await.expect("page 3");
    let clamped = svc.home_page(99).await.expect("page 99");

    assert_eq!(first.items.len(), 10);
    assert_eq!(third.items.len(), 5);
    assert_eq!(first.total_pages(), 3);
    assert_eq!(clamped.number, 3);
    assert_eq!(clamped.items.len(), 5);
}

#[tokio::test]
async fn future_dated_detail_is_not_found_for_non_authors() {
    let world = Arc::new(World::default());
    let author = world.add_user("alice");
    let travel = world.add_category("travel", true);
    let scheduled = world.add_post(
        &author,
        Some(&travel),
        "scheduled",
        OffsetDateTime::now_utc() + Duration::days(1),
        true,
    );

    let svc = feed(&world, 10);

    assert!(matches!(
        svc.post_detail(scheduled.post.id, Viewer::Anonymous).await,
        Err(FeedError::NotFound)
    ));
    svc.post_detail(scheduled.post.id, Viewer::User(author.id))
        .await
        .expect("author reaches own scheduled post");
}

#[tokio::test]
async fn non_author_edit_is_redirected_and_nothing_changes() {
    let world = Arc::new(World::default());
    let author = world.add_user("alice");
    let intruder = world.add_user("mallory");
    let travel = world.add_category("travel", true);
    let post = world.add_post(&author, Some(&travel), "original", past(), true);

    let svc = post_service(&world);
    let result = svc
        .update(
            post.post.id,
            Viewer::User(intruder.id),
            PostInput {
                title: "hijacked".to_string(),
                text: "hijacked".to_string(),
                pub_date: past(),
                category_id: None,
                location_id: None,
                image_path: None,
                is_published: true,
            },
        )
        .await;

    match result {
        Err(PostWriteError::NotAuthor { post_id }) => assert_eq!(post_id, post.post.id),
        other => panic!("unexpected result: {other:?}"),
    }

    let unchanged = PostsRepo::find_by_id(&*world, post.post.id)
        .await
        .expect("lookup")
        .expect("post still there");
    assert_eq!(unchanged.title, "original");
}

#[tokio::test]
async fn deleting_a_post_removes_its_comments() {
    let world = Arc::new(World::default());
    let author = world.add_user("alice");
    let commenter = world.add_user("bob");
    let travel = world.add_category("travel", true);
    let post = world.add_post(&author, Some(&travel), "discussed", past(), true);

    let comments = comment_service(&world);
    comments
        .create(post.post.id, commenter.id, "first".to_string())
        .await
        .expect("comment created");
    comments
        .create(post.post.id, commenter.id, "second".to_string())
        .await
        .expect("comment created");

    post_service(&world)
        .delete(post.post.id, Viewer::User(author.id))
        .await
        .expect("post deleted");

    assert!(
        world
            .list_for_post(post.post.id)
            .await
            .expect("lookup")
            .is_empty()
    );
}

#[tokio::test]
async fn comment_creation_binds_post_and_author() {
    let world = Arc::new(World::default());
    let author = world.add_user("alice");
    let travel = world.add_category("travel", true);
    let post = world.add_post(&author, Some(&travel), "discussed", past(), true);

    let record = comment_service(&world)
        .create(post.post.id, author.id, "hello".to_string())
        .await
        .expect("comment created");

    assert_eq!(record.post_id, post.post.id);
    assert_eq!(record.author_id, author.id);
}

#[tokio::test]
async fn non_author_comment_delete_is_denied() {
    let world = Arc::new(World::default());
    let author = world.add_user("alice");
    let commenter = world.add_user("bob");
    let intruder = world.add_user("mallory");
    let travel = world.add_category("travel", true);
    let post = world.add_post(&author, Some(&travel), "discussed", past(), true);

    let svc = comment_service(&world);
    let comment = svc
        .create(post.post.id, commenter.id, "mine".to_string())
        .await
        .expect("comment created");

    assert!(matches!(
        svc.delete(post.post.id, comment.id, Viewer::User(intruder.id))
            .await,
        Err(CommentWriteError::NotAuthor { .. })
    ));
    assert_eq!(
        world
            .list_for_post(post.post.id)
            .await
            .expect("lookup")
            .len(),
        1
    );
}
