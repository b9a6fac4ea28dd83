//! Publication visibility: who may see which posts.
//!
//! The SQL composition in the posts repository mirrors these rules; this
//! module is the store-free statement of them, used by the detail path and
//! by tests.

use std::cmp::Ordering;

use time::OffsetDateTime;
use uuid::Uuid;

use crate::domain::entities::PostWithMeta;

/// The identity a request is evaluated for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Viewer {
    Anonymous,
    User(Uuid),
}

impl Viewer {
    pub fn user_id(&self) -> Option<Uuid> {
        match self {
            Viewer::Anonymous => None,
            Viewer::User(id) => Some(*id),
        }
    }

    pub fn is(&self, user_id: Uuid) -> bool {
        matches!(self, Viewer::User(id) if *id == user_id)
    }
}

/// The three-part public predicate: the post is published, it sits in a
/// published category, and its publication instant has passed. A post
/// without a category fails the predicate.
pub fn is_publicly_visible(post: &PostWithMeta, now: OffsetDateTime) -> bool {
    post.post.is_published
        && post.post.pub_date <= now
        && post
            .category
            .as_ref()
            .is_some_and(|category| category.is_published)
}

/// Authors always see their own posts; everyone else gets the public
/// predicate.
pub fn is_visible_to(post: &PostWithMeta, viewer: Viewer, now: OffsetDateTime) -> bool {
    viewer.is(post.post.author_id) || is_publicly_visible(post, now)
}

/// Ordering contract for list displays: publication date descending,
/// title ascending as the tie-break. The posts repository orders its
/// queries identically.
pub fn list_order(a: &PostWithMeta, b: &PostWithMeta) -> Ordering {
    b.post
        .pub_date
        .cmp(&a.post.pub_date)
        .then_with(|| a.post.title.cmp(&b.post.title))
}
