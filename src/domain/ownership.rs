//! Ownership authorization for mutating posts and comments.
//!
//! Every update/delete takes this decision before any repository write.
//! Denial is never surfaced as a hard error: the HTTP layer turns it into
//! a redirect to the parent resource's detail page.

use uuid::Uuid;

use crate::domain::visibility::Viewer;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Granted,
    Denied,
}

impl Decision {
    pub fn is_granted(&self) -> bool {
        matches!(self, Decision::Granted)
    }
}

/// Permit iff the acting identity is the resource's author.
pub fn authorize(author_id: Uuid, actor: Viewer) -> Decision {
    if actor.is(author_id) {
        Decision::Granted
    } else {
        Decision::Denied
    }
}
