//! Listing filters shared by the feed, category and profile pages.

use time::OffsetDateTime;
use uuid::Uuid;

use crate::domain::entities::PostSummary;
use crate::domain::visibility::{self, VisibilityFacts};

/// Which posts a listing draws from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PostScope {
    All,
    Category(Uuid),
    Author(Uuid),
}

/// Which of the scoped posts the viewer is allowed to see.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PostVisibility {
    Public { now: OffsetDateTime },
    /// Public posts plus every post written by `viewer`.
    PublicOrOwnedBy { viewer: Uuid, now: OffsetDateTime },
}

impl PostVisibility {
    pub fn now(&self) -> OffsetDateTime {
        match self {
            PostVisibility::Public { now } | PostVisibility::PublicOrOwnedBy { now, .. } => *now,
        }
    }

    pub fn viewer(&self) -> Option<Uuid> {
        match self {
            PostVisibility::Public { .. } => None,
            PostVisibility::PublicOrOwnedBy { viewer, .. } => Some(*viewer),
        }
    }

    pub fn admits(&self, facts: &VisibilityFacts) -> bool {
        visibility::is_visible_to(facts, self.viewer(), self.now())
    }
}

/// A post listing request. Results are always ordered newest `pub_date` first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PostQuery {
    pub scope: PostScope,
    pub visibility: PostVisibility,
}

impl PostQuery {
    pub fn feed(now: OffsetDateTime) -> Self {
        Self {
            scope: PostScope::All,
            visibility: PostVisibility::Public { now },
        }
    }

    pub fn category(category_id: Uuid, now: OffsetDateTime) -> Self {
        Self {
            scope: PostScope::Category(category_id),
            visibility: PostVisibility::Public { now },
        }
    }

    /// The owner of a profile sees all of their posts; everybody else sees the public ones.
    pub fn profile(author_id: Uuid, viewer: Option<Uuid>, now: OffsetDateTime) -> Self {
        let visibility = match viewer {
            Some(viewer) if viewer == author_id => PostVisibility::PublicOrOwnedBy { viewer, now },
            _ => PostVisibility::Public { now },
        };
        Self {
            scope: PostScope::Author(author_id),
            visibility,
        }
    }

    /// Evaluate the query against an already joined post.
    pub fn admits(&self, summary: &PostSummary) -> bool {
        let in_scope = match self.scope {
            PostScope::All => true,
            PostScope::Category(id) => summary.post.category_id == Some(id),
            PostScope::Author(id) => summary.post.author_id == id,
        };
        in_scope && self.visibility.admits(&summary.visibility_facts())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::{CategoryRef, PostRecord};
    use time::Duration;

    fn summary(author_id: Uuid, category_id: Uuid, now: OffsetDateTime) -> PostSummary {
        PostSummary {
            post: PostRecord {
                id: Uuid::new_v4(),
                title: "Hello".into(),
                text: "World".into(),
                pub_date: now - Duration::hours(2),
                is_published: true,
                image: None,
                author_id,
                category_id: Some(category_id),
                location_id: None,
                created_at: now,
            },
            author_username: "author".into(),
            category: Some(CategoryRef {
                title: "Travel".into(),
                slug: "travel".into(),
                is_published: true,
            }),
            location_name: None,
            comment_count: 0,
        }
    }

    #[test]
    fn profile_owner_sees_unpublished_posts() {
        let now = OffsetDateTime::now_utc();
        let author = Uuid::new_v4();
        let category = Uuid::new_v4();
        let mut post = summary(author, category, now);
        post.post.is_published = false;

        let own = PostQuery::profile(author, Some(author), now);
        let other = PostQuery::profile(author, Some(Uuid::new_v4()), now);
        let anonymous = PostQuery::profile(author, None, now);

        assert!(own.admits(&post));
        assert!(!other.admits(&post));
        assert!(!anonymous.admits(&post));
    }

    #[test]
    fn category_scope_filters_on_category_id() {
        let now = OffsetDateTime::now_utc();
        let category = Uuid::new_v4();
        let post = summary(Uuid::new_v4(), category, now);

        assert!(PostQuery::category(category, now).admits(&post));
        assert!(!PostQuery::category(Uuid::new_v4(), now).admits(&post));
    }

    #[test]
    fn feed_hides_posts_in_unpublished_categories() {
        let now = OffsetDateTime::now_utc();
        let category = Uuid::new_v4();
        let mut post = summary(Uuid::new_v4(), category, now);
        if let Some(category) = post.category.as_mut() {
            category.is_published = false;
        }

        assert!(!PostQuery::feed(now).admits(&post));
    }
}
