//! Who may see a post.
//!
//! A post is public when it is published, its publish date has been reached,
//! and its category (if it has one) is published. Authors always see their
//! own posts; the override is per post, never a blanket bypass.

use time::OffsetDateTime;
use uuid::Uuid;

/// The fields of a post (and its category) that decide visibility.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VisibilityFacts {
    pub author_id: Uuid,
    pub is_published: bool,
    pub pub_date: OffsetDateTime,
    /// `None` when the post has no category.
    pub category_published: Option<bool>,
}

pub fn is_public(facts: &VisibilityFacts, now: OffsetDateTime) -> bool {
    facts.is_published && facts.pub_date <= now && facts.category_published.unwrap_or(true)
}

pub fn is_visible_to(facts: &VisibilityFacts, viewer: Option<Uuid>, now: OffsetDateTime) -> bool {
    viewer == Some(facts.author_id) || is_public(facts, now)
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::Duration;

    fn facts(author_id: Uuid, now: OffsetDateTime) -> VisibilityFacts {
        VisibilityFacts {
            author_id,
            is_published: true,
            pub_date: now - Duration::hours(1),
            category_published: Some(true),
        }
    }

    #[test]
    fn published_past_post_in_published_category_is_public() {
        let now = OffsetDateTime::now_utc();
        assert!(is_public(&facts(Uuid::new_v4(), now), now));
    }

    #[test]
    fn each_gate_hides_the_post_from_strangers() {
        let now = OffsetDateTime::now_utc();
        let author = Uuid::new_v4();
        let stranger = Some(Uuid::new_v4());

        let mut draft = facts(author, now);
        draft.is_published = false;
        assert!(!is_visible_to(&draft, stranger, now));

        let mut scheduled = facts(author, now);
        scheduled.pub_date = now + Duration::minutes(5);
        assert!(!is_visible_to(&scheduled, stranger, now));

        let mut hidden_category = facts(author, now);
        hidden_category.category_published = Some(false);
        assert!(!is_visible_to(&hidden_category, stranger, now));
        assert!(!is_visible_to(&hidden_category, None, now));
    }

    #[test]
    fn uncategorised_posts_only_depend_on_their_own_flags() {
        let now = OffsetDateTime::now_utc();
        let mut post = facts(Uuid::new_v4(), now);
        post.category_published = None;
        assert!(is_public(&post, now));
    }

    #[test]
    fn publish_date_equal_to_now_is_visible() {
        let now = OffsetDateTime::now_utc();
        let mut post = facts(Uuid::new_v4(), now);
        post.pub_date = now;
        assert!(is_public(&post, now));
    }

    #[test]
    fn author_sees_own_hidden_post() {
        let now = OffsetDateTime::now_utc();
        let author = Uuid::new_v4();
        let mut post = facts(author, now);
        post.is_published = false;
        post.pub_date = now + Duration::days(3);
        post.category_published = Some(false);

        assert!(is_visible_to(&post, Some(author), now));
    }
}
