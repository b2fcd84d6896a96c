//! Domain entities mirrored from persistent storage.

use serde::Serialize;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::domain::visibility::VisibilityFacts;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserRecord {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub joined_at: OffsetDateTime,
}

impl UserRecord {
    /// First and last name joined by a space, or the username when both are blank.
    pub fn display_name(&self) -> String {
        let full = format!("{} {}", self.first_name.trim(), self.last_name.trim());
        let full = full.trim();
        if full.is_empty() {
            self.username.clone()
        } else {
            full.to_string()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CategoryRecord {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub slug: String,
    pub is_published: bool,
    pub created_at: OffsetDateTime,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LocationRecord {
    pub id: Uuid,
    pub name: String,
    pub is_published: bool,
    pub created_at: OffsetDateTime,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PostRecord {
    pub id: Uuid,
    pub title: String,
    pub text: String,
    pub pub_date: OffsetDateTime,
    pub is_published: bool,
    pub image: Option<String>,
    pub author_id: Uuid,
    pub category_id: Option<Uuid>,
    pub location_id: Option<Uuid>,
    pub created_at: OffsetDateTime,
}

impl PostRecord {
    pub fn visibility_facts(&self, category: Option<&CategoryRecord>) -> VisibilityFacts {
        VisibilityFacts {
            author_id: self.author_id,
            is_published: self.is_published,
            pub_date: self.pub_date,
            category_published: category.map(|category| category.is_published),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommentRecord {
    pub id: Uuid,
    pub text: String,
    pub post_id: Uuid,
    pub author_id: Uuid,
    pub created_at: OffsetDateTime,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionRecord {
    pub id: Uuid,
    pub user_id: Uuid,
    pub token_hash: Vec<u8>,
    pub created_at: OffsetDateTime,
    pub expires_at: OffsetDateTime,
}

/// The slice of a category a post listing needs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CategoryRef {
    pub title: String,
    pub slug: String,
    pub is_published: bool,
}

/// A post joined with its author, category and location, annotated with its comment count.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PostSummary {
    pub post: PostRecord,
    pub author_username: String,
    pub category: Option<CategoryRef>,
    pub location_name: Option<String>,
    pub comment_count: u64,
}

impl PostSummary {
    pub fn visibility_facts(&self) -> VisibilityFacts {
        VisibilityFacts {
            author_id: self.post.author_id,
            is_published: self.post.is_published,
            pub_date: self.post.pub_date,
            category_published: self.category.as_ref().map(|category| category.is_published),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommentView {
    pub comment: CommentRecord,
    pub author_username: String,
}
