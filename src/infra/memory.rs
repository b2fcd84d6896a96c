//! In-process repositories used when no database is configured and by the test-suite.

use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::application::pagination::PageWindow;
use crate::application::query::PostQuery;
use crate::application::repos::{
    CategoriesRepo, CategoriesWriteRepo, CommentsRepo, CommentsWriteRepo, CreateCategoryParams,
    CreateCommentParams, CreateLocationParams, CreatePostParams, CreateSessionParams,
    CreateUserParams, HealthRepo, LocationsRepo, LocationsWriteRepo, PostsRepo, PostsWriteRepo,
    RepoError, SessionsRepo, UpdatePostParams, UpdateProfileParams, UsersRepo, UsersWriteRepo,
};
use crate::domain::comments::count_by_post;
use crate::domain::entities::{
    CategoryRecord, CategoryRef, CommentRecord, CommentView, LocationRecord, PostRecord,
    PostSummary, SessionRecord, UserRecord,
};

const USERNAME_CONSTRAINT: &str = "users_username_key";
const SLUG_CONSTRAINT: &str = "categories_slug_key";

#[derive(Clone, Default)]
pub struct MemoryRepositories {
    users: Arc<DashMap<Uuid, UserRecord>>,
    usernames: Arc<DashMap<String, Uuid>>,
    sessions: Arc<DashMap<Uuid, SessionRecord>>,
    categories: Arc<DashMap<Uuid, CategoryRecord>>,
    category_slugs: Arc<DashMap<String, Uuid>>,
    locations: Arc<DashMap<Uuid, LocationRecord>>,
    posts: Arc<DashMap<Uuid, PostRecord>>,
    comments: Arc<DashMap<Uuid, CommentRecord>>,
}

impl MemoryRepositories {
    pub fn new() -> Self {
        Self::default()
    }

    fn summarize(&self, post: PostRecord, comment_count: u64) -> Result<PostSummary, RepoError> {
        let author_username = self
            .users
            .get(&post.author_id)
            .map(|user| user.username.clone())
            .ok_or_else(|| RepoError::Integrity {
                message: format!("post {} references a missing author", post.id),
            })?;
        let category = post.category_id.and_then(|id| {
            self.categories.get(&id).map(|category| CategoryRef {
                title: category.title.clone(),
                slug: category.slug.clone(),
                is_published: category.is_published,
            })
        });
        let location_name = post
            .location_id
            .and_then(|id| self.locations.get(&id).map(|location| location.name.clone()));

        Ok(PostSummary {
            post,
            author_username,
            category,
            location_name,
            comment_count,
        })
    }

    fn all_summaries(&self) -> Result<Vec<PostSummary>, RepoError> {
        let comments: Vec<CommentRecord> = self
            .comments
            .iter()
            .map(|entry| entry.value().clone())
            .collect();
        let counts = count_by_post(&comments);

        let posts: Vec<PostRecord> = self.posts.iter().map(|entry| entry.value().clone()).collect();
        posts
            .into_iter()
            .map(|post| {
                let count = counts.get(&post.id).copied().unwrap_or(0);
                self.summarize(post, count)
            })
            .collect()
    }

    fn matching(&self, query: &PostQuery) -> Result<Vec<PostSummary>, RepoError> {
        let mut matching: Vec<PostSummary> = self
            .all_summaries()?
            .into_iter()
            .filter(|summary| query.admits(summary))
            .collect();
        matching.sort_by(|a, b| {
            b.post
                .pub_date
                .cmp(&a.post.pub_date)
                .then_with(|| b.post.id.cmp(&a.post.id))
        });
        Ok(matching)
    }

    fn check_references(
        &self,
        author_id: Option<Uuid>,
        category_id: Option<Uuid>,
        location_id: Option<Uuid>,
    ) -> Result<(), RepoError> {
        if let Some(id) = author_id
            && !self.users.contains_key(&id)
        {
            return Err(RepoError::InvalidInput {
                message: format!("unknown author {id}"),
            });
        }
        if let Some(id) = category_id
            && !self.categories.contains_key(&id)
        {
            return Err(RepoError::InvalidInput {
                message: format!("unknown category {id}"),
            });
        }
        if let Some(id) = location_id
            && !self.locations.contains_key(&id)
        {
            return Err(RepoError::InvalidInput {
                message: format!("unknown location {id}"),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl PostsRepo for MemoryRepositories {
    async fn list_posts(
        &self,
        query: &PostQuery,
        window: &PageWindow,
    ) -> Result<Vec<PostSummary>, RepoError> {
        let matching = self.matching(query)?;
        Ok(window.slice(&matching))
    }

    async fn count_posts(&self, query: &PostQuery) -> Result<u64, RepoError> {
        Ok(self.matching(query)?.len() as u64)
    }

    async fn find_post(&self, id: Uuid) -> Result<Option<PostRecord>, RepoError> {
        Ok(self.posts.get(&id).map(|post| post.clone()))
    }

    async fn find_summary(&self, id: Uuid) -> Result<Option<PostSummary>, RepoError> {
        let Some(post) = self.posts.get(&id).map(|post| post.clone()) else {
            return Ok(None);
        };
        let count = self
            .comments
            .iter()
            .filter(|entry| entry.post_id == id)
            .count() as u64;
        self.summarize(post, count).map(Some)
    }
}

#[async_trait]
impl PostsWriteRepo for MemoryRepositories {
    async fn create_post(&self, params: CreatePostParams) -> Result<PostRecord, RepoError> {
        self.check_references(
            Some(params.author_id),
            params.category_id,
            params.location_id,
        )?;

        let record = PostRecord {
            id: Uuid::new_v4(),
            title: params.title,
            text: params.text,
            pub_date: params.pub_date,
            is_published: params.is_published,
            image: params.image,
            author_id: params.author_id,
            category_id: params.category_id,
            location_id: params.location_id,
            created_at: OffsetDateTime::now_utc(),
        };
        self.posts.insert(record.id, record.clone());
        Ok(record)
    }

    async fn update_post(&self, params: UpdatePostParams) -> Result<PostRecord, RepoError> {
        self.check_references(None, params.category_id, params.location_id)?;

        let mut post = self.posts.get_mut(&params.id).ok_or(RepoError::NotFound)?;
        post.title = params.title;
        post.text = params.text;
        post.pub_date = params.pub_date;
        post.is_published = params.is_published;
        post.image = params.image;
        post.category_id = params.category_id;
        post.location_id = params.location_id;
        Ok(post.clone())
    }

    async fn delete_post(&self, id: Uuid) -> Result<(), RepoError> {
        self.posts.remove(&id).ok_or(RepoError::NotFound)?;
        self.comments.retain(|_, comment| comment.post_id != id);
        Ok(())
    }
}

#[async_trait]
impl CategoriesRepo for MemoryRepositories {
    async fn find_by_slug(&self, slug: &str) -> Result<Option<CategoryRecord>, RepoError> {
        let Some(id) = self.category_slugs.get(slug).map(|id| *id) else {
            return Ok(None);
        };
        Ok(self.categories.get(&id).map(|category| category.clone()))
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<CategoryRecord>, RepoError> {
        Ok(self.categories.get(&id).map(|category| category.clone()))
    }

    async fn list_published(&self) -> Result<Vec<CategoryRecord>, RepoError> {
        let mut categories: Vec<CategoryRecord> = self
            .categories
            .iter()
            .filter(|entry| entry.is_published)
            .map(|entry| entry.value().clone())
            .collect();
        categories.sort_by(|a, b| a.title.cmp(&b.title).then_with(|| a.id.cmp(&b.id)));
        Ok(categories)
    }

    async fn slug_exists(&self, slug: &str) -> Result<bool, RepoError> {
        Ok(self.category_slugs.contains_key(slug))
    }
}

#[async_trait]
impl CategoriesWriteRepo for MemoryRepositories {
    async fn create_category(
        &self,
        params: CreateCategoryParams,
    ) -> Result<CategoryRecord, RepoError> {
        let record = CategoryRecord {
            id: Uuid::new_v4(),
            title: params.title,
            description: params.description,
            slug: params.slug,
            is_published: params.is_published,
            created_at: OffsetDateTime::now_utc(),
        };

        match self.category_slugs.entry(record.slug.clone()) {
            Entry::Occupied(_) => {
                return Err(RepoError::Duplicate {
                    constraint: SLUG_CONSTRAINT.to_string(),
                });
            }
            Entry::Vacant(slot) => {
                slot.insert(record.id);
            }
        }
        self.categories.insert(record.id, record.clone());
        Ok(record)
    }

    async fn delete_category(&self, id: Uuid) -> Result<(), RepoError> {
        let (_, category) = self.categories.remove(&id).ok_or(RepoError::NotFound)?;
        self.category_slugs.remove(&category.slug);
        for mut post in self.posts.iter_mut() {
            if post.category_id == Some(id) {
                post.category_id = None;
            }
        }
        Ok(())
    }
}

#[async_trait]
impl LocationsRepo for MemoryRepositories {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<LocationRecord>, RepoError> {
        Ok(self.locations.get(&id).map(|location| location.clone()))
    }

    async fn list_locations(&self) -> Result<Vec<LocationRecord>, RepoError> {
        let mut locations: Vec<LocationRecord> = self
            .locations
            .iter()
            .map(|entry| entry.value().clone())
            .collect();
        locations.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.id.cmp(&b.id)));
        Ok(locations)
    }
}

#[async_trait]
impl LocationsWriteRepo for MemoryRepositories {
    async fn create_location(
        &self,
        params: CreateLocationParams,
    ) -> Result<LocationRecord, RepoError> {
        let record = LocationRecord {
            id: Uuid::new_v4(),
            name: params.name,
            is_published: params.is_published,
            created_at: OffsetDateTime::now_utc(),
        };
        self.locations.insert(record.id, record.clone());
        Ok(record)
    }

    async fn delete_location(&self, id: Uuid) -> Result<(), RepoError> {
        self.locations.remove(&id).ok_or(RepoError::NotFound)?;
        for mut post in self.posts.iter_mut() {
            if post.location_id == Some(id) {
                post.location_id = None;
            }
        }
        Ok(())
    }
}

#[async_trait]
impl CommentsRepo for MemoryRepositories {
    async fn list_for_post(&self, post_id: Uuid) -> Result<Vec<CommentView>, RepoError> {
        let mut comments: Vec<CommentRecord> = self
            .comments
            .iter()
            .filter(|entry| entry.post_id == post_id)
            .map(|entry| entry.value().clone())
            .collect();
        comments.sort_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then_with(|| a.id.cmp(&b.id))
        });

        comments
            .into_iter()
            .map(|comment| {
                let author_username = self
                    .users
                    .get(&comment.author_id)
                    .map(|user| user.username.clone())
                    .ok_or_else(|| RepoError::Integrity {
                        message: format!("comment {} references a missing author", comment.id),
                    })?;
                Ok(CommentView {
                    comment,
                    author_username,
                })
            })
            .collect()
    }

    async fn find_comment(&self, id: Uuid) -> Result<Option<CommentRecord>, RepoError> {
        Ok(self.comments.get(&id).map(|comment| comment.clone()))
    }
}

#[async_trait]
impl CommentsWriteRepo for MemoryRepositories {
    async fn create_comment(
        &self,
        params: CreateCommentParams,
    ) -> Result<CommentRecord, RepoError> {
        if !self.posts.contains_key(&params.post_id) {
            return Err(RepoError::InvalidInput {
                message: format!("unknown post {}", params.post_id),
            });
        }
        self.check_references(Some(params.author_id), None, None)?;

        let record = CommentRecord {
            id: Uuid::new_v4(),
            text: params.text,
            post_id: params.post_id,
            author_id: params.author_id,
            created_at: OffsetDateTime::now_utc(),
        };
        self.comments.insert(record.id, record.clone());
        Ok(record)
    }

    async fn update_comment(&self, id: Uuid, text: String) -> Result<CommentRecord, RepoError> {
        let mut comment = self.comments.get_mut(&id).ok_or(RepoError::NotFound)?;
        comment.text = text;
        Ok(comment.clone())
    }

    async fn delete_comment(&self, id: Uuid) -> Result<(), RepoError> {
        self.comments
            .remove(&id)
            .map(|_| ())
            .ok_or(RepoError::NotFound)
    }
}

#[async_trait]
impl UsersRepo for MemoryRepositories {
    async fn find_user(&self, id: Uuid) -> Result<Option<UserRecord>, RepoError> {
        Ok(self.users.get(&id).map(|user| user.clone()))
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<UserRecord>, RepoError> {
        let Some(id) = self.usernames.get(username).map(|id| *id) else {
            return Ok(None);
        };
        Ok(self.users.get(&id).map(|user| user.clone()))
    }
}

#[async_trait]
impl UsersWriteRepo for MemoryRepositories {
    async fn create_user(&self, params: CreateUserParams) -> Result<UserRecord, RepoError> {
        let record = UserRecord {
            id: Uuid::new_v4(),
            username: params.username,
            email: params.email,
            first_name: params.first_name,
            last_name: params.last_name,
            password_hash: params.password_hash,
            joined_at: OffsetDateTime::now_utc(),
        };

        match self.usernames.entry(record.username.clone()) {
            Entry::Occupied(_) => {
                return Err(RepoError::Duplicate {
                    constraint: USERNAME_CONSTRAINT.to_string(),
                });
            }
            Entry::Vacant(slot) => {
                slot.insert(record.id);
            }
        }
        self.users.insert(record.id, record.clone());
        Ok(record)
    }

    async fn update_profile(&self, params: UpdateProfileParams) -> Result<UserRecord, RepoError> {
        let current = self
            .users
            .get(&params.id)
            .map(|user| user.username.clone())
            .ok_or(RepoError::NotFound)?;

        if current != params.username {
            match self.usernames.entry(params.username.clone()) {
                Entry::Occupied(_) => {
                    return Err(RepoError::Duplicate {
                        constraint: USERNAME_CONSTRAINT.to_string(),
                    });
                }
                Entry::Vacant(slot) => {
                    slot.insert(params.id);
                }
            }
            self.usernames.remove(&current);
        }

        let mut user = self.users.get_mut(&params.id).ok_or(RepoError::NotFound)?;
        user.username = params.username;
        user.email = params.email;
        user.first_name = params.first_name;
        user.last_name = params.last_name;
        Ok(user.clone())
    }
}

#[async_trait]
impl SessionsRepo for MemoryRepositories {
    async fn create_session(
        &self,
        params: CreateSessionParams,
    ) -> Result<SessionRecord, RepoError> {
        let record = SessionRecord {
            id: params.id,
            user_id: params.user_id,
            token_hash: params.token_hash,
            created_at: OffsetDateTime::now_utc(),
            expires_at: params.expires_at,
        };

        match self.sessions.entry(record.id) {
            Entry::Occupied(_) => Err(RepoError::Duplicate {
                constraint: "sessions_pkey".to_string(),
            }),
            Entry::Vacant(slot) => {
                slot.insert(record.clone());
                Ok(record)
            }
        }
    }

    async fn find_session(&self, id: Uuid) -> Result<Option<SessionRecord>, RepoError> {
        Ok(self.sessions.get(&id).map(|session| session.clone()))
    }

    async fn delete_session(&self, id: Uuid) -> Result<(), RepoError> {
        self.sessions.remove(&id);
        Ok(())
    }

    async fn delete_expired(&self, now: OffsetDateTime) -> Result<u64, RepoError> {
        let before = self.sessions.len();
        self.sessions.retain(|_, session| session.expires_at > now);
        Ok(before.saturating_sub(self.sessions.len()) as u64)
    }
}

#[async_trait]
impl HealthRepo for MemoryRepositories {
    async fn ping(&self) -> Result<(), RepoError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::pagination::{Paginator, RequestedPage};
    use time::Duration;

    async fn seed_user(repos: &MemoryRepositories, username: &str) -> UserRecord {
        repos
            .create_user(CreateUserParams {
                username: username.to_string(),
                email: format!("{username}@example.com"),
                first_name: String::new(),
                last_name: String::new(),
                password_hash: "hash".to_string(),
            })
            .await
            .expect("user")
    }

    async fn seed_post(
        repos: &MemoryRepositories,
        author: Uuid,
        pub_date: OffsetDateTime,
        is_published: bool,
    ) -> PostRecord {
        repos
            .create_post(CreatePostParams {
                title: "Title".to_string(),
                text: "Text".to_string(),
                pub_date,
                is_published,
                image: None,
                author_id: author,
                category_id: None,
                location_id: None,
            })
            .await
            .expect("post")
    }

    #[tokio::test]
    async fn duplicate_username_is_rejected() {
        let repos = MemoryRepositories::new();
        seed_user(&repos, "alice").await;

        let err = repos
            .create_user(CreateUserParams {
                username: "alice".to_string(),
                email: "other@example.com".to_string(),
                first_name: String::new(),
                last_name: String::new(),
                password_hash: "hash".to_string(),
            })
            .await
            .expect_err("duplicate");
        assert!(matches!(err, RepoError::Duplicate { .. }));
    }

    #[tokio::test]
    async fn feed_hides_drafts_and_scheduled_posts() {
        let repos = MemoryRepositories::new();
        let author = seed_user(&repos, "alice").await;
        let now = OffsetDateTime::now_utc();

        let visible = seed_post(&repos, author.id, now - Duration::hours(1), true).await;
        seed_post(&repos, author.id, now - Duration::hours(1), false).await;
        seed_post(&repos, author.id, now + Duration::days(1), true).await;

        let query = PostQuery::feed(now);
        let total = repos.count_posts(&query).await.expect("count");
        let window = Paginator::default().window(RequestedPage::Number(1), total);
        let listed = repos.list_posts(&query, &window).await.expect("list");

        assert_eq!(total, 1);
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].post.id, visible.id);
    }

    #[tokio::test]
    async fn deleting_a_post_removes_its_comments() {
        let repos = MemoryRepositories::new();
        let author = seed_user(&repos, "alice").await;
        let post = seed_post(&repos, author.id, OffsetDateTime::now_utc(), true).await;
        let comment = repos
            .create_comment(CreateCommentParams {
                post_id: post.id,
                author_id: author.id,
                text: "first".to_string(),
            })
            .await
            .expect("comment");

        repos.delete_post(post.id).await.expect("delete");

        assert!(repos.find_comment(comment.id).await.expect("find").is_none());
    }

    #[tokio::test]
    async fn listing_counts_comments_per_post() {
        let repos = MemoryRepositories::new();
        let author = seed_user(&repos, "alice").await;
        let now = OffsetDateTime::now_utc();
        let post = seed_post(&repos, author.id, now - Duration::minutes(5), true).await;
        for text in ["one", "two"] {
            repos
                .create_comment(CreateCommentParams {
                    post_id: post.id,
                    author_id: author.id,
                    text: text.to_string(),
                })
                .await
                .expect("comment");
        }

        let summary = repos
            .find_summary(post.id)
            .await
            .expect("find")
            .expect("summary");
        assert_eq!(summary.comment_count, 2);
        assert_eq!(summary.author_username, "alice");
    }

    #[tokio::test]
    async fn expired_sessions_are_purged() {
        let repos = MemoryRepositories::new();
        let user = seed_user(&repos, "alice").await;
        let now = OffsetDateTime::now_utc();

        for expires_at in [now - Duration::hours(1), now + Duration::hours(1)] {
            repos
                .create_session(CreateSessionParams {
                    id: Uuid::new_v4(),
                    user_id: user.id,
                    token_hash: vec![0; 32],
                    expires_at,
                })
                .await
                .expect("session");
        }

        assert_eq!(repos.delete_expired(now).await.expect("purge"), 1);
    }
}
