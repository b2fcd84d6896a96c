use std::sync::Arc;

use thiserror::Error;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::application::pagination::{Page, Paginator, RequestedPage};
use crate::application::query::PostQuery;
use crate::application::repos::{CategoriesRepo, CommentsRepo, PostsRepo, RepoError, UsersRepo};
use crate::domain::entities::{CategoryRecord, CommentView, PostSummary, UserRecord};
use crate::domain::visibility;

#[derive(Debug, Error)]
pub enum FeedError {
    #[error("unknown category")]
    UnknownCategory,
    #[error("unknown user")]
    UnknownUser,
    #[error("post not found")]
    PostNotFound,
    #[error(transparent)]
    Repo(#[from] RepoError),
}

#[derive(Debug, Clone)]
pub struct CategoryListing {
    pub category: CategoryRecord,
    pub page: Page<PostSummary>,
}

#[derive(Debug, Clone)]
pub struct ProfileListing {
    pub profile: UserRecord,
    pub page: Page<PostSummary>,
    pub is_owner: bool,
}

#[derive(Debug, Clone)]
pub struct PostDetail {
    pub post: PostSummary,
    pub comments: Vec<CommentView>,
}

/// Read side of the blog: the index, category and profile listings, and post detail.
#[derive(Clone)]
pub struct FeedService {
    posts: Arc<dyn PostsRepo>,
    categories: Arc<dyn CategoriesRepo>,
    comments: Arc<dyn CommentsRepo>,
    users: Arc<dyn UsersRepo>,
    paginator: Paginator,
}

impl FeedService {
    pub fn new(
        posts: Arc<dyn PostsRepo>,
        categories: Arc<dyn CategoriesRepo>,
        comments: Arc<dyn CommentsRepo>,
        users: Arc<dyn UsersRepo>,
    ) -> Self {
        Self {
            posts,
            categories,
            comments,
            users,
            paginator: Paginator::default(),
        }
    }

    pub async fn index(&self, requested: RequestedPage) -> Result<Page<PostSummary>, FeedError> {
        let query = PostQuery::feed(OffsetDateTime::now_utc());
        self.paginate(&query, requested).await
    }

    pub async fn category(
        &self,
        slug: &str,
        requested: RequestedPage,
    ) -> Result<CategoryListing, FeedError> {
        let category = self
            .categories
            .find_by_slug(slug)
            .await?
            .filter(|category| category.is_published)
            .ok_or(FeedError::UnknownCategory)?;

        let query = PostQuery::category(category.id, OffsetDateTime::now_utc());
        let page = self.paginate(&query, requested).await?;

        Ok(CategoryListing { category, page })
    }

    pub async fn profile(
        &self,
        username: &str,
        viewer: Option<Uuid>,
        requested: RequestedPage,
    ) -> Result<ProfileListing, FeedError> {
        let profile = self
            .users
            .find_by_username(username)
            .await?
            .ok_or(FeedError::UnknownUser)?;

        let query = PostQuery::profile(profile.id, viewer, OffsetDateTime::now_utc());
        let page = self.paginate(&query, requested).await?;
        let is_owner = viewer == Some(profile.id);

        Ok(ProfileListing {
            profile,
            page,
            is_owner,
        })
    }

    /// A post the viewer may see, with its comments oldest first.
    pub async fn post_detail(
        &self,
        id: Uuid,
        viewer: Option<Uuid>,
    ) -> Result<PostDetail, FeedError> {
        let post = self
            .posts
            .find_summary(id)
            .await?
            .ok_or(FeedError::PostNotFound)?;

        if !visibility::is_visible_to(&post.visibility_facts(), viewer, OffsetDateTime::now_utc()) {
            return Err(FeedError::PostNotFound);
        }

        let comments = self.comments.list_for_post(id).await?;
        Ok(PostDetail { post, comments })
    }

    async fn paginate(
        &self,
        query: &PostQuery,
        requested: RequestedPage,
    ) -> Result<Page<PostSummary>, FeedError> {
        let total = self.posts.count_posts(query).await?;
        let window = self.paginator.window(requested, total);
        let items = self.posts.list_posts(query, &window).await?;
        Ok(Page::new(items, &window))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::repos::{
        CategoriesWriteRepo, CreateCategoryParams, CreatePostParams, CreateUserParams,
        PostsWriteRepo, UsersWriteRepo,
    };
    use crate::infra::memory::MemoryRepositories;
    use time::Duration;

    struct Fixture {
        repos: Arc<MemoryRepositories>,
        feed: FeedService,
        author: Uuid,
        draft: Uuid,
    }

    async fn fixture() -> Fixture {
        let repos = Arc::new(MemoryRepositories::new());
        let author = repos
            .create_user(CreateUserParams {
                username: "alice".to_string(),
                email: "alice@example.org".to_string(),
                first_name: String::new(),
                last_name: String::new(),
                password_hash: String::new(),
            })
            .await
            .expect("user")
            .id;
        let category = repos
            .create_category(CreateCategoryParams {
                title: "Notes".to_string(),
                description: String::new(),
                slug: "notes".to_string(),
                is_published: true,
            })
            .await
            .expect("category")
            .id;

        let yesterday = OffsetDateTime::now_utc() - Duration::days(1);
        let mut ids = Vec::new();
        for (title, is_published) in [("Public", true), ("Draft", false)] {
            let post = repos
                .create_post(CreatePostParams {
                    title: title.to_string(),
                    text: "text".to_string(),
                    pub_date: yesterday,
                    is_published,
                    image: None,
                    author_id: author,
                    category_id: Some(category),
                    location_id: None,
                })
                .await
                .expect("post");
            ids.push(post.id);
        }

        Fixture {
            feed: FeedService::new(repos.clone(), repos.clone(), repos.clone(), repos.clone()),
            repos,
            author,
            draft: ids[1],
        }
    }

    fn titles(page: &Page<PostSummary>) -> Vec<&str> {
        page.items
            .iter()
            .map(|summary| summary.post.title.as_str())
            .collect()
    }

    #[tokio::test]
    async fn owner_profile_includes_drafts() {
        let fixture = fixture().await;
        let first = RequestedPage::parse(None);

        let public = fixture
            .feed
            .profile("alice", None, first)
            .await
            .expect("profile");
        assert!(!public.is_owner);
        assert_eq!(titles(&public.page), vec!["Public"]);

        let own = fixture
            .feed
            .profile("alice", Some(fixture.author), first)
            .await
            .expect("profile");
        assert!(own.is_owner);
        assert_eq!(own.page.total, 2);

        let missing = fixture.feed.profile("nobody", None, first).await;
        assert!(matches!(missing, Err(FeedError::UnknownUser)));
    }

    #[tokio::test]
    async fn hidden_detail_is_reserved_for_the_author() {
        let fixture = fixture().await;

        let anonymous = fixture.feed.post_detail(fixture.draft, None).await;
        assert!(matches!(anonymous, Err(FeedError::PostNotFound)));

        let stranger = fixture
            .feed
            .post_detail(fixture.draft, Some(Uuid::new_v4()))
            .await;
        assert!(matches!(stranger, Err(FeedError::PostNotFound)));

        let own = fixture
            .feed
            .post_detail(fixture.draft, Some(fixture.author))
            .await
            .expect("author sees draft");
        assert_eq!(own.post.post.title, "Draft");
        assert!(own.comments.is_empty());
    }

    #[tokio::test]
    async fn unpublished_category_listing_is_unknown() {
        let fixture = fixture().await;
        let hidden = fixture
            .repos
            .create_category(CreateCategoryParams {
                title: "Hidden".to_string(),
                description: String::new(),
                slug: "hidden".to_string(),
                is_published: false,
            })
            .await
            .expect("category");
        fixture
            .repos
            .create_post(CreatePostParams {
                title: "Tucked away".to_string(),
                text: "text".to_string(),
                pub_date: OffsetDateTime::now_utc() - Duration::days(1),
                is_published: true,
                image: None,
                author_id: fixture.author,
                category_id: Some(hidden.id),
                location_id: None,
            })
            .await
            .expect("post");

        let unpublished = fixture
            .feed
            .category("hidden", RequestedPage::parse(None))
            .await;
        assert!(matches!(unpublished, Err(FeedError::UnknownCategory)));

        let missing = fixture
            .feed
            .category("elsewhere", RequestedPage::parse(None))
            .await;
        assert!(matches!(missing, Err(FeedError::UnknownCategory)));

        let listing = fixture
            .feed
            .category("notes", RequestedPage::parse(None))
            .await
            .expect("listing");
        assert_eq!(titles(&listing.page), vec!["Public"]);
    }
}
