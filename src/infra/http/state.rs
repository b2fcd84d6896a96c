use std::sync::Arc;

use chrono_tz::Tz;

use crate::application::{
    accounts::AccountService,
    comments::CommentService,
    feed::FeedService,
    media::MediaStore,
    posts::PostService,
    repos::{
        CategoriesRepo, CategoriesWriteRepo, CommentsRepo, CommentsWriteRepo, HealthRepo,
        LocationsRepo, LocationsWriteRepo, PostsRepo, PostsWriteRepo, SessionsRepo, UsersRepo,
        UsersWriteRepo,
    },
};
use crate::config::Settings;
use crate::infra::error::InfraError;
use crate::infra::uploads::UploadStorage;

/// Site-wide values the handlers and templates need on every request.
#[derive(Debug, Clone)]
pub struct SiteContext {
    pub title: String,
    pub timezone: Tz,
    pub cookie_name: String,
    pub secure_cookie: bool,
    /// Body limit for the post forms, which may carry an image.
    pub upload_limit_bytes: usize,
}

impl SiteContext {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            title: settings.site.title.clone(),
            timezone: settings.site.timezone,
            cookie_name: settings.session.cookie_name.clone(),
            secure_cookie: settings.session.secure_cookie,
            upload_limit_bytes: usize::try_from(settings.uploads.max_request_bytes.get())
                .unwrap_or(usize::MAX),
        }
    }
}

#[derive(Clone)]
pub struct HttpState {
    pub feed: Arc<FeedService>,
    pub posts: Arc<PostService>,
    pub comments: Arc<CommentService>,
    pub accounts: Arc<AccountService>,
    pub media: Arc<UploadStorage>,
    pub health: Arc<dyn HealthRepo>,
    pub site: Arc<SiteContext>,
}

impl HttpState {
    /// Wire every service onto one storage backend.
    pub fn from_repositories<R>(repositories: Arc<R>, settings: &Settings) -> Result<Self, InfraError>
    where
        R: PostsRepo
            + PostsWriteRepo
            + CategoriesRepo
            + CategoriesWriteRepo
            + LocationsRepo
            + LocationsWriteRepo
            + CommentsRepo
            + CommentsWriteRepo
            + UsersRepo
            + UsersWriteRepo
            + SessionsRepo
            + HealthRepo
            + 'static,
    {
        let posts_repo: Arc<dyn PostsRepo> = repositories.clone();
        let posts_write_repo: Arc<dyn PostsWriteRepo> = repositories.clone();
        let categories_repo: Arc<dyn CategoriesRepo> = repositories.clone();
        let categories_write_repo: Arc<dyn CategoriesWriteRepo> = repositories.clone();
        let locations_repo: Arc<dyn LocationsRepo> = repositories.clone();
        let locations_write_repo: Arc<dyn LocationsWriteRepo> = repositories.clone();
        let comments_repo: Arc<dyn CommentsRepo> = repositories.clone();
        let comments_write_repo: Arc<dyn CommentsWriteRepo> = repositories.clone();
        let users_repo: Arc<dyn UsersRepo> = repositories.clone();
        let users_write_repo: Arc<dyn UsersWriteRepo> = repositories.clone();
        let sessions_repo: Arc<dyn SessionsRepo> = repositories.clone();
        let health_repo: Arc<dyn HealthRepo> = repositories;

        let media = Arc::new(UploadStorage::new(settings.uploads.directory.clone())?);
        let media_store: Arc<dyn MediaStore> = media.clone();

        let session_ttl = time::Duration::try_from(settings.session.ttl)
            .map_err(|err| InfraError::configuration(format!("session ttl: {err}")))?;

        let feed = FeedService::new(
            posts_repo.clone(),
            categories_repo.clone(),
            comments_repo.clone(),
            users_repo.clone(),
        );
        let posts = PostService::new(
            posts_repo.clone(),
            posts_write_repo,
            categories_repo,
            categories_write_repo,
            locations_repo,
            locations_write_repo,
            media_store,
            settings.site.timezone,
        );
        let comments = CommentService::new(posts_repo, comments_repo, comments_write_repo);
        let accounts = AccountService::new(users_repo, users_write_repo, sessions_repo, session_ttl);

        Ok(Self {
            feed: Arc::new(feed),
            posts: Arc::new(posts),
            comments: Arc::new(comments),
            accounts: Arc::new(accounts),
            media,
            health: health_repo,
            site: Arc::new(SiteContext::from_settings(settings)),
        })
    }
}
