use std::sync::Arc;

use chrono_tz::Tz;
use metrics::counter;
use thiserror::Error;
use time::OffsetDateTime;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::application::forms::{
    self, Choice, FormErrors, INVALID_CHOICE, ImageChange, ImageUpload, PostDraft, PostForm,
};
use crate::application::media::{MediaError, MediaStore};
use crate::application::outcome::{Gate, Mutation, Submission};
use crate::application::repos::{
    CategoriesRepo, CategoriesWriteRepo, CreateCategoryParams, CreateLocationParams,
    CreatePostParams, LocationsRepo, LocationsWriteRepo, PostsRepo, PostsWriteRepo, RepoError,
    UpdatePostParams,
};
use crate::domain::entities::{CategoryRecord, LocationRecord, PostRecord};
use crate::domain::slug::{SlugAsyncError, generate_unique_slug_async};

pub const METRIC_POSTS_CREATED: &str = "blogicum_posts_created_total";

const SLUG_UNUSABLE: &str = "Enter a title that can be used in a web address.";
const SLUG_TAKEN: &str = "Category with this slug already exists.";

#[derive(Debug, Error)]
pub enum PostError {
    #[error("post not found")]
    NotFound,
    #[error(transparent)]
    Repo(#[from] RepoError),
    #[error(transparent)]
    Media(#[from] MediaError),
}

/// Options offered by the category and location selects of the post form.
#[derive(Debug, Clone, Default)]
pub struct PostFormChoices {
    pub categories: Vec<CategoryRecord>,
    pub locations: Vec<LocationRecord>,
}

/// Selections that passed every check; new records are not written yet.
#[derive(Debug, Clone)]
struct ReferencePlan {
    category: PlannedCategory,
    location: Option<Choice>,
}

#[derive(Debug, Clone)]
enum PlannedCategory {
    Existing(Uuid),
    New { title: String, slug: String },
}

/// Written references. `created_*` name the records this submission added.
#[derive(Debug, Clone, Copy)]
struct References {
    category_id: Uuid,
    location_id: Option<Uuid>,
    created_category: Option<Uuid>,
    created_location: Option<Uuid>,
}

/// Author-gated writes on posts, including inline creation of categories and locations.
#[derive(Clone)]
pub struct PostService {
    reader: Arc<dyn PostsRepo>,
    writer: Arc<dyn PostsWriteRepo>,
    categories: Arc<dyn CategoriesRepo>,
    categories_writer: Arc<dyn CategoriesWriteRepo>,
    locations: Arc<dyn LocationsRepo>,
    locations_writer: Arc<dyn LocationsWriteRepo>,
    media: Arc<dyn MediaStore>,
    timezone: Tz,
}

impl PostService {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        reader: Arc<dyn PostsRepo>,
        writer: Arc<dyn PostsWriteRepo>,
        categories: Arc<dyn CategoriesRepo>,
        categories_writer: Arc<dyn CategoriesWriteRepo>,
        locations: Arc<dyn LocationsRepo>,
        locations_writer: Arc<dyn LocationsWriteRepo>,
        media: Arc<dyn MediaStore>,
        timezone: Tz,
    ) -> Self {
        Self {
            reader,
            writer,
            categories,
            categories_writer,
            locations,
            locations_writer,
            media,
            timezone,
        }
    }

    pub fn timezone(&self) -> Tz {
        self.timezone
    }

    pub async fn form_choices(&self) -> Result<PostFormChoices, PostError> {
        Ok(PostFormChoices {
            categories: self.categories.list_published().await?,
            locations: self.locations.list_locations().await?,
        })
    }

    pub async fn create(
        &self,
        author_id: Uuid,
        form: &PostForm,
        upload: Option<&ImageUpload>,
    ) -> Result<Submission<PostRecord>, PostError> {
        let draft = match forms::validate_post(form, upload, self.timezone, OffsetDateTime::now_utc())
        {
            Ok(draft) => draft,
            Err(errors) => return Ok(Err(errors)),
        };
        let references = match self.resolve_references(&draft).await? {
            Ok(references) => references,
            Err(errors) => return Ok(Err(errors)),
        };
        let image = match self.store_image(&draft.image).await {
            Ok(image) => image,
            Err(err) => {
                self.discard_references(&references).await;
                return Err(err);
            }
        };

        let created = self
            .writer
            .create_post(CreatePostParams {
                title: draft.title,
                text: draft.text,
                pub_date: draft.pub_date,
                is_published: draft.is_published,
                image: image.clone(),
                author_id,
                category_id: Some(references.category_id),
                location_id: references.location_id,
            })
            .await;
        let post = match created {
            Ok(post) => post,
            Err(err) => {
                self.discard_references(&references).await;
                self.discard_image(image.as_deref()).await;
                return Err(err.into());
            }
        };

        counter!(METRIC_POSTS_CREATED).increment(1);
        info!(
            target = "blogicum::posts",
            post_id = %post.id,
            author_id = %author_id,
            published = post.is_published,
            "post created"
        );

        Ok(Ok(post))
    }

    /// Load a post for its edit or delete page.
    pub async fn editable(&self, id: Uuid, actor: Uuid) -> Result<Gate<PostRecord>, PostError> {
        let post = self.reader.find_post(id).await?.ok_or(PostError::NotFound)?;
        if post.author_id != actor {
            debug!(target = "blogicum::posts", post_id = %id, actor = %actor, "not the author");
            return Ok(Gate::NotOwner);
        }
        Ok(Gate::Owner(post))
    }

    pub async fn update(
        &self,
        id: Uuid,
        actor: Uuid,
        form: &PostForm,
        upload: Option<&ImageUpload>,
    ) -> Result<Mutation<PostRecord>, PostError> {
        let post = match self.editable(id, actor).await? {
            Gate::Owner(post) => post,
            Gate::NotOwner => return Ok(Mutation::NotOwner),
        };

        let draft = match forms::validate_post(form, upload, self.timezone, OffsetDateTime::now_utc())
        {
            Ok(draft) => draft,
            Err(errors) => return Ok(Mutation::Invalid(errors)),
        };
        let references = match self.resolve_references(&draft).await? {
            Ok(references) => references,
            Err(errors) => return Ok(Mutation::Invalid(errors)),
        };
        let stored = match self.store_image(&draft.image).await {
            Ok(stored) => stored,
            Err(err) => {
                self.discard_references(&references).await;
                return Err(err);
            }
        };
        let image = match &draft.image {
            ImageChange::Keep => post.image.clone(),
            ImageChange::Clear | ImageChange::Replace(_) => stored.clone(),
        };

        let updated = self
            .writer
            .update_post(UpdatePostParams {
                id: post.id,
                title: draft.title,
                text: draft.text,
                pub_date: draft.pub_date,
                is_published: draft.is_published,
                image: image.clone(),
                category_id: Some(references.category_id),
                location_id: references.location_id,
            })
            .await;
        let updated = match updated {
            Ok(updated) => updated,
            Err(err) => {
                self.discard_references(&references).await;
                self.discard_image(stored.as_deref()).await;
                return Err(err.into());
            }
        };

        if post.image != image {
            self.discard_image(post.image.as_deref()).await;
        }
        info!(target = "blogicum::posts", post_id = %updated.id, "post updated");
        Ok(Mutation::Applied(updated))
    }

    pub async fn delete(&self, id: Uuid, actor: Uuid) -> Result<Gate<()>, PostError> {
        match self.editable(id, actor).await? {
            Gate::Owner(post) => {
                self.writer.delete_post(post.id).await?;
                self.discard_image(post.image.as_deref()).await;
                info!(target = "blogicum::posts", post_id = %post.id, "post deleted");
                Ok(Gate::Owner(()))
            }
            Gate::NotOwner => Ok(Gate::NotOwner),
        }
    }

    /// Check the selections, then write any new category and location.
    async fn resolve_references(
        &self,
        draft: &PostDraft,
    ) -> Result<Submission<References>, PostError> {
        match self.plan_references(draft).await? {
            Ok(plan) => self.write_references(plan).await,
            Err(errors) => Ok(Err(errors)),
        }
    }

    /// Read-only checks of the category and location selections.
    async fn plan_references(
        &self,
        draft: &PostDraft,
    ) -> Result<Submission<ReferencePlan>, PostError> {
        let mut errors = FormErrors::default();

        if let Choice::Existing(id) = &draft.category {
            let published = self
                .categories
                .find_by_id(*id)
                .await?
                .is_some_and(|category| category.is_published);
            if !published {
                errors.add("category", INVALID_CHOICE);
            }
        }
        if let Some(Choice::Existing(id)) = &draft.location {
            if self.locations.find_by_id(*id).await?.is_none() {
                errors.add("location", INVALID_CHOICE);
            }
        }

        let category = match &draft.category {
            Choice::Existing(id) => Some(PlannedCategory::Existing(*id)),
            Choice::New(title) => match self.unique_category_slug(title).await? {
                Some(slug) => Some(PlannedCategory::New {
                    title: title.clone(),
                    slug,
                }),
                None => {
                    errors.add("new_category", SLUG_UNUSABLE);
                    None
                }
            },
        };

        match category {
            Some(category) => Ok(errors.into_result(ReferencePlan {
                category,
                location: draft.location.clone(),
            })),
            None => Ok(Err(errors)),
        }
    }

    /// Writes the category before the location; a failed location write removes
    /// the category again.
    async fn write_references(
        &self,
        plan: ReferencePlan,
    ) -> Result<Submission<References>, PostError> {
        let (category_id, created_category) = match plan.category {
            PlannedCategory::Existing(id) => (id, None),
            PlannedCategory::New { title, slug } => {
                match self.create_category(&title, slug).await? {
                    Ok(category) => (category.id, Some(category.id)),
                    Err(errors) => return Ok(Err(errors)),
                }
            }
        };

        let (location_id, created_location) = match plan.location {
            None => (None, None),
            Some(Choice::Existing(id)) => (Some(id), None),
            Some(Choice::New(name)) => {
                let created = self
                    .locations_writer
                    .create_location(CreateLocationParams {
                        name,
                        is_published: true,
                    })
                    .await;
                match created {
                    Ok(location) => (Some(location.id), Some(location.id)),
                    Err(err) => {
                        self.discard_references(&References {
                            category_id,
                            location_id: None,
                            created_category,
                            created_location: None,
                        })
                        .await;
                        return Err(err.into());
                    }
                }
            }
        };

        Ok(Ok(References {
            category_id,
            location_id,
            created_category,
            created_location,
        }))
    }

    /// Inserts a category under `slug`. A slug claimed between the uniqueness
    /// check and the insert is recomputed once before giving up with a field error.
    async fn create_category(
        &self,
        title: &str,
        slug: String,
    ) -> Result<Submission<CategoryRecord>, PostError> {
        let retry_slug = match self.insert_category(title, slug).await {
            Err(RepoError::Duplicate { constraint }) => {
                debug!(
                    target = "blogicum::posts",
                    constraint = %constraint,
                    "category slug claimed concurrently, retrying"
                );
                self.unique_category_slug(title).await?
            }
            other => return Ok(Ok(other?)),
        };

        let Some(slug) = retry_slug else {
            return Ok(Err(FormErrors::single("new_category", SLUG_UNUSABLE)));
        };
        match self.insert_category(title, slug).await {
            Ok(category) => Ok(Ok(category)),
            Err(RepoError::Duplicate { .. }) => {
                Ok(Err(FormErrors::single("new_category", SLUG_TAKEN)))
            }
            Err(err) => Err(err.into()),
        }
    }

    async fn insert_category(&self, title: &str, slug: String) -> Result<CategoryRecord, RepoError> {
        let category = self
            .categories_writer
            .create_category(CreateCategoryParams {
                title: title.to_string(),
                description: format!("Category \"{title}\""),
                slug,
                is_published: true,
            })
            .await?;
        info!(
            target = "blogicum::posts",
            category_id = %category.id,
            slug = %category.slug,
            "category created from post form"
        );
        Ok(category)
    }

    /// Undo the records a failed submission created.
    async fn discard_references(&self, references: &References) {
        if let Some(id) = references.created_location {
            if let Err(err) = self.locations_writer.delete_location(id).await {
                warn!(
                    target = "blogicum::posts",
                    location_id = %id,
                    error = %err,
                    "failed to remove location of a failed submission"
                );
            }
        }
        if let Some(id) = references.created_category {
            if let Err(err) = self.categories_writer.delete_category(id).await {
                warn!(
                    target = "blogicum::posts",
                    category_id = %id,
                    error = %err,
                    "failed to remove category of a failed submission"
                );
            }
        }
    }

    async fn store_image(&self, change: &ImageChange) -> Result<Option<String>, PostError> {
        match change {
            ImageChange::Replace(upload) => {
                let path = self
                    .media
                    .save(&upload.file_name, upload.data.clone())
                    .await?;
                debug!(target = "blogicum::posts", path = %path, "post image stored");
                Ok(Some(path))
            }
            ImageChange::Keep | ImageChange::Clear => Ok(None),
        }
    }

    async fn discard_image(&self, path: Option<&str>) {
        let Some(path) = path else {
            return;
        };
        if let Err(err) = self.media.discard(path).await {
            warn!(
                target = "blogicum::posts",
                path = %path,
                error = %err,
                "failed to remove post image"
            );
        }
    }

    /// `None` when the title yields no usable slug.
    async fn unique_category_slug(&self, title: &str) -> Result<Option<String>, PostError> {
        let categories = self.categories.clone();
        let result = generate_unique_slug_async(title, move |candidate| {
            let categories = categories.clone();
            async move {
                categories
                    .slug_exists(&candidate)
                    .await
                    .map(|exists| !exists)
            }
        })
        .await;

        match result {
            Ok(slug) => Ok(Some(slug)),
            Err(SlugAsyncError::Slug(err)) => {
                debug!(target = "blogicum::posts", error = %err, "category slug rejected");
                Ok(None)
            }
            Err(SlugAsyncError::Predicate(err)) => Err(PostError::Repo(err)),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use bytes::Bytes;

    use super::*;
    use crate::application::repos::{CreateUserParams, UsersWriteRepo};
    use crate::infra::memory::MemoryRepositories;
    use crate::infra::uploads::{MEDIA_ROUTE_PREFIX, UploadStorage};

    const PNG: &[u8] = b"\x89PNG\r\n\x1a\nfake-pixels";

    struct Harness {
        _dir: tempfile::TempDir,
        repos: Arc<MemoryRepositories>,
        media: Arc<UploadStorage>,
    }

    impl Harness {
        fn new() -> Self {
            let dir = tempfile::tempdir().expect("tempdir");
            let media = Arc::new(UploadStorage::new(dir.path().to_path_buf()).expect("storage"));
            Self {
                _dir: dir,
                repos: Arc::new(MemoryRepositories::new()),
                media,
            }
        }

        fn service(&self) -> PostService {
            self.service_with(self.repos.clone(), self.repos.clone())
        }

        fn service_with(
            &self,
            categories: Arc<dyn CategoriesRepo>,
            locations_writer: Arc<dyn LocationsWriteRepo>,
        ) -> PostService {
            PostService::new(
                self.repos.clone(),
                self.repos.clone(),
                categories,
                self.repos.clone(),
                self.repos.clone(),
                locations_writer,
                self.media.clone(),
                Tz::UTC,
            )
        }
    }

    /// Reports the first `stale` slug lookups as free, like a read racing another writer.
    struct StaleSlugs {
        inner: Arc<MemoryRepositories>,
        stale: AtomicUsize,
    }

    #[async_trait]
    impl CategoriesRepo for StaleSlugs {
        async fn find_by_slug(&self, slug: &str) -> Result<Option<CategoryRecord>, RepoError> {
            self.inner.find_by_slug(slug).await
        }

        async fn find_by_id(&self, id: Uuid) -> Result<Option<CategoryRecord>, RepoError> {
            CategoriesRepo::find_by_id(self.inner.as_ref(), id).await
        }

        async fn list_published(&self) -> Result<Vec<CategoryRecord>, RepoError> {
            self.inner.list_published().await
        }

        async fn slug_exists(&self, slug: &str) -> Result<bool, RepoError> {
            let stale = self
                .stale
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
                .is_ok();
            if stale {
                return Ok(false);
            }
            self.inner.slug_exists(slug).await
        }
    }

    struct UnavailableLocations;

    #[async_trait]
    impl LocationsWriteRepo for UnavailableLocations {
        async fn create_location(
            &self,
            _params: CreateLocationParams,
        ) -> Result<LocationRecord, RepoError> {
            Err(RepoError::Timeout)
        }

        async fn delete_location(&self, _id: Uuid) -> Result<(), RepoError> {
            Err(RepoError::NotFound)
        }
    }

    async fn seed_category(repos: &MemoryRepositories, slug: &str) -> CategoryRecord {
        repos
            .create_category(CreateCategoryParams {
                title: slug.to_string(),
                description: String::new(),
                slug: slug.to_string(),
                is_published: true,
            })
            .await
            .expect("category")
    }

    fn png(file_name: &str) -> ImageUpload {
        ImageUpload {
            file_name: file_name.to_string(),
            data: Bytes::from_static(PNG),
        }
    }

    async fn author(repos: &MemoryRepositories, username: &str) -> Uuid {
        repos
            .create_user(CreateUserParams {
                username: username.to_string(),
                email: format!("{username}@example.org"),
                first_name: String::new(),
                last_name: String::new(),
                password_hash: String::new(),
            })
            .await
            .expect("user")
            .id
    }

    fn form_with_new_category(title: &str, category: &str) -> PostForm {
        PostForm {
            title: title.to_string(),
            text: "Some text".to_string(),
            is_published: Some("on".to_string()),
            new_category: Some(category.to_string()),
            new_location: Some("Lisbon".to_string()),
            ..PostForm::default()
        }
    }

    #[tokio::test]
    async fn new_categories_get_unique_slugs() {
        let harness = Harness::new();
        let repos = harness.repos.clone();
        let service = harness.service();
        let alice = author(&repos, "alice").await;

        let first = service
            .create(alice, &form_with_new_category("One", "Road Trips"), None)
            .await
            .expect("create")
            .expect("valid");
        let second = service
            .create(alice, &form_with_new_category("Two", "Road trips"), None)
            .await
            .expect("create")
            .expect("valid");

        let first_category =
            CategoriesRepo::find_by_id(repos.as_ref(), first.category_id.expect("category"))
                .await
                .expect("lookup")
                .expect("exists");
        let second_category = CategoriesRepo::find_by_id(
            repos.as_ref(),
            second.category_id.expect("category"),
        )
        .await
        .expect("lookup")
        .expect("exists");

        assert_eq!(first_category.slug, "road-trips");
        assert_eq!(second_category.slug, "road-trips-2");
        assert!(second_category.is_published);
        assert!(second.location_id.is_some());
    }

    #[tokio::test]
    async fn unpublished_category_is_not_a_valid_choice() {
        let harness = Harness::new();
        let repos = harness.repos.clone();
        let service = harness.service();
        let alice = author(&repos, "alice").await;
        let hidden = repos
            .create_category(CreateCategoryParams {
                title: "Hidden".to_string(),
                description: String::new(),
                slug: "hidden".to_string(),
                is_published: false,
            })
            .await
            .expect("category");

        let form = PostForm {
            title: "Post".to_string(),
            text: "Text".to_string(),
            category: Some(hidden.id.to_string()),
            ..PostForm::default()
        };
        let errors = service
            .create(alice, &form, None)
            .await
            .expect("create")
            .expect_err("invalid");

        assert!(errors.has("category"));
    }

    #[tokio::test]
    async fn only_the_author_may_update_or_delete() {
        let harness = Harness::new();
        let repos = harness.repos.clone();
        let service = harness.service();
        let alice = author(&repos, "alice").await;
        let bob = author(&repos, "bob").await;
        let post = service
            .create(alice, &form_with_new_category("Original", "Notes"), None)
            .await
            .expect("create")
            .expect("valid");

        let update = service
            .update(post.id, bob, &form_with_new_category("Changed", "Notes"), None)
            .await
            .expect("update");
        assert!(matches!(update, Mutation::NotOwner));

        let delete = service.delete(post.id, bob).await.expect("delete");
        assert!(matches!(delete, Gate::NotOwner));

        let stored = repos
            .find_post(post.id)
            .await
            .expect("lookup")
            .expect("still there");
        assert_eq!(stored.title, "Original");

        let delete = service.delete(post.id, alice).await.expect("delete");
        assert!(matches!(delete, Gate::Owner(())));
        assert!(repos.find_post(post.id).await.expect("lookup").is_none());
    }

    #[tokio::test]
    async fn slug_claimed_after_the_check_is_retried_once() {
        let harness = Harness::new();
        seed_category(&harness.repos, "road-trips").await;
        let alice = author(&harness.repos, "alice").await;
        let stale = Arc::new(StaleSlugs {
            inner: harness.repos.clone(),
            stale: AtomicUsize::new(1),
        });
        let service = harness.service_with(stale, harness.repos.clone());

        let post = service
            .create(alice, &form_with_new_category("One", "Road Trips"), None)
            .await
            .expect("create")
            .expect("valid");

        let category = CategoriesRepo::find_by_id(
            harness.repos.as_ref(),
            post.category_id.expect("category"),
        )
        .await
        .expect("lookup")
        .expect("exists");
        assert_eq!(category.slug, "road-trips-2");
    }

    #[tokio::test]
    async fn slug_that_stays_taken_is_a_field_error() {
        let harness = Harness::new();
        seed_category(&harness.repos, "road-trips").await;
        let alice = author(&harness.repos, "alice").await;
        let stale = Arc::new(StaleSlugs {
            inner: harness.repos.clone(),
            stale: AtomicUsize::new(usize::MAX),
        });
        let service = harness.service_with(stale, harness.repos.clone());

        let errors = service
            .create(alice, &form_with_new_category("One", "Road Trips"), None)
            .await
            .expect("create")
            .expect_err("slug taken");
        assert_eq!(errors.field("new_category"), [SLUG_TAKEN.to_string()]);
        assert!(
            harness
                .repos
                .list_locations()
                .await
                .expect("locations")
                .is_empty()
        );
    }

    #[tokio::test]
    async fn failed_location_write_removes_the_new_category() {
        let harness = Harness::new();
        let alice = author(&harness.repos, "alice").await;
        let service = harness.service_with(harness.repos.clone(), Arc::new(UnavailableLocations));

        let err = service
            .create(alice, &form_with_new_category("One", "Road Trips"), None)
            .await
            .expect_err("location write fails");
        assert!(matches!(err, PostError::Repo(RepoError::Timeout)));

        assert!(!harness.repos.slug_exists("road-trips").await.expect("lookup"));
        assert!(
            harness
                .repos
                .list_published()
                .await
                .expect("categories")
                .is_empty()
        );
    }

    #[tokio::test]
    async fn uploaded_images_are_stored_replaced_and_cleared() {
        let harness = Harness::new();
        let service = harness.service();
        let alice = author(&harness.repos, "alice").await;

        let post = service
            .create(
                alice,
                &form_with_new_category("Pictured", "Photos"),
                Some(&png("Beach Day.jpeg")),
            )
            .await
            .expect("create")
            .expect("valid");
        let first = post.image.clone().expect("image path");
        assert!(first.starts_with(MEDIA_ROUTE_PREFIX));
        assert!(first.ends_with("-beach-day.png"));

        let mut form = PostForm::from_post(&post, Tz::UTC);
        let replaced = match service
            .update(post.id, alice, &form, Some(&png("second.png")))
            .await
            .expect("update")
        {
            Mutation::Applied(post) => post,
            other => panic!("unexpected outcome: {other:?}"),
        };
        let second = replaced.image.clone().expect("image path");
        assert_ne!(second, first);
        let first_stored = first.strip_prefix(MEDIA_ROUTE_PREFIX).expect("prefix");
        assert!(matches!(
            harness.media.read(first_stored).await,
            Err(MediaError::NotFound)
        ));

        let kept = match service
            .update(post.id, alice, &form, None)
            .await
            .expect("update")
        {
            Mutation::Applied(post) => post,
            other => panic!("unexpected outcome: {other:?}"),
        };
        assert_eq!(kept.image.as_deref(), Some(second.as_str()));

        form.image_clear = Some("on".to_string());
        let cleared = match service
            .update(post.id, alice, &form, None)
            .await
            .expect("update")
        {
            Mutation::Applied(post) => post,
            other => panic!("unexpected outcome: {other:?}"),
        };
        assert_eq!(cleared.image, None);
        let second_stored = second.strip_prefix(MEDIA_ROUTE_PREFIX).expect("prefix");
        assert!(matches!(
            harness.media.read(second_stored).await,
            Err(MediaError::NotFound)
        ));
    }

    #[tokio::test]
    async fn non_image_uploads_are_form_errors() {
        let harness = Harness::new();
        let service = harness.service();
        let alice = author(&harness.repos, "alice").await;

        let text = ImageUpload {
            file_name: "notes.png".to_string(),
            data: Bytes::from_static(b"plain text"),
        };
        let errors = service
            .create(alice, &form_with_new_category("Post", "Notes"), Some(&text))
            .await
            .expect("create")
            .expect_err("invalid");
        assert_eq!(errors.field("image"), [forms::IMAGE_INVALID.to_string()]);
    }
}
