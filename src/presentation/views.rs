use crate::application::error::{ErrorReport, HttpError};
use crate::application::forms::{FormErrors, LoginForm, PostForm, ProfileForm, SignupForm};
use crate::application::pagination::Page;
use crate::application::posts::PostFormChoices;
use crate::domain::entities::{CommentView, PostRecord, PostSummary, UserRecord};
use crate::util::timezone;
use askama::{Error as AskamaError, Template};
use axum::{
    http::StatusCode,
    response::{Html, IntoResponse, Response},
};
use chrono_tz::Tz;
use thiserror::Error;
use time::OffsetDateTime;
use uuid::Uuid;

#[derive(Debug, Error)]
#[error("{public_message}")]
pub struct TemplateRenderError {
    pub(crate) source: &'static str,
    pub(crate) public_message: &'static str,
    #[source]
    pub(crate) error: AskamaError,
}

impl TemplateRenderError {
    pub fn new(source: &'static str, public_message: &'static str, error: AskamaError) -> Self {
        Self {
            source,
            public_message,
            error,
        }
    }
}

impl From<TemplateRenderError> for HttpError {
    fn from(err: TemplateRenderError) -> Self {
        let TemplateRenderError {
            source,
            public_message,
            error,
        } = err;

        HttpError::from_error(
            source,
            StatusCode::INTERNAL_SERVER_ERROR,
            public_message,
            &error,
        )
    }
}

pub fn render_template<T: Template>(template: T) -> Result<Html<String>, HttpError> {
    template.render().map(Html).map_err(|err| {
        TemplateRenderError::new(
            "presentation::views::render_template",
            "Template rendering failed",
            err,
        )
        .into()
    })
}

pub fn render_template_response<T: Template>(template: T, status: StatusCode) -> Response {
    match render_template(template) {
        Ok(html) => (status, html).into_response(),
        Err(err) => err.into_response(),
    }
}

pub fn render_not_found_response(chrome: LayoutChrome) -> Response {
    let content = ErrorPageView::not_found();
    let view = LayoutContext::new(chrome.with_title("Page not found"), content);
    let mut response = render_template_response(ErrorTemplate { view }, StatusCode::NOT_FOUND);
    ErrorReport::from_message(
        "presentation::views::render_not_found_response",
        StatusCode::NOT_FOUND,
        "Resource not found",
    )
    .attach(&mut response);
    response
}

pub fn post_href(id: Uuid) -> String {
    format!("/posts/{id}/")
}

pub fn profile_href(username: &str) -> String {
    let encoded: String = url::form_urlencoded::byte_serialize(username.as_bytes()).collect();
    format!("/profile/{encoded}/")
}

pub fn category_href(slug: &str) -> String {
    format!("/category/{slug}/")
}

#[derive(Clone)]
pub struct BrandView {
    pub title: String,
    pub href: String,
}

#[derive(Clone)]
pub struct NavigationLinkView {
    pub label: String,
    pub href: String,
}

#[derive(Clone)]
pub struct NavigationView {
    pub entries: Vec<NavigationLinkView>,
}

/// The signed-in user as shown in the header.
#[derive(Clone)]
pub struct AccountView {
    pub username: String,
    pub profile_href: String,
}

#[derive(Clone)]
pub struct PageMetaView {
    pub title: String,
}

#[derive(Clone)]
pub struct LayoutChrome {
    pub brand: BrandView,
    pub navigation: NavigationView,
    pub account: Option<AccountView>,
    pub meta: PageMetaView,
}

impl LayoutChrome {
    pub fn new(site_title: &str, user: Option<&UserRecord>) -> Self {
        let mut entries = vec![NavigationLinkView {
            label: "Home".to_string(),
            href: "/".to_string(),
        }];

        let account = user.map(|user| AccountView {
            username: user.username.clone(),
            profile_href: profile_href(&user.username),
        });

        match &account {
            Some(account) => {
                entries.push(NavigationLinkView {
                    label: "New post".to_string(),
                    href: "/posts/create/".to_string(),
                });
                entries.push(NavigationLinkView {
                    label: "My page".to_string(),
                    href: account.profile_href.clone(),
                });
            }
            None => {
                entries.push(NavigationLinkView {
                    label: "Log in".to_string(),
                    href: "/auth/login/".to_string(),
                });
                entries.push(NavigationLinkView {
                    label: "Sign up".to_string(),
                    href: "/auth/registration/".to_string(),
                });
            }
        }

        Self {
            brand: BrandView {
                title: site_title.to_string(),
                href: "/".to_string(),
            },
            navigation: NavigationView { entries },
            account,
            meta: PageMetaView {
                title: site_title.to_string(),
            },
        }
    }

    /// Prefix the document title with a page-specific heading.
    pub fn with_title(self, title: &str) -> Self {
        let title = format!("{title} | {}", self.brand.title);
        Self {
            meta: PageMetaView { title },
            ..self
        }
    }
}

#[derive(Clone)]
pub struct LayoutContext<T> {
    pub brand: BrandView,
    pub navigation: NavigationView,
    pub account: Option<AccountView>,
    pub meta: PageMetaView,
    pub content: T,
}

impl<T> LayoutContext<T> {
    pub fn new(chrome: LayoutChrome, content: T) -> Self {
        Self {
            brand: chrome.brand,
            navigation: chrome.navigation,
            account: chrome.account,
            meta: chrome.meta,
            content,
        }
    }
}

#[derive(Clone)]
pub struct CategoryBadge {
    pub title: String,
    pub href: String,
    pub is_published: bool,
}

#[derive(Clone)]
pub struct PostCard {
    pub href: String,
    pub title: String,
    pub text: String,
    pub published: String,
    pub iso_date: String,
    pub author_username: String,
    pub author_href: String,
    pub category: Option<CategoryBadge>,
    pub location: Option<String>,
    pub image: Option<String>,
    pub comment_count: u64,
    /// Shown to owners: the reasons this post is hidden from everybody else.
    pub hidden_reasons: Vec<&'static str>,
}

impl PostCard {
    pub fn from_summary(summary: &PostSummary, tz: Tz, now: OffsetDateTime) -> Self {
        let post = &summary.post;
        let mut hidden_reasons = Vec::new();
        if !post.is_published {
            hidden_reasons.push("Unpublished");
        }
        if post.pub_date > now {
            hidden_reasons.push("Scheduled");
        }
        if summary
            .category
            .as_ref()
            .is_some_and(|category| !category.is_published)
        {
            hidden_reasons.push("Category hidden");
        }

        Self {
            href: post_href(post.id),
            title: post.title.clone(),
            text: post.text.clone(),
            published: timezone::format_display(post.pub_date, tz),
            iso_date: timezone::datetime_local_value(post.pub_date, tz),
            author_username: summary.author_username.clone(),
            author_href: profile_href(&summary.author_username),
            category: summary.category.as_ref().map(|category| CategoryBadge {
                title: category.title.clone(),
                href: category_href(&category.slug),
                is_published: category.is_published,
            }),
            location: summary.location_name.clone(),
            image: post.image.clone(),
            comment_count: summary.comment_count,
            hidden_reasons,
        }
    }

    pub fn list(summaries: &[PostSummary], tz: Tz) -> Vec<Self> {
        let now = OffsetDateTime::now_utc();
        summaries
            .iter()
            .map(|summary| Self::from_summary(summary, tz, now))
            .collect()
    }
}

#[derive(Clone)]
pub struct PaginationView {
    pub number: u32,
    pub num_pages: u32,
    pub total: u64,
    pub first_href: Option<String>,
    pub previous_href: Option<String>,
    pub next_href: Option<String>,
    pub last_href: Option<String>,
}

impl PaginationView {
    /// Links for `page`, relative to `base_path`.
    pub fn new<T>(page: &Page<T>, base_path: &str) -> Self {
        let href = |number: u32| format!("{base_path}?page={number}");
        Self {
            number: page.number,
            num_pages: page.num_pages,
            total: page.total,
            first_href: page.has_previous().then(|| href(1)),
            previous_href: page.previous_number().map(href),
            next_href: page.next_number().map(href),
            last_href: page.has_next().then(|| href(page.num_pages)),
        }
    }

    pub fn is_paginated(&self) -> bool {
        self.num_pages > 1
    }
}

pub struct ListingContext {
    pub heading: Option<String>,
    pub description: Option<String>,
    pub posts: Vec<PostCard>,
    pub pagination: PaginationView,
}

impl ListingContext {
    pub fn new(page: &Page<PostSummary>, base_path: &str, tz: Tz) -> Self {
        Self {
            heading: None,
            description: None,
            posts: PostCard::list(&page.items, tz),
            pagination: PaginationView::new(page, base_path),
        }
    }

    pub fn has_posts(&self) -> bool {
        !self.posts.is_empty()
    }
}

#[derive(Template)]
#[template(path = "index.html")]
pub struct IndexTemplate {
    pub view: LayoutContext<ListingContext>,
}

#[derive(Template)]
#[template(path = "category.html")]
pub struct CategoryTemplate {
    pub view: LayoutContext<ListingContext>,
}

pub struct ProfileContext {
    pub username: String,
    pub display_name: String,
    pub joined: String,
    pub is_owner: bool,
    pub posts: Vec<PostCard>,
    pub pagination: PaginationView,
}

impl ProfileContext {
    pub fn new(profile: &UserRecord, is_owner: bool, listing: ListingContext, tz: Tz) -> Self {
        Self {
            username: profile.username.clone(),
            display_name: profile.display_name(),
            joined: timezone::format_display(profile.joined_at, tz),
            is_owner,
            posts: listing.posts,
            pagination: listing.pagination,
        }
    }

    pub fn has_posts(&self) -> bool {
        !self.posts.is_empty()
    }
}

#[derive(Template)]
#[template(path = "profile.html")]
pub struct ProfileTemplate {
    pub view: LayoutContext<ProfileContext>,
}

pub struct CommentItem {
    pub text: String,
    pub created: String,
    pub author_username: String,
    pub author_href: String,
    pub edit_href: Option<String>,
    pub delete_href: Option<String>,
}

impl CommentItem {
    pub fn from_view(view: &CommentView, viewer: Option<Uuid>, tz: Tz) -> Self {
        let comment = &view.comment;
        let is_owner = viewer == Some(comment.author_id);
        Self {
            text: comment.text.clone(),
            created: timezone::format_display(comment.created_at, tz),
            author_username: view.author_username.clone(),
            author_href: profile_href(&view.author_username),
            edit_href: is_owner
                .then(|| format!("/posts/{}/edit_comment/{}/", comment.post_id, comment.id)),
            delete_href: is_owner
                .then(|| format!("/posts/{}/delete_comment/{}/", comment.post_id, comment.id)),
        }
    }
}

pub struct PostDetailContext {
    pub post: PostCard,
    pub edit_href: Option<String>,
    pub delete_href: Option<String>,
    pub comments: Vec<CommentItem>,
    /// Present when the viewer may comment.
    pub comment_action: Option<String>,
}

#[derive(Template)]
#[template(path = "detail.html")]
pub struct PostDetailTemplate {
    pub view: LayoutContext<PostDetailContext>,
}

#[derive(Clone)]
pub struct SelectOption {
    pub value: String,
    pub label: String,
    pub selected: bool,
}

pub struct PostFormContext {
    pub heading: &'static str,
    pub submit_label: &'static str,
    pub action: String,
    pub form: PostForm,
    pub errors: FormErrors,
    pub categories: Vec<SelectOption>,
    pub locations: Vec<SelectOption>,
}

impl PostFormContext {
    pub fn new(
        heading: &'static str,
        submit_label: &'static str,
        action: String,
        form: PostForm,
        errors: FormErrors,
        choices: &PostFormChoices,
    ) -> Self {
        let selected_category = form.category.clone().unwrap_or_default();
        let selected_location = form.location.clone().unwrap_or_default();

        let categories = choices
            .categories
            .iter()
            .map(|category| {
                let value = category.id.to_string();
                SelectOption {
                    selected: value == selected_category,
                    label: category.title.clone(),
                    value,
                }
            })
            .collect();
        let locations = choices
            .locations
            .iter()
            .map(|location| {
                let value = location.id.to_string();
                SelectOption {
                    selected: value == selected_location,
                    label: location.name.clone(),
                    value,
                }
            })
            .collect();

        Self {
            heading,
            submit_label,
            action,
            form,
            errors,
            categories,
            locations,
        }
    }

    pub fn pub_date_value(&self) -> &str {
        self.form.pub_date.as_deref().unwrap_or("")
    }

    /// The image the post already has, offered with a clear checkbox.
    pub fn current_image(&self) -> Option<&str> {
        self.form.image.as_deref()
    }

    pub fn clear_checked(&self) -> bool {
        self.form.clear_checked()
    }

    pub fn new_category_value(&self) -> &str {
        self.form.new_category.as_deref().unwrap_or("")
    }

    pub fn new_location_value(&self) -> &str {
        self.form.new_location.as_deref().unwrap_or("")
    }

    pub fn is_published(&self) -> bool {
        self.form.published_checked()
    }
}

#[derive(Template)]
#[template(path = "create.html")]
pub struct PostFormTemplate {
    pub view: LayoutContext<PostFormContext>,
}

pub struct PostDeleteContext {
    pub title: String,
    pub text: String,
    pub published: String,
    pub action: String,
    pub cancel_href: String,
}

impl PostDeleteContext {
    pub fn new(post: &PostRecord, tz: Tz) -> Self {
        Self {
            title: post.title.clone(),
            text: post.text.clone(),
            published: timezone::format_display(post.pub_date, tz),
            action: format!("/posts/{}/delete/", post.id),
            cancel_href: post_href(post.id),
        }
    }
}

#[derive(Template)]
#[template(path = "post_delete.html")]
pub struct PostDeleteTemplate {
    pub view: LayoutContext<PostDeleteContext>,
}

pub enum CommentMode {
    Edit,
    Delete,
}

pub struct CommentFormContext {
    pub mode: CommentMode,
    pub action: String,
    pub cancel_href: String,
    pub text: String,
    pub errors: FormErrors,
}

impl CommentFormContext {
    pub fn is_delete(&self) -> bool {
        matches!(self.mode, CommentMode::Delete)
    }
}

#[derive(Template)]
#[template(path = "comment.html")]
pub struct CommentTemplate {
    pub view: LayoutContext<CommentFormContext>,
}

pub struct ProfileFormContext {
    pub form: ProfileForm,
    pub errors: FormErrors,
}

#[derive(Template)]
#[template(path = "user.html")]
pub struct ProfileFormTemplate {
    pub view: LayoutContext<ProfileFormContext>,
}

pub struct LoginContext {
    pub username: String,
    pub next: String,
    pub errors: FormErrors,
}

impl LoginContext {
    pub fn new(form: &LoginForm, errors: FormErrors) -> Self {
        Self {
            username: form.username.clone(),
            next: form.next.clone().unwrap_or_default(),
            errors,
        }
    }
}

#[derive(Template)]
#[template(path = "registration/login.html")]
pub struct LoginTemplate {
    pub view: LayoutContext<LoginContext>,
}

pub struct SignupContext {
    pub form: SignupForm,
    pub errors: FormErrors,
}

#[derive(Template)]
#[template(path = "registration/registration_form.html")]
pub struct SignupTemplate {
    pub view: LayoutContext<SignupContext>,
}

pub struct ErrorPageView {
    pub title: String,
    pub message: String,
    pub primary_action: Option<ErrorAction>,
}

impl ErrorPageView {
    pub fn not_found() -> Self {
        Self {
            title: "Page not found".to_string(),
            message: "The page you requested does not exist or is not available to you."
                .to_string(),
            primary_action: Some(ErrorAction::home()),
        }
    }
}

pub struct ErrorAction {
    pub href: String,
    pub label: String,
}

impl ErrorAction {
    pub fn home() -> Self {
        Self {
            href: "/".to_string(),
            label: "Back to home".to_string(),
        }
    }
}

#[derive(Template)]
#[template(path = "error.html")]
pub struct ErrorTemplate {
    pub view: LayoutContext<ErrorPageView>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::CategoryRef;

    fn summary(now: OffsetDateTime) -> PostSummary {
        PostSummary {
            post: PostRecord {
                id: Uuid::new_v4(),
                title: "Draft".into(),
                text: "Body".into(),
                pub_date: now + time::Duration::days(1),
                is_published: false,
                image: None,
                author_id: Uuid::new_v4(),
                category_id: Some(Uuid::new_v4()),
                location_id: None,
                created_at: now,
            },
            author_username: "alice".into(),
            category: Some(CategoryRef {
                title: "Travel".into(),
                slug: "travel".into(),
                is_published: false,
            }),
            location_name: Some("Moscow".into()),
            comment_count: 3,
        }
    }

    #[test]
    fn hidden_post_card_lists_every_reason() {
        let now = OffsetDateTime::now_utc();
        let card = PostCard::from_summary(&summary(now), Tz::UTC, now);

        assert_eq!(
            card.hidden_reasons,
            vec!["Unpublished", "Scheduled", "Category hidden"]
        );
        assert_eq!(card.author_href, "/profile/alice/");
        assert_eq!(card.comment_count, 3);
    }

    #[test]
    fn pagination_links_only_exist_where_pages_do() {
        let page = Page {
            items: vec![1, 2],
            number: 2,
            num_pages: 3,
            total: 22,
        };
        let view = PaginationView::new(&page, "/");

        assert_eq!(view.previous_href.as_deref(), Some("/?page=1"));
        assert_eq!(view.next_href.as_deref(), Some("/?page=3"));
        assert_eq!(view.last_href.as_deref(), Some("/?page=3"));
        assert!(view.is_paginated());

        let single = Page {
            items: Vec::<u8>::new(),
            number: 1,
            num_pages: 1,
            total: 0,
        };
        let view = PaginationView::new(&single, "/");
        assert!(view.previous_href.is_none());
        assert!(view.next_href.is_none());
        assert!(!view.is_paginated());
    }

    #[test]
    fn anonymous_chrome_offers_login() {
        let chrome = LayoutChrome::new("Blogicum", None).with_title("Home");

        assert!(chrome.account.is_none());
        assert_eq!(chrome.meta.title, "Home | Blogicum");
        assert!(
            chrome
                .navigation
                .entries
                .iter()
                .any(|entry| entry.href == "/auth/login/")
        );
    }
}
