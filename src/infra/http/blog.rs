//! Read-only pages: the index, category and profile listings, and post detail.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Deserialize;

use crate::application::{
    error::HttpError,
    feed::FeedError,
    pagination::RequestedPage,
};
use crate::presentation::views::{
    CategoryTemplate, CommentItem, IndexTemplate, LayoutChrome, LayoutContext, ListingContext,
    PostCard, PostDetailContext, PostDetailTemplate, ProfileContext, ProfileTemplate,
    category_href, profile_href, render_not_found_response, render_template_response,
};

use super::{CurrentViewer, HttpState, chrome, parse_id};

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(super) struct PageQuery {
    page: Option<String>,
}

impl PageQuery {
    fn requested(&self) -> RequestedPage {
        RequestedPage::parse(self.page.as_deref())
    }
}

pub(super) async fn index(
    State(state): State<HttpState>,
    CurrentViewer(viewer): CurrentViewer,
    Query(query): Query<PageQuery>,
) -> Response {
    let chrome = chrome(&state, viewer.user());

    match state.feed.index(query.requested()).await {
        Ok(page) => {
            let content = ListingContext::new(&page, "/", state.site.timezone);
            let view = LayoutContext::new(chrome, content);
            render_template_response(IndexTemplate { view }, StatusCode::OK)
        }
        Err(err) => feed_error_to_response(err, chrome),
    }
}

pub(super) async fn category(
    State(state): State<HttpState>,
    CurrentViewer(viewer): CurrentViewer,
    Path(slug): Path<String>,
    Query(query): Query<PageQuery>,
) -> Response {
    let chrome = chrome(&state, viewer.user());

    match state.feed.category(&slug, query.requested()).await {
        Ok(listing) => {
            let mut content = ListingContext::new(
                &listing.page,
                &category_href(&listing.category.slug),
                state.site.timezone,
            );
            content.heading = Some(listing.category.title.clone());
            content.description = Some(listing.category.description.clone());
            let view = LayoutContext::new(chrome.with_title(&listing.category.title), content);
            render_template_response(CategoryTemplate { view }, StatusCode::OK)
        }
        Err(err) => feed_error_to_response(err, chrome),
    }
}

pub(super) async fn profile(
    State(state): State<HttpState>,
    CurrentViewer(viewer): CurrentViewer,
    Path(username): Path<String>,
    Query(query): Query<PageQuery>,
) -> Response {
    let chrome = chrome(&state, viewer.user());

    match state
        .feed
        .profile(&username, viewer.id(), query.requested())
        .await
    {
        Ok(listing) => {
            let tz = state.site.timezone;
            let listing_view =
                ListingContext::new(&listing.page, &profile_href(&listing.profile.username), tz);
            let content =
                ProfileContext::new(&listing.profile, listing.is_owner, listing_view, tz);
            let view = LayoutContext::new(chrome.with_title(&listing.profile.username), content);
            render_template_response(ProfileTemplate { view }, StatusCode::OK)
        }
        Err(err) => feed_error_to_response(err, chrome),
    }
}

pub(super) async fn post_detail(
    State(state): State<HttpState>,
    CurrentViewer(viewer): CurrentViewer,
    Path(id): Path<String>,
) -> Response {
    let chrome = chrome(&state, viewer.user());
    let Some(id) = parse_id(&id) else {
        return render_not_found_response(chrome);
    };

    match state.feed.post_detail(id, viewer.id()).await {
        Ok(detail) => {
            let tz = state.site.timezone;
            let is_owner = viewer.id() == Some(detail.post.post.author_id);
            let comments = detail
                .comments
                .iter()
                .map(|comment| CommentItem::from_view(comment, viewer.id(), tz))
                .collect();
            let content = PostDetailContext {
                post: PostCard::from_summary(&detail.post, tz, time::OffsetDateTime::now_utc()),
                edit_href: is_owner.then(|| format!("/posts/{id}/edit/")),
                delete_href: is_owner.then(|| format!("/posts/{id}/delete/")),
                comments,
                comment_action: viewer
                    .is_authenticated()
                    .then(|| format!("/posts/{id}/comment/")),
            };
            let view = LayoutContext::new(chrome.with_title(&detail.post.post.title), content);
            render_template_response(PostDetailTemplate { view }, StatusCode::OK)
        }
        Err(err) => feed_error_to_response(err, chrome),
    }
}

fn feed_error_to_response(err: FeedError, chrome: LayoutChrome) -> Response {
    match err {
        FeedError::UnknownCategory | FeedError::UnknownUser | FeedError::PostNotFound => {
            render_not_found_response(chrome)
        }
        FeedError::Repo(_) => HttpError::from(err).into_response(),
    }
}
