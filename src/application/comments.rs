use std::sync::Arc;

use metrics::counter;
use thiserror::Error;
use time::OffsetDateTime;
use tracing::{debug, info};
use uuid::Uuid;

use crate::application::forms::{self, CommentForm};
use crate::application::outcome::{Gate, Mutation};
use crate::application::repos::{
    CommentsRepo, CommentsWriteRepo, CreateCommentParams, PostsRepo, RepoError,
};
use crate::domain::entities::CommentRecord;
use crate::domain::visibility;

pub const METRIC_COMMENTS_CREATED: &str = "blogicum_comments_created_total";

#[derive(Debug, Error)]
pub enum CommentError {
    #[error("post not found")]
    PostNotFound,
    #[error("comment not found")]
    NotFound,
    #[error(transparent)]
    Repo(#[from] RepoError),
}

#[derive(Clone)]
pub struct CommentService {
    posts: Arc<dyn PostsRepo>,
    reader: Arc<dyn CommentsRepo>,
    writer: Arc<dyn CommentsWriteRepo>,
}

impl CommentService {
    pub fn new(
        posts: Arc<dyn PostsRepo>,
        reader: Arc<dyn CommentsRepo>,
        writer: Arc<dyn CommentsWriteRepo>,
    ) -> Self {
        Self {
            posts,
            reader,
            writer,
        }
    }

    /// Attach a comment to a post the author can see. Invalid text is dropped
    /// and reported as `Ok(None)`.
    pub async fn add(
        &self,
        post_id: Uuid,
        author_id: Uuid,
        form: &CommentForm,
    ) -> Result<Option<CommentRecord>, CommentError> {
        let post = self
            .posts
            .find_summary(post_id)
            .await?
            .ok_or(CommentError::PostNotFound)?;
        if !visibility::is_visible_to(
            &post.visibility_facts(),
            Some(author_id),
            OffsetDateTime::now_utc(),
        ) {
            return Err(CommentError::PostNotFound);
        }

        let text = match forms::validate_comment(form) {
            Ok(text) => text,
            Err(errors) => {
                debug!(
                    target = "blogicum::comments",
                    post_id = %post_id,
                    errors = ?errors,
                    "discarding invalid comment"
                );
                return Ok(None);
            }
        };

        let comment = self
            .writer
            .create_comment(CreateCommentParams {
                post_id,
                author_id,
                text,
            })
            .await?;

        counter!(METRIC_COMMENTS_CREATED).increment(1);
        info!(
            target = "blogicum::comments",
            comment_id = %comment.id,
            post_id = %post_id,
            "comment added"
        );
        Ok(Some(comment))
    }

    /// Load a comment addressed as a child of `post_id` for its edit or delete page.
    pub async fn editable(
        &self,
        post_id: Uuid,
        comment_id: Uuid,
        actor: Uuid,
    ) -> Result<Gate<CommentRecord>, CommentError> {
        let comment = self
            .reader
            .find_comment(comment_id)
            .await?
            .filter(|comment| comment.post_id == post_id)
            .ok_or(CommentError::NotFound)?;

        if comment.author_id != actor {
            debug!(
                target = "blogicum::comments",
                comment_id = %comment_id,
                actor = %actor,
                "not the author"
            );
            return Ok(Gate::NotOwner);
        }
        Ok(Gate::Owner(comment))
    }

    pub async fn update(
        &self,
        post_id: Uuid,
        comment_id: Uuid,
        actor: Uuid,
        form: &CommentForm,
    ) -> Result<Mutation<CommentRecord>, CommentError> {
        let comment = match self.editable(post_id, comment_id, actor).await? {
            Gate::Owner(comment) => comment,
            Gate::NotOwner => return Ok(Mutation::NotOwner),
        };

        let text = match forms::validate_comment(form) {
            Ok(text) => text,
            Err(errors) => return Ok(Mutation::Invalid(errors)),
        };

        let updated = self.writer.update_comment(comment.id, text).await?;
        info!(target = "blogicum::comments", comment_id = %updated.id, "comment updated");
        Ok(Mutation::Applied(updated))
    }

    pub async fn delete(
        &self,
        post_id: Uuid,
        comment_id: Uuid,
        actor: Uuid,
    ) -> Result<Gate<()>, CommentError> {
        match self.editable(post_id, comment_id, actor).await? {
            Gate::Owner(comment) => {
                self.writer.delete_comment(comment.id).await?;
                info!(target = "blogicum::comments", comment_id = %comment.id, "comment deleted");
                Ok(Gate::Owner(()))
            }
            Gate::NotOwner => Ok(Gate::NotOwner),
        }
    }
}
