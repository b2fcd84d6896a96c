use async_trait::async_trait;
use sqlx::{Postgres, QueryBuilder};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::application::pagination::PageWindow;
use crate::application::query::PostQuery;
use crate::application::repos::{
    CreatePostParams, PostsRepo, PostsWriteRepo, RepoError, UpdatePostParams,
};
use crate::domain::entities::{CategoryRef, PostRecord, PostSummary};

use super::{PostgresRepositories, map_sqlx_error};

const POST_COLUMNS: &str = "id, title, text, pub_date, is_published, image, author_id, \
     category_id, location_id, created_at";

/// Listing rows: every post column plus its joins and comment count.
const SUMMARY_SELECT: &str = "SELECT p.id, p.title, p.text, p.pub_date, p.is_published, \
     p.image, p.author_id, p.category_id, p.location_id, p.created_at, \
     u.username AS author_username, \
     c.title AS category_title, c.slug AS category_slug, c.is_published AS category_is_published, \
     l.name AS location_name, \
     COUNT(cm.id) AS comment_count \
     FROM posts p \
     INNER JOIN users u ON u.id = p.author_id \
     LEFT JOIN categories c ON c.id = p.category_id \
     LEFT JOIN locations l ON l.id = p.location_id \
     LEFT JOIN comments cm ON cm.post_id = p.id \
     WHERE 1=1 ";

const SUMMARY_GROUP_BY: &str = " GROUP BY p.id, u.id, c.id, l.id ";

#[derive(sqlx::FromRow)]
struct PostRow {
    id: Uuid,
    title: String,
    text: String,
    pub_date: OffsetDateTime,
    is_published: bool,
    image: Option<String>,
    author_id: Uuid,
    category_id: Option<Uuid>,
    location_id: Option<Uuid>,
    created_at: OffsetDateTime,
}

impl From<PostRow> for PostRecord {
    fn from(row: PostRow) -> Self {
        Self {
            id: row.id,
            title: row.title,
            text: row.text,
            pub_date: row.pub_date,
            is_published: row.is_published,
            image: row.image,
            author_id: row.author_id,
            category_id: row.category_id,
            location_id: row.location_id,
            created_at: row.created_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct PostSummaryRow {
    #[sqlx(flatten)]
    post: PostRow,
    author_username: String,
    category_title: Option<String>,
    category_slug: Option<String>,
    category_is_published: Option<bool>,
    location_name: Option<String>,
    comment_count: i64,
}

impl PostSummaryRow {
    fn into_summary(self) -> Result<PostSummary, RepoError> {
        let category = match (
            self.category_title,
            self.category_slug,
            self.category_is_published,
        ) {
            (Some(title), Some(slug), Some(is_published)) => Some(CategoryRef {
                title,
                slug,
                is_published,
            }),
            _ => None,
        };

        Ok(PostSummary {
            post: PostRecord::from(self.post),
            author_username: self.author_username,
            category,
            location_name: self.location_name,
            comment_count: PostgresRepositories::convert_count(self.comment_count)?,
        })
    }
}

#[async_trait]
impl PostsRepo for PostgresRepositories {
    async fn list_posts(
        &self,
        query: &PostQuery,
        window: &PageWindow,
    ) -> Result<Vec<PostSummary>, RepoError> {
        let offset = i64::try_from(window.offset)
            .map_err(|_| RepoError::InvalidInput {
                message: "page offset exceeds supported range".to_string(),
            })?;

        let mut qb: QueryBuilder<'_, Postgres> = QueryBuilder::new(SUMMARY_SELECT);
        Self::apply_post_query(&mut qb, query);
        qb.push(SUMMARY_GROUP_BY);
        qb.push(" ORDER BY p.pub_date DESC, p.id DESC LIMIT ");
        qb.push_bind(i64::from(window.limit));
        qb.push(" OFFSET ");
        qb.push_bind(offset);

        let rows = qb
            .build_query_as::<PostSummaryRow>()
            .fetch_all(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        rows.into_iter().map(PostSummaryRow::into_summary).collect()
    }

    async fn count_posts(&self, query: &PostQuery) -> Result<u64, RepoError> {
        let mut qb: QueryBuilder<'_, Postgres> = QueryBuilder::new(
            "SELECT COUNT(*) FROM posts p \
             LEFT JOIN categories c ON c.id = p.category_id \
             WHERE 1=1 ",
        );
        Self::apply_post_query(&mut qb, query);

        let count: i64 = qb
            .build_query_scalar()
            .fetch_one(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        Self::convert_count(count)
    }

    async fn find_post(&self, id: Uuid) -> Result<Option<PostRecord>, RepoError> {
        let row = sqlx::query_as::<_, PostRow>(&format!(
            "SELECT {POST_COLUMNS} FROM posts WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(row.map(PostRecord::from))
    }

    async fn find_summary(&self, id: Uuid) -> Result<Option<PostSummary>, RepoError> {
        let mut qb: QueryBuilder<'_, Postgres> = QueryBuilder::new(SUMMARY_SELECT);
        qb.push(" AND p.id = ");
        qb.push_bind(id);
        qb.push(SUMMARY_GROUP_BY);

        let row = qb
            .build_query_as::<PostSummaryRow>()
            .fetch_optional(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        row.map(PostSummaryRow::into_summary).transpose()
    }
}

#[async_trait]
impl PostsWriteRepo for PostgresRepositories {
    async fn create_post(&self, params: CreatePostParams) -> Result<PostRecord, RepoError> {
        let CreatePostParams {
            title,
            text,
            pub_date,
            is_published,
            image,
            author_id,
            category_id,
            location_id,
        } = params;

        let row = sqlx::query_as::<_, PostRow>(&format!(
            "INSERT INTO posts (id, title, text, pub_date, is_published, image, author_id, \
             category_id, location_id, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10) \
             RETURNING {POST_COLUMNS}"
        ))
        .bind(Uuid::new_v4())
        .bind(title)
        .bind(text)
        .bind(pub_date)
        .bind(is_published)
        .bind(image)
        .bind(author_id)
        .bind(category_id)
        .bind(location_id)
        .bind(OffsetDateTime::now_utc())
        .fetch_one(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(PostRecord::from(row))
    }

    async fn update_post(&self, params: UpdatePostParams) -> Result<PostRecord, RepoError> {
        let UpdatePostParams {
            id,
            title,
            text,
            pub_date,
            is_published,
            image,
            category_id,
            location_id,
        } = params;

        let row = sqlx::query_as::<_, PostRow>(&format!(
            "UPDATE posts SET title = $2, text = $3, pub_date = $4, is_published = $5, \
             image = $6, category_id = $7, location_id = $8 \
             WHERE id = $1 \
             RETURNING {POST_COLUMNS}"
        ))
        .bind(id)
        .bind(title)
        .bind(text)
        .bind(pub_date)
        .bind(is_published)
        .bind(image)
        .bind(category_id)
        .bind(location_id)
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        row.map(PostRecord::from).ok_or(RepoError::NotFound)
    }

    async fn delete_post(&self, id: Uuid) -> Result<(), RepoError> {
        // comments.post_id cascades
        let result = sqlx::query("DELETE FROM posts WHERE id = $1")
            .bind(id)
            .execute(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        if result.rows_affected() == 0 {
            return Err(RepoError::NotFound);
        }
        Ok(())
    }
}
