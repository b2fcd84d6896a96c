//! Postgres-backed repository implementations.

mod categories;
mod comments;
mod locations;
mod posts;
mod sessions;
mod users;
mod util;

pub use util::map_sqlx_error;

use std::sync::Arc;

use async_trait::async_trait;
use sqlx::{
    Postgres, QueryBuilder,
    postgres::{PgPool, PgPoolOptions},
    query,
};

use crate::application::query::{PostQuery, PostScope, PostVisibility};
use crate::application::repos::{HealthRepo, RepoError};

#[derive(Clone)]
pub struct PostgresRepositories {
    pool: Arc<PgPool>,
}

impl PostgresRepositories {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub async fn connect(url: &str, max_connections: u32) -> Result<PgPool, sqlx::Error> {
        PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(url)
            .await
    }

    pub async fn run_migrations(pool: &PgPool) -> Result<(), sqlx::Error> {
        sqlx::migrate!("./migrations")
            .run(pool)
            .await
            .map_err(Into::into)
    }

    pub async fn health_check(&self) -> Result<(), sqlx::Error> {
        query("SELECT 1").execute(self.pool()).await.map(|_| ())
    }

    /// Append the scope and visibility clauses of `post_query`. Expects `p` (posts)
    /// and `c` (left-joined categories) in scope.
    fn apply_post_query(qb: &mut QueryBuilder<'_, Postgres>, post_query: &PostQuery) {
        match post_query.scope {
            PostScope::All => {}
            PostScope::Category(category_id) => {
                qb.push(" AND p.category_id = ");
                qb.push_bind(category_id);
            }
            PostScope::Author(author_id) => {
                qb.push(" AND p.author_id = ");
                qb.push_bind(author_id);
            }
        }

        match post_query.visibility {
            PostVisibility::Public { now } => {
                qb.push(" AND ");
                Self::push_public_clause(qb, now);
            }
            PostVisibility::PublicOrOwnedBy { viewer, now } => {
                qb.push(" AND (p.author_id = ");
                qb.push_bind(viewer);
                qb.push(" OR ");
                Self::push_public_clause(qb, now);
                qb.push(")");
            }
        }
    }

    fn push_public_clause(qb: &mut QueryBuilder<'_, Postgres>, now: time::OffsetDateTime) {
        qb.push("(p.is_published AND p.pub_date <= ");
        qb.push_bind(now);
        qb.push(" AND (p.category_id IS NULL OR c.is_published))");
    }

    fn convert_count(value: i64) -> Result<u64, RepoError> {
        value
            .try_into()
            .map_err(|_| RepoError::from_persistence("count exceeds supported range"))
    }
}

#[async_trait]
impl HealthRepo for PostgresRepositories {
    async fn ping(&self) -> Result<(), RepoError> {
        self.health_check().await.map_err(map_sqlx_error)
    }
}
