use async_trait::async_trait;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::application::repos::{
    CreateLocationParams, LocationsRepo, LocationsWriteRepo, RepoError,
};
use crate::domain::entities::LocationRecord;

use super::{PostgresRepositories, map_sqlx_error};

#[derive(sqlx::FromRow)]
struct LocationRow {
    id: Uuid,
    name: String,
    is_published: bool,
    created_at: OffsetDateTime,
}

impl From<LocationRow> for LocationRecord {
    fn from(row: LocationRow) -> Self {
        Self {
            id: row.id,
            name: row.name,
            is_published: row.is_published,
            created_at: row.created_at,
        }
    }
}

#[async_trait]
impl LocationsRepo for PostgresRepositories {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<LocationRecord>, RepoError> {
        let row = sqlx::query_as::<_, LocationRow>(
            "SELECT id, name, is_published, created_at FROM locations WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(row.map(LocationRecord::from))
    }

    async fn list_locations(&self) -> Result<Vec<LocationRecord>, RepoError> {
        let rows = sqlx::query_as::<_, LocationRow>(
            "SELECT id, name, is_published, created_at FROM locations ORDER BY name ASC, id ASC",
        )
        .fetch_all(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(rows.into_iter().map(LocationRecord::from).collect())
    }
}

#[async_trait]
impl LocationsWriteRepo for PostgresRepositories {
    async fn create_location(
        &self,
        params: CreateLocationParams,
    ) -> Result<LocationRecord, RepoError> {
        let row = sqlx::query_as::<_, LocationRow>(
            "INSERT INTO locations (id, name, is_published, created_at) \
             VALUES ($1, $2, $3, $4) \
             RETURNING id, name, is_published, created_at",
        )
        .bind(Uuid::new_v4())
        .bind(params.name)
        .bind(params.is_published)
        .bind(OffsetDateTime::now_utc())
        .fetch_one(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(LocationRecord::from(row))
    }

    async fn delete_location(&self, id: Uuid) -> Result<(), RepoError> {
        let result = sqlx::query("DELETE FROM locations WHERE id = $1")
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
