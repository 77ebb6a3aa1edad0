//! PostgreSQL-backed grace period repository.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};

use rolewarden_application::GracePeriodRepository;
use rolewarden_core::{AppError, AppResult, GroupId};
use rolewarden_domain::{GracePeriod, IdentityId, RoleId};

/// PostgreSQL implementation of the grace period repository port.
#[derive(Clone)]
pub struct PostgresGracePeriodRepository {
    pool: PgPool,
}

impl PostgresGracePeriodRepository {
    /// Creates a repository with the provided connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, FromRow)]
struct GracePeriodRow {
    group_id: String,
    member_id: String,
    role_id: String,
    expires_at: DateTime<Utc>,
}

impl TryFrom<GracePeriodRow> for GracePeriod {
    type Error = AppError;

    fn try_from(row: GracePeriodRow) -> Result<Self, Self::Error> {
        let invalid =
            |error: AppError| AppError::Internal(format!("invalid grace period row: {error}"));

        Ok(Self {
            group_id: GroupId::new(row.group_id).map_err(invalid)?,
            member_id: IdentityId::new(row.member_id).map_err(invalid)?,
            role_id: RoleId::new(row.role_id).map_err(invalid)?,
            expires_at: row.expires_at,
        })
    }
}

#[async_trait]
impl GracePeriodRepository for PostgresGracePeriodRepository {
    async fn has_grace_period(
        &self,
        group_id: &GroupId,
        member_id: &IdentityId,
        role_id: &RoleId,
    ) -> AppResult<bool> {
        sqlx::query_scalar::<_, bool>(
            r#"
            SELECT EXISTS (
                SELECT 1 FROM grace_periods
                WHERE group_id = $1 AND member_id = $2 AND role_id = $3
            )
            "#,
        )
        .bind(group_id.as_str())
        .bind(member_id.as_str())
        .bind(role_id.as_str())
        .fetch_one(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to check grace period: {error}")))
    }

    async fn set_grace_period(&self, grace_period: &GracePeriod) -> AppResult<bool> {
        let result = sqlx::query(
            r#"
            INSERT INTO grace_periods (group_id, member_id, role_id, expires_at)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (group_id, member_id, role_id) DO NOTHING
            "#,
        )
        .bind(grace_period.group_id.as_str())
        .bind(grace_period.member_id.as_str())
        .bind(grace_period.role_id.as_str())
        .bind(grace_period.expires_at)
        .execute(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to set grace period: {error}")))?;

        Ok(result.rows_affected() > 0)
    }

    async fn remove_grace_period(
        &self,
        group_id: &GroupId,
        member_id: &IdentityId,
        role_id: &RoleId,
    ) -> AppResult<bool> {
        let result = sqlx::query(
            r#"
            DELETE FROM grace_periods
            WHERE group_id = $1 AND member_id = $2 AND role_id = $3
            "#,
        )
        .bind(group_id.as_str())
        .bind(member_id.as_str())
        .bind(role_id.as_str())
        .execute(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to remove grace period: {error}")))?;

        Ok(result.rows_affected() > 0)
    }

    async fn list_expired_grace_periods(&self, now: DateTime<Utc>) -> AppResult<Vec<GracePeriod>> {
        let rows = sqlx::query_as::<_, GracePeriodRow>(
            r#"
            SELECT group_id, member_id, role_id, expires_at
            FROM grace_periods
            WHERE expires_at < $1
            ORDER BY expires_at, group_id, member_id, role_id
            "#,
        )
        .bind(now)
        .fetch_all(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!("failed to list expired grace periods: {error}"))
        })?;

        rows.into_iter().map(GracePeriod::try_from).collect()
    }
}
