//! PostgreSQL-backed binding repository.

use async_trait::async_trait;
use sqlx::{FromRow, PgPool};

use rolewarden_application::{BindingRepository, StoredBinding, StoredBindingFields};
use rolewarden_core::{AppError, AppResult, GroupId};
use rolewarden_domain::BindingId;

/// PostgreSQL implementation of the binding repository port.
#[derive(Clone)]
pub struct PostgresBindingRepository {
    pool: PgPool,
}

impl PostgresBindingRepository {
    /// Creates a repository with the provided connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, FromRow)]
struct AccountRow {
    id: i64,
    group_id: String,
    sealed: bool,
    identity_lookup: String,
    identity_value: String,
    display_name_value: String,
    wallet_lookup: String,
    wallet_value: String,
}

impl AccountRow {
    fn into_stored(self) -> AppResult<StoredBinding> {
        let group_id = GroupId::new(self.group_id).map_err(|error| {
            AppError::Internal(format!(
                "account {} holds an invalid group id: {error}",
                self.id
            ))
        })?;

        Ok(StoredBinding {
            id: BindingId::new(self.id),
            group_id,
            fields: StoredBindingFields {
                sealed: self.sealed,
                identity_lookup: self.identity_lookup,
                identity_value: self.identity_value,
                display_name_value: self.display_name_value,
                wallet_lookup: self.wallet_lookup,
                wallet_value: self.wallet_value,
            },
        })
    }
}

#[async_trait]
impl BindingRepository for PostgresBindingRepository {
    async fn upsert_binding(
        &self,
        group_id: &GroupId,
        fields: StoredBindingFields,
    ) -> AppResult<BindingId> {
        let id = sqlx::query_scalar::<_, i64>(
            r#"
            INSERT INTO accounts (
                group_id,
                sealed,
                identity_lookup,
                identity_value,
                display_name_value,
                wallet_lookup,
                wallet_value
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (wallet_lookup) DO UPDATE
            SET group_id = EXCLUDED.group_id,
                sealed = EXCLUDED.sealed,
                identity_lookup = EXCLUDED.identity_lookup,
                identity_value = EXCLUDED.identity_value,
                display_name_value = EXCLUDED.display_name_value,
                wallet_value = EXCLUDED.wallet_value,
                updated_at = now()
            RETURNING id
            "#,
        )
        .bind(group_id.as_str())
        .bind(fields.sealed)
        .bind(fields.identity_lookup.as_str())
        .bind(fields.identity_value.as_str())
        .bind(fields.display_name_value.as_str())
        .bind(fields.wallet_lookup.as_str())
        .bind(fields.wallet_value.as_str())
        .fetch_one(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to upsert binding: {error}")))?;

        Ok(BindingId::new(id))
    }

    async fn find_by_identity_lookup(&self, identity_lookup: &str) -> AppResult<Vec<StoredBinding>> {
        let rows = sqlx::query_as::<_, AccountRow>(
            r#"
            SELECT id, group_id, sealed, identity_lookup, identity_value,
                   display_name_value, wallet_lookup, wallet_value
            FROM accounts
            WHERE identity_lookup = $1
            ORDER BY id
            "#,
        )
        .bind(identity_lookup)
        .fetch_all(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!("failed to list bindings by identity: {error}"))
        })?;

        rows.into_iter().map(AccountRow::into_stored).collect()
    }

    async fn find_by_wallet_lookup(&self, wallet_lookup: &str) -> AppResult<Option<StoredBinding>> {
        let row = sqlx::query_as::<_, AccountRow>(
            r#"
            SELECT id, group_id, sealed, identity_lookup, identity_value,
                   display_name_value, wallet_lookup, wallet_value
            FROM accounts
            WHERE wallet_lookup = $1
            "#,
        )
        .bind(wallet_lookup)
        .fetch_optional(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!("failed to find binding by wallet: {error}"))
        })?;

        row.map(AccountRow::into_stored).transpose()
    }

    async fn list_unsealed(&self, group_id: &GroupId) -> AppResult<Vec<StoredBinding>> {
        let rows = sqlx::query_as::<_, AccountRow>(
            r#"
            SELECT id, group_id, sealed, identity_lookup, identity_value,
                   display_name_value, wallet_lookup, wallet_value
            FROM accounts
            WHERE group_id = $1 AND NOT sealed
            ORDER BY id
            "#,
        )
        .bind(group_id.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!("failed to list plaintext bindings: {error}"))
        })?;

        rows.into_iter().map(AccountRow::into_stored).collect()
    }

    async fn replace_fields(&self, id: BindingId, fields: StoredBindingFields) -> AppResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE accounts
            SET sealed = $2,
                identity_lookup = $3,
                identity_value = $4,
                display_name_value = $5,
                wallet_lookup = $6,
                wallet_value = $7,
                updated_at = now()
            WHERE id = $1
            "#,
        )
        .bind(id.as_i64())
        .bind(fields.sealed)
        .bind(fields.identity_lookup.as_str())
        .bind(fields.identity_value.as_str())
        .bind(fields.display_name_value.as_str())
        .bind(fields.wallet_lookup.as_str())
        .bind(fields.wallet_value.as_str())
        .execute(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to rewrite binding: {error}")))?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!(
                "binding {} does not exist",
                id.as_i64()
            )));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests;
