use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use rolewarden_core::{AppError, AppResult, GroupId};
use rolewarden_domain::{BindingId, GracePeriod, IdentityId, RoleId};

use crate::binding_ports::{
    BindingRepository, GracePeriodRepository, StoredBinding, StoredBindingFields,
};

/// In-memory binding repository implementation.
#[derive(Debug, Default)]
pub struct InMemoryBindingRepository {
    rows: RwLock<Vec<StoredBinding>>,
}

impl InMemoryBindingRepository {
    /// Creates an empty in-memory repository.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of every stored row in insertion order.
    pub async fn rows(&self) -> Vec<StoredBinding> {
        self.rows.read().await.clone()
    }
}

#[async_trait]
impl BindingRepository for InMemoryBindingRepository {
    async fn upsert_binding(
        &self,
        group_id: &GroupId,
        fields: StoredBindingFields,
    ) -> AppResult<BindingId> {
        let mut rows = self.rows.write().await;

        if let Some(row) = rows
            .iter_mut()
            .find(|row| row.fields.wallet_lookup == fields.wallet_lookup)
        {
            row.group_id = group_id.clone();
            row.fields = fields;
            return Ok(row.id);
        }

        let next_id = rows.iter().map(|row| row.id.as_i64()).max().unwrap_or(0) + 1;
        let id = BindingId::new(next_id);
        rows.push(StoredBinding {
            id,
            group_id: group_id.clone(),
            fields,
        });

        Ok(id)
    }

    async fn find_by_identity_lookup(&self, identity_lookup: &str) -> AppResult<Vec<StoredBinding>> {
        let rows = self.rows.read().await;

        Ok(rows
            .iter()
            .filter(|row| row.fields.identity_lookup == identity_lookup)
            .cloned()
            .collect())
    }

    async fn find_by_wallet_lookup(&self, wallet_lookup: &str) -> AppResult<Option<StoredBinding>> {
        let rows = self.rows.read().await;

        Ok(rows
            .iter()
            .find(|row| row.fields.wallet_lookup == wallet_lookup)
            .cloned())
    }

    async fn list_unsealed(&self, group_id: &GroupId) -> AppResult<Vec<StoredBinding>> {
        let rows = self.rows.read().await;

        Ok(rows
            .iter()
            .filter(|row| &row.group_id == group_id && !row.fields.sealed)
            .cloned()
            .collect())
    }

    async fn replace_fields(&self, id: BindingId, fields: StoredBindingFields) -> AppResult<()> {
        let mut rows = self.rows.write().await;
        let row = rows
            .iter_mut()
            .find(|row| row.id == id)
            .ok_or_else(|| AppError::NotFound(format!("binding {} does not exist", id.as_i64())))?;

        row.fields = fields;
        Ok(())
    }
}

/// In-memory grace period repository implementation.
#[derive(Debug, Default)]
pub struct InMemoryGracePeriodRepository {
    rows: RwLock<HashMap<(GroupId, IdentityId, RoleId), GracePeriod>>,
}

impl InMemoryGracePeriodRepository {
    /// Creates an empty in-memory repository.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of every pending grace period ordered by expiry.
    pub async fn rows(&self) -> Vec<GracePeriod> {
        let mut rows: Vec<GracePeriod> = self.rows.read().await.values().cloned().collect();
        rows.sort_by(|left, right| left.expires_at.cmp(&right.expires_at));
        rows
    }
}

fn key_of(group_id: &GroupId, member_id: &IdentityId, role_id: &RoleId) -> (GroupId, IdentityId, RoleId) {
    (group_id.clone(), member_id.clone(), role_id.clone())
}

#[async_trait]
impl GracePeriodRepository for InMemoryGracePeriodRepository {
    async fn has_grace_period(
        &self,
        group_id: &GroupId,
        member_id: &IdentityId,
        role_id: &RoleId,
    ) -> AppResult<bool> {
        Ok(self
            .rows
            .read()
            .await
            .contains_key(&key_of(group_id, member_id, role_id)))
    }

    async fn set_grace_period(&self, grace_period: &GracePeriod) -> AppResult<bool> {
        let key = key_of(
            &grace_period.group_id,
            &grace_period.member_id,
            &grace_period.role_id,
        );
        let mut rows = self.rows.write().await;

        if rows.contains_key(&key) {
            return Ok(false);
        }

        rows.insert(key, grace_period.clone());
        Ok(true)
    }

    async fn remove_grace_period(
        &self,
        group_id: &GroupId,
        member_id: &IdentityId,
        role_id: &RoleId,
    ) -> AppResult<bool> {
        Ok(self
            .rows
            .write()
            .await
            .remove(&key_of(group_id, member_id, role_id))
            .is_some())
    }

    async fn list_expired_grace_periods(&self, now: DateTime<Utc>) -> AppResult<Vec<GracePeriod>> {
        Ok(self
            .rows()
            .await
            .into_iter()
            .filter(|grace_period| grace_period.is_expired(now))
            .collect())
    }
}
