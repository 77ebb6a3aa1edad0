use std::sync::Arc;

use rolewarden_application::{BindingService, CommandRegistry, GroupsConfig};
use rolewarden_core::{AppError, AppResult, GroupId};

use crate::interaction_signature::InteractionVerifier;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub binding_service: BindingService,
    pub command_registry: Arc<CommandRegistry>,
    pub interaction_verifier: InteractionVerifier,
    pub groups: Arc<GroupsConfig>,
    pub bind_default_group_id: Option<GroupId>,
}

impl AppState {
    /// Resolves the group a bind request targets.
    ///
    /// Requests without a group fall back to the configured default, then to
    /// the first configured group. Unknown groups are rejected.
    pub fn resolve_bind_group(&self, requested: Option<&str>) -> AppResult<GroupId> {
        let group_id = match requested.map(str::trim).filter(|value| !value.is_empty()) {
            Some(value) => GroupId::new(value)?,
            None => self
                .bind_default_group_id
                .clone()
                .or_else(|| self.groups.first_group().cloned())
                .ok_or_else(|| AppError::Validation("no group is configured".to_owned()))?,
        };

        if !self.groups.contains(&group_id) {
            return Err(AppError::Validation(format!(
                "group '{group_id}' is not configured"
            )));
        }

        Ok(group_id)
    }
}
