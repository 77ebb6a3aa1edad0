//! Group and role policy configuration file.

use std::collections::{HashMap, HashSet};

use serde::Deserialize;

use rolewarden_core::{AppError, AppResult, GroupId};
use rolewarden_domain::{RolePolicy, RolePolicyInput};

#[derive(Debug, Deserialize)]
struct GroupsFile {
    groups: Vec<GroupEntry>,
}

#[derive(Debug, Deserialize)]
struct GroupEntry {
    group_id: String,
    #[serde(default)]
    setup_channel_id: Option<String>,
    #[serde(default)]
    role_policies: Vec<PolicyEntry>,
}

#[derive(Debug, Deserialize)]
struct PolicyEntry {
    role_id: String,
    #[serde(default)]
    min_owned_count: Option<u64>,
    #[serde(default)]
    requires_any_minted: bool,
    #[serde(default)]
    disallow_all: bool,
    #[serde(default)]
    grace_period_seconds: Option<i64>,
}

/// Validated settings of one group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupSettings {
    /// Group identifier.
    pub group_id: GroupId,
    /// Channel whose latest message holds the group's encryption key.
    pub setup_channel_id: Option<String>,
    /// Role policies in file order.
    pub policies: Vec<RolePolicy>,
}

/// Validated groups configuration.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct GroupsConfig {
    groups: Vec<GroupSettings>,
}

impl GroupsConfig {
    /// Parses and validates the JSON groups document.
    ///
    /// Group ids must be unique, and a role may appear only once per group.
    pub fn from_json(document: &str) -> AppResult<Self> {
        let file: GroupsFile = serde_json::from_str(document).map_err(|error| {
            AppError::Validation(format!("invalid groups configuration: {error}"))
        })?;

        let mut seen_groups = HashSet::new();
        let mut groups = Vec::with_capacity(file.groups.len());
        for entry in file.groups {
            let group_id = GroupId::new(entry.group_id.as_str())?;
            if !seen_groups.insert(group_id.clone()) {
                return Err(AppError::Validation(format!(
                    "group '{group_id}' is configured more than once"
                )));
            }

            let setup_channel_id = entry
                .setup_channel_id
                .map(|channel_id| channel_id.trim().to_owned())
                .filter(|channel_id| !channel_id.is_empty());

            let mut seen_roles = HashSet::new();
            let mut policies = Vec::with_capacity(entry.role_policies.len());
            for policy in entry.role_policies {
                let policy = RolePolicy::new(RolePolicyInput {
                    group_id: entry.group_id.clone(),
                    role_id: policy.role_id,
                    min_owned_count: policy.min_owned_count,
                    requires_any_minted: policy.requires_any_minted,
                    disallow_all: policy.disallow_all,
                    grace_period_seconds: policy.grace_period_seconds,
                })?;

                if !seen_roles.insert(policy.role_id().clone()) {
                    return Err(AppError::Validation(format!(
                        "role '{}' has more than one policy in group '{group_id}'",
                        policy.role_id()
                    )));
                }
                policies.push(policy);
            }

            groups.push(GroupSettings {
                group_id,
                setup_channel_id,
                policies,
            });
        }

        Ok(Self { groups })
    }

    /// Returns every configured group in file order.
    #[must_use]
    pub fn groups(&self) -> &[GroupSettings] {
        &self.groups
    }

    /// Returns every role policy in reconciliation order.
    #[must_use]
    pub fn policies(&self) -> Vec<RolePolicy> {
        self.groups
            .iter()
            .flat_map(|group| group.policies.iter().cloned())
            .collect()
    }

    /// Returns the setup channel of every group that has one.
    #[must_use]
    pub fn setup_channels(&self) -> HashMap<GroupId, String> {
        self.groups
            .iter()
            .filter_map(|group| {
                group
                    .setup_channel_id
                    .clone()
                    .map(|channel_id| (group.group_id.clone(), channel_id))
            })
            .collect()
    }

    /// Returns whether a group is configured.
    #[must_use]
    pub fn contains(&self, group_id: &GroupId) -> bool {
        self.groups.iter().any(|group| &group.group_id == group_id)
    }

    /// Returns the first configured group.
    #[must_use]
    pub fn first_group(&self) -> Option<&GroupId> {
        self.groups.first().map(|group| &group.group_id)
    }
}

#[cfg(test)]
mod tests {
    use rolewarden_domain::OwnershipPredicate;

    use super::*;

    const DOCUMENT: &str = r#"{
        "groups": [
            {
                "group_id": "guild-a",
                "setup_channel_id": "setup-a",
                "role_policies": [
                    { "role_id": "holder", "min_owned_count": 2, "grace_period_seconds": 100 },
                    { "role_id": "minter", "requires_any_minted": true, "disallow_all": true }
                ]
            },
            {
                "group_id": "guild-b",
                "role_policies": [{ "role_id": "holder", "min_owned_count": 1 }]
            }
        ]
    }"#;

    #[test]
    fn parses_groups_and_keeps_policy_order() -> AppResult<()> {
        let config = GroupsConfig::from_json(DOCUMENT)?;

        let roles: Vec<(String, String)> = config
            .policies()
            .iter()
            .map(|policy| {
                (
                    policy.group_id().as_str().to_owned(),
                    policy.role_id().as_str().to_owned(),
                )
            })
            .collect();
        assert_eq!(
            roles,
            vec![
                ("guild-a".to_owned(), "holder".to_owned()),
                ("guild-a".to_owned(), "minter".to_owned()),
                ("guild-b".to_owned(), "holder".to_owned()),
            ]
        );

        let policies = config.policies();
        assert_eq!(policies[0].predicate(), OwnershipPredicate::MinOwnedCount(2));
        assert!(policies[1].disallow_all());
        assert_eq!(config.setup_channels().len(), 1);
        assert_eq!(config.first_group().map(GroupId::as_str), Some("guild-a"));
        assert!(config.contains(&GroupId::new("guild-b")?));
        Ok(())
    }

    #[test]
    fn policy_with_both_predicates_is_rejected() {
        let document = r#"{"groups":[{"group_id":"g","role_policies":[
            {"role_id":"r","min_owned_count":1,"requires_any_minted":true}
        ]}]}"#;
        assert!(matches!(
            GroupsConfig::from_json(document),
            Err(AppError::Validation(_))
        ));
    }

    #[test]
    fn duplicate_group_is_rejected() {
        let document = r#"{"groups":[{"group_id":"g"},{"group_id":" g "}]}"#;
        assert!(matches!(
            GroupsConfig::from_json(document),
            Err(AppError::Validation(_))
        ));
    }

    #[test]
    fn duplicate_role_in_group_is_rejected() {
        let document = r#"{"groups":[{"group_id":"g","role_policies":[
            {"role_id":"r","min_owned_count":1},
            {"role_id":"r","requires_any_minted":true}
        ]}]}"#;
        assert!(matches!(
            GroupsConfig::from_json(document),
            Err(AppError::Validation(_))
        ));
    }

    #[test]
    fn blank_setup_channel_counts_as_absent() -> AppResult<()> {
        let config =
            GroupsConfig::from_json(r#"{"groups":[{"group_id":"g","setup_channel_id":"  "}]}"#)?;
        assert!(config.setup_channels().is_empty());
        Ok(())
    }
}
