//! In-memory fakes shared by the service tests.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use tokio::sync::Mutex;

use rolewarden_core::{AppError, AppResult, GroupId};
use rolewarden_domain::{IdentityId, OwnershipFacts, RoleId, WalletAddress};

pub(crate) use crate::{InMemoryBindingRepository, InMemoryGracePeriodRepository};
use crate::{
    FieldSealer, FieldSealerProvider, GuildDirectory, GuildMember, GuildRole,
    KeyDistributionChannel, OwnershipOracle, RoleAssignments,
};

pub(crate) fn group(value: &str) -> GroupId {
    GroupId::new(value).unwrap_or_else(|error| panic!("invalid test group id: {error}"))
}

pub(crate) fn identity(value: &str) -> IdentityId {
    IdentityId::new(value).unwrap_or_else(|error| panic!("invalid test identity id: {error}"))
}

pub(crate) fn role(value: &str) -> RoleId {
    RoleId::new(value).unwrap_or_else(|error| panic!("invalid test role id: {error}"))
}

pub(crate) fn wallet(byte: u8) -> WalletAddress {
    WalletAddress::from_bytes(&[byte; 20])
}

/// Reversible stand-in for the real cipher: tagged with its key so opening
/// under another key fails, and salted with a counter so sealing is not
/// deterministic.
pub(crate) struct FakeSealer {
    key: String,
    counter: AtomicU64,
}

impl FieldSealer for FakeSealer {
    fn blind_index(&self, field: &str, value: &str) -> String {
        format!("idx[{}][{field}]{}", self.key, value.to_lowercase())
    }

    fn seal(&self, plaintext: &str) -> AppResult<String> {
        let nonce = self.counter.fetch_add(1, Ordering::Relaxed);
        let reversed: String = plaintext.chars().rev().collect();
        Ok(format!("{}#{nonce}#{reversed}", self.key))
    }

    fn open(&self, sealed: &str) -> AppResult<String> {
        let mut parts = sealed.splitn(3, '#');
        let (Some(key), Some(_nonce), Some(body)) = (parts.next(), parts.next(), parts.next())
        else {
            return Err(AppError::Internal("malformed sealed value".to_owned()));
        };
        if key != self.key {
            return Err(AppError::Internal("sealed value authentication failed".to_owned()));
        }

        Ok(body.chars().rev().collect())
    }
}

pub(crate) struct FakeSealerProvider;

impl FieldSealerProvider for FakeSealerProvider {
    fn sealer_from_key_material(&self, key_material: &str) -> AppResult<Arc<dyn FieldSealer>> {
        Ok(Arc::new(FakeSealer {
            key: key_material.to_owned(),
            counter: AtomicU64::new(0),
        }))
    }
}

#[derive(Default)]
pub(crate) struct FakeKeyChannel {
    pub(crate) messages: Arc<Mutex<HashMap<String, String>>>,
}

impl FakeKeyChannel {
    pub(crate) fn with_message(channel_id: &str, content: &str) -> Self {
        Self {
            messages: Arc::new(Mutex::new(HashMap::from([(
                channel_id.to_owned(),
                content.to_owned(),
            )]))),
        }
    }
}

#[async_trait]
impl KeyDistributionChannel for FakeKeyChannel {
    async fn latest_message(&self, channel_id: &str) -> AppResult<Option<String>> {
        Ok(self.messages.lock().await.get(channel_id).cloned())
    }
}

#[derive(Default)]
pub(crate) struct GuildState {
    pub(crate) roles: Vec<(GroupId, RoleId)>,
    pub(crate) members: Vec<(GroupId, GuildMember)>,
    pub(crate) fail_member_listing: bool,
    pub(crate) fail_role_removal_for: Option<IdentityId>,
    pub(crate) added: Vec<(IdentityId, RoleId)>,
    pub(crate) removed: Vec<(IdentityId, RoleId)>,
}

#[derive(Default)]
pub(crate) struct FakeGuild {
    pub(crate) state: Mutex<GuildState>,
}

impl FakeGuild {
    pub(crate) async fn add_role_definition(&self, group_id: &GroupId, role_id: &RoleId) {
        self.state
            .lock()
            .await
            .roles
            .push((group_id.clone(), role_id.clone()));
    }

    pub(crate) async fn add_member(&self, group_id: &GroupId, member_id: &str, roles: &[&RoleId]) {
        self.state.lock().await.members.push((
            group_id.clone(),
            GuildMember {
                member_id: identity(member_id),
                display_name: member_id.to_owned(),
                role_ids: roles.iter().map(|role_id| (*role_id).clone()).collect(),
            },
        ));
    }

    pub(crate) async fn holds(&self, group_id: &GroupId, member_id: &str, role_id: &RoleId) -> bool {
        self.state.lock().await.members.iter().any(|(group, member)| {
            group == group_id && member.member_id.as_str() == member_id && member.has_role(role_id)
        })
    }

    pub(crate) async fn removals(&self) -> usize {
        self.state.lock().await.removed.len()
    }
}

#[async_trait]
impl GuildDirectory for FakeGuild {
    async fn fetch_role(&self, group_id: &GroupId, role_id: &RoleId) -> AppResult<Option<GuildRole>> {
        self.cached_role(group_id, role_id).await
    }

    async fn fetch_members(&self, group_id: &GroupId) -> AppResult<Vec<GuildMember>> {
        let state = self.state.lock().await;
        if state.fail_member_listing {
            return Err(AppError::ExternalApi("member listing unavailable".to_owned()));
        }

        Ok(state
            .members
            .iter()
            .filter(|(group, _)| group == group_id)
            .map(|(_, member)| member.clone())
            .collect())
    }

    async fn cached_member(
        &self,
        group_id: &GroupId,
        member_id: &IdentityId,
    ) -> AppResult<Option<GuildMember>> {
        Ok(self
            .state
            .lock()
            .await
            .members
            .iter()
            .find(|(group, member)| group == group_id && &member.member_id == member_id)
            .map(|(_, member)| member.clone()))
    }

    async fn cached_role(&self, group_id: &GroupId, role_id: &RoleId) -> AppResult<Option<GuildRole>> {
        Ok(self
            .state
            .lock()
            .await
            .roles
            .iter()
            .find(|(group, role)| group == group_id && role == role_id)
            .map(|(_, role)| GuildRole {
                role_id: role.clone(),
                name: format!("role {role}"),
            }))
    }
}

#[async_trait]
impl RoleAssignments for FakeGuild {
    async fn add_role(
        &self,
        group_id: &GroupId,
        member_id: &IdentityId,
        role_id: &RoleId,
    ) -> AppResult<()> {
        let mut state = self.state.lock().await;
        if let Some((_, member)) = state
            .members
            .iter_mut()
            .find(|(group, member)| group == group_id && &member.member_id == member_id)
            && !member.has_role(role_id)
        {
            member.role_ids.push(role_id.clone());
        }
        state.added.push((member_id.clone(), role_id.clone()));
        Ok(())
    }

    async fn remove_role(
        &self,
        group_id: &GroupId,
        member_id: &IdentityId,
        role_id: &RoleId,
    ) -> AppResult<()> {
        let mut state = self.state.lock().await;
        if state.fail_role_removal_for.as_ref() == Some(member_id) {
            return Err(AppError::ExternalApi("role removal rejected".to_owned()));
        }

        if let Some((_, member)) = state
            .members
            .iter_mut()
            .find(|(group, member)| group == group_id && &member.member_id == member_id)
        {
            member.role_ids.retain(|held| held != role_id);
        }
        state.removed.push((member_id.clone(), role_id.clone()));
        Ok(())
    }
}

#[derive(Default)]
pub(crate) struct FakeOracle {
    pub(crate) facts: Mutex<HashMap<WalletAddress, OwnershipFacts>>,
    pub(crate) calls: Mutex<Vec<Vec<WalletAddress>>>,
}

impl FakeOracle {
    pub(crate) async fn set_owned(&self, wallet_address: &WalletAddress, owned_count: u64) {
        self.facts.lock().await.insert(
            wallet_address.clone(),
            OwnershipFacts {
                owned_count,
                has_minted: false,
            },
        );
    }
}

#[async_trait]
impl OwnershipOracle for FakeOracle {
    async fn ownership_facts(&self, wallets: &[WalletAddress]) -> AppResult<OwnershipFacts> {
        self.calls.lock().await.push(wallets.to_vec());
        let facts = self.facts.lock().await;
        Ok(wallets
            .iter()
            .filter_map(|wallet_address| facts.get(wallet_address))
            .fold(OwnershipFacts::default(), |total, facts| OwnershipFacts {
                owned_count: total.owned_count + facts.owned_count,
                has_minted: total.has_minted || facts.has_minted,
            }))
    }
}
