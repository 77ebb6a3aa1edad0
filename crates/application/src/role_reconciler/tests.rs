use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, TimeZone, Utc};

use rolewarden_core::{AppError, AppResult, GroupId};
use rolewarden_domain::{NewBinding, RolePolicy, RolePolicyInput, WalletAddress};

use crate::credential_store::CredentialStore;
use crate::encryption_gateway::{EncryptionGateway, FieldEncryption};
use crate::shutdown::{ShutdownSignal, shutdown_channel};
use crate::test_support::{
    FakeGuild, FakeKeyChannel, FakeOracle, FakeSealerProvider, InMemoryBindingRepository,
    InMemoryGracePeriodRepository, group, identity, role, wallet,
};

use super::RoleReconciler;

struct Harness {
    reconciler: RoleReconciler,
    store: CredentialStore,
    guild: Arc<FakeGuild>,
    oracle: Arc<FakeOracle>,
    grace_periods: Arc<InMemoryGracePeriodRepository>,
}

async fn harness() -> Harness {
    let grace_periods = Arc::new(InMemoryGracePeriodRepository::default());
    let store = CredentialStore::new(
        Arc::new(InMemoryBindingRepository::default()),
        grace_periods.clone(),
        EncryptionGateway::new(
            Arc::new(FakeKeyChannel::default()),
            Arc::new(FakeSealerProvider),
            HashMap::new(),
        ),
        FieldEncryption::Disabled,
    );
    let guild = Arc::new(FakeGuild::default());
    guild.add_role_definition(&group("guild-a"), &role("holder")).await;
    let oracle = Arc::new(FakeOracle::default());

    Harness {
        reconciler: RoleReconciler::new(store.clone(), guild.clone(), guild.clone(), oracle.clone()),
        store,
        guild,
        oracle,
        grace_periods,
    }
}

fn policy(min_owned_count: u64, grace_period_seconds: Option<i64>, disallow_all: bool) -> RolePolicy {
    RolePolicy::new(RolePolicyInput {
        group_id: "guild-a".to_owned(),
        role_id: "holder".to_owned(),
        min_owned_count: Some(min_owned_count),
        disallow_all,
        grace_period_seconds,
        ..RolePolicyInput::default()
    })
    .unwrap_or_else(|error| panic!("test policy should be valid: {error}"))
}

fn start() -> DateTime<Utc> {
    let Some(start) = Utc.with_ymd_and_hms(2026, 6, 1, 0, 0, 0).single() else {
        panic!("valid timestamp");
    };
    start
}

impl Harness {
    async fn bind(&self, member: &str, wallet_address: WalletAddress, owned_count: u64) -> AppResult<()> {
        self.oracle.set_owned(&wallet_address, owned_count).await;
        self.store
            .upsert_binding(NewBinding {
                group_id: group("guild-a"),
                identity_id: identity(member),
                display_name: member.to_owned(),
                wallet_address,
            })
            .await?;
        Ok(())
    }

    async fn holds(&self, member: &str) -> bool {
        self.guild.holds(&group("guild-a"), member, &role("holder")).await
    }

    async fn grace_rows(&self) -> usize {
        self.grace_periods.rows().await.len()
    }
}

#[tokio::test]
async fn role_follows_minimum_owned_count() -> AppResult<()> {
    let harness = harness().await;
    let guild_id = group("guild-a");
    harness.guild.add_member(&guild_id, "alice", &[&role("holder")]).await;
    harness.guild.add_member(&guild_id, "bob", &[]).await;
    harness.bind("alice", wallet(1), 1).await?;
    harness.bind("bob", wallet(2), 2).await?;

    let outcome = harness
        .reconciler
        .reconcile_policy(&policy(2, None, false), start(), &ShutdownSignal::never())
        .await?;

    assert!(!harness.holds("alice").await);
    assert!(harness.holds("bob").await);
    assert_eq!(outcome.evaluated, 2);
    assert_eq!(outcome.granted, 1);
    assert_eq!(outcome.revoked, 1);
    Ok(())
}

#[tokio::test]
async fn ownership_is_evaluated_over_every_bound_wallet() -> AppResult<()> {
    let harness = harness().await;
    harness.guild.add_member(&group("guild-a"), "alice", &[]).await;
    harness.bind("alice", wallet(1), 1).await?;
    harness.bind("alice", wallet(2), 1).await?;

    harness
        .reconciler
        .reconcile_policy(&policy(2, None, false), start(), &ShutdownSignal::never())
        .await?;

    assert!(harness.holds("alice").await);
    let calls = harness.oracle.calls.lock().await;
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].len(), 2);
    Ok(())
}

#[tokio::test]
async fn member_without_binding_never_receives_role() -> AppResult<()> {
    let harness = harness().await;
    let guild_id = group("guild-a");
    harness.guild.add_member(&guild_id, "alice", &[]).await;
    harness.guild.add_member(&guild_id, "bob", &[&role("holder")]).await;

    harness
        .reconciler
        .reconcile_policy(&policy(1, Some(100), false), start(), &ShutdownSignal::never())
        .await?;

    assert!(!harness.holds("alice").await);
    assert!(!harness.holds("bob").await);
    assert_eq!(harness.grace_rows().await, 0);
    assert!(harness.oracle.calls.lock().await.is_empty());
    Ok(())
}

#[tokio::test]
async fn grace_period_defers_revocation_until_expiry() -> AppResult<()> {
    let harness = harness().await;
    let holder_policy = policy(2, Some(100), false);
    harness.guild.add_member(&group("guild-a"), "alice", &[&role("holder")]).await;
    harness.bind("alice", wallet(1), 1).await?;

    let first = harness
        .reconciler
        .run_tick(std::slice::from_ref(&holder_policy), start(), &ShutdownSignal::never())
        .await;
    assert_eq!(first.failed(), 0);
    assert!(harness.holds("alice").await);
    assert_eq!(harness.grace_rows().await, 1);

    harness
        .reconciler
        .run_tick(
            std::slice::from_ref(&holder_policy),
            start() + Duration::seconds(50),
            &ShutdownSignal::never(),
        )
        .await;
    assert!(harness.holds("alice").await);
    let rows = harness.grace_periods.rows().await;
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].expires_at, start() + Duration::seconds(100));

    let expired = harness
        .reconciler
        .run_tick(
            std::slice::from_ref(&holder_policy),
            start() + Duration::seconds(101),
            &ShutdownSignal::never(),
        )
        .await;
    assert!(!harness.holds("alice").await);
    assert_eq!(harness.grace_rows().await, 0);
    let Some(Ok(sweep)) = expired.sweep else {
        panic!("sweep should run at the end of the tick");
    };
    assert_eq!(sweep.revoked, 1);
    Ok(())
}

#[tokio::test]
async fn requalifying_member_keeps_role_and_cancels_grace_period() -> AppResult<()> {
    let harness = harness().await;
    let holder_policy = policy(2, Some(100), false);
    harness.guild.add_member(&group("guild-a"), "alice", &[&role("holder")]).await;
    harness.bind("alice", wallet(1), 1).await?;

    harness
        .reconciler
        .reconcile_policy(&holder_policy, start(), &ShutdownSignal::never())
        .await?;
    assert_eq!(harness.grace_rows().await, 1);

    harness.oracle.set_owned(&wallet(1), 2).await;
    let outcome = harness
        .reconciler
        .reconcile_policy(
            &holder_policy,
            start() + Duration::seconds(50),
            &ShutdownSignal::never(),
        )
        .await?;

    assert!(harness.holds("alice").await);
    assert_eq!(harness.grace_rows().await, 0);
    assert_eq!(outcome.grace_cancelled, 1);
    Ok(())
}

#[tokio::test]
async fn removed_grace_window_revokes_immediately_and_clears_row() -> AppResult<()> {
    let harness = harness().await;
    harness.guild.add_member(&group("guild-a"), "alice", &[&role("holder")]).await;
    harness.bind("alice", wallet(1), 1).await?;

    harness
        .reconciler
        .reconcile_policy(&policy(2, Some(100), false), start(), &ShutdownSignal::never())
        .await?;
    assert_eq!(harness.grace_rows().await, 1);

    harness
        .reconciler
        .reconcile_policy(&policy(2, None, false), start(), &ShutdownSignal::never())
        .await?;

    assert!(!harness.holds("alice").await);
    assert_eq!(harness.grace_rows().await, 0);
    Ok(())
}

#[tokio::test]
async fn suspended_policy_revokes_without_querying_oracle() -> AppResult<()> {
    let harness = harness().await;
    harness.guild.add_member(&group("guild-a"), "alice", &[&role("holder")]).await;
    harness.bind("alice", wallet(1), 5).await?;

    harness
        .reconciler
        .reconcile_policy(&policy(1, None, true), start(), &ShutdownSignal::never())
        .await?;

    assert!(!harness.holds("alice").await);
    assert!(harness.oracle.calls.lock().await.is_empty());
    Ok(())
}

#[tokio::test]
async fn failing_policy_does_not_stop_the_tick() -> AppResult<()> {
    let harness = harness().await;
    harness.guild.add_member(&group("guild-a"), "alice", &[]).await;
    harness.bind("alice", wallet(1), 1).await?;
    let missing_role = RolePolicy::new(RolePolicyInput {
        group_id: "guild-a".to_owned(),
        role_id: "deleted".to_owned(),
        min_owned_count: Some(1),
        ..RolePolicyInput::default()
    })?;

    let report = harness
        .reconciler
        .run_tick(
            &[missing_role, policy(1, None, false)],
            start(),
            &ShutdownSignal::never(),
        )
        .await;

    assert_eq!(report.failed(), 1);
    assert_eq!(report.succeeded(), 1);
    assert!(matches!(report.policies[0].outcome, Err(AppError::NotFound(_))));
    assert!(harness.holds("alice").await);
    assert!(report.sweep.is_some());
    Ok(())
}

#[tokio::test]
async fn member_listing_failure_aborts_the_policy() {
    let harness = harness().await;
    harness.guild.state.lock().await.fail_member_listing = true;

    let result = harness
        .reconciler
        .reconcile_policy(&policy(1, None, false), start(), &ShutdownSignal::never())
        .await;

    assert!(matches!(result, Err(AppError::ExternalApi(_))));
}

#[tokio::test]
async fn shutdown_stops_the_tick_before_the_sweep() {
    let harness = harness().await;
    harness.guild.add_member(&group("guild-a"), "alice", &[]).await;
    let (trigger, signal) = shutdown_channel();
    trigger.trigger();

    let report = harness
        .reconciler
        .run_tick(&[policy(1, None, false)], start(), &signal)
        .await;

    assert!(report.policies.is_empty());
    assert!(report.sweep.is_none());
    assert!(report.interrupted());
}

#[tokio::test]
async fn shutdown_is_honoured_between_members() -> AppResult<()> {
    let harness = harness().await;
    let guild_id: GroupId = group("guild-a");
    harness.guild.add_member(&guild_id, "alice", &[]).await;
    let (trigger, signal) = shutdown_channel();
    trigger.trigger();

    let outcome = harness
        .reconciler
        .reconcile_policy(&policy(1, None, false), start(), &signal)
        .await?;

    assert!(outcome.interrupted);
    assert_eq!(outcome.evaluated, 0);
    Ok(())
}
