use chrono::Utc;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;

use rolewarden_application::{BindingRepository, StoredBindingFields};
use rolewarden_core::{AppError, GroupId};
use rolewarden_domain::BindingId;

use super::PostgresBindingRepository;
use crate::run_migrations;

async fn test_pool() -> Option<PgPool> {
    let Ok(database_url) = std::env::var("DATABASE_URL") else {
        return None;
    };

    let pool = match PgPoolOptions::new()
        .max_connections(2)
        .connect(database_url.as_str())
        .await
    {
        Ok(pool) => pool,
        Err(error) => panic!("failed to connect to DATABASE_URL in test: {error}"),
    };

    if let Err(error) = run_migrations(&pool).await {
        panic!("failed to run migrations for postgres binding tests: {error}");
    }

    Some(pool)
}

fn unique_suffix() -> i64 {
    Utc::now().timestamp_nanos_opt().unwrap_or_default()
}

fn unique_group(label: &str) -> GroupId {
    GroupId::new(format!("{label}-{}", unique_suffix()))
        .unwrap_or_else(|error| panic!("invalid test group id: {error}"))
}

fn unique_lookup(label: &str) -> String {
    format!("{label}-{}", unique_suffix())
}

fn plaintext(identity: &str, wallet: &str) -> StoredBindingFields {
    StoredBindingFields {
        sealed: false,
        identity_lookup: identity.to_owned(),
        identity_value: identity.to_owned(),
        display_name_value: format!("{identity}#0001"),
        wallet_lookup: wallet.to_owned(),
        wallet_value: wallet.to_owned(),
    }
}

#[tokio::test]
async fn upsert_overwrites_identity_of_existing_wallet() {
    let Some(pool) = test_pool().await else {
        return;
    };
    let repository = PostgresBindingRepository::new(pool);
    let group_id = unique_group("upsert");
    let alice = unique_lookup("alice");
    let bob = unique_lookup("bob");
    let wallet = unique_lookup("0xaa");

    let first = repository
        .upsert_binding(&group_id, plaintext(&alice, &wallet))
        .await;
    let second = repository
        .upsert_binding(&group_id, plaintext(&bob, &wallet))
        .await;
    let (Ok(first), Ok(second)) = (first, second) else {
        panic!("upserts should succeed");
    };
    assert_eq!(first, second);

    let previous = repository.find_by_identity_lookup(&alice).await;
    assert!(matches!(previous, Ok(rows) if rows.is_empty()));

    let owner = repository.find_by_wallet_lookup(&wallet).await;
    let Ok(Some(owner)) = owner else {
        panic!("wallet should still be bound");
    };
    assert_eq!(owner.fields.identity_value, bob);
}

#[tokio::test]
async fn wallet_is_bound_once_across_groups() {
    let Some(pool) = test_pool().await else {
        return;
    };
    let repository = PostgresBindingRepository::new(pool);
    let group_a = unique_group("group-a");
    let group_b = unique_group("group-b");
    let alice = unique_lookup("alice");
    let wallet = unique_lookup("0xbb");

    let first = repository
        .upsert_binding(&group_a, plaintext(&alice, &wallet))
        .await;
    let second = repository
        .upsert_binding(&group_b, plaintext(&alice, &wallet))
        .await;
    let (Ok(first), Ok(second)) = (first, second) else {
        panic!("upserts should succeed");
    };
    assert_eq!(first, second);

    let rows = repository.find_by_identity_lookup(&alice).await;
    let Ok(rows) = rows else {
        panic!("identity lookup should succeed");
    };
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].group_id, group_b);
}

#[tokio::test]
async fn replace_fields_reseals_row_in_place() {
    let Some(pool) = test_pool().await else {
        return;
    };
    let repository = PostgresBindingRepository::new(pool);
    let group_id = unique_group("reseal");

    let Ok(id) = repository
        .upsert_binding(&group_id, plaintext("alice", &unique_lookup("0xcc")))
        .await
    else {
        panic!("upsert should succeed");
    };
    let unsealed = repository.list_unsealed(&group_id).await;
    assert!(matches!(unsealed, Ok(rows) if rows.len() == 1));

    let wallet_index = unique_lookup("idx-wallet");
    let sealed = StoredBindingFields {
        sealed: true,
        identity_lookup: "idx-identity".to_owned(),
        identity_value: "ct-identity".to_owned(),
        display_name_value: "ct-name".to_owned(),
        wallet_lookup: wallet_index.clone(),
        wallet_value: "ct-wallet".to_owned(),
    };
    assert!(repository.replace_fields(id, sealed.clone()).await.is_ok());

    let found = repository.find_by_wallet_lookup(&wallet_index).await;
    let Ok(Some(found)) = found else {
        panic!("resealed row should be found by its blind index");
    };
    assert_eq!(found.id, id);
    assert_eq!(found.fields, sealed);
    assert!(matches!(repository.list_unsealed(&group_id).await, Ok(rows) if rows.is_empty()));
}

#[tokio::test]
async fn replace_fields_of_missing_row_is_not_found() {
    let Some(pool) = test_pool().await else {
        return;
    };
    let repository = PostgresBindingRepository::new(pool);

    let result = repository
        .replace_fields(BindingId::new(-1), plaintext("ghost", "0xdd"))
        .await;
    assert!(matches!(result, Err(AppError::NotFound(_))));
}
