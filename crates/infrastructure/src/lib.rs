//! Infrastructure adapters for application ports.

#![forbid(unsafe_code)]

mod aes_field_sealer;
mod discord_guild_client;
mod discord_identity_platform;
mod ethereum_signature_verifier;
mod http_ownership_oracle;
mod http_response;
mod postgres_binding_repository;
mod postgres_database;
mod postgres_grace_period_repository;

pub use aes_field_sealer::{AesFieldSealer, AesFieldSealerProvider};
pub use discord_guild_client::DiscordGuildClient;
pub use discord_identity_platform::DiscordIdentityPlatform;
pub use ethereum_signature_verifier::EthereumSignatureVerifier;
pub use http_ownership_oracle::HttpOwnershipOracle;
pub use postgres_binding_repository::PostgresBindingRepository;
pub use postgres_database::{connect_and_migrate, run_migrations};
pub use postgres_grace_period_repository::PostgresGracePeriodRepository;
