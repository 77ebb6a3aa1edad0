//! Application services and ports.

#![forbid(unsafe_code)]

mod binding_ports;
mod binding_service;
mod command_registry;
mod credential_store;
mod encryption_gateway;
mod grace_period_sweeper;
mod groups_config;
mod in_memory_repositories;
mod platform_ports;
mod role_reconciler;
mod shutdown;

#[cfg(test)]
mod test_support;

pub use binding_ports::{
    BindingRepository, GracePeriodRepository, StoredBinding, StoredBindingFields,
};
pub use binding_service::{
    BindRequest, BindingService, IdentityPlatform, PlatformIdentity, WalletSignatureVerifier,
};
pub use command_registry::{
    BindLinkCommand, BoundWalletsCommand, CommandDefinition, CommandHandler, CommandInvocation,
    CommandRegistry, CommandReply,
};
pub use credential_store::{CredentialStore, SealReport};
pub use encryption_gateway::{
    EncryptionGateway, FieldEncryption, FieldSealer, FieldSealerProvider, KeyDistributionChannel,
};
pub use grace_period_sweeper::{GracePeriodSweeper, SweepReport};
pub use groups_config::{GroupSettings, GroupsConfig};
pub use in_memory_repositories::{InMemoryBindingRepository, InMemoryGracePeriodRepository};
pub use platform_ports::{GuildDirectory, GuildMember, GuildRole, OwnershipOracle, RoleAssignments};
pub use role_reconciler::{PolicyOutcome, PolicyReport, RoleReconciler, TickReport};
pub use shutdown::{ShutdownSignal, ShutdownTrigger, shutdown_channel};
