//! Domain entities and invariants.

#![forbid(unsafe_code)]

mod binding;
mod grace_period;
mod identity;
mod policy;
mod reconciliation;

pub use binding::{Binding, BindingId, NewBinding};
pub use grace_period::GracePeriod;
pub use identity::{BIND_CHALLENGE, IdentityId, RoleId, WalletAddress};
pub use policy::{
    MAX_GRACE_PERIOD_SECONDS, OwnershipFacts, OwnershipPredicate, RolePolicy, RolePolicyInput,
};
pub use reconciliation::{MemberOwnership, MemberRoleState, MemberSnapshot};
