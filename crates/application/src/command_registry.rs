//! Slash command registration and dispatch.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::warn;

use rolewarden_core::{AppError, AppResult, GroupId};
use rolewarden_domain::IdentityId;

use crate::credential_store::CredentialStore;

/// Command metadata announced to the chat platform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandDefinition {
    /// Command name without the leading slash.
    pub name: String,
    /// Short help text.
    pub description: String,
}

/// One invocation of a command by a group member.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandInvocation {
    /// Invoked command name.
    pub name: String,
    /// Group the command was invoked in.
    pub group_id: GroupId,
    /// Member who invoked the command.
    pub invoker_id: IdentityId,
}

/// Reply shown to the invoking member.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandReply {
    /// Message text.
    pub content: String,
    /// Whether only the invoker sees the reply.
    pub ephemeral: bool,
}

impl CommandReply {
    /// Creates a reply visible only to the invoker.
    #[must_use]
    pub fn private(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            ephemeral: true,
        }
    }
}

/// Feature module answering one command.
#[async_trait]
pub trait CommandHandler: Send + Sync {
    /// Returns the command this handler answers.
    fn definition(&self) -> CommandDefinition;

    /// Handles one invocation.
    async fn handle(&self, invocation: &CommandInvocation) -> AppResult<CommandReply>;
}

/// Explicit registry of command handlers, passed to feature modules at
/// composition time.
#[derive(Clone, Default)]
pub struct CommandRegistry {
    handlers: Vec<Arc<dyn CommandHandler>>,
}

impl CommandRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a handler. Command names must be unique.
    pub fn register(&mut self, handler: Arc<dyn CommandHandler>) -> AppResult<()> {
        let name = handler.definition().name;
        if self.find(name.as_str()).is_some() {
            return Err(AppError::Conflict(format!(
                "command '/{name}' is already registered"
            )));
        }

        self.handlers.push(handler);
        Ok(())
    }

    /// Returns the definitions of every handler in registration order.
    #[must_use]
    pub fn definitions(&self) -> Vec<CommandDefinition> {
        self.handlers
            .iter()
            .map(|handler| handler.definition())
            .collect()
    }

    /// Routes an invocation to its handler.
    ///
    /// Handler errors are logged and turned into a user-visible reply.
    pub async fn dispatch(&self, invocation: &CommandInvocation) -> CommandReply {
        let Some(handler) = self.find(invocation.name.as_str()) else {
            return CommandReply::private(format!("Unknown command /{}.", invocation.name));
        };

        match handler.handle(invocation).await {
            Ok(reply) => reply,
            Err(error) => {
                warn!(
                    command = %invocation.name,
                    group_id = %invocation.group_id,
                    member_id = %invocation.invoker_id,
                    error = %error,
                    "command handler failed"
                );
                CommandReply::private(format!(
                    "Something went wrong while running /{}. Please try again later.",
                    invocation.name
                ))
            }
        }
    }

    fn find(&self, name: &str) -> Option<&Arc<dyn CommandHandler>> {
        self.handlers
            .iter()
            .find(|handler| handler.definition().name == name)
    }
}

/// `/bind`: links to the bind page.
pub struct BindLinkCommand {
    bind_page_url: String,
}

impl BindLinkCommand {
    /// Creates the command for a bind page URL.
    #[must_use]
    pub fn new(bind_page_url: impl Into<String>) -> Self {
        Self {
            bind_page_url: bind_page_url.into(),
        }
    }
}

#[async_trait]
impl CommandHandler for BindLinkCommand {
    fn definition(&self) -> CommandDefinition {
        CommandDefinition {
            name: "bind".to_owned(),
            description: "Bind your wallet to your account".to_owned(),
        }
    }

    async fn handle(&self, _invocation: &CommandInvocation) -> AppResult<CommandReply> {
        Ok(CommandReply::private(format!(
            "Click here to bind your wallet: {}",
            self.bind_page_url
        )))
    }
}

/// `/bounded`: lists the invoker's bound wallets.
pub struct BoundWalletsCommand {
    credential_store: CredentialStore,
}

impl BoundWalletsCommand {
    /// Creates the command over a credential store.
    #[must_use]
    pub fn new(credential_store: CredentialStore) -> Self {
        Self { credential_store }
    }
}

#[async_trait]
impl CommandHandler for BoundWalletsCommand {
    fn definition(&self) -> CommandDefinition {
        CommandDefinition {
            name: "bounded".to_owned(),
            description: "List the wallets bound to your account".to_owned(),
        }
    }

    async fn handle(&self, invocation: &CommandInvocation) -> AppResult<CommandReply> {
        let bindings = self
            .credential_store
            .find_bindings_by_identity(&invocation.group_id, &invocation.invoker_id)
            .await?;

        if bindings.is_empty() {
            return Ok(CommandReply::private("No wallet bound yet."));
        }

        let wallets: Vec<&str> = bindings
            .iter()
            .map(|binding| binding.wallet_address.as_str())
            .collect();
        Ok(CommandReply::private(format!(
            "Currently bound wallet(s):\n```\n{}\n```",
            wallets.join("\n")
        )))
    }
}
