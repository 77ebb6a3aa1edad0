use serde::{Deserialize, Serialize};

/// Health response payload.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}

/// Incoming payload of the bind page.
#[derive(Debug, Deserialize)]
pub struct BindRequestDto {
    pub identity_access_token: String,
    pub claimed_identity_id: String,
    pub claimed_wallet_address: String,
    pub signature: String,
    #[serde(default)]
    pub group_id: Option<String>,
}

/// Outcome of a bind request. Failures carry no detail.
#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct BindResultResponse {
    pub result: &'static str,
}

impl BindResultResponse {
    pub const OK: Self = Self { result: "ok" };
    pub const KO: Self = Self { result: "ko" };
}

pub const INTERACTION_PING: u8 = 1;
pub const INTERACTION_APPLICATION_COMMAND: u8 = 2;
pub const RESPONSE_PONG: u8 = 1;
pub const RESPONSE_CHANNEL_MESSAGE: u8 = 4;
pub const MESSAGE_FLAG_EPHEMERAL: u64 = 1 << 6;

/// Signed interaction delivered by the chat platform.
#[derive(Debug, Deserialize)]
pub struct InteractionRequest {
    #[serde(rename = "type")]
    pub kind: u8,
    #[serde(default)]
    pub guild_id: Option<String>,
    #[serde(default)]
    pub member: Option<InteractionMember>,
    #[serde(default)]
    pub data: Option<InteractionCommandData>,
}

#[derive(Debug, Deserialize)]
pub struct InteractionMember {
    pub user: InteractionUser,
}

#[derive(Debug, Deserialize)]
pub struct InteractionUser {
    pub id: String,
}

#[derive(Debug, Deserialize)]
pub struct InteractionCommandData {
    pub name: String,
}

/// Interaction callback body.
#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct InteractionResponse {
    #[serde(rename = "type")]
    pub kind: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<InteractionMessage>,
}

#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct InteractionMessage {
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub flags: Option<u64>,
}

impl InteractionResponse {
    pub fn pong() -> Self {
        Self {
            kind: RESPONSE_PONG,
            data: None,
        }
    }

    pub fn message(content: impl Into<String>, ephemeral: bool) -> Self {
        Self {
            kind: RESPONSE_CHANNEL_MESSAGE,
            data: Some(InteractionMessage {
                content: content.into(),
                flags: ephemeral.then_some(MESSAGE_FLAG_EPHEMERAL),
            }),
        }
    }
}
