//! Ownership oracle reached over HTTP.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use rolewarden_application::OwnershipOracle;
use rolewarden_core::{AppError, AppResult};
use rolewarden_domain::{OwnershipFacts, WalletAddress};

use crate::http_response::{ensure_success, transport_error};

/// Oracle adapter posting `{"wallets": [...]}` and reading back
/// `{"owned_count": n, "has_minted": bool}`.
#[derive(Clone)]
pub struct HttpOwnershipOracle {
    http_client: reqwest::Client,
    endpoint: String,
}

impl HttpOwnershipOracle {
    /// Creates an oracle client for an endpoint URL.
    #[must_use]
    pub fn new(http_client: reqwest::Client, endpoint: impl Into<String>) -> Self {
        Self {
            http_client,
            endpoint: endpoint.into(),
        }
    }
}

#[derive(Debug, Serialize)]
struct OwnershipQuery<'a> {
    wallets: Vec<&'a str>,
}

#[derive(Debug, Deserialize)]
struct OwnershipAnswer {
    owned_count: u64,
    #[serde(default)]
    has_minted: bool,
}

#[async_trait]
impl OwnershipOracle for HttpOwnershipOracle {
    async fn ownership_facts(&self, wallets: &[WalletAddress]) -> AppResult<OwnershipFacts> {
        if wallets.is_empty() {
            return Ok(OwnershipFacts::default());
        }

        let action = "ownership oracle query";
        let response = self
            .http_client
            .post(self.endpoint.as_str())
            .json(&OwnershipQuery {
                wallets: wallets.iter().map(WalletAddress::as_str).collect(),
            })
            .send()
            .await
            .map_err(|error| transport_error(action, error))?;

        let answer: OwnershipAnswer = ensure_success(response, action)
            .await?
            .json()
            .await
            .map_err(|error| {
                AppError::ExternalApi(format!("invalid ownership oracle payload: {error}"))
            })?;

        Ok(OwnershipFacts {
            owned_count: answer.owned_count,
            has_minted: answer.has_minted,
        })
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    fn wallet(byte: u8) -> WalletAddress {
        WalletAddress::from_bytes(&[byte; 20])
    }

    #[tokio::test]
    async fn posts_every_wallet_and_reads_facts() -> AppResult<()> {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/ownership"))
            .and(body_json(json!({ "wallets": [wallet(1).as_str(), wallet(2).as_str()] })))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({ "owned_count": 3, "has_minted": true })),
            )
            .expect(1)
            .mount(&server)
            .await;

        let oracle =
            HttpOwnershipOracle::new(reqwest::Client::new(), format!("{}/ownership", server.uri()));
        let facts = oracle.ownership_facts(&[wallet(1), wallet(2)]).await?;

        assert_eq!(
            facts,
            OwnershipFacts {
                owned_count: 3,
                has_minted: true
            }
        );
        Ok(())
    }

    #[tokio::test]
    async fn no_wallets_skips_the_call() -> AppResult<()> {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500))
            .expect(0)
            .mount(&server)
            .await;

        let oracle = HttpOwnershipOracle::new(reqwest::Client::new(), server.uri());
        assert_eq!(oracle.ownership_facts(&[]).await?, OwnershipFacts::default());
        Ok(())
    }

    #[tokio::test]
    async fn server_error_is_an_external_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let oracle = HttpOwnershipOracle::new(reqwest::Client::new(), server.uri());
        let result = oracle.ownership_facts(&[wallet(1)]).await;

        assert!(matches!(result, Err(AppError::ExternalApi(_))));
    }
}
