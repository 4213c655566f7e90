use async_trait::async_trait;
use base64::{engine::general_purpose, Engine as _};
use log::{debug, warn};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::time::Duration;

use crate::models::{
    Address, AssetId, AssetInfo, BlockNo, EraSummary, GenesisParameters, HydratedTx,
    ProtocolParameters, RewardAccount, Tip, Utxo,
};
use crate::provider::{
    AssetProvider, ChainHistoryProvider, HealthCheckResponse, NetworkInfoProvider, ProviderError,
    ProviderFailure, ProviderResult, RewardsProvider, TxSubmitProvider, UtxoProvider,
};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Provider backend speaking JSON over HTTP POST. Every endpoint lives
/// under `<base_url>/<service>/<method>`.
#[derive(Clone)]
pub struct HttpProvider {
    base_url: String,
    client: Client,
}

impl HttpProvider {
    pub fn new(base_url: &str) -> ProviderResult<Self> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| ProviderError::new(ProviderFailure::Unknown, e.to_string()))?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    async fn post<B, R>(&self, path: &str, body: &B) -> ProviderResult<R>
    where
        B: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let url = self.endpoint(path);
        debug!("POST {}", url);
        let response = self
            .client
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        let text = response.text().await.map_err(transport_error)?;
        if !status.is_success() {
            warn!("{} returned HTTP {}", path, status);
            return Err(error_from_body(status.as_u16(), &text));
        }
        // endpoints without a result reply with an empty body
        let text = if text.trim().is_empty() { "null" } else { text.as_str() };
        serde_json::from_str(text).map_err(|e| {
            ProviderError::new(
                ProviderFailure::InvalidResponse,
                format!("{}: failed to decode response: {}", path, e),
            )
        })
    }
}

fn transport_error(error: reqwest::Error) -> ProviderError {
    let reason = if error.is_decode() {
        ProviderFailure::InvalidResponse
    } else {
        ProviderFailure::ConnectionFailure
    };
    ProviderError::new(reason, error.to_string())
}

/// Error responses carry a serialized [`ProviderError`]; anything else is
/// classified by status code alone
fn error_from_body(status: u16, body: &str) -> ProviderError {
    serde_json::from_str::<ProviderError>(body).unwrap_or_else(|_| {
        ProviderError::new(
            ProviderFailure::from_status(status),
            format!("HTTP {}: {}", status, body.trim()),
        )
    })
}

#[derive(Serialize)]
struct AddressesRequest<'a> {
    addresses: &'a [Address],
    #[serde(skip_serializing_if = "Option::is_none")]
    since_block: Option<BlockNo>,
}

#[derive(Serialize)]
struct SubmitRequest<'a> {
    signed_transaction: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    context: Option<&'a serde_json::Value>,
}

#[derive(Deserialize)]
struct RewardsBalance {
    balance: u64,
}

#[async_trait]
impl NetworkInfoProvider for HttpProvider {
    async fn ledger_tip(&self) -> ProviderResult<Tip> {
        self.post("network-info/ledger-tip", &json!({})).await
    }

    async fn era_summaries(&self) -> ProviderResult<Vec<EraSummary>> {
        self.post("network-info/era-summaries", &json!({})).await
    }

    async fn protocol_parameters(&self) -> ProviderResult<ProtocolParameters> {
        self.post("network-info/protocol-parameters", &json!({})).await
    }

    async fn genesis_parameters(&self) -> ProviderResult<GenesisParameters> {
        self.post("network-info/genesis-parameters", &json!({})).await
    }

    async fn health_check(&self) -> ProviderResult<HealthCheckResponse> {
        self.post("network-info/health", &json!({})).await
    }
}

#[async_trait]
impl UtxoProvider for HttpProvider {
    async fn utxo_by_addresses(&self, addresses: &[Address]) -> ProviderResult<Vec<Utxo>> {
        let request = AddressesRequest {
            addresses,
            since_block: None,
        };
        self.post("utxo/utxo-by-addresses", &request).await
    }
}

#[async_trait]
impl ChainHistoryProvider for HttpProvider {
    async fn transactions_by_addresses(
        &self,
        addresses: &[Address],
        since_block: Option<BlockNo>,
    ) -> ProviderResult<Vec<HydratedTx>> {
        let request = AddressesRequest {
            addresses,
            since_block,
        };
        self.post("chain-history/txs/by-addresses", &request).await
    }
}

#[async_trait]
impl RewardsProvider for HttpProvider {
    async fn rewards_balance(&self, account: &RewardAccount) -> ProviderResult<u64> {
        let response: RewardsBalance = self
            .post("rewards/account-balance", &json!({ "reward_account": account }))
            .await?;
        Ok(response.balance)
    }
}

#[async_trait]
impl AssetProvider for HttpProvider {
    async fn asset_info(&self, asset_id: &AssetId) -> ProviderResult<AssetInfo> {
        self.post("asset/get-asset", &json!({ "asset_id": asset_id }))
            .await
    }
}

#[async_trait]
impl TxSubmitProvider for HttpProvider {
    async fn submit_tx(
        &self,
        wire_bytes: &[u8],
        context: Option<&serde_json::Value>,
    ) -> ProviderResult<()> {
        let request = SubmitRequest {
            signed_transaction: general_purpose::STANDARD.encode(wire_bytes),
            context,
        };
        self.post::<_, serde_json::Value>("tx-submit/submit", &request)
            .await
            .map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::TxSubmissionError;

    #[test]
    fn endpoints_join_without_double_slashes() {
        let provider = HttpProvider::new("http://localhost:8080/").unwrap();
        assert_eq!(provider.base_url(), "http://localhost:8080");
        assert_eq!(
            provider.endpoint("/utxo/utxo-by-addresses"),
            "http://localhost:8080/utxo/utxo-by-addresses"
        );
    }

    #[test]
    fn structured_error_bodies_keep_the_ledger_reason() {
        let body = r#"{"reason":"BadRequest","detail":"rejected","inner":{"type":"bad_inputs","inputs":[]}}"#;
        let error = error_from_body(400, body);
        assert_eq!(error.reason, ProviderFailure::BadRequest);
        assert_eq!(error.inner, Some(TxSubmissionError::BadInputs { inputs: vec![] }));
    }

    #[test]
    fn plain_error_bodies_fall_back_to_status() {
        let error = error_from_body(503, "maintenance\n");
        assert_eq!(error.reason, ProviderFailure::ServerUnavailable);
        assert_eq!(error.detail, "HTTP 503: maintenance");
        assert!(error.is_retryable());
    }

    #[test]
    fn submit_request_encodes_wire_bytes() {
        let request = SubmitRequest {
            signed_transaction: general_purpose::STANDARD.encode([0x84, 0xa4]),
            context: None,
        };
        let encoded = serde_json::to_value(&request).unwrap();
        assert_eq!(encoded, json!({ "signed_transaction": "hKQ=" }));
    }
}
