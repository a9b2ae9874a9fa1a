//! Wallet relay client
//!
//! Submits the signer list to a wallet relay that deploys the Safe on our
//! behalf. Requests carry Polymarket-style builder HMAC headers when
//! credentials are configured.

use super::counterfactual::SafeDeployment;
use super::{resolve_threshold, WalletProvisioner};
use crate::address::normalize;
use crate::config::RelayConfig;
use crate::errors::ProvisioningError;
use crate::types::WalletId;
use alloy::primitives::Address;
use anyhow::Result;
use base64::Engine;
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use std::time::Duration;
use tracing::{info, warn};

type HmacSha256 = Hmac<Sha256>;

const CREATE_PATH: &str = "/wallets";

pub struct BuilderCredentials {
    pub api_key: String,
    pub secret: String,
    pub passphrase: String,
}

impl BuilderCredentials {
    fn from_config(config: &RelayConfig) -> Option<Self> {
        match (&config.api_key, &config.secret, &config.passphrase) {
            (Some(api_key), Some(secret), Some(passphrase)) => Some(Self {
                api_key: api_key.clone(),
                secret: secret.clone(),
                passphrase: passphrase.clone(),
            }),
            _ => None,
        }
    }
}

/// Create builder auth headers for relay requests
fn create_builder_headers(
    creds: &BuilderCredentials,
    method: &str,
    path: &str,
    body: &str,
) -> Result<(String, String)> {
    let timestamp = chrono::Utc::now().timestamp_millis().to_string();
    let sig_payload = format!("{}{}{}{}", timestamp, method, path, body);

    let secret_bytes = base64::engine::general_purpose::STANDARD
        .decode(&creds.secret)
        .or_else(|_| base64::engine::general_purpose::URL_SAFE.decode(&creds.secret))
        .or_else(|_| base64::engine::general_purpose::URL_SAFE_NO_PAD.decode(&creds.secret))?;

    let mut mac = HmacSha256::new_from_slice(&secret_bytes)?;
    mac.update(sig_payload.as_bytes());
    let signature = base64::engine::general_purpose::URL_SAFE.encode(mac.finalize().into_bytes());

    Ok((timestamp, signature))
}

/// Wallet creation request body
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CreateWalletRequest<'a> {
    owners: &'a [String],
    threshold: usize,
    salt_nonce: String,
    chain_id: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    predicted_address: Option<String>,
}

/// Wallet creation response; relays name the identifier differently
#[derive(Debug, Deserialize)]
struct CreateWalletResponse {
    #[serde(default, rename = "walletId")]
    wallet_id: Option<String>,
    #[serde(default, rename = "proxyWallet")]
    proxy_wallet: Option<String>,
    #[serde(default, rename = "transactionID")]
    transaction_id: Option<String>,
}

impl CreateWalletResponse {
    fn into_wallet_id(self) -> Option<WalletId> {
        self.wallet_id
            .or(self.proxy_wallet)
            .or(self.transaction_id)
            .filter(|s| !s.is_empty())
            .map(WalletId::new)
    }
}

/// Provisioner that asks a remote relay to deploy the wallet
pub struct RelayProvisioner {
    client: reqwest::Client,
    base_url: String,
    credentials: Option<BuilderCredentials>,
    deployment: SafeDeployment,
}

impl RelayProvisioner {
    pub fn new(config: &RelayConfig, deployment: SafeDeployment) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()?;

        Ok(Self {
            client,
            base_url: config.url.trim_end_matches('/').to_string(),
            credentials: BuilderCredentials::from_config(config),
            deployment,
        })
    }

    fn build_request(&self, signers: &[String]) -> Result<serde_json::Value, ProvisioningError> {
        let owners = signers
            .iter()
            .map(|s| {
                s.parse::<Address>()
                    .map_err(|e| ProvisioningError::Rejected(format!("invalid signer {}: {}", s, e)))
            })
            .collect::<Result<Vec<_>, _>>()?;
        let threshold = resolve_threshold(self.deployment.threshold, owners.len())?;
        let predicted = self.deployment.predict_address(&owners, threshold);

        let body = CreateWalletRequest {
            owners: signers,
            threshold,
            salt_nonce: self.deployment.salt_nonce.to_string(),
            chain_id: self.deployment.chain_id,
            predicted_address: predicted.as_ref().map(normalize),
        };
        serde_json::to_value(&body).map_err(|e| ProvisioningError::Rejected(e.to_string()))
    }
}

impl WalletProvisioner for RelayProvisioner {
    async fn create_wallet(&self, signers: &[String]) -> Result<WalletId, ProvisioningError> {
        let body = self.build_request(signers)?;
        let body_str = body.to_string();
        let url = format!("{}{}", self.base_url, CREATE_PATH);

        let mut req = self
            .client
            .post(&url)
            .header("Content-Type", "application/json")
            .body(body_str.clone());

        if let Some(creds) = &self.credentials {
            let (timestamp, signature) = create_builder_headers(creds, "POST", CREATE_PATH, &body_str)
                .map_err(|_| ProvisioningError::Unauthorized)?;
            req = req
                .header("POLY_BUILDER_TIMESTAMP", &timestamp)
                .header("POLY_BUILDER_SIGNATURE", &signature)
                .header("POLY_BUILDER_API_KEY", &creds.api_key)
                .header("POLY_BUILDER_PASSPHRASE", &creds.passphrase);
        }

        info!("[Relay] Requesting Safe for {} signers", signers.len());

        let response = req
            .send()
            .await
            .map_err(|e| ProvisioningError::from_network_error(&e))?;
        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| ProvisioningError::from_network_error(&e))?;

        if !status.is_success() {
            let err = ProvisioningError::from_response(status.as_u16(), &text);
            warn!("[Relay] Wallet creation failed ({}): {}", status, err);
            return Err(err);
        }

        let parsed: CreateWalletResponse = serde_json::from_str(&text)
            .map_err(|e| ProvisioningError::MalformedResponse(e.to_string()))?;
        let wallet_id = parsed
            .into_wallet_id()
            .ok_or_else(|| ProvisioningError::MalformedResponse("no wallet identifier".to_string()))?;

        info!("[Relay] Wallet created: {}", wallet_id);
        Ok(wallet_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SafeConfig;
    use axum::{http::HeaderMap, http::StatusCode, routing::post, Json, Router};
    use std::sync::{Arc, Mutex};
    use tokio::net::TcpListener;

    type Seen = Arc<Mutex<Vec<(HeaderMap, serde_json::Value)>>>;

    const SIGNERS: [&str; 2] = [
        "0x5aAeb6053F3E94C9b9A09f33669435E7Ef1BeAed",
        "0xfB6916095ca1df60bB79Ce92cE3Ea74c37c5d359",
    ];

    fn signers() -> Vec<String> {
        SIGNERS.iter().map(|s| s.to_string()).collect()
    }

    /// Serve a fixed reply on /wallets and record requests
    async fn spawn_relay(status: StatusCode, reply: serde_json::Value) -> (String, Seen) {
        let seen: Seen = Arc::new(Mutex::new(Vec::new()));
        let seen_clone = seen.clone();
        let app = Router::new().route(
            "/wallets",
            post(move |headers: HeaderMap, Json(body): Json<serde_json::Value>| {
                let seen = seen_clone.clone();
                let reply = reply.clone();
                async move {
                    seen.lock().unwrap().push((headers, body));
                    (status, Json(reply))
                }
            }),
        );

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        (format!("http://{}", addr), seen)
    }

    fn without_factory() -> SafeDeployment {
        SafeDeployment::from_config(&SafeConfig::default()).unwrap()
    }

    fn with_factory() -> SafeDeployment {
        SafeDeployment::from_config(&SafeConfig {
            factory: Some("0xa6B71E26C5e0845f74c812102Ca7114b6a896AB2".to_string()),
            init_code_hash: Some(format!("0x{}", hex::encode([0x11u8; 32]))),
            ..SafeConfig::default()
        })
        .unwrap()
    }

    fn relay_config(url: String, with_creds: bool) -> RelayConfig {
        RelayConfig {
            url,
            timeout_seconds: 5,
            api_key: with_creds.then(|| "key".to_string()),
            secret: with_creds.then(|| "c2VjcmV0".to_string()),
            passphrase: with_creds.then(|| "pass".to_string()),
        }
    }

    #[test]
    fn test_builder_headers() {
        let creds = BuilderCredentials {
            api_key: "key".into(),
            secret: "c2VjcmV0".into(),
            passphrase: "pass".into(),
        };
        let (timestamp, signature) = create_builder_headers(&creds, "POST", "/wallets", "{}").unwrap();
        assert!(timestamp.parse::<i64>().is_ok());
        // 32-byte HMAC, url-safe base64 with padding
        assert_eq!(signature.len(), 44);
    }

    #[test]
    fn test_response_identifier_fallbacks() {
        let parsed: CreateWalletResponse =
            serde_json::from_str(r#"{"transactionID":"tx-9"}"#).unwrap();
        assert_eq!(parsed.into_wallet_id(), Some(WalletId::new("tx-9")));
        let parsed: CreateWalletResponse =
            serde_json::from_str(r#"{"walletId":"wallet-1","transactionID":"tx-9"}"#).unwrap();
        assert_eq!(parsed.into_wallet_id(), Some(WalletId::new("wallet-1")));
        let parsed: CreateWalletResponse = serde_json::from_str(r#"{"walletId":""}"#).unwrap();
        assert_eq!(parsed.into_wallet_id(), None);
    }

    #[tokio::test]
    async fn test_create_wallet_success() {
        let (url, seen) = spawn_relay(StatusCode::OK, serde_json::json!({"walletId": "wallet-123"})).await;
        let provisioner =
            RelayProvisioner::new(&relay_config(url, true), with_factory()).unwrap();

        let id = provisioner.create_wallet(&signers()).await.unwrap();
        assert_eq!(id.as_str(), "wallet-123");

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        let (headers, body) = &seen[0];
        assert_eq!(body["owners"], serde_json::json!(SIGNERS));
        assert_eq!(body["threshold"], 2);
        assert_eq!(body["chainId"], 137);
        assert!(body["predictedAddress"].as_str().unwrap().starts_with("0x"));
        assert_eq!(headers["POLY_BUILDER_API_KEY"], "key");
        assert!(headers.contains_key("POLY_BUILDER_SIGNATURE"));
    }

    #[tokio::test]
    async fn test_no_credentials_no_headers() {
        let (url, seen) = spawn_relay(StatusCode::OK, serde_json::json!({"proxyWallet": "0xabc"})).await;
        let provisioner =
            RelayProvisioner::new(&relay_config(url, false), without_factory()).unwrap();

        provisioner.create_wallet(&signers()).await.unwrap();
        let seen = seen.lock().unwrap();
        assert!(!seen[0].0.contains_key("POLY_BUILDER_SIGNATURE"));
        // No factory configured, so no address to cross-check
        assert!(seen[0].1.get("predictedAddress").is_none());
    }

    #[tokio::test]
    async fn test_relay_rejection_is_classified() {
        let (url, _) = spawn_relay(
            StatusCode::BAD_REQUEST,
            serde_json::json!({"error": "owner blocked"}),
        )
        .await;
        let provisioner =
            RelayProvisioner::new(&relay_config(url, false), without_factory()).unwrap();

        let err = provisioner.create_wallet(&signers()).await.unwrap_err();
        assert_eq!(err, ProvisioningError::Rejected("owner blocked".to_string()));
    }

    #[tokio::test]
    async fn test_missing_identifier_is_malformed() {
        let (url, _) = spawn_relay(StatusCode::OK, serde_json::json!({"ok": true})).await;
        let provisioner =
            RelayProvisioner::new(&relay_config(url, false), without_factory()).unwrap();

        let err = provisioner.create_wallet(&signers()).await.unwrap_err();
        assert!(matches!(err, ProvisioningError::MalformedResponse(_)));
    }

    #[tokio::test]
    async fn test_unreachable_relay_is_network_error() {
        // Bind then drop to get a port nothing listens on
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let provisioner = RelayProvisioner::new(
            &relay_config(format!("http://{}", addr), false),
            without_factory(),
        )
        .unwrap();

        let err = provisioner.create_wallet(&signers()).await.unwrap_err();
        assert!(matches!(err, ProvisioningError::Network(_)));
    }
}
