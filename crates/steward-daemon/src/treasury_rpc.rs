//! Production treasury gateway.
//!
//! Sends contract calls through a JSON-RPC signing node. The node holds
//! the manager key and signs on our behalf, so the daemon only encodes
//! the call: a four-byte selector derived from the method signature
//! followed by the ABI-padded wallet address and amount. The contract
//! address comes from the live DAO configuration, so a configuration
//! refresh retargets the gateway without a restart.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use steward_core::config::ConfigHandle;
use steward_core::treasury::{TreasuryError, TreasuryGateway, TreasuryVerb};
use tiny_keccak::{Hasher, Keccak};
use tracing::debug;

/// Treasury gateway backed by an EVM JSON-RPC signing node.
pub struct JsonRpcTreasury {
    http: reqwest::Client,
    rpc_url: String,
    from_address: String,
    config: Arc<ConfigHandle>,
    request_id: AtomicU64,
}

impl JsonRpcTreasury {
    /// Creates a gateway using the given shared HTTP client.
    #[must_use]
    pub fn new(
        http: reqwest::Client,
        rpc_url: String,
        from_address: String,
        config: Arc<ConfigHandle>,
    ) -> Self {
        Self {
            http,
            rpc_url,
            from_address,
            config,
            request_id: AtomicU64::new(1),
        }
    }

    async fn call(
        &self,
        method: &str,
        params: serde_json::Value,
    ) -> Result<serde_json::Value, TreasuryError> {
        let id = self.request_id.fetch_add(1, Ordering::Relaxed);
        let response = self
            .http
            .post(&self.rpc_url)
            .json(&json!({
                "jsonrpc": "2.0",
                "id": id,
                "method": method,
                "params": params,
            }))
            .send()
            .await
            .map_err(|error| TreasuryError::Transport(error.to_string()))?;

        let envelope: RpcEnvelope = response
            .json()
            .await
            .map_err(|error| TreasuryError::Decode(error.to_string()))?;

        if let Some(error) = envelope.error {
            return Err(TreasuryError::Rpc {
                message: error.message,
            });
        }
        envelope
            .result
            .ok_or_else(|| TreasuryError::Decode("RPC response carried no result".to_string()))
    }
}

#[async_trait]
impl TreasuryGateway for JsonRpcTreasury {
    async fn execute(
        &self,
        verb: TreasuryVerb,
        wallet: &str,
        amount: u128,
    ) -> Result<String, TreasuryError> {
        let contract = self.config.current().treasury_contract.clone();
        let data = encode_call(verb, wallet, amount)?;
        debug!(%verb, %wallet, amount, %contract, "sending treasury transaction");

        let result = self
            .call(
                "eth_sendTransaction",
                json!([{
                    "from": self.from_address,
                    "to": contract,
                    "data": data,
                }]),
            )
            .await?;

        result
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| TreasuryError::Decode("transaction hash is not a string".to_string()))
    }

    async fn block_height(&self) -> Result<u64, TreasuryError> {
        let result = self.call("eth_blockNumber", json!([])).await?;
        let hex = result
            .as_str()
            .ok_or_else(|| TreasuryError::Decode("block number is not a string".to_string()))?;
        parse_quantity(hex)
    }
}

#[derive(Debug, Deserialize)]
struct RpcEnvelope {
    result: Option<serde_json::Value>,
    error: Option<RpcError>,
}

#[derive(Debug, Deserialize)]
struct RpcError {
    message: String,
}

/// Encodes one transfer call as `0x`-prefixed ABI calldata.
///
/// The selector is derived at runtime from the canonical signature
/// `{method}(address,uint256)`.
fn encode_call(verb: TreasuryVerb, wallet: &str, amount: u128) -> Result<String, TreasuryError> {
    let address = decode_address(wallet)?;

    let mut calldata = Vec::with_capacity(4 + 32 + 32);
    calldata.extend_from_slice(&selector(verb));

    let mut word = [0_u8; 32];
    word[12..].copy_from_slice(&address);
    calldata.extend_from_slice(&word);

    let mut word = [0_u8; 32];
    word[16..].copy_from_slice(&amount.to_be_bytes());
    calldata.extend_from_slice(&word);

    Ok(format!("0x{}", hex::encode(calldata)))
}

fn selector(verb: TreasuryVerb) -> [u8; 4] {
    let signature = format!("{}(address,uint256)", verb.method());
    let mut hasher = Keccak::v256();
    hasher.update(signature.as_bytes());
    let mut digest = [0_u8; 32];
    hasher.finalize(&mut digest);
    [digest[0], digest[1], digest[2], digest[3]]
}

fn decode_address(wallet: &str) -> Result<[u8; 20], TreasuryError> {
    let stripped = wallet.strip_prefix("0x").unwrap_or(wallet);
    let bytes = hex::decode(stripped).map_err(|_| TreasuryError::InvalidAddress {
        address: wallet.to_string(),
    })?;
    <[u8; 20]>::try_from(bytes.as_slice()).map_err(|_| TreasuryError::InvalidAddress {
        address: wallet.to_string(),
    })
}

fn parse_quantity(hex: &str) -> Result<u64, TreasuryError> {
    let stripped = hex.strip_prefix("0x").unwrap_or(hex);
    u64::from_str_radix(stripped, 16)
        .map_err(|_| TreasuryError::Decode(format!("unparseable quantity {hex}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    const WALLET: &str = "0x00000000000000000000000000000000000000aa";

    #[test]
    fn selectors_differ_per_verb() {
        let assign = selector(TreasuryVerb::Assign);
        let reverse = selector(TreasuryVerb::Reverse);
        let release = selector(TreasuryVerb::Release);
        assert_ne!(assign, reverse);
        assert_ne!(assign, release);
        assert_ne!(reverse, release);
    }

    #[test]
    fn calldata_layout_is_selector_then_two_words() {
        let data = encode_call(TreasuryVerb::Assign, WALLET, 1_500).unwrap();
        // "0x" + 4-byte selector + two 32-byte words, hex-encoded.
        assert_eq!(data.len(), 2 + (4 + 32 + 32) * 2);
        // First word: zero-padded address. Second word: the amount.
        let words = &data[2 + 8..];
        assert_eq!(&words[..64], format!("{:064x}", 0xaa_u128));
        assert_eq!(&words[64..], format!("{:064x}", 1_500_u128));
    }

    #[test]
    fn rejects_malformed_addresses() {
        assert!(matches!(
            encode_call(TreasuryVerb::Assign, "not-an-address", 1),
            Err(TreasuryError::InvalidAddress { .. })
        ));
        assert!(matches!(
            encode_call(TreasuryVerb::Assign, "0xabcd", 1),
            Err(TreasuryError::InvalidAddress { .. })
        ));
    }

    #[test]
    fn parses_hex_quantities() {
        assert_eq!(parse_quantity("0x10").unwrap(), 16);
        assert_eq!(parse_quantity("ff").unwrap(), 255);
        assert!(parse_quantity("0xzz").is_err());
    }
}
