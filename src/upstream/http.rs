//! JSON-over-HTTP upstream client.
//!
//! Two POST endpoints are used: the explorer endpoint serves blocks by
//! height and the recent-activity feed, the info endpoint serves validators,
//! vaults, market metadata, mid prices and trades. Every request body is a
//! JSON object with a `type` discriminator.
//!
//! Decoding is lenient: a record missing a required field is skipped with a
//! debug log and its siblings are still returned.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::{Value, json};

use super::{
    ActivityRecord, ActivitySource, BlockFetch, BlockWithTxs, HeightSource, MarketDescriptor,
};
use crate::domain::{
    Block, Clock, Payload, Trade, TradeSide, Transaction, Transfer, Validator, ValidatorStatus,
    Vault,
};
use crate::error::ExplorerError;

/// Action tags that move funds between addresses.
const TRANSFER_ACTIONS: &[&str] = &["usdSend", "spotSend", "usdClassTransfer", "vaultTransfer"];

/// Phrases the explorer uses for heights it no longer serves.
const ARCHIVED_MARKERS: &[&str] = &["archived", "pruned", "too old"];

/// HTTP implementation of [`HeightSource`] and [`ActivitySource`].
#[derive(Debug, Clone)]
pub struct HttpUpstream {
    client: reqwest::Client,
    explorer_url: String,
    info_url: String,
    timeout: Duration,
    clock: Arc<dyn Clock>,
}

impl HttpUpstream {
    /// Builds a client with a per-request timeout.
    ///
    /// # Errors
    ///
    /// Returns [`ExplorerError::Internal`] if the HTTP client cannot be
    /// constructed (TLS backend initialization).
    pub fn new(
        explorer_url: impl Into<String>,
        info_url: impl Into<String>,
        timeout: Duration,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, ExplorerError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ExplorerError::Internal(format!("http client: {e}")))?;
        Ok(Self {
            client,
            explorer_url: explorer_url.into(),
            info_url: info_url.into(),
            timeout,
            clock,
        })
    }

    fn transport_error(&self, e: &reqwest::Error) -> ExplorerError {
        if e.is_timeout() {
            ExplorerError::UpstreamTimeout {
                timeout_ms: u64::try_from(self.timeout.as_millis()).unwrap_or(u64::MAX),
            }
        } else {
            ExplorerError::Upstream(e.to_string())
        }
    }

    /// POSTs `body` and returns the status with the raw response text.
    async fn call(&self, url: &str, body: &Value) -> Result<(StatusCode, String), ExplorerError> {
        let response = self
            .client
            .post(url)
            .json(body)
            .send()
            .await
            .map_err(|e| self.transport_error(&e))?;
        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(ExplorerError::RateLimited);
        }
        let text = response
            .text()
            .await
            .map_err(|e| self.transport_error(&e))?;
        Ok((status, text))
    }

    /// POSTs `body` and decodes a successful JSON response.
    async fn call_json(&self, url: &str, body: &Value) -> Result<Value, ExplorerError> {
        let (status, text) = self.call(url, body).await?;
        if !status.is_success() {
            return Err(ExplorerError::Upstream(format!(
                "HTTP {status}: {}",
                snippet(&text)
            )));
        }
        decode(&text)
    }
}

#[async_trait]
impl HeightSource for HttpUpstream {
    async fn fetch_block(&self, height: u64) -> Result<BlockFetch, ExplorerError> {
        let body = json!({ "type": "blockDetails", "height": height });
        let (status, text) = self.call(&self.explorer_url, &body).await?;
        if status.is_success()
            && let Ok(value) = decode(&text)
            && let found @ BlockFetch::Found(_) = parse_block_details(&value)
        {
            return Ok(found);
        }
        if is_archived_message(&text) {
            return Ok(BlockFetch::Archived);
        }
        if status.is_success() || status == StatusCode::NOT_FOUND {
            return Ok(BlockFetch::Unavailable);
        }
        Err(ExplorerError::Upstream(format!(
            "HTTP {status}: {}",
            snippet(&text)
        )))
    }
}

#[async_trait]
impl ActivitySource for HttpUpstream {
    async fn fetch_recent_activity(&self) -> Result<Vec<ActivityRecord>, ExplorerError> {
        let value = self
            .call_json(&self.explorer_url, &json!({ "type": "recentTxs" }))
            .await?;
        Ok(parse_recent_activity(&value))
    }

    async fn fetch_validators(&self) -> Result<Vec<Validator>, ExplorerError> {
        let value = self
            .call_json(&self.info_url, &json!({ "type": "validatorSummaries" }))
            .await?;
        Ok(parse_validators(&value, self.clock.now_secs()))
    }

    async fn fetch_vaults(&self) -> Result<Vec<Vault>, ExplorerError> {
        let value = self
            .call_json(&self.info_url, &json!({ "type": "vaultSummaries" }))
            .await?;
        Ok(parse_vaults(&value, self.clock.now_secs()))
    }

    async fn fetch_transfers(&self) -> Result<Vec<Transfer>, ExplorerError> {
        let value = self
            .call_json(&self.explorer_url, &json!({ "type": "recentTxs" }))
            .await?;
        Ok(parse_transfers(&value))
    }

    async fn fetch_market_meta(&self) -> Result<Vec<MarketDescriptor>, ExplorerError> {
        let value = self
            .call_json(&self.info_url, &json!({ "type": "metaAndAssetCtxs" }))
            .await?;
        Ok(parse_market_meta(&value))
    }

    async fn fetch_mid_prices(&self) -> Result<HashMap<String, f64>, ExplorerError> {
        let value = self
            .call_json(&self.info_url, &json!({ "type": "allMids" }))
            .await?;
        Ok(parse_mid_prices(&value))
    }

    async fn fetch_recent_trades(&self, symbol: &str) -> Result<Vec<Trade>, ExplorerError> {
        let value = self
            .call_json(&self.info_url, &json!({ "type": "recentTrades", "coin": symbol }))
            .await?;
        Ok(parse_trades(&value))
    }
}

// -------------------------------------------------------------------------
// Wire decoding
// -------------------------------------------------------------------------

fn decode(text: &str) -> Result<Value, ExplorerError> {
    serde_json::from_str(text)
        .map_err(|e| ExplorerError::Upstream(format!("invalid JSON: {e}: {}", snippet(text))))
}

fn snippet(text: &str) -> &str {
    let end = text
        .char_indices()
        .nth(200)
        .map_or(text.len(), |(idx, _)| idx);
    text.get(..end).unwrap_or(text)
}

fn is_archived_message(text: &str) -> bool {
    let lower = text.to_ascii_lowercase();
    ARCHIVED_MARKERS.iter().any(|marker| lower.contains(marker))
}

/// Upstream numbers arrive either as JSON numbers or decimal strings.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Decimal {
    Number(f64),
    Text(String),
}

impl Decimal {
    fn value(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            Self::Text(s) => s.trim().parse().ok(),
        }
    }
}

fn number(value: Option<&Value>) -> Option<f64> {
    value
        .and_then(|v| Decimal::deserialize(v).ok())
        .and_then(|d| d.value())
}

fn string(value: Option<&Value>) -> String {
    value.and_then(Value::as_str).unwrap_or_default().to_string()
}

/// Lists may arrive bare or wrapped in an object under `key`.
fn list<'a>(value: &'a Value, key: &str) -> &'a [Value] {
    value
        .as_array()
        .or_else(|| value.get(key).and_then(Value::as_array))
        .map_or(&[][..], Vec::as_slice)
}

/// Raw explorer transaction: `{hash, block, time, user, action, error}`.
fn parse_raw_tx(raw: &Value) -> Option<ActivityRecord> {
    let hash = string(raw.get("hash"));
    if hash.is_empty() {
        tracing::debug!("skipping activity record without hash");
        return None;
    }
    let action = raw.get("action").cloned().unwrap_or(Value::Null);
    Some(ActivityRecord {
        hash,
        block_number: raw.get("block").and_then(Value::as_u64).unwrap_or_default(),
        timestamp: raw.get("time").and_then(Value::as_i64).unwrap_or_default(),
        user: string(raw.get("user")),
        action_type: string(action.get("type")),
        action_data: Payload::new(action),
        error: raw.get("error").and_then(Value::as_str).map(str::to_string),
    })
}

/// Decodes a `blockDetails` response. `null` or a missing body means the
/// height is not produced yet.
pub(crate) fn parse_block_details(value: &Value) -> BlockFetch {
    let details = value.get("blockDetails").unwrap_or(value);
    let Some(height) = details.get("height").and_then(Value::as_u64) else {
        return BlockFetch::Unavailable;
    };
    let hash = string(details.get("hash"));
    if hash.is_empty() {
        return BlockFetch::Unavailable;
    }
    let timestamp = details
        .get("blockTime")
        .or_else(|| details.get("time"))
        .and_then(Value::as_i64)
        .unwrap_or_default();

    let raw_txs = list(details, "txs");
    let transactions: Vec<Transaction> = raw_txs
        .iter()
        .filter_map(|raw| {
            parse_raw_tx(raw).map(|record| {
                let mut tx = record.into_transaction();
                tx.payload = Payload::new(raw.clone());
                tx
            })
        })
        .collect();

    let mut block = Block::new(height, hash, timestamp);
    block.proposer = string(details.get("proposer"));
    block.tx_count = details
        .get("numTxs")
        .and_then(Value::as_u64)
        .and_then(|n| u32::try_from(n).ok())
        .unwrap_or_else(|| u32::try_from(raw_txs.len()).unwrap_or(u32::MAX));
    let mut header = details.clone();
    if let Some(obj) = header.as_object_mut() {
        obj.remove("txs");
    }
    block.payload = Payload::new(header);

    BlockFetch::Found(Box::new(BlockWithTxs {
        block,
        transactions,
    }))
}

pub(crate) fn parse_recent_activity(value: &Value) -> Vec<ActivityRecord> {
    list(value, "txs").iter().filter_map(parse_raw_tx).collect()
}

pub(crate) fn parse_transfers(value: &Value) -> Vec<Transfer> {
    list(value, "txs")
        .iter()
        .filter_map(|raw| {
            let record = parse_raw_tx(raw)?;
            if !TRANSFER_ACTIONS.contains(&record.action_type.as_str()) {
                return None;
            }
            let action = record.action_data.as_value();
            let token = match action.get("token").and_then(Value::as_str) {
                Some(token) => token.to_string(),
                None => "USDC".to_string(),
            };
            let amount = match action.get("amount") {
                Some(Value::String(s)) => s.clone(),
                Some(Value::Number(n)) => n.to_string(),
                _ => String::new(),
            };
            let to = string(
                action
                    .get("destination")
                    .or_else(|| action.get("vaultAddress")),
            );
            Some(Transfer {
                id: 0,
                hash: record.hash,
                block_number: record.block_number,
                timestamp: record.timestamp,
                from: record.user,
                to,
                token,
                amount,
                payload: record.action_data,
            })
        })
        .collect()
}

pub(crate) fn parse_validators(value: &Value, now: i64) -> Vec<Validator> {
    list(value, "validators")
        .iter()
        .filter_map(|raw| {
            let address = string(raw.get("validator").or_else(|| raw.get("address")));
            if address.is_empty() {
                tracing::debug!("skipping validator without address");
                return None;
            }
            let jailed = raw.get("isJailed").and_then(Value::as_bool).unwrap_or(false);
            let active = raw.get("isActive").and_then(Value::as_bool).unwrap_or(false);
            let status = if jailed {
                ValidatorStatus::Jailed
            } else if active {
                ValidatorStatus::Active
            } else {
                ValidatorStatus::Inactive
            };
            let mut validator = Validator::new(address, status, now);
            validator.name = string(raw.get("name"));
            validator.voting_power = number(raw.get("stake")).unwrap_or_default();
            validator.uptime = number(raw.get("uptime")).unwrap_or_default();
            validator.payload = Payload::new(raw.clone());
            Some(validator)
        })
        .collect()
}

pub(crate) fn parse_vaults(value: &Value, now: i64) -> Vec<Vault> {
    list(value, "vaults")
        .iter()
        .filter_map(|raw| {
            let address = string(raw.get("vaultAddress").or_else(|| raw.get("address")));
            if address.is_empty() {
                tracing::debug!("skipping vault without address");
                return None;
            }
            let mut vault = Vault::new(address, string(raw.get("name")), now);
            vault.equity = number(raw.get("tvl").or_else(|| raw.get("equity"))).unwrap_or_default();
            vault.total_deposits = number(raw.get("totalDeposits")).unwrap_or_default();
            vault.total_withdrawals = number(raw.get("totalWithdrawals")).unwrap_or_default();
            vault.payload = Payload::new(raw.clone());
            Some(vault)
        })
        .collect()
}

/// Decodes `[ {universe: [{name}]}, [ctx, ...] ]`; contexts align with the
/// universe by position.
pub(crate) fn parse_market_meta(value: &Value) -> Vec<MarketDescriptor> {
    let mut parts = value.as_array().map(|a| a.iter()).into_iter().flatten();
    let (Some(meta), Some(ctxs)) = (parts.next(), parts.next()) else {
        return Vec::new();
    };
    let universe = list(meta, "universe");
    let contexts = ctxs.as_array().map_or(&[][..], Vec::as_slice);
    universe
        .iter()
        .zip(contexts)
        .filter_map(|(asset, ctx)| {
            let symbol = string(asset.get("name"));
            if symbol.is_empty() {
                return None;
            }
            Some(MarketDescriptor {
                symbol,
                volume_24h: number(ctx.get("dayNtlVlm")).unwrap_or_default(),
                prev_day_price: number(ctx.get("prevDayPx")).unwrap_or_default(),
            })
        })
        .collect()
}

pub(crate) fn parse_mid_prices(value: &Value) -> HashMap<String, f64> {
    value
        .as_object()
        .map(|mids| {
            mids.iter()
                .filter_map(|(symbol, px)| number(Some(px)).map(|p| (symbol.clone(), p)))
                .collect()
        })
        .unwrap_or_default()
}

pub(crate) fn parse_trades(value: &Value) -> Vec<Trade> {
    list(value, "trades")
        .iter()
        .filter_map(|raw| {
            let symbol = string(raw.get("coin"));
            let (Some(price), Some(size)) = (number(raw.get("px")), number(raw.get("sz"))) else {
                tracing::debug!(symbol, "skipping trade without price or size");
                return None;
            };
            if symbol.is_empty() {
                return None;
            }
            let side = match raw.get("side").and_then(Value::as_str) {
                Some("B" | "buy" | "Buy") => TradeSide::Buy,
                _ => TradeSide::Sell,
            };
            Some(Trade {
                id: 0,
                symbol,
                timestamp: raw.get("time").and_then(Value::as_i64).unwrap_or_default(),
                tx_hash: string(raw.get("hash")),
                price,
                size,
                side,
            })
        })
        .collect()
}
