//! Network participants: validators and vaults.
//!
//! Both are field-merge entities: an update only overwrites the fields the
//! incoming record actually carries (non-zero numbers, non-empty strings,
//! non-null payloads).

use std::fmt;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::payload::Payload;
use super::time::Timestamped;

/// Validator lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ValidatorStatus {
    /// Participating in consensus.
    Active,
    /// Registered but not in the active set.
    Inactive,
    /// Removed from the active set for misbehavior or downtime.
    Jailed,
}

impl ValidatorStatus {
    /// Returns the status as a static string slice.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Inactive => "inactive",
            Self::Jailed => "jailed",
        }
    }
}

impl fmt::Display for ValidatorStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ValidatorStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "active" => Ok(Self::Active),
            "inactive" => Ok(Self::Inactive),
            "jailed" => Ok(Self::Jailed),
            other => Err(format!("unknown validator status: {other}")),
        }
    }
}

/// A validator keyed by address.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Validator {
    /// Surrogate id assigned by the store on first insert.
    #[serde(default)]
    pub id: u64,
    /// Validator address (natural key).
    pub address: String,
    /// Display name.
    #[serde(default)]
    pub name: String,
    /// Stake-weighted voting power.
    #[serde(default)]
    pub voting_power: f64,
    /// Current status; always taken from the latest observation.
    pub status: ValidatorStatus,
    /// Uptime percentage, 0-100.
    #[serde(default)]
    pub uptime: f64,
    /// Observation time in epoch seconds.
    #[serde(default)]
    pub timestamp: i64,
    /// Raw upstream JSON.
    #[serde(default)]
    #[schema(value_type = Object)]
    pub payload: Payload,
}

impl Validator {
    /// Creates a validator with zeroed metrics.
    #[must_use]
    pub fn new(address: impl Into<String>, status: ValidatorStatus, timestamp: i64) -> Self {
        Self {
            id: 0,
            address: address.into(),
            name: String::new(),
            voting_power: 0.0,
            status,
            uptime: 0.0,
            timestamp,
            payload: Payload::empty(),
        }
    }

    /// Merges `incoming` onto `self`; default-valued incoming fields are
    /// ignored. `id` and `address` never change.
    pub fn merge_from(&mut self, incoming: Self) {
        merge_string(&mut self.name, incoming.name);
        merge_f64(&mut self.voting_power, incoming.voting_power);
        self.status = incoming.status;
        merge_f64(&mut self.uptime, incoming.uptime);
        merge_i64(&mut self.timestamp, incoming.timestamp);
        merge_payload(&mut self.payload, incoming.payload);
    }
}

impl Timestamped for Validator {
    fn timestamp(&self) -> i64 {
        self.timestamp
    }
}

/// A vault keyed by address.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Vault {
    /// Surrogate id assigned by the store on first insert.
    #[serde(default)]
    pub id: u64,
    /// Vault address (natural key).
    pub address: String,
    /// Display name.
    #[serde(default)]
    pub name: String,
    /// Current equity (TVL).
    #[serde(default)]
    pub equity: f64,
    /// Lifetime deposits.
    #[serde(default)]
    pub total_deposits: f64,
    /// Lifetime withdrawals.
    #[serde(default)]
    pub total_withdrawals: f64,
    /// Observation time in epoch seconds.
    #[serde(default)]
    pub timestamp: i64,
    /// Raw upstream JSON.
    #[serde(default)]
    #[schema(value_type = Object)]
    pub payload: Payload,
}

impl Vault {
    /// Creates a vault with zeroed metrics.
    #[must_use]
    pub fn new(address: impl Into<String>, name: impl Into<String>, timestamp: i64) -> Self {
        Self {
            id: 0,
            address: address.into(),
            name: name.into(),
            equity: 0.0,
            total_deposits: 0.0,
            total_withdrawals: 0.0,
            timestamp,
            payload: Payload::empty(),
        }
    }

    /// Merges `incoming` onto `self`; default-valued incoming fields are
    /// ignored.
    pub fn merge_from(&mut self, incoming: Self) {
        merge_string(&mut self.name, incoming.name);
        merge_f64(&mut self.equity, incoming.equity);
        merge_f64(&mut self.total_deposits, incoming.total_deposits);
        merge_f64(&mut self.total_withdrawals, incoming.total_withdrawals);
        merge_i64(&mut self.timestamp, incoming.timestamp);
        merge_payload(&mut self.payload, incoming.payload);
    }
}

impl Timestamped for Vault {
    fn timestamp(&self) -> i64 {
        self.timestamp
    }
}

fn merge_string(current: &mut String, incoming: String) {
    if !incoming.is_empty() {
        *current = incoming;
    }
}

fn merge_f64(current: &mut f64, incoming: f64) {
    if incoming != 0.0 && incoming.is_finite() {
        *current = incoming;
    }
}

fn merge_i64(current: &mut i64, incoming: i64) {
    if incoming != 0 {
        *current = incoming;
    }
}

fn merge_payload(current: &mut Payload, incoming: Payload) {
    if !incoming.is_empty() {
        *current = incoming;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validator_merge_keeps_existing_metrics() {
        let mut existing = Validator::new("0xval", ValidatorStatus::Active, 100);
        existing.name = "alpha".to_string();
        existing.voting_power = 1_000.0;
        existing.uptime = 99.5;

        let incoming = Validator::new("0xval", ValidatorStatus::Jailed, 200);
        existing.merge_from(incoming);

        assert_eq!(existing.name, "alpha");
        assert!((existing.voting_power - 1_000.0).abs() < f64::EPSILON);
        assert!((existing.uptime - 99.5).abs() < f64::EPSILON);
        assert_eq!(existing.status, ValidatorStatus::Jailed);
        assert_eq!(existing.timestamp, 200);
    }

    #[test]
    fn vault_merge_overwrites_present_fields() {
        let mut existing = Vault::new("0xvault", "HLP", 100);
        existing.equity = 10.0;
        existing.total_deposits = 50.0;

        let mut incoming = Vault::new("0xvault", "", 0);
        incoming.equity = 12.0;
        existing.merge_from(incoming);

        assert_eq!(existing.name, "HLP");
        assert!((existing.equity - 12.0).abs() < f64::EPSILON);
        assert!((existing.total_deposits - 50.0).abs() < f64::EPSILON);
        assert_eq!(existing.timestamp, 100);
    }

    #[test]
    fn status_parses_case_insensitively() {
        assert_eq!("Jailed".parse::<ValidatorStatus>(), Ok(ValidatorStatus::Jailed));
        assert!("unknown".parse::<ValidatorStatus>().is_err());
    }
}
