use config::ConfigError;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::str::FromStr;

use crate::accounts::ProvisionPolicy;
use crate::contracts::DEFAULT_HASH_COST;
use crate::ledger::models::{ledger_name, CurrencyCode};
use crate::settlement::{
    CompensationPolicy, DEFAULT_CONVERSION_FEE, DEFAULT_INTERNATIONAL_FEE, DEFAULT_USD_INR_RATE,
};

const DEFAULT_BANK_LEDGERS: &str = "adfc:USD:strict,sbi:INR:auto";

/// One bank ledger: `name:CURRENCY[:strict|auto]`
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct BankConfig {
    pub name: String,
    pub currency: CurrencyCode,
    pub policy: ProvisionPolicy,
}

impl FromStr for BankConfig {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.trim().split(':').map(str::trim).collect();
        let (name, currency, policy) = match parts.as_slice() {
            [name, currency] => (*name, *currency, ProvisionPolicy::Strict),
            [name, currency, policy] => (
                *name,
                *currency,
                policy
                    .parse::<ProvisionPolicy>()
                    .map_err(|e| ConfigError::Message(format!("BANK_LEDGERS '{}': {}", s, e)))?,
            ),
            _ => {
                return Err(ConfigError::Message(format!(
                    "BANK_LEDGERS entry '{}' must be name:CURRENCY[:strict|auto]",
                    s
                )))
            }
        };

        if name.is_empty() {
            return Err(ConfigError::Message(format!("BANK_LEDGERS entry '{}' has no name", s)));
        }

        Ok(Self {
            name: ledger_name(name),
            currency: currency
                .parse::<CurrencyCode>()
                .map_err(|e| ConfigError::Message(format!("BANK_LEDGERS '{}': {}", s, e)))?,
            policy,
        })
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub bind_address: String,
    pub contract_ledger: String,
    pub conversion_ledger: String,
    pub banks: Vec<BankConfig>,
    pub usd_inr_rate: Decimal,
    pub conversion_fee_rate: Decimal,
    pub international_fee_rate: Decimal,
    pub compensation: CompensationPolicy,
    /// bcrypt cost for party secrets
    pub credential_hash_cost: u32,
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_parse<T>(key: &str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|e| ConfigError::Message(format!("{} '{}': {}", key, raw, e))),
        Err(_) => Ok(default),
    }
}

pub fn parse_banks(raw: &str) -> Result<Vec<BankConfig>, ConfigError> {
    let banks = raw
        .split(',')
        .filter(|entry| !entry.trim().is_empty())
        .map(BankConfig::from_str)
        .collect::<Result<Vec<_>, _>>()?;

    if banks.is_empty() {
        return Err(ConfigError::Message("BANK_LEDGERS lists no bank ledgers".to_string()));
    }
    Ok(banks)
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            bind_address: env_or("BIND_ADDRESS", "0.0.0.0:8080"),
            contract_ledger: ledger_name(&env_or("CONTRACT_LEDGER", "contract")),
            conversion_ledger: ledger_name(&env_or("CONVERSION_LEDGER", "forex")),
            banks: parse_banks(&env_or("BANK_LEDGERS", DEFAULT_BANK_LEDGERS))?,
            usd_inr_rate: env_parse("FOREX_USD_INR_RATE", DEFAULT_USD_INR_RATE)?,
            conversion_fee_rate: env_parse("FOREX_FEE_RATE", DEFAULT_CONVERSION_FEE)?,
            international_fee_rate: env_parse("INTERNATIONAL_FEE_RATE", DEFAULT_INTERNATIONAL_FEE)?,
            compensation: env_parse("SETTLEMENT_COMPENSATION", CompensationPolicy::default())?,
            credential_hash_cost: env_parse("CREDENTIAL_HASH_COST", DEFAULT_HASH_COST)?,
        })
    }

    /// Currencies with at least one bank ledger; each gets a central ledger
    pub fn currencies(&self) -> Vec<CurrencyCode> {
        let mut currencies: Vec<CurrencyCode> = self.banks.iter().map(|b| b.currency.clone()).collect();
        currencies.sort();
        currencies.dedup();
        currencies
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
            contract_ledger: "contract".to_string(),
            conversion_ledger: "forex".to_string(),
            banks: vec![
                BankConfig {
                    name: "adfc".to_string(),
                    currency: CurrencyCode::known("USD"),
                    policy: ProvisionPolicy::Strict,
                },
                BankConfig {
                    name: "sbi".to_string(),
                    currency: CurrencyCode::known("INR"),
                    policy: ProvisionPolicy::AutoProvision,
                },
            ],
            usd_inr_rate: DEFAULT_USD_INR_RATE,
            conversion_fee_rate: DEFAULT_CONVERSION_FEE,
            international_fee_rate: DEFAULT_INTERNATIONAL_FEE,
            compensation: CompensationPolicy::default(),
            credential_hash_cost: DEFAULT_HASH_COST,
        }
    }
}
