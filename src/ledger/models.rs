use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use crate::error::{AppError, AppResult};

/// Calendar date format used by every stored and supplied date (day resolution)
pub const DATE_FORMAT: &str = "%d-%m-%Y";

/// Key holding the contract sequence counter
pub const CONTRACT_COUNTER_KEY: &str = "contractNo";

pub fn account_key(account_no: &str) -> String {
    format!("account:{}", account_no)
}

pub fn party_key(party_id: &str) -> String {
    format!("party:{}", party_id)
}

pub fn contract_key(contract_id: u64) -> String {
    format!("contract:{}", contract_id)
}

pub fn parse_date(input: &str) -> AppResult<NaiveDate> {
    NaiveDate::parse_from_str(input.trim(), DATE_FORMAT).map_err(|source| AppError::DateParse {
        input: input.to_string(),
        source,
    })
}

pub fn format_date(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

/// Currency / central bank identifier, e.g. "USD"
///
/// Always upper-case. The central ledger settling a currency is registered
/// under the lower-cased code.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CurrencyCode(String);

impl CurrencyCode {
    pub fn new(code: &str) -> AppResult<Self> {
        let code = code.trim();
        if code.is_empty() || !code.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(AppError::InvalidInput(format!(
                "Invalid currency code '{}'",
                code
            )));
        }
        Ok(Self(code.to_ascii_uppercase()))
    }

    /// Built-in codes known to be well-formed
    pub(crate) fn known(code: &'static str) -> Self {
        Self(code.to_ascii_uppercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Name of the central ledger that settles this currency
    pub fn central_ledger(&self) -> String {
        self.0.to_ascii_lowercase()
    }
}

impl fmt::Display for CurrencyCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for CurrencyCode {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for CurrencyCode {
    type Error = AppError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(&value)
    }
}

impl From<CurrencyCode> for String {
    fn from(code: CurrencyCode) -> Self {
        code.0
    }
}

/// Ledger names are the lower-cased bank / currency identifiers
pub fn ledger_name(identifier: &str) -> String {
    identifier.trim().to_ascii_lowercase()
}

/// Account balance record, one per account number on a bank ledger
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountRecord {
    pub account_no: String,
    /// Central bank (currency ledger) the account belongs to
    #[serde(default)]
    pub ledger_id: String,
    pub balance: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner: Option<String>,
}

impl AccountRecord {
    pub fn has_available(&self, required: u64) -> bool {
        self.balance >= required
    }
}

/// Lifecycle stage of a contract
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContractStage {
    Requested,
    PendingApproval,
    Active,
    Terminated,
    Withdrawn,
}

/// The three per-party contract collections
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContractCollection {
    Requested,
    PendingApproval,
    Active,
}

impl ContractCollection {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContractCollection::Requested => "requested",
            ContractCollection::PendingApproval => "pending",
            ContractCollection::Active => "active",
        }
    }

    pub fn stage(&self) -> ContractStage {
        match self {
            ContractCollection::Requested => ContractStage::Requested,
            ContractCollection::PendingApproval => ContractStage::PendingApproval,
            ContractCollection::Active => ContractStage::Active,
        }
    }
}

impl fmt::Display for ContractCollection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for ContractCollection {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "requested" | "requests" => Ok(ContractCollection::Requested),
            "pending" | "pending_approval" => Ok(ContractCollection::PendingApproval),
            "active" | "contracts" => Ok(ContractCollection::Active),
            other => Err(AppError::InvalidInput(format!(
                "Unknown contract collection '{}'",
                other
            ))),
        }
    }
}

/// Party profile stored on the contract ledger
///
/// The three collections hold contract ids only; the contract itself is
/// stored once under its own key and shared by both parties.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartyProfile {
    pub party_id: String,
    pub name: String,
    pub credential_hash: String,
    /// Bank ledger holding the party's account
    pub bank: String,
    pub account_no: String,
    /// Currency system (central bank) of the party's account
    pub currency: CurrencyCode,
    #[serde(default)]
    pub company: String,
    #[serde(default)]
    pub requested: BTreeSet<u64>,
    #[serde(default)]
    pub pending_approval: BTreeSet<u64>,
    #[serde(default)]
    pub active: BTreeSet<u64>,
}

impl PartyProfile {
    pub fn collection(&self, collection: ContractCollection) -> &BTreeSet<u64> {
        match collection {
            ContractCollection::Requested => &self.requested,
            ContractCollection::PendingApproval => &self.pending_approval,
            ContractCollection::Active => &self.active,
        }
    }

    pub fn collection_mut(&mut self, collection: ContractCollection) -> &mut BTreeSet<u64> {
        match collection {
            ContractCollection::Requested => &mut self.requested,
            ContractCollection::PendingApproval => &mut self.pending_approval,
            ContractCollection::Active => &mut self.active,
        }
    }

    pub fn holds(&self, collection: ContractCollection, contract_id: u64) -> bool {
        self.collection(collection).contains(&contract_id)
    }

    /// Collections currently referencing the contract
    pub fn collections_holding(&self, contract_id: u64) -> Vec<ContractCollection> {
        [
            ContractCollection::Requested,
            ContractCollection::PendingApproval,
            ContractCollection::Active,
        ]
        .into_iter()
        .filter(|c| self.holds(*c, contract_id))
        .collect()
    }
}

/// Recurring-payment contract between a manager (payer) and a contractor
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractRecord {
    pub contract_id: u64,
    pub manager: String,
    pub contractor: String,
    pub duration: u32,
    /// Interval length in days
    pub interval: u32,
    pub rate_per_interval: u64,
    pub rate_currency: CurrencyCode,
    pub nature_of_work: String,
    pub start_date: String,
    pub last_payment_date: String,
    pub manager_bank: String,
    pub manager_account_no: String,
    #[serde(default)]
    pub settlement_account: String,
    #[serde(default)]
    pub settlement_currency: Option<CurrencyCode>,
    #[serde(default)]
    pub contractor_bank: String,
    pub stage: ContractStage,
}

impl ContractRecord {
    pub fn involves(&self, manager: &str, contractor: &str) -> bool {
        self.manager == manager && self.contractor == contractor
    }
}
