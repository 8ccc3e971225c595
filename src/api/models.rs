use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::contracts::{ContractTerms, NewParty};
use crate::ledger::models::{CurrencyCode, PartyProfile};
use crate::settlement::PaymentRequest;

// ========== REQUEST MODELS ==========

/// POST /parties
#[derive(Debug, Deserialize, Validate)]
pub struct RegisterPartyRequest {
    #[validate(length(min = 1, max = 64, message = "party_id must be 1-64 characters"))]
    pub party_id: String,
    #[validate(length(min = 1, message = "name is required"))]
    pub name: String,
    #[validate(length(min = 6, message = "secret must be at least 6 characters"))]
    pub secret: String,
    #[validate(length(min = 1, message = "bank is required"))]
    pub bank: String,
    #[validate(length(min = 1, message = "account_no is required"))]
    pub account_no: String,
    pub currency: CurrencyCode,
    #[serde(default)]
    pub company: String,
}

impl From<RegisterPartyRequest> for NewParty {
    fn from(request: RegisterPartyRequest) -> Self {
        Self {
            party_id: request.party_id,
            name: request.name,
            secret: request.secret,
            bank: request.bank,
            account_no: request.account_no,
            currency: request.currency,
            company: request.company,
        }
    }
}

/// POST /login
#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(length(min = 1, message = "party_id is required"))]
    pub party_id: String,
    #[validate(length(min = 1, message = "secret is required"))]
    pub secret: String,
}

/// POST /contracts
#[derive(Debug, Deserialize, Validate)]
pub struct ProposeContractRequest {
    #[validate(length(min = 1, message = "manager is required"))]
    pub manager: String,
    #[validate(length(min = 1, message = "contractor is required"))]
    pub contractor: String,
    #[validate(range(min = 1, message = "duration must be at least 1"))]
    pub duration: u32,
    #[validate(range(min = 1, message = "interval must be at least 1 day"))]
    pub interval: u32,
    pub rate_per_interval: u64,
    #[validate(length(min = 1, message = "nature_of_work is required"))]
    pub nature_of_work: String,
    /// DD-MM-YYYY
    #[validate(length(equal = 10, message = "start_date must be DD-MM-YYYY"))]
    pub start_date: String,
}

impl ProposeContractRequest {
    pub fn terms(&self) -> ContractTerms {
        ContractTerms {
            duration: self.duration,
            interval: self.interval,
            rate_per_interval: self.rate_per_interval,
            nature_of_work: self.nature_of_work.clone(),
            start_date: self.start_date.clone(),
        }
    }
}

/// POST /contracts/:id/accept-contractor
#[derive(Debug, Deserialize, Validate)]
pub struct AcceptByContractorRequest {
    #[validate(length(min = 1, message = "contractor is required"))]
    pub contractor: String,
    #[validate(length(min = 1, message = "manager is required"))]
    pub manager: String,
    #[validate(length(min = 1, message = "settlement_account is required"))]
    pub settlement_account: String,
    pub settlement_currency: CurrencyCode,
}

/// Manager and contractor of a contract (accept-manager, revoke)
#[derive(Debug, Deserialize, Validate)]
pub struct ContractPartiesRequest {
    #[validate(length(min = 1, message = "manager is required"))]
    pub manager: String,
    #[validate(length(min = 1, message = "contractor is required"))]
    pub contractor: String,
}

/// Party withdrawing a contract from one of its collections
#[derive(Debug, Deserialize, Validate)]
pub struct WithdrawContractRequest {
    #[validate(length(min = 1, message = "party_id is required"))]
    pub party_id: String,
}

/// POST /contracts/:id/redemption
#[derive(Debug, Deserialize, Validate)]
pub struct RedemptionRequest {
    #[validate(length(min = 1, message = "manager is required"))]
    pub manager: String,
    #[validate(length(min = 1, message = "contractor is required"))]
    pub contractor: String,
    /// DD-MM-YYYY
    #[validate(length(equal = 10, message = "current_date must be DD-MM-YYYY"))]
    pub current_date: String,
}

/// POST /banks/:bank/accounts
#[derive(Debug, Deserialize, Validate)]
pub struct OpenAccountRequest {
    #[validate(length(min = 1, max = 64, message = "account_no must be 1-64 characters"))]
    pub account_no: String,
    /// Central bank the account belongs to; defaults to the bank's currency
    pub ledger_id: Option<CurrencyCode>,
    pub owner: Option<String>,
    #[serde(default)]
    pub initial_balance: u64,
}

/// POST /banks/:bank/pay
#[derive(Debug, Deserialize, Validate)]
pub struct PayRequest {
    pub from_currency: CurrencyCode,
    pub to_currency: CurrencyCode,
    #[validate(range(min = 1, message = "amount must be positive"))]
    pub amount: u64,
    #[validate(length(min = 1, message = "from_account is required"))]
    pub from_account: String,
    #[validate(length(min = 1, message = "to_ledger is required"))]
    pub to_ledger: String,
    #[validate(length(min = 1, message = "to_account is required"))]
    pub to_account: String,
}

impl From<PayRequest> for PaymentRequest {
    fn from(request: PayRequest) -> Self {
        Self {
            from_currency: request.from_currency,
            to_currency: request.to_currency,
            amount: request.amount,
            from_account: request.from_account,
            to_ledger: request.to_ledger,
            to_account: request.to_account,
        }
    }
}

// ========== RESPONSE MODELS ==========

/// Party profile without the credential hash
#[derive(Debug, Serialize, Deserialize)]
pub struct PartyResponse {
    pub party_id: String,
    pub name: String,
    pub bank: String,
    pub account_no: String,
    pub currency: CurrencyCode,
    pub company: String,
    pub requested: Vec<u64>,
    pub pending_approval: Vec<u64>,
    pub active: Vec<u64>,
}

impl From<PartyProfile> for PartyResponse {
    fn from(profile: PartyProfile) -> Self {
        Self {
            party_id: profile.party_id,
            name: profile.name,
            bank: profile.bank,
            account_no: profile.account_no,
            currency: profile.currency,
            company: profile.company,
            requested: profile.requested.into_iter().collect(),
            pending_approval: profile.pending_approval.into_iter().collect(),
            active: profile.active.into_iter().collect(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LoginResponse {
    pub message: String,
    pub party_id: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ContractNoResponse {
    pub next_contract_id: u64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: DateTime<Utc>,
    pub ledgers: Vec<String>,
}
