use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

use crate::ledger::models::ContractCollection;

/// Top-level error type for the entire application
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Already exists: {0}")]
    AlreadyExists(String),

    #[error("Account error: {0}")]
    Account(#[from] AccountError),

    #[error("Contract error: {0}")]
    Contract(#[from] ContractError),

    #[error("Settlement error: {0}")]
    Settlement(#[from] SettlementError),

    #[error("Failed to parse date '{input}' (expected DD-MM-YYYY): {source}")]
    DateParse {
        input: String,
        #[source]
        source: chrono::ParseError,
    },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Account ledger errors
#[derive(Error, Debug)]
pub enum AccountError {
    #[error("Insufficient funds in account {account}: required {required}, available {available}")]
    InsufficientFunds {
        account: String,
        required: u64,
        available: u64,
    },

    #[error("Balance overflow on account {account}")]
    BalanceOverflow { account: String },
}

/// Contract lifecycle errors
#[derive(Error, Debug)]
pub enum ContractError {
    #[error("Contract {contract_id} not found in the {collection} contracts of {party}")]
    ContractNotFound {
        contract_id: u64,
        party: String,
        collection: ContractCollection,
    },

    #[error("Invalid contract terms: {0}")]
    InvalidTerms(String),
}

/// First hop of an invocation chain that failed
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailureOrigin {
    pub ledger: String,
    pub function: String,
    pub status: u16,
}

impl std::fmt::Display for FailureOrigin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{} ({})", self.ledger, self.function, self.status)
    }
}

/// Settlement chain errors
#[derive(Error, Debug)]
pub enum SettlementError {
    #[error("Invalid currency pair: {from} -> {to}")]
    InvalidCurrencyPair { from: String, to: String },

    #[error("Ledger '{ledger}' returned {status} for {function}: {message}")]
    RemoteInvocationFailure {
        ledger: String,
        function: String,
        status: u16,
        message: String,
        origin: FailureOrigin,
    },
}

impl AppError {
    pub fn contract_not_found(contract_id: u64, party: &str, collection: ContractCollection) -> Self {
        ContractError::ContractNotFound {
            contract_id,
            party: party.to_string(),
            collection,
        }
        .into()
    }

    /// Status code for this error, shared by the HTTP gateway and ledger invocation responses
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::AlreadyExists(_) => StatusCode::CONFLICT,
            AppError::Account(AccountError::InsufficientFunds { .. }) => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            AppError::Account(AccountError::BalanceOverflow { .. }) => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            AppError::Contract(ContractError::ContractNotFound { .. }) => StatusCode::NOT_FOUND,
            AppError::Contract(ContractError::InvalidTerms(_)) => StatusCode::BAD_REQUEST,
            AppError::Settlement(SettlementError::InvalidCurrencyPair { .. }) => {
                StatusCode::BAD_REQUEST
            }
            AppError::Settlement(SettlementError::RemoteInvocationFailure { .. }) => {
                StatusCode::BAD_GATEWAY
            }
            AppError::DateParse { .. } | AppError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::Serialization(_)
            | AppError::Storage(_)
            | AppError::Config(_)
            | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_code(&self) -> &'static str {
        match self {
            AppError::NotFound(_) => "NOT_FOUND",
            AppError::AlreadyExists(_) => "ALREADY_EXISTS",
            AppError::Account(AccountError::InsufficientFunds { .. }) => "INSUFFICIENT_FUNDS",
            AppError::Account(AccountError::BalanceOverflow { .. }) => "BALANCE_OVERFLOW",
            AppError::Contract(ContractError::ContractNotFound { .. }) => "CONTRACT_NOT_FOUND",
            AppError::Contract(ContractError::InvalidTerms(_)) => "INVALID_TERMS",
            AppError::Settlement(SettlementError::InvalidCurrencyPair { .. }) => {
                "INVALID_CURRENCY_PAIR"
            }
            AppError::Settlement(SettlementError::RemoteInvocationFailure { .. }) => {
                "REMOTE_INVOCATION_FAILURE"
            }
            AppError::DateParse { .. } => "DATE_PARSE_ERROR",
            AppError::InvalidInput(_) => "INVALID_INPUT",
            AppError::Unauthorized(_) => "UNAUTHORIZED",
            AppError::Serialization(_) => "SERIALIZATION_ERROR",
            AppError::Storage(_) => "STORAGE_ERROR",
            AppError::Config(_) => "CONFIG_ERROR",
            AppError::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

/// API error response structure
#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub error_code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let error_code = self.error_code();

        let details = match &self {
            AppError::Account(AccountError::InsufficientFunds {
                account,
                required,
                available,
            }) => Some(serde_json::json!({
                "account": account,
                "required": required,
                "available": available,
            })),
            AppError::Contract(ContractError::ContractNotFound {
                contract_id,
                party,
                collection,
            }) => Some(serde_json::json!({
                "contract_id": contract_id,
                "party": party,
                "collection": collection,
            })),
            AppError::Settlement(SettlementError::RemoteInvocationFailure {
                ledger,
                function,
                status,
                origin,
                ..
            }) => Some(serde_json::json!({
                "ledger": ledger,
                "function": function,
                "remote_status": status,
                "origin": origin,
            })),
            _ => None,
        };

        // Internal details stay in the logs
        let message = if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!("Internal error: {}", self);
            "An internal error occurred".to_string()
        } else {
            self.to_string()
        };

        let body = Json(ErrorResponse {
            error: message,
            error_code: error_code.to_string(),
            details,
        });

        (status, body).into_response()
    }
}

impl From<anyhow::Error> for AppError {
    fn from(error: anyhow::Error) -> Self {
        AppError::Internal(format!("Error converting: {:?}", error))
    }
}

impl From<rust_decimal::Error> for AppError {
    fn from(error: rust_decimal::Error) -> Self {
        AppError::InvalidInput(format!("Decimal conversion error: {:?}", error))
    }
}

/// Result type alias for the application
pub type AppResult<T> = Result<T, AppError>;
