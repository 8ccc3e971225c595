use async_trait::async_trait;
use std::sync::Arc;
use uuid::Uuid;

use crate::error::{AppError, AppResult, FailureOrigin, SettlementError};
use crate::ledger::world_state::WorldState;

pub const STATUS_OK: u16 = 200;

/// Result of invoking another ledger: status, payload and message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvocationResponse {
    pub status: u16,
    pub payload: Vec<u8>,
    pub message: String,
    /// Innermost failing hop when the failure came back from a further hop
    pub origin: Option<FailureOrigin>,
}

impl InvocationResponse {
    pub fn success(payload: Vec<u8>) -> Self {
        Self {
            status: STATUS_OK,
            payload,
            message: String::new(),
            origin: None,
        }
    }

    pub fn failure(status: u16, message: impl Into<String>) -> Self {
        Self {
            status,
            payload: Vec::new(),
            message: message.into(),
            origin: None,
        }
    }

    pub fn from_error(error: &AppError) -> Self {
        let mut response = Self::failure(error.status_code().as_u16(), error.to_string());
        if let AppError::Settlement(SettlementError::RemoteInvocationFailure { origin, .. }) = error {
            response.origin = Some(origin.clone());
        }
        response
    }

    pub fn is_success(&self) -> bool {
        self.status == STATUS_OK
    }

    /// Payload on success, `RemoteInvocationFailure` otherwise
    pub fn into_result(self, ledger: &str, function: &str) -> AppResult<Vec<u8>> {
        if self.is_success() {
            return Ok(self.payload);
        }
        let origin = self.origin.unwrap_or_else(|| FailureOrigin {
            ledger: ledger.to_string(),
            function: function.to_string(),
            status: self.status,
        });
        Err(SettlementError::RemoteInvocationFailure {
            ledger: ledger.to_string(),
            function: function.to_string(),
            status: self.status,
            message: self.message,
            origin,
        }
        .into())
    }
}

/// Synchronous call into another, independently owned ledger
///
/// The callee runs with its own world state. There is no shared rollback:
/// whatever the callee committed stays committed even if the caller fails later.
#[async_trait]
pub trait LedgerInvoker: Send + Sync {
    async fn invoke(&self, ledger: &str, function: &str, args: Vec<Vec<u8>>) -> InvocationResponse;
}

/// Bindings handed to every ledger entry point
#[derive(Clone)]
pub struct TxContext {
    ledger: String,
    tx_id: Uuid,
    store: Arc<dyn WorldState>,
    invoker: Arc<dyn LedgerInvoker>,
}

impl TxContext {
    pub fn new(
        ledger: impl Into<String>,
        store: Arc<dyn WorldState>,
        invoker: Arc<dyn LedgerInvoker>,
    ) -> Self {
        Self {
            ledger: ledger.into(),
            tx_id: Uuid::new_v4(),
            store,
            invoker,
        }
    }

    /// Name of the ledger this transaction executes on
    pub fn ledger(&self) -> &str {
        &self.ledger
    }

    pub fn tx_id(&self) -> Uuid {
        self.tx_id
    }

    pub fn store(&self) -> &dyn WorldState {
        self.store.as_ref()
    }

    /// Invoke another ledger and surface a non-success status as
    /// `RemoteInvocationFailure`
    pub async fn invoke(&self, ledger: &str, function: &str, args: Vec<Vec<u8>>) -> AppResult<Vec<u8>> {
        self.invoker
            .invoke(ledger, function, args)
            .await
            .into_result(ledger, function)
    }
}

/// Encode arguments the way ledger entry points expect them: one UTF-8 byte
/// string per argument
pub fn encode_args<I, S>(args: I) -> Vec<Vec<u8>>
where
    I: IntoIterator<Item = S>,
    S: ToString,
{
    args.into_iter()
        .map(|arg| arg.to_string().into_bytes())
        .collect()
}

/// Decode an integer amount payload
pub fn decode_amount(payload: &[u8]) -> AppResult<u64> {
    std::str::from_utf8(payload)
        .ok()
        .and_then(|s| s.trim().parse::<u64>().ok())
        .ok_or_else(|| AppError::Internal("Ledger returned a non-integer amount".to_string()))
}
