use async_trait::async_trait;
use std::str::FromStr;

use crate::error::{AppError, AppResult};
use crate::ledger::context::TxContext;

/// A ledger program: dispatches named entry points against its own world state
///
/// Implemented once per ledger kind (bank, central, conversion, contract).
#[async_trait]
pub trait LedgerProgram: Send + Sync {
    /// Kind of program, for logs
    fn kind(&self) -> &'static str;

    /// Execute `function` with positional byte-string arguments
    async fn invoke(&self, ctx: &TxContext, function: &str, args: &[Vec<u8>]) -> AppResult<Vec<u8>>;
}

/// Positional argument reader for entry points
pub struct Args<'a> {
    function: &'a str,
    raw: &'a [Vec<u8>],
}

impl<'a> Args<'a> {
    pub fn new(function: &'a str, raw: &'a [Vec<u8>]) -> Self {
        Self { function, raw }
    }

    /// Require exactly `count` arguments
    pub fn arity(self, count: usize) -> AppResult<Self> {
        if self.raw.len() != count {
            return Err(AppError::InvalidInput(format!(
                "{} expects {} arguments, got {}",
                self.function,
                count,
                self.raw.len()
            )));
        }
        Ok(self)
    }

    pub fn str(&self, index: usize, name: &str) -> AppResult<&'a str> {
        let bytes = self.raw.get(index).ok_or_else(|| {
            AppError::InvalidInput(format!("{}: missing argument '{}'", self.function, name))
        })?;
        std::str::from_utf8(bytes).map_err(|_| {
            AppError::InvalidInput(format!("{}: argument '{}' is not UTF-8", self.function, name))
        })
    }

    pub fn parse<T: FromStr>(&self, index: usize, name: &str) -> AppResult<T> {
        let value = self.str(index, name)?;
        value.trim().parse::<T>().map_err(|_| {
            AppError::InvalidInput(format!(
                "{}: invalid value '{}' for '{}'",
                self.function, value, name
            ))
        })
    }

    /// Non-negative integer amount in the ledger's smallest unit
    pub fn amount(&self, index: usize, name: &str) -> AppResult<u64> {
        self.parse::<u64>(index, name)
    }
}

pub fn unknown_function(kind: &str, function: &str) -> AppError {
    AppError::InvalidInput(format!("Unknown function '{}' on {} ledger", function, kind))
}

/// Encode a JSON payload
pub fn json_payload<T: serde::Serialize>(value: &T) -> AppResult<Vec<u8>> {
    Ok(serde_json::to_vec(value)?)
}
