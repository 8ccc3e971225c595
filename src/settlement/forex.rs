use async_trait::async_trait;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::collections::HashMap;
use tracing::{debug, instrument};

use crate::error::{AppError, AppResult, SettlementError};
use crate::ledger::context::TxContext;
use crate::ledger::models::CurrencyCode;
use crate::ledger::program::{unknown_function, Args, LedgerProgram};

/// Default USD -> INR rate
pub const DEFAULT_USD_INR_RATE: Decimal = dec!(83);

/// Default conversion fee (1%)
pub const DEFAULT_CONVERSION_FEE: Decimal = dec!(0.01);

/// Remove `fee_rate` from `amount` and truncate to whole units
pub fn deduct_fee(amount: Decimal, fee_rate: Decimal) -> AppResult<u64> {
    let net = amount
        .checked_mul(Decimal::ONE - fee_rate)
        .ok_or_else(|| AppError::InvalidInput(format!("Amount {} is too large to convert", amount)))?;

    net.trunc()
        .to_u64()
        .ok_or_else(|| AppError::InvalidInput(format!("Amount {} is not a valid ledger amount", net)))
}

/// Bilateral conversion table
///
/// Each pair is stored once with its base rate; the reverse direction divides
/// by the same rate so round trips stay exact.
#[derive(Debug, Clone)]
pub struct RateTable {
    rates: HashMap<(CurrencyCode, CurrencyCode), Decimal>,
    fee_rate: Decimal,
}

impl RateTable {
    pub fn new(fee_rate: Decimal) -> Self {
        Self {
            rates: HashMap::new(),
            fee_rate,
        }
    }

    /// 1 `base` = `rate` `quote`
    pub fn with_pair(mut self, base: CurrencyCode, quote: CurrencyCode, rate: Decimal) -> Self {
        self.rates.insert((base, quote), rate);
        self
    }

    pub fn usd_inr(rate: Decimal, fee_rate: Decimal) -> AppResult<Self> {
        if rate <= Decimal::ZERO {
            return Err(AppError::Config(format!("USD/INR rate must be positive, got {}", rate)));
        }
        if fee_rate < Decimal::ZERO || fee_rate >= Decimal::ONE {
            return Err(AppError::Config(format!("Conversion fee must be in [0, 1), got {}", fee_rate)));
        }
        Ok(Self::new(fee_rate).with_pair(CurrencyCode::known("USD"), CurrencyCode::known("INR"), rate))
    }

    /// Gross amount of `to` for `amount` of `from`, before fees
    fn gross(&self, from: &CurrencyCode, to: &CurrencyCode, amount: Decimal) -> AppResult<Decimal> {
        let overflow = || AppError::InvalidInput(format!("Amount {} is too large to convert", amount));

        if let Some(rate) = self.rates.get(&(from.clone(), to.clone())) {
            return amount.checked_mul(*rate).ok_or_else(overflow);
        }
        if let Some(rate) = self.rates.get(&(to.clone(), from.clone())) {
            return amount.checked_div(*rate).ok_or_else(overflow);
        }

        Err(SettlementError::InvalidCurrencyPair {
            from: from.to_string(),
            to: to.to_string(),
        }
        .into())
    }

    /// Convert `amount` of `from` into `to`, minus the conversion fee, truncated
    pub fn convert(&self, from: &CurrencyCode, to: &CurrencyCode, amount: u64) -> AppResult<u64> {
        let gross = self.gross(from, to, Decimal::from(amount))?;
        deduct_fee(gross, self.fee_rate)
    }
}

impl Default for RateTable {
    fn default() -> Self {
        Self::new(DEFAULT_CONVERSION_FEE).with_pair(
            CurrencyCode::known("USD"),
            CurrencyCode::known("INR"),
            DEFAULT_USD_INR_RATE,
        )
    }
}

/// Conversion ledger program. Stateless; entry point `Convert`.
pub struct ConversionLedger {
    table: RateTable,
}

impl ConversionLedger {
    pub fn new(table: RateTable) -> Self {
        Self { table }
    }
}

#[async_trait]
impl LedgerProgram for ConversionLedger {
    fn kind(&self) -> &'static str {
        "conversion"
    }

    #[instrument(skip(self, ctx, args), fields(ledger = %ctx.ledger()))]
    async fn invoke(&self, ctx: &TxContext, function: &str, args: &[Vec<u8>]) -> AppResult<Vec<u8>> {
        match function {
            "Convert" => {
                let args = Args::new(function, args).arity(3)?;
                let from: CurrencyCode = args.parse(0, "currencyFrom")?;
                let to: CurrencyCode = args.parse(1, "currencyTo")?;
                let amount = args.amount(2, "amount")?;

                let converted = self.table.convert(&from, &to, amount)?;
                debug!("Converted {} {} -> {} {}", amount, from, converted, to);
                Ok(converted.to_string().into_bytes())
            }
            other => Err(unknown_function(self.kind(), other)),
        }
    }
}
