use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use crate::accounts::AccountLedger;
use crate::error::{AppError, AppResult, SettlementError};
use crate::ledger::context::{decode_amount, encode_args, TxContext};
use crate::ledger::models::{ledger_name, CurrencyCode};

/// What happens to the source debit when a downstream hop fails
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CompensationPolicy {
    /// Source stays debited; the stranded amount is logged for reconciliation
    #[default]
    LeaveDebited,
    /// Debit is reversed by a compensating local credit
    ReverseDebit,
}

impl FromStr for CompensationPolicy {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "leave-debited" | "leave_debited" | "none" => Ok(CompensationPolicy::LeaveDebited),
            "reverse-debit" | "reverse_debit" | "saga" => Ok(CompensationPolicy::ReverseDebit),
            other => Err(AppError::InvalidInput(format!(
                "Unknown compensation policy '{}'",
                other
            ))),
        }
    }
}

impl fmt::Display for CompensationPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CompensationPolicy::LeaveDebited => write!(f, "leave-debited"),
            CompensationPolicy::ReverseDebit => write!(f, "reverse-debit"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SettlementRoute {
    /// Same currency, destination account on this ledger
    Local,
    /// Same currency, destination on another bank ledger
    Domestic,
    /// Through the source and destination central ledgers and the conversion ledger
    CrossCurrency,
}

/// One payment out of an account on this ledger
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentRequest {
    pub from_currency: CurrencyCode,
    pub to_currency: CurrencyCode,
    pub amount: u64,
    pub from_account: String,
    pub to_ledger: String,
    pub to_account: String,
}

impl PaymentRequest {
    pub fn route(&self, local_ledger: &str) -> SettlementRoute {
        if self.from_currency != self.to_currency {
            SettlementRoute::CrossCurrency
        } else if ledger_name(&self.to_ledger) == ledger_name(local_ledger) {
            SettlementRoute::Local
        } else {
            SettlementRoute::Domestic
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SettlementReceipt {
    pub settlement_id: Uuid,
    pub route: SettlementRoute,
    pub from_ledger: String,
    pub from_account: String,
    pub to_ledger: String,
    pub to_account: String,
    pub amount_debited: u64,
    /// In the destination currency, after conversion and fees
    pub amount_delivered: u64,
    pub settled_at: DateTime<Utc>,
}

/// Settlement router for one bank ledger
///
/// Debits locally, then delivers along the route the request implies. There is
/// no shared commit across ledgers: each hop commits on its own.
#[derive(Debug, Clone)]
pub struct SettlementRouter {
    accounts: AccountLedger,
    compensation: CompensationPolicy,
}

impl SettlementRouter {
    pub fn new(accounts: AccountLedger, compensation: CompensationPolicy) -> Self {
        Self {
            accounts,
            compensation,
        }
    }

    #[instrument(
        skip(self, ctx, request),
        fields(ledger = %ctx.ledger(), tx_id = %ctx.tx_id(), from = %request.from_currency, to = %request.to_currency, amount = request.amount)
    )]
    pub async fn pay(&self, ctx: &TxContext, request: &PaymentRequest) -> AppResult<SettlementReceipt> {
        let route = request.route(ctx.ledger());
        let to_ledger = ledger_name(&request.to_ledger);

        self.accounts
            .debit(ctx, &request.from_account, request.amount)
            .await?;

        let delivered = match route {
            SettlementRoute::Local => {
                self.accounts
                    .credit(ctx, &request.to_account, request.amount)
                    .await
                    .map(|_| request.amount)
            }
            SettlementRoute::Domestic => {
                let amount_arg = request.amount.to_string();
                ctx.invoke(
                    &to_ledger,
                    "Credit",
                    encode_args([request.to_account.as_str(), amount_arg.as_str()]),
                )
                .await
                .map(|_| request.amount)
            }
            SettlementRoute::CrossCurrency => self.settle_abroad(ctx, request, &to_ledger).await,
        };

        let delivered = match delivered {
            Ok(amount) => amount,
            Err(err) => return Err(self.compensate(ctx, request, err).await),
        };

        let receipt = SettlementReceipt {
            settlement_id: Uuid::new_v4(),
            route,
            from_ledger: ctx.ledger().to_string(),
            from_account: request.from_account.clone(),
            to_ledger,
            to_account: request.to_account.clone(),
            amount_debited: request.amount,
            amount_delivered: delivered,
            settled_at: Utc::now(),
        };

        info!(
            "✅ Settlement {} ({:?}): {} {} from {} -> {} {} to {}/{}",
            receipt.settlement_id,
            route,
            receipt.amount_debited,
            request.from_currency,
            receipt.from_account,
            receipt.amount_delivered,
            request.to_currency,
            receipt.to_ledger,
            receipt.to_account
        );

        Ok(receipt)
    }

    async fn settle_abroad(&self, ctx: &TxContext, request: &PaymentRequest, to_ledger: &str) -> AppResult<u64> {
        let amount_arg = request.amount.to_string();
        let payload = ctx
            .invoke(
                &request.from_currency.central_ledger(),
                "SettleAbroad",
                encode_args([
                    request.from_currency.as_str(),
                    request.to_currency.as_str(),
                    amount_arg.as_str(),
                    to_ledger,
                    request.to_account.as_str(),
                ]),
            )
            .await?;
        decode_amount(&payload)
    }

    /// Apply the compensation policy after a downstream failure; returns the
    /// underlying error
    async fn compensate(&self, ctx: &TxContext, request: &PaymentRequest, err: AppError) -> AppError {
        match self.compensation {
            CompensationPolicy::LeaveDebited => {
                error!(
                    origin = %failure_origin(&err),
                    "🚨 RECONCILIATION REQUIRED: {} {} debited from {} on {} but not delivered to {}/{}: {}",
                    request.amount,
                    request.from_currency,
                    request.from_account,
                    ctx.ledger(),
                    request.to_ledger,
                    request.to_account,
                    err
                );
            }
            CompensationPolicy::ReverseDebit => {
                match self
                    .accounts
                    .credit(ctx, &request.from_account, request.amount)
                    .await
                {
                    Ok(_) => warn!(
                        "🔄 Reversed debit of {} on {} after failed settlement: {}",
                        request.amount, request.from_account, err
                    ),
                    Err(reversal_err) => error!(
                        origin = %failure_origin(&err),
                        "🚨 RECONCILIATION REQUIRED: reversal of {} on {} failed ({}) after settlement error: {}",
                        request.amount, request.from_account, reversal_err, err
                    ),
                }
            }
        }
        err
    }
}

/// Ledger hop that failed first, for reconciliation logs
fn failure_origin(err: &AppError) -> String {
    match err {
        AppError::Settlement(SettlementError::RemoteInvocationFailure { origin, .. }) => origin.to_string(),
        _ => "local".to_string(),
    }
}
