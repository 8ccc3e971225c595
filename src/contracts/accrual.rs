use chrono::{Days, NaiveDate};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};

use crate::contracts::lifecycle::{load_party, locate};
use crate::error::{AppError, AppResult, ContractError};
use crate::ledger::context::TxContext;
use crate::ledger::models::{contract_key, format_date, parse_date, ContractCollection};
use crate::ledger::world_state::put_record;

/// Outcome of one accrual run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Accrual {
    pub contract_id: u64,
    pub days_elapsed: i64,
    pub intervals_elapsed: u64,
    /// In the contract's rate currency
    pub amount: u64,
    pub previous_payment_date: String,
    pub last_payment_date: String,
}

/// Whole intervals between `last` and `current`, the amount they accrue and
/// the interval boundary the last-payment date moves to
///
/// A `current` before `last` accrues nothing and leaves the date in place.
pub fn compute_accrual(
    last: NaiveDate,
    current: NaiveDate,
    interval: u32,
    rate_per_interval: u64,
) -> AppResult<(u64, u64, NaiveDate)> {
    if interval == 0 {
        return Err(ContractError::InvalidTerms("Interval must be at least one day".to_string()).into());
    }

    let days_elapsed = (current - last).num_days();
    if days_elapsed <= 0 {
        return Ok((0, 0, last));
    }

    let days_elapsed = days_elapsed as u64;
    let interval = u64::from(interval);
    let intervals = days_elapsed / interval;
    let amount = intervals.checked_mul(rate_per_interval).ok_or_else(|| {
        ContractError::InvalidTerms(format!(
            "{} intervals at {} overflow the accrued amount",
            intervals, rate_per_interval
        ))
    })?;

    let advanced = last
        .checked_add_days(Days::new(days_elapsed - days_elapsed % interval))
        .ok_or_else(|| AppError::Internal(format!("Date overflow advancing {}", last)))?;

    Ok((intervals, amount, advanced))
}

/// Amount owed on an active contract since its last payment date
///
/// Only computes and advances the date; moving the funds is a separate
/// payment through the payer's bank ledger.
#[derive(Debug, Clone, Default)]
pub struct RedemptionCalculator;

impl RedemptionCalculator {
    pub fn new() -> Self {
        Self
    }

    #[instrument(skip(self, ctx))]
    pub async fn accrue(
        &self,
        ctx: &TxContext,
        contract_id: u64,
        manager: &str,
        contractor: &str,
        current_date: &str,
    ) -> AppResult<Accrual> {
        let collection = ContractCollection::Active;
        let manager_profile = load_party(ctx, manager).await?;
        let contractor_profile = load_party(ctx, contractor).await?;

        let mut record = locate(ctx, &manager_profile, contract_id, collection).await?;
        if !contractor_profile.holds(collection, contract_id) || !record.involves(manager, contractor) {
            return Err(AppError::contract_not_found(contract_id, contractor, collection));
        }

        let current = parse_date(current_date)?;
        let last = parse_date(&record.last_payment_date)?;
        let (intervals, amount, advanced) =
            compute_accrual(last, current, record.interval, record.rate_per_interval)?;

        let previous_payment_date = record.last_payment_date.clone();
        if advanced != last {
            record.last_payment_date = format_date(advanced);
            put_record(ctx.store(), &contract_key(contract_id), &record).await?;
            info!(
                "Contract {} accrued {} {} over {} intervals; paid through {}",
                contract_id, amount, record.rate_currency, intervals, record.last_payment_date
            );
        } else {
            debug!("Contract {} has no complete interval since {}", contract_id, previous_payment_date);
        }

        Ok(Accrual {
            contract_id,
            days_elapsed: (current - last).num_days(),
            intervals_elapsed: intervals,
            amount,
            previous_payment_date,
            last_payment_date: record.last_payment_date,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contracts::credentials::{BcryptCredentialVerifier, MIN_HASH_COST};
    use crate::contracts::lifecycle::{ContractLedger, ContractTerms, NewParty};
    use crate::ledger::models::CurrencyCode;
    use crate::ledger::{LedgerNetwork, MemoryWorldState};
    use std::sync::Arc;

    fn date(s: &str) -> NaiveDate {
        parse_date(s).unwrap()
    }

    #[test]
    fn test_compute_accrual_scenario() {
        // day 0 -> day 15 at 7-day intervals
        let (intervals, amount, advanced) =
            compute_accrual(date("01-01-2024"), date("16-01-2024"), 7, 100).unwrap();
        assert_eq!(intervals, 2);
        assert_eq!(amount, 200);
        assert_eq!(advanced, date("15-01-2024"));
    }

    #[test]
    fn test_compute_accrual_edges() {
        let start = date("01-03-2024");
        assert_eq!(compute_accrual(start, start, 7, 100).unwrap(), (0, 0, start));
        assert_eq!(compute_accrual(start, date("07-03-2024"), 7, 100).unwrap(), (0, 0, start));
        assert_eq!(compute_accrual(start, date("20-02-2024"), 7, 100).unwrap(), (0, 0, start));
        assert_eq!(
            compute_accrual(start, date("08-03-2024"), 7, 100).unwrap(),
            (1, 100, date("08-03-2024"))
        );
        assert!(compute_accrual(start, start, 0, 100).is_err());
        assert!(compute_accrual(start, date("08-03-2024"), 1, u64::MAX).is_err());
    }

    async fn active_contract() -> (ContractLedger, TxContext) {
        let ledger = ContractLedger::new(Arc::new(BcryptCredentialVerifier::new(MIN_HASH_COST).unwrap()));
        let ctx = TxContext::new("contract", Arc::new(MemoryWorldState::new()), Arc::new(LedgerNetwork::new()));

        for (id, bank, currency) in [("m", "adfc", "USD"), ("c", "sbi", "INR")] {
            ledger
                .register_party(
                    &ctx,
                    NewParty {
                        party_id: id.to_string(),
                        name: id.to_string(),
                        secret: "pw".to_string(),
                        bank: bank.to_string(),
                        account_no: format!("{}-1", id),
                        currency: CurrencyCode::new(currency).unwrap(),
                        company: String::new(),
                    },
                )
                .await
                .unwrap();
        }

        let terms = ContractTerms {
            duration: 10,
            interval: 7,
            rate_per_interval: 100,
            nature_of_work: "audit".to_string(),
            start_date: "01-01-2024".to_string(),
        };
        let id = ledger.propose(&ctx, "m", "c", terms).await.unwrap().contract_id;
        ledger
            .accept_by_contractor(&ctx, id, "c", "m", "c-1", CurrencyCode::new("INR").unwrap())
            .await
            .unwrap();
        ledger.accept_by_manager(&ctx, id, "m", "c").await.unwrap();
        (ledger, ctx)
    }

    #[tokio::test]
    async fn test_accrue_advances_date_for_both_parties() {
        let (ledger, ctx) = active_contract().await;
        let calculator = RedemptionCalculator::new();

        let accrual = calculator.accrue(&ctx, 1, "m", "c", "16-01-2024").await.unwrap();
        assert_eq!(accrual.amount, 200);
        assert_eq!(accrual.days_elapsed, 15);
        assert_eq!(accrual.previous_payment_date, "01-01-2024");
        assert_eq!(accrual.last_payment_date, "15-01-2024");

        let manager_view = ledger.list(&ctx, "m", ContractCollection::Active).await.unwrap();
        let contractor_view = ledger.list(&ctx, "c", ContractCollection::Active).await.unwrap();
        assert_eq!(manager_view[0].last_payment_date, "15-01-2024");
        assert_eq!(manager_view, contractor_view);

        // Nothing more accrues until the next boundary
        let again = calculator.accrue(&ctx, 1, "m", "c", "21-01-2024").await.unwrap();
        assert_eq!(again.amount, 0);
        assert_eq!(again.last_payment_date, "15-01-2024");
    }

    #[tokio::test]
    async fn test_accrue_requires_active_contract_and_valid_date() {
        let (ledger, ctx) = active_contract().await;
        let calculator = RedemptionCalculator::new();

        let bad_date = calculator.accrue(&ctx, 1, "m", "c", "2024-01-16").await;
        assert!(matches!(bad_date, Err(AppError::DateParse { .. })));

        let unknown = calculator.accrue(&ctx, 9, "m", "c", "16-01-2024").await;
        assert!(matches!(
            unknown,
            Err(AppError::Contract(ContractError::ContractNotFound { contract_id: 9, .. }))
        ));

        ledger.revoke(&ctx, 1, "m", "c").await.unwrap();
        let revoked = calculator.accrue(&ctx, 1, "m", "c", "16-01-2024").await;
        assert!(matches!(revoked, Err(AppError::Contract(ContractError::ContractNotFound { .. }))));
    }
}
