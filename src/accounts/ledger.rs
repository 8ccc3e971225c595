use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::{debug, info, warn};

use crate::error::{AccountError, AppError, AppResult};
use crate::ledger::context::TxContext;
use crate::ledger::models::{account_key, AccountRecord};
use crate::ledger::world_state::{get_record, put_record};

/// What a read of a missing account does
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProvisionPolicy {
    /// Missing accounts are `NotFound`
    Strict,
    /// Missing accounts are materialized with a zero balance on first read
    AutoProvision,
}

impl FromStr for ProvisionPolicy {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "strict" => Ok(ProvisionPolicy::Strict),
            "auto" | "auto_provision" | "auto-provision" => Ok(ProvisionPolicy::AutoProvision),
            other => Err(AppError::InvalidInput(format!(
                "Unknown provision policy '{}'",
                other
            ))),
        }
    }
}

impl fmt::Display for ProvisionPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProvisionPolicy::Strict => write!(f, "strict"),
            ProvisionPolicy::AutoProvision => write!(f, "auto"),
        }
    }
}

/// Account balances of a single bank ledger
///
/// INVARIANT: balances never go negative; a debit that would overdraw fails
/// and leaves the balance untouched.
#[derive(Debug, Clone)]
pub struct AccountLedger {
    /// Central bank (currency ledger) new accounts default to
    ledger_id: String,
    policy: ProvisionPolicy,
}

impl AccountLedger {
    pub fn new(ledger_id: impl Into<String>, policy: ProvisionPolicy) -> Self {
        Self {
            ledger_id: ledger_id.into(),
            policy,
        }
    }

    pub async fn open(
        &self,
        ctx: &TxContext,
        account_no: &str,
        ledger_id: &str,
        owner: &str,
        initial_balance: u64,
    ) -> AppResult<AccountRecord> {
        if account_no.trim().is_empty() {
            return Err(AppError::InvalidInput("Account number cannot be empty".to_string()));
        }
        if self.exists(ctx, account_no).await? {
            return Err(AppError::AlreadyExists(format!(
                "Bank account {} already exists",
                account_no
            )));
        }

        let record = AccountRecord {
            account_no: account_no.to_string(),
            ledger_id: ledger_id.to_string(),
            balance: initial_balance,
            owner: Some(owner.to_string()).filter(|o| !o.is_empty()),
        };
        put_record(ctx.store(), &account_key(account_no), &record).await?;

        info!(
            "Opened account {} on {} (central: {}, balance: {})",
            account_no,
            ctx.ledger(),
            record.ledger_id,
            record.balance
        );
        Ok(record)
    }

    pub async fn exists(&self, ctx: &TxContext, account_no: &str) -> AppResult<bool> {
        Ok(ctx.store().get(&account_key(account_no)).await?.is_some())
    }

    /// Stored record, or under auto-provisioning an unsaved zero-balance one
    async fn lookup(&self, ctx: &TxContext, account_no: &str) -> AppResult<(AccountRecord, bool)> {
        if let Some(record) = get_record::<AccountRecord>(ctx.store(), &account_key(account_no)).await? {
            return Ok((record, true));
        }

        match self.policy {
            ProvisionPolicy::Strict => Err(AppError::NotFound(format!(
                "Bank account {} does not exist",
                account_no
            ))),
            ProvisionPolicy::AutoProvision => Ok((
                AccountRecord {
                    account_no: account_no.to_string(),
                    ledger_id: self.ledger_id.clone(),
                    balance: 0,
                    owner: None,
                },
                false,
            )),
        }
    }

    pub async fn read(&self, ctx: &TxContext, account_no: &str) -> AppResult<AccountRecord> {
        let (record, stored) = self.lookup(ctx, account_no).await?;
        if !stored {
            put_record(ctx.store(), &account_key(account_no), &record).await?;
            debug!("Auto-provisioned account {} on {}", account_no, ctx.ledger());
        }
        Ok(record)
    }

    pub async fn credit(&self, ctx: &TxContext, account_no: &str, amount: u64) -> AppResult<AccountRecord> {
        let mut record = self.read(ctx, account_no).await?;

        record.balance = record
            .balance
            .checked_add(amount)
            .ok_or_else(|| AccountError::BalanceOverflow {
                account: account_no.to_string(),
            })?;
        put_record(ctx.store(), &account_key(account_no), &record).await?;

        debug!("Credited {} to {} on {}", amount, account_no, ctx.ledger());
        Ok(record)
    }

    /// A rejected debit leaves the store untouched, including for accounts
    /// that would only have been auto-provisioned
    pub async fn debit(&self, ctx: &TxContext, account_no: &str, amount: u64) -> AppResult<AccountRecord> {
        let (mut record, _) = self.lookup(ctx, account_no).await?;

        if !record.has_available(amount) {
            warn!(
                "Debit of {} from {} rejected: balance {}",
                amount, account_no, record.balance
            );
            return Err(AccountError::InsufficientFunds {
                account: account_no.to_string(),
                required: amount,
                available: record.balance,
            }
            .into());
        }

        record.balance -= amount;
        put_record(ctx.store(), &account_key(account_no), &record).await?;

        debug!("Debited {} from {} on {}", amount, account_no, ctx.ledger());
        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::{LedgerNetwork, MemoryWorldState};
    use std::sync::Arc;

    fn ctx() -> TxContext {
        TxContext::new(
            "adfc",
            Arc::new(MemoryWorldState::new()),
            Arc::new(LedgerNetwork::new()),
        )
    }

    #[tokio::test]
    async fn test_open_rejects_duplicates() {
        let ctx = ctx();
        let ledger = AccountLedger::new("USD", ProvisionPolicy::Strict);

        let record = ledger.open(&ctx, "A-1", "USD", "alice", 500).await.unwrap();
        assert_eq!(record.balance, 500);
        assert_eq!(record.owner.as_deref(), Some("alice"));

        let err = ledger.open(&ctx, "A-1", "USD", "bob", 0).await.unwrap_err();
        assert!(matches!(err, AppError::AlreadyExists(_)));
        assert_eq!(ledger.read(&ctx, "A-1").await.unwrap().balance, 500);
    }

    #[tokio::test]
    async fn test_strict_read_of_missing_account_fails() {
        let ctx = ctx();
        let ledger = AccountLedger::new("USD", ProvisionPolicy::Strict);

        assert!(matches!(ledger.read(&ctx, "nope").await, Err(AppError::NotFound(_))));
        assert!(matches!(ledger.credit(&ctx, "nope", 5).await, Err(AppError::NotFound(_))));
        assert!(!ledger.exists(&ctx, "nope").await.unwrap());
    }

    #[tokio::test]
    async fn test_auto_provision_materializes_zero_balance() {
        let ctx = ctx();
        let ledger = AccountLedger::new("INR", ProvisionPolicy::AutoProvision);

        let record = ledger.read(&ctx, "B-9").await.unwrap();
        assert_eq!(record.balance, 0);
        assert_eq!(record.ledger_id, "INR");
        assert!(ledger.exists(&ctx, "B-9").await.unwrap());

        let credited = ledger.credit(&ctx, "B-7", 40).await.unwrap();
        assert_eq!(credited.balance, 40);
    }

    #[tokio::test]
    async fn test_rejected_debit_does_not_provision_account() {
        let ctx = ctx();
        let ledger = AccountLedger::new("INR", ProvisionPolicy::AutoProvision);

        let err = ledger.debit(&ctx, "GHOST", 5).await.unwrap_err();
        assert!(matches!(
            err,
            AppError::Account(AccountError::InsufficientFunds { available: 0, required: 5, .. })
        ));
        assert!(!ledger.exists(&ctx, "GHOST").await.unwrap());

        let strict = AccountLedger::new("USD", ProvisionPolicy::Strict);
        assert!(matches!(strict.debit(&ctx, "GHOST", 5).await, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_balance_never_goes_negative() {
        let ctx = ctx();
        let ledger = AccountLedger::new("USD", ProvisionPolicy::Strict);
        ledger.open(&ctx, "A-1", "USD", "alice", 100).await.unwrap();

        let ops: [(bool, u64); 6] = [(false, 60), (false, 50), (true, 5), (false, 45), (false, 1), (true, 0)];
        let mut expected: u64 = 100;
        for (is_credit, amount) in ops {
            let result = if is_credit {
                ledger.credit(&ctx, "A-1", amount).await
            } else {
                ledger.debit(&ctx, "A-1", amount).await
            };

            match result {
                Ok(record) => {
                    expected = if is_credit { expected + amount } else { expected - amount };
                    assert_eq!(record.balance, expected);
                }
                Err(AppError::Account(AccountError::InsufficientFunds { available, required, .. })) => {
                    assert!(!is_credit);
                    assert!(required > available);
                    assert_eq!(available, expected);
                }
                Err(other) => panic!("unexpected error: {}", other),
            }
            assert_eq!(ledger.read(&ctx, "A-1").await.unwrap().balance, expected);
        }
        assert_eq!(expected, 0);
    }

    #[tokio::test]
    async fn test_credit_overflow_is_rejected() {
        let ctx = ctx();
        let ledger = AccountLedger::new("USD", ProvisionPolicy::Strict);
        ledger.open(&ctx, "A-1", "USD", "alice", u64::MAX).await.unwrap();

        let err = ledger.credit(&ctx, "A-1", 1).await.unwrap_err();
        assert!(matches!(err, AppError::Account(AccountError::BalanceOverflow { .. })));
        assert_eq!(ledger.read(&ctx, "A-1").await.unwrap().balance, u64::MAX);
    }

    #[test]
    fn test_policy_parsing() {
        assert_eq!("auto".parse::<ProvisionPolicy>().unwrap(), ProvisionPolicy::AutoProvision);
        assert_eq!("STRICT".parse::<ProvisionPolicy>().unwrap(), ProvisionPolicy::Strict);
        assert!("lazy".parse::<ProvisionPolicy>().is_err());
    }
}
