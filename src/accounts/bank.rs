use async_trait::async_trait;
use tracing::instrument;

use crate::accounts::ledger::{AccountLedger, ProvisionPolicy};
use crate::error::{AppError, AppResult};
use crate::ledger::context::TxContext;
use crate::ledger::models::CurrencyCode;
use crate::ledger::program::{json_payload, unknown_function, Args, LedgerProgram};
use crate::settlement::{CompensationPolicy, PaymentRequest, SettlementReceipt, SettlementRouter};

/// Bank ledger program: account ledger plus the settlement router paying out of it
pub struct BankLedger {
    currency: CurrencyCode,
    accounts: AccountLedger,
    router: SettlementRouter,
}

impl BankLedger {
    pub fn new(currency: CurrencyCode, policy: ProvisionPolicy, compensation: CompensationPolicy) -> Self {
        let accounts = AccountLedger::new(currency.as_str(), policy);
        Self {
            router: SettlementRouter::new(accounts.clone(), compensation),
            accounts,
            currency,
        }
    }

    /// Currency system (central bank) this bank settles through
    pub fn currency(&self) -> &CurrencyCode {
        &self.currency
    }

    pub fn accounts(&self) -> &AccountLedger {
        &self.accounts
    }

    /// Pay out of an account on this bank; the source currency must be the bank's
    pub async fn pay(&self, ctx: &TxContext, request: &PaymentRequest) -> AppResult<SettlementReceipt> {
        if request.from_currency != self.currency {
            return Err(AppError::InvalidInput(format!(
                "{} holds {} accounts, cannot pay out {}",
                ctx.ledger(),
                self.currency,
                request.from_currency
            )));
        }
        self.router.pay(ctx, request).await
    }
}

#[async_trait]
impl LedgerProgram for BankLedger {
    fn kind(&self) -> &'static str {
        "bank"
    }

    #[instrument(skip(self, ctx, args), fields(ledger = %ctx.ledger(), tx_id = %ctx.tx_id()))]
    async fn invoke(&self, ctx: &TxContext, function: &str, args: &[Vec<u8>]) -> AppResult<Vec<u8>> {
        match function {
            "OpenAccount" => {
                let args = Args::new(function, args).arity(4)?;
                let record = self
                    .accounts
                    .open(
                        ctx,
                        args.str(0, "accountNo")?,
                        args.str(1, "ledgerId")?,
                        args.str(2, "owner")?,
                        args.amount(3, "initialBalance")?,
                    )
                    .await?;
                json_payload(&record)
            }
            "GetAccount" => {
                let args = Args::new(function, args).arity(1)?;
                let record = self.accounts.read(ctx, args.str(0, "accountNo")?).await?;
                json_payload(&record)
            }
            "AccountExists" => {
                let args = Args::new(function, args).arity(1)?;
                let exists = self.accounts.exists(ctx, args.str(0, "accountNo")?).await?;
                Ok(exists.to_string().into_bytes())
            }
            "Credit" => {
                let args = Args::new(function, args).arity(2)?;
                let record = self
                    .accounts
                    .credit(ctx, args.str(0, "accountNo")?, args.amount(1, "amount")?)
                    .await?;
                json_payload(&record)
            }
            "Debit" => {
                let args = Args::new(function, args).arity(2)?;
                let record = self
                    .accounts
                    .debit(ctx, args.str(0, "accountNo")?, args.amount(1, "amount")?)
                    .await?;
                json_payload(&record)
            }
            "Pay" => {
                let args = Args::new(function, args).arity(6)?;
                let request = PaymentRequest {
                    from_currency: args.parse(0, "currencyFrom")?,
                    to_currency: args.parse(1, "currencyTo")?,
                    amount: args.amount(2, "amount")?,
                    from_account: args.str(3, "fromAccount")?.to_string(),
                    to_ledger: args.str(4, "toLedger")?.to_string(),
                    to_account: args.str(5, "toAccount")?.to_string(),
                };
                let receipt = self.pay(ctx, &request).await?;
                json_payload(&receipt)
            }
            other => Err(unknown_function(self.kind(), other)),
        }
    }
}
