use async_trait::async_trait;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use tracing::{info, instrument};

use crate::error::{AppError, AppResult};
use crate::ledger::context::{decode_amount, encode_args, TxContext};
use crate::ledger::models::{ledger_name, CurrencyCode};
use crate::ledger::program::{unknown_function, Args, LedgerProgram};
use crate::settlement::forex::deduct_fee;

/// Default international transfer fee (2%)
pub const DEFAULT_INTERNATIONAL_FEE: Decimal = dec!(0.02);

/// Per-currency settlement point
///
/// Outbound: converts through the conversion ledger, takes the international
/// fee and hands the net amount to the destination currency's central ledger.
/// Inbound: credits the destination bank ledger.
pub struct CentralLedger {
    currency: CurrencyCode,
    conversion_ledger: String,
    international_fee_rate: Decimal,
}

impl CentralLedger {
    pub fn new(currency: CurrencyCode, conversion_ledger: &str, international_fee_rate: Decimal) -> Self {
        Self {
            currency,
            conversion_ledger: ledger_name(conversion_ledger),
            international_fee_rate,
        }
    }

    /// Returns the net amount handed to the destination central ledger
    pub async fn settle_abroad(
        &self,
        ctx: &TxContext,
        from: &CurrencyCode,
        to: &CurrencyCode,
        amount: u64,
        to_ledger: &str,
        to_account: &str,
    ) -> AppResult<u64> {
        if from != &self.currency {
            return Err(AppError::InvalidInput(format!(
                "{} central ledger cannot settle {} funds",
                self.currency, from
            )));
        }

        let amount_arg = amount.to_string();
        let converted = decode_amount(
            &ctx.invoke(
                &self.conversion_ledger,
                "Convert",
                encode_args([from.as_str(), to.as_str(), amount_arg.as_str()]),
            )
            .await?,
        )?;

        let net = deduct_fee(Decimal::from(converted), self.international_fee_rate)?;

        let net_arg = net.to_string();
        ctx.invoke(
            &to.central_ledger(),
            "Receive",
            encode_args([to_ledger, to_account, net_arg.as_str()]),
        )
        .await?;

        info!(
            "Settled {} {} abroad: {} {} converted, {} {} delivered to {}/{}",
            amount, from, converted, to, net, to, to_ledger, to_account
        );
        Ok(net)
    }

    pub async fn receive(&self, ctx: &TxContext, to_ledger: &str, to_account: &str, amount: u64) -> AppResult<u64> {
        let amount_arg = amount.to_string();
        ctx.invoke(
            &ledger_name(to_ledger),
            "Credit",
            encode_args([to_account, amount_arg.as_str()]),
        )
        .await?;

        info!("{} central received {} for {}/{}", self.currency, amount, to_ledger, to_account);
        Ok(amount)
    }
}

#[async_trait]
impl LedgerProgram for CentralLedger {
    fn kind(&self) -> &'static str {
        "central"
    }

    #[instrument(skip(self, ctx, args), fields(ledger = %ctx.ledger(), tx_id = %ctx.tx_id()))]
    async fn invoke(&self, ctx: &TxContext, function: &str, args: &[Vec<u8>]) -> AppResult<Vec<u8>> {
        let delivered = match function {
            "SettleAbroad" => {
                let args = Args::new(function, args).arity(5)?;
                let from: CurrencyCode = args.parse(0, "currencyFrom")?;
                let to: CurrencyCode = args.parse(1, "currencyTo")?;
                let amount = args.amount(2, "amount")?;
                let to_ledger = args.str(3, "toLedger")?;
                let to_account = args.str(4, "toAccount")?;
                self.settle_abroad(ctx, &from, &to, amount, to_ledger, to_account)
                    .await?
            }
            "Receive" => {
                let args = Args::new(function, args).arity(3)?;
                let to_ledger = args.str(0, "toLedger")?;
                let to_account = args.str(1, "toAccount")?;
                let amount = args.amount(2, "amount")?;
                self.receive(ctx, to_ledger, to_account, amount).await?
            }
            other => return Err(unknown_function(self.kind(), other)),
        };

        Ok(delivered.to_string().into_bytes())
    }
}
