use async_trait::async_trait;
use tracing::instrument;

use crate::contracts::lifecycle::{ContractLedger, ContractTerms, NewParty};
use crate::error::AppResult;
use crate::ledger::context::TxContext;
use crate::ledger::models::ContractCollection;
use crate::ledger::program::{json_payload, unknown_function, Args, LedgerProgram};

#[async_trait]
impl LedgerProgram for ContractLedger {
    fn kind(&self) -> &'static str {
        "contract"
    }

    #[instrument(skip(self, ctx, args), fields(ledger = %ctx.ledger(), tx_id = %ctx.tx_id()))]
    async fn invoke(&self, ctx: &TxContext, function: &str, args: &[Vec<u8>]) -> AppResult<Vec<u8>> {
        match function {
            "RegisterParty" => {
                let args = Args::new(function, args).arity(7)?;
                let party = NewParty {
                    party_id: args.str(0, "partyId")?.to_string(),
                    name: args.str(1, "name")?.to_string(),
                    secret: args.str(2, "secret")?.to_string(),
                    bank: args.str(3, "bank")?.to_string(),
                    account_no: args.str(4, "accountNo")?.to_string(),
                    currency: args.parse(5, "currency")?,
                    company: args.str(6, "company")?.to_string(),
                };
                json_payload(&self.register_party(ctx, party).await?)
            }
            "VerifyParty" => {
                let args = Args::new(function, args).arity(2)?;
                let verified = self
                    .verify_party(ctx, args.str(0, "partyId")?, args.str(1, "secret")?)
                    .await?;
                Ok(verified.to_string().into_bytes())
            }
            "GetParty" => {
                let args = Args::new(function, args).arity(1)?;
                json_payload(&self.get_party(ctx, args.str(0, "partyId")?).await?)
            }
            "GetContractNo" => {
                Args::new(function, args).arity(0)?;
                Ok(self.contract_no(ctx).await?.to_string().into_bytes())
            }
            "Propose" => {
                let args = Args::new(function, args).arity(7)?;
                let terms = ContractTerms {
                    duration: args.parse(2, "duration")?,
                    interval: args.parse(3, "interval")?,
                    rate_per_interval: args.amount(4, "ratePerInterval")?,
                    nature_of_work: args.str(5, "natureOfWork")?.to_string(),
                    start_date: args.str(6, "startDate")?.to_string(),
                };
                let record = self
                    .propose(ctx, args.str(0, "manager")?, args.str(1, "contractor")?, terms)
                    .await?;
                json_payload(&record)
            }
            "AcceptByContractor" => {
                let args = Args::new(function, args).arity(5)?;
                let record = self
                    .accept_by_contractor(
                        ctx,
                        args.parse(0, "contractId")?,
                        args.str(1, "contractor")?,
                        args.str(2, "manager")?,
                        args.str(3, "settlementAccount")?,
                        args.parse(4, "settlementCurrency")?,
                    )
                    .await?;
                json_payload(&record)
            }
            "AcceptByManager" | "Revoke" => {
                let args = Args::new(function, args).arity(3)?;
                let contract_id = args.parse(0, "contractId")?;
                let manager = args.str(1, "manager")?;
                let contractor = args.str(2, "contractor")?;
                let record = if function == "Revoke" {
                    self.revoke(ctx, contract_id, manager, contractor).await?
                } else {
                    self.accept_by_manager(ctx, contract_id, manager, contractor).await?
                };
                json_payload(&record)
            }
            "WithdrawRequest" => {
                let args = Args::new(function, args).arity(2)?;
                let record = self
                    .withdraw_request(ctx, args.parse(0, "contractId")?, args.str(1, "contractor")?)
                    .await?;
                json_payload(&record)
            }
            "WithdrawPending" => {
                let args = Args::new(function, args).arity(2)?;
                let record = self
                    .withdraw_pending(ctx, args.parse(0, "contractId")?, args.str(1, "manager")?)
                    .await?;
                json_payload(&record)
            }
            "GetRequestedContracts" | "GetPendingContracts" | "GetContracts" => {
                let collection = match function {
                    "GetRequestedContracts" => ContractCollection::Requested,
                    "GetPendingContracts" => ContractCollection::PendingApproval,
                    _ => ContractCollection::Active,
                };
                let args = Args::new(function, args).arity(1)?;
                json_payload(&self.list(ctx, args.str(0, "partyId")?, collection).await?)
            }
            "CalculateRedemption" => {
                let args = Args::new(function, args).arity(4)?;
                let accrual = self
                    .accrual()
                    .accrue(
                        ctx,
                        args.parse(0, "contractId")?,
                        args.str(1, "manager")?,
                        args.str(2, "contractor")?,
                        args.str(3, "currentDate")?,
                    )
                    .await?;
                json_payload(&accrual)
            }
            other => Err(unknown_function(self.kind(), other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::contracts::accrual::Accrual;
    use crate::contracts::credentials::{BcryptCredentialVerifier, MIN_HASH_COST};
    use crate::contracts::lifecycle::ContractLedger;
    use crate::ledger::context::encode_args;
    use crate::ledger::models::{ContractRecord, ContractStage};
    use crate::ledger::{LedgerInvoker, LedgerNetwork, MemoryWorldState};
    use std::sync::Arc;

    fn network() -> LedgerNetwork {
        let mut network = LedgerNetwork::new();
        network.register_ledger(
            "contract",
            Arc::new(ContractLedger::new(Arc::new(BcryptCredentialVerifier::new(MIN_HASH_COST).unwrap()))),
            Arc::new(MemoryWorldState::new()),
        );
        network
    }

    async fn call(network: &LedgerNetwork, function: &str, args: &[&str]) -> Vec<u8> {
        let response = network.invoke("contract", function, encode_args(args.iter().copied())).await;
        assert!(response.is_success(), "{} failed: {}", function, response.message);
        response.payload
    }

    #[tokio::test]
    async fn test_lifecycle_through_entry_points() {
        let network = network();
        call(&network, "RegisterParty", &["m", "Manager", "pw", "adfc", "m-1", "USD", "Acme"]).await;
        call(&network, "RegisterParty", &["c", "Contractor", "pw", "sbi", "c-1", "INR", ""]).await;
        assert_eq!(call(&network, "VerifyParty", &["m", "pw"]).await, b"true".to_vec());
        assert_eq!(call(&network, "GetContractNo", &[]).await, b"1".to_vec());

        call(&network, "Propose", &["m", "c", "12", "7", "100", "design", "01-01-2024"]).await;
        call(&network, "AcceptByContractor", &["1", "c", "m", "c-1", "INR"]).await;
        call(&network, "AcceptByManager", &["1", "m", "c"]).await;

        let active: Vec<ContractRecord> =
            serde_json::from_slice(&call(&network, "GetContracts", &["c"]).await).unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].stage, ContractStage::Active);

        let accrual: Accrual = serde_json::from_slice(
            &call(&network, "CalculateRedemption", &["1", "m", "c", "16-01-2024"]).await,
        )
        .unwrap();
        assert_eq!(accrual.amount, 200);

        let pending: Vec<ContractRecord> =
            serde_json::from_slice(&call(&network, "GetPendingContracts", &["m"]).await).unwrap();
        assert!(pending.is_empty());
    }

    #[tokio::test]
    async fn test_error_statuses() {
        let network = network();
        let missing = network.invoke("contract", "GetParty", encode_args(["ghost"])).await;
        assert_eq!(missing.status, 404);

        let bad_id = network
            .invoke("contract", "AcceptByManager", encode_args(["one", "m", "c"]))
            .await;
        assert_eq!(bad_id.status, 400);

        let unknown = network.invoke("contract", "Reject", vec![]).await;
        assert_eq!(unknown.status, 400);
    }
}
