use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument, warn};

use crate::contracts::accrual::RedemptionCalculator;
use crate::contracts::credentials::CredentialVerifier;
use crate::error::{AppError, AppResult, ContractError};
use crate::ledger::context::TxContext;
use crate::ledger::models::{
    contract_key, parse_date, party_key, ContractCollection, ContractRecord, ContractStage,
    CurrencyCode, PartyProfile, CONTRACT_COUNTER_KEY,
};
use crate::ledger::world_state::{get_record, put_record, read_counter, WriteSet};

/// Registration data for a new party
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewParty {
    pub party_id: String,
    pub name: String,
    pub secret: String,
    pub bank: String,
    pub account_no: String,
    pub currency: CurrencyCode,
    #[serde(default)]
    pub company: String,
}

/// Terms supplied by the manager when proposing a contract
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContractTerms {
    pub duration: u32,
    /// Days per payment interval
    pub interval: u32,
    pub rate_per_interval: u64,
    pub nature_of_work: String,
    /// DD-MM-YYYY
    pub start_date: String,
}

pub(crate) async fn load_party(ctx: &TxContext, party_id: &str) -> AppResult<PartyProfile> {
    get_record::<PartyProfile>(ctx.store(), &party_key(party_id))
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Party {} does not exist", party_id)))
}

/// Find a contract through a party's collection
///
/// A record whose stage disagrees with the collection counts as absent.
pub(crate) async fn locate(
    ctx: &TxContext,
    profile: &PartyProfile,
    contract_id: u64,
    collection: ContractCollection,
) -> AppResult<ContractRecord> {
    let not_found = || AppError::contract_not_found(contract_id, &profile.party_id, collection);

    if !profile.holds(collection, contract_id) {
        return Err(not_found());
    }

    match get_record::<ContractRecord>(ctx.store(), &contract_key(contract_id)).await? {
        Some(record) if record.stage == collection.stage() => Ok(record),
        Some(record) => {
            warn!(
                "Contract {} listed in {}'s {} collection but stored as {:?}",
                contract_id, profile.party_id, collection, record.stage
            );
            Err(not_found())
        }
        None => Err(not_found()),
    }
}

fn distinct_parties(manager: &str, contractor: &str) -> AppResult<()> {
    if manager == contractor {
        return Err(ContractError::InvalidTerms(format!(
            "Manager and contractor must differ (both '{}')",
            manager
        ))
        .into());
    }
    Ok(())
}

/// Check the record names these parties; otherwise it is not theirs to act on
fn ensure_parties(
    record: &ContractRecord,
    manager: &str,
    contractor: &str,
    owner: &str,
    collection: ContractCollection,
) -> AppResult<()> {
    if !record.involves(manager, contractor) {
        return Err(AppError::contract_not_found(record.contract_id, owner, collection));
    }
    Ok(())
}

/// Contract lifecycle ledger: party profiles and the contract state machine
///
/// Requested -> PendingApproval -> Active -> Terminated, with withdrawals out
/// of Requested and PendingApproval. Each contract is stored once under its id;
/// profiles index it by id in the collection matching its stage.
pub struct ContractLedger {
    verifier: Arc<dyn CredentialVerifier>,
    accrual: RedemptionCalculator,
}

impl ContractLedger {
    pub fn new(verifier: Arc<dyn CredentialVerifier>) -> Self {
        Self {
            verifier,
            accrual: RedemptionCalculator::new(),
        }
    }

    pub fn accrual(&self) -> &RedemptionCalculator {
        &self.accrual
    }

    #[instrument(skip(self, ctx, party), fields(party_id = %party.party_id))]
    pub async fn register_party(&self, ctx: &TxContext, party: NewParty) -> AppResult<PartyProfile> {
        let key = party_key(&party.party_id);
        if ctx.store().get(&key).await?.is_some() {
            return Err(AppError::AlreadyExists(format!(
                "Party {} already exists",
                party.party_id
            )));
        }

        let profile = PartyProfile {
            credential_hash: self.verifier.hash(&party.secret)?,
            party_id: party.party_id,
            name: party.name,
            bank: party.bank.to_ascii_lowercase(),
            account_no: party.account_no,
            currency: party.currency,
            company: party.company,
            requested: Default::default(),
            pending_approval: Default::default(),
            active: Default::default(),
        };
        put_record(ctx.store(), &key, &profile).await?;

        info!("Registered party {} ({} / {})", profile.party_id, profile.bank, profile.currency);
        Ok(profile)
    }

    pub async fn verify_party(&self, ctx: &TxContext, party_id: &str, secret: &str) -> AppResult<bool> {
        let profile = load_party(ctx, party_id).await?;
        self.verifier.verify(&profile.credential_hash, secret)
    }

    pub async fn get_party(&self, ctx: &TxContext, party_id: &str) -> AppResult<PartyProfile> {
        load_party(ctx, party_id).await
    }

    /// Id the next proposal will receive
    pub async fn contract_no(&self, ctx: &TxContext) -> AppResult<u64> {
        Ok(read_counter(ctx.store(), CONTRACT_COUNTER_KEY).await? + 1)
    }

    #[instrument(skip(self, ctx, terms))]
    pub async fn propose(
        &self,
        ctx: &TxContext,
        manager: &str,
        contractor: &str,
        terms: ContractTerms,
    ) -> AppResult<ContractRecord> {
        distinct_parties(manager, contractor)?;
        if terms.interval == 0 {
            return Err(ContractError::InvalidTerms("Interval must be at least one day".to_string()).into());
        }
        parse_date(&terms.start_date)?;

        let manager_profile = load_party(ctx, manager).await?;
        let mut contractor_profile = load_party(ctx, contractor).await?;

        let contract_id = ctx.store().increment(CONTRACT_COUNTER_KEY).await?;
        let record = ContractRecord {
            contract_id,
            manager: manager.to_string(),
            contractor: contractor.to_string(),
            duration: terms.duration,
            interval: terms.interval,
            rate_per_interval: terms.rate_per_interval,
            rate_currency: manager_profile.currency.clone(),
            nature_of_work: terms.nature_of_work,
            last_payment_date: terms.start_date.trim().to_string(),
            start_date: terms.start_date.trim().to_string(),
            manager_bank: manager_profile.bank.clone(),
            manager_account_no: manager_profile.account_no.clone(),
            settlement_account: String::new(),
            settlement_currency: None,
            contractor_bank: String::new(),
            stage: ContractStage::Requested,
        };
        contractor_profile.requested.insert(contract_id);

        let mut writes = WriteSet::new();
        writes.stage(ctx.store(), &contract_key(contract_id), &record).await?;
        writes.stage(ctx.store(), &party_key(contractor), &contractor_profile).await?;
        writes.commit(ctx.store()).await?;

        info!("Contract {} proposed by {} to {}", contract_id, manager, contractor);
        Ok(record)
    }

    #[instrument(skip(self, ctx))]
    pub async fn accept_by_contractor(
        &self,
        ctx: &TxContext,
        contract_id: u64,
        contractor: &str,
        manager: &str,
        settlement_account: &str,
        settlement_currency: CurrencyCode,
    ) -> AppResult<ContractRecord> {
        distinct_parties(manager, contractor)?;
        let mut contractor_profile = load_party(ctx, contractor).await?;
        let mut manager_profile = load_party(ctx, manager).await?;

        let collection = ContractCollection::Requested;
        let mut record = locate(ctx, &contractor_profile, contract_id, collection).await?;
        ensure_parties(&record, manager, contractor, contractor, collection)?;

        record.settlement_account = settlement_account.to_string();
        record.settlement_currency = Some(settlement_currency);
        record.contractor_bank = contractor_profile.bank.clone();
        record.stage = ContractStage::PendingApproval;

        contractor_profile.requested.remove(&contract_id);
        manager_profile.pending_approval.insert(contract_id);

        let mut writes = WriteSet::new();
        writes.stage(ctx.store(), &contract_key(contract_id), &record).await?;
        writes.stage(ctx.store(), &party_key(contractor), &contractor_profile).await?;
        writes.stage(ctx.store(), &party_key(manager), &manager_profile).await?;
        writes.commit(ctx.store()).await?;

        info!("Contract {} accepted by contractor {}", contract_id, contractor);
        Ok(record)
    }

    #[instrument(skip(self, ctx))]
    pub async fn accept_by_manager(
        &self,
        ctx: &TxContext,
        contract_id: u64,
        manager: &str,
        contractor: &str,
    ) -> AppResult<ContractRecord> {
        distinct_parties(manager, contractor)?;
        let mut manager_profile = load_party(ctx, manager).await?;
        let mut contractor_profile = load_party(ctx, contractor).await?;

        let collection = ContractCollection::PendingApproval;
        let mut record = locate(ctx, &manager_profile, contract_id, collection).await?;
        ensure_parties(&record, manager, contractor, manager, collection)?;

        record.stage = ContractStage::Active;
        manager_profile.pending_approval.remove(&contract_id);
        manager_profile.active.insert(contract_id);
        contractor_profile.active.insert(contract_id);

        let mut writes = WriteSet::new();
        writes.stage(ctx.store(), &contract_key(contract_id), &record).await?;
        writes.stage(ctx.store(), &party_key(manager), &manager_profile).await?;
        writes.stage(ctx.store(), &party_key(contractor), &contractor_profile).await?;
        writes.commit(ctx.store()).await?;

        info!("✅ Contract {} active between {} and {}", contract_id, manager, contractor);
        Ok(record)
    }

    /// Both sides are checked before anything is written
    #[instrument(skip(self, ctx))]
    pub async fn revoke(
        &self,
        ctx: &TxContext,
        contract_id: u64,
        manager: &str,
        contractor: &str,
    ) -> AppResult<ContractRecord> {
        distinct_parties(manager, contractor)?;
        let mut manager_profile = load_party(ctx, manager).await?;
        let mut contractor_profile = load_party(ctx, contractor).await?;

        let collection = ContractCollection::Active;
        let mut record = locate(ctx, &manager_profile, contract_id, collection).await?;
        if !contractor_profile.holds(collection, contract_id) {
            return Err(AppError::contract_not_found(contract_id, contractor, collection));
        }
        ensure_parties(&record, manager, contractor, manager, collection)?;

        record.stage = ContractStage::Terminated;
        manager_profile.active.remove(&contract_id);
        contractor_profile.active.remove(&contract_id);

        let mut writes = WriteSet::new();
        writes.stage(ctx.store(), &contract_key(contract_id), &record).await?;
        writes.stage(ctx.store(), &party_key(manager), &manager_profile).await?;
        writes.stage(ctx.store(), &party_key(contractor), &contractor_profile).await?;
        writes.commit(ctx.store()).await?;

        info!("Contract {} revoked by {}", contract_id, manager);
        Ok(record)
    }

    /// Drop a request from the contractor's requested collection
    pub async fn withdraw_request(&self, ctx: &TxContext, contract_id: u64, contractor: &str) -> AppResult<ContractRecord> {
        self.withdraw(ctx, contract_id, contractor, ContractCollection::Requested)
            .await
    }

    /// Drop a contract awaiting the manager's approval
    pub async fn withdraw_pending(&self, ctx: &TxContext, contract_id: u64, manager: &str) -> AppResult<ContractRecord> {
        self.withdraw(ctx, contract_id, manager, ContractCollection::PendingApproval)
            .await
    }

    async fn withdraw(
        &self,
        ctx: &TxContext,
        contract_id: u64,
        party_id: &str,
        collection: ContractCollection,
    ) -> AppResult<ContractRecord> {
        let mut profile = load_party(ctx, party_id).await?;
        let mut record = locate(ctx, &profile, contract_id, collection).await?;

        record.stage = ContractStage::Withdrawn;
        profile.collection_mut(collection).remove(&contract_id);

        let mut writes = WriteSet::new();
        writes.stage(ctx.store(), &contract_key(contract_id), &record).await?;
        writes.stage(ctx.store(), &party_key(party_id), &profile).await?;
        writes.commit(ctx.store()).await?;

        info!("Contract {} withdrawn from {}'s {} collection", contract_id, party_id, collection);
        Ok(record)
    }

    /// Contracts in one of a party's collections, in id order
    pub async fn list(
        &self,
        ctx: &TxContext,
        party_id: &str,
        collection: ContractCollection,
    ) -> AppResult<Vec<ContractRecord>> {
        let profile = load_party(ctx, party_id).await?;

        let mut records = Vec::with_capacity(profile.collection(collection).len());
        for contract_id in profile.collection(collection) {
            let record = get_record::<ContractRecord>(ctx.store(), &contract_key(*contract_id))
                .await?
                .ok_or_else(|| {
                    AppError::Storage(format!(
                        "Contract {} indexed by {} has no record",
                        contract_id, party_id
                    ))
                })?;
            records.push(record);
        }
        Ok(records)
    }
}
