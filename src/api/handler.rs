use axum::{
    extract::State,
    http::StatusCode,
    Json,
};
use chrono::Utc;
use std::{collections::HashMap, sync::Arc};
use tokio::sync::Mutex;
use tracing::{info, warn};

use super::models::*;
use crate::{
    accounts::BankLedger,
    contracts::{Accrual, ContractLedger},
    error::{AppError, AppResult},
    ledger::{
        context::TxContext,
        models::{ledger_name, AccountRecord, ContractCollection, ContractRecord},
        LedgerNetwork,
    },
    middleware::{ValidatedJson, ValidatedPath},
    settlement::SettlementReceipt,
};

#[derive(Clone)]
pub struct AppState {
    pub network: LedgerNetwork,
    pub contracts: Arc<ContractLedger>,
    pub contract_ledger: String,
    pub banks: Arc<HashMap<String, Arc<BankLedger>>>,
    /// Gateway transactions are applied one at a time
    pub tx_lock: Arc<Mutex<()>>,
}

impl AppState {
    fn contract_ctx(&self) -> AppResult<TxContext> {
        self.network.context(&self.contract_ledger)
    }

    fn bank(&self, bank: &str) -> AppResult<(Arc<BankLedger>, TxContext)> {
        let name = ledger_name(bank);
        let ledger = self
            .banks
            .get(&name)
            .cloned()
            .ok_or_else(|| AppError::NotFound(format!("Bank ledger '{}' is not registered", name)))?;
        Ok((ledger, self.network.context(&name)?))
    }
}

// ========== PARTIES ==========

/// Register a party on the contract ledger
/// POST /parties
pub async fn register_party(
    State(state): State<AppState>,
    ValidatedJson(request): ValidatedJson<RegisterPartyRequest>,
) -> AppResult<(StatusCode, Json<PartyResponse>)> {
    info!("Registering party {}", request.party_id);
    let _tx = state.tx_lock.lock().await;

    let ctx = state.contract_ctx()?;
    let profile = state.contracts.register_party(&ctx, request.into()).await?;
    Ok((StatusCode::CREATED, Json(profile.into())))
}

/// POST /login
pub async fn login(
    State(state): State<AppState>,
    ValidatedJson(request): ValidatedJson<LoginRequest>,
) -> AppResult<Json<LoginResponse>> {
    let _tx = state.tx_lock.lock().await;

    let ctx = state.contract_ctx()?;
    let verified = match state
        .contracts
        .verify_party(&ctx, &request.party_id, &request.secret)
        .await
    {
        Ok(verified) => verified,
        Err(AppError::NotFound(_)) => false,
        Err(e) => return Err(e),
    };

    if !verified {
        warn!("Rejected login for {}", request.party_id);
        return Err(AppError::Unauthorized("Invalid party id or secret".to_string()));
    }

    Ok(Json(LoginResponse {
        message: "Login successful".to_string(),
        party_id: request.party_id,
    }))
}

/// GET /parties/:party_id
pub async fn get_party(
    State(state): State<AppState>,
    ValidatedPath(party_id): ValidatedPath<String>,
) -> AppResult<Json<PartyResponse>> {
    let _tx = state.tx_lock.lock().await;

    let ctx = state.contract_ctx()?;
    let profile = state.contracts.get_party(&ctx, &party_id).await?;
    Ok(Json(profile.into()))
}

/// GET /parties/:party_id/contracts/:collection
pub async fn list_contracts(
    State(state): State<AppState>,
    ValidatedPath((party_id, collection)): ValidatedPath<(String, String)>,
) -> AppResult<Json<Vec<ContractRecord>>> {
    let collection: ContractCollection = collection.parse()?;
    let _tx = state.tx_lock.lock().await;

    let ctx = state.contract_ctx()?;
    let contracts = state.contracts.list(&ctx, &party_id, collection).await?;
    Ok(Json(contracts))
}

// ========== CONTRACTS ==========

/// POST /contracts
pub async fn propose_contract(
    State(state): State<AppState>,
    ValidatedJson(request): ValidatedJson<ProposeContractRequest>,
) -> AppResult<(StatusCode, Json<ContractRecord>)> {
    info!("Proposing contract {} -> {}", request.manager, request.contractor);
    let _tx = state.tx_lock.lock().await;

    let ctx = state.contract_ctx()?;
    let record = state
        .contracts
        .propose(&ctx, &request.manager, &request.contractor, request.terms())
        .await?;
    Ok((StatusCode::CREATED, Json(record)))
}

/// GET /contracts/next-id
pub async fn next_contract_id(State(state): State<AppState>) -> AppResult<Json<ContractNoResponse>> {
    let _tx = state.tx_lock.lock().await;

    let ctx = state.contract_ctx()?;
    Ok(Json(ContractNoResponse {
        next_contract_id: state.contracts.contract_no(&ctx).await?,
    }))
}

/// POST /contracts/:id/accept-contractor
pub async fn accept_by_contractor(
    State(state): State<AppState>,
    ValidatedPath(contract_id): ValidatedPath<u64>,
    ValidatedJson(request): ValidatedJson<AcceptByContractorRequest>,
) -> AppResult<Json<ContractRecord>> {
    let _tx = state.tx_lock.lock().await;

    let ctx = state.contract_ctx()?;
    let record = state
        .contracts
        .accept_by_contractor(
            &ctx,
            contract_id,
            &request.contractor,
            &request.manager,
            &request.settlement_account,
            request.settlement_currency,
        )
        .await?;
    Ok(Json(record))
}

/// POST /contracts/:id/accept-manager
pub async fn accept_by_manager(
    State(state): State<AppState>,
    ValidatedPath(contract_id): ValidatedPath<u64>,
    ValidatedJson(request): ValidatedJson<ContractPartiesRequest>,
) -> AppResult<Json<ContractRecord>> {
    let _tx = state.tx_lock.lock().await;

    let ctx = state.contract_ctx()?;
    let record = state
        .contracts
        .accept_by_manager(&ctx, contract_id, &request.manager, &request.contractor)
        .await?;
    Ok(Json(record))
}

/// POST /contracts/:id/revoke
pub async fn revoke_contract(
    State(state): State<AppState>,
    ValidatedPath(contract_id): ValidatedPath<u64>,
    ValidatedJson(request): ValidatedJson<ContractPartiesRequest>,
) -> AppResult<Json<ContractRecord>> {
    let _tx = state.tx_lock.lock().await;

    let ctx = state.contract_ctx()?;
    let record = state
        .contracts
        .revoke(&ctx, contract_id, &request.manager, &request.contractor)
        .await?;
    Ok(Json(record))
}

/// POST /contracts/:id/withdraw-request
pub async fn withdraw_request(
    State(state): State<AppState>,
    ValidatedPath(contract_id): ValidatedPath<u64>,
    ValidatedJson(request): ValidatedJson<WithdrawContractRequest>,
) -> AppResult<Json<ContractRecord>> {
    let _tx = state.tx_lock.lock().await;

    let ctx = state.contract_ctx()?;
    let record = state
        .contracts
        .withdraw_request(&ctx, contract_id, &request.party_id)
        .await?;
    Ok(Json(record))
}

/// POST /contracts/:id/withdraw-pending
pub async fn withdraw_pending(
    State(state): State<AppState>,
    ValidatedPath(contract_id): ValidatedPath<u64>,
    ValidatedJson(request): ValidatedJson<WithdrawContractRequest>,
) -> AppResult<Json<ContractRecord>> {
    let _tx = state.tx_lock.lock().await;

    let ctx = state.contract_ctx()?;
    let record = state
        .contracts
        .withdraw_pending(&ctx, contract_id, &request.party_id)
        .await?;
    Ok(Json(record))
}

/// Accrue what the manager owes since the last payment date
/// POST /contracts/:id/redemption
pub async fn calculate_redemption(
    State(state): State<AppState>,
    ValidatedPath(contract_id): ValidatedPath<u64>,
    ValidatedJson(request): ValidatedJson<RedemptionRequest>,
) -> AppResult<Json<Accrual>> {
    let _tx = state.tx_lock.lock().await;

    let ctx = state.contract_ctx()?;
    let accrual = state
        .contracts
        .accrual()
        .accrue(
            &ctx,
            contract_id,
            &request.manager,
            &request.contractor,
            &request.current_date,
        )
        .await?;
    Ok(Json(accrual))
}

// ========== BANKS ==========

/// POST /banks/:bank/accounts
pub async fn open_account(
    State(state): State<AppState>,
    ValidatedPath(bank): ValidatedPath<String>,
    ValidatedJson(request): ValidatedJson<OpenAccountRequest>,
) -> AppResult<(StatusCode, Json<AccountRecord>)> {
    let _tx = state.tx_lock.lock().await;

    let (ledger, ctx) = state.bank(&bank)?;
    let ledger_id = request.ledger_id.unwrap_or_else(|| ledger.currency().clone());
    let record = ledger
        .accounts()
        .open(
            &ctx,
            &request.account_no,
            ledger_id.as_str(),
            request.owner.as_deref().unwrap_or_default(),
            request.initial_balance,
        )
        .await?;
    Ok((StatusCode::CREATED, Json(record)))
}

/// GET /banks/:bank/accounts/:account_no
pub async fn get_account(
    State(state): State<AppState>,
    ValidatedPath((bank, account_no)): ValidatedPath<(String, String)>,
) -> AppResult<Json<AccountRecord>> {
    let _tx = state.tx_lock.lock().await;

    let (ledger, ctx) = state.bank(&bank)?;
    Ok(Json(ledger.accounts().read(&ctx, &account_no).await?))
}

/// Pay out of an account held on `bank`
/// POST /banks/:bank/pay
pub async fn pay(
    State(state): State<AppState>,
    ValidatedPath(bank): ValidatedPath<String>,
    ValidatedJson(request): ValidatedJson<PayRequest>,
) -> AppResult<Json<SettlementReceipt>> {
    info!(
        "Payment of {} {} from {}/{} to {}/{}",
        request.amount, request.from_currency, bank, request.from_account, request.to_ledger, request.to_account
    );
    let _tx = state.tx_lock.lock().await;

    let (ledger, ctx) = state.bank(&bank)?;
    let receipt = ledger.pay(&ctx, &request.into()).await?;
    Ok(Json(receipt))
}

/// GET /health
pub async fn health_check(State(state): State<AppState>) -> AppResult<Json<HealthResponse>> {
    Ok(Json(HealthResponse {
        status: "healthy".to_string(),
        timestamp: Utc::now(),
        ledgers: state.network.registered_ledgers(),
    }))
}
