use std::{collections::HashMap, sync::Arc};
use tokio::sync::Mutex;
use tracing::info;

use crate::{
    accounts::BankLedger,
    api::handler::AppState,
    config::Config,
    contracts::{BcryptCredentialVerifier, ContractLedger},
    error::{AppError, AppResult},
    ledger::{LedgerNetwork, LedgerProgram, MemoryWorldState},
    settlement::{CentralLedger, ConversionLedger, RateTable},
};

pub async fn initialize_app_state(config: &Config) -> AppResult<AppState> {
    info!("Initializing ledger network ...");

    let mut network = LedgerNetwork::new();

    // Contract lifecycle ledger
    let verifier = BcryptCredentialVerifier::new(config.credential_hash_cost)?;
    let contracts = Arc::new(ContractLedger::new(Arc::new(verifier)));
    register(&mut network, &config.contract_ledger, contracts.clone())?;
    info!("✅ Contract ledger registered: {}", config.contract_ledger);

    // Conversion ledger
    let table = RateTable::usd_inr(config.usd_inr_rate, config.conversion_fee_rate)?;
    register(&mut network, &config.conversion_ledger, Arc::new(ConversionLedger::new(table)))?;
    info!(
        "✅ Conversion ledger registered: {} (USD/INR {}, fee {})",
        config.conversion_ledger, config.usd_inr_rate, config.conversion_fee_rate
    );

    // One central ledger per currency system
    for currency in config.currencies() {
        let central = CentralLedger::new(
            currency.clone(),
            &config.conversion_ledger,
            config.international_fee_rate,
        );
        register(&mut network, &currency.central_ledger(), Arc::new(central))?;
        info!("✅ Central ledger registered: {}", currency.central_ledger());
    }

    // Bank ledgers
    let mut banks = HashMap::new();
    for bank in &config.banks {
        let ledger = Arc::new(BankLedger::new(
            bank.currency.clone(),
            bank.policy,
            config.compensation,
        ));
        register(&mut network, &bank.name, ledger.clone())?;
        banks.insert(bank.name.clone(), ledger);
        info!("✅ Bank ledger registered: {} ({}, {})", bank.name, bank.currency, bank.policy);
    }

    info!(
        "All ledgers initialized ({} registered, compensation: {})",
        network.registered_ledgers().len(),
        config.compensation
    );

    Ok(AppState {
        network,
        contracts,
        contract_ledger: config.contract_ledger.clone(),
        banks: Arc::new(banks),
        tx_lock: Arc::new(Mutex::new(())),
    })
}

fn register(
    network: &mut LedgerNetwork,
    name: &str,
    program: Arc<dyn LedgerProgram>,
) -> AppResult<()> {
    if network.supports_ledger(name) {
        return Err(AppError::Config(format!(
            "Ledger name '{}' is configured more than once",
            name
        )));
    }
    network.register_ledger(name, program, Arc::new(MemoryWorldState::new()));
    Ok(())
}
