// Contract lifecycle ledger and redemption accrual
pub mod accrual;
pub mod credentials;
pub mod lifecycle;
pub mod program;

pub use accrual::{compute_accrual, Accrual, RedemptionCalculator};
pub use credentials::{BcryptCredentialVerifier, CredentialVerifier, DEFAULT_HASH_COST};
pub use lifecycle::{ContractLedger, ContractTerms, NewParty};
