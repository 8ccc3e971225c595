pub mod bank;
pub mod ledger;

pub use bank::BankLedger;
pub use ledger::{AccountLedger, ProvisionPolicy};
