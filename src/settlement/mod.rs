// Settlement chain: router, central ledgers, conversion ledger
pub mod central;
pub mod forex;
pub mod router;

pub use central::{CentralLedger, DEFAULT_INTERNATIONAL_FEE};
pub use forex::{ConversionLedger, RateTable, DEFAULT_CONVERSION_FEE, DEFAULT_USD_INR_RATE};
pub use router::{CompensationPolicy, PaymentRequest, SettlementReceipt, SettlementRoute, SettlementRouter};
