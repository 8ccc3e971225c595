pub mod context;
pub mod models;
pub mod network;
pub mod program;
pub mod world_state;

#[cfg(test)]
pub mod testing;

pub use context::{InvocationResponse, LedgerInvoker, TxContext};
pub use network::LedgerNetwork;
pub use program::LedgerProgram;
pub use world_state::{MemoryWorldState, WorldState};
