use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

use crate::error::{AppError, AppResult};
use crate::ledger::context::{InvocationResponse, LedgerInvoker, TxContext};
use crate::ledger::models::ledger_name;
use crate::ledger::program::LedgerProgram;
use crate::ledger::world_state::WorldState;

#[derive(Clone)]
struct LedgerSlot {
    program: Arc<dyn LedgerProgram>,
    store: Arc<dyn WorldState>,
}

/// LedgerNetwork - routes invocations to independently owned ledgers
///
/// Every registered ledger owns its program and its own world state. An
/// invocation runs the target program against the target's store, with this
/// network as its invoker so the callee can make further hops.
#[derive(Clone)]
pub struct LedgerNetwork {
    ledgers: Arc<HashMap<String, LedgerSlot>>,
}

impl LedgerNetwork {
    /// Create an empty network
    pub fn new() -> Self {
        Self {
            ledgers: Arc::new(HashMap::new()),
        }
    }

    /// Register a ledger under a (lower-cased) name
    ///
    /// Only call this during system initialization
    pub fn register_ledger(
        &mut self,
        name: &str,
        program: Arc<dyn LedgerProgram>,
        store: Arc<dyn WorldState>,
    ) {
        let name = ledger_name(name);
        info!("Registering {} ledger: {}", program.kind(), name);
        Arc::make_mut(&mut self.ledgers).insert(name, LedgerSlot { program, store });
    }

    /// Transaction context for a direct (gateway) call on a ledger
    pub fn context(&self, ledger: &str) -> AppResult<TxContext> {
        let name = ledger_name(ledger);
        let slot = self
            .ledgers
            .get(&name)
            .ok_or_else(|| AppError::NotFound(format!("Ledger '{}' is not registered", name)))?;
        Ok(TxContext::new(name, slot.store.clone(), Arc::new(self.clone())))
    }

    /// Get all registered ledgers
    pub fn registered_ledgers(&self) -> Vec<String> {
        let mut names: Vec<String> = self.ledgers.keys().cloned().collect();
        names.sort();
        names
    }

    /// Check if a ledger is registered
    pub fn supports_ledger(&self, ledger: &str) -> bool {
        self.ledgers.contains_key(&ledger_name(ledger))
    }
}

impl Default for LedgerNetwork {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LedgerInvoker for LedgerNetwork {
    #[instrument(skip(self, args), fields(argc = args.len()))]
    async fn invoke(&self, ledger: &str, function: &str, args: Vec<Vec<u8>>) -> InvocationResponse {
        let name = ledger_name(ledger);
        let Some(slot) = self.ledgers.get(&name) else {
            warn!("Invocation of {} on unknown ledger {}", function, name);
            return InvocationResponse::failure(404, format!("Ledger '{}' is not registered", name));
        };
        let ctx = TxContext::new(name, slot.store.clone(), Arc::new(self.clone()));

        debug!("Routing {} to {} ledger {} (tx {})", function, slot.program.kind(), ctx.ledger(), ctx.tx_id());

        match slot.program.invoke(&ctx, function, &args).await {
            Ok(payload) => InvocationResponse::success(payload),
            Err(err) => {
                warn!("{}.{} failed: {}", ctx.ledger(), function, err);
                InvocationResponse::from_error(&err)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::program::{unknown_function, Args};
    use crate::ledger::world_state::MemoryWorldState;

    /// Echoes its first argument, or forwards to another ledger
    struct EchoProgram;

    #[async_trait]
    impl LedgerProgram for EchoProgram {
        fn kind(&self) -> &'static str {
            "echo"
        }

        async fn invoke(&self, ctx: &TxContext, function: &str, args: &[Vec<u8>]) -> AppResult<Vec<u8>> {
            match function {
                "Echo" => {
                    let args = Args::new(function, args).arity(1)?;
                    Ok(args.str(0, "value")?.as_bytes().to_vec())
                }
                "Forward" => {
                    let args = Args::new(function, args).arity(2)?;
                    let target = args.str(0, "ledger")?;
                    let value = args.str(1, "value")?;
                    ctx.invoke(target, "Echo", vec![value.as_bytes().to_vec()]).await
                }
                other => Err(unknown_function(self.kind(), other)),
            }
        }
    }

    fn network() -> LedgerNetwork {
        let mut network = LedgerNetwork::new();
        network.register_ledger("Alpha", Arc::new(EchoProgram), Arc::new(MemoryWorldState::new()));
        network.register_ledger("beta", Arc::new(EchoProgram), Arc::new(MemoryWorldState::new()));
        network
    }

    #[tokio::test]
    async fn test_registration_lowercases_names() {
        let network = network();
        assert!(network.supports_ledger("alpha"));
        assert!(network.supports_ledger("ALPHA"));
        assert!(!network.supports_ledger("gamma"));
        assert_eq!(network.registered_ledgers(), vec!["alpha", "beta"]);
    }

    #[tokio::test]
    async fn test_invoke_routes_and_chains_hops() {
        let network = network();
        let direct = network.invoke("alpha", "Echo", vec![b"hi".to_vec()]).await;
        assert_eq!(direct, InvocationResponse::success(b"hi".to_vec()));

        let hop = network
            .invoke("alpha", "Forward", vec![b"beta".to_vec(), b"hop".to_vec()])
            .await;
        assert!(hop.is_success());
        assert_eq!(hop.payload, b"hop".to_vec());
    }

    #[tokio::test]
    async fn test_unknown_ledger_and_function_fail_with_status() {
        let network = network();
        let missing = network.invoke("gamma", "Echo", vec![b"x".to_vec()]).await;
        assert_eq!(missing.status, 404);

        let bad_fn = network.invoke("alpha", "Nope", vec![]).await;
        assert_eq!(bad_fn.status, 400);
        assert!(bad_fn.message.contains("Nope"));
    }

    #[tokio::test]
    async fn test_failed_hop_surfaces_inner_message() {
        let network = network();
        let response = network
            .invoke("alpha", "Forward", vec![b"gamma".to_vec(), b"x".to_vec()])
            .await;
        assert_eq!(response.status, 502);
        assert!(response.message.contains("gamma"));

        let origin = response.origin.unwrap();
        assert_eq!(origin.ledger, "gamma");
        assert_eq!(origin.function, "Echo");
        assert_eq!(origin.status, 404);
    }
}
