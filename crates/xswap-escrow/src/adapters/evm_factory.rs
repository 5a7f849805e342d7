//! In-memory EVM Escrow Factory
//!
//! Implements the `EvmEscrowChain` port: deterministic clone deployment,
//! a native/token balance ledger, and escrow resolution. Every call runs
//! under one write lock and either applies all of its transfers or none.

use crate::algorithms::address::derive_address;
use crate::algorithms::sequencer::{validate_destination_creation, validate_stage_order};
use crate::algorithms::state_machine::{authorize, authorize_rescue, TransitionRequest};
use crate::config::EscrowConfig;
use crate::domain::{
    Address, EscrowError, EscrowInstance, EscrowState, Immutables, Role, Secret, Settlement,
    Transfer, U256,
};
use crate::events::EscrowEvent;
use crate::metrics;
use crate::ports::outbound::{Clock, EvmEscrowChain};
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};
use xswap_telemetry::log_escrow_event;

/// In-memory escrow factory and ledger for testing and simulation.
pub struct InMemoryEscrowFactory {
    config: EscrowConfig,
    clock: Arc<dyn Clock>,
    state: RwLock<FactoryState>,
}

#[derive(Default)]
struct FactoryState {
    /// (holder, token) -> balance.
    balances: HashMap<(Address, Address), U256>,
    escrows: HashMap<Address, EscrowInstance>,
    revealed: HashMap<Address, Secret>,
    events: Vec<EscrowEvent>,
}

impl FactoryState {
    fn balance(&self, holder: Address, token: Address) -> U256 {
        self.balances
            .get(&(holder, token))
            .copied()
            .unwrap_or_default()
    }

    fn credit(&mut self, holder: Address, token: Address, amount: U256) {
        let balance = self.balances.entry((holder, token)).or_default();
        *balance = balance.saturating_add(amount);
    }

    /// Moves every transfer out of `from`, or nothing if any token falls short.
    fn transfer_all(&mut self, from: Address, transfers: &[Transfer]) -> Result<(), EscrowError> {
        let mut required: HashMap<Address, U256> = HashMap::new();
        for transfer in transfers {
            let total = required.entry(transfer.token).or_default();
            *total = total.saturating_add(transfer.amount);
        }
        for (token, amount) in &required {
            let available = self.balance(from, *token);
            if available < *amount {
                return Err(EscrowError::InsufficientBalance {
                    holder: from,
                    token: *token,
                    required: *amount,
                    available,
                });
            }
        }

        for transfer in transfers.iter().filter(|t| !t.amount.is_zero()) {
            let balance = self.balances.entry((from, transfer.token)).or_default();
            *balance -= transfer.amount;
            self.credit(transfer.to, transfer.token, transfer.amount);
        }
        Ok(())
    }
}

impl InMemoryEscrowFactory {
    /// Create a new factory reading block time from `clock`.
    pub fn new(config: EscrowConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            config,
            clock,
            state: RwLock::new(FactoryState::default()),
        }
    }

    /// Factory configuration.
    pub fn config(&self) -> &EscrowConfig {
        &self.config
    }

    /// Credit `amount` of `token` to `holder`.
    pub fn mint(&self, holder: Address, token: Address, amount: U256) {
        self.state.write().credit(holder, token, amount);
    }

    /// Balance of `holder` in `token`.
    pub fn balance_of(&self, holder: Address, token: Address) -> U256 {
        self.state.read().balance(holder, token)
    }

    /// Emitted events, oldest first.
    pub fn events(&self) -> Vec<EscrowEvent> {
        self.state.read().events.clone()
    }

    /// Address an escrow with these (stamped) immutables deploys to.
    pub fn address_of(&self, role: Role, immutables: &Immutables) -> Address {
        derive_address(
            &self.config.factory,
            &self.config.implementation(role),
            &immutables.hash(),
        )
    }

    fn block_time(&self) -> Result<u32, EscrowError> {
        let now = self.clock.now();
        u32::try_from(now)
            .map_err(|_| EscrowError::Chain(format!("block time {now} exceeds deployedAt lane")))
    }

    fn deploy(
        &self,
        role: Role,
        funder: Address,
        immutables: Immutables,
        src_cancellation_timestamp: Option<u64>,
        value: U256,
    ) -> Result<EscrowInstance, EscrowError> {
        let deployed_at = self.block_time()?;
        let immutables = immutables.with_deployed_at(deployed_at);

        validate_stage_order(&immutables.timelocks, role)?;
        if let Some(deadline) = src_cancellation_timestamp {
            validate_destination_creation(&immutables.timelocks, deadline)?;
        }

        let expected = immutables.required_native_value();
        if value != expected {
            return Err(EscrowError::ValueMismatch {
                expected,
                got: value,
            });
        }

        let implementation = self.config.implementation(role);
        let address = derive_address(&self.config.factory, &implementation, &immutables.hash());

        let mut state = self.state.write();
        if state.escrows.contains_key(&address) {
            return Err(EscrowError::AlreadyDeployed(address));
        }

        let mut funding = vec![Transfer {
            to: address,
            token: Address::NATIVE,
            amount: value,
        }];
        if !immutables.token.is_native() {
            funding.push(Transfer {
                to: address,
                token: immutables.token,
                amount: immutables.amount,
            });
        }
        state.transfer_all(funder, &funding)?;

        let instance = EscrowInstance {
            address,
            role,
            factory: self.config.factory,
            implementation,
            state: EscrowState::Deployed,
            deployed_at,
        };
        state.escrows.insert(address, instance.clone());
        state.events.push(EscrowEvent::EscrowCreated {
            address,
            role,
            hashlock: immutables.hashlock,
            maker: immutables.maker,
            taker: immutables.taker,
            deployed_at,
        });

        metrics::record_escrow_created(role);
        log_escrow_event!(
            info,
            "create",
            address,
            "[xswap] Escrow deployed",
            role = %role,
            deployed_at,
            order = %immutables.order_hash
        );
        Ok(instance)
    }

    fn resolve(
        &self,
        escrow: Address,
        immutables: &Immutables,
        request: &TransitionRequest,
    ) -> Result<Settlement, EscrowError> {
        let now = self.clock.now();
        let mut state = self.state.write();
        let instance = state
            .escrows
            .get(&escrow)
            .cloned()
            .ok_or(EscrowError::EscrowNotFound(escrow))?;

        let settlement = authorize(&instance, immutables, request, now)?;
        state.transfer_all(escrow, &[settlement.principal, settlement.deposit])?;

        if let Some(entry) = state.escrows.get_mut(&escrow) {
            entry.resolve(settlement.transition)?;
        }

        let event = match settlement.secret {
            Some(secret) => {
                state.revealed.insert(escrow, secret);
                EscrowEvent::EscrowWithdrawn {
                    address: escrow,
                    transition: settlement.transition,
                    secret,
                    recipient: settlement.principal.to,
                    caller: request.caller,
                }
            }
            None => EscrowEvent::EscrowCancelled {
                address: escrow,
                transition: settlement.transition,
                recipient: settlement.principal.to,
                caller: request.caller,
            },
        };
        state.events.push(event);

        metrics::record_transition(settlement.transition);
        log_escrow_event!(
            info,
            settlement.transition.as_str(),
            escrow,
            "[xswap] Escrow resolved",
            role = %instance.role,
            amount = %settlement.principal.amount,
            recipient = %settlement.principal.to
        );
        Ok(settlement)
    }
}

fn rejected(err: EscrowError) -> EscrowError {
    metrics::record_rejection(err.class());
    warn!("[xswap] Rejected: {}", err);
    err
}

#[async_trait]
impl EvmEscrowChain for InMemoryEscrowFactory {
    async fn create_source_escrow(
        &self,
        funder: Address,
        immutables: Immutables,
        value: U256,
    ) -> Result<EscrowInstance, EscrowError> {
        self.deploy(Role::Source, funder, immutables, None, value)
            .map_err(rejected)
    }

    async fn create_destination_escrow(
        &self,
        funder: Address,
        immutables: Immutables,
        src_cancellation_timestamp: u64,
        value: U256,
    ) -> Result<EscrowInstance, EscrowError> {
        self.deploy(
            Role::Destination,
            funder,
            immutables,
            Some(src_cancellation_timestamp),
            value,
        )
        .map_err(rejected)
    }

    async fn execute(
        &self,
        escrow: Address,
        immutables: &Immutables,
        request: TransitionRequest,
    ) -> Result<Settlement, EscrowError> {
        debug!(
            "[xswap] {} on {} from {}",
            request.transition, escrow, request.caller
        );
        self.resolve(escrow, immutables, &request).map_err(rejected)
    }

    async fn rescue_funds(
        &self,
        escrow: Address,
        immutables: &Immutables,
        caller: Address,
        token: Address,
        amount: U256,
    ) -> Result<Transfer, EscrowError> {
        let now = self.clock.now();
        let mut state = self.state.write();
        let instance = state
            .escrows
            .get(&escrow)
            .cloned()
            .ok_or(EscrowError::EscrowNotFound(escrow))
            .map_err(rejected)?;

        let transfer = authorize_rescue(
            &instance,
            immutables,
            &caller,
            token,
            amount,
            self.config.rescue_delay_secs,
            now,
        )
        .and_then(|transfer| state.transfer_all(escrow, &[transfer]).map(|_| transfer))
        .map_err(rejected)?;

        state.events.push(EscrowEvent::FundsRescued {
            address: escrow,
            token,
            amount,
        });
        log_escrow_event!(
            info,
            "rescue",
            escrow,
            "[xswap] Funds rescued",
            token = %token,
            amount = %amount
        );
        Ok(transfer)
    }

    async fn revealed_secret(&self, escrow: Address) -> Result<Option<Secret>, EscrowError> {
        Ok(self.state.read().revealed.get(&escrow).copied())
    }

    async fn escrow(&self, address: Address) -> Result<Option<EscrowInstance>, EscrowError> {
        Ok(self.state.read().escrows.get(&address).cloned())
    }
}
