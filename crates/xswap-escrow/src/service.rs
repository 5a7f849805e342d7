//! Swap Coordinator - end-to-end orchestration
//!
//! Drives one swap across both chains: generates the secret, builds the
//! EVM immutables and the Bitcoin HTLC with payees assigned by leg,
//! sequences the locks, claims the destination leg, then replays the
//! secret it revealed on the source leg.

use crate::algorithms::bitcoin_script::{
    extract_secret, locktime_from_timestamp, BitcoinHtlc, HtlcParams,
};
use crate::algorithms::secret::{HashScheme, SecretBundle};
use crate::algorithms::sequencer::{
    validate_bitcoin_destination, validate_bitcoin_source, validate_stage_order,
};
use crate::algorithms::state_machine::TransitionRequest;
use crate::config::EscrowConfig;
use crate::domain::{
    EscrowError, Hash, Immutables, LegLocator, OutPoint, Role, Secret, SwapRecord, SwapState,
    Timelocks,
};
use crate::ports::inbound::{Party, SwapApi, SwapDirection, SwapTerms};
use crate::ports::outbound::{BitcoinHtlcChain, Clock, EvmEscrowChain, SpendTransaction};
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;
use xswap_telemetry::log_swap_event;

/// Per-swap state held by the coordinator.
struct SwapSession {
    record: SwapRecord,
    terms: SwapTerms,
    secret: SecretBundle,
    /// Stamped with `deployedAt` once the EVM leg is deployed.
    immutables: Immutables,
    htlc: Option<BitcoinHtlc>,
    /// State a chain call is currently moving the swap to.
    in_flight: Option<SwapState>,
}

/// Copy of a session without the secret, safe to hold across awaits.
#[derive(Clone)]
struct SessionView {
    record: SwapRecord,
    terms: SwapTerms,
    bitcoin_hashlock: Hash,
    immutables: Immutables,
    htlc: Option<BitcoinHtlc>,
}

impl SessionView {
    fn of(session: &SwapSession) -> Self {
        Self {
            record: session.record.clone(),
            terms: session.terms.clone(),
            bitcoin_hashlock: session.secret.bitcoin_hashlock,
            immutables: session.immutables,
            htlc: session.htlc.clone(),
        }
    }

    fn evm_role(&self) -> Role {
        evm_role(self.terms.direction)
    }

    fn htlc(&self) -> Result<&BitcoinHtlc, EscrowError> {
        self.htlc.as_ref().ok_or_else(|| not_locked(&self.record, "bitcoin leg"))
    }
}

/// Role of the EVM leg for a direction.
fn evm_role(direction: SwapDirection) -> Role {
    match direction {
        SwapDirection::EvmToBitcoin => Role::Source,
        SwapDirection::BitcoinToEvm => Role::Destination,
    }
}

type Sessions = Arc<RwLock<HashMap<Uuid, SwapSession>>>;

/// Releases a swap's in-flight marker when dropped.
struct InFlight {
    sessions: Sessions,
    id: Uuid,
}

impl Drop for InFlight {
    fn drop(&mut self) {
        if let Some(session) = self.sessions.write().get_mut(&self.id) {
            session.in_flight = None;
        }
    }
}

fn not_locked(record: &SwapRecord, what: &str) -> EscrowError {
    EscrowError::InvalidSwapTransition {
        from: format!("{:?}", record.state),
        to: format!("{what} not locked"),
    }
}

fn ensure_can(record: &SwapRecord, next: SwapState) -> Result<(), EscrowError> {
    if record.state.can_transition_to(next) {
        return Ok(());
    }
    Err(EscrowError::InvalidSwapTransition {
        from: format!("{:?}", record.state),
        to: format!("{:?}", next),
    })
}

/// Swap coordinator over an EVM escrow factory and a Bitcoin chain.
pub struct SwapCoordinator<E, B, C>
where
    E: EvmEscrowChain,
    B: BitcoinHtlcChain,
    C: Clock,
{
    config: EscrowConfig,
    sessions: Sessions,
    evm: Arc<E>,
    bitcoin: Arc<B>,
    clock: Arc<C>,
}

impl<E, B, C> SwapCoordinator<E, B, C>
where
    E: EvmEscrowChain,
    B: BitcoinHtlcChain,
    C: Clock,
{
    /// Create new coordinator
    pub fn new(config: EscrowConfig, evm: Arc<E>, bitcoin: Arc<B>, clock: Arc<C>) -> Self {
        Self {
            config,
            sessions: Arc::new(RwLock::new(HashMap::new())),
            evm,
            bitcoin,
            clock,
        }
    }

    /// Immutables of the swap's EVM leg, stamped once deployed.
    pub fn immutables(&self, id: &Uuid) -> Option<Immutables> {
        self.sessions.read().get(id).map(|s| s.immutables)
    }

    /// The swap's Bitcoin HTLC, once built.
    pub fn bitcoin_htlc(&self, id: &Uuid) -> Option<BitcoinHtlc> {
        self.sessions.read().get(id).and_then(|s| s.htlc.clone())
    }

    /// P2WSH address of the swap's Bitcoin HTLC on the configured network.
    pub fn htlc_address(&self, id: &Uuid) -> Result<String, EscrowError> {
        let view = self.view(id)?;
        Ok(view.htlc()?.p2wsh_address(self.config.bitcoin_network)?)
    }

    fn view(&self, id: &Uuid) -> Result<SessionView, EscrowError> {
        let sessions = self.sessions.read();
        let session = sessions.get(id).ok_or(EscrowError::UnknownSwap(*id))?;
        Ok(SessionView::of(session))
    }

    /// Marks the swap busy moving to `next` until the returned guard drops.
    ///
    /// `check` runs under the same write lock, so two concurrent calls
    /// cannot both pass it and both touch a chain.
    fn reserve(
        &self,
        id: &Uuid,
        next: SwapState,
        check: impl FnOnce(&SwapRecord) -> Result<(), EscrowError>,
    ) -> Result<(SessionView, InFlight), EscrowError> {
        let mut sessions = self.sessions.write();
        let session = sessions.get_mut(id).ok_or(EscrowError::UnknownSwap(*id))?;
        if let Some(pending) = session.in_flight {
            return Err(EscrowError::SwapInFlight {
                id: *id,
                pending: format!("{:?}", pending),
            });
        }
        check(&session.record)?;
        session.in_flight = Some(next);
        let guard = InFlight {
            sessions: Arc::clone(&self.sessions),
            id: *id,
        };
        Ok((SessionView::of(session), guard))
    }

    fn secret(&self, id: &Uuid) -> Result<Secret, EscrowError> {
        let sessions = self.sessions.read();
        let session = sessions.get(id).ok_or(EscrowError::UnknownSwap(*id))?;
        Ok(session.secret.secret.expose())
    }

    fn update<T>(
        &self,
        id: &Uuid,
        f: impl FnOnce(&mut SwapSession) -> Result<T, EscrowError>,
    ) -> Result<T, EscrowError> {
        let mut sessions = self.sessions.write();
        let session = sessions.get_mut(id).ok_or(EscrowError::UnknownSwap(*id))?;
        f(session)
    }

    fn build_htlc(&self, view: &SessionView, role: Role) -> Result<BitcoinHtlc, EscrowError> {
        let locktime = locktime_from_timestamp(
            self.clock.now() + u64::from(view.terms.btc_locktime_offset),
        )?;
        let params = HtlcParams::for_role(
            role,
            view.terms.maker.signer.public_key(),
            view.terms.taker.signer.public_key(),
            view.bitcoin_hashlock,
            locktime,
        );
        Ok(BitcoinHtlc::new(params)?)
    }

    /// Signs and broadcasts a spend of `outpoint` paying `spender`.
    async fn spend_htlc(
        &self,
        outpoint: OutPoint,
        spender: &Party,
        tx_lock_time: u32,
        witness: impl FnOnce(&[u8]) -> Vec<Vec<u8>> + Send,
    ) -> Result<Hash, EscrowError> {
        let digest = self
            .bitcoin
            .spend_digest(outpoint, &spender.payout_script, tx_lock_time)
            .await?;
        let signature = spender.signer.sign(&digest)?;
        self.bitcoin
            .spend(SpendTransaction {
                outpoint,
                recipient_script: spender.payout_script.clone(),
                tx_lock_time,
                witness: witness(&signature),
            })
            .await
    }

    /// Secret as published by the destination leg's withdrawal.
    async fn observe_secret(&self, view: &SessionView) -> Result<Secret, EscrowError> {
        match view.record.destination {
            Some(LegLocator::Evm(address)) => self
                .evm
                .revealed_secret(address)
                .await?
                .ok_or_else(|| EscrowError::SecretNotRevealed(address.to_string())),
            Some(LegLocator::Bitcoin(outpoint)) => self
                .bitcoin
                .spending_witness(outpoint)
                .await?
                .and_then(|witness| extract_secret(&witness))
                .ok_or_else(|| EscrowError::SecretNotRevealed(outpoint.to_string())),
            None => Err(not_locked(&view.record, "destination")),
        }
    }
}

#[async_trait]
impl<E, B, C> SwapApi for SwapCoordinator<E, B, C>
where
    E: EvmEscrowChain,
    B: BitcoinHtlcChain,
    C: Clock,
{
    async fn initiate(&self, terms: SwapTerms) -> Result<SwapRecord, EscrowError> {
        let timelocks = Timelocks::pack(&terms.offsets);
        validate_stage_order(&timelocks, evm_role(terms.direction))?;

        let secret = SecretBundle::generate();
        let immutables = Immutables {
            order_hash: terms.order_hash,
            hashlock: secret.evm_hashlock,
            maker: terms.maker.account,
            taker: terms.taker.account,
            token: terms.token,
            amount: terms.evm_amount,
            safety_deposit: terms.safety_deposit,
            timelocks,
        };
        let record = SwapRecord::new(
            terms.order_hash,
            terms.direction.chain(Role::Source),
            terms.direction.chain(Role::Destination),
            self.clock.now(),
        );

        log_swap_event!(
            info,
            record.id,
            record.state,
            "[xswap] Swap initiated",
            direction = ?terms.direction,
            order = %terms.order_hash
        );
        self.sessions.write().insert(
            record.id,
            SwapSession {
                record: record.clone(),
                terms,
                secret,
                immutables,
                htlc: None,
                in_flight: None,
            },
        );
        Ok(record)
    }

    async fn lock_source(&self, id: Uuid) -> Result<LegLocator, EscrowError> {
        let (view, _in_flight) = self.reserve(&id, SwapState::SourceLocked, |record| {
            ensure_can(record, SwapState::SourceLocked)
        })?;

        let (locator, immutables, htlc) = match view.terms.direction {
            SwapDirection::EvmToBitcoin => {
                let instance = self
                    .evm
                    .create_source_escrow(
                        view.terms.maker.account,
                        view.immutables,
                        view.immutables.required_native_value(),
                    )
                    .await?;
                (
                    LegLocator::Evm(instance.address),
                    view.immutables.with_deployed_at(instance.deployed_at),
                    None,
                )
            }
            SwapDirection::BitcoinToEvm => {
                let htlc = self.build_htlc(&view, Role::Source)?;
                let outpoint = self
                    .bitcoin
                    .fund(htlc.p2wsh_script_pubkey(), view.terms.btc_amount_sats)
                    .await?;
                (LegLocator::Bitcoin(outpoint), view.immutables, Some(htlc))
            }
        };

        self.update(&id, |session| {
            session.record.set_source(locator)?;
            session.immutables = immutables;
            session.htlc = htlc;
            Ok(())
        })?;
        log_swap_event!(
            info,
            id,
            SwapState::SourceLocked,
            "[xswap] Swap source locked",
            leg = ?locator
        );
        Ok(locator)
    }

    async fn lock_destination(&self, id: Uuid) -> Result<LegLocator, EscrowError> {
        let (view, _in_flight) = self.reserve(&id, SwapState::DestinationLocked, |record| {
            ensure_can(record, SwapState::DestinationLocked)
        })?;

        let (locator, immutables, htlc) = match view.terms.direction {
            SwapDirection::EvmToBitcoin => {
                let htlc = self.build_htlc(&view, Role::Destination)?;
                validate_bitcoin_destination(htlc.params().locktime, &view.immutables.timelocks)?;
                let outpoint = self
                    .bitcoin
                    .fund(htlc.p2wsh_script_pubkey(), view.terms.btc_amount_sats)
                    .await?;
                (LegLocator::Bitcoin(outpoint), view.immutables, Some(htlc))
            }
            SwapDirection::BitcoinToEvm => {
                let source_locktime = view.htlc()?.params().locktime;
                let now = u32::try_from(self.clock.now())
                    .map_err(|_| EscrowError::Chain("clock beyond deployedAt range".into()))?;
                validate_bitcoin_source(
                    source_locktime,
                    &view.immutables.timelocks.with_deployed_at(now),
                )?;
                let instance = self
                    .evm
                    .create_destination_escrow(
                        view.terms.taker.account,
                        view.immutables,
                        u64::from(source_locktime),
                        view.immutables.required_native_value(),
                    )
                    .await?;
                (
                    LegLocator::Evm(instance.address),
                    view.immutables.with_deployed_at(instance.deployed_at),
                    view.htlc.clone(),
                )
            }
        };

        self.update(&id, |session| {
            session.record.set_destination(locator)?;
            session.immutables = immutables;
            session.htlc = htlc;
            Ok(())
        })?;
        log_swap_event!(
            info,
            id,
            SwapState::DestinationLocked,
            "[xswap] Swap destination locked",
            leg = ?locator
        );
        Ok(locator)
    }

    async fn claim_destination(&self, id: Uuid) -> Result<Secret, EscrowError> {
        let (view, _in_flight) = self.reserve(&id, SwapState::DestinationClaimed, |record| {
            ensure_can(record, SwapState::DestinationClaimed)
        })?;
        let secret = self.secret(&id)?;

        match view.record.destination {
            Some(LegLocator::Bitcoin(outpoint)) => {
                let htlc = view.htlc()?;
                self.spend_htlc(outpoint, &view.terms.maker, 0, |sig| {
                    htlc.redeem_witness(sig, &secret)
                })
                .await?;
            }
            Some(LegLocator::Evm(address)) => {
                self.evm
                    .execute(
                        address,
                        &view.immutables,
                        TransitionRequest::withdraw(view.terms.taker.account, secret),
                    )
                    .await?;
            }
            None => return Err(not_locked(&view.record, "destination")),
        }

        self.update(&id, |session| session.record.set_claimed(secret))?;
        log_swap_event!(
            info,
            id,
            SwapState::DestinationClaimed,
            "[xswap] Swap destination claimed, secret revealed"
        );
        Ok(secret)
    }

    async fn complete_source(&self, id: Uuid) -> Result<(), EscrowError> {
        let (view, _in_flight) = self.reserve(&id, SwapState::Completed, |record| {
            if record.state == SwapState::DestinationClaimed {
                return Ok(());
            }
            ensure_can(record, SwapState::DestinationClaimed)
        })?;

        let secret = self.observe_secret(&view).await?;
        let source_ok = match view.evm_role() {
            Role::Source => HashScheme::Keccak256.verify(&secret, &view.immutables.hashlock),
            Role::Destination => HashScheme::Sha256.verify(&secret, &view.bitcoin_hashlock),
        };
        if !source_ok {
            return Err(EscrowError::InvalidSecret);
        }
        debug!("[xswap] Swap {} observed secret on destination chain", id);

        if view.record.state == SwapState::DestinationLocked {
            self.update(&id, |session| session.record.set_claimed(secret))?;
        }

        match view.record.source {
            Some(LegLocator::Evm(address)) => {
                self.evm
                    .execute(
                        address,
                        &view.immutables,
                        TransitionRequest::withdraw(view.terms.taker.account, secret),
                    )
                    .await?;
            }
            Some(LegLocator::Bitcoin(outpoint)) => {
                let htlc = view.htlc()?;
                self.spend_htlc(outpoint, &view.terms.taker, 0, |sig| {
                    htlc.redeem_witness(sig, &secret)
                })
                .await?;
            }
            None => return Err(not_locked(&view.record, "source")),
        }

        self.update(&id, |session| session.record.transition_to(SwapState::Completed))?;
        log_swap_event!(info, id, SwapState::Completed, "[xswap] Swap completed");
        Ok(())
    }

    async fn refund(&self, id: Uuid, role: Role) -> Result<(), EscrowError> {
        let (view, _in_flight) = self.reserve(&id, SwapState::Refunded, |record| {
            if record.state == SwapState::Refunded {
                return Ok(());
            }
            ensure_can(record, SwapState::Refunded)
        })?;
        let already_refunded = view.record.state == SwapState::Refunded;

        let locator = match role {
            Role::Source => view.record.source,
            Role::Destination => view.record.destination,
        }
        .ok_or_else(|| not_locked(&view.record, role.as_str()))?;

        match locator {
            LegLocator::Evm(address) => {
                self.evm
                    .execute(
                        address,
                        &view.immutables,
                        TransitionRequest::cancel(view.terms.taker.account),
                    )
                    .await?;
            }
            LegLocator::Bitcoin(outpoint) => {
                let htlc = view.htlc()?;
                let refunder = match role {
                    Role::Source => &view.terms.maker,
                    Role::Destination => &view.terms.taker,
                };
                self.spend_htlc(outpoint, refunder, htlc.params().locktime, |sig| {
                    htlc.refund_witness(sig)
                })
                .await?;
            }
        }

        if !already_refunded {
            self.update(&id, |session| session.record.transition_to(SwapState::Refunded))?;
        }
        log_swap_event!(
            info,
            id,
            SwapState::Refunded,
            "[xswap] Swap leg refunded",
            role = %role
        );
        Ok(())
    }

    fn get_swap(&self, id: &Uuid) -> Option<SwapRecord> {
        self.sessions.read().get(id).map(|s| s.record.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::{
        InMemoryBitcoinChain, InMemoryEscrowFactory, ManualClock, Secp256k1Signer,
        Secp256k1Verifier,
    };
    use crate::domain::{Address, ErrorClass, StageOffsets, U256};

    const T0: u64 = 1_700_000_000;

    type Coordinator = SwapCoordinator<InMemoryEscrowFactory, InMemoryBitcoinChain, ManualClock>;

    struct Harness {
        coordinator: Coordinator,
        factory: Arc<InMemoryEscrowFactory>,
        chain: Arc<InMemoryBitcoinChain>,
        clock: Arc<ManualClock>,
        maker: Party,
        taker: Party,
    }

    fn token() -> Address {
        Address::new([0x70; 20])
    }

    fn party(tag: u8) -> Party {
        Party {
            account: Address::new([tag; 20]),
            signer: Arc::new(Secp256k1Signer::generate()),
            payout_script: vec![0x00, 0x14, tag],
        }
    }

    fn harness() -> Harness {
        let clock = Arc::new(ManualClock::new(T0));
        let config = EscrowConfig::default();
        let factory = Arc::new(InMemoryEscrowFactory::new(config.clone(), clock.clone()));
        let chain = Arc::new(InMemoryBitcoinChain::new(
            Arc::new(Secp256k1Verifier),
            clock.clone(),
        ));
        let maker = party(0xAA);
        let taker = party(0xBB);
        for account in [maker.account, taker.account] {
            factory.mint(account, Address::NATIVE, U256::from(1_000u64));
            factory.mint(account, token(), U256::from(1_000u64));
        }
        Harness {
            coordinator: SwapCoordinator::new(
                config,
                factory.clone(),
                chain.clone(),
                clock.clone(),
            ),
            factory,
            chain,
            clock,
            maker,
            taker,
        }
    }

    fn terms(h: &Harness, direction: SwapDirection, btc_locktime_offset: u32) -> SwapTerms {
        SwapTerms {
            order_hash: Hash::new([0x01; 32]),
            direction,
            maker: h.maker.clone(),
            taker: h.taker.clone(),
            token: token(),
            evm_amount: U256::from(100u64),
            safety_deposit: U256::from(1u64),
            offsets: StageOffsets {
                src_withdrawal: 100,
                src_public_withdrawal: 200,
                src_cancellation: 300,
                src_public_cancellation: 400,
                dst_withdrawal: 100,
                dst_public_withdrawal: 200,
                dst_cancellation: 300,
            },
            btc_amount_sats: 50_000,
            btc_locktime_offset,
        }
    }

    #[tokio::test]
    async fn test_evm_to_bitcoin_happy_path() {
        let h = harness();
        let record = h
            .coordinator
            .initiate(terms(&h, SwapDirection::EvmToBitcoin, 200))
            .await
            .unwrap();
        let id = record.id;

        h.coordinator.lock_source(id).await.unwrap();
        h.coordinator.lock_destination(id).await.unwrap();
        assert!(h.coordinator.htlc_address(&id).unwrap().starts_with("bcrt1q"));

        let secret = h.coordinator.claim_destination(id).await.unwrap();
        assert_eq!(h.chain.balance_of(&h.maker.payout_script), 50_000);

        h.clock.advance_time(100);
        h.coordinator.complete_source(id).await.unwrap();
        assert_eq!(h.factory.balance_of(h.taker.account, token()), U256::from(1_100u64));
        assert_eq!(h.factory.balance_of(h.maker.account, token()), U256::from(900u64));

        let record = h.coordinator.get_swap(&id).unwrap();
        assert_eq!(record.state, SwapState::Completed);
        assert_eq!(record.revealed_secret, Some(secret));
    }

    #[tokio::test]
    async fn test_bitcoin_to_evm_happy_path() {
        let h = harness();
        let id = h
            .coordinator
            .initiate(terms(&h, SwapDirection::BitcoinToEvm, 1_000))
            .await
            .unwrap()
            .id;

        h.coordinator.lock_source(id).await.unwrap();
        h.coordinator.lock_destination(id).await.unwrap();

        h.clock.advance_time(100);
        h.coordinator.claim_destination(id).await.unwrap();
        assert_eq!(h.factory.balance_of(h.maker.account, token()), U256::from(1_100u64));

        h.coordinator.complete_source(id).await.unwrap();
        assert_eq!(h.chain.balance_of(&h.taker.payout_script), 50_000);
        assert_eq!(h.coordinator.get_swap(&id).unwrap().state, SwapState::Completed);
    }

    #[tokio::test]
    async fn test_destination_must_expire_before_source() {
        let h = harness();
        let id = h
            .coordinator
            .initiate(terms(&h, SwapDirection::EvmToBitcoin, 300))
            .await
            .unwrap()
            .id;
        h.coordinator.lock_source(id).await.unwrap();

        let err = h.coordinator.lock_destination(id).await.unwrap_err();
        assert!(matches!(err, EscrowError::CrossChainOrdering { .. }));
        assert_eq!(h.coordinator.get_swap(&id).unwrap().state, SwapState::SourceLocked);
        assert!(h.coordinator.bitcoin_htlc(&id).is_none());
    }

    #[tokio::test]
    async fn test_bitcoin_source_must_outlast_evm_destination() {
        let h = harness();
        let id = h
            .coordinator
            .initiate(terms(&h, SwapDirection::BitcoinToEvm, 300))
            .await
            .unwrap()
            .id;
        h.coordinator.lock_source(id).await.unwrap();
        let err = h.coordinator.lock_destination(id).await.unwrap_err();
        assert!(matches!(err, EscrowError::CrossChainOrdering { .. }));
        assert_eq!(h.factory.balance_of(h.taker.account, token()), U256::from(1_000u64));

        // The failed attempt released the swap.
        let err = h.coordinator.lock_destination(id).await.unwrap_err();
        assert!(matches!(err, EscrowError::CrossChainOrdering { .. }));
    }

    /// Bitcoin chain that yields before funding, so concurrent calls interleave.
    struct YieldingChain(Arc<InMemoryBitcoinChain>);

    #[async_trait]
    impl BitcoinHtlcChain for YieldingChain {
        async fn fund(
            &self,
            script_pubkey: Vec<u8>,
            value_sats: u64,
        ) -> Result<OutPoint, EscrowError> {
            tokio::task::yield_now().await;
            self.0.fund(script_pubkey, value_sats).await
        }

        async fn spend(&self, tx: SpendTransaction) -> Result<Hash, EscrowError> {
            self.0.spend(tx).await
        }

        async fn spend_digest(
            &self,
            outpoint: OutPoint,
            recipient_script: &[u8],
            tx_lock_time: u32,
        ) -> Result<[u8; 32], EscrowError> {
            self.0
                .spend_digest(outpoint, recipient_script, tx_lock_time)
                .await
        }

        async fn spending_witness(
            &self,
            outpoint: OutPoint,
        ) -> Result<Option<Vec<Vec<u8>>>, EscrowError> {
            self.0.spending_witness(outpoint).await
        }

        async fn median_time_past(&self) -> Result<u64, EscrowError> {
            self.0.median_time_past().await
        }
    }

    #[tokio::test]
    async fn test_concurrent_lock_source_funds_once() {
        let h = harness();
        let coordinator = SwapCoordinator::new(
            EscrowConfig::default(),
            h.factory.clone(),
            Arc::new(YieldingChain(h.chain.clone())),
            h.clock.clone(),
        );
        let id = coordinator
            .initiate(terms(&h, SwapDirection::BitcoinToEvm, 1_000))
            .await
            .unwrap()
            .id;

        let (a, b) = tokio::join!(coordinator.lock_source(id), coordinator.lock_source(id));
        assert_ne!(a.is_ok(), b.is_ok());
        let rejected = if a.is_ok() { b } else { a }.unwrap_err();
        assert!(matches!(rejected, EscrowError::SwapInFlight { .. }));

        let htlc = coordinator.bitcoin_htlc(&id).unwrap();
        assert_eq!(h.chain.balance_of(&htlc.p2wsh_script_pubkey()), 50_000);
        assert_eq!(coordinator.get_swap(&id).unwrap().state, SwapState::SourceLocked);

        coordinator.lock_destination(id).await.unwrap();
        assert_eq!(
            coordinator.get_swap(&id).unwrap().state,
            SwapState::DestinationLocked
        );
    }

    #[tokio::test]
    async fn test_refund_both_legs() {
        let h = harness();
        let id = h
            .coordinator
            .initiate(terms(&h, SwapDirection::EvmToBitcoin, 200))
            .await
            .unwrap()
            .id;
        h.coordinator.lock_source(id).await.unwrap();
        h.coordinator.lock_destination(id).await.unwrap();

        let err = h.coordinator.refund(id, Role::Destination).await.unwrap_err();
        assert_eq!(err.class(), ErrorClass::Authorization);

        h.clock.set_time(T0 + 201);
        h.coordinator.refund(id, Role::Destination).await.unwrap();
        assert_eq!(h.chain.balance_of(&h.taker.payout_script), 50_000);
        assert_eq!(h.coordinator.get_swap(&id).unwrap().state, SwapState::Refunded);

        h.clock.set_time(T0 + 300);
        h.coordinator.refund(id, Role::Source).await.unwrap();
        assert_eq!(h.factory.balance_of(h.maker.account, token()), U256::from(1_000u64));
    }

    #[tokio::test]
    async fn test_complete_source_needs_revealed_secret() {
        let h = harness();
        let id = h
            .coordinator
            .initiate(terms(&h, SwapDirection::BitcoinToEvm, 1_000))
            .await
            .unwrap()
            .id;
        h.coordinator.lock_source(id).await.unwrap();
        h.coordinator.lock_destination(id).await.unwrap();

        let err = h.coordinator.complete_source(id).await.unwrap_err();
        assert!(matches!(err, EscrowError::SecretNotRevealed(_)));
    }

    #[tokio::test]
    async fn test_out_of_order_calls_rejected() {
        let h = harness();
        let id = h
            .coordinator
            .initiate(terms(&h, SwapDirection::EvmToBitcoin, 200))
            .await
            .unwrap()
            .id;
        assert!(matches!(
            h.coordinator.lock_destination(id).await,
            Err(EscrowError::InvalidSwapTransition { .. })
        ));
        assert!(matches!(
            h.coordinator.lock_source(Uuid::new_v4()).await,
            Err(EscrowError::UnknownSwap(_))
        ));
    }

    #[tokio::test]
    async fn test_initiate_rejects_unordered_offsets() {
        let h = harness();
        let mut bad = terms(&h, SwapDirection::BitcoinToEvm, 1_000);
        bad.offsets.dst_public_withdrawal = 50;
        let err = h.coordinator.initiate(bad).await.unwrap_err();
        assert!(matches!(err, EscrowError::InvalidStageOrder { role: Role::Destination, .. }));
    }
}
