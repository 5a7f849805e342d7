//! # Cross-Chain Swap Tests
//!
//! Full swaps driven by the coordinator over the in-memory EVM factory and
//! the in-memory Bitcoin chain, sharing one manual clock.
//!
//! Stage offsets are `src {100, 200, 300, 400}` and `dst {100, 200, 300}`
//! seconds after deployment. The Bitcoin leg locks 50,000 sats.

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use proptest::prelude::*;
    use xswap_escrow::adapters::{
        InMemoryBitcoinChain, InMemoryEscrowFactory, ManualClock, Secp256k1Signer,
        Secp256k1Verifier,
    };
    use xswap_escrow::algorithms::bitcoin_script::extract_secret;
    use xswap_escrow::{
        Address, BitcoinHtlcChain, EscrowConfig, EscrowError, EscrowEvent, EvmEscrowChain, Hash,
        HashScheme, LegLocator, Party, Role, ScriptError, StageOffsets, SwapApi, SwapCoordinator,
        SwapDirection, SwapState, SwapTerms, Transition, TransitionRequest, U256,
    };

    const T0: u64 = 1_700_000_000;
    const SATS: u64 = 50_000;

    type Coordinator = SwapCoordinator<InMemoryEscrowFactory, InMemoryBitcoinChain, ManualClock>;

    struct Network {
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

    fn stranger() -> Address {
        Address::new([0xCC; 20])
    }

    fn party(tag: u8) -> Party {
        Party {
            account: Address::new([tag; 20]),
            signer: Arc::new(Secp256k1Signer::generate()),
            payout_script: vec![0x00, 0x14, tag],
        }
    }

    fn network() -> Network {
        xswap_telemetry::init_test_logging();
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
            factory.mint(account, Address::NATIVE, U256::from(10u64));
            factory.mint(account, token(), U256::from(1_000u64));
        }
        Network {
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

    impl Network {
        fn terms(&self, direction: SwapDirection, btc_locktime_offset: u32) -> SwapTerms {
            SwapTerms {
                order_hash: Hash::new([0x42; 32]),
                direction,
                maker: self.maker.clone(),
                taker: self.taker.clone(),
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
                btc_amount_sats: SATS,
                btc_locktime_offset,
            }
        }

        async fn locked(&self, direction: SwapDirection, btc_locktime_offset: u32) -> uuid::Uuid {
            let id = self
                .coordinator
                .initiate(self.terms(direction, btc_locktime_offset))
                .await
                .unwrap()
                .id;
            self.coordinator.lock_source(id).await.unwrap();
            self.coordinator.lock_destination(id).await.unwrap();
            id
        }

        fn tokens(&self, holder: Address) -> U256 {
            self.factory.balance_of(holder, token())
        }
    }

    // =============================================================================
    // HAPPY PATHS
    // =============================================================================

    #[tokio::test]
    async fn test_evm_to_bitcoin_swap_settles_both_legs() {
        let net = network();
        let id = net.locked(SwapDirection::EvmToBitcoin, 200).await;

        let record = net.coordinator.get_swap(&id).unwrap();
        assert_eq!(record.state, SwapState::DestinationLocked);
        let Some(LegLocator::Evm(escrow)) = record.source else {
            panic!("EVM source expected, got {:?}", record.source);
        };
        let Some(LegLocator::Bitcoin(htlc_outpoint)) = record.destination else {
            panic!("Bitcoin destination expected, got {:?}", record.destination);
        };
        let htlc = net.coordinator.bitcoin_htlc(&id).unwrap();
        assert_eq!(htlc.params().locktime as u64, T0 + 200);
        assert_eq!(net.chain.balance_of(&htlc.p2wsh_script_pubkey()), SATS);
        assert!(net.coordinator.htlc_address(&id).unwrap().starts_with("bcrt1q"));

        let secret = net.coordinator.claim_destination(id).await.unwrap();
        assert_eq!(net.chain.balance_of(&net.maker.payout_script), SATS);
        assert!(!net.chain.is_unspent(&htlc_outpoint));

        net.clock.advance_time(120);
        net.coordinator.complete_source(id).await.unwrap();
        assert_eq!(net.tokens(net.taker.account), U256::from(1_100u64));
        assert_eq!(net.tokens(net.maker.account), U256::from(900u64));

        let record = net.coordinator.get_swap(&id).unwrap();
        assert_eq!(record.state, SwapState::Completed);
        assert_eq!(record.revealed_secret, Some(secret));

        match net.factory.events().as_slice() {
            [EscrowEvent::EscrowCreated {
                address,
                role: Role::Source,
                ..
            }, EscrowEvent::EscrowWithdrawn {
                address: withdrawn,
                transition: Transition::Withdraw,
                secret: published,
                recipient,
                caller,
            }] => {
                assert_eq!(*address, escrow);
                assert_eq!(*withdrawn, escrow);
                assert_eq!(*published, secret);
                assert_eq!(*recipient, net.taker.account);
                assert_eq!(*caller, net.taker.account);
            }
            other => panic!("Unexpected event log: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_bitcoin_to_evm_swap_settles_both_legs() {
        let net = network();
        let id = net.locked(SwapDirection::BitcoinToEvm, 1_000).await;

        let immutables = net.coordinator.immutables(&id).unwrap();
        assert_eq!(u64::from(immutables.timelocks.deployed_at()), T0);
        assert_eq!(net.tokens(net.taker.account), U256::from(900u64));

        net.clock.advance_time(100);
        let secret = net.coordinator.claim_destination(id).await.unwrap();
        assert_eq!(net.tokens(net.maker.account), U256::from(1_100u64));
        assert!(HashScheme::Keccak256.verify(&secret, &immutables.hashlock));
        assert!(HashScheme::Sha256.verify(
            &secret,
            &net.coordinator.bitcoin_htlc(&id).unwrap().params().secret_hash
        ));

        net.coordinator.complete_source(id).await.unwrap();
        assert_eq!(net.chain.balance_of(&net.taker.payout_script), SATS);
        assert_eq!(net.coordinator.get_swap(&id).unwrap().state, SwapState::Completed);
    }

    // =============================================================================
    // ADVERSARIAL PATHS
    // =============================================================================

    #[tokio::test]
    async fn test_stranger_completes_source_after_public_reveal() {
        let net = network();
        let id = net.locked(SwapDirection::EvmToBitcoin, 200).await;
        net.coordinator.claim_destination(id).await.unwrap();

        // Anyone watching Bitcoin can lift the secret from the redeem witness.
        let record = net.coordinator.get_swap(&id).unwrap();
        let (Some(LegLocator::Evm(escrow)), Some(LegLocator::Bitcoin(outpoint))) =
            (record.source, record.destination)
        else {
            panic!("Unexpected legs: {:?}", record);
        };
        let witness = net.chain.spending_witness(outpoint).await.unwrap().unwrap();
        let secret = extract_secret(&witness).unwrap();
        let immutables = net.coordinator.immutables(&id).unwrap();

        net.clock.set_time(T0 + 150);
        let err = net
            .factory
            .execute(escrow, &immutables, TransitionRequest::public_withdraw(stranger(), secret))
            .await
            .unwrap_err();
        assert!(matches!(err, EscrowError::NotYetOpen { .. }));

        net.clock.set_time(T0 + 250);
        net.factory
            .execute(escrow, &immutables, TransitionRequest::public_withdraw(stranger(), secret))
            .await
            .unwrap();
        assert_eq!(net.tokens(net.taker.account), U256::from(1_100u64));
        assert_eq!(
            net.factory.balance_of(stranger(), Address::NATIVE),
            U256::from(1u64)
        );

        let err = net.coordinator.complete_source(id).await.unwrap_err();
        assert!(matches!(err, EscrowError::AlreadyResolved { .. }));
        assert_eq!(net.tokens(net.taker.account), U256::from(1_100u64));
    }

    #[tokio::test]
    async fn test_abandoned_bitcoin_to_evm_swap_refunds_both_legs() {
        let net = network();
        let id = net.locked(SwapDirection::BitcoinToEvm, 1_000).await;
        let htlc_script = net.coordinator.bitcoin_htlc(&id).unwrap().p2wsh_script_pubkey();

        net.clock.set_time(T0 + 299);
        let err = net.coordinator.refund(id, Role::Destination).await.unwrap_err();
        assert!(matches!(
            err,
            EscrowError::NotYetOpen { transition: Transition::Cancel, .. }
        ));

        net.clock.set_time(T0 + 300);
        net.coordinator.refund(id, Role::Destination).await.unwrap();
        assert_eq!(net.tokens(net.taker.account), U256::from(1_000u64));
        assert_eq!(net.coordinator.get_swap(&id).unwrap().state, SwapState::Refunded);

        // Final only once the median time has passed the locktime.
        net.clock.set_time(T0 + 1_000);
        let err = net.coordinator.refund(id, Role::Source).await.unwrap_err();
        assert!(matches!(
            err,
            EscrowError::Script(ScriptError::LocktimeNotFinal { .. })
        ));
        assert_eq!(net.chain.balance_of(&htlc_script), SATS);

        net.clock.set_time(T0 + 1_001);
        net.coordinator.refund(id, Role::Source).await.unwrap();
        assert_eq!(net.chain.balance_of(&net.maker.payout_script), SATS);
        assert_eq!(net.chain.balance_of(&htlc_script), 0);
    }

    #[tokio::test]
    async fn test_completed_swap_cannot_be_refunded() {
        let net = network();
        let id = net.locked(SwapDirection::BitcoinToEvm, 1_000).await;
        net.clock.advance_time(100);
        net.coordinator.claim_destination(id).await.unwrap();
        net.coordinator.complete_source(id).await.unwrap();

        net.clock.set_time(T0 + 2_000);
        let err = net.coordinator.refund(id, Role::Source).await.unwrap_err();
        assert!(matches!(err, EscrowError::InvalidSwapTransition { .. }));
        assert_eq!(net.chain.balance_of(&net.maker.payout_script), 0);
        assert_eq!(net.chain.balance_of(&net.taker.payout_script), SATS);
    }

    // =============================================================================
    // SEQUENCING PROPERTY
    // =============================================================================

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(24))]

        #[test]
        fn prop_bitcoin_destination_locks_iff_it_expires_first(offset in 1u32..600) {
            let runtime = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .unwrap();
            let (result, funded) = runtime.block_on(async {
                let net = network();
                let id = net
                    .coordinator
                    .initiate(net.terms(SwapDirection::EvmToBitcoin, offset))
                    .await
                    .unwrap()
                    .id;
                net.coordinator.lock_source(id).await.unwrap();
                let result = net.coordinator.lock_destination(id).await;
                (result, net.coordinator.bitcoin_htlc(&id).is_some())
            });

            if offset < 300 {
                prop_assert!(result.is_ok());
                prop_assert!(funded);
            } else {
                prop_assert!(
                    matches!(result, Err(EscrowError::CrossChainOrdering { .. })),
                    "Expected CrossChainOrdering"
                );
                prop_assert!(!funded);
            }
        }
    }
}
