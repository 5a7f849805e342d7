//! # Escrow Lifecycle Scenarios
//!
//! One leg at a time on the in-memory EVM factory, with agreed terms
//! `amount = 100`, `safetyDeposit = 1` and stage offsets
//! `{Withdrawal = 100, PublicWithdrawal = 200, Cancellation = 300, PublicCancellation = 400}`.
//!
//! 1. Destination creation funds the derived address exactly
//! 2. Early withdraw is rejected without moving funds
//! 3. Withdraw in window pays the maker and the caller, once
//! 4. Unattended source leg is publicly cancelled back to the maker
//! 5. Unordered offsets abort creation before funding

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use xswap_escrow::adapters::{InMemoryEscrowFactory, ManualClock};
    use xswap_escrow::{
        Address, EscrowConfig, EscrowError, EscrowEvent, EscrowInstance, EscrowState,
        EvmEscrowChain, Hash, HashScheme, Immutables, Role, Secret, StageOffsets, Timelocks,
        TransitionRequest, U256,
    };

    // =============================================================================
    // TEST FIXTURES
    // =============================================================================

    const T0: u64 = 1_700_000_000;
    const SECRET: Secret = [0x5Eu8; 32];

    fn maker() -> Address {
        Address::new([0xAA; 20])
    }

    fn taker() -> Address {
        Address::new([0xBB; 20])
    }

    fn anyone() -> Address {
        Address::new([0xCC; 20])
    }

    fn token() -> Address {
        Address::new([0x70; 20])
    }

    fn offsets() -> StageOffsets {
        StageOffsets {
            src_withdrawal: 100,
            src_public_withdrawal: 200,
            src_cancellation: 300,
            src_public_cancellation: 400,
            dst_withdrawal: 100,
            dst_public_withdrawal: 200,
            dst_cancellation: 300,
        }
    }

    fn immutables(offsets: &StageOffsets) -> Immutables {
        Immutables {
            order_hash: Hash::new([0x01; 32]),
            hashlock: HashScheme::Keccak256.digest(&SECRET),
            maker: maker(),
            taker: taker(),
            token: token(),
            amount: U256::from(100u64),
            safety_deposit: U256::from(1u64),
            timelocks: Timelocks::pack(offsets),
        }
    }

    struct World {
        factory: InMemoryEscrowFactory,
        clock: Arc<ManualClock>,
    }

    impl World {
        fn new() -> Self {
            xswap_telemetry::init_test_logging();
            let clock = Arc::new(ManualClock::new(T0));
            let factory = InMemoryEscrowFactory::new(EscrowConfig::default(), clock.clone());
            for account in [maker(), taker()] {
                factory.mint(account, Address::NATIVE, U256::from(10u64));
                factory.mint(account, token(), U256::from(1_000u64));
            }
            Self { factory, clock }
        }

        fn at(&self, offset: u64) {
            self.clock.set_time(T0 + offset);
        }

        fn token_of(&self, holder: Address) -> U256 {
            self.factory.balance_of(holder, token())
        }

        fn native_of(&self, holder: Address) -> U256 {
            self.factory.balance_of(holder, Address::NATIVE)
        }

        async fn destination(&self) -> (EscrowInstance, Immutables) {
            let imm = immutables(&offsets());
            let instance = self
                .factory
                .create_destination_escrow(taker(), imm, T0 + 300, U256::from(1u64))
                .await
                .expect("destination creation");
            (instance.clone(), imm.with_deployed_at(instance.deployed_at))
        }

        async fn source(&self) -> (EscrowInstance, Immutables) {
            let imm = immutables(&offsets());
            let instance = self
                .factory
                .create_source_escrow(maker(), imm, U256::from(1u64))
                .await
                .expect("source creation");
            (instance.clone(), imm.with_deployed_at(instance.deployed_at))
        }
    }

    // =============================================================================
    // SCENARIOS
    // =============================================================================

    #[tokio::test]
    async fn test_destination_creation_funds_derived_address() {
        let world = World::new();
        let (instance, stamped) = world.destination().await;

        assert_eq!(u64::from(stamped.timelocks.deployed_at()), T0);
        assert_eq!(
            instance.address,
            world.factory.address_of(Role::Destination, &stamped)
        );
        assert_eq!(world.token_of(instance.address), U256::from(100u64));
        assert_eq!(world.native_of(instance.address), U256::from(1u64));

        match world.factory.events().as_slice() {
            [EscrowEvent::EscrowCreated {
                address,
                role,
                hashlock,
                maker: m,
                taker: t,
                ..
            }] => {
                assert_eq!(*address, instance.address);
                assert_eq!(*role, Role::Destination);
                assert_eq!(*hashlock, stamped.hashlock);
                assert_eq!((*m, *t), (maker(), taker()));
            }
            other => panic!("Expected one EscrowCreated event, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_withdraw_before_window_moves_nothing() {
        let world = World::new();
        let (instance, stamped) = world.destination().await;

        world.at(50);
        let err = world
            .factory
            .execute(instance.address, &stamped, TransitionRequest::withdraw(taker(), SECRET))
            .await
            .unwrap_err();

        assert!(matches!(err, EscrowError::NotYetOpen { .. }));
        assert!(err.class().is_retriable());
        assert_eq!(world.token_of(instance.address), U256::from(100u64));
        assert_eq!(world.token_of(maker()), U256::from(1_000u64));
        assert_eq!(
            world.factory.escrow(instance.address).await.unwrap().unwrap().state,
            EscrowState::Deployed
        );
    }

    #[tokio::test]
    async fn test_withdraw_in_window_pays_maker_once() {
        let world = World::new();
        let (instance, stamped) = world.destination().await;

        world.at(150);
        world
            .factory
            .execute(instance.address, &stamped, TransitionRequest::withdraw(taker(), SECRET))
            .await
            .unwrap();

        assert_eq!(world.token_of(maker()), U256::from(1_100u64));
        assert_eq!(world.token_of(instance.address), U256::zero());
        assert_eq!(world.native_of(taker()), U256::from(10u64));
        assert_eq!(
            world.factory.revealed_secret(instance.address).await.unwrap(),
            Some(SECRET)
        );

        let retries = [
            (150, TransitionRequest::withdraw(taker(), SECRET)),
            (250, TransitionRequest::public_withdraw(anyone(), SECRET)),
            (300, TransitionRequest::cancel(taker())),
        ];
        for (offset, request) in retries {
            world.at(offset);
            let err = world
                .factory
                .execute(instance.address, &stamped, request)
                .await
                .unwrap_err();
            assert!(matches!(err, EscrowError::AlreadyResolved { .. }));
        }
        assert_eq!(world.token_of(maker()), U256::from(1_100u64));
    }

    #[tokio::test]
    async fn test_unattended_source_publicly_cancelled() {
        let world = World::new();
        let (instance, stamped) = world.source().await;

        world.at(350);
        let err = world
            .factory
            .execute(instance.address, &stamped, TransitionRequest::public_cancel(anyone()))
            .await
            .unwrap_err();
        assert!(matches!(err, EscrowError::NotYetOpen { opens_at, .. } if opens_at == T0 + 400));

        world.at(400);
        world
            .factory
            .execute(instance.address, &stamped, TransitionRequest::public_cancel(anyone()))
            .await
            .unwrap();

        assert_eq!(world.token_of(maker()), U256::from(1_000u64));
        assert_eq!(world.native_of(anyone()), U256::from(1u64));
        assert_eq!(
            world.factory.escrow(instance.address).await.unwrap().unwrap().state,
            EscrowState::PubliclyCancelled
        );
    }

    #[tokio::test]
    async fn test_taker_cancel_after_cancellation_opens() {
        let world = World::new();
        let (instance, stamped) = world.source().await;

        world.at(350);
        let err = world
            .factory
            .execute(instance.address, &stamped, TransitionRequest::cancel(anyone()))
            .await
            .unwrap_err();
        assert!(matches!(err, EscrowError::InvalidCaller { .. }));

        world
            .factory
            .execute(instance.address, &stamped, TransitionRequest::cancel(taker()))
            .await
            .unwrap();
        assert_eq!(world.token_of(maker()), U256::from(1_000u64));
        assert_eq!(world.native_of(taker()), U256::from(11u64));
    }

    #[tokio::test]
    async fn test_destination_has_no_public_cancel() {
        let world = World::new();
        let (instance, stamped) = world.destination().await;

        world.at(1_000);
        let err = world
            .factory
            .execute(instance.address, &stamped, TransitionRequest::public_cancel(anyone()))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            EscrowError::UnsupportedTransition { role: Role::Destination, .. }
        ));

        world
            .factory
            .execute(instance.address, &stamped, TransitionRequest::cancel(taker()))
            .await
            .unwrap();
        assert_eq!(world.token_of(taker()), U256::from(1_000u64));
    }

    #[tokio::test]
    async fn test_unordered_offsets_rejected_before_funding() {
        let world = World::new();
        let mut bad = offsets();
        bad.dst_withdrawal = 300;
        bad.dst_public_withdrawal = 200;

        let err = world
            .factory
            .create_destination_escrow(taker(), immutables(&bad), T0 + 1_000, U256::from(1u64))
            .await
            .unwrap_err();

        assert!(matches!(err, EscrowError::InvalidStageOrder { role: Role::Destination, .. }));
        assert!(!err.class().is_retriable());
        assert_eq!(world.token_of(taker()), U256::from(1_000u64));
        assert_eq!(world.native_of(taker()), U256::from(10u64));
        assert!(world.factory.events().is_empty());
    }

    #[tokio::test]
    async fn test_tampered_immutables_rejected() {
        let world = World::new();
        let (instance, stamped) = world.destination().await;

        world.at(150);
        let mut tampered = stamped;
        tampered.amount = U256::from(1_000u64);
        let err = world
            .factory
            .execute(instance.address, &tampered, TransitionRequest::withdraw(taker(), SECRET))
            .await
            .unwrap_err();
        assert!(matches!(err, EscrowError::CommitmentMismatch { .. }));
        assert_eq!(world.token_of(instance.address), U256::from(100u64));
    }
}
