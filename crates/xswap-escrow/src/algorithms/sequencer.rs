//! # Cross-Chain Sequencer
//!
//! Creation-time checks binding the two legs' windows together. The
//! destination leg must be fully resolved (claimed or refunded) before the
//! source leg's cancellation opens, otherwise the party that revealed the
//! secret could lose the source asset to a refund.
//!
//! Every check fails closed: a violation aborts the creation before any
//! value moves.

use crate::domain::{EscrowError, Role, Stage, Timelocks};

/// Strict stage ordering within one leg.
pub fn validate_stage_order(timelocks: &Timelocks, role: Role) -> Result<(), EscrowError> {
    for pair in Stage::for_role(role).windows(2) {
        let (earlier, later) = (pair[0], pair[1]);
        let (earlier_offset, later_offset) = (timelocks.offset(earlier), timelocks.offset(later));
        if earlier_offset >= later_offset {
            return Err(EscrowError::InvalidStageOrder {
                role,
                earlier,
                earlier_offset,
                later,
                later_offset,
            });
        }
    }
    Ok(())
}

/// Both legs ordered, and destination cancellation strictly before source
/// cancellation in absolute time.
pub fn validate(source: &Timelocks, destination: &Timelocks) -> Result<(), EscrowError> {
    validate_stage_order(source, Role::Source)?;
    validate_stage_order(destination, Role::Destination)?;
    let destination_cancellation = destination.get(Stage::DstCancellation);
    let source_cancellation = source.get(Stage::SrcCancellation);
    if destination_cancellation >= source_cancellation {
        return Err(EscrowError::CrossChainOrdering {
            destination_cancellation,
            source_cancellation,
        });
    }
    Ok(())
}

/// Check run by the factory when the destination escrow is created.
///
/// `destination` must already carry its deployment timestamp.
/// `src_cancellation_deadline` is the source cancellation time the caller
/// observed on the other chain. Equality is accepted.
pub fn validate_destination_creation(
    destination: &Timelocks,
    src_cancellation_deadline: u64,
) -> Result<(), EscrowError> {
    validate_stage_order(destination, Role::Destination)?;
    let destination_cancellation = destination.get(Stage::DstCancellation);
    if destination_cancellation > src_cancellation_deadline {
        return Err(EscrowError::InvalidCreationTime {
            destination_cancellation,
            source_cancellation_deadline: src_cancellation_deadline,
        });
    }
    Ok(())
}

/// Bitcoin HTLC holding the destination leg: its refund locktime must come
/// strictly before the EVM source leg's cancellation.
pub fn validate_bitcoin_destination(
    btc_locktime: u32,
    source: &Timelocks,
) -> Result<(), EscrowError> {
    validate_stage_order(source, Role::Source)?;
    let destination_cancellation = u64::from(btc_locktime);
    let source_cancellation = source.get(Stage::SrcCancellation);
    if destination_cancellation >= source_cancellation {
        return Err(EscrowError::CrossChainOrdering {
            destination_cancellation,
            source_cancellation,
        });
    }
    Ok(())
}

/// Bitcoin HTLC holding the source leg: the EVM destination leg's
/// cancellation must come strictly before the Bitcoin refund locktime.
pub fn validate_bitcoin_source(
    btc_locktime: u32,
    destination: &Timelocks,
) -> Result<(), EscrowError> {
    validate_stage_order(destination, Role::Destination)?;
    let destination_cancellation = destination.get(Stage::DstCancellation);
    let source_cancellation = u64::from(btc_locktime);
    if destination_cancellation >= source_cancellation {
        return Err(EscrowError::CrossChainOrdering {
            destination_cancellation,
            source_cancellation,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::StageOffsets;
    use proptest::prelude::*;

    fn offsets() -> StageOffsets {
        StageOffsets {
            src_withdrawal: 10,
            src_public_withdrawal: 120,
            src_cancellation: 500,
            src_public_cancellation: 600,
            dst_withdrawal: 100,
            dst_public_withdrawal: 200,
            dst_cancellation: 300,
        }
    }

    #[test]
    fn test_valid_word() {
        let tl = Timelocks::pack(&offsets()).with_deployed_at(1_000);
        assert!(validate(&tl, &tl).is_ok());
    }

    #[test]
    fn test_destination_order_violation() {
        let tl = Timelocks::pack(&StageOffsets {
            dst_withdrawal: 300,
            dst_public_withdrawal: 200,
            ..offsets()
        });
        let err = validate_stage_order(&tl, Role::Destination).unwrap_err();
        assert!(matches!(
            err,
            EscrowError::InvalidStageOrder {
                earlier: Stage::DstWithdrawal,
                later: Stage::DstPublicWithdrawal,
                ..
            }
        ));
    }

    #[test]
    fn test_equal_stages_rejected() {
        let tl = Timelocks::pack(&StageOffsets {
            src_cancellation: 600,
            ..offsets()
        });
        assert!(validate_stage_order(&tl, Role::Source).is_err());
    }

    #[test]
    fn test_destination_three_stage_ignores_public_cancel_lane() {
        // no destination public cancellation lane exists to be out of order
        let tl = Timelocks::pack(&offsets());
        assert!(validate_stage_order(&tl, Role::Destination).is_ok());
    }

    #[test]
    fn test_cross_chain_ordering_uses_absolute_times() {
        let src = Timelocks::pack(&offsets()).with_deployed_at(1_000);
        // destination deployed 250s later: 1_250 + 300 = 1_550 >= 1_000 + 500
        let dst = Timelocks::pack(&offsets()).with_deployed_at(1_250);
        assert!(matches!(
            validate(&src, &dst),
            Err(EscrowError::CrossChainOrdering {
                destination_cancellation: 1_550,
                source_cancellation: 1_500,
            })
        ));
        let dst = Timelocks::pack(&offsets()).with_deployed_at(1_199);
        assert!(validate(&src, &dst).is_ok());
    }

    #[test]
    fn test_destination_creation_deadline() {
        let dst = Timelocks::pack(&offsets()).with_deployed_at(1_000);
        assert!(validate_destination_creation(&dst, 1_301).is_ok());
        assert!(validate_destination_creation(&dst, 1_300).is_ok());
        assert!(matches!(
            validate_destination_creation(&dst, 1_299),
            Err(EscrowError::InvalidCreationTime { .. })
        ));
    }

    #[test]
    fn test_bitcoin_destination_strictly_before_source_cancellation() {
        let src = Timelocks::pack(&offsets()).with_deployed_at(1_700_000_000);
        assert!(validate_bitcoin_destination(1_700_000_499, &src).is_ok());
        assert!(validate_bitcoin_destination(1_700_000_500, &src).is_err());
    }

    #[test]
    fn test_bitcoin_source_after_destination_cancellation() {
        let dst = Timelocks::pack(&offsets()).with_deployed_at(1_700_000_000);
        assert!(validate_bitcoin_source(1_700_000_301, &dst).is_ok());
        assert!(validate_bitcoin_source(1_700_000_300, &dst).is_err());
    }

    proptest! {
        #[test]
        fn prop_ordered_destination_before_deadline_accepted(
            w in 0u32..1_000,
            gap1 in 1u32..1_000,
            gap2 in 1u32..1_000,
            slack in 0u64..1_000,
            deployed_at in 1_000_000u32..2_000_000,
        ) {
            let tl = Timelocks::pack(&StageOffsets {
                dst_withdrawal: w,
                dst_public_withdrawal: w + gap1,
                dst_cancellation: w + gap1 + gap2,
                ..Default::default()
            })
            .with_deployed_at(deployed_at);
            let deadline = tl.get(Stage::DstCancellation) + slack;
            prop_assert!(validate_destination_creation(&tl, deadline).is_ok());
        }

        #[test]
        fn prop_destination_after_deadline_rejected(
            cancellation in 2u32..100_000,
            shortfall in 1u64..1_000,
            deployed_at in 1_000_000u32..2_000_000,
        ) {
            let tl = Timelocks::pack(&StageOffsets {
                dst_withdrawal: 0,
                dst_public_withdrawal: 1,
                dst_cancellation: cancellation,
                ..Default::default()
            })
            .with_deployed_at(deployed_at);
            let deadline = tl.get(Stage::DstCancellation).saturating_sub(shortfall);
            prop_assert!(validate_destination_creation(&tl, deadline).is_err());
        }
    }
}
