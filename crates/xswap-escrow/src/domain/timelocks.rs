//! # Packed Timelocks
//!
//! Seven stage offsets and the deployment timestamp packed into one 256-bit
//! word, one 32-bit lane each:
//!
//! ```text
//! bits    224..256   192..224  160..192  128..160  96..128  64..96  32..64  0..32
//! lane        7          6         5         4        3       2       1      0
//!         deployedAt  DstCan   DstPubWd   DstWd    SrcPubCan SrcCan SrcPubWd SrcWd
//! ```
//!
//! Offsets are seconds relative to `deployedAt`, so the same word validates
//! identically whenever deployment actually happens.
//!
//! Offsets wider than 32 bits are unrepresentable by type; a deployment
//! timestamp past `u32::MAX` is a caller contract violation.

use super::value_objects::{Role, U256};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Bit offset of the deployment timestamp lane.
pub const DEPLOYED_AT_OFFSET: usize = 224;

const LANE_MASK: u64 = 0xffff_ffff;

/// Timelock stages in lane order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[repr(u8)]
pub enum Stage {
    /// Taker may withdraw the source leg.
    SrcWithdrawal = 0,
    /// Anyone may withdraw the source leg for the taker.
    SrcPublicWithdrawal = 1,
    /// Taker may cancel the source leg.
    SrcCancellation = 2,
    /// Anyone may cancel the source leg.
    SrcPublicCancellation = 3,
    /// Taker may withdraw the destination leg.
    DstWithdrawal = 4,
    /// Anyone may withdraw the destination leg for the maker.
    DstPublicWithdrawal = 5,
    /// Taker may cancel the destination leg.
    DstCancellation = 6,
}

impl Stage {
    /// All stages in lane order.
    pub const ALL: [Stage; 7] = [
        Stage::SrcWithdrawal,
        Stage::SrcPublicWithdrawal,
        Stage::SrcCancellation,
        Stage::SrcPublicCancellation,
        Stage::DstWithdrawal,
        Stage::DstPublicWithdrawal,
        Stage::DstCancellation,
    ];

    /// Lane index inside the packed word.
    pub const fn lane(self) -> usize {
        self as usize
    }

    /// Leg this stage belongs to.
    pub const fn role(self) -> Role {
        match self {
            Stage::SrcWithdrawal
            | Stage::SrcPublicWithdrawal
            | Stage::SrcCancellation
            | Stage::SrcPublicCancellation => Role::Source,
            _ => Role::Destination,
        }
    }

    /// Ordered stages of one leg (4 for source, 3 for destination).
    pub fn for_role(role: Role) -> &'static [Stage] {
        match role {
            Role::Source => &Self::ALL[0..4],
            Role::Destination => &Self::ALL[4..7],
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Unpacked relative offsets, in seconds after deployment.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[allow(missing_docs)]
pub struct StageOffsets {
    pub src_withdrawal: u32,
    pub src_public_withdrawal: u32,
    pub src_cancellation: u32,
    pub src_public_cancellation: u32,
    pub dst_withdrawal: u32,
    pub dst_public_withdrawal: u32,
    pub dst_cancellation: u32,
}

impl StageOffsets {
    /// Offset for one stage.
    pub fn get(&self, stage: Stage) -> u32 {
        match stage {
            Stage::SrcWithdrawal => self.src_withdrawal,
            Stage::SrcPublicWithdrawal => self.src_public_withdrawal,
            Stage::SrcCancellation => self.src_cancellation,
            Stage::SrcPublicCancellation => self.src_public_cancellation,
            Stage::DstWithdrawal => self.dst_withdrawal,
            Stage::DstPublicWithdrawal => self.dst_public_withdrawal,
            Stage::DstCancellation => self.dst_cancellation,
        }
    }

    /// Reads every lane back out of a packed word.
    pub fn from_timelocks(timelocks: &Timelocks) -> Self {
        Self {
            src_withdrawal: timelocks.offset(Stage::SrcWithdrawal),
            src_public_withdrawal: timelocks.offset(Stage::SrcPublicWithdrawal),
            src_cancellation: timelocks.offset(Stage::SrcCancellation),
            src_public_cancellation: timelocks.offset(Stage::SrcPublicCancellation),
            dst_withdrawal: timelocks.offset(Stage::DstWithdrawal),
            dst_public_withdrawal: timelocks.offset(Stage::DstPublicWithdrawal),
            dst_cancellation: timelocks.offset(Stage::DstCancellation),
        }
    }
}

/// Packed timelock word.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Timelocks(U256);

impl Timelocks {
    /// Packs stage offsets; the deployment lane starts at zero.
    pub fn pack(offsets: &StageOffsets) -> Self {
        let word = Stage::ALL.iter().fold(U256::zero(), |acc, stage| {
            acc | (U256::from(offsets.get(*stage)) << (stage.lane() * 32))
        });
        Self(word)
    }

    /// Wraps a raw word exactly as stored on chain.
    pub const fn from_u256(word: U256) -> Self {
        Self(word)
    }

    /// Raw packed word.
    pub const fn as_u256(&self) -> U256 {
        self.0
    }

    /// Big-endian 32-byte encoding.
    pub fn to_be_bytes(&self) -> [u8; 32] {
        let mut out = [0u8; 32];
        self.0.to_big_endian(&mut out);
        out
    }

    fn lane(&self, bit: usize) -> u32 {
        ((self.0 >> bit).low_u64() & LANE_MASK) as u32
    }

    /// Relative offset stored for a stage.
    pub fn offset(&self, stage: Stage) -> u32 {
        self.lane(stage.lane() * 32)
    }

    /// Deployment timestamp lane.
    pub fn deployed_at(&self) -> u32 {
        self.lane(DEPLOYED_AT_OFFSET)
    }

    /// Absolute start of a stage: `deployedAt + offset`.
    pub fn get(&self, stage: Stage) -> u64 {
        u64::from(self.deployed_at()) + u64::from(self.offset(stage))
    }

    /// Returns a copy with only the deployment lane replaced.
    #[must_use]
    pub fn with_deployed_at(&self, timestamp: u32) -> Self {
        let cleared = self.0 & !(U256::from(LANE_MASK) << DEPLOYED_AT_OFFSET);
        Self(cleared | (U256::from(timestamp) << DEPLOYED_AT_OFFSET))
    }

    /// Earliest time the rescue path opens.
    pub fn rescue_start(&self, rescue_delay: u32) -> u64 {
        u64::from(self.deployed_at()) + u64::from(rescue_delay)
    }
}

impl fmt::Debug for Timelocks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut s = f.debug_struct("Timelocks");
        s.field("deployed_at", &self.deployed_at());
        for stage in Stage::ALL {
            s.field(&format!("{stage:?}"), &self.offset(stage));
        }
        s.finish()
    }
}
