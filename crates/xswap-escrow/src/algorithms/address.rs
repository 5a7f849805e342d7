//! # Deterministic Escrow Addresses
//!
//! Every escrow is an EIP-1167 minimal proxy of a role implementation,
//! deployed with CREATE2 using the immutables commitment as salt:
//!
//! ```text
//! address = keccak256(0xff ++ factory ++ salt ++ keccak256(init_code))[12..]
//! ```
//!
//! The same derivation doubles as the instance self-check: an escrow
//! accepts a call only if the presented immutables derive its own address.

use crate::domain::{Address, Hash};
use sha3::{Digest, Keccak256};

/// Length of the minimal-proxy creation code.
pub const CLONE_INIT_CODE_LEN: usize = 55;

const CLONE_PREFIX: [u8; 20] = [
    0x3d, 0x60, 0x2d, 0x80, 0x60, 0x0a, 0x3d, 0x39, 0x81, 0xf3, // constructor
    0x36, 0x3d, 0x3d, 0x37, 0x3d, 0x3d, 0x3d, 0x36, 0x3d, 0x73, // runtime up to PUSH20
];

const CLONE_SUFFIX: [u8; 15] = [
    0x5a, 0xf4, 0x3d, 0x82, 0x80, 0x3e, 0x90, 0x3d, 0x91, 0x60, 0x2b, 0x57, 0xfd, 0x5b, 0xf3,
];

/// EIP-1167 creation code delegating to `implementation`.
pub fn clone_init_code(implementation: &Address) -> [u8; CLONE_INIT_CODE_LEN] {
    let mut code = [0u8; CLONE_INIT_CODE_LEN];
    code[..20].copy_from_slice(&CLONE_PREFIX);
    code[20..40].copy_from_slice(implementation.as_bytes());
    code[40..].copy_from_slice(&CLONE_SUFFIX);
    code
}

/// CREATE2 address for `init_code` deployed by `deployer` with `salt`.
pub fn create2(deployer: &Address, salt: &Hash, init_code: &[u8]) -> Address {
    let code_hash = Keccak256::digest(init_code);

    let mut data = Vec::with_capacity(85);
    data.push(0xff);
    data.extend_from_slice(deployer.as_bytes());
    data.extend_from_slice(salt.as_bytes());
    data.extend_from_slice(&code_hash);

    let hash = Keccak256::digest(&data);
    let mut addr = [0u8; 20];
    addr.copy_from_slice(&hash[12..32]);
    Address::new(addr)
}

/// Escrow address for an implementation and an immutables commitment.
pub fn derive_address(factory: &Address, implementation: &Address, commitment: &Hash) -> Address {
    create2(factory, commitment, &clone_init_code(implementation))
}
